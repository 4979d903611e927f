// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Ordered buses of functor ports.

use crate::ipoint::Ipoint;

/// An ordered sequence of input handles, one per bus bit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FVector {
    members: Vec<Ipoint>,
}

impl FVector {
    /// A bus of `size` unconnected members.
    pub fn new(size: usize) -> Self {
        FVector {
            members: vec![Ipoint::NULL; size],
        }
    }

    /// Member `i` is `base` advanced by `i` functors.
    pub fn continuous(size: usize, base: Ipoint) -> Self {
        FVector {
            members: (0..size as u32).map(|i| base.offset(i)).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn get(&self, i: usize) -> Ipoint {
        self.members[i]
    }

    pub fn set(&mut self, i: usize, ipt: Ipoint) {
        self.members[i] = ipt;
    }

    pub fn member(&self, i: usize) -> Option<Ipoint> {
        self.members.get(i).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipoint> + '_ {
        self.members.iter().copied()
    }

    pub fn as_slice(&self) -> &[Ipoint] {
        &self.members
    }
}

impl From<Vec<Ipoint>> for FVector {
    fn from(members: Vec<Ipoint>) -> Self {
        FVector { members }
    }
}
