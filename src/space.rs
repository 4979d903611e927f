// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Functor address space.
//!
//! Functors live in fixed-size chunks indexed by `index / CHUNK_SIZE`. A
//! chunk is only allocated when the first functor inside it is defined, so
//! reserving a large run of handles costs nothing until it is populated.

use crate::functor::Functor;
use crate::ipoint::{Ipoint, MAX_INDEX};

/// Functor slots per chunk.
pub const CHUNK_SIZE: usize = 0x400;

type Chunk = Box<[Option<Functor>]>;

/// Arena of every functor in a netlist. It only grows.
#[derive(Debug)]
pub struct FunctorSpace {
    chunks: Vec<Option<Chunk>>,
    /// Next free functor index. Index 0 is never handed out.
    next: u32,
}

impl Default for FunctorSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn split(ipt: Ipoint) -> (usize, usize) {
    let index = ipt.index() as usize;
    (index / CHUNK_SIZE, index % CHUNK_SIZE)
}

impl FunctorSpace {
    pub fn new() -> Self {
        FunctorSpace {
            chunks: Vec::new(),
            next: 1,
        }
    }

    /// Reserve `width` contiguous functor slots and return the handle of
    /// the first, port 0.
    pub fn allocate(&mut self, width: u32) -> Ipoint {
        assert!(width > 0, "cannot allocate zero functors");
        let base = self.next;
        let end = match base.checked_add(width) {
            Some(end) if end - 1 <= MAX_INDEX => end,
            _ => {
                clilog::error!(
                    "functor space exhausted: {} allocated, {} more requested",
                    self.limit(),
                    width
                );
                std::process::abort();
            }
        };
        self.next = end;
        let chunks = (end as usize - 1) / CHUNK_SIZE + 1;
        if chunks > self.chunks.len() {
            self.chunks.resize_with(chunks, || None);
        }
        Ipoint::new(base, 0)
    }

    /// Install `functor` at a previously allocated handle. The port of
    /// `ipt` is ignored.
    pub fn define(&mut self, ipt: Ipoint, functor: Functor) {
        assert!(
            ipt.index() != 0 && ipt.index() < self.next,
            "functor {} was never allocated",
            ipt
        );
        let (chunk, offset) = split(ipt);
        let slots = self.chunks[chunk].get_or_insert_with(|| {
            clilog::debug!("functor chunk {} populated", chunk);
            (0..CHUNK_SIZE).map(|_| None).collect()
        });
        let slot = &mut slots[offset];
        assert!(slot.is_none(), "functor {} defined twice", ipt);
        *slot = Some(functor);
    }

    pub fn get(&self, ipt: Ipoint) -> Option<&Functor> {
        let (chunk, offset) = split(ipt);
        self.chunks.get(chunk)?.as_ref()?[offset].as_ref()
    }

    pub fn get_mut(&mut self, ipt: Ipoint) -> Option<&mut Functor> {
        let (chunk, offset) = split(ipt);
        self.chunks.get_mut(chunk)?.as_mut()?[offset].as_mut()
    }

    /// The functor `ipt` points into. Panics if it has not been defined.
    #[inline]
    pub fn lookup(&self, ipt: Ipoint) -> &Functor {
        match self.get(ipt) {
            Some(f) => f,
            None => panic!("functor {} is not defined", ipt),
        }
    }

    #[inline]
    pub fn lookup_mut(&mut self, ipt: Ipoint) -> &mut Functor {
        match self.get_mut(ipt) {
            Some(f) => f,
            None => panic!("functor {} is not defined", ipt),
        }
    }

    pub fn is_defined(&self, ipt: Ipoint) -> bool {
        self.get(ipt).is_some()
    }

    /// Number of functor slots allocated so far.
    pub fn limit(&self) -> u32 {
        self.next - 1
    }

    pub fn chunks_in_use(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Defined functors in index order, with their port-0 handles.
    pub fn iter(&self) -> impl Iterator<Item = (Ipoint, &Functor)> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(c, chunk)| chunk.as_ref().map(|slots| (c, slots)))
            .flat_map(|(c, slots)| {
                slots.iter().enumerate().filter_map(move |(o, slot)| {
                    slot.as_ref()
                        .map(|f| (Ipoint::new((c * CHUNK_SIZE + o) as u32, 0), f))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functor::FunctorKind;
    use crate::gates::{Gate, GateOp};

    fn buf() -> Functor {
        Functor::new(FunctorKind::Gate(Gate::new(GateOp::Buf, 1)))
    }

    #[test]
    fn test_allocate_skips_index_zero() {
        let mut space = FunctorSpace::new();
        let a = space.allocate(1);
        assert_eq!(a.index(), 1);
        assert_eq!(a.port(), 0);
        let b = space.allocate(3);
        assert_eq!(b.index(), 2);
        assert_eq!(space.allocate(1).index(), 5);
        assert_eq!(space.limit(), 5);
        assert_eq!(space.chunks_in_use(), 0);
    }

    #[test]
    fn test_define_then_lookup() {
        let mut space = FunctorSpace::new();
        let base = space.allocate(CHUNK_SIZE as u32 + 10);
        let far = base.offset(CHUNK_SIZE as u32 + 5);
        space.define(far, buf());
        assert!(space.is_defined(far));
        assert!(space.is_defined(far.with_port(3)));
        assert!(!space.is_defined(base));
        assert_eq!(space.chunks_in_use(), 1);
        assert_eq!(space.lookup(far.with_port(2)).kind().name(), "buf");

        space.define(base, buf());
        assert_eq!(space.chunks_in_use(), 2);
        let order: Vec<u32> = space.iter().map(|(i, _)| i.index()).collect();
        assert_eq!(order, vec![base.index(), far.index()]);
    }

    #[test]
    fn test_get_out_of_range() {
        let space = FunctorSpace::new();
        assert!(space.get(Ipoint::new(12345, 0)).is_none());
        assert!(space.get(Ipoint::NULL).is_none());
    }

    #[test]
    #[should_panic(expected = "defined twice")]
    fn test_define_twice_panics() {
        let mut space = FunctorSpace::new();
        let a = space.allocate(1);
        space.define(a, buf());
        space.define(a, buf());
    }

    #[test]
    #[should_panic(expected = "never allocated")]
    fn test_define_unallocated_panics() {
        let mut space = FunctorSpace::new();
        space.allocate(1);
        space.define(Ipoint::new(7, 0), buf());
    }

    #[test]
    #[should_panic(expected = "is not defined")]
    fn test_lookup_undefined_panics() {
        let mut space = FunctorSpace::new();
        let a = space.allocate(1);
        space.lookup(a);
    }
}
