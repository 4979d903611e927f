// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Single-port memories with asynchronous read and posedge write.
//!
//! A `words x width` memory occupies one contiguous run of functors:
//!
//! - `width` data functors, one per bit. Port 0 latches the data-in bit
//!   and the functor's output drives the data-out bit. The first data
//!   functor is the base and holds the storage; the others are
//!   extra-outputs functors.
//! - control functors (extra-ports), four ports each, carrying the
//!   address bits (LSB first), then write enable, then clock.

use crate::functor::{Functor, FunctorKind};
use crate::ipoint::{Ipoint, NUM_PORTS};
use crate::schedule::Scheduler;
use crate::sim::Simulation;
use crate::strength::Bit4;

/// Where the ports of a memory are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    base: Ipoint,
    words: usize,
    width: usize,
    addr_width: usize,
}

/// What an input port of a memory functor is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    DataIn(usize),
    Address(usize),
    WriteEnable,
    Clock,
    Unused,
}

impl MemoryLayout {
    pub fn new(base: Ipoint, words: usize, width: usize) -> Self {
        assert!(words > 0 && width > 0, "memory must have at least one word and one bit");
        let addr_width = (usize::BITS - (words - 1).leading_zeros()) as usize;
        MemoryLayout {
            base,
            words,
            width,
            addr_width,
        }
    }

    pub fn base(&self) -> Ipoint {
        self.base
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn addr_width(&self) -> usize {
        self.addr_width
    }

    /// Total functors in the run.
    pub fn functors(&self) -> usize {
        self.width + (self.addr_width + 2).div_ceil(NUM_PORTS)
    }

    /// Data-in port of bit `bit`; the same functor's output is data-out.
    pub fn data(&self, bit: usize) -> Ipoint {
        assert!(bit < self.width, "memory has no data bit {}", bit);
        self.base.offset(bit as u32)
    }

    pub fn address(&self, bit: usize) -> Ipoint {
        assert!(bit < self.addr_width, "memory has no address bit {}", bit);
        self.control(bit)
    }

    pub fn write_enable(&self) -> Ipoint {
        self.control(self.addr_width)
    }

    pub fn clock(&self) -> Ipoint {
        self.control(self.addr_width + 1)
    }

    fn control(&self, slot: usize) -> Ipoint {
        Ipoint::new(
            self.base.index() + (self.width + slot / NUM_PORTS) as u32,
            (slot % NUM_PORTS) as u32,
        )
    }

    pub fn role(&self, ipt: Ipoint) -> PortRole {
        let rel = ipt.index().wrapping_sub(self.base.index()) as usize;
        if rel < self.width {
            return match ipt.port() {
                0 => PortRole::DataIn(rel),
                _ => PortRole::Unused,
            };
        }
        let slot = (rel - self.width) * NUM_PORTS + ipt.port() as usize;
        match slot {
            s if s < self.addr_width => PortRole::Address(s),
            s if s == self.addr_width => PortRole::WriteEnable,
            s if s == self.addr_width + 1 => PortRole::Clock,
            _ => PortRole::Unused,
        }
    }
}

/// Storage of a memory, held by its base functor.
#[derive(Debug, Clone)]
pub struct MemoryCore {
    layout: MemoryLayout,
    data: Vec<Bit4>,
}

impl MemoryCore {
    pub fn new(layout: MemoryLayout) -> Self {
        MemoryCore {
            layout,
            data: vec![Bit4::X; layout.words * layout.width],
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn word(&self, addr: usize) -> Option<&[Bit4]> {
        let w = self.layout.width;
        self.data.get(addr * w..(addr + 1) * w)
    }

    fn word_mut(&mut self, addr: usize) -> Option<&mut [Bit4]> {
        let w = self.layout.width;
        self.data.get_mut(addr * w..(addr + 1) * w)
    }
}

impl<S: Scheduler> Simulation<S> {
    /// Allocate and define a `words x width` memory.
    pub fn add_memory(&mut self, words: usize, width: usize) -> MemoryLayout {
        let sizing = MemoryLayout::new(Ipoint::NULL, words, width);
        let base = self.allocate(sizing.functors() as u32);
        let layout = MemoryLayout::new(base, words, width);
        self.define(base, Functor::new(FunctorKind::Memory(Box::new(MemoryCore::new(layout)))));
        for i in 1..layout.functors() {
            let kind = if i < width {
                FunctorKind::ExtraOutputs { base }
            } else {
                FunctorKind::ExtraPorts { base }
            };
            self.define(base.offset(i as u32), Functor::new(kind));
        }
        clilog::debug!(
            "memory {}: {} words x {} bits, {} address bits",
            base,
            words,
            width,
            layout.addr_width
        );
        layout
    }

    fn memory_core(&self, base: Ipoint) -> &MemoryCore {
        match self.space().lookup(base).kind() {
            FunctorKind::Memory(core) => core,
            other => panic!("functor {} is {}, not a memory", base, other.name()),
        }
    }

    fn memory_core_mut(&mut self, base: Ipoint) -> &mut MemoryCore {
        match &mut self.space_mut().lookup_mut(base).kind {
            FunctorKind::Memory(core) => core,
            other => panic!("functor {} is {}, not a memory", base, other.name()),
        }
    }

    /// Handle an input arriving at `ipt` of the memory based at `base`.
    pub(crate) fn memory_set(&mut self, base: Ipoint, ipt: Ipoint, val: Bit4, push: bool) {
        let layout = self.memory_core(base).layout;
        let holder = self.space_mut().lookup_mut(ipt);
        let old = holder.input(ipt.port());
        holder.put(ipt, val);
        match layout.role(ipt) {
            PortRole::Address(_) if old != val => self.memory_read(&layout, push),
            PortRole::Clock if old == Bit4::Zero && val == Bit4::One => {
                if self.space().lookup(layout.write_enable()).input(layout.write_enable().port())
                    == Bit4::One
                {
                    self.memory_write(&layout);
                }
                self.memory_read(&layout, push);
            }
            _ => {}
        }
    }

    /// Decode the latched address. `None` if any bit is not 0 or 1.
    fn memory_address(&self, layout: &MemoryLayout) -> Option<usize> {
        (0..layout.addr_width).try_fold(0usize, |acc, bit| {
            let ipt = layout.address(bit);
            match self.space().lookup(ipt).input(ipt.port()) {
                Bit4::Zero => Some(acc),
                Bit4::One => Some(acc | 1 << bit),
                _ => None,
            }
        })
    }

    fn memory_write(&mut self, layout: &MemoryLayout) {
        let Some(addr) = self.memory_address(layout) else {
            clilog::warn!("memory {}: write with unknown address ignored", layout.base);
            return;
        };
        let bits: Vec<Bit4> = (0..layout.width)
            .map(|b| self.space().lookup(layout.data(b)).input(0))
            .collect();
        match self.memory_core_mut(layout.base).word_mut(addr) {
            Some(word) => word.copy_from_slice(&bits),
            None => clilog::warn!(
                "memory {}: write to address {} beyond {} words ignored",
                layout.base,
                addr,
                layout.words
            ),
        }
    }

    fn memory_read(&mut self, layout: &MemoryLayout, push: bool) {
        let word = self
            .memory_address(layout)
            .and_then(|addr| self.memory_core(layout.base).word(addr).map(<[Bit4]>::to_vec));
        for bit in 0..layout.width {
            let val = word.as_ref().map_or(Bit4::X, |w| w[bit]);
            self.put_oval(layout.data(bit), val, push);
        }
    }

    /// Overwrite one word directly, then refresh the data outputs.
    pub fn write_memory(&mut self, layout: &MemoryLayout, addr: usize, bits: &[Bit4]) {
        assert_eq!(bits.len(), layout.width, "word width mismatch");
        let word = self
            .memory_core_mut(layout.base)
            .word_mut(addr)
            .unwrap_or_else(|| panic!("memory {} has no address {}", layout.base, addr));
        word.copy_from_slice(bits);
        self.memory_read(layout, false);
    }

    /// Contents of one word.
    pub fn memory_word(&self, layout: &MemoryLayout, addr: usize) -> Vec<Bit4> {
        self.memory_core(layout.base)
            .word(addr)
            .map(<[Bit4]>::to_vec)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_positions() {
        let base = Ipoint::new(10, 0);
        let m = MemoryLayout::new(base, 16, 3);
        assert_eq!(m.addr_width(), 4);
        // 3 data functors, 6 control slots in 2 functors
        assert_eq!(m.functors(), 5);
        assert_eq!(m.data(2), Ipoint::new(12, 0));
        assert_eq!(m.address(0), Ipoint::new(13, 0));
        assert_eq!(m.address(3), Ipoint::new(13, 3));
        assert_eq!(m.write_enable(), Ipoint::new(14, 0));
        assert_eq!(m.clock(), Ipoint::new(14, 1));

        assert_eq!(m.role(Ipoint::new(11, 0)), PortRole::DataIn(1));
        assert_eq!(m.role(Ipoint::new(11, 2)), PortRole::Unused);
        assert_eq!(m.role(Ipoint::new(13, 2)), PortRole::Address(2));
        assert_eq!(m.role(Ipoint::new(14, 0)), PortRole::WriteEnable);
        assert_eq!(m.role(Ipoint::new(14, 1)), PortRole::Clock);
        assert_eq!(m.role(Ipoint::new(14, 3)), PortRole::Unused);
    }

    #[test]
    fn test_address_width() {
        assert_eq!(MemoryLayout::new(Ipoint::NULL, 1, 1).addr_width(), 0);
        assert_eq!(MemoryLayout::new(Ipoint::NULL, 2, 1).addr_width(), 1);
        assert_eq!(MemoryLayout::new(Ipoint::NULL, 5, 1).addr_width(), 3);
        assert_eq!(MemoryLayout::new(Ipoint::NULL, 8, 1).addr_width(), 3);
        assert_eq!(MemoryLayout::new(Ipoint::NULL, 1, 8).functors(), 9);
    }

    #[test]
    fn test_core_starts_unknown() {
        let core = MemoryCore::new(MemoryLayout::new(Ipoint::NULL, 4, 2));
        assert_eq!(core.word(3), Some(&[Bit4::X, Bit4::X][..]));
        assert_eq!(core.word(4), None);
    }
}
