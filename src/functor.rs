// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The functor: one simulated primitive node.
//!
//! A functor has four 2-bit input latches, a committed output (what the net
//! currently carries), a pending output (what the functor has computed, which
//! may lead the committed value by one scheduled event), configured drive
//! strengths, an optional delay table and the ordered list of input ports its
//! output fans out to.
//!
//! The operations that need the rest of the netlist (`set`, `propagate`,
//! `put_ostr`, ...) live on [`Simulation`](crate::sim::Simulation), which
//! owns every functor.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::delay::{Delay, DelayTable};
use crate::gates::{Gate, Switch};
use crate::ipoint::{Ipoint, NUM_PORTS};
use crate::memory::MemoryCore;
use crate::strength::{Bit4, Drive, Strength};
use crate::udp::UdpBase;

/// Downstream input ports of one output, in propagation order.
pub type Fanout = SmallVec<[Ipoint; 4]>;

/// Input latches of a fresh functor: every port X.
pub const IVAL_ALL_X: u8 = 0xaa;

/// Output side of a functor.
///
/// The committed pair only changes through [`commit`](Self::commit), which
/// only propagation calls; the pending pair only through
/// [`stage`](Self::stage).
#[derive(Debug, Clone)]
pub struct OutputState {
    cval: Bit4,
    cstr: Strength,
    oval: Bit4,
    ostr: Strength,
    odrive0: Drive,
    odrive1: Drive,
    inhibit: bool,
}

impl Default for OutputState {
    fn default() -> Self {
        Self {
            cval: Bit4::X,
            cstr: Strength::STX,
            oval: Bit4::X,
            ostr: Strength::STX,
            odrive0: Drive::Strong,
            odrive1: Drive::Strong,
            inhibit: false,
        }
    }
}

impl OutputState {
    /// Committed value.
    #[inline]
    pub fn get(&self) -> Bit4 {
        self.cval
    }

    /// Committed strength.
    #[inline]
    pub fn get_str(&self) -> Strength {
        self.cstr
    }

    /// Pending value.
    #[inline]
    pub fn get_oval(&self) -> Bit4 {
        self.oval
    }

    /// Pending strength.
    #[inline]
    pub fn get_ostr(&self) -> Strength {
        self.ostr
    }

    #[inline]
    pub fn drive0(&self) -> Drive {
        self.odrive0
    }

    #[inline]
    pub fn drive1(&self) -> Drive {
        self.odrive1
    }

    #[inline]
    pub fn is_inhibited(&self) -> bool {
        self.inhibit
    }

    /// Pending and committed outputs agree.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.cval == self.oval && self.cstr == self.ostr
    }

    /// Strength this functor drives for `value`.
    #[inline]
    pub fn strength_for(&self, value: Bit4) -> Strength {
        Strength::from_drive(value, self.odrive0, self.odrive1)
    }

    /// Replace the pending output. Returns the previous pending value, or
    /// `None` if nothing changed.
    pub(crate) fn stage(&mut self, val: Bit4, str: Strength) -> Option<Bit4> {
        if val == self.oval && str == self.ostr {
            return None;
        }
        let old = self.oval;
        self.oval = val;
        self.ostr = str;
        Some(old)
    }

    pub(crate) fn commit(&mut self, val: Bit4, str: Strength) {
        self.cval = val;
        self.cstr = str;
    }

    /// Returns whether the flag changed.
    pub(crate) fn set_inhibit(&mut self, on: bool) -> bool {
        let changed = self.inhibit != on;
        self.inhibit = on;
        changed
    }

    fn set_drive(&mut self, drive0: Drive, drive1: Drive) {
        self.odrive0 = drive0;
        self.odrive1 = drive1;
    }

    fn initialise(&mut self, val: Bit4) {
        let str = self.strength_for(val);
        self.cval = val;
        self.oval = val;
        self.cstr = str;
        self.ostr = str;
    }
}

/// Result of a primitive's recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// A logic value; strength comes from the functor's drive levels.
    Value(Bit4),
    /// A value with an explicit strength.
    Driven(Bit4, Strength),
}

/// The primitive a functor implements.
///
/// The forwarding variants carry the handle of the functor that holds the
/// actual implementation; their `set` hands the input over to it.
#[derive(Debug, Clone)]
pub enum FunctorKind {
    Gate(Gate),
    Switch(Switch),
    Udp(UdpBase),
    Memory(Box<MemoryCore>),
    /// Latch the input, then delegate to `base`. The functor keeps its own
    /// output, which `base` drives.
    ExtraOutputs { base: Ipoint },
    /// Delegate to `base` without latching; `base` latches after looking at
    /// the previous input value.
    ExtraPorts { base: Ipoint },
    /// Latch the input, then delegate to `base`, which owns the only output.
    ExtraInputs { base: Ipoint },
    /// [`ExtraInputs`](Self::ExtraInputs) with the previous input byte kept
    /// for edge detection.
    EdgeInputs { base: Ipoint, old_ival: u8 },
}

impl FunctorKind {
    pub fn name(&self) -> &'static str {
        match self {
            FunctorKind::Gate(g) => g.op().name(),
            FunctorKind::Switch(s) => s.op().name(),
            FunctorKind::Udp(_) => "udp",
            FunctorKind::Memory(_) => "memory",
            FunctorKind::ExtraOutputs { .. } => "extra-outputs",
            FunctorKind::ExtraPorts { .. } => "extra-ports",
            FunctorKind::ExtraInputs { .. } => "extra-inputs",
            FunctorKind::EdgeInputs { .. } => "edge-inputs",
        }
    }

    /// Where a `set` on this functor is handled, and whether the input is
    /// latched here first.
    pub(crate) fn forward(&self) -> Option<(Ipoint, bool)> {
        match *self {
            FunctorKind::ExtraOutputs { base }
            | FunctorKind::ExtraInputs { base }
            | FunctorKind::EdgeInputs { base, .. } => Some((base, true)),
            FunctorKind::ExtraPorts { base } => Some((base, false)),
            _ => None,
        }
    }
}

/// How a functor's implementation responded to an input.
pub(crate) enum Eval {
    Output(Output),
    /// Needs the inputs spread over the whole UDP run.
    Udp,
    /// Needs the memory's port functors.
    Memory,
}

/// A simulated primitive.
#[derive(Debug, Clone)]
pub struct Functor {
    pub(crate) kind: FunctorKind,
    pub(crate) ival: u8,
    pub(crate) output: OutputState,
    pub(crate) fanout: Fanout,
    pub(crate) break_flag: bool,
    /// Scheduled propagations of this functor that have not fired yet.
    pub(crate) pending: u32,
    delay: Option<Rc<DelayTable>>,
}

#[inline]
pub(crate) fn latch(ival: u8, port: u32, val: Bit4) -> u8 {
    let shift = 2 * port;
    (ival & !(3 << shift)) | (val.bits() << shift)
}

impl Functor {
    pub fn new(kind: FunctorKind) -> Self {
        Self {
            kind,
            ival: IVAL_ALL_X,
            output: OutputState::default(),
            fanout: Fanout::new(),
            break_flag: false,
            pending: 0,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Rc<DelayTable>) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_drive(mut self, drive0: Drive, drive1: Drive) -> Self {
        self.output.set_drive(drive0, drive1);
        self
    }

    pub fn with_fanout(mut self, inputs: impl IntoIterator<Item = Ipoint>) -> Self {
        for ipt in inputs {
            self.add_fanout(ipt);
        }
        self
    }

    /// Start with both outputs at `value`, driven with the configured
    /// strengths. Apply after [`with_drive`](Self::with_drive).
    pub fn with_initial(mut self, value: Bit4) -> Self {
        self.output.initialise(value);
        self
    }

    pub fn set_delay(&mut self, delay: Option<Rc<DelayTable>>) {
        self.delay = delay;
    }

    pub fn set_drive(&mut self, drive0: Drive, drive1: Drive) {
        self.output.set_drive(drive0, drive1);
    }

    pub(crate) fn add_fanout(&mut self, ipt: Ipoint) {
        assert!(!ipt.is_null(), "cannot fan out to the null handle");
        assert!(
            !self.fanout.contains(&ipt),
            "input {} is already connected to this output",
            ipt
        );
        self.fanout.push(ipt);
    }

    pub fn kind(&self) -> &FunctorKind {
        &self.kind
    }

    pub fn ival(&self) -> u8 {
        self.ival
    }

    /// Latched value of one input port.
    #[inline]
    pub fn input(&self, port: u32) -> Bit4 {
        debug_assert!((port as usize) < NUM_PORTS);
        Bit4::from_bits(self.ival >> (2 * port))
    }

    pub fn output(&self) -> &OutputState {
        &self.output
    }

    #[inline]
    pub fn get(&self) -> Bit4 {
        self.output.get()
    }

    #[inline]
    pub fn get_str(&self) -> Strength {
        self.output.get_str()
    }

    #[inline]
    pub fn get_oval(&self) -> Bit4 {
        self.output.get_oval()
    }

    #[inline]
    pub fn get_ostr(&self) -> Strength {
        self.output.get_ostr()
    }

    pub fn fanout(&self) -> &[Ipoint] {
        &self.fanout
    }

    pub fn delay(&self) -> Option<&DelayTable> {
        self.delay.as_deref()
    }

    pub fn is_inhibited(&self) -> bool {
        self.output.is_inhibited()
    }

    pub fn break_flag(&self) -> bool {
        self.break_flag
    }

    pub fn pending_events(&self) -> u32 {
        self.pending
    }

    /// Mask `val` into the input latch for the port of `ipt`.
    #[inline]
    pub fn put(&mut self, ipt: Ipoint, val: Bit4) {
        self.ival = latch(self.ival, ipt.port(), val);
    }

    pub(crate) fn delay_for(&self, from: Bit4, to: Bit4) -> Delay {
        self.delay.as_ref().map_or(0, |d| d.get(from, to))
    }

    /// Run this functor's own implementation for an input arriving at
    /// `ipt`. `own` is false when the input was forwarded from another
    /// functor of the same primitive, which has latched it already. Gates
    /// and switches latch a forwarded input at its port on themselves.
    pub(crate) fn recompute(&mut self, ipt: Ipoint, own: bool, val: Bit4, str: Strength) -> Eval {
        let (drive0, drive1) = (self.output.drive0(), self.output.drive1());
        match &mut self.kind {
            FunctorKind::Gate(gate) => {
                self.ival = latch(self.ival, ipt.port(), val);
                Eval::Output(gate.eval(self.ival, drive0, drive1))
            }
            FunctorKind::Switch(switch) => {
                self.ival = latch(self.ival, ipt.port(), val);
                switch.record(ipt.port(), val, str);
                Eval::Output(switch.eval(self.ival))
            }
            FunctorKind::Udp(_) => {
                if own {
                    self.ival = latch(self.ival, ipt.port(), val);
                }
                Eval::Udp
            }
            FunctorKind::Memory(_) => Eval::Memory,
            other => panic!(
                "{} functor cannot implement an input forwarded from {}",
                other.name(),
                ipt
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateOp;

    fn and2() -> Functor {
        Functor::new(FunctorKind::Gate(Gate::new(GateOp::And, 2)))
    }

    #[test]
    fn test_fresh_functor_is_x() {
        let f = and2();
        assert_eq!(f.ival(), IVAL_ALL_X);
        assert_eq!(f.get(), Bit4::X);
        assert_eq!(f.get_str(), Strength::STX);
        assert_eq!(f.get_oval(), Bit4::X);
        assert!(f.output().is_settled());
        assert!(f.fanout().is_empty());
    }

    #[test]
    fn test_put_masks_port() {
        let mut f = and2();
        f.put(Ipoint::new(3, 0), Bit4::One);
        f.put(Ipoint::new(3, 2), Bit4::Zero);
        f.put(Ipoint::new(3, 3), Bit4::Z);
        assert_eq!(f.input(0), Bit4::One);
        assert_eq!(f.input(1), Bit4::X);
        assert_eq!(f.input(2), Bit4::Zero);
        assert_eq!(f.input(3), Bit4::Z);
        assert_eq!(f.ival(), 0b11_00_10_01);
    }

    #[test]
    fn test_stage_suppresses_repeats() {
        let mut out = OutputState::default();
        assert_eq!(out.stage(Bit4::One, Strength::ST1), Some(Bit4::X));
        assert_eq!(out.stage(Bit4::One, Strength::ST1), None);
        // Same value, new strength is still a change.
        assert_eq!(out.stage(Bit4::One, Strength::PU1), Some(Bit4::One));
        assert_eq!(out.get(), Bit4::X);
        out.commit(Bit4::One, Strength::PU1);
        assert!(out.is_settled());
    }

    #[test]
    fn test_initial_uses_drive() {
        let f = and2().with_drive(Drive::Pull, Drive::Supply).with_initial(Bit4::One);
        assert_eq!(f.get(), Bit4::One);
        assert_eq!(f.get_str(), Strength::SU1);
        let f = and2().with_drive(Drive::Pull, Drive::Supply).with_initial(Bit4::Zero);
        assert_eq!(f.get_ostr(), Strength::PU0);
    }

    #[test]
    fn test_forwarded_input_latches_on_gate() {
        let mut f = and2();
        let from = Ipoint::new(9, 1);
        assert!(matches!(
            f.recompute(Ipoint::new(8, 0), true, Bit4::One, Strength::ST1),
            Eval::Output(Output::Value(Bit4::X))
        ));
        assert!(matches!(
            f.recompute(from, false, Bit4::One, Strength::ST1),
            Eval::Output(Output::Value(Bit4::One))
        ));
        assert_eq!(f.input(1), Bit4::One);
    }

    #[test]
    #[should_panic(expected = "already connected")]
    fn test_duplicate_fanout_panics() {
        let _ = and2().with_fanout([Ipoint::new(2, 0), Ipoint::new(2, 0)]);
    }
}
