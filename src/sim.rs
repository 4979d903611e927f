// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The simulation context.
//!
//! [`Simulation`] owns the functor space and the scheduler and implements
//! everything that moves values through the netlist: the per-kind `set`
//! dispatch, output staging (`put_oval`/`put_ostr`), scheduling and the
//! iterative fanout walk in `propagate`.
//!
//! A value arriving at an input is latched and the functor recomputed. If
//! its pending output changes, the change either propagates in the same
//! step (`push` with zero delay) or becomes an event on the scheduler that
//! propagates the functor when it fires.

use std::rc::Rc;

use crate::config::SimConfig;
use crate::delay::{Delay, DelayTable};
use crate::functor::{Eval, Functor, Output};
use crate::fvector::FVector;
use crate::ipoint::Ipoint;
use crate::schedule::{EventQueue, ScheduledEvent, Scheduler};
use crate::space::FunctorSpace;
use crate::strength::{Bit4, Drive, Strength};

/// Counters kept while simulating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Calls to `set`, one per value delivered to an input.
    pub sets: u64,
    /// Committed outputs.
    pub propagations: u64,
    /// Events handed to the scheduler.
    pub scheduled: u64,
    /// Zero-delay pushes sent through the scheduler by the depth limit.
    pub deferred_pushes: u64,
    /// Events discarded because their functor was disabled.
    pub suppressed: u64,
}

type BreakHandler = Box<dyn FnMut(Ipoint, &Functor)>;

pub struct Simulation<S: Scheduler = EventQueue> {
    space: FunctorSpace,
    scheduler: S,
    config: SimConfig,
    stats: SimStats,
    push_depth: usize,
    depth_warned: bool,
    break_handler: Option<BreakHandler>,
}

impl Simulation<EventQueue> {
    pub fn new(config: SimConfig) -> Self {
        Self::with_scheduler(config, EventQueue::new())
    }
}

impl Default for Simulation<EventQueue> {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl<S: Scheduler> Simulation<S> {
    pub fn with_scheduler(config: SimConfig, scheduler: S) -> Self {
        Simulation {
            space: FunctorSpace::new(),
            scheduler,
            config,
            stats: SimStats::default(),
            push_depth: 0,
            depth_warned: false,
            break_handler: None,
        }
    }

    pub fn space(&self) -> &FunctorSpace {
        &self.space
    }

    pub(crate) fn space_mut(&mut self) -> &mut FunctorSpace {
        &mut self.space
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    // ── netlist construction ────────────────────────────────────────────

    pub fn allocate(&mut self, width: u32) -> Ipoint {
        self.space.allocate(width)
    }

    pub fn define(&mut self, ipt: Ipoint, functor: Functor) {
        self.space.define(ipt, functor);
    }

    /// Allocate one functor and define it.
    pub fn add(&mut self, functor: Functor) -> Ipoint {
        let ipt = self.space.allocate(1);
        self.space.define(ipt, functor);
        ipt
    }

    /// Fan the output of `from` out to input `to`.
    pub fn connect(&mut self, from: Ipoint, to: Ipoint) {
        self.space.lookup_mut(from).add_fanout(to);
    }

    /// Fan the output of `from` out to every connected member of `bus`.
    pub fn connect_vector(&mut self, from: Ipoint, bus: &FVector) {
        let f = self.space.lookup_mut(from);
        for ipt in bus.iter().filter(|i| !i.is_null()) {
            f.add_fanout(ipt);
        }
    }

    pub fn set_delay(&mut self, ipt: Ipoint, delay: Option<Rc<DelayTable>>) {
        self.space.lookup_mut(ipt).set_delay(delay);
    }

    pub fn set_drive(&mut self, ipt: Ipoint, drive0: Drive, drive1: Drive) {
        self.space.lookup_mut(ipt).set_drive(drive0, drive1);
    }

    // ── input side ──────────────────────────────────────────────────────

    /// Deliver `val`/`str` to the input `ipt` and recompute its functor.
    pub fn set(&mut self, ipt: Ipoint, push: bool, val: Bit4, str: Strength) {
        self.stats.sets += 1;
        let f = self.space.lookup_mut(ipt);
        match f.kind.forward() {
            Some((base, latch_first)) => {
                if latch_first {
                    f.put(ipt, val);
                }
                self.evaluate(base, ipt, false, push, val, str);
            }
            None => self.evaluate(ipt.with_port(0), ipt, true, push, val, str),
        }
    }

    fn evaluate(&mut self, base: Ipoint, ipt: Ipoint, own: bool, push: bool, val: Bit4, str: Strength) {
        match self.space.lookup_mut(base).recompute(ipt, own, val, str) {
            Eval::Output(Output::Value(v)) => self.put_oval(base, v, push),
            Eval::Output(Output::Driven(v, s)) => self.put_ostr(base, v, s, push),
            Eval::Udp => self.udp_set(base, ipt, push),
            Eval::Memory => self.memory_set(base, ipt, val, push),
        }
    }

    /// Committed output value.
    pub fn get(&self, ipt: Ipoint) -> Bit4 {
        self.space.lookup(ipt).get()
    }

    pub fn get_str(&self, ipt: Ipoint) -> Strength {
        self.space.lookup(ipt).get_str()
    }

    /// Pending output value.
    pub fn get_oval(&self, ipt: Ipoint) -> Bit4 {
        self.space.lookup(ipt).get_oval()
    }

    pub fn get_ostr(&self, ipt: Ipoint) -> Strength {
        self.space.lookup(ipt).get_ostr()
    }

    // ── output side ─────────────────────────────────────────────────────

    /// Drive `val` with the functor's configured strengths.
    pub fn put_oval(&mut self, ipt: Ipoint, val: Bit4, push: bool) {
        let str = self.space.lookup(ipt).output().strength_for(val);
        self.put_ostr(ipt, val, str, push);
    }

    /// Stage a new pending output and propagate or schedule it.
    pub fn put_ostr(&mut self, ipt: Ipoint, val: Bit4, str: Strength, push: bool) {
        let ipt = ipt.with_port(0);
        let f = self.space.lookup_mut(ipt);
        let Some(old) = f.output.stage(val, str) else {
            return;
        };
        if f.is_inhibited() {
            return;
        }
        let delay = f.delay_for(old, val);
        if push && delay == 0 {
            self.push_now(ipt);
        } else {
            self.schedule(ipt, delay);
        }
    }

    fn push_now(&mut self, ipt: Ipoint) {
        if self.push_depth >= self.config.max_push_depth {
            if !self.depth_warned {
                clilog::warn!(
                    "zero-delay push depth {} reached at functor {}, deferring to scheduler",
                    self.push_depth,
                    ipt
                );
                self.depth_warned = true;
            }
            self.stats.deferred_pushes += 1;
            self.schedule(ipt, 0);
            return;
        }
        self.push_depth += 1;
        self.propagate(ipt, true);
        self.push_depth -= 1;
    }

    /// Propagate the functor `ipt` `delay` time units from now.
    pub fn schedule(&mut self, ipt: Ipoint, delay: Delay) {
        let ipt = ipt.with_port(0);
        self.stats.scheduled += 1;
        self.space.lookup_mut(ipt).pending += 1;
        self.scheduler.schedule(delay, ipt);
    }

    /// Commit the pending output and deliver it to every fanout input.
    pub fn propagate(&mut self, ipt: Ipoint, push: bool) {
        let f = self.space.lookup(ipt);
        let (val, str) = (f.get_oval(), f.get_ostr());
        self.propagate_value(ipt, val, str, push);
    }

    /// Commit `val`/`str` as the output and deliver it to every fanout input.
    pub fn propagate_value(&mut self, ipt: Ipoint, val: Bit4, str: Strength, push: bool) {
        let ipt = ipt.with_port(0);
        let f = self.space.lookup_mut(ipt);
        f.output.commit(val, str);
        let width = f.fanout.len();
        self.stats.propagations += 1;
        for i in 0..width {
            let dst = self.space.lookup(ipt).fanout[i];
            self.set(dst, push, val, str);
        }
        if self.space.lookup(ipt).break_flag() {
            self.breakpoint(ipt);
        }
    }

    // ── force / release ─────────────────────────────────────────────────

    /// Stop the functor from propagating. Returns whether it was enabled.
    pub fn disable(&mut self, ipt: Ipoint) -> bool {
        self.space.lookup_mut(ipt).output.set_inhibit(true)
    }

    /// Let the functor propagate again. If its output moved while it was
    /// disabled and no event of its own is still queued, the new value
    /// propagates immediately; otherwise that event carries it.
    pub fn enable(&mut self, ipt: Ipoint) -> bool {
        let ipt = ipt.with_port(0);
        let f = self.space.lookup_mut(ipt);
        let changed = f.output.set_inhibit(false);
        if changed && f.pending == 0 && !f.output().is_settled() {
            self.push_now(ipt);
        }
        changed
    }

    // ── entry points ────────────────────────────────────────────────────

    /// Drive an input from outside the netlist.
    pub fn functor_set(&mut self, ipt: Ipoint, val: Bit4, str: Strength, push: bool) {
        self.set(ipt, push, val, str);
        if self.space.lookup(ipt).break_flag() {
            self.breakpoint(ipt);
        }
    }

    pub fn functor_get(&self, ipt: Ipoint) -> Bit4 {
        self.get(ipt)
    }

    pub fn set_break(&mut self, ipt: Ipoint, on: bool) {
        self.space.lookup_mut(ipt).break_flag = on;
    }

    pub fn set_breakpoint_handler(&mut self, handler: impl FnMut(Ipoint, &Functor) + 'static) {
        self.break_handler = Some(Box::new(handler));
    }

    fn breakpoint(&mut self, ipt: Ipoint) {
        let f = self.space.lookup(ipt);
        match self.break_handler.as_mut() {
            Some(handler) => handler(ipt, f),
            None => clilog::info!("breakpoint at functor {} ({})", ipt, f.kind().name()),
        }
    }

    /// Drive each connected member of `bus` with the matching bit, strong.
    pub fn set_vector(&mut self, bus: &FVector, bits: &[Bit4], push: bool) {
        assert_eq!(bus.size(), bits.len(), "bus width mismatch");
        for (ipt, &val) in bus.iter().zip(bits) {
            if !ipt.is_null() {
                let str = Strength::from_drive(val, Drive::Strong, Drive::Strong);
                self.functor_set(ipt, val, str, push);
            }
        }
    }

    /// Committed outputs of the members of `bus`. Unconnected members read Z.
    pub fn get_vector(&self, bus: &FVector) -> Vec<Bit4> {
        bus.iter()
            .map(|ipt| if ipt.is_null() { Bit4::Z } else { self.functor_get(ipt) })
            .collect()
    }

    // ── running ─────────────────────────────────────────────────────────

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    /// Fire the earliest pending event. Returns false if there was none.
    pub fn step(&mut self) -> bool {
        match self.scheduler.pop() {
            Some(event) => {
                self.fire(event);
                true
            }
            None => false,
        }
    }

    /// Fire every event up to and including time `limit`, then move time
    /// to `limit`.
    pub fn run_until(&mut self, limit: u64) {
        while self.scheduler.peek_time().is_some_and(|t| t <= limit) {
            self.step();
        }
        self.scheduler.advance_to(limit);
    }

    /// Fire events until the queue drains or `max_events` is reached.
    /// Returns the number of events fired.
    pub fn run(&mut self) -> u64 {
        let mut fired = 0;
        while !self.scheduler.is_empty() {
            if self.config.max_events.is_some_and(|max| fired >= max) {
                clilog::warn!(
                    "stopping at time {} after {} events, {} still pending",
                    self.now(),
                    fired,
                    self.scheduler.len()
                );
                break;
            }
            self.step();
            fired += 1;
        }
        clilog::debug!("fired {} events, time is now {}", fired, self.now());
        fired
    }

    fn fire(&mut self, event: ScheduledEvent) {
        let f = self.space.lookup_mut(event.target);
        f.pending = f.pending.saturating_sub(1);
        if f.is_inhibited() {
            self.stats.suppressed += 1;
            return;
        }
        self.propagate(event.target, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functor::FunctorKind;
    use crate::gates::{Gate, GateOp};
    use std::cell::RefCell;

    fn gate(op: GateOp, inputs: u8) -> Functor {
        Functor::new(FunctorKind::Gate(Gate::new(op, inputs)))
    }

    fn drive(sim: &mut Simulation, ipt: Ipoint, val: Bit4) {
        let str = Strength::from_drive(val, Drive::Strong, Drive::Strong);
        sim.functor_set(ipt, val, str, true);
    }

    #[test]
    fn test_push_propagates_in_same_step() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Not, 1));
        let b = sim.add(gate(GateOp::Buf, 1));
        sim.connect(a, b);
        drive(&mut sim, a, Bit4::Zero);
        assert_eq!(sim.get(a), Bit4::One);
        assert_eq!(sim.space().lookup(b).input(0), Bit4::One);
        assert_eq!(sim.get(b), Bit4::One);
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn test_no_push_schedules_zero_delay() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        sim.functor_set(a, Bit4::One, Strength::ST1, false);
        assert_eq!(sim.get_oval(a), Bit4::One);
        assert_eq!(sim.get(a), Bit4::X);
        assert_eq!(sim.scheduler().peek_time(), Some(0));
        assert!(sim.step());
        assert_eq!(sim.get(a), Bit4::One);
        assert_eq!(sim.get_str(a), Strength::ST1);
    }

    #[test]
    fn test_disabled_functor_holds_output() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        let b = sim.add(gate(GateOp::Buf, 1));
        sim.connect(a, b);
        assert!(sim.disable(a));
        assert!(!sim.disable(a));
        drive(&mut sim, a, Bit4::One);
        assert_eq!(sim.get_oval(a), Bit4::One);
        assert_eq!(sim.get(a), Bit4::X);
        assert_eq!(sim.get(b), Bit4::X);
        assert!(sim.enable(a));
        assert_eq!(sim.get(a), Bit4::One);
        assert_eq!(sim.get(b), Bit4::One);
        assert!(!sim.enable(a));
    }

    #[test]
    fn test_enable_with_queued_event_keeps_delay() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1).with_delay(Rc::new(DelayTable::uniform(4))));
        let sink = sim.add(gate(GateOp::Buf, 1));
        sim.connect(a, sink);
        drive(&mut sim, a, Bit4::One);
        assert_eq!(sim.space().lookup(a).pending_events(), 1);
        sim.disable(a);
        assert!(sim.enable(a));
        assert_eq!(sim.get(a), Bit4::X);
        assert_eq!(sim.get(sink), Bit4::X);

        sim.run();
        assert_eq!(sim.now(), 4);
        assert_eq!(sim.get(a), Bit4::One);
        assert_eq!(sim.get(sink), Bit4::One);
        assert_eq!(sim.stats().propagations, 2);
        assert_eq!(sim.space().lookup(a).pending_events(), 0);
    }

    #[test]
    fn test_extra_outputs_forward_to_gate() {
        let mut sim = Simulation::default();
        let base = sim.allocate(2);
        sim.define(base, gate(GateOp::And, 2));
        sim.define(base.offset(1), Functor::new(FunctorKind::ExtraOutputs { base }));
        let extra = base.offset(1);
        drive(&mut sim, base, Bit4::One);
        drive(&mut sim, extra.with_port(1), Bit4::One);
        assert_eq!(sim.space().lookup(extra).input(1), Bit4::One);
        assert_eq!(sim.space().lookup(base).input(1), Bit4::One);
        assert_eq!(sim.get(base), Bit4::One);
    }

    #[test]
    fn test_propagate_value_commits_given_output() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        let sink = sim.add(gate(GateOp::Buf, 1));
        sim.connect(a, sink);
        sim.propagate_value(a, Bit4::One, Strength::PU1, true);
        assert_eq!(sim.get(a), Bit4::One);
        assert_eq!(sim.get_str(a), Strength::PU1);
        // the pending output is left alone
        assert_eq!(sim.get_oval(a), Bit4::X);
        assert_eq!(sim.space().lookup(sink).input(0), Bit4::One);
        assert_eq!(sim.get(sink), Bit4::One);
        assert_eq!(sim.stats().sets, 1);
    }

    #[test]
    fn test_event_for_disabled_functor_is_dropped() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        sim.set_delay(a, Some(Rc::new(DelayTable::uniform(3))));
        drive(&mut sim, a, Bit4::One);
        sim.disable(a);
        sim.run();
        assert_eq!(sim.get(a), Bit4::X);
        assert_eq!(sim.stats().suppressed, 1);
        assert_eq!(sim.now(), 3);
    }

    #[test]
    fn test_breakpoint_handler_sees_functor() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&hits);
        sim.set_breakpoint_handler(move |ipt, f| seen.borrow_mut().push((ipt, f.get())));
        sim.set_break(a, true);
        drive(&mut sim, a, Bit4::Zero);
        // once from propagate, once after the input was applied
        assert_eq!(*hits.borrow(), vec![(a, Bit4::Zero), (a, Bit4::Zero)]);
    }

    #[test]
    fn test_vector_helpers() {
        let mut sim = Simulation::default();
        let base = sim.allocate(3);
        for i in 0..3 {
            sim.define(base.offset(i), gate(GateOp::Buf, 1));
        }
        let mut bus = FVector::continuous(3, base);
        sim.set_vector(&bus, &[Bit4::One, Bit4::Zero, Bit4::Z], true);
        assert_eq!(sim.get_vector(&bus), vec![Bit4::One, Bit4::Zero, Bit4::X]);
        bus.set(2, Ipoint::NULL);
        assert_eq!(sim.get_vector(&bus)[2], Bit4::Z);
    }

    #[test]
    fn test_run_until_stops_at_limit() {
        let mut sim = Simulation::default();
        let a = sim.add(gate(GateOp::Buf, 1));
        sim.set_delay(a, Some(Rc::new(DelayTable::uniform(10))));
        drive(&mut sim, a, Bit4::One);
        sim.run_until(4);
        assert_eq!(sim.now(), 4);
        assert_eq!(sim.get(a), Bit4::X);
        sim.run_until(10);
        assert_eq!(sim.get(a), Bit4::One);
    }

    #[test]
    fn test_max_events_stops_run() {
        let config = SimConfig {
            max_events: Some(1),
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config);
        let a = sim.add(gate(GateOp::Buf, 1));
        let b = sim.add(gate(GateOp::Buf, 1));
        sim.functor_set(a, Bit4::One, Strength::ST1, false);
        sim.functor_set(b, Bit4::One, Strength::ST1, false);
        assert_eq!(sim.run(), 1);
        assert_eq!(sim.scheduler().len(), 1);
    }
}
