// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The scheduler boundary.
//!
//! The kernel only ever asks a [`Scheduler`] to "propagate this functor
//! after `delay`". [`EventQueue`] is a plain time-ordered queue that fires
//! events with equal times in the order they were scheduled.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::delay::Delay;
use crate::ipoint::Ipoint;

/// A pending propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduledEvent {
    pub time: u64,
    /// Insertion order, breaks ties between equal times.
    pub seq: u64,
    pub target: Ipoint,
}

pub trait Scheduler {
    /// Propagate `target` at `now() + delay`. Events are never cancelled.
    fn schedule(&mut self, delay: Delay, target: Ipoint);

    /// Current virtual time.
    fn now(&self) -> u64;

    /// Time of the earliest pending event.
    fn peek_time(&self) -> Option<u64>;

    /// Remove the earliest pending event and advance time to it.
    fn pop(&mut self) -> Option<ScheduledEvent>;

    /// Move time forward to `time` without firing anything. Time never
    /// goes backwards.
    fn advance_to(&mut self, time: u64);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    now: u64,
    seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for EventQueue {
    fn schedule(&mut self, delay: Delay, target: Ipoint) {
        let time = self.now + delay;
        clilog::debug!("schedule {} at {} (+{})", target, time, delay);
        self.heap.push(Reverse(ScheduledEvent {
            time,
            seq: self.seq,
            target,
        }));
        self.seq += 1;
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn peek_time(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    fn pop(&mut self) -> Option<ScheduledEvent> {
        let Reverse(event) = self.heap.pop()?;
        self.now = event.time;
        Some(event)
    }

    fn advance_to(&mut self, time: u64) {
        self.now = self.now.max(time);
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order_then_fifo() {
        let mut q = EventQueue::new();
        let (a, b, c) = (Ipoint::new(1, 0), Ipoint::new(2, 0), Ipoint::new(3, 0));
        q.schedule(5, a);
        q.schedule(2, b);
        q.schedule(5, c);
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek_time(), Some(2));
        assert_eq!(q.pop().map(|e| e.target), Some(b));
        assert_eq!(q.now(), 2);
        assert_eq!(q.pop().map(|e| e.target), Some(a));
        assert_eq!(q.pop().map(|e| e.target), Some(c));
        assert_eq!(q.now(), 5);
        assert!(q.pop().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut q = EventQueue::new();
        q.advance_to(10);
        q.advance_to(4);
        assert_eq!(q.now(), 10);
        q.schedule(0, Ipoint::new(1, 0));
        assert_eq!(q.peek_time(), Some(10));
    }
}
