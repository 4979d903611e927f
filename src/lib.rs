// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! gatesim: event-driven gate-level simulation kernel.
//!
//! A netlist is a set of functors: small primitives with four 2-bit input
//! latches and one strength-aware output that fans out to other functors'
//! inputs. Values move through the netlist either immediately (zero-delay
//! pushes) or through a scheduler that propagates outputs after their
//! transition delays.
//!
//! # Flow
//!
//! ```text
//! functor_set(input)
//!   → set           (latch, recompute per primitive kind)
//!   → put_ostr      (stage pending output, skip if unchanged)
//!   → push now | schedule(delay)
//!   → propagate     (commit, walk fanout, set each input)
//! ```
//!
//! # Key modules
//!
//! - [`ipoint`]: 32-bit (functor, port) handles
//! - [`strength`]: four-state values, drive levels and strength bytes
//! - [`delay`]: per-transition delay tables
//! - [`functor`]: the functor record and its primitive kinds
//! - [`gates`]: logic gates, tristate buffers, switches and resolvers
//! - [`udp`]: user-defined primitive tables
//! - [`memory`]: single-port memories
//! - [`space`]: chunked functor arena
//! - [`fvector`]: ordered buses of handles
//! - [`schedule`]: the scheduler trait and a time-ordered event queue
//! - [`sim`]: the simulation context: set, propagate, force/release
//! - [`config`]: JSON-loadable simulation options

pub mod ipoint;

pub mod strength;

pub mod delay;

pub mod functor;

pub mod gates;

pub mod udp;

pub mod memory;

pub mod space;

pub mod fvector;

pub mod schedule;

pub mod sim;

pub mod config;
