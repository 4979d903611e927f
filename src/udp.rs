// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! User-defined primitives.
//!
//! A UDP with N inputs occupies a contiguous run of `ceil(N / 4)` functors.
//! The first (base) functor holds the table and drives the output; the
//! others are extra-inputs functors (edge-inputs for sequential tables)
//! that latch their inputs and forward to the base.
//!
//! Table rows are written one symbol per input, then for sequential tables
//! the current-state symbol, then the output symbol. `:` and whitespace are
//! ignored, so `"r 0 ? : 0"` and `"r0?0"` are the same row.
//!
//! | symbol | meaning |
//! |--------|---------|
//! | `0` `1` `x` | that level |
//! | `?` | any level |
//! | `b` | 0 or 1 |
//! | `r` `f` | (01), (10) |
//! | `p` `n` | rising or falling, including transitions through x |
//! | `*` | any change |
//! | `(vw)` | change from `v` to `w`, each a level symbol |
//! | `-` | output only: keep the current state |

use std::rc::Rc;

use smallvec::SmallVec;

use crate::functor::{Functor, FunctorKind, IVAL_ALL_X};
use crate::ipoint::{Ipoint, NUM_PORTS};
use crate::schedule::Scheduler;
use crate::sim::Simulation;
use crate::strength::Bit4;

const L0: u8 = 0b001;
const L1: u8 = 0b010;
const LX: u8 = 0b100;
const LANY: u8 = L0 | L1 | LX;

fn level_mask(v: Bit4) -> u8 {
    match v.to_x() {
        Bit4::Zero => L0,
        Bit4::One => L1,
        _ => LX,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Level(u8),
    Edge { from: u8, to: u8 },
}

impl Symbol {
    fn matches_level(self, v: Bit4) -> bool {
        match self {
            Symbol::Level(mask) => mask & level_mask(v) != 0,
            Symbol::Edge { .. } => false,
        }
    }

    fn matches_edge(self, old: Bit4, new: Bit4) -> bool {
        match self {
            Symbol::Edge { from, to } => {
                let (o, n) = (level_mask(old), level_mask(new));
                o != n && from & o != 0 && to & n != 0
            }
            Symbol::Level(_) => false,
        }
    }
}

fn parse_level(c: char) -> Option<u8> {
    match c {
        '0' => Some(L0),
        '1' => Some(L1),
        'x' | 'X' => Some(LX),
        '?' => Some(LANY),
        'b' | 'B' => Some(L0 | L1),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    inputs: SmallVec<[Symbol; 8]>,
    /// Position of the edge symbol, if any.
    edge: Option<usize>,
    state: Option<u8>,
    /// `None` keeps the current state.
    output: Option<Bit4>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdpError {
    NoInputs,
    /// Row index, expected symbol count, symbols found.
    RowLength(usize, usize, usize),
    BadSymbol(usize, char),
    /// More than one edge symbol in a row.
    MultipleEdges(usize),
    /// Edge symbol in a combinational table.
    CombinationalEdge(usize),
    BadOutput(usize, char),
    UnclosedEdge(usize),
}

impl std::fmt::Display for UdpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UdpError::NoInputs => write!(f, "UDP must have at least one input"),
            UdpError::RowLength(row, expected, got) => write!(
                f,
                "UDP row {}: expected {} symbols, found {}",
                row, expected, got
            ),
            UdpError::BadSymbol(row, c) => write!(f, "UDP row {}: bad symbol '{}'", row, c),
            UdpError::MultipleEdges(row) => {
                write!(f, "UDP row {}: more than one edge symbol", row)
            }
            UdpError::CombinationalEdge(row) => {
                write!(f, "UDP row {}: edge symbol in a combinational table", row)
            }
            UdpError::BadOutput(row, c) => write!(f, "UDP row {}: bad output '{}'", row, c),
            UdpError::UnclosedEdge(row) => write!(f, "UDP row {}: unterminated '('", row),
        }
    }
}

impl std::error::Error for UdpError {}

/// The truth table of a user-defined primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpTable {
    inputs: usize,
    sequential: bool,
    initial: Bit4,
    rows: Vec<Row>,
}

impl UdpTable {
    pub fn combinational(inputs: usize, rows: &[&str]) -> Result<Self, UdpError> {
        Self::build(inputs, false, Bit4::X, rows)
    }

    /// A table whose rows also match on, and may keep, the current output.
    pub fn sequential(inputs: usize, initial: Bit4, rows: &[&str]) -> Result<Self, UdpError> {
        Self::build(inputs, true, initial, rows)
    }

    fn build(inputs: usize, sequential: bool, initial: Bit4, rows: &[&str]) -> Result<Self, UdpError> {
        if inputs == 0 {
            return Err(UdpError::NoInputs);
        }
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, text)| parse_row(i, text, inputs, sequential))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UdpTable {
            inputs,
            sequential,
            initial,
            rows,
        })
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    pub fn initial(&self) -> Bit4 {
        self.initial
    }

    /// Number of functors the primitive occupies.
    pub fn functors(&self) -> usize {
        self.inputs.div_ceil(NUM_PORTS)
    }

    /// Compute the output after input `changed.0` went from `changed.1` to
    /// its value in `inputs`. `None` means the output is left alone.
    pub fn eval(&self, inputs: &[Bit4], changed: Option<(usize, Bit4)>, state: Bit4) -> Option<Bit4> {
        debug_assert_eq!(inputs.len(), self.inputs);
        let state_ok = |row: &Row| row.state.map_or(true, |mask| mask & level_mask(state) != 0);
        let levels_ok = |row: &Row, skip: Option<usize>| {
            row.inputs
                .iter()
                .zip(inputs)
                .enumerate()
                .all(|(i, (sym, &v))| Some(i) == skip || sym.matches_level(v))
        };

        if !self.sequential {
            let out = self
                .rows
                .iter()
                .find(|row| levels_ok(row, None))
                .and_then(|row| row.output);
            return Some(out.unwrap_or(Bit4::X));
        }

        if let Some(row) = self
            .rows
            .iter()
            .find(|row| row.edge.is_none() && state_ok(row) && levels_ok(row, None))
        {
            return row.output;
        }

        let (pos, old) = changed?;
        let new = inputs[pos];
        if level_mask(old) == level_mask(new) {
            return None;
        }
        match self.rows.iter().find(|row| {
            row.edge == Some(pos)
                && row.inputs[pos].matches_edge(old, new)
                && state_ok(row)
                && levels_ok(row, Some(pos))
        }) {
            Some(row) => row.output,
            None => Some(Bit4::X),
        }
    }
}

fn parse_row(index: usize, text: &str, inputs: usize, sequential: bool) -> Result<Row, UdpError> {
    let mut chars = text.chars().filter(|c| !c.is_whitespace() && *c != ':');
    let mut symbols: SmallVec<[Symbol; 8]> = SmallVec::new();
    let mut tail = Vec::new();
    while let Some(c) = chars.next() {
        if symbols.len() == inputs {
            tail.push(c);
            continue;
        }
        let sym = match c {
            'r' | 'R' => Symbol::Edge { from: L0, to: L1 },
            'f' | 'F' => Symbol::Edge { from: L1, to: L0 },
            'p' | 'P' => Symbol::Edge { from: L0 | LX, to: L1 | LX },
            'n' | 'N' => Symbol::Edge { from: L1 | LX, to: L0 | LX },
            '*' => Symbol::Edge { from: LANY, to: LANY },
            '(' => {
                let v = chars.next().ok_or(UdpError::UnclosedEdge(index))?;
                let w = chars.next().ok_or(UdpError::UnclosedEdge(index))?;
                if chars.next() != Some(')') {
                    return Err(UdpError::UnclosedEdge(index));
                }
                let from = parse_level(v).ok_or(UdpError::BadSymbol(index, v))?;
                let to = parse_level(w).ok_or(UdpError::BadSymbol(index, w))?;
                Symbol::Edge { from, to }
            }
            c => Symbol::Level(parse_level(c).ok_or(UdpError::BadSymbol(index, c))?),
        };
        symbols.push(sym);
    }

    let expected = inputs + if sequential { 2 } else { 1 };
    if symbols.len() + tail.len() != expected {
        return Err(UdpError::RowLength(index, expected, symbols.len() + tail.len()));
    }

    let edges: SmallVec<[usize; 2]> = symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, Symbol::Edge { .. }))
        .map(|(i, _)| i)
        .collect();
    if edges.len() > 1 {
        return Err(UdpError::MultipleEdges(index));
    }
    if !sequential && !edges.is_empty() {
        return Err(UdpError::CombinationalEdge(index));
    }

    let (state, out) = if sequential {
        let s = tail[0];
        (Some(parse_level(s).ok_or(UdpError::BadSymbol(index, s))?), tail[1])
    } else {
        (None, tail[0])
    };
    let output = match out {
        '0' => Some(Bit4::Zero),
        '1' => Some(Bit4::One),
        'x' | 'X' => Some(Bit4::X),
        '-' if sequential => None,
        c => return Err(UdpError::BadOutput(index, c)),
    };

    Ok(Row {
        inputs: symbols,
        edge: edges.first().copied(),
        state,
        output,
    })
}

/// Payload of the base functor of a UDP.
#[derive(Debug, Clone)]
pub struct UdpBase {
    table: Rc<UdpTable>,
    old_ival: u8,
}

impl UdpBase {
    pub fn new(table: Rc<UdpTable>) -> Self {
        UdpBase {
            table,
            old_ival: IVAL_ALL_X,
        }
    }

    pub fn table(&self) -> &Rc<UdpTable> {
        &self.table
    }
}

impl<S: Scheduler> Simulation<S> {
    /// Allocate and define the functors of a UDP. Input `i` is port
    /// `i % 4` of the functor `i / 4` past the returned base, whose output
    /// is the primitive's output.
    pub fn add_udp(&mut self, table: Rc<UdpTable>) -> Ipoint {
        let run = table.functors() as u32;
        let base = self.allocate(run);
        let initial = table.initial();
        let sequential = table.is_sequential();
        self.define(base, Functor::new(FunctorKind::Udp(UdpBase::new(table))).with_initial(initial));
        for i in 1..run {
            let kind = if sequential {
                FunctorKind::EdgeInputs {
                    base,
                    old_ival: IVAL_ALL_X,
                }
            } else {
                FunctorKind::ExtraInputs { base }
            };
            self.define(base.offset(i), Functor::new(kind));
        }
        base
    }

    /// Evaluate the UDP whose base is `base` after an input arrived at `ipt`.
    /// The input is already latched in the functor `ipt` names.
    pub(crate) fn udp_set(&mut self, base: Ipoint, ipt: Ipoint, push: bool) {
        let space = self.space_mut();
        let table = match space.lookup(base).kind() {
            FunctorKind::Udp(udp) => Rc::clone(&udp.table),
            other => panic!("functor {} is {}, not a udp", base, other.name()),
        };

        let rel = (ipt.index() - base.index()) as usize;
        assert!(rel < table.functors(), "input {} is outside udp {}", ipt, base);
        let pos = rel * NUM_PORTS + ipt.port() as usize;
        assert!(pos < table.inputs(), "udp {} has no input {}", base, pos);

        let inputs: SmallVec<[Bit4; 16]> = (0..table.inputs())
            .map(|i| {
                space
                    .lookup(base.offset((i / NUM_PORTS) as u32))
                    .input((i % NUM_PORTS) as u32)
            })
            .collect();

        // Exchange the retained input byte of the functor that took the input.
        let holder = space.lookup_mut(ipt);
        let ival = holder.ival;
        let old_ival = match &mut holder.kind {
            FunctorKind::Udp(udp) => Some(std::mem::replace(&mut udp.old_ival, ival)),
            FunctorKind::EdgeInputs { old_ival, .. } => Some(std::mem::replace(old_ival, ival)),
            _ => None,
        };
        let changed = old_ival.map(|old| (pos, Bit4::from_bits(old >> (2 * ipt.port()))));

        let state = space.lookup(base).get_oval();
        if let Some(out) = table.eval(&inputs, changed, state) {
            self.put_oval(base, out, push);
        }
    }
}
