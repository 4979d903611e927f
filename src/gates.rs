// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Built-in primitives: logic gates, tristate buffers and switches.

use crate::functor::Output;
use crate::ipoint::NUM_PORTS;
use crate::strength::{Bit4, Drive, Strength};

/// Logic function of a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateOp {
    And,
    Or,
    Nand,
    Nor,
    Xor,
    Xnor,
    Buf,
    Not,
    /// Buffer that passes z through.
    Bufz,
    /// Port 0 data, port 1 active-low enable.
    Bufif0,
    /// Port 0 data, port 1 active-high enable.
    Bufif1,
    /// Port 0 selected by 0, port 1 selected by 1, port 2 select.
    Muxz,
    /// Case equality of ports 0 and 1.
    Eeq,
}

impl GateOp {
    pub fn name(self) -> &'static str {
        match self {
            GateOp::And => "and",
            GateOp::Or => "or",
            GateOp::Nand => "nand",
            GateOp::Nor => "nor",
            GateOp::Xor => "xor",
            GateOp::Xnor => "xnor",
            GateOp::Buf => "buf",
            GateOp::Not => "not",
            GateOp::Bufz => "bufz",
            GateOp::Bufif0 => "bufif0",
            GateOp::Bufif1 => "bufif1",
            GateOp::Muxz => "muxz",
            GateOp::Eeq => "eeq",
        }
    }

    /// Number of ports the function reads at minimum.
    pub fn min_inputs(self) -> u8 {
        match self {
            GateOp::Bufif0 | GateOp::Bufif1 | GateOp::Eeq => 2,
            GateOp::Muxz => 3,
            _ => 1,
        }
    }
}

/// A gate over the first `inputs` ports of its functor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    op: GateOp,
    inputs: u8,
}

impl Gate {
    pub fn new(op: GateOp, inputs: u8) -> Self {
        assert!(
            inputs as usize <= NUM_PORTS && inputs >= op.min_inputs(),
            "{} gate cannot have {} inputs",
            op.name(),
            inputs
        );
        Gate { op, inputs }
    }

    pub fn op(&self) -> GateOp {
        self.op
    }

    pub fn inputs(&self) -> u8 {
        self.inputs
    }

    pub fn eval(&self, ival: u8, drive0: Drive, drive1: Drive) -> Output {
        let port = |p: u8| Bit4::from_bits(ival >> (2 * p));
        let sampled = (0..self.inputs).map(|p| port(p).to_x());
        match self.op {
            GateOp::And => Output::Value(sampled.fold(Bit4::One, Bit4::and)),
            GateOp::Nand => Output::Value(sampled.fold(Bit4::One, Bit4::and).not()),
            GateOp::Or => Output::Value(sampled.fold(Bit4::Zero, Bit4::or)),
            GateOp::Nor => Output::Value(sampled.fold(Bit4::Zero, Bit4::or).not()),
            GateOp::Xor => Output::Value(sampled.fold(Bit4::Zero, Bit4::xor)),
            GateOp::Xnor => Output::Value(sampled.fold(Bit4::Zero, Bit4::xor).not()),
            GateOp::Buf => Output::Value(port(0).to_x()),
            GateOp::Not => Output::Value(port(0).not()),
            GateOp::Bufz => Output::Value(port(0)),
            GateOp::Bufif0 => tristate(port(0), port(1).not(), drive0, drive1),
            GateOp::Bufif1 => tristate(port(0), port(1).to_x(), drive0, drive1),
            GateOp::Muxz => {
                let (a, b) = (port(0), port(1));
                Output::Value(match port(2) {
                    Bit4::Zero => a,
                    Bit4::One => b,
                    _ if a == b => a,
                    _ => Bit4::X,
                })
            }
            GateOp::Eeq => Output::Value(Bit4::from(port(0) == port(1))),
        }
    }
}

/// Tristate buffer with an active-high enable. An unknown enable yields
/// the L or H range between the data drive and HiZ.
fn tristate(data: Bit4, enable: Bit4, drive0: Drive, drive1: Drive) -> Output {
    match enable {
        Bit4::One => Output::Value(data.to_x()),
        Bit4::Zero => Output::Driven(Bit4::Z, Strength::HIZ),
        _ => match data {
            Bit4::Zero => Output::Driven(Bit4::X, Strength::from_nibbles(0, drive0.bits())),
            Bit4::One => Output::Driven(Bit4::X, Strength::from_nibbles(0x8 | drive1.bits(), 0)),
            _ => Output::Value(Bit4::X),
        },
    }
}

/// Strength-passing primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchOp {
    /// Port 0 data, port 1 gate, conducts on 1.
    Nmos,
    /// Port 0 data, port 1 gate, conducts on 0.
    Pmos,
    /// Wired resolution of all four ports.
    Resolver,
}

impl SwitchOp {
    pub fn name(self) -> &'static str {
        match self {
            SwitchOp::Nmos => "nmos",
            SwitchOp::Pmos => "pmos",
            SwitchOp::Resolver => "resolv",
        }
    }
}

/// A primitive that keeps the strength of each input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    op: SwitchOp,
    istr: [Strength; NUM_PORTS],
}

impl Switch {
    pub fn new(op: SwitchOp) -> Self {
        Switch {
            op,
            istr: [Strength::HIZ; NUM_PORTS],
        }
    }

    pub fn op(&self) -> SwitchOp {
        self.op
    }

    pub fn input_strength(&self, port: u32) -> Strength {
        self.istr[port as usize]
    }

    /// Remember the strength arriving on `port`. A stimulus that carries a
    /// value but no strength is taken as strongly driven.
    pub(crate) fn record(&mut self, port: u32, val: Bit4, str: Strength) {
        self.istr[port as usize] = if str.is_hiz() && val != Bit4::Z {
            Strength::from_drive(val, Drive::Strong, Drive::Strong)
        } else {
            str
        };
    }

    pub fn eval(&self, ival: u8) -> Output {
        match self.op {
            SwitchOp::Nmos => self.conduct(Bit4::from_bits(ival >> 2).to_x()),
            SwitchOp::Pmos => self.conduct(Bit4::from_bits(ival >> 2).not()),
            SwitchOp::Resolver => {
                let net = self.istr.iter().fold(Strength::HIZ, |acc, &s| acc.resolve(s));
                Output::Driven(net.value(), net)
            }
        }
    }

    fn conduct(&self, gate: Bit4) -> Output {
        let data = self.istr[0].reduce_switch();
        match gate {
            Bit4::One => Output::Driven(data.value(), data),
            Bit4::Zero => Output::Driven(Bit4::Z, Strength::HIZ),
            _ if data.is_hiz() => Output::Driven(Bit4::Z, Strength::HIZ),
            _ => {
                let str = match data.value() {
                    Bit4::One => Strength::from_nibbles(data.high(), 0),
                    Bit4::Zero => Strength::from_nibbles(0, data.low()),
                    _ => data,
                };
                Output::Driven(Bit4::X, str)
            }
        }
    }
}
