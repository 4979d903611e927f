// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Transition delay tables.
//!
//! A [`DelayTable`] holds one delay per output transition class, in the
//! order
//!
//! ```text
//! 0->1  1->0  0->z  z->1  1->z  z->0  0->x  x->1  1->x  x->0  x->z  z->x
//! ```
//!
//! and can be built from 1, 2, 3, 6 or all 12 values. Shorter forms are
//! expanded the way gate and net delays are in Verilog: with up to three
//! values (rise, fall, turn-off) transitions to x take the minimum and
//! transitions from x take the delay of the destination; with six values
//! the x transitions are derived pessimistically from their neighbours.

use crate::strength::Bit4;

/// Virtual-time units.
pub type Delay = u64;

/// Transition class index, see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Transition {
    ZeroOne = 0,
    OneZero,
    ZeroZ,
    ZOne,
    OneZ,
    ZZero,
    ZeroX,
    XOne,
    OneX,
    XZero,
    XZ,
    ZX,
}

impl Transition {
    /// Classify a change of output value. Returns `None` when the value
    /// does not change.
    pub const fn classify(from: Bit4, to: Bit4) -> Option<Transition> {
        use Bit4::*;
        Some(match (from, to) {
            (Zero, One) => Transition::ZeroOne,
            (One, Zero) => Transition::OneZero,
            (Zero, Z) => Transition::ZeroZ,
            (Z, One) => Transition::ZOne,
            (One, Z) => Transition::OneZ,
            (Z, Zero) => Transition::ZZero,
            (Zero, X) => Transition::ZeroX,
            (X, One) => Transition::XOne,
            (One, X) => Transition::OneX,
            (X, Zero) => Transition::XZero,
            (X, Z) => Transition::XZ,
            (Z, X) => Transition::ZX,
            _ => return None,
        })
    }
}

/// Per-transition delays of one functor output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayTable {
    delays: [Delay; 12],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelayError {
    /// Only 1, 2, 3, 6 or 12 delay values make a table.
    BadCount(usize),
}

impl std::fmt::Display for DelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayError::BadCount(n) => {
                write!(f, "delay table needs 1, 2, 3, 6 or 12 values, got {}", n)
            }
        }
    }
}

impl std::error::Error for DelayError {}

impl DelayTable {
    /// Build a table from a delay list of length 1, 2, 3, 6 or 12.
    pub fn new(values: &[Delay]) -> Result<Self, DelayError> {
        match *values {
            [d] => Ok(Self::uniform(d)),
            [rise, fall] => Ok(Self::rise_fall(rise, fall)),
            [rise, fall, decay] => Ok(Self::rise_fall_decay(rise, fall, decay)),
            [d01, d10, d0z, dz1, d1z, dz0] => Ok(Self::from_six([d01, d10, d0z, dz1, d1z, dz0])),
            _ if values.len() == 12 => {
                let mut delays = [0; 12];
                delays.copy_from_slice(values);
                Ok(DelayTable { delays })
            }
            _ => Err(DelayError::BadCount(values.len())),
        }
    }

    pub fn uniform(delay: Delay) -> Self {
        DelayTable { delays: [delay; 12] }
    }

    /// Rise and fall; turn-off takes the smaller of the two.
    pub fn rise_fall(rise: Delay, fall: Delay) -> Self {
        Self::rise_fall_decay(rise, fall, rise.min(fall))
    }

    pub fn rise_fall_decay(rise: Delay, fall: Delay, decay: Delay) -> Self {
        let to_x = rise.min(fall).min(decay);
        DelayTable {
            delays: [
                rise, fall, decay, rise, decay, fall, // 0/1/z transitions
                to_x, rise, to_x, fall, decay, to_x, // x transitions
            ],
        }
    }

    fn from_six(six: [Delay; 6]) -> Self {
        let [d01, d10, d0z, dz1, d1z, dz0] = six;
        DelayTable {
            delays: [
                d01,
                d10,
                d0z,
                dz1,
                d1z,
                dz0,
                d01.min(d0z),
                d01.max(dz1),
                d10.min(d1z),
                d10.max(dz0),
                d0z.max(d1z),
                dz1.min(dz0),
            ],
        }
    }

    /// Delay of the output change `from -> to`. A change of strength
    /// without a change of value takes no delay.
    pub fn get(&self, from: Bit4, to: Bit4) -> Delay {
        match Transition::classify(from, to) {
            Some(t) => self.delays[t as usize],
            None => 0,
        }
    }

    pub fn transition(&self, t: Transition) -> Delay {
        self.delays[t as usize]
    }

    /// True if every transition has zero delay.
    pub fn is_zero(&self) -> bool {
        self.delays.iter().all(|&d| d == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Bit4::*;

    #[test]
    fn test_rise_fall() {
        let d = DelayTable::rise_fall(5, 2);
        assert_eq!(d.get(Zero, One), 5);
        assert_eq!(d.get(One, Zero), 2);
        assert_eq!(d.get(X, One), 5);
        assert_eq!(d.get(Z, Zero), 2);
        assert_eq!(d.get(One, X), 2);
        assert_eq!(d.get(One, Z), 2);
        assert_eq!(d.get(One, One), 0);
    }

    #[test]
    fn test_three_values() {
        let d = DelayTable::new(&[4, 6, 9]).unwrap();
        assert_eq!(d.get(Zero, Z), 9);
        assert_eq!(d.get(One, Z), 9);
        assert_eq!(d.get(Z, One), 4);
        assert_eq!(d.get(Zero, X), 4);
        assert_eq!(d.get(X, Z), 9);
    }

    #[test]
    fn test_six_values_derive_x() {
        let d = DelayTable::new(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(d.transition(Transition::ZeroX), 1);
        assert_eq!(d.transition(Transition::XOne), 4);
        assert_eq!(d.transition(Transition::OneX), 2);
        assert_eq!(d.transition(Transition::XZero), 6);
        assert_eq!(d.transition(Transition::XZ), 5);
        assert_eq!(d.transition(Transition::ZX), 4);
    }

    #[test]
    fn test_twelve_values_verbatim() {
        let values: Vec<Delay> = (1..=12).collect();
        let d = DelayTable::new(&values).unwrap();
        assert_eq!(d.get(Z, X), 12);
        assert_eq!(d.get(Zero, One), 1);
        assert!(!d.is_zero());
        assert!(DelayTable::uniform(0).is_zero());
    }

    #[test]
    fn test_bad_count() {
        assert_eq!(DelayTable::new(&[]), Err(DelayError::BadCount(0)));
        assert_eq!(DelayTable::new(&[1, 2, 3, 4]), Err(DelayError::BadCount(4)));
    }
}
