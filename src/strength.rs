// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Four-state values and drive strengths.
//!
//! # Value encoding
//!
//! ```text
//! 1'b0 : 00
//! 1'b1 : 01
//! 1'bx : 10
//! 1'bz : 11
//! ```
//!
//! # Strength encoding
//!
//! A strength-aware value is one byte made of two `VSSS` nibbles: three
//! bits of drive level (0 = HiZ .. 7 = Supply) and one value bit. The high
//! nibble is the end of the strength range closest to supply1, the low
//! nibble the end closest to supply0. An unambiguous value has equal
//! nibbles; `0x00` is HiZ.

use std::fmt;

/// A four-state logic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bit4 {
    Zero = 0,
    One = 1,
    X = 2,
    Z = 3,
}

impl Bit4 {
    /// Decode the low two bits of `bits`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Bit4::Zero,
            1 => Bit4::One,
            2 => Bit4::X,
            _ => Bit4::Z,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// True for 0 and 1.
    #[inline]
    pub const fn is_known(self) -> bool {
        matches!(self, Bit4::Zero | Bit4::One)
    }

    /// Z becomes X; used wherever a gate samples an input.
    #[inline]
    pub const fn to_x(self) -> Self {
        match self {
            Bit4::Z => Bit4::X,
            v => v,
        }
    }

    #[inline]
    pub const fn not(self) -> Self {
        match self {
            Bit4::Zero => Bit4::One,
            Bit4::One => Bit4::Zero,
            _ => Bit4::X,
        }
    }

    #[inline]
    pub const fn and(self, other: Bit4) -> Self {
        match (self, other) {
            (Bit4::Zero, _) | (_, Bit4::Zero) => Bit4::Zero,
            (Bit4::One, Bit4::One) => Bit4::One,
            _ => Bit4::X,
        }
    }

    #[inline]
    pub const fn or(self, other: Bit4) -> Self {
        match (self, other) {
            (Bit4::One, _) | (_, Bit4::One) => Bit4::One,
            (Bit4::Zero, Bit4::Zero) => Bit4::Zero,
            _ => Bit4::X,
        }
    }

    #[inline]
    pub const fn xor(self, other: Bit4) -> Self {
        match (self, other) {
            (Bit4::Zero, Bit4::Zero) | (Bit4::One, Bit4::One) => Bit4::Zero,
            (Bit4::Zero, Bit4::One) | (Bit4::One, Bit4::Zero) => Bit4::One,
            _ => Bit4::X,
        }
    }

    pub const fn to_char(self) -> char {
        match self {
            Bit4::Zero => '0',
            Bit4::One => '1',
            Bit4::X => 'x',
            Bit4::Z => 'z',
        }
    }
}

impl From<bool> for Bit4 {
    fn from(b: bool) -> Self {
        if b {
            Bit4::One
        } else {
            Bit4::Zero
        }
    }
}

impl fmt::Display for Bit4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Drive strength level of a functor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Drive {
    HiZ = 0,
    Small = 1,
    Medium = 2,
    Weak = 3,
    Large = 4,
    Pull = 5,
    Strong = 6,
    Supply = 7,
}

impl Drive {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Drive::HiZ,
            1 => Drive::Small,
            2 => Drive::Medium,
            3 => Drive::Weak,
            4 => Drive::Large,
            5 => Drive::Pull,
            6 => Drive::Strong,
            _ => Drive::Supply,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Strength-aware value byte. See the module docs for the layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Strength(u8);

impl Strength {
    pub const HIZ: Strength = Strength(0x00);
    pub const SU0: Strength = Strength(0x77);
    pub const ST0: Strength = Strength(0x66);
    pub const PU0: Strength = Strength(0x55);
    pub const WE0: Strength = Strength(0x33);
    pub const SU1: Strength = Strength(0x77 | 0x88);
    pub const ST1: Strength = Strength(0x66 | 0x88);
    pub const PU1: Strength = Strength(0x55 | 0x88);
    pub const WE1: Strength = Strength(0x33 | 0x88);
    /// St0 - St1 contention.
    pub const STX: Strength = Strength(0x66 | 0x80);

    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        Strength(raw)
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Build from the supply1-side and supply0-side nibbles.
    #[inline]
    pub const fn from_nibbles(high: u8, low: u8) -> Self {
        Strength(((high & 0xf) << 4) | (low & 0xf))
    }

    /// Combine a logic value with configured drive levels.
    pub const fn from_drive(value: Bit4, drive0: Drive, drive1: Drive) -> Self {
        let d0 = drive0.bits();
        let d1 = drive1.bits();
        match value {
            Bit4::Zero => Strength(d0 | (d0 << 4)),
            Bit4::One => Strength(0x88 | d1 | (d1 << 4)),
            Bit4::X => Strength(0x80 | d0 | (d1 << 4)),
            Bit4::Z => Strength::HIZ,
        }
    }

    #[inline]
    pub const fn high(self) -> u8 {
        self.0 >> 4
    }

    #[inline]
    pub const fn low(self) -> u8 {
        self.0 & 0xf
    }

    #[inline]
    pub const fn is_hiz(self) -> bool {
        self.0 == 0
    }

    /// Both ends of the strength range are the same level and value.
    #[inline]
    pub const fn is_unambiguous(self) -> bool {
        self.high() == self.low()
    }

    /// The logic value a receiver reads from this strength.
    ///
    /// A range that reaches HiZ on one side only (the L and H values of a
    /// tristate with unknown enable) reads as X.
    pub const fn value(self) -> Bit4 {
        if self.0 == 0 {
            return Bit4::Z;
        }
        if self.high() & 7 == 0 || self.low() & 7 == 0 {
            return Bit4::X;
        }
        match (self.0 & 0x80 != 0, self.0 & 0x08 != 0) {
            (true, true) => Bit4::One,
            (false, false) => Bit4::Zero,
            _ => Bit4::X,
        }
    }

    /// Supply levels become strong; everything else passes unchanged.
    pub const fn reduce_switch(self) -> Self {
        const fn reduce(n: u8) -> u8 {
            if n & 7 == 7 {
                (n & 8) | 6
            } else {
                n
            }
        }
        Strength::from_nibbles(reduce(self.high()), reduce(self.low()))
    }

    /// Wired resolution of two drivers of the same net.
    pub fn resolve(self, other: Strength) -> Strength {
        let (a, b) = (self, other);
        if a.is_hiz() {
            return b;
        }
        if b.is_hiz() || a == b {
            return a;
        }
        match (a.is_unambiguous(), b.is_unambiguous()) {
            (true, true) => {
                let (la, lb) = (a.0 & 7, b.0 & 7);
                if la > lb {
                    a
                } else if lb > la {
                    b
                } else {
                    // Same level, opposite values.
                    Strength(0x80 | (la << 4) | la)
                }
            }
            (true, false) | (false, true) => {
                let high = stronger_nibble(a.high(), b.high(), true);
                let low = stronger_nibble(a.low(), b.low(), false);
                Strength::from_signed(signed(high), signed(low))
            }
            (false, false) => {
                let ends = [signed(a.high()), signed(a.low()), signed(b.high()), signed(b.low())];
                let top = ends.iter().copied().max().unwrap_or(0);
                let bottom = ends.iter().copied().min().unwrap_or(0);
                Strength::from_signed(top, bottom)
            }
        }
    }

    fn from_signed(a: i8, b: i8) -> Self {
        let (top, bottom) = if a >= b { (a, b) } else { (b, a) };
        Strength::from_nibbles(unsigned(top), unsigned(bottom))
    }
}

/// Signed position of a nibble on the -7 (Su0) .. +7 (Su1) scale.
fn signed(nibble: u8) -> i8 {
    let level = (nibble & 7) as i8;
    if nibble & 8 != 0 {
        level
    } else {
        -level
    }
}

fn unsigned(level: i8) -> u8 {
    if level > 0 {
        0x8 | level as u8
    } else {
        (-level) as u8
    }
}

/// Pick the stronger of two nibbles. On a level tie the one whose value
/// bit matches `prefer_one` wins, widening the range.
fn stronger_nibble(x: u8, y: u8, prefer_one: bool) -> u8 {
    match (x & 7).cmp(&(y & 7)) {
        std::cmp::Ordering::Greater => x,
        std::cmp::Ordering::Less => y,
        std::cmp::Ordering::Equal => {
            if (x & 8 != 0) == prefer_one {
                x
            } else {
                y
            }
        }
    }
}

const LEVEL_NAMES: [&str; 8] = ["Hz", "Sm", "Me", "We", "La", "Pu", "St", "Su"];

impl fmt::Debug for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strength({:#04x} {})", self.0, self)
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hiz() {
            return write!(f, "HiZ");
        }
        let (hl, ll) = ((self.high() & 7) as usize, (self.low() & 7) as usize);
        if self.is_unambiguous() {
            write!(f, "{}{}", LEVEL_NAMES[hl], self.value())
        } else if hl == ll {
            write!(f, "{}X", LEVEL_NAMES[hl])
        } else {
            write!(f, "{:02x}", self.0)
        }
    }
}
