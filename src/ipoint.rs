// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Signal handles.
//!
//! An [`Ipoint`] is a 32-bit value. The low 2 bits select the port of the
//! referenced functor and the remaining 30 bits index the functor itself,
//! so one handle identifies any input of any functor. The raw value 0 is
//! the null handle; functor index 0 is never allocated.

use std::fmt;

/// Number of low bits holding the port number.
pub const PORT_BITS: u32 = 2;

/// Number of input ports on a functor.
pub const NUM_PORTS: usize = 1 << PORT_BITS;

/// Largest functor index representable in a handle.
pub const MAX_INDEX: u32 = (1 << (32 - PORT_BITS)) - 1;

/// Handle of one port of one functor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Ipoint(u32);

impl Ipoint {
    /// The "no connection" handle.
    pub const NULL: Ipoint = Ipoint(0);

    /// Build a handle from a functor index and a port number (0..=3).
    #[inline]
    pub const fn new(index: u32, port: u32) -> Self {
        assert!(port < NUM_PORTS as u32, "port number out of range");
        assert!(index <= MAX_INDEX, "functor index out of range");
        Ipoint((index << PORT_BITS) | port)
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Ipoint(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index of the referenced functor.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 >> PORT_BITS
    }

    /// Port number of the referenced functor.
    #[inline]
    pub const fn port(self) -> u32 {
        self.0 & (NUM_PORTS as u32 - 1)
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Same functor, different port.
    #[inline]
    pub const fn with_port(self, port: u32) -> Self {
        Ipoint::new(self.index(), port)
    }

    /// The handle `n` functors further along, keeping the port.
    ///
    /// Used to address members of a contiguous run returned by
    /// [`FunctorSpace::allocate`](crate::space::FunctorSpace::allocate).
    #[inline]
    pub const fn offset(self, n: u32) -> Self {
        Ipoint::new(self.index() + n, self.port())
    }
}

impl fmt::Debug for Ipoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Ipoint(null)")
        } else {
            write!(f, "Ipoint({}.{})", self.index(), self.port())
        }
    }
}

impl fmt::Display for Ipoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index(), self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        for &index in &[1u32, 2, 1023, 1024, 1025, 0x12345, MAX_INDEX] {
            for port in 0..4 {
                let p = Ipoint::new(index, port);
                assert_eq!(p.index(), index);
                assert_eq!(p.port(), port);
                assert_eq!(Ipoint::new(p.index(), p.port()), p);
                assert_eq!(Ipoint::from_raw(p.raw()), p);
            }
        }
    }

    #[test]
    fn test_raw_layout() {
        let p = Ipoint::new(5, 3);
        assert_eq!(p.raw(), 5 * 4 + 3);
        assert!(!p.is_null());
        assert!(Ipoint::NULL.is_null());
        assert_eq!(Ipoint::default(), Ipoint::NULL);
    }

    #[test]
    fn test_offset_and_with_port() {
        let base = Ipoint::new(10, 0);
        assert_eq!(base.offset(3), Ipoint::new(13, 0));
        assert_eq!(base.with_port(2).offset(1), Ipoint::new(11, 2));
        assert_eq!(base.with_port(1).with_port(0), base);
    }

    #[test]
    #[should_panic(expected = "port number out of range")]
    fn test_bad_port_panics() {
        let _ = Ipoint::new(1, 4);
    }
}
