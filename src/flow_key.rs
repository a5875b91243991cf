// MIT License
//
// Copyright (c) 2026 Raja Lehtihet & Wael El Oraiby
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
//! Flow-key value types: fixed-size, value-semantic flow identifiers.
//!
//! A [`FlowKey`] is the closed capability set every sketch in this crate is
//! written against: equality, total order, componentwise XOR, a fixed-size
//! byte view, and a zero (additive-identity) value. There are exactly three
//! concrete key widths, [`OneTuple`], [`TwoTuple`], [`FiveTuple`], and no
//! sketch needs runtime polymorphism over keys within one instance.

use std::fmt;
use std::hash::Hash;
use std::ops::BitXor;

/// Capability set required of every flow-key type used by a sketch.
///
/// `Bytes` is the canonical, padding-zeroed, host-endian byte view; its
/// length is fixed per concrete key type (4, 8, 16 bytes respectively) and
/// is what the hash family (see [`crate::hash`]) folds into its input image.
pub trait FlowKey:
    Copy + Clone + Eq + Ord + Default + Hash + fmt::Debug + Send + Sync + BitXor<Output = Self> + 'static
{
    /// Fixed-size byte view, e.g. `[u8; 4]`, `[u8; 8]`, `[u8; 16]`.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Copy + Send + Sync;

    /// Returns the canonical, host-endian byte view of this key.
    ///
    /// Any padding bytes are zeroed, so that byte-view equality agrees with
    /// `PartialEq`.
    fn to_bytes(&self) -> Self::Bytes;

    /// Reconstructs a key from its canonical byte view (the inverse of
    /// [`FlowKey::to_bytes`]). Any padding bytes are ignored.
    fn from_bytes(bytes: Self::Bytes) -> Self;
}

/// Single-field flow identifier, e.g. one IP address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OneTuple {
    pub ip: u32,
}

impl OneTuple {
    /// Builds a key from a raw address.
    pub fn new(ip: u32) -> Self {
        Self { ip }
    }
}

impl BitXor for OneTuple {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self { ip: self.ip ^ rhs.ip }
    }
}

impl FlowKey for OneTuple {
    type Bytes = [u8; 4];

    fn to_bytes(&self) -> Self::Bytes {
        self.ip.to_ne_bytes()
    }

    fn from_bytes(bytes: Self::Bytes) -> Self {
        Self { ip: u32::from_ne_bytes(bytes) }
    }
}

/// Two-field flow identifier, e.g. source and destination IP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TwoTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
}

impl TwoTuple {
    /// Builds a key from a source/destination address pair.
    pub fn new(src_ip: u32, dst_ip: u32) -> Self {
        Self { src_ip, dst_ip }
    }
}

impl BitXor for TwoTuple {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self {
            src_ip: self.src_ip ^ rhs.src_ip,
            dst_ip: self.dst_ip ^ rhs.dst_ip,
        }
    }
}

impl FlowKey for TwoTuple {
    type Bytes = [u8; 8];

    fn to_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&self.src_ip.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.dst_ip.to_ne_bytes());
        bytes
    }

    fn from_bytes(bytes: Self::Bytes) -> Self {
        Self {
            src_ip: u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
            dst_ip: u32::from_ne_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}

/// Full five-field flow identifier: src/dst address, src/dst port, protocol.
///
/// `padding` exists purely to make the byte view 8-byte friendly for the
/// shared-memory/wire layout in [`crate::counter_matrix`]; it is always
/// zero and excluded from equality and ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiveTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    padding: [u8; 3],
}

impl FiveTuple {
    /// Builds a key from the usual five fields; padding is always zeroed.
    pub fn new(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
            padding: [0; 3],
        }
    }
}

impl PartialEq for FiveTuple {
    fn eq(&self, other: &Self) -> bool {
        self.src_ip == other.src_ip
            && self.dst_ip == other.dst_ip
            && self.src_port == other.src_port
            && self.dst_port == other.dst_port
            && self.protocol == other.protocol
    }
}
impl Eq for FiveTuple {}

impl PartialOrd for FiveTuple {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FiveTuple {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.src_ip
            .cmp(&other.src_ip)
            .then_with(|| self.dst_ip.cmp(&other.dst_ip))
            .then_with(|| self.src_port.cmp(&other.src_port))
            .then_with(|| self.dst_port.cmp(&other.dst_port))
            .then_with(|| self.protocol.cmp(&other.protocol))
    }
}

impl Hash for FiveTuple {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.src_ip.hash(state);
        self.dst_ip.hash(state);
        self.src_port.hash(state);
        self.dst_port.hash(state);
        self.protocol.hash(state);
    }
}

impl BitXor for FiveTuple {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self {
            src_ip: self.src_ip ^ rhs.src_ip,
            dst_ip: self.dst_ip ^ rhs.dst_ip,
            src_port: self.src_port ^ rhs.src_port,
            dst_port: self.dst_port ^ rhs.dst_port,
            protocol: self.protocol ^ rhs.protocol,
            padding: [0; 3],
        }
    }
}

impl FlowKey for FiveTuple {
    type Bytes = [u8; 16];

    fn to_bytes(&self) -> Self::Bytes {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.src_ip.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.dst_ip.to_ne_bytes());
        bytes[8..10].copy_from_slice(&self.src_port.to_ne_bytes());
        bytes[10..12].copy_from_slice(&self.dst_port.to_ne_bytes());
        bytes[12] = self.protocol;
        // bytes[13..16] stay zero: the padding.
        bytes
    }

    fn from_bytes(bytes: Self::Bytes) -> Self {
        Self {
            src_ip: u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
            dst_ip: u32::from_ne_bytes(bytes[4..8].try_into().unwrap()),
            src_port: u16::from_ne_bytes(bytes[8..10].try_into().unwrap()),
            dst_port: u16::from_ne_bytes(bytes[10..12].try_into().unwrap()),
            protocol: bytes[12],
            padding: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_view_sizes_match_spec() {
        assert_eq!(std::mem::size_of::<<OneTuple as FlowKey>::Bytes>(), 4);
        assert_eq!(std::mem::size_of::<<TwoTuple as FlowKey>::Bytes>(), 8);
        assert_eq!(std::mem::size_of::<<FiveTuple as FlowKey>::Bytes>(), 16);
    }

    #[test]
    fn zero_key_is_default_and_additive_identity() {
        let k = TwoTuple::new(11, 22);
        assert_eq!(k ^ TwoTuple::default(), k);
        assert_eq!(TwoTuple::default(), TwoTuple::default() ^ TwoTuple::default());
    }

    #[test]
    fn xor_is_self_inverse_and_associative() {
        let a = FiveTuple::new(1, 2, 3, 4, 5);
        let b = FiveTuple::new(9, 8, 7, 6, 5);
        let c = FiveTuple::new(42, 24, 1, 1, 1);

        assert_eq!(a ^ b ^ b, a);
        assert_eq!((a ^ b) ^ c, a ^ (b ^ c));
    }

    #[test]
    fn padding_is_zeroed_and_excluded_from_equality() {
        let a = FiveTuple::new(1, 2, 3, 4, 5);
        let b = FiveTuple::new(1, 2, 3, 4, 5);
        assert_eq!(a, b);
        assert_eq!(a.to_bytes()[13..16], [0, 0, 0]);
    }

    #[test]
    fn from_bytes_inverts_to_bytes() {
        let a = FiveTuple::new(1, 2, 3, 4, 5);
        assert_eq!(FiveTuple::from_bytes(a.to_bytes()), a);

        let t = TwoTuple::new(0xdead, 0xbeef);
        assert_eq!(TwoTuple::from_bytes(t.to_bytes()), t);

        let o = OneTuple::new(77);
        assert_eq!(OneTuple::from_bytes(o.to_bytes()), o);
    }

    #[test]
    fn ordering_is_lexicographic_over_declared_fields() {
        let a = TwoTuple::new(1, 100);
        let b = TwoTuple::new(2, 0);
        assert!(a < b);

        let c = TwoTuple::new(1, 5);
        assert!(c < a);
    }
}
