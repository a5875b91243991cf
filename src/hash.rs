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
//! The hash family: `H(key, seed_index, modulus) -> [0, modulus)`.
//!
//! Every sketch is parametric over a [`HashFamily`] implementation. Four
//! interchangeable families are provided; all share the same input-image
//! construction (flow-key bytes, zero-padded to an 8-byte boundary, followed
//! by an 8-byte seed prime) so swapping one for another only changes the
//! underlying digest, never the contract.

use std::hash::Hasher;
use std::io::Cursor;
use std::sync::OnceLock;

use crate::flow_key::FlowKey;

/// Number of entries in the seed table; `seed_index` wraps modulo this.
pub const SEED_TABLE_SIZE: usize = 10_000;

/// Returns the `seed_index`-th seed prime, wrapping modulo [`SEED_TABLE_SIZE`].
///
/// The table is the first [`SEED_TABLE_SIZE`] primes, generated once with a
/// trial-division sieve and cached for the life of the process. Treating
/// "the first N primes" as the frozen artifact (rather than an embedded
/// literal table) keeps it a pure, reproducible function of its position.
pub fn seed_prime(seed_index: u64) -> u64 {
    seed_table()[(seed_index as usize) % SEED_TABLE_SIZE]
}

fn seed_table() -> &'static [u64] {
    static TABLE: OnceLock<Vec<u64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut primes = Vec::with_capacity(SEED_TABLE_SIZE);
        let mut candidate = 2u64;
        while primes.len() < SEED_TABLE_SIZE {
            if is_prime(candidate, &primes) {
                primes.push(candidate);
            }
            candidate += 1;
        }
        primes
    })
}

fn is_prime(n: u64, known_primes: &[u64]) -> bool {
    if n < 2 {
        return false;
    }
    for &p in known_primes {
        if p.saturating_mul(p) > n {
            break;
        }
        if n % p == 0 {
            return false;
        }
    }
    true
}

/// Builds the deterministic, padding-free input image for one hash call:
/// the key's byte view, zero-padded to an 8-byte boundary, followed by the
/// seed prime as 8 host-order bytes. Returns a stack buffer and its used
/// length (no heap allocation on the hot path).
fn input_image<K: FlowKey>(key: &K, prime: u64) -> ([u8; 32], usize) {
    let view = key.to_bytes();
    let raw = view.as_ref();
    debug_assert!(raw.len() <= 16, "flow-key byte view exceeds 16 bytes");

    let padded_len = raw.len().div_ceil(8) * 8;
    let mut buf = [0u8; 32];
    buf[..raw.len()].copy_from_slice(raw);
    buf[padded_len..padded_len + 8].copy_from_slice(&prime.to_ne_bytes());
    (buf, padded_len + 8)
}

/// A pure, deterministic, seeded hash family over flow keys.
///
/// Implementations are injected at sketch construction (`H: HashFamily`
/// generic parameter) and cloned into sub-components by composite sketches
/// (Elastic, UnivMon, SketchLearn, FlowRadar). `Clone` is cheap: every
/// implementation in this crate is a stateless unit struct.
pub trait HashFamily: Clone + Default + Send + Sync + 'static {
    /// Returns a value in `[0, modulus)` for `key`, independent across
    /// distinct `seed_index` values (treated as independent hash functions
    /// for analysis purposes).
    ///
    /// # Panics
    /// Panics if `modulus` is zero.
    fn hash<K: FlowKey>(&self, key: &K, seed_index: u64, modulus: u64) -> u64;
}

/// CRC32-based hash family (BMv2-compatible polynomial). The default: the
/// cheapest per-packet cost of the four families.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Hash;

impl HashFamily for Crc32Hash {
    fn hash<K: FlowKey>(&self, key: &K, seed_index: u64, modulus: u64) -> u64 {
        assert!(modulus > 0, "modulus must be nonzero");
        let prime = seed_prime(seed_index);
        let (buf, len) = input_image(key, prime);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf[..len]);
        (hasher.finalize() as u64) % modulus
    }
}

/// CRC64-based hash family (CRC-64/XZ polynomial).
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc64Hash;

impl HashFamily for Crc64Hash {
    fn hash<K: FlowKey>(&self, key: &K, seed_index: u64, modulus: u64) -> u64 {
        assert!(modulus > 0, "modulus must be nonzero");
        let prime = seed_prime(seed_index);
        let (buf, len) = input_image(key, prime);
        let mut digest = crc64fast::Digest::new();
        digest.write(&buf[..len]);
        digest.sum64() % modulus
    }
}

/// MurmurHash3 (x64, 128-bit) folded to 64 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MurmurHash;

impl HashFamily for MurmurHash {
    fn hash<K: FlowKey>(&self, key: &K, seed_index: u64, modulus: u64) -> u64 {
        assert!(modulus > 0, "modulus must be nonzero");
        let prime = seed_prime(seed_index);
        let (buf, len) = input_image(key, prime);
        let mut cursor = Cursor::new(&buf[..len]);
        let hash128 =
            murmur3::murmur3_x64_128(&mut cursor, prime as u32).expect("hashing an in-memory buffer cannot fail");
        let folded = ((hash128 >> 64) as u64) ^ (hash128 as u64);
        folded % modulus
    }
}

/// `XxHash64`, standing in for the original's SpookyV2 as the fourth
/// independent, non-cryptographic 64-bit family (see `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy, Default)]
pub struct XxHash;

impl HashFamily for XxHash {
    fn hash<K: FlowKey>(&self, key: &K, seed_index: u64, modulus: u64) -> u64 {
        assert!(modulus > 0, "modulus must be nonzero");
        let prime = seed_prime(seed_index);
        let (buf, len) = input_image(key, prime);
        let mut hasher = twox_hash::XxHash64::with_seed(prime);
        hasher.write(&buf[..len]);
        hasher.finish() % modulus
    }
}

/// The default hash family used when a sketch is built without specifying
/// one explicitly.
pub type DefaultHashFamily = Crc32Hash;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_key::TwoTuple;

    #[test]
    fn seed_table_has_at_least_ten_thousand_entries_and_only_primes() {
        let table = seed_table();
        assert!(table.len() >= SEED_TABLE_SIZE);
        assert_eq!(table[0], 2);
        assert_eq!(table[1], 3);
        assert_eq!(table[2], 5);

        let mut seen = Vec::new();
        for &p in table.iter().take(200) {
            assert!(is_prime(p, &seen), "{p} should be prime");
            seen.push(p);
        }
    }

    #[test]
    fn seed_index_wraps_modulo_table_size() {
        assert_eq!(seed_prime(0), seed_prime(SEED_TABLE_SIZE as u64));
    }

    #[test]
    fn hash_is_pure_and_deterministic() {
        let key = TwoTuple::new(10, 20);
        let a = Crc32Hash.hash(&key, 3, 1024);
        let b = Crc32Hash.hash(&key, 3, 1024);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_bounded_by_modulus() {
        let key = TwoTuple::new(0xDEAD, 0xBEEF);
        for family_name in 0..4 {
            for seed in 0..16u64 {
                let value = match family_name {
                    0 => Crc32Hash.hash(&key, seed, 97),
                    1 => Crc64Hash.hash(&key, seed, 97),
                    2 => MurmurHash.hash(&key, seed, 97),
                    _ => XxHash.hash(&key, seed, 97),
                };
                assert!(value < 97);
            }
        }
    }

    #[test]
    fn distinct_seeds_behave_independently() {
        let key = TwoTuple::new(1, 2);
        let h0 = Crc32Hash.hash(&key, 0, 1 << 20);
        let h1 = Crc32Hash.hash(&key, 1, 1 << 20);
        assert_ne!(h0, h1);
    }

    #[test]
    fn all_four_families_satisfy_the_same_contract() {
        let key = TwoTuple::new(7, 8);
        let values = [
            Crc32Hash.hash(&key, 5, 1000),
            Crc64Hash.hash(&key, 5, 1000),
            MurmurHash.hash(&key, 5, 1000),
            XxHash.hash(&key, 5, 1000),
        ];
        for v in values {
            assert!(v < 1000);
        }
    }
}
