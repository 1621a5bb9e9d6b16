//! Payload generation for write benchmarks.
//!
//! A payload is built once per size, before any timing starts, and the same
//! bytes are written in every trial of a run.

use clap::ValueEnum;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Byte pattern used to fill a payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PayloadPattern {
    /// `byte[i] = i & 0xFF`.
    #[default]
    Counter,
    /// All zero bytes.
    Zeros,
    /// ChaCha8 stream seeded from the run seed.
    Random,
}

impl PayloadPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadPattern::Counter => "counter",
            PayloadPattern::Zeros => "zeros",
            PayloadPattern::Random => "random",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    bytes: Box<[u8]>,
    pattern: PayloadPattern,
}

impl Payload {
    pub fn generate(size: usize, pattern: PayloadPattern, seed: u64) -> Self {
        let bytes: Box<[u8]> = match pattern {
            PayloadPattern::Counter => (0..size).map(|i| (i & 0xFF) as u8).collect(),
            PayloadPattern::Zeros => vec![0u8; size].into_boxed_slice(),
            PayloadPattern::Random => {
                let mut buf = vec![0u8; size];
                ChaCha8Rng::seed_from_u64(per_size_seed(seed, size)).fill_bytes(&mut buf);
                buf.into_boxed_slice()
            }
        };
        Self { bytes, pattern }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn pattern(&self) -> PayloadPattern {
        self.pattern
    }

    /// Lowercase hex SHA-256 of the payload.
    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut s = String::with_capacity(64);
    for b in digest.iter() {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

// Different sizes get unrelated streams for the same run seed.
fn per_size_seed(master_seed: u64, size: usize) -> u64 {
    master_seed
        .wrapping_add(size as u64)
        .wrapping_mul(0x517cc1b727220a95)
}
