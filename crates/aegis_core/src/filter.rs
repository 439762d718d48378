//! Membership structure: word-packed Bloom filter with salted xxh3 probes.
//!
//! Serialized layout (LE):
//!   magic[4]   = "AEGB"
//!   version[2] = 1
//!   rsv[2]     = 0
//!   m[8]       = bit count
//!   k[4]       = probe count
//!   words[8]   = ceil(m / 64)
//!   words * u64 bit words (bit i lives in word i>>6, position i&63)
//!   crc32[4] over everything above

use crate::chunker::Fingerprint;
use crate::consts::{BLOOM_VERSION, MAGIC_BLOOM};
use crate::errors::{AegisError, Result};
use crate::utils::{crc32, read_u16, read_u32, read_u64};
use std::f64::consts::LN_2;
use std::io::{Cursor, Read};
use xxhash_rust::xxh3::xxh3_64_with_seed;

const HEADER_BYTES: usize = 4 + 2 + 2 + 8 + 4 + 8;
const CRC_BYTES: usize = 4;
/// Largest bit array accepted: 2^37 bits, 16 GiB of words.
pub const MAX_BITS: u64 = 1 << 37;

/// Capability interface of a set-membership structure over fingerprints.
///
/// The engine is generic over it; a different implementation is chosen by
/// type, never by a runtime flag.
pub trait MembershipFilter: Sized {
    /// Size a fresh, empty structure for `expected_items` at target rate `p`.
    fn with_rate(expected_items: u64, false_positive_rate: f64) -> Result<Self>;
    fn insert(&mut self, fp: &Fingerprint);
    /// `false` means definitely never inserted.
    fn contains(&self, fp: &Fingerprint) -> bool;
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// `(m, k)` for `n` expected items at false-positive rate `p`.
pub fn optimal_params(expected_items: u64, false_positive_rate: f64) -> Result<(u64, u32)> {
    if expected_items == 0 {
        return Err(AegisError::invalid("expected_items must be positive"));
    }
    let p = false_positive_rate;
    if !(p > 0.0 && p < 1.0) {
        return Err(AegisError::invalid(format!("false_positive_rate must be in (0, 1), got {p}")));
    }
    let n = expected_items as f64;
    let m = (-n * p.ln() / (LN_2 * LN_2)).ceil();
    if !m.is_finite() || m > MAX_BITS as f64 {
        return Err(AegisError::invalid(format!(
            "filter for {expected_items} items at rate {p} exceeds addressable size"
        )));
    }
    let m_bits = (m as u64).max(1);
    let k = ((m_bits as f64 / n) * LN_2).round().max(1.0) as u32;
    Ok((m_bits, k))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bloom {
    m_bits: u64,
    k: u32,
    words: Vec<u64>,
}

impl Bloom {
    /// Zeroed filter of `m_bits` bits. Fails instead of aborting when the
    /// array is over [`MAX_BITS`] or cannot be allocated.
    pub fn new(m_bits: u64, k: u32) -> Result<Self> {
        let m_bits = m_bits.max(1);
        if m_bits > MAX_BITS {
            return Err(AegisError::invalid(format!("{m_bits} bits exceeds the {MAX_BITS}-bit limit")));
        }
        let n_words = m_bits.div_ceil(64) as usize;
        let mut words = Vec::new();
        words
            .try_reserve_exact(n_words)
            .map_err(|e| AegisError::invalid(format!("cannot allocate {m_bits}-bit filter: {e}")))?;
        words.resize(n_words, 0u64);
        Ok(Self { m_bits, k: k.max(1), words })
    }

    pub fn bit_len(&self) -> u64 { self.m_bits }
    pub fn hash_count(&self) -> u32 { self.k }

    pub fn count_ones(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    pub fn fill_ratio(&self) -> f64 {
        self.count_ones() as f64 / self.m_bits as f64
    }

    /// Current per-item false-positive probability implied by the fill.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powi(self.k as i32)
    }

    #[inline]
    fn probe(&self, fp: &Fingerprint, i: u32) -> u64 {
        xxh3_64_with_seed(fp.as_bytes(), i as u64) % self.m_bits
    }

    #[inline]
    fn get(&self, bit: u64) -> bool {
        (self.words[(bit >> 6) as usize] >> (bit & 63)) & 1 == 1
    }

    #[inline]
    fn set(&mut self, bit: u64) {
        self.words[(bit >> 6) as usize] |= 1u64 << (bit & 63);
    }
}

impl MembershipFilter for Bloom {
    fn with_rate(expected_items: u64, false_positive_rate: f64) -> Result<Self> {
        let (m, k) = optimal_params(expected_items, false_positive_rate)?;
        Self::new(m, k)
    }

    fn insert(&mut self, fp: &Fingerprint) {
        for i in 0..self.k {
            let bit = self.probe(fp, i);
            self.set(bit);
        }
    }

    fn contains(&self, fp: &Fingerprint) -> bool {
        (0..self.k).all(|i| self.get(self.probe(fp, i)))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_BYTES + self.words.len() * 8 + CRC_BYTES);
        buf.extend_from_slice(MAGIC_BLOOM);
        buf.extend_from_slice(&BLOOM_VERSION.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&self.m_bits.to_le_bytes());
        buf.extend_from_slice(&self.k.to_le_bytes());
        buf.extend_from_slice(&(self.words.len() as u64).to_le_bytes());
        for w in &self.words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        let crc = crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES + CRC_BYTES {
            return Err(AegisError::corrupt("filter blob truncated"));
        }
        let (body, tail) = bytes.split_at(bytes.len() - CRC_BYTES);
        let want = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);

        let mut rdr = Cursor::new(body);
        let mut magic = [0u8; 4];
        rdr.read_exact(&mut magic)?;
        if &magic != MAGIC_BLOOM {
            return Err(AegisError::corrupt("bad filter magic"));
        }
        let version = read_u16(&mut rdr)?;
        if version != BLOOM_VERSION {
            return Err(AegisError::corrupt(format!("unsupported filter version {version}")));
        }
        let _rsv = read_u16(&mut rdr)?;
        let m_bits = read_u64(&mut rdr)?;
        let k = read_u32(&mut rdr)?;
        let n_words = read_u64(&mut rdr)?;
        if m_bits == 0 || k == 0 || m_bits > MAX_BITS {
            return Err(AegisError::corrupt(format!("bad filter parameters m={m_bits} k={k}")));
        }
        if n_words != m_bits.div_ceil(64) {
            return Err(AegisError::corrupt(format!("word count {n_words} does not match m={m_bits}")));
        }
        if (body.len() - HEADER_BYTES) as u64 != n_words * 8 {
            return Err(AegisError::corrupt("filter blob length mismatch"));
        }
        if crc32(body) != want {
            return Err(AegisError::corrupt("filter checksum mismatch"));
        }

        let mut words = Vec::with_capacity(n_words as usize);
        for _ in 0..n_words {
            words.push(read_u64(&mut rdr)?);
        }
        let tail_bits = m_bits % 64;
        if tail_bits != 0 {
            let last = words.last().copied().unwrap_or(0);
            if last >> tail_bits != 0 {
                return Err(AegisError::corrupt("bits set beyond filter length"));
            }
        }
        Ok(Self { m_bits, k, words })
    }
}
