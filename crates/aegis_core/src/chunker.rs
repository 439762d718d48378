//! Overlapping window chunker.
//!
//! Text is cut into windows of `chunk_size` chars advancing by
//! `chunk_size / 2`; each window of at least [`MIN_WINDOW`] chars is reduced
//! to a 256-bit fingerprint of its UTF-8 bytes. [`ChunkStream`] produces the
//! same sequence when the text arrives in pieces.

use crate::consts::{FINGERPRINT_BYTES, MIN_WINDOW};
use crate::errors::{AegisError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest used to fingerprint windows. Recorded in artifact metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgo {
    #[default]
    Sha256,
    Blake3,
}

impl FingerprintAlgo {
    pub fn digest(self, data: &[u8]) -> Fingerprint {
        match self {
            FingerprintAlgo::Sha256 => Fingerprint(Sha256::digest(data).into()),
            FingerprintAlgo::Blake3 => Fingerprint(*blake3::hash(data).as_bytes()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FingerprintAlgo::Sha256 => "sha256",
            FingerprintAlgo::Blake3 => "blake3",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] { &self.0 }

    pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    stride: usize,
    algo: FingerprintAlgo,
}

impl Chunker {
    pub fn new(chunk_size: usize, algo: FingerprintAlgo) -> Result<Self> {
        if chunk_size < MIN_WINDOW {
            return Err(AegisError::invalid(format!(
                "chunk_size must be at least {MIN_WINDOW}, got {chunk_size}"
            )));
        }
        Ok(Self { chunk_size, stride: chunk_size / 2, algo })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn stride(&self) -> usize { self.stride }
    pub fn algo(&self) -> FingerprintAlgo { self.algo }

    #[inline]
    pub fn fingerprint(&self, window: &str) -> Fingerprint {
        self.algo.digest(window.as_bytes())
    }

    /// Fingerprints of every retained window, in input order.
    pub fn chunk(&self, text: &str) -> Vec<Fingerprint> {
        let mut out = Vec::with_capacity(self.window_count(text.chars().count()));
        let mut stream = self.stream();
        stream.feed(text, |fp| out.push(fp));
        stream.finish(|fp| out.push(fp));
        out
    }

    /// Number of windows `chunk` yields for a text of `n_chars` chars.
    pub fn window_count(&self, n_chars: usize) -> usize {
        if n_chars < MIN_WINDOW { 0 } else { (n_chars - MIN_WINDOW) / self.stride + 1 }
    }

    pub fn stream(&self) -> ChunkStream {
        ChunkStream { chunker: *self, buf: String::new(), cursor: 0 }
    }
}

/// Incremental chunker. Windows spanning a piece boundary are held back
/// until enough text arrives, so `feed`* + `finish` over any split of a text
/// equals [`Chunker::chunk`] over the whole of it.
#[derive(Debug, Clone)]
pub struct ChunkStream {
    chunker: Chunker,
    buf: String,
    // byte offset in `buf` of the next window start
    cursor: usize,
}

impl ChunkStream {
    /// Append a piece and emit every window that is now complete.
    pub fn feed<F: FnMut(Fingerprint)>(&mut self, piece: &str, mut emit: F) {
        if self.cursor > 0 {
            self.buf.drain(..self.cursor);
            self.cursor = 0;
        }
        self.buf.push_str(piece);
        loop {
            let pending = &self.buf[self.cursor..];
            let Some(end) = char_boundary(pending, self.chunker.chunk_size) else { break };
            emit(self.chunker.fingerprint(&pending[..end]));
            // stride < chunk_size, so the boundary exists
            self.cursor += char_boundary(pending, self.chunker.stride).unwrap_or(end);
        }
    }

    /// Emit the trailing partial windows and consume the stream.
    pub fn finish<F: FnMut(Fingerprint)>(self, mut emit: F) {
        let mut pending = &self.buf[self.cursor..];
        while !pending.is_empty() {
            if pending.chars().count() < MIN_WINDOW {
                break;
            }
            emit(self.chunker.fingerprint(pending));
            match char_boundary(pending, self.chunker.stride) {
                Some(step) => pending = &pending[step..],
                None => break,
            }
        }
    }

    /// Bytes held back waiting for more input.
    pub fn pending_len(&self) -> usize { self.buf.len() - self.cursor }
}

/// Byte offset just past the first `n` chars of `s`, `None` if `s` is shorter.
#[inline]
fn char_boundary(s: &str, n: usize) -> Option<usize> {
    s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len())).nth(n)
}
