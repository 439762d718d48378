//! Corpus discovery and incremental text decoding.

use crate::consts::{CORPUS_PATTERNS, READ_BUF_SIZE};
use crate::errors::{AegisError, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Text sources found under a corpus root.
#[derive(Debug, Clone, Default)]
pub struct CorpusFiles {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
}

impl CorpusFiles {
    /// Expected chunk count for sizing: two overlapping windows per
    /// `chunk_size` bytes, at least 1.
    pub fn estimated_chunks(&self, chunk_size: usize) -> u64 {
        let chunk_size = chunk_size.max(1) as u64;
        ((self.total_bytes / chunk_size) * 2).max(1)
    }

    pub fn is_empty(&self) -> bool { self.files.is_empty() }
    pub fn len(&self) -> usize { self.files.len() }
}

/// Recursively collect `*.txt` and `*.md` files under `dir`, sorted.
pub fn discover(dir: impl AsRef<Path>) -> Result<CorpusFiles> {
    let root = dir.as_ref().to_path_buf();
    if !root.is_dir() {
        return Err(AegisError::MissingCorpus(root));
    }
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();
    for pattern in CORPUS_PATTERNS {
        let full = format!("{escaped}/{pattern}");
        let paths = glob::glob(&full)
            .map_err(|e| AegisError::invalid(format!("bad corpus pattern {full}: {e}")))?;
        for entry in paths {
            match entry {
                Ok(p) if p.is_file() => files.push(p),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unreadable corpus entry"),
            }
        }
    }
    files.sort();
    files.dedup();

    let total_bytes = files
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();
    tracing::debug!(root = %root.display(), files = files.len(), total_bytes, "corpus discovered");
    Ok(CorpusFiles { root, files, total_bytes })
}

/// Decode `reader` as UTF-8 in bounded reads, handing each decoded piece to
/// `on_piece`. Sequences split across reads are reassembled; invalid bytes
/// become U+FFFD, the same as `String::from_utf8_lossy` over the whole input.
/// Returns the number of bytes read.
pub fn read_text<R: Read, F: FnMut(&str)>(mut reader: R, mut on_piece: F) -> io::Result<u64> {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut carry: Vec<u8> = Vec::new();
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        total += n as u64;
        carry.extend_from_slice(&buf[..n]);
        let used = decode_prefix(&carry, false, &mut on_piece);
        carry.drain(..used);
    }
    if !carry.is_empty() {
        decode_prefix(&carry, true, &mut on_piece);
    }
    Ok(total)
}

/// Emit the decodable prefix of `bytes`; returns how many bytes were used.
/// Without `eof`, an incomplete trailing sequence is left unconsumed.
fn decode_prefix<F: FnMut(&str)>(bytes: &[u8], eof: bool, on_piece: &mut F) -> usize {
    let mut rest = bytes;
    let mut used = 0usize;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                if !s.is_empty() {
                    on_piece(s);
                }
                return used + rest.len();
            }
            Err(e) => {
                let valid = e.valid_up_to();
                if let Ok(s) = std::str::from_utf8(&rest[..valid]) {
                    if !s.is_empty() {
                        on_piece(s);
                    }
                }
                match e.error_len() {
                    Some(bad) => {
                        on_piece("\u{FFFD}");
                        rest = &rest[valid + bad..];
                        used += valid + bad;
                    }
                    None if eof => {
                        on_piece("\u{FFFD}");
                        return used + rest.len();
                    }
                    None => return used + valid,
                }
            }
        }
    }
}
