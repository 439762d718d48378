//! Persisted artifact: zstd-compressed JSON envelope.
//!
//! ```text
//! zstd( {
//!   "format": "aegis-bloom", "version": 1,
//!   "metadata": { expected_items, false_positive_rate, chunk_size,
//!                 consecutive_chunks, items_added, sources_added, digest, created_at? },
//!   "filter_data": hex(serialized membership structure)
//! } )
//! ```
//!
//! Files are written to a temp file in the target directory and atomically
//! renamed into place; reads go through a read-only mmap.

use crate::chunker::FingerprintAlgo;
use crate::config::FilterConfig;
use crate::consts::{ENVELOPE_FORMAT, ENVELOPE_VERSION, ENVELOPE_ZSTD_LEVEL};
use crate::errors::{AegisError, Result};
use crate::filter::{MembershipFilter, MAX_BITS};
use crate::utils::{fsync_dir, now_rfc3339};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Build parameters plus running counters, stored next to the bit array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterMetadata {
    pub expected_items: u64,
    pub false_positive_rate: f64,
    pub chunk_size: usize,
    pub consecutive_chunks: usize,
    pub items_added: u64,
    #[serde(default)]
    pub sources_added: u64,
    #[serde(default)]
    pub digest: FingerprintAlgo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl FilterMetadata {
    pub fn from_config(cfg: &FilterConfig) -> Self {
        Self {
            expected_items: cfg.expected_items,
            false_positive_rate: cfg.false_positive_rate,
            chunk_size: cfg.chunk_size,
            consecutive_chunks: cfg.consecutive_chunks,
            items_added: 0,
            sources_added: 0,
            digest: cfg.digest,
            created_at: now_rfc3339(),
        }
    }

    pub fn config(&self) -> FilterConfig {
        FilterConfig {
            expected_items: self.expected_items,
            false_positive_rate: self.false_positive_rate,
            chunk_size: self.chunk_size,
            consecutive_chunks: self.consecutive_chunks,
            digest: self.digest,
        }
    }
}

/// Decompressed size limit: the hex of the largest accepted bit array plus
/// room for framing and metadata.
const MAX_ENVELOPE_JSON: u64 = MAX_BITS / 4 + (1 << 16);

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    metadata: FilterMetadata,
    filter_data: String,
}

pub fn encode<F: MembershipFilter>(filter: &F, metadata: &FilterMetadata) -> Result<Vec<u8>> {
    let env = Envelope {
        format: ENVELOPE_FORMAT.to_string(),
        version: ENVELOPE_VERSION,
        metadata: metadata.clone(),
        filter_data: hex::encode(filter.to_bytes()),
    };
    let json = serde_json::to_vec(&env)?;
    Ok(zstd::stream::encode_all(&json[..], ENVELOPE_ZSTD_LEVEL)?)
}

pub fn decode<F: MembershipFilter>(bytes: &[u8]) -> Result<(F, FilterMetadata)> {
    let json = decompress_bounded(bytes, MAX_ENVELOPE_JSON)?;
    let env: Envelope = serde_json::from_slice(&json)
        .map_err(|e| AegisError::corrupt(format!("envelope: {e}")))?;
    if env.format != ENVELOPE_FORMAT {
        return Err(AegisError::corrupt(format!("unknown format {:?}", env.format)));
    }
    if env.version != ENVELOPE_VERSION {
        return Err(AegisError::corrupt(format!("unsupported envelope version {}", env.version)));
    }
    env.metadata
        .config()
        .validate()
        .map_err(|e| AegisError::corrupt(format!("metadata: {e}")))?;
    let blob = hex::decode(&env.filter_data)
        .map_err(|e| AegisError::corrupt(format!("filter_data: {e}")))?;
    let filter = F::from_bytes(&blob)?;
    Ok((filter, env.metadata))
}

fn decompress_bounded(bytes: &[u8], limit: u64) -> Result<Vec<u8>> {
    let decoder = zstd::stream::read::Decoder::new(bytes)
        .map_err(|e| AegisError::corrupt(format!("decompress: {e}")))?;
    let mut json = Vec::new();
    decoder
        .take(limit + 1)
        .read_to_end(&mut json)
        .map_err(|e| AegisError::corrupt(format!("decompress: {e}")))?;
    if json.len() as u64 > limit {
        return Err(AegisError::corrupt(format!("envelope expands past {limit} bytes")));
    }
    Ok(json)
}

/// Encode and atomically publish at `path`.
pub fn save_to_path<F: MembershipFilter>(
    path: impl AsRef<Path>,
    filter: &F,
    metadata: &FilterMetadata,
) -> Result<PathBuf> {
    let path_final = path.as_ref().to_path_buf();
    let bytes = encode(filter, metadata)?;
    let dir = match path_final.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new().prefix(".aegis_").tempfile_in(dir)?;
    tmp.as_file_mut().write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path_final)?;
    let _ = fsync_dir(&path_final);
    tracing::debug!(path = %path_final.display(), bytes = bytes.len(), "artifact written");
    Ok(path_final)
}

pub fn load_from_path<F: MembershipFilter>(path: impl AsRef<Path>) -> Result<(F, FilterMetadata)> {
    let f = File::open(path.as_ref())?;
    if f.metadata()?.len() == 0 {
        return Err(AegisError::corrupt("artifact is empty"));
    }
    let mmap = unsafe { Mmap::map(&f)? };
    decode(&mmap[..])
}
