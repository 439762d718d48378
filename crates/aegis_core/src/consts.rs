// crates/aegis_core/src/consts.rs

/// Serialized membership structure.
pub const MAGIC_BLOOM: &[u8; 4] = b"AEGB";
pub const BLOOM_VERSION: u16 = 1;

/// Persisted artifact envelope.
pub const ENVELOPE_FORMAT: &str = "aegis-bloom";
pub const ENVELOPE_VERSION: u32 = 1;
pub const ENVELOPE_ZSTD_LEVEL: i32 = 3;

/// Windows shorter than this (in chars) are dropped by the chunker.
pub const MIN_WINDOW: usize = 32;

pub const DEFAULT_EXPECTED_ITEMS: u64 = 10_000_000;
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;
pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CONSECUTIVE_CHUNKS: usize = 3;

/// Read size used when streaming a source through the chunker.
pub const READ_BUF_SIZE: usize = 1 << 20;

pub const FINGERPRINT_BYTES: usize = 32;

/// Corpus discovery patterns, relative to the corpus root.
pub const CORPUS_PATTERNS: &[&str] = &["**/*.txt", "**/*.md"];
