pub mod consts;
pub mod errors;
pub mod utils;
pub mod chunker;
pub mod filter;
pub mod decision;
pub mod config;
pub mod envelope;
pub mod corpus;
pub mod engine;

pub use chunker::{ChunkStream, Chunker, Fingerprint, FingerprintAlgo};
pub use config::FilterConfig;
pub use corpus::{discover, CorpusFiles};
pub use decision::{evaluate, Verdict};
pub use engine::{BuildReport, CorpusFilter, SharedCorpusFilter};
pub use envelope::FilterMetadata;
pub use errors::{AegisError, Result};
pub use filter::{optimal_params, Bloom, MembershipFilter};
