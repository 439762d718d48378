use crate::chunker::{Chunker, Fingerprint};
use crate::config::FilterConfig;
use crate::corpus::{discover, read_text, CorpusFiles};
use crate::decision::{evaluate, Verdict};
use crate::envelope::{self, FilterMetadata};
use crate::errors::{AegisError, Result};
use crate::filter::{Bloom, MembershipFilter};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Handle for sharing one filter across threads: inserts take the write
/// lock, queries the read lock.
pub type SharedCorpusFilter<F = Bloom> = Arc<RwLock<CorpusFilter<F>>>;

/// Outcome of a best-effort multi-source build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub sources_seen: usize,
    pub sources_added: usize,
    pub sources_skipped: usize,
    pub chunks_added: u64,
}

/// Chunker + membership structure + metadata: build from text, query text,
/// persist and reload.
///
/// The membership implementation is a type parameter; pass a prepared one
/// through [`CorpusFilter::with_filter`].
#[derive(Debug, Clone)]
pub struct CorpusFilter<F: MembershipFilter = Bloom> {
    chunker: Chunker,
    filter: F,
    metadata: FilterMetadata,
}

impl<F: MembershipFilter> CorpusFilter<F> {
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        let filter = F::with_rate(config.expected_items, config.false_positive_rate)?;
        Self::with_filter(config, filter)
    }

    pub fn with_filter(config: FilterConfig, filter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self { chunker: config.chunker()?, filter, metadata: FilterMetadata::from_config(&config) })
    }

    /// Rebuild from a loaded structure; the metadata decides chunking and
    /// the run threshold.
    pub fn from_parts(filter: F, metadata: FilterMetadata) -> Result<Self> {
        let config = metadata.config();
        config.validate()?;
        Ok(Self { chunker: config.chunker()?, filter, metadata })
    }

    /// Discover `dir`, size the filter from the corpus, and ingest every
    /// readable source. Unreadable sources are logged and skipped.
    pub fn from_directory(dir: impl AsRef<Path>, config: FilterConfig) -> Result<Self> {
        let corpus = discover(dir)?;
        let config = config.with_expected_items(corpus.estimated_chunks(config.chunk_size));
        let (filter, _) = Self::from_corpus(&corpus, config)?;
        Ok(filter)
    }

    /// Build from already discovered sources using `config` as given.
    pub fn from_corpus(corpus: &CorpusFiles, config: FilterConfig) -> Result<(Self, BuildReport)> {
        let mut filter = Self::new(config)?;
        let report = filter.add_files(&corpus.files);
        tracing::info!(
            root = %corpus.root.display(),
            files = report.sources_seen,
            skipped = report.sources_skipped,
            chunks = report.chunks_added,
            "built filter from corpus"
        );
        Ok((filter, report))
    }

    pub fn config(&self) -> FilterConfig { self.metadata.config() }
    pub fn metadata(&self) -> &FilterMetadata { &self.metadata }
    pub fn filter(&self) -> &F { &self.filter }
    pub fn chunker(&self) -> &Chunker { &self.chunker }

    pub fn chunk(&self, text: &str) -> Vec<Fingerprint> { self.chunker.chunk(text) }

    /// Fingerprints of a reader's text, identical to `chunk` over its
    /// lossily decoded contents.
    pub fn chunk_reader<R: Read>(&self, reader: R) -> std::io::Result<Vec<Fingerprint>> {
        let mut out = Vec::new();
        let mut stream = self.chunker.stream();
        read_text(reader, |piece| stream.feed(piece, |fp| out.push(fp)))?;
        stream.finish(|fp| out.push(fp));
        Ok(out)
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool { self.filter.contains(fp) }

    /// Insert every window of `text`; returns the number of chunks inserted.
    pub fn add(&mut self, text: &str) -> u64 {
        let chunks = self.chunker.chunk(text);
        for fp in &chunks {
            self.filter.insert(fp);
        }
        self.record_source(chunks.len() as u64);
        chunks.len() as u64
    }

    /// Stream a source through the chunker. Windows spanning read
    /// boundaries are preserved. On a read error the chunks inserted so far
    /// stay in the filter and are counted.
    pub fn add_reader<R: Read>(&mut self, reader: R) -> std::io::Result<u64> {
        let mut inserted = 0u64;
        let mut stream = self.chunker.stream();
        let filter = &mut self.filter;
        let res = read_text(reader, |piece| {
            stream.feed(piece, |fp| {
                filter.insert(&fp);
                inserted += 1;
            })
        });
        match res {
            Ok(_) => {
                stream.finish(|fp| {
                    filter.insert(&fp);
                    inserted += 1;
                });
                self.record_source(inserted);
                Ok(inserted)
            }
            Err(e) => {
                self.metadata.items_added += inserted;
                Err(e)
            }
        }
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let source_err = |source| AegisError::SourceRead { path: path.to_path_buf(), source };
        let f = File::open(path).map_err(source_err)?;
        let n = self.add_reader(f).map_err(source_err)?;
        tracing::debug!(path = %path.display(), chunks = n, "added source");
        Ok(n)
    }

    /// Best-effort ingestion: failures are logged and counted, never fatal.
    pub fn add_files<I, P>(&mut self, paths: I) -> BuildReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = BuildReport::default();
        for path in paths {
            report.sources_seen += 1;
            match self.add_file(path.as_ref()) {
                Ok(n) => {
                    report.sources_added += 1;
                    report.chunks_added += n;
                }
                Err(e) => {
                    report.sources_skipped += 1;
                    tracing::warn!(path = %path.as_ref().display(), error = %e, "failed to add source");
                }
            }
        }
        report
    }

    pub fn check(&self, text: &str) -> Verdict {
        self.evaluate(&self.chunker.chunk(text))
    }

    pub fn check_reader<R: Read>(&self, reader: R) -> std::io::Result<Verdict> {
        Ok(self.evaluate(&self.chunk_reader(reader)?))
    }

    pub fn check_file(&self, path: impl AsRef<Path>) -> Result<Verdict> {
        let path = path.as_ref();
        let source_err = |source| AegisError::SourceRead { path: path.to_path_buf(), source };
        let f = File::open(path).map_err(source_err)?;
        self.check_reader(f).map_err(source_err)
    }

    pub fn evaluate(&self, chunks: &[Fingerprint]) -> Verdict {
        evaluate(chunks, &self.filter, self.metadata.consecutive_chunks)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let out = envelope::save_to_path(path, &self.filter, &self.metadata)?;
        tracing::info!(path = %out.display(), items = self.metadata.items_added, "saved filter");
        Ok(out)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (filter, metadata) = envelope::load_from_path(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), items = metadata.items_added, "loaded filter");
        Self::from_parts(filter, metadata)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> { envelope::encode(&self.filter, &self.metadata) }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (filter, metadata) = envelope::decode(bytes)?;
        Self::from_parts(filter, metadata)
    }

    pub fn into_shared(self) -> SharedCorpusFilter<F> { Arc::new(RwLock::new(self)) }

    fn record_source(&mut self, chunks: u64) {
        self.metadata.items_added += chunks;
        self.metadata.sources_added += 1;
    }
}
