use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use aegis_core::{
    consts::{DEFAULT_CHUNK_SIZE, DEFAULT_CONSECUTIVE_CHUNKS, DEFAULT_FALSE_POSITIVE_RATE},
    discover, Bloom, CorpusFilter, FilterConfig, FingerprintAlgo, Verdict,
};

/// Exit status when at least one checked file may be in the corpus.
const EXIT_MAYBE_PRESENT: u8 = 2;
const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";

#[derive(Parser)]
#[command(name = "aegis", version, about = "AEGIS Bloom: training-corpus membership checks")]
struct Cli {
    /// Enable verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(ValueEnum, Clone, Copy)]
enum CliDigest {
    Sha256,
    Blake3,
}

impl From<CliDigest> for FingerprintAlgo {
    fn from(d: CliDigest) -> Self {
        match d {
            CliDigest::Sha256 => FingerprintAlgo::Sha256,
            CliDigest::Blake3 => FingerprintAlgo::Blake3,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Build a bloom filter from a directory of training data
    BloomBuild {
        /// Directory containing .txt / .md files
        input: PathBuf,
        /// Output path for the filter (.bloom)
        output: PathBuf,
        /// Window length in characters
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long, default_value_t = DEFAULT_FALSE_POSITIVE_RATE)]
        false_positive_rate: f64,
        /// Consecutive chunk hits required for MAYBE_PRESENT
        #[arg(long, default_value_t = DEFAULT_CONSECUTIVE_CHUNKS)]
        consecutive_chunks: usize,
        /// Override the size estimate derived from the corpus
        #[arg(long)]
        expected_items: Option<u64>,
        #[arg(long, value_enum, default_value_t = CliDigest::Sha256)]
        digest: CliDigest,
    },

    /// Check files against a bloom filter
    BloomCheck {
        /// Files to check
        #[arg(required = true, num_args = 1..)]
        input_files: Vec<PathBuf>,
        /// Path to the filter file
        bloom_filter: PathBuf,
        /// Save results to a JSON file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print filter parameters and fill statistics
    BloomInfo {
        bloom_filter: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_filter(path: &Path) -> Result<CorpusFilter<Bloom>> {
    if !path.exists() {
        return Err(anyhow!("bloom filter file does not exist: {}", path.display()));
    }
    info!("Loading bloom filter from {}", path.display());
    CorpusFilter::<Bloom>::load(path).with_context(|| format!("loading {}", path.display()))
}

fn bloom_build(
    input: &Path,
    output: &Path,
    config: FilterConfig,
    expected_items: Option<u64>,
) -> Result<ExitCode> {
    info!("Building bloom filter from {}", input.display());
    let corpus = discover(input)?;
    let expected = expected_items.unwrap_or_else(|| corpus.estimated_chunks(config.chunk_size));
    let (filter, report) = CorpusFilter::<Bloom>::from_corpus(&corpus, config.with_expected_items(expected))?;
    filter.save(output).with_context(|| format!("saving {}", output.display()))?;

    info!("Bloom filter saved to {}", output.display());
    info!("Added {} chunks from dataset", filter.metadata().items_added);
    println!(
        "built: {} (files={}, skipped={}, chunks={}, m={}, k={})",
        output.display(),
        report.sources_added,
        report.sources_skipped,
        report.chunks_added,
        filter.filter().bit_len(),
        filter.filter().hash_count()
    );
    Ok(ExitCode::SUCCESS)
}

fn bloom_check(bloom_filter: &Path, input_files: &[PathBuf], output: Option<&Path>) -> Result<ExitCode> {
    let filter = load_filter(bloom_filter)?;

    let mut results: BTreeMap<String, String> = BTreeMap::new();
    let mut any_present = false;
    for input in input_files {
        let key = input.display().to_string();
        if !input.exists() {
            warn!("Input file does not exist: {}", input.display());
            results.insert(key, FILE_NOT_FOUND.to_string());
            continue;
        }
        info!("Checking {}", input.display());
        let verdict = filter.check_file(input)?;
        any_present |= verdict == Verdict::MaybePresent;
        println!("{key}: {verdict}");
        results.insert(key, verdict.to_string());
    }

    if let Some(out) = output {
        std::fs::write(out, serde_json::to_string_pretty(&results)?)
            .with_context(|| format!("writing {}", out.display()))?;
        info!("Results saved to {}", out.display());
    }

    Ok(if any_present { ExitCode::from(EXIT_MAYBE_PRESENT) } else { ExitCode::SUCCESS })
}

fn bloom_info(bloom_filter: &Path) -> Result<ExitCode> {
    let filter = load_filter(bloom_filter)?;
    let bloom = filter.filter();
    let artifact_bytes = std::fs::metadata(bloom_filter)?.len();
    let info = serde_json::json!({
        "metadata": filter.metadata(),
        "bit_len": bloom.bit_len(),
        "hash_count": bloom.hash_count(),
        "bits_set": bloom.count_ones(),
        "fill_ratio": bloom.fill_ratio(),
        "estimated_false_positive_rate": bloom.estimated_false_positive_rate(),
        "artifact_bytes": artifact_bytes,
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(ExitCode::SUCCESS)
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Cmd::BloomBuild {
            input,
            output,
            chunk_size,
            false_positive_rate,
            consecutive_chunks,
            expected_items,
            digest,
        } => {
            let config = FilterConfig {
                chunk_size,
                false_positive_rate,
                consecutive_chunks,
                digest: digest.into(),
                ..FilterConfig::default()
            };
            bloom_build(&input, &output, config, expected_items)
        }
        Cmd::BloomCheck { input_files, bloom_filter, output } => {
            bloom_check(&bloom_filter, &input_files, output.as_deref())
        }
        Cmd::BloomInfo { bloom_filter } => bloom_info(&bloom_filter),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
