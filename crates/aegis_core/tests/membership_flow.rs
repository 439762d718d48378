use aegis_core::{
    AegisError, Bloom, CorpusFilter, FilterConfig, Fingerprint, FingerprintAlgo, MembershipFilter,
    Verdict,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use tempfile::tempdir;

fn config(chunk_size: usize, consecutive_chunks: usize) -> FilterConfig {
    FilterConfig {
        expected_items: 1_000,
        false_positive_rate: 0.01,
        chunk_size,
        consecutive_chunks,
        ..FilterConfig::default()
    }
}

fn random_text(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| rng.random_range(b'a'..=b'z') as char).collect()
}

#[test]
fn inserted_document_is_found_and_unrelated_is_not() {
    let mut bloom = CorpusFilter::<Bloom>::new(config(32, 2)).unwrap();
    let test_text = "This is a test document with some content. ".repeat(10);
    bloom.add(&test_text);
    assert_eq!(bloom.check(&test_text), Verdict::MaybePresent);

    let different = "This is completely different content that was never added before...".repeat(5);
    assert_eq!(bloom.check(&different), Verdict::NotPresent);
}

#[test]
fn exact_resubmission_never_misses() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut bloom = CorpusFilter::<Bloom>::new(config(64, 3)).unwrap();
    for len in [128, 200, 333, 1_000, 4_096] {
        let text = random_text(&mut rng, len);
        bloom.add(&text);
        assert_eq!(bloom.check(&text), Verdict::MaybePresent, "len={len}");
    }
}

#[test]
fn short_text_is_never_present() {
    let mut bloom = CorpusFilter::<Bloom>::new(config(32, 3)).unwrap();
    // 63 chars -> 2 windows, below the run threshold of 3
    let text = "s".repeat(63);
    assert_eq!(bloom.chunk(&text).len(), 2);
    bloom.add(&text);
    assert_eq!(bloom.check(&text), Verdict::NotPresent);
    assert_eq!(bloom.check(""), Verdict::NotPresent);
}

#[test]
fn adding_more_content_never_revokes_a_match() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut bloom = CorpusFilter::<Bloom>::new(config(48, 2)).unwrap();
    let first = random_text(&mut rng, 600);
    bloom.add(&first);
    assert_eq!(bloom.check(&first), Verdict::MaybePresent);
    for _ in 0..20 {
        bloom.add(&random_text(&mut rng, 400));
        assert_eq!(bloom.check(&first), Verdict::MaybePresent);
    }
}

#[test]
fn repeated_insert_changes_only_the_counter() {
    let text = "Idempotent inserts leave the bit array untouched. ".repeat(8);
    let mut once = CorpusFilter::<Bloom>::new(config(32, 2)).unwrap();
    once.add(&text);
    let mut twice = once.clone();
    twice.add(&text);
    assert_eq!(once.filter(), twice.filter());
    assert_eq!(twice.metadata().items_added, 2 * once.metadata().items_added);
    assert_eq!(once.check(&text), twice.check(&text));
}

#[test]
fn save_and_load_preserve_queries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.bloom");
    let mut rng = StdRng::seed_from_u64(21);

    let cfg = FilterConfig { false_positive_rate: 0.1, ..config(32, 2) };
    let mut bloom1 = CorpusFilter::<Bloom>::new(cfg).unwrap();
    let test_text = "This is test content for save/load testing. ".repeat(10);
    bloom1.add(&test_text);
    let extra: Vec<String> = (0..5).map(|_| random_text(&mut rng, 250)).collect();
    for t in &extra {
        bloom1.add(t);
    }
    bloom1.save(&path).unwrap();
    assert!(path.exists());

    let bloom2 = CorpusFilter::<Bloom>::load(&path).unwrap();
    assert_eq!(bloom2.metadata(), bloom1.metadata());
    assert_eq!(bloom2.metadata().expected_items, 1_000);
    assert_eq!(bloom2.metadata().false_positive_rate, 0.1);
    assert_eq!(bloom2.filter().bit_len(), bloom1.filter().bit_len());
    assert_eq!(bloom2.filter().hash_count(), bloom1.filter().hash_count());

    let mut probes: Vec<Fingerprint> = bloom1.chunk(&test_text);
    for t in &extra {
        probes.extend(bloom1.chunk(t));
    }
    for _ in 0..2_000 {
        let mut b = [0u8; 32];
        rng.fill(&mut b[..]);
        probes.push(Fingerprint(b));
    }
    for fp in &probes {
        assert_eq!(bloom1.contains(fp), bloom2.contains(fp));
    }

    let mut queries = vec![test_text.clone(), "never seen before at all, honestly. ".repeat(6)];
    queries.extend(extra.iter().cloned());
    queries.extend((0..10).map(|_| random_text(&mut rng, 300)));
    for q in &queries {
        assert_eq!(bloom1.check(q), bloom2.check(q));
    }
    assert_eq!(bloom2.check(&test_text), Verdict::MaybePresent);
}

#[test]
fn loaded_parameters_win_and_inserts_continue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.bloom");
    let cfg = FilterConfig { digest: FingerprintAlgo::Blake3, ..config(40, 2) };
    let mut partial = CorpusFilter::<Bloom>::new(cfg).unwrap();
    partial.add(&"first half of the build, saved mid-way. ".repeat(4));
    partial.save(&path).unwrap();

    let mut resumed = CorpusFilter::<Bloom>::load(&path).unwrap();
    assert_eq!(resumed.config(), cfg);
    let later = "second half of the build, added after loading. ".repeat(4);
    resumed.add(&later);
    assert_eq!(resumed.check(&later), Verdict::MaybePresent);
    assert_eq!(resumed.metadata().sources_added, 2);
}

#[test]
fn corrupt_artifacts_are_rejected() {
    let dir = tempdir().unwrap();
    let garbage = dir.path().join("garbage.bloom");
    fs::write(&garbage, b"definitely not a filter").unwrap();
    assert!(matches!(CorpusFilter::<Bloom>::load(&garbage), Err(AegisError::CorruptArtifact(_))));

    let good = dir.path().join("good.bloom");
    let mut bloom = CorpusFilter::<Bloom>::new(config(32, 2)).unwrap();
    bloom.add(&"content that will be truncated on disk. ".repeat(5));
    bloom.save(&good).unwrap();
    let bytes = fs::read(&good).unwrap();
    let truncated = dir.path().join("truncated.bloom");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(CorpusFilter::<Bloom>::load(&truncated), Err(AegisError::CorruptArtifact(_))));
}

#[test]
fn empty_directory_builds_an_empty_filter() {
    let dir = tempdir().unwrap();
    let bloom = CorpusFilter::<Bloom>::from_directory(dir.path(), config(32, 2)).unwrap();
    assert_eq!(bloom.metadata().items_added, 0);
    assert_eq!(bloom.filter().count_ones(), 0);
    let query = "Any non-trivial query against an empty corpus. ".repeat(5);
    assert_eq!(bloom.check(&query), Verdict::NotPresent);
}

#[test]
fn missing_directory_is_a_hard_failure() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent");
    assert!(matches!(
        CorpusFilter::<Bloom>::from_directory(&missing, config(32, 2)),
        Err(AegisError::MissingCorpus(_))
    ));
}

#[test]
fn directory_build_sizes_from_corpus_and_finds_files() {
    let dir = tempdir().unwrap();
    let recipes = [
        "The secret to perfect chocolate chip cookies is using brown butter.",
        "For fluffy pancakes, don't overmix the batter - lumps are okay!",
        "When making bread, let the dough rise slowly in a cool place.",
    ];
    for (i, r) in recipes.iter().enumerate() {
        fs::write(dir.path().join(format!("recipe_{i}.txt")), r.repeat(3)).unwrap();
    }
    fs::write(dir.path().join("notes.md"), "# Notes\n".repeat(20)).unwrap();

    let bloom = CorpusFilter::<Bloom>::from_directory(dir.path(), config(64, 2)).unwrap();
    assert_eq!(bloom.metadata().sources_added, 4);
    assert!(bloom.metadata().items_added > 0);
    assert_ne!(bloom.metadata().expected_items, 1_000);
    let f = dir.path().join("recipe_1.txt");
    assert_eq!(bloom.check_file(&f).unwrap(), Verdict::MaybePresent);
}

#[test]
fn unreadable_sources_are_skipped() {
    let dir = tempdir().unwrap();
    let ok = dir.path().join("ok.txt");
    fs::write(&ok, "readable corpus text that should be ingested. ".repeat(4)).unwrap();
    let missing = dir.path().join("missing.txt");

    let mut bloom = CorpusFilter::<Bloom>::new(config(32, 2)).unwrap();
    let report = bloom.add_files([&ok, &missing]);
    assert_eq!(report.sources_seen, 2);
    assert_eq!(report.sources_added, 1);
    assert_eq!(report.sources_skipped, 1);
    assert_eq!(report.chunks_added, bloom.metadata().items_added);

    assert!(matches!(bloom.check_file(&missing), Err(AegisError::SourceRead { .. })));
}

#[test]
fn large_file_streaming_keeps_windows_across_reads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.txt");
    // multi-byte text over several 1 MiB reads so boundaries split chars
    let text = "Ünïcödé 東京 ✓ streaming seam check. ".repeat(70_000);
    assert!(text.len() > 2 * (1 << 20));
    fs::write(&path, &text).unwrap();

    let mut from_file = CorpusFilter::<Bloom>::new(config(64, 3).with_expected_items(200_000)).unwrap();
    let mut from_text = from_file.clone();
    let n_file = from_file.add_file(&path).unwrap();
    let n_text = from_text.add(&text);
    assert_eq!(n_file, n_text);
    assert_eq!(from_file.filter(), from_text.filter());
    assert_eq!(from_file.check_file(&path).unwrap(), Verdict::MaybePresent);
}

#[test]
fn run_threshold_suppresses_document_false_positives() {
    let mut rng = StdRng::seed_from_u64(99);
    let cfg = FilterConfig {
        expected_items: 5_000,
        false_positive_rate: 0.05,
        chunk_size: 32,
        consecutive_chunks: 3,
        ..FilterConfig::default()
    };
    let mut bloom = CorpusFilter::<Bloom>::new(cfg).unwrap();
    while bloom.metadata().items_added < cfg.expected_items {
        bloom.add(&random_text(&mut rng, 300));
    }

    let mut chunk_hits = 0usize;
    let mut chunk_total = 0usize;
    let mut doc_hits = 0usize;
    let docs = 400;
    for _ in 0..docs {
        let q = random_text(&mut rng, 300);
        let chunks = bloom.chunk(&q);
        chunk_total += chunks.len();
        chunk_hits += chunks.iter().filter(|fp| bloom.filter().contains(fp)).count();
        if bloom.evaluate(&chunks).is_maybe_present() {
            doc_hits += 1;
        }
    }
    let chunk_rate = chunk_hits as f64 / chunk_total as f64;
    let doc_rate = doc_hits as f64 / docs as f64;
    assert!(chunk_rate <= 2.0 * cfg.false_positive_rate, "chunk rate {chunk_rate}");
    assert!(doc_rate < chunk_rate / 2.0, "doc rate {doc_rate} vs chunk rate {chunk_rate}");
}

#[test]
fn oversized_expected_items_is_rejected_up_front() {
    let cfg = config(64, 3).with_expected_items(20_000_000_000_000);
    assert!(matches!(CorpusFilter::<Bloom>::new(cfg), Err(AegisError::InvalidParameters(_))));
}
