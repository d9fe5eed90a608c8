//! Boundary and conflict-resolution behaviors for the copy engine, run
//! through the full `run_copy` orchestration rather than the individual
//! strategy functions (those have their own unit tests alongside the code).

use dailies::copy_engine::{run_copy, CancellationToken, CopyOutcome, CopyRequest};
use dailies::{BandwidthLimiter, FilesystemMetadataPort, VerificationPolicy};
use tempfile::tempdir;

fn run(source: &std::path::Path, target: &std::path::Path, total_bytes: u64, buffer_size: u64) -> dailies::Result<CopyOutcome> {
    let limiter = BandwidthLimiter::unlimited();
    let cancel = CancellationToken::new();
    let metadata = FilesystemMetadataPort::new();
    run_copy(
        CopyRequest {
            transfer_id: dailies::model::next_transfer_id(),
            source,
            target,
            total_bytes,
            chunk_size: 1024,
            buffer_size,
            verify_mode: VerificationPolicy::SizeOnly,
            limiter: &limiter,
            cancel: &cancel,
            metadata: &metadata,
            before_verify: None,
        },
        |_| {},
    )
}

/// Target already present with a different size: the copy lands beside it
/// as `name (1).ext` instead of overwriting or failing.
#[test]
fn differing_target_size_disambiguates_with_suffix() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    let target = dir.path().join("clip_out.mov");
    std::fs::write(&source, vec![4u8; 4096]).unwrap();
    std::fs::write(&target, vec![0u8; 10]).unwrap();

    let outcome = run(&source, &target, 4096, 1024 * 1024).unwrap();
    assert!(matches!(outcome, CopyOutcome::Completed { transferred_bytes: 4096 }));

    let disambiguated = dir.path().join("clip_out (1).mov");
    assert!(disambiguated.exists());
    assert_eq!(std::fs::read(&disambiguated).unwrap(), vec![4u8; 4096]);
    // Original target is untouched.
    assert_eq!(std::fs::read(&target).unwrap(), vec![0u8; 10]);
}

/// A file whose size exactly equals `chunk_size` still completes in a
/// single read/write step and reports 100% at the end.
#[test]
fn file_exactly_one_chunk_completes() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    let target = dir.path().join("out.mov");
    std::fs::write(&source, vec![2u8; 1024]).unwrap();

    let limiter = BandwidthLimiter::unlimited();
    let cancel = CancellationToken::new();
    let metadata = FilesystemMetadataPort::new();
    let mut last_fraction = None;
    let outcome = run_copy(
        CopyRequest {
            transfer_id: dailies::model::next_transfer_id(),
            source: &source,
            target: &target,
            total_bytes: 1024,
            chunk_size: 1024,
            buffer_size: 1024 * 1024,
            verify_mode: VerificationPolicy::SizeOnly,
            limiter: &limiter,
            cancel: &cancel,
            metadata: &metadata,
            before_verify: None,
        },
        |sample| last_fraction = Some(sample.fraction()),
    )
    .unwrap();

    assert!(matches!(outcome, CopyOutcome::Completed { transferred_bytes: 1024 }));
    assert_eq!(last_fraction, Some(1.0));
}

/// Above `buffer_size` (but well below the large-file threshold) the engine
/// switches to the mapped strategy; the bytes on disk must still match
/// exactly.
#[test]
fn above_buffer_size_uses_mapped_strategy_and_copies_exactly() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    let target = dir.path().join("out.mov");
    let content: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&source, &content).unwrap();

    let outcome = run(&source, &target, 8192, 1024).unwrap();
    assert!(matches!(outcome, CopyOutcome::Completed { transferred_bytes: 8192 }));
    assert_eq!(std::fs::read(&target).unwrap(), content);
}

/// Scenario 5: a single corrupted byte introduced after the copy but before
/// verification is caught by `sampled_hash`, and the partial target is
/// cleaned up rather than left in place.
#[test]
fn corrupted_copy_fails_sampled_hash_verification() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("clip.mov");
    let target = dir.path().join("out.mov");
    std::fs::write(&source, vec![6u8; 4096]).unwrap();

    let limiter = BandwidthLimiter::unlimited();
    let cancel = CancellationToken::new();
    let metadata = FilesystemMetadataPort::new();
    let corrupt = |path: &std::path::Path| {
        let mut bytes = std::fs::read(path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        std::fs::write(path, bytes).unwrap();
    };

    let err = run_copy(
        CopyRequest {
            transfer_id: dailies::model::next_transfer_id(),
            source: &source,
            target: &target,
            total_bytes: 4096,
            chunk_size: 1024,
            buffer_size: 1024 * 1024,
            verify_mode: VerificationPolicy::SampledHash,
            limiter: &limiter,
            cancel: &cancel,
            metadata: &metadata,
            before_verify: Some(&corrupt),
        },
        |_| {},
    )
    .unwrap_err();

    assert_eq!(err.kind, dailies::ErrorKind::VerificationFailed);
    assert!(!target.exists(), "a failed verification must not publish a corrupted target");
}

/// Zero-byte source round-trips cleanly through the full pipeline.
#[test]
fn zero_byte_source_round_trips() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("empty.mov");
    let target = dir.path().join("out.mov");
    std::fs::write(&source, []).unwrap();

    let outcome = run(&source, &target, 0, 1024 * 1024).unwrap();
    assert!(matches!(outcome, CopyOutcome::Completed { transferred_bytes: 0 }));
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 0);
}
