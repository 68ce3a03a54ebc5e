//! End-to-end analysis tests over synthetic frame streams.
//!
//! Frames come from `MemorySource`, so these run without FFmpeg fixtures.
//! The analysed path is a scratch file that only provides the bytes for the
//! hash.

use std::{
    io::Write,
    iter,
    path::Path,
    sync::{Arc, Mutex},
};

use image::{Rgb, RgbImage};
use tempfile::NamedTempFile;
use vidguard::{
    AnalysisConfig, AnalysisState, Analyzer, CancellationToken, DetectorConfig, DigestAlgorithm,
    ErrorKind, FrameSource, MemorySource, OpenedSource, OperationType, ProgressCallback,
    ProgressInfo, VidGuardError,
};

fn scratch_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents).expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

fn flat(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value; 3]))
}

/// A horizontal ramp that scrolls one pixel per frame.
fn scrolling(index: u64) -> RgbImage {
    RgbImage::from_fn(64, 36, |x, _| {
        let value = ((u64::from(x) + index) * 4 % 256) as u8;
        Rgb([value, value, value])
    })
}

fn analyze(source: MemorySource) -> Result<vidguard::IntegrityReport, VidGuardError> {
    let file = scratch_file(b"synthetic video bytes");
    Analyzer::with_source(source, AnalysisConfig::new()).analyze(file.path())
}

// ── Detection ──────────────────────────────────────────────────────

#[test]
fn end_to_end_full_hd_report() {
    let (width, height) = (1920, 1080);
    let pixels = (width * height * 3) as usize;
    let source = MemorySource::from_fn(500, 30.0, move |index| {
        let value = if matches!(index, 15 | 20 | 25) { 0 } else { 128 };
        RgbImage::from_raw(width, height, vec![value; pixels]).expect("buffer matches size")
    });

    let report = analyze(source).expect("analysis should succeed");

    assert_eq!(report.metadata.frame_count, 500);
    assert_eq!(report.metadata.width, 1920);
    assert_eq!(report.metadata.height, 1080);
    assert_eq!(report.metadata.fps, 30.0);
    assert_eq!(report.altered_frames.as_slice(), &[15, 20, 25]);
    assert_eq!(report.hash.len(), 32);
    assert!(report
        .hash
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

    let json: serde_json::Value =
        serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["altered_frames"], serde_json::json!([15, 20, 25]));
    assert_eq!(json["metadata"]["frame_width"], 1920);
    assert_eq!(json["metadata"]["frame_height"], 1080);
}

#[test]
fn identical_frames_flag_nothing() {
    let report = analyze(MemorySource::from_fn(60, 25.0, |_| flat(16, 16, 77))).unwrap();
    assert!(report.altered_frames.is_empty());
    assert_eq!(report.integrity_score(), 100.0);
}

#[test]
fn single_black_frame_in_static_video() {
    let source = MemorySource::from_fn(90, 30.0, |index| {
        flat(32, 18, if index == 42 { 0 } else { 200 })
    });
    let report = analyze(source).unwrap();
    assert_eq!(report.altered_frames.as_slice(), &[42]);
}

#[test]
fn inserted_frame_in_moving_video() {
    let source = MemorySource::from_fn(120, 30.0, |index| {
        if index == 40 {
            flat(64, 36, 255)
        } else {
            scrolling(index)
        }
    });
    let report = analyze(source).unwrap();
    assert_eq!(report.altered_frames.as_slice(), &[40]);
}

#[test]
fn two_consecutive_inserted_frames_are_both_flagged() {
    let source = MemorySource::from_fn(60, 30.0, |index| {
        flat(16, 16, match index {
            20 => 64,
            21 => 0,
            _ => 128,
        })
    });
    let report = analyze(source).unwrap();
    assert_eq!(report.altered_frames.as_slice(), &[20, 21]);
}

#[test]
fn steady_motion_is_not_flagged() {
    let report = analyze(MemorySource::from_fn(120, 30.0, scrolling)).unwrap();
    assert!(report.altered_frames.is_empty());
}

#[test]
fn first_frame_is_never_flagged() {
    let source = MemorySource::from_fn(30, 30.0, |index| {
        flat(8, 8, if index == 0 { 0 } else { 255 })
    });
    let report = analyze(source).unwrap();
    assert!(!report.altered_frames.contains(0));
    assert_eq!(report.altered_frames.as_slice(), &[1]);
}

#[test]
fn resolution_change_flags_first_new_frame() {
    let source = MemorySource::from_fn(40, 30.0, |index| {
        if index < 25 {
            flat(16, 16, 90)
        } else {
            flat(8, 8, 90)
        }
    });
    let report = analyze(source).unwrap();
    assert_eq!(report.altered_frames.as_slice(), &[25]);
}

#[test]
fn every_resolution_change_is_flagged() {
    let source = MemorySource::from_fn(20, 30.0, |index| match index {
        0..10 => flat(640, 480, 90),
        10 => flat(320, 240, 90),
        _ => flat(1280, 720, 90),
    });
    let report = analyze(source).unwrap();
    assert_eq!(report.metadata.width, 640);
    assert_eq!(report.altered_frames.as_slice(), &[10, 11]);
}

#[test]
fn both_edges_flagged_without_return_edge_suppression() {
    let file = scratch_file(b"bytes");
    let source = MemorySource::from_fn(60, 30.0, |index| {
        flat(8, 8, if index == 30 { 0 } else { 180 })
    });
    let config = AnalysisConfig::new()
        .with_detector(DetectorConfig::new().suppress_return_edges(false));
    let report = Analyzer::with_source(source, config)
        .analyze(file.path())
        .unwrap();
    assert_eq!(report.altered_frames.as_slice(), &[30, 31]);
}

#[test]
fn analysis_is_deterministic() {
    let file = scratch_file(&[7_u8; 100_000]);
    let make_source = || {
        MemorySource::from_fn(80, 30.0, |index| {
            if index % 37 == 0 && index > 0 {
                flat(64, 36, 10)
            } else {
                scrolling(index)
            }
        })
    };

    let first = Analyzer::with_source(make_source(), AnalysisConfig::new())
        .analyze(file.path())
        .unwrap();
    let second = Analyzer::with_source(make_source(), AnalysisConfig::new())
        .analyze(file.path())
        .unwrap();

    assert_eq!(first.hash, second.hash);
    assert_eq!(first.altered_frames, second.altered_frames);
    assert_eq!(first.altered_frames.as_slice(), &[37, 74]);
}

// ── Hashing inside a run ───────────────────────────────────────────

#[test]
fn report_hash_matches_standalone_hash() {
    let file = scratch_file(&(0..200_000_u32).map(|v| v as u8).collect::<Vec<_>>());
    for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256, DigestAlgorithm::Blake3] {
        let config = AnalysisConfig::new().with_digest_algorithm(algorithm);
        let report = Analyzer::with_source(
            MemorySource::from_fn(3, 30.0, |_| flat(4, 4, 0)),
            config,
        )
        .analyze(file.path())
        .unwrap();

        assert_eq!(report.hash, vidguard::hash_file(file.path(), algorithm).unwrap());
        assert_eq!(report.algorithm, algorithm);
    }
}

#[test]
fn sequential_and_concurrent_runs_agree() {
    let file = scratch_file(&[3_u8; 300_000]);
    let source = || {
        MemorySource::from_fn(50, 30.0, |index| {
            flat(8, 8, if index == 20 { 255 } else { 0 })
        })
    };

    let concurrent = Analyzer::with_source(source(), AnalysisConfig::new())
        .analyze(file.path())
        .unwrap();
    let sequential = Analyzer::with_source(
        source(),
        AnalysisConfig::new().with_concurrent_hashing(false),
    )
    .analyze(file.path())
    .unwrap();

    assert_eq!(concurrent, sequential);
}

// ── Frame counts ───────────────────────────────────────────────────

#[test]
fn declared_frame_count_mismatch_is_reported_not_fatal() {
    let source = MemorySource::from_fn(10, 30.0, |_| flat(4, 4, 0)).with_declared_frame_count(Some(12));
    let report = analyze(source).unwrap();

    assert_eq!(report.metadata.frame_count, 12);
    assert_eq!(report.decoded_frame_count, 10);
    assert!(report.frame_count_mismatch());
}

#[test]
fn missing_frame_count_is_counted() {
    let source = MemorySource::from_fn(10, 30.0, |_| flat(4, 4, 0)).with_declared_frame_count(None);
    let report = analyze(source).unwrap();
    assert_eq!(report.metadata.frame_count, 10);
}

// ── Failures, cancellation and progress ────────────────────────────

#[test]
fn missing_input_is_source_unavailable() {
    let mut analyzer = Analyzer::with_source(
        MemorySource::from_fn(3, 30.0, |_| flat(4, 4, 0)),
        AnalysisConfig::new(),
    );
    let error = analyzer.analyze("this_file_does_not_exist.mp4").unwrap_err();
    assert!(matches!(error, VidGuardError::SourceUnavailable { .. }));
    assert_eq!(analyzer.state(), AnalysisState::Failed);
}

#[test]
fn cancelled_before_start() {
    let file = scratch_file(b"bytes");
    let token = CancellationToken::new();
    token.cancel();

    let config = AnalysisConfig::new().with_cancellation(token);
    let result = Analyzer::with_source(MemorySource::from_fn(5, 30.0, |_| flat(4, 4, 0)), config)
        .analyze(file.path());
    assert!(matches!(result, Err(VidGuardError::Cancelled)));
}

struct CancelAtFrame {
    frame: u64,
    token: CancellationToken,
}

impl ProgressCallback for CancelAtFrame {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.operation == OperationType::FrameScan && info.current >= self.frame {
            self.token.cancel();
        }
    }
}

#[test]
fn cancelled_mid_scan() {
    let file = scratch_file(b"bytes");
    let token = CancellationToken::new();
    let config = AnalysisConfig::new()
        .with_cancellation(token.clone())
        .with_progress(Arc::new(CancelAtFrame { frame: 5, token }));

    let mut analyzer =
        Analyzer::with_source(MemorySource::from_fn(1_000, 30.0, |_| flat(4, 4, 0)), config);
    let result = analyzer.analyze(file.path());

    assert!(matches!(result, Err(VidGuardError::Cancelled)));
    assert_eq!(analyzer.state(), AnalysisState::Failed);
}

/// Serves `good` blank frames, then a decode error.
struct TruncatedSource {
    good: u64,
}

impl FrameSource for TruncatedSource {
    fn open(&self, path: &Path) -> Result<OpenedSource, VidGuardError> {
        let OpenedSource { metadata, frames } =
            MemorySource::from_fn(self.good * 2, 30.0, |_| flat(4, 4, 0)).open(path)?;
        let frames = frames.take(self.good as usize).chain(iter::once(Err(
            VidGuardError::DecodeFailure("corrupt packet".to_string()),
        )));
        Ok(OpenedSource {
            metadata,
            frames: Box::new(frames),
        })
    }
}

#[test]
fn decode_failure_mid_scan_aborts_the_run() {
    let file = scratch_file(&[5_u8; 50_000]);
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let report_path = output.path().join("report.json");

    for concurrent in [true, false] {
        let config = AnalysisConfig::new().with_concurrent_hashing(concurrent);
        let mut analyzer = Analyzer::with_source(TruncatedSource { good: 12 }, config);

        let error = analyzer
            .analyze(file.path())
            .and_then(|report| report.write_to(&report_path))
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::IoFailure);
        assert!(matches!(error, VidGuardError::DecodeFailure(_)));
        assert_eq!(analyzer.state(), AnalysisState::Failed);
        assert!(!report_path.exists());
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(OperationType, u64, Option<u64>)>>);

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.0
            .lock()
            .unwrap()
            .push((info.operation, info.current, info.total));
    }
}

#[test]
fn progress_covers_every_frame_and_byte() {
    let file = scratch_file(&[1_u8; 10_000]);
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::new()
        .with_chunk_size(1_024)
        .with_progress(recorder.clone());

    Analyzer::with_source(MemorySource::from_fn(25, 30.0, |_| flat(4, 4, 0)), config)
        .analyze(file.path())
        .unwrap();

    let reports = recorder.0.lock().unwrap();
    let last = |operation| {
        reports
            .iter()
            .filter(|(op, _, _)| *op == operation)
            .last()
            .copied()
            .unwrap()
    };
    assert_eq!(last(OperationType::FrameScan), (OperationType::FrameScan, 25, Some(25)));
    assert_eq!(
        last(OperationType::Hashing),
        (OperationType::Hashing, 10_000, Some(10_000))
    );
}

/// Reading a directory fails after it has been opened, so the hasher
/// errors while frames are still being scanned.
#[cfg(unix)]
#[test]
fn hashing_failure_stops_the_scan() {
    const FRAMES: u64 = 2_000_000;

    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::new()
        .with_batch_size(1_000)
        .with_progress(recorder.clone());
    let mut analyzer = Analyzer::with_source(
        MemorySource::from_fn(FRAMES, 30.0, |_| flat(1, 1, 0)),
        config,
    );

    let error = analyzer.analyze(directory.path()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::IoFailure, "unexpected error: {error}");
    assert_eq!(analyzer.state(), AnalysisState::Failed);

    let scanned = recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .filter(|(operation, _, _)| *operation == OperationType::FrameScan)
        .map(|(_, current, _)| *current)
        .max()
        .unwrap_or(0);
    assert!(scanned < FRAMES, "scan ran to completion ({scanned} frames)");
}

#[test]
fn analyze_many_keeps_order_and_per_file_errors() {
    let present = scratch_file(b"bytes");
    let analyzer = Analyzer::with_source(
        MemorySource::from_fn(10, 30.0, |_| flat(4, 4, 0)),
        AnalysisConfig::new(),
    );

    let paths = [
        present.path().to_path_buf(),
        "this_file_does_not_exist.mp4".into(),
        present.path().to_path_buf(),
    ];
    let results = analyzer.analyze_many(&paths);

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(VidGuardError::SourceUnavailable { .. })
    ));
    assert_eq!(
        results[0].as_ref().unwrap().hash,
        results[2].as_ref().unwrap().hash
    );
}
