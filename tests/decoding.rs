//! Decoder integration tests.
//!
//! Tests that read video require fixture files from
//! `tests/fixtures/generate_fixtures.sh` and are skipped when they are absent.

mod common;

use forgery_score::{
    CancellationToken, ErrorKind, ForgeryScorer, OperationType, ScoreError, ScoreOptions,
    VideoFile, decode, decode_with_options, probe,
};

use ndarray::{ArrayView3, Axis};

use common::{
    COLOUR_RUNS_VIDEO, EMPTY_VIDEO, RecordingProgress, SAMPLE_VIDEO, SMALL_VIDEO, StubClassifier,
    fixture_available,
};

/// Index of the colour channel with the highest mean.
fn dominant_channel(frame: ArrayView3<'_, u8>) -> usize {
    let sums: Vec<u64> = (0..3)
        .map(|channel| {
            frame
                .index_axis(Axis(2), channel)
                .iter()
                .map(|&value| u64::from(value))
                .sum()
        })
        .collect();
    (0..3).max_by_key(|&channel| sums[channel]).unwrap()
}

#[test]
fn decode_yields_every_frame_in_order() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let sequence = decode(SAMPLE_VIDEO).expect("Failed to decode fixture");
    assert_eq!(sequence.len(), 50);
    assert_eq!(sequence.shape(), [50, 100, 100, 3, 1]);
}

#[test]
fn frame_iterator_matches_full_decode() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let sequence = decode(SAMPLE_VIDEO).expect("Failed to decode fixture");
    let mut video = VideoFile::open(SAMPLE_VIDEO).expect("Failed to open fixture");
    let mut frames = video.frames().expect("Failed to start decoding");

    let mut count = 0;
    for (index, frame) in frames.by_ref().enumerate() {
        let frame = frame.expect("Failed to decode frame");
        assert_eq!(frame.pixels(), sequence.frame(index).unwrap(), "frame {index}");
        count += 1;
    }
    assert_eq!(count, sequence.len());
    assert_eq!(frames.frames_yielded(), sequence.len());
    assert!(frames.next().is_none());
}

#[test]
fn solid_colour_runs_decode_in_temporal_order() {
    if !fixture_available(COLOUR_RUNS_VIDEO) {
        return;
    }

    let sequence = decode(COLOUR_RUNS_VIDEO).expect("Failed to decode fixture");
    assert_eq!(sequence.len(), 30);

    let channels: Vec<usize> = sequence.frames().map(dominant_channel).collect();
    let expected: Vec<usize> = (0..30).map(|index| index / 10).collect();
    assert_eq!(channels, expected);
}

#[test]
fn decoded_frames_are_rgb_ordered() {
    if !fixture_available(COLOUR_RUNS_VIDEO) {
        return;
    }

    let sequence = decode(COLOUR_RUNS_VIDEO).expect("Failed to decode fixture");
    let red = sequence.frame(0).unwrap();
    let pixel = [red[[48, 48, 0]], red[[48, 48, 1]], red[[48, 48, 2]]];
    assert!(pixel[0] > 200, "red channel too low: {pixel:?}");
    assert!(pixel[1] < 60 && pixel[2] < 60, "red frame leaks: {pixel:?}");

    let blue = sequence.frame(29).unwrap();
    assert!(blue[[48, 48, 2]] > 200);
    assert!(blue[[48, 48, 0]] < 60);
}

#[test]
fn zero_frame_container_is_empty_video() {
    if !fixture_available(EMPTY_VIDEO) {
        return;
    }

    let error = decode(EMPTY_VIDEO).unwrap_err();
    assert!(matches!(error, ScoreError::EmptyVideo { .. }), "{error}");
    assert_eq!(error.kind(), ErrorKind::Decode);
}

#[test]
fn cancellation_is_checked_before_the_first_frame() {
    if !fixture_available(EMPTY_VIDEO) {
        return;
    }

    // With no frames to decode, only a check ahead of the first pull can
    // observe the token.
    let token = CancellationToken::new();
    token.cancel();
    let options = ScoreOptions::new().with_cancellation(token);

    let error = decode_with_options(EMPTY_VIDEO, &options).unwrap_err();
    assert!(matches!(error, ScoreError::Cancelled), "{error}");
}

#[test]
fn probe_reports_stream_metadata() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let metadata = probe(SAMPLE_VIDEO).expect("Failed to probe fixture");
    assert_eq!(metadata.width, 100);
    assert_eq!(metadata.height, 100);
    assert!((metadata.frames_per_second - 25.0).abs() < 0.01);
    assert_eq!(metadata.frame_count, 50);
    assert!(!metadata.codec.is_empty());
    assert!(metadata.format.contains("mp4"));
}

#[test]
fn decode_reports_progress_per_frame() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let progress = RecordingProgress::new();
    let options = ScoreOptions::new()
        .with_progress(progress.clone())
        .with_progress_interval(10);
    decode_with_options(SAMPLE_VIDEO, &options).expect("Failed to decode fixture");

    let infos = progress.snapshot();
    assert!(infos.iter().all(|info| info.operation == OperationType::Decoding));
    let last = infos.last().expect("No progress reported");
    assert_eq!(last.current, 50);
    assert_eq!(last.total, Some(50));
    assert_eq!(infos.len(), 6);
}

#[test]
fn zero_progress_interval_reports_every_frame() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let progress = RecordingProgress::new();
    let options = ScoreOptions::new()
        .with_progress(progress.clone())
        .with_progress_interval(0);
    decode_with_options(SAMPLE_VIDEO, &options).expect("Failed to decode fixture");

    let currents: Vec<u64> = progress.snapshot().iter().map(|info| info.current).collect();
    let mut expected: Vec<u64> = (1..=50).collect();
    expected.push(50);
    assert_eq!(currents, expected);
}

#[test]
fn cancelled_decode_returns_cancelled() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let token = CancellationToken::new();
    token.cancel();
    let options = ScoreOptions::new().with_cancellation(token);

    let error = decode_with_options(SAMPLE_VIDEO, &options).unwrap_err();
    assert!(matches!(error, ScoreError::Cancelled));
}

#[test]
fn score_video_end_to_end() {
    if !fixture_available(SAMPLE_VIDEO) {
        return;
    }

    let mut scorer =
        ForgeryScorer::new(StubClassifier::clip_mean(), ScoreOptions::new()).unwrap();
    let report = scorer.score_video(SAMPLE_VIDEO).expect("Failed to score fixture");

    assert_eq!(report.frame_count, 50);
    assert_eq!(report.batch_count, 2);
    assert!((0.0..=1.0).contains(&report.score.value()));
}

#[test]
fn small_video_is_a_shape_error() {
    if !fixture_available(SMALL_VIDEO) {
        return;
    }

    let mut scorer = ForgeryScorer::new(StubClassifier::default(), ScoreOptions::new()).unwrap();
    let error = scorer.score_video(SMALL_VIDEO).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Shape);
    assert!(scorer.classifier().calls.is_empty());
}

#[test]
fn nonexistent_file_is_a_decode_error() {
    let error = decode("this_file_does_not_exist.mp4").unwrap_err();
    assert!(matches!(error, ScoreError::FileOpen { .. }));
    assert_eq!(error.kind(), ErrorKind::Decode);
    assert!(
        error.to_string().contains("this_file_does_not_exist.mp4"),
        "Error message should name the path: {error}"
    );
}

#[test]
fn garbage_file_is_a_decode_error() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("invalid.mp4");
    std::fs::write(&path, b"this is not a video file").expect("Failed to write invalid file");

    let error = decode(&path).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode);
}

#[test]
fn empty_file_is_a_decode_error() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("empty.mp4");
    std::fs::write(&path, b"").expect("Failed to write empty file");

    let error = decode(&path).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode);
}
