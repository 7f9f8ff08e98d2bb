//! Progress and cancellation tests.

mod common;

use std::sync::Arc;

use forgery_score::{
    CancellationToken, ForgeryScorer, OperationType, ProgressCallback, ProgressInfo, ScoreOptions,
};

use common::{RecordingProgress, StubClassifier, synthetic_sequence};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_from_another_thread() {
    let token = CancellationToken::new();
    let handle = token.clone();
    std::thread::spawn(move || handle.cancel())
        .join()
        .expect("cancel thread panicked");
    assert!(token.is_cancelled());
}

/// Cancels the run as soon as the first batch completes.
struct CancelAfterFirstBatch {
    token: CancellationToken,
}

impl ProgressCallback for CancelAfterFirstBatch {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.operation == OperationType::Inference && info.current >= 1 {
            self.token.cancel();
        }
    }
}

#[test]
fn cancellation_between_batches_stops_the_run() {
    let token = CancellationToken::new();
    let options = ScoreOptions::new()
        .with_batch_size(4)
        .with_cancellation(token.clone())
        .with_progress(Arc::new(CancelAfterFirstBatch { token }));
    let mut scorer = ForgeryScorer::new(StubClassifier::default(), options).unwrap();

    let error = scorer
        .score_frames(&synthetic_sequence(12, 88, 88))
        .unwrap_err();
    assert!(matches!(error, forgery_score::ScoreError::Cancelled));
    assert_eq!(scorer.classifier().calls.len(), 1);
}

// ── ProgressInfo ───────────────────────────────────────────────────

#[test]
fn progress_info_has_timing_and_item() {
    let progress = RecordingProgress::new();
    let options = ScoreOptions::new()
        .with_batch_size(5)
        .with_progress(progress.clone());
    let mut scorer = ForgeryScorer::new(StubClassifier::default(), options).unwrap();
    scorer.score_frames(&synthetic_sequence(10, 88, 88)).unwrap();

    let infos = progress.snapshot();
    assert_eq!(infos.len(), 3);

    assert_eq!(infos[0].current_item, Some(0));
    assert_eq!(infos[1].current_item, Some(1));
    assert_eq!(infos[2].current_item, None);
    assert_eq!(infos[0].percentage, Some(50.0));
    assert!(infos[0].estimated_remaining.is_some());
    assert!(infos.windows(2).all(|pair| pair[0].elapsed <= pair[1].elapsed));
}
