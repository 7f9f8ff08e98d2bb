//! Score aggregation tests.

use forgery_score::{ErrorKind, ScoreError, aggregate, sigmoid};
use ndarray::{Array2, array};

#[test]
fn sigmoid_reference_values() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert!((sigmoid(2.0) - 0.880_797).abs() < 1e-6);
    assert!((sigmoid(-2.0) - 0.119_203).abs() < 1e-6);
}

#[test]
fn sigmoid_saturates_without_nan() {
    assert_eq!(sigmoid(1_000.0), 1.0);
    assert_eq!(sigmoid(-1_000.0), 0.0);
    assert_eq!(sigmoid(f32::INFINITY), 1.0);
    assert_eq!(sigmoid(f32::NEG_INFINITY), 0.0);
}

#[test]
fn single_logit_is_exactly_its_sigmoid() {
    for logit in [-3.5_f32, -0.25, 0.0, 0.7, 12.0] {
        let score = aggregate(&[array![[logit]]]).unwrap();
        assert_eq!(score.value(), sigmoid(logit), "logit {logit}");
    }
}

#[test]
fn opposite_extremes_average_to_one_half() {
    let score = aggregate(&[array![[80.0], [-80.0]]]).unwrap();
    assert!((score.value() - 0.5).abs() < 1e-6);
}

#[test]
fn score_is_independent_of_batch_boundaries() {
    let logits: Vec<f32> = (0..10).map(|i| i as f32 * 0.37 - 1.5).collect();
    let column = |values: &[f32]| Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap();

    let whole = aggregate(&[column(&logits)]).unwrap();
    let halves = aggregate(&[column(&logits[..5]), column(&logits[5..])]).unwrap();
    let uneven = aggregate(&[
        column(&logits[..1]),
        column(&logits[1..8]),
        column(&logits[8..]),
    ])
    .unwrap();

    assert_eq!(whole, halves);
    assert_eq!(whole, uneven);
}

#[test]
fn every_logit_in_a_row_counts() {
    let score = aggregate(&[array![[80.0, -80.0], [80.0, 80.0]]]).unwrap();
    assert!((score.value() - 0.75).abs() < 1e-6);
}

#[test]
fn score_stays_in_unit_interval() {
    let score = aggregate(&[array![[1e30], [3.0]], array![[-1e30]]]).unwrap();
    assert!((0.0..=1.0).contains(&score.value()));
}

#[test]
fn no_batches_is_an_error() {
    let error = aggregate(&[]).unwrap_err();
    assert!(matches!(error, ScoreError::NoLogits));
    assert_eq!(error.kind(), ErrorKind::Inference);
}

#[test]
fn empty_batches_are_an_error() {
    let error = aggregate(&[Array2::<f32>::zeros((0, 1))]).unwrap_err();
    assert!(matches!(error, ScoreError::NoLogits));
}

#[test]
fn mismatched_row_widths_are_rejected() {
    let error = aggregate(&[array![[0.0]], array![[0.0, 1.0]]]).unwrap_err();
    assert!(matches!(error, ScoreError::LogitsMismatch(_)));
}

#[test]
fn score_displays_as_plain_number() {
    let score = aggregate(&[array![[0.0]]]).unwrap();
    assert_eq!(score.to_string(), "0.5");
    assert_eq!(f32::from(score), 0.5);
}
