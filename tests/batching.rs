//! Batching tests: batch counts, boundaries, order preservation, and fused
//! preprocessing.

mod common;

use forgery_score::{
    ChannelReduction, ErrorKind, Preprocessor, ScoreError, ScoreOptions, batch_count, batches,
};
use ndarray::{Axis, s};

use common::{solid_frame, synthetic_sequence};

#[test]
fn batch_count_rounds_up() {
    assert_eq!(batch_count(50, 32), 2);
    assert_eq!(batch_count(64, 32), 2);
    assert_eq!(batch_count(65, 32), 3);
    assert_eq!(batch_count(1, 32), 1);
    assert_eq!(batch_count(0, 32), 0);
    assert_eq!(batch_count(10, 0), 0);
}

#[test]
fn fifty_frames_split_into_thirty_two_and_eighteen() {
    let sequence = synthetic_sequence(50, 8, 8);
    let batches: Vec<_> = batches(&sequence, 32).unwrap().collect();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 32);
    assert_eq!(batches[1].len(), 18);
    assert_eq!(batches[0].frame_range(), 0..32);
    assert_eq!(batches[1].frame_range(), 32..50);
    assert_eq!(batches[0].index, 0);
    assert_eq!(batches[1].index, 1);
}

#[test]
fn every_batch_but_the_last_is_full() {
    for (len, size) in [(1, 1), (7, 3), (30, 10), (31, 10), (5, 32)] {
        let sequence = synthetic_sequence(len, 4, 4);
        let sizes: Vec<usize> = batches(&sequence, size).unwrap().map(|b| b.len()).collect();

        assert_eq!(sizes.len(), batch_count(len, size), "len={len} size={size}");
        let (last, full) = sizes.split_last().unwrap();
        assert!(full.iter().all(|&s| s == size), "len={len} size={size}");
        assert!(*last >= 1 && *last <= size);
        assert_eq!(sizes.iter().sum::<usize>(), len);
    }
}

#[test]
fn size_hint_is_exact() {
    let sequence = synthetic_sequence(10, 4, 4);
    let mut iter = batches(&sequence, 4).unwrap();
    assert_eq!(iter.len(), 3);
    iter.next();
    assert_eq!(iter.len(), 2);
    iter.next();
    iter.next();
    assert_eq!(iter.len(), 0);
    assert!(iter.next().is_none());
}

#[test]
fn zero_batch_size_is_rejected() {
    let sequence = synthetic_sequence(3, 4, 4);
    let error = batches(&sequence, 0).unwrap_err();
    assert!(matches!(error, ScoreError::InvalidConfiguration(_)));
    assert_eq!(error.kind(), ErrorKind::Configuration);
}

#[test]
fn concatenated_batches_reproduce_frame_order() {
    let sequence = synthetic_sequence(23, 6, 5);
    let regrouped: Vec<_> = batches(&sequence, 5)
        .unwrap()
        .flat_map(|batch| batch.frames().map(|frame| frame.to_owned()).collect::<Vec<_>>())
        .collect();

    assert_eq!(regrouped.len(), sequence.len());
    for (index, frame) in regrouped.iter().enumerate() {
        assert_eq!(frame.view(), sequence.frame(index).unwrap(), "frame {index}");
    }
}

#[test]
fn preprocessed_batch_stacks_clips_in_order() {
    let frames = (0..5u8)
        .map(|level| solid_frame(100, 100, [level * 40; 3]))
        .collect();
    let sequence = forgery_score::FrameSequence::from_frames(frames).unwrap();
    let preprocessor = Preprocessor::from_options(&ScoreOptions::new());

    let batch = batches(&sequence, 3).unwrap().nth(1).unwrap();
    let clips = batch.preprocess(&preprocessor).unwrap();

    assert_eq!(clips.index, 1);
    assert_eq!(clips.start, 3);
    assert_eq!(clips.tensor.shape(), &[2, 1, 1, 88, 88]);
    for offset in 0..clips.len() {
        let expected = preprocessor
            .preprocess(sequence.frame(3 + offset).unwrap(), 3 + offset)
            .unwrap();
        assert_eq!(clips.tensor.index_axis(Axis(0), offset), expected.view());
    }
}

#[test]
fn planes_as_time_batch_shape() {
    let sequence = synthetic_sequence(4, 90, 90);
    let options = ScoreOptions::new().with_channel_reduction(ChannelReduction::PlanesAsTime);
    let preprocessor = Preprocessor::from_options(&options);

    let clips = batches(&sequence, 4)
        .unwrap()
        .next()
        .unwrap()
        .preprocess(&preprocessor)
        .unwrap();
    assert_eq!(clips.tensor.shape(), &[4, 1, 3, 88, 88]);
    assert_ne!(
        clips.tensor.slice(s![0, 0, 0, .., ..]),
        clips.tensor.slice(s![0, 0, 1, .., ..])
    );
}

#[test]
fn preprocessing_error_reports_sequence_index() {
    let sequence = synthetic_sequence(6, 40, 40);
    let preprocessor = Preprocessor::from_options(&ScoreOptions::new());

    let batch = batches(&sequence, 4).unwrap().nth(1).unwrap();
    match batch.preprocess(&preprocessor).unwrap_err() {
        ScoreError::FrameTooSmall { frame_index, .. } => assert!((4..6).contains(&frame_index)),
        other => panic!("Expected FrameTooSmall, got: {other}"),
    }
}

#[test]
fn length_hint_ignores_batch_size() {
    let sequence = synthetic_sequence(50, 88, 88);
    let preprocessor = Preprocessor::from_options(&ScoreOptions::new());

    let last = batches(&sequence, 32).unwrap().last().unwrap();
    let clips = last.preprocess(&preprocessor).unwrap();
    assert_eq!(clips.lengths(25), vec![25; 18]);
}
