//! End-to-end validation of the scoring pipeline
//!
//! Exercises the public surface the way a caller does: raw points in,
//! scores, labels and attributions out. Each test pins one observable
//! property of the pipeline.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ForestConfig, ParallelismConfig, PipelineConfig, ScoreScale};
use crate::data_structures::{Matrix, RawPoints};
use crate::error::DetectionError;
use crate::execution::{Capabilities, ExplanationOutcome, Pipeline, PipelineResult};
use crate::ml::IsolationForest;

fn pipeline() -> Pipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    Pipeline::new(PipelineConfig::default(), Capabilities::default())
}

/// Uniform cloud in `[-1, 1]^d`
fn cloud(n: usize, d: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect()
}

fn anomalous_fraction(result: &PipelineResult) -> f64 {
    result.n_anomalies() as f64 / result.n_points() as f64
}

fn attributions(result: &PipelineResult) -> &[Vec<f64>] {
    &result
        .explanation
        .explanation()
        .expect("attributions should be computed")
        .attributions
}

#[test]
fn test_output_lengths_match_input() {
    for (n, d) in [(2, 1), (7, 3), (40, 2), (150, 5)] {
        let result = pipeline().run(cloud(n, d, n as u64), 0.12, true).unwrap();
        assert_eq!(result.scores.len(), n);
        assert_eq!(result.labels.len(), n);
        assert_eq!(attributions(&result).len(), n);
        assert!(attributions(&result).iter().all(|row| row.len() == d));
    }
}

#[test]
fn test_label_fraction_tracks_contamination() {
    let points = cloud(50, 3, 11);
    for contamination in [0.02, 0.1, 0.12, 0.25, 0.5] {
        let result = pipeline().run(points.clone(), contamination, false).unwrap();
        let weight = 1.0 / result.n_points() as f64;
        assert!(
            (anomalous_fraction(&result) - contamination).abs() <= weight + 1e-12,
            "contamination {} labelled {}",
            contamination,
            anomalous_fraction(&result)
        );
    }
}

#[test]
fn test_same_seed_same_output() {
    let points = cloud(120, 4, 3);
    let first = pipeline().run(points.clone(), 0.12, true).unwrap();
    let second = pipeline().run(points.clone(), 0.12, true).unwrap();
    assert_eq!(first, second);

    let matrix = Matrix::from_rows(points).unwrap();
    let config = ForestConfig::default().with_seed(7);
    assert_eq!(
        IsolationForest::fit(&matrix, &config).unwrap(),
        IsolationForest::fit(&matrix, &config).unwrap()
    );
}

#[test]
fn test_thread_count_does_not_change_output() {
    let points = cloud(90, 3, 21);
    let single = Pipeline::new(
        PipelineConfig::default().with_parallelism(ParallelismConfig::default().with_num_threads(1)),
        Capabilities::default(),
    );
    let several = Pipeline::new(
        PipelineConfig::default().with_parallelism(ParallelismConfig::default().with_num_threads(4)),
        Capabilities::default(),
    );

    assert_eq!(
        single.run(points.clone(), 0.12, true).unwrap(),
        several.run(points, 0.12, true).unwrap()
    );
}

#[test]
fn test_different_seed_changes_scores() {
    let points = cloud(60, 2, 5);
    let reseeded = Pipeline::new(PipelineConfig::default().with_seed(1234), Capabilities::default());

    let a = pipeline().run(points.clone(), 0.12, false).unwrap();
    let b = reseeded.run(points, 0.12, false).unwrap();
    assert_ne!(a.scores, b.scores);
}

#[test]
fn test_attribution_sum_law() {
    // d = 2 enumerates orderings, d = 5 samples them
    for d in [2, 5] {
        let mut points = cloud(80, d, 40 + d as u64);
        points.push(vec![6.0; d]);

        for scale in [ScoreScale::Decision, ScoreScale::Raw] {
            let config = PipelineConfig::default().with_score_scale(scale);
            let result = Pipeline::new(config, Capabilities::default()).run(points.clone(), 0.12, true).unwrap();
            let explanation = result.explanation.explanation().unwrap();
            assert_eq!(explanation.exact, d == 2);

            for (row, score) in result.scores.iter().enumerate() {
                let reconstructed = explanation.baseline + explanation.attributions[row].iter().sum::<f64>();
                assert_relative_eq!(reconstructed, *score, max_relative = 1e-3, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_far_point_scores_below_centroid() {
    let mut points = cloud(100, 3, 8);
    let n = points.len() as f64;

    let centroid: Vec<f64> = (0..3).map(|j| points.iter().map(|p| p[j]).sum::<f64>() / n).collect();
    let std_dev = (points.iter().map(|p| (p[0] - centroid[0]).powi(2)).sum::<f64>() / n).sqrt();

    let mut far = centroid.clone();
    far[0] += 100.0 * std_dev;

    points.push(centroid);
    points.push(far);

    let result = pipeline().run(points, 0.12, false).unwrap();
    let centroid_score = result.scores[100];
    let far_score = result.scores[101];

    assert!(far_score < centroid_score);
    assert!(result.labels[101].is_anomalous());
    assert!(!result.labels[100].is_anomalous());
}

#[test]
fn test_boundary_failures() {
    assert_eq!(pipeline().run(RawPoints::default(), 0.12, true), Err(DetectionError::EmptyInput));
    assert_eq!(
        pipeline().run(vec![vec![3.0]], 0.12, true),
        Err(DetectionError::InsufficientData { samples: 1, minimum: 2 })
    );

    let points = cloud(10, 2, 1);
    for contamination in [0.0, -0.1, 0.5000001, 0.9, f64::NAN] {
        assert!(
            matches!(pipeline().run(points.clone(), contamination, true), Err(DetectionError::InvalidInput(_))),
            "contamination {}",
            contamination
        );
    }
    assert!(pipeline().run(points, 0.5, true).is_ok());
}

#[test]
fn test_malformed_points_rejected() {
    assert!(matches!(
        pipeline().run(vec![vec![1.0, 2.0], vec![1.0]], 0.12, true),
        Err(DetectionError::InvalidInput(_))
    ));
    assert!(matches!(
        pipeline().run(vec![vec![1.0], vec![f64::INFINITY]], 0.12, true),
        Err(DetectionError::InvalidInput(_))
    ));
}

#[test]
fn test_single_feature_outlier_example() {
    let points = vec![vec![0.0], vec![0.0], vec![0.0], vec![0.0], vec![10.0]];
    let result = pipeline().run(points, 0.2, true).unwrap();

    assert_eq!(result.n_anomalies(), 1);
    assert!(result.labels[4].is_anomalous());
    for i in 0..4 {
        assert!(result.scores[4] < result.scores[i]);
        assert!(!result.labels[i].is_anomalous());
    }
}

#[test]
fn test_tied_scores_at_threshold_stay_normal() {
    let mut points = vec![vec![0.0]; 9];
    points.push(vec![10.0]);

    for contamination in [0.12, 0.2] {
        let result = pipeline().run(points.clone(), contamination, false).unwrap();
        assert_eq!(result.n_anomalies(), 1, "contamination {}", contamination);
        assert!(result.labels[9].is_anomalous());
        assert!((anomalous_fraction(&result) - contamination).abs() <= 1.0 / 10.0 + 1e-12);

        // The tied run sits exactly on the threshold
        assert!(result.scores[..9].iter().all(|&score| score == 0.0));
        assert!(result.scores[9] < 0.0);
    }
}

#[test]
fn test_extreme_finite_values_are_scored() {
    let points = vec![vec![-1e308], vec![1e308], vec![0.0]];
    let result = pipeline().run(points, 0.12, true).unwrap();

    assert_eq!(result.n_points(), 3);
    assert!(result.scores.iter().all(|score| score.is_finite()));
    assert_eq!(result.explanation.status(), "computed");

    let wide = vec![vec![-f64::MAX, 1.0], vec![f64::MAX, 2.0], vec![0.0, 3.0], vec![1.0, f64::MAX]];
    assert!(pipeline().run(wide, 0.25, true).is_ok());
}

#[test]
fn test_two_feature_outlier_example() {
    let points = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![50.0, 50.0],
    ];
    let result = pipeline().run(points, 0.2, true).unwrap();

    assert_eq!(result.n_anomalies(), 1);
    assert!(result.labels[4].is_anomalous());

    let attributions = attributions(&result);
    let outlier = &attributions[4];
    assert!(outlier[0] < 0.0 && outlier[1] < 0.0);

    let smallest_outlier = outlier[0].abs().min(outlier[1].abs());
    let largest_other = attributions[..4]
        .iter()
        .flatten()
        .map(|value| value.abs())
        .fold(0.0, f64::max);
    assert!(smallest_outlier > largest_other);
}

#[test]
fn test_disabled_capability_keeps_scores() {
    let points = cloud(30, 2, 13);
    let enabled = pipeline().run(points.clone(), 0.12, true).unwrap();
    let disabled = Pipeline::new(PipelineConfig::default(), Capabilities::from_setting(Some("off")))
        .run(points, 0.12, true)
        .unwrap();

    assert_eq!(disabled.explanation, ExplanationOutcome::Disabled);
    assert_eq!(disabled.scores, enabled.scores);
    assert_eq!(disabled.labels, enabled.labels);
}
