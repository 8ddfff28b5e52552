//! Integration tests for loading, splitting and generating datasets

#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]

use std::fs;
use std::path::Path;

use ndarray::Array2;
use pumpsched_core::data::{load_dataset, write_matrix};
use pumpsched_core::synthetic::{generate_dataset, ProfilePattern, SyntheticConfig};
use pumpsched_core::{SchedError, TableOptions, HOURS};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn labelled_table(path: &Path, rows: &[Vec<f64>]) {
    let mut text = String::from("date");
    for hour in 0..HOURS {
        text.push_str(&format!(",{hour}"));
    }
    text.push('\n');
    for (day, row) in rows.iter().enumerate() {
        text.push_str(&format!("2024-01-{:02}", day + 1));
        for value in row {
            text.push_str(&format!(",{value}"));
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

/// Labelled tables load, flip and split into train/held-out days
#[test]
fn test_load_flip_and_split() {
    let dir = tempfile::tempdir().unwrap();
    let profiles_path = dir.path().join("profiles.csv");
    let prices_path = dir.path().join("prices.csv");

    let profile_rows: Vec<Vec<f64>> = (0..5)
        .map(|d| (0..HOURS).map(|h| 20.0 + d as f64 + h as f64 * 0.1).collect())
        .collect();
    let price_rows: Vec<Vec<f64>> = (0..5)
        .map(|d| (0..HOURS).map(|h| (h * 4 + d) as f64).collect())
        .collect();
    labelled_table(&profiles_path, &profile_rows);
    labelled_table(&prices_path, &price_rows);

    let options = TableOptions {
        day_label_column: true,
    };
    let dataset = load_dataset(&profiles_path, &prices_path, options)
        .unwrap()
        .with_flipped_profiles();
    assert_eq!(dataset.len(), 5);
    assert_eq!(dataset.profiles()[[2, 0]], -22.0);
    assert_eq!(dataset.prices()[[4, 1]], 8.0);

    let (train, held_out) = dataset.split(0.8);
    assert_eq!(train.len(), 4);
    assert_eq!(held_out.len(), 1);
    // Order is preserved: the last day is held out
    assert_eq!(held_out.profiles()[[0, 0]], -24.0);
}

/// Unlabelled tables read as-is; a label column without the option is rejected
#[test]
fn test_label_column_must_be_declared() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prices.csv");
    labelled_table(&path, &[vec![1.0; HOURS]]);

    let err = load_dataset(&path, &path, TableOptions::default()).unwrap_err();
    assert!(matches!(err, SchedError::Shape { actual: 25, .. }));
}

/// Generated data written to disk loads back into the same dataset shape
#[test]
fn test_generated_dataset_round_trip_through_csv() {
    let mut rng = StdRng::seed_from_u64(5);
    let history = Array2::from_shape_fn((3, HOURS), |(d, h)| {
        if (17..23).contains(&h) {
            0.0
        } else {
            -20.5 + 0.1 * d as f64
        }
    });
    let pattern = ProfilePattern::from_days(history.view()).unwrap();
    let dataset = generate_dataset(12, &pattern, &SyntheticConfig::default(), &mut rng).unwrap();
    assert_eq!(dataset.len(), 12);
    assert!(dataset.prices().iter().all(|p| *p >= 0.0));

    let (low, high) = pattern.bounds();
    assert!(dataset.profiles().iter().all(|v| *v >= low && *v <= high));

    let dir = tempfile::tempdir().unwrap();
    let profiles_path = dir.path().join("profiles.csv");
    let prices_path = dir.path().join("prices.csv");
    write_matrix(&profiles_path, &dataset.profiles().to_owned()).unwrap();
    write_matrix(&prices_path, &dataset.prices().to_owned()).unwrap();

    let loaded = load_dataset(&profiles_path, &prices_path, TableOptions::default()).unwrap();
    assert_eq!(loaded.len(), 12);
    let stats = loaded.stats();
    assert!(stats.prices.min >= 0.0);
    assert!(stats.profiles.max <= high);
}
