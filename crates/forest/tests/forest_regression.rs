use agrocast_forest::{
    mean_absolute_error, r2_score, train_test_split, ForestConfig, ForestModel, ForestTrainer,
    TrainingSet,
};

/// Noise-free linear series: target depends on the first feature only.
fn trend_set(n: usize) -> TrainingSet {
    let features = (0..n)
        .map(|i| vec![i as f64, ((i * 37) % 11) as f64])
        .collect();
    let targets = (0..n).map(|i| 1000.0 + 5.0 * i as f64).collect();
    TrainingSet::new(features, targets).unwrap()
}

#[test]
fn forest_interpolates_held_out_rows() {
    let data = trend_set(200);
    let (train_rows, test_rows) = train_test_split(data.len(), 0.2, 42).unwrap();
    let train = data.subset(&train_rows).unwrap();
    let test = data.subset(&test_rows).unwrap();

    let model = ForestTrainer::new(ForestConfig {
        n_estimators: 50,
        ..ForestConfig::default()
    })
    .train(&train)
    .unwrap();

    let predicted = model.predict_batch(&test.features).unwrap();
    let mae = mean_absolute_error(&test.targets, &predicted).unwrap();
    let r2 = r2_score(&test.targets, &predicted).unwrap();

    // neighbours are 5 apart, so held-out error stays within a few steps
    assert!(mae < 25.0, "mae {mae}");
    assert!(r2 > 0.95, "r2 {r2}");
}

#[test]
fn forest_survives_artifact_roundtrip() {
    let model = ForestTrainer::new(ForestConfig {
        n_estimators: 10,
        ..ForestConfig::default()
    })
    .train(&trend_set(50))
    .unwrap();

    let restored = ForestModel::from_bytes(&model.to_bytes().unwrap()).unwrap();
    for x in [0.0, 12.5, 49.0, 80.0] {
        assert_eq!(
            model.predict(&[x, 3.0]).unwrap(),
            restored.predict(&[x, 3.0]).unwrap()
        );
    }
}

#[test]
fn forest_does_not_extrapolate_past_training_range() {
    let data = trend_set(60);
    let model = ForestTrainer::new(ForestConfig::default())
        .train(&data)
        .unwrap();

    let max_target = data.targets.iter().cloned().fold(f64::MIN, f64::max);
    let beyond = model.predict(&[500.0, 0.0]).unwrap();
    assert!(beyond <= max_target);
    assert!(beyond > max_target - 100.0);
}
