use approx::assert_abs_diff_eq;
use ndarray::{Array, Array2};
use rustycell::prelude::*;
use std::sync::Arc;

#[test]
fn test_variational_dropout_mask_is_tied_across_steps() {
    let mut dropout = VariationalDropout::with_seed(0.5, 7).unwrap();
    dropout.begin_sequence(4, 32);

    let step_1 = dropout.apply(Array2::ones((4, 32))).unwrap();
    let step_2 = dropout.apply(Array2::ones((4, 32))).unwrap();
    let step_3 = dropout.apply(Array2::from_elem((4, 32), 2.0)).unwrap();

    assert_eq!(step_1, step_2);
    assert_eq!(step_3, &step_1 * 2.0);
    assert_eq!(dropout.get_mask().unwrap(), &step_1);
}

#[test]
fn test_variational_dropout_mask_is_redrawn_per_run() {
    let mut dropout = VariationalDropout::with_seed(0.5, 11).unwrap();
    dropout.begin_sequence(2, 64);
    let first = dropout.get_mask().unwrap().clone();
    dropout.begin_sequence(2, 64);
    let second = dropout.get_mask().unwrap().clone();
    assert_ne!(first, second);

    // The same seed reproduces the same sequence of masks
    let mut replay = VariationalDropout::with_seed(0.5, 11).unwrap();
    replay.begin_sequence(2, 64);
    assert_eq!(replay.get_mask().unwrap(), &first);
}

#[test]
fn test_variational_dropout_scaling() {
    let rate = 0.25;
    let mut dropout = VariationalDropout::with_seed(rate, 3).unwrap();
    dropout.begin_sequence(10, 100);
    let output = dropout.apply(Array2::ones((10, 100))).unwrap();

    let kept = output.iter().filter(|&&x| x != 0.0).count();
    assert!(
        kept > 650 && kept < 850,
        "Expected ~750 kept values, got {}",
        kept
    );
    for &v in output.iter().filter(|&&x| x != 0.0) {
        assert_abs_diff_eq!(v, 1.0 / (1.0 - rate), epsilon = 1e-6);
    }
    println!("Variational dropout kept {} out of 1000 values", kept);
}

#[test]
fn test_variational_dropout_inference_and_zero_rate() {
    let input = Array2::from_shape_fn((3, 8), |(i, j)| (i * 8 + j) as f32);

    let mut dropout = VariationalDropout::with_seed(0.5, 1).unwrap();
    dropout.set_training(false);
    assert!(!dropout.is_training());
    assert!(!dropout.is_active());
    dropout.begin_sequence(3, 8);
    assert!(dropout.get_mask().is_none());
    assert_eq!(dropout.apply(input.clone()).unwrap(), input);

    let mut zero = VariationalDropout::with_seed(0.0, 1).unwrap();
    zero.begin_sequence(3, 8);
    assert_eq!(zero.apply(input.clone()).unwrap(), input);
}

#[test]
fn test_variational_dropout_errors() {
    for rate in [1.0, 1.5, -0.1, f32::NAN] {
        assert!(matches!(
            VariationalDropout::new(rate),
            Err(ModelError::ConfigurationError(_))
        ));
    }

    let dropout = VariationalDropout::with_seed(0.5, 1).unwrap();
    assert!(matches!(
        dropout.apply(Array2::ones((2, 4))),
        Err(ModelError::ProcessingError(_))
    ));

    let mut dropout = VariationalDropout::with_seed(0.5, 1).unwrap();
    dropout.begin_sequence(2, 4);
    assert!(matches!(
        dropout.apply(Array2::ones((3, 4))),
        Err(ModelError::ShapeMismatch(_))
    ));
}

fn seeded_cell(dropout_rate: f32, seed: u64) -> LstmCell {
    let config = LstmCellConfig {
        hidden_size: 4,
        dropout_rate,
        seed: Some(seed),
        ..LstmCellConfig::default()
    };
    let mut cell = LstmCell::with_backend(&config, Arc::new(ReferenceBackend)).unwrap();
    cell.set_input_weights_data(Some(Arc::new(Array2::from_shape_fn((16, 3), |(i, j)| {
        ((i + 2 * j) as f32 * 0.31).sin()
    }))))
    .unwrap();
    cell.set_recur_weights_data(Some(Arc::new(Array2::from_shape_fn((16, 4), |(i, j)| {
        ((3 * i + j) as f32 * 0.17).cos() * 0.5
    }))));
    cell
}

#[test]
fn test_lstm_cell_dropout_rate_zero_matches_unmasked_run() {
    let x = Array::from_shape_fn((2, 6, 3), |(b, t, i)| ((b + t + i) as f32 * 0.4).sin()).into_dyn();

    let mut unmasked = seeded_cell(0.0, 5);
    let mut inference = seeded_cell(0.4, 5);
    inference.set_training(false);
    assert_eq!(
        unmasked.forward(&x).unwrap(),
        inference.forward(&x).unwrap()
    );

    let mut training = seeded_cell(0.4, 5);
    assert_ne!(unmasked.forward(&x).unwrap(), training.forward(&x).unwrap());
}

#[test]
fn test_lstm_cell_dropout_is_reproducible_with_seed() {
    let x = Array::from_shape_fn((2, 6, 3), |(b, t, i)| ((b * t + i) as f32 * 0.3).cos()).into_dyn();

    let mut a = seeded_cell(0.3, 42);
    let mut b = seeded_cell(0.3, 42);
    assert_eq!(a.forward(&x).unwrap(), b.forward(&x).unwrap());

    // Toggling training mode through the graph-node interface disables the masks
    a.set_training_if_mode_dependent(false);
    let mut unmasked = seeded_cell(0.0, 42);
    assert_eq!(a.forward(&x).unwrap(), unmasked.forward(&x).unwrap());
}
