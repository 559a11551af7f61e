use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, array};
use rustycell::prelude::*;
use std::sync::Arc;

#[test]
fn test_fully_connected_projection() {
    let mut fc = FullyConnected::new(2);
    fc.set_weights_data(Some(Arc::new(array![[1.0, 2.0, 3.0], [0.5, -1.0, 0.0]])));
    fc.set_free_term_data(Some(Arc::new(array![0.1, -0.2])));

    let x = array![[1.0, 1.0, 1.0], [2.0, 0.0, -1.0]];
    let y = fc.project(x.view()).unwrap();

    let expected = array![[6.1, -0.7], [-0.9, 0.8]];
    for (a, b) in y.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }

    // No free term behaves as zero
    fc.set_free_term_data(None);
    let y = fc.project(x.view()).unwrap();
    assert_abs_diff_eq!(y[[0, 0]], 6.0, epsilon = 1e-6);
    assert_eq!(fc.param_count(), 6);
}

#[test]
fn test_fully_connected_copy_on_write() {
    let shared = Arc::new(Array2::<f32>::ones((2, 2)));
    let mut a = FullyConnected::new(2);
    let mut b = FullyConnected::new(2);
    a.set_weights_data(Some(shared.clone()));
    b.set_weights_data(Some(shared.clone()));
    assert!(Arc::ptr_eq(&a.get_weights_data().unwrap(), &shared));

    a.update_weights(|w| w.fill(3.0)).unwrap();

    // `a` now owns a private copy; `b` and the original handle are untouched
    assert!(!Arc::ptr_eq(&a.get_weights_data().unwrap(), &shared));
    assert!(Arc::ptr_eq(&b.get_weights_data().unwrap(), &shared));
    assert_eq!(shared[[0, 0]], 1.0);
    assert_eq!(a.get_weights_data().unwrap()[[1, 1]], 3.0);

    let mut empty = FullyConnected::new(2);
    assert!(matches!(
        empty.update_weights(|w| w.fill(0.0)),
        Err(ModelError::ProcessingError(_))
    ));
}

#[test]
fn test_fully_connected_width_changes() {
    let mut fc = FullyConnected::new(4);
    fc.set_weights_data(Some(Arc::new(Array2::zeros((4, 3)))));
    fc.set_free_term_data(Some(Arc::new(Array1::zeros(4))));

    // Same width keeps the data
    fc.set_number_of_elements(4);
    assert!(fc.get_weights_data().is_some());

    fc.set_number_of_elements(8);
    assert!(fc.get_weights_data().is_none());
    assert!(fc.get_free_term_data().is_none());
    assert_eq!(fc.param_count(), 0);

    // Setting weights adopts their row count
    fc.set_weights_data(Some(Arc::new(Array2::zeros((12, 3)))));
    assert_eq!(fc.get_number_of_elements(), 12);
}

#[test]
fn test_fully_connected_check_input() {
    let mut fc = FullyConnected::new(4);
    assert!(matches!(
        fc.check_input(3, "input"),
        Err(ModelError::ProcessingError(_))
    ));

    fc.set_weights_data(Some(Arc::new(Array2::zeros((4, 3)))));
    fc.check_input(3, "input").unwrap();
    assert!(matches!(
        fc.check_input(5, "input"),
        Err(ModelError::ShapeMismatch(_))
    ));

    fc.set_free_term_data(Some(Arc::new(Array1::zeros(3))));
    assert!(matches!(
        fc.check_input(3, "input"),
        Err(ModelError::ConfigurationError(_))
    ));
}

#[test]
fn test_fully_connected_projection_rejects_mismatched_shapes() {
    let mut fc = FullyConnected::new(8);
    fc.set_weights_data(Some(Arc::new(Array2::zeros((8, 5)))));
    assert!(matches!(
        fc.project(Array2::<f32>::zeros((1, 3)).view()),
        Err(ModelError::ShapeMismatch(_))
    ));

    fc.set_weights_data(Some(Arc::new(Array2::zeros((8, 3)))));
    fc.set_free_term_data(Some(Arc::new(Array1::zeros(3))));
    assert!(matches!(
        fc.project(Array2::<f32>::zeros((1, 3)).view()),
        Err(ModelError::ConfigurationError(_))
    ));
}

#[test]
fn test_fully_connected_initialization() {
    let mut fc = FullyConnected::new(6);
    assert!(fc.initialize_if_empty(4, true, |b| b.fill(0.5)));
    assert!(!fc.initialize_if_empty(4, true, |b| b.fill(9.0)));

    let weights = fc.get_weights_data().unwrap();
    assert_eq!(weights.dim(), (6, 4));
    for col in weights.columns() {
        let norm = col.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-5);
    }
    assert!(fc.get_free_term_data().unwrap().iter().all(|&b| b == 0.5));
    assert_eq!(fc.param_count(), 6 * 4 + 6);

    let mut glorot = FullyConnected::new(6);
    glorot.initialize_if_empty(4, false, |_| {});
    let limit = (6.0f32 / 10.0).sqrt();
    assert!(
        glorot
            .get_weights_data()
            .unwrap()
            .iter()
            .all(|w| w.abs() <= limit)
    );
}

#[test]
fn test_lstm_cell_weights_are_shared_until_mutated() {
    let weights = Arc::new(Array2::from_elem((8, 3), 0.1f32));
    let mut a = LstmCell::new(2, 0.0, false).unwrap();
    let mut b = LstmCell::new(2, 0.0, false).unwrap();
    a.set_input_weights_data(Some(weights.clone())).unwrap();
    b.set_input_weights_data(Some(weights.clone())).unwrap();

    assert!(Arc::ptr_eq(&a.get_input_weights_data().unwrap(), &weights));
    assert!(Arc::ptr_eq(
        &a.get_input_weights_data().unwrap(),
        &b.get_input_weights_data().unwrap()
    ));

    a.update_input_weights(|w| w[[0, 0]] = -1.0).unwrap();
    assert!(!Arc::ptr_eq(&a.get_input_weights_data().unwrap(), &weights));
    assert!(Arc::ptr_eq(&b.get_input_weights_data().unwrap(), &weights));
    assert_eq!(weights[[0, 0]], 0.1);
}
