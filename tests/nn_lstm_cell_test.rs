use approx::assert_abs_diff_eq;
use ndarray::{Array, Array1, Array2};
use rustycell::neural_network::{sigmoid, tanh};
use rustycell::prelude::*;
use std::sync::Arc;

fn pattern(shape: (usize, usize), phase: f32) -> Array2<f32> {
    Array2::from_shape_fn(shape, |(i, j)| ((i * 7 + j * 3) as f32 * phase).sin() * 0.5)
}

fn configured_cell(hidden: usize, input: usize, compatibility_mode: bool) -> LstmCell {
    let mut cell = LstmCell::new(hidden, 0.0, compatibility_mode).unwrap();
    cell.set_input_weights_data(Some(Arc::new(pattern((4 * hidden, input), 0.37))))
        .unwrap();
    cell.set_recur_weights_data(Some(Arc::new(pattern((4 * hidden, hidden), 0.53))));
    cell.set_input_free_term_data(Some(Arc::new(Array1::from_shape_fn(4 * hidden, |i| {
        (i as f32 * 0.11).cos() * 0.2
    }))));
    cell
}

#[test]
fn test_lstm_cell_hand_computed_single_step() {
    // hidden_size=8, input_size=4, constant weights, zero initial state
    for backend in [
        Arc::new(CpuBackend) as Arc<dyn Backend>,
        Arc::new(ReferenceBackend) as Arc<dyn Backend>,
    ] {
        let config = LstmCellConfig {
            hidden_size: 8,
            ..LstmCellConfig::default()
        };
        let mut cell = LstmCell::with_backend(&config, backend).unwrap();
        cell.set_input_weights_data(Some(Arc::new(Array2::from_elem((32, 4), 0.25))))
            .unwrap();
        cell.set_recur_weights_data(Some(Arc::new(Array2::from_elem((32, 8), 0.1))));
        cell.reshape(&[1, 4]).unwrap();

        let x = Array::ones((1, 4)).into_dyn();
        let output = cell.run_once(&x).unwrap();

        // Every gate sees 0.25 * 4 = 1.0 and the previous state is zero
        let gate = sigmoid(1.0);
        let expected_c = gate * tanh(1.0);
        let expected_h = gate * tanh(expected_c);

        assert_eq!(output.shape(), &[1, 8]);
        for &c in cell.cell_state().unwrap().iter() {
            assert_eq!(c, expected_c);
        }
        for &h in output.iter() {
            assert_eq!(h, expected_h);
        }
        println!("Hand-computed step matches: C={}, H={}", expected_c, expected_h);
    }
}

#[test]
fn test_lstm_cell_forget_gate_preserves_spike() {
    // Two steps: a spike at step 1, silence at step 2. The forget gate is saturated near 1
    // and the input gate only opens for the spike.
    let hidden = 2;
    let mut w = Array2::<f32>::zeros((4 * hidden, 1));
    let mut b = Array1::<f32>::zeros(4 * hidden);
    for j in 0..hidden {
        w[[GateOut::Main as usize * hidden + j, 0]] = 1.0;
        w[[GateOut::Input as usize * hidden + j, 0]] = 20.0;
        b[GateOut::Forget as usize * hidden + j] = 10.0;
        b[GateOut::Input as usize * hidden + j] = -10.0;
    }

    let mut cell = LstmCell::new(hidden, 0.0, false).unwrap();
    cell.set_input_weights_data(Some(Arc::new(w))).unwrap();
    cell.set_input_free_term_data(Some(Arc::new(b)));
    cell.set_recur_weights_data(Some(Arc::new(Array2::zeros((4 * hidden, hidden)))));
    cell.reshape(&[1, 1]).unwrap();

    cell.run_once(&Array::ones((1, 1)).into_dyn()).unwrap();
    let c1 = cell.cell_state().unwrap().clone();
    cell.run_once(&Array::zeros((1, 1)).into_dyn()).unwrap();
    let c2 = cell.cell_state().unwrap().clone();

    assert!(c1[[0, 0]] > 0.7);
    for (a, b) in c1.iter().zip(c2.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
}

#[test]
fn test_lstm_cell_compatibility_mode_changes_only_output() {
    let mut standard = configured_cell(5, 3, false);
    let mut compat = configured_cell(5, 3, true);
    standard.reshape(&[2, 3]).unwrap();
    compat.reshape(&[2, 3]).unwrap();

    for t in 0..3 {
        let x = Array::from_shape_fn((2, 3), |(i, j)| (i + j + t) as f32 * 0.3 - 0.4).into_dyn();
        let out_standard = standard.run_once(&x).unwrap();
        let out_compat = compat.run_once(&x).unwrap();

        assert_eq!(standard.cell_state(), compat.cell_state());
        assert_eq!(standard.hidden_state(), compat.hidden_state());

        let expected_compat = compat.cell_state().unwrap().mapv(tanh).into_dyn();
        assert_eq!(out_compat, expected_compat);
        assert_eq!(out_standard, standard.hidden_state().unwrap().clone().into_dyn());
        assert_ne!(out_standard, out_compat);
    }
}

#[test]
fn test_lstm_cell_compatibility_mode_differs_only_where_reset_is_open() {
    // Reset saturates to 1 on the first two channels and stays near 0.27 on the rest
    let (hidden, input) = (4, 2);
    let saturated = 2;
    let mut free_term = Array1::<f32>::zeros(4 * hidden);
    for j in 0..hidden {
        free_term[GateOut::Reset as usize * hidden + j] = if j < saturated { 30.0 } else { -1.0 };
    }

    let build = |compatibility_mode: bool| {
        let mut cell = LstmCell::new(hidden, 0.0, compatibility_mode).unwrap();
        cell.set_input_weights_data(Some(Arc::new(pattern((4 * hidden, input), 0.37))))
            .unwrap();
        cell.set_input_free_term_data(Some(Arc::new(free_term.clone())));
        cell.set_recur_weights_data(Some(Arc::new(Array2::zeros((4 * hidden, hidden)))));
        cell.reshape(&[3, input]).unwrap();
        cell
    };
    let mut standard = build(false);
    let mut compat = build(true);

    for t in 0..4 {
        let x = Array::from_shape_fn((3, input), |(i, j)| (i + 2 * j + t) as f32 * 0.4 - 0.9)
            .into_dyn();
        let out_standard = standard.run_once(&x).unwrap();
        let out_compat = compat.run_once(&x).unwrap();
        assert_eq!(standard.cell_state(), compat.cell_state());

        for b in 0..3 {
            for j in 0..hidden {
                let (s, c) = (out_standard[[b, j]], out_compat[[b, j]]);
                if j < saturated {
                    assert_eq!(s, c);
                } else if c != 0.0 {
                    assert_ne!(s, c);
                }
            }
        }
    }
}

#[test]
fn test_lstm_cell_refuses_steps_after_incompatible_weights() {
    let mut cell = configured_cell(2, 3, false);
    cell.reshape(&[1, 3]).unwrap();
    let x = Array::ones((1, 3)).into_dyn();
    cell.run_once(&x).unwrap();

    cell.set_input_free_term_data(Some(Arc::new(Array1::zeros(3))));
    assert!(matches!(
        cell.run_once(&x),
        Err(ModelError::ProcessingError(_))
    ));

    cell.set_input_free_term_data(None);
    cell.update_input_weights(|w| *w = Array2::zeros((8, 5)))
        .unwrap();
    assert!(matches!(
        cell.run_once(&x),
        Err(ModelError::ProcessingError(_))
    ));

    // Reshaping for the new width accepts the weights again
    cell.reshape(&[1, 5]).unwrap();
    let h = cell.run_once(&Array::ones((1, 5)).into_dyn()).unwrap();
    assert_eq!(h.shape(), &[1, 2]);
}

#[test]
fn test_lstm_cell_hidden_size_follows_input_weights() {
    let mut cell = LstmCell::new(3, 0.0, false).unwrap();
    assert_eq!(cell.get_hidden_size(), 3);

    for rows in [4, 12, 40] {
        cell.set_input_weights_data(Some(Arc::new(Array2::zeros((rows, 6)))))
            .unwrap();
        assert_eq!(cell.get_hidden_size(), rows / 4);
        assert_eq!(cell.config().hidden_size, rows / 4);
    }

    let result = cell.set_input_weights_data(Some(Arc::new(Array2::zeros((10, 6)))));
    assert!(matches!(result, Err(ModelError::ConfigurationError(_))));
    assert_eq!(cell.get_hidden_size(), 10);
}

#[test]
fn test_lstm_cell_set_hidden_size_drops_weights() {
    let mut cell = LstmCell::new(4, 0.0, false).unwrap();
    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.get_input_weights_data().unwrap().dim(), (16, 3));
    assert_eq!(cell.get_recur_weights_data().unwrap().dim(), (16, 4));

    cell.set_hidden_size(6).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::Unbuilt);
    assert!(cell.get_input_weights_data().is_none());
    assert!(cell.get_recur_weights_data().is_none());

    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.get_input_weights_data().unwrap().dim(), (24, 3));
    assert_eq!(cell.get_recur_weights_data().unwrap().dim(), (24, 6));
    assert!(matches!(
        cell.set_hidden_size(0),
        Err(ModelError::ConfigurationError(_))
    ));
}

#[test]
fn test_lstm_cell_default_initialization() {
    let mut cell = LstmCell::new(3, 0.0, false).unwrap();
    cell.reshape(&[1, 5]).unwrap();

    let free_term = cell.get_input_free_term_data().unwrap();
    for (i, &b) in free_term.iter().enumerate() {
        let expected = if GateOut::Forget.channels(3).contains(&i) {
            1.0
        } else {
            0.0
        };
        assert_eq!(b, expected);
    }

    // Recurrent kernel columns are normalized
    let recur = cell.get_recur_weights_data().unwrap();
    for col in recur.columns() {
        let norm = col.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-4);
    }
    assert_eq!(cell.param_count(), 12 * 5 + 12 + 12 * 3 + 12);
}

#[test]
fn test_lstm_cell_state_machine() {
    let mut cell = LstmCell::new(4, 0.0, false).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::Unbuilt);

    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::FastPathReady);

    cell.set_dropout_rate(0.2).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::Unbuilt);
    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::Built);

    cell.set_dropout_rate(0.0).unwrap();
    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::FastPathReady);

    cell.set_compatibility_mode(true);
    assert_eq!(cell.build_state(), LstmBuildState::Unbuilt);
    cell.reshape(&[2, 3]).unwrap();

    cell.set_recurrent_activation(Activation::HardSigmoid);
    assert_eq!(cell.build_state(), LstmBuildState::Unbuilt);
    cell.reshape(&[2, 3]).unwrap();
    assert_eq!(cell.build_state(), LstmBuildState::Built);

    // Weight setters keep the structure
    cell.set_recur_free_term_data(None);
    assert_eq!(cell.build_state(), LstmBuildState::Built);
}

#[test]
fn test_lstm_cell_forward_sequence() {
    let mut cell = configured_cell(3, 4, false);
    let x = Array::from_shape_fn((2, 5, 4), |(b, t, i)| ((b + t * i) as f32 * 0.17).sin()).into_dyn();

    let y = cell.forward(&x).unwrap();
    assert_eq!(y.shape(), &[2, 5, 3]);
    assert_eq!(cell.output_shape(), "(2, 3)");
    assert_eq!(cell.layer_type(), "LSTM");

    // Stepping manually from the same initial state gives the same outputs
    cell.reshape(&[2, 4]).unwrap();
    for t in 0..5 {
        let step = x.slice(ndarray::s![.., t, ..]).to_owned().into_dyn();
        let h = cell.run_once(&step).unwrap();
        assert_eq!(h, y.slice(ndarray::s![.., t, ..]).to_owned().into_dyn());
    }

    // A second run restarts from the initial state
    let y2 = cell.forward(&x).unwrap();
    assert_eq!(y, y2);
}

#[test]
fn test_lstm_cell_initial_state() {
    let mut cell = configured_cell(3, 2, false);
    let x = Array::ones((1, 4, 2)).into_dyn();
    let from_zero = cell.forward(&x).unwrap();

    cell.set_initial_state(Array2::from_elem((1, 3), 0.5), Array2::from_elem((1, 3), -0.5));
    let from_initial = cell.forward(&x).unwrap();
    assert_ne!(from_zero, from_initial);

    cell.clear_initial_state();
    assert_eq!(cell.forward(&x).unwrap(), from_zero);

    cell.set_initial_state(Array2::zeros((1, 4)), Array2::zeros((1, 3)));
    assert!(matches!(
        cell.reshape(&[1, 2]),
        Err(ModelError::ConfigurationError(_))
    ));
}

#[test]
fn test_lstm_cell_errors() {
    assert!(matches!(
        LstmCell::new(0, 0.0, false),
        Err(ModelError::ConfigurationError(_))
    ));
    assert!(matches!(
        LstmCell::new(4, 1.0, false),
        Err(ModelError::ConfigurationError(_))
    ));
    assert!(matches!(
        LstmCell::new(4, -0.1, false),
        Err(ModelError::ConfigurationError(_))
    ));

    // Running before reshape
    let mut cell = LstmCell::new(4, 0.0, false).unwrap();
    assert!(matches!(
        cell.run_once(&Array::ones((2, 3)).into_dyn()),
        Err(ModelError::ProcessingError(_))
    ));

    // Step input that differs from the reshaped one
    cell.reshape(&[2, 3]).unwrap();
    assert!(matches!(
        cell.run_once(&Array::ones((2, 5)).into_dyn()),
        Err(ModelError::ShapeMismatch(_))
    ));

    // Input weights whose trailing extent differs from the input
    assert!(matches!(
        cell.reshape(&[2, 5]),
        Err(ModelError::ShapeMismatch(_))
    ));

    // Recurrent weights inconsistent with the hidden size
    cell.set_recur_weights_data(Some(Arc::new(Array2::zeros((16, 5)))));
    assert!(matches!(
        cell.reshape(&[2, 3]),
        Err(ModelError::ConfigurationError(_))
    ));

    // Free term of the wrong length
    let mut cell = LstmCell::new(4, 0.0, false).unwrap();
    cell.set_input_free_term_data(Some(Arc::new(Array1::zeros(7))));
    assert!(matches!(
        cell.reshape(&[2, 3]),
        Err(ModelError::ConfigurationError(_))
    ));

    // Rank other than 2 or 3
    let mut cell = LstmCell::new(4, 0.0, false).unwrap();
    assert!(matches!(
        cell.reshape(&[3]),
        Err(ModelError::InputValidationError(_))
    ));
    assert!(cell.forward(&Array::ones((2, 3)).into_dyn()).is_err());
}

#[test]
fn test_lstm_cell_config_round_trip() {
    let config = LstmCellConfig::from_json_str(r#"{ "hidden_size": 6, "dropout_rate": 0.25 }"#)
        .unwrap();
    assert_eq!(config.hidden_size, 6);
    assert_eq!(config.dropout_rate, 0.25);
    assert_eq!(config.recurrent_activation, Activation::Sigmoid);
    assert!(!config.compatibility_mode);
    assert_eq!(config.seed, None);

    let cell = LstmCell::from_config(&config).unwrap();
    assert_eq!(cell.get_hidden_size(), 6);
    assert_eq!(cell.get_dropout_rate(), 0.25);
    assert!(cell.is_training());

    assert_eq!(LstmCellConfig::from_json_str("{}").unwrap(), LstmCellConfig::default());
    assert!(matches!(
        LstmCellConfig::from_json_str(r#"{ "dropout_rate": 1.0 }"#),
        Err(IoError::ModelError(ModelError::ConfigurationError(_)))
    ));
    assert!(matches!(
        LstmCellConfig::from_json_str(r#"{ "hidden_size": -1 }"#),
        Err(IoError::JsonError(_))
    ));
}
