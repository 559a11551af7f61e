use ndarray::Array;
use rustycell::prelude::*;
use std::fs;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rustycell_{}_{}.json", name, std::process::id()))
}

#[test]
fn test_lstm_cell_save_and_load() {
    let mut cell = LstmCell::new(5, 0.0, true).unwrap();
    cell.set_recurrent_activation(Activation::HardSigmoid);
    let x = Array::from_shape_fn((2, 4, 3), |(b, t, i)| ((b + 2 * t + i) as f32 * 0.3).sin())
        .into_dyn();
    let expected = cell.forward(&x).unwrap();

    let path = temp_path("save_and_load");
    cell.save_to_path(&path).unwrap();
    let mut loaded = LstmCell::load_from_path(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(loaded.get_hidden_size(), 5);
    assert!(loaded.is_in_compatibility_mode());
    assert_eq!(loaded.get_recurrent_activation(), Activation::HardSigmoid);
    assert_eq!(loaded.param_count(), cell.param_count());
    assert_eq!(loaded.forward(&x).unwrap(), expected);
}

#[test]
fn test_lstm_cell_json_layout() {
    let mut cell = LstmCell::new(2, 0.25, false).unwrap();
    cell.reshape(&[1, 3]).unwrap();

    let serializable = SerializableLstmCell::from_cell(&cell).unwrap();
    assert_eq!(serializable.version, LSTM_CELL_VERSION);
    assert_eq!(serializable.input_weights.len(), 8);
    assert_eq!(serializable.input_weights[0].len(), 3);
    assert_eq!(serializable.recur_weights.len(), 8);
    assert_eq!(serializable.recur_weights[0].len(), 2);

    let json = serde_json::to_string(&serializable).unwrap();
    let keys = [
        "\"version\"",
        "\"hidden_size\"",
        "\"dropout_rate\"",
        "\"recurrent_activation\"",
        "\"compatibility_mode\"",
        "\"input_weights\"",
        "\"input_free_term\"",
        "\"recur_weights\"",
        "\"recur_free_term\"",
    ];
    let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Forget-gate channels carry the unit bias of a fresh cell
    let input_free_term = serializable.input_free_term.unwrap();
    assert_eq!(&input_free_term[2..4], &[1.0, 1.0]);
}

#[test]
fn test_lstm_cell_save_before_reshape_fails() {
    let cell = LstmCell::new(3, 0.0, false).unwrap();
    assert!(matches!(
        SerializableLstmCell::from_cell(&cell),
        Err(ModelError::ProcessingError(_))
    ));
    let path = temp_path("unsaved");
    assert!(matches!(
        cell.save_to_path(&path),
        Err(IoError::ModelError(ModelError::ProcessingError(_)))
    ));
}

#[test]
fn test_lstm_cell_rejects_bad_documents() {
    let mut cell = LstmCell::new(2, 0.0, false).unwrap();
    cell.reshape(&[1, 2]).unwrap();
    let serializable = SerializableLstmCell::from_cell(&cell).unwrap();

    let future = SerializableLstmCell {
        version: LSTM_CELL_VERSION + 1,
        ..serializable.clone()
    };
    assert!(matches!(future.to_cell(), Err(IoError::StdIoError(_))));

    let wrong_hidden = SerializableLstmCell {
        hidden_size: 3,
        ..serializable.clone()
    };
    assert!(matches!(
        wrong_hidden.to_cell(),
        Err(IoError::ModelError(ModelError::ConfigurationError(_)))
    ));

    let mut ragged = serializable;
    ragged.input_weights[1].pop();
    assert!(ragged.to_cell().is_err());

    let path = temp_path("garbage");
    fs::write(&path, "{ not json").unwrap();
    let result = LstmCell::load_from_path(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(IoError::JsonError(_))));

    assert!(matches!(
        LstmCell::load_from_path(temp_path("missing")),
        Err(IoError::StdIoError(_))
    ));
}

#[test]
fn test_lstm_cell_config_from_path() {
    let path = temp_path("config");
    fs::write(
        &path,
        r#"{ "hidden_size": 16, "dropout_rate": 0.2, "recurrent_activation": "HardSigmoid", "seed": 9 }"#,
    )
    .unwrap();
    let config = LstmCellConfig::from_path(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(config.hidden_size, 16);
    assert_eq!(config.recurrent_activation, Activation::HardSigmoid);
    assert_eq!(config.seed, Some(9));
    assert!(!config.compatibility_mode);

    let cell = LstmCell::from_config(&config).unwrap();
    assert_eq!(cell.get_hidden_size(), 16);
    assert_eq!(cell.get_dropout_rate(), 0.2);

    assert!(matches!(
        LstmCellConfig::from_json_str(r#"{ "dropout_rate": 1.0 }"#),
        Err(IoError::ModelError(ModelError::ConfigurationError(_)))
    ));
}
