use std::process::Command;

use spectral_models::data::loader::load_file;
use spectral_models::data::model::{MetadataValue, Spectrum};
use spectral_models::data::writer::save_file;
use spectral_models::estimator::registry::ModelRegistry;
use spectral_models::filter::predict::PredictFilter;
use spectral_models::plugin::{BatchWriter, Filter, Plugin};
use spectral_models::session::Session;
use spectral_models::writer::fit::FitWriter;

fn training_batch() -> Vec<Spectrum> {
    vec![
        Spectrum::new("s1", vec![1.0, 2.0]).with_field("value", 1.0),
        Spectrum::new("s2", vec![2.0, 3.0]).with_field("value", 2.0),
        Spectrum::new("s3", vec![3.0, 4.0]).with_field("value", 3.0),
    ]
}

fn wide_batch() -> Vec<Spectrum> {
    (0..12)
        .map(|i| {
            let c = i as f64 * 0.5;
            let amplitudes = (0..20)
                .map(|j| c * (j as f64 / 5.0).sin() + 0.01 * ((i * j) % 7) as f64)
                .collect();
            Spectrum::new(format!("w{i}"), amplitudes).with_field("concentration", c)
        })
        .collect()
}

fn fit(dir: &std::path::Path, model: &str, params: Option<&str>, data: &[Spectrum], target: &str) {
    let mut writer = FitWriter {
        model: Some(model.to_string()),
        model_params: params.map(str::to_string),
        target: Some(target.to_string()),
        output_file: Some("{OUT}/model.json".to_string()),
        ..FitWriter::default()
    };
    writer.initialize().unwrap();
    let mut session = Session::default();
    session.set("OUT", dir.display().to_string());
    writer.write_batch(data, &session).unwrap();
}

#[test]
fn linear_example_scenario() {
    let dir = tempfile::tempdir().unwrap();
    fit(dir.path(), "sklearn.linear_model.LinearRegression", None, &training_batch(), "value");
    assert!(dir.path().join("model.json").exists());

    let mut filter = PredictFilter::new(
        Some(dir.path().join("model.json").display().to_string()),
        Some("value".to_string()),
    );
    filter.initialize().unwrap();
    let out = filter.process(Spectrum::new("new", vec![4.0, 5.0]).into(), &Session::default());

    assert_eq!(out.len(), 1);
    match out[0].metadata.get("value") {
        Some(MetadataValue::Float(v)) => assert!((v - 4.0).abs() < 1e-9),
        other => panic!("unexpected prediction: {other:?}"),
    }
}

#[test]
fn filter_reproduces_trained_model_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let data = wide_batch();

    for (model, params) in [
        ("Ridge", Some(r#"{"alpha": 0.5}"#)),
        ("KNeighborsRegressor", Some(r#"{"n_neighbors": 3, "weights": "distance"}"#)),
        ("DummyRegressor", Some(r#"{"strategy": "median"}"#)),
    ] {
        fit(dir.path(), model, params, &data, "concentration");

        // reference predictions straight from the saved model
        let saved = ModelRegistry::with_defaults()
            .load(&dir.path().join("model.json"))
            .unwrap();
        let estimator = saved.as_estimator().unwrap();
        let x: Vec<Vec<f64>> = data.iter().map(|sp| sp.y.clone()).collect();
        let expected = estimator.predict(&x).unwrap();

        let mut filter = PredictFilter::new(
            Some(dir.path().join("model.json").display().to_string()),
            Some("predicted".to_string()),
        );
        let out = filter.process(data.clone().into(), &Session::default());

        assert_eq!(out.len(), data.len(), "{model}");
        for ((sp, original), want) in out.iter().zip(&data).zip(&expected) {
            assert_eq!(sp.id, original.id);
            assert_eq!(sp.metadata.get("predicted"), Some(&MetadataValue::Float(*want)));
            assert_eq!(
                sp.metadata.get("concentration"),
                original.metadata.get("concentration")
            );
        }
    }
}

#[test]
fn missing_model_file_passes_everything_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut filter = PredictFilter::new(
        Some(dir.path().join("nope.json").display().to_string()),
        Some("p".to_string()),
    );
    let data = wide_batch();
    for _ in 0..3 {
        assert_eq!(filter.process(data.clone().into(), &Session::default()), data);
    }
}

#[test]
fn cli_fit_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train.json");
    let model = dir.path().join("model.json");
    let output = dir.path().join("predicted.csv");
    save_file(&train, &wide_batch()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["fit", "-i"])
        .arg(&train)
        .args(["-m", "Ridge", "-p", r#"{"alpha": 0.1}"#, "-t", "concentration", "-o"])
        .arg(&model)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(model.exists());

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["predict", "-i"])
        .arg(&train)
        .arg("-m")
        .arg(&model)
        .args(["-t", "predicted", "-o"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let annotated = load_file(&output).unwrap();
    assert_eq!(annotated.len(), 12);
    assert!(annotated
        .spectra
        .iter()
        .all(|sp| sp.metadata.get("predicted").and_then(MetadataValue::as_f64).is_some()));
}

#[test]
fn cli_accepts_underscore_option_spellings() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train.json");
    let template = dir.path().join("template.json");
    let model = dir.path().join("model.json");
    save_file(&train, &wide_batch()).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["template", "--model", "Ridge", "--model_params", r#"{"alpha": 0.5}"#])
        .arg("--output_file")
        .arg(&template)
        .status()
        .unwrap();
    assert!(status.success());

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["fit", "--input"])
        .arg(&train)
        .arg("--template")
        .arg(&template)
        .args(["--target", "concentration", "--output_file"])
        .arg(&model)
        .status()
        .unwrap();
    assert!(status.success());

    let trained = ModelRegistry::with_defaults().load(&model).unwrap();
    assert_eq!(trained.kind(), "Ridge");
    assert_eq!(trained.state().unwrap()["params"]["alpha"], 0.5);
}

#[test]
fn cli_rejects_empty_batch_and_missing_model_source() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "[]").unwrap();
    let model = dir.path().join("model.json");

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["fit", "-i"])
        .arg(&empty)
        .args(["-m", "LinearRegression", "-t", "value", "-o"])
        .arg(&model)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!model.exists());

    let status = Command::new(env!("CARGO_BIN_EXE_spectral-models"))
        .args(["fit", "-i"])
        .arg(&empty)
        .args(["-t", "value", "-o"])
        .arg(&model)
        .status()
        .unwrap();
    assert!(!status.success());
}
