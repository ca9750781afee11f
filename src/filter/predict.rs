use crate::data::model::{MetadataValue, Spectrum};
use crate::estimator::Component;
use crate::estimator::registry::ModelRegistry;
use crate::plugin::{ConfigError, Data, Filter, Plugin};
use crate::session::Session;

const NAME: &str = "model-predict";

/// Lifecycle of the model used for predictions.
#[derive(Debug)]
enum ModelSlot {
    /// Not loaded yet; the first processed record triggers loading.
    Unloaded,
    /// Loading failed; records pass through for the rest of the run.
    Unavailable,
    Loaded(Box<dyn Component>),
}

/// Loads a saved model and stores its prediction for every record in the
/// record's sample data.
///
/// The model is loaded lazily, at most once. Any failure degrades to passing
/// records through without a prediction; nothing is propagated to the caller.
#[derive(Debug)]
pub struct PredictFilter {
    /// The saved model to load; placeholders are expanded at load time.
    pub model_file: Option<String>,
    /// The sample data field to store the predictions under.
    pub target: Option<String>,
    /// Log target of all messages emitted by this filter.
    pub logger_name: String,
    registry: ModelRegistry,
    model: ModelSlot,
}

impl Default for PredictFilter {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl PredictFilter {
    pub fn new(model_file: Option<String>, target: Option<String>) -> Self {
        Self {
            model_file,
            target,
            logger_name: NAME.to_string(),
            registry: ModelRegistry::with_defaults(),
            model: ModelSlot::Unloaded,
        }
    }

    /// Whether a model has been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(self.model, ModelSlot::Loaded(_))
    }

    fn load_model(&mut self, session: &Session) {
        let Some(model_file) = self.model_file.as_deref() else {
            log::error!(target: self.logger_name.as_str(), "No model file supplied!");
            self.model = ModelSlot::Unavailable;
            return;
        };
        let path = session.expand_placeholders(model_file);
        log::info!(target: self.logger_name.as_str(), "Loading model from: {}", path.display());

        self.model = match self.registry.load(&path) {
            Ok(component) => ModelSlot::Loaded(component),
            Err(err) => {
                log::error!(
                    target: self.logger_name.as_str(),
                    "Failed to load model from: {}: {:#}",
                    path.display(),
                    anyhow::Error::new(err)
                );
                ModelSlot::Unavailable
            }
        };
    }
}

impl Plugin for PredictFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Loads a saved model and generates predictions on the incoming data, adding it to the sample data."
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.model_file.is_none() {
            return Err(ConfigError::Missing {
                plugin: NAME,
                message: "No model file supplied!",
            });
        }
        if self.target.is_none() {
            return Err(ConfigError::Missing {
                plugin: NAME,
                message: "No sample data field specified for predictions!",
            });
        }
        Ok(())
    }
}

impl Filter for PredictFilter {
    fn process(&mut self, data: Data, session: &Session) -> Vec<Spectrum> {
        if matches!(self.model, ModelSlot::Unloaded) {
            self.load_model(session);
        }

        let component = match &self.model {
            ModelSlot::Loaded(component) => component,
            ModelSlot::Unloaded | ModelSlot::Unavailable => return data.into_vec(),
        };

        let Some(estimator) = component.as_estimator() else {
            log::error!(
                target: self.logger_name.as_str(),
                "Model is not a predictive model: {}",
                component.kind()
            );
            return data.into_vec();
        };

        let Some(target) = self.target.as_deref() else {
            log::error!(target: self.logger_name.as_str(), "No sample data field specified for predictions!");
            return data.into_vec();
        };

        // records are owned here, so annotating them cannot touch the caller's copies
        data.into_vec()
            .into_iter()
            .map(|mut item| {
                match estimator.predict(std::slice::from_ref(&item.y)) {
                    Ok(pred) => match pred.first() {
                        Some(value) => {
                            item.sample_data_mut()
                                .insert(target.to_string(), MetadataValue::Float(*value));
                        }
                        None => log::error!(
                            target: self.logger_name.as_str(),
                            "Failed to generate prediction for: {}: model returned no values",
                            item.id
                        ),
                    },
                    Err(err) => log::error!(
                        target: self.logger_name.as_str(),
                        "Failed to generate prediction for: {}: {}",
                        item.id,
                        err
                    ),
                }
                item
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::Estimator;
    use crate::estimator::linear::LinearRegression;
    use crate::estimator::scaler::StandardScaler;

    fn trained_model_file(dir: &std::path::Path) -> std::path::PathBuf {
        let mut model = LinearRegression::default();
        model
            .fit(
                &[vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0]],
                &[Some(1.0), Some(2.0), Some(3.0)],
            )
            .unwrap();
        let path = dir.join("model.json");
        ModelRegistry::with_defaults().save(&path, &model).unwrap();
        path
    }

    fn filter_for(path: &std::path::Path) -> PredictFilter {
        PredictFilter::new(
            Some(path.display().to_string()),
            Some("prediction".to_string()),
        )
    }

    #[test]
    fn initialize_requires_model_file_and_target() {
        assert!(PredictFilter::new(None, Some("t".into())).initialize().is_err());
        assert!(PredictFilter::new(Some("m.json".into()), None).initialize().is_err());
        let mut filter = PredictFilter::new(Some("m.json".into()), Some("t".into()));
        assert!(filter.initialize().is_ok());
        assert_eq!(filter.accepts(), filter.generates());
    }

    #[test]
    fn annotates_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter_for(&trained_model_file(dir.path()));
        let session = Session::default();

        let out = filter.process(
            vec![
                Spectrum::new("a", vec![4.0, 5.0]),
                Spectrum::new("b", vec![1.0, 2.0]),
            ]
            .into(),
            &session,
        );
        assert_eq!(out.len(), 2);
        let pred = out[0].metadata["prediction"].as_f64().unwrap();
        assert!((pred - 4.0).abs() < 1e-9);
        assert!(filter.is_loaded());
    }

    #[test]
    fn expands_placeholders_in_model_path() {
        let dir = tempfile::tempdir().unwrap();
        trained_model_file(dir.path());
        let mut session = Session::empty();
        session.set("MODELS", dir.path().display().to_string());

        let mut filter =
            PredictFilter::new(Some("{MODELS}/model.json".into()), Some("p".into()));
        let out = filter.process(Spectrum::new("a", vec![4.0, 5.0]).into(), &session);
        assert!(out[0].metadata.contains_key("p"));
    }

    #[test]
    fn failed_load_passes_records_through_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let mut filter = filter_for(&path);
        let session = Session::default();
        let input = vec![Spectrum::new("a", vec![4.0, 5.0])];

        assert_eq!(filter.process(input.clone().into(), &session), input);

        // the file appearing later does not matter, the model stays unavailable
        let real = trained_model_file(dir.path());
        std::fs::rename(real, &path).unwrap();
        assert_eq!(filter.process(input.clone().into(), &session), input);
        assert!(!filter.is_loaded());
    }

    #[test]
    fn non_predictive_model_passes_records_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        ModelRegistry::with_defaults()
            .save(&path, &StandardScaler::default())
            .unwrap();

        let mut filter = filter_for(&path);
        let input = vec![Spectrum::new("a", vec![4.0, 5.0])];
        let session = Session::default();
        assert_eq!(filter.process(input.clone().into(), &session), input);
        assert_eq!(filter.process(input.clone().into(), &session), input);
        assert!(filter.is_loaded());
    }

    #[test]
    fn prediction_failure_keeps_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter_for(&trained_model_file(dir.path()));
        let session = Session::default();

        let out = filter.process(
            vec![
                Spectrum::new("short", vec![1.0]),
                Spectrum::new("ok", vec![4.0, 5.0]),
            ]
            .into(),
            &session,
        );
        assert_eq!(out.len(), 2);
        assert!(!out[0].metadata.contains_key("prediction"));
        assert!(out[1].metadata.contains_key("prediction"));
    }

    #[test]
    fn repeated_predictions_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter_for(&trained_model_file(dir.path()));
        let session = Session::default();
        let record = Spectrum::new("a", vec![2.5, 7.0]);

        let first = filter.process(record.clone().into(), &session);
        let second = filter.process(record.into(), &session);
        assert_eq!(first, second);
    }
}
