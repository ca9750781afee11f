use crate::data::model::Spectrum;
use crate::estimator::Component;
use crate::estimator::registry::ModelRegistry;
use crate::plugin::{BatchWriter, ConfigError, Plugin, WriteError};
use crate::session::Session;

const NAME: &str = "model-fit";

/// Feature and target collections built from a batch, one entry per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    /// `None` where a record lacks a usable target value.
    pub y: Vec<Option<f64>>,
}

/// Trains a model on the complete batch of records and saves it.
///
/// The model is either instantiated from a registered class name and JSON
/// parameters, or loaded from a template file.
#[derive(Debug)]
pub struct FitWriter {
    /// The class name of the model to build.
    pub model: Option<String>,
    /// The parameters of the model as JSON object string.
    pub model_params: Option<String>,
    /// Saved model to load and train instead of using class name/parameters.
    pub template: Option<String>,
    /// The sample data field to use as output variable.
    pub target: Option<String>,
    /// Where to save the trained model.
    pub output_file: Option<String>,
    /// Log target of all messages emitted by this writer.
    pub logger_name: String,
    /// Models available by class name; also used to load templates.
    pub registry: ModelRegistry,
}

impl Default for FitWriter {
    fn default() -> Self {
        Self {
            model: None,
            model_params: None,
            template: None,
            target: None,
            output_file: None,
            logger_name: NAME.to_string(),
            registry: ModelRegistry::with_defaults(),
        }
    }
}

impl FitWriter {
    /// Collate amplitudes and targets. Records without the target field get
    /// a `None` placeholder so both collections stay aligned.
    pub fn collate(&self, data: &[Spectrum]) -> TrainingSet {
        let target = self.target.as_deref().unwrap_or_default();
        let mut set = TrainingSet {
            x: Vec::with_capacity(data.len()),
            y: Vec::with_capacity(data.len()),
        };

        for sp in data {
            set.x.push(sp.amplitudes().to_vec());
            match sp.sample_data().get(target) {
                Some(value) => match value.as_f64() {
                    Some(v) => set.y.push(Some(v)),
                    None => {
                        log::warn!(
                            target: self.logger_name.as_str(),
                            "Non-numeric '{}' for spectrum: {} ({})",
                            target,
                            sp.id,
                            value
                        );
                        set.y.push(None);
                    }
                },
                None => {
                    log::warn!(
                        target: self.logger_name.as_str(),
                        "Missing '{}' for spectrum: {}",
                        target,
                        sp.id
                    );
                    set.y.push(None);
                }
            }
        }

        set
    }

    /// Load the template or instantiate the configured class.
    fn resolve_model(&self, session: &Session) -> Option<Box<dyn Component>> {
        if let Some(template) = self.template.as_deref() {
            let path = session.expand_placeholders(template);
            log::info!(
                target: self.logger_name.as_str(),
                "Loading model template: {}",
                path.display()
            );
            return match self.registry.load(&path) {
                Ok(component) => Some(component),
                Err(err) => {
                    log::error!(
                        target: self.logger_name.as_str(),
                        "Failed to load model template: {}: {:#}",
                        template,
                        anyhow::Error::new(err)
                    );
                    None
                }
            };
        }

        let model = self.model.as_deref().unwrap_or_default();
        match self.registry.instantiate(model, self.model_params.as_deref()) {
            Ok(component) => Some(component),
            Err(err) => {
                log::error!(
                    target: self.logger_name.as_str(),
                    "Failed to instantiate class '{}' with parameters: {}: {:#}",
                    model,
                    self.model_params.as_deref().unwrap_or("None"),
                    anyhow::Error::new(err)
                );
                None
            }
        }
    }
}

impl Plugin for FitWriter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Builds a model on the incoming data and saves it."
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.model.is_none() && self.template.is_none() {
            return Err(ConfigError::Missing {
                plugin: NAME,
                message: "Neither model classname nor model template specified!",
            });
        }
        if self.target.is_none() {
            return Err(ConfigError::Missing {
                plugin: NAME,
                message: "No sample data field specified!",
            });
        }
        Ok(())
    }
}

impl BatchWriter for FitWriter {
    fn write_batch(&mut self, data: &[Spectrum], session: &Session) -> Result<(), WriteError> {
        if data.is_empty() {
            return Err(WriteError::EmptyBatch);
        }

        let set = self.collate(data);

        let Some(mut component) = self.resolve_model(session) else {
            return Ok(());
        };

        let kind = component.kind();
        let Some(estimator) = component.as_estimator_mut() else {
            log::error!(
                target: self.logger_name.as_str(),
                "Model is not a predictive model: {}",
                kind
            );
            return Ok(());
        };

        if let Err(err) = estimator.fit(&set.x, &set.y) {
            log::error!(
                target: self.logger_name.as_str(),
                "Failed to train model!: {}",
                err
            );
            return Ok(());
        }

        let Some(output_file) = self.output_file.as_deref() else {
            log::error!(target: self.logger_name.as_str(), "No output file specified!");
            return Ok(());
        };
        let path = session.expand_placeholders(output_file);
        log::info!(
            target: self.logger_name.as_str(),
            "Saving model to: {}",
            path.display()
        );
        if let Err(err) = self.registry.save(&path, component.as_ref()) {
            log::error!(
                target: self.logger_name.as_str(),
                "Failed to save model to: {}: {:#}",
                path.display(),
                anyhow::Error::new(err)
            );
        }
        Ok(())
    }
}
