use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::dummy::DummyRegressor;
use super::linear::{LinearRegression, Ridge};
use super::neighbors::KNeighborsRegressor;
use super::scaler::StandardScaler;
use super::{Component, ModelError};

/// Format tag written into every model file.
pub const MODEL_FORMAT: &str = "spectral-models/1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown model class: {0}")]
    UnknownModel(String),

    #[error("model parameters are not valid JSON")]
    ParamsJson(#[source] serde_json::Error),

    #[error("model parameters must be a JSON object, got: {0}")]
    ParamsNotObject(String),

    #[error("failed to access model file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize model to {}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported model file format '{found}' (expected '{}')", MODEL_FORMAT)]
    Format { found: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// What a registered component can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Trains on targets and predicts them.
    Predictor,
    /// Only transforms amplitudes.
    Transformer,
}

type CreateFn = fn(&Map<String, JsonValue>) -> Result<Box<dyn Component>, ModelError>;
type RestoreFn = fn(JsonValue) -> Result<Box<dyn Component>, ModelError>;

#[derive(Debug, Clone, Copy)]
pub struct ModelEntry {
    pub name: &'static str,
    pub role: Role,
    pub description: &'static str,
    create: CreateFn,
    restore: RestoreFn,
}

fn boxed<T: Component + 'static>(component: T) -> Box<dyn Component> {
    Box::new(component)
}

/// On-disk envelope of a persisted component.
#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format: String,
    kind: String,
    state: JsonValue,
}

/// Maps model class names to factories.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<&'static str, ModelEntry>,
}

impl ModelRegistry {
    /// Registry with all built-in models.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(ModelEntry {
            name: LinearRegression::KIND,
            role: Role::Predictor,
            description: "ordinary least squares",
            create: |p| LinearRegression::from_params(p).map(boxed),
            restore: |s| LinearRegression::from_state(s).map(boxed),
        });
        registry.register(ModelEntry {
            name: Ridge::KIND,
            role: Role::Predictor,
            description: "least squares with L2 penalty",
            create: |p| Ridge::from_params(p).map(boxed),
            restore: |s| Ridge::from_state(s).map(boxed),
        });
        registry.register(ModelEntry {
            name: KNeighborsRegressor::KIND,
            role: Role::Predictor,
            description: "k-nearest-neighbours regression",
            create: |p| KNeighborsRegressor::from_params(p).map(boxed),
            restore: |s| KNeighborsRegressor::from_state(s).map(boxed),
        });
        registry.register(ModelEntry {
            name: DummyRegressor::KIND,
            role: Role::Predictor,
            description: "constant baseline (mean, median or constant)",
            create: |p| DummyRegressor::from_params(p).map(boxed),
            restore: |s| DummyRegressor::from_state(s).map(boxed),
        });
        registry.register(ModelEntry {
            name: StandardScaler::KIND,
            role: Role::Transformer,
            description: "per-wavenumber standardization",
            create: |p| StandardScaler::from_params(p).map(boxed),
            restore: |s| StandardScaler::from_state(s).map(boxed),
        });
        registry
    }

    pub fn register(&mut self, entry: ModelEntry) {
        self.entries.insert(entry.name, entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.values()
    }

    /// Resolve a class name. Dotted paths resolve by their last segment, so
    /// `sklearn.linear_model.Ridge` finds `Ridge`.
    pub fn lookup(&self, name: &str) -> Option<&ModelEntry> {
        let name = name.trim();
        self.entries.get(name).or_else(|| {
            name.rsplit('.')
                .next()
                .and_then(|short| self.entries.get(short))
        })
    }

    /// Instantiate a component by name.
    ///
    /// `params` is only parsed when it starts with `{`; anything else means
    /// "no parameters".
    pub fn instantiate(
        &self,
        name: &str,
        params: Option<&str>,
    ) -> Result<Box<dyn Component>, RegistryError> {
        let entry = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownModel(name.to_string()))?;

        let params = match params {
            Some(text) if text.starts_with('{') => {
                match serde_json::from_str::<JsonValue>(text).map_err(RegistryError::ParamsJson)? {
                    JsonValue::Object(map) => map,
                    other => return Err(RegistryError::ParamsNotObject(other.to_string())),
                }
            }
            _ => Map::new(),
        };

        Ok((entry.create)(&params)?)
    }

    /// Persist a component, replacing any existing file.
    ///
    /// The model is written to a temporary file next to `path` and renamed
    /// over it, so a failed write leaves the previous file intact.
    pub fn save(&self, path: &Path, component: &dyn Component) -> Result<(), RegistryError> {
        let envelope = ModelFile {
            format: MODEL_FORMAT.to_string(),
            kind: component.kind().to_string(),
            state: component.state()?,
        };
        let io_err = |source: std::io::Error| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = NamedTempFile::new_in(dir).map_err(io_err)?;
        let mut writer = BufWriter::new(staged);
        serde_json::to_writer_pretty(&mut writer, &envelope).map_err(|source| {
            RegistryError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let staged = writer.into_inner().map_err(|err| io_err(err.into_error()))?;
        staged.persist(path).map_err(|err| io_err(err.error))?;
        Ok(())
    }

    /// Load a component previously written by [`ModelRegistry::save`].
    pub fn load(&self, path: &Path) -> Result<Box<dyn Component>, RegistryError> {
        let file = File::open(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let envelope: ModelFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                RegistryError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        if envelope.format != MODEL_FORMAT {
            return Err(RegistryError::Format {
                found: envelope.format,
            });
        }
        let entry = self
            .lookup(&envelope.kind)
            .ok_or_else(|| RegistryError::UnknownModel(envelope.kind.clone()))?;
        Ok((entry.restore)(envelope.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dotted_class_names() {
        let registry = ModelRegistry::with_defaults();
        assert_eq!(
            registry.lookup("sklearn.linear_model.LinearRegression").map(|e| e.name),
            Some("LinearRegression")
        );
        assert!(registry.lookup("sklearn.svm.SVR").is_none());
    }

    #[test]
    fn instantiates_with_and_without_parameters() {
        let registry = ModelRegistry::with_defaults();
        let model = registry.instantiate("Ridge", Some(r#"{"alpha": 0.1}"#)).unwrap();
        assert_eq!(model.kind(), "Ridge");
        assert_eq!(model.state().unwrap()["params"]["alpha"], 0.1);

        // non-object parameter strings are ignored
        let model = registry.instantiate("Ridge", Some("alpha=0.1")).unwrap();
        assert_eq!(model.state().unwrap()["params"]["alpha"], 1.0);
    }

    #[test]
    fn instantiation_failures() {
        let registry = ModelRegistry::with_defaults();
        assert!(matches!(
            registry.instantiate("NoSuchModel", None),
            Err(RegistryError::UnknownModel(_))
        ));
        assert!(matches!(
            registry.instantiate("Ridge", Some("{alpha: 1")),
            Err(RegistryError::ParamsJson(_))
        ));
        assert!(matches!(
            registry.instantiate("Ridge", Some(r#"{"solver": "svd"}"#)),
            Err(RegistryError::Model(ModelError::Parameters { .. }))
        ));
    }

    #[test]
    fn save_and_load_keep_kind_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        let registry = ModelRegistry::with_defaults();

        let scaler = registry
            .instantiate("StandardScaler", Some(r#"{"with_std": false}"#))
            .unwrap();
        registry.save(&path, scaler.as_ref()).unwrap();

        let loaded = registry.load(&path).unwrap();
        assert_eq!(loaded.kind(), "StandardScaler");
        assert_eq!(loaded.state().unwrap(), scaler.state().unwrap());
        assert!(loaded.as_estimator().is_none());
    }

    #[test]
    fn save_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::with_defaults();
        let path = dir.path().join("model.json");
        let ridge = registry.instantiate("Ridge", None).unwrap();
        registry.save(&path, ridge.as_ref()).unwrap();

        let dummy = registry.instantiate("DummyRegressor", None).unwrap();
        registry.save(&path, dummy.as_ref()).unwrap();
        assert_eq!(registry.load(&path).unwrap().kind(), "DummyRegressor");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::with_defaults();
        let ridge = registry.instantiate("Ridge", None).unwrap();
        let path = dir.path().join("no-such-dir").join("model.json");
        assert!(matches!(
            registry.save(&path, ridge.as_ref()),
            Err(RegistryError::Io { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn load_failures() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::with_defaults();

        let missing = dir.path().join("missing.json");
        assert!(matches!(registry.load(&missing), Err(RegistryError::Io { .. })));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, b"\x80\x04not json").unwrap();
        assert!(matches!(registry.load(&garbage), Err(RegistryError::Parse { .. })));

        let foreign = dir.path().join("foreign.json");
        std::fs::write(&foreign, r#"{"format": "other/9", "kind": "Ridge", "state": {}}"#)
            .unwrap();
        assert!(matches!(registry.load(&foreign), Err(RegistryError::Format { .. })));

        let unknown = dir.path().join("unknown.json");
        std::fs::write(
            &unknown,
            r#"{"format": "spectral-models/1", "kind": "SVR", "state": {}}"#,
        )
        .unwrap();
        assert!(matches!(registry.load(&unknown), Err(RegistryError::UnknownModel(_))));
    }
}
