//! JSON configuration loading and layering.
//!
//! The configuration file is a JSON object whose keys are monitored file
//! paths plus two special literals:
//! - `--default--`: values layered beneath every file entry
//! - `--OS-metrics--`: OS metrics collection control
//!
//! Layering is a shallow merge: a field present in the file entry wins over
//! the same field in the default entry.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use tailpost_core::config::{MonitoredFileConfig, DEFAULT_CONFIG_KEY, OS_METRICS_CONFIG_KEY};
use tailpost_core::error::ConfigError;

/// Parsed configuration file contents.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    /// Per-file configurations keyed by file path.
    pub files: HashMap<String, MonitoredFileConfig>,
    /// The `--OS-metrics--` entry, when present.
    pub os_metrics: Option<MonitoredFileConfig>,
}

/// Load and validate a configuration file.
///
/// Any error here is fatal at startup (exit code 1).
pub fn load_config_file(path: &str) -> Result<LoadedConfig, ConfigError> {
    let file_path = Path::new(path);
    let metadata = std::fs::metadata(file_path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_owned(),
    })?;
    if metadata.is_dir() {
        return Err(ConfigError::InvalidValue {
            field: "-c".to_owned(),
            reason: "points to a directory, expected a JSON file".to_owned(),
        });
    }

    let contents = std::fs::read_to_string(file_path).map_err(|e| ConfigError::ParseFailed {
        reason: format!("failed to read '{path}': {e}"),
    })?;

    parse_config(&contents)
}

/// Parse configuration JSON text.
pub fn parse_config(contents: &str) -> Result<LoadedConfig, ConfigError> {
    let entries: Map<String, Value> =
        serde_json::from_str(contents).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;

    let defaults = entries.get(DEFAULT_CONFIG_KEY).cloned();
    let mut loaded = LoadedConfig::default();

    for (key, value) in &entries {
        if key == DEFAULT_CONFIG_KEY {
            continue;
        }
        if key == OS_METRICS_CONFIG_KEY {
            let mut entry = entry_from_value(key, value, None)?;
            entry.normalize();
            loaded.os_metrics = Some(entry);
            continue;
        }

        let mut entry = entry_from_value(key, value, defaults.as_ref())?;
        if entry.file_path.is_empty() {
            entry.file_path = key.clone();
        }
        entry.normalize();
        entry.validate()?;
        debug!(file = key, "loaded file configuration");
        loaded.files.insert(key.clone(), entry);
    }

    Ok(loaded)
}

/// Build one entry, layering the defaults beneath it.
fn entry_from_value(
    key: &str,
    value: &Value,
    defaults: Option<&Value>,
) -> Result<MonitoredFileConfig, ConfigError> {
    let merged = match defaults {
        Some(defaults) => shallow_merge(defaults, value),
        None => value.clone(),
    };
    serde_json::from_value(merged).map_err(|e| ConfigError::InvalidValue {
        field: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Shallow merge: fields in `overlay` win over fields in `base`.
fn shallow_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}
