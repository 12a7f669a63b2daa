//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configuration from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

use super::types::{AttendanceSettings, CompensationDefaults, EngineConfig};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── compensation.yaml   # Structure resolver defaults
/// └── attendance.yaml     # Attendance summary settings
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default").unwrap();
/// println!("Basic fraction: {}", loader.compensation().basic_fraction);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if either file is missing, contains invalid YAML,
    /// or holds out-of-range values.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let compensation_path = path.join("compensation.yaml");
        let compensation = Self::load_yaml::<CompensationDefaults>(&compensation_path)?;
        compensation
            .validate()
            .map_err(|e| EngineError::ConfigParseError {
                path: compensation_path.display().to_string(),
                message: e.to_string(),
            })?;

        let attendance_path = path.join("attendance.yaml");
        let attendance = Self::load_yaml::<AttendanceSettings>(&attendance_path)?;

        Ok(Self {
            config: EngineConfig {
                compensation,
                attendance,
            },
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the underlying engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// Returns the compensation resolver defaults.
    pub fn compensation(&self) -> &CompensationDefaults {
        &self.config.compensation
    }

    /// Returns the attendance settings.
    pub fn attendance(&self) -> &AttendanceSettings {
        &self.config.attendance
    }
}
