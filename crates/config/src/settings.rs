// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Harness-wide settings shared by every invocation.

use crate::error::ConfigurationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings applied to every invocation run by a harness.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HarnessSettings {
    /// Host (IP literal) the engines bind to and advertise.
    #[serde(default = "default_host")]
    pub host: String,
    /// Upper bound on the time an engine may take to signal readiness.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    /// Upper bound on the time an engine may take to shut down.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Directory under which scratch directories are created. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    /// Exposes addresses for every invocation, not only those whose scopes opt in.
    #[serde(default)]
    pub expose_addresses: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_startup_timeout_ms() -> u64 {
    30_000
}

const fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            scratch_root: None,
            expose_addresses: false,
        }
    }
}

impl HarnessSettings {
    /// Parses settings from YAML (JSON is accepted as a subset) and validates them.
    pub fn from_yaml(source_name: &str, text: &str) -> Result<Self, ConfigurationError> {
        let settings: Self =
            serde_yaml::from_str(text).map_err(|e| ConfigurationError::SettingsLoad {
                source_name: source_name.to_owned(),
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from JSON and validates them.
    pub fn from_json(source_name: &str, text: &str) -> Result<Self, ConfigurationError> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::SettingsLoad {
                source_name: source_name.to_owned(),
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads a settings file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let source_name = path.display().to_string();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::SettingsLoad {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&source_name, &text),
            _ => Self::from_yaml(&source_name, &text),
        }
    }

    /// Returns validation errors prefixed with `path_prefix`.
    #[must_use]
    pub fn validation_errors(&self, path_prefix: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if self.host.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "{path_prefix}.host must be an IP address literal, got `{}`",
                self.host
            ));
        }
        if self.startup_timeout_ms == 0 {
            errors.push(format!(
                "{path_prefix}.startup_timeout_ms must be greater than 0"
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            errors.push(format!(
                "{path_prefix}.shutdown_timeout_ms must be greater than 0"
            ));
        }
        errors
    }

    /// Fails with [`ConfigurationError::InvalidSettings`] when validation reports errors.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let errors = self.validation_errors("settings");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidSettings { errors })
        }
    }

    /// Startup timeout as a duration.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown timeout as a duration.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
