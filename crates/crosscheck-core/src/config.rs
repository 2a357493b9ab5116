//! Harness configuration: peer connection, line wiring, run parameters.

use std::path::Path;

use crosscheck_endpoint::{PeripheralConfig, PinMap};
use crosscheck_timing::{TimingConfig, TimingScript};
use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Every section defaults, so `{}` is a complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub peripheral: PeripheralConfig,
    pub lines: PinMap,
    pub orchestrator: OrchestratorConfig,
    pub timing: TimingConfig,
}

impl HarnessConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lines = &self.lines;
        if lines.outputs.is_empty() || lines.inputs.is_empty() {
            return Err(invalid("pin lists must not be empty"));
        }
        if lines.outputs.len() != lines.inputs.len() {
            return Err(invalid(format!(
                "{} output pins but {} input pins",
                lines.outputs.len(),
                lines.inputs.len()
            )));
        }
        if lines.outputs.len() < self.orchestrator.channels {
            return Err(invalid(format!(
                "{} channels exercised but only {} wired",
                self.orchestrator.channels,
                lines.outputs.len()
            )));
        }
        if self.orchestrator.channels == 0 {
            return Err(invalid("at least one channel must be exercised"));
        }

        let poll = self.timing.poll_interval_ms;
        if poll == 0 || poll >= 10 {
            return Err(invalid(format!(
                "poll interval must be between 1 and 9 ms, got {poll}"
            )));
        }
        Ok(())
    }

    /// A script may not address channels that have no wired line.
    pub fn check_script(&self, script: &TimingScript) -> Result<(), ConfigError> {
        let wired = self.lines.outputs.len().min(self.lines.inputs.len());
        if script.channels > wired {
            return Err(invalid(format!(
                "script uses {} channels but only {wired} are wired",
                script.channels
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
