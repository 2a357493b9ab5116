//! Scripted expectations for a time-driven peer program.
//!
//! A [`TimingScript`] lists the states the harness should observe, each with
//! the nominal delay after the previous observation, followed by the terminal
//! states the peer must hold until the harness triggers it.

use std::path::Path;
use std::time::Duration;

use crosscheck_signal::{Signal, SignalVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid script: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub expect: SignalVector,
    /// Nominal delay from the previous observation.
    pub after_ms: u64,
}

impl ScriptStep {
    pub fn new(expect: SignalVector, after_ms: u64) -> Self {
        Self {
            label: None,
            expect,
            after_ms,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn nominal(&self) -> Duration {
        Duration::from_millis(self.after_ms)
    }

    pub fn name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{} after {} ms", self.expect, self.after_ms))
    }
}

/// A terminal state the peer holds until the harness drives `trigger`,
/// after which it moves to `next`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateCheck {
    pub held: SignalVector,
    pub next: SignalVector,
    pub trigger: SignalVector,
}

/// Omitted collections are empty; only `channels` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingScript {
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    #[serde(default)]
    pub steady_states: Vec<SteadyStateCheck>,
}

fn default_channels() -> usize {
    4
}

impl TimingScript {
    /// The reference program: rising edges on each channel in turn, an
    /// alternating pattern at two delay classes, then two held terminal
    /// states.
    pub fn reference() -> Self {
        let v = |levels: [bool; 4]| SignalVector::from_levels(&levels);
        let all_high = SignalVector::uniform(Signal::High, 4);
        let all_low = SignalVector::uniform(Signal::Low, 4);

        let mut steps = Vec::new();
        let mut rising = [false; 4];
        for channel in 0..4 {
            rising[channel] = true;
            steps.push(ScriptStep::new(v(rising), 200).labelled(format!("rising edge {channel}")));
        }
        for after_ms in [100, 500] {
            steps.push(
                ScriptStep::new(v([true, false, true, false]), after_ms)
                    .labelled(format!("alternate A at {after_ms} ms")),
            );
            steps.push(
                ScriptStep::new(v([false, true, false, true]), after_ms)
                    .labelled(format!("alternate B at {after_ms} ms")),
            );
        }
        steps.push(ScriptStep::new(all_high.clone(), 200).labelled("all high"));

        Self {
            channels: 4,
            steps,
            steady_states: vec![
                SteadyStateCheck {
                    held: all_high.clone(),
                    next: all_low.clone(),
                    trigger: all_high.clone(),
                },
                SteadyStateCheck {
                    held: all_low.clone(),
                    next: all_high,
                    trigger: all_low,
                },
            ],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.channels == 0 {
            return Err(ScriptError::Invalid("channels must be non-zero".into()));
        }
        // Observed states cover every channel; triggers may drive fewer.
        let observed = self.steps.iter().map(|step| &step.expect).chain(
            self.steady_states
                .iter()
                .flat_map(|check| [&check.held, &check.next]),
        );
        for vector in observed {
            if vector.len() != self.channels {
                return Err(ScriptError::Invalid(format!(
                    "{vector} does not cover {} channels",
                    self.channels
                )));
            }
        }
        for check in &self.steady_states {
            if check.trigger.len() > self.channels {
                return Err(ScriptError::Invalid(format!(
                    "trigger {} is wider than {} channels",
                    check.trigger, self.channels
                )));
            }
        }
        Ok(())
    }

    /// Total nominal duration of the scripted steps.
    pub fn nominal_duration(&self) -> Duration {
        self.steps.iter().map(ScriptStep::nominal).sum()
    }
}
