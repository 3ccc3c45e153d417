//! Global settings: defaults, optional YAML file, `UGEAR_`-prefixed
//! environment overrides, in that precedence order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::FailurePolicy;

const ENV_PREFIX: &str = "UGEAR_";

/// Process-level settings for the pipeline engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UgearSettings {
    pub log_level: String,
    pub log_json: bool,
    pub fail_fast: bool,
    pub validate_transitions: bool,
}

impl Default for UgearSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            fail_fast: true,
            validate_transitions: true,
        }
    }
}

impl UgearSettings {
    /// Defaults plus environment overrides.
    pub fn load() -> Self {
        Self::default().apply_env()
    }

    /// YAML file plus environment overrides.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;
        Ok(settings.apply_env())
    }

    /// The failure policy implied by these settings.
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::ContinueOnError
        }
    }

    fn apply_env(mut self) -> Self {
        if let Some(level) = env_var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(json) = env_var("LOG_JSON").and_then(parse_bool) {
            self.log_json = json;
        }
        if let Some(fail_fast) = env_var("FAIL_FAST").and_then(parse_bool) {
            self.fail_fast = fail_fast;
        }
        if let Some(validate) = env_var("VALIDATE_TRANSITIONS").and_then(parse_bool) {
            self.validate_transitions = validate;
        }
        self
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn parse_bool(value: String) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
