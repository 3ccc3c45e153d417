//! Unified error type for the ugear pipeline engine.
//!
//! Every failure the engine can produce maps onto one variant here, so the
//! orchestrator can attach a single displayable cause to the run result.

use thiserror::Error;

/// The unified error type for the ugear crate.
#[derive(Error, Debug)]
pub enum UgearError {
    /// A contract type failed its own construction invariants.
    #[error("contract violation{}: {message}", field_suffix(.field))]
    Contract {
        message: String,
        field: Option<String>,
    },

    /// Stage output is structurally valid but fails the next boundary's gate.
    #[error("stage transition rejected after '{stage}': {reason}")]
    Transition { stage: String, reason: String },

    /// The requested `(category, name)` pair is not registered.
    #[error("plugin '{name}' not found in category '{category}' (available: {})", .available.join(", "))]
    PluginNotFound {
        category: String,
        name: String,
        available: Vec<String>,
    },

    /// A `(category, name)` pair is already registered and no override was requested.
    #[error("plugin '{name}' already registered in category '{category}'")]
    DuplicateRegistration { category: String, name: String },

    /// One external package failed during discovery.
    #[error("discovery failed for package '{package}': {message}")]
    Discovery { package: String, message: String },

    /// A stage body raised an error during execution.
    #[error("stage '{stage}' failed: {message}")]
    Stage {
        stage: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Orchestration failure outside any single stage body.
    #[error("pipeline error: {message}")]
    Pipeline { message: String },

    /// Configuration loading or parsing failure.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Contract encoding/decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" in field '{f}'"),
        None => String::new(),
    }
}

impl UgearError {
    /// Create a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
            field: None,
        }
    }

    /// Create a contract violation error naming the offending field.
    pub fn contract_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a transition rejection for the given stage boundary.
    pub fn transition(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transition {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create a plugin-not-found error listing what is registered.
    pub fn plugin_not_found(
        category: impl Into<String>,
        name: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        Self::PluginNotFound {
            category: category.into(),
            name: name.into(),
            available,
        }
    }

    /// Create a duplicate-registration error.
    pub fn duplicate_registration(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateRegistration {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Create a discovery error for one external package.
    pub fn discovery(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Create a stage execution error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a pipeline orchestration error.
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error to this error.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Stage { source: src, .. } | Self::Config { source: src, .. } => {
                *src = Some(source.into());
            }
            _ => {}
        }
        self
    }

    /// True when this error represents a transition-gate rejection.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition { .. })
    }
}

impl From<std::io::Error> for UgearError {
    fn from(err: std::io::Error) -> Self {
        UgearError::config("io operation failed").with_source(err)
    }
}

impl From<serde_yaml::Error> for UgearError {
    fn from(err: serde_yaml::Error) -> Self {
        UgearError::config("invalid YAML").with_source(err)
    }
}

/// Type alias for Results using [`UgearError`].
pub type Result<T> = std::result::Result<T, UgearError>;

/// Type alias for application Results (using anyhow for flexibility).
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_error_names_field() {
        let err = UgearError::contract_field("probability", "1.2 outside [0, 1]");
        assert!(err.to_string().contains("probability"));
        assert!(err.to_string().contains("1.2"));
    }

    #[test]
    fn not_found_lists_available() {
        let err =
            UgearError::plugin_not_found("decider", "nonexistent", vec!["alert".to_string()]);
        let msg = err.to_string();
        assert!(msg.contains("nonexistent"));
        assert!(msg.contains("alert"));
    }

    #[test]
    fn transition_errors_are_detectable() {
        let err = UgearError::transition("observation", "reliability too low");
        assert!(err.is_transition());
        assert!(!UgearError::pipeline("boom").is_transition());
    }
}
