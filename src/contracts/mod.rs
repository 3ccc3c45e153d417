//! Immutable, self-validating result contracts for every pipeline stage.
//!
//! Each contract is produced by exactly one stage invocation, owned by the
//! run record afterwards, and never mutated. Constructors validate bounded
//! fields and list cardinalities; decoding via [`Contract::from_value`]
//! re-runs the same validation so a persisted tree can never smuggle an
//! invalid instance back into the process.
//!
//! Wire shape is stable: snake_case field names, ISO-8601 timestamps,
//! lowercase string enums.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UgearError};

pub mod compression;
pub mod decision;
pub mod feedback;
pub mod hypothesis;
pub mod observation;
pub mod simulation;

pub use compression::{CompressionResult, MarketState, SignalValue};
pub use decision::{Condition, CostOfError, DecisionDriver, DecisionObject, DecisionResult};
pub use feedback::{FeedbackResult, PredictionVsReality, Scorecard, SourceDegradation};
pub use hypothesis::{Hypothesis, HypothesisResult, Threshold, ValidationCriterion};
pub use observation::{CollectionResult, DataQualityReport, RawEvent};
pub use simulation::{Assumption, AssumedValue, Scenario, SimulationResult, MIN_SCENARIOS};

/// Common behavior of every stage contract: self-validation plus lossless
/// round-trip to a tree of primitive values.
pub trait Contract: Serialize + DeserializeOwned + Sized {
    /// Check construction invariants. Constructors call this; so does
    /// [`Contract::from_value`] after decoding.
    fn validate(&self) -> Result<()>;

    /// Encode to a JSON-compatible primitive tree.
    fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from a primitive tree, rejecting invalid instances.
    fn from_value(value: serde_json::Value) -> Result<Self> {
        let decoded: Self = serde_json::from_value(value)?;
        decoded.validate()?;
        Ok(decoded)
    }
}

/// Kind of source a raw event was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Api,
    File,
    Scraper,
    Manual,
    Synthetic,
}

/// Time window size of a compressed market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

/// Declared trust level of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceReliability {
    High,
    Medium,
    Low,
    Degraded,
}

/// Lifecycle status of a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisStatus {
    Pending,
    Confirmed,
    Rejected,
    Expired,
}

/// Risk bucket attached to scenarios and decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Ordinal rank, lowest risk first.
    pub fn rank(self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        }
    }
}

/// What kind of action a decision object recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Alert,
    Recommendation,
    Trigger,
    Report,
}

/// Source metadata attached to every raw event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source_id: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub url_or_path: Option<String>,
    #[serde(default)]
    pub expected_schema_version: Option<String>,
    pub reliability: SourceReliability,
}

impl SourceMeta {
    pub fn new(source_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            url_or_path: None,
            expected_schema_version: None,
            reliability: SourceReliability::High,
        }
    }

    pub fn with_reliability(mut self, reliability: SourceReliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.expected_schema_version = Some(version.into());
        self
    }
}

/// Individual data-quality flag raised during collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub field_name: String,
    pub issue: String,
    pub severity: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl QualityFlag {
    pub fn new(
        field_name: impl Into<String>,
        issue: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            issue: issue.into(),
            severity: severity.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Reject a bounded score that falls outside `[0, 1]`.
pub(crate) fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(UgearError::contract_field(
            field,
            format!("{value} outside [0, 1]"),
        ));
    }
    Ok(())
}

/// Reject an empty list where the contract requires at least one element.
pub(crate) fn check_non_empty<T>(field: &str, items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Err(UgearError::contract_field(
            field,
            "requires at least 1 element",
        ));
    }
    Ok(())
}

/// Reject a stage discriminator that does not match the producing stage.
pub(crate) fn check_stage(expected: &str, actual: &str) -> Result<()> {
    if expected != actual {
        return Err(UgearError::contract_field(
            "stage",
            format!("expected '{expected}', got '{actual}'"),
        ));
    }
    Ok(())
}
