//! Compression stage contracts: normalised signals aggregated into
//! time-windowed market states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

use super::{check_non_empty, check_stage, check_unit_interval, Contract, Granularity};

pub(crate) fn stage_compression() -> String {
    "compression".to_string()
}

/// Single normalised signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalValue {
    pub name: String,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub original_unit: Option<String>,
    pub confidence: f64,
}

impl SignalValue {
    pub fn new(
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        confidence: f64,
    ) -> Result<Self> {
        let signal = Self {
            name: name.into(),
            value,
            unit: unit.into(),
            original_unit: None,
            confidence,
        };
        signal.validate()?;
        Ok(signal)
    }
}

impl Contract for SignalValue {
    fn validate(&self) -> Result<()> {
        check_unit_interval("confidence", self.confidence)
    }
}

/// Compressed, normalised market state for one time window.
///
/// Lineage lists the raw event ids the state was derived from; it exists
/// for audit only and is never followed for mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub state_id: Uuid,
    pub domain: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub granularity: Granularity,
    pub signals: Vec<SignalValue>,
    pub lineage: Vec<Uuid>,
    pub source_reliability: f64,
}

impl MarketState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: impl Into<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        granularity: Granularity,
        signals: Vec<SignalValue>,
        lineage: Vec<Uuid>,
        source_reliability: f64,
    ) -> Result<Self> {
        let state = Self {
            state_id: Uuid::new_v4(),
            domain: domain.into(),
            period_start,
            period_end,
            granularity,
            signals,
            lineage,
            source_reliability,
        };
        state.validate()?;
        Ok(state)
    }

    /// Look up one signal by name.
    pub fn signal(&self, name: &str) -> Option<&SignalValue> {
        self.signals.iter().find(|s| s.name == name)
    }
}

impl Contract for MarketState {
    fn validate(&self) -> Result<()> {
        check_non_empty("signals", &self.signals)?;
        check_non_empty("lineage", &self.lineage)?;
        check_unit_interval("source_reliability", self.source_reliability)?;
        for signal in &self.signals {
            signal.validate()?;
        }
        Ok(())
    }
}

/// Full output of the Compression stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub states: Vec<MarketState>,
    pub records_consumed: u64,
    pub records_produced: u64,
    #[serde(default)]
    pub normalization_log: Vec<String>,
    #[serde(default = "stage_compression")]
    pub stage: String,
}

impl CompressionResult {
    pub fn new(
        states: Vec<MarketState>,
        records_consumed: u64,
        normalization_log: Vec<String>,
    ) -> Result<Self> {
        let records_produced = states.len() as u64;
        let result = Self {
            states,
            records_consumed,
            records_produced,
            normalization_log,
            stage: stage_compression(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for CompressionResult {
    fn validate(&self) -> Result<()> {
        check_stage("compression", &self.stage)?;
        for state in &self.states {
            state.validate()?;
        }
        Ok(())
    }
}
