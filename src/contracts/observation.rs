//! Observation stage contracts: raw events and the quality report that
//! gates the first transition.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, UgearError};

use super::{check_stage, check_unit_interval, Contract, QualityFlag, SourceMeta};

pub(crate) fn stage_observation() -> String {
    "observation".to_string()
}

/// Single raw event collected from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_id: Uuid,
    pub source: SourceMeta,
    pub timestamp: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub schema_version: Option<String>,
}

impl RawEvent {
    pub fn new(
        source: SourceMeta,
        timestamp: DateTime<Utc>,
        data: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            source,
            timestamp,
            collected_at: Utc::now(),
            data,
            schema_version: None,
        }
    }

    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }
}

impl Contract for RawEvent {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Quality report produced by the observation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub source: SourceMeta,
    pub collected_at: DateTime<Utc>,
    pub total_records: u64,
    pub valid_records: u64,
    #[serde(default)]
    pub flags: Vec<QualityFlag>,
    pub schema_match: bool,
    pub reliability_score: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DataQualityReport {
    pub fn new(
        source: SourceMeta,
        total_records: u64,
        valid_records: u64,
        flags: Vec<QualityFlag>,
        reliability_score: f64,
    ) -> Result<Self> {
        let report = Self {
            source,
            collected_at: Utc::now(),
            total_records,
            valid_records,
            flags,
            schema_match: true,
            reliability_score,
            notes: None,
        };
        report.validate()?;
        Ok(report)
    }

    pub fn with_schema_match(mut self, schema_match: bool) -> Self {
        self.schema_match = schema_match;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Fraction of records that passed validation, 0.0 for an empty batch.
    pub fn valid_ratio(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.valid_records as f64 / self.total_records as f64
    }
}

impl Contract for DataQualityReport {
    fn validate(&self) -> Result<()> {
        check_unit_interval("reliability_score", self.reliability_score)?;
        if self.valid_records > self.total_records {
            return Err(UgearError::contract_field(
                "valid_records",
                format!(
                    "{} valid records exceed {} total",
                    self.valid_records, self.total_records
                ),
            ));
        }
        Ok(())
    }
}

/// Full output of the Observation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub events: Vec<RawEvent>,
    pub quality_report: DataQualityReport,
    #[serde(default = "stage_observation")]
    pub stage: String,
}

impl CollectionResult {
    pub fn new(events: Vec<RawEvent>, quality_report: DataQualityReport) -> Result<Self> {
        let result = Self {
            events,
            quality_report,
            stage: stage_observation(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for CollectionResult {
    fn validate(&self) -> Result<()> {
        check_stage("observation", &self.stage)?;
        self.quality_report.validate()?;
        for event in &self.events {
            event.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::SourceType;

    fn source() -> SourceMeta {
        SourceMeta::new("test-src", SourceType::Synthetic)
    }

    #[test]
    fn quality_report_rejects_out_of_range_reliability() {
        assert!(DataQualityReport::new(source(), 10, 9, vec![], 1.5).is_err());
        assert!(DataQualityReport::new(source(), 10, 9, vec![], -0.1).is_err());
    }

    #[test]
    fn quality_report_rejects_valid_exceeding_total() {
        assert!(DataQualityReport::new(source(), 5, 6, vec![], 0.9).is_err());
    }

    #[test]
    fn valid_ratio_handles_empty_batch() {
        let report = DataQualityReport::new(source(), 0, 0, vec![], 0.0).unwrap();
        assert_eq!(report.valid_ratio(), 0.0);
    }

    #[test]
    fn collection_result_carries_stage_discriminator() {
        let report = DataQualityReport::new(source(), 1, 1, vec![], 1.0).unwrap();
        let event = RawEvent::new(source(), Utc::now(), BTreeMap::new());
        let result = CollectionResult::new(vec![event], report).unwrap();
        assert_eq!(result.stage, "observation");
    }

    #[test]
    fn decoding_rejects_tampered_reliability() {
        let report = DataQualityReport::new(source(), 10, 9, vec![], 0.9).unwrap();
        let mut value = report.to_value().unwrap();
        value["reliability_score"] = serde_json::json!(3.0);
        assert!(DataQualityReport::from_value(value).is_err());
    }
}
