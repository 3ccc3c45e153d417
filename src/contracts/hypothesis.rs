//! Hypothesis stage contracts. Falsifiability is structural: a hypothesis
//! cannot be constructed without both validation and falsification criteria.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

use super::{check_non_empty, check_stage, check_unit_interval, Contract, HypothesisStatus};

pub(crate) fn stage_hypothesis() -> String {
    "hypothesis".to_string()
}

/// Threshold for a criterion: a single point or an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Point(f64),
    Range(f64, f64),
}

/// Criterion used to validate or falsify a hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCriterion {
    pub metric: String,
    pub operator: String,
    pub threshold: Threshold,
    pub description: String,
}

impl ValidationCriterion {
    pub fn new(
        metric: impl Into<String>,
        operator: impl Into<String>,
        threshold: Threshold,
        description: impl Into<String>,
    ) -> Self {
        Self {
            metric: metric.into(),
            operator: operator.into(),
            threshold,
            description: description.into(),
        }
    }
}

/// Testable hypothesis derived from market states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub hypothesis_id: Uuid,
    pub statement: String,
    pub rationale: String,
    pub status: HypothesisStatus,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub validation_criteria: Vec<ValidationCriterion>,
    pub falsification_criteria: Vec<ValidationCriterion>,
    #[serde(default)]
    pub competing_hypotheses: Vec<String>,
    pub source_states: Vec<Uuid>,
}

impl Hypothesis {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        statement: impl Into<String>,
        rationale: impl Into<String>,
        confidence: f64,
        valid_until: DateTime<Utc>,
        validation_criteria: Vec<ValidationCriterion>,
        falsification_criteria: Vec<ValidationCriterion>,
        source_states: Vec<Uuid>,
    ) -> Result<Self> {
        let hypothesis = Self {
            hypothesis_id: Uuid::new_v4(),
            statement: statement.into(),
            rationale: rationale.into(),
            status: HypothesisStatus::Pending,
            confidence,
            created_at: Utc::now(),
            valid_until,
            validation_criteria,
            falsification_criteria,
            competing_hypotheses: Vec::new(),
            source_states,
        };
        hypothesis.validate()?;
        Ok(hypothesis)
    }

    pub fn with_competing(mut self, competing: Vec<String>) -> Self {
        self.competing_hypotheses = competing;
        self
    }
}

impl Contract for Hypothesis {
    fn validate(&self) -> Result<()> {
        check_unit_interval("confidence", self.confidence)?;
        check_non_empty("validation_criteria", &self.validation_criteria)?;
        check_non_empty("falsification_criteria", &self.falsification_criteria)?;
        Ok(())
    }
}

/// Full output of the Hypothesis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisResult {
    pub hypotheses: Vec<Hypothesis>,
    pub states_analyzed: u64,
    #[serde(default = "stage_hypothesis")]
    pub stage: String,
}

impl HypothesisResult {
    pub fn new(hypotheses: Vec<Hypothesis>, states_analyzed: u64) -> Result<Self> {
        let result = Self {
            hypotheses,
            states_analyzed,
            stage: stage_hypothesis(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for HypothesisResult {
    fn validate(&self) -> Result<()> {
        check_stage("hypothesis", &self.stage)?;
        for hypothesis in &self.hypotheses {
            hypothesis.validate()?;
        }
        Ok(())
    }
}
