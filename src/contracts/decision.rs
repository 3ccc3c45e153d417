//! Decision stage contracts. A decision cannot exist without stating both
//! failure directions: `cost_of_error` is a mandatory, non-optional field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

use super::{check_stage, check_unit_interval, Contract, DecisionType, RiskLevel};

pub(crate) fn stage_decision() -> String {
    "decision".to_string()
}

/// Factor influencing a decision, with a relative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDriver {
    pub name: String,
    pub weight: f64,
    pub description: String,
}

impl DecisionDriver {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        description: impl Into<String>,
    ) -> Result<Self> {
        let driver = Self {
            name: name.into(),
            weight,
            description: description.into(),
        };
        driver.validate()?;
        Ok(driver)
    }
}

impl Contract for DecisionDriver {
    fn validate(&self) -> Result<()> {
        check_unit_interval("weight", self.weight)
    }
}

/// Narratives for both directions of being wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostOfError {
    pub false_positive: String,
    pub false_negative: String,
    #[serde(default)]
    pub estimated_magnitude: Option<String>,
}

impl CostOfError {
    pub fn new(false_positive: impl Into<String>, false_negative: impl Into<String>) -> Self {
        Self {
            false_positive: false_positive.into(),
            false_negative: false_negative.into(),
            estimated_magnitude: None,
        }
    }
}

/// Activation condition for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub description: String,
    pub metric: String,
    pub operator: String,
    pub threshold: f64,
    pub window: String,
}

/// Structured, actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionObject {
    pub decision_id: Uuid,
    pub decision_type: DecisionType,
    pub title: String,
    pub recommendation: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub drivers: Vec<DecisionDriver>,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub cost_of_error: CostOfError,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub source_scenarios: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DecisionObject {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decision_type: DecisionType,
        title: impl Into<String>,
        recommendation: impl Into<String>,
        drivers: Vec<DecisionDriver>,
        confidence: f64,
        risk_level: RiskLevel,
        cost_of_error: CostOfError,
        source_scenarios: Vec<Uuid>,
    ) -> Result<Self> {
        let decision = Self {
            decision_id: Uuid::new_v4(),
            decision_type,
            title: title.into(),
            recommendation: recommendation.into(),
            conditions: Vec::new(),
            drivers,
            confidence,
            risk_level,
            cost_of_error,
            expires_at: None,
            source_scenarios,
            created_at: Utc::now(),
        };
        decision.validate()?;
        Ok(decision)
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl Contract for DecisionObject {
    fn validate(&self) -> Result<()> {
        check_unit_interval("confidence", self.confidence)?;
        for driver in &self.drivers {
            driver.validate()?;
        }
        Ok(())
    }
}

/// Full output of the Decision stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decisions: Vec<DecisionObject>,
    #[serde(default = "stage_decision")]
    pub stage: String,
}

impl DecisionResult {
    pub fn new(decisions: Vec<DecisionObject>) -> Result<Self> {
        let result = Self {
            decisions,
            stage: stage_decision(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for DecisionResult {
    fn validate(&self) -> Result<()> {
        check_stage("decision", &self.stage)?;
        for decision in &self.decisions {
            decision.validate()?;
        }
        Ok(())
    }
}
