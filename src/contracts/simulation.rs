//! Simulation stage contracts. Single-path forecasting is rejected at the
//! type level: a simulation result carries at least [`MIN_SCENARIOS`]
//! scenarios.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, UgearError};

use super::{check_stage, check_unit_interval, Contract, RiskLevel};

/// A simulation must offer at least this many scenarios.
pub const MIN_SCENARIOS: usize = 2;

pub(crate) fn stage_simulation() -> String {
    "simulation".to_string()
}

/// Value assumed for a scenario variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssumedValue {
    Number(f64),
    Label(String),
}

impl From<f64> for AssumedValue {
    fn from(value: f64) -> Self {
        AssumedValue::Number(value)
    }
}

impl From<&str> for AssumedValue {
    fn from(value: &str) -> Self {
        AssumedValue::Label(value.to_string())
    }
}

/// Explicit assumption underpinning a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    pub variable: String,
    pub assumed_value: AssumedValue,
    pub justification: String,
}

impl Assumption {
    pub fn new(
        variable: impl Into<String>,
        assumed_value: impl Into<AssumedValue>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            assumed_value: assumed_value.into(),
            justification: justification.into(),
        }
    }
}

/// Conditional scenario produced by simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: Uuid,
    pub name: String,
    pub description: String,
    pub assumptions: Vec<Assumption>,
    pub projected_outcome: BTreeMap<String, f64>,
    pub confidence_interval: (f64, f64),
    pub probability: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub sensitivity: BTreeMap<String, f64>,
    pub source_hypotheses: Vec<Uuid>,
}

impl Scenario {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        assumptions: Vec<Assumption>,
        projected_outcome: BTreeMap<String, f64>,
        confidence_interval: (f64, f64),
        probability: f64,
        risk_level: RiskLevel,
        source_hypotheses: Vec<Uuid>,
    ) -> Result<Self> {
        let scenario = Self {
            scenario_id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            assumptions,
            projected_outcome,
            confidence_interval,
            probability,
            risk_level,
            sensitivity: BTreeMap::new(),
            source_hypotheses,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn with_sensitivity(mut self, sensitivity: BTreeMap<String, f64>) -> Self {
        self.sensitivity = sensitivity;
        self
    }
}

impl Contract for Scenario {
    fn validate(&self) -> Result<()> {
        check_unit_interval("probability", self.probability)?;
        let (lower, upper) = self.confidence_interval;
        if lower > upper {
            return Err(UgearError::contract_field(
                "confidence_interval",
                format!("lower bound {lower} exceeds upper bound {upper}"),
            ));
        }
        Ok(())
    }
}

/// Full output of the Simulation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub baseline: Option<Scenario>,
    #[serde(default = "stage_simulation")]
    pub stage: String,
}

impl SimulationResult {
    pub fn new(scenarios: Vec<Scenario>, baseline: Option<Scenario>) -> Result<Self> {
        let result = Self {
            scenarios,
            baseline,
            stage: stage_simulation(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for SimulationResult {
    fn validate(&self) -> Result<()> {
        check_stage("simulation", &self.stage)?;
        if self.scenarios.len() < MIN_SCENARIOS {
            return Err(UgearError::contract_field(
                "scenarios",
                format!(
                    "requires at least {MIN_SCENARIOS} scenarios, got {}",
                    self.scenarios.len()
                ),
            ));
        }
        for scenario in &self.scenarios {
            scenario.validate()?;
        }
        if let Some(baseline) = &self.baseline {
            baseline.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, probability: f64) -> Scenario {
        Scenario::new(
            name,
            format!("scenario {name}"),
            vec![Assumption::new("demand_index", 1.0, "median value")],
            BTreeMap::from([("price".to_string(), 104.0)]),
            (95.0, 113.0),
            probability,
            RiskLevel::Medium,
            vec![Uuid::new_v4()],
        )
        .unwrap()
    }

    #[test]
    fn simulation_rejects_fewer_than_two_scenarios() {
        assert!(SimulationResult::new(vec![], None).is_err());
        assert!(SimulationResult::new(vec![scenario("only", 0.5)], None).is_err());
    }

    #[test]
    fn simulation_accepts_two_scenarios() {
        let result =
            SimulationResult::new(vec![scenario("a", 0.5), scenario("b", 0.3)], None).unwrap();
        assert_eq!(result.scenarios.len(), 2);
        assert_eq!(result.stage, "simulation");
    }

    #[test]
    fn scenario_probability_is_bounded() {
        let result = Scenario::new(
            "bad",
            "probability out of range",
            vec![],
            BTreeMap::new(),
            (0.0, 1.0),
            1.5,
            RiskLevel::Low,
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn scenario_rejects_inverted_confidence_interval() {
        let result = Scenario::new(
            "bad",
            "inverted interval",
            vec![],
            BTreeMap::new(),
            (10.0, 5.0),
            0.5,
            RiskLevel::Low,
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn decoding_rejects_single_scenario_tree() {
        let result =
            SimulationResult::new(vec![scenario("a", 0.5), scenario("b", 0.3)], None).unwrap();
        let mut value = result.to_value().unwrap();
        let scenarios = value["scenarios"].as_array_mut().unwrap();
        scenarios.truncate(1);
        assert!(SimulationResult::from_value(value).is_err());
    }
}
