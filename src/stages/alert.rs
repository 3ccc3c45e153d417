//! Alert decider: filters scenarios by probability and risk and emits
//! structured decisions, or a single no-action report when nothing
//! qualifies.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::{
    AssumedValue, Condition, CostOfError, DecisionDriver, DecisionObject, DecisionResult,
    DecisionType, RiskLevel, Scenario, SimulationResult,
};
use crate::error::Result;
use crate::stage::Decider;

/// Configuration for the alert decider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub min_probability: f64,
    pub min_risk_level: RiskLevel,
    pub expiry_days: i64,
    pub decision_type: DecisionType,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_probability: 0.3,
            min_risk_level: RiskLevel::Medium,
            expiry_days: 7,
            decision_type: DecisionType::Alert,
        }
    }
}

/// Evaluates scenarios and emits decision objects when thresholds are met.
pub struct AlertDecider {
    config: AlertConfig,
}

impl AlertDecider {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    fn qualifying<'a>(&self, simulation: &'a SimulationResult) -> Vec<&'a Scenario> {
        let baseline_id = simulation.baseline.as_ref().map(|b| b.scenario_id);
        simulation
            .scenarios
            .iter()
            .filter(|s| {
                s.probability >= self.config.min_probability
                    && s.risk_level.rank() >= self.config.min_risk_level.rank()
                    && Some(s.scenario_id) != baseline_id
            })
            .collect()
    }

    fn build_decision(
        &self,
        scenario: &Scenario,
        baseline: Option<&Scenario>,
    ) -> Result<DecisionObject> {
        let price = scenario
            .projected_outcome
            .get("price")
            .copied()
            .unwrap_or(0.0);
        let baseline_price = baseline
            .and_then(|b| b.projected_outcome.get("price").copied())
            .unwrap_or(price);
        let spread_pct = if baseline_price != 0.0 {
            (price - baseline_price) / baseline_price * 100.0
        } else {
            0.0
        };

        let drivers = scenario
            .assumptions
            .iter()
            .map(|a| {
                DecisionDriver::new(
                    a.variable.clone(),
                    scenario.sensitivity.get(&a.variable).copied().unwrap_or(0.5),
                    format!("Assumed {} = {}", a.variable, assumed_label(&a.assumed_value)),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let direction = if spread_pct > 0.0 { "upside" } else { "downside" };
        let operator = if spread_pct > 0.0 { "gt" } else { "lt" };

        let conditions = vec![Condition {
            description: format!("Spread vs baseline exceeds {:.1}%", spread_pct.abs()),
            metric: "spread_pct".to_string(),
            operator: operator.to_string(),
            threshold: (spread_pct * 100.0).round() / 100.0,
            window: format!("{} days", self.config.expiry_days),
        }];

        let decision = DecisionObject::new(
            self.config.decision_type,
            format!("{} alert: {}", capitalize(direction), scenario.name),
            format!(
                "Scenario '{}' projects {direction} of {:.1}% vs baseline (price={price:.2} vs {baseline_price:.2}). Risk level: {}.",
                scenario.name,
                spread_pct.abs(),
                risk_label(scenario.risk_level),
            ),
            drivers,
            scenario.probability,
            scenario.risk_level,
            CostOfError::new(
                format!("Unnecessary action based on {}", scenario.name),
                format!("Missed {direction} opportunity of ~{:.1}%", spread_pct.abs()),
            ),
            vec![scenario.scenario_id],
        )?
        .with_conditions(conditions)
        .with_expiry(Utc::now() + Duration::days(self.config.expiry_days));

        Ok(decision)
    }

    fn build_no_action_decision(&self, simulation: &SimulationResult) -> Result<DecisionObject> {
        DecisionObject::new(
            DecisionType::Report,
            "No actionable scenarios detected",
            "All scenarios are below the configured risk and probability thresholds. No action required at this time.",
            vec![DecisionDriver::new(
                "threshold_filter",
                1.0,
                format!(
                    "min_probability={}, min_risk={}",
                    self.config.min_probability,
                    risk_label(self.config.min_risk_level),
                ),
            )?],
            0.9,
            RiskLevel::Low,
            CostOfError::new(
                "Report generated unnecessarily",
                "Missed subtle risk signal",
            ),
            simulation.scenarios.iter().map(|s| s.scenario_id).collect(),
        )
    }
}

#[async_trait]
impl Decider for AlertDecider {
    async fn decide(&self, simulation: &SimulationResult) -> Result<DecisionResult> {
        let mut decisions = Vec::new();
        for scenario in self.qualifying(simulation) {
            decisions.push(self.build_decision(scenario, simulation.baseline.as_ref())?);
        }

        if decisions.is_empty() {
            decisions.push(self.build_no_action_decision(simulation)?);
        }

        DecisionResult::new(decisions)
    }
}

fn assumed_label(value: &AssumedValue) -> String {
    match value {
        AssumedValue::Number(n) => n.to_string(),
        AssumedValue::Label(s) => s.clone(),
    }
}

fn risk_label(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
