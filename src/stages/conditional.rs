//! Conditional scenario simulator: cartesian product of variable assumptions
//! with a linear price projection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::{
    Assumption, HypothesisResult, RiskLevel, Scenario, SimulationResult,
};
use crate::error::Result;
use crate::stage::Simulator;

const RISK_HIGH_THRESHOLD: f64 = 0.7;
const RISK_MEDIUM_THRESHOLD: f64 = 0.4;
const RISK_LOW_THRESHOLD: f64 = 0.15;

/// Configuration for the conditional scenario engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalConfig {
    pub variables: BTreeMap<String, Vec<f64>>,
    pub base_price: f64,
    pub sensitivity_weights: BTreeMap<String, f64>,
    pub historical_volatility: f64,
}

impl Default for ConditionalConfig {
    fn default() -> Self {
        let mut variables = BTreeMap::new();
        variables.insert("exchange_rate".to_string(), vec![4.8, 5.2, 5.6]);
        variables.insert("demand_index".to_string(), vec![0.8, 1.0, 1.2]);
        let mut weights = BTreeMap::new();
        weights.insert("exchange_rate".to_string(), 0.6);
        weights.insert("demand_index".to_string(), 0.4);
        Self {
            variables,
            base_price: 100.0,
            sensitivity_weights: weights,
            historical_volatility: 0.15,
        }
    }
}

/// Produces scenarios from the cartesian product of variable assumptions.
/// The baseline (median assumptions) is always included, so the result
/// carries at least two scenarios whenever any variable has values.
pub struct ConditionalSimulator {
    config: ConditionalConfig,
}

impl ConditionalSimulator {
    pub fn new(config: ConditionalConfig) -> Self {
        Self { config }
    }

    fn build_scenarios(&self, source_ids: &[Uuid]) -> Result<Vec<Scenario>> {
        let var_names: Vec<&String> = self.config.variables.keys().collect();
        let var_values: Vec<&Vec<f64>> = self.config.variables.values().collect();

        let mut scenarios = Vec::new();
        for combo in cartesian_product(&var_values) {
            let assignment: BTreeMap<String, f64> = var_names
                .iter()
                .zip(combo.iter())
                .map(|(name, value)| ((*name).clone(), *value))
                .collect();

            let assumptions: Vec<Assumption> = assignment
                .iter()
                .map(|(name, value)| {
                    Assumption::new(name.clone(), *value, format!("Scenario assumption for {name}"))
                })
                .collect();

            let projected_price = self.project_price(&assignment);
            let vol = self.config.historical_volatility;
            let probability = self.estimate_probability(&assignment);
            let risk = self.assess_risk(projected_price);

            let name = assignment
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join(" x ");

            let scenario = Scenario::new(
                name.clone(),
                format!("Conditional scenario with {name}"),
                assumptions,
                BTreeMap::from([("price".to_string(), round2(projected_price))]),
                (
                    round2(projected_price * (1.0 - vol)),
                    round2(projected_price * (1.0 + vol)),
                ),
                probability,
                risk,
                source_ids.to_vec(),
            )?
            .with_sensitivity(self.config.sensitivity_weights.clone());

            scenarios.push(scenario);
        }
        Ok(scenarios)
    }

    fn build_baseline(&self, source_ids: &[Uuid]) -> Result<Scenario> {
        let mid_values: BTreeMap<String, f64> = self
            .config
            .variables
            .iter()
            .map(|(name, values)| (name.clone(), median(values)))
            .collect();

        let projected_price = self.project_price(&mid_values);
        let vol = self.config.historical_volatility;

        let assumptions: Vec<Assumption> = mid_values
            .iter()
            .map(|(name, value)| {
                Assumption::new(
                    name.clone(),
                    *value,
                    format!("Median historical value for {name}"),
                )
            })
            .collect();

        let scenario = Scenario::new(
            "baseline (status quo)",
            "Baseline scenario: median assumptions, no action taken",
            assumptions,
            BTreeMap::from([("price".to_string(), round2(projected_price))]),
            (
                round2(projected_price * (1.0 - vol)),
                round2(projected_price * (1.0 + vol)),
            ),
            0.5,
            RiskLevel::Medium,
            source_ids.to_vec(),
        )?
        .with_sensitivity(self.config.sensitivity_weights.clone());

        Ok(scenario)
    }

    fn project_price(&self, assignment: &BTreeMap<String, f64>) -> f64 {
        let mut price = self.config.base_price;
        for (name, value) in assignment {
            let weight = self.config.sensitivity_weights.get(name).copied().unwrap_or(0.0);
            price += weight * (value - 1.0) * self.config.base_price;
        }
        price
    }

    /// Rough heuristic: values closer to the variable's median get a higher
    /// probability, floored at 0.1.
    fn estimate_probability(&self, assignment: &BTreeMap<String, f64>) -> f64 {
        let mut distances = Vec::new();
        for (name, value) in assignment {
            let all_values = match self.config.variables.get(name) {
                Some(values) if !values.is_empty() => values.clone(),
                _ => vec![*value],
            };
            let median = median(&all_values);
            let spread = if all_values.len() > 1 {
                max_of(&all_values) - min_of(&all_values)
            } else {
                1.0
            };
            distances.push(if spread != 0.0 {
                (value - median).abs() / spread
            } else {
                0.0
            });
        }

        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        round2((1.0 - avg_distance).max(0.1))
    }

    fn assess_risk(&self, projected_price: f64) -> RiskLevel {
        let deviation = (projected_price - self.config.base_price).abs() / self.config.base_price;
        if deviation > RISK_HIGH_THRESHOLD {
            RiskLevel::Critical
        } else if deviation > RISK_MEDIUM_THRESHOLD {
            RiskLevel::High
        } else if deviation > RISK_LOW_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[async_trait]
impl Simulator for ConditionalSimulator {
    async fn simulate(&self, hypotheses: &HypothesisResult) -> Result<SimulationResult> {
        let source_ids: Vec<Uuid> = hypotheses
            .hypotheses
            .iter()
            .map(|h| h.hypothesis_id)
            .collect();

        let baseline = self.build_baseline(&source_ids)?;
        let mut scenarios = vec![baseline.clone()];
        scenarios.extend(self.build_scenarios(&source_ids)?);

        SimulationResult::new(scenarios, Some(baseline))
    }
}

/// All combinations of one value per variable, odometer style.
fn cartesian_product(value_sets: &[&Vec<f64>]) -> Vec<Vec<f64>> {
    if value_sets.iter().any(|values| values.is_empty()) {
        return Vec::new();
    }
    let mut combos: Vec<Vec<f64>> = vec![Vec::new()];
    for values in value_sets {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values.iter() {
                let mut extended = combo.clone();
                extended.push(*value);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
