//! Backtest monitor: grades decisions against simulated actuals.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::contracts::{
    DecisionObject, DecisionResult, FeedbackResult, PredictionVsReality, Scorecard,
};
use crate::error::Result;
use crate::stage::Monitor;

const BENEFICIAL_THRESHOLD: f64 = 0.02;
const DETRIMENTAL_THRESHOLD: f64 = -0.02;

/// Configuration for the backtest monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub seed: u64,
    pub simulated_noise: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            simulated_noise: 0.05,
        }
    }
}

/// Evaluates decisions by comparing predictions to simulated actuals.
pub struct BacktestMonitor {
    config: BacktestConfig,
}

impl BacktestMonitor {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    fn evaluate_decision(&self, decision: &DecisionObject, rng: &mut StdRng) -> Scorecard {
        let mut predictions = Vec::new();

        for condition in &decision.conditions {
            let predicted = condition.threshold;
            let noise = uniform_noise(rng, self.config.simulated_noise);
            let actual = predicted * (1.0 + noise);
            let error_pct = if predicted != 0.0 {
                (actual - predicted).abs() / predicted.abs() * 100.0
            } else {
                0.0
            };
            let within = error_pct < self.config.simulated_noise * 100.0 * 2.0;

            predictions.push(PredictionVsReality {
                metric: condition.metric.clone(),
                predicted: round4(predicted),
                actual: round4(actual),
                error_pct: round2(error_pct),
                within_confidence: within,
            });
        }

        // Decisions without conditions (e.g. no-action reports) are graded
        // on the confidence they stated.
        if predictions.is_empty() {
            let noise = uniform_noise(rng, self.config.simulated_noise);
            predictions.push(PredictionVsReality {
                metric: "overall_confidence".to_string(),
                predicted: decision.confidence,
                actual: round4(decision.confidence * (1.0 + noise)),
                error_pct: round2(self.config.simulated_noise * 100.0),
                within_confidence: true,
            });
        }

        let outcome = assess_outcome(&predictions);
        let adjustments = if outcome == "detrimental" {
            vec![
                "Consider tightening risk thresholds".to_string(),
                "Review sensitivity weights for key variables".to_string(),
            ]
        } else {
            Vec::new()
        };

        Scorecard::new(decision.decision_id, predictions, outcome)
            .with_model_adjustments(adjustments)
    }
}

#[async_trait]
impl Monitor for BacktestMonitor {
    async fn evaluate(&self, decision: &DecisionResult) -> Result<FeedbackResult> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let scorecards: Vec<Scorecard> = decision
            .decisions
            .iter()
            .map(|d| self.evaluate_decision(d, &mut rng))
            .collect();

        FeedbackResult::new(scorecards, 0, 0)
    }
}

fn assess_outcome(predictions: &[PredictionVsReality]) -> &'static str {
    if predictions.is_empty() {
        return "neutral";
    }
    let hit_rate = predictions
        .iter()
        .filter(|p| p.within_confidence)
        .count() as f64
        / predictions.len() as f64;

    if hit_rate > (1.0 + BENEFICIAL_THRESHOLD) / 2.0 {
        "beneficial"
    } else if hit_rate < (1.0 + DETRIMENTAL_THRESHOLD) / 2.0 {
        "detrimental"
    } else {
        "neutral"
    }
}

fn uniform_noise(rng: &mut StdRng, scale: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * 2.0 * scale
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
