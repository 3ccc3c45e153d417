//! Rolling-window z-score anomaly analyzer.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::{
    CompressionResult, Hypothesis, HypothesisResult, MarketState, Threshold, ValidationCriterion,
};
use crate::error::Result;
use crate::stage::Analyzer;

const MIN_WINDOW_FILL: usize = 3;

/// Configuration for rolling z-score detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreConfig {
    pub window_size: usize,
    pub threshold: f64,
    pub signals_to_watch: Vec<String>,
    pub validity_days: i64,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            threshold: 2.0,
            signals_to_watch: vec!["price".to_string()],
            validity_days: 14,
        }
    }
}

/// Flags statistical outliers in watched signals using a rolling window.
pub struct ZScoreAnalyzer {
    config: ZScoreConfig,
}

impl ZScoreAnalyzer {
    pub fn new(config: ZScoreConfig) -> Self {
        Self { config }
    }

    fn analyze_signal(&self, states: &[MarketState], signal_name: &str) -> Result<Vec<Hypothesis>> {
        let values = extract_signal(states, signal_name);
        if values.len() < MIN_WINDOW_FILL {
            return Ok(Vec::new());
        }

        let window_start = values.len().saturating_sub(self.config.window_size);
        let window = &values[window_start..];
        let baseline = &window[..window.len() - 1];
        let mean = mean(baseline);
        let std = population_std(baseline, mean);

        if std == 0.0 {
            return Ok(Vec::new());
        }

        let current = window[window.len() - 1];
        let zscore = (current - mean) / std;

        if zscore.abs() < self.config.threshold {
            return Ok(Vec::new());
        }

        let direction = if zscore > 0.0 { "above" } else { "below" };
        let state_window_start = states.len().saturating_sub(self.config.window_size);
        let source_states: Vec<Uuid> = states[state_window_start..]
            .iter()
            .map(|s| s.state_id)
            .collect();

        let (operator, threshold) = if zscore > 0.0 {
            ("gt", self.config.threshold)
        } else {
            ("lt", -self.config.threshold)
        };

        let hypothesis = Hypothesis::new(
            format!(
                "Statistical outlier: '{signal_name}' z-score {zscore:.2} ({direction} rolling mean)"
            ),
            format!(
                "Rolling window of {} periods: mean={mean:.2}, std={std:.2}, current={current:.2}, z-score={zscore:.2}.",
                window.len()
            ),
            (zscore.abs() / (self.config.threshold * 2.0)).min(1.0),
            Utc::now() + Duration::days(self.config.validity_days),
            vec![ValidationCriterion::new(
                format!("{signal_name}_zscore"),
                operator,
                Threshold::Point(threshold),
                format!("Z-score remains {direction} threshold"),
            )],
            vec![ValidationCriterion::new(
                format!("{signal_name}_zscore"),
                "between",
                Threshold::Range(-1.0, 1.0),
                "Z-score returns to normal range (-1, 1)",
            )],
            source_states,
        )?
        .with_competing(vec![
            "seasonal_shift".to_string(),
            "measurement_error".to_string(),
        ]);

        Ok(vec![hypothesis])
    }
}

#[async_trait]
impl Analyzer for ZScoreAnalyzer {
    async fn analyze(&self, compression: &CompressionResult) -> Result<HypothesisResult> {
        let mut hypotheses = Vec::new();
        for signal_name in &self.config.signals_to_watch {
            hypotheses.extend(self.analyze_signal(&compression.states, signal_name)?);
        }
        HypothesisResult::new(hypotheses, compression.states.len() as u64)
    }
}

fn extract_signal(states: &[MarketState], signal_name: &str) -> Vec<f64> {
    states
        .iter()
        .filter_map(|state| state.signal(signal_name).map(|s| s.value))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
