//! Feedback stage contracts: retrospective scorecards grading past
//! decisions, plus aggregate accuracy metrics over them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

use super::{check_stage, check_unit_interval, Contract};

pub(crate) fn stage_feedback() -> String {
    "feedback".to_string()
}

/// Comparison between a projection and observed reality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionVsReality {
    pub metric: String,
    pub predicted: f64,
    pub actual: f64,
    pub error_pct: f64,
    pub within_confidence: bool,
}

/// Record of a source reliability adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDegradation {
    pub source_id: String,
    pub previous_reliability: f64,
    pub current_reliability: f64,
    pub reason: String,
}

impl SourceDegradation {
    pub fn new(
        source_id: impl Into<String>,
        previous_reliability: f64,
        current_reliability: f64,
        reason: impl Into<String>,
    ) -> Result<Self> {
        let degradation = Self {
            source_id: source_id.into(),
            previous_reliability,
            current_reliability,
            reason: reason.into(),
        };
        degradation.validate()?;
        Ok(degradation)
    }
}

impl Contract for SourceDegradation {
    fn validate(&self) -> Result<()> {
        check_unit_interval("previous_reliability", self.previous_reliability)?;
        check_unit_interval("current_reliability", self.current_reliability)?;
        Ok(())
    }
}

/// Retrospective grading of exactly one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub scorecard_id: Uuid,
    pub decision_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub predictions_vs_reality: Vec<PredictionVsReality>,
    pub decision_outcome: String,
    #[serde(default)]
    pub source_degradations: Vec<SourceDegradation>,
    #[serde(default)]
    pub model_adjustments: Vec<String>,
    #[serde(default)]
    pub threshold_updates: BTreeMap<String, f64>,
    #[serde(default)]
    pub lessons_learned: Option<String>,
}

impl Scorecard {
    pub fn new(
        decision_id: Uuid,
        predictions_vs_reality: Vec<PredictionVsReality>,
        decision_outcome: impl Into<String>,
    ) -> Self {
        Self {
            scorecard_id: Uuid::new_v4(),
            decision_id,
            evaluated_at: Utc::now(),
            predictions_vs_reality,
            decision_outcome: decision_outcome.into(),
            source_degradations: Vec::new(),
            model_adjustments: Vec::new(),
            threshold_updates: BTreeMap::new(),
            lessons_learned: None,
        }
    }

    pub fn with_model_adjustments(mut self, adjustments: Vec<String>) -> Self {
        self.model_adjustments = adjustments;
        self
    }

    pub fn with_lessons(mut self, lessons: impl Into<String>) -> Self {
        self.lessons_learned = Some(lessons.into());
        self
    }
}

impl Contract for Scorecard {
    fn validate(&self) -> Result<()> {
        for degradation in &self.source_degradations {
            degradation.validate()?;
        }
        Ok(())
    }
}

/// Full output of the Feedback stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub scorecards: Vec<Scorecard>,
    pub sources_updated: u64,
    pub thresholds_adjusted: u64,
    #[serde(default = "stage_feedback")]
    pub stage: String,
}

impl FeedbackResult {
    pub fn new(
        scorecards: Vec<Scorecard>,
        sources_updated: u64,
        thresholds_adjusted: u64,
    ) -> Result<Self> {
        let result = Self {
            scorecards,
            sources_updated,
            thresholds_adjusted,
            stage: stage_feedback(),
        };
        result.validate()?;
        Ok(result)
    }
}

impl Contract for FeedbackResult {
    fn validate(&self) -> Result<()> {
        check_stage("feedback", &self.stage)?;
        for scorecard in &self.scorecards {
            scorecard.validate()?;
        }
        Ok(())
    }
}

/// Fraction of predictions that landed within confidence.
pub fn hit_rate(scorecard: &Scorecard) -> f64 {
    let preds = &scorecard.predictions_vs_reality;
    if preds.is_empty() {
        return 0.0;
    }
    preds.iter().filter(|p| p.within_confidence).count() as f64 / preds.len() as f64
}

/// Mean absolute error percentage across predictions.
pub fn mean_absolute_error(scorecard: &Scorecard) -> f64 {
    let preds = &scorecard.predictions_vs_reality;
    if preds.is_empty() {
        return 0.0;
    }
    preds.iter().map(|p| p.error_pct.abs()).sum::<f64>() / preds.len() as f64
}

/// Mean signed error percentage. Positive means over-prediction.
pub fn bias(scorecard: &Scorecard) -> f64 {
    let preds = &scorecard.predictions_vs_reality;
    if preds.is_empty() {
        return 0.0;
    }
    preds.iter().map(|p| p.error_pct).sum::<f64>() / preds.len() as f64
}

/// Aggregate accuracy metrics across all scorecards in a feedback result.
pub fn summary(feedback: &FeedbackResult) -> BTreeMap<String, f64> {
    if feedback.scorecards.is_empty() {
        return BTreeMap::from([
            ("hit_rate".to_string(), 0.0),
            ("mae".to_string(), 0.0),
            ("bias".to_string(), 0.0),
        ]);
    }

    let n = feedback.scorecards.len() as f64;
    let rates: f64 = feedback.scorecards.iter().map(hit_rate).sum();
    let maes: f64 = feedback.scorecards.iter().map(mean_absolute_error).sum();
    let biases: f64 = feedback.scorecards.iter().map(bias).sum();

    BTreeMap::from([
        ("hit_rate".to_string(), rates / n),
        ("mae".to_string(), maes / n),
        ("bias".to_string(), biases / n),
    ])
}
