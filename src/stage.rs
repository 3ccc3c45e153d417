//! Stage interface contract: one trait per category, each with exactly one
//! asynchronous operation taking the previous stage's result.
//!
//! Concrete plugins implement the trait for their category explicitly; the
//! orchestrator holds them as `Arc<dyn Trait>` and awaits exactly one stage
//! call at a time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contracts::{
    CollectionResult, CompressionResult, DecisionResult, FeedbackResult, HypothesisResult,
    SimulationResult,
};
use crate::error::{Result, UgearError};

/// The six stage categories a plugin can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCategory {
    Collector,
    Processor,
    Analyzer,
    Simulator,
    Decider,
    Monitor,
}

impl StageCategory {
    /// All categories in pipeline order.
    pub const ALL: [StageCategory; 6] = [
        StageCategory::Collector,
        StageCategory::Processor,
        StageCategory::Analyzer,
        StageCategory::Simulator,
        StageCategory::Decider,
        StageCategory::Monitor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageCategory::Collector => "collector",
            StageCategory::Processor => "processor",
            StageCategory::Analyzer => "analyzer",
            StageCategory::Simulator => "simulator",
            StageCategory::Decider => "decider",
            StageCategory::Monitor => "monitor",
        }
    }

    /// The pipeline stage this category's plugins execute.
    pub fn stage_label(self) -> &'static str {
        match self {
            StageCategory::Collector => "observation",
            StageCategory::Processor => "compression",
            StageCategory::Analyzer => "hypothesis",
            StageCategory::Simulator => "simulation",
            StageCategory::Decider => "decision",
            StageCategory::Monitor => "feedback",
        }
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageCategory {
    type Err = UgearError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "collector" => Ok(StageCategory::Collector),
            "processor" => Ok(StageCategory::Processor),
            "analyzer" => Ok(StageCategory::Analyzer),
            "simulator" => Ok(StageCategory::Simulator),
            "decider" => Ok(StageCategory::Decider),
            "monitor" => Ok(StageCategory::Monitor),
            other => Err(UgearError::config(format!(
                "unknown stage category '{other}'"
            ))),
        }
    }
}

/// Observation stage: collects raw events from external sources.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self) -> Result<CollectionResult>;
}

/// Compression stage: normalises and aggregates raw events.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, collection: &CollectionResult) -> Result<CompressionResult>;
}

/// Hypothesis stage: derives falsifiable claims from market states.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, compression: &CompressionResult) -> Result<HypothesisResult>;
}

/// Simulation stage: projects conditional scenarios.
#[async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, hypotheses: &HypothesisResult) -> Result<SimulationResult>;
}

/// Decision stage: produces structured decision objects.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(&self, simulation: &SimulationResult) -> Result<DecisionResult>;
}

/// Feedback stage: grades past decisions against reality.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn evaluate(&self, decision: &DecisionResult) -> Result<FeedbackResult>;
}

/// Factory for a collector plugin, constructed from an opaque config payload.
pub type CollectorFactory =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Collector>> + Send + Sync>;
pub type ProcessorFactory =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Processor>> + Send + Sync>;
pub type AnalyzerFactory =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Analyzer>> + Send + Sync>;
pub type SimulatorFactory =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Simulator>> + Send + Sync>;
pub type DeciderFactory = Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Decider>> + Send + Sync>;
pub type MonitorFactory = Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Monitor>> + Send + Sync>;

/// A constructable stage implementation of any category.
#[derive(Clone)]
pub enum StageFactory {
    Collector(CollectorFactory),
    Processor(ProcessorFactory),
    Analyzer(AnalyzerFactory),
    Simulator(SimulatorFactory),
    Decider(DeciderFactory),
    Monitor(MonitorFactory),
}

impl StageFactory {
    pub fn category(&self) -> StageCategory {
        match self {
            StageFactory::Collector(_) => StageCategory::Collector,
            StageFactory::Processor(_) => StageCategory::Processor,
            StageFactory::Analyzer(_) => StageCategory::Analyzer,
            StageFactory::Simulator(_) => StageCategory::Simulator,
            StageFactory::Decider(_) => StageCategory::Decider,
            StageFactory::Monitor(_) => StageCategory::Monitor,
        }
    }
}

impl fmt::Debug for StageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageFactory({})", self.category())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in StageCategory::ALL {
            assert_eq!(
                category.as_str().parse::<StageCategory>().unwrap(),
                category
            );
        }
        assert!("model".parse::<StageCategory>().is_err());
    }

    #[test]
    fn categories_map_to_pipeline_stages_in_order() {
        let labels: Vec<&str> = StageCategory::ALL
            .iter()
            .map(|c| c.stage_label())
            .collect();
        assert_eq!(
            labels,
            vec![
                "observation",
                "compression",
                "hypothesis",
                "simulation",
                "decision",
                "feedback"
            ]
        );
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(StageCategory::Decider).unwrap(),
            serde_json::json!("decider")
        );
    }
}
