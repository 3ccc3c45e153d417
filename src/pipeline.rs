//! Pipeline orchestrator: drives the six stages in fixed order, applies the
//! transition gates between them, and aggregates per-stage metrics into a
//! single auditable run result.
//!
//! Data flows strictly forward; the feedback loop back into the next run's
//! observation is a data contract, not a control-flow cycle. The
//! orchestrator awaits exactly one stage call at a time and never retries a
//! failed stage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::contracts::{
    CollectionResult, CompressionResult, DecisionResult, FeedbackResult, HypothesisResult,
    SimulationResult,
};
use crate::error::{Result, UgearError};
use crate::registry::StageRegistry;
use crate::stage::{
    Analyzer, Collector, Decider, Monitor, Processor, Simulator, StageCategory,
};
use crate::transition;

/// How the orchestrator reacts to a stage failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure terminates the run (default).
    #[default]
    FailFast,
    /// Failures are recorded; subsequent stages still attempt to run with
    /// whatever upstream output is available.
    ContinueOnError,
}

/// Which plugin to use for one category, plus its opaque config payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSelection {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl StageSelection {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Run configuration: one plugin selection per category plus the two
/// orchestrator flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub collector: StageSelection,
    pub processor: StageSelection,
    pub analyzer: StageSelection,
    pub simulator: StageSelection,
    pub decider: StageSelection,
    pub monitor: StageSelection,
    /// Gates are applied unless explicitly disabled. Disabling is intended
    /// only for exploratory, non-production runs.
    #[serde(default = "default_true")]
    pub validate_transitions: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Metrics captured for a single stage execution: counts, not payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub success: bool,
    pub records_in: u64,
    pub records_out: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregated metrics for a full run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub stages: Vec<StageMetrics>,
}

impl RunMetrics {
    pub fn add(&mut self, metrics: StageMetrics) {
        self.stages.push(metrics);
    }

    pub fn total_duration(&self) -> f64 {
        self.stages.iter().map(|s| s.duration_seconds).sum()
    }

    pub fn all_success(&self) -> bool {
        self.stages.iter().all(|s| s.success)
    }

    /// Metrics for one stage by label, if it was attempted.
    pub fn stage(&self, label: &str) -> Option<&StageMetrics> {
        self.stages.iter().find(|s| s.stage == label)
    }
}

/// Terminal object returned to the caller: the system's only audit
/// artifact. A failed run is still inspectable through the partial outputs
/// recorded here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub collection: Option<CollectionResult>,
    pub compression: Option<CompressionResult>,
    pub hypothesis: Option<HypothesisResult>,
    pub simulation: Option<SimulationResult>,
    pub decision: Option<DecisionResult>,
    pub feedback: Option<FeedbackResult>,
    pub metrics: RunMetrics,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub total_duration_seconds: f64,
}

/// Orchestrates one run of the six-stage pipeline.
///
/// Runs are independent: each owns its chain of result objects, so multiple
/// pipelines may execute concurrently against a shared, already-populated
/// registry.
pub struct Pipeline {
    collector: Arc<dyn Collector>,
    processor: Arc<dyn Processor>,
    analyzer: Arc<dyn Analyzer>,
    simulator: Arc<dyn Simulator>,
    decider: Arc<dyn Decider>,
    monitor: Arc<dyn Monitor>,
    validate_transitions: bool,
    failure_policy: FailurePolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(
        collector: Arc<dyn Collector>,
        processor: Arc<dyn Processor>,
        analyzer: Arc<dyn Analyzer>,
        simulator: Arc<dyn Simulator>,
        decider: Arc<dyn Decider>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self {
            collector,
            processor,
            analyzer,
            simulator,
            decider,
            monitor,
            validate_transitions: true,
            failure_policy: FailurePolicy::default(),
            cancel: None,
        }
    }

    /// Resolve one implementation per category from the registry. Fails
    /// before any stage executes if a requested plugin is unregistered or
    /// its factory rejects the config payload.
    pub fn from_registry(registry: &StageRegistry, config: &RunConfig) -> Result<Self> {
        let pipeline = Self::new(
            registry.build_collector(&config.collector.name, config.collector.config.clone())?,
            registry.build_processor(&config.processor.name, config.processor.config.clone())?,
            registry.build_analyzer(&config.analyzer.name, config.analyzer.config.clone())?,
            registry.build_simulator(&config.simulator.name, config.simulator.config.clone())?,
            registry.build_decider(&config.decider.name, config.decider.config.clone())?,
            registry.build_monitor(&config.monitor.name, config.monitor.config.clone())?,
        );
        Ok(pipeline
            .with_validate_transitions(config.validate_transitions)
            .with_failure_policy(config.failure_policy))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Disabling gates must be explicit; it is never the default.
    pub fn with_validate_transitions(mut self, validate: bool) -> Self {
        self.validate_transitions = validate;
        self
    }

    /// Install a cooperative cancellation flag. A set flag is honored at
    /// the next stage boundary, never mid-stage.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Execute all six stages sequentially and return the run record.
    pub async fn run(&self) -> RunResult {
        let mut result = RunResult::default();
        let run_started = Instant::now();

        for category in StageCategory::ALL {
            let label = category.stage_label();

            if self.is_cancelled() {
                info!(stage = label, "pipeline.cancelled");
                result.error = Some(format!("run cancelled before stage '{label}'"));
                break;
            }

            let started_at = Utc::now();
            let stage_started = Instant::now();
            info!(stage = label, "stage.started");

            let outcome = self.run_stage(category, &mut result).await;
            let duration = stage_started.elapsed().as_secs_f64();
            // Counts come from whatever the stage actually stored, so a
            // gate-rejected output is still reflected in the metrics.
            let (records_in, records_out) = Self::stage_counts(category, &result);

            match outcome {
                Ok(()) => {
                    info!(stage = label, duration, "stage.completed");
                    result.metrics.add(StageMetrics {
                        stage: label.to_string(),
                        started_at,
                        finished_at: Utc::now(),
                        duration_seconds: duration,
                        success: true,
                        records_in,
                        records_out,
                        error: None,
                    });
                }
                Err(err) => {
                    error!(stage = label, error = %err, "stage.failed");
                    result.metrics.add(StageMetrics {
                        stage: label.to_string(),
                        started_at,
                        finished_at: Utc::now(),
                        duration_seconds: duration,
                        success: false,
                        records_in,
                        records_out,
                        error: Some(err.to_string()),
                    });

                    if self.failure_policy == FailurePolicy::FailFast {
                        result.error = Some(format!("pipeline failed at '{label}': {err}"));
                        result.total_duration_seconds = run_started.elapsed().as_secs_f64();
                        info!(
                            duration = result.total_duration_seconds,
                            success = false,
                            "pipeline.completed"
                        );
                        return result;
                    }
                }
            }
        }

        result.total_duration_seconds = run_started.elapsed().as_secs_f64();
        result.success = result.error.is_none()
            && result.metrics.stages.len() == StageCategory::ALL.len()
            && result.metrics.all_success();
        info!(
            duration = result.total_duration_seconds,
            success = result.success,
            "pipeline.completed"
        );
        result
    }

    /// Run one stage against the record.
    ///
    /// The stage output is stored in the record even when the transition
    /// gate then rejects it, so failed runs stay inspectable and
    /// continue-on-error runs hand real output to the next stage. When the
    /// predecessor produced nothing at all the stage is skipped: no
    /// placeholder value is ever synthesized.
    async fn run_stage(&self, category: StageCategory, record: &mut RunResult) -> Result<()> {
        match category {
            StageCategory::Collector => {
                let output = self.collector.collect().await?;
                let gate = self.gate(|| transition::check_observation(&output));
                record.collection = Some(output);
                gate
            }
            StageCategory::Processor => {
                let collection = record
                    .collection
                    .as_ref()
                    .ok_or_else(|| Self::missing_upstream("observation"))?;
                let output = self.processor.process(collection).await?;
                let gate = self.gate(|| transition::check_compression(&output));
                record.compression = Some(output);
                gate
            }
            StageCategory::Analyzer => {
                let compression = record
                    .compression
                    .as_ref()
                    .ok_or_else(|| Self::missing_upstream("compression"))?;
                let output = self.analyzer.analyze(compression).await?;
                let gate = self.gate(|| transition::check_hypothesis(&output));
                record.hypothesis = Some(output);
                gate
            }
            StageCategory::Simulator => {
                let hypotheses = record
                    .hypothesis
                    .as_ref()
                    .ok_or_else(|| Self::missing_upstream("hypothesis"))?;
                let output = self.simulator.simulate(hypotheses).await?;
                let gate = self.gate(|| transition::check_simulation(&output));
                record.simulation = Some(output);
                gate
            }
            StageCategory::Decider => {
                let simulation = record
                    .simulation
                    .as_ref()
                    .ok_or_else(|| Self::missing_upstream("simulation"))?;
                let output = self.decider.decide(simulation).await?;
                let gate = self.gate(|| transition::check_decision(&output));
                record.decision = Some(output);
                gate
            }
            StageCategory::Monitor => {
                let decision = record
                    .decision
                    .as_ref()
                    .ok_or_else(|| Self::missing_upstream("decision"))?;
                let output = self.monitor.evaluate(decision).await?;
                // Feedback is terminal: no gate.
                record.feedback = Some(output);
                Ok(())
            }
        }
    }

    /// `(records_in, records_out)` for one stage, read from the outputs the
    /// record holds. A stage that never stored output counts as `(0, 0)`.
    fn stage_counts(category: StageCategory, record: &RunResult) -> (u64, u64) {
        match category {
            StageCategory::Collector => record
                .collection
                .as_ref()
                .map(|c| (0, c.events.len() as u64))
                .unwrap_or((0, 0)),
            StageCategory::Processor => record
                .compression
                .as_ref()
                .map(|c| (c.records_consumed, c.states.len() as u64))
                .unwrap_or((0, 0)),
            StageCategory::Analyzer => record
                .hypothesis
                .as_ref()
                .map(|h| (h.states_analyzed, h.hypotheses.len() as u64))
                .unwrap_or((0, 0)),
            StageCategory::Simulator => record
                .simulation
                .as_ref()
                .map(|s| {
                    let hypotheses = record
                        .hypothesis
                        .as_ref()
                        .map(|h| h.hypotheses.len() as u64)
                        .unwrap_or(0);
                    (hypotheses, s.scenarios.len() as u64)
                })
                .unwrap_or((0, 0)),
            StageCategory::Decider => record
                .decision
                .as_ref()
                .map(|d| {
                    let scenarios = record
                        .simulation
                        .as_ref()
                        .map(|s| s.scenarios.len() as u64)
                        .unwrap_or(0);
                    (scenarios, d.decisions.len() as u64)
                })
                .unwrap_or((0, 0)),
            StageCategory::Monitor => record
                .feedback
                .as_ref()
                .map(|f| {
                    let decisions = record
                        .decision
                        .as_ref()
                        .map(|d| d.decisions.len() as u64)
                        .unwrap_or(0);
                    (decisions, f.scorecards.len() as u64)
                })
                .unwrap_or((0, 0)),
        }
    }

    fn gate(&self, check: impl FnOnce() -> Result<()>) -> Result<()> {
        if self.validate_transitions {
            check()
        } else {
            Ok(())
        }
    }

    fn missing_upstream(stage: &str) -> UgearError {
        UgearError::pipeline(format!("no upstream output from '{stage}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_policy_defaults_to_fail_fast() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
    }

    #[test]
    fn run_config_defaults_enable_gates() {
        let yaml = r#"
collector: { name: synthetic }
processor: { name: aggregator }
analyzer: { name: zscore }
simulator: { name: conditional }
decider: { name: alert }
monitor: { name: backtest }
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate_transitions);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.collector.config, serde_json::Value::Null);
    }

    #[test]
    fn run_metrics_aggregate() {
        let mut metrics = RunMetrics::default();
        let now = Utc::now();
        metrics.add(StageMetrics {
            stage: "observation".to_string(),
            started_at: now,
            finished_at: now,
            duration_seconds: 0.5,
            success: true,
            records_in: 90,
            records_out: 90,
            error: None,
        });
        metrics.add(StageMetrics {
            stage: "compression".to_string(),
            started_at: now,
            finished_at: now,
            duration_seconds: 0.25,
            success: false,
            records_in: 90,
            records_out: 0,
            error: Some("no market state produced".to_string()),
        });

        assert_eq!(metrics.total_duration(), 0.75);
        assert!(!metrics.all_success());
        assert!(metrics.stage("observation").unwrap().success);
        assert!(metrics.stage("simulation").is_none());
    }
}
