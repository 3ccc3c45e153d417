//! End-to-end orchestrator behavior: a full run over the built-in stages,
//! gate failures under both failure policies, plugin resolution errors, and
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use ugear::contracts::{CollectionResult, DataQualityReport, RawEvent, SourceMeta, SourceType};
use ugear::error::{Result, UgearError};
use ugear::pipeline::{FailurePolicy, Pipeline, RunConfig, StageSelection};
use ugear::registry::StageRegistry;
use ugear::stage::Collector;
use ugear::stages::register_builtins;

/// Collector whose batch is too unreliable to pass the observation gate.
struct ShakyCollector;

#[async_trait]
impl Collector for ShakyCollector {
    async fn collect(&self) -> Result<CollectionResult> {
        let source = SourceMeta::new("shaky", SourceType::Scraper);
        let report = DataQualityReport::new(source, 20, 1, vec![], 0.05)?;
        CollectionResult::new(vec![], report)
    }
}

/// Collector that does return events, but with a reliability score low
/// enough for the observation gate to reject the batch.
struct DodgyCollector;

#[async_trait]
impl Collector for DodgyCollector {
    async fn collect(&self) -> Result<CollectionResult> {
        let source = SourceMeta::new("dodgy", SourceType::Scraper);
        let events: Vec<RawEvent> = (0..5)
            .map(|i| {
                RawEvent::new(
                    source.clone(),
                    chrono::Utc::now(),
                    std::collections::BTreeMap::from([(
                        "price".to_string(),
                        serde_json::json!(100.0 + i as f64),
                    )]),
                )
            })
            .collect();
        let report = DataQualityReport::new(source, 100, 5, vec![], 0.05)?;
        CollectionResult::new(events, report)
    }
}

fn builtin_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    register_builtins(&mut registry).expect("builtins register on a fresh registry");
    registry
}

fn registry_with_shaky_collector() -> StageRegistry {
    let mut registry = builtin_registry();
    registry
        .register_collector(
            "shaky",
            Arc::new(|_config| Ok(Arc::new(ShakyCollector) as Arc<dyn Collector>)),
        )
        .expect("shaky does not collide with builtins");
    registry
}

/// Built-in selections tuned for a deterministic anomaly: clean synthetic
/// data with a strong late price shift the z-score analyzer cannot miss.
fn toy_run_config() -> RunConfig {
    RunConfig {
        collector: StageSelection::named("synthetic").with_config(serde_json::json!({
            "failure_rate": 0.0,
            "anomaly_start": 84,
            "anomaly_magnitude": 0.5,
            "seed": 7,
        })),
        processor: StageSelection::named("aggregator"),
        analyzer: StageSelection::named("zscore").with_config(serde_json::json!({
            "window_size": 8,
            "threshold": 1.5,
        })),
        simulator: StageSelection::named("conditional"),
        decider: StageSelection::named("alert"),
        monitor: StageSelection::named("backtest"),
        validate_transitions: true,
        failure_policy: FailurePolicy::FailFast,
    }
}

#[tokio::test]
async fn toy_pipeline_runs_end_to_end() {
    let registry = builtin_registry();
    let pipeline = Pipeline::from_registry(&registry, &toy_run_config()).unwrap();

    let result = pipeline.run().await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(result.metrics.stages.len(), 6);
    assert!(result.metrics.all_success());

    // Every stage output is present and coherent.
    let collection = result.collection.as_ref().unwrap();
    assert_eq!(collection.events.len(), 90);
    assert_eq!(collection.quality_report.reliability_score, 1.0);

    let compression = result.compression.as_ref().unwrap();
    assert!(!compression.states.is_empty());
    assert_eq!(compression.records_consumed, 90);

    let hypothesis = result.hypothesis.as_ref().unwrap();
    assert!(!hypothesis.hypotheses.is_empty());

    let simulation = result.simulation.as_ref().unwrap();
    assert!(simulation.scenarios.len() >= 2);
    assert!(simulation.baseline.is_some());

    let decision = result.decision.as_ref().unwrap();
    assert!(!decision.decisions.is_empty());

    let feedback = result.feedback.as_ref().unwrap();
    assert_eq!(feedback.scorecards.len(), decision.decisions.len());

    // Metrics carry the stage labels in pipeline order.
    let labels: Vec<&str> = result
        .metrics
        .stages
        .iter()
        .map(|s| s.stage.as_str())
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
    assert_eq!(result.metrics.stage("observation").unwrap().records_out, 90);
}

#[tokio::test]
async fn gate_failure_stops_a_fail_fast_run() {
    let registry = registry_with_shaky_collector();
    let mut config = toy_run_config();
    config.collector = StageSelection::named("shaky");

    let result = Pipeline::from_registry(&registry, &config).unwrap().run().await;

    assert!(!result.success);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("observation"), "unexpected error: {error}");
    assert!(error.contains("reliability too low"));

    // Only the first stage was attempted, but its output is still there
    // for inspection.
    assert_eq!(result.metrics.stages.len(), 1);
    assert!(!result.metrics.stages[0].success);
    assert!(result.collection.is_some());
    assert!(result.compression.is_none());
}

#[tokio::test]
async fn gate_failed_stage_metrics_keep_real_counts() {
    let mut registry = builtin_registry();
    registry
        .register_collector(
            "dodgy",
            Arc::new(|_config| Ok(Arc::new(DodgyCollector) as Arc<dyn Collector>)),
        )
        .unwrap();
    let mut config = toy_run_config();
    config.collector = StageSelection::named("dodgy");

    let result = Pipeline::from_registry(&registry, &config).unwrap().run().await;

    assert!(!result.success);
    let observation = result.metrics.stage("observation").unwrap();
    assert!(!observation.success);
    // The batch was produced before the gate rejected it, so the metrics
    // report what was actually collected rather than zeros.
    assert_eq!(observation.records_out, 5);
    assert_eq!(
        result.collection.as_ref().unwrap().events.len() as u64,
        observation.records_out
    );
}

#[tokio::test]
async fn continue_on_error_attempts_every_stage() {
    let registry = registry_with_shaky_collector();
    let mut config = toy_run_config();
    config.collector = StageSelection::named("shaky");
    config.failure_policy = FailurePolicy::ContinueOnError;

    let result = Pipeline::from_registry(&registry, &config).unwrap().run().await;

    // All six stages were attempted; the run is not aborted mid-way.
    assert_eq!(result.metrics.stages.len(), 6);
    assert!(!result.success);
    assert!(result.error.is_none());

    // The empty batch cascades: observation, compression, and hypothesis
    // fail their gates, then the conditional simulator recovers because it
    // needs no hypotheses to project scenarios.
    assert!(!result.metrics.stage("observation").unwrap().success);
    assert!(!result.metrics.stage("compression").unwrap().success);
    assert!(!result.metrics.stage("hypothesis").unwrap().success);
    assert!(result.metrics.stage("simulation").unwrap().success);
    assert!(result.metrics.stage("decision").unwrap().success);
    assert!(result.metrics.stage("feedback").unwrap().success);

    // Gate-failed outputs still flow downstream instead of placeholders.
    assert!(result.collection.is_some());
    assert!(result.compression.is_some());
    assert!(result.feedback.is_some());
}

#[tokio::test]
async fn disabled_gates_let_a_sparse_run_finish() {
    let registry = registry_with_shaky_collector();
    let mut config = toy_run_config();
    config.collector = StageSelection::named("shaky");
    config.validate_transitions = false;

    let result = Pipeline::from_registry(&registry, &config).unwrap().run().await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.metrics.stages.len(), 6);
    // No anomalies in an empty batch: the analyzer legitimately returns
    // zero hypotheses and the run still completes.
    assert!(result.hypothesis.as_ref().unwrap().hypotheses.is_empty());
}

#[tokio::test]
async fn unknown_plugin_fails_before_any_stage_runs() {
    let registry = builtin_registry();
    let mut config = toy_run_config();
    config.decider = StageSelection::named("nonexistent");

    let err = match Pipeline::from_registry(&registry, &config) {
        Ok(_) => panic!("plugin resolution should fail before any stage runs"),
        Err(err) => err,
    };
    match err {
        UgearError::PluginNotFound {
            category,
            name,
            available,
        } => {
            assert_eq!(category, "decider");
            assert_eq!(name, "nonexistent");
            assert_eq!(available, vec!["alert".to_string()]);
        }
        other => panic!("expected PluginNotFound, got {other}"),
    }
}

#[tokio::test]
async fn cancellation_is_honored_at_the_first_boundary() {
    let registry = builtin_registry();
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let result = Pipeline::from_registry(&registry, &toy_run_config())
        .unwrap()
        .with_cancel_flag(cancel)
        .run()
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("cancelled before stage 'observation'"));
    assert!(result.metrics.stages.is_empty());
    assert!(result.collection.is_none());
}

#[tokio::test]
async fn concurrent_runs_share_one_registry() {
    let registry = Arc::new(builtin_registry());
    let config = toy_run_config();

    let a = Pipeline::from_registry(&registry, &config).unwrap();
    let b = Pipeline::from_registry(&registry, &config).unwrap();
    let (ra, rb) = tokio::join!(a.run(), b.run());

    assert!(ra.success);
    assert!(rb.success);
    // Identical seeds produce identical collected batches.
    assert_eq!(
        ra.collection.unwrap().events[0].data,
        rb.collection.unwrap().events[0].data
    );
}
