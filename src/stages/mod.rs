//! Built-in stage implementations, one per category, plus the explicit
//! registration routine that installs them into a registry at startup.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{Result, UgearError};
use crate::registry::StageRegistry;
use crate::stage::{Analyzer, Collector, Decider, Monitor, Processor, Simulator};

pub mod aggregator;
pub mod alert;
pub mod backtest;
pub mod conditional;
pub mod synthetic;
pub mod zscore;

pub use aggregator::{AggregatorConfig, AggregatorProcessor};
pub use alert::{AlertConfig, AlertDecider};
pub use backtest::{BacktestConfig, BacktestMonitor};
pub use conditional::{ConditionalConfig, ConditionalSimulator};
pub use synthetic::{SyntheticCollector, SyntheticConfig};
pub use zscore::{ZScoreAnalyzer, ZScoreConfig};

/// Decode a plugin config payload, falling back to defaults for a null
/// payload.
fn parse_config<T: DeserializeOwned + Default>(value: serde_json::Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value)
        .map_err(|e| UgearError::config("invalid plugin config payload").with_source(e))
}

/// Install all built-in plugins. Called explicitly during the init phase,
/// before discovery and before any run starts.
pub fn register_builtins(registry: &mut StageRegistry) -> Result<()> {
    registry.register_collector(
        "synthetic",
        Arc::new(|config| {
            let config: SyntheticConfig = parse_config(config)?;
            Ok(Arc::new(SyntheticCollector::new(config)) as Arc<dyn Collector>)
        }),
    )?;
    registry.register_processor(
        "aggregator",
        Arc::new(|config| {
            let config: AggregatorConfig = parse_config(config)?;
            Ok(Arc::new(AggregatorProcessor::new(config)) as Arc<dyn Processor>)
        }),
    )?;
    registry.register_analyzer(
        "zscore",
        Arc::new(|config| {
            let config: ZScoreConfig = parse_config(config)?;
            Ok(Arc::new(ZScoreAnalyzer::new(config)) as Arc<dyn Analyzer>)
        }),
    )?;
    registry.register_simulator(
        "conditional",
        Arc::new(|config| {
            let config: ConditionalConfig = parse_config(config)?;
            Ok(Arc::new(ConditionalSimulator::new(config)) as Arc<dyn Simulator>)
        }),
    )?;
    registry.register_decider(
        "alert",
        Arc::new(|config| {
            let config: AlertConfig = parse_config(config)?;
            Ok(Arc::new(AlertDecider::new(config)) as Arc<dyn Decider>)
        }),
    )?;
    registry.register_monitor(
        "backtest",
        Arc::new(|config| {
            let config: BacktestConfig = parse_config(config)?;
            Ok(Arc::new(BacktestMonitor::new(config)) as Arc<dyn Monitor>)
        }),
    )?;
    Ok(())
}
