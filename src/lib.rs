//! # Ugear
//!
//! A decision-support pipeline engine: data flows through six fixed stages
//! (Observation, Compression, Hypothesis, Simulation, Decision, Feedback),
//! each producing an immutable, self-validating result contract. Stage
//! implementations are plugins resolved from a registry at run time, and
//! transition gates between stages stop garbage from propagating.
//!
//! ## Usage
//!
//! ```no_run
//! use ugear::pipeline::{Pipeline, RunConfig, StageSelection};
//! use ugear::registry::StageRegistry;
//! use ugear::stages::register_builtins;
//!
//! # async fn demo() -> ugear::error::AppResult<()> {
//! let mut registry = StageRegistry::new();
//! register_builtins(&mut registry)?;
//!
//! let config = RunConfig {
//!     collector: StageSelection::named("synthetic"),
//!     processor: StageSelection::named("aggregator"),
//!     analyzer: StageSelection::named("zscore"),
//!     simulator: StageSelection::named("conditional"),
//!     decider: StageSelection::named("alert"),
//!     monitor: StageSelection::named("backtest"),
//!     validate_transitions: true,
//!     failure_policy: Default::default(),
//! };
//!
//! let result = Pipeline::from_registry(&registry, &config)?.run().await;
//! println!("success: {}", result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `config` - Process-level settings with env and YAML overrides
//! - `contracts` - Immutable result contracts, one per stage
//! - `error` - Unified error type and result aliases
//! - `logging` - Structured logging setup
//! - `pipeline` - The six-stage orchestrator and run records
//! - `registry` - Plugin registration, lookup, and discovery
//! - `stage` - Stage traits and factory types
//! - `stages` - Built-in stage implementations
//! - `transition` - Gates applied at every stage boundary

pub mod config;
pub mod contracts;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod stages;
pub mod transition;

pub use contracts::Contract;
pub use error::{AppResult, Result, UgearError};
pub use pipeline::{FailurePolicy, Pipeline, RunConfig, RunResult, StageSelection};
pub use registry::{DiscoveryReport, StagePackage, StageRegistry};
pub use stage::StageCategory;
