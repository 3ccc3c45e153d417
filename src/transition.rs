//! Transition gates: one pure predicate per stage boundary.
//!
//! Each gate inspects the just-produced result and decides whether the
//! pipeline may proceed. Gates are disableable only via the explicit
//! `validate_transitions = false` run flag; the orchestrator applies them
//! by default.

use crate::contracts::{
    CollectionResult, CompressionResult, DecisionResult, HypothesisResult, SimulationResult,
    MIN_SCENARIOS,
};
use crate::error::{Result, UgearError};

/// Minimum reliability score required to proceed past Observation.
pub const MIN_RELIABILITY: f64 = 0.1;

/// Observation → Compression: the collection batch must be reliable enough
/// to compress.
pub fn check_observation(output: &CollectionResult) -> Result<()> {
    let score = output.quality_report.reliability_score;
    if score < MIN_RELIABILITY {
        return Err(UgearError::transition(
            "observation",
            format!("reliability too low ({score:.3} < {MIN_RELIABILITY})"),
        ));
    }
    Ok(())
}

/// Compression → Hypothesis: at least one market state must exist.
pub fn check_compression(output: &CompressionResult) -> Result<()> {
    if output.states.is_empty() {
        return Err(UgearError::transition(
            "compression",
            "no market state produced",
        ));
    }
    Ok(())
}

/// Hypothesis → Simulation: at least one hypothesis must exist.
pub fn check_hypothesis(output: &HypothesisResult) -> Result<()> {
    if output.hypotheses.is_empty() {
        return Err(UgearError::transition(
            "hypothesis",
            "no hypotheses generated",
        ));
    }
    Ok(())
}

/// Simulation → Decision: the contract already enforces the scenario
/// minimum; re-check defensively.
pub fn check_simulation(output: &SimulationResult) -> Result<()> {
    if output.scenarios.len() < MIN_SCENARIOS {
        return Err(UgearError::transition(
            "simulation",
            "insufficient scenarios",
        ));
    }
    Ok(())
}

/// Decision → Feedback: at least one decision must exist.
pub fn check_decision(output: &DecisionResult) -> Result<()> {
    if output.decisions.is_empty() {
        return Err(UgearError::transition("decision", "no decisions generated"));
    }
    Ok(())
}

// Feedback is terminal: no gate. The loop back into the next run's
// Observation is a data contract, not a control-flow cycle.
