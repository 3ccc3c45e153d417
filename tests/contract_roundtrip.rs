//! Encode/decode fidelity for the stage contracts: every entity survives a
//! trip through its primitive-tree form, and tampered trees are rejected on
//! the way back in.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use uuid::Uuid;

use ugear::contracts::{
    Assumption, CollectionResult, Condition, Contract, CostOfError, DataQualityReport,
    DecisionDriver, DecisionObject, DecisionType, Granularity, Hypothesis, MarketState,
    PredictionVsReality, QualityFlag, RawEvent, RiskLevel, Scenario, Scorecard, SignalValue,
    SourceMeta, SourceType, Threshold, ValidationCriterion,
};

fn source() -> SourceMeta {
    SourceMeta::new("toy-source", SourceType::Synthetic).with_schema_version("1.0")
}

#[test]
fn raw_event_round_trips() {
    let mut data = BTreeMap::new();
    data.insert("price".to_string(), serde_json::json!(101.5));
    data.insert("note".to_string(), serde_json::json!("steady"));
    let event = RawEvent::new(source(), Utc::now(), data).with_schema_version("1.0");

    let decoded = RawEvent::from_value(event.to_value().unwrap()).unwrap();
    assert_eq!(decoded, event);
}

#[test]
fn quality_report_round_trips() {
    let flag = QualityFlag::new("price", "null_value", "warning").with_details("day 12");
    let report = DataQualityReport::new(source(), 90, 81, vec![flag], 0.9)
        .unwrap()
        .with_notes("synthetic batch");

    let decoded = DataQualityReport::from_value(report.to_value().unwrap()).unwrap();
    assert_eq!(decoded, report);
}

#[test]
fn collection_result_round_trips() {
    let event = RawEvent::new(source(), Utc::now(), BTreeMap::new());
    let report = DataQualityReport::new(source(), 1, 1, vec![], 1.0).unwrap();
    let result = CollectionResult::new(vec![event], report).unwrap();

    let decoded = CollectionResult::from_value(result.to_value().unwrap()).unwrap();
    assert_eq!(decoded, result);
    assert_eq!(decoded.stage, "observation");
}

#[test]
fn market_state_round_trips() {
    let start = Utc::now();
    let state = MarketState::new(
        "toy",
        start,
        start + Duration::days(7),
        Granularity::Weekly,
        vec![SignalValue::new("price", 101.5, "usd", 1.0).unwrap()],
        vec![Uuid::new_v4(), Uuid::new_v4()],
        0.9,
    )
    .unwrap();

    let decoded = MarketState::from_value(state.to_value().unwrap()).unwrap();
    assert_eq!(decoded, state);
}

#[test]
fn hypothesis_round_trips_with_range_threshold() {
    let validation = ValidationCriterion::new(
        "price_zscore",
        "gt",
        Threshold::Point(2.0),
        "z-score stays high",
    );
    let falsification = ValidationCriterion::new(
        "price_zscore",
        "between",
        Threshold::Range(-1.0, 1.0),
        "z-score back to normal",
    );
    let hypothesis = Hypothesis::new(
        "price spike",
        "outlier observed in rolling window",
        0.8,
        Utc::now() + Duration::days(14),
        vec![validation],
        vec![falsification],
        vec![Uuid::new_v4()],
    )
    .unwrap()
    .with_competing(vec!["measurement_error".to_string()]);

    let value = hypothesis.to_value().unwrap();
    assert_eq!(
        value["falsification_criteria"][0]["threshold"],
        serde_json::json!([-1.0, 1.0])
    );
    let decoded = Hypothesis::from_value(value).unwrap();
    assert_eq!(decoded, hypothesis);
}

#[test]
fn scenario_round_trips() {
    let scenario = Scenario::new(
        "demand_index=1.2",
        "high demand",
        vec![Assumption::new("demand_index", 1.2, "upper assumption")],
        BTreeMap::from([("price".to_string(), 108.0)]),
        (91.8, 124.2),
        0.75,
        RiskLevel::Medium,
        vec![Uuid::new_v4()],
    )
    .unwrap()
    .with_sensitivity(BTreeMap::from([("demand_index".to_string(), 0.4)]));

    let decoded = Scenario::from_value(scenario.to_value().unwrap()).unwrap();
    assert_eq!(decoded, scenario);
}

#[test]
fn decision_object_round_trips() {
    let decision = DecisionObject::new(
        DecisionType::Alert,
        "Upside alert: demand_index=1.2",
        "projected upside of 8.0% vs baseline",
        vec![DecisionDriver::new("demand_index", 0.4, "assumed 1.2").unwrap()],
        0.75,
        RiskLevel::Medium,
        CostOfError::new("unnecessary action", "missed upside"),
        vec![Uuid::new_v4()],
    )
    .unwrap()
    .with_conditions(vec![Condition {
        description: "spread exceeds 8.0%".to_string(),
        metric: "spread_pct".to_string(),
        operator: "gt".to_string(),
        threshold: 8.0,
        window: "7 days".to_string(),
    }])
    .with_expiry(Utc::now() + Duration::days(7));

    let decoded = DecisionObject::from_value(decision.to_value().unwrap()).unwrap();
    assert_eq!(decoded, decision);
}

#[test]
fn scorecard_round_trips() {
    let scorecard = Scorecard::new(
        Uuid::new_v4(),
        vec![PredictionVsReality {
            metric: "spread_pct".to_string(),
            predicted: 8.0,
            actual: 8.3,
            error_pct: 3.75,
            within_confidence: true,
        }],
        "beneficial",
    )
    .with_model_adjustments(vec!["none".to_string()])
    .with_lessons("uniform noise stayed within band");

    let decoded = Scorecard::from_value(scorecard.to_value().unwrap()).unwrap();
    assert_eq!(decoded, scorecard);
}

#[test]
fn tampered_trees_are_rejected_on_decode() {
    // Bounded score pushed out of range.
    let report = DataQualityReport::new(source(), 10, 9, vec![], 0.9).unwrap();
    let mut value = report.to_value().unwrap();
    value["reliability_score"] = serde_json::json!(2.0);
    assert!(DataQualityReport::from_value(value).is_err());

    // Mandatory criteria list emptied.
    let criterion = ValidationCriterion::new("m", "gt", Threshold::Point(1.0), "d");
    let hypothesis = Hypothesis::new(
        "claim",
        "reason",
        0.5,
        Utc::now() + Duration::days(1),
        vec![criterion.clone()],
        vec![criterion],
        vec![],
    )
    .unwrap();
    let mut value = hypothesis.to_value().unwrap();
    value["falsification_criteria"] = serde_json::json!([]);
    assert!(Hypothesis::from_value(value).is_err());

    // Stage discriminator forged.
    let event = RawEvent::new(source(), Utc::now(), BTreeMap::new());
    let report = DataQualityReport::new(source(), 1, 1, vec![], 1.0).unwrap();
    let collection = CollectionResult::new(vec![event], report).unwrap();
    let mut value = collection.to_value().unwrap();
    value["stage"] = serde_json::json!("decision");
    assert!(CollectionResult::from_value(value).is_err());
}
