//! Temporal aggregation processor: normalises raw events and compresses
//! them into time-windowed market states.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::{
    CollectionResult, CompressionResult, Granularity, MarketState, RawEvent, SignalValue,
    SourceReliability,
};
use crate::error::Result;
use crate::stage::Processor;

const DAYS_PER_WEEK: i64 = 7;
const DAYS_PER_MONTH: i64 = 30;

/// Maps one unit to another with a conversion factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitMapping {
    pub from_unit: String,
    pub to_unit: String,
    pub factor: f64,
}

/// Configuration for event normalisation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub unit_mappings: Vec<UnitMapping>,
    pub label_synonyms: BTreeMap<String, String>,
}

/// Normalises event data: label canonicalisation then unit conversion.
/// Every action taken is appended to a human-readable log that ends up in
/// the compression result for audit.
struct Normalizer<'a> {
    config: &'a NormalizerConfig,
}

impl<'a> Normalizer<'a> {
    fn new(config: &'a NormalizerConfig) -> Self {
        Self { config }
    }

    fn normalize_events(
        &self,
        events: &[RawEvent],
    ) -> (Vec<BTreeMap<String, serde_json::Value>>, Vec<String>) {
        let mut log = Vec::new();
        let mut normalized = Vec::with_capacity(events.len());

        for event in events {
            let mut data = BTreeMap::new();
            for (key, value) in &event.data {
                let canonical = self
                    .config
                    .label_synonyms
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| key.clone());
                if canonical != *key {
                    log.push(format!("label: '{key}' -> '{canonical}'"));
                }
                data.insert(canonical, value.clone());
            }

            for mapping in &self.config.unit_mappings {
                if let Some(value) = data.get_mut(&mapping.from_unit) {
                    if let Some(number) = value.as_f64() {
                        *value = serde_json::json!(number * mapping.factor);
                        log.push(format!(
                            "unit: '{}' -> {} (x{})",
                            mapping.from_unit, mapping.to_unit, mapping.factor
                        ));
                    }
                }
            }

            normalized.push(data);
        }

        (normalized, log)
    }
}

/// Per-signal aggregation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStrategy {
    Mean,
    Median,
    Sum,
    Last,
}

/// Configuration for the temporal aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub granularity: Granularity,
    pub strategies: BTreeMap<String, AggregateStrategy>,
    pub domain: String,
    pub default_unit: String,
    pub normalizer: NormalizerConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert("price".to_string(), AggregateStrategy::Mean);
        strategies.insert("demand".to_string(), AggregateStrategy::Sum);
        Self {
            granularity: Granularity::Weekly,
            strategies,
            domain: "generic".to_string(),
            default_unit: "unit".to_string(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

/// Normalises and aggregates raw events into market states.
pub struct AggregatorProcessor {
    config: AggregatorConfig,
}

impl AggregatorProcessor {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    fn bucket_key(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self.config.granularity {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
            Granularity::Quarterly => {
                let quarter_month = ((date.month0() / 3) * 3) + 1;
                date.with_day(1)
                    .and_then(|d| d.with_month(quarter_month))
                    .unwrap_or(date)
            }
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }

    fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self.config.granularity {
            Granularity::Daily => 1,
            Granularity::Weekly => DAYS_PER_WEEK,
            Granularity::Monthly => DAYS_PER_MONTH,
            Granularity::Quarterly => DAYS_PER_MONTH * 3,
        };
        start + Duration::days(days)
    }

    fn compute_signals(&self, values_by_name: &BTreeMap<String, Vec<f64>>) -> Vec<SignalValue> {
        let mut signals = Vec::new();
        for (name, values) in values_by_name {
            if values.is_empty() {
                continue;
            }
            let strategy = self
                .config
                .strategies
                .get(name)
                .copied()
                .unwrap_or(AggregateStrategy::Mean);
            let aggregated = match strategy {
                AggregateStrategy::Mean => mean(values),
                AggregateStrategy::Median => median(values),
                AggregateStrategy::Sum => values.iter().sum(),
                AggregateStrategy::Last => values[values.len() - 1],
            };
            let confidence = if values.len() > 1 { 1.0 } else { 0.5 };
            signals.push(SignalValue {
                name: name.clone(),
                value: round4(aggregated),
                unit: self.config.default_unit.clone(),
                original_unit: None,
                confidence,
            });
        }
        signals
    }
}

#[async_trait]
impl Processor for AggregatorProcessor {
    async fn process(&self, collection: &CollectionResult) -> Result<CompressionResult> {
        let normalizer = Normalizer::new(&self.config.normalizer);
        let (normalized, log) = normalizer.normalize_events(&collection.events);

        // Bucket events by window start. BTreeMap keeps the windows ordered.
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<(&RawEvent, &BTreeMap<String, serde_json::Value>)>> =
            BTreeMap::new();
        for (event, data) in collection.events.iter().zip(normalized.iter()) {
            buckets
                .entry(self.bucket_key(event.timestamp))
                .or_default()
                .push((event, data));
        }

        let mut states = Vec::new();
        for (bucket_start, items) in &buckets {
            let lineage: Vec<Uuid> = items.iter().map(|(event, _)| event.event_id).collect();

            let mut values_by_name: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for (_, data) in items {
                for (key, value) in data.iter() {
                    if let Some(number) = value.as_f64() {
                        values_by_name.entry(key.clone()).or_default().push(number);
                    }
                }
            }

            let signals = self.compute_signals(&values_by_name);
            if signals.is_empty() {
                continue;
            }

            let degraded = items
                .iter()
                .any(|(event, _)| event.source.reliability == SourceReliability::Degraded);
            let reliability = if degraded { 0.0 } else { 1.0 };

            states.push(MarketState::new(
                self.config.domain.clone(),
                *bucket_start,
                self.period_end(*bucket_start),
                self.config.granularity,
                signals,
                lineage,
                reliability,
            )?);
        }

        CompressionResult::new(states, collection.events.len() as u64, log)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{DataQualityReport, SourceMeta, SourceType};
    use chrono::TimeZone;

    fn event(day: u32, data: serde_json::Value) -> RawEvent {
        let source = SourceMeta::new("test-src", SourceType::Synthetic);
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        let map: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(data).unwrap();
        RawEvent::new(source, ts, map)
    }

    fn collection(events: Vec<RawEvent>) -> CollectionResult {
        let source = SourceMeta::new("test-src", SourceType::Synthetic);
        let total = events.len() as u64;
        let report = DataQualityReport::new(source, total, total, vec![], 1.0).unwrap();
        CollectionResult::new(events, report).unwrap()
    }

    #[tokio::test]
    async fn weekly_buckets_collapse_daily_events() {
        // 2024-01-01 is a Monday, so days 1..=7 share one bucket and
        // day 8 starts the next one.
        let events: Vec<RawEvent> = (1..=8)
            .map(|d| event(d, serde_json::json!({"price": 100.0, "demand": 10.0})))
            .collect();
        let processor = AggregatorProcessor::new(AggregatorConfig::default());

        let result = processor.process(&collection(events)).await.unwrap();
        assert_eq!(result.states.len(), 2);
        assert_eq!(result.records_consumed, 8);
        assert_eq!(result.records_produced, 2);

        let first = &result.states[0];
        assert_eq!(first.lineage.len(), 7);
        assert_eq!(first.signal("price").unwrap().value, 100.0);
        // demand uses the sum strategy by default
        assert_eq!(first.signal("demand").unwrap().value, 70.0);
    }

    #[tokio::test]
    async fn label_synonyms_are_canonicalised_and_logged() {
        let mut config = AggregatorConfig::default();
        config
            .normalizer
            .label_synonyms
            .insert("price_usd".to_string(), "price".to_string());

        let events = vec![
            event(1, serde_json::json!({"price_usd": 50.0})),
            event(2, serde_json::json!({"price_usd": 100.0})),
        ];
        let processor = AggregatorProcessor::new(config);

        let result = processor.process(&collection(events)).await.unwrap();
        assert_eq!(result.states[0].signal("price").unwrap().value, 75.0);
        assert!(result
            .normalization_log
            .iter()
            .any(|line| line.contains("price_usd")));
    }

    #[tokio::test]
    async fn unit_conversion_scales_values() {
        let mut config = AggregatorConfig::default();
        config.normalizer.unit_mappings.push(UnitMapping {
            from_unit: "price".to_string(),
            to_unit: "price_cents".to_string(),
            factor: 100.0,
        });

        let events = vec![event(1, serde_json::json!({"price": 2.5}))];
        let result = AggregatorProcessor::new(config)
            .process(&collection(events))
            .await
            .unwrap();
        assert_eq!(result.states[0].signal("price").unwrap().value, 250.0);
    }

    #[tokio::test]
    async fn degraded_source_zeroes_reliability() {
        let source = SourceMeta::new("shaky", SourceType::Scraper)
            .with_reliability(SourceReliability::Degraded);
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut data = BTreeMap::new();
        data.insert("price".to_string(), serde_json::json!(90.0));
        let events = vec![RawEvent::new(source, ts, data)];

        let result = AggregatorProcessor::new(AggregatorConfig::default())
            .process(&collection(events))
            .await
            .unwrap();
        assert_eq!(result.states[0].source_reliability, 0.0);
    }

    #[tokio::test]
    async fn buckets_without_numeric_signals_are_dropped() {
        let events = vec![event(1, serde_json::json!({"price": "INVALID"}))];
        let result = AggregatorProcessor::new(AggregatorConfig::default())
            .process(&collection(events))
            .await
            .unwrap();
        assert!(result.states.is_empty());
        assert_eq!(result.records_consumed, 1);
    }

    #[tokio::test]
    async fn single_value_signals_get_reduced_confidence() {
        let events = vec![event(1, serde_json::json!({"price": 42.0}))];
        let result = AggregatorProcessor::new(AggregatorConfig::default())
            .process(&collection(events))
            .await
            .unwrap();
        assert_eq!(result.states[0].signal("price").unwrap().confidence, 0.5);
    }
}
