//! Synthetic data collector: fully offline, deterministic given a seed.
//!
//! Generates a seasonal time-series with injected failures (missing field,
//! null value, type mismatch) so downstream stages can be exercised without
//! any external source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::contracts::{
    CollectionResult, DataQualityReport, QualityFlag, RawEvent, SourceMeta, SourceType,
};
use crate::error::Result;
use crate::stage::Collector;

const SEASONAL_CYCLE_DAYS: f64 = 365.0;
const DAILY_NOISE_SCALE: f64 = 0.05;
const OUTLIER_SIGMA: f64 = 3.0;
const OUTLIER_TRIGGER_PROBABILITY: f64 = 0.3;

/// Configuration for the synthetic data generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub n_records: usize,
    pub signals: Vec<String>,
    pub failure_rate: f64,
    pub schema_change_at: Option<usize>,
    pub anomaly_start: Option<usize>,
    pub anomaly_magnitude: f64,
    pub seed: u64,
    pub base_price: f64,
    pub base_demand: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_records: 90,
            signals: vec!["price".to_string(), "demand".to_string()],
            failure_rate: 0.1,
            schema_change_at: None,
            anomaly_start: Some(75),
            anomaly_magnitude: 0.25,
            seed: 42,
            base_price: 100.0,
            base_demand: 500.0,
        }
    }
}

/// Generates deterministic synthetic time-series with injected failures.
pub struct SyntheticCollector {
    config: SyntheticConfig,
}

impl SyntheticCollector {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    fn make_source(&self) -> SourceMeta {
        SourceMeta::new("synthetic-toy", SourceType::Synthetic).with_schema_version("1.0")
    }

    fn generate_day(
        &self,
        rng: &mut StdRng,
        day: usize,
        is_outlier: bool,
    ) -> BTreeMap<String, serde_json::Value> {
        let seasonal = (2.0 * std::f64::consts::PI * day as f64 / SEASONAL_CYCLE_DAYS).sin();
        let noise_price = uniform_noise(rng, DAILY_NOISE_SCALE);
        let noise_demand = uniform_noise(rng, DAILY_NOISE_SCALE);

        let mut price = self.config.base_price * (1.0 + 0.1 * seasonal + noise_price);
        let demand = self.config.base_demand * (1.0 - 0.08 * seasonal + noise_demand);

        if is_outlier && rng.random::<f64>() < OUTLIER_TRIGGER_PROBABILITY {
            let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
            price *= 1.0 + OUTLIER_SIGMA * DAILY_NOISE_SCALE * sign;
        }

        if let Some(anomaly_start) = self.config.anomaly_start {
            if day >= anomaly_start {
                price *= 1.0 + self.config.anomaly_magnitude;
            }
        }

        let mut data = BTreeMap::new();
        if self.config.signals.iter().any(|s| s == "price") {
            data.insert("price".to_string(), serde_json::json!(round2(price)));
        }
        if self.config.signals.iter().any(|s| s == "demand") {
            data.insert("demand".to_string(), serde_json::json!(round2(demand)));
        }
        data
    }

    fn apply_schema_change(
        &self,
        mut data: BTreeMap<String, serde_json::Value>,
    ) -> BTreeMap<String, serde_json::Value> {
        if let Some(price) = data.remove("price") {
            data.insert("price_usd".to_string(), price);
        }
        data
    }

    fn inject_failure(
        &self,
        rng: &mut StdRng,
        mut data: BTreeMap<String, serde_json::Value>,
        day: usize,
    ) -> (BTreeMap<String, serde_json::Value>, Vec<QualityFlag>) {
        let keys: Vec<String> = data.keys().cloned().collect();
        let key = if keys.is_empty() {
            "price".to_string()
        } else {
            keys[rng.random_range(0..keys.len())].clone()
        };

        let mut flags = Vec::new();
        match rng.random_range(0..3) {
            0 => {
                data.remove(&key);
                flags.push(
                    QualityFlag::new(&key, "missing", "warning")
                        .with_details(format!("field missing at day {day}")),
                );
            }
            1 => {
                data.insert(key.clone(), serde_json::Value::Null);
                flags.push(
                    QualityFlag::new(&key, "null_value", "warning")
                        .with_details(format!("null injected at day {day}")),
                );
            }
            _ => {
                data.insert(key.clone(), serde_json::json!("INVALID"));
                flags.push(QualityFlag::new(&key, "type_mismatch", "error").with_details(
                    format!("type mismatch at day {day}: expected number, got string"),
                ));
            }
        }

        (data, flags)
    }
}

#[async_trait]
impl Collector for SyntheticCollector {
    async fn collect(&self) -> Result<CollectionResult> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let source = self.make_source();
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let failure_mask: Vec<bool> = (0..self.config.n_records)
            .map(|_| rng.random::<f64>() < self.config.failure_rate)
            .collect();

        let mut events = Vec::with_capacity(self.config.n_records);
        let mut flags = Vec::new();
        let mut valid_count: u64 = 0;
        let mut schema_changed = false;

        for day in 0..self.config.n_records {
            let ts = start + Duration::days(day as i64);
            let is_failure = failure_mask[day];

            let mut data = self.generate_day(&mut rng, day, is_failure);

            if let Some(change_at) = self.config.schema_change_at {
                if day >= change_at && !schema_changed {
                    schema_changed = true;
                    flags.push(
                        QualityFlag::new("price", "schema_changed", "critical").with_details(
                            format!("schema changed at day {day}: 'price' renamed to 'price_usd'"),
                        ),
                    );
                }
                if schema_changed {
                    data = self.apply_schema_change(data);
                }
            }

            if is_failure {
                let (broken, day_flags) = self.inject_failure(&mut rng, data, day);
                data = broken;
                flags.extend(day_flags);
            } else {
                valid_count += 1;
            }

            let version = if schema_changed { "2.0" } else { "1.0" };
            events.push(RawEvent::new(source.clone(), ts, data).with_schema_version(version));
        }

        let reliability = if self.config.n_records == 0 {
            0.0
        } else {
            valid_count as f64 / self.config.n_records as f64
        };

        let quality_report = DataQualityReport::new(
            source,
            self.config.n_records as u64,
            valid_count,
            flags,
            reliability,
        )?
        .with_schema_match(!schema_changed);

        CollectionResult::new(events, quality_report)
    }
}

fn uniform_noise(rng: &mut StdRng, scale: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * 2.0 * scale
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
