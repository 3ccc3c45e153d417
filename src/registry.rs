//! Stage registry: runtime lookup of constructable stage implementations by
//! `(category, name)`.
//!
//! The registry is an owned handle, not ambient global state. Population is
//! an explicit, ordered init phase — built-ins first, then external-package
//! discovery — completed before any run starts. After population the
//! registry is only read, so concurrent runs can share it behind an `Arc`
//! without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, UgearError};
use crate::stage::{
    Analyzer, AnalyzerFactory, Collector, CollectorFactory, Decider, DeciderFactory, Monitor,
    MonitorFactory, Processor, ProcessorFactory, Simulator, SimulatorFactory, StageCategory,
    StageFactory,
};

/// An external package exposing stage implementations through the six
/// per-category extension points. Each method returns the named factories
/// the package contributes for that category; the defaults contribute
/// nothing.
pub trait StagePackage: Send + Sync {
    fn package_name(&self) -> &str;

    fn collectors(&self) -> Vec<(String, CollectorFactory)> {
        Vec::new()
    }
    fn processors(&self) -> Vec<(String, ProcessorFactory)> {
        Vec::new()
    }
    fn analyzers(&self) -> Vec<(String, AnalyzerFactory)> {
        Vec::new()
    }
    fn simulators(&self) -> Vec<(String, SimulatorFactory)> {
        Vec::new()
    }
    fn deciders(&self) -> Vec<(String, DeciderFactory)> {
        Vec::new()
    }
    fn monitors(&self) -> Vec<(String, MonitorFactory)> {
        Vec::new()
    }
}

/// Outcome of one discovery pass. Failures are collected per package, never
/// silently dropped, and never prevent other packages from loading.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub registered: Vec<(StageCategory, String)>,
    pub skipped: Vec<(StageCategory, String)>,
    pub failures: Vec<UgearError>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Registration {
    factory: StageFactory,
    /// Package name for discovered entries; `None` for built-ins and direct
    /// registrations.
    origin: Option<String>,
}

/// Catalog mapping `(category, name)` to a constructable stage factory.
#[derive(Default)]
pub struct StageRegistry {
    entries: BTreeMap<(StageCategory, String), Registration>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a factory under its category and the given name. Fails if the
    /// pair is already registered; use [`StageRegistry::register_override`]
    /// to replace an existing entry deliberately.
    pub fn register(&mut self, name: impl Into<String>, factory: StageFactory) -> Result<()> {
        let name = name.into();
        let category = factory.category();
        if self.entries.contains_key(&(category, name.clone())) {
            return Err(UgearError::duplicate_registration(category.as_str(), name));
        }
        debug!(category = %category, name = %name, "plugin registered");
        self.entries.insert(
            (category, name),
            Registration {
                factory,
                origin: None,
            },
        );
        Ok(())
    }

    /// Record a factory, replacing any existing entry for the pair.
    pub fn register_override(&mut self, name: impl Into<String>, factory: StageFactory) {
        let name = name.into();
        let category = factory.category();
        debug!(category = %category, name = %name, "plugin registered (override)");
        self.entries.insert(
            (category, name),
            Registration {
                factory,
                origin: None,
            },
        );
    }

    pub fn register_collector(
        &mut self,
        name: impl Into<String>,
        factory: CollectorFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Collector(factory))
    }

    pub fn register_processor(
        &mut self,
        name: impl Into<String>,
        factory: ProcessorFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Processor(factory))
    }

    pub fn register_analyzer(
        &mut self,
        name: impl Into<String>,
        factory: AnalyzerFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Analyzer(factory))
    }

    pub fn register_simulator(
        &mut self,
        name: impl Into<String>,
        factory: SimulatorFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Simulator(factory))
    }

    pub fn register_decider(
        &mut self,
        name: impl Into<String>,
        factory: DeciderFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Decider(factory))
    }

    pub fn register_monitor(
        &mut self,
        name: impl Into<String>,
        factory: MonitorFactory,
    ) -> Result<()> {
        self.register(name, StageFactory::Monitor(factory))
    }

    /// Look up the factory registered under `(category, name)`.
    pub fn resolve(&self, category: StageCategory, name: &str) -> Result<&StageFactory> {
        self.entries
            .get(&(category, name.to_string()))
            .map(|r| &r.factory)
            .ok_or_else(|| {
                UgearError::plugin_not_found(category.as_str(), name, self.names(category))
            })
    }

    /// Resolve and construct a collector from its config payload.
    pub fn build_collector(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Collector>> {
        match self.resolve(StageCategory::Collector, name)? {
            StageFactory::Collector(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    pub fn build_processor(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Processor>> {
        match self.resolve(StageCategory::Processor, name)? {
            StageFactory::Processor(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    pub fn build_analyzer(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Analyzer>> {
        match self.resolve(StageCategory::Analyzer, name)? {
            StageFactory::Analyzer(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    pub fn build_simulator(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Simulator>> {
        match self.resolve(StageCategory::Simulator, name)? {
            StageFactory::Simulator(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    pub fn build_decider(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Decider>> {
        match self.resolve(StageCategory::Decider, name)? {
            StageFactory::Decider(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    pub fn build_monitor(&self, name: &str, config: serde_json::Value) -> Result<Arc<dyn Monitor>> {
        match self.resolve(StageCategory::Monitor, name)? {
            StageFactory::Monitor(factory) => factory(config),
            _ => unreachable!("registry keys are category-scoped"),
        }
    }

    /// Read-only enumeration of registered plugin names, optionally filtered
    /// by category.
    pub fn list(&self, category: Option<StageCategory>) -> BTreeMap<StageCategory, Vec<String>> {
        let mut listing: BTreeMap<StageCategory, Vec<String>> = match category {
            Some(c) => BTreeMap::from([(c, Vec::new())]),
            None => StageCategory::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        };
        for (key, _) in self.entries.iter() {
            if let Some(names) = listing.get_mut(&key.0) {
                names.push(key.1.clone());
            }
        }
        listing
    }

    pub fn contains(&self, category: StageCategory, name: &str) -> bool {
        self.entries.contains_key(&(category, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn names(&self, category: StageCategory) -> Vec<String> {
        self.entries
            .keys()
            .filter(|(c, _)| *c == category)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Scan the given external packages through their six extension points
    /// and register everything found.
    ///
    /// Idempotent: an entry already contributed by the same package is
    /// skipped silently, so re-running discovery without new packages leaves
    /// the enumerable contents unchanged. A name collision with a different
    /// origin is collected as a failure and the rest of the package still
    /// loads.
    pub fn discover_external(&mut self, packages: &[Arc<dyn StagePackage>]) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for package in packages {
            let package_name = package.package_name().to_string();
            let mut found: Vec<(String, StageFactory)> = Vec::new();
            found.extend(
                package
                    .collectors()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Collector(f))),
            );
            found.extend(
                package
                    .processors()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Processor(f))),
            );
            found.extend(
                package
                    .analyzers()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Analyzer(f))),
            );
            found.extend(
                package
                    .simulators()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Simulator(f))),
            );
            found.extend(
                package
                    .deciders()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Decider(f))),
            );
            found.extend(
                package
                    .monitors()
                    .into_iter()
                    .map(|(n, f)| (n, StageFactory::Monitor(f))),
            );

            for (name, factory) in found {
                let category = factory.category();
                let key = (category, name.clone());

                match self.entries.get(&key) {
                    Some(existing) if existing.origin.as_deref() == Some(&package_name) => {
                        report.skipped.push(key);
                    }
                    Some(_) => {
                        warn!(
                            package = %package_name,
                            category = %category,
                            name = %name,
                            "discovery collision with existing registration"
                        );
                        report.failures.push(UgearError::discovery(
                            &package_name,
                            format!(
                                "'{name}' already registered in category '{category}' by a different origin"
                            ),
                        ));
                    }
                    None => {
                        self.entries.insert(
                            key.clone(),
                            Registration {
                                factory,
                                origin: Some(package_name.clone()),
                            },
                        );
                        report.registered.push(key);
                    }
                }
            }
        }

        report
    }
}
