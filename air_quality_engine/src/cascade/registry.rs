use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use air_data_ingestor::{BoundingBox, Coordinate, MeasurementProvider, Pollutant};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ProviderClass;
use crate::config::EngineConfig;

/// Footprint of the geostationary satellite product (North America).
pub const SATELLITE_COVERAGE: BoundingBox = BoundingBox::new(15.0, 70.0, -140.0, -40.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Global,
    Region(BoundingBox),
}

impl Coverage {
    pub fn accepts(&self, coordinate: &Coordinate) -> bool {
        match self {
            Coverage::Global => true,
            Coverage::Region(bbox) => bbox.contains(coordinate),
        }
    }

    /// Narrows this coverage to `bbox`.
    pub fn within(self, bbox: BoundingBox) -> Coverage {
        match self {
            Coverage::Global => Coverage::Region(bbox),
            Coverage::Region(own) => Coverage::Region(own.intersect(&bbox)),
        }
    }
}

/// A provider plus the metadata the cascade needs to schedule and rank it.
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub class: ProviderClass,
    pub coverage: Coverage,
    pub timeout: Duration,
    /// Pollutants this provider is authoritative for.
    pub specialty: BTreeSet<Pollutant>,
    provider: Arc<dyn MeasurementProvider>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("coverage", &self.coverage)
            .field("timeout", &self.timeout)
            .field("specialty", &self.specialty)
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptor {
    /// Class default coverage and timeout, no specialty.
    pub fn new(
        name: impl Into<String>,
        class: ProviderClass,
        provider: Arc<dyn MeasurementProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            coverage: class.default_coverage(),
            timeout: Duration::from_millis(class.default_timeout_ms()),
            specialty: BTreeSet::new(),
            provider,
        }
    }

    /// A satellite descriptor's coverage is narrowed to [`SATELLITE_COVERAGE`].
    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = match self.class {
            ProviderClass::Satellite => coverage.within(SATELLITE_COVERAGE),
            ProviderClass::GroundNetwork | ProviderClass::Model => coverage,
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_specialty(mut self, pollutants: impl IntoIterator<Item = Pollutant>) -> Self {
        self.specialty.extend(pollutants);
        self
    }

    pub fn is_specialist_for(&self, pollutant: Pollutant) -> bool {
        self.specialty.contains(&pollutant)
    }

    pub fn provider(&self) -> &Arc<dyn MeasurementProvider> {
        &self.provider
    }
}

/// Providers in priority order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the lowest priority. Re-registering a name replaces the
    /// earlier descriptor in place.
    pub fn register(&mut self, descriptor: ProviderDescriptor) {
        match self.providers.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => {
                warn!(provider = %descriptor.name, "provider registered twice; replacing");
                *existing = descriptor;
            }
            None => self.providers.push(descriptor),
        }
    }

    pub fn with(mut self, descriptor: ProviderDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn as_slice(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Builds a registry from the `[providers]` section, binding each enabled
    /// entry to the adapter of the same name. Entries without an adapter are
    /// skipped with a warning.
    pub fn from_config(
        config: &EngineConfig,
        adapters: &HashMap<String, Arc<dyn MeasurementProvider>>,
    ) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        for (name, entry) in &config.providers {
            if !entry.enabled {
                info!(provider = %name, "provider disabled in config");
                continue;
            }
            let Some(adapter) = adapters.get(name) else {
                warn!(provider = %name, "no adapter available; skipping");
                continue;
            };

            let specialty = entry
                .specialty_set()
                .with_context(|| format!("provider `{name}`"))?;
            let descriptor = ProviderDescriptor::new(name.clone(), entry.class, Arc::clone(adapter))
                .with_coverage(entry.effective_coverage())
                .with_timeout(entry.timeout())
                .with_specialty(specialty);
            registry.register(descriptor);
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use air_data_ingestor::{Measurement, ProviderError};
    use async_trait::async_trait;

    use super::*;
    use crate::config::load_config_str;

    struct Silent;

    #[async_trait]
    impl MeasurementProvider for Silent {
        async fn fetch_measurements(
            &self,
            coordinate: Coordinate,
            _timeout: Duration,
        ) -> Result<Vec<Measurement>, ProviderError> {
            Err(ProviderError::NoData {
                latitude: coordinate.latitude(),
                longitude: coordinate.longitude(),
            })
        }
    }

    fn adapters(names: &[&str]) -> HashMap<String, Arc<dyn MeasurementProvider>> {
        names
            .iter()
            .map(|n| (n.to_string(), Arc::new(Silent) as Arc<dyn MeasurementProvider>))
            .collect()
    }

    #[test]
    fn satellite_footprint() {
        let cov = Coverage::Region(SATELLITE_COVERAGE);
        assert!(cov.accepts(&Coordinate::new(40.7, -74.0).unwrap()));
        assert!(cov.accepts(&Coordinate::new(15.0, -140.0).unwrap()));
        assert!(!cov.accepts(&Coordinate::new(10.0, 0.0).unwrap()));
        assert!(!cov.accepts(&Coordinate::new(48.85, 2.35).unwrap()));
        assert!(Coverage::Global.accepts(&Coordinate::new(-89.0, 179.0).unwrap()));
    }

    #[test]
    fn registration_keeps_priority_and_replaces_duplicates() {
        let silent: Arc<dyn MeasurementProvider> = Arc::new(Silent);
        let registry = ProviderRegistry::new()
            .with(ProviderDescriptor::new("a", ProviderClass::Satellite, silent.clone()))
            .with(ProviderDescriptor::new("b", ProviderClass::GroundNetwork, silent.clone()))
            .with(ProviderDescriptor::new("a", ProviderClass::Model, silent));

        let names: Vec<&str> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(registry.get("a").unwrap().class, ProviderClass::Model);
        assert_eq!(registry.get("a").unwrap().timeout, Duration::from_millis(8_000));
    }

    #[test]
    fn satellite_class_stays_inside_its_footprint() {
        let silent: Arc<dyn MeasurementProvider> = Arc::new(Silent);
        let bare = ProviderDescriptor::new("sat", ProviderClass::Satellite, silent.clone());
        assert_eq!(bare.coverage, Coverage::Region(SATELLITE_COVERAGE));
        assert!(!bare.coverage.accepts(&Coordinate::new(10.0, 0.0).unwrap()));

        let widened = bare.clone().with_coverage(Coverage::Global);
        assert_eq!(widened.coverage, Coverage::Region(SATELLITE_COVERAGE));

        let straddling =
            bare.with_coverage(Coverage::Region(BoundingBox::new(0.0, 30.0, -100.0, 10.0)));
        assert_eq!(
            straddling.coverage,
            Coverage::Region(BoundingBox::new(15.0, 30.0, -100.0, -40.0))
        );

        let ground = ProviderDescriptor::new("g", ProviderClass::GroundNetwork, silent);
        assert_eq!(ground.coverage, Coverage::Global);
    }

    #[test]
    fn satellite_without_coverage_key_is_gated() {
        let config =
            load_config_str("[providers.tempo]\nclass = \"satellite\"\nspecialty = [\"no2\"]")
                .unwrap();
        let registry = ProviderRegistry::from_config(&config, &adapters(&["tempo"])).unwrap();
        let tempo = registry.get("tempo").unwrap();
        assert_eq!(tempo.coverage, Coverage::Region(SATELLITE_COVERAGE));
        assert!(!tempo.coverage.accepts(&Coordinate::new(10.0, 0.0).unwrap()));
    }

    #[test]
    fn builds_from_config_in_declaration_order() {
        let config = load_config_str(
            r#"
            [providers.tempo]
            class = "satellite"
            coverage = "satellite"
            specialty = ["NO2", "ozone"]
            timeout_ms = 3000

            [providers.openaq]
            class = "ground_network"

            [providers.legacy]
            class = "model"
            enabled = false

            [providers.orphan]
            class = "model"
            "#,
        )
        .unwrap();

        let registry =
            ProviderRegistry::from_config(&config, &adapters(&["tempo", "openaq", "legacy"]))
                .unwrap();
        let names: Vec<&str> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["tempo", "openaq"]);

        let tempo = registry.get("tempo").unwrap();
        assert_eq!(tempo.coverage, Coverage::Region(SATELLITE_COVERAGE));
        assert!(tempo.is_specialist_for(Pollutant::No2));
        assert!(tempo.is_specialist_for(Pollutant::O3));
        assert!(!tempo.is_specialist_for(Pollutant::Pm25));
        assert_eq!(registry.get("openaq").unwrap().timeout, Duration::from_millis(5_000));
    }
}
