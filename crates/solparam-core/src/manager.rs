//! Priority-ordered search across registered parameter sources.

use crate::domain::{Composition, NkData, ParamError, ParamResult};
use crate::sources::{
    EMBEDDED_SOURCES, ParameterSource, SourceLocations, SourceRegistry, SourceSummary,
    populate_sources,
};
use crate::units::{Inputs, Parameter};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

static GLOBAL: OnceLock<ParamResult<Arc<ParameterManager>>> = OnceLock::new();

/// Coordinates one registry of sources.
///
/// Lookups walk the sources in ascending priority and return the first
/// success. A `ParameterMissing` miss moves on to the next source; any other
/// lookup error aborts the search. A source file that cannot be loaded is
/// logged and skipped, so one unrelated `*.json` file does not break lookups.
#[derive(Debug, Default)]
pub struct ParameterManager {
    registry: RwLock<SourceRegistry>,
}

impl ParameterManager {
    /// A manager with no sources, for tests and embedders.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_locations(locations: &SourceLocations) -> ParamResult<Self> {
        let tiers = locations.locate_source_files()?;
        let index = populate_sources(&tiers);
        debug!(sources = index.paths.len(), "discovered parameter sources");

        let mut registry = SourceRegistry::new();
        if locations.uses_embedded_sources() {
            for &(name, document) in EMBEDDED_SOURCES {
                registry.register_embedded(name, document, 0);
            }
        }
        registry.register_index(&index);
        Ok(Self {
            registry: RwLock::new(registry),
        })
    }

    pub fn from_env() -> ParamResult<Self> {
        Self::from_locations(&SourceLocations::from_env()?)
    }

    /// Process-wide manager, populated from discovery on first use.
    pub fn global() -> ParamResult<Arc<Self>> {
        GLOBAL
            .get_or_init(|| Self::from_env().map(Arc::new))
            .clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SourceRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SourceRegistry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, source: Arc<dyn ParameterSource>) {
        self.write().register(source);
    }

    pub fn register_file(&self, name: &str, path: impl Into<PathBuf>, priority: u32) {
        self.write().register_file(name, path, priority);
    }

    pub fn deregister(&self, name: &str) -> bool {
        self.write().deregister(name)
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.read().summaries()
    }

    pub fn source(&self, name: &str) -> ParamResult<Arc<dyn ParameterSource>> {
        self.read().load(name)
    }

    fn search<T, F>(&self, material: &str, what: &str, source: &[String], mut lookup: F) -> ParamResult<T>
    where
        F: FnMut(&dyn ParameterSource) -> ParamResult<T>,
    {
        let order = self.read().search_order(source)?;
        let mut attempted = Vec::with_capacity(order.len());
        for name in order {
            let loaded = self.read().load(&name);
            let instance = match loaded {
                Ok(instance) => instance,
                Err(error) => {
                    warn!(
                        source = %name,
                        code = error.code(),
                        reason = error.message(),
                        "skipping unloadable source"
                    );
                    attempted.push(name);
                    continue;
                }
            };
            match lookup(instance.as_ref()) {
                Ok(found) => {
                    debug!(source = %name, material, what, "resolved");
                    return Ok(found);
                }
                Err(error) if error.is_parameter_missing() => {
                    debug!(source = %name, material, what, reason = error.message(), "source miss");
                    attempted.push(name);
                }
                Err(error) => return Err(error),
            }
        }

        Err(ParamError::parameter_missing(
            "PARAM.NOT_FOUND",
            format!(
                "{what} not available for '{material}' in any of the sources [{}].",
                attempted.join(", ")
            ),
        ))
    }

    pub fn get_parameter(
        &self,
        material: &str,
        parameter: &str,
        source: &[String],
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<Parameter> {
        let what = format!("Parameter '{parameter}'");
        self.search(material, &what, source, |candidate| {
            candidate.get_parameter(material, parameter, comp, inputs)
        })
    }

    /// Resolves each name independently; the first failure aborts the batch.
    pub fn get_multiple_parameters(
        &self,
        material: &str,
        include: &[String],
        source: &[String],
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<BTreeMap<String, Parameter>> {
        let mut resolved = BTreeMap::new();
        for parameter in include {
            let value = self.get_parameter(material, parameter, source, comp, inputs)?;
            resolved.insert(parameter.clone(), value);
        }
        Ok(resolved)
    }

    pub fn get_nk(
        &self,
        material: &str,
        source: &[String],
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<NkData> {
        let nk = self.search(material, "nk data", source, |candidate| {
            candidate.get_nk(material, comp, inputs)
        })?;
        nk.validate()?;
        Ok(nk)
    }
}

#[cfg(test)]
mod tests {
    use super::ParameterManager;
    use crate::domain::{Composition, ParamErrorCategory};
    use crate::sources::SimpleSource;
    use crate::units::Inputs;
    use serde_json::json;
    use std::sync::Arc;

    fn source(name: &str, priority: u32, gap: &str) -> Arc<SimpleSource> {
        Arc::new(
            SimpleSource::from_value(name, priority, json!({"GaAs": {"gap": gap}}))
                .expect("source should build"),
        )
    }

    #[test]
    fn lower_priority_numbers_win() {
        let manager = ParameterManager::empty();
        manager.register(source("late", 10, "2 eV"));
        manager.register(source("early", 0, "1 eV"));

        let gap = manager
            .get_parameter("GaAs", "gap", &[], &Composition::empty(), &Inputs::new())
            .expect("gap should resolve");
        assert_eq!(gap.source(), Some("early"));

        let pinned = manager
            .get_parameter(
                "GaAs",
                "gap",
                &["late".to_string()],
                &Composition::empty(),
                &Inputs::new(),
            )
            .expect("explicit source should resolve");
        assert_eq!(pinned.source(), Some("late"));
    }

    #[test]
    fn exhausted_search_lists_attempted_sources() {
        let manager = ParameterManager::empty();
        manager.register(source("one", 0, "1 eV"));
        manager.register(source("two", 5, "1 eV"));

        let error = manager
            .get_parameter("GaAs", "mass", &[], &Composition::empty(), &Inputs::new())
            .expect_err("absent parameter should fail");
        assert_eq!(error.category(), ParamErrorCategory::ParameterMissing);
        assert!(error.message().contains("'mass'"));
        assert!(error.message().contains("[one, two]"));
    }

    #[test]
    fn deregistration_is_visible_to_later_calls() {
        let manager = ParameterManager::empty();
        manager.register(source("only", 0, "1 eV"));
        assert_eq!(manager.sources().len(), 1);
        assert!(manager.deregister("only"));

        let error = manager
            .get_parameter("GaAs", "gap", &[], &Composition::empty(), &Inputs::new())
            .expect_err("no sources should fail");
        assert!(error.is_parameter_missing());
    }
}
