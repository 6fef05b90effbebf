use super::discovery::SourceIndex;
use super::{ParameterSource, SimpleSource};
use crate::domain::{ParamError, ParamResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Source instances are created on first lookup; a failed load is kept and
/// reported again on later lookups.
#[derive(Debug)]
enum SourceSlot {
    File {
        path: PathBuf,
        priority: u32,
        loaded: OnceLock<ParamResult<Arc<dyn ParameterSource>>>,
    },
    Embedded {
        document: &'static str,
        priority: u32,
        loaded: OnceLock<ParamResult<Arc<dyn ParameterSource>>>,
    },
    Loaded(Arc<dyn ParameterSource>),
}

impl SourceSlot {
    fn priority(&self) -> u32 {
        match self {
            Self::File { priority, .. } | Self::Embedded { priority, .. } => *priority,
            Self::Loaded(source) => source.priority(),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Embedded { .. } | Self::Loaded(_) => None,
        }
    }

    fn is_loaded(&self) -> bool {
        match self {
            Self::File { loaded, .. } | Self::Embedded { loaded, .. } => loaded.get().is_some(),
            Self::Loaded(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    pub priority: u32,
    pub path: Option<PathBuf>,
    pub loaded: bool,
}

/// One slot per source identifier; registering a name again replaces it.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    slots: BTreeMap<String, SourceSlot>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_index(index: &SourceIndex) -> Self {
        let mut registry = Self::new();
        registry.register_index(index);
        registry
    }

    /// Registers every discovered file, replacing same-named slots.
    pub fn register_index(&mut self, index: &SourceIndex) {
        for (name, path) in &index.paths {
            let priority = index.priorities.get(name).copied().unwrap_or_default();
            self.register_file(name, path, priority);
        }
    }

    /// Registers a document compiled into the binary; it is parsed on first
    /// lookup like a file.
    pub fn register_embedded(&mut self, name: &str, document: &'static str, priority: u32) {
        debug!(source = name, priority, "registered embedded source");
        self.slots.insert(
            name.to_string(),
            SourceSlot::Embedded {
                document,
                priority,
                loaded: OnceLock::new(),
            },
        );
    }

    pub fn register_file(&mut self, name: &str, path: impl Into<PathBuf>, priority: u32) {
        let path = path.into();
        debug!(source = name, path = %path.display(), priority, "registered source file");
        self.slots.insert(
            name.to_string(),
            SourceSlot::File {
                path,
                priority,
                loaded: OnceLock::new(),
            },
        );
    }

    pub fn register(&mut self, source: Arc<dyn ParameterSource>) {
        debug!(source = source.name(), priority = source.priority(), "registered source");
        self.slots
            .insert(source.name().to_string(), SourceSlot::Loaded(source));
    }

    pub fn deregister(&mut self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn priority(&self, name: &str) -> Option<u32> {
        self.slots.get(name).map(SourceSlot::priority)
    }

    pub fn summaries(&self) -> Vec<SourceSummary> {
        let mut summaries: Vec<SourceSummary> = self
            .slots
            .iter()
            .map(|(name, slot)| SourceSummary {
                name: name.clone(),
                priority: slot.priority(),
                path: slot.path().map(Path::to_path_buf),
                loaded: slot.is_loaded(),
            })
            .collect();
        summaries.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.name.cmp(&right.name))
        });
        summaries
    }

    /// Returns the source instance, loading its file on first use.
    pub fn load(&self, name: &str) -> ParamResult<Arc<dyn ParameterSource>> {
        match self.slots.get(name) {
            Some(SourceSlot::Loaded(source)) => Ok(Arc::clone(source)),
            Some(SourceSlot::File {
                path,
                priority,
                loaded,
            }) => loaded
                .get_or_init(|| {
                    SimpleSource::load(name, path, *priority)
                        .map(|source| Arc::new(source) as Arc<dyn ParameterSource>)
                })
                .clone(),
            Some(SourceSlot::Embedded {
                document,
                priority,
                loaded,
            }) => loaded
                .get_or_init(|| {
                    SimpleSource::from_json_str(name, *priority, document)
                        .map(|source| Arc::new(source) as Arc<dyn ParameterSource>)
                })
                .clone(),
            None => Err(unknown_source(name)),
        }
    }

    /// Names to search: `requested` in the given order, or every registered
    /// source by ascending priority (ties by name) when it is empty.
    pub fn search_order(&self, requested: &[String]) -> ParamResult<Vec<String>> {
        if requested.is_empty() {
            return Ok(self
                .summaries()
                .into_iter()
                .map(|summary| summary.name)
                .collect());
        }
        requested
            .iter()
            .map(|name| {
                if self.contains(name) {
                    Ok(name.clone())
                } else {
                    Err(unknown_source(name))
                }
            })
            .collect()
    }
}

fn unknown_source(name: &str) -> ParamError {
    ParamError::parameter_missing(
        "PARAM.UNKNOWN_SOURCE",
        format!("Source '{name}' is not registered."),
    )
}

#[cfg(test)]
mod tests {
    use super::SourceRegistry;
    use crate::domain::ParamErrorCategory;
    use crate::sources::{ParameterSource, SimpleSource, populate_sources};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn file_sources_load_once_on_first_lookup() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("simple.json");
        fs::write(&path, json!({"reference": "r", "GaAs": {"gap": "1.42 eV"}}).to_string())
            .expect("source file should be written");

        let mut registry = SourceRegistry::new();
        registry.register_file("simple", &path, 5);
        assert!(!registry.summaries()[0].loaded);

        let first = registry.load("simple").expect("source should load");
        assert_eq!(first.priority(), 5);
        assert!(registry.summaries()[0].loaded);

        fs::remove_file(&path).expect("source file should be removed");
        let second = registry.load("simple").expect("cached source should be reused");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn search_order_sorts_by_priority_then_name() {
        let tiers = vec![
            vec![PathBuf::from("b.json"), PathBuf::from("a.json")],
            vec![PathBuf::from("c.json")],
        ];
        let mut registry = SourceRegistry::from_index(&populate_sources(&tiers));
        let custom = SimpleSource::from_value("custom", 7, json!({}))
            .expect("empty source should build");
        registry.register(Arc::new(custom));

        let order = registry.search_order(&[]).expect("order should resolve");
        assert_eq!(order, ["a", "b", "c", "custom"]);

        let explicit = registry
            .search_order(&["custom".to_string(), "a".to_string()])
            .expect("explicit order should resolve");
        assert_eq!(explicit, ["custom", "a"]);

        let error = registry
            .search_order(&["nope".to_string()])
            .expect_err("unknown source should fail");
        assert_eq!(error.category(), ParamErrorCategory::ParameterMissing);
        assert!(error.message().contains("'nope'"));
    }

    #[test]
    fn embedded_documents_load_lazily_and_files_replace_them() {
        let mut registry = SourceRegistry::new();
        registry.register_embedded("simple", r#"{"GaAs": {"gap": "1.42 eV"}}"#, 0);
        let summaries = registry.summaries();
        assert_eq!(summaries[0].path, None);
        assert!(!summaries[0].loaded);

        let source = registry.load("simple").expect("embedded source should load");
        assert_eq!(source.materials(), ["GaAs"]);
        assert!(registry.summaries()[0].loaded);

        let tiers = vec![vec![], vec![], vec![PathBuf::from("pwd/simple.json")]];
        registry.register_index(&populate_sources(&tiers));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.priority("simple"), Some(10));
        assert_eq!(
            registry.summaries()[0].path,
            Some(PathBuf::from("pwd/simple.json"))
        );
    }

    #[test]
    fn deregistered_sources_disappear() {
        let mut registry = SourceRegistry::new();
        let source = SimpleSource::from_value("gone", 0, json!({})).expect("source should build");
        registry.register(Arc::new(source));
        assert!(registry.contains("gone"));
        assert!(registry.deregister("gone"));
        assert!(!registry.deregister("gone"));
        assert!(registry.load("gone").is_err());
    }
}
