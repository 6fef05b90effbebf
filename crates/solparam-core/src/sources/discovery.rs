//! Locating parameter files on disk.
//!
//! Three tiers are scanned in fixed precedence: the bundled data, the user
//! application directory and the current working directory. Tier `i` gets
//! priority `TIER_WIDTH * i`; a later tier overrides the path and priority
//! of a same-named source from an earlier one.
//!
//! The bundled tier is compiled into the crate ([`EMBEDDED_SOURCES`]) unless
//! `$SOLPARAM_DATA_DIR` points at a directory to scan instead.

use crate::domain::ParamError;
use globset::{Glob, GlobMatcher};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TIER_WIDTH: u32 = 5;
pub const SOURCE_FILE_PATTERN: &str = "*.json";
pub const APP_DIR_NAME: &str = ".solparam";
pub const HOME_ENV: &str = "SOLPARAM_HOME";
pub const DATA_DIR_ENV: &str = "SOLPARAM_DATA_DIR";

/// `(identifier, document)` pairs of the bundled sources.
pub const EMBEDDED_SOURCES: &[(&str, &str)] =
    &[("simple", include_str!("../../data/simple.json"))];

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("cannot determine the home directory for the application directory")]
    HomeUnavailable,
    #[error("cannot determine the current working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
    #[error("invalid source file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to read source directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<DiscoveryError> for ParamError {
    fn from(error: DiscoveryError) -> Self {
        let code = match error {
            DiscoveryError::HomeUnavailable => "IO.HOME_UNAVAILABLE",
            DiscoveryError::WorkingDirectory(_) => "IO.WORKING_DIRECTORY",
            DiscoveryError::InvalidPattern { .. } => "IO.SOURCE_PATTERN",
            DiscoveryError::ReadDirectory { .. } => "IO.SOURCE_DIRECTORY",
        };
        ParamError::io_system(code, error.to_string())
    }
}

/// User application directory: `$SOLPARAM_HOME`, else `<home>/.solparam`.
pub fn app_dir() -> Result<PathBuf, DiscoveryError> {
    if let Some(path) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(APP_DIR_NAME))
        .ok_or(DiscoveryError::HomeUnavailable)
}

/// Override for the bundled tier: `$SOLPARAM_DATA_DIR`, if set.
pub fn builtin_dir() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// The directories scanned for parameter files. `builtin` is `None` when the
/// bundled tier comes from [`EMBEDDED_SOURCES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocations {
    pub builtin: Option<PathBuf>,
    pub app_dir: PathBuf,
    pub working_dir: PathBuf,
}

impl SourceLocations {
    pub fn new(
        builtin: impl Into<PathBuf>,
        app_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            builtin: Some(builtin.into()),
            app_dir: app_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Locations whose bundled tier is the embedded data.
    pub fn embedded(app_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            builtin: None,
            app_dir: app_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn from_env() -> Result<Self, DiscoveryError> {
        let working_dir = std::env::current_dir().map_err(DiscoveryError::WorkingDirectory)?;
        Ok(Self {
            builtin: builtin_dir(),
            app_dir: app_dir()?,
            working_dir,
        })
    }

    pub fn uses_embedded_sources(&self) -> bool {
        self.builtin.is_none()
    }

    /// Files of the bundled tier; empty when the embedded data is used.
    pub fn locate_source_files_builtin(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
        match &self.builtin {
            Some(directory) => locate_source_files_in(directory),
            None => Ok(Vec::new()),
        }
    }

    pub fn locate_source_files_in_app_dir(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
        locate_source_files_in(&self.app_dir)
    }

    pub fn locate_source_files_in_pwd(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
        locate_source_files_in(&self.working_dir)
    }

    /// Files of every tier, lowest priority number first.
    pub fn locate_source_files(&self) -> Result<Vec<Vec<PathBuf>>, DiscoveryError> {
        Ok(vec![
            self.locate_source_files_builtin()?,
            self.locate_source_files_in_app_dir()?,
            self.locate_source_files_in_pwd()?,
        ])
    }
}

/// `*.json` files directly inside `directory`, sorted by file name. A
/// missing directory contributes nothing.
pub fn locate_source_files_in(directory: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !directory.is_dir() {
        debug!(directory = %directory.display(), "source directory absent");
        return Ok(Vec::new());
    }

    let matcher = source_file_matcher()?;
    let entries = fs::read_dir(directory).map_err(|source| DiscoveryError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            files.push(path);
        }
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));

    debug!(
        directory = %directory.display(),
        count = files.len(),
        "located source files"
    );
    Ok(files)
}

fn source_file_matcher() -> Result<GlobMatcher, DiscoveryError> {
    Glob::new(SOURCE_FILE_PATTERN)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| DiscoveryError::InvalidPattern {
            pattern: SOURCE_FILE_PATTERN.to_string(),
            source,
        })
}

/// Identifiers, paths and priorities derived from located files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceIndex {
    /// Every identifier in discovery order; may repeat across tiers.
    pub names: Vec<String>,
    pub paths: BTreeMap<String, PathBuf>,
    pub priorities: BTreeMap<String, u32>,
}

pub fn populate_sources<T: AsRef<[PathBuf]>>(tiers: &[T]) -> SourceIndex {
    let mut index = SourceIndex::default();
    for (tier, files) in tiers.iter().enumerate() {
        let priority = TIER_WIDTH * tier as u32;
        for path in files.as_ref() {
            let Some(stem) = path.file_stem() else {
                continue;
            };
            let name = stem.to_string_lossy().into_owned();
            index.names.push(name.clone());
            index.paths.insert(name.clone(), path.clone());
            index.priorities.insert(name, priority);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::{EMBEDDED_SOURCES, SourceLocations, locate_source_files_in, populate_sources};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn populate_sources_assigns_one_priority_per_tier() {
        let tiers = vec![
            vec![PathBuf::from("file1.json"), PathBuf::from("file2.json")],
            vec![PathBuf::from("file3.json")],
            vec![PathBuf::from("file4.json")],
        ];
        let index = populate_sources(&tiers);

        assert_eq!(index.names, ["file1", "file2", "file3", "file4"]);
        assert_eq!(index.paths.len(), 4);
        assert_eq!(index.paths["file3"], PathBuf::from("file3.json"));
        let priorities: Vec<(&str, u32)> = index
            .priorities
            .iter()
            .map(|(name, priority)| (name.as_str(), *priority))
            .collect();
        assert_eq!(
            priorities,
            [("file1", 0), ("file2", 0), ("file3", 5), ("file4", 10)]
        );
    }

    #[test]
    fn later_tiers_override_same_named_sources() {
        let tiers = vec![
            vec![PathBuf::from("builtin/simple.json")],
            vec![],
            vec![PathBuf::from("pwd/simple.json")],
        ];
        let index = populate_sources(&tiers);

        assert_eq!(index.names, ["simple", "simple"]);
        assert_eq!(index.paths["simple"], PathBuf::from("pwd/simple.json"));
        assert_eq!(index.priorities["simple"], 10);
    }

    #[test]
    fn only_json_files_are_located_in_name_order() {
        let temp = TempDir::new().expect("tempdir should be created");
        for name in ["b.json", "a.json", "notes.txt"] {
            fs::write(temp.path().join(name), "{}").expect("file should be written");
        }
        fs::create_dir(temp.path().join("nested.json")).expect("directory should be created");

        let files = locate_source_files_in(temp.path()).expect("directory should be scanned");
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }

    #[test]
    fn missing_directories_contribute_nothing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let missing = temp.path().join("absent");
        let locations = SourceLocations::new(&missing, &missing, temp.path());

        let tiers = locations
            .locate_source_files()
            .expect("missing directories should not fail");
        assert_eq!(tiers.len(), 3);
        assert!(tiers.iter().all(Vec::is_empty));
    }

    #[test]
    fn embedded_tier_scans_no_directory() {
        let temp = TempDir::new().expect("tempdir should be created");
        let locations = SourceLocations::embedded(temp.path().join("app"), temp.path());
        assert!(locations.uses_embedded_sources());
        assert!(
            locations
                .locate_source_files_builtin()
                .expect("embedded tier should not scan")
                .is_empty()
        );

        let (name, document) = EMBEDDED_SOURCES[0];
        assert_eq!(name, "simple");
        let parsed: serde_json::Value =
            serde_json::from_str(document).expect("embedded data should be valid JSON");
        assert!(parsed.get("GaAs").is_some());
    }

    #[test]
    fn app_dir_copy_is_discovered_in_its_tier() {
        let builtin = TempDir::new().expect("tempdir should be created");
        let app = TempDir::new().expect("tempdir should be created");
        let pwd = TempDir::new().expect("tempdir should be created");
        fs::write(builtin.path().join("simple.json"), "{}").expect("file should be written");

        let locations = SourceLocations::new(builtin.path(), app.path(), pwd.path());
        assert!(
            locations
                .locate_source_files_in_app_dir()
                .expect("app dir should be scanned")
                .is_empty()
        );

        fs::copy(builtin.path().join("simple.json"), app.path().join("simple.json"))
            .expect("file should be copied");
        let in_app_dir = locations
            .locate_source_files_in_app_dir()
            .expect("app dir should be scanned");
        assert_eq!(in_app_dir.len(), 1);
        assert_eq!(
            in_app_dir[0].file_stem().map(|stem| stem.to_string_lossy().into_owned()),
            Some("simple".to_string())
        );
    }
}
