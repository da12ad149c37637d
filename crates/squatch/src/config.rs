use crate::error::{IoContext, Result, SquatchError};
use crate::theme::ThemeConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the source directory.
pub const CONFIG_FILE: &str = ".squatch";

pub fn default_dist_dir() -> String {
    "dist".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SquatchConfig {
    pub dist_dir: String,
    pub ignore_folders: NameList,
    pub ignore_files: NameList,
    pub theme: ThemeConfig,
}

impl Default for SquatchConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            ignore_folders: NameList::default(),
            ignore_files: NameList::default(),
            theme: ThemeConfig::default(),
        }
    }
}

impl SquatchConfig {
    /// Loads `<source_dir>/.squatch`, falling back to defaults when absent.
    pub fn load(source_dir: &Path) -> Result<Self> {
        let config_path = source_dir.join(CONFIG_FILE);

        if !config_path.is_file() {
            log::debug!("No {CONFIG_FILE} in {}, using defaults", source_dir.display());
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(&config_path).io_context("reading config", &config_path)?;
        Self::parse(&content, &config_path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut config: SquatchConfig =
            serde_json::from_str(content).map_err(|error| SquatchError::JsonParse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;

        if config.dist_dir.trim().is_empty() {
            config.dist_dir = default_dist_dir();
        }

        Ok(config)
    }
}

/// A list of names given either as `"a, b"` or `["a", "b"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawNameList")]
pub struct NameList(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNameList {
    Joined(String),
    Items(Vec<String>),
}

impl From<RawNameList> for NameList {
    fn from(raw: RawNameList) -> Self {
        let names: Vec<String> = match raw {
            RawNameList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
            RawNameList::Items(items) => items,
        };
        NameList(
            names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreSets {
    pub folders: HashSet<String>,
    pub files: HashSet<String>,
}

impl IgnoreSets {
    pub fn skips_folder(&self, name: &str) -> bool {
        name.starts_with('.') || self.folders.contains(name)
    }

    pub fn skips_file(&self, name: &str) -> bool {
        name.starts_with('.') || self.files.contains(name)
    }
}

/// Resolved, read-only inputs for one build.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ignore: IgnoreSets,
    pub theme: ThemeConfig,
}

impl Settings {
    pub fn resolve(
        source_dir: &Path,
        config: SquatchConfig,
        output_override: Option<&Path>,
    ) -> Self {
        let output_dir = output_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&config.dist_dir));

        let mut folders: HashSet<String> = config.ignore_folders.0.into_iter().collect();
        if let Some(name) = output_dir.file_name() {
            folders.insert(name.to_string_lossy().to_string());
        }
        let files = config.ignore_files.0.into_iter().collect();

        Self {
            source_dir: source_dir.to_path_buf(),
            output_dir,
            ignore: IgnoreSets { folders, files },
            theme: config.theme,
        }
    }
}
