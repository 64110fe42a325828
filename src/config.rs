use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::cli::ConfigCommand;
use crate::profile::{OutputKind, ProfileDirectoryProvider, SearchRoots, StandardRoots};

const CONFIG_FILE_BASENAME: &str = "config.yaml";
const CONFIG_ENV_VAR: &str = "TUNED_VIEWER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Explicit search roots, highest precedence first. Empty means the
    /// standard tuned locations.
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub detect_pod: bool,
    #[serde(default = "default_true")]
    pub include_local_profiles: bool,
    #[serde(default = "default_active_profile_files")]
    pub active_profile_files: Vec<PathBuf>,
    #[serde(default)]
    pub default_format: OutputKind,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            search_roots: Vec::new(),
            detect_pod: true,
            include_local_profiles: true,
            active_profile_files: default_active_profile_files(),
            default_format: OutputKind::default(),
        }
    }
}

impl ViewerConfig {
    /// Command-line directories win over configured roots, which win over
    /// the standard locations.
    pub fn search_roots(&self, overrides: &[PathBuf]) -> Vec<PathBuf> {
        if !overrides.is_empty() {
            SearchRoots::new(overrides.iter().cloned()).search_roots()
        } else if !self.search_roots.is_empty() {
            SearchRoots::new(self.search_roots.iter().cloned()).search_roots()
        } else {
            StandardRoots::new(self.detect_pod, self.include_local_profiles).search_roots()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_active_profile_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc/tuned/active_profile"),
        PathBuf::from("/host/etc/tuned/active_profile"),
    ]
}

#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        let project_dirs = ProjectDirs::from("org", "tuned", "tuned-viewer")
            .context("unable to resolve project directories")?;
        Ok(Self::with_path(
            project_dirs.config_dir().join(CONFIG_FILE_BASENAME),
        ))
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn load(&self) -> Result<ViewerConfig> {
        let path = self.config_path();
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(ViewerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {:?}", path))?;
        let config: ViewerConfig = if is_toml(path) {
            toml::from_str(&contents).context("failed to parse TOML config")?
        } else {
            serde_yaml::from_str(&contents).context("failed to parse YAML config")?
        };
        Ok(config)
    }

    pub fn save(&self, config: &ViewerConfig) -> Result<()> {
        let path = self.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir at {:?}", parent))?;
        }
        let encoded = if is_toml(path) {
            toml::to_string_pretty(config).context("failed to serialize config to TOML")?
        } else {
            serde_yaml::to_string(config).context("failed to serialize config to YAML")?
        };
        fs::write(path, encoded)
            .with_context(|| format!("failed to write config file at {:?}", path))?;
        Ok(())
    }

    pub fn reset(&self) -> Result<ViewerConfig> {
        let config = ViewerConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("toml")
}

pub fn handle_config(
    command: ConfigCommand,
    manager: &ConfigManager,
    config: &mut ViewerConfig,
    overrides: &[PathBuf],
) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!(
                "{}",
                serde_yaml::to_string(config).context("failed to serialize config for display")?
            );
        }
        ConfigCommand::Paths => {
            println!("config: {:?}", manager.config_path());
            for root in config.search_roots(overrides) {
                println!("profiles: {:?}", root);
            }
        }
        ConfigCommand::Reset => {
            *config = manager.reset()?;
            println!("configuration reset to defaults");
        }
    }
    Ok(())
}
