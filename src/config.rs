use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "/etc/pipewiz/wizard.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub general: GeneralConfig,
    /// Phases in execution order
    pub phases: Vec<PhaseConfig>,
}

impl WizardConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: WizardConfig = toml::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Turn a phase off by name. Returns `false` if no such phase exists.
    pub fn disable(&mut self, phase: &str) -> bool {
        match self.phases.iter_mut().find(|p| p.name == phase) {
            Some(p) => {
                p.enabled = false;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub title: String,
    /// Extra static lines shown under the title
    pub header: Vec<String>,
    /// Log commands and downloads instead of performing them
    pub dryrun: bool,
    pub require_root: bool,
    /// Executables that must be on PATH before anything runs
    pub required_tools: Vec<String>,
    /// Parent of the per-run working directory (system temp dir if unset)
    pub workdir_base: Option<PathBuf>,
    /// Values substituted for `${name}` in URLs, paths and commands
    pub vars: BTreeMap<String, String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title: "Build Wizard".to_string(),
            header: Vec::new(),
            dryrun: false,
            require_root: false,
            required_tools: Vec::new(),
            workdir_base: None,
            vars: BTreeMap::new(),
        }
    }
}

/// A toggleable group of steps
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

fn enabled_by_default() -> bool {
    true
}

/// One step. Actions run in field order: note, fetch, locate, commands.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,
    /// Static annotation shown next to the step
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
    /// Candidate paths tried in order; `dir/prefix*` matches by prefix
    #[serde(default)]
    pub locate: Vec<String>,
    /// Command lines, split with shell quoting rules
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub url: String,
    /// URL of the checksum manifest listing `url`'s file name
    pub manifest: String,
}
