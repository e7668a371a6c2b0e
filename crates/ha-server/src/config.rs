//! `configuration.yaml` loading

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub const CONFIG_FILE: &str = "configuration.yaml";

fn default_name() -> String {
    "Home".to_string()
}

fn default_time_zone() -> String {
    "Europe/Berlin".to_string()
}

/// The `homeassistant:` section
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// IANA zone used for time-of-day decisions (e.g. "Europe/Berlin")
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            time_zone: default_time_zone(),
        }
    }
}

/// The `kia_uvo:` section: account credentials plus entry options
#[derive(Debug, Clone, Deserialize)]
pub struct KiaUvoConfig {
    pub username: String,
    pub password: String,

    /// Everything else becomes the entry's options
    #[serde(flatten)]
    pub options: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub homeassistant: CoreConfig,

    #[serde(default)]
    pub kia_uvo: Option<KiaUvoConfig>,
}

impl HostConfig {
    /// Load `configuration.yaml` from `config_dir`; a missing file yields
    /// the defaults
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}
