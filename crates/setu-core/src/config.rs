use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NavConfig {
    #[serde(default = "default_state_key")]
    pub state_key: String,

    #[serde(default = "default_warn_depth")]
    pub warn_depth: usize,
}

fn default_state_key() -> String {
    "setu.layer".to_string()
}

fn default_warn_depth() -> usize {
    8
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            state_key: default_state_key(),
            warn_depth: default_warn_depth(),
        }
    }
}

impl NavConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse navigation config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            debug!("no navigation config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read navigation config {}", path.display()))?;
        let config = Self::from_toml_str(&raw)?;
        info!(
            path = %path.display(),
            state_key = %config.state_key,
            warn_depth = config.warn_depth,
            "loaded navigation config"
        );
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.state_key.trim().is_empty() {
            return Err(anyhow!("state_key must not be empty"));
        }
        Ok(())
    }
}
