//! Simulation configuration.
//!
//! Defaults reproduce the walkthrough exactly. A JSON file named by
//! `FAMILYNET_CONFIG` can override any field; `FAMILYNET_LOG_FORMAT` overrides
//! the log format last.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use familynet_ledger::LedgerPolicy;
use familynet_observability::LogFormat;

pub const CONFIG_ENV: &str = "FAMILYNET_CONFIG";
pub const LOG_FORMAT_ENV: &str = "FAMILYNET_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub policy: LedgerPolicy,
    pub log_format: LogFormat,
    /// Text hashed with Smith's secret to produce the transfer code.
    pub code_seed: String,
    /// Fixed two-factor secrets (hex) by family name; others are random.
    pub secrets: BTreeMap<String, String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: LedgerPolicy::default(),
            log_format: LogFormat::Pretty,
            code_seed: "123456".to_string(),
            secrets: BTreeMap::new(),
        }
    }
}

impl SimConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.log_format = format
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("reading {LOG_FORMAT_ENV}"))?;
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
