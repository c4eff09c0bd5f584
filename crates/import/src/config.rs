use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Per-type bucket for rows nothing else categorizes.
    pub default_category: String,
    /// Institution name used when a file does not identify its bank.
    pub unknown_institution: String,
    pub credit_card_closing_day: u8,
    pub credit_card_due_day: u8,
    /// When false, files imported without an explicit account stay unlinked.
    pub resolve_accounts: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_category: "Outros".to_string(),
            unknown_institution: "Banco Desconhecido".to_string(),
            credit_card_closing_day: 10,
            credit_card_due_day: 15,
            resolve_accounts: true,
        }
    }
}

impl ImportConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}
