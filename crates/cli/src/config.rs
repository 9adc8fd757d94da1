use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use conto_core::{AccountType, UnknownAccountType};
use conto_import::rules::DescriptionToggles;
use conto_import::{RowRules, StatementDefaults};

use crate::bank::Bank;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No profile named '{0}' in config")]
    UnknownProfile(String),
    #[error(transparent)]
    AccountType(#[from] UnknownAccountType),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

/// Profiles file: one TOML table per bank account.
///
/// ```toml
/// [conto-fineco]
/// bank = "fineco"
/// secret_profile = "bank/fineco"
/// include_description_as_payee = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Config {
    profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(alias = "plugin")]
    pub bank: Bank,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_account_type")]
    pub account_type: String,
    #[serde(default)]
    pub account_id: Option<String>,
    /// Password-store entry holding the portal credentials.
    #[serde(default, alias = "zx2c4")]
    pub secret_profile: Option<String>,
    #[serde(default, alias = "info2name")]
    pub include_description_as_payee: bool,
    #[serde(default, alias = "info2memo")]
    pub append_description_to_memo: bool,
    #[serde(default)]
    pub bank_id: Option<String>,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_account_type() -> String {
    "CHECKING".to_string()
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// `<config_dir>/conto/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = directories::ProjectDirs::from("", "", "conto").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

impl Profile {
    pub fn rules(&self) -> RowRules {
        self.bank.rules(DescriptionToggles {
            include_description_as_payee: self.include_description_as_payee,
            append_description_to_memo: self.append_description_to_memo,
        })
    }

    /// Configured values, falling back to the bank's own defaults. An account
    /// id printed in the export still takes precedence over these.
    pub fn statement_defaults(&self) -> Result<StatementDefaults, ConfigError> {
        Ok(StatementDefaults {
            bank_id: self
                .bank_id
                .clone()
                .unwrap_or_else(|| self.bank.default_bank_id().to_string()),
            currency: self.currency.clone(),
            account_id: self
                .account_id
                .clone()
                .or_else(|| self.bank.default_account_id().map(str::to_string)),
            account_type: self.account_type.parse::<AccountType>()?,
        })
    }
}
