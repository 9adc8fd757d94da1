use serde::Deserialize;
use std::fmt;

use conto_import::rules::{self, DescriptionToggles};
use conto_import::RowRules;
use conto_portal::{banks, PortalAdapter};

/// A supported bank: its portal handshake paired with the layout of its
/// export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    Fineco,
    Webank,
}

impl Bank {
    pub fn portal(self) -> PortalAdapter {
        match self {
            Bank::Fineco => banks::fineco(),
            Bank::Webank => banks::webank(),
        }
    }

    pub fn rules(self, toggles: DescriptionToggles) -> RowRules {
        match self {
            Bank::Fineco => rules::fineco(toggles),
            // The HTML export has no free-text column to toggle.
            Bank::Webank => rules::webank(),
        }
    }

    pub fn default_bank_id(self) -> &'static str {
        match self {
            Bank::Fineco => "Fineco",
            Bank::Webank => "Webank",
        }
    }

    /// Used when neither the export nor the profile names the account.
    pub fn default_account_id(self) -> Option<&'static str> {
        match self {
            Bank::Fineco => None,
            Bank::Webank => Some("00000 - 0000000000"),
        }
    }

    /// Suggested file extension for a raw export.
    pub fn export_extension(self) -> &'static str {
        match self {
            Bank::Fineco => "xls",
            Bank::Webank => "html",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_bank_id())
    }
}
