use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::transaction::CanonicalTransaction;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown account type: '{0}'")]
pub struct UnknownAccountType(pub String);

/// OFX account types a bank statement can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
    MoneyMarket,
    CreditLine,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Checking => write!(f, "CHECKING"),
            AccountType::Savings => write!(f, "SAVINGS"),
            AccountType::MoneyMarket => write!(f, "MONEYMRKT"),
            AccountType::CreditLine => write!(f, "CREDITLINE"),
        }
    }
}

impl FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            "MONEYMRKT" => Ok(AccountType::MoneyMarket),
            "CREDITLINE" => Ok(AccountType::CreditLine),
            other => Err(UnknownAccountType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub bank_id: String,
    pub currency: String,
    pub account_id: String,
    pub account_type: AccountType,
    /// Export order, untouched. Not guaranteed to be chronological.
    pub transactions: Vec<CanonicalTransaction>,
}

impl Statement {
    /// Earliest and latest booking date, or `None` for an empty statement.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.transactions.first()?.date;
        Some(self.transactions.iter().fold((first, first), |(lo, hi), tx| {
            (lo.min(tx.date), hi.max(tx.date))
        }))
    }
}
