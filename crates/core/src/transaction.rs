use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::transaction_id;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    /// Zero counts as a credit: only strictly negative amounts are debits.
    pub fn of(amount: Money) -> Self {
        if amount.is_negative() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Debit => write!(f, "DEBIT"),
            Direction::Credit => write!(f, "CREDIT"),
        }
    }
}

/// Bank-agnostic ledger entry produced by the normalization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub date: NaiveDate,
    pub amount: Money,
    pub direction: Direction,
    pub payee: Option<String>,
    pub memo: String,
    pub id: String,
}

impl CanonicalTransaction {
    /// Derives `direction` from the sign of `amount` and `id` from
    /// (date, amount, memo).
    pub fn new(date: NaiveDate, amount: Money, payee: Option<String>, memo: String) -> Self {
        let id = transaction_id(date, amount, &memo);
        CanonicalTransaction {
            date,
            amount,
            direction: Direction::of(amount),
            payee,
            memo,
            id,
        }
    }
}
