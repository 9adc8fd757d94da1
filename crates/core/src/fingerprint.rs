use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::money::Money;

/// Version tag hashed in front of every id. Bump it when the inputs change so
/// ledgers built from older ids can tell the two apart.
pub const TRANSACTION_ID_VERSION: &str = "v1";

const SEPARATOR: u8 = 0x1f;

/// Deterministic transaction id over (date, amount, memo).
///
/// Two economically identical entries on the same day produce the same id;
/// downstream dedup relies on exactly that.
pub fn transaction_id(date: NaiveDate, amount: Money, memo: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(TRANSACTION_ID_VERSION.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(amount.to_string().as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(memo.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    to_hex(&digest)
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
