pub mod fingerprint;
pub mod money;
pub mod period;
pub mod statement;
pub mod transaction;

pub use money::Money;
pub use period::{DateRange, RangeError};
pub use statement::{AccountType, Statement, UnknownAccountType};
pub use transaction::{CanonicalTransaction, Direction};
