pub mod cell;
pub mod normalize;
pub mod ofx;
pub mod reader;
pub mod rules;
pub mod serial_date;

pub use cell::{Cell, RawRow};
pub use normalize::{build_statement, extract_account_id, normalize, ParseError, StatementDefaults};
pub use reader::{HtmlTableReader, ReadError, SpreadsheetReader, TableFormat, TabularReader};
pub use rules::{DescriptionToggles, NamedRules, PositionalRules, RowRules};

pub mod import {
    use crate::*;
    use conto_core::Statement;
    use std::path::Path;

    /// Decode an export with the reader its rules call for and assemble the
    /// statement.
    pub fn read_statement(
        path: &Path,
        rules: &RowRules,
        defaults: &StatementDefaults,
    ) -> Result<Statement, ParseError> {
        let rows = rules.format().reader().decode(path)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "decoded export");
        build_statement(&rows, rules, defaults)
    }
}
