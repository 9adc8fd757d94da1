use crate::reader::TableFormat;

/// Where an account identifier sits inside the export, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdCell {
    pub row: usize,
    pub column: usize,
    /// Label printed in front of the identifier, removed when present.
    pub strip_prefix: String,
}

/// Amount split across an inflow and an outflow column, dates as serial
/// day numbers, columns addressed by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalRules {
    /// Exact header row that precedes the transactions.
    pub header: Vec<String>,
    pub date_column: usize,
    pub inflow_column: usize,
    pub outflow_column: usize,
    pub description_column: usize,
    pub memo_column: usize,
    /// Column appended to the memo when `append_description_to_memo` is set.
    pub memo_suffix_column: usize,
    pub include_description_as_payee: bool,
    pub append_description_to_memo: bool,
    pub account_id_cell: Option<AccountIdCell>,
}

/// Single signed amount column, formatted date strings, columns addressed by
/// header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRules {
    pub date_column: String,
    pub amount_column: String,
    pub memo_column: String,
    /// `chrono` format string of the date column.
    pub date_format: String,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
}

impl NamedRules {
    /// Column names that must all appear in one row for the file to be
    /// recognized.
    pub fn signature(&self) -> [&str; 3] {
        [
            self.date_column.as_str(),
            self.amount_column.as_str(),
            self.memo_column.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRules {
    PositionalDualColumn(PositionalRules),
    NamedColumn(NamedRules),
}

impl RowRules {
    pub fn format(&self) -> TableFormat {
        match self {
            RowRules::PositionalDualColumn(_) => TableFormat::Spreadsheet,
            RowRules::NamedColumn(_) => TableFormat::HtmlTable,
        }
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

/// Toggles for the free-text "Descrizione" column of positional exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptionToggles {
    pub include_description_as_payee: bool,
    pub append_description_to_memo: bool,
}

/// Fineco `.xls` movements export.
pub fn fineco(toggles: DescriptionToggles) -> RowRules {
    RowRules::PositionalDualColumn(PositionalRules {
        header: [
            "Data Operazione",
            "Data Valuta",
            "Entrate",
            "Uscite",
            "Descrizione",
            "Descrizione Completa",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        date_column: 0,
        inflow_column: 2,
        outflow_column: 3,
        description_column: 4,
        memo_column: 5,
        // Appends the "Entrate" cell, not "Descrizione".
        memo_suffix_column: 2,
        include_description_as_payee: toggles.include_description_as_payee,
        append_description_to_memo: toggles.append_description_to_memo,
        account_id_cell: Some(AccountIdCell {
            row: 0,
            column: 0,
            strip_prefix: "Conto Corrente: ".to_string(),
        }),
    })
}

/// Webank movements export (an HTML table served as `.xls`).
pub fn webank() -> RowRules {
    RowRules::NamedColumn(NamedRules {
        date_column: "Data Contabile".to_string(),
        amount_column: "Importo".to_string(),
        memo_column: "Causale / Descrizione".to_string(),
        date_format: "%d/%m/%Y".to_string(),
        decimal_separator: ',',
        thousands_separator: Some('.'),
    })
}
