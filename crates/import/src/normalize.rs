use chrono::NaiveDate;
use conto_core::{AccountType, CanonicalTransaction, Money, Statement};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::cell::{cell_at, is_blank_row, Cell, RawRow};
use crate::reader::ReadError;
use crate::rules::{NamedRules, PositionalRules, RowRules};
use crate::serial_date;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Export not recognized: no row matches the expected header ({expected})")]
    UnrecognizedFormat { expected: String },
    #[error("Row {row}, column {column}: {reason}")]
    InvalidCell {
        row: usize,
        column: String,
        reason: String,
    },
    #[error("Failed to read export: {0}")]
    Read(#[from] ReadError),
}

/// Statement fields that cannot always be derived from the export itself.
#[derive(Debug, Clone)]
pub struct StatementDefaults {
    pub bank_id: String,
    pub currency: String,
    pub account_id: Option<String>,
    pub account_type: AccountType,
}

/// Map decoded rows onto canonical transactions, in export order.
///
/// The header signature is the only format check: when it is missing the
/// whole file is rejected. Any row after it that fails to decode aborts the
/// run rather than being dropped from the ledger.
pub fn normalize(rows: &[RawRow], rules: &RowRules) -> Result<Vec<CanonicalTransaction>, ParseError> {
    let transactions = match rules {
        RowRules::PositionalDualColumn(p) => normalize_positional(rows, p)?,
        RowRules::NamedColumn(n) => normalize_named(rows, n)?,
    };
    tracing::debug!(rows = rows.len(), transactions = transactions.len(), "normalized export");
    Ok(transactions)
}

/// Account identifier printed inside the export, for rules that define one.
pub fn extract_account_id(rows: &[RawRow], rules: &RowRules) -> Option<String> {
    let RowRules::PositionalDualColumn(p) = rules else {
        return None;
    };
    let spec = p.account_id_cell.as_ref()?;
    let text = rows.get(spec.row).map(|r| render(cell_at(r, spec.column)))?;
    let id = text.strip_prefix(spec.strip_prefix.as_str()).unwrap_or(text.as_str()).trim();
    (!id.is_empty()).then(|| id.to_string())
}

pub fn build_statement(
    rows: &[RawRow],
    rules: &RowRules,
    defaults: &StatementDefaults,
) -> Result<Statement, ParseError> {
    let transactions = normalize(rows, rules)?;
    let account_id = extract_account_id(rows, rules)
        .or_else(|| defaults.account_id.clone())
        .unwrap_or_default();

    Ok(Statement {
        bank_id: defaults.bank_id.clone(),
        currency: defaults.currency.clone(),
        account_id,
        account_type: defaults.account_type,
        transactions,
    })
}

// ── Positional, dual amount column ────────────────────────────────────────────

fn normalize_positional(
    rows: &[RawRow],
    rules: &PositionalRules,
) -> Result<Vec<CanonicalTransaction>, ParseError> {
    let header_idx = rows
        .iter()
        .position(|row| matches_header(row, &rules.header))
        .ok_or_else(|| ParseError::UnrecognizedFormat {
            expected: rules.header.join(" | "),
        })?;

    let mut transactions = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        // Spacer and footer rows carry no booking date.
        if cell_at(row, rules.date_column).is_empty() {
            continue;
        }
        transactions.push(positional_transaction(idx + 1, row, rules)?);
    }
    Ok(transactions)
}

fn matches_header(row: &[Cell], header: &[String]) -> bool {
    let named = header
        .iter()
        .enumerate()
        .all(|(i, expected)| cell_at(row, i).as_str() == Some(expected.as_str()));
    named && row.iter().skip(header.len()).all(Cell::is_empty)
}

fn positional_transaction(
    line: usize,
    row: &[Cell],
    rules: &PositionalRules,
) -> Result<CanonicalTransaction, ParseError> {
    let invalid = |column: usize, reason: String| ParseError::InvalidCell {
        row: line,
        column: column.to_string(),
        reason,
    };

    let date_cell = cell_at(row, rules.date_column);
    let serial = match date_cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(rules.date_column, format!("expected a serial date, got '{s}'")))?,
        Cell::Empty => return Err(invalid(rules.date_column, "missing date".to_string())),
    };
    let date = serial_date::decode(serial).map_err(|e| invalid(rules.date_column, e.to_string()))?;

    let inflow = optional_amount(cell_at(row, rules.inflow_column), '.', None)
        .map_err(|reason| invalid(rules.inflow_column, reason))?;
    let outflow = optional_amount(cell_at(row, rules.outflow_column), '.', None)
        .map_err(|reason| invalid(rules.outflow_column, reason))?;
    // A zero in the unused column counts as empty.
    let amount = match (inflow.filter(|m| !m.is_zero()), outflow.filter(|m| !m.is_zero())) {
        (Some(inflow), None) => inflow,
        (None, Some(outflow)) => -outflow,
        (None, None) => {
            return Err(invalid(
                rules.inflow_column,
                "neither inflow nor outflow is populated".to_string(),
            ))
        }
        (Some(inflow), Some(outflow)) => {
            return Err(invalid(
                rules.outflow_column,
                format!("both inflow {inflow} and outflow {outflow} are populated"),
            ))
        }
    };

    let payee = if rules.include_description_as_payee {
        Some(render(cell_at(row, rules.description_column))).filter(|s| !s.is_empty())
    } else {
        None
    };

    let mut memo = render(cell_at(row, rules.memo_column));
    if rules.append_description_to_memo {
        let suffix = render(cell_at(row, rules.memo_suffix_column));
        if !memo.is_empty() && !suffix.is_empty() {
            memo.push_str(" - ");
        }
        memo.push_str(&suffix);
    }

    Ok(CanonicalTransaction::new(date, amount, payee, memo))
}

// ── Named columns, single signed amount ───────────────────────────────────────

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct HeaderMap {
    date: usize,
    amount: usize,
    memo: usize,
}

impl HeaderMap {
    fn locate(row: &[Cell], rules: &NamedRules) -> Option<Self> {
        let find = |name: &str| row.iter().position(|c| c.as_str() == Some(name));
        Some(HeaderMap {
            date: find(rules.date_column.as_str())?,
            amount: find(rules.amount_column.as_str())?,
            memo: find(rules.memo_column.as_str())?,
        })
    }
}

fn normalize_named(rows: &[RawRow], rules: &NamedRules) -> Result<Vec<CanonicalTransaction>, ParseError> {
    let (header_idx, columns) = rows
        .iter()
        .enumerate()
        .find_map(|(idx, row)| HeaderMap::locate(row, rules).map(|m| (idx, m)))
        .ok_or_else(|| ParseError::UnrecognizedFormat {
            expected: rules.signature().join(" | "),
        })?;

    let mut transactions = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if is_blank_row(row) {
            continue;
        }
        transactions.push(named_transaction(idx + 1, row, columns, rules)?);
    }
    Ok(transactions)
}

fn named_transaction(
    line: usize,
    row: &[Cell],
    columns: HeaderMap,
    rules: &NamedRules,
) -> Result<CanonicalTransaction, ParseError> {
    let invalid = |column: &str, reason: String| ParseError::InvalidCell {
        row: line,
        column: column.to_string(),
        reason,
    };

    let date = match cell_at(row, columns.date) {
        Cell::Text(s) => NaiveDate::parse_from_str(s.trim(), &rules.date_format).map_err(|_| {
            invalid(
                &rules.date_column,
                format!("'{s}' does not match {}", rules.date_format),
            )
        })?,
        other => {
            return Err(invalid(
                &rules.date_column,
                format!("expected a formatted date, got '{other}'"),
            ))
        }
    };

    let amount = optional_amount(
        cell_at(row, columns.amount),
        rules.decimal_separator,
        rules.thousands_separator,
    )
    .map_err(|reason| invalid(&rules.amount_column, reason))?
    .ok_or_else(|| invalid(&rules.amount_column, "missing amount".to_string()))?;

    let memo = render(cell_at(row, columns.memo));

    Ok(CanonicalTransaction::new(date, amount, None, memo))
}

// ── Cell decoding ─────────────────────────────────────────────────────────────

/// Text of a cell as it should appear in a memo or payee. Numbers print as
/// amounts (`150.00`).
fn render(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.trim().to_string(),
        Cell::Number(n) => match Decimal::from_f64(*n) {
            Some(d) => Money::from_decimal(d).to_string(),
            None => n.to_string(),
        },
    }
}

fn optional_amount(
    cell: &Cell,
    decimal_separator: char,
    thousands_separator: Option<char>,
) -> Result<Option<Money>, String> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) => Decimal::from_f64(*n)
            .map(|d| Some(Money::from_decimal(d)))
            .ok_or_else(|| format!("'{n}' is not a valid amount")),
        Cell::Text(s) if s.trim().is_empty() => Ok(None),
        Cell::Text(s) => parse_amount(s, decimal_separator, thousands_separator)
            .map(|d| Some(Money::from_decimal(d)))
            .ok_or_else(|| format!("'{}' is not a valid amount", s.trim())),
    }
}

fn parse_amount(s: &str, decimal_separator: char, thousands_separator: Option<char>) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€' && Some(*c) != thousands_separator)
        .map(|c| match c {
            '\u{2212}' => '-',
            c if c == decimal_separator => '.',
            c => c,
        })
        .collect();
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{fineco, webank, DescriptionToggles};
    use conto_core::Direction;

    fn text(s: &str) -> Cell {
        Cell::text(s)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fineco_header() -> RawRow {
        [
            "Data Operazione",
            "Data Valuta",
            "Entrate",
            "Uscite",
            "Descrizione",
            "Descrizione Completa",
        ]
        .into_iter()
        .map(text)
        .collect()
    }

    fn fineco_export(rows: Vec<RawRow>) -> Vec<RawRow> {
        let mut out = vec![
            vec![text("Conto Corrente: 1234567")],
            vec![text("Intestazione: Mario Rossi")],
            vec![],
            fineco_header(),
        ];
        out.extend(rows);
        out
    }

    fn both_toggles() -> RowRules {
        fineco(DescriptionToggles {
            include_description_as_payee: true,
            append_description_to_memo: true,
        })
    }

    fn webank_export(rows: Vec<RawRow>) -> Vec<RawRow> {
        let mut out = vec![vec![
            text("Data Contabile"),
            text("Data Valuta"),
            text("Importo"),
            text("Divisa"),
            text("Causale / Descrizione"),
        ]];
        out.extend(rows);
        out
    }

    // ── positional ────────────────────────────────────────────────────────────

    #[test]
    fn salary_row_with_both_toggles() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44197.0),
            Cell::Empty,
            Cell::Number(150.00),
            Cell::Empty,
            text("Salary"),
            text("Monthly salary"),
        ]]);
        let txs = normalize(&rows, &both_toggles()).unwrap();
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.date, date(2021, 1, 1));
        assert_eq!(tx.amount, Money::from_cents(15000));
        assert_eq!(tx.direction, Direction::Credit);
        assert_eq!(tx.payee.as_deref(), Some("Salary"));
        assert_eq!(tx.memo, "Monthly salary - 150.00");
    }

    #[test]
    fn outflow_only_row_is_negative_debit() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Number(29.99),
            text("Pagamento POS"),
            text("Supermercato"),
        ]]);
        let txs = normalize(&rows, &fineco(DescriptionToggles::default())).unwrap();
        assert_eq!(txs[0].amount, Money::from_cents(-2999));
        assert_eq!(txs[0].direction, Direction::Debit);
        assert_eq!(txs[0].payee, None);
        assert_eq!(txs[0].memo, "Supermercato");
    }

    #[test]
    fn inflow_only_row_is_positive_credit() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Number(10.5),
            Cell::Empty,
            text("Bonifico"),
            text("Rimborso"),
        ]]);
        let txs = normalize(&rows, &fineco(DescriptionToggles::default())).unwrap();
        assert!(!txs[0].amount.is_negative());
        assert_eq!(txs[0].direction, Direction::Credit);
    }

    #[test]
    fn memo_suffix_without_memo_has_no_separator() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Number(5.0),
            Cell::Empty,
            text("Interessi"),
            Cell::Empty,
        ]]);
        let txs = normalize(&rows, &both_toggles()).unwrap();
        assert_eq!(txs[0].memo, "5.00");
    }

    #[test]
    fn memo_suffix_empty_leaves_memo_alone() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Empty,
            Cell::Number(12.0),
            text("Canone"),
            text("Canone mensile"),
        ]]);
        let txs = normalize(&rows, &both_toggles()).unwrap();
        assert_eq!(txs[0].memo, "Canone mensile");
    }

    #[test]
    fn rows_without_date_are_skipped() {
        let row = |serial: f64| {
            vec![
                Cell::Number(serial),
                Cell::Empty,
                Cell::Number(1.0),
                Cell::Empty,
                text("x"),
                text("y"),
            ]
        };
        let rows = fineco_export(vec![row(44300.0), vec![Cell::Empty, text("Saldo")], row(44299.0)]);
        let txs = normalize(&rows, &fineco(DescriptionToggles::default())).unwrap();
        assert_eq!(txs.len(), 2);
    }

    #[test]
    fn output_keeps_export_order() {
        let row = |serial: f64| {
            vec![
                Cell::Number(serial),
                Cell::Empty,
                Cell::Number(1.0),
                Cell::Empty,
                Cell::Empty,
                text("m"),
            ]
        };
        let rows = fineco_export(vec![row(44300.0), row(44100.0), row(44200.0)]);
        let dates: Vec<_> = normalize(&rows, &fineco(DescriptionToggles::default()))
            .unwrap()
            .into_iter()
            .map(|t| t.date)
            .collect();
        assert_eq!(
            dates,
            vec![
                serial_date::decode(44300.0).unwrap(),
                serial_date::decode(44100.0).unwrap(),
                serial_date::decode(44200.0).unwrap(),
            ]
        );
    }

    #[test]
    fn row_without_any_amount_aborts() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            text("?"),
            text("?"),
        ]]);
        let result = normalize(&rows, &fineco(DescriptionToggles::default()));
        assert!(matches!(result, Err(ParseError::InvalidCell { row: 5, .. })));
    }

    #[test]
    fn row_with_inflow_and_outflow_aborts() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Number(100.0),
            Cell::Number(30.0),
            text("?"),
            text("?"),
        ]]);
        let result = normalize(&rows, &fineco(DescriptionToggles::default()));
        assert!(matches!(
            result,
            Err(ParseError::InvalidCell { row: 5, ref column, .. }) if column == "3"
        ));
    }

    #[test]
    fn zero_in_unused_column_is_ignored() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            Cell::Number(0.0),
            Cell::Number(30.0),
            text("?"),
            text("Pagamento"),
        ]]);
        let txs = normalize(&rows, &fineco(DescriptionToggles::default())).unwrap();
        assert_eq!(txs[0].amount, Money::from_cents(-3000));
    }

    #[test]
    fn malformed_amount_aborts() {
        let rows = fineco_export(vec![vec![
            Cell::Number(44200.0),
            Cell::Empty,
            text("abc"),
            Cell::Empty,
            text("?"),
            text("?"),
        ]]);
        assert!(normalize(&rows, &both_toggles()).is_err());
    }

    #[test]
    fn missing_positional_header_is_unrecognized() {
        let rows = vec![
            vec![text("Conto Corrente: 1234567")],
            vec![Cell::Number(44197.0), Cell::Empty, Cell::Number(1.0)],
        ];
        let result = normalize(&rows, &both_toggles());
        assert!(matches!(result, Err(ParseError::UnrecognizedFormat { .. })));
    }

    #[test]
    fn header_with_extra_column_is_unrecognized() {
        let mut header = fineco_header();
        header.push(text("Categoria"));
        let rows = vec![header];
        assert!(matches!(
            normalize(&rows, &both_toggles()),
            Err(ParseError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn account_id_from_header_cell() {
        let rows = fineco_export(vec![]);
        assert_eq!(extract_account_id(&rows, &both_toggles()).as_deref(), Some("1234567"));
        assert_eq!(extract_account_id(&rows, &webank()), None);
    }

    #[test]
    fn normalize_twice_yields_identical_ids() {
        let rows = fineco_export(vec![
            vec![
                Cell::Number(44197.0),
                Cell::Empty,
                Cell::Number(150.0),
                Cell::Empty,
                text("Salary"),
                text("Monthly salary"),
            ],
            vec![
                Cell::Number(44198.0),
                Cell::Empty,
                Cell::Empty,
                Cell::Number(3.2),
                text("Bar"),
                text("Caffe"),
            ],
        ]);
        let ids = |rows: &[RawRow]| -> Vec<String> {
            normalize(rows, &both_toggles()).unwrap().into_iter().map(|t| t.id).collect()
        };
        assert_eq!(ids(&rows), ids(&rows));
    }

    // ── named ─────────────────────────────────────────────────────────────────

    #[test]
    fn named_row_with_null_memo() {
        let rows = webank_export(vec![vec![
            text("15/03/2022"),
            text("15/03/2022"),
            Cell::Number(-42.50),
            text("EUR"),
            Cell::Empty,
        ]]);
        let txs = normalize(&rows, &webank()).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].date, date(2022, 3, 15));
        assert_eq!(txs[0].amount, Money::from_cents(-4250));
        assert_eq!(txs[0].direction, Direction::Debit);
        assert_eq!(txs[0].memo, "");
        assert_eq!(txs[0].payee, None);
    }

    #[test]
    fn named_text_amount_uses_italian_separators() {
        let rows = webank_export(vec![vec![
            text("01/04/2022"),
            text("01/04/2022"),
            text("1.234,56"),
            text("EUR"),
            text("STIPENDIO"),
        ]]);
        let txs = normalize(&rows, &webank()).unwrap();
        assert_eq!(txs[0].amount, Money::from_cents(123456));
        assert_eq!(txs[0].memo, "STIPENDIO");
    }

    #[test]
    fn named_columns_resolved_by_name_not_position() {
        let rows = vec![
            vec![text("Causale / Descrizione"), text("Importo"), text("Data Contabile")],
            vec![text("PRELIEVO"), text("-50,00"), text("02/05/2022")],
        ];
        let txs = normalize(&rows, &webank()).unwrap();
        assert_eq!(txs[0].date, date(2022, 5, 2));
        assert_eq!(txs[0].amount, Money::from_cents(-5000));
        assert_eq!(txs[0].memo, "PRELIEVO");
    }

    #[test]
    fn named_bad_date_aborts() {
        let rows = webank_export(vec![vec![
            text("2022-03-15"),
            Cell::Empty,
            Cell::Number(1.0),
            Cell::Empty,
            Cell::Empty,
        ]]);
        assert!(matches!(
            normalize(&rows, &webank()),
            Err(ParseError::InvalidCell { row: 2, .. })
        ));
    }

    #[test]
    fn named_missing_signature_is_unrecognized() {
        let rows = vec![
            vec![text("Data"), text("Importo"), text("Descrizione")],
            vec![text("15/03/2022"), Cell::Number(-1.0), Cell::Empty],
        ];
        let result = normalize(&rows, &webank());
        assert!(matches!(result, Err(ParseError::UnrecognizedFormat { .. })));
    }

    // ── statement assembly ────────────────────────────────────────────────────

    fn defaults(account_id: Option<&str>) -> StatementDefaults {
        StatementDefaults {
            bank_id: "Webank".to_string(),
            currency: "EUR".to_string(),
            account_id: account_id.map(String::from),
            account_type: AccountType::Checking,
        }
    }

    #[test]
    fn statement_prefers_account_id_from_file() {
        let rows = fineco_export(vec![]);
        let stmt = build_statement(&rows, &both_toggles(), &defaults(Some("configured"))).unwrap();
        assert_eq!(stmt.account_id, "1234567");
    }

    #[test]
    fn statement_falls_back_to_configured_account_id() {
        let rows = webank_export(vec![]);
        let stmt = build_statement(&rows, &webank(), &defaults(Some("00000 - 0000000000"))).unwrap();
        assert_eq!(stmt.account_id, "00000 - 0000000000");
        assert_eq!(stmt.currency, "EUR");
        assert!(stmt.transactions.is_empty());
    }

    #[test]
    fn statement_rejects_unrecognized_file_without_transactions() {
        let rows = vec![vec![text("Sessione scaduta")]];
        assert!(matches!(
            build_statement(&rows, &webank(), &defaults(None)),
            Err(ParseError::UnrecognizedFormat { .. })
        ));
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_variants() {
        assert_eq!(parse_amount("-42,50", ',', Some('.')), Decimal::from_str("-42.50").ok());
        assert_eq!(parse_amount("€ 1.000,00", ',', Some('.')), Decimal::from_str("1000.00").ok());
        assert_eq!(parse_amount("\u{2212}3,10", ',', Some('.')), Decimal::from_str("-3.10").ok());
        assert_eq!(parse_amount("12.5", '.', None), Decimal::from_str("12.5").ok());
        assert_eq!(parse_amount("n/a", ',', Some('.')), None);
    }

    #[test]
    fn render_numbers_as_amounts() {
        assert_eq!(render(&Cell::Number(150.0)), "150.00");
        assert_eq!(render(&Cell::Empty), "");
        assert_eq!(render(&text("  Bar ")), "Bar");
    }
}
