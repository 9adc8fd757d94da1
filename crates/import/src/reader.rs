use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::cell::{Cell, RawRow};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Workbook has no sheets")]
    NoSheet,
    #[error("Document has no table")]
    NoTable,
}

/// Abstraction over file decoders. Implementations return every row of the
/// first sheet/table in document order, header rows included.
pub trait TabularReader {
    fn decode(&self, path: &Path) -> Result<Vec<RawRow>, ReadError>;
}

/// Encoding a portal uses for its export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Spreadsheet,
    HtmlTable,
}

impl TableFormat {
    pub fn reader(self) -> Box<dyn TabularReader> {
        match self {
            TableFormat::Spreadsheet => Box::new(SpreadsheetReader),
            TableFormat::HtmlTable => Box::new(HtmlTableReader),
        }
    }
}

// ── Spreadsheet (xls / xlsx / ods) ────────────────────────────────────────────

pub struct SpreadsheetReader;

impl TabularReader for SpreadsheetReader {
    fn decode(&self, path: &Path) -> Result<Vec<RawRow>, ReadError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or(ReadError::NoSheet)??;

        Ok(absolute_rows(range.start().unwrap_or((0, 0)), range.rows()))
    }
}

/// The range starts at the first used cell; pad so that positions stay
/// absolute, (0, 0) being the top-left cell of the sheet.
fn absolute_rows<'a>(start: (u32, u32), used: impl Iterator<Item = &'a [Data]>) -> Vec<RawRow> {
    let (row_offset, col_offset) = start;
    let mut rows: Vec<RawRow> = (0..row_offset).map(|_| Vec::new()).collect();
    for row in used {
        let mut cells: RawRow = vec![Cell::Empty; col_offset as usize];
        cells.extend(row.iter().map(spreadsheet_cell));
        rows.push(cells);
    }
    rows
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        // Date-formatted cells are still serial day counts underneath.
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

// ── HTML table ────────────────────────────────────────────────────────────────

pub struct HtmlTableReader;

impl HtmlTableReader {
    pub fn decode_str(&self, html: &str) -> Result<Vec<RawRow>, ReadError> {
        let doc = Html::parse_document(html);
        let table = doc.select(table_selector()).next().ok_or(ReadError::NoTable)?;

        let rows = table
            .select(tr_selector())
            .map(|tr| {
                tr.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| {
                        let name = cell.value().name();
                        name.eq_ignore_ascii_case("td") || name.eq_ignore_ascii_case("th")
                    })
                    .map(|cell| Cell::text(collapse_whitespace(&cell.text().collect::<String>())))
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

impl HtmlTableReader {
    /// Decode raw file bytes in the charset they declare. Undeclared
    /// documents are UTF-8 when valid, Windows-1252 otherwise.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<RawRow>, ReadError> {
        let (text, encoding, _) = sniff_encoding(bytes).decode(bytes);
        tracing::debug!(encoding = encoding.name(), "decoding HTML export");
        self.decode_str(&text)
    }
}

impl TabularReader for HtmlTableReader {
    fn decode(&self, path: &Path) -> Result<Vec<RawRow>, ReadError> {
        let bytes = std::fs::read(path)?;
        self.decode_bytes(&bytes)
    }
}

fn sniff_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if let Some(encoding) = declared_charset(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        WINDOWS_1252
    }
}

/// `charset=` from a `<meta>` tag in the first kilobyte.
fn declared_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(1024)];
    let lower = head.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = find(&lower[from..], b"charset") {
        let mut i = from + pos + b"charset".len();
        from = i;
        while lower.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        if lower.get(i) != Some(&b'=') {
            continue;
        }
        i += 1;
        while lower
            .get(i)
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'"' || *b == b'\'')
        {
            i += 1;
        }
        let end = lower[i..]
            .iter()
            .position(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')))
            .map_or(lower.len(), |n| i + n);
        if let Some(encoding) = Encoding::for_label(&lower[i..end]) {
            return Some(encoding);
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn table_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("table").expect("invalid table selector"))
}

fn tr_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("tr").expect("invalid tr selector"))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = r#"
<html><body>
<table>
  <thead>
    <tr><th>Data Contabile</th><th>Data Valuta</th><th>Importo</th><th>Divisa</th><th>Causale / Descrizione</th></tr>
  </thead>
  <tbody>
    <tr><td>15/03/2022</td><td>15/03/2022</td><td>-42,50</td><td>EUR</td><td></td></tr>
    <tr><td>14/03/2022</td><td>14/03/2022</td><td>1.234,56</td><td>EUR</td><td>STIPENDIO
        MARZO</td></tr>
  </tbody>
</table>
<table><tr><td>ignored</td></tr></table>
</body></html>
"#;

    #[test]
    fn html_reader_reads_first_table_only() {
        let rows = HtmlTableReader.decode_str(EXPORT).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Cell::Text("Data Contabile".into()));
        assert_eq!(rows[1][2], Cell::Text("-42,50".into()));
    }

    #[test]
    fn html_reader_maps_blank_cells_to_empty() {
        let rows = HtmlTableReader.decode_str(EXPORT).unwrap();
        assert_eq!(rows[1][4], Cell::Empty);
    }

    #[test]
    fn html_reader_collapses_whitespace() {
        let rows = HtmlTableReader.decode_str(EXPORT).unwrap();
        assert_eq!(rows[2][4], Cell::Text("STIPENDIO MARZO".into()));
    }

    #[test]
    fn html_reader_without_table_errors() {
        let result = HtmlTableReader.decode_str("<html><body><p>Sessione scaduta</p></body></html>");
        assert!(matches!(result, Err(ReadError::NoTable)));
    }

    #[test]
    fn html_reader_decodes_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();
        let rows = TableFormat::HtmlTable.reader().decode(file.path()).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn html_reader_falls_back_to_windows_1252() {
        let bytes = b"<table><tr><td>Caff\xE8 \x80</td></tr></table>";
        let rows = HtmlTableReader.decode_bytes(bytes).unwrap();
        assert_eq!(rows[0][0], Cell::Text("Caff\u{e8} \u{20ac}".into()));
    }

    #[test]
    fn html_reader_honors_meta_charset() {
        let mut bytes = br#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-15"></head>"#.to_vec();
        bytes.extend_from_slice(b"<body><table><tr><td>\xA4 5</td></tr></table></body></html>");
        let rows = HtmlTableReader.decode_bytes(&bytes).unwrap();
        assert_eq!(rows[0][0], Cell::Text("\u{20ac} 5".into()));
    }

    #[test]
    fn html_reader_keeps_utf8() {
        let undeclared = "<table><tr><td>Caffè €</td></tr></table>";
        let rows = HtmlTableReader.decode_bytes(undeclared.as_bytes()).unwrap();
        assert_eq!(rows[0][0], Cell::Text("Caffè €".into()));

        let declared = "<meta charset='utf-8'><table><tr><td>Caffè</td></tr></table>";
        let rows = HtmlTableReader.decode_bytes(declared.as_bytes()).unwrap();
        assert_eq!(rows[0][0], Cell::Text("Caffè".into()));
    }

    #[test]
    fn html_reader_bom_wins_over_declaration() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<meta charset=windows-1252><table><tr><td>è</td></tr></table>".as_bytes());
        let rows = HtmlTableReader.decode_bytes(&bytes).unwrap();
        assert_eq!(rows[0][0], Cell::Text("è".into()));
    }

    #[test]
    fn spreadsheet_rows_are_padded_to_sheet_origin() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/offset_b2.xlsx");
        let rows = SpreadsheetReader.decode(&path).unwrap();

        assert!(rows[0].is_empty());
        assert_eq!(rows[1][0], Cell::Empty);
        assert_eq!(rows[1][1], Cell::Text("Conto Corrente: 1234567".into()));
        assert_eq!(rows[2][1], Cell::Empty);
        assert_eq!(rows[2][2], Cell::Number(44197.0));
        assert_eq!(rows[2][3], Cell::Text("Bonifico".into()));
    }

    #[test]
    fn absolute_rows_pads_leading_rows_and_columns() {
        let used = [
            vec![Data::String("x".into()), Data::Empty],
            vec![Data::Empty, Data::Float(1.5)],
        ];
        let rows = absolute_rows((2, 1), used.iter().map(Vec::as_slice));
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty() && rows[1].is_empty());
        assert_eq!(rows[2], vec![Cell::Empty, Cell::Text("x".into()), Cell::Empty]);
        assert_eq!(rows[3][2], Cell::Number(1.5));
    }

    #[test]
    fn spreadsheet_reader_rejects_non_workbook() {
        let mut file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        file.write_all(b"<html>not a workbook</html>").unwrap();
        assert!(SpreadsheetReader.decode(file.path()).is_err());
    }
}
