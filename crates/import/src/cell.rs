use std::fmt;

/// A weakly typed cell as handed over by a [`TabularReader`](crate::reader::TabularReader).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

/// One decoded row, in column order.
pub type RawRow = Vec<Cell>;

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed text content; `None` for numbers and blanks.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

pub(crate) fn cell_at(row: &[Cell], column: usize) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    row.get(column).unwrap_or(EMPTY)
}

pub(crate) fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_empty)
}
