// Bulk data files: zip extraction, CSV parsing and cell type coercion.
//
// The daily dumps are zipped CSV files whose cells are all strings. Cells are
// coerced once here (empty -> null, numeric-looking -> number) so the typed
// row converters only deal with `Cell` values.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::UpstreamError;

/// A coerced CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Coerce a raw CSV value.
    pub fn coerce(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        // Only plain decimals; "inf"/"nan" stay text.
        let looks_decimal = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
            && trimmed.chars().any(|c| c.is_ascii_digit());
        if looks_decimal {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return Cell::Float(f);
                }
            }
        }
        Cell::Text(trimmed.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

/// A parsed CSV file with a header row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Parse CSV text (RFC 4180 quoting, CRLF or LF line endings).
    pub fn parse(text: &str) -> Table {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = split_records(text).into_iter();

        let columns = match records.next() {
            Some(header) => header
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name.trim().to_ascii_lowercase(), i))
                .collect(),
            None => HashMap::new(),
        };

        let rows = records
            .filter(|fields| !(fields.len() == 1 && fields[0].trim().is_empty()))
            .map(|fields| fields.iter().map(|f| Cell::coerce(f)).collect())
            .collect();

        Table { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            columns: &self.columns,
            cells,
        })
    }
}

/// A borrowed view of one CSV row, addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a HashMap<String, usize>,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn cell(&self, column: &str) -> &'a Cell {
        static NULL: Cell = Cell::Null;
        self.columns
            .get(column)
            .and_then(|&i| self.cells.get(i))
            .unwrap_or(&NULL)
    }

    /// First non-null cell among several column aliases.
    pub fn first_of(&self, columns: &[&str]) -> &'a Cell {
        columns
            .iter()
            .map(|c| self.cell(c))
            .find(|c| **c != Cell::Null)
            .unwrap_or_else(|| self.cell(columns[0]))
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.cell(column).as_i64()
    }

    pub fn float(&self, column: &str) -> Option<f64> {
        self.cell(column).as_f64()
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.cell(column).as_text()
    }

    /// Non-negative integer, defaulting to zero when absent or negative.
    pub fn count(&self, column: &str) -> u64 {
        self.int(column).unwrap_or(0).max(0) as u64
    }

    pub fn timestamp(&self, columns: &[&str]) -> Option<DateTime<Utc>> {
        let raw = self.first_of(columns).as_text()?;
        parse_timestamp(&raw)
    }
}

/// Parse the timestamp formats seen in the dumps and the GraphQL API.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Extract the first file of a zip archive as UTF-8 text.
pub fn extract_first_entry(bytes: &[u8]) -> Result<String, UpstreamError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| UpstreamError::Archive(e.to_string()))?;
    if archive.is_empty() {
        return Err(UpstreamError::Archive("archive has no entries".into()));
    }
    let mut entry = archive
        .by_index(0)
        .map_err(|e| UpstreamError::Archive(e.to_string()))?;
    let mut raw = Vec::new();
    entry
        .read_to_end(&mut raw)
        .map_err(|e| UpstreamError::Archive(e.to_string()))?;
    String::from_utf8(raw).map_err(|e| UpstreamError::Decode(e.to_string()))
}

fn split_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
