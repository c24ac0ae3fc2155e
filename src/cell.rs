//! Cell values and column access for tabular input.
//!
//! The spreadsheet layer hands over columns of loosely typed cells. Nothing in
//! this crate mutates them; the pipeline only reads and classifies.

use std::fmt;

/// A single cell taken from an input column.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    /// Classifies a raw CSV field: empty is `Null`, numeric is `Number`.
    pub fn parse_field(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<&str>> for CellValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::from)
    }
}

/// Column-oriented view of an uploaded sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    columns: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a named column.
    pub fn insert_column(&mut self, name: impl Into<String>, cells: Vec<CellValue>) {
        let name = name.into();
        match self.headers.iter().position(|h| *h == name) {
            Some(idx) => self.columns[idx] = cells,
            None => {
                self.headers.push(name);
                self.columns.push(cells);
            }
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, name: &str) -> Option<&[CellValue]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Reads a headed CSV document; short rows are padded with `Null`.
    #[cfg(feature = "with-csv")]
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(record.get(idx).map_or(CellValue::Null, CellValue::parse_field));
            }
        }
        Ok(Self { headers, columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_classifies() {
        assert_eq!(CellValue::parse_field(""), CellValue::Null);
        assert_eq!(CellValue::parse_field("42"), CellValue::Number(42.0));
        assert_eq!(
            CellValue::parse_field("a@b.com"),
            CellValue::Text("a@b.com".into())
        );
    }

    #[test]
    fn column_lookup_by_name() {
        let mut table = Table::new();
        table.insert_column("Email", vec!["a@b.com".into(), CellValue::Null]);
        table.insert_column("Name", vec!["Ann".into()]);
        assert_eq!(table.column("Email").map(<[CellValue]>::len), Some(2));
        assert!(table.column("Phone").is_none());
        assert_eq!(table.row_count(), 2);
    }

    #[cfg(feature = "with-csv")]
    #[test]
    fn reads_csv_columns() {
        let data = "Name,Email\nAnn,ann@example.com\nBob,\nCid,12\n";
        let table = Table::from_csv_reader(data.as_bytes()).expect("csv parses");
        let emails = table.column("Email").expect("email column");
        assert_eq!(
            emails,
            &[
                CellValue::Text("ann@example.com".into()),
                CellValue::Null,
                CellValue::Number(12.0),
            ]
        );
    }
}
