use log::debug;
use std::fs;
use std::path::Path;

use crate::error::{IndexError, IndexResult};
use crate::index::{KeyType, KeyValue};

/// A comma-separated file held in memory: one header row naming the columns,
/// then data rows. Data row `i` (0-based, header excluded) is the row
/// identifier stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let table = Self::parse(&text)?;
        debug!(
            "loaded {} rows x {} columns from {}",
            table.rows.len(),
            table.headers.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn parse(text: &str) -> IndexResult<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| IndexError::Parse("CSV input has no header row".to_string()))?;
        let headers: Vec<String> = split_record(header_line, 1)?
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            // header is line 1
            rows.push(split_record(line, i + 2)?);
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, column: &str) -> IndexResult<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| {
                IndexError::Usage(format!(
                    "column '{}' does not exist, available: {}",
                    column,
                    self.headers.join(", ")
                ))
            })
    }

    /// Raw values of one column in row order. A row too short to reach the
    /// column is a parse error.
    pub fn column_values(&self, column: &str) -> IndexResult<Vec<&str>> {
        let index = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells.get(index).map(|cell| cell.as_str()).ok_or_else(|| {
                    IndexError::Parse(format!(
                        "data row {} has {} fields, column '{}' is field {}",
                        row,
                        cells.len(),
                        column,
                        index + 1
                    ))
                })
            })
            .collect()
    }

    /// Integer if every value parses as one, else float if every value
    /// does, else text. An empty column is text.
    pub fn infer_key_type(&self, column: &str) -> IndexResult<KeyType> {
        let values = self.column_values(column)?;
        if values.is_empty() {
            return Ok(KeyType::Text);
        }
        let all = |key_type| {
            values
                .iter()
                .all(|v| KeyValue::parse(key_type, v).is_ok())
        };
        let key_type = if all(KeyType::Integer) {
            KeyType::Integer
        } else if all(KeyType::Float) {
            KeyType::Float
        } else {
            KeyType::Text
        };
        debug!("inferred key type {} for column '{}'", key_type, column);
        Ok(key_type)
    }

    /// `(key, row)` pairs for the column, parsed as `key_type`.
    pub fn column_entries(
        &self,
        column: &str,
        key_type: KeyType,
    ) -> IndexResult<Vec<(KeyValue, u64)>> {
        self.column_values(column)?
            .into_iter()
            .enumerate()
            .map(|(row, raw)| {
                KeyValue::parse(key_type, raw)
                    .map(|key| (key, row as u64))
                    .map_err(|e| IndexError::Parse(format!("data row {}: {}", row, e)))
            })
            .collect()
    }
}

/// Splits one record on commas. Fields may be wrapped in double quotes, in
/// which case commas are literal and `""` is an escaped quote.
fn split_record(line: &str, line_number: usize) -> IndexResult<Vec<String>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(IndexError::Parse(format!(
            "unterminated quoted field on line {}",
            line_number
        )));
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEOPLE: &str = "id,name,score\n3,carol,7.5\n1,alice,9\n2,\"bob, jr\",6.25\n";

    #[test]
    fn parses_headers_and_rows() {
        let table = CsvTable::parse(PEOPLE).unwrap();
        assert_eq!(table.headers(), &["id", "name", "score"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.column_values("name").unwrap(),
            vec!["carol", "alice", "bob, jr"]
        );
    }

    #[test]
    fn infers_column_types() {
        let table = CsvTable::parse(PEOPLE).unwrap();
        assert_eq!(table.infer_key_type("id").unwrap(), KeyType::Integer);
        assert_eq!(table.infer_key_type("score").unwrap(), KeyType::Float);
        assert_eq!(table.infer_key_type("name").unwrap(), KeyType::Text);
    }

    #[test]
    fn entries_carry_row_numbers() {
        let table = CsvTable::parse(PEOPLE).unwrap();
        assert_eq!(
            table.column_entries("id", KeyType::Integer).unwrap(),
            vec![
                (KeyValue::from(3), 0),
                (KeyValue::from(1), 1),
                (KeyValue::from(2), 2)
            ]
        );
        assert!(matches!(
            table.column_entries("name", KeyType::Integer),
            Err(IndexError::Parse(_))
        ));
    }

    #[test]
    fn missing_column_and_short_rows() {
        let table = CsvTable::parse("a,b\n1,2\n3\n").unwrap();
        assert!(matches!(
            table.column_values("c"),
            Err(IndexError::Usage(_))
        ));
        assert!(matches!(
            table.column_values("b"),
            Err(IndexError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_input_and_open_quotes() {
        assert!(matches!(CsvTable::parse(""), Err(IndexError::Parse(_))));
        assert!(matches!(
            CsvTable::parse("a\n\"open\n"),
            Err(IndexError::Parse(_))
        ));
        let table = CsvTable::parse("q\n\"say \"\"hi\"\"\"\r\n").unwrap();
        assert_eq!(table.column_values("q").unwrap(), vec!["say \"hi\""]);
    }
}
