//! CSV-backed row source.
//!
//! Reads raw rows only: no header handling, no type parsing. Every record
//! becomes a row of string cells exactly as they appear in the file, so the
//! intuition engines see the same mess a human would. Restarting reopens
//! the file.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::MprResult;
use crate::types::Value;

use super::RowSource;

/// A CSV (or other delimited-text) file as a raw row source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    /// Source over a comma-delimited file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    /// Override the field delimiter (e.g. `b'\t'` for TSV).
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl RowSource for CsvSource {
    type Rows = CsvRows;

    fn rows(&mut self) -> MprResult<Self::Rows> {
        let reader = csv::ReaderBuilder::new()
            // Headers are noise to be classified, not consumed here.
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_path(&self.path)?;
        Ok(CsvRows {
            records: reader.into_records(),
        })
    }

    fn provenance(&self) -> BTreeMap<String, serde_json::Value> {
        let mut p = BTreeMap::new();
        p.insert(
            "url".to_owned(),
            serde_json::json!(format!("file://{}", self.path.display())),
        );
        p.insert("file_type".to_owned(), serde_json::json!("csv"));
        p
    }
}

/// One pass over a CSV file.
pub struct CsvRows {
    records: csv::StringRecordsIntoIter<File>,
}

impl Iterator for CsvRows {
    type Item = MprResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e.into())),
        };
        Some(Ok(record.iter().map(Value::from).collect()))
    }
}
