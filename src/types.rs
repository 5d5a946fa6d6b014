//! Core data model types for the container and the intuition engines.
//!
//! A container commits an immutable [`Schema`] (an ordered list of
//! [`Column`] descriptors) describing rows of untyped-at-rest [`Value`]s.
//! Column order is significant and matches row-array order.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::stats::ColumnStats;

/// Resolved logical data type for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Column with no non-null observations. Never silently coerced to
    /// [`DataType::Utf8`].
    Null,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Calendar date without a time component.
    Date,
    /// Time of day without a date component.
    Time,
    /// Combined date and time.
    DateTime,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Whether numeric statistics (mean/variance) apply to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Default level of measurement for a column of this type.
    pub fn default_lom(&self) -> Lom {
        match self {
            DataType::Int64 | DataType::Float64 => Lom::Interval,
            DataType::Date | DataType::Time | DataType::DateTime => Lom::Ordinal,
            DataType::Null | DataType::Bool | DataType::Utf8 => Lom::Nominal,
        }
    }
}

/// Level of measurement, used by the stats engine to decide which statistics
/// are meaningful for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lom {
    /// Categorical, usually strings.
    #[serde(rename = "n")]
    Nominal,
    /// Counts or ranks; subtraction is not defined. Dates and times.
    #[serde(rename = "o")]
    Ordinal,
    /// Subtraction is defined, division is not.
    #[serde(rename = "i")]
    Interval,
    /// Division is defined and zero means "nothing".
    #[serde(rename = "r")]
    Ratio,
}

/// A single raw or typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// True for [`Value::Null`] and for strings that are empty after trimming.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Utf8(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Character length of the value's textual rendering.
    ///
    /// Used by the stats engine for non-numeric columns; nulls render empty.
    pub fn render_len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Utf8(s) => s.chars().count(),
            Value::Bool(b) => {
                if *b {
                    4
                } else {
                    5
                }
            }
            Value::Int64(v) => decimal_len(*v),
            Value::Float64(v) => format!("{v}").chars().count(),
            Value::Date(d) => format!("{d}").chars().count(),
            Value::Time(t) => format!("{t}").chars().count(),
            Value::DateTime(dt) => format!("{dt}").chars().count(),
        }
    }
}

impl std::fmt::Display for Value {
    /// Textual rendering; nulls render empty, everything else as its
    /// canonical form.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

fn decimal_len(v: i64) -> usize {
    let mut n = if v < 0 { 1 } else { 0 };
    let mut v = v.unsigned_abs();
    loop {
        n += 1;
        v /= 10;
        if v == 0 {
            return n;
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Utf8(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A single column descriptor in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// 0-based ordinal position; stable, matches row-array order.
    pub pos: usize,
    /// Column name, possibly synthesized (`col0`, `col1`, ...).
    pub name: String,
    /// Resolved data type.
    pub data_type: DataType,
    /// Whether any null/empty observation was recorded.
    pub nullable: bool,
    /// Level of measurement hint for the stats engine.
    pub lom: Lom,
    /// Free-form column description (e.g. coalesced header text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Per-column statistics, attached when a stats pass has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ColumnStats>,
}

impl Column {
    /// Create a column descriptor with defaults derived from the type.
    pub fn new(pos: usize, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            pos,
            name: name.into(),
            data_type,
            nullable: false,
            lom: data_type.default_lom(),
            description: None,
            stats: None,
        }
    }
}

/// An ordered list of column descriptors.
///
/// Immutable once committed to a container; built up mutably by the load
/// orchestrator before the commit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered columns.
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a schema from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Create a schema of `width` untyped-string columns named `col0..`.
    pub fn with_width(width: usize) -> Self {
        Self {
            columns: (0..width)
                .map(|i| Column::new(i, format!("col{i}"), DataType::Utf8))
                .collect(),
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Rename columns from raw header text, mangling each name with
    /// [`mangle_header`] and synthesizing `colN` for blanks.
    ///
    /// Extends the schema when `names` is wider than the current width.
    pub fn set_names<S: AsRef<str>>(&mut self, names: &[S]) {
        for (i, raw) in names.iter().enumerate() {
            let mangled = mangle_header(raw.as_ref());
            let name = if mangled.is_empty() {
                format!("col{i}")
            } else {
                mangled
            };
            match self.columns.get_mut(i) {
                Some(col) => col.name = name,
                None => self.columns.push(Column::new(i, name, DataType::Utf8)),
            }
        }
    }
}

/// Normalize raw header text into an identifier-style column name.
///
/// Lowercases, maps non-word characters to `_`, collapses `_` runs and trims
/// any trailing `_`.
pub fn mangle_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_headers_like_source_files() {
        assert_eq!(mangle_header("  Total Pop. (2010) "), "total_pop_2010");
        assert_eq!(mangle_header("Name"), "name");
        assert_eq!(mangle_header("__"), "");
        assert_eq!(mangle_header("A  B"), "a_b");
    }

    #[test]
    fn synthesizes_names_for_blank_headers() {
        let mut schema = Schema::with_width(3);
        schema.set_names(&["Name", "", "City"]);
        let names: Vec<_> = schema.column_names().collect();
        assert_eq!(names, vec!["name", "col1", "city"]);
    }

    #[test]
    fn null_detection_covers_blank_strings() {
        assert!(Value::Null.is_null());
        assert!(Value::Utf8("  ".into()).is_null());
        assert!(!Value::Utf8("x".into()).is_null());
        assert!(!Value::Int64(0).is_null());
    }
}
