//! Column type resolution from untyped cell observations.
//!
//! Every cell is classified into the finest-grained category it satisfies
//! (null, bool, integer, float, date/time, string) and folded into a
//! per-column [`ColumnEvidence`] accumulator. The final type is the join of
//! the observed categories over a fixed lattice:
//!
//! ```text
//!             utf8
//!    /    |    |     \     \
//! bool  float time  datetime \
//!         |           |       \
//!        int64       date      |
//!    \    |    |     /        /
//!             null
//! ```
//!
//! [`join`] is the least upper bound in this lattice; it is total,
//! commutative, associative and idempotent, so resolution is independent of
//! observation order and of how evidence is partitioned and merged.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{DataType, Value};

/// Cap on sampled unparseable string values retained as evidence.
const STRVAL_SAMPLE_CAP: usize = 16;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Least upper bound of two types in the resolution lattice.
pub fn join(a: DataType, b: DataType) -> DataType {
    use DataType::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Null, x) | (x, Null) => x,
        (Int64, Float64) | (Float64, Int64) => Float64,
        (Date, DateTime) | (DateTime, Date) => DateTime,
        _ => Utf8,
    }
}

/// Classify a single cell into the finest-grained category it satisfies.
///
/// Typed values classify as themselves; string values are probed in order
/// of preference. Unparseable text is [`DataType::Utf8`], never an error.
pub fn classify(value: &Value) -> DataType {
    match value {
        _ if value.is_null() => DataType::Null,
        Value::Bool(_) => DataType::Bool,
        Value::Int64(_) => DataType::Int64,
        Value::Float64(_) => DataType::Float64,
        Value::Date(_) => DataType::Date,
        Value::Time(_) => DataType::Time,
        Value::DateTime(_) => DataType::DateTime,
        Value::Utf8(s) => classify_text(s.trim()),
        Value::Null => DataType::Null,
    }
}

fn classify_text(s: &str) -> DataType {
    if is_bool_literal(s) {
        return DataType::Bool;
    }
    if s.parse::<i64>().is_ok() {
        return DataType::Int64;
    }
    if let Ok(f) = s.parse::<f64>() {
        // "inf"/"nan" parse as floats but are not numeric cell text.
        if f.is_finite() && s.bytes().any(|b| b.is_ascii_digit()) {
            return DataType::Float64;
        }
    }
    if DATETIME_FORMATS
        .iter()
        .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
    {
        return DataType::DateTime;
    }
    if DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
    {
        return DataType::Date;
    }
    if TIME_FORMATS
        .iter()
        .any(|f| NaiveTime::parse_from_str(s, f).is_ok())
    {
        return DataType::Time;
    }
    DataType::Utf8
}

// No digit forms ("1"/"0") here; integer columns must stay integers.
fn is_bool_literal(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
    )
}

/// Per-column evidence accumulator.
///
/// An immutable-update value: [`ColumnEvidence::observe`] and
/// [`ColumnEvidence::merge`] return new accumulators, and resolution from
/// merged evidence equals resolution from the concatenated stream in any
/// order. Never stores raw values beyond a bounded sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnEvidence {
    /// Null/empty observations.
    pub nulls: u64,
    /// Boolean-literal observations.
    pub bools: u64,
    /// Integer observations.
    pub ints: u64,
    /// Float observations.
    pub floats: u64,
    /// Date observations.
    pub dates: u64,
    /// Time-of-day observations.
    pub times: u64,
    /// Date-time observations.
    pub datetimes: u64,
    /// Plain-string observations.
    pub strs: u64,
    /// Shortest observed text length (string cells only).
    pub min_len: Option<u64>,
    /// Longest observed text length (string cells only).
    pub max_len: Option<u64>,
    /// Bounded sample of distinct unparseable string values.
    pub strvals: Vec<String>,
}

impl ColumnEvidence {
    /// Fold one observation into the evidence.
    #[must_use]
    pub fn observe(mut self, value: &Value) -> Self {
        let category = classify(value);
        match category {
            DataType::Null => self.nulls += 1,
            DataType::Bool => self.bools += 1,
            DataType::Int64 => self.ints += 1,
            DataType::Float64 => self.floats += 1,
            DataType::Date => self.dates += 1,
            DataType::Time => self.times += 1,
            DataType::DateTime => self.datetimes += 1,
            DataType::Utf8 => self.strs += 1,
        }

        if let Value::Utf8(s) = value {
            let len = s.chars().count() as u64;
            self.min_len = Some(self.min_len.map_or(len, |m| m.min(len)));
            self.max_len = Some(self.max_len.map_or(len, |m| m.max(len)));
            if category == DataType::Utf8
                && self.strvals.len() < STRVAL_SAMPLE_CAP
                && !self.strvals.iter().any(|v| v.as_str() == s.trim())
            {
                self.strvals.push(s.trim().to_owned());
            }
        }

        self
    }

    /// Combine evidence gathered over two partitions of the same column.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.nulls += other.nulls;
        self.bools += other.bools;
        self.ints += other.ints;
        self.floats += other.floats;
        self.dates += other.dates;
        self.times += other.times;
        self.datetimes += other.datetimes;
        self.strs += other.strs;
        self.min_len = match (self.min_len, other.min_len) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_len = match (self.max_len, other.max_len) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        for v in other.strvals {
            if self.strvals.len() >= STRVAL_SAMPLE_CAP {
                break;
            }
            if !self.strvals.contains(&v) {
                self.strvals.push(v);
            }
        }
        self
    }

    /// Join of the lattice over all observed categories.
    ///
    /// All-null evidence resolves to [`DataType::Null`], never Utf8.
    pub fn resolved_type(&self) -> DataType {
        let mut t = DataType::Null;
        for (count, category) in [
            (self.bools, DataType::Bool),
            (self.ints, DataType::Int64),
            (self.floats, DataType::Float64),
            (self.dates, DataType::Date),
            (self.times, DataType::Time),
            (self.datetimes, DataType::DateTime),
            (self.strs, DataType::Utf8),
        ] {
            if count > 0 {
                t = join(t, category);
            }
        }
        t
    }

    /// Whether any null/empty observation was recorded.
    pub fn nullable(&self) -> bool {
        self.nulls > 0
    }

    /// Total observations folded in.
    pub fn count(&self) -> u64 {
        self.nulls
            + self.bools
            + self.ints
            + self.floats
            + self.dates
            + self.times
            + self.datetimes
            + self.strs
    }
}

/// Type evidence over a fixed-width row stream.
#[derive(Debug, Clone)]
pub struct TypeIntuiter {
    columns: Vec<ColumnEvidence>,
}

impl TypeIntuiter {
    /// Create an intuiter for `width` columns.
    pub fn new(width: usize) -> Self {
        Self {
            columns: (0..width).map(|_| ColumnEvidence::default()).collect(),
        }
    }

    /// Tracked width.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Fold one row. Missing trailing cells count as nulls; surplus cells
    /// beyond the tracked width are ignored.
    pub fn observe_row(&mut self, row: &[Value]) {
        for (i, acc) in self.columns.iter_mut().enumerate() {
            let v = row.get(i).unwrap_or(&Value::Null);
            *acc = std::mem::take(acc).observe(v);
        }
    }

    /// Combine two intuiters column-by-column.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.columns.len(), other.columns.len());
        self.columns = self
            .columns
            .into_iter()
            .zip(other.columns)
            .map(|(a, b)| a.merge(b))
            .collect();
        self
    }

    /// Per-column evidence, in column order.
    pub fn evidence(&self) -> &[ColumnEvidence] {
        &self.columns
    }

    /// Resolve `(data_type, nullable)` per column.
    pub fn resolve(&self) -> Vec<(DataType, bool)> {
        self.columns
            .iter()
            .map(|e| (e.resolved_type(), e.nullable()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_texts(cells: &[&str]) -> (DataType, bool) {
        let mut ti = TypeIntuiter::new(1);
        for c in cells {
            ti.observe_row(&[Value::Utf8((*c).to_owned())]);
        }
        ti.resolve()[0]
    }

    #[test]
    fn ints_with_a_float_resolve_float() {
        assert_eq!(
            resolve_texts(&["1", "2", "3.5", "4"]),
            (DataType::Float64, false)
        );
    }

    #[test]
    fn ints_with_empties_resolve_nullable_int() {
        assert_eq!(
            resolve_texts(&["1", "2", "", "4"]),
            (DataType::Int64, true)
        );
    }

    #[test]
    fn all_null_resolves_null_only() {
        let mut ti = TypeIntuiter::new(1);
        for _ in 0..3 {
            ti.observe_row(&[Value::Null]);
        }
        assert_eq!(ti.resolve()[0], (DataType::Null, true));
    }

    #[test]
    fn malformed_text_degrades_to_string() {
        assert_eq!(
            resolve_texts(&["1", "2", "12 Main St"]),
            (DataType::Utf8, false)
        );
    }

    #[test]
    fn date_forms_resolve() {
        assert_eq!(
            resolve_texts(&["2020-01-01", "2020-06-15"]),
            (DataType::Date, false)
        );
        assert_eq!(
            resolve_texts(&["2020-01-01", "2020-06-15 10:30:00"]),
            (DataType::DateTime, false)
        );
        assert_eq!(resolve_texts(&["10:30:00", "23:59"]), (DataType::Time, false));
    }

    #[test]
    fn inf_and_nan_text_are_strings() {
        assert_eq!(resolve_texts(&["inf", "nan"]), (DataType::Utf8, false));
    }

    #[test]
    fn join_is_commutative_and_associative() {
        use DataType::*;
        let types = [Null, Bool, Int64, Float64, Date, Time, DateTime, Utf8];
        for &a in &types {
            for &b in &types {
                assert_eq!(join(a, b), join(b, a));
                assert_eq!(join(a, a), a);
                for &c in &types {
                    assert_eq!(join(join(a, b), c), join(a, join(b, c)));
                }
            }
        }
    }

    #[test]
    fn merged_evidence_resolves_like_one_stream() {
        let cells = ["1", "2", "x", "", "3.5", "true"];
        let mut whole = ColumnEvidence::default();
        for c in cells {
            whole = whole.observe(&Value::Utf8(c.into()));
        }

        let mut a = ColumnEvidence::default();
        let mut b = ColumnEvidence::default();
        for c in &cells[..2] {
            a = a.observe(&Value::Utf8((*c).into()));
        }
        for c in &cells[2..] {
            b = b.observe(&Value::Utf8((*c).into()));
        }

        let ab = a.clone().merge(b.clone());
        let ba = b.merge(a);
        assert_eq!(ab.resolved_type(), whole.resolved_type());
        assert_eq!(ba.resolved_type(), whole.resolved_type());
        // Feeding the same evidence twice must not change the result.
        let doubled = whole.clone().merge(whole.clone());
        assert_eq!(doubled.resolved_type(), whole.resolved_type());
    }
}
