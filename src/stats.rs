//! Single-pass, constant-memory column statistics.
//!
//! The engine consumes cells in document order and keeps one
//! [`StatAccumulator`] per column. Accumulators are explicit
//! immutable-update values: `observe` and `merge` return new accumulators,
//! and `merge` is commutative and associative, so a row stream may be
//! chunked and folded in parallel with identical results (up to
//! floating-point rounding for mean/variance).
//!
//! Numeric aggregation uses Welford's incremental mean/variance update with
//! the pairwise combination formula, so statistics match a two-pass
//! computation up to rounding while using O(1) memory per column. Because
//! the engine can run fused with type intuition (before column types are
//! resolved), each accumulator tracks both the numeric and the textual
//! aggregates; [`StatAccumulator::finalize`] projects the subset that is
//! meaningful for the column's level of measurement.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Lom, Schema, Value};

/// Cap on tracked distinct rendered values per column.
const UNIQUE_CAP: usize = 100;

/// Finalized per-column statistics, persisted into container metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Total cells observed, including nulls.
    pub count: u64,
    /// Null/missing cells. For numeric columns this includes cells that
    /// carried no numeric value.
    pub nulls: u64,
    /// Minimum finite numeric value (numeric columns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum finite numeric value (numeric columns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Mean of finite numeric values (numeric columns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Population standard deviation (numeric columns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    /// Shortest rendered length of a non-null value (non-numeric columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<u64>,
    /// Longest rendered length of a non-null value (non-numeric columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    /// Distinct non-null rendered values seen, saturating at the tracking
    /// cap (non-numeric columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuniques: Option<u64>,
    /// True when the distinct-value tracker overflowed its cap, i.e.
    /// `nuniques` is a lower bound.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_overflow: bool,
}

/// Streaming accumulator for one column.
#[derive(Debug, Clone, Default)]
pub struct StatAccumulator {
    count: u64,
    nulls: u64,

    // Welford state over finite numeric observations.
    n: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    nonfinite: u64,

    // Textual aggregates over non-null observations.
    min_len: u64,
    max_len: u64,
    len_seen: bool,
    uniques: HashSet<String>,
    unique_overflow: bool,
}

impl StatAccumulator {
    /// Fresh accumulator with no observations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total cells observed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Fold one observation into the accumulator.
    ///
    /// Never fails: out-of-domain values degrade (non-numeric cells on a
    /// numeric column become nulls at finalize; non-finite numbers are
    /// counted but excluded from min/max/mean).
    #[must_use]
    pub fn observe(mut self, value: &Value) -> Self {
        self.count += 1;

        if value.is_null() {
            self.nulls += 1;
            return self;
        }

        if let Some(x) = value.as_f64() {
            if x.is_finite() {
                self = self.push_numeric(x);
            } else {
                self.nonfinite += 1;
            }
        }

        let len = value.render_len() as u64;
        if self.len_seen {
            self.min_len = self.min_len.min(len);
            self.max_len = self.max_len.max(len);
        } else {
            self.min_len = len;
            self.max_len = len;
            self.len_seen = true;
        }

        if !self.unique_overflow {
            let rendered = value.to_string();
            if self.uniques.len() < UNIQUE_CAP {
                self.uniques.insert(rendered);
            } else if !self.uniques.contains(&rendered) {
                self.unique_overflow = true;
            }
        }

        self
    }

    fn push_numeric(mut self, x: f64) -> Self {
        if self.n == 0 {
            self.min = x;
            self.max = x;
        } else {
            if x < self.min {
                self.min = x;
            }
            if x > self.max {
                self.max = x;
            }
        }
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / (self.n as f64);
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        self
    }

    /// Combine two accumulators for the same column.
    ///
    /// Commutative and associative (mean/variance up to floating-point
    /// rounding), which is what makes chunked parallel folds legal.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.count += other.count;
        self.nulls += other.nulls;
        self.nonfinite += other.nonfinite;

        if other.n > 0 {
            if self.n == 0 {
                self.n = other.n;
                self.mean = other.mean;
                self.m2 = other.m2;
                self.min = other.min;
                self.max = other.max;
            } else {
                if other.min < self.min {
                    self.min = other.min;
                }
                if other.max > self.max {
                    self.max = other.max;
                }
                let combined = self.n + other.n;
                let delta = other.mean - self.mean;
                self.mean += delta * (other.n as f64 / combined as f64);
                self.m2 += other.m2
                    + delta * delta * (self.n as f64) * (other.n as f64) / (combined as f64);
                self.n = combined;
            }
        }

        if other.len_seen {
            if self.len_seen {
                self.min_len = self.min_len.min(other.min_len);
                self.max_len = self.max_len.max(other.max_len);
            } else {
                self.min_len = other.min_len;
                self.max_len = other.max_len;
                self.len_seen = true;
            }
        }

        self.unique_overflow |= other.unique_overflow;
        if !self.unique_overflow {
            for v in other.uniques {
                if self.uniques.len() < UNIQUE_CAP {
                    self.uniques.insert(v);
                } else if !self.uniques.contains(&v) {
                    self.unique_overflow = true;
                    break;
                }
            }
        }

        self
    }

    /// Project finalized statistics for a column with the given level of
    /// measurement: numeric aggregates for interval/ratio columns, count and
    /// length/distinct bounds for everything else.
    ///
    /// Callable at any time; reflects all observations folded so far.
    pub fn finalize(&self, lom: Lom) -> ColumnStats {
        if matches!(lom, Lom::Interval | Lom::Ratio) {
            // Cells that carried no usable number degrade to nulls rather
            // than failing the pass.
            let numeric_nulls = self.count - self.n - self.nonfinite;
            let (min, max, mean, std) = if self.n > 0 {
                (
                    Some(self.min),
                    Some(self.max),
                    Some(self.mean),
                    Some((self.m2 / self.n as f64).sqrt()),
                )
            } else {
                (None, None, None, None)
            };
            ColumnStats {
                count: self.count,
                nulls: numeric_nulls,
                min,
                max,
                mean,
                std,
                min_len: None,
                max_len: None,
                nuniques: None,
                unique_overflow: false,
            }
        } else {
            ColumnStats {
                count: self.count,
                nulls: self.nulls,
                min: None,
                max: None,
                mean: None,
                std: None,
                min_len: self.len_seen.then_some(self.min_len),
                max_len: self.len_seen.then_some(self.max_len),
                nuniques: Some(self.uniques.len() as u64),
                unique_overflow: self.unique_overflow,
            }
        }
    }
}

/// Per-column statistics over a fixed-width row stream.
#[derive(Debug, Clone)]
pub struct Stats {
    columns: Vec<StatAccumulator>,
}

impl Stats {
    /// Create a stats set for `width` columns.
    pub fn new(width: usize) -> Self {
        Self {
            columns: (0..width).map(|_| StatAccumulator::new()).collect(),
        }
    }

    /// Number of tracked columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Fold one cell. Cells beyond the tracked width are ignored so a ragged
    /// row can never abort the pass.
    pub fn update(&mut self, column: usize, value: &Value) {
        if let Some(acc) = self.columns.get_mut(column) {
            *acc = std::mem::take(acc).observe(value);
        }
    }

    /// Fold one row, padding missing trailing cells with nulls.
    pub fn update_row(&mut self, row: &[Value]) {
        for i in 0..self.columns.len() {
            let v = row.get(i).unwrap_or(&Value::Null);
            self.update(i, v);
        }
    }

    /// Combine two stats sets column-by-column.
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

    /// Finalize against a schema, one [`ColumnStats`] per column in order,
    /// selecting statistics by each column's level of measurement.
    ///
    /// Callable at any time; the result reflects all updates seen so far.
    pub fn finalize(&self, schema: &Schema) -> Vec<ColumnStats> {
        self.columns
            .iter()
            .zip(schema.columns.iter())
            .map(|(acc, col)| acc.finalize(col.lom))
            .collect()
    }
}
