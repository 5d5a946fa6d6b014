//! Row sources: lazy, restartable sequences of raw rows.
//!
//! A [`RowSource`] hands the core an ordered stream of untyped cell rows
//! from some tabular origin. Every call to [`RowSource::rows`] restarts the
//! stream from the beginning, which is what lets the load orchestrator run
//! separate intuition/statistics passes in its conservative multi-pass mode.
//!
//! Provided sources:
//!
//! - [`VecSource`]: rows held in memory (generators, tests)
//! - [`csv::CsvSource`]: raw rows from a CSV/TSV file
//! - [`mpr::MprSource`]: raw rows re-read from an existing container
//!
//! Resolving URLs, archive members, worksheet segments or encodings is the
//! provider's job, not the core's; a provider does that work before handing
//! rows over.

pub mod csv;
pub mod mpr;

use std::collections::BTreeMap;

use crate::error::MprResult;
use crate::types::Value;

pub use self::csv::CsvSource;
pub use self::mpr::MprSource;

/// A lazy, restartable sequence of raw rows.
pub trait RowSource {
    /// The row iterator produced by one pass.
    type Rows: Iterator<Item = MprResult<Vec<Value>>>;

    /// Start (or restart) a pass over the source from its first row.
    fn rows(&mut self) -> MprResult<Self::Rows>;

    /// Free-form origin identifiers recorded into container provenance.
    fn provenance(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }
}

/// An in-memory row source; each pass re-yields the same rows.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    rows: Vec<Vec<Value>>,
}

impl VecSource {
    /// Wrap rows already held in memory.
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    /// Build from string cells, for tabular text already split into fields.
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = &'static str>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Value::from).collect())
                .collect(),
        }
    }
}

impl RowSource for VecSource {
    type Rows = std::iter::Map<
        std::vec::IntoIter<Vec<Value>>,
        fn(Vec<Value>) -> MprResult<Vec<Value>>,
    >;

    fn rows(&mut self) -> MprResult<Self::Rows> {
        let ok: fn(Vec<Value>) -> MprResult<Vec<Value>> = Ok;
        Ok(self.rows.clone().into_iter().map(ok))
    }
}
