//! Schema intuition for messy tabular sources.
//!
//! Two engines, both driven by raw [`crate::types::Value`] rows:
//!
//! - [`rows`]: locates the header row(s) and the first real data row inside
//!   files that open with title/banner/note rows.
//! - [`types`]: resolves one data type per column from mixed, untyped cell
//!   observations via a total join over a type lattice.
//!
//! Both engines are best-effort by contract: malformed cell text degrades
//! the classification (toward string/null) instead of failing the pass.

pub mod rows;
pub mod types;

pub use rows::{RowClassification, RowIntuiter, SAMPLE_ROWS};
pub use types::{join, ColumnEvidence, TypeIntuiter};
