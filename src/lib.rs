//! `mprows` is a library for storing tabular data in **MPR** (Message Pack
//! Rows) containers: a compressed block of row arrays plus a separately
//! packed metadata dictionary, laid out so metadata can always be read
//! without decompressing the rows.
//!
//! The other half of the crate is the inference machinery that makes messy
//! real-world files (fixed-width text, spreadsheets with banner rows, CSVs
//! with missing headers) fit that format automatically:
//!
//! - [`intuit::rows`]: finds the true header row(s) and the first data row
//! - [`intuit::types`]: resolves one data type per column from mixed
//!   observations via a total lattice join
//! - [`stats`]: single-pass, constant-memory per-column statistics
//! - [`load`]: the orchestrator that drives everything and commits the
//!   result into a container
//!
//! ## Quick example: load a messy CSV
//!
//! ```no_run
//! use mprows::load::{load_rows, LoadOptions};
//! use mprows::source::CsvSource;
//!
//! # fn main() -> Result<(), mprows::MprError> {
//! // Banner rows, blank lines and headers are classified automatically;
//! // column types and statistics are resolved in the same pass.
//! let mut source = CsvSource::new("quarterly_report.csv");
//! let report = load_rows(&mut source, "quarterly_report.mpr", &LoadOptions::default())?;
//!
//! for col in &report.schema.columns {
//!     println!("{} {:?} nullable={}", col.name, col.data_type, col.nullable);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick example: read it back
//!
//! ```no_run
//! use mprows::container::MprFile;
//!
//! # fn main() -> Result<(), mprows::MprError> {
//! // Metadata only: constant-time relative to row count.
//! let meta = mprows::container::read_metadata("quarterly_report.mpr")?;
//! println!("{} rows, {} columns", meta.n_rows, meta.schema.width());
//!
//! // Lazy row access; stopping early never decodes the remainder.
//! let mut file = MprFile::open("quarterly_report.mpr")?;
//! for row in file.data_rows()?.take(10) {
//!     println!("{:?}", row?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`container`]: the MPR codec (writer, reader, trailer, metadata)
//! - [`source`]: lazy, restartable row sources (in-memory, CSV, MPR)
//! - [`intuit`]: row and type intuition engines
//! - [`stats`]: the streaming statistics engine
//! - [`load`]: load orchestration and observability
//! - [`types`]: schema and value types
//! - [`error`]: the crate error type

pub mod container;
pub mod error;
pub mod intuit;
pub mod load;
pub mod source;
pub mod stats;
pub mod types;

pub use error::{MprError, MprResult};
