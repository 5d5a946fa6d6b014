//! The Message Pack Rows container codec.
//!
//! On disk a container is three runs of bytes:
//!
//! ```text
//! [ compressed row block ][ packed metadata block ][ 52-byte trailer ]
//! ```
//!
//! - The **row block** is a single compressed byte run; decompressed, it is
//!   a sequence of MessagePack arrays of row arrays (blocks of up to
//!   [`DEFAULT_ROWS_PER_BLOCK`] rows). A column's array position
//!   encodes its column mapping implicitly.
//! - The **metadata block** is a zlib-compressed, self-describing
//!   MessagePack dictionary: schema, row count, row classification,
//!   per-column statistics, provenance.
//! - The **trailer** is fixed-size, at a fixed offset from the end, and
//!   records both block ranges plus the compression identifier, so
//!   [`read_metadata`] never scans or decompresses row data.
//!
//! Containers are immutable once written; updating one means rewriting it.
//! [`write_to_path`] gives atomic replace semantics so readers never see a
//! partial write.

mod meta;
mod reader;
mod trailer;
mod value;
mod writer;

pub use meta::{About, Metadata, RowSpec};
pub use reader::{read_metadata, DataRows, MprFile, Rows};
pub use trailer::{Compression, Trailer, FORMAT_VERSION, TRAILER_LEN, TRAILER_MAGIC};
pub use writer::{write_to_path, MprWriter, WriteOptions, DEFAULT_ROWS_PER_BLOCK};
