//! Container metadata: the separately packed dictionary block.
//!
//! Metadata is encoded as a self-describing MessagePack map (field names as
//! keys, via `rmp-serde`'s named serialization) and compressed with zlib,
//! so it stays addressable and decodable without ever touching the row
//! block.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{MprError, MprResult};
use crate::types::Schema;

use super::trailer::FORMAT_VERSION;

/// Row-level classification committed alongside the schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSpec {
    /// Indices of header rows inside the stored row sequence.
    #[serde(default)]
    pub header_rows: Vec<u64>,
    /// Indices of banner/title/comment rows above the data start.
    #[serde(default)]
    pub comment_rows: Vec<u64>,
    /// First stored row index holding actual data.
    #[serde(default)]
    pub data_start_row: u64,
    /// One past the last data row; `None` means data runs to the end.
    #[serde(default)]
    pub data_end_row: Option<u64>,
}

/// Bookkeeping about the load that produced the container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct About {
    /// Unix timestamp of container creation.
    #[serde(default)]
    pub create_time: Option<u64>,
    /// Wall-clock seconds the load pass took.
    #[serde(default)]
    pub load_secs: Option<f64>,
}

/// The complete metadata dictionary for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Container format version.
    pub version: u32,
    /// Committed schema; column count equals the arity of every data row.
    pub schema: Schema,
    /// Number of rows stored in the row block.
    pub n_rows: u64,
    /// Row classification (headers, comments, data range).
    #[serde(default)]
    pub row_spec: RowSpec,
    /// Load bookkeeping.
    #[serde(default)]
    pub about: About,
    /// Free-form source provenance (origin identifiers); not interpreted by
    /// the core.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source: BTreeMap<String, serde_json::Value>,
    /// Human-readable warnings accumulated during the load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    /// Fresh metadata for a schema, at the current format version.
    pub fn new(schema: Schema) -> Self {
        Self {
            version: FORMAT_VERSION,
            schema,
            n_rows: 0,
            row_spec: RowSpec::default(),
            about: About::default(),
            source: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// One past the last data row, defaulting to the stored row count.
    pub fn data_end_row(&self) -> u64 {
        self.row_spec.data_end_row.unwrap_or(self.n_rows)
    }
}

/// Serialize and compress a metadata dictionary.
pub(crate) fn pack(meta: &Metadata) -> MprResult<Vec<u8>> {
    let encoded = rmp_serde::to_vec_named(meta)?;
    let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    std::io::Write::write_all(&mut enc, &encoded)?;
    Ok(enc.finish()?)
}

/// Decompress and deserialize a metadata block.
pub(crate) fn unpack(bytes: &[u8]) -> MprResult<Metadata> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .map_err(|e| MprError::corrupt(format!("metadata decompression failed: {e}")))?;
    rmp_serde::from_slice(&decoded)
        .map_err(|e| MprError::corrupt(format!("metadata decode failed: {e}")))
}
