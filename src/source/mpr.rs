//! Container-backed row source.
//!
//! Re-reads the raw rows of an existing container, banner rows included, so
//! one container can feed another load (e.g. re-intuiting with different
//! options). Restarting reopens the file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::container::{MprFile, Rows};
use crate::error::MprResult;

use super::RowSource;

/// An existing `.mpr` container as a raw row source.
#[derive(Debug, Clone)]
pub struct MprSource {
    path: PathBuf,
}

impl MprSource {
    /// Source over a container file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RowSource for MprSource {
    type Rows = Rows<io::Take<File>>;

    fn rows(&mut self) -> MprResult<Self::Rows> {
        MprFile::open(&self.path)?.into_raw_rows()
    }

    fn provenance(&self) -> BTreeMap<String, serde_json::Value> {
        let mut p = BTreeMap::new();
        p.insert(
            "url".to_owned(),
            serde_json::json!(format!("file://{}", self.path.display())),
        );
        p.insert("file_type".to_owned(), serde_json::json!("mpr"));
        p
    }
}
