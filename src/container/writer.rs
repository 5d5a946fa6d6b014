//! Streaming container writer.
//!
//! The writer needs only `Write` (no seeking): rows stream through the
//! configured compressor starting at offset 0, block offsets are tracked by
//! a counting wrapper, and the metadata block plus trailer are appended by
//! [`MprWriter::finish`]. A container is not readable until `finish`
//! returns; the path-level helper writes to a sibling temp file and renames
//! it into place so readers can never observe a partial write.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::{GzEncoder, ZlibEncoder};

use crate::error::MprResult;
use crate::types::Value;

use super::meta::{pack, Metadata};
use super::trailer::{Compression, Trailer, FORMAT_VERSION};
use super::value::encode_block;

/// Rows buffered per MessagePack block before being pushed through the
/// compressor.
pub const DEFAULT_ROWS_PER_BLOCK: usize = 1000;

/// Options controlling container writing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Row-block compression algorithm.
    pub compression: Compression,
    /// Rows per encoded block.
    pub rows_per_block: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
            rows_per_block: DEFAULT_ROWS_PER_BLOCK,
        }
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum BlockEncoder<W: Write> {
    Plain(CountingWriter<W>),
    Gzip(GzEncoder<CountingWriter<W>>),
    Zlib(ZlibEncoder<CountingWriter<W>>),
}

impl<W: Write> BlockEncoder<W> {
    fn new(inner: CountingWriter<W>, compression: Compression) -> Self {
        let level = flate2::Compression::new(9);
        match compression {
            Compression::None => BlockEncoder::Plain(inner),
            Compression::Gzip => BlockEncoder::Gzip(GzEncoder::new(inner, level)),
            Compression::Zlib => BlockEncoder::Zlib(ZlibEncoder::new(inner, level)),
        }
    }

    fn finish(self) -> io::Result<CountingWriter<W>> {
        match self {
            BlockEncoder::Plain(w) => Ok(w),
            BlockEncoder::Gzip(enc) => enc.finish(),
            BlockEncoder::Zlib(enc) => enc.finish(),
        }
    }
}

impl<W: Write> Write for BlockEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BlockEncoder::Plain(w) => w.write(buf),
            BlockEncoder::Gzip(enc) => enc.write(buf),
            BlockEncoder::Zlib(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BlockEncoder::Plain(w) => w.flush(),
            BlockEncoder::Gzip(enc) => enc.flush(),
            BlockEncoder::Zlib(enc) => enc.flush(),
        }
    }
}

/// Streaming writer for one container.
pub struct MprWriter<W: Write> {
    enc: Option<BlockEncoder<W>>,
    cache: Vec<Vec<Value>>,
    rows_per_block: usize,
    compression: Compression,
    n_rows: u64,
}

impl<W: Write> MprWriter<W> {
    /// Start a container on `out`. Row data begins at the writer's current
    /// position, which is taken to be offset 0.
    pub fn new(out: W, options: &WriteOptions) -> Self {
        let counting = CountingWriter {
            inner: out,
            written: 0,
        };
        Self {
            enc: Some(BlockEncoder::new(counting, options.compression)),
            cache: Vec::with_capacity(options.rows_per_block),
            rows_per_block: options.rows_per_block.max(1),
            compression: options.compression,
            n_rows: 0,
        }
    }

    /// Rows accepted so far.
    pub fn n_rows(&self) -> u64 {
        self.n_rows
    }

    /// Append one row. Rows are stored verbatim, in order.
    pub fn write_row(&mut self, row: Vec<Value>) -> MprResult<()> {
        self.cache.push(row);
        self.n_rows += 1;
        if self.cache.len() >= self.rows_per_block {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Append many rows.
    pub fn write_rows<I: IntoIterator<Item = Vec<Value>>>(&mut self, rows: I) -> MprResult<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> MprResult<()> {
        if self.cache.is_empty() {
            return Ok(());
        }
        let enc = self.enc.as_mut().expect("writer already finished");
        encode_block(&self.cache, enc)?;
        self.cache.clear();
        Ok(())
    }

    /// Flush remaining rows, append the metadata block and trailer, and
    /// return the underlying writer.
    ///
    /// The stored row count in `metadata` is overwritten with the actual
    /// number of rows written, keeping the container's row-count invariant
    /// independent of the caller's bookkeeping.
    pub fn finish(mut self, mut metadata: Metadata) -> MprResult<W> {
        self.flush_block()?;

        let mut counting = self
            .enc
            .take()
            .expect("writer already finished")
            .finish()?;
        let rows_len = counting.written;

        metadata.version = FORMAT_VERSION;
        metadata.n_rows = self.n_rows;
        let meta_bytes = pack(&metadata)?;
        counting.write_all(&meta_bytes)?;

        let trailer = Trailer {
            rows_offset: 0,
            rows_len,
            meta_offset: rows_len,
            meta_len: meta_bytes.len() as u64,
            version: FORMAT_VERSION,
            compression: self.compression,
        };
        counting.write_all(&trailer.to_bytes())?;
        counting.flush()?;
        Ok(counting.inner)
    }
}

/// Write a complete container to `path` with atomic replace semantics.
///
/// Rows and metadata are first written to a sibling `.tmp` file, which is
/// renamed over `path` only after the trailer is flushed. Returns the number
/// of rows written.
pub fn write_to_path<P, I>(
    path: P,
    rows: I,
    metadata: Metadata,
    options: &WriteOptions,
) -> MprResult<u64>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Vec<Value>>,
{
    let path = path.as_ref();
    let tmp = sibling_tmp_path(path);

    let result = (|| {
        let file = File::create(&tmp)?;
        let mut writer = MprWriter::new(BufWriter::new(file), options);
        writer.write_rows(rows)?;
        let n_rows = writer.n_rows();
        let out = writer.finish(metadata)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(n_rows)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn sibling_tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
