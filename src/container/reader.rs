//! Container reader.
//!
//! Opening a container reads the fixed trailer and the metadata block only
//! (two seeks plus `meta_len` bytes), so metadata access stays constant-time
//! relative to row count: the row block is never read, let alone
//! decompressed, until a row iterator is requested. Row iteration is lazy
//! block by block; a consumer that stops early never decodes the remainder.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{MprError, MprResult};
use crate::types::Value;

use super::meta::{unpack, Metadata};
use super::trailer::{Compression, Trailer, TRAILER_LEN};
use super::value::decode_block;

/// An open container: trailer and metadata in memory, row block untouched.
pub struct MprFile<R: Read + Seek> {
    reader: R,
    trailer: Trailer,
    metadata: Metadata,
}

impl MprFile<File> {
    /// Open a container file.
    pub fn open(path: impl AsRef<Path>) -> MprResult<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read + Seek> MprFile<R> {
    /// Open a container from any seekable byte source.
    ///
    /// Reads exactly the trailer and the metadata block; trailer offsets
    /// pointing outside the file, checksum failures and undecodable
    /// metadata all surface as [`MprError::CorruptContainer`].
    pub fn from_reader(mut reader: R) -> MprResult<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < TRAILER_LEN as u64 {
            return Err(MprError::corrupt(format!(
                "file of {file_len} bytes is shorter than the trailer"
            )));
        }

        reader.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let mut buf = [0u8; TRAILER_LEN];
        reader.read_exact(&mut buf)?;
        let trailer = Trailer::from_bytes(&buf)?;
        trailer.validate_bounds(file_len)?;

        reader.seek(SeekFrom::Start(trailer.meta_offset))?;
        let mut meta_bytes = vec![0u8; trailer.meta_len as usize];
        reader.read_exact(&mut meta_bytes)?;
        let metadata = unpack(&meta_bytes)?;

        Ok(Self {
            reader,
            trailer,
            metadata,
        })
    }

    /// The decoded metadata dictionary.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The parsed trailer.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// Stored row count, from metadata.
    pub fn n_rows(&self) -> u64 {
        self.metadata.n_rows
    }

    /// One-line structural summary.
    pub fn info(&self) -> String {
        format!(
            "mpr v{} rows={} cols={} data_start={} headers={:?} compression={:?}",
            self.metadata.version,
            self.metadata.n_rows,
            self.metadata.schema.width(),
            self.metadata.row_spec.data_start_row,
            self.metadata.schema.column_names().collect::<Vec<_>>(),
            self.trailer.compression,
        )
    }

    /// Lazy iterator over every stored row, including header/banner rows.
    ///
    /// No arity enforcement; rows surface exactly as written.
    pub fn raw_rows(&mut self) -> MprResult<Rows<io::Take<&mut R>>> {
        let trailer = self.trailer;
        let expected_rows = self.metadata.n_rows;
        self.reader.seek(SeekFrom::Start(trailer.rows_offset))?;
        let take = (&mut self.reader).take(trailer.rows_len);
        Ok(Rows::new(take, trailer.compression, expected_rows))
    }

    /// Lazy iterator over the data region only.
    ///
    /// Skips rows before `data_start_row`, stops at `data_end_row`, and
    /// fails with [`MprError::SchemaMismatch`] on any data row whose arity
    /// differs from the committed schema width.
    pub fn data_rows(&mut self) -> MprResult<DataRows<io::Take<&mut R>>> {
        let start = self.metadata.row_spec.data_start_row;
        let end = self.metadata.data_end_row();
        let width = self.metadata.schema.width();
        let inner = self.raw_rows()?;
        Ok(DataRows {
            inner,
            start,
            end,
            width,
        })
    }

    /// Consume the handle into a lazy iterator over every stored row.
    ///
    /// Like [`MprFile::raw_rows`], but owns the underlying reader, so the
    /// iterator can outlive the handle (used by the MPR-backed row source).
    pub fn into_raw_rows(mut self) -> MprResult<Rows<io::Take<R>>> {
        let trailer = self.trailer;
        let expected_rows = self.metadata.n_rows;
        self.reader.seek(SeekFrom::Start(trailer.rows_offset))?;
        let take = self.reader.take(trailer.rows_len);
        Ok(Rows::new(take, trailer.compression, expected_rows))
    }

    /// Consume the handle, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Read the metadata dictionary of a container file without touching its
/// row block.
pub fn read_metadata(path: impl AsRef<Path>) -> MprResult<Metadata> {
    Ok(MprFile::open(path)?.metadata.clone())
}

enum BlockDecoder<R: Read> {
    Plain(R),
    Gzip(GzDecoder<R>),
    Zlib(ZlibDecoder<R>),
}

impl<R: Read> BlockDecoder<R> {
    fn new(inner: R, compression: Compression) -> Self {
        match compression {
            Compression::None => BlockDecoder::Plain(inner),
            Compression::Gzip => BlockDecoder::Gzip(GzDecoder::new(inner)),
            Compression::Zlib => BlockDecoder::Zlib(ZlibDecoder::new(inner)),
        }
    }
}

impl<R: Read> Read for BlockDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BlockDecoder::Plain(r) => r.read(buf),
            BlockDecoder::Gzip(dec) => dec.read(buf),
            BlockDecoder::Zlib(dec) => dec.read(buf),
        }
    }
}

/// Lazy row iterator over the decompressed row block.
pub struct Rows<R: Read> {
    input: BufReader<BlockDecoder<R>>,
    block: std::vec::IntoIter<Vec<Value>>,
    pos: u64,
    expected_rows: u64,
    done: bool,
}

impl<R: Read> Rows<R> {
    fn new(input: R, compression: Compression, expected_rows: u64) -> Self {
        Self {
            input: BufReader::new(BlockDecoder::new(input, compression)),
            block: Vec::new().into_iter(),
            pos: 0,
            expected_rows,
            done: false,
        }
    }

    /// Index of the next row this iterator would yield.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    fn next_block(&mut self) -> MprResult<bool> {
        // A clean end of the decompressed stream can only occur at a block
        // boundary; anything else is a decode failure below.
        let at_end = self
            .input
            .fill_buf()
            .map_err(|e| MprError::corrupt(format!("row block decompression failed: {e}")))?
            .is_empty();
        if at_end {
            if self.pos != self.expected_rows {
                return Err(MprError::corrupt(format!(
                    "row block ended after {} rows, metadata committed {}",
                    self.pos, self.expected_rows
                )));
            }
            return Ok(false);
        }
        self.block = decode_block(&mut self.input)?.into_iter();
        Ok(true)
    }
}

impl<R: Read> Iterator for Rows<R> {
    type Item = MprResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(row) = self.block.next() {
                self.pos += 1;
                return Some(Ok(row));
            }
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Row iterator restricted to the data region, with arity enforcement.
pub struct DataRows<R: Read> {
    inner: Rows<R>,
    start: u64,
    end: u64,
    width: usize,
}

impl<R: Read> Iterator for DataRows<R> {
    type Item = MprResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.inner.pos() >= self.end {
                return None;
            }
            let index = self.inner.pos();
            let row = match self.inner.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            if index < self.start {
                continue;
            }
            if row.len() != self.width {
                self.inner.done = true;
                return Some(Err(MprError::schema_mismatch(format!(
                    "row {index} has {} cells, schema has {} columns",
                    row.len(),
                    self.width
                ))));
            }
            return Some(Ok(row));
        }
    }
}
