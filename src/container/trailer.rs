//! Fixed-size container trailer.
//!
//! The trailer sits at a fixed offset from the end of the file, so the
//! metadata block is locatable with O(1) seeks and without parsing or
//! decompressing the row block. All integers are little-endian; the final
//! 8 bytes are the magic, preceded by a CRC32 over the rest of the trailer.

use crate::error::{MprError, MprResult};

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized trailer size in bytes.
pub const TRAILER_LEN: usize = 52;

/// Trailer magic, last 8 bytes of every container.
pub const TRAILER_MAGIC: &[u8; 8] = b"MPRTRLR1";

/// Compression algorithm applied to the row block.
///
/// The identifier is recorded in the trailer so the reader can select the
/// matching decompressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Row block stored uncompressed.
    None,
    /// Gzip member (with its own CRC32 integrity footer).
    #[default]
    Gzip,
    /// Raw zlib stream (Adler-32 checked).
    Zlib,
}

impl Compression {
    fn id(self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Zlib => 2,
        }
    }

    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Compression::None),
            1 => Some(Compression::Gzip),
            2 => Some(Compression::Zlib),
            _ => None,
        }
    }
}

/// Byte offsets and lengths of the row and metadata blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Offset of the compressed row block.
    pub rows_offset: u64,
    /// Length of the compressed row block in bytes.
    pub rows_len: u64,
    /// Offset of the packed metadata block.
    pub meta_offset: u64,
    /// Length of the packed metadata block in bytes.
    pub meta_len: u64,
    /// Container format version.
    pub version: u32,
    /// Row-block compression algorithm.
    pub compression: Compression,
}

impl Trailer {
    /// Serialize to the fixed on-disk layout.
    pub fn to_bytes(&self) -> [u8; TRAILER_LEN] {
        let mut buf = [0u8; TRAILER_LEN];
        buf[0..8].copy_from_slice(&self.rows_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.rows_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.meta_offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.meta_len.to_le_bytes());
        buf[32..36].copy_from_slice(&self.version.to_le_bytes());
        buf[36..40].copy_from_slice(&self.compression.id().to_le_bytes());
        let crc = crc32fast::hash(&buf[0..40]);
        buf[40..44].copy_from_slice(&crc.to_le_bytes());
        buf[44..52].copy_from_slice(TRAILER_MAGIC);
        buf
    }

    /// Parse and integrity-check a serialized trailer.
    pub fn from_bytes(bytes: &[u8; TRAILER_LEN]) -> MprResult<Self> {
        if &bytes[44..52] != TRAILER_MAGIC {
            return Err(MprError::corrupt("bad trailer magic"));
        }
        let stored_crc = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        let computed = crc32fast::hash(&bytes[0..40]);
        if stored_crc != computed {
            return Err(MprError::corrupt(format!(
                "trailer checksum mismatch (stored {stored_crc:#x}, computed {computed:#x})"
            )));
        }

        let version = u32::from_le_bytes(bytes[32..36].try_into().unwrap());
        if version == 0 || version > FORMAT_VERSION {
            return Err(MprError::corrupt(format!(
                "unsupported container version {version}"
            )));
        }

        let compression_id = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
        let compression = Compression::from_id(compression_id).ok_or_else(|| {
            MprError::corrupt(format!("unknown compression identifier {compression_id}"))
        })?;

        Ok(Self {
            rows_offset: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            rows_len: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            meta_offset: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            meta_len: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            version,
            compression,
        })
    }

    /// Check that both block ranges fall inside a file of `file_len` bytes
    /// (trailer excluded).
    pub fn validate_bounds(&self, file_len: u64) -> MprResult<()> {
        let payload_end = file_len.saturating_sub(TRAILER_LEN as u64);
        for (label, offset, len) in [
            ("row block", self.rows_offset, self.rows_len),
            ("metadata block", self.meta_offset, self.meta_len),
        ] {
            let end = offset.checked_add(len).ok_or_else(|| {
                MprError::corrupt(format!("{label} range overflows ({offset}+{len})"))
            })?;
            if end > payload_end {
                return Err(MprError::corrupt(format!(
                    "{label} range {offset}..{end} exceeds payload end {payload_end}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trailer {
        Trailer {
            rows_offset: 0,
            rows_len: 1234,
            meta_offset: 1234,
            meta_len: 99,
            version: FORMAT_VERSION,
            compression: Compression::Gzip,
        }
    }

    #[test]
    fn round_trips() {
        let t = sample();
        let parsed = Trailer::from_bytes(&t.to_bytes()).unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn detects_flipped_bytes() {
        let mut bytes = sample().to_bytes();
        bytes[3] ^= 0xff;
        assert!(matches!(
            Trailer::from_bytes(&bytes),
            Err(MprError::CorruptContainer { .. })
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[TRAILER_LEN - 1] = b'?';
        assert!(Trailer::from_bytes(&bytes).is_err());
    }

    #[test]
    fn bounds_check_rejects_out_of_range_blocks() {
        let t = sample();
        assert!(t.validate_bounds(1234 + 99 + TRAILER_LEN as u64).is_ok());
        assert!(t.validate_bounds(1234 + 98 + TRAILER_LEN as u64).is_err());
    }
}
