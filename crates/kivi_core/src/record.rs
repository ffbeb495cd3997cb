//! Record codec.
//!
//! A record is the atomic unit of storage: a key, a value, and a lowercase
//! hex SHA-1 of the value, packed into a self-delimiting buffer. The first
//! four bytes of every record are its total size.
//!
//! ## On-disk layout
//!
//! All length fields are little-endian u32; strings are raw bytes with no
//! terminators.
//!
//! ```text
//! offset      field         bytes
//! 0           total_size    4            (full record length, incl. this field)
//! 4           key_length    4
//! 8           key           key_length
//! 8+kl        value_length  4
//! 12+kl       value         value_length
//! 12+kl+vl    hash_length   4            (40 as written)
//! 16+kl+vl    hash          hash_length
//! ```
//!
//! The hash length is always written as 40 but honored as read when
//! decoding, so the field stays meaningful if the digest ever changes.

use crate::error::{StoreError, StoreResult};
use sha1::{Digest, Sha1};
use std::io::{self, Read};

/// Fixed bytes per record:
/// total_size (4) + key_length (4) + value_length (4) + hash_length (4).
const FIXED_OVERHEAD: usize = 16;

/// Computes the lowercase hex SHA-1 of a value.
pub fn value_hash(value: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(value);
    hex::encode(hasher.finalize())
}

/// One key/value record together with its integrity hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record key.
    pub key: Vec<u8>,
    /// Record value.
    pub value: Vec<u8>,
    /// Lowercase hex SHA-1 of `value`, computed at construction or read
    /// from disk.
    pub hash: String,
}

impl Record {
    /// Creates a record, computing the value hash.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        let hash = value_hash(&value);
        Self {
            key: key.into(),
            value,
            hash,
        }
    }

    /// Returns the encoded size of this record without encoding it.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FIXED_OVERHEAD + self.key.len() + self.value.len() + self.hash.len()
    }

    /// Encodes the record to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(&(total as u32).to_le_bytes());

        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);

        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);

        buf.extend_from_slice(&(self.hash.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.hash.as_bytes());

        buf
    }

    /// Decodes a record from a buffer known to contain exactly one record.
    ///
    /// Every length field is bounds-checked; any inconsistency is a
    /// [`StoreError::Corruption`].
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < FIXED_OVERHEAD {
            return Err(StoreError::corruption("record shorter than fixed fields"));
        }

        let total = read_u32(data, 0) as usize;
        if total < FIXED_OVERHEAD || total > data.len() {
            return Err(StoreError::corruption(format!(
                "record length {total} inconsistent with {} available bytes",
                data.len()
            )));
        }

        let key_len = read_u32(data, 4) as usize;
        let key_end = 8 + key_len;
        if key_end + 4 > total {
            return Err(StoreError::corruption("key length out of bounds"));
        }

        let value_len = read_u32(data, key_end) as usize;
        let value_start = key_end + 4;
        let value_end = value_start + value_len;
        if value_end + 4 > total {
            return Err(StoreError::corruption("value length out of bounds"));
        }

        let hash_len = read_u32(data, value_end) as usize;
        let hash_start = value_end + 4;
        let hash_end = hash_start + hash_len;
        if hash_end != total {
            return Err(StoreError::corruption(
                "field lengths disagree with record length",
            ));
        }

        let hash = String::from_utf8(data[hash_start..hash_end].to_vec())
            .map_err(|_| StoreError::corruption("hash is not valid UTF-8"))?;

        Ok(Self {
            key: data[8..key_end].to_vec(),
            value: data[value_start..value_end].to_vec(),
            hash,
        })
    }

    /// Reads one record from a stream positioned at a record boundary.
    ///
    /// Returns the record and the number of bytes consumed, or `Ok(None)` on
    /// a clean end-of-stream (no bytes available at the boundary). A stream
    /// that ends partway through a record is a [`StoreError::Corruption`].
    pub fn read_from<R: Read>(reader: &mut R) -> StoreResult<Option<(Self, usize)>> {
        let mut size_buf = [0u8; 4];
        let mut filled = 0;
        while filled < size_buf.len() {
            match reader.read(&mut size_buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(StoreError::corruption("record truncated in size prefix"));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let total = u32::from_le_bytes(size_buf) as usize;
        if total < FIXED_OVERHEAD {
            return Err(StoreError::corruption(format!(
                "record length {total} below minimum"
            )));
        }

        let mut buf = vec![0u8; total];
        buf[..4].copy_from_slice(&size_buf);
        reader.read_exact(&mut buf[4..]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StoreError::corruption("record truncated mid-record")
            } else {
                StoreError::Io(e)
            }
        })?;

        let record = Self::decode(&buf)?;
        Ok(Some((record, total)))
    }

    /// Checks that the stored hash matches the SHA-1 of the stored value.
    #[must_use]
    pub fn verify(&self) -> bool {
        value_hash(&self.value) == self.hash
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
