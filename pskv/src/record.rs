//! Length-prefixed encoding of a single key/value pair.
//!
//! Layout: `[key_len: u16 LE][value_len: u16 LE][key bytes][value bytes]`

use crate::error::{Error, Result};

/// Size of the two length fields in front of every record.
pub const RECORD_HEADER_LEN: usize = 4;

/// One key/value pair as stored in a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }
}

/// Number of bytes `encode` produces for this pair.
pub fn encoded_len(key: &[u8], value: &[u8]) -> usize {
    RECORD_HEADER_LEN + key.len() + value.len()
}

fn check_lengths(key: &[u8], value: &[u8]) -> Result<(u16, u16)> {
    match (u16::try_from(key.len()), u16::try_from(value.len())) {
        (Ok(k), Ok(v)) => Ok((k, v)),
        _ => Err(Error::KeyOrValueTooLarge {
            key_len: key.len(),
            value_len: value.len(),
        }),
    }
}

/// Encode a key/value pair into a fresh buffer.
pub fn encode(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; encoded_len(key, value)];
    encode_into(key, value, &mut out)?;
    Ok(out)
}

/// Encode into the front of `out`, returning the number of bytes written.
/// `out` must hold at least `encoded_len(key, value)` bytes.
pub(crate) fn encode_into(key: &[u8], value: &[u8], out: &mut [u8]) -> Result<usize> {
    let (klen, vlen) = check_lengths(key, value)?;
    let len = encoded_len(key, value);
    debug_assert!(out.len() >= len);

    out[0..2].copy_from_slice(&klen.to_le_bytes());
    out[2..4].copy_from_slice(&vlen.to_le_bytes());
    let key_end = RECORD_HEADER_LEN + key.len();
    out[RECORD_HEADER_LEN..key_end].copy_from_slice(key);
    out[key_end..len].copy_from_slice(value);
    Ok(len)
}

/// Decode one record from the front of `bytes`.
///
/// Returns the key, the value and how many bytes were consumed so the caller
/// can advance through a page.
pub fn decode(bytes: &[u8]) -> Result<(&[u8], &[u8], usize)> {
    if bytes.len() < RECORD_HEADER_LEN {
        return Err(Error::TruncatedRecord {
            needed: RECORD_HEADER_LEN,
            available: bytes.len(),
        });
    }
    let klen = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    let vlen = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
    let needed = RECORD_HEADER_LEN + klen + vlen;
    if bytes.len() < needed {
        return Err(Error::TruncatedRecord {
            needed,
            available: bytes.len(),
        });
    }

    let key_end = RECORD_HEADER_LEN + klen;
    Ok((&bytes[RECORD_HEADER_LEN..key_end], &bytes[key_end..needed], needed))
}
