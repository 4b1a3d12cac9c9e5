//! Byte layout of a single fixed-size page.
//!
//! ```text
//! [record_count: u16 LE]
//! [entry_len: u16 LE][record] * record_count
//! [FILLER ...] up to page_size
//! ```
//!
//! `record` is the encoding produced by [`crate::record::encode`]. The size of
//! a page is always checked before a single byte is written, so a page that
//! serialized once can always be written back.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::record;

/// Width of the record count at the start of every page.
pub const RECORD_COUNT_LEN: usize = 2;
/// Width of the length prefix in front of every entry.
pub const ENTRY_LEN_PREFIX: usize = 2;
/// Byte used to pad unused page space. Fresh files are filled with it.
pub const FILLER: u8 = b' ';

/// In-memory contents of a page: key -> value, unique keys.
pub type PageRecords = FxHashMap<Vec<u8>, Vec<u8>>;

/// Bytes one record takes inside a page, length prefix included.
pub fn entry_size(key: &[u8], value: &[u8]) -> usize {
    ENTRY_LEN_PREFIX + record::encoded_len(key, value)
}

/// Bytes needed to serialize `records`, record count included.
pub fn serialized_size(records: &PageRecords) -> usize {
    RECORD_COUNT_LEN
        + records
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum::<usize>()
}

/// True when the buffer holds nothing but filler, i.e. the page was never written.
pub fn is_unwritten(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == FILLER)
}

/// Serialize `records` into a new buffer of exactly `page_size` bytes.
pub fn serialize_page(records: &PageRecords, page_size: usize) -> Result<Vec<u8>> {
    let mut out = vec![FILLER; page_size];
    serialize_page_into(records, &mut out)?;
    Ok(out)
}

/// Serialize `records` over the whole of `out`, padding the tail with [`FILLER`].
///
/// Fails with [`Error::PageOverflow`] when the records do not fit; `out` is left
/// untouched in that case.
pub fn serialize_page_into(records: &PageRecords, out: &mut [u8]) -> Result<usize> {
    let mut needed = RECORD_COUNT_LEN;
    for (key, value) in records {
        let entry_len = record::encoded_len(key, value);
        if entry_len > u16::MAX as usize {
            return Err(Error::KeyOrValueTooLarge {
                key_len: key.len(),
                value_len: value.len(),
            });
        }
        needed += ENTRY_LEN_PREFIX + entry_len;
    }
    let count = u16::try_from(records.len()).ok().filter(|_| needed <= out.len());
    let Some(count) = count else {
        return Err(Error::PageOverflow {
            needed,
            page_size: out.len(),
        });
    };

    out[..RECORD_COUNT_LEN].copy_from_slice(&count.to_le_bytes());
    let mut pos = RECORD_COUNT_LEN;
    for (key, value) in records {
        let entry_len = record::encoded_len(key, value) as u16;
        out[pos..pos + ENTRY_LEN_PREFIX].copy_from_slice(&entry_len.to_le_bytes());
        pos += ENTRY_LEN_PREFIX;
        pos += record::encode_into(key, value, &mut out[pos..])?;
    }
    debug_assert_eq!(pos, needed);
    out[pos..].fill(FILLER);
    Ok(pos)
}

/// Parse a page buffer back into its records.
pub fn deserialize_page(bytes: &[u8]) -> Result<PageRecords> {
    let mut records = PageRecords::default();
    if is_unwritten(bytes) {
        return Ok(records);
    }
    if bytes.len() < RECORD_COUNT_LEN {
        return Err(Error::CorruptPage(format!(
            "buffer of {} bytes cannot hold a record count",
            bytes.len()
        )));
    }

    let count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    let mut pos = RECORD_COUNT_LEN;
    for i in 0..count {
        if pos + ENTRY_LEN_PREFIX > bytes.len() {
            return Err(Error::CorruptPage(format!(
                "record count {count} exceeds page contents, stream ends at entry {i}"
            )));
        }
        let entry_len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        pos += ENTRY_LEN_PREFIX;

        let end = pos + entry_len;
        if end > bytes.len() {
            return Err(Error::CorruptPage(format!(
                "entry {i} declares {entry_len} bytes, only {} left",
                bytes.len() - pos
            )));
        }
        let (key, value, consumed) = record::decode(&bytes[pos..end])
            .map_err(|e| Error::CorruptPage(format!("entry {i}: {e}")))?;
        if consumed != entry_len {
            return Err(Error::CorruptPage(format!(
                "entry {i} declares {entry_len} bytes but its record spans {consumed}"
            )));
        }
        if records.insert(key.to_vec(), value.to_vec()).is_some() {
            return Err(Error::CorruptPage(format!("entry {i} repeats a key")));
        }
        pos = end;
    }

    Ok(records)
}
