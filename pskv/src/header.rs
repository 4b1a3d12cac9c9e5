use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};

pub const MAGIC: [u8; 4] = *b"pskv";
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();

/// The fixed 32 byte header at the start of slot 0.
///
/// Integer fields are stored little-endian; use the accessors rather than the
/// raw fields.
#[derive(Clone, Copy, Zeroable, Pod, PartialEq, Eq)]
#[repr(C)]
pub struct Header {
    magic: [u8; 4],
    version: u16,
    page_size: u16,
    page_count: u16,
    reserved: [u8; 22],
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("magic", &String::from_utf8_lossy(&self.magic))
            .field("version", &self.version())
            .field("page_size", &self.page_size())
            .field("page_count", &self.page_count())
            .finish()
    }
}

impl Header {
    pub fn new(page_size: u16, page_count: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION.to_le(),
            page_size: page_size.to_le(),
            page_count: page_count.to_le(),
            reserved: [0; 22],
        }
    }

    pub fn version(&self) -> u16 {
        u16::from_le(self.version)
    }

    pub fn page_size(&self) -> u16 {
        u16::from_le(self.page_size)
    }

    /// Number of hashed pages, slot 0 excluded.
    pub fn page_count(&self) -> u16 {
        u16::from_le(self.page_count)
    }

    /// Expected length of a file described by this header.
    pub fn file_len(&self) -> u64 {
        (self.page_count() as u64 + 1) * self.page_size() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Parse and validate a header from the start of a file of `file_len` bytes.
    pub fn read(bytes: &[u8], file_len: u64) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "file too short for a header: {} bytes",
                bytes.len()
            )));
        }
        let header: Header = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);

        if header.magic != MAGIC {
            return Err(Error::InvalidFormat(format!(
                "bad magic {:?}, not a pskv file",
                header.magic
            )));
        }
        if header.version() != VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported version {} (expected {VERSION})",
                header.version()
            )));
        }
        if (header.page_size() as usize) < HEADER_SIZE || header.page_count() == 0 {
            return Err(Error::InvalidFormat(format!(
                "invalid geometry: page_size {} page_count {}",
                header.page_size(),
                header.page_count()
            )));
        }
        if header.file_len() != file_len {
            return Err(Error::InvalidFormat(format!(
                "file is {file_len} bytes, header describes {}",
                header.file_len()
            )));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(HEADER_SIZE, 32);
        let header = Header::new(4096, 3);
        let bytes = header.as_bytes();
        assert_eq!(&bytes[0..4], b"pskv");
        assert_eq!(&bytes[4..6], &1u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &4096u16.to_le_bytes());
        assert_eq!(&bytes[8..10], &3u16.to_le_bytes());
        assert!(bytes[10..].iter().all(|&b| b == 0));
        assert_eq!(header.file_len(), 4 * 4096);
    }

    #[test]
    fn test_read_valid() {
        let header = Header::new(512, 8);
        let read = Header::read(header.as_bytes(), 9 * 512).unwrap();
        assert_eq!(read, header);
        assert_eq!(read.page_size(), 512);
        assert_eq!(read.page_count(), 8);
    }

    #[test]
    fn test_rejects_foreign_files() {
        let good = Header::new(512, 8);

        let mut bad_magic = good.as_bytes().to_vec();
        bad_magic[0] = b'x';
        let mut bad_version = good.as_bytes().to_vec();
        bad_version[4..6].copy_from_slice(&9u16.to_le_bytes());
        let mut zero_pages = good.as_bytes().to_vec();
        zero_pages[8..10].copy_from_slice(&0u16.to_le_bytes());

        for (bytes, len) in [
            (bad_magic, 9 * 512),
            (bad_version, 9 * 512),
            (zero_pages, 512),
            (good.as_bytes().to_vec(), 10 * 512),
            (good.as_bytes()[..16].to_vec(), 16),
        ] {
            assert!(matches!(
                Header::read(&bytes, len),
                Err(Error::InvalidFormat(_))
            ));
        }
    }
}
