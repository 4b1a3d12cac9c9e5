use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use memmap2::{MmapOptions, MmapRaw};

use crate::header::{Header, HEADER_SIZE};
use crate::page_layout::FILLER;

/// The mapping of a whole pskv file.
///
/// The map is shared with every [`PageWindow`] cut from it, so it outlives any
/// page that still points into it. Crate-private: windows alias the mapping and
/// only the table's page cache may hand them out.
pub(crate) struct MMapFile {
    mmap: Arc<MmapRaw>,
    file: File,
}

impl MMapFile {
    /// Creates (or truncates) `path` to `len` bytes, all set to [`FILLER`].
    pub(crate) fn create(path: &Path, len: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        let store = Self::from_file(file)?;
        // SAFETY: the mapping is fresh and not yet shared with any window.
        unsafe { std::slice::from_raw_parts_mut(store.mmap.as_mut_ptr(), store.len()) }
            .fill(FILLER);
        Ok(store)
    }

    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::from_file(file)
    }

    fn from_file(file: File) -> io::Result<Self> {
        let mmap = MmapOptions::new().map_raw(&file)?;
        Ok(Self {
            mmap: Arc::new(mmap),
            file,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Copies the header area out of slot 0.
    pub(crate) fn read_header_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let n = HEADER_SIZE.min(self.len());
        // SAFETY: header bytes are only written by `write_header`, during creation.
        out[..n].copy_from_slice(unsafe { std::slice::from_raw_parts(self.mmap.as_ptr(), n) });
        out
    }

    pub(crate) fn write_header(&mut self, header: &Header) {
        assert!(self.len() >= HEADER_SIZE);
        // SAFETY: `&mut self` during creation, before any window exists.
        unsafe { std::slice::from_raw_parts_mut(self.mmap.as_mut_ptr(), HEADER_SIZE) }
            .copy_from_slice(header.as_bytes());
    }

    /// Window over slot `number` of a file with slots of `page_size` bytes.
    ///
    /// # Safety
    ///
    /// Windows over the same slot alias each other. The caller must keep at
    /// most one window per slot in use at a time: no borrow from one window
    /// may be alive while another window over that slot is written, and a
    /// slot is never accessed from two threads without a lock around it.
    pub(crate) unsafe fn window(&self, number: u16, page_size: usize) -> PageWindow {
        let offset = number as usize * page_size;
        assert!(
            offset + page_size <= self.len(),
            "page {number} lies outside the mapping"
        );
        PageWindow {
            mmap: Arc::clone(&self.mmap),
            offset,
            len: page_size,
        }
    }

    /// Flush the mapping and fsync the file.
    pub(crate) fn sync(&self) -> io::Result<()> {
        self.mmap.flush()?;
        self.file.sync_all()
    }
}

/// A page-sized slice of the shared mapping.
///
/// Each window is owned by exactly one `PageStore`, which only touches it
/// under its own lock. See [`MMapFile::window`] for the aliasing contract.
pub(crate) struct PageWindow {
    mmap: Arc<MmapRaw>,
    offset: usize,
    len: usize,
}

impl PageWindow {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        // SAFETY: bounds checked in `MMapFile::window`; its contract keeps
        // writers of this range out while the borrow lives.
        unsafe { std::slice::from_raw_parts(self.mmap.as_ptr().add(self.offset), self.len) }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` makes this the only borrow of the range.
        unsafe {
            std::slice::from_raw_parts_mut(self.mmap.as_mut_ptr().add(self.offset), self.len)
        }
    }
}
