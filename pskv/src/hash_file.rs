use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use rustc_hash::FxHashMap;

use crate::bucket;
use crate::byte_store::MMapFile;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::options::Options;
use crate::page_layout::{self, RECORD_COUNT_LEN};
use crate::page_store::{DeleteOutcome, PageStore, PutOutcome};
use crate::record::Record;
use crate::resize;

/// Everything that changes when the table is resized: the mapping, the header
/// and the pages cut from that mapping.
pub(crate) struct TableState {
    pub(crate) store: MMapFile,
    header: Header,
    pages: Mutex<FxHashMap<u16, Arc<PageStore>>>,
}

impl TableState {
    fn new(store: MMapFile, header: Header) -> Self {
        Self {
            store,
            header,
            pages: Mutex::new(FxHashMap::default()),
        }
    }

    pub(crate) fn page_count(&self) -> u16 {
        self.header.page_count()
    }

    pub(crate) fn page_size(&self) -> usize {
        self.header.page_size() as usize
    }

    /// The store for page `number`, created on first access.
    pub(crate) fn page(&self, number: u16) -> Arc<PageStore> {
        let mut pages = self.pages.lock();
        let page = pages.entry(number).or_insert_with(|| {
            // SAFETY: the cache holds one store per page number and is only
            // replaced together with the mapping on resize.
            let window = unsafe { self.store.window(number, self.page_size()) };
            Arc::new(PageStore::new(number, window))
        });
        Arc::clone(page)
    }

    pub(crate) fn page_for(&self, key: &[u8]) -> Arc<PageStore> {
        self.page(bucket::page_number(key, self.page_count()))
    }

    /// Put without any resize handling; a full page surfaces as [`Error::PageFull`].
    pub(crate) fn try_put(&self, key: &[u8], value: &[u8]) -> Result<PutOutcome> {
        self.page_for(key).put(key, value)
    }

    /// Visit every record, page by page.
    pub(crate) fn for_each_record(
        &self,
        mut f: impl FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        for number in 1..=self.page_count() {
            self.page(number).for_each(&mut f)?;
        }
        Ok(())
    }

    pub(crate) fn flush_all(&self) -> Result<()> {
        let pages: Vec<_> = self.pages.lock().values().cloned().collect();
        for page in pages {
            page.flush()?;
        }
        Ok(())
    }

    fn loaded_pages(&self) -> usize {
        self.pages.lock().len()
    }
}

/// A pskv data file: a header followed by `page_count` fixed-size pages.
///
/// Keys are hashed to a page with [`bucket::page_number`]; a page that runs
/// out of room triggers a resize which rebuilds the whole file with
/// `resize_multiplier` times as many pages.
///
/// Point operations hold the table lock shared and their page's lock
/// exclusively, so operations on different pages run in parallel. A resize
/// holds the table lock exclusively.
pub struct HashTableFile {
    path: PathBuf,
    resize_multiplier: u16,
    state: RwLock<TableState>,
}

impl HashTableFile {
    /// Create a new file at `path`, replacing whatever was there.
    pub fn create(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();
        let header = Header::new(options.page_size, options.initial_page_count);

        let mut store = MMapFile::create(path, header.file_len())?;
        store.write_header(&header);
        store.sync()?;

        tracing::info!(
            path = %path.display(),
            page_size = header.page_size(),
            page_count = header.page_count(),
            "created pskv file"
        );
        Ok(Self::from_parts(path, options.resize_multiplier, store, header))
    }

    /// Open an existing file. Page size and count come from its header; only
    /// `resize_multiplier` is taken from `options`.
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();

        let file_len = fs::metadata(path)?.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(Error::InvalidFormat(format!(
                "file is {file_len} bytes, too short for a header"
            )));
        }
        let store = MMapFile::open(path)?;
        let header = Header::read(&store.read_header_bytes(), store.len() as u64)?;

        tracing::info!(
            path = %path.display(),
            page_size = header.page_size(),
            page_count = header.page_count(),
            "opened pskv file"
        );
        Ok(Self::from_parts(path, options.resize_multiplier, store, header))
    }

    pub fn open_or_create(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, options)
        } else {
            Self::create(path, options)
        }
    }

    fn from_parts(path: &Path, resize_multiplier: u16, store: MMapFile, header: Header) -> Self {
        Self {
            path: path.to_path_buf(),
            resize_multiplier,
            state: RwLock::new(TableState::new(store, header)),
        }
    }

    pub(crate) fn into_state(self) -> TableState {
        self.state.into_inner()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> u16 {
        self.state.read().page_count()
    }

    pub fn page_size(&self) -> u16 {
        self.state.read().header.page_size()
    }

    pub fn resize_multiplier(&self) -> u16 {
        self.resize_multiplier
    }

    /// Number of pages decoded into memory so far.
    pub fn loaded_pages(&self) -> usize {
        self.state.read().loaded_pages()
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        state.page_for(key).get(key)
    }

    /// Insert or replace `key`. A full page grows the table and the put is
    /// retried once against the grown table.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<PutOutcome> {
        if key.len() > u16::MAX as usize || value.len() > u16::MAX as usize {
            return Err(Error::KeyOrValueTooLarge {
                key_len: key.len(),
                value_len: value.len(),
            });
        }

        let seen_page_count = {
            let state = self.state.read();
            let record_len = page_layout::entry_size(key, value);
            if RECORD_COUNT_LEN + record_len > state.page_size() {
                return Err(Error::RecordTooLargeForPage {
                    record_len,
                    page_size: state.page_size(),
                });
            }
            match state.try_put(key, value) {
                Err(Error::PageFull) => state.page_count(),
                other => return other,
            }
        };

        // the retry runs under the exclusive lock taken for the resize
        let state = self.resize(seen_page_count, Some((key, value)))?;
        match state.try_put(key, value) {
            Err(Error::PageFull) => Err(Error::RecordTooLargeForPage {
                record_len: page_layout::entry_size(key, value),
                page_size: state.page_size(),
            }),
            other => other,
        }
    }

    pub fn delete(&self, key: &[u8]) -> Result<DeleteOutcome> {
        let state = self.state.read();
        state.page_for(key).delete(key)
    }

    /// Grow the table by `resize_multiplier` now instead of waiting for a full page.
    pub fn grow(&self) -> Result<()> {
        let seen = self.page_count();
        self.resize(seen, None).map(|_| ())
    }

    /// Resize unless another thread already grew the table past `seen_page_count`
    /// far enough for `pending` to fit.
    fn resize(
        &self,
        seen_page_count: u16,
        pending: Option<(&[u8], &[u8])>,
    ) -> Result<RwLockWriteGuard<'_, TableState>> {
        let mut state = self.state.write();
        if state.page_count() != seen_page_count {
            let fits = match pending {
                Some((key, value)) => state.page_for(key).fits(key, value)?,
                None => true,
            };
            if fits {
                return Ok(state);
            }
        }

        let grown = resize::grow(&self.path, &state, self.resize_multiplier, pending)?;
        *state = grown;
        Ok(state)
    }

    /// Visit every record in the file, page by page.
    ///
    /// Runs under the table's shared lock; `f` must not call back into the table.
    pub fn for_each_record(&self, f: impl FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        self.state.read().for_each_record(f)
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        self.for_each_record(|k, v| {
            out.push(Record::new(k, v));
            Ok(())
        })?;
        Ok(out)
    }

    /// Number of records; decodes every page.
    pub fn len(&self) -> Result<usize> {
        let state = self.state.read();
        let mut len = 0;
        for number in 1..=state.page_count() {
            len += state.page(number).len()?;
        }
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush loaded pages, then msync the mapping and fsync the file.
    pub fn sync(&self) -> Result<()> {
        let state = self.state.read();
        state.flush_all()?;
        state.store.sync()?;
        Ok(())
    }

    /// Flush every loaded page and release the mapping.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        let state = self.state.into_inner();
        state.flush_all()?;
        state.store.sync()?;
        tracing::info!(path = %path.display(), "closed pskv file");
        Ok(())
    }
}
