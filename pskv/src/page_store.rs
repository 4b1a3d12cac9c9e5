use parking_lot::Mutex;

use crate::byte_store::PageWindow;
use crate::error::{Error, Result};
use crate::page_layout::{self, PageRecords};
use crate::record::Record;

/// Result of a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Replaced,
}

/// Result of a `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

/// Decoded contents of one page plus its dirty flag.
struct Page {
    records: PageRecords,
    size: usize,
    dirty: bool,
}

impl Page {
    /// Undo a `put` of `key` that displaced `previous`.
    ///
    /// Puts write through, so the restored contents are what the window holds.
    fn restore(&mut self, key: &[u8], previous: Option<Vec<u8>>, size: usize) {
        match previous {
            Some(old) => self.records.insert(key.to_vec(), old),
            None => self.records.remove(key),
        };
        self.size = size;
        self.dirty = false;
    }
}

struct PageState {
    window: PageWindow,
    page: Option<Page>,
}

/// Owner of one page's window in the mapped file.
///
/// The page is decoded on first access and kept in memory afterwards. Every
/// operation runs under the page's own lock, so different pages never contend.
pub struct PageStore {
    number: u16,
    state: Mutex<PageState>,
}

impl PageState {
    fn load(&mut self, number: u16) -> Result<&mut Page> {
        let page = match self.page {
            Some(ref mut page) => page,
            None => {
                let records =
                    page_layout::deserialize_page(self.window.bytes()).map_err(|e| {
                        tracing::warn!(page = number, error = %e, "failed to load page");
                        match e {
                            Error::CorruptPage(reason) => {
                                Error::CorruptPage(format!("page {number}: {reason}"))
                            }
                            other => other,
                        }
                    })?;
                tracing::debug!(page = number, records = records.len(), "loaded page");
                let size = page_layout::serialized_size(&records);
                self.page.insert(Page {
                    records,
                    size,
                    dirty: false,
                })
            }
        };
        Ok(page)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(page) = self.page.as_mut().filter(|p| p.dirty) {
            page_layout::serialize_page_into(&page.records, self.window.bytes_mut())?;
            page.dirty = false;
        }
        Ok(())
    }
}

impl PageStore {
    pub(crate) fn new(number: u16, window: PageWindow) -> Self {
        Self {
            number,
            state: Mutex::new(PageState { window, page: None }),
        }
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// Decode the page if that has not happened yet.
    pub fn load(&self) -> Result<()> {
        self.state.lock().load(self.number).map(|_| ())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let page = state.load(self.number)?;
        Ok(page.records.get(key).cloned())
    }

    /// Insert or replace `key`, writing the page back before returning.
    ///
    /// When the page cannot hold the new contents the mapping is restored and
    /// [`Error::PageFull`] is returned.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<PutOutcome> {
        let number = self.number;
        let mut state = self.state.lock();
        let page_size = state.window.len();
        let page = state.load(number)?;

        let previous = page.records.insert(key.to_vec(), value.to_vec());
        let old_entry = previous
            .as_ref()
            .map(|old| page_layout::entry_size(key, old))
            .unwrap_or(0);
        let old_size = page.size;
        page.size = old_size - old_entry + page_layout::entry_size(key, value);
        page.dirty = true;

        if page.size > page_size {
            tracing::debug!(page = number, needed = page.size, page_size, "page full");
            page.restore(key, previous, old_size);
            return Err(Error::PageFull);
        }
        if let Err(e) = state.flush() {
            if let Some(page) = state.page.as_mut() {
                page.restore(key, previous, old_size);
            }
            return Err(e);
        }

        Ok(match previous {
            Some(_) => PutOutcome::Replaced,
            None => PutOutcome::Inserted,
        })
    }

    pub fn delete(&self, key: &[u8]) -> Result<DeleteOutcome> {
        let mut state = self.state.lock();
        let page = state.load(self.number)?;
        let Some(old) = page.records.remove(key) else {
            return Ok(DeleteOutcome::NotFound);
        };
        page.size -= page_layout::entry_size(key, &old);
        page.dirty = true;
        state.flush()?;
        Ok(DeleteOutcome::Removed)
    }

    /// Write the page back into the mapping if it changed since the last flush.
    pub fn flush(&self) -> Result<()> {
        self.state.lock().flush()
    }

    /// Whether `key`/`value` could be stored on this page right now.
    pub fn fits(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut state = self.state.lock();
        let window_len = state.window.len();
        let page = state.load(self.number)?;
        let old_entry = page
            .records
            .get(key)
            .map(|old| page_layout::entry_size(key, old))
            .unwrap_or(0);
        Ok(page.size - old_entry + page_layout::entry_size(key, value) <= window_len)
    }

    /// `put` and `delete` flush before returning, so this only reads `true`
    /// between a mutation and its write-back.
    #[cfg(test)]
    fn is_dirty(&self) -> bool {
        self.state
            .lock()
            .page
            .as_ref()
            .is_some_and(|p| p.dirty)
    }

    pub fn len(&self) -> Result<usize> {
        let mut state = self.state.lock();
        Ok(state.load(self.number)?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Visit every record on the page under the page lock.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        let mut state = self.state.lock();
        let page = state.load(self.number)?;
        for (k, v) in &page.records {
            f(k, v)?;
        }
        Ok(())
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        self.for_each(|k, v| {
            out.push(Record::new(k, v));
            Ok(())
        })?;
        Ok(out)
    }
}
