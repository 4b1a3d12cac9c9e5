use std::path::Path;

use crate::error::Result;
use crate::hash_file::HashTableFile;
use crate::options::Options;
use crate::page_store::{DeleteOutcome, PutOutcome};
use crate::record::Record;

/// A key/value store kept in a single file.
///
/// `SimpleKv` is `Send + Sync`; wrap it in an `Arc` to share it between
/// threads. Writes reach the shared file mapping before `put`/`delete`
/// return; [`SimpleKv::close`] or [`SimpleKv::sync`] also force them to disk.
///
/// Only one process may have a file open at a time.
///
/// ```no_run
/// use pskv::{Options, PutOutcome, SimpleKv};
///
/// let kv = SimpleKv::open_or_create("data.pskv", Options::default())?;
/// assert_eq!(kv.put("name", "jon")?, PutOutcome::Inserted);
/// assert_eq!(kv.get("name")?, Some(b"jon".to_vec()));
/// kv.close()?;
/// # Ok::<(), pskv::Error>(())
/// ```
pub struct SimpleKv {
    file: HashTableFile,
}

impl SimpleKv {
    /// Open the file at `path`, creating it with `options` if it does not exist.
    pub fn open_or_create(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;
        let file = HashTableFile::open_or_create(path, &options)?;
        Ok(Self { file })
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.file.get(key.as_ref())
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<PutOutcome> {
        self.file.put(key.as_ref(), value.as_ref())
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<DeleteOutcome> {
        self.file.delete(key.as_ref())
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All records, in page order.
    pub fn records(&self) -> Result<Vec<Record>> {
        self.file.records()
    }

    pub fn len(&self) -> Result<usize> {
        self.file.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.file.is_empty()
    }

    pub fn page_count(&self) -> u16 {
        self.file.page_count()
    }

    /// Grow the table now, e.g. from a maintenance thread.
    pub fn grow(&self) -> Result<()> {
        self.file.grow()
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync()
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }

    pub fn file(&self) -> &HashTableFile {
        &self.file
    }
}
