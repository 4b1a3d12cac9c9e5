//! Stop-the-world grow and rehash.
//!
//! The grown table is built in a sibling file (`<file>.resize`) and renamed over
//! the original once every record has been copied. Until that rename the
//! original file is never written, so a failed resize leaves it exactly as it
//! was.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash_file::{HashTableFile, TableState};
use crate::options::Options;

/// Where the grown image for `path` is built.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".resize");
    PathBuf::from(name)
}

/// Rebuild the table at `path` with `multiplier` times as many pages.
///
/// When the rehash overflows a page of the new image, or `pending` would not
/// fit its target page afterwards, the page count is multiplied again and the
/// image rebuilt. Errors are wrapped in [`Error::ResizeFailed`].
pub(crate) fn grow(
    path: &Path,
    old: &TableState,
    multiplier: u16,
    pending: Option<(&[u8], &[u8])>,
) -> Result<TableState> {
    let tmp = temp_path(path);
    let old_count = old.page_count();
    let mut new_count = old_count as u32 * multiplier as u32;

    tracing::info!(
        path = %path.display(),
        old_page_count = old_count,
        new_page_count = new_count,
        "resizing"
    );

    loop {
        let Ok(page_count) = u16::try_from(new_count) else {
            return Err(Error::resize_failed(Error::PageCountOverflow(new_count)));
        };

        match build_image(&tmp, old, page_count, pending) {
            Ok(Some((image, moved))) => {
                commit(&tmp, path).map_err(|e| {
                    discard(&tmp);
                    Error::resize_failed(e)
                })?;
                tracing::info!(
                    path = %path.display(),
                    old_page_count = old_count,
                    new_page_count = page_count,
                    records = moved,
                    "resize complete"
                );
                return Ok(image);
            }
            Ok(None) => {
                discard(&tmp);
                tracing::warn!(
                    page_count,
                    "rehash overflowed a page, growing further"
                );
                new_count *= multiplier as u32;
            }
            Err(e) => {
                discard(&tmp);
                return Err(Error::resize_failed(e));
            }
        }
    }
}

/// Copy every record of `old` into a fresh image of `page_count` pages.
///
/// `Ok(None)` means the image is too small for the data.
fn build_image(
    tmp: &Path,
    old: &TableState,
    page_count: u16,
    pending: Option<(&[u8], &[u8])>,
) -> Result<Option<(TableState, usize)>> {
    let options = Options::default()
        .initial_page_count(page_count)
        .page_size(old.page_size() as u16);
    let image = HashTableFile::create(tmp, &options)?.into_state();

    let mut moved = 0usize;
    let copied = old.for_each_record(|key, value| {
        image.try_put(key, value)?;
        moved += 1;
        Ok(())
    });
    match copied {
        Ok(()) => {}
        Err(Error::PageFull) => return Ok(None),
        Err(e) => return Err(e),
    }

    if let Some((key, value)) = pending {
        if !image.page_for(key).fits(key, value)? {
            return Ok(None);
        }
    }

    image.flush_all()?;
    image.store.sync()?;
    Ok(Some((image, moved)))
}

/// Rename the image over the original. Past this point the new layout is live.
fn commit(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path)?;
    if let Err(e) = sync_parent(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to sync directory after resize");
    }
    Ok(())
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => fs::File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %tmp.display(), error = %e, "failed to remove resize image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{self, keys_on_page};
    use crate::page_store::PutOutcome;
    use std::collections::HashMap;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;

    fn small(pages: u16, page_size: u16, multiplier: u16) -> Options {
        Options::default()
            .initial_page_count(pages)
            .page_size(page_size)
            .resize_multiplier(multiplier)
    }

    #[test]
    fn test_temp_path_is_a_sibling() {
        let p = temp_path(Path::new("/data/store.pskv"));
        assert_eq!(p, PathBuf::from("/data/store.pskv.resize"));
    }

    #[test]
    fn test_resize_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.pskv");
        let table = HashTableFile::create(&path, &small(2, 256, 2)).unwrap();

        let mut expected = HashMap::new();
        let mut i = 0;
        while table.page_count() == 2 {
            let key = format!("key{i}");
            let value = format!("value{i}");
            assert_eq!(
                table.put(key.as_bytes(), value.as_bytes()).unwrap(),
                PutOutcome::Inserted
            );
            expected.insert(key, value);
            i += 1;
        }
        assert_eq!(table.page_count(), 4);
        assert!(!temp_path(&path).exists());

        // overwrite a few so the last written value is the one to check
        for k in expected.keys().take(5).cloned().collect::<Vec<_>>() {
            table.put(k.as_bytes(), b"rewritten").unwrap();
            expected.insert(k, "rewritten".to_string());
        }

        for (k, v) in &expected {
            assert_eq!(table.get(k.as_bytes()).unwrap(), Some(v.clone().into_bytes()));
        }
        assert_eq!(table.len().unwrap(), expected.len());
        table.close().unwrap();

        let table = HashTableFile::open(&path, &Options::default()).unwrap();
        assert_eq!(table.page_count(), 4);
        assert_eq!(fs::metadata(&path).unwrap().len(), 5 * 256);
        for (k, v) in &expected {
            assert_eq!(table.get(k.as_bytes()).unwrap(), Some(v.clone().into_bytes()));
        }
    }

    #[test]
    fn test_many_writes() {
        let dir = tempdir().unwrap();
        let table = HashTableFile::create(dir.path().join("t.pskv"), &small(2, 128, 2)).unwrap();

        for x in 0..500 {
            let k = x.to_string();
            table.put(k.as_bytes(), k.as_bytes()).unwrap();
            assert_eq!(table.get(k.as_bytes()).unwrap(), Some(k.clone().into_bytes()));
        }
        assert!(table.page_count() > 2);
        for x in 0..500 {
            let k = x.to_string();
            assert_eq!(table.get(k.as_bytes()).unwrap(), Some(k.into_bytes()));
        }
        assert_eq!(table.len().unwrap(), 500);
    }

    #[test]
    fn test_grows_again_when_pending_record_still_collides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.pskv");
        let table = HashTableFile::create(&path, &small(1, 64, 2)).unwrap();

        // 24 byte values make every entry larger than half a page
        let value = [b'v'; 24];
        let keys = keys_on_page("k", 1, 2, 2);
        table.put(keys[0].as_bytes(), &value).unwrap();
        table.put(keys[1].as_bytes(), &value).unwrap();

        let page_count = table.page_count();
        assert!(page_count > 2, "still at {page_count} pages");
        assert_ne!(
            bucket::page_number(keys[0].as_bytes(), page_count),
            bucket::page_number(keys[1].as_bytes(), page_count)
        );
        for key in &keys {
            assert_eq!(table.get(key.as_bytes()).unwrap(), Some(value.to_vec()));
        }
        assert!(!temp_path(&path).exists());
        table.close().unwrap();

        let table = HashTableFile::open(&path, &Options::default()).unwrap();
        assert_eq!(table.page_count(), page_count);
        assert_eq!(table.len().unwrap(), 2);
    }

    #[test]
    fn test_custom_multiplier() {
        let dir = tempdir().unwrap();
        let table = HashTableFile::create(dir.path().join("t.pskv"), &small(2, 256, 3)).unwrap();
        table.put(b"a", b"1").unwrap();
        table.grow().unwrap();
        assert_eq!(table.page_count(), 6);
        table.grow().unwrap();
        assert_eq!(table.page_count(), 18);
        assert_eq!(table.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_page_count_overflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.pskv");
        let table = HashTableFile::create(&path, &small(40_000, 32, 2)).unwrap();
        table.put(b"k", b"v").unwrap();

        match table.grow() {
            Err(Error::ResizeFailed(source)) => {
                assert!(matches!(*source, Error::PageCountOverflow(80_000)))
            }
            other => panic!("expected resize failure, got {other:?}"),
        }
        assert_eq!(table.page_count(), 40_000);
        assert_eq!(table.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_failed_resize_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.pskv");
        let page_size = 128u16;

        HashTableFile::create(&path, &small(2, page_size, 2))
            .unwrap()
            .close()
            .unwrap();
        // break page 2 so the rehash cannot read it
        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(2 * page_size as u64)).unwrap();
        file.write_all(&7u16.to_le_bytes()).unwrap();
        drop(file);

        let table = HashTableFile::open(&path, &Options::default()).unwrap();
        let mut written = Vec::new();
        let mut failure = None;
        for key in keys_on_page("k", 1, 2, 64) {
            table.sync().unwrap();
            let before = fs::read(&path).unwrap();
            match table.put(key.as_bytes(), b"0123456789") {
                Ok(_) => written.push(key),
                Err(e) => {
                    table.sync().unwrap();
                    assert_eq!(fs::read(&path).unwrap(), before);
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            Some(Error::ResizeFailed(source)) => {
                assert!(matches!(*source, Error::CorruptPage(_)), "{source:?}")
            }
            other => panic!("expected resize failure, got {other:?}"),
        }
        assert!(!written.is_empty());
        assert!(!temp_path(&path).exists());
        assert_eq!(table.page_count(), 2);
        for key in &written {
            assert_eq!(table.get(key.as_bytes()).unwrap(), Some(b"0123456789".to_vec()));
        }
    }
}
