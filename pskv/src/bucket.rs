use xxhash_rust::xxh3::xxh3_64;

/// Page a key lives on for a table of `page_count` hashed pages.
///
/// The result is in `1..=page_count`; slot 0 holds the file header and is never
/// returned. xxh3 is defined independently of word size and endianness, so a
/// file written on one machine hashes identically on another.
pub fn page_number(key: &[u8], page_count: u16) -> u16 {
    debug_assert!(page_count > 0, "page_count must be at least 1");
    (xxh3_64(key) % page_count as u64) as u16 + 1
}

/// First `n` keys of the form `{prefix}{i}` that land on `page`.
#[cfg(test)]
pub(crate) fn keys_on_page(prefix: &str, page: u16, page_count: u16, n: usize) -> Vec<String> {
    (0..)
        .map(|i| format!("{prefix}{i}"))
        .filter(|k| page_number(k.as_bytes(), page_count) == page)
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_page() {
        let keys: [&[u8]; 4] = [b"", b"a", b"hello world", &[0xFF; 300]];
        for key in keys {
            assert_eq!(page_number(key, 1), 1);
        }
    }

    #[test]
    fn test_uses_every_page() {
        let pages = 16;
        let mut hits = vec![0usize; pages as usize + 1];
        for i in 0..2000 {
            hits[page_number(format!("key_{i}").as_bytes(), pages) as usize] += 1;
        }
        assert_eq!(hits[0], 0, "slot 0 is reserved");
        assert!(hits[1..].iter().all(|&h| h > 0), "{hits:?}");
    }

    #[test]
    fn test_stable_across_builds() {
        // placement is persisted, the hash must not drift
        assert_eq!(xxh3_64(b""), 0x2D06800538D394C2);
        assert_eq!(page_number(b"", 64), (0x2D06800538D394C2u64 % 64) as u16 + 1);
    }

    proptest! {
        #[test]
        fn page_number_is_deterministic_and_in_range(
            key in proptest::collection::vec(any::<u8>(), 0..64),
            page_count in 1u16..=u16::MAX,
        ) {
            let first = page_number(&key, page_count);
            prop_assert!(first >= 1 && first <= page_count);
            prop_assert_eq!(first, page_number(&key, page_count));
        }
    }
}
