use std::path::Path;

use crate::checksum::crc64;

/// Canonical byte form of a path: every UTF-16 unit as two bytes, low byte
/// first. This is stored at the front of every record and must not change.
pub fn make_key(path: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(path.len() * 2);
    for unit in path.encode_utf16() {
        result.push((unit & 0xFF) as u8);
        result.push((unit >> 8) as u8);
    }
    result
}

/// Key bytes and the checksum that addresses them in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub bytes: Vec<u8>,
    pub hash: u64,
}

impl CacheKey {
    pub fn for_path(path: &Path) -> Self {
        Self::for_str(&path.to_string_lossy())
    }

    pub fn for_str(path: &str) -> Self {
        let bytes = make_key(path);
        let hash = crc64(&bytes);
        Self { bytes, hash }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ascii_low_byte_first() {
        assert_eq!(make_key("ab/"), vec![b'a', 0, b'b', 0, b'/', 0]);
    }

    #[test]
    fn test_non_ascii() {
        // U+00E9, U+4E2D
        assert_eq!(make_key("é中"), vec![0xE9, 0x00, 0x2D, 0x4E]);
    }

    #[test]
    fn test_outside_bmp_uses_surrogates() {
        // U+1F600 is D83D DE00 in UTF-16
        assert_eq!(make_key("😀"), vec![0x3D, 0xD8, 0x00, 0xDE]);
    }

    #[test]
    fn test_empty_path() {
        assert!(make_key("").is_empty());
        assert!(CacheKey::for_str("").is_empty());
    }

    #[test]
    fn test_for_path_matches_for_str() {
        let path = Path::new("/storage/emulated/0/DCIM/Camera/IMG_1.jpg");
        assert_eq!(
            CacheKey::for_path(path),
            CacheKey::for_str("/storage/emulated/0/DCIM/Camera/IMG_1.jpg")
        );
    }

    proptest! {
        #[test]
        fn key_is_two_bytes_per_unit(path in "\\PC{0,64}") {
            let key = make_key(&path);
            prop_assert_eq!(key.len(), 2 * path.encode_utf16().count());
            for (unit, pair) in path.encode_utf16().zip(key.chunks(2)) {
                prop_assert_eq!(u16::from_le_bytes([pair[0], pair[1]]), unit);
            }
        }
    }
}
