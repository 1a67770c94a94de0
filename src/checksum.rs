use once_cell::sync::Lazy;

const INITIAL_CRC: u64 = 0xFFFF_FFFF_FFFF_FFFF;
const POLY64_REV: u64 = 0x95AC_9329_AC4B_C9B5;

// Right shifts are sign-propagating, both here and in `crc64`. Keys already
// written to disk were produced that way, so changing it would orphan them.
static CRC_TABLE: Lazy<[u64; 256]> = Lazy::new(|| {
    let mut table = [0u64; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut part = i as i64;
        for _ in 0..8 {
            let x = if part & 1 != 0 { POLY64_REV as i64 } else { 0 };
            part = (part >> 1) ^ x;
        }
        *entry = part as u64;
    }
    table
});

/// 64-bit table-driven checksum used to address cache records.
pub fn crc64(bytes: &[u8]) -> u64 {
    let table = &*CRC_TABLE;
    let mut crc = INITIAL_CRC as i64;
    for &byte in bytes {
        let index = ((crc as u8) ^ byte) as usize;
        crc = (table[index] as i64) ^ (crc >> 8);
    }
    crc as u64
}

/// Forces table construction. Lookups do this lazily, callers that care about
/// first-call latency can do it up front.
pub fn init() {
    Lazy::force(&CRC_TABLE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::make_key;

    #[test]
    fn test_table_entries() {
        assert_eq!(CRC_TABLE[0], 0);
        assert_eq!(CRC_TABLE[1], 0x20d8_70c8_3035_8979);
        assert_eq!(CRC_TABLE[128], POLY64_REV);
        assert_eq!(CRC_TABLE[255], 0x1fb7_d047_efec_8728);
    }

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(crc64(&[]), INITIAL_CRC);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(crc64(b"123456789"), 0x0962_12fa_6685_bfef);
        assert_eq!(crc64(&make_key("a")), 0xab9b_23b7_3c30_4b52);
        assert_eq!(
            crc64(&make_key("/sdcard/DCIM/photo.jpg")),
            0x25b2_b705_962e_ddf7
        );
        assert_eq!(crc64(&make_key("/tmp/é.png")), 0x4d31_6dd4_3db2_5d71);
    }

    #[test]
    fn test_deterministic() {
        let key = make_key("/photos/2024/IMG_0001.JPG");
        let first = crc64(&key);
        for _ in 0..10 {
            assert_eq!(crc64(&key), first);
        }
    }

    #[test]
    fn test_distinguishes_similar_paths() {
        assert_ne!(
            crc64(&make_key("/photos/a.jpg")),
            crc64(&make_key("/photos/b.jpg"))
        );
    }
}
