//! Byte-level codec for the dynamic-size header fields, size words, and
//! offsets. Everything here is a thin wrapper over `byteorder` reads/writes
//! at fixed-width, fixed-position fields; none of it knows about keys or
//! values, only about the two-byte words that describe them.

use byteorder::{BigEndian, ByteOrder};

/// Width in bytes of a page offset, and of the key-size / value-size words.
/// Pinned at 2 bytes (`u16`) for this crate's build, matching the worked
/// examples (`pageSize = 256`).
pub const OFFSET_WIDTH: usize = 2;
pub const SIZE_WIDTH: usize = 2;

/// Width in bytes of a child pointer in an internal node's offset-array
/// interleave.
pub const CHILD_WIDTH: usize = 8;

/// High bit of the key-size word marks a tombstoned blob.
const TOMBSTONE_BIT: u16 = 0x8000;

/// Largest representable key/value size once the tombstone bit is reserved.
pub const MAX_SIZE_WORD: u16 = 0x7FFF;

pub fn read_offset(buf: &[u8], at: usize) -> u16 {
    BigEndian::read_u16(&buf[at..at + OFFSET_WIDTH])
}

pub fn put_offset(buf: &mut [u8], at: usize, value: u16) {
    BigEndian::write_u16(&mut buf[at..at + OFFSET_WIDTH], value);
}

/// Reads the raw key-size word without stripping the tombstone bit.
pub fn read_key_size_raw(buf: &[u8], at: usize) -> u16 {
    BigEndian::read_u16(&buf[at..at + SIZE_WIDTH])
}

/// Reads the key size with the tombstone bit stripped.
pub fn read_key_size(buf: &[u8], at: usize) -> u16 {
    strip_tombstone(read_key_size_raw(buf, at))
}

pub fn put_key_size(buf: &mut [u8], at: usize, size: u16) {
    debug_assert!(size <= MAX_SIZE_WORD, "key size {} exceeds size-word range", size);
    BigEndian::write_u16(&mut buf[at..at + SIZE_WIDTH], size);
}

pub fn read_value_size(buf: &[u8], at: usize) -> u16 {
    BigEndian::read_u16(&buf[at..at + SIZE_WIDTH])
}

pub fn put_value_size(buf: &mut [u8], at: usize, size: u16) {
    debug_assert!(size <= MAX_SIZE_WORD, "value size {} exceeds size-word range", size);
    BigEndian::write_u16(&mut buf[at..at + SIZE_WIDTH], size);
}

/// This is the same physical read as [`read_offset`] at the fixed 2-byte
/// width this crate builds with; see the design note in `page::leaf_page`
/// on `set_value_at` for why this alias exists rather than being inlined.
pub fn read_key_offset(buf: &[u8], at: usize) -> u16 {
    read_offset(buf, at)
}

pub fn has_tombstone(raw_key_size: u16) -> bool {
    raw_key_size & TOMBSTONE_BIT != 0
}

pub fn strip_tombstone(raw_key_size: u16) -> u16 {
    raw_key_size & !TOMBSTONE_BIT
}

pub fn put_tombstone(buf: &mut [u8], at: usize) {
    let raw = read_key_size_raw(buf, at);
    BigEndian::write_u16(&mut buf[at..at + SIZE_WIDTH], raw | TOMBSTONE_BIT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_word_round_trip() {
        let mut buf = [0u8; 4];
        put_key_size(&mut buf, 0, 1234);
        assert_eq!(read_key_size(&buf, 0), 1234);
        assert!(!has_tombstone(read_key_size_raw(&buf, 0)));
    }

    #[test]
    fn tombstone_bit_round_trip() {
        let mut buf = [0u8; 4];
        put_key_size(&mut buf, 0, 500);
        put_tombstone(&mut buf, 0);
        let raw = read_key_size_raw(&buf, 0);
        assert!(has_tombstone(raw));
        assert_eq!(strip_tombstone(raw), 500);
        assert_eq!(read_key_size(&buf, 0), 500);
    }

    #[test]
    fn offset_round_trip() {
        let mut buf = [0u8; 2];
        put_offset(&mut buf, 0, 65000);
        assert_eq!(read_offset(&buf, 0), 65000);
    }
}
