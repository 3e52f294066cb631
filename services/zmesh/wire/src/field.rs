//! Byte cursor and fixed-integer primitives.
//!
//! Every decode walks the payload through a single running [`Cursor`]; field
//! positions are always derived from the cumulative width of the preceding
//! fields, never from a literal offset.

use crate::error::DecodeError;

/// A bounds-checked read cursor over a payload slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes, or fail without reading past the end.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume all remaining bytes.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    /// Consume a single byte.
    pub fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Consume a big-endian unsigned integer of `width` bytes (1, 2 or 4).
    ///
    /// Composition is left-to-right with explicit grouping:
    /// `value = (value << 8) | byte`.
    pub fn get_uint(&mut self, width: u8) -> Result<u64, DecodeError> {
        let bytes = self.take(width as usize)?;
        let mut value: u64 = 0;
        for b in bytes {
            value = (value << 8) | u64::from(*b);
        }
        Ok(value)
    }

    /// Restrict the cursor to the next `len` bytes, returning a sub-cursor
    /// over that window and advancing this cursor past it.
    pub fn sub_cursor(&mut self, len: usize) -> Result<Cursor<'a>, DecodeError> {
        Ok(Cursor::new(self.take(len)?))
    }
}

/// Append a big-endian unsigned integer of `width` bytes to `buf`.
///
/// The caller is responsible for having range-checked `value` against the
/// width; excess high bytes are not written.
pub fn put_uint(buf: &mut impl Extend<u8>, value: u64, width: u8) {
    let mut out = [0u8; 8];
    for i in 0..width {
        out[i as usize] = (value >> (8 * (width - 1 - i))) as u8;
    }
    buf.extend(out[..width as usize].iter().copied());
}

/// Largest value representable in `width` bytes.
pub fn uint_max(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * u32::from(width))) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_in_order() {
        let mut cursor = Cursor::new(&[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(cursor.get_u8().unwrap(), 0x01);
        assert_eq!(cursor.get_uint(2).unwrap(), 0x0203);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn cursor_never_reads_past_end() {
        let mut cursor = Cursor::new(&[0x01]);
        let err = cursor.get_uint(2).unwrap_err();
        match err {
            DecodeError::Truncated { offset, needed } => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The failed read must not have consumed anything.
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn uint_round_trip_is_big_endian() {
        let mut buf: Vec<u8> = Vec::new();
        put_uint(&mut buf, 0x0102_0304, 4);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);

        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.get_uint(4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn uint_max_per_width() {
        assert_eq!(uint_max(1), 0xFF);
        assert_eq!(uint_max(2), 0xFFFF);
        assert_eq!(uint_max(4), 0xFFFF_FFFF);
    }
}
