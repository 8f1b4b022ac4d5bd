//! Binary data access shared by the silo emitter and reader.
//!
//! All multi-byte fields in a silo are little-endian and unaligned; these
//! helpers bounds-check every access so that a damaged file surfaces as an
//! error rather than a panic.

use memchr::memchr;
use zerocopy::{FromBytes, LE, U32};

use crate::error::{Error, Result};

/// Read a little-endian u32 from a byte slice at the given offset.
///
/// # Examples
///
/// ```
/// use xmlsilo::common::binary::read_u32_le;
/// let data = [0x78, 0x56, 0x34, 0x12];
/// assert_eq!(read_u32_le(&data, 0).unwrap(), 0x12345678);
/// ```
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(Error::Truncated {
            expected: offset + 4,
            available: data.len(),
        });
    }
    U32::<LE>::read_from_bytes(&data[offset..offset + 4])
        .map(|v| v.get())
        .map_err(|_| Error::InvalidData("failed to read u32".to_string()))
}

/// Overwrite a little-endian u32 in place at the given offset.
///
/// Used to back-patch `next` and `parent` offsets after node emission.
#[inline]
pub fn write_u32_le(data: &mut [u8], offset: usize, value: u32) -> Result<()> {
    if offset + 4 > data.len() {
        return Err(Error::Truncated {
            expected: offset + 4,
            available: data.len(),
        });
    }
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Read a NUL-terminated UTF-8 string starting at the given offset.
///
/// # Examples
///
/// ```
/// use xmlsilo::common::binary::read_cstr;
/// let data = b"book\0title\0";
/// assert_eq!(read_cstr(data, 0).unwrap(), "book");
/// assert_eq!(read_cstr(data, 5).unwrap(), "title");
/// ```
pub fn read_cstr(data: &[u8], offset: usize) -> Result<&str> {
    if offset >= data.len() {
        return Err(Error::Truncated {
            expected: offset + 1,
            available: data.len(),
        });
    }
    let tail = &data[offset..];
    let end = memchr(0, tail)
        .ok_or_else(|| Error::InvalidData(format!("unterminated string at offset {offset}")))?;
    std::str::from_utf8(&tail[..end])
        .map_err(|_| Error::InvalidData(format!("invalid UTF-8 string at offset {offset}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32_le() {
        let data = [0x78, 0x56, 0x34, 0x12, 0xFF];
        assert!(read_u32_le(&data, 0).is_ok_and(|v| v == 0x12345678));
        assert!(read_u32_le(&data, 2).is_err());
    }

    #[test]
    fn test_write_u32_le() {
        let mut data = [0u8; 8];
        write_u32_le(&mut data, 2, 0xAABBCCDD).unwrap();
        assert_eq!(read_u32_le(&data, 2).unwrap(), 0xAABBCCDD);
        assert!(write_u32_le(&mut data, 6, 1).is_err());
    }

    #[test]
    fn test_read_cstr() {
        let data = b"a\0\0hi\0";
        assert_eq!(read_cstr(data, 0).unwrap(), "a");
        assert_eq!(read_cstr(data, 2).unwrap(), "");
        assert_eq!(read_cstr(data, 3).unwrap(), "hi");
        assert!(read_cstr(b"no-nul", 0).is_err());
        assert!(read_cstr(data, 6).is_err());
    }
}
