use std::io::{self, Read, Write};

/// Longest LEB128 encoding of a `u64`.
pub(crate) const MAX_VARINT_LEN: usize = 10;

#[inline]
pub(crate) fn encode(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            return len + 1;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
}

pub(crate) fn write(out: &mut dyn Write, value: u64) -> io::Result<()> {
    let mut buf = [0; MAX_VARINT_LEN];
    let len = encode(value, &mut buf);
    out.write_all(&buf[..len])
}

/// Decodes one LEB128 value, pulling bytes from `next`.
///
/// Returns `Ok(None)` when the encoding is longer than a `u64` allows.
pub(crate) fn decode<E>(mut next: impl FnMut() -> Result<u8, E>) -> Result<Option<u64>, E> {
    let mut value = 0_u64;
    for index in 0..MAX_VARINT_LEN {
        let byte = next()?;
        let bits = u64::from(byte & 0x7F);
        let shift = 7 * index as u32;
        if index == MAX_VARINT_LEN - 1 && bits > 1 {
            return Ok(None);
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

pub(crate) fn read(input: &mut dyn Read) -> io::Result<Option<u64>> {
    decode(|| {
        let mut byte = [0];
        input.read_exact(&mut byte)?;
        Ok(byte[0])
    })
}

#[inline]
pub(crate) const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub(crate) const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_lengths() {
        let mut buf = [0; MAX_VARINT_LEN];
        assert_eq!(encode(0, &mut buf), 1);
        assert_eq!(encode(127, &mut buf), 1);
        assert_eq!(encode(128, &mut buf), 2);
        assert_eq!(buf[..2], [0x80, 0x01]);
        assert_eq!(encode(u64::MAX, &mut buf), MAX_VARINT_LEN);
    }

    #[test]
    fn overlong_is_rejected() {
        let bytes = [0xFF_u8; 11];
        let mut input = &bytes[..];
        assert_eq!(read(&mut input).unwrap(), None);
    }

    #[test]
    fn zigzag_small_magnitudes() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(unzigzag(zigzag(i64::MIN)), i64::MIN);
        assert_eq!(unzigzag(zigzag(i64::MAX)), i64::MAX);
    }
}
