//! Bounds-checked cursor over a frame.

use crate::DecodeError;

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                expected: n,
                got: remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// A one-byte length prefix followed by that many UTF-8 bytes.
    pub(crate) fn string(&mut self, max_len: usize) -> Result<String, DecodeError> {
        let offset = self.pos;
        let len = usize::from(self.u8()?);
        if len > max_len {
            return Err(DecodeError::StringTooLong {
                offset,
                expected: max_len,
                got: len,
            });
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8 { offset: offset + 1 })
    }

    /// Fails if any bytes are left over.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        if self.pos < self.buf.len() {
            return Err(DecodeError::TrailingBytes {
                offset: self.pos,
                expected: self.pos,
                got: self.buf.len(),
            });
        }
        Ok(())
    }
}
