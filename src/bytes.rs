use anyhow::{bail, Result};

/// A bounds-checked reader over a byte buffer.
///
/// Every decode operation in the crate goes through a cursor, so no read can
/// ever reach past the end of the buffer it was given. Reads that would do so
/// fail instead of truncating.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at the start of a buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Creates a cursor positioned at an offset into a buffer.
    ///
    /// This is the resolution point for compression pointers; an offset at or
    /// beyond the end of the buffer is rejected here.
    pub fn at(buf: &'a [u8], offset: usize) -> Result<Self> {
        if offset >= buf.len() {
            bail!(
                "offset {offset} is out of bounds for a {} byte message",
                buf.len()
            );
        }
        Ok(Self { buf, pos: offset })
    }

    /// Returns the current position in the buffer.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns a slice that represents the unread bytes.
    fn remainder(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Reads the next byte from the buffer without advancing the position.
    pub fn peek(&self) -> Result<u8> {
        match self.remainder().first() {
            Some(byte) => Ok(*byte),
            None => bail!("unexpected end of message at offset {}", self.pos),
        }
    }

    /// Reads the next byte from the buffer.
    pub fn read(&mut self) -> Result<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads the next n bytes from the buffer.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remainder().len() < n {
            bail!(
                "unexpected end of message: wanted {n} bytes at offset {}, {} remain",
                self.pos,
                self.remainder().len()
            );
        }
        let bytes = &self.remainder()[..n];
        self.pos += n;
        Ok(bytes)
    }

    /// Skips the next n bytes of the buffer.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_exact(n)?;
        Ok(())
    }

    /// Reads a big-endian u16 from the buffer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian u32 from the buffer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
