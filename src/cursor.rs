use crate::{AxmlError, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{self, ErrorKind, Read};

/// Forward-only little-endian reader that counts consumed bytes
pub struct ByteCursor<R: Read> {
    reader: R,
    position: u32,
}

impl<R: Read> ByteCursor<R> {
    /// Create a new cursor positioned at offset 0
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
        }
    }

    /// Number of bytes consumed so far
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Read a 32-bit signed integer (little-endian)
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(LittleEndian::read_i32(&buf))
    }

    /// Read `count` consecutive 32-bit words
    pub fn read_u32_array(&mut self, count: u32) -> Result<Vec<u32>> {
        let bytes = self.read_bytes(count.saturating_mul(4))?;
        let mut words = vec![0u32; count as usize];
        LittleEndian::read_u32_into(&bytes, &mut words);
        Ok(words)
    }

    /// Read exactly `length` bytes
    pub fn read_bytes(&mut self, length: u32) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(length.min(1 << 20) as usize);
        let read = self
            .reader
            .by_ref()
            .take(u64::from(length))
            .read_to_end(&mut data)?;
        self.advance(length, read as u64)?;
        Ok(data)
    }

    /// Discard exactly `length` bytes
    pub fn skip(&mut self, length: u32) -> Result<()> {
        let skipped = io::copy(
            &mut self.reader.by_ref().take(u64::from(length)),
            &mut io::sink(),
        )?;
        self.advance(length, skipped)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(AxmlError::Io(e)),
            }
        }
        self.advance(buf.len() as u32, filled as u64)
    }

    fn advance(&mut self, requested: u32, available: u64) -> Result<()> {
        if available < u64::from(requested) {
            return Err(AxmlError::TruncatedInput {
                offset: self.position,
                requested,
                available: available as u32,
            });
        }
        self.position = self.position.wrapping_add(requested);
        Ok(())
    }
}
