//! Bounds-checked little-endian cursor over a blob

use crate::errors::{BlobKind, MalformedTreeError, Result};

pub(crate) struct BlobReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    kind: BlobKind,
}

impl<'a> BlobReader<'a> {
    pub fn new(bytes: &'a [u8], kind: BlobKind) -> Self {
        Self {
            bytes,
            pos: 0,
            kind,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless `needed` bytes starting at `offset` lie inside the blob
    pub fn check_range(&self, offset: usize, needed: usize) -> Result<()> {
        match offset.checked_add(needed) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(MalformedTreeError::OutOfBounds {
                blob: self.kind,
                offset,
                needed,
                len: self.bytes.len(),
            }),
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.check_range(self.pos, n)?;
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    /// Unsigned integer of 1 to 4 bytes
    pub fn uint(&mut self, width: usize) -> Result<usize> {
        let b = self.take(width)?;
        let mut value = 0usize;
        for (i, byte) in b.iter().enumerate() {
            value |= (*byte as usize) << (8 * i);
        }
        Ok(value)
    }
}
