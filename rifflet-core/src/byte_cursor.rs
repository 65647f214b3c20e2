//! Position-tracking little-endian reader
//!
//! Thin adapter over any `Read + Seek` source. The physical length is
//! sampled once at construction and every read is bounds-checked against
//! it, so a truncated file surfaces as `UnexpectedEof` instead of a short
//! read halfway through a header.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{AviError, Result};
use crate::riff::FourCC;

#[derive(Debug)]
pub struct ByteCursor<R: Read + Seek> {
    reader: R,
    position: u64,
    length: u64,
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap `reader`, starting at its current position.
    pub fn new(mut reader: R) -> Result<Self> {
        let position = reader.stream_position()?;
        let length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(position))?;

        Ok(Self { reader, position, length })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    fn ensure(&self, needed: u64) -> Result<()> {
        if needed > self.remaining() {
            return Err(AviError::UnexpectedEof {
                position: self.position,
                needed,
            });
        }
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let v = self.reader.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        let v = self.reader.read_i16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let v = self.reader.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let v = self.reader.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        let mut tag = [0u8; 4];
        self.read_bytes(&mut tag)?;
        Ok(FourCC(tag))
    }

    /// Fill `dst` completely.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<()> {
        self.ensure(dst.len() as u64)?;
        self.reader.read_exact(dst)?;
        self.position += dst.len() as u64;
        Ok(())
    }

    /// Move forward `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.ensure(n)?;
        let offset = i64::try_from(n).map_err(|_| AviError::UnexpectedEof {
            position: self.position,
            needed: n,
        })?;
        self.reader.seek(SeekFrom::Current(offset))?;
        self.position += n;
        Ok(())
    }
}
