//! Bounds-checked cursor over an immutable byte slice.
//!
//! Every decoder in this crate drives one of these. All fixed-width reads
//! are little-endian, every operation that would cross the end of the slice
//! fails with [`Error::Underrun`], and peeks hand back sub-slices of the
//! original buffer without copying.

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    offset: usize,
}

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.take(size_of::<$ty>())?;
            Ok(<$ty>::from_le_bytes(bytes.try_into().expect("length checked by take")))
        }
    };
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    read_le!(read_u8, u8);
    read_le!(read_u16, u16);
    read_le!(read_u32, u32);
    read_le!(read_u64, u64);
    read_le!(read_i32, i32);
    read_le!(read_i64, i64);
    read_le!(read_f32, f32);

    /// Advance over `len` bytes and return them as a sub-slice.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(len)?;
        self.offset += len;
        Ok(bytes)
    }

    /// Return the next `len` bytes without advancing.
    pub fn peek(&self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Underrun {
                needed: len,
                offset: self.offset,
                remaining: self.remaining(),
            });
        }
        Ok(&self.data[self.offset..self.offset + len])
    }

    /// Copy the next `dest.len()` bytes into a caller buffer.
    pub fn read_bytes(&mut self, dest: &mut [u8]) -> Result<()> {
        let bytes = self.take(dest.len())?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// Read `len` bytes as an owned string. The archive formats carry raw
    /// byte strings with no terminator; anything non-UTF-8 is replaced.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len)?;
        Ok(())
    }

    /// Seek to an absolute offset. Seeking to the end of the slice is legal.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::SeekOutOfRange {
                position,
                len: self.data.len(),
            });
        }
        self.offset = position;
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }
}
