// SPDX-License-Identifier: MIT

use crate::{BlockIO, BlockIOError, BlockIOResult, BlockIOSetLen};

/// In-memory implementation of `BlockIO`.
///
/// Useful for tests, RAM-backed volumes, virtual disks.
#[derive(Debug)]
pub struct MemBlockIO<'a> {
    buffer: &'a mut [u8],
    logical_len: usize,
}

impl<'a> MemBlockIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let logical_len = buffer.len();

        Self {
            buffer,
            logical_len,
        }
    }

    /// Byte range `offset..offset + len` if it lies inside the logical view.
    #[inline]
    fn range(&self, offset: u64, len: usize) -> BlockIOResult<core::ops::Range<usize>> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(BlockIOError::OutOfBounds)?;
        if end > self.logical_len as u64 {
            return Err(BlockIOError::OutOfBounds);
        }
        Ok(offset as usize..end as usize)
    }
}

impl<'a> BlockIO for MemBlockIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult {
        let range = self.range(offset, data.len())?;
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[range]);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> BlockIOResult {
        Ok(())
    }
}

impl<'a> BlockIOSetLen for MemBlockIO<'a> {
    /// Shrinks or regrows the logical view; the backing slice is fixed.
    fn set_len(&mut self, new_len: u64) -> BlockIOResult {
        if new_len > self.buffer.len() as u64 {
            return Err(BlockIOError::OutOfBounds);
        }
        self.logical_len = new_len as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_rw_and_bounds() {
        let mut buf = [0u8; 64];
        let mut io = MemBlockIO::new(&mut buf);

        io.write_at(60, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 4];
        io.read_at(60, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);

        assert_eq!(io.write_at(61, &[0; 4]), Err(BlockIOError::OutOfBounds));
        assert_eq!(io.read_at(u64::MAX, &mut out), Err(BlockIOError::OutOfBounds));
    }

    #[test]
    fn test_primitives_are_little_endian() {
        let mut buf = [0u8; 32];
        {
            let mut io = MemBlockIO::new(&mut buf);
            io.write_u32_at(16, 0xDEAD_BEEF).unwrap();
            assert_eq!(io.read_u32_at(16).unwrap(), 0xDEAD_BEEF);
            assert!(io.write_u64_at(28, 1).is_err());
        }
        assert_eq!(&buf[16..20], &0xDEAD_BEEFu32.to_le_bytes());
    }

    #[test]
    fn test_set_len_shrinks_logical_view() {
        let mut buf = [0u8; 32];
        let mut io = MemBlockIO::new(&mut buf);
        io.set_len(8).unwrap();
        assert!(io.write_at(8, &[1]).is_err());
        assert!(io.set_len(33).is_err());
    }
}
