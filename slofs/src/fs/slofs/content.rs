// SPDX-License-Identifier: MIT

//! Byte-range IO over a record's extents.
//!
//! A record's extents form one logical byte range; these helpers split a
//! logical range into one physical access per run it touches.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sloio::{
    BlockIO, BlockIOExt,
    errors::{BlockIOError, BlockIOResult},
};

use crate::fs::slofs::types::SloExtents;

/// Physical piece of a logical range: `(store offset, offset in caller buffer, length)`.
type Span = (u64, usize, usize);

fn spans(extents: &SloExtents, block_size: u32, offset: u64, len: usize) -> BlockIOResult<Vec<Span>> {
    let bs = block_size as u64;
    let end = offset
        .checked_add(len as u64)
        .ok_or(BlockIOError::OutOfBounds)?;
    let mut out = Vec::new();
    let mut run_start = 0u64;

    for run in extents.as_slice() {
        if run_start >= end {
            break;
        }
        let run_end = run_start + run.len as u64 * bs;
        let from = offset.max(run_start);
        let to = end.min(run_end);
        if from < to {
            let phys = run.start as u64 * bs + (from - run_start);
            out.push((phys, (from - offset) as usize, (to - from) as usize));
        }
        run_start = run_end;
    }

    if len > 0 && end > run_start {
        return Err(BlockIOError::OutOfBounds);
    }
    Ok(out)
}

/// Reads `buf.len()` bytes at logical `offset`.
pub fn read_content<IO: BlockIO + ?Sized>(
    io: &mut IO,
    extents: &SloExtents,
    block_size: u32,
    offset: u64,
    buf: &mut [u8],
) -> BlockIOResult {
    for (phys, at, len) in spans(extents, block_size, offset, buf.len())? {
        io.read_block_best_effort(phys, &mut buf[at..at + len], block_size as usize)?;
    }
    Ok(())
}

/// Writes `data` at logical `offset`; the extents must already cover the range.
pub fn write_content<IO: BlockIO + ?Sized>(
    io: &mut IO,
    extents: &SloExtents,
    block_size: u32,
    offset: u64,
    data: &[u8],
) -> BlockIOResult {
    for (phys, at, len) in spans(extents, block_size, offset, data.len())? {
        io.write_block_best_effort(phys, &data[at..at + len], block_size as usize)?;
    }
    Ok(())
}

/// Zero-fills `len` bytes at logical `offset`.
pub fn zero_content<IO: BlockIO + ?Sized>(
    io: &mut IO,
    extents: &SloExtents,
    block_size: u32,
    offset: u64,
    len: u64,
) -> BlockIOResult {
    let len = usize::try_from(len).map_err(|_| BlockIOError::OutOfBounds)?;
    for (phys, _, n) in spans(extents, block_size, offset, len)? {
        io.zero_fill(phys, n)?;
    }
    Ok(())
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::fs::slofs::types::SloExtent;
    use sloio::prelude::MemBlockIO;

    #[test]
    fn test_range_across_runs() {
        let mut disk = vec![0u8; 16 * 512];
        let mut io = MemBlockIO::new(&mut disk);
        let ext = SloExtents::from_runs([SloExtent::new(2, 1), SloExtent::new(7, 2)]);

        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        write_content(&mut io, &ext, 512, 100, &data).unwrap();

        let mut back = vec![0u8; 1000];
        read_content(&mut io, &ext, 512, 100, &mut back).unwrap();
        assert_eq!(back, data);

        drop(io);
        // First 412 bytes land in block 2, the rest at the start of block 7.
        assert_eq!(disk[2 * 512 + 100], 0);
        assert_eq!(disk[2 * 512 + 511], data[411]);
        assert_eq!(disk[7 * 512], data[412]);
    }

    #[test]
    fn test_range_past_extents_is_rejected() {
        let mut disk = vec![0u8; 16 * 512];
        let mut io = MemBlockIO::new(&mut disk);
        let ext = SloExtents::single(3, 1);

        let mut buf = [0u8; 16];
        assert_eq!(
            read_content(&mut io, &ext, 512, 500, &mut buf),
            Err(BlockIOError::OutOfBounds)
        );
        assert!(read_content(&mut io, &ext, 512, 496, &mut buf).is_ok());
        assert!(read_content(&mut io, &SloExtents::new(), 512, 0, &mut []).is_ok());
    }

    #[test]
    fn test_zero_content() {
        let mut disk = vec![0xAAu8; 8 * 512];
        let mut io = MemBlockIO::new(&mut disk);
        let ext = SloExtents::single(1, 2);
        zero_content(&mut io, &ext, 512, 10, 600).unwrap();

        drop(io);
        assert_eq!(disk[512 + 9], 0xAA);
        assert!(disk[512 + 10..512 + 610].iter().all(|&b| b == 0));
        assert_eq!(disk[512 + 610], 0xAA);
    }
}
