// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::string::String;

use sloio::{BlockIO, BlockIOStructExt};

use crate::{
    core::{
        FsError, FsFormatterError, FsFormatterResult, FsResult, traits::FsMeta,
        utils::volume_utils::generate_volume_id_128,
    },
    fs::slofs::{constant::*, types::SloSuperblock},
};

/// Block ranges of the metadata regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SloLayout {
    pub bitmap_start: u32,
    pub bitmap_blocks: u32,
    pub table_start: u32,
    pub table_blocks: u32,
    pub data_start: u32,
}

impl SloLayout {
    /// Superblock, then block bitmap, then record table, then data.
    pub fn compute(block_count: u32, block_size: u32, record_count: u32) -> Self {
        let block_size = block_size.max(1) as u64;
        let bitmap_blocks = (block_count as u64).div_ceil(block_size * 8);
        let table_blocks = (record_count as u64 * SLO_RECORD_SIZE as u64).div_ceil(block_size);

        let bitmap_start = SLO_BITMAP_START as u64;
        let table_start = bitmap_start + bitmap_blocks;
        let data_start = table_start + table_blocks;

        Self {
            bitmap_start: SLO_BITMAP_START,
            bitmap_blocks: saturate(bitmap_blocks),
            table_start: saturate(table_start),
            table_blocks: saturate(table_blocks),
            data_start: saturate(data_start),
        }
    }
}

#[inline]
fn saturate(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone)]
pub struct SloMeta {
    pub volume_id: [u8; 16],
    pub volume_label: [u8; SLO_LABEL_LEN],
    pub volume_size_bytes: u64,
    pub block_size: u32,
    pub block_count: u32,
    pub record_count: u32,
    pub layout: SloLayout,
}

impl SloMeta {
    pub fn new(size_bytes: u64, volume_label: Option<&str>) -> Self {
        Self::new_custom(size_bytes, volume_label, None, SLO_DEFAULT_BLOCK_SIZE, None)
    }

    /// Geometry for a store of `volume_size_bytes`.
    ///
    /// `record_count` defaults to one record per [`SLO_BLOCKS_PER_RECORD`]
    /// blocks, clamped to `[SLO_MIN_RECORDS, SLO_MAX_RECORDS]`. The result is
    /// not validated here; the formatter rejects impossible geometries.
    pub fn new_custom(
        volume_size_bytes: u64,
        volume_label: Option<&str>,
        volume_id: Option<[u8; 16]>,
        block_size: u32,
        record_count: Option<u32>,
    ) -> Self {
        let volume_id = volume_id.unwrap_or_else(|| generate_volume_id_128().to_le_bytes());
        let block_count = saturate(volume_size_bytes / block_size.max(1) as u64);
        let record_count = record_count.unwrap_or_else(|| {
            (block_count / SLO_BLOCKS_PER_RECORD).clamp(SLO_MIN_RECORDS, SLO_MAX_RECORDS)
        });

        Self {
            volume_id,
            volume_label: encode_label(volume_label.unwrap_or("")),
            volume_size_bytes,
            block_size,
            block_count,
            record_count,
            layout: SloLayout::compute(block_count, block_size, record_count),
        }
    }

    pub fn from_superblock(sb: &SloSuperblock) -> Self {
        let block_size = sb.s_block_size;
        let block_count = sb.s_block_count;
        let record_count = sb.s_record_count;

        Self {
            volume_id: sb.s_uuid,
            volume_label: sb.s_label,
            volume_size_bytes: block_count as u64 * block_size as u64,
            block_size,
            block_count,
            record_count,
            layout: SloLayout::compute(block_count, block_size, record_count),
        }
    }

    /// Reads the geometry back from a formatted store.
    pub fn from_io<IO: BlockIO + ?Sized>(io: &mut IO) -> FsResult<Self> {
        let sb: SloSuperblock = io.read_struct(SLO_SUPERBLOCK_OFFSET)?;
        sb.validate().map_err(|_| FsError::BadMagicOrVersion)?;
        Ok(Self::from_superblock(&sb))
    }

    pub fn validate(&self) -> FsFormatterResult {
        let bs = self.block_size;
        crate::ensure!(
            bs.is_power_of_two() && (SLO_MIN_BLOCK_SIZE..=SLO_MAX_BLOCK_SIZE).contains(&bs),
            FsFormatterError::Invalid("block size must be a power of two in 512..=65536")
        );
        crate::ensure!(
            (1..=SLO_MAX_RECORDS).contains(&self.record_count),
            FsFormatterError::Invalid("record count out of range")
        );
        crate::ensure!(
            self.layout.data_start.saturating_add(SLO_MIN_DATA_BLOCKS) <= self.block_count,
            FsFormatterError::Invalid("volume too small")
        );
        Ok(())
    }

    #[inline]
    pub fn block_offset(&self, block: u32) -> u64 {
        block as u64 * self.block_size as u64
    }

    /// Byte offset of the record for `fileno` (1-based).
    #[inline]
    pub fn record_offset(&self, fileno: u32) -> u64 {
        self.block_offset(self.layout.table_start)
            + (fileno.saturating_sub(1) as u64) * SLO_RECORD_SIZE as u64
    }

    #[inline]
    pub fn data_blocks(&self) -> u32 {
        self.block_count.saturating_sub(self.layout.data_start)
    }

    /// Inline extents plus one overflow block of extents.
    #[inline]
    pub fn max_extents(&self) -> usize {
        SLO_INLINE_EXTENTS + self.block_size as usize / SLO_EXTENT_SIZE
    }
}

/// Zero-padded label, truncated on a character boundary.
fn encode_label(label: &str) -> [u8; SLO_LABEL_LEN] {
    let mut out = [0u8; SLO_LABEL_LEN];
    let mut len = label.len().min(SLO_LABEL_LEN);
    while !label.is_char_boundary(len) {
        len -= 1;
    }
    out[..len].copy_from_slice(&label.as_bytes()[..len]);
    out
}

impl FsMeta<u32> for SloMeta {
    fn unit_size(&self) -> usize {
        self.block_size as usize
    }

    fn unit_offset(&self, unit: u32) -> u64 {
        self.block_offset(unit)
    }

    fn root_unit(&self) -> u32 {
        SLO_ROOT_FILENO
    }

    fn first_data_unit(&self) -> u32 {
        self.layout.data_start
    }

    fn last_data_unit(&self) -> u32 {
        self.block_count.saturating_sub(1)
    }

    fn total_units(&self) -> usize {
        self.block_count as usize
    }

    fn size_bytes(&self) -> u64 {
        self.volume_size_bytes
    }

    fn label(&self) -> String {
        let end = self
            .volume_label
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(SLO_LABEL_LEN);
        String::from_utf8_lossy(&self.volume_label[..end]).into_owned()
    }
}
