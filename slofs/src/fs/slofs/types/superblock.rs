// SPDX-License-Identifier: MIT
//! slofs superblock

#[cfg(not(feature = "std"))]
use alloc::string::String;

use time::OffsetDateTime;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::core::utils::time_utils::datetime_to_parts;
use crate::fs::slofs::{constant::*, meta::SloLayout, meta::SloMeta};

/// slofs superblock (256 bytes at offset 0 of the store).
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct SloSuperblock {
    // 0x00
    /// Signature `SLOF`
    pub s_magic: [u8; 4],
    /// Format version (major, minor, teeny)
    pub s_version: [u8; 3],
    /// 1 if the last mount ended with an orderly unmount
    pub s_clean: u8,
    // 0x08
    pub s_block_size: u32,
    pub s_block_count: u32,
    pub s_free_blocks: u32,
    pub s_record_count: u32,
    // 0x18
    pub s_free_records: u32,
    pub s_root_fileno: u32,
    pub s_bitmap_start: u32,
    pub s_bitmap_blocks: u32,
    // 0x28
    pub s_table_start: u32,
    pub s_table_blocks: u32,
    pub s_data_start: u32,
    pub s_mount_count: u32,
    // 0x38
    /// Unix seconds
    pub s_mkfs_time: i64,
    pub s_mount_time: i64,
    pub s_write_time: i64,
    // 0x50
    pub s_uuid: [u8; 16],
    // 0x60
    pub s_label: [u8; SLO_LABEL_LEN],
    // 0x80
    pub s_reserved: [u8; 124],
    // 0xFC
    /// CRC-32 of bytes 0x00..0xFC
    pub s_checksum: u32,
}

const _: () = assert!(core::mem::size_of::<SloSuperblock>() == SLO_SUPERBLOCK_SIZE);

impl SloSuperblock {
    /// Fresh superblock for a newly formatted volume (clean, root only).
    pub fn from_meta(meta: &SloMeta, now: OffsetDateTime) -> Self {
        let (secs, _) = datetime_to_parts(now);
        let layout = meta.layout;

        let mut sb = Self::new_zeroed();
        sb.s_magic = SLO_MAGIC;
        sb.s_version = SLO_VERSION;
        sb.s_clean = 1;
        sb.s_block_size = meta.block_size;
        sb.s_block_count = meta.block_count;
        sb.s_free_blocks = meta.data_blocks();
        sb.s_record_count = meta.record_count;
        sb.s_free_records = meta.record_count - 1;
        sb.s_root_fileno = SLO_ROOT_FILENO;
        sb.s_bitmap_start = layout.bitmap_start;
        sb.s_bitmap_blocks = layout.bitmap_blocks;
        sb.s_table_start = layout.table_start;
        sb.s_table_blocks = layout.table_blocks;
        sb.s_data_start = layout.data_start;
        sb.s_mkfs_time = secs;
        sb.s_write_time = secs;
        sb.s_uuid = meta.volume_id;
        sb.s_label = meta.volume_label;
        sb.seal();
        sb
    }

    pub fn compute_checksum(&self) -> u32 {
        crc32fast::hash(&self.as_bytes()[..SLO_SUPERBLOCK_CSUM_LEN])
    }

    /// Recomputes the checksum; call after every field change.
    pub fn seal(&mut self) {
        self.s_checksum = self.compute_checksum();
    }

    #[inline]
    pub fn has_magic(&self) -> bool {
        self.s_magic == SLO_MAGIC
    }

    /// Same major version, minor not newer than ours.
    pub fn is_supported_version(&self) -> bool {
        let [major, minor, _] = self.s_version;
        major == SLO_VERSION[0] && minor <= SLO_VERSION[1]
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.s_clean != 0
    }

    /// Checks signature, version, checksum and region layout.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.has_magic() {
            return Err("bad magic");
        }
        if !self.is_supported_version() {
            return Err("unsupported version");
        }
        let stored = self.s_checksum;
        if stored != self.compute_checksum() {
            return Err("superblock checksum mismatch");
        }
        self.validate_geometry()
    }

    pub fn validate_geometry(&self) -> Result<(), &'static str> {
        let block_size = self.s_block_size;
        if !block_size.is_power_of_two()
            || !(SLO_MIN_BLOCK_SIZE..=SLO_MAX_BLOCK_SIZE).contains(&block_size)
        {
            return Err("invalid block size");
        }
        let record_count = self.s_record_count;
        if record_count == 0 || record_count > SLO_MAX_RECORDS {
            return Err("invalid record count");
        }
        if self.s_root_fileno != SLO_ROOT_FILENO {
            return Err("invalid root fileno");
        }

        let expected = SloLayout::compute(self.s_block_count, block_size, record_count);
        let found = SloLayout {
            bitmap_start: self.s_bitmap_start,
            bitmap_blocks: self.s_bitmap_blocks,
            table_start: self.s_table_start,
            table_blocks: self.s_table_blocks,
            data_start: self.s_data_start,
        };
        if expected != found {
            return Err("region layout mismatch");
        }

        let data_start = self.s_data_start;
        let block_count = self.s_block_count;
        if data_start.saturating_add(SLO_MIN_DATA_BLOCKS) > block_count {
            return Err("data region too small");
        }
        if self.s_free_blocks > block_count - data_start || self.s_free_records >= record_count {
            return Err("free counters out of range");
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        let label = self.s_label;
        let end = label.iter().position(|&c| c == 0).unwrap_or(label.len());
        String::from_utf8_lossy(&label[..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::time_utils::now_utc;

    fn sample() -> SloSuperblock {
        let meta = SloMeta::new_custom(4 * 1024 * 1024, Some("unit"), Some([7; 16]), 4096, None);
        SloSuperblock::from_meta(&meta, now_utc())
    }

    #[test]
    fn test_fresh_superblock_validates() {
        let sb = sample();
        assert_eq!(sb.validate(), Ok(()));
        assert!(sb.is_clean());
        assert_eq!(sb.label(), "unit");
        assert_eq!({ sb.s_block_count }, 1024);
    }

    #[test]
    fn test_checksum_detects_damage() {
        let mut sb = sample();
        sb.s_free_blocks = sb.s_free_blocks.wrapping_sub(1);
        assert_eq!(sb.validate(), Err("superblock checksum mismatch"));
        sb.seal();
        assert_eq!(sb.validate(), Ok(()));
    }

    #[test]
    fn test_version_rules() {
        let mut sb = sample();
        sb.s_version = [SLO_VERSION[0], SLO_VERSION[1], 9];
        assert!(sb.is_supported_version());

        sb.s_version = [SLO_VERSION[0], SLO_VERSION[1] + 1, 0];
        assert!(!sb.is_supported_version());

        sb.s_version = [SLO_VERSION[0] + 1, 0, 0];
        assert!(!sb.is_supported_version());
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let mut sb = sample();
        sb.s_table_start = sb.s_table_start + 1;
        sb.seal();
        assert_eq!(sb.validate(), Err("region layout mismatch"));
    }
}
