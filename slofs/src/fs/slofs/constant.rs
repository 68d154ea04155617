// SPDX-License-Identifier: MIT

// === Superblock ===

pub const SLO_MAGIC: [u8; 4] = *b"SLOF";

/// Format version (major, minor, teeny).
pub const SLO_VERSION: [u8; 3] = [0, 1, 0];

pub const SLO_SUPERBLOCK_OFFSET: u64 = 0;
pub const SLO_SUPERBLOCK_SIZE: usize = 256;

/// Bytes covered by the superblock checksum (everything but the checksum).
pub const SLO_SUPERBLOCK_CSUM_LEN: usize = SLO_SUPERBLOCK_SIZE - 4;

pub const SLO_LABEL_LEN: usize = 32;

// === Block Size ===

pub const SLO_DEFAULT_BLOCK_SIZE: u32 = 4096;
pub const SLO_MIN_BLOCK_SIZE: u32 = 512;
pub const SLO_MAX_BLOCK_SIZE: u32 = 65536;

/// Smallest data region a volume may have.
pub const SLO_MIN_DATA_BLOCKS: u32 = 2;

// === Regions ===

pub const SLO_SUPERBLOCK_BLOCK: u32 = 0;
pub const SLO_BITMAP_START: u32 = 1;

// === Records ===

pub const SLO_RECORD_SIZE: usize = 256;
pub const SLO_ROOT_FILENO: u32 = 1;

/// Default record table sizing: one record per this many blocks.
pub const SLO_BLOCKS_PER_RECORD: u32 = 4;
pub const SLO_MIN_RECORDS: u32 = 16;
pub const SLO_MAX_RECORDS: u32 = 65536;

pub const SLO_KIND_FREE: u8 = 0;
pub const SLO_KIND_FILE: u8 = 1;
pub const SLO_KIND_DIR: u8 = 2;

// === Extents ===

pub const SLO_INLINE_EXTENTS: usize = 24;
pub const SLO_EXTENT_SIZE: usize = 8;

// === Directory entries ===

/// `fileno:u32, name_len:u16, kind:u8, reserved:u8`
pub const SLO_DIRENT_HEADER_SIZE: usize = 8;
pub const SLO_MAX_NAME_LEN: usize = 255;
