// SPDX-License-Identifier: MIT
//! Directory entry header

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Fixed part of one directory entry (8 bytes), followed by `name_len`
/// bytes of UTF-8 name.
#[derive(Debug, Clone, Copy, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct SloDirEntryHeader {
    pub fileno: u32,
    pub name_len: u16,
    /// Kind byte of the target record, duplicated for listing without lookups
    pub kind: u8,
    pub reserved: u8,
}

const _: () = assert!(
    core::mem::size_of::<SloDirEntryHeader>() == crate::fs::slofs::constant::SLO_DIRENT_HEADER_SIZE
);
