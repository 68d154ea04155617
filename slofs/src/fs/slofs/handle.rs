// SPDX-License-Identifier: MIT

//! Open file and directory handles.
//!
//! Handles are plain tokens; the cursor state lives in the volume that
//! issued them. A token is only honoured by that volume, and only while the
//! record it was opened on is still the same live record.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use bitflags::bitflags;

use crate::core::{FsError, FsResult};

bitflags! {
    /// Effects of an `open` mode string.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        const READ     = 1 << 0;
        const WRITE    = 1 << 1;
        /// Create the file if missing.
        const CREATE   = 1 << 2;
        /// Drop existing content on open.
        const TRUNCATE = 1 << 3;
        /// Every write lands at end of file.
        const APPEND   = 1 << 4;
    }
}

impl OpenFlags {
    /// Parses an fopen-style mode (`r`, `r+`, `w`, `w+`, `a`, `a+`; `b` is ignored).
    pub fn parse(mode: &str) -> FsResult<Self> {
        let mut base = None;
        let mut plus = false;
        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' if base.is_none() => base = Some(c),
                '+' if !plus => plus = true,
                'b' => {}
                _ => return Err(FsError::BadMode),
            }
        }

        let flags = match base.ok_or(FsError::BadMode)? {
            'r' => OpenFlags::READ,
            'w' => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            _ => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND,
        };
        Ok(if plus {
            flags | OpenFlags::READ | OpenFlags::WRITE
        } else {
            flags
        })
    }
}

/// Reference point of [`seek`](crate::fs::slofs::volume::SloVolume::seek).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    /// `pos + loc`
    Forward,
    /// `pos - loc`
    Rewind,
    /// `loc`
    Absolute,
}

impl SeekWhence {
    /// New cursor position, or `InvalidSeek` if it would be negative.
    pub fn apply(self, pos: u64, loc: i64) -> FsResult<u64> {
        let pos = pos as i128;
        let loc = loc as i128;
        let next = match self {
            SeekWhence::Forward => pos + loc,
            SeekWhence::Rewind => pos - loc,
            SeekWhence::Absolute => loc,
        };
        if next < 0 || next > i64::MAX as i128 {
            return Err(FsError::InvalidSeek);
        }
        Ok(next as u64)
    }
}

/// Token of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SloFile {
    pub(crate) volume: u32,
    pub(crate) id: u32,
}

/// Token of an open directory stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SloDir {
    pub(crate) volume: u32,
    pub(crate) id: u32,
}

/// Cursor state behind a [`SloFile`].
#[derive(Debug, Clone)]
pub(crate) struct FileState {
    pub fileno: u32,
    pub generation: u32,
    pub flags: OpenFlags,
    /// Length last observed through this handle.
    pub length: u64,
    pub pos: u64,
}

/// Cursor state behind a [`SloDir`].
#[derive(Debug, Clone)]
pub(crate) struct DirState {
    pub fileno: u32,
    pub generation: u32,
    /// Entry names as of `opendir` or the last `rewinddir`.
    pub names: Vec<String>,
    pub pos: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(OpenFlags::parse("r").unwrap(), OpenFlags::READ);
        assert_eq!(
            OpenFlags::parse("r+").unwrap(),
            OpenFlags::READ | OpenFlags::WRITE
        );
        assert_eq!(
            OpenFlags::parse("wb").unwrap(),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE
        );
        assert!(OpenFlags::parse("a+").unwrap().contains(OpenFlags::APPEND | OpenFlags::READ));
        assert!(OpenFlags::parse("rb+").unwrap().contains(OpenFlags::WRITE));
    }

    #[test]
    fn test_bad_modes() {
        for bad in ["", "x", "rw", "r++", "+"] {
            assert_eq!(OpenFlags::parse(bad), Err(FsError::BadMode), "{bad:?}");
        }
    }

    #[test]
    fn test_seek_arithmetic() {
        assert_eq!(SeekWhence::Absolute.apply(10, 3), Ok(3));
        assert_eq!(SeekWhence::Forward.apply(10, 3), Ok(13));
        assert_eq!(SeekWhence::Rewind.apply(10, 3), Ok(7));
        assert_eq!(SeekWhence::Rewind.apply(2, 3), Err(FsError::InvalidSeek));
        assert_eq!(SeekWhence::Absolute.apply(0, -1), Err(FsError::InvalidSeek));
        assert_eq!(SeekWhence::Forward.apply(5, -5), Ok(0));
        assert_eq!(
            SeekWhence::Forward.apply(i64::MAX as u64, 1),
            Err(FsError::InvalidSeek)
        );
    }
}
