// SPDX-License-Identifier: MIT

//! Directory content codec.
//!
//! A directory's content is the concatenation of its entries in insertion
//! order. `.` and `..` are never stored.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use zerocopy::{FromBytes, IntoBytes};

use crate::core::{FsDirError, FsDirResult};
use crate::fs::slofs::{constant::*, types::*};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub fileno: u32,
    pub kind: SloNodeKind,
}

impl DirEntry {
    pub fn new(name: &str, fileno: u32, kind: SloNodeKind) -> Self {
        Self {
            name: String::from(name),
            fileno,
            kind,
        }
    }

    #[inline]
    fn encoded_len(&self) -> usize {
        SLO_DIRENT_HEADER_SIZE + self.name.len()
    }
}

/// Rejects names that cannot be stored as a single path component.
pub fn validate_name(name: &str) -> FsDirResult {
    let ok = !name.is_empty()
        && name.len() <= SLO_MAX_NAME_LEN
        && name != "."
        && name != ".."
        && !name.bytes().any(|b| b == b'/' || b == 0);
    if ok { Ok(()) } else { Err(FsDirError::InvalidName) }
}

/// Ordered entry list of one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirTable {
    entries: Vec<DirEntry>,
}

impl DirTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a directory's content.
    ///
    /// Fails with `Corrupted` on truncated entries, trailing bytes, invalid
    /// names, zero filenos, unknown kinds and duplicate names.
    pub fn decode(bytes: &[u8]) -> FsDirResult<Self> {
        let mut table = Self::new();
        let mut rest = bytes;

        while !rest.is_empty() {
            let (header, tail) =
                SloDirEntryHeader::read_from_prefix(rest).map_err(|_| FsDirError::Corrupted)?;
            let name_len = header.name_len as usize;
            let fileno = header.fileno;

            crate::ensure!(tail.len() >= name_len && fileno != 0, FsDirError::Corrupted);
            let kind = SloNodeKind::from_raw(header.kind).ok_or(FsDirError::Corrupted)?;
            let name = core::str::from_utf8(&tail[..name_len]).map_err(|_| FsDirError::Corrupted)?;

            table
                .insert(DirEntry::new(name, fileno, kind))
                .map_err(|_| FsDirError::Corrupted)?;
            rest = &tail[name_len..];
        }

        Ok(table)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for entry in &self.entries {
            let header = SloDirEntryHeader {
                fileno: entry.fileno,
                name_len: entry.name.len() as u16,
                kind: entry.kind.to_raw(),
                reserved: 0,
            };
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(entry.name.as_bytes());
        }
        out
    }

    /// Byte size of the encoded table (the directory's `length`).
    pub fn encoded_len(&self) -> usize {
        self.entries.iter().map(DirEntry::encoded_len).sum()
    }

    /// Appends an entry; the name must be valid and not yet present.
    pub fn insert(&mut self, entry: DirEntry) -> FsDirResult {
        validate_name(&entry.name)?;
        crate::ensure!(self.find(&entry.name).is_none(), FsDirError::DuplicateName);
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        let idx = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(idx))
    }

    /// Renames an entry, keeping its position.
    pub fn rename(&mut self, old: &str, new: &str) -> FsDirResult {
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        crate::ensure!(self.find(new).is_none(), FsDirError::DuplicateName);
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == old)
            .ok_or(FsDirError::Other("no such entry"))?;
        entry.name = String::from(new);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn find_fileno(&self, fileno: u32) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.fileno == fileno)
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
