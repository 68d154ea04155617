// SPDX-License-Identifier: MIT

use core::fmt;

pub use sloio::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsAllocatorError {
    OutOfSpace,
    /// The record would need more extents than it can address.
    TooFragmented,
    DoubleFree(u32),
    Other(&'static str),
}

impl FsAllocatorError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsAllocatorError::OutOfSpace => "Out of space",
            FsAllocatorError::TooFragmented => "Too many extents for one record",
            FsAllocatorError::DoubleFree(_) => "Block is already free",
            FsAllocatorError::Other(msg) => msg,
        }
    }
}

impl fmt::Display for FsAllocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        if let FsAllocatorError::DoubleFree(block) = self {
            write!(f, " (block: {block})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsDirError {
    DuplicateName,
    InvalidName,
    Corrupted,
    Other(&'static str),
}

impl FsDirError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsDirError::DuplicateName => "Name already exists in directory",
            FsDirError::InvalidName => "Invalid entry name",
            FsDirError::Corrupted => "Corrupted directory",
            FsDirError::Other(msg) => msg,
        }
    }
}

impl fmt::Display for FsDirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsTableError {
    IO(BlockIOError),
    Allocator(FsAllocatorError),
    TableFull,
    InvalidFileno(u32),
    Corrupted,
    Other(&'static str),
}

impl FsTableError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsTableError::IO(_) => "IO error",
            FsTableError::Allocator(_) => "Allocator error",
            FsTableError::TableFull => "Record table is full",
            FsTableError::InvalidFileno(_) => "No live record for fileno",
            FsTableError::Corrupted => "Corrupted record",
            FsTableError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsTableError::IO(e) => Some(FsError::IO(*e)),
            FsTableError::Allocator(e) => Some(FsError::Allocator(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for FsTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        if let FsTableError::InvalidFileno(fileno) = self {
            write!(f, " (fileno: {fileno})")?;
        }
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsFormatterError {
    IO(BlockIOError),
    AlreadyFormatted,
    Invalid(&'static str),
    Other(&'static str),
}

impl FsFormatterError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsFormatterError::IO(_) => "IO error",
            FsFormatterError::AlreadyFormatted => "Store already holds a filesystem",
            FsFormatterError::Invalid(msg) => msg,
            FsFormatterError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsFormatterError::IO(e) => Some(FsError::IO(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for FsFormatterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCheckerError {
    IO(BlockIOError),
    Table(FsTableError),
    Invalid(&'static str),
    Other(&'static str),
}

impl FsCheckerError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsCheckerError::IO(_) => "IO error",
            FsCheckerError::Table(_) => "Record table error",
            FsCheckerError::Invalid(msg) => msg,
            FsCheckerError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsCheckerError::IO(e) => Some(FsError::IO(*e)),
            FsCheckerError::Table(e) => Some(FsError::Table(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for FsCheckerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

/// Top-level error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    IO(BlockIOError),
    Allocator(FsAllocatorError),
    Dir(FsDirError),
    Table(FsTableError),
    Formatter(FsFormatterError),
    Checker(FsCheckerError),
    BadMagicOrVersion,
    NotFound,
    NotADirectory,
    IsADirectory,
    TypeMismatch,
    InvalidSeek,
    InvalidHandle,
    InvalidPath,
    BadMode,
    Other(&'static str),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

impl FsError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsError::IO(e) => e.msg(),
            FsError::Allocator(e) => e.msg(),
            FsError::Dir(e) => e.msg(),
            FsError::Table(e) => e.msg(),
            FsError::Formatter(e) => e.msg(),
            FsError::Checker(e) => e.msg(),
            FsError::BadMagicOrVersion => "Unsupported filesystem signature or version",
            FsError::NotFound => "No such file or directory",
            FsError::NotADirectory => "Not a directory",
            FsError::IsADirectory => "Is a directory",
            FsError::TypeMismatch => "Source and target types differ",
            FsError::InvalidSeek => "Seek before start of file",
            FsError::InvalidHandle => "Invalid or closed handle",
            FsError::InvalidPath => "Invalid path",
            FsError::BadMode => "Bad open mode",
            FsError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<FsError> {
        match self {
            FsError::Table(e) => e.source(),
            FsError::Formatter(e) => e.source(),
            FsError::Checker(e) => e.source(),
            _ => None,
        }
    }

    /// Flattens the layered error into the caller-facing taxonomy.
    pub fn kind(&self) -> FsErrorKind {
        match self {
            FsError::IO(_) => FsErrorKind::IOError,
            FsError::Allocator(e) => match e {
                FsAllocatorError::OutOfSpace | FsAllocatorError::TooFragmented => {
                    FsErrorKind::OutOfSpace
                }
                FsAllocatorError::DoubleFree(_) => FsErrorKind::Corrupted,
                FsAllocatorError::Other(_) => FsErrorKind::Other,
            },
            FsError::Dir(e) => match e {
                FsDirError::DuplicateName => FsErrorKind::DuplicateName,
                FsDirError::InvalidName => FsErrorKind::InvalidPath,
                FsDirError::Corrupted => FsErrorKind::CorruptDirectory,
                FsDirError::Other(_) => FsErrorKind::Other,
            },
            FsError::Table(e) => match e {
                FsTableError::IO(_) => FsErrorKind::IOError,
                FsTableError::Allocator(a) => FsError::Allocator(*a).kind(),
                FsTableError::TableFull => FsErrorKind::TableFull,
                FsTableError::InvalidFileno(_) | FsTableError::Corrupted => FsErrorKind::Corrupted,
                FsTableError::Other(_) => FsErrorKind::Other,
            },
            FsError::Formatter(e) => match e {
                FsFormatterError::IO(_) => FsErrorKind::IOError,
                FsFormatterError::AlreadyFormatted => FsErrorKind::AlreadyFormatted,
                FsFormatterError::Invalid(_) | FsFormatterError::Other(_) => FsErrorKind::Other,
            },
            FsError::Checker(e) => match e {
                FsCheckerError::IO(_) => FsErrorKind::IOError,
                FsCheckerError::Table(t) => FsError::Table(*t).kind(),
                FsCheckerError::Invalid(_) | FsCheckerError::Other(_) => FsErrorKind::Other,
            },
            FsError::BadMagicOrVersion => FsErrorKind::BadMagicOrVersion,
            FsError::NotFound => FsErrorKind::NotFound,
            FsError::NotADirectory => FsErrorKind::NotADirectory,
            FsError::IsADirectory => FsErrorKind::IsADirectory,
            FsError::TypeMismatch => FsErrorKind::TypeMismatch,
            FsError::InvalidSeek => FsErrorKind::InvalidSeek,
            FsError::InvalidHandle => FsErrorKind::InvalidHandle,
            FsError::InvalidPath => FsErrorKind::InvalidPath,
            FsError::BadMode => FsErrorKind::BadMode,
            FsError::Other(_) => FsErrorKind::Other,
        }
    }
}

/// Distinguishable failure kinds reported to callers.
///
/// `NotClean` is deliberately absent: a dirty volume still mounts and the
/// condition is reported by `is_clean()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    IOError,
    BadMagicOrVersion,
    AlreadyFormatted,
    NotFound,
    NotADirectory,
    IsADirectory,
    TypeMismatch,
    DuplicateName,
    CorruptDirectory,
    OutOfSpace,
    TableFull,
    InvalidSeek,
    InvalidHandle,
    InvalidPath,
    BadMode,
    Corrupted,
    Other,
}

impl FsErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsErrorKind::IOError => "IOError",
            FsErrorKind::BadMagicOrVersion => "BadMagicOrVersion",
            FsErrorKind::AlreadyFormatted => "AlreadyFormatted",
            FsErrorKind::NotFound => "NotFound",
            FsErrorKind::NotADirectory => "NotADirectory",
            FsErrorKind::IsADirectory => "IsADirectory",
            FsErrorKind::TypeMismatch => "TypeMismatch",
            FsErrorKind::DuplicateName => "DuplicateName",
            FsErrorKind::CorruptDirectory => "CorruptDirectory",
            FsErrorKind::OutOfSpace => "OutOfSpace",
            FsErrorKind::TableFull => "TableFull",
            FsErrorKind::InvalidSeek => "InvalidSeek",
            FsErrorKind::InvalidHandle => "InvalidHandle",
            FsErrorKind::InvalidPath => "InvalidPath",
            FsErrorKind::BadMode => "BadMode",
            FsErrorKind::Corrupted => "Corrupted",
            FsErrorKind::Other => "Other",
        }
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === type Fs*Result ===

pub type FsResult<T = ()> = Result<T, FsError>;
pub type FsAllocatorResult<T = ()> = Result<T, FsAllocatorError>;
pub type FsDirResult<T = ()> = Result<T, FsDirError>;
pub type FsTableResult<T = ()> = Result<T, FsTableError>;
pub type FsFormatterResult<T = ()> = Result<T, FsFormatterError>;
pub type FsCheckerResult<T = ()> = Result<T, FsCheckerError>;

crate::fs_error_wiring! {
    top => FsError {
        BlockIOError     : IO,
        FsAllocatorError : Allocator,
        FsDirError       : Dir,
        FsTableError     : Table,
        FsFormatterError : Formatter,
        FsCheckerError   : Checker,
    },
    str_into => [
        FsAllocatorError,
        FsDirError,
        FsTableError,
        FsFormatterError,
        FsCheckerError,
    ],
    sub => {
        BlockIOError     => [ FsTableError::IO, FsFormatterError::IO, FsCheckerError::IO ],
        FsAllocatorError => [ FsTableError::Allocator ],
        FsTableError     => [ FsCheckerError::Table ]
    },
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_display() {
        let low = BlockIOError::OutOfBounds;
        let table = FsTableError::IO(low);
        let top = FsError::Table(table);

        let text = top.to_string();
        assert!(text.starts_with("IO error"));
        assert!(text.contains("caused by: Out of bounds"));
    }

    #[test]
    fn test_kind_flattening() {
        let full: FsError = FsTableError::Allocator(FsAllocatorError::TooFragmented).into();
        assert_eq!(full.kind(), FsErrorKind::OutOfSpace);

        let dup: FsError = FsDirError::DuplicateName.into();
        assert_eq!(dup.kind(), FsErrorKind::DuplicateName);

        let corrupt: FsError = FsDirError::Corrupted.into();
        assert_eq!(corrupt.kind(), FsErrorKind::CorruptDirectory);

        let io: FsError = BlockIOError::OutOfBounds.into();
        assert_eq!(io.kind(), FsErrorKind::IOError);

        let msg: FsError = "boom".into();
        assert_eq!(msg.kind(), FsErrorKind::Other);
        assert_eq!(msg.msg(), "boom");
    }
}
