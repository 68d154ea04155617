// SPDX-License-Identifier: MIT

pub use crate::core::errors::{FsAllocatorError, FsAllocatorResult};

/// Trait implemented by all FS allocation handles.
///
/// Example: extent list, cluster chain, block handle, etc.
pub trait FsHandle {}

/// Trait for managing allocation of logical units in a filesystem.
///
/// - `Handle` is a handle representing the allocated units (e.g. a list of extents)
pub trait FsAllocator<Handle: FsHandle + Sized + Clone> {
    /// Allocate `count` units and return a handle covering all of them.
    fn allocate(&mut self, count: usize) -> FsAllocatorResult<Handle>;

    /// Allocate a single unit and return its handle.
    fn allocate_unit(&mut self) -> FsAllocatorResult<Handle> {
        self.allocate(1)
    }

    /// Give back every unit covered by `handle`.
    fn release(&mut self, handle: &Handle) -> FsAllocatorResult;

    /// Number of units currently used.
    fn used_units(&self) -> usize;

    /// Number of remaining units.
    fn remaining_units(&self) -> usize;
}
