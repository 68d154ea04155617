// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
extern crate alloc;

// Core Modules
pub mod core;
pub mod fs;

// Reusable types and traits
pub use self::core::traits::*;
pub use self::core::{FsError, FsErrorKind, FsResult};

// Utilities
pub use self::core::utils::path_utils::*;

/// slofs single-image filesystem.
///
/// See [`slofs::SloVolume`] for the mounted-volume API and [`slofs::mkfs`].
pub mod slofs {
    pub use super::fs::slofs::prelude::*;
}
