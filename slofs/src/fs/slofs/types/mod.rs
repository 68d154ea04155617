// SPDX-License-Identifier: MIT

pub mod dirent;
pub mod extent;
pub mod record;
pub mod superblock;

pub use dirent::*;
pub use extent::*;
pub use record::*;
pub use superblock::*;
