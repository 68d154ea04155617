// SPDX-License-Identifier: MIT

pub mod allocator;
pub mod attr;
pub mod checker;
pub mod constant;
pub mod content;
pub mod dir;
pub mod formatter;
pub mod handle;
pub mod meta;
pub mod resolver;
pub mod table;
pub mod types;
pub mod volume;

// === Public Interface ===
pub mod traits {
    pub use super::allocator::SloAllocator;
    pub use super::checker::{SloCheckOptions, SloChecker};
    pub use super::formatter::{SloFormatOptions, SloFormatter};
    pub use super::meta::SloMeta;
    pub use super::resolver::SloResolver;
    pub use super::table::SloTable;
}

pub mod prelude {
    pub use super::attr::{SloStat, SloStatFs};
    pub use super::handle::{OpenFlags, SeekWhence, SloDir, SloFile};
    pub use super::traits::*;
    pub use super::types::SloNodeKind;
    pub use super::volume::{SloVolume, mkfs};
    pub use crate::core::checker::{Finding, Severity, VerifyPhases, VerifyReport};
    pub use crate::core::errors::*;
    pub use crate::core::traits::*;
    pub use sloio::prelude::*;
}
