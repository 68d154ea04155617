// SPDX-License-Identifier: MIT

// === Sub-modules ===
#[macro_use]
pub mod macros;
pub mod allocator;
pub mod checker;
pub mod errors;
pub mod formatter;
pub mod meta;
pub mod utils;

// === Core Traits ===
pub mod traits {
    pub use super::allocator::{FsAllocator, FsHandle};
    pub use super::checker::FsChecker;
    pub use super::formatter::FsFormatter;
    pub use super::meta::FsMeta;
}

// === Error types ===
pub use errors::*;

// === Utilities ===
pub use utils::{bitmap::*, path_utils::*, time_utils::*, volume_utils::*};
