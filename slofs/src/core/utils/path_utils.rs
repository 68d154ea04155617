// SPDX-License-Identifier: MIT

//! Path utilities for `/`-separated volume paths.
//!
//! All functions are no_std + alloc safe.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

/// Returns `true` for paths anchored at the volume root.
#[inline]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Splits a path into its non-empty components.
///
/// `"/a//b/"` yields `["a", "b"]`; `.` and `..` are kept for the resolver.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Splits a path into its parent part and final component.
///
/// Returns `None` when the path has no final component (`""`, `"/"`).
/// The parent keeps the leading slash of absolute paths.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rsplit_once('/') {
        Some(("", name)) => Some(("/", name)),
        Some((parent, name)) => Some((parent, name)),
        None => Some(("", trimmed)),
    }
}

/// Join two path components with `/`, ensuring no duplicate slash.
pub fn join_paths(base: &str, part: &str) -> String {
    let mut out = String::new();
    out.push_str(base.trim_end_matches('/'));
    out.push('/');
    out.push_str(part.trim_start_matches('/'));
    out
}
