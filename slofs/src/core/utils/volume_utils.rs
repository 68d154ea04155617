// SPDX-License-Identifier: MIT

//! Volume utils.
//!
//! Identifier generation for volumes and mounted volume instances.
//!
//! - Uses the current UTC time for ID generation.
//! - Works in `no_std` using `UNIX_EPOCH`, the counter keeps IDs distinct.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::core::utils::time_utils;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static INSTANCE: AtomicU32 = AtomicU32::new(1);

/// Generates a 16-byte volume identifier (superblock UUID).
///
/// Combines the current timestamp and a process-wide counter into a 128-bit value.
/// Not guaranteed to be globally unique.
pub fn generate_volume_id_128() -> u128 {
    let now = time_utils::now_utc();

    let seconds = now.unix_timestamp() as u128;
    let nanos = now.nanosecond() as u128;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed) as u128;

    (seconds << 64) | (nanos << 32) | counter
}

/// Returns a new identifier for a mounted volume instance.
///
/// Handles carry this value so a token from one volume is rejected by another.
pub fn next_instance_id() -> u32 {
    INSTANCE.fetch_add(1, Ordering::Relaxed)
}
