// src/utils/system.rs: System functions

use sysinfo::System;


/// Number of physical cores, falling back to 1 when undetectable.
pub fn physical_cores() -> usize {
    System::physical_core_count().unwrap_or(1).max(1)
}


/// Checks whether `samples` concurrent pipelines of `threads` each exceed `cores`.
///
/// # Arguments
///
/// * `threads` - Threads requested per pipeline.
/// * `samples` - Pipelines running at once.
/// * `cores` - Physical cores available.
///
/// # Returns
///
/// Some(requested threads) when oversubscribed.
pub fn oversubscription(threads: usize, samples: usize, cores: usize) -> Option<usize> {
    let requested = threads.saturating_mul(samples);
    if requested > cores {
        Some(requested)
    } else {
        None
    }
}
