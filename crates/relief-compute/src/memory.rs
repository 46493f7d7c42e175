//! Memory budgeting and environment overrides.
//!
//! # Environment Variables
//!
//! - `RELIEF_MEM_MB` - Explicit memory limit in megabytes
//! - `RELIEF_RAM_PCT` - Maximum RAM as percentage (10-95)
//! - `RELIEF_TILE_SIZE` - Override square tile edge (16-16384 cells)
//! - `RELIEF_BACKEND` - Device backend: `auto`, `cpu` or `cuda`

use std::env;
use std::sync::OnceLock;

/// Bytes per host cell (`f64`).
pub const BYTES_PER_CELL: u64 = 8;

/// Default safety margin - use at most 80% of available memory.
pub const SAFE_MEMORY_FRACTION: f64 = 0.80;

/// Buffers alive per tile: input with halo, two gradients, output.
pub const TILE_OVERHEAD: f64 = 4.0;

static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Total system RAM in bytes.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024) // KB to bytes
            .unwrap_or(8 * 1024 * 1024 * 1024) // 8 GB fallback
    })
}

/// Available RAM considering environment overrides.
///
/// Priority:
/// 1. `RELIEF_MEM_MB`
/// 2. `RELIEF_RAM_PCT` of system RAM
/// 3. Default: 80% of system RAM
pub fn available_memory() -> u64 {
    if let Some(mb) = env_parse::<u64>("RELIEF_MEM_MB") {
        return mb * 1024 * 1024;
    }

    let pct = env_parse::<u64>("RELIEF_RAM_PCT").unwrap_or((SAFE_MEMORY_FRACTION * 100.0) as u64);
    let pct = pct.clamp(10, 95);

    system_memory() * pct / 100
}

/// Memory budget for tiled processing (70% of available).
pub fn processing_budget() -> u64 {
    (available_memory() as f64 * 0.70) as u64
}

/// Tile size override from environment.
pub fn tile_size_override() -> Option<usize> {
    env_parse::<usize>("RELIEF_TILE_SIZE").filter(|&s| (16..=16384).contains(&s))
}

/// Backend override from environment.
pub fn backend_override() -> Option<String> {
    env::var("RELIEF_BACKEND").ok()
}

/// Memory for a host grid of `rows x cols` cells.
#[inline]
pub fn grid_memory(rows: usize, cols: usize) -> u64 {
    rows as u64 * cols as u64 * BYTES_PER_CELL
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
