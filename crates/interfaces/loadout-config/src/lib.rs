//! Central configuration constants for runtime limits and defaults.

/// Smallest concurrency pool the calibrator will ever hand out.
pub const MIN_POOL_SIZE: usize = 3;

/// Largest concurrency pool the calibrator will ever hand out.
pub const MAX_POOL_SIZE: usize = 12;

/// Pool size used when no calibration has ever run.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Version of the pool-sizing algorithm. Persisted configs recorded under a
/// different version are discarded and the host must re-benchmark.
pub const BENCHMARK_VERSION: u32 = 2;

/// Delay between startup and the first automatic update pass, milliseconds.
pub const AUTO_UPDATE_SETTLE_MS: u64 = 10_000;

/// Write-speed thresholds (MB/s) for pool sizing: below the first value the
/// pool stays at MIN_POOL_SIZE, at or above the last it gets MAX_POOL_SIZE.
pub const POOL_SPEED_THRESHOLDS_MBPS: [u64; 3] = [50, 100, 200];

/// Convenience function to clamp a pool size into allowed range.
pub fn clamp_pool_size(v: usize) -> usize {
    v.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE)
}
