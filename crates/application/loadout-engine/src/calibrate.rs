use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use loadout_config::{clamp_pool_size, BENCHMARK_VERSION, DEFAULT_POOL_SIZE};
use loadout_core::perf::{pool_size_for_speed, DiskClass, DiskPerformanceConfig};
use loadout_infra::benchmark::{BenchmarkSample, WriteBenchmark};
use loadout_persistence::{DataStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("disk benchmark failed: {0}")]
    Benchmark(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Native write-benchmark collaborator. Blocking; the calibrator dispatches
/// it off the async executor.
pub trait DiskBench: Send + Sync {
    fn run_benchmark(&self) -> std::io::Result<BenchmarkSample>;
}

impl DiskBench for WriteBenchmark {
    fn run_benchmark(&self) -> std::io::Result<BenchmarkSample> {
        self.run()
    }
}

/// Benchmarks the host disk once and derives the concurrency pool size used
/// by batch updates. The result is persisted; a stored config from an older
/// sizing algorithm is discarded on load.
pub struct DiskCalibrator {
    store: Arc<dyn DataStore>,
    bench: Arc<dyn DiskBench>,
}

impl DiskCalibrator {
    pub fn new(store: Arc<dyn DataStore>, bench: Arc<dyn DiskBench>) -> Self {
        Self { store, bench }
    }

    /// The persisted calibration, if one exists and is still valid.
    pub fn current_config(&self) -> Result<Option<DiskPerformanceConfig>, CalibrationError> {
        match self.store.load_disk_config()? {
            Some(config) if config.benchmark_version == BENCHMARK_VERSION => Ok(Some(config)),
            Some(config) => {
                warn!(
                    "discarding disk calibration from algorithm v{} (current v{})",
                    config.benchmark_version, BENCHMARK_VERSION
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Pool size for batch operations. Never benchmarks implicitly: without
    /// a valid persisted calibration this falls back to a conservative
    /// default.
    pub fn pool_size(&self) -> Result<usize, CalibrationError> {
        let size = self
            .current_config()?
            .map(|c| c.pool_size)
            .unwrap_or(DEFAULT_POOL_SIZE);
        Ok(clamp_pool_size(size))
    }

    /// Run the benchmark and persist the derived configuration. Benchmark
    /// failures propagate; no fallback config is substituted.
    pub async fn calibrate(&self) -> Result<DiskPerformanceConfig, CalibrationError> {
        let bench = self.bench.clone();
        let sample = tokio::task::spawn_blocking(move || bench.run_benchmark())
            .await
            .map_err(std::io::Error::other)??;

        let config = DiskPerformanceConfig {
            pool_size: pool_size_for_speed(sample.speed_mbps),
            disk_speed_mbps: sample.speed_mbps,
            last_benchmark: Utc::now(),
            benchmark_version: BENCHMARK_VERSION,
        };

        info!(
            "disk calibration: {} MB/s ({} in {} ms, class {}) -> pool size {}",
            sample.speed_mbps,
            sample.bytes_written,
            sample.elapsed_ms,
            DiskClass::classify(sample.speed_mbps).label(),
            config.pool_size
        );

        self.store.save_disk_config(&config)?;
        Ok(config)
    }
}
