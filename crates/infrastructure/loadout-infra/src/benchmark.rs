use std::fs::{self, File};
use std::io::Write;
use std::time::Instant;

use camino::Utf8PathBuf;
use tracing::warn;

/// Measured disk write performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSample {
    /// Measured write speed in MB/s.
    pub speed_mbps: u64,
    /// Total bytes written during the benchmark.
    pub bytes_written: u64,
    /// Wall-clock time taken in milliseconds.
    pub elapsed_ms: u64,
}

/// Benchmark sizing. Larger files reduce per-file overhead and give a more
/// accurate measurement; tests shrink these to stay fast.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkSettings {
    pub file_count: usize,
    pub file_size: usize,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            file_count: 5,
            file_size: 50 * 1024 * 1024,
        }
    }
}

/// Disk write benchmark: writes a handful of files with a deterministic byte
/// pattern, fsyncing each, and measures throughput. This is the only
/// blocking primitive in the engine; callers dispatch it off the async
/// executor.
pub struct WriteBenchmark {
    scratch_dir: Utf8PathBuf,
    settings: BenchmarkSettings,
}

impl WriteBenchmark {
    pub fn new(scratch_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            settings: BenchmarkSettings::default(),
        }
    }

    pub fn with_settings(scratch_dir: impl Into<Utf8PathBuf>, settings: BenchmarkSettings) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            settings,
        }
    }

    pub fn run(&self) -> std::io::Result<BenchmarkSample> {
        let bench_dir = self.scratch_dir.join("benchmark-temp");
        fs::create_dir_all(bench_dir.as_std_path())?;

        let total_bytes = (self.settings.file_count * self.settings.file_size) as u64;
        let test_data: Vec<u8> = (0..self.settings.file_size)
            .map(|i| ((i * 17 + 31) % 256) as u8)
            .collect();

        let start = Instant::now();
        let result = self.write_files(&bench_dir, &test_data);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = fs::remove_dir_all(bench_dir.as_std_path()) {
            warn!("failed to clean up benchmark directory {bench_dir}: {e}");
        }
        result?;

        // Sub-millisecond runs cannot be measured meaningfully; report a
        // very fast disk instead of dividing by zero.
        let speed_mbps = if elapsed_ms > 0 {
            (total_bytes / (1024 * 1024)) * 1000 / elapsed_ms
        } else {
            1000
        };

        Ok(BenchmarkSample {
            speed_mbps,
            bytes_written: total_bytes,
            elapsed_ms,
        })
    }

    fn write_files(&self, bench_dir: &Utf8PathBuf, test_data: &[u8]) -> std::io::Result<()> {
        for i in 0..self.settings.file_count {
            let file_path = bench_dir.join(format!("bench_{i}.bin"));
            let mut file = File::create(file_path.as_std_path())?;
            file.write_all(test_data)?;
            file.sync_all()?;
        }
        Ok(())
    }
}
