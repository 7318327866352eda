use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loadout_config::{MAX_POOL_SIZE, MIN_POOL_SIZE, POOL_SPEED_THRESHOLDS_MBPS};

/// Persisted result of the one-time disk calibration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiskPerformanceConfig {
    pub pool_size: usize,
    pub disk_speed_mbps: u64,
    pub last_benchmark: DateTime<Utc>,
    pub benchmark_version: u32,
}

/// Map measured write speed to a concurrency pool size.
pub fn pool_size_for_speed(speed_mbps: u64) -> usize {
    let [slow, mid, fast] = POOL_SPEED_THRESHOLDS_MBPS;
    if speed_mbps < slow {
        MIN_POOL_SIZE
    } else if speed_mbps < mid {
        5
    } else if speed_mbps < fast {
        8
    } else {
        MAX_POOL_SIZE
    }
}

/// Rough storage class, for diagnostics only. Has no effect on pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskClass {
    Hdd,
    Ssd,
    Nvme,
}

impl DiskClass {
    pub fn classify(speed_mbps: u64) -> Self {
        if speed_mbps < 100 {
            DiskClass::Hdd
        } else if speed_mbps < 300 {
            DiskClass::Ssd
        } else {
            DiskClass::Nvme
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DiskClass::Hdd => "hdd",
            DiskClass::Ssd => "ssd",
            DiskClass::Nvme => "nvme",
        }
    }
}
