pub mod adapters;
pub mod calibrate;
pub mod pool;
pub mod ports;
pub mod profiles;
pub mod reconcile;
pub mod updates;

pub use calibrate::{CalibrationError, DiskBench, DiskCalibrator};
pub use pool::{split_settled, BatchPool, PoolError};
pub use ports::{BackupReceipt, BackupService, InstallReport, ModInstaller, VersionProvider};
pub use profiles::{ProfileError, ProfileStore, ProfileUpdate};
pub use reconcile::{ActivationReport, DesiredEntry, ModSetReconciler};
pub use updates::{BatchUpdateReport, ModUpdateResult, UpdateCheck, UpdateError, UpdateOrchestrator};
