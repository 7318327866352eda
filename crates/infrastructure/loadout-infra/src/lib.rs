pub mod benchmark;
pub mod deploy;
pub mod hashing;

// Re-exports for convenience
pub use benchmark::{BenchmarkSample, BenchmarkSettings, WriteBenchmark};
pub use deploy::{classify_entry, copy_tree, materialize_entry, remove_entry, DeployError, EntryState};
pub use hashing::sha256_file;
