mod error;
mod paths;
mod store;

pub use error::StorageError;
pub use paths::default_data_dir;
pub use store::{DataStore, FileDataStore};
