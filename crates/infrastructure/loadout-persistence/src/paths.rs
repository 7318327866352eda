use camino::Utf8PathBuf;
use directories::ProjectDirs;

use crate::StorageError;

const QUALIFIER: &str = "com";
const ORG: &str = "loadout";
const APP: &str = "manager";

/// Platform data directory used when the caller does not supply a root.
pub fn default_data_dir() -> Result<Utf8PathBuf, StorageError> {
    let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP).ok_or(StorageError::NoDataDir)?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf())
        .map_err(|p| StorageError::Io(std::io::Error::other(format!("non-UTF8 data dir: {}", p.display()))))
}
