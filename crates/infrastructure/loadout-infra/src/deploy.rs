use std::fs;

use camino::Utf8Path;
use rayon::prelude::*;

use loadout_core::settings::DeployMode;

/// Ownership tag written into every directory this engine materializes.
/// Entries without it (and without being a symlink) are foreign and are
/// never removed during reconciliation.
pub const MANAGED_MARKER: &str = ".loadout";

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("source does not exist: {0}")]
    MissingSource(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    fn io(path: &Utf8Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// State of one top-level entry in the mods directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    /// A link we created, or a copied directory carrying the marker.
    Managed,
    /// A plain file, or a directory this engine did not create.
    Foreign,
}

pub fn classify_entry(path: &Utf8Path) -> EntryState {
    let meta = match fs::symlink_metadata(path.as_std_path()) {
        Ok(m) => m,
        Err(_) => return EntryState::Absent,
    };
    if meta.file_type().is_symlink() {
        return EntryState::Managed;
    }
    if meta.is_dir() && path.join(MANAGED_MARKER).exists() {
        return EntryState::Managed;
    }
    EntryState::Foreign
}

/// Materialize `source` at `dest`, replacing any existing entry there.
pub fn materialize_entry(
    source: &Utf8Path,
    dest: &Utf8Path,
    mode: DeployMode,
) -> Result<(), DeployError> {
    if !source.exists() {
        return Err(DeployError::MissingSource(source.to_string()));
    }
    if classify_entry(dest) != EntryState::Absent {
        remove_entry(dest)?;
    }

    match mode {
        DeployMode::Link => link_dir(source, dest),
        DeployMode::Copy => {
            fs::create_dir_all(dest.as_std_path()).map_err(|e| DeployError::io(dest, e))?;
            copy_dir_recursive(source, dest)?;
            fs::write(dest.join(MANAGED_MARKER).as_std_path(), b"")
                .map_err(|e| DeployError::io(dest, e))?;
            Ok(())
        }
    }
}

/// Remove a managed entry: a link, or a directory tree.
pub fn remove_entry(path: &Utf8Path) -> Result<(), DeployError> {
    let meta = match fs::symlink_metadata(path.as_std_path()) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    let res = if meta.file_type().is_symlink() {
        // Windows directory junctions unlink via remove_dir; everywhere else
        // a symlink is a file-like entry.
        #[cfg(target_os = "windows")]
        {
            fs::remove_dir(path.as_std_path())
        }
        #[cfg(not(target_os = "windows"))]
        {
            fs::remove_file(path.as_std_path())
        }
    } else if meta.is_dir() {
        fs::remove_dir_all(path.as_std_path())
    } else {
        fs::remove_file(path.as_std_path())
    };

    res.map_err(|e| DeployError::io(path, e))
}

#[cfg(target_os = "windows")]
fn link_dir(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeployError> {
    std::os::windows::fs::symlink_dir(source.as_std_path(), dest.as_std_path())
        .map_err(|e| DeployError::io(dest, e))
}

#[cfg(not(target_os = "windows"))]
fn link_dir(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeployError> {
    std::os::unix::fs::symlink(source.as_std_path(), dest.as_std_path())
        .map_err(|e| DeployError::io(dest, e))
}

/// Plain recursive copy with no ownership marker, for backups and other
/// out-of-band duplication.
pub fn copy_tree(src: &Utf8Path, dst: &Utf8Path) -> Result<(), DeployError> {
    if !src.exists() {
        return Err(DeployError::MissingSource(src.to_string()));
    }
    fs::create_dir_all(dst.as_std_path()).map_err(|e| DeployError::io(dst, e))?;
    copy_dir_recursive(src, dst)
}

/// Directories are created sequentially, file contents copied in parallel.
fn copy_dir_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<(), DeployError> {
    let entries: Vec<_> = fs::read_dir(src.as_std_path())
        .map_err(|e| DeployError::io(src, e))?
        .collect::<Result<Vec<_>, std::io::Error>>()
        .map_err(|e| DeployError::io(src, e))?;

    for entry in &entries {
        if entry.path().is_dir() {
            let target = dst.as_std_path().join(entry.file_name());
            fs::create_dir_all(&target).map_err(|e| DeployError::io(dst, e))?;
        }
    }

    entries
        .par_iter()
        .map(|entry| {
            let path = entry.path();
            let target = dst.as_std_path().join(entry.file_name());
            if path.is_dir() {
                let src_child = Utf8Path::from_path(&path)
                    .ok_or_else(|| DeployError::MissingSource(path.display().to_string()))?;
                let dst_child = Utf8Path::from_path(&target)
                    .ok_or_else(|| DeployError::MissingSource(target.display().to_string()))?;
                copy_dir_recursive(src_child, dst_child)
            } else {
                fs::copy(&path, &target)
                    .map(|_| ())
                    .map_err(|e| DeployError::io(src, e))
            }
        })
        .collect::<Result<Vec<()>, DeployError>>()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    fn seed_source(root: &Utf8Path) -> Utf8PathBuf {
        let src = root.join("cache/better-stairs");
        fs::create_dir_all(src.join("scripts").as_std_path()).unwrap();
        fs::write(src.join("mod.package").as_std_path(), b"payload").unwrap();
        fs::write(src.join("scripts/hook.ts4script").as_std_path(), b"code").unwrap();
        src
    }

    #[test]
    fn copy_mode_stamps_marker_and_classifies_managed() {
        let dir = tempdir().unwrap();
        let root = utf8(&dir);
        let src = seed_source(&root);
        let dest = root.join("Mods/better-stairs");
        fs::create_dir_all(root.join("Mods").as_std_path()).unwrap();

        materialize_entry(&src, &dest, DeployMode::Copy).unwrap();

        assert_eq!(classify_entry(&dest), EntryState::Managed);
        assert!(dest.join("mod.package").exists());
        assert!(dest.join("scripts/hook.ts4script").exists());
    }

    #[test]
    fn link_mode_entry_is_managed_without_marker() {
        let dir = tempdir().unwrap();
        let root = utf8(&dir);
        let src = seed_source(&root);
        let dest = root.join("Mods/better-stairs");
        fs::create_dir_all(root.join("Mods").as_std_path()).unwrap();

        materialize_entry(&src, &dest, DeployMode::Link).unwrap();

        assert_eq!(classify_entry(&dest), EntryState::Managed);
        assert!(dest.join("mod.package").exists());

        remove_entry(&dest).unwrap();
        assert_eq!(classify_entry(&dest), EntryState::Absent);
        // Removing the link leaves the source intact.
        assert!(src.join("mod.package").exists());
    }

    #[test]
    fn unmarked_directories_and_files_are_foreign() {
        let dir = tempdir().unwrap();
        let root = utf8(&dir);
        let stray_dir = root.join("Mods/hand-made");
        fs::create_dir_all(stray_dir.as_std_path()).unwrap();
        let stray_file = root.join("Mods/notes.txt");
        fs::write(stray_file.as_std_path(), b"mine").unwrap();

        assert_eq!(classify_entry(&stray_dir), EntryState::Foreign);
        assert_eq!(classify_entry(&stray_file), EntryState::Foreign);
        assert_eq!(classify_entry(&root.join("Mods/nothing")), EntryState::Absent);
    }

    #[test]
    fn materialize_replaces_existing_managed_entry() {
        let dir = tempdir().unwrap();
        let root = utf8(&dir);
        let src = seed_source(&root);
        let dest = root.join("Mods/better-stairs");
        fs::create_dir_all(root.join("Mods").as_std_path()).unwrap();

        materialize_entry(&src, &dest, DeployMode::Copy).unwrap();
        materialize_entry(&src, &dest, DeployMode::Link).unwrap();
        assert_eq!(classify_entry(&dest), EntryState::Managed);
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let root = utf8(&dir);
        let err = materialize_entry(
            &root.join("cache/nope"),
            &root.join("Mods/nope"),
            DeployMode::Link,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::MissingSource(_)));
    }
}
