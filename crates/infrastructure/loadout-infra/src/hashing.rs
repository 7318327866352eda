use std::fmt::Write as _;
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use sha2::{Digest, Sha256};

/// Streaming SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Utf8Path) -> std::io::Result<String> {
    let mut file = File::open(path.as_std_path())?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    Ok(out)
}
