use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::{debug, info};

use crate::HarnessError;

const MB: u64 = 1024 * 1024;
const BUFFER_SIZE: usize = 8 * 1024;

/// Path of the pre-generated test file for `size_mb`.
pub fn test_file_path(dir: &Path, size_mb: u64) -> PathBuf {
    dir.join(format!("test_{size_mb}MB.bin"))
}

/// Ensures a random-content test file exists for every requested size,
/// creating missing ones. Existing files are left untouched.
pub fn ensure_test_files(dir: &Path, sizes_mb: &[u64]) -> Result<Vec<PathBuf>, HarnessError> {
    fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(sizes_mb.len());
    for &size_mb in sizes_mb {
        let path = test_file_path(dir, size_mb);
        if path.exists() {
            debug!(path = %path.display(), "test file already exists");
        } else {
            info!(path = %path.display(), size_mb, "generating test file");
            generate_random_file(&path, size_mb * MB)?;
        }
        paths.push(path);
    }
    Ok(paths)
}

fn generate_random_file(path: &Path, total: u64) -> Result<(), HarnessError> {
    let mut rng = rand::thread_rng();
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut file = File::create(path)?;

    let mut written = 0u64;
    let mut next_log = 100 * MB;
    while written < total {
        let take = (total - written).min(BUFFER_SIZE as u64) as usize;
        rng.fill_bytes(&mut buffer[..take]);
        file.write_all(&buffer[..take])?;
        written += take as u64;

        if total > 100 * MB && written >= next_log {
            info!(
                path = %path.display(),
                percent = written * 100 / total,
                "test file generation in progress"
            );
            next_log += 100 * MB;
        }
    }
    Ok(())
}
