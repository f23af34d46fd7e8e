// Import cache directory
//
// Inline payloads are written to `import_tmp_<n>.vcf` so every candidate
// version can reopen them from the start.

use carddock_core::port::ImportCache;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// File name prefix of cached copies
pub const CACHE_FILE_PREFIX: &str = "import_tmp_";

/// Extension of cached copies
const CACHE_FILE_EXTENSION: &str = "vcf";

pub struct ImportCacheDir {
    dir: PathBuf,
    next_index: AtomicU64,
}

impl ImportCacheDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_index: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `data` into a fresh cache file and return its path
    pub fn store(&self, data: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        loop {
            let index = self.next_index.fetch_add(1, Ordering::SeqCst);
            let path = self.dir.join(format!(
                "{}{}.{}",
                CACHE_FILE_PREFIX, index, CACHE_FILE_EXTENSION
            ));
            // never reuse a name left over from an earlier run
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    io::Write::write_all(&mut file, data)?;
                    debug!(path = %path.display(), bytes = data.len(), "Cached import payload");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl ImportCache for ImportCacheDir {
    fn clear(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_cached = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(CACHE_FILE_PREFIX))
                .unwrap_or(false);
            if !is_cached {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), "Failed to remove cached import: {}", e),
            }
        }
        Ok(removed)
    }
}
