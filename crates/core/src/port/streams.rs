// Stream Provider Port
// Opens import sources and export destinations.

use crate::domain::ImportSource;
use std::io::{self, Read, Write};

/// Opens byte streams for processors
pub trait StreamProvider: Send + Sync {
    /// Open a fresh reader over the source (called once per candidate version)
    fn open_source(&self, source: &ImportSource) -> io::Result<Box<dyn Read + Send>>;

    /// Open (create/truncate) the export destination
    fn open_destination(&self, path: &str) -> io::Result<Box<dyn Write + Send>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    /// In-memory "filesystem"
    #[derive(Default)]
    pub struct MemoryStreams {
        files: Files,
        denied: HashSet<String>,
        sources_opened: AtomicUsize,
    }

    impl MemoryStreams {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
            self.files.lock().unwrap().insert(path.into(), content.into());
            self
        }

        /// Opening this destination fails with PermissionDenied
        pub fn deny(mut self, path: impl Into<String>) -> Self {
            self.denied.insert(path.into());
            self
        }

        pub fn contents(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        }

        pub fn sources_opened(&self) -> usize {
            self.sources_opened.load(Ordering::SeqCst)
        }
    }

    struct MemoryFile {
        path: String,
        files: Files,
    }

    impl Write for MemoryFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.files
                .lock()
                .unwrap()
                .entry(self.path.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl StreamProvider for MemoryStreams {
        fn open_source(&self, source: &ImportSource) -> io::Result<Box<dyn Read + Send>> {
            self.sources_opened.fetch_add(1, Ordering::SeqCst);
            match source {
                ImportSource::Bytes(data) => Ok(Box::new(Cursor::new(data.to_vec()))),
                ImportSource::File(path) => {
                    let key = path.display().to_string();
                    let data = self.files.lock().unwrap().get(&key).cloned();
                    data.map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>)
                        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key))
                }
            }
        }

        fn open_destination(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
            if self.denied.contains(path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, path.to_string()));
            }
            self.files.lock().unwrap().insert(path.to_string(), Vec::new());
            Ok(Box::new(MemoryFile {
                path: path.to_string(),
                files: Arc::clone(&self.files),
            }))
        }
    }
}
