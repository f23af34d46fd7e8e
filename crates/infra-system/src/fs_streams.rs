// Filesystem stream provider
use carddock_core::domain::ImportSource;
use carddock_core::port::StreamProvider;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use tracing::debug;

/// Opens import sources and export destinations on the local filesystem
///
/// Destinations are created or truncated; missing parent directories are not
/// created.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStreamProvider;

impl FsStreamProvider {
    pub fn new() -> Self {
        Self
    }
}

impl StreamProvider for FsStreamProvider {
    fn open_source(&self, source: &ImportSource) -> io::Result<Box<dyn Read + Send>> {
        match source {
            ImportSource::Bytes(data) => Ok(Box::new(Cursor::new(data.to_vec()))),
            ImportSource::File(path) => {
                debug!(path = %path.display(), "Opening import source");
                Ok(Box::new(BufReader::new(File::open(path)?)))
            }
        }
    }

    fn open_destination(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        debug!(path = %path, "Opening export destination");
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}
