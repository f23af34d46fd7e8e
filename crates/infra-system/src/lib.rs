// carddock Infrastructure - System Adapters
// Implements: StreamProvider, InterchangeCodec (vCard), ImportCache

pub mod fs_streams;
pub mod import_cache;
pub mod vcard;

pub use fs_streams::FsStreamProvider;
pub use import_cache::{ImportCacheDir, CACHE_FILE_PREFIX};
pub use vcard::VCardCodec;
