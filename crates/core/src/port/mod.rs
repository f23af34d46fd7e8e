// Port Layer - Interfaces for external collaborators

pub mod codec;
pub mod contact_store;
pub mod host;
pub mod listener;
pub mod streams;

// Re-exports
pub use codec::{
    ComposeError, ComposedEntry, Composer, EntryInterpreter, InterchangeCodec, InterpretError,
    ParseError, ParseSession,
};
pub use contact_store::{ContactStore, StoreError};
pub use host::{ImportCache, ServiceHost};
pub use listener::JobListener;
pub use streams::StreamProvider;
