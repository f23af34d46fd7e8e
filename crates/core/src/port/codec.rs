// Interchange Codec Port
// The parser/composer is a black box; the runner only sees these traits.

use crate::domain::{CancelToken, ContactEntry, ExportFormat, FormatVersion};
use crate::port::contact_store::{ContactStore, StoreError};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;

/// Parse failures, classified the way the import processor needs them
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Version mismatch: {0}")]
    VersionMismatch(String),

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Nested entry: {0}")]
    Nested(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse canceled")]
    Canceled,

    #[error("Interpreter rejected entry: {0}")]
    Interpreter(#[from] InterpretError),
}

/// Raised by an interpreter to stop the parse
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct InterpretError(pub String);

/// Compose failures
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Composer not initialized: {0}")]
    Init(String),

    #[error("Entry failed: {0}")]
    Entry(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Receives entries as the parser builds them
pub trait EntryInterpreter {
    fn on_entry(&mut self, entry: ContactEntry) -> Result<(), InterpretError>;
}

/// One parse attempt bound to a single format version
///
/// Sessions poll the [`CancelToken`] they were opened with and return
/// `ParseError::Canceled` (or stop early) once it is set.
pub trait ParseSession: Send {
    fn parse(
        &mut self,
        stream: &mut dyn Read,
        interpreter: &mut dyn EntryInterpreter,
    ) -> Result<(), ParseError>;
}

/// A composed entry, ready to be written to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEntry {
    pub display_name: String,
    pub text: String,
}

/// Entry-by-entry composer over the contact store
pub trait Composer: Send {
    /// Number of entries this composer will produce
    fn total(&self) -> usize;

    /// Next entry, or `None` when done
    fn compose_next(&mut self) -> Result<Option<ComposedEntry>, ComposeError>;
}

/// Codec factory
pub trait InterchangeCodec: Send + Sync {
    fn open_session(
        &self,
        version: FormatVersion,
        charset: Option<&str>,
        cancel: CancelToken,
    ) -> Box<dyn ParseSession>;

    fn open_composer(
        &self,
        format: ExportFormat,
        store: Arc<dyn ContactStore>,
    ) -> Result<Box<dyn Composer>, ComposeError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex};

    /// Blocks codec threads until a test opens it
    #[derive(Default)]
    pub struct Latch {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl Latch {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn open(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }

        pub fn wait(&self) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
        }
    }

    /// What a parse session does for a given version
    #[derive(Debug, Clone)]
    pub enum ParseScript {
        Entries(Vec<ContactEntry>),
        /// Hand over these entries, then fail as malformed
        PartialThenMalformed(Vec<ContactEntry>, String),
        VersionMismatch,
        Malformed(String),
        Nested,
        Panic(String),
    }

    /// Codec driven by per-version scripts
    ///
    /// Versions without a script answer `VersionMismatch`. The composer pages
    /// through whatever store it is given.
    pub struct ScriptedCodec {
        scripts: HashMap<FormatVersion, ParseScript>,
        hold: Option<Arc<Latch>>,
        fail_init: Option<String>,
        fail_compose_at: Option<usize>,
        attempts: Mutex<Vec<FormatVersion>>,
        composers_opened: AtomicUsize,
    }

    impl ScriptedCodec {
        pub fn new() -> Self {
            Self {
                scripts: HashMap::new(),
                hold: None,
                fail_init: None,
                fail_compose_at: None,
                attempts: Mutex::new(Vec::new()),
                composers_opened: AtomicUsize::new(0),
            }
        }

        pub fn with_script(mut self, version: FormatVersion, script: ParseScript) -> Self {
            self.scripts.insert(version, script);
            self
        }

        /// Parse and compose block on `latch` before their first entry
        pub fn with_hold(mut self, latch: Arc<Latch>) -> Self {
            self.hold = Some(latch);
            self
        }

        pub fn with_init_failure(mut self, reason: impl Into<String>) -> Self {
            self.fail_init = Some(reason.into());
            self
        }

        /// Fail composing the entry with this 1-based index
        pub fn with_compose_failure_at(mut self, index: usize) -> Self {
            self.fail_compose_at = Some(index);
            self
        }

        /// Versions parse sessions were opened for, in order
        pub fn attempts(&self) -> Vec<FormatVersion> {
            self.attempts.lock().unwrap().clone()
        }

        pub fn composers_opened(&self) -> usize {
            self.composers_opened.load(Ordering::SeqCst)
        }
    }

    impl Default for ScriptedCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    struct ScriptedSession {
        script: ParseScript,
        hold: Option<Arc<Latch>>,
        cancel: CancelToken,
    }

    impl ParseSession for ScriptedSession {
        fn parse(
            &mut self,
            stream: &mut dyn Read,
            interpreter: &mut dyn EntryInterpreter,
        ) -> Result<(), ParseError> {
            let mut consumed = Vec::new();
            stream.read_to_end(&mut consumed)?;

            if let Some(latch) = &self.hold {
                latch.wait();
            }

            match &self.script {
                ParseScript::Entries(entries) => {
                    for entry in entries {
                        if self.cancel.is_cancelled() {
                            return Err(ParseError::Canceled);
                        }
                        interpreter.on_entry(entry.clone())?;
                    }
                    Ok(())
                }
                ParseScript::PartialThenMalformed(entries, msg) => {
                    for entry in entries {
                        interpreter.on_entry(entry.clone())?;
                    }
                    Err(ParseError::Malformed(msg.clone()))
                }
                ParseScript::VersionMismatch => {
                    Err(ParseError::VersionMismatch("scripted mismatch".to_string()))
                }
                ParseScript::Malformed(msg) => Err(ParseError::Malformed(msg.clone())),
                ParseScript::Nested => Err(ParseError::Nested("BEGIN inside BEGIN".to_string())),
                ParseScript::Panic(msg) => panic!("{}", msg),
            }
        }
    }

    struct ScriptedComposer {
        store: Arc<dyn ContactStore>,
        total: usize,
        produced: usize,
        last_id: Option<crate::domain::EntryId>,
        hold: Option<Arc<Latch>>,
        fail_at: Option<usize>,
    }

    impl Composer for ScriptedComposer {
        fn total(&self) -> usize {
            self.total
        }

        fn compose_next(&mut self) -> Result<Option<ComposedEntry>, ComposeError> {
            if self.produced == 0 {
                if let Some(latch) = &self.hold {
                    latch.wait();
                }
            }
            let page = self.store.page(self.last_id, 1)?;
            let Some((id, entry)) = page.into_iter().next() else {
                return Ok(None);
            };
            self.produced += 1;
            self.last_id = Some(id);
            if self.fail_at == Some(self.produced) {
                return Err(ComposeError::Entry(format!("entry {} unreadable", id)));
            }
            Ok(Some(ComposedEntry {
                text: format!("BEGIN:MOCK\r\nFN:{}\r\nEND:MOCK\r\n", entry.display_name),
                display_name: entry.display_name,
            }))
        }
    }

    impl InterchangeCodec for ScriptedCodec {
        fn open_session(
            &self,
            version: FormatVersion,
            _charset: Option<&str>,
            cancel: CancelToken,
        ) -> Box<dyn ParseSession> {
            self.attempts.lock().unwrap().push(version);
            let script = self
                .scripts
                .get(&version)
                .cloned()
                .unwrap_or(ParseScript::VersionMismatch);
            Box::new(ScriptedSession {
                script,
                hold: self.hold.clone(),
                cancel,
            })
        }

        fn open_composer(
            &self,
            _format: ExportFormat,
            store: Arc<dyn ContactStore>,
        ) -> Result<Box<dyn Composer>, ComposeError> {
            self.composers_opened.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = &self.fail_init {
                return Err(ComposeError::Init(reason.clone()));
            }
            let total = store.count()?;
            Ok(Box::new(ScriptedComposer {
                store,
                total,
                produced: 0,
                last_id: None,
                hold: self.hold.clone(),
                fail_at: self.fail_compose_at,
            }))
        }
    }
}
