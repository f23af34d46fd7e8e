// vCard codec: line parser and composer behind the InterchangeCodec port

mod composer;
mod parser;

use carddock_core::domain::{CancelToken, ExportFormat, FormatVersion};
use carddock_core::port::{ComposeError, Composer, ContactStore, InterchangeCodec, ParseSession};
use composer::VCardComposer;
use parser::VCardSession;
use std::sync::Arc;

/// vCard 2.1 / 3.0 codec
#[derive(Debug, Default, Clone, Copy)]
pub struct VCardCodec;

impl VCardCodec {
    pub fn new() -> Self {
        Self
    }
}

impl InterchangeCodec for VCardCodec {
    fn open_session(
        &self,
        version: FormatVersion,
        charset: Option<&str>,
        cancel: CancelToken,
    ) -> Box<dyn ParseSession> {
        Box::new(VCardSession::new(version, charset.map(str::to_string), cancel))
    }

    fn open_composer(
        &self,
        format: ExportFormat,
        store: Arc<dyn ContactStore>,
    ) -> Result<Box<dyn Composer>, ComposeError> {
        Ok(Box::new(VCardComposer::new(store, format.version())?))
    }
}
