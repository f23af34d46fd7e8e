// Export Destination Naming
//
// File names have five parts: directory, prefix, index, suffix, extension.
// `/exports/p00001s.vcf` -> `/exports`, `p`, `00001`, `s`, `vcf`.

use super::constants::{
    DEFAULT_EXPORT_EXTENSION, DEFAULT_EXPORT_MAX_INDEX, DEFAULT_EXPORT_MIN_INDEX,
    SHORT_NAME_MAX_BODY, SHORT_NAME_MAX_EXTENSION,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Why no destination could be proposed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("file name too long for short-name storage: {0}")]
    TooLongFileName(String),

    #[error("no free file name between index {min} and {max}")]
    TooManyFiles { min: u32, max: u32 },
}

/// Naming rule for automatically chosen export files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNaming {
    pub directory: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub extension: String,
    /// Other extensions whose presence also makes an index unavailable
    pub extensions_to_consider: Vec<String>,
    pub min_index: u32,
    pub max_index: u32,
    pub allow_long_names: bool,
}

impl Default for ExportNaming {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            prefix: String::new(),
            suffix: String::new(),
            extension: DEFAULT_EXPORT_EXTENSION.to_string(),
            extensions_to_consider: Vec::new(),
            min_index: DEFAULT_EXPORT_MIN_INDEX,
            max_index: DEFAULT_EXPORT_MAX_INDEX,
            allow_long_names: false,
        }
    }
}

impl ExportNaming {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Add extensions from a comma separated list (`"vcf, VCF , txt"`)
    pub fn with_extra_extensions(mut self, list: &str) -> Self {
        for ext in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if !self.extensions_to_consider.iter().any(|known| known == ext) {
                self.extensions_to_consider.push(ext.to_string());
            }
        }
        self
    }

    /// Pick the first free name
    ///
    /// `is_taken(path)` answers whether a candidate path is reserved or already
    /// exists. An index is free only if no considered extension is taken.
    pub fn find_available(
        &self,
        mut is_taken: impl FnMut(&str) -> bool,
    ) -> Result<String, DestinationError> {
        let width = digit_count(self.max_index);

        if !self.allow_long_names {
            let body = self.body(1, width);
            if body.len() > SHORT_NAME_MAX_BODY || self.extension.len() > SHORT_NAME_MAX_EXTENSION
            {
                let name = format!("{}.{}", body, self.extension);
                warn!(name = %name, "Export file name does not fit the short-name rule");
                return Err(DestinationError::TooLongFileName(name));
            }
        }

        for index in self.min_index..=self.max_index {
            let body = self.body(index, width);
            let available = self
                .considered_extensions()
                .all(|ext| !is_taken(&self.path_for(&body, ext)));
            if available {
                return Ok(self.path_for(&body, &self.extension));
            }
            debug!(index, "Export index taken");
        }

        warn!(
            min = self.min_index,
            max = self.max_index,
            "Reached export file limit, too many files in the directory"
        );
        Err(DestinationError::TooManyFiles {
            min: self.min_index,
            max: self.max_index,
        })
    }

    fn body(&self, index: u32, width: usize) -> String {
        format!("{}{:0width$}{}", self.prefix, index, self.suffix, width = width)
    }

    fn path_for(&self, body: &str, extension: &str) -> String {
        self.directory
            .join(format!("{}.{}", body, extension))
            .display()
            .to_string()
    }

    fn considered_extensions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.extension.as_str()).chain(
            self.extensions_to_consider
                .iter()
                .map(String::as_str)
                .filter(move |ext| *ext != self.extension),
        )
    }
}

fn digit_count(mut value: u32) -> usize {
    let mut digits = 0;
    while value > 0 {
        digits += 1;
        value /= 10;
    }
    digits
}
