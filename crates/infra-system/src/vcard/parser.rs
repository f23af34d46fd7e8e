// vCard line parser (one session per candidate version)

use carddock_core::domain::{CancelToken, ContactEntry, FormatVersion, Property};
use carddock_core::port::{EntryInterpreter, ParseError, ParseSession};
use std::io::{self, BufRead, BufReader, Read};

/// Byte decoding for source lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Latin1,
}

impl Charset {
    fn from_label(label: Option<&str>) -> Result<Self, ParseError> {
        match label.map(|l| l.trim().to_ascii_lowercase()) {
            None => Ok(Charset::Utf8),
            Some(l) if l == "utf-8" || l == "utf8" || l == "us-ascii" => Ok(Charset::Utf8),
            Some(l) if l == "iso-8859-1" || l == "latin1" || l == "latin-1" => {
                Ok(Charset::Latin1)
            }
            Some(other) => Err(ParseError::NotSupported(format!("charset {}", other))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Physical lines joined into logical lines
///
/// A line starting with a space or tab continues the previous one; a
/// quoted-printable value ending in `=` continues on the next line.
struct LogicalLines<R> {
    reader: R,
    charset: Charset,
    pending: Option<String>,
    line_number: usize,
}

impl<R: BufRead> LogicalLines<R> {
    fn new(reader: R, charset: Charset) -> Self {
        Self {
            reader,
            charset,
            pending: None,
            line_number: 0,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut current = match self.pending.take() {
            Some(line) => line,
            None => match self.read_physical()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };

        loop {
            if current.ends_with('=') && is_quoted_printable(&current) {
                match self.read_physical()? {
                    Some(next) => {
                        current.pop();
                        current.push_str(&next);
                        continue;
                    }
                    None => break,
                }
            }
            match self.read_physical()? {
                Some(next) if next.starts_with(' ') || next.starts_with('\t') => {
                    current.push_str(&next[1..]);
                }
                Some(next) => {
                    self.pending = Some(next);
                    break;
                }
                None => break,
            }
        }
        Ok(Some(current))
    }

    fn read_physical(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
            buf.pop();
        }
        self.line_number += 1;
        Ok(Some(self.charset.decode(&buf)))
    }
}

fn is_quoted_printable(line: &str) -> bool {
    line.split(':')
        .next()
        .map(|head| head.to_ascii_uppercase().contains("QUOTED-PRINTABLE"))
        .unwrap_or(false)
}

fn decode_quoted_printable(value: &str, charset: Charset) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    charset.decode(&out)
}

/// `group.NAME;PARAM;PARAM:value`
fn parse_property(line: &str, charset: Charset) -> Option<Property> {
    let (head, value) = line.split_once(':')?;
    let mut parts = head.split(';');
    let raw_name = parts.next()?.trim();
    let name = raw_name
        .rsplit('.')
        .next()
        .unwrap_or(raw_name)
        .to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }

    let params: Vec<String> = parts
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let quoted = params.iter().any(|p| {
        p.eq_ignore_ascii_case("QUOTED-PRINTABLE")
            || p.eq_ignore_ascii_case("ENCODING=QUOTED-PRINTABLE")
    });
    let value = if quoted {
        decode_quoted_printable(value, charset)
    } else {
        value.to_string()
    };

    Some(Property {
        name,
        params,
        value,
    })
}

fn parse_version(value: &str) -> Result<FormatVersion, ParseError> {
    match value.trim() {
        "2.1" => Ok(FormatVersion::V21),
        "3.0" => Ok(FormatVersion::V30),
        other => Err(ParseError::NotSupported(format!("vCard version {}", other))),
    }
}

#[derive(Default)]
struct CardBuilder {
    version: Option<FormatVersion>,
    properties: Vec<Property>,
}

impl CardBuilder {
    fn finish(self) -> ContactEntry {
        let display_name = self
            .properties
            .iter()
            .find(|p| p.name == "FN" && !p.value.trim().is_empty())
            .map(|p| p.value.trim().to_string())
            .or_else(|| {
                self.properties.iter().find(|p| p.name == "N").map(|p| {
                    // N:family;given;middle;prefix;suffix
                    let parts: Vec<&str> = p.value.split(';').collect();
                    let given = parts.get(1).copied().unwrap_or("");
                    let family = parts.first().copied().unwrap_or("");
                    format!("{} {}", given, family).trim().to_string()
                })
            })
            .unwrap_or_default();

        ContactEntry {
            display_name,
            properties: self.properties,
        }
    }
}

/// One parse attempt under a fixed version
pub(crate) struct VCardSession {
    version: FormatVersion,
    charset: Option<String>,
    cancel: CancelToken,
}

impl VCardSession {
    pub(crate) fn new(version: FormatVersion, charset: Option<String>, cancel: CancelToken) -> Self {
        Self {
            version,
            charset,
            cancel,
        }
    }
}

impl ParseSession for VCardSession {
    fn parse(
        &mut self,
        stream: &mut dyn Read,
        interpreter: &mut dyn EntryInterpreter,
    ) -> Result<(), ParseError> {
        let charset = Charset::from_label(self.charset.as_deref())?;
        let mut lines = LogicalLines::new(BufReader::new(stream), charset);
        let mut card: Option<CardBuilder> = None;

        while let Some(line) = lines.next_line()? {
            if self.cancel.is_cancelled() {
                return Err(ParseError::Canceled);
            }
            if line.trim().is_empty() {
                continue;
            }

            let line_number = lines.line_number;
            let property = parse_property(&line, charset).ok_or_else(|| {
                ParseError::Malformed(format!("line {}: not a property", line_number))
            })?;
            let is_vcard = property.value.trim().eq_ignore_ascii_case("VCARD");

            let Some(builder) = card.as_mut() else {
                if property.name == "BEGIN" && is_vcard {
                    card = Some(CardBuilder::default());
                    continue;
                }
                return Err(ParseError::Malformed(format!(
                    "line {}: {} outside of BEGIN:VCARD",
                    line_number, property.name
                )));
            };

            match property.name.as_str() {
                "BEGIN" => {
                    return Err(ParseError::Nested(format!(
                        "line {}: BEGIN:{} inside an open card",
                        line_number, property.value
                    )))
                }
                "END" if is_vcard => {
                    if builder.version.is_none() && self.version != FormatVersion::V21 {
                        return Err(ParseError::VersionMismatch(format!(
                            "card without VERSION while parsing as {}",
                            self.version
                        )));
                    }
                    if let Some(done) = card.take() {
                        interpreter.on_entry(done.finish())?;
                    }
                }
                "END" => {
                    return Err(ParseError::Malformed(format!(
                        "line {}: END:{} does not close a card",
                        line_number, property.value
                    )))
                }
                "VERSION" => {
                    let found = parse_version(&property.value)?;
                    if found != self.version {
                        return Err(ParseError::VersionMismatch(format!(
                            "found {} while parsing as {}",
                            found, self.version
                        )));
                    }
                    builder.version = Some(found);
                }
                _ => builder.properties.push(property),
            }
        }

        if card.is_some() {
            return Err(ParseError::Malformed("missing END:VCARD".to_string()));
        }
        Ok(())
    }
}
