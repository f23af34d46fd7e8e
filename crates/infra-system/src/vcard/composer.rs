// vCard composer: pages entries out of the contact store

use carddock_core::domain::{ContactEntry, EntryId, FormatVersion, Property};
use carddock_core::port::{ComposeError, ComposedEntry, Composer, ContactStore};
use std::collections::VecDeque;
use std::sync::Arc;

/// Entries fetched from the store per round trip
const COMPOSE_PAGE_SIZE: usize = 64;

/// Longest physical line written for 3.0 output (octets, excluding CRLF)
const MAX_LINE_OCTETS: usize = 75;

pub(crate) struct VCardComposer {
    store: Arc<dyn ContactStore>,
    version: FormatVersion,
    total: usize,
    cursor: Option<EntryId>,
    buffered: VecDeque<(EntryId, ContactEntry)>,
}

impl VCardComposer {
    pub(crate) fn new(
        store: Arc<dyn ContactStore>,
        version: FormatVersion,
    ) -> Result<Self, ComposeError> {
        let total = store.count()?;
        Ok(Self {
            store,
            version,
            total,
            cursor: None,
            buffered: VecDeque::new(),
        })
    }
}

impl Composer for VCardComposer {
    fn total(&self) -> usize {
        self.total
    }

    fn compose_next(&mut self) -> Result<Option<ComposedEntry>, ComposeError> {
        if self.buffered.is_empty() {
            let page = self.store.page(self.cursor, COMPOSE_PAGE_SIZE)?;
            self.buffered.extend(page);
        }
        let Some((id, entry)) = self.buffered.pop_front() else {
            return Ok(None);
        };
        self.cursor = Some(id);

        let text = compose_entry(&entry, self.version)
            .map_err(|reason| ComposeError::Entry(format!("entry {}: {}", id, reason)))?;
        Ok(Some(ComposedEntry {
            display_name: entry.display_name,
            text,
        }))
    }
}

fn compose_entry(entry: &ContactEntry, version: FormatVersion) -> Result<String, String> {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCARD", version);
    push_line(&mut out, &format!("VERSION:{}", version), version);

    let has_fn = entry.properties.iter().any(|p| p.name == "FN");
    if !has_fn && !entry.display_name.is_empty() {
        push_line(&mut out, &format!("FN:{}", escape(&entry.display_name)), version);
    }

    for property in &entry.properties {
        push_line(&mut out, &property_line(property)?, version);
    }

    push_line(&mut out, "END:VCARD", version);
    Ok(out)
}

fn property_line(property: &Property) -> Result<String, String> {
    let valid_name = !property.name.is_empty()
        && property
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid_name {
        return Err(format!("invalid property name {:?}", property.name));
    }

    let mut line = property.name.clone();
    for param in &property.params {
        line.push(';');
        line.push_str(param);
    }
    line.push(':');
    line.push_str(&escape(&property.value));
    Ok(line)
}

fn escape(value: &str) -> String {
    value.replace("\r\n", "\\n").replace('\n', "\\n")
}

/// Append one content line, folding 3.0 output at 75 octets
fn push_line(out: &mut String, line: &str, version: FormatVersion) {
    if version == FormatVersion::V21 || line.len() <= MAX_LINE_OCTETS {
        out.push_str(line);
        out.push_str("\r\n");
        return;
    }

    let mut width = 0;
    for ch in line.chars() {
        // continuation lines start with one space
        if width + ch.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use carddock_core::port::contact_store::mocks::InMemoryContactStore;

    fn store_with(entries: Vec<ContactEntry>) -> Arc<dyn ContactStore> {
        let store = InMemoryContactStore::new();
        for entry in &entries {
            store.commit(entry, None).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn test_composes_every_entry_then_ends() {
        let store = store_with(vec![
            ContactEntry::new("Ada").with_property(Property::new("TEL", "+1").with_param("CELL")),
            ContactEntry::new("Grace"),
        ]);
        let mut composer = VCardComposer::new(store, FormatVersion::V21).unwrap();
        assert_eq!(composer.total(), 2);

        let first = composer.compose_next().unwrap().unwrap();
        assert_eq!(
            first.text,
            "BEGIN:VCARD\r\nVERSION:2.1\r\nFN:Ada\r\nTEL;CELL:+1\r\nEND:VCARD\r\n"
        );
        assert_eq!(composer.compose_next().unwrap().unwrap().display_name, "Grace");
        assert!(composer.compose_next().unwrap().is_none());
    }

    #[test]
    fn test_v30_folds_long_lines() {
        let note = "x".repeat(100);
        let store = store_with(vec![
            ContactEntry::new("Ada").with_property(Property::new("NOTE", note.clone()))
        ]);
        let mut composer = VCardComposer::new(store, FormatVersion::V30).unwrap();

        let text = composer.compose_next().unwrap().unwrap().text;
        assert!(text.contains("VERSION:3.0\r\n"));
        assert!(text.lines().all(|l| l.trim_end_matches('\r').len() <= MAX_LINE_OCTETS));
        let unfolded = text.replace("\r\n ", "");
        assert!(unfolded.contains(&format!("NOTE:{}", note)));
    }

    #[test]
    fn test_invalid_property_fails_the_entry() {
        let store = store_with(vec![
            ContactEntry::new("Ada").with_property(Property::new("BAD:NAME", "x"))
        ]);
        let mut composer = VCardComposer::new(store, FormatVersion::V21).unwrap();

        assert!(matches!(composer.compose_next(), Err(ComposeError::Entry(_))));
    }

    #[test]
    fn test_newlines_are_escaped() {
        assert_eq!(escape("a\nb\r\nc"), "a\\nb\\nc");
    }
}
