// Contact Entry Model
//
// Entries are opaque property lists: the codec fills them, the store keeps them.

use serde::{Deserialize, Serialize};

/// Identifier the contact store assigns to a committed entry
pub type EntryId = i64;

/// One property line of an entry (`TEL;TYPE=CELL:+1 555 0100`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// A parsed contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub display_name: String,
    pub properties: Vec<Property>,
}

impl ContactEntry {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Entries with nothing worth showing (no name, no properties)
    pub fn is_ignorable(&self) -> bool {
        self.display_name.trim().is_empty() && self.properties.is_empty()
    }
}
