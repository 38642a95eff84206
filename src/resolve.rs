//! Per-entry index from lowercased field names to plain values.
use std::collections::HashMap;

use crate::macros::months;
use crate::value::{Concat, Document, Entry, NodeId, Segment};

/// A field value with delimiters stripped and month macros expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    /// The value as it would be written, e.g. `{A} # b`.
    pub raw: String,
}

pub type FieldMap = HashMap<String, Resolved>;

/// Resolve a single value. Bare literals in the `month` field go through the month
/// macro table; other literals are kept as written.
pub fn resolve_value(name: &str, value: &Concat) -> Resolved {
    let is_month = name.eq_ignore_ascii_case("month");
    let resolved = value
        .segments()
        .iter()
        .map(|segment| match segment {
            Segment::Literal(s) if is_month => months().resolve(s),
            other => other.text(),
        })
        .collect();

    Resolved {
        value: resolved,
        raw: value.to_string(),
    }
}

/// Resolve all fields of an entry. The first field with a given name wins.
pub fn resolve_entry(entry: &Entry) -> FieldMap {
    let mut map = FieldMap::with_capacity(entry.fields.len());
    for field in &entry.fields {
        map.entry(field.lowercase_name())
            .or_insert_with(|| resolve_value(&field.name, &field.value));
    }
    map
}

/// Resolved fields of every entry in a document, keyed by node.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    entries: HashMap<NodeId, FieldMap>,
}

impl FieldIndex {
    pub fn build(document: &Document) -> Self {
        let entries = document
            .entries()
            .map(|(id, entry)| (id, resolve_entry(entry)))
            .collect();
        Self { entries }
    }

    /// Re-resolve one entry after its fields changed.
    pub fn refresh(&mut self, document: &Document, id: NodeId) {
        match document.entry(id) {
            Some(entry) => {
                self.entries.insert(id, resolve_entry(entry));
            }
            None => {
                self.entries.remove(&id);
            }
        }
    }

    pub fn get(&self, id: NodeId, name: &str) -> Option<&Resolved> {
        self.entries.get(&id)?.get(&name.to_lowercase())
    }

    /// The plain value of a field.
    pub fn value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id, name).map(|resolved| resolved.value.as_str())
    }
}
