//! Non-fatal findings reported alongside the tidied bibliography.
use std::fmt;

use serde::Serialize;

use crate::value::NodeId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// An entry has fields but no citation key.
    MissingKey,
    /// Two entries share a citation key.
    DuplicateKey,
    /// An entry was detected as a duplicate of an earlier entry.
    DuplicateEntry,
    /// A value or block runs to the end of the input.
    UnterminatedBlock,
    /// A block could not be parsed and is kept verbatim.
    MalformedBlock,
    /// An option could not be applied.
    InvalidOption,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingKey => "MISSING_KEY",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::UnterminatedBlock => "UNTERMINATED_BLOCK",
            Self::MalformedBlock => "MALFORMED_BLOCK",
            Self::InvalidOption => "INVALID_OPTION",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the block a warning is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRef {
    pub node: NodeId,
    pub key: Option<String>,
}

impl EntryRef {
    pub fn new(node: NodeId, key: Option<&str>) -> Self {
        Self {
            node,
            key: key.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<EntryRef>,
}

impl Warning {
    pub fn new<S: Into<String>>(code: WarningCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            entry: None,
            duplicate_of: None,
        }
    }

    pub fn with_entry(mut self, entry: EntryRef) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn with_duplicate_of(mut self, original: EntryRef) -> Self {
        self.duplicate_of = Some(original);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Ordered collection of warnings raised during one run.
#[derive(Debug, Clone, Default)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!(code = %warning.code, "{}", warning.message);
        self.0.push(warning);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    pub fn count(&self, code: WarningCode) -> usize {
        self.0.iter().filter(|w| w.code == code).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}
