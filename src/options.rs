//! Configuration of a tidy run.
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An option which is either switched on with `true`, or given an explicit value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Flag(bool),
    Value(T),
}

impl<T> Toggle<T> {
    /// The effective value: `None` when switched off, `default` when switched on.
    pub fn resolve<F: FnOnce() -> T>(&self, default: F) -> Option<T>
    where
        T: Clone,
    {
        match self {
            Self::Flag(false) => None,
            Self::Flag(true) => Some(default()),
            Self::Value(value) => Some(value.clone()),
        }
    }
}

impl<T> From<T> for Toggle<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

/// How two entries are recognised as the same.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateRule {
    /// Same citation key.
    Key,
    /// Same DOI, ignoring case and whitespace.
    Doi,
    /// Same abstract, ignoring case and whitespace.
    Abstract,
    /// Same author surnames and title.
    Citation,
}

/// What happens to a cluster of duplicate entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Keep the first entry only.
    First,
    /// Keep the last duplicate only.
    Last,
    /// Keep the first entry and add fields it does not have.
    #[default]
    Combine,
    /// Keep the first entry and add fields, replacing those it has.
    Overwrite,
}

/// Indentation of fields inside an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Indent {
    Spaces(usize),
    Tab,
}

impl Default for Indent {
    fn default() -> Self {
        Self::Spaces(2)
    }
}

/// Alignment of field values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Align {
    /// Pad names to the longest field name of the entry.
    Auto,
    /// Pad names to a fixed width.
    Column(usize),
}

/// Citation keys generated when `generateKeys` is `true`.
pub const DEFAULT_KEY_TEMPLATE: &str = "[auth:required:lower][year:required][veryshorttitle:lower]";

/// Field order used when `sortFields` is `true`.
pub const DEFAULT_FIELD_ORDER: &[&str] = &[
    "title",
    "shorttitle",
    "author",
    "year",
    "month",
    "day",
    "journal",
    "booktitle",
    "location",
    "on",
    "publisher",
    "address",
    "series",
    "volume",
    "number",
    "pages",
    "doi",
    "isbn",
    "issn",
    "url",
    "urldate",
    "copyright",
    "category",
    "note",
    "metadata",
];

/// Duplicate rules used when merging is requested without naming any.
pub const DEFAULT_DUPLICATE_RULES: &[DuplicateRule] = &[
    DuplicateRule::Doi,
    DuplicateRule::Citation,
    DuplicateRule::Abstract,
];

/// Options of a tidy run. Every option is off by default, which reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TidyOptions {
    pub omit: Vec<String>,
    pub curly: bool,
    pub numeric: bool,
    pub space: Option<Toggle<usize>>,
    pub tab: bool,
    pub align: Option<Toggle<usize>>,
    pub sort: Option<Toggle<Vec<String>>>,
    pub duplicates: Option<Toggle<Vec<DuplicateRule>>>,
    pub merge: Option<Toggle<MergeStrategy>>,
    pub strip_enclosing_braces: bool,
    pub drop_all_caps: bool,
    pub escape: bool,
    #[serde(alias = "sortProperties")]
    pub sort_fields: Option<Toggle<Vec<String>>>,
    pub strip_comments: bool,
    pub trailing_commas: bool,
    pub encode_urls: bool,
    pub tidy_comments: bool,
    pub remove_empty_fields: bool,
    pub remove_duplicate_fields: bool,
    pub generate_keys: Option<Toggle<String>>,
    pub max_authors: Option<usize>,
    pub lowercase: bool,
    pub enclosing_braces: Option<Toggle<Vec<String>>>,
    pub wrap: Option<Toggle<usize>>,
}

impl TidyOptions {
    /// The defaults of the command-line tool.
    pub fn recommended() -> Self {
        Self {
            space: Some(Toggle::Value(2)),
            align: Some(Toggle::Value(14)),
            escape: true,
            lowercase: true,
            tidy_comments: true,
            remove_duplicate_fields: true,
            ..Self::default()
        }
    }

    /// Parse options from a JSON object such as `{"curly": true, "sort": ["-year"]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn indent(&self) -> Indent {
        if self.tab {
            return Indent::Tab;
        }
        match &self.space {
            Some(toggle) => Indent::Spaces(toggle.resolve(|| 2).unwrap_or(2)),
            None => Indent::default(),
        }
    }

    pub fn alignment(&self) -> Option<Align> {
        match self.align.as_ref()? {
            Toggle::Flag(false) => None,
            Toggle::Flag(true) => Some(Align::Auto),
            Toggle::Value(column) => Some(Align::Column(*column)),
        }
    }

    pub fn wrap_column(&self) -> Option<usize> {
        self.wrap.as_ref()?.resolve(|| 80)
    }

    /// Whether entries are re-rendered with an explicit layout instead of being kept as
    /// written.
    pub fn is_layout(&self) -> bool {
        self.space.as_ref().is_some_and(|t| t != &Toggle::Flag(false))
            || self.tab
            || self.alignment().is_some()
            || self.wrap_column().is_some()
            || self.trailing_commas
            || self.lowercase
    }

    pub fn sort_keys(&self) -> Option<Vec<String>> {
        self.sort.as_ref()?.resolve(|| vec!["key".to_string()])
    }

    pub fn field_order(&self) -> Option<Vec<String>> {
        self.sort_fields
            .as_ref()?
            .resolve(|| DEFAULT_FIELD_ORDER.iter().map(|s| s.to_string()).collect())
    }

    pub fn merge_strategy(&self) -> Option<MergeStrategy> {
        self.merge.as_ref()?.resolve(MergeStrategy::default)
    }

    /// The duplicate rules in effect. Merging without explicit rules uses the defaults.
    pub fn duplicate_rules(&self) -> Option<Vec<DuplicateRule>> {
        let defaults = || DEFAULT_DUPLICATE_RULES.to_vec();
        match &self.duplicates {
            Some(toggle) => toggle
                .resolve(defaults)
                .or_else(|| self.merge_strategy().map(|_| DEFAULT_DUPLICATE_RULES.to_vec())),
            None => self.merge_strategy().map(|_| defaults()),
        }
    }

    pub fn key_template(&self) -> Option<String> {
        self.generate_keys
            .as_ref()?
            .resolve(|| DEFAULT_KEY_TEMPLATE.to_string())
    }

    pub fn enclosed_fields(&self) -> Option<Vec<String>> {
        self.enclosing_braces
            .as_ref()?
            .resolve(|| vec!["title".to_string()])
    }
}
