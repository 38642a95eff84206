//! Citation key generation from templates such as `[auth:lower][year][veryshorttitle]`.
//!
//! # Markers
//!
//! | Marker | Value |
//! |--------|-------|
//! | `auth` | surname of the first author |
//! | `authEtAl` | first surname, then the second surname or `EtAl` |
//! | `authors`, `authorsN` | all (or the first N) surnames, then `EtAl` if truncated |
//! | `title`, `titleN` | all (or the first N) title words, capitalized |
//! | `shorttitle` | the first three title words |
//! | `veryshorttitle` | the first title word |
//! | `year` | the first four-digit number of the `year` (or `date`) field |
//! | `duplicateLetter`, `duplicateNumber` | where the collision suffix goes |
//! | anything else | the value of the field with that name |
//!
//! Title words skip function words such as `the` and `of` unless no other words remain.
//!
//! # Modifiers
//!
//! `upper`, `lower`, `capitalize`, `required` (the entry keeps its key if the marker is
//! empty) and a number `N`, which truncates to N characters.
use std::collections::HashSet;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::names::{is_others, split_authors, surname};
use crate::normalize::escape::fold_ascii;
use crate::resolve::FieldIndex;
use crate::value::{Document, NodeId};
use crate::warning::{Warning, WarningCode, Warnings};

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\d{4}").expect("year pattern is valid");
}

const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "nor", "for", "so", "yet", "as", "at", "by", "in",
    "of", "on", "to", "up", "via", "per", "from", "into", "onto", "upon", "with", "over",
];

/// Stands in for the collision suffix while a key is being built.
const SUFFIX_SLOT: char = '\u{0}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Auth,
    AuthEtAl,
    Authors(Option<usize>),
    Title(Option<usize>),
    ShortTitle,
    VeryShortTitle,
    Year,
    DuplicateLetter,
    DuplicateNumber,
    Field(String),
}

impl Marker {
    fn parse(name: &str) -> Self {
        let counted = |prefix: &str| {
            name.strip_prefix(prefix)
                .filter(|n| !n.is_empty())
                .and_then(|n| n.parse::<usize>().ok())
        };
        match name {
            "auth" => Self::Auth,
            "authEtAl" => Self::AuthEtAl,
            "authors" => Self::Authors(None),
            "title" => Self::Title(None),
            "shorttitle" => Self::ShortTitle,
            "veryshorttitle" => Self::VeryShortTitle,
            "year" => Self::Year,
            "duplicateLetter" => Self::DuplicateLetter,
            "duplicateNumber" => Self::DuplicateNumber,
            _ => {
                if let Some(n) = counted("authors") {
                    Self::Authors(Some(n))
                } else if let Some(n) = counted("title") {
                    Self::Title(Some(n))
                } else {
                    Self::Field(name.to_lowercase())
                }
            }
        }
    }

    fn is_duplicate_slot(&self) -> bool {
        matches!(self, Self::DuplicateLetter | Self::DuplicateNumber)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Modifier {
    Upper,
    Lower,
    Capitalize,
    Required,
    Truncate(usize),
}

impl Modifier {
    fn parse(marker: &str, name: &str) -> Result<Self> {
        match name {
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "capitalize" => Ok(Self::Capitalize),
            "required" => Ok(Self::Required),
            n => n.parse().map(Self::Truncate).map_err(|_| Error::UnknownModifier {
                marker: marker.to_string(),
                modifier: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Marker { marker: Marker, modifiers: Vec<Modifier> },
}

/// A parsed key template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    parts: Vec<Part>,
}

impl KeyTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(open) = rest.find('[') {
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let position = offset + open;
            let close = rest[open..]
                .find(']')
                .ok_or(Error::UnclosedMarker { position })?;
            let body = &rest[open + 1..open + close];

            let mut pieces = body.split(':');
            let name = pieces.next().unwrap_or_default().trim();
            if name.is_empty() {
                return Err(Error::EmptyMarker { position });
            }
            let modifiers = pieces
                .map(|m| Modifier::parse(name, m.trim()))
                .collect::<Result<Vec<_>>>()?;
            parts.push(Part::Marker {
                marker: Marker::parse(name),
                modifiers,
            });

            let consumed = open + close + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    fn has_duplicate_slot(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Marker { marker, .. } if marker.is_duplicate_slot()))
    }

    fn uses_numbers(&self) -> bool {
        self.parts.iter().any(|p| {
            matches!(
                p,
                Part::Marker {
                    marker: Marker::DuplicateNumber,
                    ..
                }
            )
        })
    }

    /// Build the key of one entry, with [`SUFFIX_SLOT`] at the collision suffix position.
    /// Returns `None` if a required marker is empty.
    fn render(&self, index: &FieldIndex, id: NodeId) -> Option<String> {
        let mut key = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => key.extend(
                    text.chars()
                        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':')),
                ),
                Part::Marker { marker, .. } if marker.is_duplicate_slot() => key.push(SUFFIX_SLOT),
                Part::Marker { marker, modifiers } => {
                    let mut value = marker_value(marker, index, id);
                    for modifier in modifiers {
                        value = match modifier {
                            Modifier::Upper => value.to_uppercase(),
                            Modifier::Lower => value.to_lowercase(),
                            Modifier::Capitalize => capitalize(&value.to_lowercase()),
                            Modifier::Required if value.is_empty() => return None,
                            Modifier::Required => value,
                            Modifier::Truncate(n) => value.chars().take(*n).collect(),
                        };
                    }
                    key.push_str(&value);
                }
            }
        }
        Some(key)
    }
}

impl FromStr for KeyTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// ASCII alphanumeric words of a LaTeX value.
fn words(text: &str) -> Vec<String> {
    fold_ascii(text)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn title_words(text: &str) -> Vec<String> {
    let all = words(text);
    let significant: Vec<String> = all
        .iter()
        .filter(|w| !FUNCTION_WORDS.contains(&w.to_lowercase().as_str()))
        .cloned()
        .collect();
    if significant.is_empty() { all } else { significant }
}

fn surnames(index: &FieldIndex, id: NodeId) -> (Vec<String>, bool) {
    let Some(list) = index.value(id, "author") else {
        return (Vec::new(), false);
    };
    let names = split_authors(list);
    let truncated = names.iter().any(|n| is_others(n));
    let surnames = names
        .into_iter()
        .filter(|n| !is_others(n))
        .map(|n| words(surname(n)).concat())
        .filter(|s| !s.is_empty())
        .collect();
    (surnames, truncated)
}

fn marker_value(marker: &Marker, index: &FieldIndex, id: NodeId) -> String {
    let title = || index.value(id, "title").map(title_words).unwrap_or_default();
    let first_words = |n: usize| {
        title()
            .into_iter()
            .take(n)
            .map(|w| capitalize(&w))
            .collect::<String>()
    };

    match marker {
        Marker::Auth => surnames(index, id).0.into_iter().next().unwrap_or_default(),
        Marker::AuthEtAl => {
            let (names, truncated) = surnames(index, id);
            match names.as_slice() {
                [] => String::new(),
                [only] if !truncated => only.clone(),
                [first, second] if !truncated => format!("{first}{second}"),
                [first, ..] => format!("{first}EtAl"),
            }
        }
        Marker::Authors(limit) => {
            let (names, truncated) = surnames(index, id);
            let n = limit.unwrap_or(names.len());
            let mut value: String = names.iter().take(n).map(String::as_str).collect();
            if !value.is_empty() && (truncated || names.len() > n) {
                value.push_str("EtAl");
            }
            value
        }
        Marker::Title(limit) => first_words(limit.unwrap_or(usize::MAX)),
        Marker::ShortTitle => first_words(3),
        Marker::VeryShortTitle => first_words(1),
        Marker::Year => index
            .value(id, "year")
            .or_else(|| index.value(id, "date"))
            .and_then(|year| YEAR.find(year))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        Marker::DuplicateLetter | Marker::DuplicateNumber => String::new(),
        Marker::Field(name) => index.value(id, name).map(|v| words(v).concat()).unwrap_or_default(),
    }
}

/// `a`, `b`, …, `z`, `aa`, `ab`, … for `n` = 0, 1, 2, …
fn letter_suffix(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.iter().rev().map(|&b| b as char).collect()
}

/// Replace the key of every entry with one generated from `template`.
///
/// Keys are assigned in document order. A key already taken, either by an earlier
/// generated key or by an entry which keeps its key, gets a suffix.
pub fn generate_keys(document: &mut Document, index: &FieldIndex, template: &KeyTemplate) -> Vec<NodeId> {
    let ids = document.entry_ids();
    let rendered: Vec<(NodeId, Option<String>)> = ids
        .iter()
        .map(|&id| (id, template.render(index, id).filter(|k| k.chars().any(|c| c != SUFFIX_SLOT))))
        .collect();

    let mut used: HashSet<String> = rendered
        .iter()
        .filter(|(_, key)| key.is_none())
        .filter_map(|(id, _)| document.entry(*id)?.key.as_ref().map(|k| k.to_lowercase()))
        .collect();

    let with_slot = template.has_duplicate_slot();
    let numbers = template.uses_numbers();
    let mut changed = Vec::new();

    for (id, base) in rendered {
        let Some(base) = base else { continue };
        let candidate = |suffix: &str| {
            if with_slot {
                base.replace(SUFFIX_SLOT, suffix)
            } else {
                format!("{base}{suffix}")
            }
        };

        let mut key = candidate("");
        let mut attempt = 0;
        while used.contains(&key.to_lowercase()) {
            let suffix = if numbers {
                (attempt + 2).to_string()
            } else {
                letter_suffix(attempt)
            };
            key = candidate(&suffix);
            attempt += 1;
        }
        used.insert(key.to_lowercase());

        let edited = document.edit_entry(id, |entry| {
            if entry.key.as_deref() == Some(key.as_str()) {
                false
            } else {
                entry.key = Some(key);
                true
            }
        });
        if edited {
            changed.push(id);
        }
    }

    tracing::debug!(changed = changed.len(), "generated keys");
    changed
}

/// Parse `template` and generate keys, reporting a bad template as a warning.
pub fn generate_keys_with(
    document: &mut Document,
    index: &FieldIndex,
    template: &str,
    warnings: &mut Warnings,
) -> Vec<NodeId> {
    match KeyTemplate::parse(template) {
        Ok(template) => generate_keys(document, index, &template),
        Err(err) => {
            warnings.push(Warning::new(
                WarningCode::InvalidOption,
                format!("generateKeys: {err}"),
            ));
            Vec::new()
        }
    }
}
