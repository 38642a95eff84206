//! Ordering of entries and of the fields within entries.
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::macros::month_number;
use crate::resolve::FieldIndex;
use crate::value::{Document, NodeId};
use crate::warning::{Warning, WarningCode, Warnings};

/// Width to which numbers are padded so that they compare numerically as strings.
const NUMBER_WIDTH: usize = 20;

/// One entry sort criterion, such as `-year`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Lowercased field name, or one of the pseudo-fields `key`, `type` and `month`.
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parse a sort key; a leading `-` sorts in descending order.
    pub fn parse(spec: &str) -> Result<Self> {
        let (descending, field) = match spec.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, spec),
        };
        if field.is_empty() || field.chars().any(char::is_whitespace) {
            return Err(Error::InvalidSortKey(spec.to_string()));
        }
        Ok(Self {
            field: field.to_lowercase(),
            descending,
        })
    }
}

/// The value of an entry under one sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SortValue {
    Present(String),
    Missing,
}

impl SortValue {
    fn text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Self::Missing
        } else if s.bytes().all(|b| b.is_ascii_digit()) {
            Self::number(s.trim_start_matches('0'))
        } else {
            Self::Present(s.to_lowercase())
        }
    }

    fn number<D: std::fmt::Display>(n: D) -> Self {
        Self::Present(format!("{n:0>NUMBER_WIDTH$}"))
    }

    /// Missing values come last in either direction.
    fn compare(&self, other: &Self, descending: bool) -> Ordering {
        match (self, other) {
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Missing, Self::Present(_)) => Ordering::Greater,
            (Self::Present(_), Self::Missing) => Ordering::Less,
            (Self::Present(a), Self::Present(b)) if descending => b.cmp(a),
            (Self::Present(a), Self::Present(b)) => a.cmp(b),
        }
    }
}

fn sort_value(document: &Document, index: &FieldIndex, id: NodeId, key: &SortKey) -> SortValue {
    match key.field.as_str() {
        "key" => document
            .entry(id)
            .and_then(|e| e.key.as_deref())
            .map_or(SortValue::Missing, SortValue::text),
        "type" => document
            .block(id)
            .map_or(SortValue::Missing, |b| SortValue::Present(b.command.to_lowercase())),
        "month" => index
            .value(id, "month")
            .and_then(month_number)
            .map_or(SortValue::Missing, SortValue::number),
        field => index
            .value(id, field)
            .map_or(SortValue::Missing, SortValue::text),
    }
}

/// Parse sort key specs, reporting invalid ones as warnings.
pub fn sort_keys(specs: &[String], warnings: &mut Warnings) -> Vec<SortKey> {
    specs
        .iter()
        .filter_map(|spec| match SortKey::parse(spec) {
            Ok(key) => Some(key),
            Err(err) => {
                warnings.push(Warning::new(WarningCode::InvalidOption, err.to_string()));
                None
            }
        })
        .collect()
}

/// Sort entries by `keys`, the first key being the most significant.
///
/// Text, comments and other non-entry blocks move together with the entry which follows
/// them; anything after the last entry stays at the end.
pub fn sort_entries(
    document: &mut Document,
    index: &FieldIndex,
    keys: &[SortKey],
    warnings: &mut Warnings,
) {
    if keys.is_empty() {
        return;
    }

    for key in keys {
        let pseudo = matches!(key.field.as_str(), "key" | "type" | "month");
        let used = document
            .entry_ids()
            .into_iter()
            .any(|id| index.get(id, &key.field).is_some());
        if !pseudo && !used && document.entry_count() > 0 {
            warnings.push(Warning::new(
                WarningCode::InvalidOption,
                format!("sort key '{}' matches no entry", key.field),
            ));
        }
    }

    let mut groups: Vec<(Vec<SortValue>, Vec<NodeId>)> = Vec::new();
    let mut pending = Vec::new();
    for &id in document.order() {
        pending.push(id);
        if document.entry(id).is_some() {
            let values = keys
                .iter()
                .map(|key| sort_value(document, index, id, key))
                .collect();
            groups.push((values, std::mem::take(&mut pending)));
        }
    }
    if !pending.is_empty() {
        groups.push((vec![SortValue::Missing; keys.len()], pending));
    }

    for (idx, key) in keys.iter().enumerate().rev() {
        groups.sort_by(|a, b| a.0[idx].compare(&b.0[idx], key.descending));
    }

    *document.order_mut() = groups.into_iter().flat_map(|(_, ids)| ids).collect();
    tracing::debug!(keys = keys.len(), "sorted entries");
}

/// Order the fields of every entry by `order`. Fields not listed keep their relative order
/// after the listed ones.
pub fn sort_fields(document: &mut Document, order: &[String]) -> Vec<NodeId> {
    let order: Vec<String> = order.iter().map(|f| f.to_lowercase()).collect();
    let rank = |name: &str| {
        let name = name.to_lowercase();
        order.iter().position(|f| *f == name).unwrap_or(order.len())
    };

    document
        .entry_ids()
        .into_iter()
        .filter(|&id| {
            document.edit_entry(id, |entry| {
                let before: Vec<String> = entry.fields.iter().map(|f| f.name.clone()).collect();
                entry.fields.sort_by_key(|field| rank(&field.name));
                entry.fields.iter().map(|f| &f.name).ne(before.iter())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn sorted_keys(input: &str, specs: &[&str]) -> (Vec<String>, Warnings) {
        let (mut doc, _) = parse(input);
        let index = FieldIndex::build(&doc);
        let mut warnings = Warnings::default();
        let specs: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
        let keys = sort_keys(&specs, &mut warnings);
        sort_entries(&mut doc, &index, &keys, &mut warnings);
        let keys = doc
            .entries()
            .map(|(_, e)| e.key.clone().unwrap_or_default())
            .collect();
        (keys, warnings)
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!(
            SortKey::parse("-Year").unwrap(),
            SortKey {
                field: "year".into(),
                descending: true
            }
        );
        assert!(SortKey::parse("").is_err());
        assert!(SortKey::parse("-").is_err());
        assert!(SortKey::parse("a b").is_err());
    }

    #[test]
    fn test_multi_key_is_stable() {
        let input = "@misc{B, year = 2020}\n@misc{A, year = 2020}\n@misc{C, year = 2019}";
        let (keys, warnings) = sorted_keys(input, &["year", "key"]);
        assert_eq!(keys, vec!["C", "A", "B"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_descending_and_missing_last() {
        let input = "@misc{a, year = 999}\n@misc{b}\n@misc{c, year = 2001}\n@misc{d, year = {}}";
        let (keys, _) = sorted_keys(input, &["-year"]);
        assert_eq!(keys, vec!["c", "a", "b", "d"]);
        let (keys, _) = sorted_keys(input, &["year"]);
        assert_eq!(keys, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_month_order() {
        let input = "@misc{a, month = dec}\n@misc{b, month = {March}}\n@misc{c, month = 2}\n@misc{d, month = {spring}}";
        let (keys, _) = sorted_keys(input, &["month"]);
        assert_eq!(keys, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_type_and_case_insensitive() {
        let input = "@Misc{b,}\n@article{a,}\n@misc{A2,}";
        let (keys, _) = sorted_keys(input, &["type", "key"]);
        assert_eq!(keys, vec!["a", "A2", "b"]);
    }

    #[test]
    fn test_meta_moves_with_next_entry() {
        let input = "% about b\n@misc{b,}\n@comment{about a}\n@misc{a,}\ntrailer";
        let (mut doc, _) = parse(input);
        let index = FieldIndex::build(&doc);
        let keys = vec![SortKey::parse("key").unwrap()];
        sort_entries(&mut doc, &index, &keys, &mut Warnings::default());
        let ids: Vec<usize> = doc.order().iter().map(|id| id.index()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5, 0, 1, 6]);
    }

    #[test]
    fn test_invalid_keys_warn() {
        let (keys, warnings) = sorted_keys("@misc{b,}\n@misc{a,}", &["", "no such", "volume", "key"]);
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(warnings.count(WarningCode::InvalidOption), 3);
    }

    #[test]
    fn test_sort_fields() {
        let (mut doc, _) = parse("@misc{k, note = {n}, zzz = {z}, year = 1, Title = {t}, aaa = {a}}");
        let order: Vec<String> = ["title", "year", "note"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sort_fields(&mut doc, &order).len(), 1);
        let names: Vec<_> = doc.entries().next().unwrap().1.fields.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["Title", "year", "note", "zzz", "aaa"]);
        assert!(sort_fields(&mut doc, &order).is_empty());
    }
}
