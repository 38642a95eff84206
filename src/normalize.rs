//! In-place cleanup passes over blocks, fields and values.
//!
//! Field passes remove fields. Value passes rewrite individual [`Segment`]s and are
//! applied in the fixed order of [`ValueStep::rank`], regardless of the order in which
//! they were requested.
pub mod escape;

use std::collections::HashSet;

use unicase::UniCase;

use crate::macros::is_month_macro;
use crate::names::{is_others, join_authors, split_authors};
use crate::parse::core::balanced;
use crate::value::{BlockBody, Document, Field, Node, NodeId, Segment};

/// Drop `@comment` blocks and free text which is not just whitespace, together with the
/// whitespace which follows them.
pub fn strip_comments(document: &mut Document) -> usize {
    let before = document.order().len();
    let mut after_removed = false;
    document.retain(|_, node| {
        let keep = match node {
            Node::Text(text) => trim_ascii(text).is_empty() && !after_removed,
            Node::Block(block) => !block.is_comment(),
        };
        after_removed = !keep;
        keep
    });
    before - document.order().len()
}

/// Whitespace as the parser sees it.
fn trim_ascii(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// Whether the rendered form of `node` ends with a line break.
fn ends_with_newline(node: &Node) -> bool {
    match node {
        Node::Text(text) => text.ends_with('\n'),
        Node::Block(block) => match (block.source(), &block.body) {
            (Some(source), _) => source.ends_with('\n'),
            (None, BlockBody::Opaque(raw)) => raw.ends_with('\n'),
            _ => false,
        },
    }
}

/// Trim the payload of comment blocks and the free text between blocks.
///
/// Free text is put on lines of its own: it starts on a new line and ends with one.
pub fn tidy_comments(document: &mut Document) -> usize {
    let mut changed = 0;
    let order = document.order().to_vec();

    for (idx, &id) in order.iter().enumerate() {
        let on_new_line = idx == 0 || ends_with_newline(document.node(order[idx - 1]));
        let edited = match document.node(id) {
            Node::Text(text) if trim_ascii(text).is_empty() => false,
            Node::Text(_) => document.edit_text(id, |text| {
                let lines: Vec<&str> = trim_ascii(text)
                    .lines()
                    .map(|line| line.trim_end_matches(|c: char| c.is_ascii_whitespace()))
                    .collect();
                let tidy = if on_new_line {
                    format!("{}\n", lines.join("\n"))
                } else {
                    format!("\n{}\n", lines.join("\n"))
                };
                let changed = tidy != *text;
                *text = tidy;
                changed
            }),
            Node::Block(_) => document.edit_block(id, |block| match &mut block.body {
                BlockBody::Comment(body) => {
                    let trimmed = body.raw.trim();
                    if trimmed.len() == body.raw.len() {
                        false
                    } else {
                        body.raw = trimmed.to_string();
                        true
                    }
                }
                _ => false,
            }),
        };
        if edited {
            changed += 1;
        }
    }
    changed
}

/// Apply `edit` to the field list of every entry, returning the entries it changed.
fn edit_fields<F>(document: &mut Document, mut edit: F) -> Vec<NodeId>
where
    F: FnMut(&mut Vec<Field>) -> bool,
{
    document
        .entry_ids()
        .into_iter()
        .filter(|&id| document.edit_entry(id, |entry| edit(&mut entry.fields)))
        .collect()
}

/// Remove fields by name, ignoring case.
pub fn omit_fields(document: &mut Document, names: &[String]) -> Vec<NodeId> {
    let names: HashSet<UniCase<&str>> = names.iter().map(|n| UniCase::new(n.as_str())).collect();
    edit_fields(document, |fields| {
        let before = fields.len();
        fields.retain(|field| !names.contains(&UniCase::new(field.name.as_str())));
        fields.len() != before
    })
}

/// Remove fields whose value contains nothing but whitespace.
pub fn remove_empty_fields(document: &mut Document) -> Vec<NodeId> {
    edit_fields(document, |fields| {
        let before = fields.len();
        fields.retain(|field| !field.value.plain().trim().is_empty());
        fields.len() != before
    })
}

/// Remove repeated fields, keeping the first occurrence of each name.
pub fn remove_duplicate_fields(document: &mut Document) -> Vec<NodeId> {
    edit_fields(document, |fields| {
        let mut seen = HashSet::new();
        let before = fields.len();
        fields.retain(|field| seen.insert(field.lowercase_name()));
        fields.len() != before
    })
}

/// A rewrite of field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueStep {
    /// Convert `"…"` segments to `{…}`.
    Curly,
    /// Remove a redundant layer of braces, `{{X}}` to `{X}`.
    StripEnclosingBraces,
    /// Write integers, and month macros in the `month` field, without delimiters.
    Numeric,
    /// Title-case values written entirely in capitals.
    DropAllCaps,
    /// Replace special characters with LaTeX sequences.
    Escape,
    /// Percent-encode characters which are not valid in URLs.
    EncodeUrls,
    /// Truncate author lists, appending `and others`.
    MaxAuthors(usize),
    /// Wrap the named fields in a second layer of braces.
    EnclosingBraces(Vec<String>),
}

impl ValueStep {
    /// Position of the step in the value pass order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Curly => 0,
            Self::StripEnclosingBraces => 1,
            Self::Numeric => 2,
            Self::DropAllCaps => 3,
            Self::Escape => 4,
            Self::EncodeUrls => 5,
            Self::MaxAuthors(_) => 6,
            Self::EnclosingBraces(_) => 7,
        }
    }

    /// Apply the step to one field, returning whether the field changed.
    pub fn apply(&self, field: &mut Field) -> bool {
        let before = field.value.clone();
        match self {
            Self::Curly => {
                for segment in &mut field.value.0 {
                    if let Segment::Quoted(text) = segment {
                        *segment = Segment::Braced(std::mem::take(text));
                    }
                }
            }
            Self::StripEnclosingBraces => {
                if let Some(segment) = field.value.sole_text_mut() {
                    let text = segment.text_mut();
                    if is_enclosed(text) {
                        *text = text[1..text.len() - 1].to_string();
                    }
                }
            }
            Self::Numeric => {
                let is_month = field.is_named("month");
                if let Some(segment) = field.value.sole_text_mut() {
                    let text = segment.text().trim().to_string();
                    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                        *segment = Segment::literal(text);
                    } else if is_month && is_month_macro(&text) {
                        *segment = Segment::literal(text.to_lowercase());
                    }
                }
            }
            Self::DropAllCaps => {
                if !is_identifier_field(field) {
                    for segment in field.value.0.iter_mut().filter(|s| s.is_delimited()) {
                        let text = segment.text_mut();
                        if is_all_caps(text) {
                            *text = title_case(text);
                        }
                    }
                }
            }
            Self::Escape => {
                if !is_identifier_field(field) {
                    for segment in field.value.0.iter_mut().filter(|s| s.is_delimited()) {
                        let text = segment.text_mut();
                        *text = escape::escape(text);
                    }
                }
            }
            Self::EncodeUrls => {
                if is_url_field(&field.name) {
                    for segment in field.value.0.iter_mut().filter(|s| s.is_delimited()) {
                        let text = segment.text_mut();
                        *text = encode_url(text);
                    }
                }
            }
            Self::MaxAuthors(max) => {
                if field.is_named("author") {
                    if let Some(segment) = field.value.sole_text_mut() {
                        let text = segment.text_mut();
                        let authors = split_authors(text);
                        if authors.len() > *max {
                            let mut kept: Vec<&str> = authors
                                .into_iter()
                                .take(*max)
                                .filter(|name| !is_others(name))
                                .collect();
                            kept.push("others");
                            *text = join_authors(kept);
                        }
                    }
                }
            }
            Self::EnclosingBraces(names) => {
                if names.iter().any(|name| field.is_named(name)) {
                    if let Some(segment) = field.value.sole_text_mut() {
                        let text = segment.text_mut();
                        if !is_enclosed(text) {
                            *text = format!("{{{text}}}");
                        }
                    }
                }
            }
        }
        field.value != before
    }
}

/// Apply value steps to every field of every entry, in pass order.
pub fn apply_value_steps(document: &mut Document, steps: &[ValueStep]) -> Vec<NodeId> {
    let mut steps: Vec<&ValueStep> = steps.iter().collect();
    steps.sort_by_key(|step| step.rank());

    edit_fields(document, |fields| {
        let mut changed = false;
        for field in fields.iter_mut() {
            for step in &steps {
                changed |= step.apply(field);
            }
        }
        changed
    })
}

/// Whether the whole text is one brace group: true for `{A {B}}`, false for `{A} {B}`.
pub fn is_enclosed(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2
        && bytes[0] == b'{'
        && bytes[bytes.len() - 1] == b'}'
        && balanced(b'{', b'}')(bytes, 1) == Ok(bytes.len() - 1)
}

/// Fields holding URLs: `url` and names ending in `url`, such as `biburl`.
pub fn is_url_field(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("url")
}

/// Fields holding identifiers whose spelling must not change.
fn is_identifier_field(field: &Field) -> bool {
    is_url_field(&field.name) || ["doi", "isbn", "issn"].iter().any(|name| field.is_named(name))
}

fn is_all_caps(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

/// Capitalize the first letter of each word and lowercase the rest. Text in nested braces
/// and command names are left alone.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut word_start = true;
    let mut in_command = false;

    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == '\\' {
            in_command = true;
            out.push(c);
            continue;
        }
        if in_command && c.is_ascii_alphabetic() {
            out.push(c);
            continue;
        }
        in_command = false;

        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if c.is_alphabetic() && depth == 0 {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            if c.is_alphanumeric() {
                word_start = false;
            }
            out.push(c);
        }
    }
    out
}

/// Percent-encode whitespace, non-ASCII characters and `"<>\^`|`. Existing escapes are
/// kept, so encoding twice is the same as encoding once.
pub fn encode_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        if c.is_ascii() && !c.is_ascii_whitespace() && !"\"<>\\^`|".contains(c) {
            out.push(c);
        } else {
            let mut buf = [0; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::value::Concat;

    fn braced(text: &str) -> Concat {
        Concat::single(Segment::braced(text))
    }

    fn apply(step: ValueStep, name: &str, value: Concat) -> Concat {
        let mut field = Field::new(name, value);
        step.apply(&mut field);
        field.value
    }

    #[test]
    fn test_curly() {
        let value = Concat(vec![Segment::quoted("a"), Segment::literal("b")]);
        assert_eq!(
            apply(ValueStep::Curly, "title", value),
            Concat(vec![Segment::braced("a"), Segment::literal("b")])
        );
    }

    #[test]
    fn test_strip_enclosing_braces() {
        assert_eq!(
            apply(ValueStep::StripEnclosingBraces, "title", braced("{Title}")),
            braced("Title")
        );
        assert_eq!(
            apply(ValueStep::StripEnclosingBraces, "title", braced("{A} and {B}")),
            braced("{A} and {B}")
        );
    }

    #[test]
    fn test_numeric() {
        assert_eq!(
            apply(ValueStep::Numeric, "year", braced("1998")),
            Concat::single(Segment::literal("1998"))
        );
        assert_eq!(
            apply(ValueStep::Numeric, "month", Concat::single(Segment::quoted("Feb"))),
            Concat::single(Segment::literal("feb"))
        );
        assert_eq!(apply(ValueStep::Numeric, "note", braced("feb")), braced("feb"));
        assert_eq!(apply(ValueStep::Numeric, "pages", braced("1-5")), braced("1-5"));
        assert_eq!(apply(ValueStep::Numeric, "year", braced("")), braced(""));
    }

    #[test]
    fn test_drop_all_caps() {
        assert_eq!(
            apply(ValueStep::DropAllCaps, "title", braced("A STUDY OF {NASA}")),
            braced("A Study Of {NASA}")
        );
        assert_eq!(
            apply(ValueStep::DropAllCaps, "title", braced("Mixed CASE")),
            braced("Mixed CASE")
        );
        for name in ["ISBN", "issn", "doi", "url", "biburl"] {
            assert_eq!(
                apply(ValueStep::DropAllCaps, name, braced("978-0-306-40615-X")),
                braced("978-0-306-40615-X")
            );
        }
    }

    #[test]
    fn test_escape_skips_urls() {
        assert_eq!(apply(ValueStep::Escape, "author", braced("Jürgen")), braced("J{\\\"u}rgen"));
        assert_eq!(apply(ValueStep::Escape, "url", braced("a%20b")), braced("a%20b"));
        assert_eq!(apply(ValueStep::Escape, "doi", braced("10.1/a&b")), braced("10.1/a&b"));
        assert_eq!(
            apply(ValueStep::Escape, "month", Concat::single(Segment::literal("jan"))),
            Concat::single(Segment::literal("jan"))
        );
    }

    #[test]
    fn test_encode_urls() {
        assert_eq!(
            apply(ValueStep::EncodeUrls, "url", braced("http://x.org/a b/ü?q=1%20")),
            braced("http://x.org/a%20b/%C3%BC?q=1%20")
        );
        assert_eq!(
            apply(ValueStep::EncodeUrls, "biburl", braced("a|b")),
            braced("a%7Cb")
        );
        assert_eq!(apply(ValueStep::EncodeUrls, "title", braced("a b")), braced("a b"));
    }

    #[test]
    fn test_max_authors() {
        let step = ValueStep::MaxAuthors(2);
        assert_eq!(
            apply(step.clone(), "author", braced("A and B and C")),
            braced("A and B and others")
        );
        assert_eq!(
            apply(step.clone(), "author", braced("A and B and others")),
            braced("A and B and others")
        );
        assert_eq!(apply(step, "author", braced("A and B")), braced("A and B"));
    }

    #[test]
    fn test_enclosing_braces() {
        let step = ValueStep::EnclosingBraces(vec!["title".into()]);
        assert_eq!(apply(step.clone(), "Title", braced("X")), braced("{X}"));
        assert_eq!(apply(step.clone(), "title", braced("{X}")), braced("{X}"));
        assert_eq!(apply(step, "journal", braced("X")), braced("X"));
    }

    #[test]
    fn test_value_steps_run_in_rank_order() {
        let (mut doc, _) = parse("@misc{k, title = \"{Title}\"}");
        let steps = [
            ValueStep::EnclosingBraces(vec!["title".into()]),
            ValueStep::Curly,
            ValueStep::StripEnclosingBraces,
        ];
        let changed = apply_value_steps(&mut doc, &steps);
        assert_eq!(changed, vec![NodeId(0)]);
        let entry = doc.entry(NodeId(0)).unwrap();
        assert_eq!(entry.fields[0].value, braced("{Title}"));
    }

    #[test]
    fn test_field_passes() {
        let (mut doc, _) = parse(
            "@misc{k, Note = {x}, abstract = {a}, note = {y}, year = {  }, title = \"\"}",
        );
        assert_eq!(omit_fields(&mut doc, &["ABSTRACT".into()]).len(), 1);
        assert_eq!(remove_empty_fields(&mut doc).len(), 1);
        assert_eq!(remove_duplicate_fields(&mut doc).len(), 1);
        let entry = doc.entry(NodeId(0)).unwrap();
        let names: Vec<_> = entry.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Note"]);
        assert!(remove_duplicate_fields(&mut doc).is_empty());
    }

    #[test]
    fn test_comment_passes() {
        let (mut doc, _) = parse("% lead  \n\n@comment{  c  }\n\n@misc{k}\n");
        assert_eq!(tidy_comments(&mut doc), 2);
        let texts: Vec<_> = doc
            .items()
            .filter_map(|(_, node)| match node {
                Node::Text(text) => Some(text.clone()),
                Node::Block(_) => None,
            })
            .collect();
        assert_eq!(texts, vec!["% lead\n", "\n\n", "\n"]);
        assert_eq!(
            doc.block(NodeId(1)).unwrap().body,
            BlockBody::Comment(crate::value::RawBody::new("c"))
        );

        assert_eq!(strip_comments(&mut doc), 3);
        assert_eq!(doc.entry_count(), 1);
        assert_eq!(doc.order().len(), 2);
    }

    #[test]
    fn test_tidy_comments_after_line_break() {
        let (mut doc, _) = parse("@misc{a, c {y\n@% one  \n@misc{k}% two");
        tidy_comments(&mut doc);
        let texts: Vec<_> = doc
            .items()
            .filter_map(|(_, node)| match node {
                Node::Text(text) => Some(text.clone()),
                Node::Block(_) => None,
            })
            .collect();
        assert_eq!(texts, vec!["@% one\n", "\n% two\n"]);
        assert_eq!(tidy_comments(&mut doc), 0);
    }
}
