//! Tolerant parser from BibTeX text to a [`Document`].
//!
//! The parser never fails. Text between blocks is kept verbatim, an entry which ends
//! inside a value is parsed through the end of the input, and a block whose structure
//! cannot be understood is kept as an opaque chunk of text. Each block remembers the
//! slice of input it was parsed from.
pub mod core;

use memchr::memchr;

use self::core::{
    ScanError, at_line_block, balanced, identifier, key, literal, next_line_block, quoted, raw_body,
    whitespace,
};
use crate::value::{
    Block, BlockBody, BlockKind, Concat, Delimiter, Document, Entry, Field, Node, RawBody, Segment,
};
use crate::warning::{EntryRef, Warning, WarningCode, Warnings};

/// A parse anomaly found while scanning a single block.
type Issue = (WarningCode, String);

struct Scanned {
    end: usize,
    block: Block,
    issues: Vec<Issue>,
}

/// Entry structure which could not be understood, found at offset `at`.
struct Malformed {
    at: usize,
    reason: &'static str,
}

/// Parse `input` into a document, reporting anomalies as warnings.
pub fn parse(input: &str) -> (Document, Warnings) {
    let bytes = input.as_bytes();
    let mut document = Document::new();
    let mut warnings = Warnings::default();

    let mut text_start = 0;
    let mut pos = 0;

    while let Some(offset) = memchr(b'@', &bytes[pos..]) {
        let at = pos + offset;
        let Some(scanned) = block(input, at) else {
            // not a block: the `@` is part of the surrounding text
            pos = at + 1;
            continue;
        };

        if text_start < at {
            document.push(Node::Text(input[text_start..at].to_string()));
        }

        let key = scanned.block.entry().and_then(|e| e.key.clone());
        tracing::trace!(command = %scanned.block.command, start = at, end = scanned.end, "block");
        let block = scanned.block.with_source(&input[at..scanned.end]);
        let id = document.push(Node::Block(block));
        for (code, message) in scanned.issues {
            warnings.push(Warning::new(code, message).with_entry(EntryRef::new(id, key.as_deref())));
        }

        text_start = scanned.end;
        pos = scanned.end;
    }

    if text_start < input.len() {
        document.push(Node::Text(input[text_start..].to_string()));
    }

    tracing::debug!(
        nodes = document.order().len(),
        entries = document.entry_count(),
        "parsed document"
    );
    (document, warnings)
}

/// Parse the block starting at the `@` at offset `at`, or `None` if the `@` does not
/// start a block.
fn block(input: &str, at: usize) -> Option<Scanned> {
    let bytes = input.as_bytes();
    let command_end = identifier(bytes, at + 1);
    if command_end == at + 1 {
        return None;
    }
    let command = &input[at + 1..command_end];

    let open = whitespace(bytes, command_end);
    let delimiter = Delimiter::from_opening(*bytes.get(open)?)?;
    let body_start = open + 1;

    let raw = |wrap: fn(RawBody) -> BlockBody| {
        let scan = raw_body(bytes, body_start, delimiter.close() as u8);
        let mut issues = Vec::new();
        let end = if scan.is_terminated() {
            scan.end + 1
        } else {
            issues.push((
                WarningCode::UnterminatedBlock,
                format!("@{command} block is not closed before the end of the input"),
            ));
            scan.end
        };
        let body = RawBody {
            raw: input[body_start..scan.end].to_string(),
            braces: scan.braces,
            parens: scan.parens,
        };
        Scanned {
            end,
            block: Block::new(command, delimiter, wrap(body)),
            issues,
        }
    };

    let scanned = match BlockKind::of(command) {
        BlockKind::Comment => raw(BlockBody::Comment),
        BlockKind::Preamble => raw(BlockBody::Preamble),
        BlockKind::StringDef => raw(BlockBody::StringDef),
        BlockKind::Entry => match entry(input, body_start, delimiter) {
            Ok((end, entry, mut issues)) => {
                if entry.key.is_none() && !entry.fields.is_empty() {
                    issues.insert(
                        0,
                        (
                            WarningCode::MissingKey,
                            format!("@{command} entry has no citation key"),
                        ),
                    );
                }
                Scanned {
                    end,
                    block: Block::new(command, delimiter, BlockBody::Entry(entry)),
                    issues,
                }
            }
            Err(Malformed { at: failed_at, reason }) => {
                let end = opaque_end(bytes, body_start, failed_at, delimiter);
                Scanned {
                    end,
                    block: Block::new(command, delimiter, BlockBody::Opaque(input[at..end].to_string())),
                    issues: vec![(
                        WarningCode::MalformedBlock,
                        format!("@{command} block kept verbatim: {reason}"),
                    )],
                }
            }
        },
    };
    Some(scanned)
}

/// End of a block which could not be parsed at `failed_at`.
///
/// This is the balanced closing delimiter if it comes after `failed_at` and before the next
/// `@` at the start of a line, else that `@`, else the end of the input. The block always
/// covers everything the parser read, so the same input prefix is recovered the same way
/// whatever follows it.
fn opaque_end(bytes: &[u8], body_start: usize, failed_at: usize, delimiter: Delimiter) -> usize {
    let limit = if at_line_block(bytes, failed_at) {
        failed_at
    } else {
        next_line_block(bytes, failed_at)
    };
    match balanced(delimiter.open() as u8, delimiter.close() as u8)(&bytes[..limit], body_start) {
        Ok(close) if close >= failed_at => close + 1,
        _ => limit,
    }
}

/// Parse an entry body. Returns the end of the block, the entry and any anomalies.
fn entry(
    input: &str,
    start: usize,
    delimiter: Delimiter,
) -> Result<(usize, Entry, Vec<Issue>), Malformed> {
    let bytes = input.as_bytes();
    let close = delimiter.close() as u8;
    let mut entry = Entry::default();
    let unterminated = |end: usize, entry: Entry| {
        let reason = if end == input.len() {
            "entry is not closed before the end of the input"
        } else {
            "entry is not closed before the next block"
        };
        (end, entry, vec![(WarningCode::UnterminatedBlock, reason.to_string())])
    };

    let mut pos = whitespace(bytes, start);
    if at_line_block(bytes, pos) {
        return Ok(unterminated(pos, entry));
    }

    // citation key
    let key_end = key(bytes, pos);
    if key_end > pos {
        let after = whitespace(bytes, key_end);
        if bytes.get(after) != Some(&b'=') {
            entry.key = Some(input[pos..key_end].to_string());
            pos = after;
            match bytes.get(pos) {
                Some(b',') => pos += 1,
                Some(&b) if b == close => return Ok((pos + 1, entry, Vec::new())),
                None => return Ok(unterminated(input.len(), entry)),
                Some(_) if at_line_block(bytes, pos) => return Ok(unterminated(pos, entry)),
                Some(_) => {
                    return Err(Malformed {
                        at: pos,
                        reason: "expected ',' after the citation key",
                    });
                }
            }
        }
    } else if bytes.get(pos) == Some(&b',') {
        pos += 1;
    }

    // fields
    loop {
        pos = whitespace(bytes, pos);
        let name_start = match bytes.get(pos) {
            None => return Ok(unterminated(input.len(), entry)),
            Some(&b) if b == close => return Ok((pos + 1, entry, Vec::new())),
            Some(b',') => {
                pos += 1;
                continue;
            }
            Some(_) if at_line_block(bytes, pos) => return Ok(unterminated(pos, entry)),
            Some(_) => pos,
        };

        let name_end = key(bytes, name_start);
        if name_end == name_start {
            return Err(Malformed { at: pos, reason: "expected a field name" });
        }
        pos = whitespace(bytes, name_end);
        if bytes.get(pos) != Some(&b'=') {
            return Err(Malformed { at: pos, reason: "expected '=' after a field name" });
        }
        pos += 1;

        let name = &input[name_start..name_end];
        let (value_end, value, complete) = concat(input, pos, close)?;
        entry.fields.push(Field::new(name, value));
        if !complete {
            return Ok(unterminated(input.len(), entry));
        }

        pos = whitespace(bytes, value_end);
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(&b) if b == close => return Ok((pos + 1, entry, Vec::new())),
            None => return Ok(unterminated(input.len(), entry)),
            Some(_) if at_line_block(bytes, pos) => return Ok(unterminated(pos, entry)),
            Some(_) => {
                return Err(Malformed {
                    at: pos,
                    reason: "expected ',' after a field value",
                });
            }
        }
    }
}

/// Parse a `#`-joined field value. The flag is false if the value ran to the end of the
/// input.
fn concat(input: &str, start: usize, close: u8) -> Result<(usize, Concat, bool), Malformed> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut pos = whitespace(bytes, start);

    loop {
        if at_line_block(bytes, pos) {
            if segments.is_empty() {
                return Ok((pos, Concat(segments), true));
            }
            return Err(Malformed { at: pos, reason: "expected a value after '#'" });
        }
        let segment = match bytes.get(pos) {
            Some(b'{') => match balanced(b'{', b'}')(bytes, pos + 1) {
                Ok(end) => {
                    let segment = Segment::braced(&input[pos + 1..end]);
                    pos = end + 1;
                    segment
                }
                Err(_) => {
                    segments.push(Segment::braced(&input[pos + 1..]));
                    return Ok((input.len(), Concat(segments), false));
                }
            },
            Some(b'"') => match quoted(bytes, pos + 1) {
                Ok(end) => {
                    let segment = Segment::quoted(&input[pos + 1..end]);
                    pos = end + 1;
                    segment
                }
                Err(ScanError::Unterminated { .. }) => {
                    segments.push(Segment::quoted(&input[pos + 1..]));
                    return Ok((input.len(), Concat(segments), false));
                }
                Err(ScanError::UnexpectedClose { at }) => {
                    return Err(Malformed { at, reason: "unbalanced '}' in a quoted value" });
                }
            },
            Some(&b) if b != close => {
                let end = literal(bytes, pos);
                if end == pos {
                    if segments.is_empty() {
                        // an empty value such as `title = ,`
                        return Ok((pos, Concat(segments), true));
                    }
                    return Err(Malformed { at: pos, reason: "expected a value after '#'" });
                }
                let segment = Segment::literal(&input[pos..end]);
                pos = end;
                segment
            }
            _ if segments.is_empty() => return Ok((pos, Concat(segments), true)),
            _ => return Err(Malformed { at: pos, reason: "expected a value after '#'" }),
        };
        segments.push(segment);

        let next = whitespace(bytes, pos);
        if bytes.get(next) == Some(&b'#') {
            pos = whitespace(bytes, next + 1);
        } else {
            return Ok((pos, Concat(segments), true));
        }
    }
}
