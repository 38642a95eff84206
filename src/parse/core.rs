//! Byte-level scanners used by the parser.
//!
//! Every scanner takes the whole input and a start offset and returns the offset where it
//! stopped. All stops are either at an ASCII byte or at the end of the input, so the
//! offsets are always valid `str` boundaries when the input began as a `str`.
use memchr::{memchr2_iter, memchr3_iter, memmem};

/// Why a delimited scan failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The input ended with `depth` delimiters still open (not counting the outer one).
    Unterminated { depth: usize },
    /// A closing bracket at offset `at` had nothing to close.
    UnexpectedClose { at: usize },
}

/// Characters which cannot appear in a citation key or field name.
const KEY_STOP: &[u8] = b",{}()=\"#%";

/// Characters which terminate a bare literal value segment.
const LITERAL_STOP: &[u8] = b",#{}\"()=";

#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// Skip ASCII whitespace.
///
/// Like `u8::is_ascii_whitespace`, U+000B VERTICAL TAB is not considered whitespace.
pub fn whitespace(input: &[u8], mut pos: usize) -> usize {
    while pos < input.len() && is_space(input[pos]) {
        pos += 1;
    }
    pos
}

/// Consume a block command such as `article`.
pub fn identifier(input: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < input.len()
        && (input[end].is_ascii_alphanumeric() || matches!(input[end], b'_' | b'-' | b':' | b'.'))
    {
        end += 1;
    }
    end
}

/// Consume a citation key or field name.
pub fn key(input: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < input.len() && !is_space(input[end]) && !KEY_STOP.contains(&input[end]) {
        end += 1;
    }
    end
}

/// Consume a bare literal such as `jan` or `1998`.
pub fn literal(input: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < input.len() && !is_space(input[end]) && !LITERAL_STOP.contains(&input[end]) {
        end += 1;
    }
    end
}

/// Consume a string with balanced brackets, returning the offset of the first unbalanced
/// closing bracket.
pub fn balanced(open: u8, close: u8) -> impl Fn(&[u8], usize) -> Result<usize, ScanError> {
    debug_assert!(open != close);

    move |input: &[u8], start: usize| {
        let mut depth = 0;

        for offset in memchr2_iter(open, close, &input[start..]) {
            let end = start + offset;
            if input[end] == open {
                depth += 1;
            } else {
                if depth == 0 {
                    return Ok(end);
                }
                depth -= 1;
            }
        }

        Err(ScanError::Unterminated { depth })
    }
}

/// Consume the content of a `"`-delimited segment, returning the offset of the closing `"`.
///
/// A `"` inside braces or escaped by an odd run of backslashes does not terminate the
/// segment.
pub fn quoted(input: &[u8], start: usize) -> Result<usize, ScanError> {
    let mut depth = 0;

    for offset in memchr3_iter(b'"', b'{', b'}', &input[start..]) {
        let end = start + offset;
        match input[end] {
            b'"' => {
                let backslashes = input[start..end]
                    .iter()
                    .rev()
                    .take_while(|&&b| b == b'\\')
                    .count();
                if depth == 0 && backslashes % 2 == 0 {
                    return Ok(end);
                }
            }
            b'{' => depth += 1,
            _ => {
                if depth == 0 {
                    return Err(ScanError::UnexpectedClose { at: end });
                }
                depth -= 1;
            }
        }
    }

    Err(ScanError::Unterminated { depth })
}

/// Outcome of scanning the raw body of a comment, preamble or string block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawScan {
    /// Offset of the closing delimiter, or the input length if there is none.
    pub end: usize,
    pub braces: usize,
    pub parens: usize,
}

impl RawScan {
    pub fn is_terminated(&self) -> bool {
        self.braces == 0 && self.parens == 0
    }
}

/// Scan a raw block body up to its closing delimiter.
///
/// For `(`-delimited bodies the closing `)` must also be outside of any braces.
pub fn raw_body(input: &[u8], start: usize, close: u8) -> RawScan {
    let mut braces = 0usize;
    let mut parens = 0usize;

    for offset in memchr3_iter(b'{', b'}', close, &input[start..]) {
        let end = start + offset;
        match input[end] {
            b'{' => braces += 1,
            b'}' if close == b'}' => {
                if braces == 0 {
                    return RawScan {
                        end,
                        braces: 0,
                        parens: 0,
                    };
                }
                braces -= 1;
            }
            b'}' => braces = braces.saturating_sub(1),
            _ => {
                if braces == 0 {
                    return RawScan {
                        end,
                        braces: 0,
                        parens: 0,
                    };
                }
            }
        }
    }

    // count the outer delimiter as unclosed
    if close == b'}' {
        braces += 1;
    } else {
        parens += 1;
    }
    RawScan {
        end: input.len(),
        braces,
        parens,
    }
}

/// Whether `pos` is an `@` at the start of a line.
pub fn at_line_block(input: &[u8], pos: usize) -> bool {
    pos > 0 && input[pos - 1] == b'\n' && input.get(pos) == Some(&b'@')
}

/// Offset of the next `@` at the start of a line, or the input length.
pub fn next_line_block(input: &[u8], start: usize) -> usize {
    match memmem::find(&input[start..], b"\n@") {
        Some(offset) => start + offset + 1,
        None => input.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        assert_eq!(whitespace(b"  \n\tx", 0), 4);
        assert_eq!(whitespace(b"x", 0), 0);
        assert_eq!(whitespace(b"\x0b", 0), 0);
        assert_eq!(whitespace(b"   ", 1), 3);
    }

    #[test]
    fn test_key() {
        assert_eq!(key(b"smith2020, title", 0), 9);
        assert_eq!(key("m\u{fc}ller}".as_bytes(), 0), 7);
        assert_eq!(key(b"a:b/c.d=", 0), 7);
        assert_eq!(key(b" x", 0), 0);
    }

    #[test]
    fn test_literal() {
        assert_eq!(literal(b"jan # x", 0), 3);
        assert_eq!(literal(b"1998}", 0), 4);
        assert_eq!(literal(b"1998)", 0), 4);
        assert_eq!(literal(b"{x}", 0), 0);
    }

    #[test]
    fn test_balanced() {
        let braces = balanced(b'{', b'}');
        assert_eq!(braces(b"url}abc", 0), Ok(3));
        assert_eq!(braces("u{}rl}\u{1f344}c".as_bytes(), 0), Ok(5));
        assert_eq!(braces(b"u{{}}rl}abc", 1), Ok(7));
        assert_eq!(braces(b"none", 0), Err(ScanError::Unterminated { depth: 0 }));
        assert_eq!(braces(b"{no", 0), Err(ScanError::Unterminated { depth: 1 }));

        let parens = balanced(b'(', b')');
        assert_eq!(parens(b"a (b) c) d", 0), Ok(7));
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted(b"cap\"rest", 0), Ok(3));
        assert_eq!(quoted(b"a{\"}\"rest", 0), Ok(4));
        assert_eq!(quoted(b"a\\\"b\"", 0), Ok(4));
        assert_eq!(quoted(b"a\\\\\"rest", 0), Ok(3));
        assert_eq!(quoted(b"a\\\\\\\"b\"", 0), Ok(6));
        assert_eq!(quoted(b"{\"", 0), Err(ScanError::Unterminated { depth: 1 }));
        assert_eq!(quoted(b"}\"", 0), Err(ScanError::UnexpectedClose { at: 0 }));
        assert_eq!(quoted(b"a}\"", 1), Err(ScanError::UnexpectedClose { at: 1 }));
    }

    #[test]
    fn test_raw_body() {
        assert_eq!(
            raw_body(b"a {b} c} d", 0, b'}'),
            RawScan {
                end: 7,
                braces: 0,
                parens: 0
            }
        );
        assert_eq!(raw_body(b"a {)} ) d", 0, b')').end, 6);
        let open = raw_body(b"a {b", 0, b'}');
        assert_eq!(open.end, 4);
        assert_eq!(open.braces, 2);
        assert!(!open.is_terminated());
        assert_eq!(raw_body(b"x", 0, b')').parens, 1);
    }

    #[test]
    fn test_next_line_block() {
        assert_eq!(next_line_block(b"junk\n@misc{}", 0), 5);
        assert_eq!(next_line_block(b"junk @misc", 0), 10);
    }

    #[test]
    fn test_at_line_block() {
        assert!(at_line_block(b"x\n@misc", 2));
        assert!(!at_line_block(b"x @misc", 2));
        assert!(!at_line_block(b"@misc", 0));
        assert!(!at_line_block(b"x\n", 2));
    }

    use proptest::prelude::*;
    proptest! {
        #[test]
        fn no_panic(s in "\\PC*") {
            let input = s.as_bytes();
            let _ = balanced(b'{', b'}')(input, 0);
            let _ = quoted(input, 0);
            let _ = raw_body(input, 0, b')');
            let _ = key(input, 0);
        }
    }
}
