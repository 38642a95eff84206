//! Splitting of author lists and extraction of surnames.

/// Byte ranges of the names in `list`, split at ` and ` outside of braces.
fn name_spans(list: &str) -> Vec<(usize, usize)> {
    let bytes = list.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && b.is_ascii_whitespace() => {
                let word = pos + 1;
                if bytes.len() > word + 3
                    && bytes[word..word + 3].eq_ignore_ascii_case(b"and")
                    && bytes[word + 3].is_ascii_whitespace()
                {
                    spans.push((start, pos));
                    start = word + 4;
                    pos = start;
                    continue;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    spans.push((start, bytes.len()));
    spans
}

/// Split an author list at top-level ` and ` separators. Empty names are dropped.
pub fn split_authors(list: &str) -> Vec<&str> {
    name_spans(list)
        .into_iter()
        .map(|(start, end)| list[start..end].trim())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Join names with ` and `.
pub fn join_authors<'a, I: IntoIterator<Item = &'a str>>(names: I) -> String {
    names.into_iter().collect::<Vec<_>>().join(" and ")
}

/// Whether `name` is the `others` placeholder of a truncated list.
pub fn is_others(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("others")
}

fn top_level_comma(name: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, b) in name.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

/// The surname of a single name: the part before the first comma in `Last, First` form,
/// otherwise the last whitespace-separated word. A braced group counts as one word.
pub fn surname(name: &str) -> &str {
    let name = name.trim();
    if let Some(comma) = top_level_comma(name) {
        return name[..comma].trim();
    }

    let mut depth = 0usize;
    let mut start = 0;
    for (idx, b) in name.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && b.is_ascii_whitespace() => start = idx + 1,
            _ => {}
        }
    }
    &name[start..]
}
