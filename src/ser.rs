//! Rendering of a [`Document`] back to text.
//!
//! In the default mode, text between blocks is written verbatim and every block which no
//! pass has changed is written as its original source, so an untouched document is
//! reproduced byte for byte. Changed blocks are rendered with the [`DefaultFormatter`].
//!
//! In layout mode every block is rendered with a [`LayoutFormatter`]; whitespace-only text
//! is dropped and the remaining pieces are separated by a blank line.
mod formatter;

use std::io;

pub use self::formatter::{DefaultFormatter, Formatter, Layout, LayoutFormatter};
use crate::options::TidyOptions;
use crate::value::{Block, BlockBody, Delimiter, Document, Entry, Node, RawBody};

/// How a document is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Re-render every block with this layout.
    pub layout: Option<Layout>,
    /// Trim comments and free text completely in layout mode.
    pub tidy_comments: bool,
}

impl RenderOptions {
    pub fn from_options(options: &TidyOptions) -> Self {
        let layout = options.is_layout().then(|| Layout {
            indent: options.indent(),
            align: options.alignment(),
            wrap: options.wrap_column(),
            trailing_commas: options.trailing_commas,
            lowercase: options.lowercase,
        });
        Self {
            layout,
            tidy_comments: options.tidy_comments,
        }
    }
}

/// The main serializer, when you already have a [`std::io::Write`] and a [`Formatter`].
pub struct Serializer<W, F = DefaultFormatter> {
    writer: W,
    formatter: F,
}

impl<W, F> Serializer<W, F>
where
    W: io::Write,
    F: Formatter,
{
    /// Create a new [`Serializer`].
    pub fn new(writer: W, formatter: F) -> Self {
        Self { writer, formatter }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write one block from its tree.
    pub fn serialize_block(&mut self, block: &Block) -> io::Result<()> {
        match &block.body {
            BlockBody::Entry(entry) => self.serialize_entry(&block.command, block.delimiter, entry),
            BlockBody::Comment(body) | BlockBody::Preamble(body) | BlockBody::StringDef(body) => {
                self.serialize_raw(&block.command, block.delimiter, body)
            }
            BlockBody::Opaque(raw) => self.formatter.write_raw(&mut self.writer, raw),
        }
    }

    fn serialize_raw(
        &mut self,
        command: &str,
        delimiter: Delimiter,
        body: &RawBody,
    ) -> io::Result<()> {
        let f = &mut self.formatter;
        let w = &mut self.writer;
        f.write_command(w, command)?;
        f.write_body_start(w, delimiter)?;
        if body.is_terminated() {
            f.write_raw(w, &body.raw)?;
            f.write_body_end(w, delimiter)
        } else {
            // runs to the end of the input
            f.write_raw(w, body.raw.trim_end())
        }
    }

    fn serialize_entry(
        &mut self,
        command: &str,
        delimiter: Delimiter,
        entry: &Entry,
    ) -> io::Result<()> {
        let f = &mut self.formatter;
        let w = &mut self.writer;
        f.write_command(w, command)?;
        f.write_body_start(w, delimiter)?;
        if let Some(key) = &entry.key {
            f.write_entry_key(w, key)?;
        }

        if !entry.fields.is_empty() {
            f.write_entry_key_end(w, entry.key.is_some())?;
            let names: Vec<&str> = entry.fields.iter().map(|field| field.name.as_str()).collect();
            let width = f.name_width(&names);
            let last = entry.fields.len() - 1;

            for (idx, field) in entry.fields.iter().enumerate() {
                let mut column = f.write_field_start(w)?;
                column += f.write_field_name(w, &field.name, width)?;
                column += f.write_field_separator(w)?;
                f.write_value(w, &field.value, column)?;
                f.write_field_end(w, idx == last)?;
            }
        }
        f.write_body_end(w, delimiter)
    }

    /// Write text as it is.
    pub fn serialize_text(&mut self, text: &str) -> io::Result<()> {
        self.formatter.write_raw(&mut self.writer, text)
    }

    pub fn write_block_separator(&mut self) -> io::Result<()> {
        self.formatter.write_block_separator(&mut self.writer)
    }
}

/// Drop leading blank lines and trailing whitespace.
fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    match text.find(|c: char| !c.is_whitespace()) {
        Some(first) => {
            let line_start = text[..first].rfind('\n').map_or(0, |nl| nl + 1);
            &text[line_start..]
        }
        None => "",
    }
}

/// Write a document in its original form, re-rendering changed blocks only.
fn write_preserving<W: io::Write>(writer: W, document: &Document) -> io::Result<W> {
    let mut ser = Serializer::new(writer, DefaultFormatter {});
    for (_, node) in document.items() {
        match node {
            Node::Text(text) => ser.serialize_text(text)?,
            Node::Block(block) => match block.source() {
                Some(source) => ser.serialize_text(source)?,
                None => ser.serialize_block(block)?,
            },
        }
    }
    Ok(ser.into_inner())
}

/// Write a document with every block rendered by `layout`.
fn write_layout<W: io::Write>(
    writer: W,
    document: &Document,
    layout: &Layout,
    tidy_comments: bool,
) -> io::Result<W> {
    let mut ser = Serializer::new(writer, LayoutFormatter::new(layout.clone()));
    let mut first = true;

    for (_, node) in document.items() {
        let text = match node {
            Node::Text(text) if tidy_comments => Some(text.trim()),
            Node::Text(text) => Some(trim_blank_lines(text)),
            Node::Block(Block {
                body: BlockBody::Opaque(raw),
                ..
            }) => Some(raw.trim_end()),
            Node::Block(_) => None,
        };
        if text.is_some_and(str::is_empty) {
            continue;
        }

        if !first {
            ser.write_block_separator()?;
        }
        first = false;

        match (text, node) {
            (Some(text), _) => ser.serialize_text(text)?,
            (None, Node::Block(block)) => ser.serialize_block(block)?,
            (None, Node::Text(_)) => {}
        }
    }
    if !first {
        ser.serialize_text("\n")?;
    }
    Ok(ser.into_inner())
}

/// Write `document` to `writer`.
pub fn to_writer<W: io::Write>(writer: W, document: &Document, options: &RenderOptions) -> io::Result<W> {
    match &options.layout {
        Some(layout) => write_layout(writer, document, layout, options.tidy_comments),
        None => write_preserving(writer, document),
    }
}

/// Render `document` to a string.
pub fn to_string(document: &Document, options: &RenderOptions) -> String {
    match to_writer(Vec::new(), document, options) {
        Ok(bytes) => String::from_utf8(bytes)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()),
        // writing into a Vec does not fail
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Align, Indent};
    use crate::parse::parse;
    use crate::value::NodeId;

    fn layout() -> Layout {
        Layout {
            indent: Indent::Spaces(2),
            ..Layout::default()
        }
    }

    fn render(input: &str, layout: Option<Layout>) -> String {
        let (doc, _) = parse(input);
        to_string(&doc, &RenderOptions { layout, tidy_comments: false })
    }

    #[test]
    fn test_preserving_is_verbatim() {
        let input = "junk\n@Article( k ,title=\"x\" # jan)\n\n% c\n@comment{ c }@bad{k, = }";
        assert_eq!(render(input, None), input);
    }

    #[test]
    fn test_changed_block_is_rerendered() {
        let (mut doc, _) = parse("a\n@misc{k, title = {T}}\nb");
        doc.edit_entry(NodeId(1), |entry| {
            entry.key = Some("new".into());
            true
        });
        assert_eq!(
            to_string(&doc, &RenderOptions::default()),
            "a\n@misc{new,\n  title = {T}\n}\nb"
        );
    }

    #[test]
    fn test_layout() {
        let input = "% head\n\n\n@ARTICLE{k, Title = \"x\", year = 2000}\n\n@misc(nokey)\n@misc{title = {t}}";
        let expected = "% head\n\n@ARTICLE{k,\n  Title = \"x\",\n  year = 2000\n}\n\n@misc(nokey)\n\n@misc{\n  title = {t}\n}\n";
        assert_eq!(render(input, Some(layout())), expected);
    }

    #[test]
    fn test_layout_options() {
        let input = "@ARTICLE{k, Title = {x}, year = 2000}";
        let options = Layout {
            indent: Indent::Tab,
            align: Some(Align::Auto),
            trailing_commas: true,
            lowercase: true,
            wrap: None,
        };
        assert_eq!(
            render(input, Some(options)),
            "@article{k,\n\ttitle = {x},\n\tyear  = 2000,\n}\n"
        );
    }

    #[test]
    fn test_layout_raw_blocks() {
        let input = "@String{a = {b}}\n@preamble(\"p\")\n@comment{never";
        assert_eq!(
            render(input, Some(layout())),
            "@String{a = {b}}\n\n@preamble(\"p\")\n\n@comment{never\n"
        );
    }

    #[test]
    fn test_layout_is_stable() {
        let input = "@article{k,\n  title = {A long title which goes on and on and on},\n}\n@bad{ = x\nmore\n@misc{m}";
        let layout = Layout {
            wrap: Some(30),
            align: Some(Align::Column(8)),
            ..layout()
        };
        let once = render(input, Some(layout.clone()));
        assert_eq!(render(&once, Some(layout)), once);
    }

    #[test]
    fn test_trim_blank_lines() {
        assert_eq!(trim_blank_lines("\n \n  % c  \n\n"), "  % c");
        assert_eq!(trim_blank_lines(" \n\t"), "");
    }
}
