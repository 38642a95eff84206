use std::io;

use crate::options::{Align, Indent};
use crate::value::{Concat, Delimiter};

/// Renders blocks with two-space indentation and no alignment.
pub struct DefaultFormatter {}

impl Formatter for DefaultFormatter {}

/// Renders blocks according to a [`Layout`].
pub struct LayoutFormatter {
    layout: Layout,
}

impl LayoutFormatter {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

/// Formatting choices for re-rendered blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub indent: Indent,
    pub align: Option<Align>,
    pub wrap: Option<usize>,
    pub trailing_commas: bool,
    pub lowercase: bool,
}

impl Layout {
    fn indent_width(&self) -> usize {
        match self.indent {
            Indent::Spaces(n) => n,
            Indent::Tab => 1,
        }
    }
}

impl Formatter for LayoutFormatter {
    fn name_width(&self, names: &[&str]) -> usize {
        match self.layout.align {
            None => 0,
            Some(Align::Auto) => names.iter().map(|n| n.chars().count()).max().unwrap_or(0),
            Some(Align::Column(column)) => column,
        }
    }

    #[inline]
    fn write_command<W>(&mut self, writer: &mut W, command: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"@")?;
        if self.layout.lowercase {
            writer.write_all(command.to_lowercase().as_bytes())
        } else {
            writer.write_all(command.as_bytes())
        }
    }

    #[inline]
    fn write_field_start<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: ?Sized + io::Write,
    {
        match self.layout.indent {
            Indent::Tab => writer.write_all(b"\t")?,
            Indent::Spaces(n) => writer.write_all(" ".repeat(n).as_bytes())?,
        }
        Ok(self.layout.indent_width())
    }

    fn write_field_name<W>(&mut self, writer: &mut W, name: &str, width: usize) -> io::Result<usize>
    where
        W: ?Sized + io::Write,
    {
        let name = if self.layout.lowercase {
            name.to_lowercase()
        } else {
            name.to_string()
        };
        let len = name.chars().count();
        writer.write_all(name.as_bytes())?;
        if width > len {
            writer.write_all(" ".repeat(width - len).as_bytes())?;
        }
        Ok(len.max(width))
    }

    fn write_value<W>(&mut self, writer: &mut W, value: &Concat, column: usize) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let rendered = value.to_string();
        match self.layout.wrap {
            Some(wrap) if column + rendered.chars().count() > wrap => {
                writer.write_all(wrap_value(&rendered, column, wrap).as_bytes())
            }
            _ => writer.write_all(rendered.as_bytes()),
        }
    }

    #[inline]
    fn write_field_end<W>(&mut self, writer: &mut W, last: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if last && !self.layout.trailing_commas {
            writer.write_all(b"\n")
        } else {
            writer.write_all(b",\n")
        }
    }
}

/// Break a rendered value into lines of at most `wrap` columns, continuing under the
/// value start. Only whitespace outside of nested braces is a break point.
fn wrap_value(rendered: &str, column: usize, wrap: usize) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote = false;

    for c in rendered.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 => in_quote = !in_quote,
            _ => {}
        }
        let level = depth + usize::from(in_quote);
        let breakable = c.is_whitespace() && (level <= 1);
        if breakable {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let continuation = format!("\n{}", " ".repeat(column));
    let mut out = String::with_capacity(rendered.len());
    let mut line = column;
    for (idx, token) in tokens.iter().enumerate() {
        let len = token.chars().count();
        if idx > 0 {
            if line + 1 + len > wrap {
                out.push_str(&continuation);
                line = column;
            } else {
                out.push(' ');
                line += 1;
            }
        }
        out.push_str(token);
        line += len;
    }
    out
}

/// Hooks used by the [`Serializer`](super::Serializer) to render a block.
///
/// Every hook has a default implementation producing the layout of
/// [`DefaultFormatter`]; implementors override the hooks they need.
pub trait Formatter {
    /// Width to which field names are padded before the `=`.
    fn name_width(&self, _names: &[&str]) -> usize {
        0
    }

    #[inline]
    fn write_block_separator<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"\n\n")
    }

    #[inline]
    fn write_command<W>(&mut self, writer: &mut W, command: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"@")?;
        writer.write_all(command.as_bytes())
    }

    #[inline]
    fn write_body_start<W>(&mut self, writer: &mut W, delimiter: Delimiter) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(delimiter.open().encode_utf8(&mut [0; 4]).as_bytes())
    }

    #[inline]
    fn write_entry_key<W>(&mut self, writer: &mut W, key: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(key.as_bytes())
    }

    #[inline]
    fn write_entry_key_end<W>(&mut self, writer: &mut W, has_key: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if has_key {
            writer.write_all(b",\n")
        } else {
            writer.write_all(b"\n")
        }
    }

    /// Write the indentation of a field, returning its width in columns.
    #[inline]
    fn write_field_start<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b"  ")?;
        Ok(2)
    }

    /// Write a field name padded to `width`, returning the columns used.
    #[inline]
    fn write_field_name<W>(&mut self, writer: &mut W, name: &str, width: usize) -> io::Result<usize>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(name.as_bytes())?;
        let len = name.chars().count();
        if width > len {
            writer.write_all(" ".repeat(width - len).as_bytes())?;
        }
        Ok(len.max(width))
    }

    #[inline]
    fn write_field_separator<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b" = ")?;
        Ok(3)
    }

    /// Write a value starting at `column`.
    #[inline]
    fn write_value<W>(&mut self, writer: &mut W, value: &Concat, _column: usize) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(value.to_string().as_bytes())
    }

    #[inline]
    fn write_field_end<W>(&mut self, writer: &mut W, last: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if last {
            writer.write_all(b"\n")
        } else {
            writer.write_all(b",\n")
        }
    }

    #[inline]
    fn write_body_end<W>(&mut self, writer: &mut W, delimiter: Delimiter) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(delimiter.close().encode_utf8(&mut [0; 4]).as_bytes())
    }

    #[inline]
    fn write_raw<W>(&mut self, writer: &mut W, raw: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(raw.as_bytes())
    }
}
