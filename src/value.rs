//! The concrete syntax tree of a bibliography.
//!
//! A [`Document`] is an arena of top-level [`Node`]s addressed by stable [`NodeId`]s,
//! together with the order in which the nodes are rendered. Passes that reorder or drop
//! nodes only touch the order, so ids held elsewhere (warnings, duplicate back-references,
//! the resolved field index) stay valid for the whole run.
use std::fmt;

use serde::Serialize;
use unicase::UniCase;

/// Stable handle of a top-level node in a [`Document`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The position of the node in the arena, which is also its position in the input.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The bracket pair enclosing the body of a block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Brace,
    Paren,
}

impl Delimiter {
    pub fn from_opening(b: u8) -> Option<Self> {
        match b {
            b'{' => Some(Self::Brace),
            b'(' => Some(Self::Paren),
            _ => None,
        }
    }

    pub fn open(self) -> char {
        match self {
            Self::Brace => '{',
            Self::Paren => '(',
        }
    }

    pub fn close(self) -> char {
        match self {
            Self::Brace => '}',
            Self::Paren => ')',
        }
    }
}

/// One delimiter-typed chunk of a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A bare token, such as a macro name or a number.
    Literal(String),
    /// Text delimited by `{` and `}`. The outer braces are not stored.
    Braced(String),
    /// Text delimited by `"`. The quotes are not stored.
    Quoted(String),
}

impl Segment {
    pub fn literal<S: Into<String>>(s: S) -> Self {
        Self::Literal(s.into())
    }

    pub fn braced<S: Into<String>>(s: S) -> Self {
        Self::Braced(s.into())
    }

    pub fn quoted<S: Into<String>>(s: S) -> Self {
        Self::Quoted(s.into())
    }

    /// The content of the segment without delimiters.
    pub fn text(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Braced(s) | Self::Quoted(s) => s,
        }
    }

    pub fn text_mut(&mut self) -> &mut String {
        match self {
            Self::Literal(s) | Self::Braced(s) | Self::Quoted(s) => s,
        }
    }

    /// Whether the segment is delimited text rather than a bare token.
    pub fn is_delimited(&self) -> bool {
        matches!(self, Self::Braced(_) | Self::Quoted(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Braced(s) => write!(f, "{{{s}}}"),
            Self::Quoted(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A field value: one or more segments joined with `#`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Concat(pub Vec<Segment>);

impl Concat {
    pub fn single(segment: Segment) -> Self {
        Self(vec![segment])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// The single delimited segment of the value, if the value consists of exactly one.
    pub fn sole_text_mut(&mut self) -> Option<&mut Segment> {
        match self.0.as_mut_slice() {
            [segment] if segment.is_delimited() => Some(segment),
            _ => None,
        }
    }

    pub fn sole_text(&self) -> Option<&Segment> {
        match self.0.as_slice() {
            [segment] if segment.is_delimited() => Some(segment),
            _ => None,
        }
    }

    /// Concatenation of the segment contents with delimiters stripped.
    pub fn plain(&self) -> String {
        self.0.iter().map(Segment::text).collect()
    }
}

impl FromIterator<Segment> for Concat {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Concat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut is_first = true;
        for segment in &self.0 {
            if !is_first {
                f.write_str(" # ")?;
            }
            write!(f, "{segment}")?;
            is_first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The field name with its original casing.
    pub name: String,
    pub value: Concat,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, value: Concat) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Case-insensitive comparison of the field name.
    pub fn is_named(&self, name: &str) -> bool {
        UniCase::new(self.name.as_str()) == UniCase::new(name)
    }

    pub fn lowercase_name(&self) -> String {
        self.name.to_lowercase()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// A bibliographic record such as `@article{key, ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub key: Option<String>,
    pub fields: Vec<Field>,
    /// Set by duplicate detection: the earlier entry this one duplicates.
    pub duplicate_of: Option<NodeId>,
}

impl Entry {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.is_named(name))
    }
}

/// The raw payload of `@comment`, `@preamble` and `@string` blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBody {
    /// Everything between the enclosing delimiters.
    pub raw: String,
    /// Unclosed `{` at the end of the block; zero for a well-formed block.
    pub braces: usize,
    /// Unclosed `(` at the end of the block; zero for a well-formed block.
    pub parens: usize,
}

impl RawBody {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self {
            raw: raw.into(),
            braces: 0,
            parens: 0,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.braces == 0 && self.parens == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    Comment(RawBody),
    Preamble(RawBody),
    StringDef(RawBody),
    Entry(Entry),
    /// A block which could not be parsed, retained verbatim from `@` to its end.
    Opaque(String),
}

/// The kind of a block, determined case-insensitively from its command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Comment,
    Preamble,
    StringDef,
    Entry,
}

impl BlockKind {
    pub fn of(command: &str) -> Self {
        let command = UniCase::new(command);
        if command == UniCase::ascii("comment") {
            Self::Comment
        } else if command == UniCase::ascii("preamble") {
            Self::Preamble
        } else if command == UniCase::ascii("string") {
            Self::StringDef
        } else {
            Self::Entry
        }
    }
}

/// A top-level `@command{...}` unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The command as written, e.g. `Article`.
    pub command: String,
    pub delimiter: Delimiter,
    pub body: BlockBody,
    /// The input text of the block while it is unchanged.
    source: Option<String>,
}

impl Block {
    pub fn new<S: Into<String>>(command: S, delimiter: Delimiter, body: BlockBody) -> Self {
        Self {
            command: command.into(),
            delimiter,
            body,
            source: None,
        }
    }

    pub(crate) fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The original text of the block, if no pass has changed it.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Forget the original text so that the block is rendered from the tree.
    pub fn invalidate(&mut self) {
        self.source = None;
    }

    pub fn kind(&self) -> BlockKind {
        BlockKind::of(&self.command)
    }

    pub fn entry(&self) -> Option<&Entry> {
        match &self.body {
            BlockBody::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn entry_mut(&mut self) -> Option<&mut Entry> {
        match &mut self.body {
            BlockBody::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.body, BlockBody::Comment(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Free text between blocks, preserved verbatim.
    Text(String),
    Block(Block),
}

impl Node {
    pub fn block(&self) -> Option<&Block> {
        match self {
            Node::Block(block) => Some(block),
            Node::Text(_) => None,
        }
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.block().and_then(Block::entry)
    }
}

/// A parsed bibliography.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    nodes: Vec<Node>,
    order: Vec<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node at the end of the document.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.order.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// The ids of the nodes in rendering order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub(crate) fn order_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.order
    }

    /// Iterate over the nodes in rendering order.
    pub fn items(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.order.iter().map(|&id| (id, &self.nodes[id.0]))
    }

    pub fn block(&self, id: NodeId) -> Option<&Block> {
        self.node(id).block()
    }

    pub fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.node(id).entry()
    }

    /// Iterate over the entries in rendering order.
    pub fn entries(&self) -> impl Iterator<Item = (NodeId, &Entry)> + '_ {
        self.items()
            .filter_map(|(id, node)| node.entry().map(|entry| (id, entry)))
    }

    pub fn entry_ids(&self) -> Vec<NodeId> {
        self.entries().map(|(id, _)| id).collect()
    }

    /// Apply `edit` to a block, forgetting its source text if `edit` reports a change.
    pub fn edit_block<F>(&mut self, id: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut Block) -> bool,
    {
        match &mut self.nodes[id.0] {
            Node::Block(block) => {
                let changed = edit(block);
                if changed {
                    block.invalidate();
                }
                changed
            }
            Node::Text(_) => false,
        }
    }

    /// Apply `edit` to an entry, forgetting its source text if `edit` reports a change.
    pub fn edit_entry<F>(&mut self, id: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut Entry) -> bool,
    {
        self.edit_block(id, |block| block.entry_mut().is_some_and(edit))
    }

    /// Record that an entry duplicates `original`. The annotation is not rendered, so the
    /// source text of the entry is kept.
    pub fn mark_duplicate(&mut self, id: NodeId, original: NodeId) {
        if let Node::Block(block) = &mut self.nodes[id.0] {
            if let Some(entry) = block.entry_mut() {
                entry.duplicate_of = Some(original);
            }
        }
    }

    pub fn edit_text<F>(&mut self, id: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut String) -> bool,
    {
        match &mut self.nodes[id.0] {
            Node::Text(text) => edit(text),
            Node::Block(_) => false,
        }
    }

    /// Keep only the nodes for which `keep` returns true. Dropped nodes stay in the arena.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(NodeId, &Node) -> bool,
    {
        let nodes = &self.nodes;
        self.order.retain(|&id| keep(id, &nodes[id.0]));
    }

    pub fn remove(&mut self, id: NodeId) {
        self.order.retain(|&other| other != id);
    }

    /// Number of entries currently in the document.
    pub fn entry_count(&self) -> usize {
        self.entries().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_display() {
        assert_eq!(
            Concat::from_iter([Segment::literal("jan")]).to_string(),
            "jan"
        );
        assert_eq!(
            Concat::from_iter([
                Segment::braced("a"),
                Segment::literal("B"),
                Segment::quoted("c"),
            ])
            .to_string(),
            "{a} # B # \"c\""
        );
        assert_eq!(Concat::single(Segment::braced("")).to_string(), "{}");
    }

    #[test]
    fn test_concat_plain() {
        let value = Concat::from_iter([Segment::braced("a "), Segment::literal("b")]);
        assert_eq!(value.plain(), "a b");
        assert!(value.sole_text().is_none());
        assert!(Concat::single(Segment::literal("1")).sole_text().is_none());
    }

    #[test]
    fn test_block_kind() {
        assert_eq!(BlockKind::of("COMMent"), BlockKind::Comment);
        assert_eq!(BlockKind::of("preamble"), BlockKind::Preamble);
        assert_eq!(BlockKind::of("String"), BlockKind::StringDef);
        assert_eq!(BlockKind::of("article"), BlockKind::Entry);
    }

    #[test]
    fn test_field_is_named() {
        let field = Field::new("Title", Concat::single(Segment::braced("T")));
        assert!(field.is_named("title"));
        assert!(field.is_named("TITLE"));
        assert!(!field.is_named("titles"));
    }

    #[test]
    fn test_edit_invalidates_source() {
        let mut doc = Document::new();
        let block = Block::new("misc", Delimiter::Brace, BlockBody::Entry(Entry::default()))
            .with_source("@misc{}");
        let id = doc.push(Node::Block(block));

        assert!(!doc.edit_entry(id, |_| false));
        assert_eq!(doc.block(id).and_then(Block::source), Some("@misc{}"));

        assert!(doc.edit_entry(id, |entry| {
            entry.key = Some("k".into());
            true
        }));
        assert_eq!(doc.block(id).and_then(Block::source), None);
    }

    #[test]
    fn test_retain_keeps_ids() {
        let mut doc = Document::new();
        let a = doc.push(Node::Text("a".into()));
        let b = doc.push(Node::Text("b".into()));
        doc.retain(|id, _| id != a);
        assert_eq!(doc.order(), &[b]);
        assert_eq!(doc.node(a), &Node::Text("a".into()));
    }
}
