//! The semantic document model.
//!
//! This is what the document reader produces and what the renderers
//! consume: a flat list of blocks, inlines within them, and the meta state
//! accumulated while reading. All elements are immutable once constructed.

pub mod anchor;
pub mod meta;

pub use anchor::{Anchor, Region};
pub use meta::Meta;

pub use crate::atom::MathKind;

/// Ordering discipline of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ListKind {
    Unordered,
    Ordered,
    Description,
}

/// Font style carried by a styled inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontStyle {
    Normal,
    Emph,
    Bold,
    Italic,
    SmallCaps,
    Monospace,
    Superscript,
    Subscript,
}

/// Citation rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CiteMode {
    /// `\cite`.
    Bare,
    /// `\parencite`.
    Paren,
    /// `\textcite`.
    Text,
    /// `\citeauthor`.
    Author,
    /// `\citeyear`.
    Year,
}

/// One cited key inside a multicite.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SingleCite {
    pub key: String,
}

/// A citation group: one or more keys sharing a mode and outer notes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiCite {
    pub mode: CiteMode,
    pub prenote: Vec<Inline>,
    pub postnote: Vec<Inline>,
    pub cites: Vec<SingleCite>,
}

/// What a pointer leads to, once resolved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Target {
    Internal(Anchor),
    External { title: String, url: String },
}

/// An inline element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Inline {
    Str(String),
    Styled(FontStyle, Vec<Inline>),
    Math(MathKind, Vec<Inline>),
    Space,
    Citation(MultiCite),
    /// A cross-reference. `label` is the user-chosen key; internal targets
    /// are resolved against the label map at emit time. External targets
    /// are resolved already.
    Pointer {
        label: String,
        target: Option<Target>,
    },
    /// A footnote mark with its body.
    Note { anchor: Anchor, blocks: Vec<Block> },
}

/// A table cell, possibly spanning several columns.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableCell {
    pub span: u32,
    pub content: Vec<Inline>,
}

impl TableCell {
    pub fn new(content: Vec<Inline>) -> TableCell {
        TableCell { span: 1, content }
    }
}

/// An item of an anchored (example) list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnchoredItem {
    pub anchor: Anchor,
    pub blocks: Vec<Block>,
}

/// One rendered bibliography entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BibItem {
    pub anchor: Anchor,
    pub key: String,
    /// The agent-year label, e.g. `Smith 2020`.
    pub label: String,
    /// The full entry text.
    pub text: String,
}

/// A block element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Block {
    Paragraph(Vec<Inline>),
    Header {
        level: u8,
        anchor: Anchor,
        inlines: Vec<Inline>,
    },
    List {
        kind: ListKind,
        items: Vec<Vec<Block>>,
    },
    /// A list whose items carry anchors (numbered linguistic examples).
    AnchorList {
        kind: ListKind,
        items: Vec<AnchoredItem>,
    },
    BibList(Vec<BibItem>),
    Quotation(Vec<Block>),
    Figure {
        anchor: Anchor,
        /// Identifier into the media map.
        media: usize,
        caption: Vec<Inline>,
    },
    Table {
        anchor: Anchor,
        caption: Vec<Inline>,
        rows: Vec<Vec<TableCell>>,
    },
    SimpleTable(Vec<Vec<TableCell>>),
}

/// A bibliographic record as the core consumes it. The BibTeX subsystem
/// produces these; the reader matches them by key and the renderers format
/// citations from them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BibRecord {
    pub key: String,
    /// The agents of the entry, e.g. `Smith & Jones`.
    pub agents: String,
    pub year: String,
    /// Full entry text for the bibliography listing.
    pub text: String,
}

impl BibRecord {
    /// The agent-year label, e.g. `Smith 2020`.
    pub fn label(&self) -> String {
        match (self.agents.is_empty(), self.year.is_empty()) {
            (false, false) => format!["{} {}", self.agents, self.year],
            (false, true) => self.agents.clone(),
            (true, false) => self.year.clone(),
            (true, true) => self.key.clone(),
        }
    }
}

/// The reader's result: the block tree plus the final meta state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    pub blocks: Vec<Block>,
    pub meta: Meta,
}

/// Flatten inlines to plain text, for identifiers and warnings.
pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Str(s) => out.push_str(s),
            Inline::Space => out.push(' '),
            Inline::Styled(_, children) | Inline::Math(_, children) => {
                out.push_str(&inline_text(children))
            }
            _ => {}
        }
    }
    out
}
