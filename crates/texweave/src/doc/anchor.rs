//! Stable identities for referenceable elements.
//!
//! Anchors are assigned exactly once, at element creation, and render to
//! the identifier strings external tooling consumes. The scheme is
//! bit-exact: see [`Anchor::id`].

/// The book region a section lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    Front,
    #[default]
    Main,
    Back,
}

impl Region {
    fn prefix(self) -> &'static str {
        match self {
            Region::Front => "front-",
            Region::Main => "",
            Region::Back => "back-",
        }
    }
}

/// A referenceable element's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Anchor {
    /// The document root; renders as the empty identifier.
    Document,
    /// A numbered section heading. `numbers` runs from the chapter level
    /// down to subparagraph.
    Section { region: Region, numbers: Vec<u32> },
    /// An unnumbered (starred) section heading.
    Phantom { region: Region, index: u32 },
    Figure { chapter: u32, index: u32 },
    Table { chapter: u32, index: u32 },
    /// A footnote mark.
    Note { chapter: u32, index: u32 },
    /// The body of a footnote, pointed back to by its mark.
    NoteText { chapter: u32, index: u32 },
    /// A numbered example item; `path` runs outermost first.
    Item { chapter: u32, path: Vec<u32> },
    /// A bibliography entry, numbered by global citation order.
    Bib { index: u32 },
}

impl Anchor {
    /// The rendered identifier.
    pub fn id(&self) -> String {
        match self {
            Anchor::Document => String::new(),
            Anchor::Section { region, numbers } => {
                let mut numbers = numbers.clone();
                while numbers.len() > 1 && numbers.last() == Some(&0) {
                    numbers.pop();
                }
                let joined: Vec<String> = numbers.iter().map(u32::to_string).collect();
                format!["sec-{}{}", region.prefix(), joined.join("-")]
            }
            Anchor::Phantom { region, index } => {
                format!["sec-{}unnumbered-{index}", region.prefix()]
            }
            Anchor::Figure { chapter, index } => format!["figure-{chapter}-{index}"],
            Anchor::Table { chapter, index } => format!["table-{chapter}-{index}"],
            Anchor::Note { chapter, index } => format!["note-{chapter}-{index}"],
            Anchor::NoteText { chapter, index } => format!["notetext-{chapter}-{index}"],
            Anchor::Item { chapter, path } => {
                let joined: Vec<String> = path.iter().map(u32::to_string).collect();
                format!["item-{chapter}-{}", joined.join("-")]
            }
            Anchor::Bib { index } => format!["bib-{index}"],
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::Document
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}
