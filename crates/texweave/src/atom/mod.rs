//! The TeX intermediate tree.
//!
//! The structural parser lifts the flat token stream into this shape;
//! the syntactic filter normalises it; the document reader walks it.

pub mod filter;
pub mod parser;
pub mod symbols;

pub use parser::parse;

/// Inline or display math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MathKind {
    Inline,
    Display,
}

/// One argument of a command or environment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Arg {
    Required(Vec<Atom>),
    Optional(Vec<Atom>),
    Star,
}

pub type Args = Vec<Arg>;

/// A node of the TeX intermediate tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Atom {
    /// A run of ordinary characters.
    Plain(String),
    /// A control sequence with its parsed arguments.
    Command(String, Args),
    /// A brace group (empty name) or a structural environment (named).
    Group(String, Args, Vec<Atom>),
    Math(MathKind, Vec<Atom>),
    SupScript(Vec<Atom>),
    SubScript(Vec<Atom>),
    /// A cell separator in alignments.
    AlignMark,
    /// Inter-word whitespace.
    White,
    /// An explicit line break (`\\` or `\newline`).
    Newline,
    /// A paragraph break.
    Par,
}

impl Atom {
    pub fn is_white(&self) -> bool {
        matches!(self, Atom::White | Atom::Newline)
    }

    /// The nth (0-based) required argument, if present.
    pub fn required_arg(args: &[Arg], n: usize) -> Option<&[Atom]> {
        args.iter()
            .filter_map(|arg| match arg {
                Arg::Required(body) => Some(body.as_slice()),
                _ => None,
            })
            .nth(n)
    }

    /// The nth (0-based) optional argument, if present.
    pub fn optional_arg(args: &[Arg], n: usize) -> Option<&[Atom]> {
        args.iter()
            .filter_map(|arg| match arg {
                Arg::Optional(body) => Some(body.as_slice()),
                _ => None,
            })
            .nth(n)
    }

    pub fn has_star(args: &[Arg]) -> bool {
        args.iter().any(|arg| matches!(arg, Arg::Star))
    }
}

/// Flatten a sequence of atoms to the text it spells, ignoring markup.
pub fn text_of(atoms: &[Atom]) -> String {
    let mut out = String::new();
    collect_text(atoms, &mut out);
    out
}

fn collect_text(atoms: &[Atom], out: &mut String) {
    for atom in atoms {
        match atom {
            Atom::Plain(s) => out.push_str(s),
            Atom::White => out.push(' '),
            Atom::Group(_, _, body) => collect_text(body, out),
            Atom::Command(_, args) => {
                for arg in args {
                    if let Arg::Required(body) = arg {
                        collect_text(body, out);
                    }
                }
            }
            _ => {}
        }
    }
}
