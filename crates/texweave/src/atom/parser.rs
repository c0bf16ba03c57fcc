//! The structural parser: token stream to atom tree.
//!
//! This stage is pure. It folds balanced braces into groups, recognises
//! `\begin{X}`/`\end{X}` pairs as named groups, attaches command arguments
//! according to a static registry, and coalesces character runs into plain
//! strings. Everything it does not recognise is preserved for the document
//! reader to decide on.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{Arg, Args, Atom, MathKind};
use crate::token::{Token, Value};

/// Argument shape of a syntactic command.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Whether a `*` may follow the command name.
    pub star: bool,
    pub args: &'static [ArgKind],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Required,
    Optional,
}

use ArgKind::{Optional, Required};

const STAR_OPT_REQ: CommandSpec = CommandSpec {
    star: true,
    args: &[Optional, Required],
};
const REQ: CommandSpec = CommandSpec {
    star: false,
    args: &[Required],
};
const REQ2: CommandSpec = CommandSpec {
    star: false,
    args: &[Required, Required],
};
const OPT: CommandSpec = CommandSpec {
    star: false,
    args: &[Optional],
};
const OPT_REQ: CommandSpec = CommandSpec {
    star: false,
    args: &[Optional, Required],
};
const OPT2_REQ: CommandSpec = CommandSpec {
    star: false,
    args: &[Optional, Optional, Required],
};

// The registry of syntactic commands: how many arguments the parser folds
// into each command atom. Commands not listed default to zero arguments and
// the reader deals with their surroundings.
static COMMAND_SPECS: Lazy<HashMap<&'static str, CommandSpec>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // Sectioning.
    for name in [
        "part",
        "chapter",
        "section",
        "subsection",
        "subsubsection",
        "paragraph",
        "subparagraph",
    ] {
        m.insert(name, STAR_OPT_REQ);
    }
    // Font styles.
    for name in [
        "emph", "textbf", "textit", "textsc", "texttt", "textrm", "textsf", "textup", "textsl",
        "underline", "textsuperscript", "textsubscript",
    ] {
        m.insert(name, REQ);
    }
    // Preamble and document meta.
    m.insert("documentclass", OPT_REQ);
    m.insert("usepackage", OPT_REQ);
    m.insert("title", REQ);
    m.insert("subtitle", REQ);
    m.insert("author", REQ);
    m.insert("date", REQ);
    // Cross-references and hyperlinks.
    for name in ["label", "ref", "pageref", "autoref", "url", "nameref"] {
        m.insert(name, REQ);
    }
    m.insert("href", REQ2);
    // Citations: the multicite variants take a run of trailing groups that
    // the reader collects itself.
    for name in [
        "cite",
        "parencite",
        "textcite",
        "citeauthor",
        "citeyear",
        "footcite",
    ] {
        m.insert(name, OPT2_REQ);
    }
    // Floats and media.
    m.insert("includegraphics", OPT_REQ);
    m.insert("caption", OPT_REQ);
    m.insert("footnote", OPT_REQ);
    m.insert("multicolumn", CommandSpec {
        star: false,
        args: &[Required, Required, Required],
    });
    m.insert("item", OPT);
    m.insert("bibliography", REQ);
    m.insert("\\", OPT);
    // Diacritics are syntactic commands: the filter resolves them, but the
    // parser must fold their argument first.
    for name in super::symbols::DIACRITICS.keys() {
        m.insert(name, REQ);
    }
    for name in super::symbols::DOUBLE_DIACRITICS.keys() {
        m.insert(name, REQ2);
    }
    m
});

// Arguments of the structural environments the parser knows about.
static ENVIRONMENT_SPECS: Lazy<HashMap<&'static str, &'static [ArgKind]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [ArgKind]> = HashMap::new();
    m.insert("figure", &[Optional]);
    m.insert("table", &[Optional]);
    m.insert("tabular", &[Required]);
    m.insert("minipage", &[Optional, Required]);
    m
});

pub fn command_spec(name: &str) -> Option<CommandSpec> {
    COMMAND_SPECS.get(name).copied()
}

/// Parse a token stream into an atom sequence.
pub fn parse(tokens: Vec<Token>) -> Vec<Atom> {
    let mut parser = Parser { tokens, index: 0 };
    parser.parse_sequence(&Stop::EndOfInput)
}

// What terminates the sequence currently being parsed.
#[derive(Debug, Clone, PartialEq)]
enum Stop {
    EndOfInput,
    EndGroup,
    /// A closing `]` of an optional argument.
    Bracket,
    MathInline,
    MathDisplay,
    /// The `\end{name}` of a structural environment.
    Environment(String),
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Value> {
        self.tokens.get(self.index).map(Token::value)
    }

    fn peek_at(&self, offset: usize) -> Option<&Value> {
        self.tokens.get(self.index + offset).map(Token::value)
    }

    fn bump(&mut self) -> Option<Value> {
        let value = self.tokens.get(self.index)?.value().clone();
        self.index += 1;
        Some(value)
    }

    fn parse_sequence(&mut self, stop: &Stop) -> Vec<Atom> {
        let mut atoms = Vec::new();
        loop {
            let value = match self.peek() {
                // A missing terminator is tolerated here; the engine has
                // already rejected genuinely unbalanced input.
                None => return atoms,
                Some(value) => value.clone(),
            };
            match &value {
                Value::EndGroup(_) => {
                    if *stop == Stop::EndGroup {
                        self.index += 1;
                    }
                    // An unexpected end group also ends the sequence, so a
                    // stray brace cannot swallow the rest of the document.
                    return atoms;
                }
                Value::Other(']') if *stop == Stop::Bracket => {
                    self.index += 1;
                    return atoms;
                }
                Value::MathShift(_) => {
                    let doubled = matches!(self.peek_at(1), Some(Value::MathShift(_)));
                    match stop {
                        Stop::MathInline => {
                            self.index += 1;
                            return atoms;
                        }
                        Stop::MathDisplay => {
                            self.index += if doubled { 2 } else { 1 };
                            return atoms;
                        }
                        _ => {
                            self.index += if doubled { 2 } else { 1 };
                            let (kind, inner_stop) = if doubled {
                                (MathKind::Display, Stop::MathDisplay)
                            } else {
                                (MathKind::Inline, Stop::MathInline)
                            };
                            let body = self.parse_sequence(&inner_stop);
                            atoms.push(Atom::Math(kind, body));
                        }
                    }
                }
                Value::BeginGroup(_) => {
                    self.index += 1;
                    let body = self.parse_sequence(&Stop::EndGroup);
                    atoms.push(Atom::Group(String::new(), Vec::new(), body));
                }
                Value::Superscript(_) => {
                    self.index += 1;
                    let body = self.parse_script_operand();
                    atoms.push(Atom::SupScript(body));
                }
                Value::Subscript(_) => {
                    self.index += 1;
                    let body = self.parse_script_operand();
                    atoms.push(Atom::SubScript(body));
                }
                Value::AlignTab(_) => {
                    self.index += 1;
                    atoms.push(Atom::AlignMark);
                }
                Value::Space => {
                    self.index += 1;
                    atoms.push(Atom::White);
                }
                Value::Parameter { index, depth } => {
                    // A stray parameter token degrades to its spelling.
                    self.index += 1;
                    let mut text = "#".repeat(*depth as usize);
                    text.push(char::from_digit(*index as u32, 10).unwrap());
                    atoms.push(Atom::Plain(text));
                }
                Value::Letter(_) | Value::Other(_) => {
                    atoms.push(self.parse_plain(stop));
                }
                Value::ControlSequence(cs) => match cs.name.as_str() {
                    "par" if !cs.active => {
                        self.index += 1;
                        atoms.push(Atom::Par);
                    }
                    "\\" | "newline" if !cs.active => {
                        self.index += 1;
                        // The optional glue argument of \\[len] is dropped.
                        self.parse_optional_arg();
                        atoms.push(Atom::Newline);
                    }
                    "begin" if !cs.active => {
                        self.index += 1;
                        atoms.push(self.parse_environment());
                    }
                    "end" if !cs.active => {
                        self.index += 1;
                        let name = self.parse_group_text();
                        if matches!(stop, Stop::Environment(expected) if *expected == name) {
                            return atoms;
                        }
                        // An \end with no matching \begin: keep it as a
                        // command so the reader can warn about it.
                        atoms.push(Atom::Command(
                            "end".into(),
                            vec![Arg::Required(vec![Atom::Plain(name)])],
                        ));
                    }
                    _ => {
                        let name = cs.name.clone();
                        self.index += 1;
                        let args = match command_spec(&name) {
                            Some(spec) => self.parse_command_args(spec),
                            None => Vec::new(),
                        };
                        atoms.push(Atom::Command(name, args));
                    }
                },
            }
        }
    }

    // A maximal run of Letter/Other characters. The bracket terminator is
    // honoured so optional arguments are not swallowed.
    fn parse_plain(&mut self, stop: &Stop) -> Atom {
        let mut text = String::new();
        while let Some(value) = self.peek() {
            match value {
                Value::Other(']') if *stop == Stop::Bracket => break,
                Value::Letter(c) | Value::Other(c) => {
                    text.push(*c);
                    self.index += 1;
                }
                _ => break,
            }
        }
        Atom::Plain(text)
    }

    // The single balanced operand of a script token.
    fn parse_script_operand(&mut self) -> Vec<Atom> {
        self.skip_spaces();
        match self.peek().cloned() {
            Some(Value::BeginGroup(_)) => {
                self.index += 1;
                self.parse_sequence(&Stop::EndGroup)
            }
            Some(Value::Letter(c)) | Some(Value::Other(c)) => {
                self.index += 1;
                vec![Atom::Plain(c.to_string())]
            }
            Some(Value::ControlSequence(cs)) => {
                self.index += 1;
                let args = match command_spec(&cs.name) {
                    Some(spec) => self.parse_command_args(spec),
                    None => Vec::new(),
                };
                vec![Atom::Command(cs.name, args)]
            }
            _ => Vec::new(),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(Value::Space)) {
            self.index += 1;
        }
    }

    // The braced text after \begin or \end, e.g. the environment name.
    fn parse_group_text(&mut self) -> String {
        self.skip_spaces();
        let mut text = String::new();
        if !matches!(self.peek(), Some(Value::BeginGroup(_))) {
            return text;
        }
        self.index += 1;
        let mut depth = 0usize;
        while let Some(value) = self.bump() {
            match value {
                Value::BeginGroup(_) => depth += 1,
                Value::EndGroup(_) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Value::Space => text.push(' '),
                Value::ControlSequence(cs) => text.push_str(&cs.name),
                other => {
                    if let Some(c) = Token::new(other, Default::default()).char() {
                        text.push(c);
                    }
                }
            }
        }
        text
    }

    fn parse_environment(&mut self) -> Atom {
        let name = self.parse_group_text();
        let mut args = Vec::new();
        if let Some(kinds) = ENVIRONMENT_SPECS.get(name.as_str()) {
            for kind in kinds.iter() {
                match kind {
                    ArgKind::Optional => {
                        if let Some(arg) = self.parse_optional_arg() {
                            args.push(arg);
                        }
                    }
                    ArgKind::Required => {
                        if let Some(arg) = self.parse_required_arg() {
                            args.push(arg);
                        }
                    }
                }
            }
        }
        let body = self.parse_sequence(&Stop::Environment(name.clone()));
        Atom::Group(name, args, body)
    }

    fn parse_command_args(&mut self, spec: CommandSpec) -> Args {
        let mut args = Vec::new();
        if spec.star {
            self.skip_spaces();
            if matches!(self.peek(), Some(Value::Other('*'))) {
                self.index += 1;
                args.push(Arg::Star);
            }
        }
        for kind in spec.args.iter() {
            match kind {
                ArgKind::Optional => {
                    if let Some(arg) = self.parse_optional_arg() {
                        args.push(arg);
                    }
                }
                ArgKind::Required => {
                    if let Some(arg) = self.parse_required_arg() {
                        args.push(arg);
                    }
                }
            }
        }
        args
    }

    fn parse_optional_arg(&mut self) -> Option<Arg> {
        let start = self.index;
        self.skip_spaces();
        if !matches!(self.peek(), Some(Value::Other('['))) {
            self.index = start;
            return None;
        }
        self.index += 1;
        let body = self.parse_sequence(&Stop::Bracket);
        Some(Arg::Optional(body))
    }

    fn parse_required_arg(&mut self) -> Option<Arg> {
        let start = self.index;
        self.skip_spaces();
        match self.peek().cloned() {
            Some(Value::BeginGroup(_)) => {
                self.index += 1;
                Some(Arg::Required(self.parse_sequence(&Stop::EndGroup)))
            }
            Some(Value::Letter(c)) | Some(Value::Other(c)) => {
                self.index += 1;
                Some(Arg::Required(vec![Atom::Plain(c.to_string())]))
            }
            Some(Value::ControlSequence(cs)) => {
                self.index += 1;
                Some(Arg::Required(vec![Atom::Command(cs.name, Vec::new())]))
            }
            _ => {
                self.index = start;
                None
            }
        }
    }
}
