//! The lexer/expander.
//!
//! TeX cannot be tokenized ahead of time: the catcode table and the macro
//! table are both mutable from within the input, so the meaning of a
//! character is only known at the moment it is read. The [`Engine`] is
//! therefore a demand-driven stream. Callers request the next token with
//! [`Engine::next`]; internally the engine reads characters, runs macro
//! expansion and executes definitional primitives until it has a token to
//! yield.
//!
//! Expansion follows the push-back discipline: tokens produced by a macro
//! call are prepended to an internal buffer, and the buffer is always
//! drained before the engine returns to character input. Group state
//! (catcodes, macros, environments) is saved when a begin-group token is
//! emitted and restored at the matching end-group, so scoped changes are
//! invisible outside their group no matter how the tokens were produced.

pub mod primitive;
pub mod scope;
pub mod texmacro;

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::token::{CatCode, CsName, Pos, Token, Value};
pub use primitive::{DefMode, Primitive};
use scope::{ScopedCatCodes, ScopedTable};
use texmacro::{ArgSpec, EnvironmentDef, MacroDef};

/// The meaning of a control sequence or active character.
#[derive(Debug, Clone)]
pub enum Command {
    /// A user-defined macro.
    Macro(Rc<MacroDef>),
    /// A built-in whose behaviour is hard-coded in the engine.
    Primitive(Primitive),
    /// An implicit character, produced by `\let\x=c`.
    Character(char, CatCode),
}

/// Wall-clock values captured once when the engine is created, queried by
/// the `\year`/`\month`/`\day`/`\time` primitives.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Minutes since midnight.
    pub time: u32,
}

impl Clock {
    pub fn now() -> Clock {
        use chrono::{Datelike, Local, Timelike};
        let now = Local::now();
        Clock {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            time: 60 * now.hour() + now.minute(),
        }
    }

    /// A fixed clock for reproducible output.
    pub fn fixed(year: i32, month: u32, day: u32, time: u32) -> Clock {
        Clock {
            year,
            month,
            day,
            time,
        }
    }
}

/// How the engine resolves `\input` file names.
pub trait FileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// The real file system.
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// An in-memory file system for tests and embedders.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: HashMap<PathBuf, String>,
}

impl InMemoryFileSystem {
    pub fn add_file<P: Into<PathBuf>, S: Into<String>>(&mut self, path: P, content: S) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        match self.files.get(path) {
            Some(content) => Ok(content.clone()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )),
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Upper bound on macro expansions performed without yielding a token.
    /// Exceeding it aborts the conversion, which is how runaway recursive
    /// macros surface.
    pub max_expansions: u32,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            max_expansions: 4096,
        }
    }
}

// Whitespace handling state of one source, following TeX's three reading
// states: at the start of a line, spaces vanish and a bare end of line makes
// a \par; mid-line a space is a space; after a space (or a multi-letter
// control sequence) further blanks collapse.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LineState {
    NewLine,
    MidLine,
    SkipBlanks,
}

struct Source {
    name: String,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    state: LineState,
    // Tokens that were pending in the push-back buffer when this source was
    // spliced by \input; they resume once this source is exhausted.
    stashed: VecDeque<Token>,
}

impl Source {
    fn new(name: String, text: &str) -> Source {
        Source {
            name,
            chars: text.replace("\r\n", "\n").chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            state: LineState::NewLine,
            stashed: VecDeque::new(),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }
}

// A conditional currently being expanded; pushed when a branch is taken,
// popped by \fi.
#[derive(Debug, Clone, Copy)]
enum Branch {
    True,
    Else,
}

/// The lexer/expander state machine.
pub struct Engine {
    sources: Vec<Source>,
    buffer: VecDeque<Token>,
    catcodes: ScopedCatCodes,
    commands: ScopedTable<CsName, Command>,
    environments: ScopedTable<String, EnvironmentDef>,
    env_stack: Vec<String>,
    conditionals: Vec<Branch>,
    expansions: u32,
    options: Options,
    clock: Clock,
    file_system: Box<dyn FileSystem>,
    warnings: Vec<String>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_options(Options::default(), Clock::now())
    }

    pub fn with_options(options: Options, clock: Clock) -> Engine {
        let mut engine = Engine {
            sources: Vec::new(),
            buffer: VecDeque::new(),
            catcodes: ScopedCatCodes::new(),
            commands: ScopedTable::new(),
            environments: ScopedTable::new(),
            env_stack: Vec::new(),
            conditionals: Vec::new(),
            expansions: 0,
            options,
            clock,
            file_system: Box::new(OsFileSystem),
            warnings: Vec::new(),
        };
        primitive::install(&mut engine.commands);
        engine
    }

    pub fn set_file_system(&mut self, file_system: Box<dyn FileSystem>) {
        self.file_system = file_system;
    }

    /// Splice a source on top of the reading stack. The first source pushed
    /// is the main document.
    pub fn push_source<N: Into<String>>(&mut self, name: N, text: &str) {
        let mut source = Source::new(name.into(), text);
        source.stashed = std::mem::take(&mut self.buffer);
        self.sources.push(source);
    }

    pub fn cat_code_of(&self, c: char) -> CatCode {
        self.catcodes.get(c)
    }

    pub fn set_cat_code(&mut self, c: char, code: CatCode) {
        self.catcodes.insert(c, code);
    }

    /// Run `f` with temporary catcode overrides; the previous codes are
    /// restored afterwards.
    pub fn with_cat_codes<T>(
        &mut self,
        overrides: &[(char, CatCode)],
        f: impl FnOnce(&mut Engine) -> T,
    ) -> T {
        self.catcodes.begin_scope();
        for (c, code) in overrides {
            self.catcodes.insert(*c, *code);
        }
        let result = f(self);
        let _ = self.catcodes.end_scope();
        result
    }

    /// Warnings accumulated so far; draining them is the caller's business.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Run the engine to exhaustion and collect the emitted token stream.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// The next token of the fully expanded stream, or `None` at the end of
    /// input. Begin/end-group tokens returned from here open and close a
    /// state scope.
    pub fn next(&mut self) -> Result<Option<Token>> {
        // The runaway-expansion guard counts expansions per yielded token;
        // it only resets here, so a macro that recurses while parsing its
        // own arguments still trips it.
        self.expansions = 0;
        let token = self.next_expanded()?;
        match &token {
            Some(t) => match t.value() {
                Value::BeginGroup(_) => self.begin_group(),
                Value::EndGroup(_) => {
                    if !self.end_group() {
                        return Err(self.fatal("too many closing braces", t.pos()));
                    }
                }
                _ => {}
            },
            None => {
                if self.commands.depth() > 0 {
                    return Err(self.fatal("unterminated group at end of input", self.here()));
                }
                if !self.conditionals.is_empty() {
                    return Err(self.fatal("unterminated conditional at end of input", self.here()));
                }
            }
        }
        Ok(token)
    }

    pub(crate) fn begin_group(&mut self) {
        self.catcodes.begin_scope();
        self.commands.begin_scope();
        self.environments.begin_scope();
    }

    pub(crate) fn end_group(&mut self) -> bool {
        let a = self.catcodes.end_scope();
        let b = self.commands.end_scope();
        let c = self.environments.end_scope();
        a && b && c
    }

    // The expanded stream without emission-side scope accounting. Argument
    // parsing reads from here so that braces captured into an argument are
    // only accounted once, when they are finally emitted.
    pub(crate) fn next_expanded(&mut self) -> Result<Option<Token>> {
        loop {
            let token = match self.fetch()? {
                None => return Ok(None),
                Some(t) => t,
            };
            let cs = match token.value() {
                Value::ControlSequence(cs) => cs.clone(),
                _ => return Ok(Some(token)),
            };
            match self.commands.get(&cs).cloned() {
                Some(Command::Macro(def)) => {
                    self.expand_macro(&token, &def)?;
                }
                Some(Command::Primitive(p)) => {
                    if let Some(out) = self.execute(p, &token)? {
                        return Ok(Some(out));
                    }
                }
                Some(Command::Character(c, code)) => {
                    return Ok(Some(Token::from_char(c, code, token.pos())));
                }
                // Undefined control sequences pass through; the document
                // reader decides whether to accept them.
                None => return Ok(Some(token)),
            }
        }
    }

    // The raw stream: push-back buffer, then character input, with no
    // macro expansion or primitive execution.
    pub(crate) fn next_raw(&mut self) -> Result<Option<Token>> {
        self.fetch()
    }

    fn fetch(&mut self) -> Result<Option<Token>> {
        loop {
            if let Some(token) = self.buffer.pop_front() {
                return Ok(Some(token));
            }
            if self.sources.is_empty() {
                return Ok(None);
            }
            if let Some(token) = self.lex_raw()? {
                return Ok(Some(token));
            }
            // Current source exhausted: resume whatever was pending when it
            // was spliced.
            let finished = self.sources.pop().unwrap();
            self.buffer = finished.stashed;
        }
    }

    pub(crate) fn push_front_tokens(&mut self, tokens: Vec<Token>) {
        for token in tokens.into_iter().rev() {
            self.buffer.push_front(token);
        }
    }

    pub(crate) fn push_front_token(&mut self, token: Token) {
        self.buffer.push_front(token);
    }

    fn expand_macro(&mut self, call: &Token, def: &Rc<MacroDef>) -> Result<()> {
        self.expansions += 1;
        if self.expansions > self.options.max_expansions {
            return Err(self.fatal(
                format![
                    "macro expansion limit ({}) exceeded while expanding {}",
                    self.options.max_expansions,
                    display_cs(&def.name)
                ],
                call.pos(),
            ));
        }
        let args = self.parse_args(&def.params)?;
        let tokens = texmacro::substitute(&def.body, &args);
        self.push_front_tokens(tokens);
        Ok(())
    }

    /// Parse arguments per the given specification against the expanded
    /// stream. Literal entries are consumed but contribute no argument.
    pub(crate) fn parse_args(&mut self, specs: &[ArgSpec]) -> Result<Vec<Vec<Token>>> {
        let mut args = Vec::new();
        for spec in specs {
            match spec {
                ArgSpec::Mandatory => {
                    self.skip_spaces()?;
                    let token = match self.next_expanded()? {
                        None => {
                            return Err(self.fatal(
                                "unexpected end of input while reading a mandatory argument",
                                self.here(),
                            ))
                        }
                        Some(t) => t,
                    };
                    match token.value() {
                        Value::BeginGroup(_) => args.push(self.read_balanced(token.pos())?),
                        Value::ControlSequence(cs) if !cs.active && cs.name == "par" => {
                            return Err(self.fatal(
                                "paragraph ended while reading a mandatory argument",
                                token.pos(),
                            ))
                        }
                        _ => args.push(vec![token]),
                    }
                }
                ArgSpec::Until(delimiter) => {
                    args.push(self.read_until(delimiter)?);
                }
                ArgSpec::UntilCatCode(code) => {
                    let mut arg = Vec::new();
                    loop {
                        let token = match self.next_expanded()? {
                            None => {
                                return Err(self.fatal(
                                    format!["end of input while scanning for a {code} token"],
                                    self.here(),
                                ))
                            }
                            Some(t) => t,
                        };
                        if token.cat_code() == Some(*code) {
                            break;
                        }
                        arg.push(token);
                    }
                    args.push(arg);
                }
                ArgSpec::Delimited {
                    open,
                    close,
                    default,
                }
                | ArgSpec::OptionalGroup {
                    open,
                    close,
                    default,
                } => {
                    args.push(self.read_delimited(
                        |t| t == open,
                        |t| t == close,
                        default.as_deref(),
                    )?);
                }
                ArgSpec::OptionalGroupCat {
                    open,
                    close,
                    default,
                } => {
                    let (open, close) = (*open, *close);
                    args.push(self.read_delimited(
                        move |t| t.cat_code() == Some(open),
                        move |t| t.cat_code() == Some(close),
                        default.as_deref(),
                    )?);
                }
                ArgSpec::OptionalToken(expected) => {
                    self.skip_spaces()?;
                    let present = match self.next_expanded()? {
                        None => false,
                        Some(token) => {
                            if token == *expected {
                                true
                            } else {
                                self.push_front_token(token);
                                false
                            }
                        }
                    };
                    args.push(vec![texmacro::boolean_token(present, self.here())]);
                }
                ArgSpec::Literal(expected) => {
                    self.skip_spaces()?;
                    match self.next_expanded()? {
                        Some(token) if token == *expected => {}
                        Some(token) => {
                            return Err(self.fatal(
                                "unexpected token while matching a macro's delimiter text",
                                token.pos(),
                            ))
                        }
                        None => {
                            return Err(self.fatal(
                                "end of input while matching a macro's delimiter text",
                                self.here(),
                            ))
                        }
                    }
                }
            }
        }
        Ok(args)
    }

    // Skip spaces on the expanded stream. \par is never skipped.
    pub(crate) fn skip_spaces(&mut self) -> Result<()> {
        loop {
            match self.next_expanded()? {
                None => return Ok(()),
                Some(token) => {
                    if !matches!(token.value(), Value::Space) {
                        self.push_front_token(token);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Read a balanced token run terminated by the end-group matching an
    /// already-consumed begin-group. The outer braces are not included.
    pub(crate) fn read_balanced(&mut self, open_pos: Pos) -> Result<Vec<Token>> {
        let mut depth = 0usize;
        let mut out = Vec::new();
        loop {
            let token = match self.next_expanded()? {
                None => {
                    return Err(self.fatal("unterminated group", open_pos));
                }
                Some(t) => t,
            };
            match token.value() {
                Value::BeginGroup(_) => depth += 1,
                Value::EndGroup(_) => {
                    if depth == 0 {
                        return Ok(out);
                    }
                    depth -= 1;
                }
                _ => {}
            }
            out.push(token);
        }
    }

    // Like read_balanced but on the raw stream, for replacement texts.
    pub(crate) fn read_balanced_raw(&mut self, open_pos: Pos) -> Result<Vec<Token>> {
        let mut depth = 0usize;
        let mut out = Vec::new();
        loop {
            let token = match self.next_raw()? {
                None => return Err(self.fatal("unterminated group", open_pos)),
                Some(t) => t,
            };
            match token.value() {
                Value::BeginGroup(_) => depth += 1,
                Value::EndGroup(_) => {
                    if depth == 0 {
                        return Ok(out);
                    }
                    depth -= 1;
                }
                _ => {}
            }
            out.push(token);
        }
    }

    // Read tokens until `delimiter` appears at brace depth zero. The
    // delimiter is consumed and excluded.
    fn read_until(&mut self, delimiter: &[Token]) -> Result<Vec<Token>> {
        let mut out: Vec<Token> = Vec::new();
        let mut depth = 0usize;
        loop {
            let token = match self.next_expanded()? {
                None => {
                    return Err(self.fatal(
                        "end of input while scanning for a macro's delimiter text",
                        self.here(),
                    ))
                }
                Some(t) => t,
            };
            match token.value() {
                Value::BeginGroup(_) => depth += 1,
                Value::EndGroup(_) => depth = depth.saturating_sub(1),
                _ => {}
            }
            out.push(token);
            if depth == 0 && out.len() >= delimiter.len() {
                let tail = &out[out.len() - delimiter.len()..];
                if tail == delimiter {
                    out.truncate(out.len() - delimiter.len());
                    return Ok(trim_outer_braces(out));
                }
            }
        }
    }

    // Read an optionally-present run between `open` and `close` delimiters.
    // Nested same-delimiter pairs are allowed; delimiters inside braced
    // groups do not count.
    fn read_delimited(
        &mut self,
        open: impl Fn(&Token) -> bool,
        close: impl Fn(&Token) -> bool,
        default: Option<&[Token]>,
    ) -> Result<Vec<Token>> {
        self.skip_spaces()?;
        let first = match self.next_expanded()? {
            None => None,
            Some(token) => {
                if open(&token) {
                    Some(token)
                } else {
                    self.push_front_token(token);
                    None
                }
            }
        };
        if first.is_none() {
            return Ok(match default {
                Some(tokens) => tokens.to_vec(),
                None => vec![texmacro::no_value_token(self.here())],
            });
        }
        let mut out = Vec::new();
        let mut brace_depth = 0usize;
        let mut delim_depth = 0usize;
        loop {
            let token = match self.next_expanded()? {
                None => {
                    return Err(
                        self.fatal("end of input while scanning an optional argument", self.here())
                    )
                }
                Some(t) => t,
            };
            match token.value() {
                Value::BeginGroup(_) => brace_depth += 1,
                Value::EndGroup(_) => brace_depth = brace_depth.saturating_sub(1),
                _ => {}
            }
            if brace_depth == 0 {
                if close(&token) {
                    if delim_depth == 0 {
                        return Ok(out);
                    }
                    delim_depth -= 1;
                } else if open(&token) {
                    delim_depth += 1;
                }
            }
            out.push(token);
        }
    }

    // ---------------------------------------------------------------------
    // Character-level reading
    // ---------------------------------------------------------------------

    fn lex_raw(&mut self) -> Result<Option<Token>> {
        loop {
            let pos = self.source().here();
            let c = match self.source_mut().next_char() {
                None => return Ok(None),
                Some(c) => c,
            };
            let code = self.catcodes.get(c);
            let state = self.source().state;
            match code {
                CatCode::Escape => {
                    let name = self.read_cs_name();
                    return Ok(Some(Token::control_sequence(name, pos)));
                }
                CatCode::EndOfLine => match state {
                    LineState::NewLine => {
                        return Ok(Some(Token::control_sequence("par", pos)));
                    }
                    LineState::MidLine => {
                        self.source_mut().state = LineState::NewLine;
                        return Ok(Some(Token::new(Value::Space, pos)));
                    }
                    LineState::SkipBlanks => {
                        self.source_mut().state = LineState::NewLine;
                    }
                },
                CatCode::Space => match state {
                    LineState::NewLine | LineState::SkipBlanks => {}
                    LineState::MidLine => {
                        self.source_mut().state = LineState::SkipBlanks;
                        return Ok(Some(Token::new(Value::Space, pos)));
                    }
                },
                CatCode::Comment => {
                    while let Some(c) = self.source_mut().next_char() {
                        if self.catcodes.get(c) == CatCode::EndOfLine {
                            break;
                        }
                    }
                    self.source_mut().state = LineState::NewLine;
                }
                CatCode::Parameter => {
                    return Ok(Some(self.read_parameter(c, pos)));
                }
                CatCode::Ignored => {}
                CatCode::Invalid => {
                    self.warnings.push(format![
                        "{}:{}: invalid character (code {}) dropped",
                        self.source().name,
                        pos,
                        c as u32
                    ]);
                }
                _ => {
                    self.source_mut().state = LineState::MidLine;
                    return Ok(Some(Token::from_char(c, code, pos)));
                }
            }
        }
    }

    // A control sequence name: a maximal run of Letter characters, or a
    // single character of any other category. Spaces after a multi-letter
    // name collapse.
    fn read_cs_name(&mut self) -> String {
        let first = match self.source().peek_char() {
            None => {
                return String::new();
            }
            Some(c) => c,
        };
        if self.catcodes.get(first) != CatCode::Letter {
            self.source_mut().next_char();
            self.source_mut().state = if self.catcodes.get(first) == CatCode::Space {
                LineState::SkipBlanks
            } else {
                LineState::MidLine
            };
            return first.to_string();
        }
        let mut name = String::new();
        while let Some(c) = self.source().peek_char() {
            if self.catcodes.get(c) != CatCode::Letter {
                break;
            }
            name.push(c);
            self.source_mut().next_char();
        }
        self.source_mut().state = LineState::SkipBlanks;
        name
    }

    // A run of parameter-prefix characters followed by a digit is a
    // parameter token whose depth is the run length; without a digit the
    // prefixes degrade to Other characters.
    fn read_parameter(&mut self, first: char, pos: Pos) -> Token {
        self.source_mut().state = LineState::MidLine;
        let mut prefixes = vec![first];
        loop {
            match self.source().peek_char() {
                Some(c) if self.catcodes.get(c) == CatCode::Parameter => {
                    self.source_mut().next_char();
                    prefixes.push(c);
                }
                Some(c) if c.is_ascii_digit() && c != '0' => {
                    self.source_mut().next_char();
                    let index = c.to_digit(10).unwrap() as u8;
                    return Token::parameter(index, prefixes.len() as u8, pos);
                }
                _ => {
                    // No digit: emit each prefix as a plain character.
                    let mut rest: Vec<Token> = prefixes[1..]
                        .iter()
                        .map(|c| Token::from_char(*c, CatCode::Other, pos))
                        .collect();
                    let head = Token::from_char(prefixes[0], CatCode::Other, pos);
                    rest.reverse();
                    for t in rest {
                        self.buffer.push_front(t);
                    }
                    return head;
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Plumbing
    // ---------------------------------------------------------------------

    // True when there is nothing left to read without crossing a file
    // boundary.
    pub(crate) fn at_source_end(&self) -> bool {
        self.buffer.is_empty()
            && self
                .sources
                .last()
                .map_or(true, |source| source.peek_char().is_none())
    }

    fn source(&self) -> &Source {
        self.sources.last().expect("no source is being read")
    }

    fn source_mut(&mut self) -> &mut Source {
        self.sources.last_mut().expect("no source is being read")
    }

    pub(crate) fn here(&self) -> Pos {
        match self.sources.last() {
            Some(source) => source.here(),
            None => Pos::default(),
        }
    }

    pub(crate) fn current_file(&self) -> &str {
        match self.sources.last() {
            Some(source) => &source.name,
            None => "<input>",
        }
    }

    pub(crate) fn fatal<M: Into<String>>(&self, message: M, pos: Pos) -> Box<Error> {
        Error::new(message, self.current_file(), pos)
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// TeX removes the outer braces of a delimited argument that consists of
// exactly one balanced group.
fn trim_outer_braces(tokens: Vec<Token>) -> Vec<Token> {
    if tokens.len() < 2
        || !matches!(tokens[0].value(), Value::BeginGroup(_))
        || !matches!(tokens[tokens.len() - 1].value(), Value::EndGroup(_))
    {
        return tokens;
    }
    let mut depth = 1usize;
    for token in &tokens[1..tokens.len() - 1] {
        match token.value() {
            Value::BeginGroup(_) => depth += 1,
            Value::EndGroup(_) => {
                depth -= 1;
                // The first brace closes before the end, so the braces are
                // not a single outer pair.
                if depth == 0 {
                    return tokens;
                }
            }
            _ => {}
        }
    }
    let mut tokens = tokens;
    tokens.pop();
    tokens.remove(0);
    tokens
}

pub(crate) fn display_cs(cs: &CsName) -> String {
    if cs.active {
        cs.name.clone()
    } else {
        format!["\\{}", cs.name]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::detokenize;

    fn test_engine() -> Engine {
        let mut engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        let mut file_system = InMemoryFileSystem::default();
        file_system.add_file("file1.tex", "content1\n");
        file_system.add_file("file2.tex", "content2%\n");
        file_system.add_file("file3.tex", r"\input nested");
        file_system.add_file("nested.tex", "content4");
        engine.set_file_system(Box::new(file_system));
        engine
    }

    fn expand(input: &str) -> String {
        let mut engine = test_engine();
        engine.push_source("test.tex", input);
        let tokens = engine.tokenize().expect("expansion should succeed");
        detokenize(&tokens, '\\')
    }

    macro_rules! expansion_test {
        ($name: ident, $input: expr, $want: expr) => {
            #[test]
            fn $name() {
                assert_eq!(expand($input), $want);
            }
        };
    }

    macro_rules! expansion_failure_test {
        ($name: ident, $input: expr) => {
            #[test]
            fn $name() {
                let mut engine = test_engine();
                engine.push_source("test.tex", $input);
                assert!(engine.tokenize().is_err());
            }
        };
    }

    #[test]
    fn scoped_catcode_overrides_are_restored() {
        let mut engine = test_engine();
        engine.with_cat_codes(&[('@', CatCode::Letter)], |engine| {
            assert_eq!(engine.cat_code_of('@'), CatCode::Letter);
        });
        assert_eq!(engine.cat_code_of('@'), CatCode::Other);
    }

    // Lexing.
    expansion_test![empty_input, "", ""];
    expansion_test![comment_only, "% nothing here", ""];
    expansion_test![spaces_collapse, "a  b", "a b"];
    expansion_test![single_newline_is_a_space, "a\nb", "a b"];
    expansion_test![blank_line_is_a_par, "a\n\nb", "a \\par b"];
    expansion_test![comment_eats_line_end, "a%x\nb", "ab"];
    expansion_test![leading_spaces_vanish, "  a", "a"];
    expansion_test![space_after_cs_name_collapses, r"\foo  a", "\\foo a"];
    expansion_test![active_tilde_is_no_break_space, "a~b", "a\u{00A0}b"];

    // \def.
    expansion_test![def_parsed_successfully, r"\def\A{abc}", ""];
    expansion_test![def_output, r"\def\A{abc}\A", "abc"];
    expansion_test![def_output_twice, r"\def\A{abc}\A\A", "abcabc"];
    expansion_test![one_undelimited_parameter, r"\def\A#1{a-#1-b}\A1", "a-1-b"];
    expansion_test![
        one_parameter_multiple_times,
        r"\def\A#1{#1 #1 #1}\A1",
        "1 1 1"
    ];
    expansion_test![
        one_parameter_group_value,
        r"\def\A#1{a-#1-b}\A{123}",
        "a-123-b"
    ];
    expansion_test![two_parameters, r"\def\A#1#2{#2-#1}\A56", "6-5"];
    expansion_test![
        two_parameters_group_values,
        r"\def\A#1#2{#2-#1}\A{abc}{xyz}",
        "xyz-abc"
    ];
    expansion_test![literal_prefix, r"\def\A fgh{567}\A fghi", "567i"];
    expansion_test![
        prefix_and_parameter,
        r"\def\A abc#1{y#1z}\A abcdefg",
        "ydzefg"
    ];
    expansion_test![
        one_delimited_parameter,
        r"\def\A #1xxx{y#1z}\A abcxxx",
        "yabcz"
    ];
    expansion_test![one_delimited_parameter_empty, r"\def\A #1xxx{y#1z}\A xxx", "yz"];
    expansion_test![
        delimited_parameter_with_scope,
        r"\def\A #1xxx{#1}\A abc{123xxx}xxx",
        "abc{123xxx}"
    ];
    expansion_test![
        delimited_argument_outer_braces_stripped,
        r"\def\A #1c{x#1y}\A {Hello}c",
        "xHelloy"
    ];
    expansion_test![
        macro_state_is_group_scoped,
        r"\def\A{Hello}\A{\def\A{World}\A}\A",
        "Hello{World}Hello"
    ];
    expansion_test![
        nested_macro_parameter_encoding,
        r"\def\a#1{\def\b##1{##1#1}}\a!\b{Hello}",
        "Hello!"
    ];
    expansion_test![
        texbook_exercise_20_2,
        r"\def\a{\b}\def\b{A\def\a{B\def\a{C\def\a{\b}}}}\def\puzzle{\a\a\a\a\a}\puzzle",
        "ABCAB"
    ];

    // \let.
    expansion_test![let_for_macro, r"\def\A{abc}\let\B\A\B", "abc"];
    expansion_test![let_for_macro_equals, r"\def\A{abc}\let\B=\A\B", "abc"];
    expansion_test![let_character, r"\let\A=B\A", "B"];
    expansion_test![
        let_is_group_scoped,
        r"\def\A{a}\def\B{b}\let\C=\A{\let\C=\B \C}\C",
        "{b}a"
    ];
    expansion_test![
        let_snapshots_the_meaning,
        r"\def\A{old}\let\B=\A\def\A{new}\B\A",
        "oldnew"
    ];

    // \catcode.
    expansion_test![
        catcode_changes_lexing,
        "\\def\\Hello{H}\\def\\HelloWorld{HW}\\catcode`\\W=12 \\HelloWorld",
        "HWorld"
    ];
    expansion_test![
        catcode_is_group_scoped,
        "\\def\\Hello{H}\\def\\HelloWorld{HW}{\\catcode`\\W=12 \\HelloWorld}\\HelloWorld",
        "{HWorld}HW"
    ];
    expansion_test![catcode_ignored_char, "\\catcode`\\Z=9 aZb", "ab"];

    // \newcommand and friends.
    expansion_test![newcommand_basic, r"\newcommand{\foo}[1]{hello #1}\foo{world}", "hello world"];
    expansion_test![newcommand_bare_target, r"\newcommand\foo{hi}\foo", "hi"];
    expansion_test![
        newcommand_optional_default_used,
        r"\newcommand{\foo}[2][def]{(#1|#2)}\foo{m}",
        "(def|m)"
    ];
    expansion_test![
        newcommand_optional_given,
        r"\newcommand{\foo}[2][def]{(#1|#2)}\foo[opt]{m}",
        "(opt|m)"
    ];
    expansion_test![
        renewcommand_replaces,
        r"\newcommand{\foo}{a}\renewcommand{\foo}{b}\foo",
        "b"
    ];
    expansion_test![
        providecommand_keeps_existing,
        r"\newcommand{\foo}{a}\providecommand{\foo}{b}\foo",
        "a"
    ];
    expansion_test![
        providecommand_defines_when_absent,
        r"\providecommand{\foo}{b}\foo",
        "b"
    ];
    expansion_test![
        declare_robust_command_overwrites,
        r"\newcommand{\foo}{a}\DeclareRobustCommand{\foo}{b}\foo",
        "b"
    ];

    // xparse.
    expansion_test![
        document_command_mandatory,
        r"\NewDocumentCommand{\foo}{m}{<#1>}\foo{x}",
        "<x>"
    ];
    expansion_test![
        document_command_optional_absent,
        r"\NewDocumentCommand{\foo}{o m}{\IfNoValueTF{#1}{[#2]}{(#1|#2)}}\foo{m}",
        "[m]"
    ];
    expansion_test![
        document_command_optional_present,
        r"\NewDocumentCommand{\foo}{o m}{\IfNoValueTF{#1}{[#2]}{(#1|#2)}}\foo[opt]{m}",
        "(opt|m)"
    ];
    expansion_test![
        document_command_star,
        r"\NewDocumentCommand{\foo}{s}{\IfBooleanTF{#1}{yes}{no}}\foo*\foo",
        "yesno"
    ];
    expansion_test![
        document_command_default,
        r"\NewDocumentCommand{\foo}{O{d} m}{(#1|#2)}\foo{m}",
        "(d|m)"
    ];

    // Conditionals.
    expansion_test![iftrue_takes_first_branch, r"\iftrue a\else b\fi", "a"];
    expansion_test![iffalse_takes_else_branch, r"\iffalse a\else b\fi", "b"];
    expansion_test![iftrue_no_else, r"\iftrue a\fi", "a"];
    expansion_test![iffalse_no_else, r"\iffalse a\fi", ""];
    expansion_test![
        nested_conditionals_skip_whole,
        r"\iffalse \iftrue x\fi y\else z\fi",
        "z"
    ];

    // Environments.
    expansion_test![
        user_environment,
        r"\newenvironment{quo}{[start]}{[end]}\begin{quo}body\end{quo}",
        "[start]body[end]"
    ];
    expansion_test![
        user_environment_with_argument,
        r"\newenvironment{quo}[1]{<#1>}{</>}\begin{quo}{t}body\end{quo}",
        "<t>body</>"
    ];
    expansion_test![
        environment_definitions_are_scoped,
        r"\def\x{outer}\newenvironment{quo}{\def\x{inner}}{\x}\begin{quo}\x\end{quo}\x",
        "innerinnerouter"
    ];
    expansion_test![
        structural_environment_passes_through,
        r"\begin{itemize}a\end{itemize}",
        "\\begin{itemize}a\\end{itemize}"
    ];

    // \input.
    expansion_test![input_basic, r"\input file1 hello", "content1 hello"];
    expansion_test![input_comment_glues, r"\input file2 hello", "content2hello"];
    expansion_test![input_with_extension, r"\input file1.tex after", "content1 after"];
    expansion_test![input_nested, r"\input file3 x", "content4x"];
    expansion_test![input_braced_name, r"\input{file1}hello", "content1 hello"];

    // Date and introspection.
    expansion_test![year_primitive, r"\year", "2021"];
    expansion_test![month_primitive, r"\month", "7"];
    expansion_test![day_primitive, r"\day", "9"];
    expansion_test![time_primitive, r"\time", "330"];
    expansion_test![number_primitive, r"\number42x", "42x"];
    expansion_test![char_primitive, r"\char65 bc", "Abc"];
    expansion_test![meaning_of_macro, r"\def\A#1{x#1}\meaning\A", "macro:#1->x#1"];
    expansion_test![meaning_of_undefined, r"\meaning\nope", "undefined"];
    expansion_test![meaning_of_letter, r"\meaning a", "the letter a"];

    // Math delimiters.
    expansion_test![inline_math_delimiters, r"\(x\)", "$x$"];
    expansion_test![display_math_delimiters, r"\[x\]", "$$x$$"];

    // Failure cases.
    expansion_failure_test![unterminated_group, "{a"];
    expansion_failure_test![too_many_closing_braces, "a}"];
    expansion_failure_test![unterminated_conditional, r"\iftrue a"];
    expansion_failure_test![else_without_if, r"\else"];
    expansion_failure_test![fi_without_if, r"\fi"];
    expansion_failure_test![def_without_target, r"\def a{}"];
    expansion_failure_test![def_unterminated_body, r"\def\A{"];
    expansion_failure_test![def_bad_parameter_number, r"\def\A#2{}"];
    expansion_failure_test![newcommand_duplicate, r"\newcommand{\a}{x}\newcommand{\a}{y}"];
    expansion_failure_test![renewcommand_of_undefined, r"\renewcommand{\nope}{x}"];
    expansion_failure_test![runaway_recursion, r"\def\a{\a}\a"];
    expansion_failure_test![missing_mandatory_argument, r"\def\A#1{#1}\A"];
    expansion_failure_test![input_missing_file, r"\input nothere"];
    expansion_failure_test![catcode_out_of_range, "\\catcode`\\W=16 "];
    expansion_failure_test![mismatched_end_environment, r"\newenvironment{a}{}{}\newenvironment{b}{}{}\begin{a}\end{b}"];
}

