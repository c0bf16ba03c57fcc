//! The built-in primitive set.
//!
//! These are the commands whose semantics are hard-coded in the engine:
//! grouping, the TeX/LaTeX/xparse definition surface, the conditional
//! skeleton, file input, date queries, introspection and the math
//! delimiters. Everything else is either a user macro or passes through to
//! the document reader as an uninterpreted control sequence.

use std::rc::Rc;

use super::scope::ScopedTable;
use super::texmacro::{self, ArgSpec, EnvironmentDef, MacroDef};
use super::{display_cs, Command, Engine};
use crate::error::Result;
use crate::token::{detokenize, CatCode, CsName, Pos, Token, Value};

/// Clash behaviour of a definition command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefMode {
    /// Error if the name is already defined.
    New,
    /// Error if the name is not yet defined.
    Renew,
    /// Silently keep the existing definition, if any.
    Provide,
    /// Define unconditionally.
    Declare,
}

/// Identifier of a built-in command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// `\begingroup`: open a scope without emitting a group token.
    BeginGroup,
    /// `\endgroup`.
    EndGroup,
    /// `\begin`: environment open dispatch.
    BeginEnvironment,
    /// `\end`.
    EndEnvironment,
    /// `\def`.
    Def,
    /// `\let`.
    Let,
    /// `\catcode`.
    CatCode,
    /// The `\newcommand` family, with its clash mode.
    NewCommand(DefMode),
    /// The `\newenvironment` family.
    NewEnvironment(DefMode),
    /// The xparse `\NewDocumentCommand` family.
    DocumentCommand(DefMode),
    /// The xparse `\NewDocumentEnvironment` family.
    DocumentEnvironment(DefMode),
    IfTrue,
    IfFalse,
    Else,
    Fi,
    /// `\IfBooleanTF`: select on an xparse boolean sentinel.
    IfBooleanTF,
    /// `\IfNoValueTF`: select on the xparse no-value sentinel.
    IfNoValueTF,
    /// `\input` and `\include`.
    Input,
    Year,
    Month,
    Day,
    Time,
    Meaning,
    Char,
    Number,
    /// `\(`.
    InlineMath,
    /// `\)`.
    InlineMathEnd,
    /// `\[`: expands to a doubled math-shift.
    DisplayMath,
    /// `\]`.
    DisplayMathEnd,
}

/// Install the built-in command table.
pub fn install(commands: &mut ScopedTable<CsName, Command>) {
    use DefMode::*;
    use Primitive::*;
    let entries: &[(&str, Primitive)] = &[
        ("begingroup", BeginGroup),
        ("endgroup", EndGroup),
        ("begin", BeginEnvironment),
        ("end", EndEnvironment),
        ("def", Def),
        ("let", Let),
        ("catcode", CatCode),
        ("newcommand", NewCommand(New)),
        ("renewcommand", NewCommand(Renew)),
        ("providecommand", NewCommand(Provide)),
        ("DeclareRobustCommand", NewCommand(Declare)),
        ("newenvironment", NewEnvironment(New)),
        ("renewenvironment", NewEnvironment(Renew)),
        ("NewDocumentCommand", DocumentCommand(New)),
        ("RenewDocumentCommand", DocumentCommand(Renew)),
        ("ProvideDocumentCommand", DocumentCommand(Provide)),
        ("DeclareDocumentCommand", DocumentCommand(Declare)),
        ("NewDocumentEnvironment", DocumentEnvironment(New)),
        ("RenewDocumentEnvironment", DocumentEnvironment(Renew)),
        ("ProvideDocumentEnvironment", DocumentEnvironment(Provide)),
        ("DeclareDocumentEnvironment", DocumentEnvironment(Declare)),
        ("iftrue", IfTrue),
        ("iffalse", IfFalse),
        ("else", Else),
        ("fi", Fi),
        ("IfBooleanTF", IfBooleanTF),
        ("IfNoValueTF", IfNoValueTF),
        ("input", Input),
        ("include", Input),
        ("year", Year),
        ("month", Month),
        ("day", Day),
        ("time", Time),
        ("meaning", Meaning),
        ("char", Char),
        ("number", Number),
        ("(", InlineMath),
        (")", InlineMathEnd),
        ("[", DisplayMath),
        ("]", DisplayMathEnd),
    ];
    for (name, primitive) in entries {
        commands.insert(
            CsName::control_sequence(*name),
            Command::Primitive(*primitive),
        );
    }
    // Implicit group characters.
    commands.insert(
        CsName::control_sequence("bgroup"),
        Command::Character('{', crate::token::CatCode::BeginGroup),
    );
    commands.insert(
        CsName::control_sequence("egroup"),
        Command::Character('}', crate::token::CatCode::EndGroup),
    );
    // The active `~` is a no-break space.
    commands.insert(
        CsName::active_character('~'),
        Command::Character('\u{00A0}', crate::token::CatCode::Other),
    );
}

enum SkipEnd {
    Else,
    Fi,
}

impl Engine {
    /// Execute a primitive. `Some(token)` is emitted directly; `None` means
    /// the primitive only changed state or spliced tokens into the buffer.
    pub(crate) fn execute(&mut self, primitive: Primitive, call: &Token) -> Result<Option<Token>> {
        let pos = call.pos();
        match primitive {
            Primitive::BeginGroup => {
                self.begin_group();
                Ok(None)
            }
            Primitive::EndGroup => {
                if !self.end_group() {
                    return Err(self.fatal("\\endgroup without a matching \\begingroup", pos));
                }
                Ok(None)
            }
            Primitive::BeginEnvironment => self.exec_begin_environment(call),
            Primitive::EndEnvironment => self.exec_end_environment(call),
            Primitive::Def => self.exec_def(pos),
            Primitive::Let => self.exec_let(pos),
            Primitive::CatCode => self.exec_catcode(pos),
            Primitive::NewCommand(mode) => self.exec_newcommand(mode, pos),
            Primitive::NewEnvironment(mode) => self.exec_newenvironment(mode, pos),
            Primitive::DocumentCommand(mode) => self.exec_document_command(mode, pos),
            Primitive::DocumentEnvironment(mode) => self.exec_document_environment(mode, pos),
            Primitive::IfTrue => {
                self.conditionals.push(super::Branch::True);
                Ok(None)
            }
            Primitive::IfFalse => {
                match self.skip_conditional(true, pos)? {
                    SkipEnd::Else => self.conditionals.push(super::Branch::Else),
                    SkipEnd::Fi => {}
                }
                Ok(None)
            }
            Primitive::Else => {
                if self.conditionals.pop().is_none() {
                    return Err(self.fatal("\\else without a matching \\if", pos));
                }
                // The branch that was being expanded is over; drop
                // everything up to the matching \fi.
                self.skip_conditional(false, pos)?;
                Ok(None)
            }
            Primitive::Fi => {
                if self.conditionals.pop().is_none() {
                    return Err(self.fatal("\\fi without a matching \\if", pos));
                }
                Ok(None)
            }
            Primitive::IfBooleanTF => self.exec_if_boolean(pos),
            Primitive::IfNoValueTF => self.exec_if_no_value(),
            Primitive::Input => self.exec_input(pos),
            Primitive::Year => {
                self.push_digits(self.clock.year as i64, pos);
                Ok(None)
            }
            Primitive::Month => {
                self.push_digits(self.clock.month as i64, pos);
                Ok(None)
            }
            Primitive::Day => {
                self.push_digits(self.clock.day as i64, pos);
                Ok(None)
            }
            Primitive::Time => {
                self.push_digits(self.clock.time as i64, pos);
                Ok(None)
            }
            Primitive::Meaning => self.exec_meaning(pos),
            Primitive::Char => {
                let code = self.read_number(pos)?;
                let c = match u32::try_from(code).ok().and_then(char::from_u32) {
                    Some(c) => c,
                    None => return Err(self.fatal(format!["invalid character code {code}"], pos)),
                };
                let value = if c == ' ' {
                    Value::Space
                } else {
                    Value::Other(c)
                };
                Ok(Some(Token::new(value, pos)))
            }
            Primitive::Number => {
                let n = self.read_number(pos)?;
                self.push_digits(n, pos);
                Ok(None)
            }
            Primitive::InlineMath | Primitive::InlineMathEnd => {
                Ok(Some(Token::new(Value::MathShift('$'), pos)))
            }
            Primitive::DisplayMath | Primitive::DisplayMathEnd => {
                self.push_front_token(Token::new(Value::MathShift('$'), pos));
                Ok(Some(Token::new(Value::MathShift('$'), pos)))
            }
        }
    }

    // -----------------------------------------------------------------
    // Grouping and environments
    // -----------------------------------------------------------------

    fn read_environment_name(&mut self, pos: Pos) -> Result<Vec<Token>> {
        self.skip_spaces()?;
        match self.next_expanded()? {
            Some(token) if matches!(token.value(), Value::BeginGroup(_)) => {
                self.read_balanced(token.pos())
            }
            Some(token) => Err(self.fatal(
                "expected a braced environment name after \\begin or \\end",
                token.pos(),
            )),
            None => Err(self.fatal("end of input while reading an environment name", pos)),
        }
    }

    fn exec_begin_environment(&mut self, call: &Token) -> Result<Option<Token>> {
        let pos = call.pos();
        let name_tokens = self.read_environment_name(pos)?;
        let key = detokenize(&name_tokens, '\\');
        match self.environments.get(&key).cloned() {
            Some(env) => {
                let args = self.parse_args(&env.params)?;
                self.begin_group();
                self.env_stack.push(key);
                self.push_front_tokens(texmacro::substitute(&env.begin, &args));
                Ok(None)
            }
            None => {
                // A structural environment: re-emit \begin{name} for the
                // parser, which folds it into a named group atom.
                let mut tokens = vec![Token::from_char('{', CatCode::BeginGroup, pos)];
                tokens.extend(name_tokens);
                tokens.push(Token::from_char('}', CatCode::EndGroup, pos));
                self.push_front_tokens(tokens);
                Ok(Some(call.clone()))
            }
        }
    }

    fn exec_end_environment(&mut self, call: &Token) -> Result<Option<Token>> {
        let pos = call.pos();
        let name_tokens = self.read_environment_name(pos)?;
        let key = detokenize(&name_tokens, '\\');
        match self.environments.get(&key).cloned() {
            Some(env) => {
                match self.env_stack.pop() {
                    Some(open) if open == key => {}
                    Some(open) => {
                        return Err(self.fatal(
                            format!["\\end{{{key}}} closes environment `{open}`"],
                            pos,
                        ))
                    }
                    None => {
                        return Err(self.fatal(format!["\\end{{{key}}} without \\begin"], pos))
                    }
                }
                // The scope pops only after the end code has been read, so
                // the code still sees the environment's local definitions.
                let mut spliced = env.end.clone();
                spliced.push(Token::control_sequence("endgroup", pos));
                self.push_front_tokens(spliced);
                Ok(None)
            }
            None => {
                let mut tokens = vec![Token::from_char('{', CatCode::BeginGroup, pos)];
                tokens.extend(name_tokens);
                tokens.push(Token::from_char('}', CatCode::EndGroup, pos));
                self.push_front_tokens(tokens);
                Ok(Some(call.clone()))
            }
        }
    }

    // -----------------------------------------------------------------
    // \def, \let, \catcode
    // -----------------------------------------------------------------

    fn skip_raw_spaces(&mut self) -> Result<()> {
        loop {
            match self.next_raw()? {
                Some(token) if matches!(token.value(), Value::Space) => {}
                Some(token) => {
                    self.push_front_token(token);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    // The control sequence (or active character) being defined.
    fn read_command_target(&mut self, doing: &str, pos: Pos) -> Result<CsName> {
        self.skip_raw_spaces()?;
        match self.next_raw()? {
            Some(token) => match token.value() {
                Value::ControlSequence(cs) => Ok(cs.clone()),
                _ => Err(self.fatal(
                    format!["expected a control sequence after {doing}"],
                    token.pos(),
                )),
            },
            None => Err(self.fatal(format!["end of input after {doing}"], pos)),
        }
    }

    // \newcommand allows both `\newcommand\foo` and `\newcommand{\foo}`.
    fn read_braced_command_target(&mut self, doing: &str, pos: Pos) -> Result<CsName> {
        self.skip_raw_spaces()?;
        match self.next_raw()? {
            Some(token) => match token.value() {
                Value::ControlSequence(cs) => Ok(cs.clone()),
                Value::BeginGroup(_) => {
                    let inner = self.read_balanced_raw(token.pos())?;
                    let cs = inner.iter().find_map(|t| t.cs_name());
                    match (cs, inner.len()) {
                        (Some(cs), 1) => Ok(cs.clone()),
                        _ => Err(self.fatal(
                            format!["expected a single control sequence in the argument of {doing}"],
                            token.pos(),
                        )),
                    }
                }
                _ => Err(self.fatal(
                    format!["expected a control sequence after {doing}"],
                    token.pos(),
                )),
            },
            None => Err(self.fatal(format!["end of input after {doing}"], pos)),
        }
    }

    fn exec_def(&mut self, pos: Pos) -> Result<Option<Token>> {
        let target = self.read_command_target("\\def", pos)?;
        let (params, n_params) = self.read_def_parameter_text(pos)?;
        let body = self.read_balanced_raw(pos)?;
        self.check_body_parameters(&body, n_params)?;
        self.commands.insert(
            target.clone(),
            Command::Macro(Rc::new(MacroDef {
                name: target,
                params,
                body,
            })),
        );
        Ok(None)
    }

    // The parameter text of \def: literal delimiters and #1..#9 markers, up
    // to the opening brace of the replacement text.
    fn read_def_parameter_text(&mut self, pos: Pos) -> Result<(Vec<ArgSpec>, u8)> {
        let mut params: Vec<ArgSpec> = Vec::new();
        let mut n_params: u8 = 0;
        loop {
            let token = match self.next_raw()? {
                None => {
                    return Err(self.fatal(
                        "end of input while reading the parameter text of a definition",
                        pos,
                    ))
                }
                Some(t) => t,
            };
            match token.value() {
                Value::BeginGroup(_) => return Ok((params, n_params)),
                Value::EndGroup(_) => {
                    return Err(self.fatal(
                        "unexpected closing brace in the parameter text of a definition",
                        token.pos(),
                    ))
                }
                Value::Parameter { index, depth: 1 } => {
                    if *index != n_params + 1 {
                        return Err(self.fatal(
                            format![
                                "parameters must be numbered consecutively; expected #{}",
                                n_params + 1
                            ],
                            token.pos(),
                        ));
                    }
                    n_params += 1;
                    params.push(ArgSpec::Mandatory);
                }
                Value::Parameter { .. } => {
                    return Err(self.fatal(
                        "a doubled parameter prefix is not allowed in a parameter text",
                        token.pos(),
                    ))
                }
                // Delimiter tokens after a parameter turn it into an
                // until-sequence argument; before the first parameter they
                // are literal prefix tokens.
                _ => match params.pop() {
                    Some(ArgSpec::Mandatory) => params.push(ArgSpec::Until(vec![token])),
                    Some(ArgSpec::Until(mut seq)) => {
                        seq.push(token);
                        params.push(ArgSpec::Until(seq));
                    }
                    Some(other) => {
                        params.push(other);
                        params.push(ArgSpec::Literal(token));
                    }
                    None => params.push(ArgSpec::Literal(token)),
                },
            }
        }
    }

    fn check_body_parameters(&mut self, body: &[Token], n_params: u8) -> Result<()> {
        for token in body {
            if let Value::Parameter { index, depth: 1 } = token.value() {
                if *index > n_params {
                    return Err(self.fatal(
                        format![
                            "parameter #{index} used in a replacement text with only {n_params} parameter(s)"
                        ],
                        token.pos(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn exec_let(&mut self, pos: Pos) -> Result<Option<Token>> {
        let target = self.read_command_target("\\let", pos)?;
        self.skip_raw_spaces()?;
        // Optional equals, then at most one space.
        if let Some(token) = self.next_raw()? {
            if !matches!(token.value(), Value::Other('=')) {
                self.push_front_token(token);
            }
        }
        if let Some(token) = self.next_raw()? {
            if !matches!(token.value(), Value::Space) {
                self.push_front_token(token);
            }
        }
        let rhs = match self.next_raw()? {
            Some(t) => t,
            None => {
                return Err(self.fatal(
                    "end of input while reading the right hand side of \\let",
                    pos,
                ))
            }
        };
        match rhs.value() {
            Value::ControlSequence(cs) => match self.commands.get(cs).cloned() {
                Some(command) => self.commands.insert(target, command),
                // \let to an undefined name undefines the target too.
                None => self.commands.remove(&target),
            },
            Value::Parameter { .. } => {
                return Err(self.fatal("cannot \\let to a parameter token", rhs.pos()))
            }
            _ => {
                let c = rhs.char().unwrap();
                let code = rhs.cat_code().unwrap();
                self.commands.insert(target, Command::Character(c, code));
            }
        }
        Ok(None)
    }

    fn exec_catcode(&mut self, pos: Pos) -> Result<Option<Token>> {
        let char_code = self.read_number(pos)?;
        let c = match u32::try_from(char_code).ok().and_then(char::from_u32) {
            Some(c) => c,
            None => return Err(self.fatal(format!["invalid character code {char_code}"], pos)),
        };
        self.skip_spaces()?;
        if let Some(token) = self.next_expanded()? {
            if !matches!(token.value(), Value::Other('=')) {
                self.push_front_token(token);
            }
        }
        let code_number = self.read_number(pos)?;
        let code = match CatCode::try_from(code_number) {
            Ok(code) => code,
            Err(()) => {
                return Err(self.fatal(
                    format!["{code_number} is not a valid category code (0-15)"],
                    pos,
                ))
            }
        };
        self.catcodes.insert(c, code);
        Ok(None)
    }

    // -----------------------------------------------------------------
    // \newcommand and the xparse family
    // -----------------------------------------------------------------

    fn check_clash(&mut self, mode: DefMode, defined: bool, name: &CsName, pos: Pos) -> Result<bool> {
        match mode {
            DefMode::New if defined => Err(self.fatal(
                format!["{} is already defined", display_cs(name)],
                pos,
            )),
            DefMode::Renew if !defined => Err(self.fatal(
                format!["{} is not yet defined", display_cs(name)],
                pos,
            )),
            DefMode::Provide if defined => Ok(false),
            _ => Ok(true),
        }
    }

    // Optional `[...]` on the raw stream, for the \newcommand surface.
    fn read_raw_bracket_group(&mut self) -> Result<Option<Vec<Token>>> {
        self.skip_raw_spaces()?;
        match self.next_raw()? {
            Some(token) if matches!(token.value(), Value::Other('[')) => {
                let mut out = Vec::new();
                let mut depth = 0usize;
                loop {
                    let token = match self.next_raw()? {
                        None => {
                            return Err(self.fatal(
                                "end of input while scanning an optional argument",
                                token.pos(),
                            ))
                        }
                        Some(t) => t,
                    };
                    match token.value() {
                        Value::BeginGroup(_) => depth += 1,
                        Value::EndGroup(_) => depth = depth.saturating_sub(1),
                        Value::Other(']') if depth == 0 => return Ok(Some(out)),
                        _ => {}
                    }
                    out.push(token);
                }
            }
            Some(token) => {
                self.push_front_token(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn read_raw_body(&mut self, doing: &str, pos: Pos) -> Result<Vec<Token>> {
        self.skip_raw_spaces()?;
        match self.next_raw()? {
            Some(token) if matches!(token.value(), Value::BeginGroup(_)) => {
                self.read_balanced_raw(token.pos())
            }
            Some(token) => Err(self.fatal(
                format!["expected a braced replacement text for {doing}"],
                token.pos(),
            )),
            None => Err(self.fatal(format!["end of input while reading {doing}"], pos)),
        }
    }

    // The `[n][default]` parameter declaration of the \newcommand surface.
    fn read_latex_params(&mut self, pos: Pos) -> Result<(Vec<ArgSpec>, u8)> {
        let mut params = Vec::new();
        let mut n_params: u8 = 0;
        if let Some(count_tokens) = self.read_raw_bracket_group()? {
            let digits = detokenize(&count_tokens, '\\');
            n_params = match digits.trim().parse::<u8>() {
                Ok(n) if n <= 9 => n,
                _ => {
                    return Err(self.fatal(
                        format!["invalid parameter count `{digits}`"],
                        pos,
                    ))
                }
            };
            let mut mandatory = n_params;
            if let Some(default) = self.read_raw_bracket_group()? {
                if n_params == 0 {
                    return Err(
                        self.fatal("an optional argument requires a parameter count", pos)
                    );
                }
                params.push(ArgSpec::OptionalGroup {
                    open: Token::from_char('[', CatCode::Other, pos),
                    close: Token::from_char(']', CatCode::Other, pos),
                    default: Some(default),
                });
                mandatory -= 1;
            }
            for _ in 0..mandatory {
                params.push(ArgSpec::Mandatory);
            }
        }
        Ok((params, n_params))
    }

    fn exec_newcommand(&mut self, mode: DefMode, pos: Pos) -> Result<Option<Token>> {
        // The starred variants restrict to non-\par arguments, which is
        // already this engine's behaviour; the star itself is skipped.
        if let Some(token) = self.next_raw()? {
            if !matches!(token.value(), Value::Other('*')) {
                self.push_front_token(token);
            }
        }
        let target = self.read_braced_command_target("\\newcommand", pos)?;
        let (params, n_params) = self.read_latex_params(pos)?;
        let body = self.read_raw_body("a command definition", pos)?;
        self.check_body_parameters(&body, n_params)?;
        let defined = self.commands.contains_key(&target);
        if self.check_clash(mode, defined, &target, pos)? {
            self.commands.insert(
                target.clone(),
                Command::Macro(Rc::new(MacroDef {
                    name: target,
                    params,
                    body,
                })),
            );
        }
        Ok(None)
    }

    fn exec_newenvironment(&mut self, mode: DefMode, pos: Pos) -> Result<Option<Token>> {
        let name_tokens = self.read_raw_body("an environment name", pos)?;
        let name = detokenize(&name_tokens, '\\');
        let (params, n_params) = self.read_latex_params(pos)?;
        let begin = self.read_raw_body("the environment begin text", pos)?;
        let end = self.read_raw_body("the environment end text", pos)?;
        self.check_body_parameters(&begin, n_params)?;
        // Parameters are only available in the begin text.
        self.check_body_parameters(&end, 0)?;
        let defined = self.environments.contains_key(&name);
        let target = CsName::control_sequence(&name);
        if self.check_clash(mode, defined, &target, pos)? {
            self.environments.insert(
                name.clone(),
                EnvironmentDef {
                    name,
                    params,
                    begin,
                    end,
                },
            );
        }
        Ok(None)
    }

    fn exec_document_command(&mut self, mode: DefMode, pos: Pos) -> Result<Option<Token>> {
        let target = self.read_braced_command_target("\\NewDocumentCommand", pos)?;
        let spec_tokens = self.read_raw_body("an argument specification", pos)?;
        let params = self.parse_xparse_spec(spec_tokens, pos)?;
        let body = self.read_raw_body("a command definition", pos)?;
        let capturing = params
            .iter()
            .filter(|p| !matches!(p, ArgSpec::Literal(_)))
            .count() as u8;
        self.check_body_parameters(&body, capturing)?;
        let defined = self.commands.contains_key(&target);
        if self.check_clash(mode, defined, &target, pos)? {
            self.commands.insert(
                target.clone(),
                Command::Macro(Rc::new(MacroDef {
                    name: target,
                    params,
                    body,
                })),
            );
        }
        Ok(None)
    }

    fn exec_document_environment(&mut self, mode: DefMode, pos: Pos) -> Result<Option<Token>> {
        let name_tokens = self.read_raw_body("an environment name", pos)?;
        let name = detokenize(&name_tokens, '\\');
        let spec_tokens = self.read_raw_body("an argument specification", pos)?;
        let params = self.parse_xparse_spec(spec_tokens, pos)?;
        let begin = self.read_raw_body("the environment begin text", pos)?;
        let end = self.read_raw_body("the environment end text", pos)?;
        let defined = self.environments.contains_key(&name);
        let target = CsName::control_sequence(&name);
        if self.check_clash(mode, defined, &target, pos)? {
            self.environments.insert(
                name.clone(),
                EnvironmentDef {
                    name,
                    params,
                    begin,
                    end,
                },
            );
        }
        Ok(None)
    }

    // An xparse argument specification: `m o O{..} d<><> D<><>{..} s t<> r<><> u{..}`.
    fn parse_xparse_spec(&mut self, tokens: Vec<Token>, pos: Pos) -> Result<Vec<ArgSpec>> {
        let mut queue: std::collections::VecDeque<Token> = tokens.into();
        let mut params = Vec::new();
        let next_delim = |queue: &mut std::collections::VecDeque<Token>| queue.pop_front();
        while let Some(token) = queue.pop_front() {
            let letter = match token.value() {
                Value::Space => continue,
                Value::Letter(c) => *c,
                _ => {
                    return Err(self.fatal(
                        "unsupported token in an argument specification",
                        token.pos(),
                    ))
                }
            };
            let spec = match letter {
                'm' => ArgSpec::Mandatory,
                'o' => ArgSpec::OptionalGroup {
                    open: Token::from_char('[', CatCode::Other, pos),
                    close: Token::from_char(']', CatCode::Other, pos),
                    default: None,
                },
                'O' => ArgSpec::OptionalGroup {
                    open: Token::from_char('[', CatCode::Other, pos),
                    close: Token::from_char(']', CatCode::Other, pos),
                    default: Some(self.group_from_queue(&mut queue, pos)?),
                },
                'd' | 'r' => {
                    let open = next_delim(&mut queue);
                    let close = next_delim(&mut queue);
                    match (open, close) {
                        (Some(open), Some(close)) => ArgSpec::Delimited {
                            open,
                            close,
                            default: None,
                        },
                        _ => {
                            return Err(self.fatal(
                                format!["argument type `{letter}` needs two delimiter tokens"],
                                pos,
                            ))
                        }
                    }
                }
                'D' => {
                    let open = next_delim(&mut queue);
                    let close = next_delim(&mut queue);
                    match (open, close) {
                        (Some(open), Some(close)) => {
                            let default = self.group_from_queue(&mut queue, pos)?;
                            ArgSpec::Delimited {
                                open,
                                close,
                                default: Some(default),
                            }
                        }
                        _ => {
                            return Err(self.fatal(
                                "argument type `D` needs two delimiter tokens",
                                pos,
                            ))
                        }
                    }
                }
                's' => ArgSpec::OptionalToken(Token::from_char('*', CatCode::Other, pos)),
                't' => match next_delim(&mut queue) {
                    Some(token) => ArgSpec::OptionalToken(token),
                    None => {
                        return Err(
                            self.fatal("argument type `t` needs a delimiter token", pos)
                        )
                    }
                },
                'u' => ArgSpec::Until(self.group_from_queue(&mut queue, pos)?),
                other => {
                    return Err(self.fatal(
                        format!["unsupported argument type `{other}`"],
                        pos,
                    ))
                }
            };
            params.push(spec);
        }
        Ok(params)
    }

    fn group_from_queue(
        &mut self,
        queue: &mut std::collections::VecDeque<Token>,
        pos: Pos,
    ) -> Result<Vec<Token>> {
        match queue.pop_front() {
            Some(token) if matches!(token.value(), Value::BeginGroup(_)) => {
                let mut depth = 0usize;
                let mut out = Vec::new();
                while let Some(token) = queue.pop_front() {
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
                Err(self.fatal("unterminated group in an argument specification", pos))
            }
            _ => Err(self.fatal(
                "expected a braced default in an argument specification",
                pos,
            )),
        }
    }

    // -----------------------------------------------------------------
    // Conditionals
    // -----------------------------------------------------------------

    // Discard tokens up to the matching \fi (or, when `stop_at_else` is
    // set, the \else of this conditional). Nested conditionals are skipped
    // whole.
    fn skip_conditional(&mut self, stop_at_else: bool, pos: Pos) -> Result<SkipEnd> {
        let mut depth = 0usize;
        loop {
            let token = match self.next_raw()? {
                None => return Err(self.fatal("unterminated conditional", pos)),
                Some(t) => t,
            };
            let cs = match token.value() {
                Value::ControlSequence(cs) => cs,
                _ => continue,
            };
            match self.commands.get(cs) {
                Some(Command::Primitive(Primitive::IfTrue | Primitive::IfFalse)) => depth += 1,
                Some(Command::Primitive(Primitive::Else)) if depth == 0 && stop_at_else => {
                    return Ok(SkipEnd::Else)
                }
                Some(Command::Primitive(Primitive::Fi)) => {
                    if depth == 0 {
                        return Ok(SkipEnd::Fi);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn exec_if_boolean(&mut self, pos: Pos) -> Result<Option<Token>> {
        let args = self.parse_args(&[ArgSpec::Mandatory, ArgSpec::Mandatory, ArgSpec::Mandatory])?;
        let truthy = match args[0].as_slice() {
            [t] if t.is_control_sequence(texmacro::sentinel::BOOLEAN_TRUE) => true,
            [t] if t.is_control_sequence(texmacro::sentinel::BOOLEAN_FALSE) => false,
            _ => {
                self.warn(format![
                    "{}:{}: \\IfBooleanTF used on a non-boolean argument",
                    self.current_file(),
                    pos
                ]);
                false
            }
        };
        let chosen = if truthy { args[1].clone() } else { args[2].clone() };
        self.push_front_tokens(chosen);
        Ok(None)
    }

    fn exec_if_no_value(&mut self) -> Result<Option<Token>> {
        let args = self.parse_args(&[ArgSpec::Mandatory, ArgSpec::Mandatory, ArgSpec::Mandatory])?;
        let absent = matches!(
            args[0].as_slice(),
            [t] if t.is_control_sequence(texmacro::sentinel::NO_VALUE)
        );
        let chosen = if absent { args[1].clone() } else { args[2].clone() };
        self.push_front_tokens(chosen);
        Ok(None)
    }

    // -----------------------------------------------------------------
    // \input and friends
    // -----------------------------------------------------------------

    fn exec_input(&mut self, pos: Pos) -> Result<Option<Token>> {
        self.skip_spaces()?;
        let name = match self.next_expanded()? {
            Some(token) if matches!(token.value(), Value::BeginGroup(_)) => {
                let inner = self.read_balanced(token.pos())?;
                detokenize(&inner, '\\')
            }
            Some(token) => {
                // Bare form: the file name runs to the next space.
                let mut name = String::new();
                match token.char() {
                    Some(c) if !matches!(token.value(), Value::Space) => name.push(c),
                    _ => {
                        return Err(
                            self.fatal("expected a file name after \\input", token.pos())
                        )
                    }
                }
                // The name runs to the next space or to the end of the
                // current file; it never continues into the parent source.
                while !self.at_source_end() {
                    match self.next_raw()? {
                        None => break,
                        Some(token) => match token.value() {
                            Value::Space => break,
                            Value::Letter(c) | Value::Other(c) => name.push(*c),
                            _ => {
                                self.push_front_token(token);
                                break;
                            }
                        },
                    }
                }
                name
            }
            None => return Err(self.fatal("end of input after \\input", pos)),
        };
        let mut path = std::path::PathBuf::from(&name);
        if path.extension().is_none() {
            path.set_extension("tex");
        }
        let text = match self.file_system.read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                return Err(self.fatal(
                    format!["could not read {}: {err}", path.display()],
                    pos,
                ))
            }
        };
        self.push_source(path.to_string_lossy().to_string(), &text);
        Ok(None)
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    fn exec_meaning(&mut self, pos: Pos) -> Result<Option<Token>> {
        let token = match self.next_raw()? {
            Some(t) => t,
            None => return Err(self.fatal("end of input after \\meaning", pos)),
        };
        let meaning = self.meaning_of(&token);
        self.push_text(&meaning, pos);
        Ok(None)
    }

    fn meaning_of(&self, token: &Token) -> String {
        let command = match token.value() {
            Value::ControlSequence(cs) => match self.commands.get(cs) {
                None => return "undefined".into(),
                Some(command) => command.clone(),
            },
            _ => {
                return character_meaning(token.char().unwrap_or(' '), token.cat_code());
            }
        };
        match command {
            Command::Macro(def) => {
                let mut text = String::from("macro:");
                let mut index = 0;
                for param in &def.params {
                    match param {
                        ArgSpec::Literal(t) => text.push_str(&detokenize([t], '\\')),
                        ArgSpec::Until(seq) => {
                            index += 1;
                            text.push_str(&format!["#{index}"]);
                            text.push_str(&detokenize(seq, '\\'));
                        }
                        _ => {
                            index += 1;
                            text.push_str(&format!["#{index}"]);
                        }
                    }
                }
                text.push_str("->");
                text.push_str(&detokenize(&def.body, '\\'));
                text
            }
            Command::Primitive(_) => display_cs(token.cs_name().unwrap()),
            Command::Character(c, code) => character_meaning(c, Some(code)),
        }
    }

    fn push_digits(&mut self, value: i64, pos: Pos) {
        self.push_text(&value.to_string(), pos);
    }

    fn push_text(&mut self, text: &str, pos: Pos) {
        let tokens: Vec<Token> = text
            .chars()
            .map(|c| {
                if c == ' ' {
                    Token::new(Value::Space, pos)
                } else {
                    Token::from_char(c, CatCode::Other, pos)
                }
            })
            .collect();
        self.push_front_tokens(tokens);
    }

    // <number>: an optional sign, then decimal digits, a backtick character
    // constant, or one of the internal date registers.
    pub(crate) fn read_number(&mut self, pos: Pos) -> Result<i64> {
        self.skip_spaces()?;
        let mut negative = false;
        let first = loop {
            let token = match self.next_expanded()? {
                None => return Err(self.fatal("end of input while scanning a number", pos)),
                Some(t) => t,
            };
            match token.value() {
                Value::Other('-') => negative = !negative,
                Value::Other('+') | Value::Space => {}
                _ => break token,
            }
        };
        let magnitude = match first.value() {
            Value::Other('`') => {
                let token = match self.next_raw()? {
                    None => {
                        return Err(
                            self.fatal("end of input after a ` character constant", first.pos())
                        )
                    }
                    Some(t) => t,
                };
                let c = match token.value() {
                    Value::ControlSequence(cs) if cs.name.chars().count() == 1 => {
                        cs.name.chars().next().unwrap()
                    }
                    _ => match token.char() {
                        Some(c) => c,
                        None => {
                            return Err(self.fatal(
                                "a ` constant requires a character or single-character control sequence",
                                token.pos(),
                            ))
                        }
                    },
                };
                self.consume_one_optional_space()?;
                c as i64
            }
            Value::Other(c) if c.is_ascii_digit() => {
                let mut n = c.to_digit(10).unwrap() as i64;
                loop {
                    match self.next_expanded()? {
                        None => break,
                        Some(token) => match token.value() {
                            Value::Other(d) if d.is_ascii_digit() => {
                                n = n * 10 + d.to_digit(10).unwrap() as i64;
                            }
                            Value::Space => break,
                            _ => {
                                self.push_front_token(token);
                                break;
                            }
                        },
                    }
                }
                n
            }
            _ => {
                return Err(self.fatal(
                    "expected a number",
                    first.pos(),
                ))
            }
        };
        Ok(if negative { -magnitude } else { magnitude })
    }

    fn consume_one_optional_space(&mut self) -> Result<()> {
        if let Some(token) = self.next_expanded()? {
            if !matches!(token.value(), Value::Space) {
                self.push_front_token(token);
            }
        }
        Ok(())
    }
}

fn character_meaning(c: char, code: Option<CatCode>) -> String {
    match code {
        Some(CatCode::Letter) => format!["the letter {c}"],
        Some(CatCode::BeginGroup) => format!["begin-group character {c}"],
        Some(CatCode::EndGroup) => format!["end-group character {c}"],
        Some(CatCode::MathShift) => format!["math shift character {c}"],
        Some(CatCode::AlignTab) => format!["alignment tab character {c}"],
        Some(CatCode::Superscript) => format!["superscript character {c}"],
        Some(CatCode::Subscript) => format!["subscript character {c}"],
        Some(CatCode::Space) => "blank space".into(),
        _ => format!["the character {c}"],
    }
}
