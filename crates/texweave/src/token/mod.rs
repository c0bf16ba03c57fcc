//! TeX tokens and category codes.

pub mod catcode;
pub use catcode::CatCode;
pub use catcode::CatCodeTable;

/// Name of a control sequence or active character.
///
/// Active characters are one-character control sequences with the `active`
/// flag set; the flag is part of the lookup key so `\~` and the active `~`
/// can hold different meanings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsName {
    pub name: String,
    pub active: bool,
}

impl CsName {
    pub fn control_sequence<S: Into<String>>(name: S) -> CsName {
        CsName {
            name: name.into(),
            active: false,
        }
    }

    pub fn active_character(c: char) -> CsName {
        CsName {
            name: c.to_string(),
            active: true,
        }
    }
}

/// The value of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    BeginGroup(char),
    EndGroup(char),
    MathShift(char),
    AlignTab(char),
    Superscript(char),
    Subscript(char),
    Space,
    Letter(char),
    Other(char),
    ControlSequence(CsName),
    /// A macro parameter reference.
    ///
    /// `depth` implements TeX's nested-macro parameter encoding: `#1` in a
    /// macro body has depth 1, `##1` depth 2, and each substitution pass
    /// decrements the depth by one.
    Parameter { index: u8, depth: u8 },
}

impl Value {
    /// Build the value for a character with the provided category code.
    ///
    /// Panics on the catcodes the lexer never lets out (Escape, EndOfLine,
    /// Ignored, Comment, Invalid, Parameter).
    pub fn from_char(c: char, code: CatCode) -> Value {
        match code {
            CatCode::BeginGroup => Value::BeginGroup(c),
            CatCode::EndGroup => Value::EndGroup(c),
            CatCode::MathShift => Value::MathShift(c),
            CatCode::AlignTab => Value::AlignTab(c),
            CatCode::Superscript => Value::Superscript(c),
            CatCode::Subscript => Value::Subscript(c),
            CatCode::Space => Value::Space,
            CatCode::Letter => Value::Letter(c),
            CatCode::Other => Value::Other(c),
            CatCode::Active => Value::ControlSequence(CsName::active_character(c)),
            _ => panic!("catcode {code} cannot appear on a token"),
        }
    }
}

/// Position of a token in its source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A TeX token.
///
/// Tokens compare by value; the source position is carried for diagnostics
/// only.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    value: Value,
    pos: Pos,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Token {
    pub fn new(value: Value, pos: Pos) -> Token {
        Token { value, pos }
    }

    pub fn from_char(c: char, code: CatCode, pos: Pos) -> Token {
        Token {
            value: Value::from_char(c, code),
            pos,
        }
    }

    pub fn control_sequence<S: Into<String>>(name: S, pos: Pos) -> Token {
        Token {
            value: Value::ControlSequence(CsName::control_sequence(name)),
            pos,
        }
    }

    pub fn parameter(index: u8, depth: u8, pos: Pos) -> Token {
        Token {
            value: Value::Parameter { index, depth },
            pos,
        }
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    #[inline]
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// The character of a character token, or `None` for control sequences
    /// and parameters.
    pub fn char(&self) -> Option<char> {
        match self.value {
            Value::BeginGroup(c)
            | Value::EndGroup(c)
            | Value::MathShift(c)
            | Value::AlignTab(c)
            | Value::Superscript(c)
            | Value::Subscript(c)
            | Value::Letter(c)
            | Value::Other(c) => Some(c),
            Value::Space => Some(' '),
            Value::ControlSequence(ref cs) if cs.active => cs.name.chars().next(),
            _ => None,
        }
    }

    pub fn cat_code(&self) -> Option<CatCode> {
        match self.value {
            Value::BeginGroup(_) => Some(CatCode::BeginGroup),
            Value::EndGroup(_) => Some(CatCode::EndGroup),
            Value::MathShift(_) => Some(CatCode::MathShift),
            Value::AlignTab(_) => Some(CatCode::AlignTab),
            Value::Superscript(_) => Some(CatCode::Superscript),
            Value::Subscript(_) => Some(CatCode::Subscript),
            Value::Space => Some(CatCode::Space),
            Value::Letter(_) => Some(CatCode::Letter),
            Value::Other(_) => Some(CatCode::Other),
            Value::ControlSequence(ref cs) if cs.active => Some(CatCode::Active),
            _ => None,
        }
    }

    pub fn is_control_sequence(&self, name: &str) -> bool {
        matches!(&self.value, Value::ControlSequence(cs) if !cs.active && cs.name == name)
    }

    pub fn cs_name(&self) -> Option<&CsName> {
        match &self.value {
            Value::ControlSequence(cs) => Some(cs),
            _ => None,
        }
    }
}

/// Write a token list back out as characters.
///
/// The result re-lexes to the same token stream under the same catcode
/// table: control sequences are prefixed with the escape character and
/// multi-letter names get a trailing space when the following token would
/// otherwise extend the name.
pub fn detokenize<'a, T>(tokens: T, escape_char: char) -> String
where
    T: IntoIterator<Item = &'a Token>,
{
    let tokens: Vec<&Token> = tokens.into_iter().collect();
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.value() {
            Value::ControlSequence(cs) if !cs.active => {
                out.push(escape_char);
                out.push_str(&cs.name);
                let multi_letter = cs.name.chars().count() != 1
                    || cs.name.chars().next().is_some_and(|c| c.is_alphabetic());
                let next_extends = matches!(
                    tokens.get(i + 1).map(|t| t.value()),
                    Some(Value::Letter(_)) | Some(Value::ControlSequence(_))
                );
                if multi_letter && next_extends {
                    out.push(' ');
                }
            }
            Value::Parameter { index, depth } => {
                for _ in 0..*depth {
                    out.push('#');
                }
                out.push(char::from_digit(*index as u32, 10).unwrap());
            }
            Value::Space => out.push(' '),
            _ => out.push(token.char().unwrap()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(name: &str) -> Token {
        Token::control_sequence(name, Pos::default())
    }

    fn letter(c: char) -> Token {
        Token::from_char(c, CatCode::Letter, Pos::default())
    }

    #[test]
    fn tokens_compare_by_value_only() {
        let a = Token::from_char('x', CatCode::Letter, Pos { line: 1, column: 1 });
        let b = Token::from_char('x', CatCode::Letter, Pos { line: 9, column: 4 });
        assert_eq!(a, b);
    }

    macro_rules! detokenize_test {
        ($name: ident, $tokens: expr, $want: expr) => {
            #[test]
            fn $name() {
                let tokens: Vec<Token> = $tokens;
                assert_eq!(detokenize(&tokens, '\\'), $want);
            }
        };
    }

    detokenize_test![empty, vec![], ""];
    detokenize_test![
        plain_run,
        vec![letter('h'), letter('i'), Token::new(Value::Space, Pos::default())],
        "hi "
    ];
    detokenize_test![
        cs_followed_by_letter_gets_space,
        vec![cs("emph"), letter('x')],
        "\\emph x"
    ];
    detokenize_test![
        cs_followed_by_other_does_not,
        vec![cs("emph"), Token::from_char('1', CatCode::Other, Pos::default())],
        "\\emph1"
    ];
    detokenize_test![
        single_nonletter_cs,
        vec![cs("%"), letter('x')],
        "\\%x"
    ];
    detokenize_test![
        parameter_depth,
        vec![Token::parameter(1, 2, Pos::default())],
        "##1"
    ];
}
