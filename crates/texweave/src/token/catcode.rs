//! Category codes and the mutable character classification table.

use std::collections::HashMap;

use CatCode::*;

/// Enum representing all 16 category codes in TeX.
///
/// The catcode of a character decides which kind of token the lexer builds
/// from it. Four of the codes (Escape, EndOfLine, Ignored, Comment, Invalid)
/// are consumed inside the lexer and never appear on emitted tokens.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CatCode {
    /// Marks the beginning of a control sequence. Example: `\`.
    Escape = 0,
    /// Begins a new group. Example: `{`.
    BeginGroup = 1,
    /// Ends an existing group. Example: `}`.
    EndGroup = 2,
    /// Starts or ends math mode. Example: `$`.
    MathShift = 3,
    /// Separates cells in alignments. Example: `&`.
    AlignTab = 4,
    /// Marks a new line in the input. Example: carriage return.
    ///
    /// A single end of line behaves like a space; two or more in a row,
    /// modulo intervening spaces, produce a `\par` control sequence.
    EndOfLine = 5,
    /// Prefixes a macro parameter number. Example: `#`.
    Parameter = 6,
    /// Starts a superscript. Example: `^`.
    Superscript = 7,
    /// Starts a subscript. Example: `_`.
    Subscript = 8,
    /// Dropped by the lexer without a trace. Example: ASCII null.
    Ignored = 9,
    /// Whitespace. Example: ` `.
    Space = 10,
    /// A character that may appear in a multi-character control sequence
    /// name. Examples: `[a-zA-Z]`.
    Letter = 11,
    /// Any character with no special role. Example: `@`.
    #[default]
    Other = 12,
    /// A single character that behaves like a control sequence. Example: `~`.
    Active = 13,
    /// Starts a comment running to the end of the line. Example: `%`.
    Comment = 14,
    /// A character that must not appear in the input. Example: ASCII delete.
    Invalid = 15,
}

impl TryFrom<i64> for CatCode {
    type Error = ();

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Escape),
            1 => Ok(BeginGroup),
            2 => Ok(EndGroup),
            3 => Ok(MathShift),
            4 => Ok(AlignTab),
            5 => Ok(EndOfLine),
            6 => Ok(Parameter),
            7 => Ok(Superscript),
            8 => Ok(Subscript),
            9 => Ok(Ignored),
            10 => Ok(Space),
            11 => Ok(Letter),
            12 => Ok(Other),
            13 => Ok(Active),
            14 => Ok(Comment),
            15 => Ok(Invalid),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CatCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, *self as u8)
    }
}

impl CatCode {
    /// Category codes assigned to the ASCII range when a new table is
    /// created.
    ///
    /// This is the plain TeX assignment (TeXBook p343) with the two LaTeX
    /// adjustments the supported authoring surface relies on: horizontal tab
    /// is whitespace and `~` is active.
    pub const DEFAULTS: [CatCode; 128] = {
        let mut t = [Other; 128];
        t[0] = Ignored; // ASCII null
        t[b'\t' as usize] = Space;
        t[b'\n' as usize] = EndOfLine;
        t[b'\r' as usize] = EndOfLine;
        t[b' ' as usize] = Space;
        t[b'#' as usize] = Parameter;
        t[b'$' as usize] = MathShift;
        t[b'%' as usize] = Comment;
        t[b'&' as usize] = AlignTab;
        t[b'\\' as usize] = Escape;
        t[b'^' as usize] = Superscript;
        t[b'_' as usize] = Subscript;
        t[b'{' as usize] = BeginGroup;
        t[b'}' as usize] = EndGroup;
        t[b'~' as usize] = Active;
        t[0x7F] = Invalid; // ASCII delete
        let mut c = b'A' as usize;
        while c <= b'Z' as usize {
            t[c] = Letter;
            c += 1;
        }
        let mut c = b'a' as usize;
        while c <= b'z' as usize {
            t[c] = Letter;
            c += 1;
        }
        t
    };
}

/// The mutable mapping from characters to category codes.
///
/// ASCII lives in a flat array; everything else in a spill map with a
/// default of [`CatCode::Letter`], so that accented words lex as single
/// control-sequence-name-capable runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatCodeTable {
    low: [CatCode; 128],
    high: HashMap<char, CatCode>,
    default: CatCode,
}

impl CatCodeTable {
    pub fn new() -> CatCodeTable {
        CatCodeTable {
            low: CatCode::DEFAULTS,
            high: HashMap::new(),
            default: CatCode::Letter,
        }
    }

    #[inline]
    pub fn get(&self, c: char) -> CatCode {
        if (c as u32) < 128 {
            self.low[c as usize]
        } else {
            *self.high.get(&c).unwrap_or(&self.default)
        }
    }

    pub fn insert(&mut self, c: char, code: CatCode) {
        if (c as u32) < 128 {
            self.low[c as usize] = code;
        } else {
            self.high.insert(c, code);
        }
    }
}

impl Default for CatCodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_plain_tex() {
        let table = CatCodeTable::new();
        assert_eq!(table.get('\\'), Escape);
        assert_eq!(table.get('{'), BeginGroup);
        assert_eq!(table.get('}'), EndGroup);
        assert_eq!(table.get('$'), MathShift);
        assert_eq!(table.get('&'), AlignTab);
        assert_eq!(table.get('#'), Parameter);
        assert_eq!(table.get('^'), Superscript);
        assert_eq!(table.get('_'), Subscript);
        assert_eq!(table.get('%'), Comment);
        assert_eq!(table.get('~'), Active);
        assert_eq!(table.get(' '), Space);
        assert_eq!(table.get('\t'), Space);
        assert_eq!(table.get('q'), Letter);
        assert_eq!(table.get('Q'), Letter);
        assert_eq!(table.get('@'), Other);
        assert_eq!(table.get('3'), Other);
    }

    #[test]
    fn non_ascii_defaults_to_letter() {
        let table = CatCodeTable::new();
        assert_eq!(table.get('é'), Letter);
        assert_eq!(table.get('ß'), Letter);
    }

    #[test]
    fn insert_overrides_both_ranges() {
        let mut table = CatCodeTable::new();
        table.insert('W', Other);
        table.insert('é', Other);
        assert_eq!(table.get('W'), Other);
        assert_eq!(table.get('é'), Other);
    }

    #[test]
    fn numeric_round_trip() {
        for u in 0..16i64 {
            let code: CatCode = u.try_into().unwrap();
            assert_eq!(code as i64, u);
        }
        assert!(CatCode::try_from(16i64).is_err());
    }
}
