//! The `.bib` reader.
//!
//! The accepted grammar follows the biber one: junk between entries is
//! skipped, entries are `@type{key, field = value, ...}` with `(...)` as an
//! alternative delimiter, and values concatenate braced text, quoted text,
//! bare numbers and `@string` variables with `#`. Entry keys are
//! case-sensitive; entry kinds, field names and variable names fold to
//! lower case. `@comment` and `@preamble` entries are consumed and
//! discarded.

use std::collections::HashMap;

use crate::BibError;

/// One database entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The entry kind (`article`, `book`, ...), lower-cased.
    pub kind: String,
    pub key: String,
    /// Field name (lower-cased) → resolved value.
    pub fields: HashMap<String, String>,
}

impl Entry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A parsed database, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Database {
    pub entries: Vec<Entry>,
    /// Recoverable oddities found while reading (unknown variables).
    pub warnings: Vec<String>,
}

impl Database {
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.key == key)
    }
}

/// Parse a `.bib` source.
pub fn read_database(source: &str) -> Result<Database, BibError> {
    let mut scanner = Scanner::new(source);
    let mut variables = month_variables();
    let mut database = Database::default();
    loop {
        scanner.skip_junk();
        if scanner.peek().is_none() {
            database.warnings = scanner.warnings;
            return Ok(database);
        }
        scanner.expect('@')?;
        scanner.skip_ignored();
        let kind = scanner.identifier()?.to_lowercase();
        scanner.skip_ignored();
        match kind.as_str() {
            "comment" | "preamble" => {
                scanner.skip_balanced_entry()?;
            }
            "string" => {
                let close = scanner.open_delimiter()?;
                scanner.skip_ignored();
                let name = scanner.identifier()?.to_lowercase();
                scanner.skip_ignored();
                scanner.expect('=')?;
                let value = scanner.value(&mut |v| lookup(&variables, v))?;
                scanner.skip_ignored();
                scanner.expect(close)?;
                variables.insert(name, value);
            }
            _ => {
                let entry = scanner.entry(kind, &variables)?;
                database.entries.push(entry);
            }
        }
    }
}

fn month_variables() -> HashMap<String, String> {
    [
        ("jan", "January"),
        ("feb", "February"),
        ("mar", "March"),
        ("apr", "April"),
        ("may", "May"),
        ("jun", "June"),
        ("jul", "July"),
        ("aug", "August"),
        ("sep", "September"),
        ("oct", "October"),
        ("nov", "November"),
        ("dec", "December"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn lookup(variables: &HashMap<String, String>, name: &str) -> Option<String> {
    variables.get(&name.to_lowercase()).cloned()
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    /// Warnings for recoverable oddities (unknown variables).
    pub warnings: Vec<String>,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Scanner<'a> {
        Scanner {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            warnings: Vec::new(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error<M: Into<String>>(&self, message: M) -> BibError {
        BibError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), BibError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!["expected `{want}`, found `{c}`"])),
            None => Err(self.error(format!["expected `{want}`, found end of input"])),
        }
    }

    // Everything up to the next entry marker is junk; TeX comments hide
    // markers until the end of their line.
    fn skip_junk(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '@' => return,
                '%' => self.skip_line_comment(),
                _ => {
                    self.bump();
                }
            }
        }
    }

    // Whitespace and comments between tokens.
    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            if c == '%' {
                self.skip_line_comment();
            } else if c.is_ascii_whitespace() {
                self.bump();
            } else {
                return;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                return;
            }
        }
    }

    fn identifier(&mut self) -> Result<String, BibError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || "{}(),=\\#%\"".contains(c) || c.is_ascii_control() {
                break;
            }
            name.push(c);
            self.bump();
        }
        if name.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(name)
    }

    // The opening delimiter of an entry body; returns its closer.
    fn open_delimiter(&mut self) -> Result<char, BibError> {
        match self.bump() {
            Some('{') => Ok('}'),
            Some('(') => Ok(')'),
            Some(c) => Err(self.error(format!["expected `{{` or `(`, found `{c}`"])),
            None => Err(self.error("expected `{` or `(`, found end of input")),
        }
    }

    // Consume a whole @comment/@preamble body.
    fn skip_balanced_entry(&mut self) -> Result<(), BibError> {
        let close = self.open_delimiter()?;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' if close == '}' && depth == 0 => return Ok(()),
                '}' => depth = depth.saturating_sub(1),
                c if c == close && depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error("unterminated entry"))
    }

    fn entry(
        &mut self,
        kind: String,
        variables: &HashMap<String, String>,
    ) -> Result<Entry, BibError> {
        let close = self.open_delimiter()?;
        self.skip_ignored();
        let key = self.identifier()?;
        let mut fields = HashMap::new();
        loop {
            self.skip_ignored();
            match self.peek() {
                Some(',') => {
                    self.bump();
                    self.skip_ignored();
                    // A trailing comma before the closing delimiter.
                    if self.peek() == Some(close) {
                        self.bump();
                        break;
                    }
                    let name = self.identifier()?.to_lowercase();
                    self.skip_ignored();
                    self.expect('=')?;
                    let value = self.value(&mut |v| lookup(variables, v))?;
                    fields.insert(name, value);
                }
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                Some(c) => return Err(self.error(format!["unexpected `{c}` in entry `{key}`"])),
                None => return Err(self.error(format!["unterminated entry `{key}`"])),
            }
        }
        Ok(Entry { kind, key, fields })
    }

    // A value: `#`-concatenated tokens.
    fn value(
        &mut self,
        resolve: &mut dyn FnMut(&str) -> Option<String>,
    ) -> Result<String, BibError> {
        let mut out = String::new();
        loop {
            self.skip_ignored();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    self.balanced_into('}', &mut out)?;
                }
                Some('"') => {
                    self.bump();
                    self.quoted_into(&mut out)?;
                }
                Some(c) if c.is_ascii_digit() => {
                    while let Some(c) = self.peek() {
                        if c.is_ascii_digit() {
                            out.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
                _ => {
                    let name = self.identifier()?;
                    match resolve(&name) {
                        Some(value) => out.push_str(&value),
                        None => self
                            .warnings
                            .push(format!["unknown variable `{name}` resolved to nothing"]),
                    }
                }
            }
            self.skip_ignored();
            match self.peek() {
                Some('#') => {
                    self.bump();
                }
                _ => return Ok(out),
            }
        }
    }

    // Braced text with balanced inner braces; the braces are kept so the
    // formatter can honour brace-protected casing.
    fn balanced_into(&mut self, close: char, out: &mut String) -> Result<(), BibError> {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => {
                    depth += 1;
                    out.push(c);
                }
                '}' => {
                    if depth == 0 && close == '}' {
                        return Ok(());
                    }
                    depth = depth.saturating_sub(1);
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated braced value"))
    }

    // Quoted text; a closing quote inside braces does not terminate.
    fn quoted_into(&mut self, out: &mut String) -> Result<(), BibError> {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => {
                    depth += 1;
                    out.push(c);
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    out.push(c);
                }
                '"' if depth == 0 => return Ok(()),
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated quoted value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_entry() {
        let db = read_database(
            r#"@article{smith20,
                author = {Smith, John},
                title = {A Title},
                year = 2020,
            }"#,
        )
        .unwrap();
        assert_eq!(db.entries.len(), 1);
        let entry = db.get("smith20").unwrap();
        assert_eq!(entry.kind, "article");
        assert_eq!(entry.field("author"), Some("Smith, John"));
        assert_eq!(entry.field("year"), Some("2020"));
    }

    #[test]
    fn junk_between_entries_is_skipped() {
        let db = read_database(
            "Some junk text.\n@book{a, title = {A}}\nmore junk\n@book{b, title = {B}}",
        )
        .unwrap();
        let keys: Vec<&str> = db.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn field_names_fold_entry_keys_do_not() {
        let db = read_database("@Book{MiXeD, TITLE = {T}}").unwrap();
        let entry = db.get("MiXeD").unwrap();
        assert_eq!(entry.kind, "book");
        assert_eq!(entry.field("title"), Some("T"));
    }

    #[test]
    fn quoted_values_and_inner_braces() {
        let db = read_database(r#"@book{k, title = "The {TeX} Book"}"#).unwrap();
        assert_eq!(db.get("k").unwrap().field("title"), Some("The {TeX} Book"));
    }

    #[test]
    fn string_variables_concatenate() {
        let db = read_database(
            r#"@string{jp = {Journal of Parsing}}
               @article{k, journal = jp # ", Series A"}"#,
        )
        .unwrap();
        assert_eq!(
            db.get("k").unwrap().field("journal"),
            Some("Journal of Parsing, Series A")
        );
    }

    #[test]
    fn month_abbreviations_are_predefined() {
        let db = read_database("@article{k, month = jul}").unwrap();
        assert_eq!(db.get("k").unwrap().field("month"), Some("July"));
    }

    #[test]
    fn parenthesised_entries() {
        let db = read_database("@book(k, title = {T})").unwrap();
        assert_eq!(db.get("k").unwrap().field("title"), Some("T"));
    }

    #[test]
    fn comment_and_preamble_are_discarded() {
        let db = read_database(
            r#"@comment{anything {nested} here}
               @preamble{"\newcommand{\x}{y}"}
               @book{k, title = {T}}"#,
        )
        .unwrap();
        assert_eq!(db.entries.len(), 1);
    }

    #[test]
    fn tex_comments_hide_entry_markers() {
        let db = read_database("% @book{hidden, title = {H}}\n@book{k, title = {T}}").unwrap();
        assert_eq!(db.entries.len(), 1);
        assert!(db.get("hidden").is_none());
    }

    #[test]
    fn unterminated_entry_is_an_error() {
        let err = read_database("@book{k, title = {T}").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn error_carries_position() {
        let err = read_database("@book{k,\n  title = {unclosed").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
