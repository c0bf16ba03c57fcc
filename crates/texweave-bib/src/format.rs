//! Formatting entries into the records the core consumes.
//!
//! Field values are de-TeX-ed for display (braces stripped, dashes and
//! no-break spaces resolved, accent commands applied via the core's
//! diacritic tables), then assembled into agent-year labels and a full
//! entry text.

use std::collections::HashMap;

use texweave::atom::symbols;
use texweave::doc::BibRecord;

use crate::reader::{Database, Entry};

/// Produce the key → record map the document reader consumes.
pub fn records(database: &Database) -> HashMap<String, BibRecord> {
    database
        .entries
        .iter()
        .map(|entry| (entry.key.clone(), record(entry)))
        .collect()
}

fn record(entry: &Entry) -> BibRecord {
    BibRecord {
        key: entry.key.clone(),
        agents: agents(entry),
        year: de_tex(entry.field("year").unwrap_or("")),
        text: entry_text(entry),
    }
}

// The label agents: family names from `author`, falling back to `editor`.
fn agents(entry: &Entry) -> String {
    let names = entry
        .field("author")
        .or_else(|| entry.field("editor"))
        .unwrap_or("");
    let families: Vec<String> = split_names(names)
        .iter()
        .map(|name| family_name(name))
        .filter(|family| !family.is_empty())
        .collect();
    match families.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [one, two] => format!["{one} & {two}"],
        [first, ..] => format!["{first} et al."],
    }
}

// Author lists are separated by ` and ` at brace depth zero.
fn split_names(names: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let words: Vec<&str> = names.split_whitespace().collect();
    for word in words {
        if word == "and" && depth == 0 {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        depth += word.matches('{').count();
        depth = depth.saturating_sub(word.matches('}').count());
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

// `Last, First` name order wins; otherwise the last word is the family
// name.
fn family_name(name: &str) -> String {
    let name = de_tex(name);
    match name.split_once(',') {
        Some((family, _)) => family.trim().to_string(),
        None => name
            .split_whitespace()
            .last()
            .unwrap_or("")
            .to_string(),
    }
}

// The bibliography listing text: agents (year). Title. Container.
fn entry_text(entry: &Entry) -> String {
    let mut text = String::new();
    let agents = entry
        .field("author")
        .or_else(|| entry.field("editor"))
        .map(de_tex)
        .unwrap_or_default();
    if !agents.is_empty() {
        text.push_str(&agents);
    }
    if let Some(year) = entry.field("year") {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push('(');
        text.push_str(&de_tex(year));
        text.push(')');
    }
    if !text.is_empty() {
        text.push_str(". ");
    }
    if let Some(title) = entry.field("title") {
        text.push_str(&de_tex(title));
        text.push_str(". ");
    }
    for container in ["journal", "booktitle", "publisher", "school", "institution"] {
        if let Some(value) = entry.field(container) {
            text.push_str(&de_tex(value));
            text.push_str(". ");
        }
    }
    if let Some(pages) = entry.field("pages") {
        text.push_str(&de_tex(pages));
        text.push_str(". ");
    }
    text.trim_end().to_string()
}

// A light rendition of TeX markup in field values: braces group, `~` is a
// no-break space, dash ligatures apply, and commands resolve through the
// core's symbol and diacritic tables. Unknown commands vanish.
fn de_tex(value: &str) -> String {
    let mut out = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => out.push('\u{00A0}'),
            '-' => {
                let mut run = 1;
                while chars.peek() == Some(&'-') {
                    chars.next();
                    run += 1;
                }
                out.push_str(match run {
                    1 => "-",
                    2 => "\u{2013}",
                    _ => "\u{2014}",
                });
            }
            '\\' => {
                let mut name = String::new();
                match chars.peek() {
                    Some(c) if c.is_alphabetic() => {
                        while let Some(c) = chars.peek() {
                            if c.is_alphabetic() {
                                name.push(*c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        // The space ending a command name is swallowed.
                        if chars.peek() == Some(&' ') {
                            chars.next();
                        }
                    }
                    Some(c) => {
                        name.push(*c);
                        chars.next();
                    }
                    None => {}
                }
                if let Some(text) = symbols::symbol(&name) {
                    out.push_str(text);
                } else if let Some(mark) = symbols::DIACRITICS.get(name.as_str()) {
                    // The argument is the next character, skipping braces.
                    while matches!(chars.peek(), Some('{')) {
                        chars.next();
                    }
                    if let Some(base) = chars.next() {
                        out.push(base);
                        out.push(*mark);
                    }
                }
                // Anything else is dropped.
            }
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_database;

    fn entry(fields: &[(&str, &str)]) -> Entry {
        Entry {
            kind: "book".into(),
            key: "k".into(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn single_author_label() {
        let entry = entry(&[("author", "Smith, John"), ("year", "2020")]);
        let record = record(&entry);
        assert_eq!(record.agents, "Smith");
        assert_eq!(record.year, "2020");
        assert_eq!(record.label(), "Smith 2020");
    }

    #[test]
    fn two_authors_join_with_ampersand() {
        let entry = entry(&[
            ("author", "Smith, John and Jones, Mary"),
            ("year", "2021"),
        ]);
        assert_eq!(record(&entry).label(), "Smith & Jones 2021");
    }

    #[test]
    fn three_authors_et_al() {
        let entry = entry(&[
            ("author", "Smith, J. and Jones, M. and Lee, K."),
            ("year", "2023"),
        ]);
        assert_eq!(record(&entry).label(), "Smith et al. 2023");
    }

    #[test]
    fn first_last_name_order() {
        let entry = entry(&[("author", "John Smith"), ("year", "2020")]);
        assert_eq!(record(&entry).agents, "Smith");
    }

    #[test]
    fn editor_fallback() {
        let entry = entry(&[("editor", "Doe, Jane"), ("year", "1999")]);
        assert_eq!(record(&entry).label(), "Doe 1999");
    }

    #[test]
    fn braced_corporate_name_stays_whole() {
        let entry = entry(&[("author", "{Oxford University Press}"), ("year", "2001")]);
        assert_eq!(record(&entry).agents, "Oxford University Press");
    }

    #[test]
    fn de_tex_strips_braces_and_resolves_accents() {
        assert_eq!(de_tex("The {TeX} Book"), "The TeX Book");
        assert_eq!(de_tex(r"M\'{e}xico"), "Me\u{0301}xico");
        assert_eq!(de_tex(r#"G\"odel"#), "Go\u{0308}del");
        assert_eq!(de_tex("10--20"), "10\u{2013}20");
        assert_eq!(de_tex("a~b"), "a\u{00A0}b");
    }

    #[test]
    fn records_from_database() {
        let db = read_database(
            r#"@article{smith20,
                author = {Smith, John},
                title = {A Study of Things},
                journal = {Journal of Studies},
                year = 2020,
            }"#,
        )
        .unwrap();
        let map = records(&db);
        let record = &map["smith20"];
        assert_eq!(record.label(), "Smith 2020");
        assert!(record.text.contains("Smith, John (2020)"));
        assert!(record.text.contains("A Study of Things"));
    }
}
