//! The syntactic filter: whitespace normalisation and symbol resolution.
//!
//! Two passes over the atom tree. The first conflates whitespace within
//! each level without crossing structural boundaries; the second replaces
//! symbol and diacritic commands with their Unicode text and applies the
//! input ligatures to plain runs. Unknown commands are left intact.

use super::symbols;
use super::{text_of, Arg, Atom};

/// Run both filter passes.
pub fn filter(atoms: Vec<Atom>) -> Vec<Atom> {
    resolve_symbols(normalize(atoms))
}

/// Whitespace normalisation. Idempotent.
pub fn normalize(atoms: Vec<Atom>) -> Vec<Atom> {
    let mut out = Vec::with_capacity(atoms.len());
    for atom in atoms {
        let atom = map_children(atom, normalize);
        match atom {
            Atom::White => match out.last() {
                // Adjacent whites conflate; a paragraph break absorbs them.
                Some(Atom::White) | Some(Atom::Par) => {}
                _ => out.push(Atom::White),
            },
            Atom::Newline => {
                if matches!(out.last(), Some(Atom::White)) {
                    out.pop();
                }
                out.push(Atom::Newline);
            }
            Atom::Par => {
                while matches!(out.last(), Some(Atom::White) | Some(Atom::Par)) {
                    out.pop();
                }
                out.push(Atom::Par);
            }
            other => out.push(other),
        }
    }
    out
}

/// Symbol, diacritic and ligature resolution.
pub fn resolve_symbols(atoms: Vec<Atom>) -> Vec<Atom> {
    let resolved = atoms
        .into_iter()
        .map(|atom| match atom {
            Atom::Plain(text) => Atom::Plain(apply_ligatures(&text)),
            Atom::Command(name, args) => {
                if args.is_empty() {
                    if let Some(text) = symbols::symbol(&name) {
                        return Atom::Plain(text.into());
                    }
                }
                if let Some(mark) = symbols::DIACRITICS.get(name.as_str()) {
                    if let Some(body) = Atom::required_arg(&args, 0) {
                        return Atom::Plain(apply_diacritic(*mark, &text_of(body)));
                    }
                }
                if let Some(mark) = symbols::DOUBLE_DIACRITICS.get(name.as_str()) {
                    if let (Some(first), Some(second)) =
                        (Atom::required_arg(&args, 0), Atom::required_arg(&args, 1))
                    {
                        let mut text = text_of(first);
                        text.push(*mark);
                        text.push_str(&text_of(second));
                        return Atom::Plain(text);
                    }
                }
                Atom::Command(name, map_args(args, resolve_symbols))
            }
            other => map_children(other, resolve_symbols),
        });
    // Resolved symbols sit next to the text they belong to; merge them so
    // downstream sees whole runs.
    let mut out: Vec<Atom> = Vec::new();
    for atom in resolved {
        match (out.last_mut(), atom) {
            (Some(Atom::Plain(acc)), Atom::Plain(next)) => acc.push_str(&next),
            (_, atom) => out.push(atom),
        }
    }
    out
}

// Apply a tree transformation to every child sequence of an atom.
fn map_children(atom: Atom, f: fn(Vec<Atom>) -> Vec<Atom>) -> Atom {
    match atom {
        Atom::Group(name, args, body) => Atom::Group(name, map_args(args, f), f(body)),
        Atom::Command(name, args) => Atom::Command(name, map_args(args, f)),
        Atom::Math(kind, body) => Atom::Math(kind, f(body)),
        Atom::SupScript(body) => Atom::SupScript(f(body)),
        Atom::SubScript(body) => Atom::SubScript(f(body)),
        other => other,
    }
}

fn map_args(args: Vec<Arg>, f: fn(Vec<Atom>) -> Vec<Atom>) -> Vec<Arg> {
    args.into_iter()
        .map(|arg| match arg {
            Arg::Required(body) => Arg::Required(f(body)),
            Arg::Optional(body) => Arg::Optional(f(body)),
            Arg::Star => Arg::Star,
        })
        .collect()
}

// Insert a combining mark after the first character of `text` and any
// combining marks already attached to it.
fn apply_diacritic(mark: char, text: &str) -> String {
    let mut chars = text.chars();
    let first = match chars.next() {
        None => return mark.to_string(),
        Some(c) => c,
    };
    let mut out = String::new();
    out.push(first);
    let rest: String = chars.collect();
    let mut split = 0;
    for c in rest.chars() {
        if is_combining(c) {
            out.push(c);
            split += c.len_utf8();
        } else {
            break;
        }
    }
    out.push(mark);
    out.push_str(&rest[split..]);
    out
}

fn is_combining(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

// Replace input ligatures, longest key first at every position.
fn apply_ligatures(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (key, replacement) in symbols::LIGATURES {
            if rest.starts_with(key) {
                out.push_str(replacement);
                rest = &rest[key.len()..];
                continue 'scan;
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Atom {
        Atom::Plain(s.into())
    }

    #[test]
    fn adjacent_whites_conflate() {
        let got = normalize(vec![plain("a"), Atom::White, Atom::White, plain("b")]);
        assert_eq!(got, vec![plain("a"), Atom::White, plain("b")]);
    }

    #[test]
    fn newline_consumes_preceding_white() {
        let got = normalize(vec![plain("a"), Atom::White, Atom::Newline]);
        assert_eq!(got, vec![plain("a"), Atom::Newline]);
    }

    #[test]
    fn par_absorbs_surrounding_whitespace() {
        let got = normalize(vec![
            plain("a"),
            Atom::White,
            Atom::Par,
            Atom::Par,
            Atom::White,
            plain("b"),
        ]);
        assert_eq!(got, vec![plain("a"), Atom::Par, plain("b")]);
    }

    #[test]
    fn leading_and_trailing_whitespace_survive() {
        let got = normalize(vec![Atom::White, plain("a"), Atom::White]);
        assert_eq!(got, vec![Atom::White, plain("a"), Atom::White]);
    }

    #[test]
    fn no_conflation_across_group_boundaries() {
        let got = normalize(vec![
            Atom::White,
            Atom::Group("".into(), vec![], vec![Atom::White, plain("a")]),
        ]);
        assert_eq!(
            got,
            vec![
                Atom::White,
                Atom::Group("".into(), vec![], vec![Atom::White, plain("a")]),
            ]
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = vec![
            Atom::White,
            plain("a"),
            Atom::White,
            Atom::White,
            Atom::Par,
            Atom::White,
            Atom::Par,
            plain("b"),
            Atom::Newline,
        ];
        let once = normalize(input);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_arg_symbol_resolves() {
        let got = resolve_symbols(vec![Atom::Command("alpha".into(), vec![])]);
        assert_eq!(got, vec![plain("\u{03B1}")]);
    }

    #[test]
    fn escaped_percent_resolves() {
        let got = resolve_symbols(vec![Atom::Command("%".into(), vec![])]);
        assert_eq!(got, vec![plain("%")]);
    }

    #[test]
    fn unknown_command_is_left_intact() {
        let got = resolve_symbols(vec![Atom::Command("mystery".into(), vec![])]);
        assert_eq!(got, vec![Atom::Command("mystery".into(), vec![])]);
    }

    #[test]
    fn diacritic_applies_combining_mark() {
        let got = resolve_symbols(vec![Atom::Command(
            "'".into(),
            vec![Arg::Required(vec![plain("e")])],
        )]);
        assert_eq!(got, vec![plain("e\u{0301}")]);
    }

    #[test]
    fn diacritic_stacks_after_existing_marks() {
        let got = resolve_symbols(vec![Atom::Command(
            "`".into(),
            vec![Arg::Required(vec![plain("e\u{0301}xy")])],
        )]);
        assert_eq!(got, vec![plain("e\u{0301}\u{0300}xy")]);
    }

    #[test]
    fn ligatures_prefer_longest_key() {
        assert_eq!(apply_ligatures("a---b"), "a\u{2014}b");
        assert_eq!(apply_ligatures("a--b"), "a\u{2013}b");
        assert_eq!(apply_ligatures("``hi''"), "\u{201C}hi\u{201D}");
        assert_eq!(apply_ligatures("?`que"), "\u{00BF}que");
        assert_eq!(apply_ligatures("it's"), "it\u{2019}s");
    }

    #[test]
    fn resolved_symbols_merge_with_adjacent_text() {
        let got = resolve_symbols(vec![Atom::Command("alpha".into(), vec![]), plain("+1")]);
        assert_eq!(got, vec![plain("\u{03B1}+1")]);
    }

    #[test]
    fn symbols_resolve_inside_groups() {
        let got = resolve_symbols(vec![Atom::Group(
            "".into(),
            vec![],
            vec![Atom::Command("ldots".into(), vec![])],
        )]);
        assert_eq!(
            got,
            vec![Atom::Group("".into(), vec![], vec![plain("\u{2026}")])]
        );
    }
}
