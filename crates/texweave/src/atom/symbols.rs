//! Symbol, diacritic and ligature tables.
//!
//! Two symbol tables are carried: the primitive escapes (`\%`, `\&`, ...)
//! and the plain TeX vocabulary (Greek letters, math operators, text
//! symbols). Both map zero-argument commands to Unicode strings.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Escaped input characters and other primitive glyph commands.
pub static PRIMITIVE_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("%", "%"),
        ("&", "&"),
        ("#", "#"),
        ("_", "_"),
        ("$", "$"),
        ("{", "{"),
        ("}", "}"),
        (" ", " "),
        ("-", ""), // discretionary hyphen
        ("/", ""), // italic correction
        ("textbackslash", "\\"),
        ("textasciitilde", "~"),
        ("textasciicircum", "^"),
        ("textunderscore", "_"),
        ("textbar", "|"),
        ("textless", "<"),
        ("textgreater", ">"),
        ("textendash", "\u{2013}"),
        ("textemdash", "\u{2014}"),
        ("textquoteleft", "\u{2018}"),
        ("textquoteright", "\u{2019}"),
        ("textquotedblleft", "\u{201C}"),
        ("textquotedblright", "\u{201D}"),
        ("quad", "\u{2003}"),
        ("qquad", "\u{2003}\u{2003}"),
        ("enspace", "\u{2002}"),
        ("thinspace", "\u{2009}"),
        ("nobreakspace", "\u{00A0}"),
        ("slash", "/"),
    ])
});

/// The plain TeX symbol vocabulary.
pub static PLAIN_TEX_SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Greek lower case.
        ("alpha", "\u{03B1}"),
        ("beta", "\u{03B2}"),
        ("gamma", "\u{03B3}"),
        ("delta", "\u{03B4}"),
        ("epsilon", "\u{03F5}"),
        ("varepsilon", "\u{03B5}"),
        ("zeta", "\u{03B6}"),
        ("eta", "\u{03B7}"),
        ("theta", "\u{03B8}"),
        ("vartheta", "\u{03D1}"),
        ("iota", "\u{03B9}"),
        ("kappa", "\u{03BA}"),
        ("lambda", "\u{03BB}"),
        ("mu", "\u{03BC}"),
        ("nu", "\u{03BD}"),
        ("xi", "\u{03BE}"),
        ("pi", "\u{03C0}"),
        ("varpi", "\u{03D6}"),
        ("rho", "\u{03C1}"),
        ("varrho", "\u{03F1}"),
        ("sigma", "\u{03C3}"),
        ("varsigma", "\u{03C2}"),
        ("tau", "\u{03C4}"),
        ("upsilon", "\u{03C5}"),
        ("phi", "\u{03D5}"),
        ("varphi", "\u{03C6}"),
        ("chi", "\u{03C7}"),
        ("psi", "\u{03C8}"),
        ("omega", "\u{03C9}"),
        // Greek upper case.
        ("Gamma", "\u{0393}"),
        ("Delta", "\u{0394}"),
        ("Theta", "\u{0398}"),
        ("Lambda", "\u{039B}"),
        ("Xi", "\u{039E}"),
        ("Pi", "\u{03A0}"),
        ("Sigma", "\u{03A3}"),
        ("Upsilon", "\u{03A5}"),
        ("Phi", "\u{03A6}"),
        ("Psi", "\u{03A8}"),
        ("Omega", "\u{03A9}"),
        // Binary operators and relations.
        ("pm", "\u{00B1}"),
        ("mp", "\u{2213}"),
        ("times", "\u{00D7}"),
        ("div", "\u{00F7}"),
        ("cdot", "\u{22C5}"),
        ("ast", "\u{2217}"),
        ("circ", "\u{2218}"),
        ("bullet", "\u{2219}"),
        ("cap", "\u{2229}"),
        ("cup", "\u{222A}"),
        ("vee", "\u{2228}"),
        ("wedge", "\u{2227}"),
        ("setminus", "\u{2216}"),
        ("oplus", "\u{2295}"),
        ("ominus", "\u{2296}"),
        ("otimes", "\u{2297}"),
        ("leq", "\u{2264}"),
        ("le", "\u{2264}"),
        ("geq", "\u{2265}"),
        ("ge", "\u{2265}"),
        ("neq", "\u{2260}"),
        ("ne", "\u{2260}"),
        ("equiv", "\u{2261}"),
        ("sim", "\u{223C}"),
        ("simeq", "\u{2243}"),
        ("approx", "\u{2248}"),
        ("cong", "\u{2245}"),
        ("propto", "\u{221D}"),
        ("prec", "\u{227A}"),
        ("succ", "\u{227B}"),
        ("subset", "\u{2282}"),
        ("supset", "\u{2283}"),
        ("subseteq", "\u{2286}"),
        ("supseteq", "\u{2287}"),
        ("in", "\u{2208}"),
        ("notin", "\u{2209}"),
        ("ni", "\u{220B}"),
        ("perp", "\u{22A5}"),
        ("parallel", "\u{2225}"),
        ("vdash", "\u{22A2}"),
        ("dashv", "\u{22A3}"),
        ("models", "\u{22A8}"),
        // Arrows.
        ("leftarrow", "\u{2190}"),
        ("gets", "\u{2190}"),
        ("rightarrow", "\u{2192}"),
        ("to", "\u{2192}"),
        ("leftrightarrow", "\u{2194}"),
        ("Leftarrow", "\u{21D0}"),
        ("Rightarrow", "\u{21D2}"),
        ("Leftrightarrow", "\u{21D4}"),
        ("mapsto", "\u{21A6}"),
        ("uparrow", "\u{2191}"),
        ("downarrow", "\u{2193}"),
        ("hookrightarrow", "\u{21AA}"),
        ("hookleftarrow", "\u{21A9}"),
        // Big operators.
        ("sum", "\u{2211}"),
        ("prod", "\u{220F}"),
        ("coprod", "\u{2210}"),
        ("int", "\u{222B}"),
        ("oint", "\u{222E}"),
        ("bigcap", "\u{22C2}"),
        ("bigcup", "\u{22C3}"),
        ("bigvee", "\u{22C1}"),
        ("bigwedge", "\u{22C0}"),
        // Miscellaneous math.
        ("infty", "\u{221E}"),
        ("partial", "\u{2202}"),
        ("nabla", "\u{2207}"),
        ("forall", "\u{2200}"),
        ("exists", "\u{2203}"),
        ("neg", "\u{00AC}"),
        ("lnot", "\u{00AC}"),
        ("emptyset", "\u{2205}"),
        ("aleph", "\u{2135}"),
        ("hbar", "\u{210F}"),
        ("ell", "\u{2113}"),
        ("Re", "\u{211C}"),
        ("Im", "\u{2111}"),
        ("wp", "\u{2118}"),
        ("prime", "\u{2032}"),
        ("angle", "\u{2220}"),
        ("triangle", "\u{25B3}"),
        ("surd", "\u{221A}"),
        ("top", "\u{22A4}"),
        ("bot", "\u{22A5}"),
        ("langle", "\u{27E8}"),
        ("rangle", "\u{27E9}"),
        ("lceil", "\u{2308}"),
        ("rceil", "\u{2309}"),
        ("lfloor", "\u{230A}"),
        ("rfloor", "\u{230B}"),
        ("mid", "\u{2223}"),
        ("|", "\u{2016}"),
        // Dots.
        ("ldots", "\u{2026}"),
        ("dots", "\u{2026}"),
        ("cdots", "\u{22EF}"),
        ("vdots", "\u{22EE}"),
        ("ddots", "\u{22F1}"),
        // Text symbols.
        ("dag", "\u{2020}"),
        ("ddag", "\u{2021}"),
        ("S", "\u{00A7}"),
        ("P", "\u{00B6}"),
        ("copyright", "\u{00A9}"),
        ("pounds", "\u{00A3}"),
        ("oe", "\u{0153}"),
        ("OE", "\u{0152}"),
        ("ae", "\u{00E6}"),
        ("AE", "\u{00C6}"),
        ("aa", "\u{00E5}"),
        ("AA", "\u{00C5}"),
        ("o", "\u{00F8}"),
        ("O", "\u{00D8}"),
        ("l", "\u{0142}"),
        ("L", "\u{0141}"),
        ("ss", "\u{00DF}"),
        ("i", "\u{0131}"),
        ("j", "\u{0237}"),
        ("TeX", "TeX"),
        ("LaTeX", "LaTeX"),
    ])
});

/// One-argument diacritic commands, mapped to the combining mark that is
/// inserted after the argument's base character.
pub static DIACRITICS: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("`", '\u{0300}'),  // grave
        ("'", '\u{0301}'),  // acute
        ("^", '\u{0302}'),  // circumflex
        ("~", '\u{0303}'),  // tilde
        ("=", '\u{0304}'),  // macron
        (".", '\u{0307}'),  // dot above
        ("\"", '\u{0308}'), // diaeresis
        ("u", '\u{0306}'),  // breve
        ("v", '\u{030C}'),  // caron
        ("H", '\u{030B}'),  // double acute
        ("r", '\u{030A}'),  // ring above
        ("c", '\u{0327}'),  // cedilla
        ("k", '\u{0328}'),  // ogonek
        ("b", '\u{0331}'),  // macron below
        ("d", '\u{0323}'),  // dot below
    ])
});

/// Two-argument diacritics: the mark spans both base characters.
pub static DOUBLE_DIACRITICS: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("t", '\u{0361}'),           // tie
        ("textdoublegrave", '\u{030F}'),
    ])
});

/// Character-level input ligatures, longest key first.
pub const LIGATURES: &[(&str, &str)] = &[
    ("---", "\u{2014}"),
    ("--", "\u{2013}"),
    ("``", "\u{201C}"),
    ("''", "\u{201D}"),
    ("?`", "\u{00BF}"),
    ("!`", "\u{00A1}"),
    ("`", "\u{2018}"),
    ("'", "\u{2019}"),
];

/// Look a zero-argument symbol command up in both tables.
pub fn symbol(name: &str) -> Option<&'static str> {
    PRIMITIVE_SYMBOLS
        .get(name)
        .or_else(|| PLAIN_TEX_SYMBOLS.get(name))
        .copied()
}
