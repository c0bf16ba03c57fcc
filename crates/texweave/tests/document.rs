//! End-to-end tests: TeX source through the whole front end.

use std::collections::HashMap;

use texweave::atom;
use texweave::doc::{
    Anchor, BibRecord, Block, FontStyle, Inline, ListKind, Region,
};
use texweave::engine::{Clock, Engine, Options};
use texweave::token::detokenize;
use texweave::{convert_with, Document};

fn convert(input: &str) -> Document {
    convert_bib(input, HashMap::new())
}

fn convert_bib(input: &str, bib: HashMap<String, BibRecord>) -> Document {
    let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
    convert_with(engine, "test.tex", input, bib).expect("conversion should succeed")
}

fn s(text: &str) -> Inline {
    Inline::Str(text.into())
}

#[test]
fn section_label_and_reference() {
    let doc = convert(r"\section{One}\label{l}\ref{l}");
    assert_eq!(
        doc.blocks[0],
        Block::Header {
            level: 3,
            anchor: Anchor::Section {
                region: Region::Main,
                numbers: vec![0, 1, 0, 0, 0, 0],
            },
            inlines: vec![s("One")],
        }
    );
    assert_eq!(
        doc.blocks[1],
        Block::Paragraph(vec![Inline::Pointer {
            label: "l".into(),
            target: None,
        }])
    );
    assert_eq!(doc.meta.labels["l"].id(), "sec-0-1");
}

#[test]
fn chapter_with_figure_and_reference() {
    let doc = convert(
        r"\chapter{A}\begin{figure}\includegraphics{p.png}\caption{c}\label{f}\end{figure}\ref{f}",
    );
    assert!(matches!(
        &doc.blocks[0],
        Block::Header { level: 2, .. }
    ));
    assert_eq!(
        doc.blocks[1],
        Block::Figure {
            anchor: Anchor::Figure {
                chapter: 1,
                index: 1
            },
            media: 1,
            caption: vec![s("c")],
        }
    );
    assert_eq!(doc.meta.labels["f"].id(), "figure-1-1");
    assert_eq!(doc.meta.media, vec!["p.png".to_string()]);
}

#[test]
fn itemize_with_three_items() {
    let doc = convert(r"\begin{itemize}\item one one\item two\item three\end{itemize}");
    match &doc.blocks[0] {
        Block::List { kind, items } => {
            assert_eq!(*kind, ListKind::Unordered);
            assert_eq!(items.len(), 3);
            assert_eq!(
                items[0],
                vec![Block::Paragraph(vec![s("one"), Inline::Space, s("one")])]
            );
            assert_eq!(items[2], vec![Block::Paragraph(vec![s("three")])]);
        }
        other => panic!("expected a list, got {other:?}"),
    }
}

#[test]
fn font_switches_invert() {
    let doc = convert(r"{\em one\rm two\em three}");
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![Inline::Styled(
            FontStyle::Emph,
            vec![
                s("one"),
                Inline::Styled(
                    FontStyle::Normal,
                    vec![s("two"), Inline::Styled(FontStyle::Emph, vec![s("three")])]
                ),
            ]
        )])]
    );
}

#[test]
fn user_macro_expands_before_parsing() {
    let doc = convert(r"\newcommand{\foo}[1]{hello #1}\foo{world}");
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![
            s("hello"),
            Inline::Space,
            s("world")
        ])]
    );
}

#[test]
fn citation_resolves_against_the_database() {
    let mut bib = HashMap::new();
    bib.insert(
        "smith20".to_string(),
        BibRecord {
            key: "smith20".into(),
            agents: "Smith".into(),
            year: "2020".into(),
            text: "Smith, J. (2020). A book.".into(),
        },
    );
    let doc = convert_bib(r"\cite{smith20}\printbibliography", bib);
    assert_eq!(doc.meta.citations["smith20"], 1);
    assert_eq!(doc.meta.bib["smith20"].label(), "Smith 2020");
    match doc.blocks.last().unwrap() {
        Block::BibList(items) => {
            assert_eq!(items[0].anchor, Anchor::Bib { index: 1 });
            assert_eq!(items[0].label, "Smith 2020");
        }
        other => panic!("expected a bibliography, got {other:?}"),
    }
}

// Boundary cases.

#[test]
fn empty_input_is_an_empty_document() {
    assert!(convert("").blocks.is_empty());
}

#[test]
fn comment_only_input_is_an_empty_document() {
    assert!(convert("% one\n% two\n").blocks.is_empty());
}

#[test]
fn a_bare_par_produces_no_paragraph() {
    assert!(convert(r"\par").blocks.is_empty());
}

#[test]
fn blank_line_splits_a_paragraph() {
    let doc = convert("one\n\ntwo");
    assert_eq!(doc.blocks.len(), 2);
}

#[test]
fn label_before_any_element_binds_to_the_document_root() {
    let doc = convert(r"\label{top}text");
    assert_eq!(doc.meta.labels["top"], Anchor::Document);
    assert_eq!(doc.meta.labels["top"].id(), "");
}

#[test]
fn nested_footnotes_are_flattened() {
    let doc = convert(r"a\footnote{outer\footnote{inner}}");
    assert_eq!(doc.meta.notes.len(), 2);
    let ids: Vec<String> = doc.meta.notes.iter().map(|(a, _)| a.id()).collect();
    assert!(ids.contains(&"note-0-1".to_string()));
    assert!(ids.contains(&"note-0-2".to_string()));
}

// Quantified properties.

#[test]
fn counters_reset_exactly_at_chapter_boundaries() {
    let doc = convert(
        r"\chapter{A}
          \begin{figure}\includegraphics{a.png}\caption{1}\end{figure}
          \begin{figure}\includegraphics{b.png}\caption{2}\end{figure}
          \section{S}
          \begin{figure}\includegraphics{c.png}\caption{3}\end{figure}
          \chapter{B}
          \begin{figure}\includegraphics{d.png}\caption{4}\end{figure}",
    );
    let figures: Vec<String> = doc
        .blocks
        .iter()
        .filter_map(|b| match b {
            Block::Figure { anchor, .. } => Some(anchor.id()),
            _ => None,
        })
        .collect();
    // Strictly increasing within a chapter, reset only at the chapter.
    assert_eq!(
        figures,
        vec!["figure-1-1", "figure-1-2", "figure-1-3", "figure-2-1"]
    );
}

#[test]
fn citation_indices_follow_first_textual_appearance() {
    let doc = convert(r"\cite{c}\cite{a}\cite{c}\cite{b}");
    assert_eq!(doc.meta.citations["c"], 1);
    assert_eq!(doc.meta.citations["a"], 2);
    assert_eq!(doc.meta.citations["b"], 3);
}

#[test]
fn anchor_identifiers_are_unique_across_the_document() {
    let doc = convert(
        r"\chapter{A}\section{S}\section*{P}x\footnote{n}
          \begin{figure}\includegraphics{p.png}\caption{c}\end{figure}
          \chapter{B}\section{S}
          \begin{figure}\includegraphics{q.png}\caption{d}\end{figure}",
    );
    let mut ids = std::collections::HashSet::new();
    fn walk(blocks: &[Block], ids: &mut std::collections::HashSet<String>) {
        for block in blocks {
            match block {
                Block::Header { anchor, .. }
                | Block::Figure { anchor, .. }
                | Block::Table { anchor, .. } => {
                    assert!(ids.insert(anchor.id()), "duplicate {}", anchor.id());
                }
                Block::List { items, .. } => {
                    for item in items {
                        walk(item, ids);
                    }
                }
                _ => {}
            }
        }
    }
    walk(&doc.blocks, &mut ids);
    for (anchor, _) in &doc.meta.notes {
        assert!(ids.insert(anchor.id()), "duplicate {}", anchor.id());
    }
}

#[test]
fn every_label_resolves_to_its_elements_anchor() {
    let doc = convert(
        r"\chapter{A}\label{ch}
          \begin{figure}\includegraphics{p.png}\caption{c}\label{fig}\end{figure}
          \begin{table}\begin{tabular}{l}x\end{tabular}\caption{t}\label{tab}\end{table}",
    );
    assert_eq!(doc.meta.labels["ch"].id(), "sec-1");
    assert_eq!(doc.meta.labels["fig"].id(), "figure-1-1");
    assert_eq!(doc.meta.labels["tab"].id(), "table-1-1");
}

// Re-lexing the detokenised expanded stream yields the same filtered atom
// tree.
#[test]
fn detokenise_relex_round_trip() {
    let input = r"\newcommand{\greet}[1]{Hello #1!}
\section{One}
\greet{world} and $x^2$ --- fine.

A new paragraph with \emph{style}.";
    let mut engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
    engine.push_source("a.tex", input);
    let tokens = engine.tokenize().unwrap();
    let first = atom::filter::filter(atom::parse(tokens.clone()));

    let written = detokenize(&tokens, '\\');
    let mut engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
    engine.push_source("b.tex", &written);
    let relexed = engine.tokenize().unwrap();
    let second = atom::filter::filter(atom::parse(relexed));

    assert_eq!(first, second);
}

#[test]
fn two_documents_convert_independently() {
    let a = convert(r"\chapter{A}\cite{x}");
    let b = convert(r"\chapter{B}\cite{y}");
    assert_eq!(a.meta.citations.len(), 1);
    assert_eq!(b.meta.citations.len(), 1);
    assert!(a.meta.citations.contains_key("x"));
    assert!(b.meta.citations.contains_key("y"));
}
