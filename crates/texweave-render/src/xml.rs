//! The TEI-flavoured XML emitter.

use texweave::doc::{
    Anchor, Block, CiteMode, Document, FontStyle, Inline, ListKind, MathKind, Meta, TableCell,
};

use crate::common::{anchor_number, escape, note_text_anchor, resolve_pointer};

/// Renders a document to a TEI-flavoured XML file.
pub struct XmlRenderer {
    warnings: Vec<String>,
}

impl Default for XmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlRenderer {
    pub fn new() -> XmlRenderer {
        XmlRenderer {
            warnings: Vec::new(),
        }
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn render(&mut self, document: &Document) -> String {
        let meta = &document.meta;
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<TEI xmlns=\"http://www.tei-c.org/ns/1.0\">\n");
        self.header(&mut out, meta);
        out.push_str("<text>\n<body>\n");
        self.sectioned_blocks(&mut out, meta, &document.blocks);
        out.push_str("</body>\n</text>\n</TEI>\n");
        out
    }

    fn header(&mut self, out: &mut String, meta: &Meta) {
        out.push_str("<teiHeader>\n<fileDesc>\n<titleStmt>\n");
        out.push_str("<title>");
        self.inlines(out, meta, &meta.title);
        out.push_str("</title>\n");
        for author in &meta.authors {
            out.push_str("<author>");
            self.inlines(out, meta, author);
            out.push_str("</author>\n");
        }
        out.push_str("</titleStmt>\n<publicationStmt><p/></publicationStmt>\n");
        out.push_str("<sourceDesc><p/></sourceDesc>\n");
        out.push_str("</fileDesc>\n</teiHeader>\n");
    }

    // Headers open nested <div> elements; a header closes every div at its
    // level or deeper before opening its own.
    fn sectioned_blocks(&mut self, out: &mut String, meta: &Meta, blocks: &[Block]) {
        let mut open_levels: Vec<u8> = Vec::new();
        for block in blocks {
            if let Block::Header {
                level,
                anchor,
                inlines,
            } = block
            {
                while open_levels.last().is_some_and(|l| *l >= *level) {
                    open_levels.pop();
                    out.push_str("</div>\n");
                }
                match anchor {
                    Anchor::Document => out.push_str("<div>\n"),
                    _ => out.push_str(&format!["<div xml:id=\"{}\">\n", anchor.id()]),
                }
                open_levels.push(*level);
                let number = anchor_number(anchor);
                if number.is_empty() {
                    out.push_str("<head>");
                } else {
                    out.push_str(&format!["<head n=\"{number}\">"]);
                }
                self.inlines(out, meta, inlines);
                out.push_str("</head>\n");
            } else {
                self.block(out, meta, block);
            }
        }
        for _ in open_levels {
            out.push_str("</div>\n");
        }
    }

    fn blocks(&mut self, out: &mut String, meta: &Meta, blocks: &[Block]) {
        for block in blocks {
            self.block(out, meta, block);
        }
    }

    fn block(&mut self, out: &mut String, meta: &Meta, block: &Block) {
        match block {
            Block::Paragraph(inlines) => {
                out.push_str("<p>");
                self.inlines(out, meta, inlines);
                out.push_str("</p>\n");
            }
            Block::Header {
                anchor, inlines, ..
            } => {
                // A header outside the sectioning pass (e.g. inside a
                // quotation); emitted flat.
                out.push_str(&format!["<head xml:id=\"{}\">", anchor.id()]);
                self.inlines(out, meta, inlines);
                out.push_str("</head>\n");
            }
            Block::List { kind, items } => {
                let rend = match kind {
                    ListKind::Ordered => "numbered",
                    ListKind::Unordered => "bulleted",
                    ListKind::Description => "gloss",
                };
                out.push_str(&format!["<list rend=\"{rend}\">\n"]);
                for item in items {
                    out.push_str("<item>");
                    self.blocks(out, meta, item);
                    out.push_str("</item>\n");
                }
                out.push_str("</list>\n");
            }
            Block::AnchorList { items, .. } => {
                out.push_str("<list rend=\"examples\">\n");
                for item in items {
                    out.push_str(&format![
                        "<item xml:id=\"{}\" n=\"{}\">",
                        item.anchor.id(),
                        anchor_number(&item.anchor)
                    ]);
                    self.blocks(out, meta, &item.blocks);
                    out.push_str("</item>\n");
                }
                out.push_str("</list>\n");
            }
            Block::BibList(items) => {
                out.push_str("<listBibl>\n");
                for item in items {
                    out.push_str(&format![
                        "<bibl xml:id=\"{}\">{}</bibl>\n",
                        item.anchor.id(),
                        escape(&item.text)
                    ]);
                }
                out.push_str("</listBibl>\n");
            }
            Block::Quotation(blocks) => {
                out.push_str("<quote>\n");
                self.blocks(out, meta, blocks);
                out.push_str("</quote>\n");
            }
            Block::Figure {
                anchor,
                media,
                caption,
            } => {
                let file = meta
                    .media
                    .get(media - 1)
                    .map(String::as_str)
                    .unwrap_or("");
                out.push_str(&format![
                    "<figure xml:id=\"{}\">\n<graphic url=\"{}\"/>\n<head>",
                    anchor.id(),
                    escape(file)
                ]);
                self.inlines(out, meta, caption);
                out.push_str("</head>\n</figure>\n");
            }
            Block::Table {
                anchor,
                caption,
                rows,
            } => {
                out.push_str(&format!["<table xml:id=\"{}\">\n<head>", anchor.id()]);
                self.inlines(out, meta, caption);
                out.push_str("</head>\n");
                self.rows(out, meta, rows);
                out.push_str("</table>\n");
            }
            Block::SimpleTable(rows) => {
                out.push_str("<table>\n");
                self.rows(out, meta, rows);
                out.push_str("</table>\n");
            }
        }
    }

    fn rows(&mut self, out: &mut String, meta: &Meta, rows: &[Vec<TableCell>]) {
        for row in rows {
            out.push_str("<row>");
            for cell in row {
                if cell.span > 1 {
                    out.push_str(&format!["<cell cols=\"{}\">", cell.span]);
                } else {
                    out.push_str("<cell>");
                }
                self.inlines(out, meta, &cell.content);
                out.push_str("</cell>");
            }
            out.push_str("</row>\n");
        }
    }

    fn inlines(&mut self, out: &mut String, meta: &Meta, inlines: &[Inline]) {
        for inline in inlines {
            self.inline(out, meta, inline);
        }
    }

    fn inline(&mut self, out: &mut String, meta: &Meta, inline: &Inline) {
        match inline {
            Inline::Str(text) => out.push_str(&escape(text)),
            Inline::Space => out.push(' '),
            Inline::Styled(style, children) => {
                let rend = match style {
                    FontStyle::Emph => "emphasis",
                    FontStyle::Bold => "bold",
                    FontStyle::Italic => "italic",
                    FontStyle::SmallCaps => "smallcaps",
                    FontStyle::Monospace => "typewriter",
                    FontStyle::Superscript => "superscript",
                    FontStyle::Subscript => "subscript",
                    FontStyle::Normal => "upright",
                };
                out.push_str(&format!["<hi rend=\"{rend}\">"]);
                self.inlines(out, meta, children);
                out.push_str("</hi>");
            }
            Inline::Math(kind, children) => {
                let rend = match kind {
                    MathKind::Inline => "inline",
                    MathKind::Display => "display",
                };
                out.push_str(&format!["<formula notation=\"TeX\" rend=\"{rend}\">"]);
                self.inlines(out, meta, children);
                out.push_str("</formula>");
            }
            Inline::Citation(cite) => {
                for (i, single) in cite.cites.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    let text = match meta.bib.get(&single.key) {
                        Some(record) => match cite.mode {
                            CiteMode::Author => record.agents.clone(),
                            CiteMode::Year => record.year.clone(),
                            _ => record.label(),
                        },
                        None => {
                            self.warnings
                                .push(format!["undefined citation key `{}`", single.key]);
                            "???".to_string()
                        }
                    };
                    match meta.citations.get(&single.key) {
                        Some(index) => out.push_str(&format![
                            "<ref target=\"#{}\">{}</ref>",
                            Anchor::Bib { index: *index }.id(),
                            escape(&text)
                        ]),
                        None => out.push_str(&escape(&text)),
                    }
                }
            }
            Inline::Pointer { label, target } => match resolve_pointer(meta, label, target) {
                Some((href, text)) => {
                    out.push_str(&format![
                        "<ref target=\"{}\">{}</ref>",
                        escape(&href),
                        escape(&text)
                    ]);
                }
                None => {
                    self.warnings
                        .push(format!["unresolved reference `{label}`"]);
                    out.push_str("<ref>???</ref>");
                }
            },
            Inline::Note { anchor, blocks } => {
                let number = anchor_number(anchor);
                out.push_str(&format![
                    "<note xml:id=\"{}\" n=\"{number}\">",
                    note_text_anchor(anchor).id()
                ]);
                self.blocks(out, meta, blocks);
                out.push_str("</note>");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use texweave::engine::{Clock, Engine, Options};

    fn render(input: &str) -> String {
        let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        let document =
            texweave::convert_with(engine, "test.tex", input, HashMap::new()).unwrap();
        XmlRenderer::new().render(&document)
    }

    #[test]
    fn tei_skeleton() {
        let xml = render("x");
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<TEI xmlns=\"http://www.tei-c.org/ns/1.0\">"));
        assert!(xml.contains("<body>"));
    }

    #[test]
    fn sections_nest_as_divs() {
        let xml = render(r"\section{A}one\subsection{B}two\section{C}three");
        let expected = "<div xml:id=\"sec-0-1\">\n<head n=\"0.1\">A</head>\n<p>one</p>\n\
                        <div xml:id=\"sec-0-1-1\">\n<head n=\"0.1.1\">B</head>\n<p>two</p>\n\
                        </div>\n</div>\n<div xml:id=\"sec-0-2\">";
        assert!(xml.contains(expected), "got: {xml}");
    }

    #[test]
    fn emphasis_is_hi_rend() {
        let xml = render(r"\emph{word}");
        assert!(xml.contains("<hi rend=\"emphasis\">word</hi>"));
    }

    #[test]
    fn math_formula() {
        let xml = render(r"$x$");
        assert!(xml.contains("<formula notation=\"TeX\" rend=\"inline\">x</formula>"));
    }

    #[test]
    fn pointer_is_a_ref() {
        let xml = render(r"\section{One}\label{l}\ref{l}");
        assert!(xml.contains("<ref target=\"#sec-0-1\">0.1</ref>"));
    }

    #[test]
    fn note_is_inline() {
        let xml = render(r"x\footnote{why}");
        assert!(xml.contains("<note xml:id=\"notetext-0-1\" n=\"0.1\"><p>why</p>\n</note>"));
    }
}
