//! The XHTML emitter.

use texweave::doc::{
    inline_text, Anchor, Block, CiteMode, Document, FontStyle, Inline, ListKind, MathKind, Meta,
};

use crate::common::{anchor_number, escape, href_for, note_text_anchor, resolve_pointer};

/// Which XHTML profile to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlVersion {
    #[default]
    Xhtml5,
    Xhtml1,
}

/// Renders a document to a single XHTML page.
pub struct HtmlRenderer {
    version: HtmlVersion,
    warnings: Vec<String>,
}

impl HtmlRenderer {
    pub fn new(version: HtmlVersion) -> HtmlRenderer {
        HtmlRenderer {
            version,
            warnings: Vec::new(),
        }
    }

    /// Warnings produced while rendering (unresolved pointers, undefined
    /// citation keys).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn render(&mut self, document: &Document) -> String {
        let meta = &document.meta;
        let mut out = String::new();
        match self.version {
            HtmlVersion::Xhtml5 => {
                out.push_str("<!DOCTYPE html>\n");
                out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n");
                out.push_str("<meta charset=\"utf-8\"/>\n");
            }
            HtmlVersion::Xhtml1 => {
                out.push_str(concat![
                    "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" ",
                    "\"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n",
                ]);
                out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n");
                out.push_str(concat![
                    "<meta http-equiv=\"Content-Type\" ",
                    "content=\"text/html; charset=utf-8\"/>\n",
                ]);
            }
        }
        out.push_str(&format![
            "<title>{}</title>\n</head>\n<body>\n",
            escape(&inline_text(&meta.title))
        ]);
        if !meta.title.is_empty() {
            out.push_str("<header>\n<h1 class=\"title\">");
            self.inlines(&mut out, meta, &meta.title);
            out.push_str("</h1>\n");
            if !meta.subtitle.is_empty() {
                out.push_str("<p class=\"subtitle\">");
                self.inlines(&mut out, meta, &meta.subtitle);
                out.push_str("</p>\n");
            }
            for author in &meta.authors {
                out.push_str("<p class=\"author\">");
                self.inlines(&mut out, meta, author);
                out.push_str("</p>\n");
            }
            if !meta.date.is_empty() {
                out.push_str("<p class=\"date\">");
                self.inlines(&mut out, meta, &meta.date);
                out.push_str("</p>\n");
            }
            out.push_str("</header>\n");
        }
        self.blocks(&mut out, meta, &document.blocks);
        self.footnotes(&mut out, meta);
        out.push_str("</body>\n</html>\n");
        out
    }

    /// Render a block sequence only, for multi-file output parts.
    pub fn render_blocks(&mut self, meta: &Meta, blocks: &[Block]) -> String {
        let mut out = String::new();
        self.blocks(&mut out, meta, blocks);
        out
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
                level,
                anchor,
                inlines,
            } => {
                let h = (*level).clamp(1, 6);
                out.push_str(&format!["<h{h} id=\"{}\">", anchor.id()]);
                let number = anchor_number(anchor);
                if !number.is_empty() {
                    out.push_str(&format!["<span class=\"number\">{number}</span> "]);
                }
                self.inlines(out, meta, inlines);
                out.push_str(&format!["</h{h}>\n"]);
            }
            Block::List { kind, items } => {
                let tag = match kind {
                    ListKind::Ordered => "ol",
                    _ => "ul",
                };
                out.push_str(&format!["<{tag}>\n"]);
                for item in items {
                    out.push_str("<li>");
                    self.blocks(out, meta, item);
                    out.push_str("</li>\n");
                }
                out.push_str(&format!["</{tag}>\n"]);
            }
            Block::AnchorList { items, .. } => {
                out.push_str("<ol class=\"examples\">\n");
                for item in items {
                    out.push_str(&format!["<li id=\"{}\">", item.anchor.id()]);
                    self.blocks(out, meta, &item.blocks);
                    out.push_str("</li>\n");
                }
                out.push_str("</ol>\n");
            }
            Block::BibList(items) => {
                out.push_str("<ol class=\"bibliography\">\n");
                for item in items {
                    out.push_str(&format![
                        "<li id=\"{}\">{}</li>\n",
                        item.anchor.id(),
                        escape(&item.text)
                    ]);
                }
                out.push_str("</ol>\n");
            }
            Block::Quotation(blocks) => {
                out.push_str("<blockquote>\n");
                self.blocks(out, meta, blocks);
                out.push_str("</blockquote>\n");
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
                    "<figure id=\"{}\">\n<img src=\"{}\" alt=\"\"/>\n<figcaption>Figure {}: ",
                    anchor.id(),
                    escape(file),
                    anchor_number(anchor)
                ]);
                self.inlines(out, meta, caption);
                out.push_str("</figcaption>\n</figure>\n");
            }
            Block::Table {
                anchor,
                caption,
                rows,
            } => {
                out.push_str(&format!["<table id=\"{}\">\n<caption>Table {}: ", anchor.id(), anchor_number(anchor)]);
                self.inlines(out, meta, caption);
                out.push_str("</caption>\n");
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

    fn rows(
        &mut self,
        out: &mut String,
        meta: &Meta,
        rows: &[Vec<texweave::doc::TableCell>],
    ) {
        for row in rows {
            out.push_str("<tr>");
            for cell in row {
                if cell.span > 1 {
                    out.push_str(&format!["<td colspan=\"{}\">", cell.span]);
                } else {
                    out.push_str("<td>");
                }
                self.inlines(out, meta, &cell.content);
                out.push_str("</td>");
            }
            out.push_str("</tr>\n");
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
                let (open, close) = match style {
                    FontStyle::Emph => ("<em>", "</em>"),
                    FontStyle::Bold => ("<strong>", "</strong>"),
                    FontStyle::Italic => ("<i>", "</i>"),
                    FontStyle::SmallCaps => ("<span class=\"smallcaps\">", "</span>"),
                    FontStyle::Monospace => ("<code>", "</code>"),
                    FontStyle::Superscript => ("<sup>", "</sup>"),
                    FontStyle::Subscript => ("<sub>", "</sub>"),
                    FontStyle::Normal => ("<span class=\"upright\">", "</span>"),
                };
                out.push_str(open);
                self.inlines(out, meta, children);
                out.push_str(close);
            }
            Inline::Math(kind, children) => {
                let class = match kind {
                    MathKind::Inline => "math inline",
                    MathKind::Display => "math display",
                };
                out.push_str(&format!["<span class=\"{class}\">"]);
                self.inlines(out, meta, children);
                out.push_str("</span>");
            }
            Inline::Citation(cite) => self.citation(out, meta, cite),
            Inline::Pointer { label, target } => {
                match resolve_pointer(meta, label, target) {
                    Some((href, text)) => {
                        out.push_str(&format![
                            "<a href=\"{}\">{}</a>",
                            escape(&href),
                            escape(&text)
                        ]);
                    }
                    None => {
                        self.warnings
                            .push(format!["unresolved reference `{label}`"]);
                        out.push_str("<span class=\"unresolved\">???</span>");
                    }
                }
            }
            Inline::Note { anchor, .. } => {
                let text_anchor = note_text_anchor(anchor);
                let number = match anchor {
                    Anchor::Note { index, .. } => index.to_string(),
                    _ => String::new(),
                };
                out.push_str(&format![
                    "<a id=\"{}\" class=\"note-mark\" href=\"{}\"><sup>{number}</sup></a>",
                    anchor.id(),
                    href_for(meta, &text_anchor.id())
                ]);
            }
        }
    }

    fn citation(&mut self, out: &mut String, meta: &Meta, cite: &texweave::doc::MultiCite) {
        let mut rendered: Vec<String> = Vec::new();
        for single in &cite.cites {
            let record = meta.bib.get(&single.key);
            let text = match (cite.mode, record) {
                (_, None) => {
                    self.warnings
                        .push(format!["undefined citation key `{}`", single.key]);
                    "???".to_string()
                }
                (CiteMode::Author, Some(record)) => record.agents.clone(),
                (CiteMode::Year, Some(record)) => record.year.clone(),
                (CiteMode::Text, Some(record)) => {
                    format!["{} ({})", record.agents, record.year]
                }
                (_, Some(record)) => record.label(),
            };
            let linked = match meta.citations.get(&single.key) {
                Some(index) => {
                    let id = Anchor::Bib { index: *index }.id();
                    format![
                        "<a href=\"{}\">{}</a>",
                        escape(&href_for(meta, &id)),
                        escape(&text)
                    ]
                }
                None => escape(&text),
            };
            rendered.push(linked);
        }
        let mut body = String::new();
        if !cite.prenote.is_empty() {
            self.inlines(&mut body, meta, &cite.prenote);
            body.push(' ');
        }
        body.push_str(&rendered.join("; "));
        if !cite.postnote.is_empty() {
            body.push_str(", ");
            self.inlines(&mut body, meta, &cite.postnote);
        }
        match cite.mode {
            CiteMode::Paren => {
                out.push('(');
                out.push_str(&body);
                out.push(')');
            }
            _ => out.push_str(&body),
        }
    }

    fn footnotes(&mut self, out: &mut String, meta: &Meta) {
        if meta.notes.is_empty() {
            return;
        }
        out.push_str("<section class=\"footnotes\">\n<ol>\n");
        for (anchor, blocks) in &meta.notes {
            let text_anchor = note_text_anchor(anchor);
            out.push_str(&format!["<li id=\"{}\">", text_anchor.id()]);
            self.blocks(out, meta, blocks);
            out.push_str(&format![
                "<a class=\"note-back\" href=\"{}\">\u{21A9}</a></li>\n",
                href_for(meta, &anchor.id())
            ]);
        }
        out.push_str("</ol>\n</section>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use texweave::doc::BibRecord;
    use texweave::engine::{Clock, Engine, Options};

    fn render(input: &str) -> String {
        render_with_bib(input, HashMap::new())
    }

    fn render_with_bib(input: &str, bib: HashMap<String, BibRecord>) -> String {
        let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        let document = texweave::convert_with(engine, "test.tex", input, bib).unwrap();
        HtmlRenderer::new(HtmlVersion::Xhtml5).render(&document)
    }

    #[test]
    fn paragraph_markup() {
        let html = render("hello world");
        assert!(html.contains("<p>hello world</p>"));
    }

    #[test]
    fn header_has_anchor_id() {
        let html = render(r"\section{One}");
        assert!(html.contains("<h3 id=\"sec-0-1\">"));
        assert!(html.contains("One</h3>"));
    }

    #[test]
    fn resolved_pointer_links_to_anchor() {
        let html = render(r"\section{One}\label{l}\ref{l}");
        assert!(html.contains("<a href=\"#sec-0-1\">0.1</a>"));
    }

    #[test]
    fn unresolved_pointer_renders_placeholder() {
        let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        let document =
            texweave::convert_with(engine, "test.tex", r"\ref{ghost}", HashMap::new()).unwrap();
        let mut renderer = HtmlRenderer::new(HtmlVersion::Xhtml5);
        let html = renderer.render(&document);
        assert!(html.contains("???"));
        assert!(renderer
            .take_warnings()
            .iter()
            .any(|w| w.contains("ghost")));
    }

    #[test]
    fn figure_markup_resolves_media() {
        let html = render(
            r"\chapter{A}\begin{figure}\includegraphics{p.png}\caption{c}\label{f}\end{figure}\ref{f}",
        );
        assert!(html.contains("<figure id=\"figure-1-1\">"));
        assert!(html.contains("<img src=\"p.png\""));
        assert!(html.contains("Figure 1.1: c"));
        assert!(html.contains("<a href=\"#figure-1-1\">1.1</a>"));
    }

    #[test]
    fn citation_renders_label_and_bib_link() {
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
        let html = render_with_bib(r"\cite{smith20}\printbibliography", bib);
        assert!(html.contains("<a href=\"#bib-1\">Smith 2020</a>"));
        assert!(html.contains("<li id=\"bib-1\">Smith, J. (2020). A book.</li>"));
    }

    #[test]
    fn footnote_mark_and_body_link_both_ways() {
        let html = render(r"x\footnote{the note}");
        assert!(html.contains("<a id=\"note-0-1\" class=\"note-mark\" href=\"#notetext-0-1\">"));
        assert!(html.contains("<li id=\"notetext-0-1\">"));
        assert!(html.contains("href=\"#note-0-1\""));
    }

    #[test]
    fn escaping_applies_to_text() {
        let html = render(r"a \& b");
        assert!(html.contains("a &amp; b"));
    }

    #[test]
    fn xhtml1_doctype() {
        let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        let document = texweave::convert_with(engine, "test.tex", "x", HashMap::new()).unwrap();
        let html = HtmlRenderer::new(HtmlVersion::Xhtml1).render(&document);
        assert!(html.contains("XHTML 1.0 Strict"));
    }

    #[test]
    fn lists_render_items() {
        let html = render(r"\begin{enumerate}\item a\item b\end{enumerate}");
        assert!(html.contains("<ol>"));
        assert_eq!(html.matches("<li>").count(), 2);
    }
}
