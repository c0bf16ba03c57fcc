//! The document reader: the LaTeX-profile grammar.
//!
//! A collection of walker parsers that fold the filtered atom tree into the
//! semantic document, threading the [`Meta`] state: section counters,
//! anchors, the label table and the citation map. The error policy is soft:
//! unknown inline commands are dropped (their argument contents are
//! recursed into), unknown block commands are dropped with a warning, and
//! malformed floats are skipped with a warning.

use std::collections::HashMap;

use crate::atom::{text_of, Arg, Atom};
use crate::doc::{
    AnchoredItem, Anchor, BibItem, BibRecord, Block, CiteMode, Document, FontStyle, Inline,
    ListKind, Meta, MultiCite, Region, SingleCite, TableCell, Target,
};
use crate::walker::Cursor;

const SECTION_LEVELS: &[(&str, u8)] = &[
    ("part", 1),
    ("chapter", 2),
    ("section", 3),
    ("subsection", 4),
    ("subsubsection", 5),
    ("paragraph", 6),
    ("subparagraph", 7),
];

// Commands with layout-only meaning; dropped without a warning.
const IGNORED_COMMANDS: &[&str] = &[
    "maketitle",
    "tableofcontents",
    "listoffigures",
    "listoftables",
    "printindex",
    "documentclass",
    "usepackage",
    "pagestyle",
    "thispagestyle",
    "setcounter",
    "setlength",
    "vspace",
    "hspace",
    "noindent",
    "indent",
    "clearpage",
    "cleardoublepage",
    "newpage",
    "bigskip",
    "medskip",
    "smallskip",
    "centering",
    "raggedright",
    "raggedleft",
    "hfill",
    "vfill",
    "relax",
    "hline",
    "toprule",
    "midrule",
    "bottomrule",
];

fn section_level(name: &str) -> Option<u8> {
    SECTION_LEVELS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, level)| *level)
}

/// Read a filtered atom tree into the semantic document.
pub fn read_document(atoms: &[Atom], bib: HashMap<String, BibRecord>) -> Document {
    let reader = Reader { bib };
    let (preamble, body) = split_document(atoms);
    let mut cur = Cursor::new(preamble, Meta::new());
    reader.preamble(&mut cur);
    let meta = cur.into_meta();
    let mut cur = Cursor::new(body, meta);
    let blocks = reader.blocks(&mut cur);
    let mut meta = cur.into_meta();
    meta.bib = reader.bib;
    Document { blocks, meta }
}

// Split at the document environment: everything before it is the preamble.
// Input without one is read as a bare body.
fn split_document(atoms: &[Atom]) -> (&[Atom], &[Atom]) {
    for (index, atom) in atoms.iter().enumerate() {
        if let Atom::Group(name, _, body) = atom {
            if name == "document" {
                return (&atoms[..index], body);
            }
        }
    }
    (&atoms[..0], atoms)
}

struct Reader {
    bib: HashMap<String, BibRecord>,
}

impl Reader {
    // -----------------------------------------------------------------
    // Preamble
    // -----------------------------------------------------------------

    fn preamble(&self, cur: &mut Cursor) {
        while let Some(atom) = cur.peek() {
            match atom {
                Atom::Command(name, args) => {
                    let name = name.clone();
                    let args = args.clone();
                    let _ = cur.item();
                    self.meta_command(cur, &name, &args);
                }
                _ => {
                    let _ = cur.item();
                }
            }
        }
    }

    // \title, \author and friends; also legal mid-document.
    fn meta_command(&self, cur: &mut Cursor, name: &str, args: &[Arg]) -> bool {
        let body = match Atom::required_arg(args, 0) {
            Some(body) => body,
            None => return false,
        };
        match name {
            "title" => cur.meta.title = self.detached_inlines(cur, body),
            "subtitle" => cur.meta.subtitle = self.detached_inlines(cur, body),
            "date" => cur.meta.date = self.detached_inlines(cur, body),
            "author" => {
                let mut authors = Vec::new();
                for segment in
                    body.split(|atom| matches!(atom, Atom::Command(n, _) if n == "and"))
                {
                    let inlines = self.detached_inlines(cur, segment);
                    if !inlines.is_empty() {
                        authors.push(inlines);
                    }
                }
                cur.meta.authors = authors;
            }
            _ => return false,
        }
        true
    }

    // Inlines of a detached slice (an argument body), sharing the meta.
    fn detached_inlines(&self, cur: &mut Cursor, body: &[Atom]) -> Vec<Inline> {
        let meta = std::mem::take(&mut cur.meta);
        let mut sub = Cursor::new(body, meta);
        let inlines = trim_spaces(self.inlines(&mut sub, FontStyle::Normal));
        cur.meta = sub.into_meta();
        inlines
    }

    fn detached_blocks(&self, cur: &mut Cursor, body: &[Atom]) -> Vec<Block> {
        let meta = std::mem::take(&mut cur.meta);
        let mut sub = Cursor::new(body, meta);
        let blocks = self.blocks(&mut sub);
        cur.meta = sub.into_meta();
        blocks
    }

    // -----------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------

    fn blocks(&self, cur: &mut Cursor) -> Vec<Block> {
        self.blocks_until(cur, &|_| false)
    }

    fn blocks_until(&self, cur: &mut Cursor, stop: &dyn Fn(&Atom) -> bool) -> Vec<Block> {
        let mut out = Vec::new();
        loop {
            while matches!(cur.peek(), Some(Atom::White | Atom::Newline | Atom::Par)) {
                let _ = cur.item();
            }
            let atom = match cur.peek() {
                None => break,
                Some(atom) => atom,
            };
            if stop(atom) {
                break;
            }
            let before = cur.progress();
            let blocks = self.block(cur, stop);
            out.extend(blocks);
            if cur.progress() == before {
                // Nothing could make sense of this atom; drop it so the
                // reader always terminates.
                if let Ok(atom) = cur.item() {
                    cur.meta
                        .warn(format!["dropped {}", describe(atom)]);
                }
            }
        }
        out
    }

    fn block(&self, cur: &mut Cursor, stop: &dyn Fn(&Atom) -> bool) -> Vec<Block> {
        let atom = match cur.peek() {
            None => return Vec::new(),
            Some(atom) => atom,
        };
        match atom {
            Atom::Command(name, args) => {
                let name = name.clone();
                if let Some(level) = section_level(&name) {
                    return self.header(cur, &name, level).into_iter().collect();
                }
                match name.as_str() {
                    "frontmatter" => {
                        let _ = cur.item();
                        cur.meta.region = Region::Front;
                        Vec::new()
                    }
                    "mainmatter" => {
                        let _ = cur.item();
                        cur.meta.region = Region::Main;
                        Vec::new()
                    }
                    // \appendix and \backmatter both map to the back
                    // region.
                    "appendix" | "backmatter" => {
                        let _ = cur.item();
                        cur.meta.region = Region::Back;
                        Vec::new()
                    }
                    "title" | "subtitle" | "author" | "date" => {
                        let args = args.clone();
                        let _ = cur.item();
                        self.meta_command(cur, &name, &args);
                        Vec::new()
                    }
                    "label" => {
                        let args = args.clone();
                        let _ = cur.item();
                        self.bind_label(cur, &args);
                        Vec::new()
                    }
                    "bibliography" | "printbibliography" => {
                        let _ = cur.item();
                        vec![self.bib_list(cur)]
                    }
                    _ if IGNORED_COMMANDS.contains(&name.as_str()) => {
                        let _ = cur.item();
                        Vec::new()
                    }
                    _ => {
                        let before = cur.progress();
                        let paragraph = self.paragraph(cur, stop);
                        if paragraph.is_none()
                            && cur.progress() != before
                            && styled_command(&name).is_none()
                        {
                            cur.meta.warn(format![
                                "unknown command \\{name} at block level was dropped"
                            ]);
                        }
                        paragraph.into_iter().collect()
                    }
                }
            }
            Atom::Group(name, _, _) => match name.as_str() {
                "itemize" | "enumerate" | "description" => {
                    self.list(cur).into_iter().collect()
                }
                "exe" => self.example_list(cur).into_iter().collect(),
                "figure" | "figure*" => self.figure(cur).into_iter().collect(),
                "table" | "table*" => self.table(cur).into_iter().collect(),
                "tabular" => self.simple_table(cur).into_iter().collect(),
                "quotation" | "quote" | "abstract" => self.quotation(cur).into_iter().collect(),
                "center" | "flushleft" | "flushright" | "document" => {
                    self.transparent_group(cur)
                }
                "" => self.paragraph(cur, stop).into_iter().collect(),
                _ => {
                    // An unknown environment is read transparently; its
                    // name carries no block semantics we understand.
                    self.transparent_group(cur)
                }
            },
            _ => self.paragraph(cur, stop).into_iter().collect(),
        }
    }

    fn transparent_group(&self, cur: &mut Cursor) -> Vec<Block> {
        match cur.item() {
            Ok(Atom::Group(_, _, body)) => self.detached_blocks(cur, body),
            _ => Vec::new(),
        }
    }

    // -----------------------------------------------------------------
    // Headers and cross-references
    // -----------------------------------------------------------------

    fn header(&self, cur: &mut Cursor, name: &str, level: u8) -> Option<Block> {
        let args = match cur.item() {
            Ok(Atom::Command(_, args)) => args,
            _ => return None,
        };
        let body = match Atom::required_arg(args, 0) {
            Some(body) => body,
            None => {
                cur.meta
                    .warn(format!["\\{name} without a title was dropped"]);
                return None;
            }
        };
        // Section anchors embed the numbers from the chapter level down, so
        // a part heading has no digits of its own; it gets a phantom anchor
        // like the starred forms do.
        let anchor = if Atom::has_star(args) || level == 1 {
            cur.meta.next_phantom()
        } else {
            cur.meta.increment_section(level)
        };
        cur.meta.current_anchor = anchor.clone();
        let inlines = self.detached_inlines(cur, body);
        Some(Block::Header {
            level,
            anchor,
            inlines,
        })
    }

    fn bind_label(&self, cur: &mut Cursor, args: &[Arg]) {
        let key = match Atom::required_arg(args, 0) {
            Some(body) => text_of(body),
            None => return,
        };
        let anchor = cur.meta.current_anchor.clone();
        cur.meta.register_label(key.trim(), anchor);
    }

    // -----------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------

    fn list(&self, cur: &mut Cursor) -> Option<Block> {
        let (name, args_body) = match cur.item() {
            Ok(Atom::Group(name, _, body)) => (name.clone(), body),
            _ => return None,
        };
        let kind = match name.as_str() {
            "enumerate" => ListKind::Ordered,
            "description" => ListKind::Description,
            _ => ListKind::Unordered,
        };
        let meta = std::mem::take(&mut cur.meta);
        let mut sub = Cursor::new(args_body, meta);
        let mut items = Vec::new();
        loop {
            while matches!(sub.peek(), Some(Atom::White | Atom::Newline | Atom::Par)) {
                let _ = sub.item();
            }
            match sub.peek() {
                Some(Atom::Command(n, _)) if n == "item" => {
                    let _ = sub.item();
                    let blocks = self
                        .blocks_until(&mut sub, &|a| matches!(a, Atom::Command(n, _) if n == "item"));
                    items.push(blocks);
                }
                Some(_) => {
                    // Content before the first \item has no home.
                    let _ = sub.item();
                }
                None => break,
            }
        }
        cur.meta = sub.into_meta();
        Some(Block::List { kind, items })
    }

    // Numbered linguistic examples: each item carries an anchor.
    fn example_list(&self, cur: &mut Cursor) -> Option<Block> {
        let body = match cur.item() {
            Ok(Atom::Group(_, _, body)) => body,
            _ => return None,
        };
        let meta = std::mem::take(&mut cur.meta);
        let mut sub = Cursor::new(body, meta);
        sub.meta.enter_example_list();
        let mut items = Vec::new();
        loop {
            while matches!(sub.peek(), Some(Atom::White | Atom::Newline | Atom::Par)) {
                let _ = sub.item();
            }
            match sub.peek() {
                Some(Atom::Command(n, _)) if n == "item" || n == "ex" => {
                    let _ = sub.item();
                    let anchor = sub.meta.next_item();
                    sub.meta.current_anchor = anchor.clone();
                    let blocks = self.blocks_until(&mut sub, &|a| {
                        matches!(a, Atom::Command(n, _) if n == "item" || n == "ex")
                    });
                    items.push(AnchoredItem { anchor, blocks });
                }
                Some(_) => {
                    let _ = sub.item();
                }
                None => break,
            }
        }
        sub.meta.exit_example_list();
        cur.meta = sub.into_meta();
        Some(Block::AnchorList {
            kind: ListKind::Ordered,
            items,
        })
    }

    // -----------------------------------------------------------------
    // Floats
    // -----------------------------------------------------------------

    fn figure(&self, cur: &mut Cursor) -> Option<Block> {
        let body = match cur.item() {
            Ok(Atom::Group(_, _, body)) => body,
            _ => return None,
        };
        let mut media = None;
        let mut caption = None;
        let mut label = None;
        self.scan_float(cur, body, &mut media, &mut caption, &mut label, &mut None);
        let (media, caption) = match (media, caption) {
            (Some(media), Some(caption)) => (media, caption),
            _ => {
                cur.meta
                    .warn("figure without graphics or caption was skipped");
                return None;
            }
        };
        let anchor = cur.meta.next_figure();
        cur.meta.current_anchor = anchor.clone();
        let media = cur.meta.register_media(&media);
        if let Some(key) = label {
            cur.meta.register_label(key.trim(), anchor.clone());
        }
        Some(Block::Figure {
            anchor,
            media,
            caption,
        })
    }

    fn table(&self, cur: &mut Cursor) -> Option<Block> {
        let body = match cur.item() {
            Ok(Atom::Group(_, _, body)) => body,
            _ => return None,
        };
        let mut caption = None;
        let mut label = None;
        let mut rows = None;
        self.scan_float(cur, body, &mut None, &mut caption, &mut label, &mut rows);
        let rows = match rows {
            Some(rows) => rows,
            None => {
                cur.meta.warn("table without a tabular body was skipped");
                return None;
            }
        };
        match caption {
            Some(caption) => {
                let anchor = cur.meta.next_table();
                cur.meta.current_anchor = anchor.clone();
                if let Some(key) = label {
                    cur.meta.register_label(key.trim(), anchor.clone());
                }
                Some(Block::Table {
                    anchor,
                    caption,
                    rows,
                })
            }
            None => Some(Block::SimpleTable(rows)),
        }
    }

    // Collect the pieces of a float body, in any order, looking through
    // centering groups.
    fn scan_float(
        &self,
        cur: &mut Cursor,
        body: &[Atom],
        media: &mut Option<String>,
        caption: &mut Option<Vec<Inline>>,
        label: &mut Option<String>,
        rows: &mut Option<Vec<Vec<TableCell>>>,
    ) {
        for atom in body {
            match atom {
                Atom::Command(name, args) => match name.as_str() {
                    "includegraphics" => {
                        if let Some(arg) = Atom::required_arg(args, 0) {
                            *media = Some(text_of(arg).trim().to_string());
                        }
                    }
                    "caption" => {
                        if let Some(arg) = Atom::required_arg(args, 0) {
                            *caption = Some(self.detached_inlines(cur, arg));
                        }
                    }
                    "label" => {
                        if let Some(arg) = Atom::required_arg(args, 0) {
                            *label = Some(text_of(arg));
                        }
                    }
                    _ => {}
                },
                Atom::Group(name, _, inner) if name == "center" || name.is_empty() => {
                    self.scan_float(cur, inner, media, caption, label, rows);
                }
                Atom::Group(name, _, inner) if name == "tabular" => {
                    let meta = std::mem::take(&mut cur.meta);
                    let mut sub = Cursor::new(inner, meta);
                    *rows = Some(self.table_rows(&mut sub));
                    cur.meta = sub.into_meta();
                }
                _ => {}
            }
        }
    }

    fn simple_table(&self, cur: &mut Cursor) -> Option<Block> {
        let body = match cur.item() {
            Ok(Atom::Group(_, _, body)) => body,
            _ => return None,
        };
        let meta = std::mem::take(&mut cur.meta);
        let mut sub = Cursor::new(body, meta);
        let rows = self.table_rows(&mut sub);
        cur.meta = sub.into_meta();
        Some(Block::SimpleTable(rows))
    }

    // Rows are separated by explicit line breaks, cells by alignment
    // marks.
    fn table_rows(&self, cur: &mut Cursor) -> Vec<Vec<TableCell>> {
        let mut rows: Vec<Vec<TableCell>> = Vec::new();
        let mut row: Vec<TableCell> = Vec::new();
        loop {
            while matches!(cur.peek(), Some(Atom::White | Atom::Par))
                || matches!(cur.peek(), Some(Atom::Command(n, _)) if IGNORED_COMMANDS.contains(&n.as_str()))
            {
                let _ = cur.item();
            }
            match cur.peek() {
                None => break,
                Some(Atom::Newline) => {
                    let _ = cur.item();
                    rows.push(std::mem::take(&mut row));
                    continue;
                }
                Some(Atom::AlignMark) => {
                    // An empty cell.
                    let _ = cur.item();
                    row.push(TableCell::new(Vec::new()));
                    continue;
                }
                Some(Atom::Command(n, _)) if n == "multicolumn" => {
                    let args = match cur.item() {
                        Ok(Atom::Command(_, args)) => args,
                        _ => continue,
                    };
                    let span = Atom::required_arg(args, 0)
                        .map(|b| text_of(b))
                        .and_then(|s| s.trim().parse::<u32>().ok())
                        .unwrap_or(1);
                    let content = Atom::required_arg(args, 2)
                        .map(|b| trim_spaces(self.detached_inlines(cur, b)))
                        .unwrap_or_default();
                    row.push(TableCell { span, content });
                    if matches!(cur.peek(), Some(Atom::AlignMark)) {
                        let _ = cur.item();
                    }
                }
                Some(_) => {
                    // Collect the cell's atoms up to the next separator;
                    // inside a cell a line break would otherwise read as
                    // plain whitespace.
                    let mut cell_atoms: Vec<Atom> = Vec::new();
                    while let Some(atom) = cur.peek() {
                        match atom {
                            Atom::AlignMark | Atom::Newline => break,
                            _ => {
                                cell_atoms.push(atom.clone());
                                let _ = cur.item();
                            }
                        }
                    }
                    let content = trim_spaces(self.detached_inlines(cur, &cell_atoms));
                    row.push(TableCell::new(content));
                    if matches!(cur.peek(), Some(Atom::AlignMark)) {
                        let _ = cur.item();
                    }
                }
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        rows.retain(|row| !row.is_empty());
        rows
    }

    fn quotation(&self, cur: &mut Cursor) -> Option<Block> {
        let body = match cur.item() {
            Ok(Atom::Group(_, _, body)) => body,
            _ => return None,
        };
        Some(Block::Quotation(self.detached_blocks(cur, body)))
    }

    // -----------------------------------------------------------------
    // Bibliography
    // -----------------------------------------------------------------

    fn bib_list(&self, cur: &mut Cursor) -> Block {
        let mut items = Vec::new();
        for (key, index) in cur.meta.citations_in_order() {
            let anchor = Anchor::Bib { index };
            match self.bib.get(&key) {
                Some(record) => items.push(BibItem {
                    anchor,
                    key,
                    label: record.label(),
                    text: record.text.clone(),
                }),
                None => {
                    cur.meta
                        .warn(format!["undefined citation key `{key}`"]);
                    items.push(BibItem {
                        anchor,
                        key,
                        label: "???".into(),
                        text: "???".into(),
                    });
                }
            }
        }
        Block::BibList(items)
    }

    // -----------------------------------------------------------------
    // Inlines
    // -----------------------------------------------------------------

    fn paragraph(&self, cur: &mut Cursor, _stop: &dyn Fn(&Atom) -> bool) -> Option<Block> {
        let inlines = trim_spaces(self.inlines(cur, FontStyle::Normal));
        if inlines.is_empty() {
            None
        } else {
            Some(Block::Paragraph(inlines))
        }
    }

    fn inlines(&self, cur: &mut Cursor, ambient: FontStyle) -> Vec<Inline> {
        let mut out = Vec::new();
        while let Some(atom) = cur.peek() {
            match atom {
                Atom::Par => break,
                Atom::AlignMark => break,
                Atom::White | Atom::Newline => {
                    let _ = cur.item();
                    out.push(Inline::Space);
                }
                Atom::Plain(text) => {
                    let text = text.clone();
                    let _ = cur.item();
                    out.push(Inline::Str(text));
                }
                Atom::Math(kind, body) => {
                    let kind = *kind;
                    let body: &[Atom] = body;
                    let _ = cur.item();
                    let children = self.detached_inlines(cur, body);
                    out.push(Inline::Math(kind, children));
                }
                Atom::SupScript(body) => {
                    let body: &[Atom] = body;
                    let _ = cur.item();
                    let children = self.detached_inlines(cur, body);
                    out.push(Inline::Styled(FontStyle::Superscript, children));
                }
                Atom::SubScript(body) => {
                    let body: &[Atom] = body;
                    let _ = cur.item();
                    let children = self.detached_inlines(cur, body);
                    out.push(Inline::Styled(FontStyle::Subscript, children));
                }
                Atom::Group(name, _, body) if name.is_empty() => {
                    let body: &[Atom] = body;
                    let _ = cur.item();
                    // A brace group scopes font switches but adds no
                    // structure of its own.
                    let meta = std::mem::take(&mut cur.meta);
                    let mut sub = Cursor::new(body, meta);
                    out.extend(self.inlines(&mut sub, ambient));
                    cur.meta = sub.into_meta();
                }
                // A structural environment ends the paragraph.
                Atom::Group(_, _, _) => break,
                Atom::Command(name, args) => {
                    let name = name.clone();
                    let args = args.clone();
                    match self.inline_command(cur, &name, &args, ambient, &mut out) {
                        InlineOutcome::Consumed => {}
                        InlineOutcome::Block => break,
                        InlineOutcome::StyleSwitch(style) => {
                            let _ = cur.item();
                            let rest = self.inlines(cur, style);
                            out.push(Inline::Styled(style, rest));
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn inline_command(
        &self,
        cur: &mut Cursor,
        name: &str,
        args: &[Arg],
        ambient: FontStyle,
        out: &mut Vec<Inline>,
    ) -> InlineOutcome {
        if section_level(name).is_some()
            || matches!(
                name,
                "bibliography"
                    | "printbibliography"
                    | "item"
                    | "ex"
                    | "frontmatter"
                    | "mainmatter"
                    | "appendix"
                    | "backmatter"
            )
        {
            return InlineOutcome::Block;
        }
        if let Some(style) = styled_command(name) {
            let _ = cur.item();
            if let Some(body) = Atom::required_arg(args, 0) {
                let children = self.detached_inlines(cur, body);
                out.push(Inline::Styled(style, children));
            }
            return InlineOutcome::Consumed;
        }
        if let Some(style) = switch_command(name, ambient) {
            return InlineOutcome::StyleSwitch(style);
        }
        if let Some(mode) = cite_mode(name) {
            let _ = cur.item();
            out.push(self.citation(cur, mode, args));
            return InlineOutcome::Consumed;
        }
        if let Some(mode) = multi_cite_mode(name) {
            let _ = cur.item();
            out.push(self.multi_citation(cur, mode));
            return InlineOutcome::Consumed;
        }
        match name {
            "label" => {
                let _ = cur.item();
                self.bind_label(cur, args);
                InlineOutcome::Consumed
            }
            "ref" | "pageref" | "autoref" | "nameref" => {
                let _ = cur.item();
                let key = Atom::required_arg(args, 0)
                    .map(|b| text_of(b))
                    .unwrap_or_default();
                out.push(Inline::Pointer {
                    label: key.trim().to_string(),
                    target: None,
                });
                InlineOutcome::Consumed
            }
            "href" => {
                let _ = cur.item();
                let url = Atom::required_arg(args, 0)
                    .map(|b| text_of(b))
                    .unwrap_or_default();
                let title = Atom::required_arg(args, 1)
                    .map(|b| text_of(b))
                    .unwrap_or_else(|| url.clone());
                out.push(Inline::Pointer {
                    label: String::new(),
                    target: Some(Target::External { title, url }),
                });
                InlineOutcome::Consumed
            }
            "url" => {
                let _ = cur.item();
                let url = Atom::required_arg(args, 0)
                    .map(|b| text_of(b))
                    .unwrap_or_default();
                out.push(Inline::Pointer {
                    label: String::new(),
                    target: Some(Target::External {
                        title: url.clone(),
                        url,
                    }),
                });
                InlineOutcome::Consumed
            }
            "footnote" => {
                let _ = cur.item();
                if let Some(body) = Atom::required_arg(args, 0) {
                    out.push(self.footnote(cur, body));
                }
                InlineOutcome::Consumed
            }
            "title" | "subtitle" | "author" | "date" => {
                let _ = cur.item();
                self.meta_command(cur, name, args);
                InlineOutcome::Consumed
            }
            _ => {
                // Unknown command: silently dropped; its argument contents
                // are kept inline.
                let _ = cur.item();
                for arg in args {
                    if let Arg::Required(body) = arg {
                        out.extend(self.detached_inlines(cur, body));
                    }
                }
                InlineOutcome::Consumed
            }
        }
    }

    fn footnote(&self, cur: &mut Cursor, body: &[Atom]) -> Inline {
        let anchor = cur.meta.next_note();
        let outer_anchor =
            std::mem::replace(&mut cur.meta.current_anchor, anchor.clone());
        let blocks = self.detached_blocks(cur, body);
        cur.meta.current_anchor = outer_anchor;
        cur.meta.notes.push((anchor.clone(), blocks.clone()));
        Inline::Note { anchor, blocks }
    }

    fn citation(&self, cur: &mut Cursor, mode: CiteMode, args: &[Arg]) -> Inline {
        let opts: Vec<&[Atom]> = args
            .iter()
            .filter_map(|arg| match arg {
                Arg::Optional(body) => Some(body.as_slice()),
                _ => None,
            })
            .collect();
        // One optional argument is a postnote; two are prenote, postnote.
        let (prenote, postnote) = match opts.as_slice() {
            [] => (Vec::new(), Vec::new()),
            [post] => (Vec::new(), self.detached_inlines(cur, post)),
            [pre, post, ..] => (
                self.detached_inlines(cur, pre),
                self.detached_inlines(cur, post),
            ),
        };
        let keys = Atom::required_arg(args, 0)
            .map(|b| text_of(b))
            .unwrap_or_default();
        let cites = keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| {
                cur.meta.register_citation(key);
                SingleCite { key: key.into() }
            })
            .collect();
        Inline::Citation(MultiCite {
            mode,
            prenote,
            postnote,
            cites,
        })
    }

    // \cites{a}{b}...: the keys follow as bare groups.
    fn multi_citation(&self, cur: &mut Cursor, mode: CiteMode) -> Inline {
        let mut cites = Vec::new();
        while let Some(Atom::Group(name, _, body)) = cur.peek() {
            if !name.is_empty() {
                break;
            }
            let key = text_of(body).trim().to_string();
            let _ = cur.item();
            if !key.is_empty() {
                cur.meta.register_citation(&key);
                cites.push(SingleCite { key });
            }
        }
        Inline::Citation(MultiCite {
            mode,
            prenote: Vec::new(),
            postnote: Vec::new(),
            cites,
        })
    }
}

enum InlineOutcome {
    /// The command was consumed and handled.
    Consumed,
    /// The command starts a block; the paragraph ends before it.
    Block,
    /// A group-scoped font switch: the rest of the level restyles.
    StyleSwitch(FontStyle),
}

fn styled_command(name: &str) -> Option<FontStyle> {
    match name {
        "emph" => Some(FontStyle::Emph),
        "textbf" => Some(FontStyle::Bold),
        "textit" => Some(FontStyle::Italic),
        "textsc" => Some(FontStyle::SmallCaps),
        "texttt" => Some(FontStyle::Monospace),
        "textrm" | "textup" | "textsl" | "textsf" => Some(FontStyle::Normal),
        "textsuperscript" => Some(FontStyle::Superscript),
        "textsubscript" => Some(FontStyle::Subscript),
        _ => None,
    }
}

// Group-scoped font switches. `\em` toggles: inside emphasis it reverts to
// the normal style.
fn switch_command(name: &str, ambient: FontStyle) -> Option<FontStyle> {
    match name {
        "em" => Some(if ambient == FontStyle::Emph {
            FontStyle::Normal
        } else {
            FontStyle::Emph
        }),
        "rm" | "normalfont" | "upshape" | "rmfamily" => Some(FontStyle::Normal),
        "bf" | "bfseries" => Some(FontStyle::Bold),
        "it" | "itshape" => Some(FontStyle::Italic),
        "sc" | "scshape" => Some(FontStyle::SmallCaps),
        "tt" | "ttfamily" => Some(FontStyle::Monospace),
        _ => None,
    }
}

fn cite_mode(name: &str) -> Option<CiteMode> {
    match name {
        "cite" => Some(CiteMode::Bare),
        "parencite" | "footcite" => Some(CiteMode::Paren),
        "textcite" => Some(CiteMode::Text),
        "citeauthor" => Some(CiteMode::Author),
        "citeyear" => Some(CiteMode::Year),
        _ => None,
    }
}

fn multi_cite_mode(name: &str) -> Option<CiteMode> {
    match name {
        "cites" => Some(CiteMode::Bare),
        "parencites" => Some(CiteMode::Paren),
        "textcites" => Some(CiteMode::Text),
        _ => None,
    }
}

fn trim_spaces(mut inlines: Vec<Inline>) -> Vec<Inline> {
    while matches!(inlines.first(), Some(Inline::Space)) {
        inlines.remove(0);
    }
    while matches!(inlines.last(), Some(Inline::Space)) {
        inlines.pop();
    }
    inlines
}

fn describe(atom: &Atom) -> String {
    match atom {
        Atom::Command(name, _) => format!["unknown command \\{name}"],
        Atom::Group(name, _, _) => format!["environment `{name}`"],
        other => format!["{other:?}"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{filter, parse};
    use crate::doc::MathKind;
    use crate::engine::{Clock, Engine, Options};

    fn read(input: &str) -> Document {
        read_with_bib(input, HashMap::new())
    }

    fn read_with_bib(input: &str, bib: HashMap<String, BibRecord>) -> Document {
        let mut engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        engine.push_source("test.tex", input);
        let tokens = engine.tokenize().expect("lexing should succeed");
        let atoms = filter::filter(parse(tokens));
        read_document(&atoms, bib)
    }

    fn s(text: &str) -> Inline {
        Inline::Str(text.into())
    }

    #[test]
    fn plain_text_becomes_a_paragraph() {
        let doc = read("hello world");
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
    fn blank_lines_split_paragraphs() {
        let doc = read("a\n\nb");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph(vec![s("a")]),
                Block::Paragraph(vec![s("b")]),
            ]
        );
    }

    #[test]
    fn section_counters_nest() {
        let doc = read(r"\section{A}\subsection{B}\section{C}");
        let anchors: Vec<String> = doc
            .blocks
            .iter()
            .map(|b| match b {
                Block::Header { anchor, .. } => anchor.id(),
                other => panic!("expected a header, got {other:?}"),
            })
            .collect();
        assert_eq!(anchors, vec!["sec-0-1", "sec-0-1-1", "sec-0-2"]);
    }

    #[test]
    fn starred_section_gets_a_phantom_anchor() {
        let doc = read(r"\section*{Preface}");
        match &doc.blocks[0] {
            Block::Header { level, anchor, .. } => {
                assert_eq!(*level, 3);
                assert_eq!(anchor.id(), "sec-unnumbered-1");
            }
            other => panic!("expected a header, got {other:?}"),
        }
        assert_eq!(doc.meta.section_numbers, [0; 7]);
    }

    #[test]
    fn parts_get_unique_phantom_anchors() {
        let doc = read(r"\part{One}\chapter{A}\part{Two}\chapter{B}");
        let anchors: Vec<String> = doc
            .blocks
            .iter()
            .map(|b| match b {
                Block::Header { anchor, .. } => anchor.id(),
                other => panic!("expected a header, got {other:?}"),
            })
            .collect();
        assert_eq!(
            anchors,
            vec!["sec-unnumbered-1", "sec-1", "sec-unnumbered-2", "sec-2"]
        );
    }

    #[test]
    fn regions_switch_section_anchors() {
        let doc = read(r"\frontmatter\chapter{Pre}\mainmatter\chapter{One}\appendix\chapter{App}");
        let anchors: Vec<String> = doc
            .blocks
            .iter()
            .map(|b| match b {
                Block::Header { anchor, .. } => anchor.id(),
                other => panic!("expected a header, got {other:?}"),
            })
            .collect();
        assert_eq!(anchors, vec!["sec-front-1", "sec-2", "sec-back-3"]);
    }

    #[test]
    fn document_environment_body_is_read() {
        let doc = read(r"\title{T}\begin{document}body\end{document}");
        assert_eq!(doc.meta.title, vec![s("T")]);
        assert_eq!(doc.blocks, vec![Block::Paragraph(vec![s("body")])]);
    }

    #[test]
    fn authors_split_on_and() {
        let doc = read(r"\author{Ada Lovelace \and Alan Turing}\begin{document}x\end{document}");
        assert_eq!(doc.meta.authors.len(), 2);
        assert_eq!(
            doc.meta.authors[0],
            vec![s("Ada"), Inline::Space, s("Lovelace")]
        );
    }

    #[test]
    fn font_switch_inverts_inside_emphasis() {
        let doc = read(r"{\em one\rm two\em three}");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph(vec![Inline::Styled(
                FontStyle::Emph,
                vec![
                    s("one"),
                    Inline::Styled(
                        FontStyle::Normal,
                        vec![
                            s("two"),
                            Inline::Styled(FontStyle::Emph, vec![s("three")]),
                        ]
                    ),
                ]
            )])]
        );
    }

    #[test]
    fn styled_command_wraps_its_argument() {
        let doc = read(r"\textbf{bold} tail");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph(vec![
                Inline::Styled(FontStyle::Bold, vec![s("bold")]),
                Inline::Space,
                s("tail"),
            ])]
        );
    }

    #[test]
    fn itemize_collects_items() {
        let doc = read(r"\begin{itemize}\item one one\item two\item three\end{itemize}");
        match &doc.blocks[0] {
            Block::List { kind, items } => {
                assert_eq!(*kind, ListKind::Unordered);
                assert_eq!(items.len(), 3);
                assert_eq!(
                    items[0],
                    vec![Block::Paragraph(vec![s("one"), Inline::Space, s("one")])]
                );
                assert_eq!(items[1], vec![Block::Paragraph(vec![s("two")])]);
            }
            other => panic!("expected a list, got {other:?}"),
        }
    }

    #[test]
    fn nested_lists() {
        let doc =
            read(r"\begin{enumerate}\item a\begin{itemize}\item b\end{itemize}\item c\end{enumerate}");
        match &doc.blocks[0] {
            Block::List { kind, items } => {
                assert_eq!(*kind, ListKind::Ordered);
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0][1], Block::List { .. }));
            }
            other => panic!("expected a list, got {other:?}"),
        }
    }

    #[test]
    fn example_items_carry_anchors() {
        let doc = read(r"\chapter{C}\begin{exe}\ex one\ex two\end{exe}");
        match &doc.blocks[1] {
            Block::AnchorList { items, .. } => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].anchor.id(), "item-1-1");
                assert_eq!(items[1].anchor.id(), "item-1-2");
            }
            other => panic!("expected an anchor list, got {other:?}"),
        }
    }

    #[test]
    fn figure_registers_media_and_label() {
        let doc = read(
            r"\chapter{A}\begin{figure}\centering\includegraphics{p.png}\caption{c}\label{f}\end{figure}",
        );
        match &doc.blocks[1] {
            Block::Figure {
                anchor,
                media,
                caption,
            } => {
                assert_eq!(anchor.id(), "figure-1-1");
                assert_eq!(*media, 1);
                assert_eq!(caption, &vec![s("c")]);
            }
            other => panic!("expected a figure, got {other:?}"),
        }
        assert_eq!(doc.meta.media, vec!["p.png".to_string()]);
        assert_eq!(doc.meta.labels["f"].id(), "figure-1-1");
    }

    #[test]
    fn malformed_figure_is_skipped_with_warning() {
        let doc = read(r"\begin{figure}\caption{c}\end{figure}after");
        assert_eq!(doc.blocks, vec![Block::Paragraph(vec![s("after")])]);
        assert!(doc
            .meta
            .warnings
            .iter()
            .any(|w| w.contains("figure")));
    }

    #[test]
    fn bare_tabular_yields_a_simple_table() {
        let doc = read("\\begin{tabular}{ll}a&b\\\\c&d\\end{tabular}");
        match &doc.blocks[0] {
            Block::SimpleTable(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].len(), 2);
                assert_eq!(rows[0][0].content, vec![s("a")]);
                assert_eq!(rows[1][1].content, vec![s("d")]);
            }
            other => panic!("expected a simple table, got {other:?}"),
        }
    }

    #[test]
    fn captioned_table_gets_an_anchor() {
        let doc = read(
            "\\begin{table}\\begin{tabular}{ll}a&b\\end{tabular}\\caption{t}\\label{tab}\\end{table}",
        );
        match &doc.blocks[0] {
            Block::Table {
                anchor, caption, ..
            } => {
                assert_eq!(anchor.id(), "table-0-1");
                assert_eq!(caption, &vec![s("t")]);
            }
            other => panic!("expected a table, got {other:?}"),
        }
        assert_eq!(doc.meta.labels["tab"].id(), "table-0-1");
    }

    #[test]
    fn multicolumn_cells_span() {
        let doc = read("\\begin{tabular}{ll}\\multicolumn{2}{c}{wide}\\\\a&b\\end{tabular}");
        match &doc.blocks[0] {
            Block::SimpleTable(rows) => {
                assert_eq!(rows[0].len(), 1);
                assert_eq!(rows[0][0].span, 2);
                assert_eq!(rows[0][0].content, vec![s("wide")]);
            }
            other => panic!("expected a simple table, got {other:?}"),
        }
    }

    #[test]
    fn footnotes_count_per_chapter() {
        let doc = read(r"\chapter{A}x\footnote{note one}y\footnote{note two}");
        assert_eq!(doc.meta.notes.len(), 2);
        assert_eq!(doc.meta.notes[0].0.id(), "note-1-1");
        assert_eq!(doc.meta.notes[1].0.id(), "note-1-2");
    }

    #[test]
    fn nested_footnotes_flatten() {
        let doc = read(r"a\footnote{x\footnote{y}}");
        assert_eq!(doc.meta.notes.len(), 2);
        assert_eq!(doc.meta.notes[0].0.id(), "note-0-2");
        assert_eq!(doc.meta.notes[1].0.id(), "note-0-1");
    }

    #[test]
    fn citation_registers_keys_in_order() {
        let doc = read(r"\cite{b}\cite{a}\cite{b}");
        assert_eq!(doc.meta.citations["b"], 1);
        assert_eq!(doc.meta.citations["a"], 2);
    }

    #[test]
    fn citation_notes() {
        let doc = read(r"\parencite[see][p. 7]{key}");
        match &doc.blocks[0] {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Citation(cite) => {
                    assert_eq!(cite.mode, CiteMode::Paren);
                    assert_eq!(cite.prenote, vec![s("see")]);
                    assert_eq!(cite.postnote, vec![s("p."), Inline::Space, s("7")]);
                    assert_eq!(cite.cites, vec![SingleCite { key: "key".into() }]);
                }
                other => panic!("expected a citation, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn multicite_collects_trailing_groups() {
        let doc = read(r"\cites{a}{b}{c}");
        match &doc.blocks[0] {
            Block::Paragraph(inlines) => match &inlines[0] {
                Inline::Citation(cite) => {
                    let keys: Vec<&str> = cite.cites.iter().map(|c| c.key.as_str()).collect();
                    assert_eq!(keys, vec!["a", "b", "c"]);
                }
                other => panic!("expected a citation, got {other:?}"),
            },
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn bibliography_lists_cited_entries_in_order() {
        let mut bib = HashMap::new();
        bib.insert(
            "smith20".to_string(),
            BibRecord {
                key: "smith20".into(),
                agents: "Smith".into(),
                year: "2020".into(),
                text: "Smith, J. 2020. A book.".into(),
            },
        );
        let doc = read_with_bib(r"\cite{smith20}\printbibliography", bib);
        match doc.blocks.last().unwrap() {
            Block::BibList(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].anchor.id(), "bib-1");
                assert_eq!(items[0].label, "Smith 2020");
            }
            other => panic!("expected a bibliography, got {other:?}"),
        }
    }

    #[test]
    fn undefined_citation_key_renders_placeholder() {
        let doc = read(r"\cite{nope}\printbibliography");
        match doc.blocks.last().unwrap() {
            Block::BibList(items) => {
                assert_eq!(items[0].label, "???");
            }
            other => panic!("expected a bibliography, got {other:?}"),
        }
        assert!(doc.meta.warnings.iter().any(|w| w.contains("nope")));
    }

    #[test]
    fn pointers_stay_unresolved_in_the_tree() {
        let doc = read(r"\section{One}\label{l}\ref{l}");
        assert_eq!(doc.meta.labels["l"].id(), "sec-0-1");
        match &doc.blocks[1] {
            Block::Paragraph(inlines) => {
                assert_eq!(
                    inlines[0],
                    Inline::Pointer {
                        label: "l".into(),
                        target: None,
                    }
                );
            }
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn hyperlinks_resolve_externally() {
        let doc = read(r"\href{http://x.y}{text} \url{http://z.w}");
        match &doc.blocks[0] {
            Block::Paragraph(inlines) => {
                assert_eq!(
                    inlines[0],
                    Inline::Pointer {
                        label: String::new(),
                        target: Some(Target::External {
                            title: "text".into(),
                            url: "http://x.y".into(),
                        }),
                    }
                );
                assert_eq!(
                    inlines[2],
                    Inline::Pointer {
                        label: String::new(),
                        target: Some(Target::External {
                            title: "http://z.w".into(),
                            url: "http://z.w".into(),
                        }),
                    }
                );
            }
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn label_before_any_element_binds_to_the_document() {
        let doc = read(r"\label{top}text");
        assert_eq!(doc.meta.labels["top"], Anchor::Document);
    }

    #[test]
    fn quotation_becomes_a_block() {
        let doc = read(r"\begin{quotation}q\end{quotation}");
        assert_eq!(
            doc.blocks,
            vec![Block::Quotation(vec![Block::Paragraph(vec![s("q")])])]
        );
    }

    #[test]
    fn math_becomes_an_inline() {
        let doc = read(r"$\alpha+1$");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph(vec![Inline::Math(
                MathKind::Inline,
                vec![s("\u{03B1}+1")]
            )])]
        );
    }

    #[test]
    fn empty_input_yields_an_empty_document() {
        assert!(read("").blocks.is_empty());
        assert!(read("% only comments").blocks.is_empty());
        assert!(read(r"\par").blocks.is_empty());
    }

    #[test]
    fn unknown_inline_command_contents_survive() {
        let doc = read(r"a \mystery{kept} b");
        assert_eq!(
            doc.blocks,
            vec![Block::Paragraph(vec![
                s("a"),
                Inline::Space,
                s("kept"),
                Inline::Space,
                s("b"),
            ])]
        );
    }

    #[test]
    fn anchor_identifiers_are_unique() {
        let doc = read(
            r"\chapter{A}\section{B}\begin{figure}\includegraphics{a.png}\caption{x}\end{figure}x\footnote{n}\chapter{C}\begin{figure}\includegraphics{b.png}\caption{y}\end{figure}",
        );
        let mut seen = std::collections::HashSet::new();
        for block in &doc.blocks {
            let id = match block {
                Block::Header { anchor, .. } => anchor.id(),
                Block::Figure { anchor, .. } => anchor.id(),
                _ => continue,
            };
            assert!(seen.insert(id.clone()), "duplicate anchor {id}");
        }
    }
}
