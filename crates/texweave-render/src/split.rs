//! The multi-file splitter.
//!
//! Cuts the block list at headers up to a maximum level into
//! `section-NNN.xhtml` parts and registers every anchor into the meta's
//! anchor→file map, so cross-file pointers resolve to `file#id` links.

use texweave::doc::{Block, Document, Inline};

/// One output file of a split document.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPart {
    pub file: String,
    pub blocks: Vec<Block>,
}

/// Split at headers of `max_level` or shallower. Returns the parts and
/// updates the document's anchor→file map in place.
pub fn split_at_level(document: &mut Document, max_level: u8) -> Vec<SplitPart> {
    let mut parts: Vec<SplitPart> = Vec::new();
    let mut current: Vec<Block> = Vec::new();
    let mut index = 0usize;
    let file_name = |index: usize| format!["section-{index:03}.xhtml"];
    for block in &document.blocks {
        if let Block::Header { level, .. } = block {
            if *level <= max_level && !current.is_empty() {
                parts.push(SplitPart {
                    file: file_name(index),
                    blocks: std::mem::take(&mut current),
                });
                index += 1;
            }
        }
        current.push(block.clone());
    }
    if !current.is_empty() {
        parts.push(SplitPart {
            file: file_name(index),
            blocks: current,
        });
    }
    for part in &parts {
        for block in &part.blocks {
            register_block(&mut document.meta.anchor_files, &part.file, block);
        }
    }
    parts
}

fn register_block(
    map: &mut std::collections::HashMap<String, String>,
    file: &str,
    block: &Block,
) {
    let mut register = |id: String| {
        if !id.is_empty() {
            map.insert(id, file.to_string());
        }
    };
    match block {
        Block::Header { anchor, .. } => register(anchor.id()),
        Block::Figure { anchor, .. } => register(anchor.id()),
        Block::Table { anchor, .. } => register(anchor.id()),
        Block::AnchorList { items, .. } => {
            for item in items {
                map.insert(item.anchor.id(), file.to_string());
                for block in &item.blocks {
                    register_block(map, file, block);
                }
            }
        }
        Block::BibList(items) => {
            for item in items {
                map.insert(item.anchor.id(), file.to_string());
            }
        }
        Block::List { items, .. } => {
            for item in items {
                for block in item {
                    register_block(map, file, block);
                }
            }
        }
        Block::Quotation(blocks) => {
            for block in blocks {
                register_block(map, file, block);
            }
        }
        Block::Paragraph(inlines) => {
            for inline in inlines {
                register_inline(map, file, inline);
            }
        }
        Block::SimpleTable(_) => {}
    }
}

fn register_inline(
    map: &mut std::collections::HashMap<String, String>,
    file: &str,
    inline: &Inline,
) {
    match inline {
        Inline::Note { anchor, blocks } => {
            map.insert(anchor.id(), file.to_string());
            for block in blocks {
                register_block(map, file, block);
            }
        }
        Inline::Styled(_, children) | Inline::Math(_, children) => {
            for child in children {
                register_inline(map, file, child);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use texweave::engine::{Clock, Engine, Options};

    fn convert(input: &str) -> Document {
        let engine = Engine::with_options(Options::default(), Clock::fixed(2021, 7, 9, 330));
        texweave::convert_with(engine, "test.tex", input, HashMap::new()).unwrap()
    }

    #[test]
    fn splits_at_chapter_level() {
        let mut doc = convert(r"\chapter{A}a\section{Aa}b\chapter{B}c");
        let parts = split_at_level(&mut doc, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].file, "section-000.xhtml");
        assert_eq!(parts[1].file, "section-001.xhtml");
    }

    #[test]
    fn file_names_are_zero_padded() {
        let source: String = (0..12).map(|i| format![r"\chapter{{C{i}}}x"]).collect();
        let mut doc = convert(&source);
        let parts = split_at_level(&mut doc, 2);
        assert_eq!(parts.len(), 12);
        assert_eq!(parts[11].file, "section-011.xhtml");
    }

    #[test]
    fn anchors_map_to_their_files() {
        let mut doc = convert(
            r"\chapter{A}\begin{figure}\includegraphics{p.png}\caption{c}\end{figure}\chapter{B}x",
        );
        split_at_level(&mut doc, 2);
        assert_eq!(
            doc.meta.anchor_files.get("sec-1"),
            Some(&"section-000.xhtml".to_string())
        );
        assert_eq!(
            doc.meta.anchor_files.get("figure-1-1"),
            Some(&"section-000.xhtml".to_string())
        );
        assert_eq!(
            doc.meta.anchor_files.get("sec-2"),
            Some(&"section-001.xhtml".to_string())
        );
    }

    #[test]
    fn leading_content_stays_in_the_first_part() {
        let mut doc = convert(r"intro\chapter{A}x");
        let parts = split_at_level(&mut doc, 2);
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0].blocks[0], Block::Paragraph(_)));
    }
}
