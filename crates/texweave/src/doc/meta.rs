//! Document meta state.
//!
//! One owned record threaded by the walker: counters, the label and media
//! tables, the citation map, the current anchor. There are no globals, so
//! two documents can be converted side by side from separate values.

use std::collections::HashMap;

use super::anchor::{Anchor, Region};
use super::{BibRecord, Block, Inline};

/// The mutable accumulator of the document reader.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    pub title: Vec<Inline>,
    pub subtitle: Vec<Inline>,
    pub authors: Vec<Vec<Inline>>,
    pub date: Vec<Inline>,

    pub region: Region,
    /// Section counters for levels 1 (part) through 7 (subparagraph).
    pub section_numbers: [u32; 7],
    phantom_count: u32,
    figure_count: u32,
    table_count: u32,
    note_count: u32,
    /// Outermost example-item counter; deeper levels live on `item_path`.
    item_count: u32,
    item_path: Vec<u32>,
    citation_count: u32,

    /// The element a `\label` binds to.
    pub current_anchor: Anchor,
    /// Label → anchor. First writer wins.
    pub labels: HashMap<String, Anchor>,
    /// Anchor identifier → output file, for multi-file output.
    pub anchor_files: HashMap<String, String>,
    /// Registered media files; a media identifier is an index here plus 1.
    pub media: Vec<String>,
    /// Citation key → first-occurrence index (1-based).
    pub citations: HashMap<String, u32>,
    /// The bibliographic database, keyed by citation key.
    pub bib: HashMap<String, BibRecord>,
    /// Footnote bodies in document order.
    pub notes: Vec<(Anchor, Vec<Block>)>,

    pub warnings: Vec<String>,
}

impl Meta {
    pub fn new() -> Meta {
        Meta::default()
    }

    /// The current chapter number (level 2).
    pub fn chapter(&self) -> u32 {
        self.section_numbers[1]
    }

    /// Increment the section counter at `level` (1-7), zeroing all deeper
    /// levels, and mint the heading's anchor. Incrementing the chapter
    /// level resets the chapter-scoped element counters.
    pub fn increment_section(&mut self, level: u8) -> Anchor {
        let level = level as usize;
        debug_assert!((1..=7).contains(&level));
        self.section_numbers[level - 1] += 1;
        for deeper in level..7 {
            self.section_numbers[deeper] = 0;
        }
        if level == 2 {
            self.figure_count = 0;
            self.table_count = 0;
            self.note_count = 0;
            self.item_count = 0;
        }
        Anchor::Section {
            region: self.region,
            numbers: self.section_numbers[1..].to_vec(),
        }
    }

    /// Mint the anchor of an unnumbered heading.
    pub fn next_phantom(&mut self) -> Anchor {
        self.phantom_count += 1;
        Anchor::Phantom {
            region: self.region,
            index: self.phantom_count,
        }
    }

    pub fn next_figure(&mut self) -> Anchor {
        self.figure_count += 1;
        Anchor::Figure {
            chapter: self.chapter(),
            index: self.figure_count,
        }
    }

    pub fn next_table(&mut self) -> Anchor {
        self.table_count += 1;
        Anchor::Table {
            chapter: self.chapter(),
            index: self.table_count,
        }
    }

    pub fn next_note(&mut self) -> Anchor {
        self.note_count += 1;
        Anchor::Note {
            chapter: self.chapter(),
            index: self.note_count,
        }
    }

    /// Enter a (possibly nested) example list.
    pub fn enter_example_list(&mut self) {
        if self.item_path.is_empty() {
            self.item_path.push(self.item_count);
        } else {
            self.item_path.push(0);
        }
    }

    /// Mint the anchor of the next example item at the current nesting.
    pub fn next_item(&mut self) -> Anchor {
        if let Some(last) = self.item_path.last_mut() {
            *last += 1;
        }
        Anchor::Item {
            chapter: self.chapter(),
            path: self.item_path.clone(),
        }
    }

    pub fn exit_example_list(&mut self) {
        if let Some(count) = self.item_path.pop() {
            if self.item_path.is_empty() {
                self.item_count = count;
            }
        }
    }

    /// Bind a label to an anchor. The first definition wins; later ones are
    /// ignored with a warning.
    pub fn register_label(&mut self, key: &str, anchor: Anchor) {
        if self.labels.contains_key(key) {
            self.warnings
                .push(format!["duplicate label `{key}` ignored"]);
            return;
        }
        self.labels.insert(key.into(), anchor);
    }

    /// Register a citation key; returns its first-occurrence index
    /// (1-based). Re-registration is a no-op.
    pub fn register_citation(&mut self, key: &str) -> u32 {
        if let Some(index) = self.citations.get(key) {
            return *index;
        }
        self.citation_count += 1;
        self.citations.insert(key.into(), self.citation_count);
        self.citation_count
    }

    /// Register a media file; returns its identifier (1-based).
    pub fn register_media(&mut self, path: &str) -> usize {
        self.media.push(path.into());
        self.media.len()
    }

    pub fn warn<S: Into<String>>(&mut self, message: S) {
        self.warnings.push(message.into());
    }

    /// Citation keys ordered by first occurrence.
    pub fn citations_in_order(&self) -> Vec<(String, u32)> {
        let mut pairs: Vec<(String, u32)> = self
            .citations
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        pairs.sort_by_key(|(_, index)| *index);
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_increment_zeroes_deeper_levels() {
        let mut meta = Meta::new();
        meta.increment_section(3);
        meta.increment_section(4);
        let anchor = meta.increment_section(3);
        assert_eq!(meta.section_numbers, [0, 0, 2, 0, 0, 0, 0]);
        assert_eq!(anchor.id(), "sec-0-2");
    }

    #[test]
    fn chapter_increment_resets_element_counters() {
        let mut meta = Meta::new();
        meta.increment_section(2);
        meta.next_figure();
        meta.next_note();
        assert_eq!(meta.next_figure().id(), "figure-1-2");
        meta.increment_section(2);
        assert_eq!(meta.next_figure().id(), "figure-2-1");
        assert_eq!(meta.next_note().id(), "note-2-1");
    }

    #[test]
    fn figure_counter_is_strictly_increasing() {
        let mut meta = Meta::new();
        meta.increment_section(2);
        for expected in 1..5u32 {
            assert_eq!(
                meta.next_figure(),
                Anchor::Figure {
                    chapter: 1,
                    index: expected
                }
            );
        }
    }

    #[test]
    fn first_label_wins() {
        let mut meta = Meta::new();
        let first = meta.next_figure();
        let second = meta.next_figure();
        meta.register_label("fig", first.clone());
        meta.register_label("fig", second);
        assert_eq!(meta.labels["fig"], first);
        assert_eq!(meta.warnings.len(), 1);
    }

    #[test]
    fn citation_keys_keep_first_occurrence_index() {
        let mut meta = Meta::new();
        assert_eq!(meta.register_citation("a"), 1);
        assert_eq!(meta.register_citation("b"), 2);
        assert_eq!(meta.register_citation("a"), 1);
        assert_eq!(meta.register_citation("c"), 3);
    }

    #[test]
    fn example_items_nest_outermost_first() {
        let mut meta = Meta::new();
        meta.increment_section(2);
        meta.enter_example_list();
        assert_eq!(meta.next_item().id(), "item-1-1");
        meta.enter_example_list();
        assert_eq!(meta.next_item().id(), "item-1-1-1");
        assert_eq!(meta.next_item().id(), "item-1-1-2");
        meta.exit_example_list();
        assert_eq!(meta.next_item().id(), "item-1-2");
        meta.exit_example_list();
        // Numbering continues in the next list of the same chapter.
        meta.enter_example_list();
        assert_eq!(meta.next_item().id(), "item-1-3");
        meta.exit_example_list();
    }

    #[test]
    fn media_identifiers_are_one_based() {
        let mut meta = Meta::new();
        assert_eq!(meta.register_media("a.png"), 1);
        assert_eq!(meta.register_media("b.png"), 2);
    }
}
