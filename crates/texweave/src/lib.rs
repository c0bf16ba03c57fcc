//! A TeX front end.
//!
//! texweave converts TeX source into a structured document model from which
//! HTML or TEI-flavoured XML can be rendered. TeX is not a context-free
//! language: the meaning of every character depends on a mutable category
//! code table, and the input can redefine commands mid-stream. The pipeline
//! therefore interleaves lexing, macro expansion and parsing while
//! threading mutable state:
//!
//! 1. [`engine`] — a catcode-driven lexer with an integrated macro
//!    expander, executing TeX's definitional primitives on the fly;
//! 2. [`atom`] — a structural parser folding the token stream into a tree
//!    of atoms, and a syntactic filter normalising it;
//! 3. [`reader`] — a backtracking [`walker`] grammar over the atom tree
//!    that yields the semantic [`doc`] model.
//!
//! Data flows strictly forward (characters → tokens → atoms → document),
//! and state flows with it; there is no back-channel.

pub mod atom;
pub mod doc;
pub mod engine;
pub mod error;
pub mod reader;
pub mod token;
pub mod walker;

use std::collections::HashMap;

pub use doc::{BibRecord, Block, Document, Inline, Meta};
pub use engine::{Clock, Engine, Options};
pub use error::Error;

/// Convert a TeX source to the semantic document, using the real file
/// system and clock.
pub fn convert(
    file_name: &str,
    source: &str,
    bib: HashMap<String, BibRecord>,
) -> error::Result<Document> {
    convert_with(Engine::new(), file_name, source, bib)
}

/// Convert using a prepared engine, for callers that need a fixed clock,
/// an in-memory file system, or tuned limits.
pub fn convert_with(
    mut engine: Engine,
    file_name: &str,
    source: &str,
    bib: HashMap<String, BibRecord>,
) -> error::Result<Document> {
    engine.push_source(file_name, source);
    let tokens = engine.tokenize()?;
    let engine_warnings = engine.take_warnings();
    let atoms = atom::filter::filter(atom::parse(tokens));
    let mut document = reader::read_document(&atoms, bib);
    let mut warnings = engine_warnings;
    warnings.append(&mut document.meta.warnings);
    document.meta.warnings = warnings;
    Ok(document)
}
