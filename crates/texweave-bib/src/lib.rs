//! The BibTeX subsystem: a reader for `.bib` databases and a formatter
//! producing the bibliographic records the core consumes.
//!
//! This is a parallel, much simpler pipeline than the TeX front end: the
//! `.bib` grammar is static, so the reader is an ordinary one-pass scanner.
//! Field values are lightly de-TeX-ed for display using the same symbol and
//! diacritic tables the core's syntactic filter uses.

mod format;
mod reader;

pub use format::records;
pub use reader::{read_database, Database, Entry};

/// A parse error with its position in the `.bib` source.
#[derive(Debug)]
pub struct BibError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for BibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for BibError {}
