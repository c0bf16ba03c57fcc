//! Renderers over the semantic document tree.
//!
//! Pure functions from (document, meta) to text. The core commits to the
//! document model and the meta state; everything here — element names,
//! attribute conventions, file splitting — is a rendering decision.

mod common;
mod html;
mod split;
mod xml;

pub use html::{HtmlRenderer, HtmlVersion};
pub use split::{split_at_level, SplitPart};
pub use xml::XmlRenderer;
