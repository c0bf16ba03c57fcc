//! Pieces shared by both renderers.

use texweave::doc::{Anchor, Meta, Target};

/// Escape text content for markup output.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// The display number of an anchor, used as the text of resolved pointers.
pub fn anchor_number(anchor: &Anchor) -> String {
    match anchor {
        Anchor::Document => String::new(),
        Anchor::Section { numbers, .. } => {
            let mut numbers = numbers.clone();
            while numbers.len() > 1 && numbers.last() == Some(&0) {
                numbers.pop();
            }
            numbers
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".")
        }
        Anchor::Phantom { .. } => String::new(),
        Anchor::Figure { chapter, index }
        | Anchor::Table { chapter, index }
        | Anchor::Note { chapter, index }
        | Anchor::NoteText { chapter, index } => format!["{chapter}.{index}"],
        Anchor::Item { path, .. } => path
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("."),
        Anchor::Bib { index } => index.to_string(),
    }
}

/// Where a link to `id` points, honouring the anchor→file map built for
/// multi-file output.
pub fn href_for(meta: &Meta, id: &str) -> String {
    match meta.anchor_files.get(id) {
        Some(file) => format!["{file}#{id}"],
        None => format!["#{id}"],
    }
}

/// Resolve an internal pointer target to (href, text), if the label is
/// known.
pub fn resolve_pointer<'a>(
    meta: &'a Meta,
    label: &str,
    target: &'a Option<Target>,
) -> Option<(String, String)> {
    match target {
        Some(Target::External { title, url }) => Some((url.clone(), title.clone())),
        Some(Target::Internal(anchor)) => {
            Some((href_for(meta, &anchor.id()), anchor_number(anchor)))
        }
        None => {
            let anchor = meta.labels.get(label)?;
            Some((href_for(meta, &anchor.id()), anchor_number(anchor)))
        }
    }
}

/// The anchor of a footnote body, derived from its mark's anchor.
pub fn note_text_anchor(anchor: &Anchor) -> Anchor {
    match anchor {
        Anchor::Note { chapter, index } => Anchor::NoteText {
            chapter: *chapter,
            index: *index,
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texweave::doc::Region;

    #[test]
    fn escaping() {
        assert_eq!(escape("a<b&c>\"d\""), "a&lt;b&amp;c&gt;&quot;d&quot;");
    }

    #[test]
    fn section_numbers_join_with_dots() {
        let anchor = Anchor::Section {
            region: Region::Main,
            numbers: vec![2, 3, 0, 0, 0, 0],
        };
        assert_eq!(anchor_number(&anchor), "2.3");
    }

    #[test]
    fn figure_number() {
        assert_eq!(
            anchor_number(&Anchor::Figure {
                chapter: 1,
                index: 4
            }),
            "1.4"
        );
    }
}
