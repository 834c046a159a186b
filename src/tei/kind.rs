use super::tree::Element;

/// Tags whose entire subtree is discarded: mathematical and layout noise.
pub const NOISE_TAGS: &[&str] = &[
    "formula", // inline and display math
    "figure",  // figures and plots
    "table",   // tables
    "cell",    // table cells
    "row",     // table rows
    "label",   // equation labels
    "graphic", // images
    "figDesc", // figure captions
    "trash",   // extraction-service garbage bin
];

/// Structural role of a TEI element, as the renderer sees it.
///
/// A closed set: every element maps to exactly one kind, and the renderer
/// matches exhaustively, so an unhandled tag cannot slip through as a
/// forgotten special case; it is a generic `Container`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `<head>` — section heading.
    Heading,
    /// `<p>` — prose paragraph.
    Paragraph,
    /// `<div>` — section container, subject to the relevance filter.
    Section,
    /// `<ref type="bibr">` — inline citation marker.
    Citation,
    /// `<ref type="foot">` — inline footnote marker.
    Footnote,
    /// Formula / figure / table / … — dropped with all descendants.
    Noise,
    /// Anything else: recurse, keeping text and tails.
    Container,
}

impl NodeKind {
    pub fn of(el: &Element) -> NodeKind {
        if NOISE_TAGS.contains(&el.name.as_str()) {
            return NodeKind::Noise;
        }
        match el.name.as_str() {
            "head" => NodeKind::Heading,
            "p" => NodeKind::Paragraph,
            "div" => NodeKind::Section,
            "ref" => match el.attr("type") {
                Some("bibr") => NodeKind::Citation,
                Some("foot") => NodeKind::Footnote,
                _ => NodeKind::Container,
            },
            _ => NodeKind::Container,
        }
    }
}

// ── Tests ──
