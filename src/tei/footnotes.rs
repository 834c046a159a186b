use std::collections::HashMap;

use super::tree::Element;

/// Footnote id → body text, for every `<note place="foot">` in the
/// document. Entries with an empty id or empty text are dropped; which of
/// the rest actually get numbered is decided lazily during rendering.
pub fn build_footnote_table(root: &Element) -> HashMap<String, String> {
    let mut notes = HashMap::new();
    for note in root.descendants_named("note") {
        if note.attr("place") != Some("foot") {
            continue;
        }
        let id = note.attr("xml:id").unwrap_or("");
        let text = note.inner_text().trim().to_string();
        if !id.is_empty() && !text.is_empty() {
            notes.insert(id.to_string(), text);
        }
    }
    notes
}

// ── Tests ──
