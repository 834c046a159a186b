use std::collections::HashMap;

use super::filter::SectionPolicy;
use super::kind::NodeKind;
use super::refs::ReferenceTable;
use super::tree::Element;

/// A footnote that was actually cited from the body.
#[derive(Debug, Clone)]
pub struct UsedFootnote {
    pub ordinal: usize,
    pub id: String,
    pub text: String,
}

/// Footnote-numbering accumulator, threaded through one traversal.
///
/// Ordinals are 1-based and assigned on first encounter in document
/// order; citing the same footnote again reuses its ordinal. The log
/// holds only footnotes that were cited, ready for the Footnotes section.
#[derive(Debug, Default)]
pub struct RenderState {
    ordinals: HashMap<String, usize>,
    used: Vec<UsedFootnote>,
}

impl RenderState {
    pub fn new() -> RenderState {
        RenderState::default()
    }

    pub fn used(&self) -> &[UsedFootnote] {
        &self.used
    }

    pub fn into_used(self) -> Vec<UsedFootnote> {
        self.used
    }

    fn assign(&mut self, id: &str, text: &str) -> usize {
        if let Some(&n) = self.ordinals.get(id) {
            return n;
        }
        let n = self.ordinals.len() + 1;
        self.ordinals.insert(id.to_string(), n);
        self.used.push(UsedFootnote {
            ordinal: n,
            id: id.to_string(),
            text: text.to_string(),
        });
        n
    }
}

/// Recursive element → Markdown transform.
///
/// Reads the reference and footnote tables, never writes them; the only
/// mutation during a walk is the footnote state. One depth-first,
/// left-to-right pass, each node visited once.
pub struct Renderer<'a> {
    refs: &'a ReferenceTable,
    footnotes: &'a HashMap<String, String>,
    policy: &'a SectionPolicy,
}

impl<'a> Renderer<'a> {
    pub fn new(
        refs: &'a ReferenceTable,
        footnotes: &'a HashMap<String, String>,
        policy: &'a SectionPolicy,
    ) -> Renderer<'a> {
        Renderer {
            refs,
            footnotes,
            policy,
        }
    }

    pub fn render(&self, el: &Element, state: &mut RenderState, depth: usize) -> String {
        match NodeKind::of(el) {
            // ── Noise: nothing from the node, nothing from its subtree ──
            NodeKind::Noise => String::new(),

            // ── Heading: "## 3.1 Datasets" at a depth-capped level ──
            NodeKind::Heading => {
                let hashes = "#".repeat((depth + 2).min(6));
                let text = el.inner_text().trim().to_string();
                let prefix = match el.attr("n") {
                    Some(n) if !n.is_empty() => format!("{n} "),
                    _ => String::new(),
                };
                format!("\n\n{hashes} {prefix}{text}\n\n")
            }

            // ── Section: filter on its heading, else descend one level deeper ──
            NodeKind::Section => {
                if let Some(head) = el.find("head") {
                    if self.policy.is_excluded(&head.inner_text()) {
                        return String::new();
                    }
                }
                self.render_children(el, state, depth + 1)
            }

            // ── Citation marker: "[Devlin et al., 2019]", raw text as fallback ──
            NodeKind::Citation => {
                let target = el.attr("target").unwrap_or("").trim_start_matches('#');
                if let Some(reference) = self.refs.get(target) {
                    format!("[{}]", reference.label)
                } else {
                    format!("[{}]", el.inner_text().trim())
                }
            }

            // ── Footnote marker: number on first use, reuse afterwards ──
            NodeKind::Footnote => {
                let target = el.attr("target").unwrap_or("").trim_start_matches('#');
                match self.footnotes.get(target) {
                    Some(text) => format!("[^{}]", state.assign(target, text)),
                    None => String::new(),
                }
            }

            // ── Paragraph: blank-line wrapped, dropped when empty ──
            NodeKind::Paragraph => {
                let inner = self.render_children(el, state, depth);
                let text = inner.trim();
                if text.is_empty() {
                    String::new()
                } else {
                    format!("\n\n{text}\n\n")
                }
            }

            NodeKind::Container => self.render_children(el, state, depth),
        }
    }

    /// Leading text, then each child followed by its tail, in order.
    fn render_children(&self, el: &Element, state: &mut RenderState, depth: usize) -> String {
        let mut out = String::new();
        push_flattened(&mut out, &el.text);
        for child in &el.children {
            out.push_str(&self.render(child, state, depth));
            push_flattened(&mut out, &child.tail);
        }
        out
    }
}

/// Inline text keeps its spacing but loses source-line breaks.
fn push_flattened(out: &mut String, text: &str) {
    for c in text.chars() {
        out.push(if c == '\n' { ' ' } else { c });
    }
}

// ── Tests ──
