use tracing::debug;

use crate::error::ExtractError;

use super::filter::SectionPolicy;
use super::footnotes::build_footnote_table;
use super::refs::build_reference_table;
use super::render::{RenderState, Renderer};
use super::tree::{parse, Element};

/// Parse a TEI document and assemble the full Markdown output:
/// title, authors, abstract, filtered body, numbered footnotes,
/// bibliography.
pub fn extract_markdown(xml: &str, policy: &SectionPolicy) -> Result<String, ExtractError> {
    let root = parse(xml)?;
    document_to_markdown(&root, policy)
}

/// Assemble Markdown from an already-parsed document tree.
pub fn document_to_markdown(
    root: &Element,
    policy: &SectionPolicy,
) -> Result<String, ExtractError> {
    let refs = build_reference_table(root);
    let footnotes = build_footnote_table(root);
    debug!(
        references = refs.len(),
        footnotes = footnotes.len(),
        "built lookup tables"
    );

    let mut md = String::new();

    // ── Front matter ──
    let title = main_title(root);
    if !title.is_empty() {
        md.push_str(&format!("# {title}\n\n"));
    }

    let authors = document_authors(root);
    if !authors.is_empty() {
        md.push_str(&format!("**Authors:** {}\n\n", authors.join(", ")));
    }

    md.push_str("---\n\n");

    // ── Abstract ──
    let abstract_paragraphs = abstract_paragraphs(root);
    if !abstract_paragraphs.is_empty() {
        md.push_str("## Abstract\n\n");
        for p in &abstract_paragraphs {
            md.push_str(p);
            md.push_str("\n\n");
        }
        md.push_str("---\n\n");
    }

    // ── Body ──
    let renderer = Renderer::new(&refs, &footnotes, policy);
    let mut state = RenderState::new();
    let mut body_md = String::new();
    if let Some(body) = root.find("text").and_then(|t| t.find("body")) {
        for div in body.children_named("div") {
            body_md.push_str(&renderer.render(div, &mut state, 0));
        }
    }
    md.push_str(&body_md);

    // ── Footnotes ──
    let mut used = state.into_used();
    used.sort_by_key(|f| f.ordinal);
    if !used.is_empty() {
        md.push_str("\n\n---\n\n## Footnotes\n\n");
        for footnote in &used {
            md.push_str(&format!("[^{}]: {}\n\n", footnote.ordinal, footnote.text));
        }
    }

    // ── References ──
    if !refs.is_empty() {
        md.push_str("\n\n---\n\n## References\n\n");
        for r in refs.iter() {
            let authors = if r.authors.is_empty() {
                "Unknown".to_string()
            } else {
                r.authors.join(", ")
            };
            let venue = if r.venue.is_empty() {
                String::new()
            } else {
                format!(" *{}*.", r.venue)
            };
            md.push_str(&format!(
                "- **[{}]** {} ({}). {}.{}\n\n",
                r.label, authors, r.year, r.title, venue
            ));
        }
    }

    // The separator rule is always emitted, so emptiness is judged on the
    // content-bearing pieces, not the raw string.
    if title.is_empty()
        && authors.is_empty()
        && abstract_paragraphs.is_empty()
        && body_md.trim().is_empty()
        && used.is_empty()
        && refs.is_empty()
    {
        return Err(ExtractError::EmptyOutput);
    }

    Ok(md)
}

fn main_title(root: &Element) -> String {
    root.descendants_named("titleStmt")
        .flat_map(|stmt| stmt.children_named("title"))
        .find(|t| t.attr("type") == Some("main"))
        .map(|t| t.text.trim().to_string())
        .unwrap_or_default()
}

/// Full author names ("forename surname") from the header's source
/// description, in document order.
fn document_authors(root: &Element) -> Vec<String> {
    let mut authors = Vec::new();
    for source in root.descendants_named("sourceDesc") {
        for author in source.descendants_named("author") {
            let Some(pers) = author.find("persName") else {
                continue;
            };
            let forename = pers
                .children_named("forename")
                .find(|f| f.attr("type") == Some("first"))
                .map(|f| f.text.trim())
                .unwrap_or("");
            let surname = pers.find("surname").map(|s| s.text.trim()).unwrap_or("");
            let full = format!("{forename} {surname}").trim().to_string();
            if !full.is_empty() {
                authors.push(full);
            }
        }
    }
    authors
}

fn abstract_paragraphs(root: &Element) -> Vec<String> {
    root.descendants_named("abstract")
        .flat_map(|a| a.descendants_named("p"))
        .map(|p| p.inner_text().trim().to_string())
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const TEI_NS: &str = r#"xmlns="http://www.tei-c.org/ns/1.0""#;

    /// The end-to-end document: title, one author, abstract, a body
    /// paragraph citing a reference and a footnote, and a section that
    /// the relevance filter must drop.
    fn example_doc() -> String {
        format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI {TEI_NS}>
  <teiHeader>
    <fileDesc>
      <titleStmt><title level="a" type="main">Example Paper</title></titleStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author><persName><forename type="first">Jane</forename><surname>Doe</surname></persName></author>
          </analytic>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
    <profileDesc>
      <abstract><div><p>We study X.</p></div></abstract>
    </profileDesc>
  </teiHeader>
  <text>
    <body>
      <div><head>Introduction</head>
        <p>We use <ref type="bibr" target="#ref1">[1]</ref> and footnote<ref type="foot" target="#a"/>.</p>
      </div>
      <div><head>Conclusion</head><p>We conclude Y</p></div>
    </body>
    <back>
      <div><listBibl>
        <biblStruct xml:id="ref1">
          <analytic>
            <title level="a">A Study of X</title>
            <author><persName><surname>Doe</surname></persName></author>
          </analytic>
          <monogr><title level="j">JMLR</title><date when="2021-01-01"/></monogr>
        </biblStruct>
      </listBibl></div>
      <note place="foot" xml:id="a">See appendix for details</note>
    </back>
  </text>
</TEI>"##
        )
    }

    #[test]
    fn end_to_end_document() {
        let md = extract_markdown(&example_doc(), &SectionPolicy::default()).unwrap();

        assert!(md.starts_with("# Example Paper\n\n"));
        assert!(md.contains("**Authors:** Jane Doe"));
        assert!(md.contains("## Abstract\n\nWe study X."));
        assert!(md.contains("We use [Doe, 2021] and footnote[^1]."));
        assert!(md.contains("## Footnotes\n\n[^1]: See appendix for details"));
        assert!(md.contains("## References\n\n- **[Doe, 2021]** Doe (2021). A Study of X. *JMLR*."));
        assert!(!md.contains("We conclude Y"));
    }

    #[test]
    fn output_is_deterministic() {
        let doc = example_doc();
        let policy = SectionPolicy::default();
        let first = extract_markdown(&doc, &policy).unwrap();
        let second = extract_markdown(&doc, &policy).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_document_is_a_hard_failure() {
        let err = extract_markdown("<TEI><teiHeader>", &SectionPolicy::default()).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedInput(_)));
    }

    #[test]
    fn content_free_document_is_empty_output() {
        let err = extract_markdown(
            "<TEI><teiHeader/><text><body/></text></TEI>",
            &SectionPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyOutput));
    }

    #[test]
    fn missing_substructures_tolerated() {
        // No abstract, no bibliography, no footnotes: body alone suffices
        let md = extract_markdown(
            "<TEI><text><body><div><p>Just text.</p></div></body></text></TEI>",
            &SectionPolicy::default(),
        )
        .unwrap();
        assert!(md.contains("Just text."));
        assert!(!md.contains("## Abstract"));
        assert!(!md.contains("## References"));
        assert!(!md.contains("## Footnotes"));
    }

    #[test]
    fn gated_out_entry_leaves_marker_as_raw_text() {
        let xml = r##"<TEI><text><body><div><p>See <ref type="bibr" target="#b59">Tab. 3</ref>.</p></div></body>
            <back><listBibl><biblStruct xml:id="b59"><monogr><title level="m"></title></monogr></biblStruct></listBibl></back></text></TEI>"##;
        let md = extract_markdown(xml, &SectionPolicy::default()).unwrap();
        assert!(md.contains("See [Tab. 3]."));
        assert!(!md.contains("## References"));
    }

    #[test]
    fn custom_policy_changes_filtering() {
        let policy =
            SectionPolicy::from_json(r#"{"excluded": ["introduction"]}"#).unwrap();
        let md = extract_markdown(&example_doc(), &policy).unwrap();
        assert!(!md.contains("We use [Doe, 2021]"));
        assert!(md.contains("We conclude Y"));
    }

    #[test]
    fn fixture_roundtrip() {
        let xml = std::fs::read_to_string("tests/fixtures/example.tei.xml").unwrap();
        let md = extract_markdown(&xml, &SectionPolicy::default()).unwrap();

        assert!(md.starts_with("# Attention-Scale Analysis for Benchmark Corpora\n\n"));
        assert!(md.contains("**Authors:** Maria Alvarez, Tom Becker"));
        assert!(md.contains("## Abstract"));
        // Inline citations resolved against the bibliography
        assert!(md.contains("[Vaswani et al., 2017]"));
        assert!(md.contains("[Devlin and Chang, 2019]"));
        // Footnotes numbered by first use
        assert!(md.contains("[^1]"));
        assert!(md.contains("## Footnotes\n\n[^1]: Checkpoints released under CC-BY."));
        // Filtered sections and noise leave no trace
        assert!(!md.contains("we thank the anonymous reviewers"));
        assert!(!md.contains("In summary, scale dominates"));
        assert!(!md.contains("attn-matrix-values"));
        assert!(md.contains("## References"));
    }
}
