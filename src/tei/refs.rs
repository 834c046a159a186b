use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::tree::Element;

static WHEN_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}").unwrap());
static TEXT_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());
// Mis-filed table/figure captions keep their auto-assigned id: b59, b60, ...
static BARE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^b\d+$").unwrap());

/// One resolved bibliography entry.
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: String,
    pub authors: Vec<String>,
    pub year: String,
    pub title: String,
    pub venue: String,
    /// Author/year rendering used for inline citations, e.g. "Doe et al., 2021".
    pub label: String,
}

/// Bibliography entries in document order, with id lookup.
///
/// Built once before rendering and never mutated afterwards; the renderer
/// only reads it.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: Vec<Reference>,
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    pub fn get(&self, id: &str) -> Option<&Reference> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, reference: Reference) {
        self.index
            .entry(reference.id.clone())
            .or_insert(self.entries.len());
        self.entries.push(reference);
    }
}

/// Scan every `listBibl` block and build the reference table.
pub fn build_reference_table(root: &Element) -> ReferenceTable {
    let mut table = ReferenceTable::default();

    for list in root.descendants_named("listBibl") {
        for bib in list.children_named("biblStruct") {
            if let Some(reference) = parse_entry(bib) {
                table.insert(reference);
            }
        }
    }

    table
}

fn parse_entry(bib: &Element) -> Option<Reference> {
    let id = bib.attr("xml:id").unwrap_or("").to_string();
    if id.is_empty() {
        return None;
    }

    let authors = collect_authors(bib);
    let year = find_year(bib);

    let title = level_title(bib, "analytic", "a")
        .or_else(|| level_title(bib, "monogr", "m"))
        .or_else(|| level_title(bib, "monogr", "j"))
        .unwrap_or_default();

    let venue = level_title(bib, "monogr", "j")
        .or_else(|| meeting_settlement(bib))
        .unwrap_or_default();

    let label = match authors.len() {
        0 if year.is_empty() => id.clone(),
        0 => year.clone(),
        1 => format!("{}, {}", authors[0], year),
        2 => format!("{} and {}, {}", authors[0], authors[1], year),
        _ => format!("{} et al., {}", authors[0], year),
    };

    // Entirely unparseable entry
    if authors.is_empty() && title.is_empty() && year.is_empty() {
        return None;
    }

    // Validity gate: untitled entries that look like mis-filed table/figure
    // captions rather than real citations. Kept exactly as tuned; loosening
    // it silently changes which markers fall back to raw-text rendering.
    if title.is_empty()
        && (year.is_empty()
            || authors.is_empty()
            || BARE_ID_RE.is_match(&id)
            || (authors.len() == 1 && year.is_empty()))
    {
        return None;
    }

    Some(Reference {
        id,
        authors,
        year,
        title,
        venue,
        label,
    })
}

/// Surnames from the analytic (article-level) and monogr (container-level)
/// author lists, in document order. An author without a surname is skipped.
fn collect_authors(bib: &Element) -> Vec<String> {
    let mut authors = Vec::new();
    for scope in bib
        .descendants()
        .filter(|el| el.name == "analytic" || el.name == "monogr")
    {
        for author in scope.children_named("author") {
            let surname = author
                .find("persName")
                .and_then(|p| p.find("surname"))
                .map(|s| s.text.trim())
                .unwrap_or("");
            if !surname.is_empty() {
                authors.push(surname.to_string());
            }
        }
    }
    authors
}

/// First date that yields a 4-digit year: a machine-readable `when`
/// attribute wins over a year embedded in the date's free text.
fn find_year(bib: &Element) -> String {
    for date in bib.descendants_named("date") {
        let when = date.attr("when").unwrap_or("");
        if WHEN_YEAR_RE.is_match(when) {
            return when[..4].to_string();
        }
        if let Some(m) = TEXT_YEAR_RE.find(date.text.trim()) {
            return m.as_str().to_string();
        }
    }
    String::new()
}

fn level_title(bib: &Element, scope: &str, level: &str) -> Option<String> {
    bib.descendants_named(scope)
        .flat_map(|s| s.children_named("title"))
        .find(|t| t.attr("level") == Some(level))
        .map(|t| t.text.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn meeting_settlement(bib: &Element) -> Option<String> {
    bib.descendants_named("monogr")
        .filter_map(|m| m.find("meeting"))
        .filter_map(|m| m.find("address"))
        .filter_map(|a| a.find("settlement"))
        .map(|s| s.text.trim().to_string())
        .find(|s| !s.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::tree::parse;

    fn table(entries: &str) -> ReferenceTable {
        let xml = format!("<back><listBibl>{entries}</listBibl></back>");
        build_reference_table(&parse(&xml).unwrap())
    }

    fn entry(id: &str, surnames: &[&str], date: &str, title: &str) -> String {
        let authors: String = surnames
            .iter()
            .map(|s| format!("<author><persName><surname>{s}</surname></persName></author>"))
            .collect();
        format!(
            r#"<biblStruct xml:id="{id}"><analytic><title level="a">{title}</title>{authors}</analytic><monogr>{date}</monogr></biblStruct>"#
        )
    }

    #[test]
    fn single_author_label() {
        let t = table(&entry("b0", &["Devlin"], r#"<date when="2019-06-02"/>"#, "BERT"));
        assert_eq!(t.get("b0").unwrap().label, "Devlin, 2019");
    }

    #[test]
    fn two_author_label() {
        let t = table(&entry(
            "b1",
            &["Vaswani", "Shazeer"],
            r#"<date when="2017"/>"#,
            "Attention Is All You Need",
        ));
        assert_eq!(t.get("b1").unwrap().label, "Vaswani and Shazeer, 2017");
    }

    #[test]
    fn et_al_label() {
        let t = table(&entry(
            "b2",
            &["Vaswani", "Shazeer", "Parmar"],
            r#"<date when="2017"/>"#,
            "Attention Is All You Need",
        ));
        assert_eq!(t.get("b2").unwrap().label, "Vaswani et al., 2017");
    }

    #[test]
    fn year_from_free_text() {
        let t = table(&entry("b3", &["Doe"], "<date>Proc. of 2021 meeting</date>", "X"));
        assert_eq!(t.get("b3").unwrap().year, "2021");
    }

    #[test]
    fn when_attribute_wins_over_text() {
        let t = table(&entry("b4", &["Doe"], r#"<date when="2020-01">2019</date>"#, "X"));
        assert_eq!(t.get("b4").unwrap().year, "2020");
    }

    #[test]
    fn title_falls_back_to_monogr_then_journal() {
        let xml = r#"<biblStruct xml:id="b5"><analytic><author><persName><surname>Doe</surname></persName></author></analytic><monogr><title level="j">NAACL</title><date when="2019"/></monogr></biblStruct>"#;
        let t = table(xml);
        let r = t.get("b5").unwrap();
        assert_eq!(r.title, "NAACL");
        assert_eq!(r.venue, "NAACL");
    }

    #[test]
    fn venue_falls_back_to_meeting_settlement() {
        let xml = r#"<biblStruct xml:id="b6"><analytic><title level="a">Paper</title><author><persName><surname>Doe</surname></persName></author></analytic><monogr><meeting><address><settlement>Vancouver</settlement></address></meeting><date when="2019"/></monogr></biblStruct>"#;
        assert_eq!(table(xml).get("b6").unwrap().venue, "Vancouver");
    }

    #[test]
    fn entry_without_id_is_skipped() {
        let t = table(r#"<biblStruct><analytic><title level="a">Orphan</title></analytic></biblStruct>"#);
        assert!(t.is_empty());
    }

    #[test]
    fn author_without_surname_is_skipped() {
        let xml = r#"<biblStruct xml:id="b7"><analytic><title level="a">T</title><author><persName><forename>Jane</forename></persName></author><author><persName><surname>Doe</surname></persName></author></analytic><monogr><date when="2021"/></monogr></biblStruct>"#;
        assert_eq!(table(xml).get("b7").unwrap().authors, vec!["Doe"]);
    }

    #[test]
    fn caption_entry_b59_is_gated_out() {
        // No title, no authors, no year: the classic mis-parsed caption
        let t = table(r#"<biblStruct xml:id="b59"><monogr><title level="m"></title></monogr></biblStruct>"#);
        assert!(t.get("b59").is_none());
    }

    #[test]
    fn untitled_single_author_without_year_is_gated_out() {
        let xml = r#"<biblStruct xml:id="ref_x"><monogr><author><persName><surname>Resnet</surname></persName></author></monogr></biblStruct>"#;
        assert!(table(xml).get("ref_x").is_none());
    }

    #[test]
    fn untitled_bare_id_with_authors_and_year_is_gated_out() {
        let xml = r#"<biblStruct xml:id="b60"><monogr><author><persName><surname>Param</surname></persName></author><date when="2020"/></monogr></biblStruct>"#;
        assert!(table(xml).get("b60").is_none());
    }

    #[test]
    fn untitled_entry_with_authors_year_and_real_id_survives() {
        let xml = r#"<biblStruct xml:id="DBLP:1"><monogr><author><persName><surname>Doe</surname></persName></author><date when="2020"/></monogr></biblStruct>"#;
        let t = table(xml);
        assert_eq!(t.get("DBLP:1").unwrap().label, "Doe, 2020");
    }

    #[test]
    fn document_order_is_preserved() {
        let xml = format!(
            "{}{}",
            entry("b10", &["Zed"], r#"<date when="2020"/>"#, "Z"),
            entry("b2", &["Abe"], r#"<date when="2019"/>"#, "A"),
        );
        let t = table(&xml);
        let ids: Vec<&str> = t.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b10", "b2"]);
    }
}
