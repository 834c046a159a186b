use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Lettered appendix numbering: "a. ...", "b.1 ...", etc.
static LETTERED_APPENDIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-f]\.\s").unwrap());

/// Section headings whose subtrees are dropped wholesale.
///
/// The heading lists are a judgment call about where relevant content
/// lives, not a structural necessity, so they are data: load alternatives
/// from JSON and pass them in. Matching is case-insensitive on the trimmed
/// heading; the lettered-appendix rule is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPolicy {
    /// Exact matches, lowercase.
    pub excluded: Vec<String>,
    /// Prefix matches, lowercase.
    pub excluded_prefixes: Vec<String>,
}

impl Default for SectionPolicy {
    fn default() -> Self {
        let excluded = [
            "conclusion",
            "conclusions",
            "discussion",
            "related work",
            "related works",
            "acknowledgement",
            "acknowledgements",
            "acknowledgment",
            "acknowledgments",
            "funding",
            "conflict of interest",
            "competing interests",
            "author contributions",
            "ethics statement",
            "broader impact",
            "limitations",
            "supplementary",
            "supplementary material",
            "supplementary materials",
            "supplementary details",
            "appendix",
        ];
        let excluded_prefixes = ["appendix", "supplementary", "proof"];
        SectionPolicy {
            excluded: excluded.iter().map(|s| s.to_string()).collect(),
            excluded_prefixes: excluded_prefixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SectionPolicy {
    pub fn from_json(json: &str) -> Result<SectionPolicy, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Should the section under this heading be dropped entirely?
    pub fn is_excluded(&self, heading: &str) -> bool {
        let h = heading.trim().to_lowercase();

        if self.excluded.iter().any(|e| *e == h) {
            return true;
        }
        if self.excluded_prefixes.iter().any(|p| h.starts_with(p.as_str())) {
            return true;
        }
        LETTERED_APPENDIX_RE.is_match(&h)
    }
}

// ── Tests ──
