//! Academic vs. non-academic affiliation classification.
//!
//! A keyword denylist: an affiliation is treated as non-academic (a company)
//! iff it contains none of the academic keywords, compared case-insensitively
//! as plain substrings.

/// Keywords marking an affiliation as academic or institutional
pub const ACADEMIC_KEYWORDS: &[&str] = &[
    "university",
    "college",
    "institute",
    "hospital",
    "school",
    "medical center",
    "clinic",
    "academy",
    "faculty",
    "laboratory",
    "department of",
    "division of",
    "center for",
    "national",
    "federal",
];

/// Keyword-based affiliation classifier
#[derive(Debug, Clone)]
pub struct AffiliationClassifier {
    keywords: Vec<String>,
}

impl AffiliationClassifier {
    /// Build a classifier from a keyword list (matched case-insensitively)
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// True when the affiliation mentions none of the academic keywords.
    pub fn is_non_academic(&self, affiliation: &str) -> bool {
        let lower = affiliation.to_lowercase();
        !self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Keep the non-academic affiliations, preserving order
    pub fn non_academic<'a>(&self, affiliations: &'a [String]) -> Vec<&'a String> {
        affiliations
            .iter()
            .filter(|a| self.is_non_academic(a))
            .collect()
    }
}

impl Default for AffiliationClassifier {
    fn default() -> Self {
        Self::new(ACADEMIC_KEYWORDS)
    }
}
