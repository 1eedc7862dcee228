//! Field extraction from PubMed article XML.
//!
//! This is tag-delimiter scanning with regular expressions, not an XML parser.
//! It tolerates attributes on opening tags and inline markup inside values,
//! but makes no attempt to recover from malformed or unusually nested markup.
//!
//! One document yields one [`NormalizedRecord`]. The author list and the
//! company affiliation list come out of the same scan, so every non-academic
//! affiliation that puts an author on the list is also a company affiliation.

use crate::classifier::AffiliationClassifier;
use crate::error::{AffilscanError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title used when the document has no `ArticleTitle`
pub const NO_TITLE: &str = "No title available";

/// Date used when the document has no usable `PubDate`
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Canonical article URL prefix
const PUBMED_ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// One article, reduced to the fields this service reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// PubMed identifier (PMID)
    pub pubmed_id: String,
    pub title: String,
    /// `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, a free-form `MedlineDate`, or [`UNKNOWN_DATE`]
    pub publication_date: String,
    /// Authors with at least one non-academic affiliation, first-seen order
    pub non_academic_authors: Vec<String>,
    /// Non-academic affiliations found anywhere in the document, first-seen order
    pub company_affiliations: Vec<String>,
    /// Corresponding author email, empty when none was found
    pub corresponding_author_email: String,
    pub url: String,
}

/// Canonical PubMed URL for an identifier
pub fn article_url(pubmed_id: &str) -> String {
    format!("{}/{}/", PUBMED_ARTICLE_URL, pubmed_id)
}

/// An author entry with a resolved display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorEntry {
    pub name: String,
    pub affiliations: Vec<String>,
}

/// Compiled patterns plus the classifier used to split results
pub struct FieldExtractor {
    classifier: AffiliationClassifier,
    title: Regex,
    pub_date: Regex,
    year: Regex,
    month: Regex,
    day: Regex,
    medline_date: Regex,
    affiliation: Regex,
    wrapped_affiliation: Regex,
    author_list: Regex,
    author: Regex,
    fore_name: Regex,
    last_name: Regex,
    collective_name: Regex,
    email_location: Regex,
    email: Regex,
    markup: Regex,
}

/// Pattern for `<name ...>content</name>`, capturing the content lazily.
///
/// The opening tag must be followed by whitespace or `>` so that `Author`
/// never matches `AuthorList` and `Affiliation` never matches `AffiliationInfo`.
fn element(name: &str) -> Result<Regex> {
    compile(&format!(r"(?s)<{0}(?:\s[^>]*)?>(.*?)</{0}\s*>", name))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AffilscanError::Parse(e.to_string()))
}

impl FieldExtractor {
    pub fn new(classifier: AffiliationClassifier) -> Result<Self> {
        Ok(Self {
            classifier,
            title: element("ArticleTitle")?,
            pub_date: element("PubDate")?,
            year: element("Year")?,
            month: element("Month")?,
            day: element("Day")?,
            medline_date: element("MedlineDate")?,
            affiliation: element("Affiliation")?,
            wrapped_affiliation: compile(
                r"(?s)<AffiliationInfo(?:\s[^>]*)?>\s*<Affiliation(?:\s[^>]*)?>(.*?)</Affiliation\s*>",
            )?,
            author_list: element("AuthorList")?,
            author: element("Author")?,
            fore_name: element("ForeName")?,
            last_name: element("LastName")?,
            collective_name: element("CollectiveName")?,
            email_location: compile(
                r#"(?s)<ELocationID\s[^>]*EIdType\s*=\s*"email"[^>]*>(.*?)</ELocationID\s*>"#,
            )?,
            email: compile(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            markup: compile(r"<[^>]+>")?,
        })
    }

    pub fn classifier(&self) -> &AffiliationClassifier {
        &self.classifier
    }

    /// Reduce one detail document to a record.
    pub fn extract(&self, pubmed_id: &str, document: &str) -> NormalizedRecord {
        let title = self
            .first_text(&self.title, document)
            .unwrap_or_else(|| NO_TITLE.to_string());
        let publication_date = self.publication_date(document);
        let authors = self.authors(document);

        let company_affiliations: Vec<String> = self
            .affiliations(document)
            .into_iter()
            .filter(|a| self.classifier.is_non_academic(a))
            .collect();

        let mut non_academic_authors: Vec<String> = Vec::new();
        for author in &authors {
            if author
                .affiliations
                .iter()
                .any(|a| self.classifier.is_non_academic(a))
            {
                push_unique(&mut non_academic_authors, &author.name);
            }
        }

        NormalizedRecord {
            pubmed_id: pubmed_id.to_string(),
            title,
            publication_date,
            non_academic_authors,
            company_affiliations,
            corresponding_author_email: self.corresponding_email(document),
            url: article_url(pubmed_id),
        }
    }

    /// Publication date from the first `PubDate` block.
    pub fn publication_date(&self, document: &str) -> String {
        let Some(block) = first_inner(&self.pub_date, document) else {
            return UNKNOWN_DATE.to_string();
        };

        let year = self.first_text(&self.year, block);
        let month = self.first_text(&self.month, block);
        let day = self.first_text(&self.day, block);

        match (year, month, day) {
            (Some(y), Some(m), Some(d)) => format!("{}-{}-{}", y, m, d),
            (Some(y), Some(m), None) => format!("{}-{}", y, m),
            (Some(y), None, _) => y,
            (None, _, _) => self
                .first_text(&self.medline_date, block)
                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
        }
    }

    /// Every distinct affiliation in the document, both encodings, first-seen order.
    pub fn affiliations(&self, document: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for re in [&self.affiliation, &self.wrapped_affiliation] {
            for caps in re.captures_iter(document) {
                if let Some(m) = caps.get(1) {
                    if let Some(text) = self.clean(m.as_str()) {
                        found.push((m.start(), text));
                    }
                }
            }
        }
        found.sort_by_key(|(pos, _)| *pos);

        let mut unique = Vec::new();
        for (_, text) in found {
            push_unique(&mut unique, &text);
        }
        unique
    }

    /// Named author entries from the first `AuthorList`, with their own affiliations.
    ///
    /// Entries whose name cannot be determined are dropped.
    pub fn authors(&self, document: &str) -> Vec<AuthorEntry> {
        let Some(list) = first_inner(&self.author_list, document) else {
            return Vec::new();
        };

        self.author
            .captures_iter(list)
            .filter_map(|caps| caps.get(1))
            .filter_map(|entry| {
                let entry = entry.as_str();
                let name = self.author_name(entry)?;
                Some(AuthorEntry {
                    name,
                    affiliations: self.author_affiliations(entry),
                })
            })
            .collect()
    }

    /// "First Last", else "Last", else the collective name.
    fn author_name(&self, entry: &str) -> Option<String> {
        let last = self.first_text(&self.last_name, entry);
        let fore = self.first_text(&self.fore_name, entry);
        match (fore, last) {
            (Some(fore), Some(last)) => Some(format!("{} {}", fore, last)),
            (None, Some(last)) => Some(last),
            _ => self.first_text(&self.collective_name, entry),
        }
    }

    /// Wrapped affiliations first; bare ones only when no wrapped one exists.
    fn author_affiliations(&self, entry: &str) -> Vec<String> {
        let wrapped = self.all_text(&self.wrapped_affiliation, entry);
        if !wrapped.is_empty() {
            return wrapped;
        }
        self.all_text(&self.affiliation, entry)
    }

    /// Typed email location containing `@`, else the first email-shaped substring.
    pub fn corresponding_email(&self, document: &str) -> String {
        let typed = self
            .email_location
            .captures_iter(document)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| self.clean(m.as_str()))
            .find(|text| text.contains('@'));
        if let Some(email) = typed {
            return email;
        }

        self.email
            .find(document)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn first_text(&self, re: &Regex, haystack: &str) -> Option<String> {
        first_inner(re, haystack).and_then(|inner| self.clean(inner))
    }

    fn all_text(&self, re: &Regex, haystack: &str) -> Vec<String> {
        let mut unique = Vec::new();
        for caps in re.captures_iter(haystack) {
            if let Some(text) = caps.get(1).and_then(|m| self.clean(m.as_str())) {
                push_unique(&mut unique, &text);
            }
        }
        unique
    }

    /// Strip inline markup, decode entities, collapse whitespace. Empty is `None`.
    fn clean(&self, raw: &str) -> Option<String> {
        let stripped = self.markup.replace_all(raw, "");
        let decoded = decode_entities(&stripped);
        let text = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn first_inner<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Decode the predefined XML entities (`&amp;` last so it is not applied twice).
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
