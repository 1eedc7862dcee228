//! CSV export of stored search results.

use crate::error::Result;
use crate::extract::NormalizedRecord;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Separator for list fields inside one CSV cell
const LIST_SEPARATOR: &str = "; ";

/// CSV row; list fields are flattened into one cell each
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    pubmed_id: &'a str,
    title: &'a str,
    publication_date: &'a str,
    non_academic_authors: String,
    company_affiliations: String,
    corresponding_author_email: &'a str,
    url: &'a str,
}

impl<'a> From<&'a NormalizedRecord> for CsvRow<'a> {
    fn from(record: &'a NormalizedRecord) -> Self {
        Self {
            pubmed_id: &record.pubmed_id,
            title: &record.title,
            publication_date: &record.publication_date,
            non_academic_authors: record.non_academic_authors.join(LIST_SEPARATOR),
            company_affiliations: record.company_affiliations.join(LIST_SEPARATOR),
            corresponding_author_email: &record.corresponding_author_email,
            url: &record.url,
        }
    }
}

/// Write records as CSV (with header) to any writer
pub fn write_csv<W: Write>(writer: W, records: &[NormalizedRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for record in records {
        wtr.serialize(CsvRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write records to a CSV file
pub fn save_csv(path: &Path, records: &[NormalizedRecord]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(file, records)?;
    info!(path = %path.display(), count = records.len(), "Saved CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::article_url;

    #[test]
    fn test_write_csv() -> Result<()> {
        let records = vec![NormalizedRecord {
            pubmed_id: "42".to_string(),
            title: "A, quoted \"title\"".to_string(),
            publication_date: "2020".to_string(),
            non_academic_authors: vec!["Ann Lee".to_string(), "Bo Kim".to_string()],
            company_affiliations: vec!["Acme Biotech Inc.".to_string()],
            corresponding_author_email: String::new(),
            url: article_url("42"),
        }];

        let mut out = Vec::new();
        write_csv(&mut out, &records)?;
        let text = String::from_utf8(out).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("pubmed_id,title,publication_date,non_academic_authors,company_affiliations,corresponding_author_email,url")
        );
        assert_eq!(
            lines.next(),
            Some("42,\"A, quoted \"\"title\"\"\",2020,Ann Lee; Bo Kim,Acme Biotech Inc.,,https://pubmed.ncbi.nlm.nih.gov/42/")
        );
        Ok(())
    }

    #[test]
    fn test_empty_records_write_nothing() -> Result<()> {
        let mut out = Vec::new();
        write_csv(&mut out, &[])?;
        assert!(out.is_empty());
        Ok(())
    }
}
