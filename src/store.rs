//! SQLite persistence for searches and their extracted records.
//!
//! Searches are append-only; records belong to exactly one search and are
//! read back in insertion order. List fields are stored as JSON arrays.

use crate::error::{AffilscanError, Result};
use crate::extract::{article_url, NormalizedRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Number of searches returned by the history listing
pub const HISTORY_LIMIT: usize = 10;

/// One recorded search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i64,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_id INTEGER NOT NULL REFERENCES searches(id),
    pubmed_id TEXT NOT NULL,
    title TEXT NOT NULL,
    publication_date TEXT NOT NULL,
    non_academic_authors TEXT NOT NULL,
    company_affiliations TEXT NOT NULL,
    corresponding_email TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_search ON results(search_id);
"#;

/// Search log and record store
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        info!(path = %path.display(), "Opened database");
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AffilscanError::Storage("database lock poisoned".to_string()))
    }

    /// Append a search to the log.
    pub fn record_search(&self, query: &str) -> Result<SearchQuery> {
        let created_at = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO searches (query, created_at) VALUES (?1, ?2)",
            params![query, created_at.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        debug!(search_id = id, "Recorded search");
        Ok(SearchQuery {
            id,
            query: query.to_string(),
            created_at,
        })
    }

    /// Attach one record to a search.
    pub fn insert_record(&self, search_id: i64, record: &NormalizedRecord) -> Result<()> {
        let authors = serde_json::to_string(&record.non_academic_authors)?;
        let companies = serde_json::to_string(&record.company_affiliations)?;
        self.conn()?.execute(
            "INSERT INTO results (search_id, pubmed_id, title, publication_date, \
             non_academic_authors, company_affiliations, corresponding_email) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                search_id,
                record.pubmed_id,
                record.title,
                record.publication_date,
                authors,
                companies,
                record.corresponding_author_email,
            ],
        )?;
        Ok(())
    }

    /// Most recent searches first.
    pub fn recent_searches(&self, limit: usize) -> Result<Vec<SearchQuery>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, query, created_at FROM searches ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut searches = Vec::new();
        for row in rows {
            let (id, query, created_at) = row?;
            searches.push(SearchQuery {
                id,
                query,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(searches)
    }

    /// Look up one search by id
    pub fn search(&self, search_id: i64) -> Result<Option<SearchQuery>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, query, created_at FROM searches WHERE id = ?1",
                params![search_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, query, created_at)| {
            Ok(SearchQuery {
                id,
                query,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    /// All records of a search in insertion order.
    pub fn results_for(&self, search_id: i64) -> Result<Vec<NormalizedRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT pubmed_id, title, publication_date, non_academic_authors, \
             company_affiliations, corresponding_email \
             FROM results WHERE search_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![search_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (pubmed_id, title, publication_date, authors, companies, email) = row?;
            records.push(NormalizedRecord {
                url: article_url(&pubmed_id),
                pubmed_id,
                title,
                publication_date,
                non_academic_authors: serde_json::from_str(&authors)?,
                company_affiliations: serde_json::from_str(&companies)?,
                corresponding_author_email: email,
            });
        }
        Ok(records)
    }

    /// Drop the results table so the next record insert fails
    #[cfg(test)]
    pub(crate) fn drop_results_table(&self) -> Result<()> {
        self.conn()?.execute_batch("DROP TABLE results")?;
        Ok(())
    }

    /// Total number of stored records
    pub fn record_count(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AffilscanError::Parse(format!("Bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(pubmed_id: &str, authors: &[&str]) -> NormalizedRecord {
        NormalizedRecord {
            pubmed_id: pubmed_id.to_string(),
            title: format!("Title {}", pubmed_id),
            publication_date: "2020-03".to_string(),
            non_academic_authors: authors.iter().map(|a| a.to_string()).collect(),
            company_affiliations: vec!["Acme Biotech Inc.".to_string()],
            corresponding_author_email: "x@acme.com".to_string(),
            url: article_url(pubmed_id),
        }
    }

    #[test]
    fn test_record_list_round_trip() -> Result<()> {
        let store = Store::open_in_memory()?;
        let search = store.record_search("kras")?;
        let original = record("42", &["Zed Last", "Ann First", "Mid Person"]);
        store.insert_record(search.id, &original)?;

        let loaded = store.results_for(search.id)?;
        assert_eq!(loaded, vec![original]);
        Ok(())
    }

    #[test]
    fn test_results_in_insertion_order_and_scoped() -> Result<()> {
        let store = Store::open_in_memory()?;
        let a = store.record_search("a")?;
        let b = store.record_search("b")?;
        store.insert_record(a.id, &record("3", &[]))?;
        store.insert_record(b.id, &record("9", &[]))?;
        store.insert_record(a.id, &record("1", &[]))?;

        let ids: Vec<String> = store
            .results_for(a.id)?
            .into_iter()
            .map(|r| r.pubmed_id)
            .collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert!(store.results_for(999)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_recent_searches_newest_first_and_capped() -> Result<()> {
        let store = Store::open_in_memory()?;
        for i in 0..12 {
            store.record_search(&format!("query {}", i))?;
        }
        let recent = store.recent_searches(HISTORY_LIMIT)?;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].query, "query 11");
        assert_eq!(recent[9].query, "query 2");
        Ok(())
    }

    #[test]
    fn test_search_lookup() -> Result<()> {
        let store = Store::open_in_memory()?;
        let saved = store.record_search("lookup me")?;
        let found = store.search(saved.id)?.expect("search exists");
        assert_eq!(found.query, "lookup me");
        assert_eq!(found.created_at, saved.created_at);
        assert!(store.search(saved.id + 1)?.is_none());
        Ok(())
    }

    #[test]
    fn test_failed_record_write_keeps_search() -> Result<()> {
        let store = Store::open_in_memory()?;
        let search = store.record_search("kept")?;
        store.drop_results_table()?;

        let err = store
            .insert_record(search.id, &record("1", &[]))
            .expect_err("results table is gone");
        assert!(matches!(err, AffilscanError::Persistence(_)));
        assert!(!err.is_client_error());
        assert_eq!(store.recent_searches(HISTORY_LIMIT)?, vec![search]);
        Ok(())
    }

    #[test]
    fn test_poisoned_lock_is_storage_error() -> Result<()> {
        let store = Store::open_in_memory()?;
        std::thread::scope(|s| {
            let handle = s.spawn(|| {
                let _guard = store.conn.lock();
                panic!("writer crashed while holding the connection");
            });
            assert!(handle.join().is_err());
        });

        let err = store.record_search("after crash").expect_err("lock poisoned");
        assert!(matches!(err, AffilscanError::Storage(_)));
        Ok(())
    }

    #[test]
    fn test_reopen_file_keeps_data() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("affilscan.db");
        {
            let store = Store::open(&path)?;
            let search = store.record_search("persisted")?;
            store.insert_record(search.id, &record("5", &["A B"]))?;
        }
        let store = Store::open(&path)?;
        let recent = store.recent_searches(HISTORY_LIMIT)?;
        assert_eq!(recent.len(), 1);
        assert_eq!(store.record_count()?, 1);
        assert_eq!(store.results_for(recent[0].id)?[0].non_academic_authors, vec!["A B"]);
        Ok(())
    }
}
