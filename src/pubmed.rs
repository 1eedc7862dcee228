//! PubMed E-utilities client.
//!
//! Two calls are used:
//! - `esearch.fcgi` (JSON) turns a free-text query into a capped list of PMIDs
//! - `efetch.fcgi` (XML) returns the article document for one PMID
//!
//! Both carry the configured API key when one is set. Nothing is retried.

use crate::config::Settings;
use crate::error::{AffilscanError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Source of article identifiers and detail documents.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Identifiers matching `query`, at most the configured cap.
    async fn search(&self, query: &str) -> Result<Vec<String>>;

    /// Raw detail document for one identifier.
    async fn fetch_detail(&self, id: &str) -> Result<String>;
}

/// HTTP client for the E-utilities endpoints
pub struct PubMedClient {
    client: Client,
    esearch_url: String,
    efetch_url: String,
    api_key: Option<String>,
    max_results: usize,
}

impl PubMedClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("affilscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AffilscanError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            esearch_url: settings.esearch_url.clone(),
            efetch_url: settings.efetch_url.clone(),
            api_key: settings.api_key.clone(),
            max_results: settings.max_results,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url> {
        build_url(
            &self.esearch_url,
            &[
                ("db", "pubmed"),
                ("term", query),
                ("retmode", "json"),
                ("retmax", &self.max_results.to_string()),
            ],
            self.api_key.as_deref(),
        )
    }

    fn detail_url(&self, id: &str) -> Result<Url> {
        build_url(
            &self.efetch_url,
            &[("db", "pubmed"), ("id", id), ("retmode", "xml")],
            self.api_key.as_deref(),
        )
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AffilscanError::Validation("query must not be empty".to_string()));
        }

        let url = self.search_url(query)?;
        debug!(url = %redacted(&url), "Sending esearch request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "esearch failed");
            return Err(AffilscanError::Upstream {
                status: status.as_u16(),
                message: format!("esearch error: {}", status),
            });
        }

        let body: ESearchResponse = response
            .json()
            .await
            .map_err(|e| AffilscanError::Parse(format!("Failed to parse esearch response: {}", e)))?;

        let ids = cap_ids(body.esearchresult.idlist, self.max_results);
        info!(query = query, count = ids.len(), "esearch complete");
        Ok(ids)
    }

    async fn fetch_detail(&self, id: &str) -> Result<String> {
        let url = self.detail_url(id)?;
        debug!(pmid = id, "Sending efetch request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AffilscanError::Upstream {
                status: status.as_u16(),
                message: format!("efetch error for {}: {}", id, status),
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(AffilscanError::Parse(format!("Empty efetch document for {}", id)));
        }
        Ok(text)
    }
}

// === E-utilities response types ===

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Build an endpoint URL with query parameters
fn build_url(base: &str, params: &[(&str, &str)], api_key: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| AffilscanError::Config(format!("Invalid endpoint URL '{}': {}", base, e)))?;

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
        if let Some(key) = api_key {
            pairs.append_pair("api_key", key);
        }
    }

    Ok(url)
}

fn cap_ids(ids: Vec<String>, max: usize) -> Vec<String> {
    ids.into_iter()
        .filter(|id| !id.trim().is_empty())
        .take(max)
        .collect()
}

/// URL for logging, with the API key masked
fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "api_key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> PubMedClient {
        let settings = Settings {
            api_key: api_key.map(String::from),
            ..Default::default()
        };
        PubMedClient::new(&settings).expect("client builds")
    }

    #[test]
    fn test_search_url() {
        let url = client(Some("secret")).search_url("cancer therapy").expect("url");
        let s = url.as_str();
        assert!(s.starts_with("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?"));
        assert!(s.contains("db=pubmed"));
        assert!(s.contains("term=cancer+therapy"));
        assert!(s.contains("retmax=10"));
        assert!(s.contains("api_key=secret"));
    }

    #[test]
    fn test_detail_url_without_key() {
        let url = client(None).detail_url("12345").expect("url");
        assert!(url.as_str().contains("id=12345"));
        assert!(url.as_str().contains("retmode=xml"));
        assert!(!url.as_str().contains("api_key"));
    }

    #[test]
    fn test_redacted_hides_key() {
        let url = client(Some("secret")).detail_url("1").expect("url");
        let shown = redacted(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("api_key=***") || shown.contains("api_key=%2A%2A%2A"));
    }

    #[test]
    fn test_cap_ids() {
        let ids: Vec<String> = (0..25).map(|i| i.to_string()).collect();
        let capped = cap_ids(ids, 10);
        assert_eq!(capped.len(), 10);
        assert_eq!(capped[0], "0");
        assert!(cap_ids(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_parse_esearch_body() {
        let body = r#"{"header":{"type":"esearch"},"esearchresult":{"count":"2","idlist":["111","222"]}}"#;
        let parsed: ESearchResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.esearchresult.idlist, vec!["111", "222"]);

        let empty = r#"{"esearchresult":{"count":"0"}}"#;
        let parsed: ESearchResponse = serde_json::from_str(empty).expect("parse");
        assert!(parsed.esearchresult.idlist.is_empty());
    }

    /// Local stand-in for the E-utilities host, returns its base URL.
    ///
    /// - `/down/*` answers 503
    /// - `/empty/efetch.fcgi` answers 200 with an empty body
    /// - `/ok/esearch.fcgi` lists 12 ids; `/ok/efetch.fcgi` echoes the id and key
    async fn spawn_eutils() -> String {
        use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
        use std::collections::HashMap;

        let app = Router::new()
            .route(
                "/down/esearch.fcgi",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route(
                "/down/efetch.fcgi",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route("/empty/efetch.fcgi", get(|| async { "  \n" }))
            .route(
                "/ok/esearch.fcgi",
                get(|| async {
                    let ids: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
                    Json(serde_json::json!({ "esearchresult": { "idlist": ids } }))
                }),
            )
            .route(
                "/ok/efetch.fcgi",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    format!(
                        "<PMID>{}</PMID><Key>{}</Key>",
                        params.get("id").cloned().unwrap_or_default(),
                        params.get("api_key").cloned().unwrap_or_default()
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn local_client(base: &str, prefix: &str) -> PubMedClient {
        let settings = Settings {
            api_key: Some("secret".to_string()),
            esearch_url: format!("{}/{}/esearch.fcgi", base, prefix),
            efetch_url: format!("{}/{}/efetch.fcgi", base, prefix),
            ..Default::default()
        };
        PubMedClient::new(&settings).expect("client builds")
    }

    #[tokio::test]
    async fn test_search_error_status_is_upstream() {
        let base = spawn_eutils().await;
        let err = local_client(&base, "down")
            .search("kras")
            .await
            .expect_err("503");
        assert!(matches!(err, AffilscanError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_detail_error_status_is_upstream() {
        let base = spawn_eutils().await;
        let err = local_client(&base, "down")
            .fetch_detail("1")
            .await
            .expect_err("503");
        assert!(matches!(err, AffilscanError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_empty_detail_is_parse_error() {
        let base = spawn_eutils().await;
        let err = local_client(&base, "empty")
            .fetch_detail("1")
            .await
            .expect_err("empty body");
        assert!(matches!(err, AffilscanError::Parse(_)));
    }

    #[tokio::test]
    async fn test_search_and_detail_over_http() {
        let base = spawn_eutils().await;
        let client = local_client(&base, "ok");

        let ids = client.search("kras").await.expect("search");
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "1");

        let doc = client.fetch_detail("77").await.expect("detail");
        assert_eq!(doc, "<PMID>77</PMID><Key>secret</Key>");
    }

    #[tokio::test]
    async fn test_blank_query_rejected_before_request() {
        let err = client(None).search("   ").await.expect_err("blank query");
        assert!(err.is_client_error());
    }
}
