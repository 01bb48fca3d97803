//! Wikipedia page text through the MediaWiki action API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::chunker::SourceDocument;
use crate::config::NetworkConfig;
use crate::error::{AcquisitionError, PodcastError, Result};
use crate::providers::{check_status, http_client};
use crate::source::TextProvider;

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const PROVIDER: &str = "Wikipedia";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    pageprops: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    disambiguation: Option<String>,
}

/// Fetches the plain text of the page titled exactly like the topic.
///
/// Redirects are followed but no search is made, so a misspelled topic is
/// `NotFound` rather than silently replaced by a suggestion.
pub struct WikipediaClient {
    inner: reqwest::Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            inner: http_client(network)?,
            api_url: DEFAULT_API_URL.to_string(),
        })
    }

    /// Use another MediaWiki installation or language edition.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

fn query_params(topic: &str) -> [(&'static str, &str); 10] {
    [
        ("action", "query"),
        ("format", "json"),
        ("formatversion", "2"),
        ("prop", "extracts|pageprops"),
        ("explaintext", "1"),
        // Keeps "\n\n\n== Heading ==" section markers in the text.
        ("exsectionformat", "wiki"),
        ("ppprop", "disambiguation"),
        ("redirects", "1"),
        ("titles", topic),
        ("exlimit", "1"),
    ]
}

fn parse_response(topic: &str, response: QueryResponse) -> Result<SourceDocument> {
    let not_found = || AcquisitionError::NotFound {
        topic: topic.to_string(),
    };

    let page = response
        .query
        .and_then(|q| q.pages.into_iter().next())
        .ok_or_else(not_found)?;

    if page.missing || page.invalid {
        return Err(not_found().into());
    }
    if page.pageprops.and_then(|p| p.disambiguation).is_some() {
        return Err(AcquisitionError::Ambiguous {
            topic: topic.to_string(),
        }
        .into());
    }

    let text = page.extract.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AcquisitionError::Empty {
            topic: topic.to_string(),
        }
        .into());
    }

    let title = if page.title.is_empty() {
        topic.to_string()
    } else {
        page.title
    };
    Ok(SourceDocument::new(title, text))
}

#[async_trait]
impl TextProvider for WikipediaClient {
    async fn fetch(&self, topic: &str) -> Result<SourceDocument> {
        if topic.trim().is_empty() {
            return Err(AcquisitionError::NotFound {
                topic: topic.to_string(),
            }
            .into());
        }

        let response = self
            .inner
            .get(&self.api_url)
            .query(&query_params(topic))
            .send()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;

        let document = parse_response(topic, body)?;
        info!(topic, title = %document.topic, chars = document.text.len(), "fetched page");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(topic: &str, body: &str) -> Result<SourceDocument> {
        parse_response(topic, serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_page_text_returned() {
        let body = r#"{
            "batchcomplete": true,
            "query": {
                "redirects": [{"from": "Robin", "to": "European robin"}],
                "pages": [{
                    "pageid": 1,
                    "ns": 0,
                    "title": "European robin",
                    "extract": "The European robin is a small insectivorous passerine bird.\n\n\n== Taxonomy ==\nIt was described in 1758."
                }]
            }
        }"#;
        let doc = parse("Robin", body).unwrap();
        assert_eq!(doc.topic, "European robin");
        assert!(doc.text.contains("\n\n\n== Taxonomy =="));
    }

    #[test]
    fn test_missing_page_is_not_found() {
        let body = r#"{"query": {"pages": [{"ns": 0, "title": "Robinn", "missing": true}]}}"#;
        let err = parse("Robinn", body).unwrap_err();
        assert!(matches!(err, PodcastError::Acquisition(AcquisitionError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_title_is_not_found() {
        let body = r#"{"query": {"pages": [{"title": "<>", "invalidreason": "bad", "invalid": true}]}}"#;
        assert!(matches!(
            parse("<>", body),
            Err(PodcastError::Acquisition(AcquisitionError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_disambiguation_is_ambiguous() {
        let body = r#"{"query": {"pages": [{
            "ns": 0,
            "title": "Mercury",
            "extract": "Mercury may refer to:",
            "pageprops": {"disambiguation": ""}
        }]}}"#;
        assert!(matches!(
            parse("Mercury", body),
            Err(PodcastError::Acquisition(AcquisitionError::Ambiguous { .. }))
        ));
    }

    #[test]
    fn test_blank_extract_is_empty() {
        let body = r#"{"query": {"pages": [{"ns": 0, "title": "Robin", "extract": "  "}]}}"#;
        assert!(matches!(
            parse("Robin", body),
            Err(PodcastError::Acquisition(AcquisitionError::Empty { .. }))
        ));
    }

    #[test]
    fn test_no_query_is_not_found() {
        assert!(parse("Robin", r#"{"batchcomplete": true}"#).is_err());
    }

    #[test]
    fn test_query_params_disable_search() {
        let params = query_params("Common Blackbird");
        assert!(params.contains(&("titles", "Common Blackbird")));
        assert!(params.iter().all(|(k, _)| *k != "list" && *k != "generator"));
    }
}
