//! mod.io listing API client
//!
//! This module fetches pages of mods from the mod.io embed API and decodes
//! them into [`ModsPage`] values.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::ModsPage;

/// Default listing endpoint for Baldur's Gate 3 mods
pub const DEFAULT_API_URL: &str = "https://embed.modhub.io/v1/games/6715/mods";

/// Largest slice of an error body kept in [`FetchError::Status`]
const ERROR_BODY_LIMIT: usize = 512;

/// Paging and filtering parameters for a single listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub limit: usize,
    pub offset: usize,
    /// Upstream sort field, e.g. `-date_live`
    pub sort: String,
    pub tags: Vec<String>,
}

/// Errors that can occur when fetching mods
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or transport failure
    #[error("request to mods API failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with something other than 200 OK
    #[error("unexpected status code {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON
    #[error("failed to decode mods response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured API URL could not be parsed
    #[error("invalid mods API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Source of mod listing pages
#[async_trait]
pub trait ModFetcher: Send + Sync {
    /// Fetch one page of mods
    async fn fetch(&self, opts: &FetchOptions) -> Result<ModsPage, FetchError>;
}

/// Client for the mod.io listing endpoint
#[derive(Debug, Clone)]
pub struct ModsClient {
    client: Client,
    api_url: Url,
}

impl ModsClient {
    /// Creates a client for the given listing URL.
    ///
    /// # Arguments
    /// * `api_url` - The mods listing endpoint, e.g. [`DEFAULT_API_URL`]
    /// * `timeout` - Applied to each upstream request as a whole
    ///
    /// # Returns
    /// * `Ok(ModsClient)` ready to fetch pages
    /// * `Err(FetchError::InvalidUrl)` if `api_url` does not parse
    /// * `Err(FetchError::Transport)` if the HTTP client cannot be built
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, Url::parse(api_url)?))
    }

    /// Create a client around an existing HTTP client
    pub fn with_client(client: Client, api_url: Url) -> Self {
        Self { client, api_url }
    }

    /// Build the request URL for the given options
    ///
    /// Parameters that are unset (zero limit/offset, empty sort or tags) are
    /// left out so the API applies its own defaults.
    pub fn request_url(&self, opts: &FetchOptions) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut query = url.query_pairs_mut();
            if opts.limit > 0 {
                query.append_pair("_limit", &opts.limit.to_string());
            }
            if opts.offset > 0 {
                query.append_pair("_offset", &opts.offset.to_string());
            }
            if !opts.sort.is_empty() {
                query.append_pair("_sort", &opts.sort);
            }
            if !opts.tags.is_empty() {
                query.append_pair("tags-in", &opts.tags.join(","));
            }
        }
        url
    }
}

#[async_trait]
impl ModFetcher for ModsClient {
    async fn fetch(&self, opts: &FetchOptions) -> Result<ModsPage, FetchError> {
        let url = self.request_url(opts);
        debug!(url = %url, "fetching mods");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header("X-Modio-Origin", "web")
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample listing response trimmed from the live API
    const VALID_RESPONSE: &str = r#"{
        "data": [
            {
                "id": 3001,
                "game_id": 6715,
                "status": 1,
                "visible": 1,
                "submitted_by": {"id": 9, "username": "tav", "profile_url": "https://mod.io/u/tav"},
                "date_added": 1700000000,
                "date_updated": 1700003600,
                "date_live": 1700000100,
                "name": "Party Limit Begone",
                "name_id": "party-limit-begone",
                "summary": "Raise the party size",
                "description": "<p>Raise the party size</p>",
                "profile_url": "https://mod.io/g/baldursgate3/m/party-limit-begone",
                "modfile": {
                    "id": 11,
                    "version": "1.2.0",
                    "platforms": [
                        {"platform": "windows", "status": 1, "modfile_live": 11},
                        {"platform": "ps5", "status": 0, "modfile_live": 0}
                    ]
                },
                "tags": [{"name": "Gameplay", "name_localized": "Gameplay"}]
            }
        ],
        "result_count": 1,
        "result_limit": 100,
        "result_offset": 0,
        "result_total": 1
    }"#;

    fn client() -> ModsClient {
        ModsClient::new(DEFAULT_API_URL, Duration::from_secs(5)).expect("client should build")
    }

    #[test]
    fn test_parse_valid_response() {
        let page: ModsPage = serde_json::from_str(VALID_RESPONSE).expect("Failed to parse");
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.result_total, 1);
        assert_eq!(page.result_limit, 100);

        let record = &page.data[0];
        assert_eq!(record.name_id, "party-limit-begone");
        assert_eq!(record.submitted_by.as_ref().unwrap().username, "tav");
        assert_eq!(record.tags[0].name, "Gameplay");
        assert!(record.supports_platform(crate::data::Platform::Windows));
        assert!(!record.supports_platform(crate::data::Platform::Ps5));
    }

    #[test]
    fn test_parse_missing_data_is_error() {
        let result: Result<ModsPage, _> = serde_json::from_str(r#"{"result_total": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_url_includes_all_parameters() {
        let url = client().request_url(&FetchOptions {
            limit: 25,
            offset: 50,
            sort: "-date_live".to_string(),
            tags: vec!["Gameplay".to_string(), "Classes".to_string()],
        });

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("_limit".to_string(), "25".to_string()),
                ("_offset".to_string(), "50".to_string()),
                ("_sort".to_string(), "-date_live".to_string()),
                ("tags-in".to_string(), "Gameplay,Classes".to_string()),
            ]
        );
        assert_eq!(url.path(), "/v1/games/6715/mods");
    }

    #[test]
    fn test_request_url_omits_unset_parameters() {
        let url = client().request_url(&FetchOptions {
            limit: 10,
            ..Default::default()
        });
        assert_eq!(url.query(), Some("_limit=10"));
    }

    #[test]
    fn test_request_url_keeps_existing_query() {
        let client = ModsClient::with_client(
            Client::new(),
            Url::parse("https://example.com/mods?api_key=abc").unwrap(),
        );
        let url = client.request_url(&FetchOptions {
            limit: 5,
            ..Default::default()
        });
        assert_eq!(url.query(), Some("api_key=abc&_limit=5"));
    }

    #[test]
    fn test_invalid_api_url() {
        let result = ModsClient::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_truncate_body_respects_limit_and_char_boundaries() {
        assert_eq!(truncate_body("short".to_string()), "short");

        let long = "é".repeat(ERROR_BODY_LIMIT);
        let truncated = truncate_body(long);
        assert!(truncated.len() <= ERROR_BODY_LIMIT);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_status_error_message() {
        let err = FetchError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status code 503: maintenance");
    }
}
