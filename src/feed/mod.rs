//! Feed generation and rendering
//!
//! [`FeedGenerator`] pages through the mods API, caches the resulting
//! [`FeedDocument`] per option set, and renders it as RSS, Atom, or JSON.

pub mod generator;
pub mod render;

pub use generator::FeedGenerator;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{FetchError, ModRecord};
use crate::options::FeedOptions;

pub const FEED_TITLE: &str = "BG3 Mods Feed";
pub const FEED_DESCRIPTION: &str = "A feed of the latest mods for Baldur's Gate 3";
pub const FEED_LINK: &str = "https://mod.io/g/baldursgate3";

/// Output formats a feed can be rendered in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Rss,
    #[default]
    Atom,
    Json,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "atom",
            FeedFormat::Json => "json",
        }
    }

    /// MIME type served for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            FeedFormat::Rss => "application/rss+xml",
            FeedFormat::Atom => "application/atom+xml",
            FeedFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rss" => Ok(FeedFormat::Rss),
            "atom" => Ok(FeedFormat::Atom),
            "json" => Ok(FeedFormat::Json),
            other => Err(other.to_string()),
        }
    }
}

/// A rendering-ready feed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub author: Option<String>,
    /// Upstream tag names, in upstream order
    pub categories: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<&ModRecord> for FeedItem {
    fn from(record: &ModRecord) -> Self {
        Self {
            id: record.name_id.clone(),
            title: record.name.clone(),
            link: record.profile_url.clone(),
            description: record.summary.clone(),
            content: record.description.clone(),
            author: record
                .submitted_by
                .as_ref()
                .map(|user| user.username.clone())
                .filter(|name| !name.is_empty()),
            categories: record
                .tags
                .iter()
                .map(|tag| tag.name.clone())
                .filter(|name| !name.is_empty())
                .collect(),
            created: record.date_added(),
            updated: record.date_updated(),
        }
    }
}

/// A generated feed, independent of output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

impl Default for FeedDocument {
    fn default() -> Self {
        Self {
            title: FEED_TITLE.to_string(),
            link: FEED_LINK.to_string(),
            description: FEED_DESCRIPTION.to_string(),
            items: Vec::new(),
        }
    }
}

/// A rendered feed ready to be served
#[derive(Debug, Clone)]
pub struct Feed {
    pub content: Vec<u8>,
    pub format: FeedFormat,
    /// When the underlying items were fetched
    pub synced_at: DateTime<Utc>,
}

/// Errors that can occur while producing a feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to fetch mods: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to render feed: {0}")]
    Render(String),
}

/// Produces rendered feeds for a set of request overrides
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn get_feed(&self, overrides: &FeedOptions) -> Result<Feed, FeedError>;
}
