//! Core data models for the mod feed
//!
//! This module contains the upstream mod.io record types consumed by the feed
//! generator, plus the platform enumeration used for filtering.

pub mod mods;

pub use mods::{FetchError, FetchOptions, ModFetcher, ModsClient};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Platforms a mod file can be published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Mac,
    Ps5,
    #[serde(rename = "xboxseriesx")]
    XboxSeriesX,
}

impl Platform {
    /// The identifier mod.io uses for this platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Mac => "mac",
            Platform::Ps5 => "ps5",
            Platform::XboxSeriesX => "xboxseriesx",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "windows" => Ok(Platform::Windows),
            "mac" => Ok(Platform::Mac),
            "ps5" => Ok(Platform::Ps5),
            "xboxseriesx" => Ok(Platform::XboxSeriesX),
            other => Err(other.to_string()),
        }
    }
}

/// One page of results from the mods endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModsPage {
    pub data: Vec<ModRecord>,
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub result_limit: u64,
    #[serde(default)]
    pub result_offset: u64,
    #[serde(default)]
    pub result_total: u64,
}

/// A single mod entry as returned by mod.io
///
/// Only the fields the feed needs are modelled; everything else in the
/// upstream payload is ignored during decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModRecord {
    pub id: u64,
    pub name: String,
    pub name_id: String,
    pub summary: String,
    pub description: String,
    pub profile_url: String,
    #[serde(rename = "date_added")]
    pub date_added_epoch: i64,
    #[serde(rename = "date_updated")]
    pub date_updated_epoch: i64,
    pub submitted_by: Option<Submitter>,
    pub modfile: Option<Modfile>,
    pub tags: Vec<Tag>,
}

/// The user who submitted a mod
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Submitter {
    pub username: String,
}

/// The live file attached to a mod
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modfile {
    pub platforms: Vec<PlatformStatus>,
}

/// Per-platform approval state of a mod file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformStatus {
    pub platform: String,
    /// 1 when the file is approved for the platform
    pub status: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
}

impl ModRecord {
    pub fn date_added(&self) -> DateTime<Utc> {
        epoch_to_utc(self.date_added_epoch)
    }

    pub fn date_updated(&self) -> DateTime<Utc> {
        epoch_to_utc(self.date_updated_epoch)
    }

    /// Whether the mod's current file is active on the given platform
    pub fn supports_platform(&self, platform: Platform) -> bool {
        self.modfile
            .as_ref()
            .and_then(|file| {
                file.platforms
                    .iter()
                    .find(|p| p.platform == platform.as_str())
            })
            .map(|p| p.status == 1)
            .unwrap_or(false)
    }
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}
