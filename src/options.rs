//! Feed options: defaults, per-request overrides, and cache keys
//!
//! A [`FeedOptions`] value doubles as both the configured defaults and the
//! sparse overrides parsed from a request. Unset override fields carry a
//! sentinel (zero, empty, `None`) and leave the default in place when merged.

use std::time::Duration;

use url::form_urlencoded;

use crate::data::Platform;
use crate::feed::FeedFormat;

/// Sort applied when none is requested
pub const DEFAULT_SORT: &str = "recent";

/// Friendly sort names and the upstream fields they map to
const SORT_ALIASES: &[(&str, &str)] = &[
    ("recent", "-date_live"),
    ("last_updated", "-date_updated"),
    ("trending", "-downloads_today"),
    ("highest_rated", "-ratings_weighted_aggregate"),
    ("popular", "-downloads_total"),
    ("subscribers", "-subscribers_total"),
    ("alphabetical", "name"),
];

/// Options controlling how a feed is built and rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOptions {
    /// Maximum number of items, 0 for no limit
    pub max_items: usize,
    /// Sort alias or raw upstream sort field
    pub sort: String,
    /// Tags to filter by; order matters for caching
    pub tags: Vec<String>,
    pub platform: Option<Platform>,
    /// How long a generated feed may be served before regenerating
    pub fetch_interval: Duration,
    pub format: Option<FeedFormat>,
}

/// The part of [`FeedOptions`] that decides whether two requests can share a
/// generated feed. Fetch interval and output format are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub max_items: usize,
    pub sort: String,
    pub tags: String,
    pub platform: Option<Platform>,
}

/// Raw `/feed` query parameters
///
/// Everything is kept as a string so that a malformed value degrades to
/// "not set" instead of rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub max_items: Option<String>,
    pub sort: Option<String>,
    pub tags: Option<String>,
    pub platform: Option<String>,
    pub fetch_interval: Option<String>,
    pub format: Option<String>,
}

impl FeedQuery {
    /// Parse a raw query string
    ///
    /// When a key is repeated the first value is kept. Unknown keys are
    /// ignored.
    pub fn parse(raw: &str) -> FeedQuery {
        let mut query = FeedQuery::default();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "max_items" => &mut query.max_items,
                "sort" => &mut query.sort,
                "tags" => &mut query.tags,
                "platform" => &mut query.platform,
                "fetch_interval" => &mut query.fetch_interval,
                "format" => &mut query.format,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

impl FeedOptions {
    /// Returns a copy of `self` with every set field of `overrides` applied
    pub fn merge(&self, overrides: &FeedOptions) -> FeedOptions {
        let mut merged = self.clone();
        if overrides.max_items > 0 {
            merged.max_items = overrides.max_items;
        }
        if !overrides.sort.is_empty() {
            merged.sort = overrides.sort.clone();
        }
        if !overrides.tags.is_empty() {
            merged.tags = overrides.tags.clone();
        }
        if overrides.platform.is_some() {
            merged.platform = overrides.platform;
        }
        if !overrides.fetch_interval.is_zero() {
            merged.fetch_interval = overrides.fetch_interval;
        }
        if overrides.format.is_some() {
            merged.format = overrides.format;
        }
        merged
    }

    /// The upstream sort field for these options
    pub fn resolved_sort(&self) -> &str {
        resolve_sort(&self.sort)
    }

    /// The format to render in, falling back to the default format
    pub fn resolved_format(&self) -> FeedFormat {
        self.format.unwrap_or_default()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            max_items: self.max_items,
            sort: self.resolved_sort().to_string(),
            tags: self.tags.join(","),
            platform: self.platform,
        }
    }

    /// Parse request overrides from query parameters, dropping invalid values
    pub fn from_query(query: &FeedQuery) -> FeedOptions {
        let mut opts = FeedOptions::default();
        if let Some(max_items) = query.max_items.as_deref().and_then(|v| v.trim().parse().ok()) {
            opts.max_items = max_items;
        }
        if let Some(sort) = query.sort.as_deref() {
            opts.sort = sort.trim().to_string();
        }
        if let Some(tags) = query.tags.as_deref() {
            opts.tags = split_tags(tags);
        }
        opts.platform = query.platform.as_deref().and_then(|p| p.parse().ok());
        if let Some(interval) = query.fetch_interval.as_deref().and_then(parse_duration) {
            opts.fetch_interval = interval;
        }
        opts.format = query.format.as_deref().and_then(|f| f.parse().ok());
        opts
    }
}

/// Map a sort alias to its upstream field
///
/// Unknown values are passed through as raw upstream fields and an empty
/// value resolves the same as `recent`.
pub fn resolve_sort(raw: &str) -> &str {
    let raw = if raw.is_empty() { DEFAULT_SORT } else { raw };
    SORT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, field)| *field)
        .unwrap_or(raw)
}

/// Split a comma-separated tag list, dropping blank entries
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a duration such as `300ms`, `90s`, `5m` or `1h30m`
///
/// Accepts the units `ns`, `us`/`µs`, `ms`, `s`, `m` and `h`, with optional
/// decimal fractions. A bare `0` is zero. Returns `None` for anything else.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input == "0" {
        return Some(Duration::ZERO);
    }
    if input.is_empty() {
        return None;
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * nanos_per_unit;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total.round() as u64))
}
