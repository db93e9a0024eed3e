//! Command-line interface and configuration loading
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (`--config`, TOML/YAML/JSON), then `BG3MODS_*` environment variables, then
//! command-line flags. The result is validated once at startup; an invalid
//! value stops the process before it serves anything.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{builder::BoolishValueParser, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::DEFAULT_CAPACITY;
use crate::data::mods::DEFAULT_API_URL;
use crate::data::Platform;
use crate::feed::FeedFormat;
use crate::options::{parse_duration, split_tags, FeedOptions, DEFAULT_SORT};

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "BG3MODS";
pub const DEFAULT_LISTEN: &str = ":8080";
pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file or environment could not be read
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid feed format: '{0}'. Valid formats: rss, atom, json")]
    InvalidFormat(String),

    #[error("invalid platform: '{0}'. Valid platforms: windows, mac, ps5, xboxseriesx")]
    InvalidPlatform(String),

    #[error("invalid duration for {key}: '{value}'")]
    InvalidDuration { key: &'static str, value: String },

    #[error("cache capacity must be greater than zero")]
    InvalidCapacity,

    #[error("request timeout must be greater than zero")]
    InvalidTimeout,

    #[error("invalid API URL '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid listen address: '{0}'")]
    InvalidListen(String),

    #[error("invalid log level: '{0}'")]
    InvalidLogLevel(String),
}

/// BG3 mods feed - serve mod.io listings as RSS, Atom or JSON feeds
#[derive(Parser, Debug, Default)]
#[command(name = "bg3mods-feed")]
#[command(about = "Serve Baldur's Gate 3 mod listings as RSS, Atom or JSON feeds")]
#[command(version)]
pub struct Cli {
    /// Path to a configuration file (TOML, YAML or JSON)
    #[arg(long, env = "BG3MODS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. ":8080" or "127.0.0.1:8080"
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// The API URL to fetch mods from
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Tags to filter mods by
    #[arg(long, value_delimiter = ',', value_name = "TAGS")]
    pub tags: Option<Vec<String>>,

    /// Platform to filter mods by (windows, mac, ps5, xboxseriesx)
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Maximum number of feed items to render, 0 for no limit
    #[arg(long = "max-feed-items", value_name = "COUNT")]
    pub max_feed_items: Option<usize>,

    /// Sort alias (recent, popular, ...) or raw API sort field
    #[arg(long, value_name = "SORT")]
    pub sort: Option<String>,

    /// How long a generated feed is served before refetching, e.g. "5m"
    #[arg(long = "fetch-interval", value_name = "DURATION")]
    pub fetch_interval: Option<String>,

    /// Default feed format (rss, atom, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Maximum number of distinct option sets kept in the cache
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Timeout for each request to the mods API, e.g. "30s"
    #[arg(long = "request-timeout", value_name = "DURATION")]
    pub request_timeout: Option<String>,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,
}

/// Logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub json: bool,
}

/// Validated runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address in `host:port` form, ready to bind
    pub listen: String,
    pub api_url: Url,
    /// Options applied to requests that do not override them
    pub defaults: FeedOptions,
    pub cache_capacity: NonZeroUsize,
    pub request_timeout: Duration,
    pub logging: LoggingSettings,
}

/// Settings as read from the config file and environment, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    listen: Option<String>,
    #[serde(alias = "api-url")]
    api_url: Option<String>,
    tags: Option<Vec<String>>,
    platform: Option<String>,
    #[serde(alias = "max-feed-items")]
    max_feed_items: Option<usize>,
    sort: Option<String>,
    #[serde(alias = "fetch-interval")]
    fetch_interval: Option<String>,
    format: Option<String>,
    #[serde(alias = "cache-capacity")]
    cache_capacity: Option<usize>,
    #[serde(alias = "request-timeout")]
    request_timeout: Option<String>,
    #[serde(alias = "log-level")]
    log_level: Option<String>,
    #[serde(alias = "log-json")]
    log_json: Option<bool>,
}

impl RawSettings {
    fn apply_cli(&mut self, cli: &Cli) {
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut self.listen, &cli.listen);
        set(&mut self.api_url, &cli.api_url);
        set(&mut self.tags, &cli.tags);
        set(&mut self.platform, &cli.platform);
        set(&mut self.max_feed_items, &cli.max_feed_items);
        set(&mut self.sort, &cli.sort);
        set(&mut self.fetch_interval, &cli.fetch_interval);
        set(&mut self.format, &cli.format);
        set(&mut self.cache_capacity, &cli.cache_capacity);
        set(&mut self.request_timeout, &cli.request_timeout);
        set(&mut self.log_level, &cli.log_level);
        set(&mut self.log_json, &cli.log_json);
    }
}

/// Parses a feed format argument.
///
/// # Arguments
/// * `s` - The format string from CLI, file or environment
///
/// # Returns
/// * `Ok(FeedFormat)` for `rss`, `atom` or `json`
/// * `Err(ConfigError::InvalidFormat)` for anything else
pub fn parse_format_arg(s: &str) -> Result<FeedFormat, ConfigError> {
    FeedFormat::from_str(s).map_err(ConfigError::InvalidFormat)
}

/// Parses a platform argument; an empty value means "no platform filter"
pub fn parse_platform_arg(s: &str) -> Result<Option<Platform>, ConfigError> {
    if s.is_empty() {
        return Ok(None);
    }
    Platform::from_str(s)
        .map(Some)
        .map_err(ConfigError::InvalidPlatform)
}

fn parse_duration_arg(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    })
}

/// Turn a Go-style `:port` into a bindable `0.0.0.0:port`
fn normalize_listen(listen: &str) -> Result<String, ConfigError> {
    let listen = listen.trim();
    let normalized = if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else {
        listen.to_string()
    };

    match normalized.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(normalized),
        _ => Err(ConfigError::InvalidListen(listen.to_string())),
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let listen = normalize_listen(raw.listen.as_deref().unwrap_or(DEFAULT_LISTEN))?;

        let api_url = raw.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url)
            .map_err(|source| ConfigError::InvalidApiUrl { url: api_url, source })?;

        let format = parse_format_arg(raw.format.as_deref().unwrap_or(FeedFormat::default().as_str()))?;
        let platform = parse_platform_arg(raw.platform.as_deref().unwrap_or_default())?;
        let fetch_interval = match raw.fetch_interval.as_deref() {
            Some(value) => parse_duration_arg("fetch-interval", value)?,
            None => DEFAULT_FETCH_INTERVAL,
        };
        let request_timeout = match raw.request_timeout.as_deref() {
            Some(value) => parse_duration_arg("request-timeout", value)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        let cache_capacity = NonZeroUsize::new(raw.cache_capacity.unwrap_or(DEFAULT_CAPACITY))
            .ok_or(ConfigError::InvalidCapacity)?;

        let level = match raw.log_level.as_deref() {
            Some(level) => LevelFilter::from_str(level)
                .map_err(|_| ConfigError::InvalidLogLevel(level.to_string()))?,
            None => LevelFilter::INFO,
        };

        // Tags from the environment arrive as one comma-joined entry
        let tags = raw
            .tags
            .unwrap_or_default()
            .iter()
            .flat_map(|tag| split_tags(tag))
            .collect();

        Ok(Self {
            listen,
            api_url,
            defaults: FeedOptions {
                max_items: raw.max_feed_items.unwrap_or(DEFAULT_MAX_ITEMS),
                sort: raw.sort.unwrap_or_else(|| DEFAULT_SORT.to_string()),
                tags,
                platform,
                fetch_interval,
                format: Some(format),
            },
            cache_capacity,
            request_timeout,
            logging: LoggingSettings {
                level,
                json: raw.log_json.unwrap_or(false),
            },
        })
    }
}

/// Loads settings using file → environment → CLI precedence.
///
/// # Arguments
/// * `cli` - The parsed CLI struct; `cli.config` names the optional file
///
/// # Returns
/// * `Ok(Settings)` with every value validated
/// * `Err(ConfigError::Load)` if the file is missing or unreadable
/// * `Err(ConfigError)` for the first value that fails validation
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    load_with_env_prefix(cli, ENV_PREFIX)
}

/// Like [`load`], reading environment variables under a custom prefix
pub fn load_with_env_prefix(cli: &Cli, env_prefix: &str) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = cli.config.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("tags"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli(cli);
    Settings::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Prefix no real environment sets, so tests only see their own variables
    const TEST_PREFIX: &str = "BG3MODS_UNIT_TEST_UNSET";

    fn load_cli(args: &[&str]) -> Result<Settings, ConfigError> {
        let mut argv = vec!["bg3mods-feed"];
        argv.extend_from_slice(args);
        load_with_env_prefix(&Cli::parse_from(argv), TEST_PREFIX)
    }

    #[test]
    fn test_parse_format_arg() {
        assert_eq!(parse_format_arg("rss").unwrap(), FeedFormat::Rss);
        assert_eq!(parse_format_arg("atom").unwrap(), FeedFormat::Atom);
        assert_eq!(parse_format_arg("json").unwrap(), FeedFormat::Json);

        let err = parse_format_arg("yaml").unwrap_err();
        assert!(err.to_string().contains("invalid feed format"));
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn test_parse_platform_arg() {
        assert_eq!(parse_platform_arg("").unwrap(), None);
        assert_eq!(parse_platform_arg("ps5").unwrap(), Some(Platform::Ps5));
        assert!(matches!(
            parse_platform_arg("switch"),
            Err(ConfigError::InvalidPlatform(p)) if p == "switch"
        ));
    }

    #[test]
    fn test_normalize_listen() {
        assert_eq!(normalize_listen(":8080").unwrap(), "0.0.0.0:8080");
        assert_eq!(normalize_listen("127.0.0.1:9000").unwrap(), "127.0.0.1:9000");
        assert_eq!(normalize_listen("localhost:3000").unwrap(), "localhost:3000");
        assert!(normalize_listen("8080").is_err());
        assert!(normalize_listen(":http").is_err());
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["bg3mods-feed"]);
        assert!(cli.config.is_none());
        assert!(cli.format.is_none());
        assert!(cli.tags.is_none());
    }

    #[test]
    fn test_cli_parse_tags_are_comma_split() {
        let cli = Cli::parse_from(["bg3mods-feed", "--tags", "Gameplay,Classes"]);
        assert_eq!(
            cli.tags,
            Some(vec!["Gameplay".to_string(), "Classes".to_string()])
        );
    }

    #[test]
    fn test_defaults() {
        let settings = load_cli(&[]).expect("defaults should load");

        assert_eq!(settings.listen, "0.0.0.0:8080");
        assert_eq!(settings.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(settings.defaults.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(settings.defaults.sort, "recent");
        assert!(settings.defaults.tags.is_empty());
        assert_eq!(settings.defaults.platform, None);
        assert_eq!(settings.defaults.fetch_interval, DEFAULT_FETCH_INTERVAL);
        assert_eq!(settings.defaults.format, Some(FeedFormat::Atom));
        assert_eq!(settings.cache_capacity.get(), DEFAULT_CAPACITY);
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(!settings.logging.json);
    }

    #[test]
    fn test_cli_flags_override_defaults() {
        let settings = load_cli(&[
            "--listen",
            "127.0.0.1:9000",
            "--tags",
            "Gameplay,Classes",
            "--platform",
            "windows",
            "--max-feed-items",
            "0",
            "--sort",
            "popular",
            "--fetch-interval",
            "90s",
            "--format",
            "json",
            "--cache-capacity",
            "8",
            "--request-timeout",
            "5s",
            "--log-level",
            "debug",
            "--log-json",
            "true",
        ])
        .expect("flags should load");

        assert_eq!(settings.listen, "127.0.0.1:9000");
        assert_eq!(settings.defaults.tags, vec!["Gameplay", "Classes"]);
        assert_eq!(settings.defaults.platform, Some(Platform::Windows));
        assert_eq!(settings.defaults.max_items, 0);
        assert_eq!(settings.defaults.sort, "popular");
        assert_eq!(settings.defaults.fetch_interval, Duration::from_secs(90));
        assert_eq!(settings.defaults.format, Some(FeedFormat::Json));
        assert_eq!(settings.cache_capacity.get(), 8);
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(settings.logging.json);
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let result = load_cli(&["--format", "yaml"]);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(f)) if f == "yaml"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load_cli(&["--platform", "switch"]),
            Err(ConfigError::InvalidPlatform(_))
        ));
        assert!(matches!(
            load_cli(&["--fetch-interval", "soon"]),
            Err(ConfigError::InvalidDuration { key: "fetch-interval", .. })
        ));
        assert!(matches!(
            load_cli(&["--cache-capacity", "0"]),
            Err(ConfigError::InvalidCapacity)
        ));
        assert!(matches!(
            load_cli(&["--request-timeout", "0"]),
            Err(ConfigError::InvalidTimeout)
        ));
        assert!(matches!(
            load_cli(&["--request-timeout", "0s"]),
            Err(ConfigError::InvalidTimeout)
        ));
        assert!(matches!(
            load_cli(&["--api-url", "not a url"]),
            Err(ConfigError::InvalidApiUrl { .. })
        ));
        assert!(matches!(
            load_cli(&["--listen", "nowhere"]),
            Err(ConfigError::InvalidListen(_))
        ));
        assert!(matches!(
            load_cli(&["--log-level", "loud"]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("feed.toml");
        fs::write(
            &path,
            r#"
listen = ":9090"
api-url = "https://example.com/v1/games/1/mods"
tags = ["Gameplay", "Visuals"]
platform = "mac"
max-feed-items = 25
sort = "trending"
fetch-interval = "1h"
format = "rss"
"#,
        )
        .unwrap();

        let settings = load_cli(&["--config", path.to_str().unwrap()]).expect("file should load");

        assert_eq!(settings.listen, "0.0.0.0:9090");
        assert_eq!(settings.api_url.as_str(), "https://example.com/v1/games/1/mods");
        assert_eq!(settings.defaults.tags, vec!["Gameplay", "Visuals"]);
        assert_eq!(settings.defaults.platform, Some(Platform::Mac));
        assert_eq!(settings.defaults.max_items, 25);
        assert_eq!(settings.defaults.sort, "trending");
        assert_eq!(settings.defaults.fetch_interval, Duration::from_secs(3600));
        assert_eq!(settings.defaults.format, Some(FeedFormat::Rss));
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("feed.toml");
        fs::write(&path, "format = \"rss\"\nmax-feed-items = 25\n").unwrap();

        let settings = load_cli(&["--config", path.to_str().unwrap(), "--format", "json"])
            .expect("file should load");

        assert_eq!(settings.defaults.format, Some(FeedFormat::Json));
        assert_eq!(settings.defaults.max_items, 25);
    }

    #[test]
    fn test_invalid_format_in_config_file_is_rejected() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("feed.toml");
        fs::write(&path, "format = \"html\"\n").unwrap();

        let result = load_cli(&["--config", path.to_str().unwrap()]);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = load_cli(&["--config", "/nonexistent/bg3mods-feed.toml"]);
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_environment_is_read_and_flags_win() {
        let prefix = "BG3MODS_UNIT_TEST_ENV";
        std::env::set_var(format!("{prefix}_SORT"), "alphabetical");
        std::env::set_var(format!("{prefix}_TAGS"), "Gameplay,Classes");
        std::env::set_var(format!("{prefix}_MAX_FEED_ITEMS"), "7");
        std::env::set_var(format!("{prefix}_FORMAT"), "rss");

        let cli = Cli::parse_from(["bg3mods-feed", "--format", "json"]);
        let settings = load_with_env_prefix(&cli, prefix).expect("env should load");

        assert_eq!(settings.defaults.sort, "alphabetical");
        assert_eq!(settings.defaults.tags, vec!["Gameplay", "Classes"]);
        assert_eq!(settings.defaults.max_items, 7);
        assert_eq!(settings.defaults.format, Some(FeedFormat::Json));
    }
}
