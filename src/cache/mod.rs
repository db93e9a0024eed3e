//! Cache module for generated feeds
//!
//! This module provides an in-memory cache keyed by the option set a feed was
//! generated for. Entries expire after the caller-supplied TTL and are
//! regenerated lazily by the next request that finds them stale.

mod manager;

pub use manager::{CachedFeed, FeedCache, DEFAULT_CAPACITY};
