//! BG3 Mods Feed Library
//!
//! Fetches Baldur's Gate 3 mod listings from the mod.io API and serves them
//! as RSS, Atom or JSON feeds. Exposed as a library for integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod feed;
pub mod options;
pub mod server;
pub mod telemetry;
