//! BG3 Mods Feed - serve Baldur's Gate 3 mod listings as syndication feeds
//!
//! An HTTP service that pages through the mod.io mods API and renders the
//! result as RSS, Atom or JSON Feed, caching each option set between fetches.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use bg3mods_feed::cache::FeedCache;
use bg3mods_feed::cli::{self, Cli};
use bg3mods_feed::data::ModsClient;
use bg3mods_feed::feed::FeedGenerator;
use bg3mods_feed::{server, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments and layer them over file and env config
    let cli = Cli::parse();
    let settings = match cli::load(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = telemetry::init(&settings.logging) {
        eprintln!("Error: failed to install tracing subscriber: {err}");
        return ExitCode::FAILURE;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: cli::Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        listen = %settings.listen,
        api_url = %settings.api_url,
        max_items = settings.defaults.max_items,
        sort = %settings.defaults.sort,
        tags = %settings.defaults.tags.join(","),
        platform = ?settings.defaults.platform,
        fetch_interval = ?settings.defaults.fetch_interval,
        format = ?settings.defaults.format,
        cache_capacity = settings.cache_capacity.get(),
        "starting feed server"
    );

    let client = ModsClient::new(settings.api_url.as_str(), settings.request_timeout)?;
    let generator = FeedGenerator::new(
        Arc::new(client),
        settings.defaults,
        FeedCache::new(settings.cache_capacity),
    );

    let listener = TcpListener::bind(settings.listen.as_str()).await?;
    server::serve(listener, server::router(Arc::new(generator))).await?;
    Ok(())
}
