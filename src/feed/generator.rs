//! Feed generator: pagination, filtering and cache orchestration

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use super::render::render;
use super::{Feed, FeedDocument, FeedError, FeedItem, FeedProvider};
use crate::cache::FeedCache;
use crate::data::{FetchOptions, ModFetcher};
use crate::options::FeedOptions;

/// Largest page the mods API will return
pub const MAX_PAGE_SIZE: usize = 100;

/// Builds feeds from the mods API and caches them per option set
pub struct FeedGenerator {
    fetcher: Arc<dyn ModFetcher>,
    defaults: FeedOptions,
    cache: FeedCache,
}

impl FeedGenerator {
    pub fn new(fetcher: Arc<dyn ModFetcher>, defaults: FeedOptions, cache: FeedCache) -> Self {
        Self {
            fetcher,
            defaults,
            cache,
        }
    }

    /// Page through the API and collect the items matching `opts`
    pub async fn generate(&self, opts: &FeedOptions) -> Result<FeedDocument, FeedError> {
        let limit = match opts.max_items {
            0 => MAX_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let mut fetch = FetchOptions {
            limit,
            offset: 0,
            sort: opts.resolved_sort().to_string(),
            tags: opts.tags.clone(),
        };
        let mut document = FeedDocument::default();

        loop {
            let page = self.fetcher.fetch(&fetch).await?;
            let page_len = page.data.len();

            for record in &page.data {
                if limit_reached(opts, &document) {
                    return Ok(document);
                }
                if let Some(platform) = opts.platform {
                    if !record.supports_platform(platform) {
                        continue;
                    }
                }
                document.items.push(FeedItem::from(record));
            }

            fetch.offset += limit;
            let exhausted = page_len < limit
                || (page.result_total > 0 && fetch.offset as u64 >= page.result_total);
            if exhausted || limit_reached(opts, &document) {
                return Ok(document);
            }
        }
    }
}

fn limit_reached(opts: &FeedOptions, document: &FeedDocument) -> bool {
    opts.max_items > 0 && document.items.len() >= opts.max_items
}

#[async_trait]
impl FeedProvider for FeedGenerator {
    async fn get_feed(&self, overrides: &FeedOptions) -> Result<Feed, FeedError> {
        let opts = self.defaults.merge(overrides);
        let key = opts.cache_key();

        let cached = self
            .cache
            .get_or_refresh(&key, opts.fetch_interval, || async {
                let start = Instant::now();
                let document = self.generate(&opts).await?;
                info!(
                    max_items = key.max_items,
                    sort = %key.sort,
                    tags = %key.tags,
                    platform = ?key.platform,
                    items = document.items.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "regenerated feed"
                );
                Ok::<_, FeedError>(document)
            })
            .await?;

        let format = opts.resolved_format();
        let content = render(&cached.document, format, cached.generated_at)?;
        Ok(Feed {
            content,
            format,
            synced_at: cached.generated_at,
        })
    }
}
