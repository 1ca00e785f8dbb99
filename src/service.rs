// Forecast service: cache lookup first, fetch and parse on a miss, then repopulate the cache

use crate::cache::{ForecastCache, NoopCache};
use crate::config::ForecastRequest;
use crate::feed_parser::{FeedParser, ParseError};
use crate::fetcher::{FeedFetcher, FetchError};
use crate::forecast::ForecastRecord;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub struct ForecastService {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Arc<dyn ForecastCache>,
    parser: FeedParser,
}

impl ForecastService {
    // Service without a cache: every lookup goes to the feed
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self::with_cache(fetcher, Arc::new(NoopCache))
    }

    pub fn with_cache(fetcher: Arc<dyn FeedFetcher>, cache: Arc<dyn ForecastCache>) -> Self {
        Self {
            fetcher,
            cache,
            parser: FeedParser::new(),
        }
    }

    // Returns the forecast for `request`, from the cache when a fresh entry
    // exists for its path, otherwise from the feed.
    //
    // Cache failures are logged and never fail the lookup.
    pub async fn get_weather(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastRecord, ServiceError> {
        let key = request.cache_key();

        if let Some(record) = self.cached_record(&key) {
            debug!("Cache hit for {}", key);
            return Ok(record);
        }

        debug!("Cache miss for {}", key);
        self.refresh(request).await
    }

    // Fetches and parses the feed regardless of what is cached, then stores
    // the new record.
    pub async fn refresh(&self, request: &ForecastRequest) -> Result<ForecastRecord, ServiceError> {
        let raw = self.fetcher.fetch(&request.host, &request.path).await?;
        let record = self.parser.parse(&raw, request.units)?;

        self.store_record(request, &record);
        Ok(record)
    }

    fn cached_record(&self, key: &str) -> Option<ForecastRecord> {
        let blob = match self.cache.get(key) {
            Ok(blob) => blob?,
            Err(e) => {
                warn!("Cache read for {} failed, treating as miss: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&blob) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn store_record(&self, request: &ForecastRequest, record: &ForecastRecord) {
        let key = request.cache_key();

        let blob = match serde_json::to_vec(record) {
            Ok(blob) => Bytes::from(blob),
            Err(e) => {
                warn!("Could not encode forecast for {}: {}", key, e);
                return;
            }
        };

        match self.cache.put(&key, blob, request.cache_ttl) {
            Ok(()) => info!(
                "Cached forecast for {} under {} for {}s",
                record.location,
                key,
                request.cache_ttl.as_secs()
            ),
            Err(e) => warn!("Cache write for {} failed: {}", key, e),
        }
    }
}
