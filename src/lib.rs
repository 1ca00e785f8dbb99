// BBC Weather three-day forecast client with a TTL cache in front of the feed

pub mod cache;
pub mod config;
pub mod feed_parser;
pub mod fetcher;
pub mod forecast;
pub mod service;
pub mod xml_feed;

// Re-export key types for convenience
pub use cache::{CacheError, CacheStatsReport, ForecastCache, InMemoryCache, NoopCache};
pub use config::{ConfigError, ForecastConfig, ForecastRequest};
pub use feed_parser::{FeedParser, ParseError};
pub use fetcher::{FeedFetcher, FetchError, FetcherConfig, HttpFetcher};
pub use forecast::{DayEntry, FeedImage, ForecastRecord, UnitSystem};
pub use service::{ForecastService, ServiceError};
