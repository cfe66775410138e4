use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key used for enrichment lookups
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Base URL of the scraped list site
    #[serde(default = "default_letterboxd_base_url")]
    pub letterboxd_base_url: String,

    /// Redis connection URL; snapshots stay in memory when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Retries after the first failed attempt of a listing page
    #[serde(default = "default_max_page_retries")]
    pub max_page_retries: usize,

    #[serde(default = "default_page_retry_delay_ms")]
    pub page_retry_delay_ms: u64,

    /// Pause before fetching page 2 and later
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Upper bound on films processed at the same time
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Timeout applied to every outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Lifetime of a stored collection snapshot in Redis
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_letterboxd_base_url() -> String {
    "https://letterboxd.com".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_page_retries() -> usize {
    2
}

fn default_page_retry_delay_ms() -> u64 {
    3000
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_max_concurrent_items() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_snapshot_ttl_secs() -> u64 {
    30 * 24 * 3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            base_url: self.letterboxd_base_url.trim_end_matches('/').to_string(),
            max_page_retries: self.max_page_retries,
            page_retry_delay: Duration::from_millis(self.page_retry_delay_ms),
            page_delay: Duration::from_millis(self.page_delay_ms),
            max_concurrent_items: self.max_concurrent_items.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Knobs of the scraping pipeline, split out so tests can run without delays
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub max_page_retries: usize,
    pub page_retry_delay: Duration,
    pub page_delay: Duration,
    pub max_concurrent_items: usize,
}
