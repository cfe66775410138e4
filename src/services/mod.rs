pub mod aggregator;
pub mod browse;
pub mod pipeline;
pub mod providers;
pub mod related;
pub mod scrape;

pub use pipeline::ListLoader;
pub use providers::{EnrichmentProvider, TmdbProvider};
