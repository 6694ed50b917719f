//! Source list loading.
//!
//! `sources.json` names the communities, news sites and forums to visit:
//!
//! ```json
//! { "subreddits": ["UFOs"], "news_sites": ["https://example.com"], "forums": [] }
//! ```
//!
//! A missing or malformed file never aborts the run; it yields an empty
//! [`SourceConfig`] and an error line in the log.

use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tracing::{error, info, instrument};

/// The configured sources for one run. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub subreddits: Vec<String>,
    #[serde(default)]
    pub news_sites: Vec<String>,
    /// Loaded but not consumed by any collector.
    #[serde(default)]
    pub forums: Vec<String>,
}

impl SourceConfig {
    /// Parse a config document. Missing keys default to empty lists.
    pub fn from_json(json: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Load sources from `path`, degrading to an empty config on any error.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_sources(path: impl AsRef<Path>) -> SourceConfig {
    match std::fs::read_to_string(path.as_ref())
        .map_err(Box::<dyn Error>::from)
        .and_then(|s| SourceConfig::from_json(&s))
    {
        Ok(config) => {
            info!(
                subreddits = config.subreddits.len(),
                news_sites = config.news_sites.len(),
                forums = config.forums.len(),
                "Loaded sources"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Error loading sources; continuing with no sources");
            SourceConfig::default()
        }
    }
}
