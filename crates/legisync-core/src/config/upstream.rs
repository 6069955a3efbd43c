//! Upstream legislative API configuration.

use serde::{Deserialize, Serialize};

/// Settings for the Chamber of Deputies open-data API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL (no trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Items requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Hard stop when paging, to bound runaway pagination.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://dadosabertos.camara.leg.br/api/v2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    500
}

fn default_user_agent() -> String {
    concat!("legisync/", env!("CARGO_PKG_VERSION")).to_string()
}
