//! Credentials and endpoint configuration passed explicitly to every component.
use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const API_KEY_VAR: &str = "PL_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.planet.com";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A Planet API key, sent as the basic-auth username with an empty password.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("API key is empty".to_string()));
        }
        Ok(Self { api_key })
    }

    /// Reads the key from `PL_API_KEY`. There is no fallback key.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(Error::Config(format!(
                "{API_KEY_VAR} is not set; export your Planet API key"
            ))),
        }
    }

    pub fn username(&self) -> &str {
        &self.api_key
    }
}

// Keep the key out of logs and debug output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    /// Upper bound on one search, metadata or activation request. Content downloads
    /// are not bound by it.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base url {base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Config(format!("base url {base_url} cannot carry a path")));
        }
        Ok(Self {
            base_url: parsed,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_default_url(credentials: Credentials) -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, credentials)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Appends `segments` to the base url, keeping any path prefix the base carries.
    /// Each segment is percent-encoded, so `/`, `?` and `#` inside one stay inside it.
    pub fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        // new() rejects cannot-be-a-base urls, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    pub fn quick_search_url(&self) -> String {
        self.endpoint(&["data", "v1", "quick-search"])
    }

    pub fn assets_url(&self, item_type: &str, item_id: &str) -> String {
        self.endpoint(&[
            "data",
            "v1",
            "item-types",
            item_type,
            "items",
            item_id,
            "assets",
        ])
    }
}
