use super::{parse_feature_ids, AssetMap, ItemId};
use crate::config::{ClientConfig, Credentials};
use crate::data_api::DataApiOps;
use crate::error::{Error, Result};
use crate::filter::SearchRequest;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Planet Data API over HTTPS, authenticating every call with the API key.
pub struct Provider {
    client: Client,
    config: ClientConfig,
}

impl Provider {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("unable to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Planet production endpoint with the key from `PL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()?;
        Self::new(ClientConfig::with_default_url(credentials)?)
    }

    pub fn config(self: &Self) -> &ClientConfig {
        &self.config
    }

    /// Applies the per-request timeout. Content downloads stay unbounded.
    fn bounded(self: &Self, request: RequestBuilder) -> RequestBuilder {
        request.timeout(self.config.request_timeout)
    }

    fn authed(self: &Self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(self.config.credentials.username(), Some(""))
    }

    /// Sends `request` and turns transport failures and non-success statuses into errors.
    async fn send(self: &Self, url: &str, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(|e| Error::transport(url, e))?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Response received");
        if !status.is_success() {
            return Err(Error::from_status(url, status));
        }
        Ok(response)
    }

    async fn read_json(url: &str, response: Response) -> Result<Value> {
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(url, e))?;
        serde_json::from_slice(&body).map_err(|e| Error::malformed(url, e.to_string()))
    }
}

impl DataApiOps for Provider {
    #[instrument(skip_all)]
    async fn quick_search(self: &Self, request: SearchRequest) -> Result<Vec<ItemId>> {
        let url = self.config.quick_search_url();
        let response = self
            .send(&url, self.bounded(self.client.post(&url).json(&request)))
            .await?;
        let body = Self::read_json(&url, response).await?;
        parse_feature_ids(&url, &body)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn get_assets(self: &Self, item_type: &str, item_id: &ItemId) -> Result<AssetMap> {
        if !item_id.is_safe() {
            return Err(Error::NotFound {
                what: format!("item {:?}: not a usable item id", item_id.as_str()),
            });
        }
        let url = self.config.assets_url(item_type, item_id.as_str());
        let response = match self.send(&url, self.bounded(self.client.get(&url))).await {
            Err(Error::NotFound { .. }) => {
                return Err(Error::NotFound {
                    what: format!("item {item_id} of type {item_type}"),
                })
            }
            other => other?,
        };
        let body = Self::read_json(&url, response).await?;
        AssetMap::from_json(item_id.clone(), &url, body)
    }

    #[instrument(skip_all, fields(link = %activation_link))]
    async fn activate(self: &Self, activation_link: &Url) -> Result<()> {
        let request = self.bounded(self.client.get(activation_link.clone()));
        self.send(activation_link.as_str(), request).await?;
        Ok(())
    }

    async fn get_content(self: &Self, location: &Url) -> Result<Response> {
        self.send(location.as_str(), self.client.get(location.clone()))
            .await
    }
}
