//! The four remote operations the download flow needs from the Data API.
use crate::filter::SearchRequest;
use crate::planet::{AssetMap, ItemId};
use crate::Result;
use url::Url;

pub trait DataApiOps {
    /// Runs a quick search and returns item ids in the order the provider listed them.
    async fn quick_search(self: &Self, request: SearchRequest) -> Result<Vec<ItemId>>;

    /// Fetches the asset map of one item.
    async fn get_assets(self: &Self, item_type: &str, item_id: &ItemId) -> Result<AssetMap>;

    /// Requests activation; the response body is ignored.
    async fn activate(self: &Self, activation_link: &Url) -> Result<()>;

    /// Starts fetching asset content; the caller consumes the body.
    async fn get_content(self: &Self, location: &Url) -> Result<reqwest::Response>;
}
