use crate::data_api::DataApiOps;
use crate::error::{Error, Result};
use crate::filter::SearchRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{info, instrument};

/// Identifier of one imagery item, as returned by a search.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local file name of the downloaded asset.
    pub fn file_name(&self) -> String {
        format!("{}.tif", self.0)
    }

    /// Whether the id can name a single file and a single URL path segment: not empty,
    /// not `.` or `..`, and free of path separators and NUL.
    pub fn is_safe(&self) -> bool {
        !matches!(self.0.as_str(), "" | "." | "..")
            && !self.0.contains(['/', '\\', '\0'])
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Extracts `features[].id` from a quick-search feature collection, in order.
pub fn parse_feature_ids(url: &str, body: &Value) -> Result<Vec<ItemId>> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(url, "missing 'features' array"))?;

    features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let id = feature
                .get("id")
                .and_then(Value::as_str)
                .map(ItemId::new)
                .ok_or_else(|| Error::malformed(url, format!("feature {i} has no string 'id'")))?;
            if !id.is_safe() {
                return Err(Error::malformed(
                    url,
                    format!("feature {i} has unusable id {:?}", id.as_str()),
                ));
            }
            Ok(id)
        })
        .collect()
}

/// Submits `request` and returns the matching item ids. An empty result is not an error.
#[instrument(skip_all, fields(item_types = ?request.item_types))]
pub async fn search(provider: &impl DataApiOps, request: SearchRequest) -> Result<Vec<ItemId>> {
    let ids = provider.quick_search(request).await?;
    if ids.is_empty() {
        info!("Search matched no items");
    } else {
        info!(count = ids.len(), "Search matched items");
    }
    Ok(ids)
}
