use super::ItemId;
use crate::data_api::DataApiOps;
use crate::error::{Error, Result};
use crate::poll::PollPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Inactive,
    Activating,
    Active,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AssetLinks {
    pub activate: Url,
    #[serde(rename = "_self")]
    pub self_link: Url,
}

/// Snapshot of one asset. `location` is only set once the asset is active.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Asset {
    pub status: AssetStatus,
    #[serde(rename = "_links")]
    pub links: AssetLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Url>,
}

impl Asset {
    pub fn is_active(&self) -> bool {
        self.status == AssetStatus::Active
    }
}

/// Asset kinds of one item, keyed by kind name (`ortho_analytic_4b`, ...).
///
/// Entries are kept as raw JSON and only decoded on lookup, so a kind we do not
/// understand never breaks access to the one we asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMap {
    item_id: ItemId,
    url: String,
    entries: Map<String, Value>,
}

impl AssetMap {
    pub fn from_json(item_id: ItemId, url: &str, body: Value) -> Result<Self> {
        match body {
            Value::Object(entries) => Ok(Self {
                item_id,
                url: url.to_string(),
                entries,
            }),
            _ => Err(Error::malformed(url, "asset listing is not a JSON object")),
        }
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn asset(&self, kind: &str) -> Result<Asset> {
        let entry = self.entries.get(kind).ok_or_else(|| Error::NotFound {
            what: format!(
                "asset '{kind}' for item {} (available: {})",
                self.item_id,
                self.kinds().join(", ")
            ),
        })?;
        serde_json::from_value(entry.clone())
            .map_err(|e| Error::malformed(&self.url, format!("asset '{kind}': {e}")))
    }

    /// Status of every kind; `None` where the entry carries no recognizable status.
    pub fn statuses(&self) -> Vec<(String, Option<AssetStatus>)> {
        self.entries
            .iter()
            .map(|(kind, entry)| {
                let status = entry
                    .get("status")
                    .cloned()
                    .and_then(|s| serde_json::from_value(s).ok());
                (kind.clone(), status)
            })
            .collect()
    }
}

/// Lists the asset kinds of an item together with their activation status.
pub async fn list_assets(
    provider: &impl DataApiOps,
    item_type: &str,
    item_id: &ItemId,
) -> Result<Vec<(String, Option<AssetStatus>)>> {
    let map = provider.get_assets(item_type, item_id).await?;
    Ok(map.statuses())
}

fn require_location(item_id: &ItemId, asset: Asset) -> Result<Asset> {
    if asset.location.is_none() {
        return Err(Error::malformed(
            asset.links.self_link.as_str(),
            format!("active asset for item {item_id} has no location"),
        ));
    }
    Ok(asset)
}

/// Returns the `asset_kind` asset of `item_id` once it is active, activating it first
/// when necessary.
///
/// An asset that is already active costs one metadata fetch. Otherwise one activation
/// request is sent and the asset map is re-fetched under `policy` until the asset
/// reports `active`, or [`Error::ActivationTimeout`] once the budget runs out.
#[instrument(skip(provider, policy), fields(item_id = %item_id))]
pub async fn resolve_active_asset(
    provider: &impl DataApiOps,
    item_type: &str,
    item_id: &ItemId,
    asset_kind: &str,
    policy: &PollPolicy,
) -> Result<Asset> {
    let asset = provider
        .get_assets(item_type, item_id)
        .await?
        .asset(asset_kind)?;

    if asset.is_active() {
        debug!("Asset already active");
        return require_location(item_id, asset);
    }

    info!(status = %asset.status, "Requesting activation");
    // Activation may already be under way server-side, so a failed trigger is not fatal.
    if let Err(e) = provider.activate(&asset.links.activate).await {
        warn!(error = %e, "Activation request failed, polling anyway");
    }

    let mut budget = policy.start();
    while budget.next().await {
        let fetch = provider.get_assets(item_type, item_id);
        // a hung request must not outlive the polling deadline
        let fetched = match budget.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, fetch)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        url: format!("assets of {item_type} item {item_id}"),
                    })
                }),
            None => fetch.await,
        };
        let polled = fetched.and_then(|map| map.asset(asset_kind));
        match polled {
            Ok(asset) if asset.is_active() => {
                info!(polls = budget.attempts(), "Asset active");
                return require_location(item_id, asset);
            }
            Ok(asset) => debug!(poll = budget.attempts(), status = %asset.status, "Not active yet"),
            Err(e) if e.is_retryable() => {
                warn!(poll = budget.attempts(), error = %e, "Poll failed, retrying")
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::ActivationTimeout {
        item_id: item_id.to_string(),
        attempts: budget.attempts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SearchRequest;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const KIND: &str = "ortho_analytic_4b";

    fn asset_json(status: &str) -> Value {
        let mut asset = json!({
            "status": status,
            "type": KIND,
            "_links": {
                "activate": "https://api.planet.com/data/v1/assets/abc/activate",
                "_self": "https://api.planet.com/data/v1/assets/abc",
                "type": "https://api.planet.com/data/v1/asset-types/ortho_analytic_4b"
            },
            "_permissions": ["download"]
        });
        if status == "active" {
            asset["location"] = json!("https://api.planet.com/data/v1/download?token=t");
        }
        asset
    }

    #[derive(Clone, Copy)]
    enum Reply {
        Status(&'static str),
        Unavailable,
        Hang,
    }

    /// Replays scripted asset statuses and counts calls.
    struct ScriptedApi {
        replies: Mutex<VecDeque<Reply>>,
        fetches: AtomicU32,
        activations: AtomicU32,
    }

    impl ScriptedApi {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fetches: AtomicU32::new(0),
                activations: AtomicU32::new(0),
            }
        }

        fn fetches(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }

        fn activations(&self) -> u32 {
            self.activations.load(Ordering::SeqCst)
        }
    }

    impl DataApiOps for ScriptedApi {
        async fn quick_search(self: &Self, _request: SearchRequest) -> Result<Vec<ItemId>> {
            unimplemented!()
        }

        async fn get_assets(self: &Self, _item_type: &str, item_id: &ItemId) -> Result<AssetMap> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                // The last scripted reply repeats forever.
                if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    *replies.front().unwrap()
                }
            };
            match reply {
                Reply::Hang => std::future::pending().await,
                Reply::Status(status) => {
                    AssetMap::from_json(item_id.clone(), "mock", json!({ KIND: asset_json(status) }))
                }
                Reply::Unavailable => Err(Error::HttpStatus {
                    url: "mock".into(),
                    status: 503,
                }),
            }
        }

        async fn activate(self: &Self, _activation_link: &Url) -> Result<()> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_content(self: &Self, _location: &Url) -> Result<reqwest::Response> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_active_asset_returns_immediately() {
        let api = ScriptedApi::new(vec![Reply::Status("active")]);
        let asset = resolve_active_asset(&api, "PSScene", &"id1".into(), KIND, &PollPolicy::immediate(5))
            .await
            .unwrap();
        assert!(asset.is_active());
        assert!(asset.location.is_some());
        assert_eq!(api.fetches(), 1);
        assert_eq!(api.activations(), 0);
    }

    #[tokio::test]
    async fn test_inactive_asset_activates_once_then_polls() {
        let api = ScriptedApi::new(vec![
            Reply::Status("inactive"),
            Reply::Status("activating"),
            Reply::Status("activating"),
            Reply::Status("active"),
        ]);
        let asset = resolve_active_asset(&api, "PSScene", &"id1".into(), KIND, &PollPolicy::immediate(10))
            .await
            .unwrap();
        assert!(asset.is_active());
        assert_eq!(api.activations(), 1);
        // initial fetch plus three polls
        assert_eq!(api.fetches(), 4);
    }

    #[tokio::test]
    async fn test_never_active_times_out() {
        let api = ScriptedApi::new(vec![Reply::Status("inactive")]);
        let err = resolve_active_asset(&api, "PSScene", &"id1".into(), KIND, &PollPolicy::immediate(4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ActivationTimeout { attempts: 4, .. }));
        assert_eq!(api.fetches(), 5);
        assert_eq!(api.activations(), 1);
    }

    #[tokio::test]
    async fn test_transient_poll_failures_are_retried() {
        let api = ScriptedApi::new(vec![
            Reply::Status("inactive"),
            Reply::Unavailable,
            Reply::Unavailable,
            Reply::Status("active"),
        ]);
        let asset = resolve_active_asset(&api, "PSScene", &"id1".into(), KIND, &PollPolicy::immediate(3))
            .await
            .unwrap();
        assert!(asset.is_active());
        assert_eq!(api.fetches(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_poll_is_cut_off_at_deadline() {
        let api = ScriptedApi::new(vec![Reply::Status("inactive"), Reply::Hang]);
        let policy = PollPolicy::immediate(10).with_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();

        let err = resolve_active_asset(&api, "PSScene", &"id1".into(), KIND, &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ActivationTimeout { attempts: 1, .. }));
        assert_eq!(api.fetches(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_asset_kind_is_not_found() {
        let api = ScriptedApi::new(vec![Reply::Status("active")]);
        let err = resolve_active_asset(&api, "PSScene", &"id1".into(), "basic_udm2", &PollPolicy::immediate(3))
            .await
            .unwrap_err();
        match err {
            Error::NotFound { what } => assert!(what.contains(KIND)),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(api.activations(), 0);
    }

    #[test]
    fn test_active_without_location_is_malformed() {
        let mut entry = asset_json("active");
        entry.as_object_mut().unwrap().remove("location");
        let map = AssetMap::from_json("id1".into(), "u", json!({ KIND: entry })).unwrap();
        let asset = map.asset(KIND).unwrap();
        assert!(matches!(
            require_location(&"id1".into(), asset),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let map = AssetMap::from_json("id1".into(), "u", json!({ KIND: asset_json("queued") })).unwrap();
        assert!(matches!(map.asset(KIND), Err(Error::MalformedResponse { .. })));
        assert_eq!(map.statuses(), vec![(KIND.to_string(), None)]);
    }

    #[test]
    fn test_non_object_listing() {
        assert!(AssetMap::from_json("id1".into(), "u", json!([1, 2])).is_err());
    }
}
