use crate::data_api::DataApiOps;
use crate::download::{download, DownloadedFile};
use crate::error::{Error, FailureKind};
use crate::image_selection::ImageSelection;
use crate::planet::{resolve_active_asset, search, ItemId};
use crate::poll::PollPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Item ids to fetch, in search order, and where to put them.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    item_type: String,
    asset_kind: String,
    output_dir: PathBuf,
    item_ids: Vec<ItemId>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Downloaded { path: PathBuf, bytes: u64 },
    Failed { kind: FailureKind, reason: String },
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub item_id: ItemId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn downloaded(self: &Self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, Outcome::Downloaded { .. }))
            .count()
    }

    pub fn failed(self: &Self) -> usize {
        self.items.len() - self.downloaded()
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl DownloadPlan {
    pub fn new(
        item_type: &str,
        asset_kind: &str,
        output_dir: impl Into<PathBuf>,
        item_ids: Vec<ItemId>,
    ) -> Self {
        Self {
            item_type: item_type.to_string(),
            asset_kind: asset_kind.to_string(),
            output_dir: output_dir.into(),
            item_ids,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn item_ids(self: &Self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn output_dir(self: &Self) -> &Path {
        &self.output_dir
    }

    /// Fetches every item in turn. Failures are recorded per item and the batch moves on,
    /// except for authentication failures, which would fail every remaining item too.
    pub async fn execute(self: &Self, provider: &impl DataApiOps, policy: &PollPolicy) -> BatchReport {
        let mut report = BatchReport::default();
        let mut auth_failure: Option<String> = None;

        for (i, item_id) in self.item_ids.iter().enumerate() {
            if let Some(reason) = &auth_failure {
                report.items.push(ItemOutcome {
                    item_id: item_id.clone(),
                    outcome: Outcome::Failed {
                        kind: FailureKind::Auth,
                        reason: reason.clone(),
                    },
                });
                continue;
            }

            info!(item = %item_id, n = i + 1, of = self.item_ids.len(), "Current task");
            let outcome = match try_download(provider, self, item_id, policy).await {
                Ok(file) => Outcome::Downloaded {
                    path: file.path,
                    bytes: file.bytes,
                },
                Err(e) => {
                    if matches!(e, Error::Auth { .. }) {
                        error!(item = %item_id, error = %e, "Authentication rejected, stopping batch");
                        auth_failure = Some(e.to_string());
                    } else {
                        warn!(item = %item_id, error = %e, "Item failed");
                    }
                    Outcome::Failed {
                        kind: e.kind(),
                        reason: e.to_string(),
                    }
                }
            };
            report.items.push(ItemOutcome {
                item_id: item_id.clone(),
                outcome,
            });
        }

        info!(
            downloaded = report.downloaded(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }
}

/// Resolve, activate and download a single item; activation always precedes the download.
pub async fn try_download(
    provider: &impl DataApiOps,
    plan: &DownloadPlan,
    item_id: &ItemId,
    policy: &PollPolicy,
) -> crate::Result<DownloadedFile> {
    let asset =
        resolve_active_asset(provider, &plan.item_type, item_id, &plan.asset_kind, policy).await?;
    download(provider, &asset, &plan.output_dir, item_id).await
}

/// Runs the selection's search and builds a plan from the results.
pub async fn generate_download_plan(
    provider: &impl DataApiOps,
    selection: &ImageSelection,
    output_dir: PathBuf,
) -> crate::Result<DownloadPlan> {
    let mut item_ids = search(provider, selection.search_request()).await?;
    if let Some(limit) = selection.limit() {
        item_ids.truncate(limit);
    }
    Ok(DownloadPlan::new(
        &selection.item_type,
        &selection.asset_kind,
        output_dir,
        item_ids,
    ))
}
