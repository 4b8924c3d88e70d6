//! Writes an active asset's content to `<dir>/<item id>.tif`.
use crate::data_api::DataApiOps;
use crate::error::{Error, Result};
use crate::planet::{Asset, ItemId};
use futures_util::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

pub const PARTIAL_SUFFIX: &str = "partial";

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Downloads `asset` and returns the written file with its size.
///
/// Content is streamed into `<id>.tif.partial` and renamed into place once complete,
/// replacing any earlier download. On failure the partial file is removed. An id that
/// would not name a single file inside `destination_dir` is refused before any I/O.
#[instrument(skip(provider, asset), fields(item_id = %item_id))]
pub async fn download(
    provider: &impl DataApiOps,
    asset: &Asset,
    destination_dir: &Path,
    item_id: &ItemId,
) -> Result<DownloadedFile> {
    if !item_id.is_safe() {
        return Err(Error::io(
            destination_dir,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("item id {:?} cannot be used as a file name", item_id.as_str()),
            ),
        ));
    }

    let location = asset.location.as_ref().ok_or_else(|| {
        Error::malformed(
            asset.links.self_link.as_str(),
            format!("asset for item {item_id} has no location; is it active?"),
        )
    })?;

    // create_dir_all succeeds when the directory already exists or is created concurrently
    fs::create_dir_all(destination_dir)
        .await
        .map_err(|e| Error::io(destination_dir, e))?;

    let output = destination_dir.join(item_id.file_name());
    let partial = output.with_extension(format!("tif.{PARTIAL_SUFFIX}"));

    let written = match write_partial(provider, location, &partial).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %cleanup, "Unable to remove partial file");
                }
            }
            return Err(e);
        }
    };

    fs::rename(&partial, &output)
        .await
        .map_err(|e| Error::io(&output, e))?;

    info!(path = %output.display(), bytes = written, "Download complete");
    Ok(DownloadedFile {
        path: output,
        bytes: written,
    })
}

async fn write_partial(
    provider: &impl DataApiOps,
    location: &url::Url,
    partial: &Path,
) -> Result<u64> {
    let response = provider.get_content(location).await?;
    let mut file = File::create(partial)
        .await
        .map_err(|e| Error::io(partial, e))?;

    let mut stream = response.bytes_stream();
    let mut byte_count = 0_u64;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| Error::transport(location.as_str(), e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| Error::io(partial, e))?;
        byte_count += bytes.len() as u64;
    }
    file.flush().await.map_err(|e| Error::io(partial, e))?;
    Ok(byte_count)
}
