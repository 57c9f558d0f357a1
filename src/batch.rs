//! Batch conversion from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ugoiraforge_common::ArtworkId;

use crate::conversion::Scheduler;

/// Outcome of one id in a batch.
#[derive(Debug)]
pub enum BatchItem {
    Written { id: ArtworkId, path: PathBuf },
    Failed { id: ArtworkId, reason: String },
}

/// Split raw arguments into artwork ids.
///
/// Arguments are joined and split on commas and whitespace, so
/// `["1,2", "3"]` and `["1, 2 3"]` both yield three ids. Returns `None` if
/// any piece is not made of decimal digits.
pub fn parse_ids<S: AsRef<str>>(args: &[S]) -> Option<Vec<ArtworkId>> {
    let joined = args
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");

    joined
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|piece| !piece.is_empty())
        .map(|piece| piece.parse::<ArtworkId>().ok())
        .collect()
}

/// Convert each id in turn and write `<output_dir>/<id>.mp4`.
///
/// Individual failures are reported in the returned list and never abort the
/// batch.
pub async fn run_batch(
    scheduler: &Scheduler,
    ids: &[ArtworkId],
    output_dir: &Path,
) -> Result<Vec<BatchItem>> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut items = Vec::with_capacity(ids.len());
    for &id in ids {
        let item = match scheduler.submit(id).await {
            Ok(data) => {
                let path = output_dir.join(format!("{id}.mp4"));
                match tokio::fs::write(&path, &data).await {
                    Ok(()) => {
                        tracing::info!(artwork_id = %id, "Wrote {:?}", path);
                        BatchItem::Written { id, path }
                    }
                    Err(e) => BatchItem::Failed {
                        id,
                        reason: format!("writing {:?} failed: {e}", path),
                    },
                }
            }
            Err(e) => BatchItem::Failed {
                id,
                reason: e.to_string(),
            },
        };
        items.push(item);
    }

    Ok(items)
}
