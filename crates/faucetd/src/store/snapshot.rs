//! On-disk snapshot format and atomic file replacement.

use anyhow::{Context, Result};
use faucet_common::{Identity, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Whole-store snapshot, rewritten on every mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: BTreeMap<Identity, UserRecord>,
}

/// Load the snapshot at `path`, creating an empty one if the file is absent.
///
/// A file that exists but does not parse is an error: silently starting
/// empty would wipe every balance.
pub async fn load_or_create(path: &Path) -> Result<Snapshot> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create store directory {}", parent.display()))?;
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed store snapshot {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let snapshot = Snapshot::default();
            write_atomic(path, &snapshot)
                .await
                .with_context(|| format!("Failed to create store snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), "Created empty store snapshot");
            Ok(snapshot)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read store snapshot {}", path.display())),
    }
}

/// Serialize `snapshot` to a sibling temp file, fsync it, and rename it over `path`
pub async fn write_atomic(path: &Path, snapshot: &Snapshot) -> std::io::Result<()> {
    let data = serde_json::to_vec_pretty(snapshot)?;
    let tmp = temp_path(path);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&data).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
