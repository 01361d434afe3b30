//! Durable hand-off between stages: one directory per stage holding
//! `done.json`, `skipped.json` and `failed.json`.
//!
//! Each file is written to a temporary sibling and renamed into place, so
//! a crash mid-write leaves either the old artifact or the new one. A
//! stage is only reported successful after all three are written.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{Completed, Failed, ResultSet};

pub const DONE_FILE: &str = "done.json";
pub const SKIPPED_FILE: &str = "skipped.json";
pub const FAILED_FILE: &str = "failed.json";

/// Write all three partitions into `dir`, creating it if absent.
pub async fn persist_results<T, R>(dir: &Path, results: &ResultSet<T, R>) -> Result<()>
where
    T: Serialize,
    R: Serialize,
{
    tokio::fs::create_dir_all(dir).await?;
    write_json(&dir.join(DONE_FILE), &results.done).await?;
    write_json(&dir.join(SKIPPED_FILE), &results.skipped).await?;
    write_json(&dir.join(FAILED_FILE), &results.failed).await?;
    info!(dir = %dir.display(), summary = %results.summary(), "results persisted");
    Ok(())
}

/// Read a stage's partitions back. Missing files read as empty.
pub async fn load_results<T, R>(dir: &Path) -> Result<ResultSet<T, R>>
where
    T: DeserializeOwned,
    R: DeserializeOwned,
{
    Ok(ResultSet {
        done: read_json_or_default(&dir.join(DONE_FILE)).await?,
        skipped: read_json_or_default(&dir.join(SKIPPED_FILE)).await?,
        failed: read_json_or_default(&dir.join(FAILED_FILE)).await?,
    })
}

/// Done and skipped items of an upstream stage, which must have run.
pub async fn load_completed<T, R>(dir: &Path) -> Result<Vec<Completed<T, R>>>
where
    T: DeserializeOwned,
    R: DeserializeOwned,
{
    let done_path = dir.join(DONE_FILE);
    if !tokio::fs::try_exists(&done_path).await? {
        return Err(Error::NotFound(format!(
            "{} (has the upstream stage run?)",
            done_path.display()
        )));
    }
    let mut completed: Vec<Completed<T, R>> = read_json(&done_path).await?;
    completed.extend(read_json_or_default::<Vec<Completed<T, R>>>(&dir.join(SKIPPED_FILE)).await?);
    Ok(completed)
}

pub async fn load_failed<T: DeserializeOwned>(dir: &Path) -> Result<Vec<Failed<T>>> {
    read_json_or_default(&dir.join(FAILED_FILE)).await
}

/// Serialize `value` as pretty JSON via a temp file and rename.
pub async fn write_json<V: Serialize + ?Sized>(path: &Path, value: &V) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub async fn read_json<V: DeserializeOwned>(path: &Path) -> Result<V> {
    let body = tokio::fs::read(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    Ok(serde_json::from_slice(&body)?)
}

async fn read_json_or_default<V: DeserializeOwned + Default>(path: &Path) -> Result<V> {
    if tokio::fs::try_exists(path).await? {
        read_json(path).await
    } else {
        Ok(V::default())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
