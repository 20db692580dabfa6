use crate::error::PatchError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use time::{macros::format_description, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPatch {
    pub profile: PathBuf,
    pub backup: PathBuf,
    pub timestamp: i64,
}

pub fn backup_stamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]-[hour][minute][second]");
    now.format(&format).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn backup_path_for(path: &Path, stamp: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(format!(".{stamp}.bak"));
    path.with_file_name(name)
}

/// An existing backup of the same name is kept as is.
pub fn create_file_backup(path: &Path) -> Result<PathBuf, PatchError> {
    create_file_backup_at(path, now_local())
}

pub fn create_file_backup_at(path: &Path, now: OffsetDateTime) -> Result<PathBuf, PatchError> {
    let backup = backup_path_for(path, &backup_stamp(now));
    if backup.exists() {
        tracing::debug!(path = %backup.display(), "backup already exists, keeping it");
        return Ok(backup);
    }
    fs::copy(path, &backup).map_err(|source| PatchError::Backup {
        path: backup.clone(),
        source,
    })?;
    Ok(backup)
}

pub fn record_last_patch(record_path: &Path, profile: &Path, backup: &Path) -> Result<()> {
    let last = LastPatch {
        profile: profile.to_path_buf(),
        backup: backup.to_path_buf(),
        timestamp: OffsetDateTime::now_utc().unix_timestamp(),
    };
    if let Some(parent) = record_path.parent() {
        fs::create_dir_all(parent).context("create data dir")?;
    }
    let raw = serde_json::to_string_pretty(&last).context("serialize last patch")?;
    fs::write(record_path, raw).context("write last patch")?;
    Ok(())
}

pub fn load_last_patch(record_path: &Path) -> Result<Option<LastPatch>> {
    if !record_path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(record_path).context("read last patch")?;
    let last: LastPatch = serde_json::from_str(&raw).context("parse last patch")?;
    Ok(Some(last))
}

pub fn undo_last_patch(record_path: &Path) -> Result<LastPatch, PatchError> {
    let last = match load_last_patch(record_path) {
        Ok(Some(last)) => last,
        Ok(None) => return Err(PatchError::NoBackup),
        Err(err) => {
            tracing::warn!("unreadable undo record: {err:#}");
            return Err(PatchError::NoBackup);
        }
    };
    if !last.backup.exists() {
        return Err(PatchError::BackupMissing {
            path: last.backup.clone(),
        });
    }
    fs::copy(&last.backup, &last.profile).map_err(|source| PatchError::Write {
        path: last.profile.clone(),
        source,
    })?;
    let _ = fs::remove_file(record_path);
    Ok(last)
}
