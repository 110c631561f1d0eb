use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::BackupOutcome;
use crate::store::Store;

pub const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const MARKER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const AUTO_BACKUP_HOURS: i64 = 24;

pub fn create_backup(store: &Store, silent: bool) -> Result<BackupOutcome, AppError> {
  create_backup_at(store, Local::now().naive_local(), silent)
}

/// Copies `base.json` (and `payers.json` when present) to
/// `<stem>_<YYYY-MM-DD_HH-MM-SS>.json` beside them. Existing backups are
/// never replaced.
pub fn create_backup_at(store: &Store, at: NaiveDateTime, silent: bool) -> Result<BackupOutcome, AppError> {
  if store.is_read_only() {
    if silent {
      debug!("read-only mode, backup skipped");
    } else {
      warn!("read-only mode, backup not possible");
    }
    return Ok(BackupOutcome::SkippedReadOnly);
  }

  let paths = store.paths();
  if !paths.base.exists() {
    return Err(AppError::new("BASE_MISSING", "Файл базы не существует!"));
  }

  let stamp = at.format(STAMP_FORMAT).to_string();
  let mut sources = vec![&paths.base];
  if paths.payers.exists() {
    sources.push(&paths.payers);
  }

  let mut created = Vec::with_capacity(sources.len());
  for source in sources {
    match copy_new(source, &backup_name(source, &stamp)) {
      Ok(target) => created.push(target),
      Err(err) => {
        remove_partial(&created);
        return Err(err);
      }
    }
  }

  info!(stamp = %stamp, files = created.len(), silent, "backup created");
  Ok(BackupOutcome::Created(created))
}

pub fn backup_name(source: &Path, stamp: &str) -> PathBuf {
  let stem = source.file_stem().and_then(|value| value.to_str()).unwrap_or("base");
  let file_name = match source.extension().and_then(|value| value.to_str()) {
    Some(ext) => format!("{stem}_{stamp}.{ext}"),
    None => format!("{stem}_{stamp}"),
  };
  source.with_file_name(file_name)
}

fn copy_new(source: &Path, target: &Path) -> Result<PathBuf, AppError> {
  let mut output = OpenOptions::new()
    .write(true)
    .create_new(true)
    .open(target)
    .map_err(|err| match err.kind() {
      io::ErrorKind::AlreadyExists => {
        AppError::new("BACKUP_EXISTS", format!("Резервная копия уже существует: {}", target.display()))
      }
      _ => AppError::new("IO_ERROR", format!("Не удалось создать резервную копию: {err}")),
    })?;
  let copied = File::open(source).and_then(|mut input| io::copy(&mut input, &mut output));
  if let Err(err) = copied {
    drop(output);
    remove_partial(&[target.to_path_buf()]);
    return Err(err.into());
  }
  Ok(target.to_path_buf())
}

/// A backup set is all-or-nothing: copies made before a failure are removed.
fn remove_partial(files: &[PathBuf]) {
  for file in files {
    if let Err(err) = fs::remove_file(file) {
      warn!(path = %file.display(), error = %err, "could not remove incomplete backup");
    }
  }
}

pub fn last_backup_at(store: &Store) -> Option<NaiveDateTime> {
  let raw = fs::read_to_string(&store.paths().backup_marker).ok()?;
  NaiveDateTime::parse_from_str(raw.trim(), MARKER_FORMAT).ok()
}

pub fn auto_backup_if_stale(store: &Store) -> Result<Option<BackupOutcome>, AppError> {
  auto_backup_if_stale_at(store, Local::now().naive_local())
}

/// Startup check: back up silently when the marker is missing or older than
/// a day, then move the marker to `now`. `None` means the last backup is recent.
pub fn auto_backup_if_stale_at(store: &Store, now: NaiveDateTime) -> Result<Option<BackupOutcome>, AppError> {
  if let Some(last) = last_backup_at(store) {
    if now.signed_duration_since(last) < Duration::hours(AUTO_BACKUP_HOURS) {
      debug!(last = %last, "auto backup not due");
      return Ok(None);
    }
  }

  let outcome = create_backup_at(store, now, true)?;
  if let BackupOutcome::Created(_) = outcome {
    fs::write(&store.paths().backup_marker, now.format(MARKER_FORMAT).to_string())?;
  }
  Ok(Some(outcome))
}
