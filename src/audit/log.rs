use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{Local, NaiveDateTime};

use crate::error::AppError;
use crate::store::Store;

const LINE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appends `[timestamp] action` to `audit.log`. Failures are logged and
/// dropped so that the calling operation is never blocked by the audit trail.
pub fn append_audit(store: &Store, action: &str) {
  if store.is_read_only() {
    return;
  }
  let path = &store.paths().audit;
  if let Err(err) = append_audit_at(path, Local::now().naive_local(), action) {
    tracing::warn!(path = %path.display(), error = %err, "audit entry dropped");
  }
}

pub fn append_audit_at(path: &Path, at: NaiveDateTime, action: &str) -> Result<(), AppError> {
  let action = action.replace(|c: char| c == '\r' || c == '\n', " ");
  let mut file = OpenOptions::new().create(true).append(true).open(path)?;
  writeln!(file, "[{}] {}", at.format(LINE_FORMAT), action.trim())?;
  Ok(())
}

/// Most recent `limit` entries, oldest first.
pub fn read_audit(store: &Store, limit: usize) -> Result<Vec<String>, AppError> {
  let path = &store.paths().audit;
  if !path.exists() {
    return Ok(Vec::new());
  }
  let data = fs::read_to_string(path)?;
  let lines: Vec<&str> = data.lines().filter(|line| !line.trim().is_empty()).collect();
  let skip = lines.len().saturating_sub(limit);
  Ok(lines[skip..].iter().map(|line| line.to_string()).collect())
}
