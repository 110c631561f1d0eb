use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{Order, SaveOutcome, Settings};
use crate::settings;

pub const BASE_FILE: &str = "base.json";
pub const PAYERS_FILE: &str = "payers.json";
pub const AUDIT_FILE: &str = "audit.log";
pub const BACKUP_MARKER_FILE: &str = ".last_backup";
const WRITE_PROBE_FILE: &str = ".write_test_registrum";

const DEFAULT_PAYERS: [&str; 4] = ["Головной офис", "Филиал Север", "Филиал Юг", "Склад"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
  ReadWrite,
  ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
  pub dir: PathBuf,
  pub base: PathBuf,
  pub payers: PathBuf,
  pub audit: PathBuf,
  pub backup_marker: PathBuf,
}

impl StorePaths {
  pub fn in_dir(dir: &Path) -> Self {
    Self {
      dir: dir.to_path_buf(),
      base: dir.join(BASE_FILE),
      payers: dir.join(PAYERS_FILE),
      audit: dir.join(AUDIT_FILE),
      backup_marker: dir.join(BACKUP_MARKER_FILE),
    }
  }
}

/// The record store: `base.json`, `payers.json` and their companions inside
/// one directory. The mode is decided when the directory is (re)selected.
#[derive(Debug)]
pub struct Store {
  paths: StorePaths,
  mode: StoreMode,
}

impl Store {
  /// Probes the directory and creates the default files when writable.
  /// Problems are returned as notices; the store is always usable, at worst
  /// read-only.
  pub fn open(dir: &Path) -> (Store, Vec<AppError>) {
    let paths = StorePaths::in_dir(dir);
    let mut notices = Vec::new();

    let mode = match probe_writable(dir) {
      Ok(()) => match ensure_files(&paths) {
        Ok(()) => StoreMode::ReadWrite,
        Err(err) => {
          warn!(dir = %dir.display(), error = %err, "failed to create store files, continuing read-only");
          notices.push(AppError::new("BASE_MISSING", format!("Не удалось создать базу данных: {}", err.message)));
          StoreMode::ReadOnly
        }
      },
      Err(err) => {
        info!(dir = %dir.display(), error = %err, "store directory not writable, read-only mode");
        notices.push(AppError::new(
          "READ_ONLY",
          "Обнаружен режим только для чтения. Добавление, редактирование и удаление записей недоступны.",
        ));
        StoreMode::ReadOnly
      }
    };

    (Store { paths, mode }, notices)
  }

  pub fn paths(&self) -> &StorePaths {
    &self.paths
  }

  pub fn mode(&self) -> StoreMode {
    self.mode
  }

  pub fn is_read_only(&self) -> bool {
    self.mode == StoreMode::ReadOnly
  }

  pub fn read_orders(&self) -> Result<Vec<Order>, AppError> {
    if !self.paths.base.exists() {
      return Ok(Vec::new());
    }
    let data = fs::read_to_string(&self.paths.base)?;
    Ok(serde_json::from_str(&data)?)
  }

  /// Never fails: a broken or unreadable file degrades to an empty list plus
  /// the reason.
  pub fn load(&self) -> (Vec<Order>, Option<AppError>) {
    match self.read_orders() {
      Ok(orders) => {
        debug!(count = orders.len(), path = %self.paths.base.display(), "loaded orders");
        (orders, None)
      }
      Err(err) => {
        warn!(path = %self.paths.base.display(), error = %err, "failed to load orders");
        let message = format!("Не удалось загрузить базу: {}", err.message);
        (Vec::new(), Some(AppError::new(&err.code, message)))
      }
    }
  }

  /// Rewrites the whole file. A no-op in read-only mode.
  pub fn save(&self, orders: &[Order]) -> Result<SaveOutcome, AppError> {
    if self.is_read_only() {
      debug!("read-only mode, orders not saved");
      return Ok(SaveOutcome::SkippedReadOnly);
    }
    fs::write(&self.paths.base, to_pretty_json(&orders)?).map_err(|err| {
      warn!(path = %self.paths.base.display(), error = %err, "failed to save orders");
      AppError::new("IO_ERROR", format!("Не удалось сохранить базу: {err}"))
    })?;
    debug!(count = orders.len(), "saved orders");
    Ok(SaveOutcome::Written)
  }

  pub fn read_payers(&self) -> Result<Vec<String>, AppError> {
    if !self.paths.payers.exists() {
      return Ok(Vec::new());
    }
    let data = fs::read_to_string(&self.paths.payers)?;
    let raw: Vec<String> = serde_json::from_str(&data)?;
    Ok(normalize_payers(raw))
  }

  pub fn load_payers(&self) -> (Vec<String>, Option<AppError>) {
    match self.read_payers() {
      Ok(payers) => (payers, None),
      Err(err) => {
        warn!(path = %self.paths.payers.display(), error = %err, "failed to load payers");
        let message = format!("Не удалось загрузить список плательщиков: {}", err.message);
        (Vec::new(), Some(AppError::new(&err.code, message)))
      }
    }
  }

  pub fn save_payers(&self, payers: &[String]) -> Result<SaveOutcome, AppError> {
    if self.is_read_only() {
      return Ok(SaveOutcome::SkippedReadOnly);
    }
    fs::write(&self.paths.payers, to_pretty_json(&payers)?)?;
    Ok(SaveOutcome::Written)
  }

  /// Points the store at another directory. Nothing changes unless the new
  /// directory passes the write probe and receives its files.
  pub fn relocate(&mut self, new_dir: &Path, settings_path: &Path) -> Result<(), AppError> {
    let created = prepare_dir(new_dir, probe_write)
      .map_err(|err| AppError::new("NOT_WRITABLE", format!("Нет прав на запись в выбранную папку: {err}")))?;

    let paths = StorePaths::in_dir(new_dir);
    if let Err(err) = ensure_files(&paths) {
      discard_created(created.as_deref());
      return Err(err);
    }

    info!(from = %self.paths.dir.display(), to = %new_dir.display(), "store relocated");
    self.paths = paths;
    self.mode = StoreMode::ReadWrite;

    let settings = Settings {
      base_dir: new_dir.to_path_buf(),
    };
    if let Err(err) = settings::save_settings(settings_path, &settings) {
      warn!(path = %settings_path.display(), error = %err, "failed to persist store directory");
    }
    Ok(())
  }
}

/// Write access check: create and remove a marker file.
pub fn probe_writable(dir: &Path) -> Result<(), AppError> {
  probe_write(dir).map_err(|err| AppError::new("NOT_WRITABLE", err.to_string()))
}

fn probe_write(dir: &Path) -> std::io::Result<()> {
  let probe = dir.join(WRITE_PROBE_FILE);
  fs::write(&probe, "ok")?;
  fs::remove_file(&probe)
}

/// Creates `dir` and runs `probe` on it. On failure every directory this call
/// created is removed again. Returns the topmost directory it created.
fn prepare_dir(dir: &Path, probe: impl Fn(&Path) -> std::io::Result<()>) -> std::io::Result<Option<PathBuf>> {
  let created = first_missing_ancestor(dir);
  let result = fs::create_dir_all(dir).and_then(|_| probe(dir));
  if let Err(err) = result {
    discard_created(created.as_deref());
    return Err(err);
  }
  Ok(created)
}

fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
  dir
    .ancestors()
    .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
    .last()
    .map(Path::to_path_buf)
}

fn discard_created(created: Option<&Path>) {
  if let Some(dir) = created {
    if let Err(err) = fs::remove_dir_all(dir) {
      warn!(dir = %dir.display(), error = %err, "could not remove directory left by failed relocation");
    }
  }
}

fn ensure_files(paths: &StorePaths) -> Result<(), AppError> {
  fs::create_dir_all(&paths.dir)?;
  if !paths.base.exists() {
    fs::write(&paths.base, to_pretty_json(&Vec::<Order>::new())?)?;
    info!(path = %paths.base.display(), "created empty store");
  }
  if !paths.payers.exists() {
    let defaults: Vec<String> = DEFAULT_PAYERS.iter().map(|name| name.to_string()).collect();
    fs::write(&paths.payers, to_pretty_json(&defaults)?)?;
  }
  Ok(())
}

/// Trimmed, non-empty, first occurrence wins.
pub fn normalize_payers(raw: Vec<String>) -> Vec<String> {
  let mut payers: Vec<String> = Vec::with_capacity(raw.len());
  for name in raw {
    let name = name.trim();
    if !name.is_empty() && !payers.iter().any(|known| known == name) {
      payers.push(name.to_string());
    }
  }
  payers
}

/// 4-space indented JSON with non-ASCII kept literal.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, AppError> {
  let mut buffer = Vec::new();
  let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
  let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
  value.serialize(&mut serializer)?;
  Ok(buffer)
}
