use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::Settings;

const SETTINGS_FILE: &str = "settings.json";
const CONFIG_DIR: &str = "registrum";

/// `settings.json` lives next to the executable. When the executable path
/// cannot be resolved the per-user config directory is used instead.
pub fn resolve_settings_path() -> Result<PathBuf, AppError> {
  let exe_dir = std::env::current_exe()
    .ok()
    .and_then(|path| path.parent().map(|parent| parent.to_path_buf()));
  if let Some(exe_dir) = exe_dir {
    return Ok(exe_dir.join(SETTINGS_FILE));
  }

  let base = dirs_next::config_dir().ok_or_else(|| AppError::new("PATH", "Папка настроек не найдена"))?;
  Ok(base.join(CONFIG_DIR).join(SETTINGS_FILE))
}

/// Stored store directory, if the settings file is readable and the
/// directory still exists.
pub fn load_settings(path: &Path) -> Option<Settings> {
  let data = fs::read_to_string(path).ok()?;
  let settings = serde_json::from_str::<Settings>(&data).ok()?;
  if settings.base_dir.is_dir() {
    Some(settings)
  } else {
    tracing::warn!(base_dir = %settings.base_dir.display(), "stored base directory no longer exists");
    None
  }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), AppError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, crate::store::to_pretty_json(settings)?)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_existing_directory() {
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join("conf").join(SETTINGS_FILE);
    let settings = Settings {
      base_dir: dir.path().to_path_buf(),
    };
    save_settings(&path, &settings).expect("save");

    let raw = fs::read_to_string(&path).expect("read");
    assert!(raw.contains("\"base_dir\""));
    let loaded = load_settings(&path).expect("load");
    assert_eq!(loaded.base_dir, dir.path());
  }

  #[test]
  fn ignores_missing_directory_and_garbage() {
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join(SETTINGS_FILE);
    save_settings(
      &path,
      &Settings {
        base_dir: dir.path().join("gone"),
      },
    )
    .expect("save");
    assert!(load_settings(&path).is_none());

    fs::write(&path, "{not json").expect("write");
    assert!(load_settings(&path).is_none());
    assert!(load_settings(&dir.path().join("absent.json")).is_none());
  }
}
