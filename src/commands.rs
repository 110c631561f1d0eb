use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::audit::log::{append_audit, read_audit};
use crate::domain::{query, validation};
use crate::error::AppError;
use crate::export::{csv, excel, pdf};
use crate::files::backup;
use crate::models::*;
use crate::reports;
use crate::store::Store;

/// Everything the front-end works with: the store, the authoritative order
/// list (in its current sort order), the payer list and the sort toggle.
#[derive(Debug)]
pub struct Session {
  store: Store,
  settings_path: PathBuf,
  orders: Vec<Order>,
  payers: Vec<String>,
  sort: SortState,
  notices: Vec<AppError>,
}

impl Session {
  pub fn open(base_dir: &Path, settings_path: PathBuf) -> Session {
    let (store, notices) = Store::open(base_dir);
    let mut session = Session {
      store,
      settings_path,
      orders: Vec::new(),
      payers: Vec::new(),
      sort: SortState::default(),
      notices,
    };
    session.reload();
    session
  }

  /// Re-reads both files. Load problems end up in `notices`.
  pub fn reload(&mut self) {
    let (orders, error) = self.store.load();
    self.orders = orders;
    self.notices.extend(error);

    let (payers, error) = self.store.load_payers();
    self.payers = payers;
    self.notices.extend(error);
  }

  /// Messages for the user collected since the last call.
  pub fn take_notices(&mut self) -> Vec<AppError> {
    std::mem::take(&mut self.notices)
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  pub fn is_read_only(&self) -> bool {
    self.store.is_read_only()
  }

  pub fn orders(&self) -> &[Order] {
    &self.orders
  }

  pub fn payers(&self) -> &[String] {
    &self.payers
  }

  pub fn sort_state(&self) -> SortState {
    self.sort
  }

  pub fn find(&self, id: &OrderId) -> Option<&Order> {
    self.orders.iter().find(|order| &order.id == id)
  }

  pub fn position(&self, id: &OrderId) -> Option<usize> {
    self.orders.iter().position(|order| &order.id == id)
  }

  /// Id of the record at `index` in the authoritative order.
  pub fn id_at(&self, index: usize) -> Option<&OrderId> {
    self.orders.get(index).map(|order| &order.id)
  }

  /// Position of every record in the authoritative list, for display next to a view.
  pub fn positions(&self) -> HashMap<&OrderId, usize> {
    self.orders.iter().enumerate().map(|(index, order)| (&order.id, index)).collect()
  }

  pub fn view(&self, filter: &Query) -> Vec<&Order> {
    query::filter(&self.orders, filter)
  }

  /// Sorted copy of a view for display. The stored list and the sort toggle
  /// stay as they are, so positions from [`Session::positions`] keep pointing
  /// at the records on disk.
  pub fn sorted_view(&self, filter: &Query, column: Column, direction: SortDirection) -> Vec<Order> {
    let mut rows: Vec<Order> = self.view(filter).into_iter().cloned().collect();
    query::sort(&mut rows, column, direction);
    rows
  }

  /// Column header click: ascending first, descending on repeat. Reorders
  /// the authoritative list, so the next save keeps this order.
  pub fn sort_by(&mut self, column: Column) -> SortDirection {
    let direction = self.sort.select(column);
    query::sort(&mut self.orders, column, direction);
    direction
  }

  /// Writes the current in-memory order to disk.
  pub fn save_all(&self) -> Result<SaveOutcome, AppError> {
    self.ensure_writable()?;
    self.store.save(&self.orders)
  }

  /// Creates a record (`target == None`) or replaces the record with the
  /// given id. Returns the id of the stored record.
  pub fn save_order(&mut self, input: Order, target: Option<&OrderId>) -> Result<OrderId, AppError> {
    self.ensure_writable()?;

    let mut order = input;
    for column in Column::ALL {
      let trimmed = order.get(column).trim().to_string();
      order.set(column, trimmed);
    }
    validation::validate_order(&order)?;

    let action = match target {
      Some(id) => {
        let index = self
          .position(id)
          .ok_or_else(|| AppError::new("NOT_FOUND", "Запись не найдена"))?;
        order.id = id.clone();
        self.orders[index] = order.clone();
        "Изменён заказ"
      }
      None => {
        order.id = OrderId::new();
        self.orders.push(order.clone());
        "Добавлен заказ"
      }
    };

    self.store.save(&self.orders)?;
    append_audit(&self.store, &format!("{action} {}", describe(&order)));
    info!(id = %order.id, action, "order saved");
    Ok(order.id)
  }

  pub fn delete_order(&mut self, id: &OrderId) -> Result<Order, AppError> {
    self.ensure_writable()?;
    let index = self
      .position(id)
      .ok_or_else(|| AppError::new("NOT_FOUND", "Запись не найдена"))?;
    let removed = self.orders.remove(index);

    self.store.save(&self.orders)?;
    append_audit(&self.store, &format!("Удалён заказ {}", describe(&removed)));
    info!(id = %removed.id, "order deleted");
    Ok(removed)
  }

  /// First half of an import: parse and count, so the user can confirm.
  pub fn import_preview(&self, path: &Path) -> Result<ImportPreview, AppError> {
    self.ensure_writable()?;
    csv::import_csv(path)
  }

  /// Second half of an import: append every accepted row in file order.
  pub fn import_commit(&mut self, preview: ImportPreview) -> Result<usize, AppError> {
    self.ensure_writable()?;
    let count = preview.accepted.len();
    if count == 0 {
      return Ok(0);
    }
    self.orders.extend(preview.accepted);

    self.store.save(&self.orders)?;
    append_audit(
      &self.store,
      &format!("Импорт CSV: {count} записей из {}", preview.source.display()),
    );
    Ok(count)
  }

  pub fn export_excel(&self, filter: &Query, path: &Path) -> Result<usize, AppError> {
    let rows = self.export_rows(filter)?;
    excel::export_orders(&rows, path)?;
    append_audit(&self.store, &format!("Экспорт в Excel: {} записей, {}", rows.len(), path.display()));
    Ok(rows.len())
  }

  pub fn export_csv(&self, filter: &Query, path: &Path) -> Result<usize, AppError> {
    let rows = self.export_rows(filter)?;
    csv::export_csv(&rows, path)?;
    append_audit(&self.store, &format!("Экспорт в CSV: {} записей, {}", rows.len(), path.display()));
    Ok(rows.len())
  }

  /// PDF of the current view. The font is looked up on each call so that a
  /// font installed while the program runs is picked up.
  pub fn export_pdf(&self, filter: &Query, path: &Path) -> Result<usize, AppError> {
    let rows = self.export_rows(filter)?;
    let font = pdf::find_font();
    pdf::export_orders(&rows, path, font.as_deref())?;
    append_audit(&self.store, &format!("Экспорт в PDF: {} записей, {}", rows.len(), path.display()));
    Ok(rows.len())
  }

  fn export_rows(&self, filter: &Query) -> Result<Vec<&Order>, AppError> {
    let rows = self.view(filter);
    if rows.is_empty() {
      return Err(AppError::new("EMPTY", "Нет данных для экспорта"));
    }
    Ok(rows)
  }

  /// User-requested backup. In read-only mode this reports
  /// `SkippedReadOnly` instead of failing.
  pub fn backup(&self) -> Result<BackupOutcome, AppError> {
    let outcome = backup::create_backup(&self.store, false)?;
    if let BackupOutcome::Created(files) = &outcome {
      if let Some(base) = files.first() {
        append_audit(&self.store, &format!("Резервная копия: {}", base.display()));
      }
    }
    Ok(outcome)
  }

  /// Startup backup check. Failures become notices.
  pub fn auto_backup(&mut self) -> Option<BackupOutcome> {
    match backup::auto_backup_if_stale(&self.store) {
      Ok(outcome) => outcome,
      Err(err) => {
        warn!(error = %err, "automatic backup failed");
        self.notices.push(err);
        None
      }
    }
  }

  /// Moves the session to another store directory and reloads from there.
  pub fn relocate(&mut self, new_dir: &Path) -> Result<(), AppError> {
    self.store.relocate(new_dir, &self.settings_path)?;
    self.sort = SortState::default();
    self.reload();
    append_audit(&self.store, &format!("Папка базы изменена на {}", new_dir.display()));
    Ok(())
  }

  pub fn add_payer(&mut self, name: &str) -> Result<(), AppError> {
    self.ensure_writable()?;
    let name = name.trim();
    if name.is_empty() {
      return Err(AppError::new("EMPTY_PAYER", "Имя плательщика не может быть пустым"));
    }
    if self.payers.iter().any(|known| known == name) {
      return Err(AppError::new("DUPLICATE_PAYER", format!("Плательщик «{name}» уже есть в списке")));
    }
    self.payers.push(name.to_string());
    self.store.save_payers(&self.payers)?;
    append_audit(&self.store, &format!("Добавлен плательщик {name}"));
    Ok(())
  }

  /// `false` when the name was not in the list.
  pub fn remove_payer(&mut self, name: &str) -> Result<bool, AppError> {
    self.ensure_writable()?;
    let name = name.trim();
    let before = self.payers.len();
    self.payers.retain(|known| known != name);
    if self.payers.len() == before {
      return Ok(false);
    }
    self.store.save_payers(&self.payers)?;
    append_audit(&self.store, &format!("Удалён плательщик {name}"));
    Ok(true)
  }

  pub fn audit_log(&self, limit: usize) -> Result<Vec<String>, AppError> {
    read_audit(&self.store, limit)
  }

  pub fn totals(&self, today: NaiveDate) -> Totals {
    reports::totals(&self.orders, today)
  }

  fn ensure_writable(&self) -> Result<(), AppError> {
    if self.store.is_read_only() {
      Err(AppError::read_only())
    } else {
      Ok(())
    }
  }
}

fn describe(order: &Order) -> String {
  let number = if order.order_number.is_empty() {
    "без номера"
  } else {
    order.order_number.as_str()
  };
  format!("№ {number}: {}, {}, {}", order.date, order.supplier, order.amount)
}
