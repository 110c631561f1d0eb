use std::fs;
use std::path::Path;

use registrum::models::{Column, Order, SaveOutcome, SortDirection};
use registrum::store::{Store, StoreMode, BASE_FILE, PAYERS_FILE};
use registrum::Session;
use serde_json::Value;
use tempfile::tempdir;

fn open(dir: &Path) -> Session {
  Session::open(dir, dir.join("settings.json"))
}

fn order(date: &str, amount: &str, supplier: &str) -> Order {
  Order {
    date: date.to_string(),
    amount: amount.to_string(),
    supplier: supplier.to_string(),
    ..Order::default()
  }
}

fn stored_json(dir: &Path) -> Value {
  let raw = fs::read_to_string(dir.join(BASE_FILE)).expect("base.json");
  serde_json::from_str(&raw).expect("json")
}

/// Makes the write probe fail even for root: the probe file name is taken by a directory.
fn block_write_probe(dir: &Path) {
  fs::create_dir_all(dir.join(".write_test_registrum")).expect("probe blocker");
}

#[test]
fn first_open_creates_empty_store_and_default_payers() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());

  assert!(!session.is_read_only());
  assert!(session.take_notices().is_empty());
  assert_eq!(fs::read_to_string(dir.path().join(BASE_FILE)).unwrap(), "[]");
  assert_eq!(session.payers().len(), 4);
  assert!(dir.path().join(PAYERS_FILE).exists());
}

#[test]
fn adding_to_empty_store_writes_one_full_record() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());

  session
    .save_order(order("01.03.2024", "1500", "Acme"), None)
    .expect("save");

  let json = stored_json(dir.path());
  let records = json.as_array().expect("array");
  assert_eq!(records.len(), 1);
  let record = records[0].as_object().expect("object");
  assert_eq!(record.len(), 10);
  assert_eq!(record["Дата"], "01.03.2024");
  assert_eq!(record["Сумма"], "1500");
  assert_eq!(record["Поставщик"], "Acme");
  let empty = record.values().filter(|value| *value == "").count();
  assert_eq!(empty, 7);

  let raw = fs::read_to_string(dir.path().join(BASE_FILE)).unwrap();
  assert!(raw.contains("\n        \"Дата\": \"01.03.2024\""));
}

#[test]
fn saving_what_was_loaded_keeps_bytes_identical() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  let mut first = order("01.03.2024", "1 234,50", "ООО «Ромашка»");
  first.justification = "Картриджи\nи бумага".to_string();
  session.save_order(first, None).expect("first");
  session.save_order(order("02.03.2024", "99", "Acme"), None).expect("second");
  let before = fs::read(dir.path().join(BASE_FILE)).unwrap();

  let (store, _) = Store::open(dir.path());
  let (orders, error) = store.load();
  assert!(error.is_none());
  assert_eq!(store.save(&orders).unwrap(), SaveOutcome::Written);

  assert_eq!(fs::read(dir.path().join(BASE_FILE)).unwrap(), before);
}

#[test]
fn files_from_the_desktop_tool_save_back_unchanged() {
  let dir = tempdir().expect("tmp");
  let legacy = concat!(
    "[\n",
    "    {\n",
    "        \"Дата\": \"05.02.2024\",\n",
    "        \"Заказ\": \"17\",\n",
    "        \"Сумма\": \"12 500,00\",\n",
    "        \"Поставщик\": \"ООО «Ромашка»\",\n",
    "        \"Плательщик\": \"Склад\",\n",
    "        \"Инициатор\": \"ИТ\",\n",
    "        \"Оплата\": \"Да\",\n",
    "        \"Забрал\": \"Нет\",\n",
    "        \"Обоснование\": \"Картриджи\\nи бумага\",\n",
    "        \"Комментарии\": \"\"\n",
    "    }\n",
    "]"
  );
  fs::write(dir.path().join(BASE_FILE), legacy).unwrap();

  let (store, _) = Store::open(dir.path());
  let (orders, error) = store.load();
  assert!(error.is_none());
  assert_eq!(orders[0].justification, "Картриджи\nи бумага");
  store.save(&orders).unwrap();

  assert_eq!(fs::read_to_string(dir.path().join(BASE_FILE)).unwrap(), legacy);
}

#[test]
fn unknown_keys_are_kept_through_an_edit() {
  let dir = tempdir().expect("tmp");
  fs::write(
    dir.path().join(BASE_FILE),
    r#"[{"Дата": "01.03.2024", "Сумма": 100, "Поставщик": "Acme", "Склад": "B-2"}]"#,
  )
  .unwrap();
  let mut session = open(dir.path());
  assert!(session.take_notices().is_empty());

  let id = session.id_at(0).cloned().unwrap();
  let mut edited = session.find(&id).cloned().unwrap();
  edited.comment = "проверено".to_string();
  session.save_order(edited, Some(&id)).expect("edit");

  let json = stored_json(dir.path());
  assert_eq!(json[0]["Сумма"], "100");
  assert_eq!(json[0]["Склад"], "B-2");
  assert_eq!(json[0]["Комментарии"], "проверено");
}

#[test]
fn editing_second_record_leaves_first_untouched() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  session.save_order(order("01.03.2024", "100", "First"), None).expect("first");
  session.save_order(order("02.03.2024", "200", "Second"), None).expect("second");
  let first_before = stored_json(dir.path())[0].clone();

  let target = session.id_at(1).cloned().expect("second id");
  let mut edited = session.find(&target).cloned().unwrap();
  edited.amount = "250".to_string();
  edited.comment = "исправлено".to_string();
  let id = session.save_order(edited, Some(&target)).expect("edit");

  assert_eq!(id, target);
  let json = stored_json(dir.path());
  assert_eq!(json.as_array().unwrap().len(), 2);
  assert_eq!(json[0], first_before);
  assert_eq!(json[1]["Сумма"], "250");
  assert_eq!(json[1]["Комментарии"], "исправлено");
}

#[test]
fn duplicates_are_addressed_by_id_not_by_value() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  session.save_order(order("01.03.2024", "100", "Same"), None).expect("a");
  session.save_order(order("01.03.2024", "100", "Same"), None).expect("b");
  session.save_order(order("05.03.2024", "5", "Other"), None).expect("c");
  let first = session.id_at(0).cloned().unwrap();
  let second = session.id_at(1).cloned().unwrap();

  let removed = session.delete_order(&second).expect("delete");

  assert_eq!(removed.id, second);
  assert_eq!(session.orders().len(), 2);
  assert_eq!(session.orders()[0].id, first);
  assert_eq!(session.orders()[1].supplier, "Other");
}

#[test]
fn invalid_input_never_reaches_the_store() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());

  let err = session.save_order(order("31.02.2024", "10", "Acme"), None).unwrap_err();
  assert!(err.is("INVALID_DATE"));
  let err = session.save_order(order("01.02.2024", "десять", "Acme"), None).unwrap_err();
  assert!(err.is("INVALID_AMOUNT"));
  let err = session.save_order(order("01.02.2024", "10", " "), None).unwrap_err();
  assert!(err.is("MISSING_FIELD"));

  assert!(session.orders().is_empty());
  assert_eq!(fs::read_to_string(dir.path().join(BASE_FILE)).unwrap(), "[]");
}

#[test]
fn unknown_target_is_reported() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  let ghost = registrum::OrderId::new();
  let err = session.save_order(order("01.03.2024", "1", "x"), Some(&ghost)).unwrap_err();
  assert!(err.is("NOT_FOUND"));
  assert!(session.delete_order(&ghost).unwrap_err().is("NOT_FOUND"));
}

#[test]
fn corrupt_store_loads_as_empty_with_a_notice() {
  let dir = tempdir().expect("tmp");
  fs::write(dir.path().join(BASE_FILE), "[{\"Дата\": ").unwrap();

  let mut session = open(dir.path());

  assert!(session.orders().is_empty());
  let notices = session.take_notices();
  assert_eq!(notices.len(), 1);
  assert!(notices[0].is("JSON_ERROR"));
}

#[test]
fn read_only_store_is_never_written() {
  let dir = tempdir().expect("tmp");
  {
    let mut session = open(dir.path());
    session.save_order(order("01.03.2024", "100", "Acme"), None).expect("seed");
  }
  block_write_probe(dir.path());
  let base = dir.path().join(BASE_FILE);
  let content = fs::read(&base).unwrap();
  let modified = fs::metadata(&base).unwrap().modified().unwrap();

  let mut session = open(dir.path());
  assert!(session.is_read_only());
  assert_eq!(session.store().mode(), StoreMode::ReadOnly);
  assert!(session.take_notices().iter().any(|notice| notice.is("READ_ONLY")));
  assert_eq!(session.orders().len(), 1);

  assert_eq!(session.store().save(&[]).unwrap(), SaveOutcome::SkippedReadOnly);
  let err = session.save_order(order("02.03.2024", "1", "x"), None).unwrap_err();
  assert!(err.is("READ_ONLY"));
  let id = session.id_at(0).cloned().unwrap();
  assert!(session.delete_order(&id).unwrap_err().is("READ_ONLY"));
  assert!(session.add_payer("Новый").unwrap_err().is("READ_ONLY"));

  assert_eq!(fs::read(&base).unwrap(), content);
  assert_eq!(fs::metadata(&base).unwrap().modified().unwrap(), modified);
}

#[test]
fn repeated_amount_sort_reverses_and_is_persisted_on_save() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  for (amount, supplier) in [("1 000,50", "a"), ("99", "b"), ("250.25", "c"), ("5", "d")] {
    session.save_order(order("01.03.2024", amount, supplier), None).expect("seed");
  }

  assert_eq!(session.sort_by(Column::Amount), SortDirection::Ascending);
  let ascending: Vec<String> = session.orders().iter().map(|o| o.supplier.clone()).collect();
  assert_eq!(ascending, vec!["d", "b", "c", "a"]);

  assert_eq!(session.sort_by(Column::Amount), SortDirection::Descending);
  let descending: Vec<String> = session.orders().iter().map(|o| o.supplier.clone()).collect();
  let mut reversed = ascending.clone();
  reversed.reverse();
  assert_eq!(descending, reversed);

  session.save_all().expect("save");
  let json = stored_json(dir.path());
  assert_eq!(json[0]["Поставщик"], "a");
  assert_eq!(json[3]["Поставщик"], "d");
}

#[test]
fn positions_from_a_sorted_listing_edit_the_listed_record() {
  let dir = tempdir().expect("tmp");
  {
    let mut session = open(dir.path());
    session.save_order(order("01.03.2024", "900", "Big"), None).unwrap();
    session.save_order(order("02.03.2024", "5", "Small"), None).unwrap();
  }

  let listed_position = {
    let session = open(dir.path());
    let rows = session.sorted_view(&registrum::Query::default(), Column::Amount, SortDirection::Ascending);
    assert_eq!(rows[0].supplier, "Small");
    assert_eq!(session.orders()[0].supplier, "Big");
    session.positions()[&rows[0].id]
  };

  let mut session = open(dir.path());
  let id = session.id_at(listed_position).cloned().unwrap();
  let mut edited = session.find(&id).cloned().unwrap();
  edited.comment = "meant Small".to_string();
  session.save_order(edited, Some(&id)).unwrap();

  let json = stored_json(dir.path());
  assert_eq!(json[0]["Поставщик"], "Big");
  assert_eq!(json[0]["Комментарии"], "");
  assert_eq!(json[1]["Поставщик"], "Small");
  assert_eq!(json[1]["Комментарии"], "meant Small");
}

#[test]
fn view_filters_without_touching_the_list() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  session.save_order(order("01.03.2024", "1", "Acme"), None).unwrap();
  session.save_order(order("01.04.2024", "2", "Beta"), None).unwrap();

  let query = registrum::Query::search("ACME");
  assert_eq!(session.view(&query).len(), 1);
  assert_eq!(session.orders().len(), 2);
}

#[test]
fn payer_list_rejects_blank_and_duplicate_names() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());

  session.add_payer("  Бухгалтерия ").expect("add");
  assert!(session.add_payer("Бухгалтерия").unwrap_err().is("DUPLICATE_PAYER"));
  assert!(session.add_payer("   ").unwrap_err().is("EMPTY_PAYER"));
  assert!(session.remove_payer("Бухгалтерия").expect("remove"));
  assert!(!session.remove_payer("Бухгалтерия").expect("remove again"));

  fs::write(dir.path().join(PAYERS_FILE), "[\"A\", \"\", \"A\", \"  \", \"B\"]").unwrap();
  session.reload();
  assert_eq!(session.payers().to_vec(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn mutations_are_written_to_the_audit_log() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  let mut new_order = order("01.03.2024", "1500", "Acme");
  new_order.order_number = "A-17".to_string();
  let id = session.save_order(new_order, None).unwrap();
  session.delete_order(&id).unwrap();

  let lines = session.audit_log(10).unwrap();
  assert_eq!(lines.len(), 2);
  assert!(lines[0].starts_with('['));
  assert!(lines[0].contains("] Добавлен заказ № A-17"));
  assert!(lines[1].contains("Удалён заказ"));
  assert_eq!(session.audit_log(1).unwrap().len(), 1);
}

#[test]
fn relocation_switches_directory_and_remembers_it() {
  let dir = tempdir().expect("tmp");
  let old_dir = dir.path().join("old");
  let new_dir = dir.path().join("new");
  fs::create_dir_all(&old_dir).unwrap();
  let settings_path = dir.path().join("settings.json");
  let mut session = Session::open(&old_dir, settings_path.clone());
  session.save_order(order("01.03.2024", "1", "Old"), None).unwrap();

  session.relocate(&new_dir).expect("relocate");

  assert_eq!(session.store().paths().dir, new_dir);
  assert!(new_dir.join(BASE_FILE).exists());
  assert!(session.orders().is_empty());
  let stored = registrum::settings::load_settings(&settings_path).expect("settings");
  assert_eq!(stored.base_dir, new_dir);
}

#[test]
fn failed_relocation_keeps_previous_directory() {
  let dir = tempdir().expect("tmp");
  let mut session = open(dir.path());
  session.save_order(order("01.03.2024", "1", "Kept"), None).unwrap();
  let not_a_dir = dir.path().join("file.txt");
  fs::write(&not_a_dir, "x").unwrap();

  let err = session.relocate(&not_a_dir.join("nested")).unwrap_err();

  assert!(err.is("NOT_WRITABLE"));
  assert_eq!(session.store().paths().dir, dir.path());
  assert_eq!(session.orders().len(), 1);
}
