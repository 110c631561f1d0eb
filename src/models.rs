use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

const ORDER_ID_LEN: usize = 16;

/// In-memory handle for a record. Never written to `base.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderId(String);

impl OrderId {
  pub fn new() -> Self {
    let token = rand::thread_rng()
      .sample_iter(&Alphanumeric)
      .take(ORDER_ID_LEN)
      .map(char::from)
      .collect();
    Self(token)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for OrderId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for OrderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// One purchase invoice. Every field is kept as the string the user typed;
/// parsing happens in the query pipeline. Fields are declared in the key order
/// of existing `base.json` files, which differs from the grid order in
/// [`Column::ALL`]. Keys this program does not know are carried in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
  #[serde(skip)]
  pub id: OrderId,
  #[serde(rename = "Дата", deserialize_with = "lenient_text")]
  pub date: String,
  #[serde(rename = "Заказ", deserialize_with = "lenient_text")]
  pub order_number: String,
  #[serde(rename = "Сумма", deserialize_with = "lenient_text")]
  pub amount: String,
  #[serde(rename = "Поставщик", deserialize_with = "lenient_text")]
  pub supplier: String,
  #[serde(rename = "Плательщик", deserialize_with = "lenient_text")]
  pub payer: String,
  #[serde(rename = "Инициатор", deserialize_with = "lenient_text")]
  pub initiator: String,
  #[serde(rename = "Оплата", deserialize_with = "lenient_text")]
  pub paid: String,
  #[serde(rename = "Забрал", deserialize_with = "lenient_text")]
  pub picked_up: String,
  #[serde(rename = "Обоснование", deserialize_with = "lenient_text")]
  pub justification: String,
  #[serde(rename = "Комментарии", deserialize_with = "lenient_text")]
  pub comment: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Hand-edited files sometimes hold numbers or `null`; read them as text
/// instead of failing the whole load.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::String(text) => text,
    Value::Null => String::new(),
    other => other.to_string(),
  })
}

impl Order {
  /// Prefilled entry form: today's date, IT as initiator, paid and picked up.
  pub fn with_form_defaults(today: NaiveDate) -> Self {
    Self {
      date: today.format("%d.%m.%Y").to_string(),
      initiator: "ИТ".to_string(),
      paid: "Да".to_string(),
      picked_up: "Да".to_string(),
      ..Self::default()
    }
  }

  pub fn get(&self, column: Column) -> &str {
    match column {
      Column::Date => &self.date,
      Column::OrderNumber => &self.order_number,
      Column::Amount => &self.amount,
      Column::Supplier => &self.supplier,
      Column::Payer => &self.payer,
      Column::Initiator => &self.initiator,
      Column::Justification => &self.justification,
      Column::Paid => &self.paid,
      Column::PickedUp => &self.picked_up,
      Column::Comment => &self.comment,
    }
  }

  pub fn set(&mut self, column: Column, value: impl Into<String>) {
    let value = value.into();
    match column {
      Column::Date => self.date = value,
      Column::OrderNumber => self.order_number = value,
      Column::Amount => self.amount = value,
      Column::Supplier => self.supplier = value,
      Column::Payer => self.payer = value,
      Column::Initiator => self.initiator = value,
      Column::Justification => self.justification = value,
      Column::Paid => self.paid = value,
      Column::PickedUp => self.picked_up = value,
      Column::Comment => self.comment = value,
    }
  }

  /// Field values in column order.
  pub fn values(&self) -> [&str; 10] {
    Column::ALL.map(|column| self.get(column))
  }

  /// Compares the ten persisted fields, ignoring the in-memory id.
  pub fn same_fields(&self, other: &Order) -> bool {
    self.values() == other.values()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
  Date,
  OrderNumber,
  Amount,
  Supplier,
  Payer,
  Initiator,
  Justification,
  Paid,
  PickedUp,
  Comment,
}

impl Column {
  pub const ALL: [Column; 10] = [
    Column::Date,
    Column::OrderNumber,
    Column::Amount,
    Column::Supplier,
    Column::Payer,
    Column::Initiator,
    Column::Justification,
    Column::Paid,
    Column::PickedUp,
    Column::Comment,
  ];

  /// Caption shown in the grid; also the JSON key and the CSV header.
  pub fn header(self) -> &'static str {
    match self {
      Column::Date => "Дата",
      Column::OrderNumber => "Заказ",
      Column::Amount => "Сумма",
      Column::Supplier => "Поставщик",
      Column::Payer => "Плательщик",
      Column::Initiator => "Инициатор",
      Column::Justification => "Обоснование",
      Column::Paid => "Оплата",
      Column::PickedUp => "Забрал",
      Column::Comment => "Комментарии",
    }
  }

  pub fn key(self) -> &'static str {
    match self {
      Column::Date => "date",
      Column::OrderNumber => "order_number",
      Column::Amount => "amount",
      Column::Supplier => "supplier",
      Column::Payer => "payer",
      Column::Initiator => "initiator",
      Column::Justification => "justification",
      Column::Paid => "paid",
      Column::PickedUp => "picked_up",
      Column::Comment => "comment",
    }
  }

  /// Accepts either the Russian caption or the English key, ignoring case.
  pub fn from_name(name: &str) -> Option<Column> {
    let wanted = name.trim().to_lowercase();
    Column::ALL
      .into_iter()
      .find(|column| column.header().to_lowercase() == wanted || column.key() == wanted)
  }
}

impl fmt::Display for Column {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.header())
  }
}

impl FromStr for Column {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Column::from_name(s).ok_or_else(|| AppError::new("INVALID_COLUMN", format!("Неизвестный столбец: {s}")))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

/// Remembers the last sorted column so that repeated selection flips direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortState {
  pub column: Option<Column>,
  pub direction: SortDirection,
}

impl SortState {
  pub fn select(&mut self, column: Column) -> SortDirection {
    self.direction = match (self.column, self.direction) {
      (Some(last), SortDirection::Ascending) if last == column => SortDirection::Descending,
      _ => SortDirection::Ascending,
    };
    self.column = Some(column);
    self.direction
  }
}

/// Grid filter. An empty search term and blank date bounds count as "not set".
#[derive(Debug, Clone, Default)]
pub struct Query {
  pub search: Option<String>,
  pub date_from: Option<String>,
  pub date_to: Option<String>,
}

impl Query {
  pub fn search(term: impl Into<String>) -> Self {
    Self {
      search: Some(term.into()),
      ..Self::default()
    }
  }

  pub fn date_range(from: Option<&str>, to: Option<&str>) -> Self {
    Self {
      date_from: from.map(str::to_string),
      date_to: to.map(str::to_string),
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
  pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
  pub year: i32,
  pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayerYearTotal {
  pub year: i32,
  pub payer: String,
  pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
  pub month: u32,
  pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
  pub year: i32,
  pub year_total: f64,
  pub all_time_total: f64,
  pub counted: usize,
  pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ImportPreview {
  pub source: PathBuf,
  pub accepted: Vec<Order>,
  pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
  Written,
  SkippedReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
  Created(Vec<PathBuf>),
  SkippedReadOnly,
}
