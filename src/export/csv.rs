use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::models::{Column, ImportPreview, Order};

const DELIMITER: u8 = b';';
const BOM: &str = "\u{feff}";

/// Reads a semicolon-separated file whose header names the columns (Russian
/// captions or English keys, any order). Rows lacking a supplier or an amount
/// are counted as rejected; nothing is added to the store here.
pub fn import_csv(path: &Path) -> Result<ImportPreview, AppError> {
  let raw = fs::read(path)?;
  let text = String::from_utf8(raw).map_err(|_| AppError::new("CSV_ERROR", "Файл CSV должен быть в кодировке UTF-8"))?;
  let (accepted, rejected) = parse_orders(&text)?;
  tracing::info!(path = %path.display(), accepted = accepted.len(), rejected, "csv parsed");
  Ok(ImportPreview {
    source: path.to_path_buf(),
    accepted,
    rejected,
  })
}

pub fn parse_orders(text: &str) -> Result<(Vec<Order>, usize), AppError> {
  let text = text.strip_prefix(BOM).unwrap_or(text);
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(DELIMITER)
    .flexible(true)
    .from_reader(text.as_bytes());

  let columns: Vec<Option<Column>> = reader.headers()?.iter().map(Column::from_name).collect();
  if !columns.iter().any(Option::is_some) {
    return Err(AppError::new("CSV_ERROR", "В заголовке CSV нет известных столбцов"));
  }

  let mut accepted = Vec::new();
  let mut rejected = 0;
  for record in reader.records() {
    let record = record?;
    let mut order = Order::default();
    for (value, column) in record.iter().zip(&columns) {
      if let Some(column) = column {
        order.set(*column, value.trim());
      }
    }
    if order.supplier.is_empty() || order.amount.is_empty() {
      rejected += 1;
      continue;
    }
    accepted.push(order);
  }
  Ok((accepted, rejected))
}

/// Writes the given rows in the import format, BOM included so that
/// spreadsheet programs detect UTF-8.
pub fn export_csv(orders: &[&Order], path: &Path) -> Result<(), AppError> {
  let mut file = File::create(path)?;
  file.write_all(BOM.as_bytes())?;

  let mut writer = csv::WriterBuilder::new().delimiter(DELIMITER).from_writer(file);
  writer.write_record(Column::ALL.iter().map(|column| column.header()))?;
  for order in orders {
    writer.write_record(order.values())?;
  }
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn maps_columns_by_header_in_any_order() {
    let text = "\u{feff}Сумма;Поставщик;Дата;Лишний\n1 500,00;Acme;01.03.2024;x\n";
    let (orders, rejected) = parse_orders(text).unwrap();
    assert_eq!(rejected, 0);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].amount, "1 500,00");
    assert_eq!(orders[0].supplier, "Acme");
    assert_eq!(orders[0].date, "01.03.2024");
    assert_eq!(orders[0].payer, "");
  }

  #[test]
  fn rejects_rows_without_supplier_or_amount() {
    let text = "Дата;Сумма;Поставщик\n01.03.2024;;Acme\n02.03.2024;10;\n03.03.2024;20;Beta\n04.03.2024\n";
    let (orders, rejected) = parse_orders(text).unwrap();
    assert_eq!(rejected, 3);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].supplier, "Beta");
  }

  #[test]
  fn unknown_header_is_an_error() {
    assert!(parse_orders("a;b\n1;2\n").unwrap_err().is("CSV_ERROR"));
  }
}
