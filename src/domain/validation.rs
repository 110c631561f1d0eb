use chrono::NaiveDate;

use crate::error::AppError;
use crate::models::Order;

pub const DATE_FORMAT: &str = "%d.%m.%Y";

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  let date = date.trim();
  if !has_date_shape(date) {
    return Err(invalid_date());
  }
  NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| invalid_date())
}

pub fn parse_amount(amount: &str) -> Result<f64, AppError> {
  let normalized: String = amount
    .chars()
    .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
    .map(|c| if c == ',' { '.' } else { c })
    .collect();
  match normalized.parse::<f64>() {
    Ok(value) if value.is_finite() => Ok(value),
    _ => Err(AppError::new("INVALID_AMOUNT", "Сумма должна быть числом")),
  }
}

pub fn ensure_present(value: &str, caption: &str) -> Result<(), AppError> {
  if value.trim().is_empty() {
    Err(AppError::new("MISSING_FIELD", format!("Поле «{caption}» не заполнено")))
  } else {
    Ok(())
  }
}

/// Entry-form checks, run before anything reaches the store.
pub fn validate_order(order: &Order) -> Result<(), AppError> {
  ensure_present(&order.date, "Дата")?;
  parse_date(&order.date)?;
  ensure_present(&order.amount, "Сумма")?;
  parse_amount(&order.amount)?;
  ensure_present(&order.supplier, "Поставщик")?;
  Ok(())
}

// DD.MM.YYYY; chrono alone would also take "1.3.2024".
fn has_date_shape(date: &str) -> bool {
  let bytes = date.as_bytes();
  bytes.len() == 10
    && bytes.iter().enumerate().all(|(i, b)| match i {
      2 | 5 => *b == b'.',
      _ => b.is_ascii_digit(),
    })
}

fn invalid_date() -> AppError {
  AppError::new("INVALID_DATE", "Дата должна быть в формате ДД.ММ.ГГГГ")
}
