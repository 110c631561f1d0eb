use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

use crate::error::AppError;
use crate::models::{Column, Order};

const SHEET_NAME: &str = "Реестр счетов";
const MAX_COLUMN_WIDTH: usize = 40;

pub fn export_orders(orders: &[&Order], path: &Path) -> Result<(), AppError> {
  let mut workbook = Workbook::new();
  let sheet = workbook.add_worksheet();
  sheet
    .set_name(SHEET_NAME)
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;

  let header = Format::new()
    .set_bold()
    .set_font_color(Color::White)
    .set_background_color(Color::RGB(0x4F81BD))
    .set_align(FormatAlign::Center)
    .set_align(FormatAlign::VerticalCenter);
  let cell = Format::new().set_text_wrap().set_align(FormatAlign::Top);

  let mut widths = [0_usize; 10];
  for (col, column) in Column::ALL.iter().enumerate() {
    sheet.write_string_with_format(0, col as u16, column.header(), &header)?;
    widths[col] = column.header().chars().count();
  }

  let mut row = 1_u32;
  for order in orders {
    for (col, value) in order.values().iter().enumerate() {
      if value.is_empty() {
        sheet.write_blank(row, col as u16, &cell)?;
      } else {
        sheet.write_string_with_format(row, col as u16, *value, &cell)?;
      }
      widths[col] = widths[col].max(value.chars().count());
    }
    row += 1;
  }

  for (col, width) in widths.iter().enumerate() {
    sheet.set_column_width(col as u16, (*width + 2).min(MAX_COLUMN_WIDTH) as f64)?;
  }

  workbook
    .save(path)
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;
  Ok(())
}
