use rust_xlsxwriter::XlsxError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
  pub code: String,
  pub message: String,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
    }
  }

  pub fn read_only() -> Self {
    AppError::new("READ_ONLY", "Режим только для чтения. Изменения невозможны.")
  }

  pub fn is(&self, code: &str) -> bool {
    self.code == code
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new("IO_ERROR", err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::new("JSON_ERROR", err.to_string())
  }
}

impl From<csv::Error> for AppError {
  fn from(err: csv::Error) -> Self {
    AppError::new("CSV_ERROR", err.to_string())
  }
}

impl From<printpdf::Error> for AppError {
  fn from(err: printpdf::Error) -> Self {
    AppError::new("EXPORT", err.to_string())
  }
}

impl From<XlsxError> for AppError {
  fn from(err: XlsxError) -> Self {
    AppError::new("EXPORT", err.to_string())
  }
}
