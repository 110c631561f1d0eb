pub mod audit;
pub mod commands;
pub mod domain;
pub mod error;
pub mod export;
pub mod files;
pub mod models;
pub mod reports;
pub mod settings;
pub mod store;

pub use commands::Session;
pub use error::AppError;
pub use models::{Column, Order, OrderId, Query, SortDirection};
