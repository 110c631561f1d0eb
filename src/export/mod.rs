pub mod csv;
pub mod excel;
pub mod pdf;
