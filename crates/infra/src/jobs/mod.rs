//! Background jobs.

pub mod low_stock;

pub use low_stock::LowStockReportJob;
