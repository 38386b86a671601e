//! Truck Data Pipeline - light-truck market data extraction and normalization
//!
//! Scrapes FAQ boards, danawa model pages, fuel price and charger statistics
//! pages and the monthly registration spreadsheets, then normalizes them into
//! the six tables the dashboard reads.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
