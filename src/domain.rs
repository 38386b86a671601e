//! Domain module - entities and value objects of the truck data pipeline
//!
//! - `faq`: raw and classified question/answer records
//! - `vehicle`: danawa snapshots and normalized spec rows
//! - `registration`: region/fuel taxonomies and registration counts
//! - `market`: fuel prices and charger counts
//! - `pagination`: paged-source state machine

pub mod faq;
pub mod market;
pub mod pagination;
pub mod registration;
pub mod vehicle;

pub use faq::{CanonicalFaq, FaqCategory, FaqDocument, FuelTag, RawRecord};
pub use market::{FuelCostRecord, RawFuelPrices, RegionChargerRecord};
pub use pagination::{ExhaustionReason, PagerState};
pub use registration::{Region, RegistrationCountRecord, RegistrationFuel, TrendFuel, TrendPoint};
pub use vehicle::{FuelKind, LineupSnapshot, ModelSnapshot, SpecRecord, StoredVehicle, VehicleCatalog};
