//! Fuel price and charger count records

use serde::{Deserialize, Serialize};

use super::vehicle::FuelKind;

/// `fuel_tbl` row: average price per canonical unit (원/L, 원/kWh)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelCostRecord {
    pub fuel_type: FuelKind,
    pub average_cost: f64,
}

/// Scraped price lists before averaging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFuelPrices {
    pub diesel: Vec<f64>,
    /// 원/kg
    pub lpg: Vec<f64>,
    /// 급속 충전 단가
    pub electric: Vec<f64>,
}

/// `region_tbl` row. Region is the natural key; "전국" is the aggregate row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionChargerRecord {
    pub region: String,
    pub charger_count: i64,
}
