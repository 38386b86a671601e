//! Vehicle spec entities
//!
//! `ModelSnapshot` is the raw, nested-by-lineup extraction artifact.
//! `SpecRecord` is the normalized row for `car_info_tbl`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical fuel label used by vehicle specs and fuel costs (fuel_tbl keys)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuelKind {
    #[serde(rename = "전기")]
    Electric,
    #[serde(rename = "LPG")]
    Lpg,
    #[serde(rename = "디젤")]
    Diesel,
    #[serde(rename = "가솔린")]
    Gasoline,
    #[serde(rename = "기타")]
    Other,
}

impl FuelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electric => "전기",
            Self::Lpg => "LPG",
            Self::Diesel => "디젤",
            Self::Gasoline => "가솔린",
            Self::Other => "기타",
        }
    }

    /// Stored label back to the enum; unknown labels are 기타
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "전기" => Self::Electric,
            "LPG" => Self::Lpg,
            "디젤" => Self::Diesel,
            "가솔린" => Self::Gasoline,
            _ => Self::Other,
        }
    }

    /// Only LPG and electric trims are kept downstream
    pub fn is_retained(&self) -> bool {
        matches!(self, Self::Lpg | Self::Electric)
    }
}

impl std::fmt::Display for FuelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First trim shown for a lineup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimInfo {
    pub name: String,
    pub price: String,
}

impl TrimInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.price.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupSnapshot {
    pub id: String,
    pub name: String,
    pub trims: TrimInfo,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub model: String,
    pub model_id: String,
    pub maker: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_file: String,
    #[serde(default)]
    pub lineup: Vec<LineupSnapshot>,
}

impl ModelSnapshot {
    pub fn new(model: &str, model_id: &str, maker: &str) -> Self {
        Self {
            model: model.to_string(),
            model_id: model_id.to_string(),
            maker: maker.to_string(),
            ..Default::default()
        }
    }
}

/// `car_info/vehicles.json`: model key -> snapshot
pub type VehicleCatalog = BTreeMap<String, ModelSnapshot>;

/// Normalized vehicle spec (one per lineup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecRecord {
    pub fuel_type: FuelKind,
    pub name: String,
    pub maker: String,
    pub size: String,
    /// 적재량 (톤)
    pub capacity: f64,
    pub h_power: i64,
    /// 리터 또는 kWh
    pub max_fuel: f64,
    pub cx_efc: Option<f64>,
    pub ct_efc: Option<f64>,
    pub hw_efc: Option<f64>,
    pub max_dist: i64,
    /// 원
    pub price: i64,
    /// 만원
    pub maintenance_cost: Option<i64>,
    pub image: Option<String>,
}

/// Stored `car_info_tbl` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVehicle {
    pub car_id: i64,
    #[serde(flatten)]
    pub spec: SpecRecord,
}

/// Read-side filter for vehicle listings
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub fuel_type: Option<String>,
    pub maker: Option<String>,
}
