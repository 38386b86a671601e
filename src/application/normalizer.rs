//! Field normalizers and unit converters
//!
//! Locale-formatted strings ("12,345.6 원", "138/3,800 ps/rpm", "75 ℓ") become
//! numbers here. Parsing never fails: a string without digits is zero.

use crate::domain::faq::RawRecord;
use crate::domain::market::{FuelCostRecord, RawFuelPrices};
use crate::domain::vehicle::{FuelKind, LineupSnapshot, ModelSnapshot, SpecRecord, VehicleCatalog};
use crate::infrastructure::config::{FaqConfig, VehicleModelConfig, defaults};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

static DECIMAL_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("decimal regex is valid"));
static INTEGER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("integer regex is valid"));

/// First number in the string after thousands separators are removed; 0.0 when absent
pub fn parse_number(value: &str) -> f64 {
    let cleaned = value.replace(',', "");
    DECIMAL_RUN
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// First integer run after thousands separators are removed; 0 when absent
pub fn parse_integer(value: &str) -> i64 {
    let cleaned = value.replace(',', "");
    INTEGER_RUN
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// "138/3,800 ps/rpm" → 138
pub fn extract_horsepower(value: &str) -> i64 {
    INTEGER_RUN
        .find(value)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Substring checks in priority order: 전기/배터리, LPG, 디젤, 가솔린
pub fn normalize_fuel(value: &str) -> FuelKind {
    if value.contains("전기") || value.contains("배터리") {
        FuelKind::Electric
    } else if value.contains("LPG") {
        FuelKind::Lpg
    } else if value.contains("디젤") {
        FuelKind::Diesel
    } else if value.contains("가솔린") {
        FuelKind::Gasoline
    } else {
        FuelKind::Other
    }
}

/// Spec keys consulted for one fuel type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelKeys {
    pub capacity: &'static str,
    pub combined: &'static str,
    pub city: &'static str,
    pub highway: &'static str,
    /// Stated range; only electric specs publish one
    pub range: Option<&'static str>,
}

const ELECTRIC_KEYS: FuelKeys = FuelKeys {
    capacity: "배터리 용량",
    combined: "복합전비",
    city: "도심전비",
    highway: "고속전비",
    range: Some("복합 주행거리"),
};

const COMBUSTION_KEYS: FuelKeys = FuelKeys {
    capacity: "연료탱크",
    combined: "복합연비",
    city: "도심연비",
    highway: "고속연비",
    range: None,
};

/// Key set for every fuel kind
pub fn fuel_keys(fuel: FuelKind) -> FuelKeys {
    match fuel {
        FuelKind::Electric => ELECTRIC_KEYS,
        FuelKind::Lpg | FuelKind::Diesel | FuelKind::Gasoline | FuelKind::Other => COMBUSTION_KEYS,
    }
}

fn spec_number(specs: &BTreeMap<String, String>, key: &str) -> f64 {
    specs.get(key).map_or(0.0, |v| parse_number(v))
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

/// Electric: stated range. Combustion: tank × combined efficiency, truncated.
pub fn derive_max_distance(specs: &BTreeMap<String, String>, fuel: FuelKind, max_fuel: f64, combined: f64) -> i64 {
    match fuel_keys(fuel).range {
        Some(key) => specs.get(key).map_or(0, |v| parse_integer(v)),
        None if max_fuel > 0.0 && combined > 0.0 => (max_fuel * combined) as i64,
        None => 0,
    }
}

/// `유지비용`/`유지비` in 원, reported in 만원; zero is dropped
pub fn maintenance_cost(specs: &BTreeMap<String, String>) -> Option<i64> {
    let raw = specs
        .get("유지비용")
        .filter(|v| !v.is_empty())
        .or_else(|| specs.get("유지비"))?;
    let won = parse_integer(raw);
    (won > 0).then_some(won / 10_000)
}

/// Fuel of a lineup: EV models are electric regardless of the `연료` row
pub fn lineup_fuel(model_key: &str, model_name: &str, specs: &BTreeMap<String, String>) -> FuelKind {
    let is_ev = model_key.to_uppercase().contains("EV") || model_name.to_uppercase().contains("EV");
    if is_ev {
        FuelKind::Electric
    } else {
        normalize_fuel(specs.get("연료").map_or("", String::as_str))
    }
}

/// One lineup → one spec record. `None` when the lineup is incomplete or the fuel is not retained.
pub fn spec_from_lineup(model_key: &str, model: &ModelSnapshot, maker: &str, lineup: &LineupSnapshot) -> Option<SpecRecord> {
    let name = lineup.trims.name.trim();
    if name.is_empty() || lineup.specs.is_empty() {
        debug!("{}: lineup {} has no trim or specs", model_key, lineup.id);
        return None;
    }

    let specs = &lineup.specs;
    let fuel_type = lineup_fuel(model_key, &model.model, specs);
    if !fuel_type.is_retained() {
        debug!("{}: lineup {} is {}, skipped", model_key, lineup.id, fuel_type);
        return None;
    }

    let keys = fuel_keys(fuel_type);
    let max_fuel = spec_number(specs, keys.capacity);
    let cx_efc = spec_number(specs, keys.combined);
    let horsepower = specs
        .get("최고출력")
        .filter(|v| !v.is_empty())
        .or_else(|| specs.get("모터 최고출력"))
        .map_or(0, |v| extract_horsepower(v));

    Some(SpecRecord {
        fuel_type,
        name: name.to_string(),
        maker: maker.to_string(),
        size: defaults::VEHICLE_SIZE.to_string(),
        capacity: spec_number(specs, "적재량"),
        h_power: horsepower,
        max_fuel,
        cx_efc: positive(cx_efc),
        ct_efc: positive(spec_number(specs, keys.city)),
        hw_efc: positive(spec_number(specs, keys.highway)),
        max_dist: derive_max_distance(specs, fuel_type, max_fuel, cx_efc),
        price: parse_integer(&lineup.trims.price),
        maintenance_cost: maintenance_cost(specs),
        image: Some(model.image_url.clone()).filter(|url| !url.is_empty()),
    })
}

/// Whole catalogue → spec records in model-key then lineup order.
/// The maker comes from configuration when the model is configured.
pub fn transform_catalog(catalog: &VehicleCatalog, models: &[VehicleModelConfig]) -> Vec<SpecRecord> {
    catalog
        .iter()
        .flat_map(|(key, model)| {
            let maker = models
                .iter()
                .find(|m| &m.key == key)
                .map_or(model.maker.as_str(), |m| m.maker.as_str());
            model
                .lineup
                .iter()
                .filter_map(move |lineup| spec_from_lineup(key, model, maker, lineup))
        })
        .collect()
}

/// Length filter on trimmed text; the unavailable sentinel is a valid answer
pub fn is_valid_faq(record: &RawRecord, config: &FaqConfig) -> bool {
    let question = record.question.trim();
    let answer = record.answer.trim();
    if question.chars().count() < config.min_question_chars {
        return false;
    }
    answer == config.unavailable_sentinel || answer.chars().count() >= config.min_answer_chars
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean per fuel, rounded to 2 decimals. LPG is published per kg and converted to per liter.
/// A fuel with no prices gets no row; a fixed 기타 row closes the list.
pub fn average_fuel_costs(prices: &RawFuelPrices) -> Vec<FuelCostRecord> {
    let mut rows = Vec::with_capacity(4);
    if let Some(avg) = mean(&prices.diesel) {
        rows.push(FuelCostRecord {
            fuel_type: FuelKind::Diesel,
            average_cost: round2(avg),
        });
    }
    if let Some(avg) = mean(&prices.lpg) {
        rows.push(FuelCostRecord {
            fuel_type: FuelKind::Lpg,
            average_cost: round2(avg * defaults::LPG_KG_TO_LITER),
        });
    }
    if let Some(avg) = mean(&prices.electric) {
        rows.push(FuelCostRecord {
            fuel_type: FuelKind::Electric,
            average_cost: round2(avg),
        });
    }
    rows.push(FuelCostRecord {
        fuel_type: FuelKind::Other,
        average_cost: 0.0,
    });
    rows
}
