//! Registration statistics taxonomy
//!
//! 17개 시도 → 8개 권역, 원천 연료 라벨 → 보고서별 연료 버킷.
//! 두 가지 연료 버킷(`RegistrationFuel`, `TrendFuel`)은 서로 다른 보고서용이며 섞어 쓰지 않는다.

use serde::{Deserialize, Serialize};

/// 17 administrative provinces, in spreadsheet column order
pub const PROVINCES: [&str; 17] = [
    "서울", "부산", "대구", "인천", "광주", "대전", "울산", "세종", "경기", "강원",
    "충북", "충남", "전북", "전남", "경북", "경남", "제주",
];

/// 8 canonical regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "서울")]
    Seoul,
    #[serde(rename = "인천")]
    Incheon,
    #[serde(rename = "경기")]
    Gyeonggi,
    #[serde(rename = "강원")]
    Gangwon,
    #[serde(rename = "충청")]
    Chungcheong,
    #[serde(rename = "전라")]
    Jeolla,
    #[serde(rename = "경상")]
    Gyeongsang,
    #[serde(rename = "제주")]
    Jeju,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Self::Seoul,
        Self::Incheon,
        Self::Gyeonggi,
        Self::Gangwon,
        Self::Chungcheong,
        Self::Jeolla,
        Self::Gyeongsang,
        Self::Jeju,
    ];

    /// Many-to-one province mapping. Unknown names yield `None`.
    pub fn from_province(province: &str) -> Option<Self> {
        match province.trim() {
            "서울" => Some(Self::Seoul),
            "인천" => Some(Self::Incheon),
            "경기" => Some(Self::Gyeonggi),
            "강원" => Some(Self::Gangwon),
            "제주" => Some(Self::Jeju),
            "충북" | "충남" | "대전" | "세종" => Some(Self::Chungcheong),
            "전북" | "전남" | "광주" => Some(Self::Jeolla),
            "경북" | "경남" | "부산" | "대구" | "울산" => Some(Self::Gyeongsang),
            _ => None,
        }
    }

    /// Canonical region name back to the enum
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name.trim())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seoul => "서울",
            Self::Incheon => "인천",
            Self::Gyeonggi => "경기",
            Self::Gangwon => "강원",
            Self::Chungcheong => "충청",
            Self::Jeolla => "전라",
            Self::Gyeongsang => "경상",
            Self::Jeju => "제주",
        }
    }
}

/// Fuel bucket of `cnt_tbl`: {디젤, LPG, 전기, 기타}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegistrationFuel {
    #[serde(rename = "디젤")]
    Diesel,
    #[serde(rename = "LPG")]
    Lpg,
    #[serde(rename = "전기")]
    Electric,
    #[serde(rename = "기타")]
    Other,
}

impl RegistrationFuel {
    /// 경유→디젤, 엘피지→LPG, 전기→전기, 나머지는 전부 기타
    pub fn from_source_label(label: &str) -> Self {
        match label.trim() {
            "경유" => Self::Diesel,
            "엘피지" => Self::Lpg,
            "전기" => Self::Electric,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diesel => "디젤",
            Self::Lpg => "LPG",
            Self::Electric => "전기",
            Self::Other => "기타",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "디젤" => Some(Self::Diesel),
            "LPG" => Some(Self::Lpg),
            "전기" => Some(Self::Electric),
            "기타" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Fuel bucket of the registration trend report: {내연, 전기, 기타}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrendFuel {
    #[serde(rename = "내연")]
    Combustion,
    #[serde(rename = "전기")]
    Electric,
    #[serde(rename = "기타")]
    Other,
}

impl TrendFuel {
    /// Collapse straight from a raw spreadsheet label
    pub fn from_source_label(label: &str) -> Self {
        let label = label.trim();
        match label {
            "전기" => Self::Electric,
            "경유" | "휘발유" | "엘피지" | "CNG" | "LNG" | "등유" => Self::Combustion,
            _ if label.starts_with("하이브리드") => Self::Combustion,
            _ => Self::Other,
        }
    }

    /// Collapse from an already stored `cnt_tbl` bucket
    pub fn from_registration(fuel: RegistrationFuel) -> Self {
        match fuel {
            RegistrationFuel::Diesel | RegistrationFuel::Lpg => Self::Combustion,
            RegistrationFuel::Electric => Self::Electric,
            RegistrationFuel::Other => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combustion => "내연",
            Self::Electric => "전기",
            Self::Other => "기타",
        }
    }
}

/// One data row of the "연료별" sheet. Merged cells read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideRow {
    pub fuel_label: Option<String>,
    pub vehicle_type: Option<String>,
    pub usage: Option<String>,
    /// Aligned with [`WideSheet::provinces`]
    pub counts: Vec<u64>,
}

/// Wide per-province sheet of one monthly workbook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideSheet {
    /// YYYYMM
    pub date: u32,
    pub provinces: Vec<String>,
    pub rows: Vec<WideRow>,
}

/// Long-form count before any taxonomy collapse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceCount {
    pub date: u32,
    pub province: String,
    pub fuel_label: String,
    pub count: u64,
}

/// `cnt_tbl` row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationCountRecord {
    /// YYYYMM
    pub date: u32,
    pub region: Region,
    pub fuel_type: RegistrationFuel,
    pub count: u64,
}

/// Year-over-year new registrations per trend bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: u32,
    pub electric: i64,
    pub combustion: i64,
    pub other: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_province_maps_to_a_region() {
        for province in PROVINCES {
            assert!(Region::from_province(province).is_some(), "{province} unmapped");
        }
        assert_eq!(Region::from_province("합계"), None);
    }

    #[test]
    fn test_the_two_fuel_collapses_differ() {
        assert_eq!(RegistrationFuel::from_source_label("휘발유"), RegistrationFuel::Other);
        assert_eq!(TrendFuel::from_source_label("휘발유"), TrendFuel::Combustion);
        assert_eq!(TrendFuel::from_source_label("하이브리드(경유+전기)"), TrendFuel::Combustion);
        assert_eq!(TrendFuel::from_source_label("수소"), TrendFuel::Other);
        assert_eq!(TrendFuel::from_registration(RegistrationFuel::Lpg), TrendFuel::Combustion);
    }
}
