//! Registration transform stage
//!
//! Wide monthly sheets are reshaped into long (date, region, fuel, count)
//! rows. Taxonomy collapses are followed by a group-and-sum so the total count
//! is the same before and after every regrouping.

use crate::domain::registration::{
    ProvinceCount, Region, RegistrationCountRecord, RegistrationFuel, TrendFuel, TrendPoint, WideRow, WideSheet,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Row marker for subtotal and total lines
const TOTAL_MARKER: &str = "계";
const CARGO_TYPE: &str = "화물";

/// Sum counts per key
pub fn group_sum<K: Ord>(entries: impl IntoIterator<Item = (K, u64)>) -> BTreeMap<K, u64> {
    let mut sums = BTreeMap::new();
    for (key, count) in entries {
        *sums.entry(key).or_insert(0) += count;
    }
    sums
}

/// Merged cells: carry the last seen fuel label and vehicle type down
pub fn forward_fill(rows: &[WideRow]) -> Vec<WideRow> {
    let mut fuel: Option<String> = None;
    let mut vehicle_type: Option<String> = None;
    rows.iter()
        .map(|row| {
            if row.fuel_label.is_some() {
                fuel.clone_from(&row.fuel_label);
            }
            if row.vehicle_type.is_some() {
                vehicle_type.clone_from(&row.vehicle_type);
            }
            WideRow {
                fuel_label: fuel.clone(),
                vehicle_type: vehicle_type.clone(),
                ..row.clone()
            }
        })
        .collect()
}

/// Long form of one sheet: cargo-total rows only, total fuel lines dropped
pub fn melt(sheet: &WideSheet) -> Vec<ProvinceCount> {
    forward_fill(&sheet.rows)
        .into_iter()
        .filter(|row| row.vehicle_type.as_deref() == Some(CARGO_TYPE) && row.usage.as_deref() == Some(TOTAL_MARKER))
        .filter_map(|row| row.fuel_label.map(|fuel| (fuel, row.counts)))
        .filter(|(fuel, _)| !fuel.contains(TOTAL_MARKER))
        .flat_map(|(fuel, counts)| {
            sheet
                .provinces
                .iter()
                .zip(counts)
                .filter(|(province, _)| !province.contains(TOTAL_MARKER))
                .map(move |(province, count)| ProvinceCount {
                    date: sheet.date,
                    province: province.clone(),
                    fuel_label: fuel.clone(),
                    count,
                })
        })
        .collect()
}

/// 17 provinces → 8 regions, summed per (date, region, raw fuel label)
pub fn collapse_regions(counts: &[ProvinceCount]) -> BTreeMap<(u32, Region, String), u64> {
    group_sum(counts.iter().filter_map(|c| match Region::from_province(&c.province) {
        Some(region) => Some(((c.date, region, c.fuel_label.clone()), c.count)),
        None => {
            warn!("Unmapped province '{}' dropped ({} rows)", c.province, c.count);
            None
        }
    }))
}

/// Raw fuel labels → {디젤, LPG, 전기, 기타}, summed per (date, region, fuel)
pub fn collapse_fuels(regional: &BTreeMap<(u32, Region, String), u64>) -> Vec<RegistrationCountRecord> {
    group_sum(
        regional
            .iter()
            .map(|((date, region, label), count)| ((*date, *region, RegistrationFuel::from_source_label(label)), *count)),
    )
    .into_iter()
    .map(|((date, region, fuel_type), count)| RegistrationCountRecord {
        date,
        region,
        fuel_type,
        count,
    })
    .collect()
}

/// Every sheet → `cnt_tbl` rows, sorted by (date, region, fuel)
pub fn transform_sheets(sheets: &[WideSheet]) -> Vec<RegistrationCountRecord> {
    let counts: Vec<ProvinceCount> = sheets.iter().flat_map(melt).collect();
    debug!("Melted {} sheets into {} province rows", sheets.len(), counts.len());
    collapse_fuels(&collapse_regions(&counts))
}

/// Year-over-year new registrations per trend bucket.
///
/// Each year is represented by its latest month (cumulative stock). The first
/// year has no predecessor and produces no point.
pub fn registration_trend(rows: impl IntoIterator<Item = (u32, TrendFuel, u64)>) -> Vec<TrendPoint> {
    let rows: Vec<(u32, TrendFuel, u64)> = rows.into_iter().collect();

    let mut latest: BTreeMap<u32, u32> = BTreeMap::new();
    for (date, _, _) in &rows {
        let entry = latest.entry(date / 100).or_insert(*date);
        *entry = (*entry).max(*date);
    }

    let totals = group_sum(
        rows.iter()
            .filter(|(date, _, _)| latest.get(&(date / 100)) == Some(date))
            .map(|(date, fuel, count)| ((date / 100, *fuel), *count)),
    );
    let bucket = |year: u32, fuel: TrendFuel| totals.get(&(year, fuel)).copied().unwrap_or(0) as i64;

    let years: Vec<u32> = latest.keys().copied().collect();
    years
        .windows(2)
        .map(|pair| {
            let (prev, year) = (pair[0], pair[1]);
            TrendPoint {
                year,
                electric: bucket(year, TrendFuel::Electric) - bucket(prev, TrendFuel::Electric),
                combustion: bucket(year, TrendFuel::Combustion) - bucket(prev, TrendFuel::Combustion),
                other: bucket(year, TrendFuel::Other) - bucket(prev, TrendFuel::Other),
            }
        })
        .collect()
}

/// Trend straight from raw spreadsheet labels
pub fn trend_from_province_counts(counts: &[ProvinceCount]) -> Vec<TrendPoint> {
    registration_trend(
        counts
            .iter()
            .map(|c| (c.date, TrendFuel::from_source_label(&c.fuel_label), c.count)),
    )
}

/// Trend from stored `cnt_tbl` rows
pub fn trend_from_records(records: &[RegistrationCountRecord]) -> Vec<TrendPoint> {
    registration_trend(
        records
            .iter()
            .map(|r| (r.date, TrendFuel::from_registration(r.fuel_type), r.count)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(fuel: Option<&str>, vehicle_type: Option<&str>, usage: &str, counts: &[u64]) -> WideRow {
        WideRow {
            fuel_label: fuel.map(str::to_string),
            vehicle_type: vehicle_type.map(str::to_string),
            usage: Some(usage.to_string()),
            counts: counts.to_vec(),
        }
    }

    fn sheet(date: u32) -> WideSheet {
        WideSheet {
            date,
            provinces: vec!["서울".into(), "부산".into(), "울산".into()],
            rows: vec![
                row(Some("경유"), Some("승용"), "계", &[100, 100, 100]),
                row(None, Some("화물"), "계", &[10, 20, 30]),
                row(None, None, "관용", &[1, 1, 1]),
                row(Some("엘피지"), Some("화물"), "계", &[5, 5, 5]),
                row(Some("휘발유"), Some("화물"), "계", &[2, 0, 1]),
                row(Some("CNG"), Some("화물"), "계", &[1, 1, 1]),
                row(Some("계"), Some("화물"), "계", &[18, 26, 37]),
            ],
        }
    }

    #[test]
    fn test_forward_fill_carries_merged_labels() {
        let filled = forward_fill(&sheet(202401).rows);
        assert_eq!(filled[1].fuel_label.as_deref(), Some("경유"));
        assert_eq!(filled[2].vehicle_type.as_deref(), Some("화물"));
        assert_eq!(filled[2].usage.as_deref(), Some("관용"));
    }

    #[test]
    fn test_melt_keeps_cargo_totals_only() {
        let long = melt(&sheet(202401));
        // 경유, 엘피지, 휘발유, CNG × 3 provinces; the 계 line is gone
        assert_eq!(long.len(), 12);
        assert!(long.iter().all(|c| c.fuel_label != "계"));
        assert_eq!(long.iter().map(|c| c.count).sum::<u64>(), 60 + 15 + 3 + 3);
    }

    #[test]
    fn test_transform_collapses_both_taxonomies() {
        let records = transform_sheets(&[sheet(202401)]);
        let count = |region, fuel| {
            records
                .iter()
                .find(|r| r.region == region && r.fuel_type == fuel)
                .map(|r| r.count)
        };
        // 부산 + 울산 → 경상
        assert_eq!(count(Region::Gyeongsang, RegistrationFuel::Diesel), Some(50));
        assert_eq!(count(Region::Seoul, RegistrationFuel::Diesel), Some(10));
        assert_eq!(count(Region::Gyeongsang, RegistrationFuel::Lpg), Some(10));
        // 휘발유 + CNG → 기타
        assert_eq!(count(Region::Seoul, RegistrationFuel::Other), Some(3));
        assert_eq!(count(Region::Gyeongsang, RegistrationFuel::Other), Some(3));
        assert_eq!(records.len(), 6);
    }

    #[test]
    fn test_trend_uses_latest_month_and_diffs() {
        let rows = vec![
            (202212, TrendFuel::Electric, 100),
            (202212, TrendFuel::Combustion, 1000),
            (202306, TrendFuel::Electric, 999),
            (202312, TrendFuel::Electric, 180),
            (202312, TrendFuel::Combustion, 990),
            (202403, TrendFuel::Electric, 200),
            (202403, TrendFuel::Other, 4),
        ];
        let trend = registration_trend(rows);
        assert_eq!(trend.len(), 2);
        assert_eq!(
            trend[0],
            TrendPoint {
                year: 2023,
                electric: 80,
                combustion: -10,
                other: 0
            }
        );
        assert_eq!(trend[1].year, 2024);
        assert_eq!(trend[1].combustion, -990);
        assert_eq!(trend[1].other, 4);
    }

    #[test]
    fn test_the_two_trend_sources_differ_only_in_other_fuels() {
        let mut later = sheet(202412);
        for row in &mut later.rows {
            row.counts.iter_mut().for_each(|c| *c *= 2);
        }
        let counts: Vec<ProvinceCount> = melt(&sheet(202312)).into_iter().chain(melt(&later)).collect();
        let records = collapse_fuels(&collapse_regions(&counts));

        let from_labels = trend_from_province_counts(&counts);
        let from_records = trend_from_records(&records);
        // 휘발유/CNG are 내연 in the trend report but 기타 in cnt_tbl
        assert_eq!(from_labels[0].combustion, 81);
        assert_eq!(from_labels[0].other, 0);
        assert_eq!(from_records[0].combustion, 75);
        assert_eq!(from_records[0].other, 6);
    }

    fn province_counts() -> impl Strategy<Value = Vec<ProvinceCount>> {
        let provinces = crate::domain::registration::PROVINCES;
        let labels = ["경유", "엘피지", "전기", "휘발유", "수소", "하이브리드(경유+전기)"];
        prop::collection::vec(
            (0..provinces.len(), 0..labels.len(), 202001u32..202012, 0u64..1_000_000),
            0..64,
        )
        .prop_map(move |entries| {
            entries
                .into_iter()
                .map(|(p, l, date, count)| ProvinceCount {
                    date,
                    province: provinces[p].to_string(),
                    fuel_label: labels[l].to_string(),
                    count,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_region_collapse_conserves_total(counts in province_counts()) {
            let before: u64 = counts.iter().map(|c| c.count).sum();
            let regional = collapse_regions(&counts);
            prop_assert_eq!(regional.values().sum::<u64>(), before);
            let records = collapse_fuels(&regional);
            prop_assert_eq!(records.iter().map(|r| r.count).sum::<u64>(), before);
        }

        #[test]
        fn prop_group_sum_conserves_total(entries in prop::collection::vec((0u8..8, 0u64..10_000), 0..100)) {
            let before: u64 = entries.iter().map(|(_, c)| c).sum();
            prop_assert_eq!(group_sum(entries).values().sum::<u64>(), before);
        }
    }
}
