//! Vehicle, fuel price and registration normalization through the public API

use anyhow::Result;
use std::collections::BTreeMap;
use tempfile::tempdir;
use truck_data_pipeline::application::aggregation::{collapse_fuels, collapse_regions, trend_from_records};
use truck_data_pipeline::application::normalizer::{average_fuel_costs, parse_number, spec_from_lineup, transform_catalog};
use truck_data_pipeline::application::vehicle_pipeline::load_vehicles;
use truck_data_pipeline::domain::market::RawFuelPrices;
use truck_data_pipeline::domain::registration::{ProvinceCount, Region, RegistrationFuel};
use truck_data_pipeline::domain::vehicle::{FuelKind, LineupSnapshot, ModelSnapshot, TrimInfo, VehicleCatalog, VehicleFilter};
use truck_data_pipeline::infrastructure::{
    AppConfig, ArtifactStore, DatabaseConnection, PipelineRepository, RecordSink,
};

fn lineup(id: &str, trim: &str, price: &str, specs: &[(&str, &str)]) -> LineupSnapshot {
    LineupSnapshot {
        id: id.into(),
        name: format!("라인업 {id}"),
        trims: TrimInfo {
            name: trim.into(),
            price: price.into(),
        },
        specs: specs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        features: BTreeMap::new(),
    }
}

fn catalog() -> VehicleCatalog {
    let mut lpg = ModelSnapshot::new("기아 봉고3", "4402", "기아");
    lpg.lineup = vec![
        lineup(
            "1",
            "LPG 2WD 킹캡 초장축 GL",
            "21,350,000",
            &[("연료", "LPG"), ("연료탱크", "75 ℓ"), ("복합연비", "8.0 km/ℓ"), ("최고출력", "159마력"), ("적재량", "1,000 kg")],
        ),
        lineup("2", "디젤 트림", "20,000,000", &[("연료", "디젤"), ("연료탱크", "65 ℓ")]),
        lineup("3", "", "", &[("연료", "LPG")]),
    ];

    let mut ev = ModelSnapshot::new("현대 포터2 일렉트릭", "4399", "현대");
    ev.image_url = "https://img.danawa.com/4399.png".into();
    ev.lineup = vec![lineup(
        "10",
        "슈퍼캡 초장축 스마트",
        "42690000",
        &[
            ("연료", "전기"),
            ("배터리 용량", "58.0 kWh"),
            ("복합전비", "3.1 km/kWh"),
            ("복합 주행거리", "211 km"),
            ("모터 최고출력", "135kW (184마력)"),
            ("유지비", "6,490,740원"),
        ],
    )];

    let mut catalog = VehicleCatalog::new();
    catalog.insert("bongo3".into(), lpg);
    catalog.insert("porter2_ev".into(), ev);
    catalog
}

#[test]
fn capacity_key_follows_fuel_type() {
    let catalog = catalog();
    let ev = &catalog["porter2_ev"];
    let lpg = &catalog["bongo3"];

    let ev_spec = spec_from_lineup("porter2_ev", ev, "현대", &ev.lineup[0]).expect("electric lineup is kept");
    let lpg_spec = spec_from_lineup("bongo3", lpg, "기아", &lpg.lineup[0]).expect("lpg lineup is kept");

    assert_eq!(ev_spec.fuel_type, FuelKind::Electric);
    assert_eq!(ev_spec.max_fuel, 58.0);
    assert_eq!(ev_spec.max_dist, 211);
    assert_eq!(ev_spec.maintenance_cost, Some(649));
    assert_eq!(lpg_spec.fuel_type, FuelKind::Lpg);
    assert_eq!(lpg_spec.max_fuel, 75.0);
}

#[test]
fn combustion_range_is_tank_times_efficiency() {
    let catalog = catalog();
    let lpg = &catalog["bongo3"];

    let spec = spec_from_lineup("bongo3", lpg, "기아", &lpg.lineup[0]).expect("lpg lineup is kept");

    assert_eq!(spec.max_dist, 600);
    assert_eq!(spec.price, 21_350_000);
    assert_eq!(spec.capacity, 1000.0);
    assert_eq!(spec.h_power, 159);
    assert_eq!(spec.ct_efc, None);
    assert_eq!(spec.image, None);
}

#[test]
fn catalogue_keeps_lpg_and_electric_trims_only() {
    let config = AppConfig::default();
    let specs = transform_catalog(&catalog(), &config.vehicles.models);

    assert_eq!(specs.len(), 2);
    assert!(specs.iter().all(|s| s.fuel_type.is_retained()));
    assert!(specs.iter().all(|s| s.size == "소형"));
}

#[tokio::test]
async fn saved_catalogue_round_trips_into_the_database() -> Result<()> {
    let dir = tempdir()?;
    let store = ArtifactStore::new(dir.path().join("raw"), dir.path().join("processed"));
    store.save_vehicle_catalog(&catalog()).await?;

    let db = DatabaseConnection::new(&format!("sqlite:{}", dir.path().join("pipeline.db").display())).await?;
    db.migrate().await?;
    let repo = PipelineRepository::new(db.pool().clone());

    let inserted = load_vehicles(&store, &repo, &AppConfig::default().vehicles.models).await?;
    assert_eq!(inserted, 2);

    let electric = repo
        .list_vehicles(&VehicleFilter {
            fuel_type: Some("전기".into()),
            maker: None,
        })
        .await?;
    assert_eq!(electric.len(), 1);
    assert_eq!(electric[0].spec.name, "슈퍼캡 초장축 스마트");

    let by_family = repo.vehicles_by_family("초장축").await?;
    assert_eq!(by_family.len(), 2);
    assert!(by_family[0].spec.price <= by_family[1].spec.price);
    Ok(())
}

#[test]
fn lpg_price_is_converted_to_liters() {
    let costs = average_fuel_costs(&RawFuelPrices {
        diesel: Vec::new(),
        lpg: vec![900.0, 1100.0],
        electric: Vec::new(),
    });

    assert_eq!(costs.len(), 2);
    assert_eq!(costs[0].fuel_type, FuelKind::Lpg);
    assert_eq!(costs[0].average_cost, 584.0);
    assert_eq!(costs[1].fuel_type, FuelKind::Other);
}

#[test]
fn number_parsing_boundaries() {
    assert_eq!(parse_number("12,345.6 원"), 12345.6);
    assert_eq!(parse_number(""), 0.0);
    assert_eq!(parse_number("원"), 0.0);
}

#[tokio::test]
async fn registration_rows_keep_their_total_through_storage() -> Result<()> {
    let counts: Vec<ProvinceCount> = [
        (202312, "서울", "경유", 10),
        (202312, "부산", "경유", 20),
        (202312, "경남", "전기", 5),
        (202312, "제주", "휘발유", 1),
        (202412, "서울", "경유", 12),
        (202412, "울산", "전기", 9),
        (202412, "세종", "엘피지", 3),
    ]
    .into_iter()
    .map(|(date, province, fuel, count)| ProvinceCount {
        date,
        province: province.into(),
        fuel_label: fuel.into(),
        count,
    })
    .collect();
    let total: u64 = counts.iter().map(|c| c.count).sum();

    let records = collapse_fuels(&collapse_regions(&counts));
    assert_eq!(records.iter().map(|r| r.count).sum::<u64>(), total);
    assert!(records.iter().any(|r| r.region == Region::Chungcheong && r.fuel_type == RegistrationFuel::Lpg));

    let db = DatabaseConnection::new("sqlite::memory:").await?;
    db.migrate().await?;
    let repo = PipelineRepository::new(db.pool().clone());
    repo.insert_registration_counts(&records).await?;

    let stored = repo.list_registration_counts().await?;
    assert_eq!(stored.iter().map(|r| r.count).sum::<u64>(), total);

    let trend = trend_from_records(&stored);
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].year, 2024);
    assert_eq!(trend[0].electric, 4);
    Ok(())
}
