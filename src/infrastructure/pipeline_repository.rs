//! Repository for the six pipeline tables
//!
//! Region and fuel rows are upserted (latest scrape wins). Spec, registration
//! and FAQ rows are appended; deduplication happens before they get here.

#![allow(clippy::uninlined_format_args)]

use crate::domain::faq::{CanonicalFaq, FaqCategoryRow, StoredFaq};
use crate::domain::market::{FuelCostRecord, RegionChargerRecord};
use crate::domain::registration::{Region, RegistrationCountRecord, RegistrationFuel};
use crate::domain::vehicle::{FuelKind, SpecRecord, StoredVehicle, VehicleFilter};
use crate::infrastructure::config::defaults;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Destination of normalized rows
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert_fuel_costs(&self, rows: &[FuelCostRecord]) -> Result<usize>;
    async fn upsert_charger_counts(&self, rows: &[RegionChargerRecord]) -> Result<usize>;
    async fn insert_vehicle_specs(&self, rows: &[SpecRecord]) -> Result<usize>;
    async fn insert_registration_counts(&self, rows: &[RegistrationCountRecord]) -> Result<usize>;
    async fn insert_faqs(&self, rows: &[CanonicalFaq]) -> Result<usize>;
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

/// SQLite implementation of [`RecordSink`] plus the dashboard read queries
#[derive(Clone)]
pub struct PipelineRepository {
    pool: Arc<SqlitePool>,
}

impl PipelineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    // ===============================
    // READ QUERIES
    // ===============================

    /// Vehicles ordered by price, optionally filtered by fuel type and maker
    pub async fn list_vehicles(&self, filter: &VehicleFilter) -> Result<Vec<StoredVehicle>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM car_info_tbl
            WHERE (? IS NULL OR fuel_type = ?) AND (? IS NULL OR maker = ?)
            ORDER BY price ASC, car_id ASC
            "#,
        )
        .bind(&filter.fuel_type)
        .bind(&filter.fuel_type)
        .bind(&filter.maker)
        .bind(&filter.maker)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter().map(vehicle_from_row).collect()
    }

    pub async fn vehicle_by_id(&self, car_id: i64) -> Result<Option<StoredVehicle>> {
        let row = sqlx::query("SELECT * FROM car_info_tbl WHERE car_id = ?")
            .bind(car_id)
            .fetch_optional(&*self.pool)
            .await?;

        row.as_ref().map(vehicle_from_row).transpose()
    }

    /// Vehicles whose name contains `family` (e.g. "포터"), ordered by price
    pub async fn vehicles_by_family(&self, family: &str) -> Result<Vec<StoredVehicle>> {
        let rows = sqlx::query("SELECT * FROM car_info_tbl WHERE name LIKE ? ORDER BY price ASC, car_id ASC")
            .bind(format!("%{}%", family))
            .fetch_all(&*self.pool)
            .await?;

        rows.iter().map(vehicle_from_row).collect()
    }

    pub async fn list_fuel_costs(&self, fuel_type: Option<&str>) -> Result<Vec<FuelCostRecord>> {
        let rows = sqlx::query("SELECT fuel_type, fuel_cost FROM fuel_tbl WHERE (? IS NULL OR fuel_type = ?) ORDER BY fuel_type")
            .bind(fuel_type)
            .bind(fuel_type)
            .fetch_all(&*self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(FuelCostRecord {
                    fuel_type: FuelKind::parse(row.try_get::<String, _>("fuel_type")?.as_str()),
                    average_cost: row.try_get("fuel_cost")?,
                })
            })
            .collect()
    }

    /// Charger counts by region. Registration regions not yet scraped for chargers read 0.
    pub async fn list_charger_counts(&self, region: Option<&str>) -> Result<Vec<RegionChargerRecord>> {
        let rows = sqlx::query("SELECT region, charger_cnt FROM region_tbl WHERE (? IS NULL OR region = ?) ORDER BY region")
            .bind(region)
            .bind(region)
            .fetch_all(&*self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(RegionChargerRecord {
                    region: row.try_get("region")?,
                    charger_count: row.try_get("charger_cnt")?,
                })
            })
            .collect()
    }

    /// Stored registration counts ordered by date. Rows with labels outside the taxonomy are skipped.
    pub async fn list_registration_counts(&self) -> Result<Vec<RegistrationCountRecord>> {
        let rows = sqlx::query("SELECT date, fuel_type, region, cnt FROM cnt_tbl ORDER BY date, id")
            .fetch_all(&*self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let fuel: String = row.try_get("fuel_type")?;
            let region: String = row.try_get("region")?;
            match (RegistrationFuel::parse(&fuel), Region::parse(&region)) {
                (Some(fuel_type), Some(region)) => records.push(RegistrationCountRecord {
                    date: row.try_get::<i64, _>("date")? as u32,
                    region,
                    fuel_type,
                    count: row.try_get::<i64, _>("cnt")?.max(0) as u64,
                }),
                _ => debug!("Skipping cnt_tbl row with unknown labels ({}, {})", fuel, region),
            }
        }
        Ok(records)
    }

    /// FAQs ordered by id, optionally restricted to one stored category name (e.g. "충전")
    pub async fn list_faqs(&self, category_name: Option<&str>) -> Result<Vec<StoredFaq>> {
        let rows = sqlx::query(
            r#"
            SELECT f.faq_id, c.category_name, f.question, f.answer, f.source_url, f.related_fuel_type
            FROM faq_tbl f
            JOIN faq_category_tbl c ON c.category_code = f.category_code
            WHERE (? IS NULL OR c.category_name = ?)
            ORDER BY f.faq_id ASC
            "#,
        )
        .bind(category_name)
        .bind(category_name)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StoredFaq {
                    faq_id: row.try_get("faq_id")?,
                    category_name: row.try_get("category_name")?,
                    question: row.try_get("question")?,
                    answer: row.try_get("answer")?,
                    source_url: row.try_get("source_url")?,
                    related_fuel_type: row.try_get("related_fuel_type")?,
                })
            })
            .collect()
    }

    pub async fn list_faq_categories(&self) -> Result<Vec<FaqCategoryRow>> {
        let rows = sqlx::query("SELECT category_code, category_name FROM faq_category_tbl ORDER BY category_code")
            .fetch_all(&*self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(FaqCategoryRow {
                    category_code: row.try_get("category_code")?,
                    category_name: row.try_get("category_name")?,
                })
            })
            .collect()
    }
}

fn vehicle_from_row(row: &SqliteRow) -> Result<StoredVehicle> {
    let fuel: String = row.try_get("fuel_type")?;
    Ok(StoredVehicle {
        car_id: row.try_get("car_id")?,
        spec: SpecRecord {
            fuel_type: FuelKind::parse(&fuel),
            name: row.try_get("name")?,
            maker: row.try_get("maker")?,
            size: row.try_get("size")?,
            capacity: row.try_get("capacity")?,
            h_power: row.try_get("h_power")?,
            max_fuel: row.try_get("max_fuel")?,
            cx_efc: row.try_get("cx_efc")?,
            ct_efc: row.try_get("ct_efc")?,
            hw_efc: row.try_get("hw_efc")?,
            max_dist: row.try_get("max_dist")?,
            price: row.try_get("price")?,
            maintenance_cost: row.try_get("maintenance_cost")?,
            image: row.try_get("image")?,
        },
    })
}

#[async_trait]
impl RecordSink for PipelineRepository {
    async fn upsert_fuel_costs(&self, rows: &[FuelCostRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO fuel_tbl (fuel_type, fuel_cost) VALUES (?, ?)
                ON CONFLICT(fuel_type) DO UPDATE SET fuel_cost = excluded.fuel_cost
                "#,
            )
            .bind(row.fuel_type.as_str())
            .bind(row.average_cost)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert fuel cost {}", row.fuel_type))?;
        }
        tx.commit().await?;

        info!("✅ fuel_tbl: {} rows upserted", rows.len());
        Ok(rows.len())
    }

    async fn upsert_charger_counts(&self, rows: &[RegionChargerRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO region_tbl (region, charger_cnt) VALUES (?, ?)
                ON CONFLICT(region) DO UPDATE SET charger_cnt = excluded.charger_cnt
                "#,
            )
            .bind(truncate_chars(&row.region, defaults::REGION_NAME_LIMIT))
            .bind(row.charger_count)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert charger count for {}", row.region))?;
        }
        tx.commit().await?;

        info!("✅ region_tbl: {} rows upserted", rows.len());
        Ok(rows.len())
    }

    async fn insert_vehicle_specs(&self, rows: &[SpecRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        // FK 부모 행 보장 (가격이 아직 수집되지 않았으면 0)
        let fuels: BTreeSet<&str> = rows.iter().map(|r| r.fuel_type.as_str()).collect();
        for fuel in fuels {
            sqlx::query("INSERT OR IGNORE INTO fuel_tbl (fuel_type, fuel_cost) VALUES (?, 0)")
                .bind(fuel)
                .execute(&mut *tx)
                .await?;
        }

        for spec in rows {
            sqlx::query(
                r#"
                INSERT INTO car_info_tbl
                (fuel_type, name, maker, size, capacity, h_power, max_fuel,
                 cx_efc, ct_efc, hw_efc, max_dist, price, maintenance_cost, image)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(spec.fuel_type.as_str())
            .bind(truncate_chars(&spec.name, defaults::TEXT_COLUMN_LIMIT))
            .bind(&spec.maker)
            .bind(&spec.size)
            .bind(spec.capacity)
            .bind(spec.h_power)
            .bind(spec.max_fuel)
            .bind(spec.cx_efc)
            .bind(spec.ct_efc)
            .bind(spec.hw_efc)
            .bind(spec.max_dist)
            .bind(spec.price)
            .bind(spec.maintenance_cost)
            .bind(spec.image.as_deref().map(|i| truncate_chars(i, defaults::TEXT_COLUMN_LIMIT)))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert spec '{}'", spec.name))?;
        }
        tx.commit().await?;

        info!("✅ car_info_tbl: {} rows inserted", rows.len());
        Ok(rows.len())
    }

    async fn insert_registration_counts(&self, rows: &[RegistrationCountRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let fuels: BTreeSet<&str> = rows.iter().map(|r| r.fuel_type.as_str()).collect();
        for fuel in fuels {
            sqlx::query("INSERT OR IGNORE INTO fuel_tbl (fuel_type, fuel_cost) VALUES (?, 0)")
                .bind(fuel)
                .execute(&mut *tx)
                .await?;
        }
        // 권역(충청, 전라, 경상 등)은 FK 부모로만 들어간다. charger_cnt 0은 "미수집"이며
        // 충전기 통계를 수집하면 upsert로 덮어쓴다.
        let regions: BTreeSet<&str> = rows.iter().map(|r| r.region.as_str()).collect();
        for region in regions {
            sqlx::query("INSERT OR IGNORE INTO region_tbl (region, charger_cnt) VALUES (?, 0)")
                .bind(region)
                .execute(&mut *tx)
                .await?;
        }

        for row in rows {
            sqlx::query("INSERT INTO cnt_tbl (date, fuel_type, region, cnt) VALUES (?, ?, ?, ?)")
                .bind(i64::from(row.date))
                .bind(row.fuel_type.as_str())
                .bind(row.region.as_str())
                .bind(i64::try_from(row.count).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!("✅ cnt_tbl: {} rows inserted", rows.len());
        Ok(rows.len())
    }

    async fn insert_faqs(&self, rows: &[CanonicalFaq]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut category_codes: HashMap<&'static str, i64> = HashMap::new();
        let mut inserted = 0;

        for faq in rows {
            if faq.question.trim().is_empty() || faq.answer.trim().is_empty() || faq.source_url.trim().is_empty() {
                warn!("Skipping FAQ with empty field: {:?}", truncate_chars(&faq.question, 40));
                continue;
            }

            let category_name = faq.category.db_name();
            let code = match category_codes.get(category_name) {
                Some(code) => *code,
                None => {
                    let name = truncate_chars(category_name, defaults::CATEGORY_NAME_LIMIT);
                    sqlx::query("INSERT OR IGNORE INTO faq_category_tbl (category_name) VALUES (?)")
                        .bind(&name)
                        .execute(&mut *tx)
                        .await?;
                    let code: i64 = sqlx::query_scalar("SELECT category_code FROM faq_category_tbl WHERE category_name = ?")
                        .bind(&name)
                        .fetch_one(&mut *tx)
                        .await
                        .with_context(|| format!("Category '{}' missing after insert", name))?;
                    category_codes.insert(category_name, code);
                    code
                }
            };

            sqlx::query(
                r#"
                INSERT INTO faq_tbl (category_code, question, answer, source_url, related_fuel_type)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(code)
            .bind(truncate_chars(&faq.question, defaults::TEXT_COLUMN_LIMIT))
            .bind(truncate_chars(&faq.answer, defaults::TEXT_COLUMN_LIMIT))
            .bind(truncate_chars(&faq.source_url, defaults::TEXT_COLUMN_LIMIT))
            .bind(faq.fuel_type.related_fuel_type())
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }
        tx.commit().await?;

        info!("✅ faq_tbl: {} rows inserted ({} skipped)", inserted, rows.len() - inserted);
        Ok(inserted)
    }
}
