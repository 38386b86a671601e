// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Tables in drop order (children first)
const TABLES: [&str; 6] = ["faq_tbl", "faq_category_tbl", "cnt_tbl", "car_info_tbl", "region_tbl", "fuel_tbl"];

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        let in_memory = db_path.starts_with(":memory:");
        if !in_memory {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        // 메모리 DB는 연결마다 별도 DB가 되므로 연결 하나로 고정
        let max_connections = if in_memory { 1 } else { 10 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_fuel_sql = r#"
            CREATE TABLE IF NOT EXISTS fuel_tbl (
                fuel_type VARCHAR(20) PRIMARY KEY,
                fuel_cost REAL NOT NULL DEFAULT 0
            )
        "#;

        let create_region_sql = r#"
            CREATE TABLE IF NOT EXISTS region_tbl (
                region VARCHAR(20) PRIMARY KEY,
                charger_cnt INTEGER NOT NULL DEFAULT 0
            )
        "#;

        let create_cnt_sql = r#"
            CREATE TABLE IF NOT EXISTS cnt_tbl (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date INTEGER NOT NULL,
                fuel_type VARCHAR(20) NOT NULL,
                region VARCHAR(20) NOT NULL,
                cnt INTEGER NOT NULL,
                FOREIGN KEY (fuel_type) REFERENCES fuel_tbl (fuel_type),
                FOREIGN KEY (region) REFERENCES region_tbl (region)
            )
        "#;

        let create_car_info_sql = r#"
            CREATE TABLE IF NOT EXISTS car_info_tbl (
                car_id INTEGER PRIMARY KEY AUTOINCREMENT,
                fuel_type VARCHAR(20) NOT NULL,
                name VARCHAR(255) NOT NULL,
                maker VARCHAR(50) NOT NULL,
                size VARCHAR(20) NOT NULL,
                capacity REAL NOT NULL DEFAULT 0,
                h_power INTEGER NOT NULL DEFAULT 0,
                max_fuel REAL NOT NULL DEFAULT 0,
                cx_efc REAL,
                ct_efc REAL,
                hw_efc REAL,
                max_dist INTEGER NOT NULL DEFAULT 0,
                price INTEGER NOT NULL DEFAULT 0,
                maintenance_cost INTEGER,
                image VARCHAR(255),
                FOREIGN KEY (fuel_type) REFERENCES fuel_tbl (fuel_type)
            )
        "#;

        let create_faq_category_sql = r#"
            CREATE TABLE IF NOT EXISTS faq_category_tbl (
                category_code INTEGER PRIMARY KEY AUTOINCREMENT,
                category_name VARCHAR(10) NOT NULL UNIQUE
            )
        "#;

        let create_faq_sql = r#"
            CREATE TABLE IF NOT EXISTS faq_tbl (
                faq_id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_code INTEGER NOT NULL,
                question VARCHAR(255) NOT NULL,
                answer VARCHAR(255) NOT NULL,
                source_url VARCHAR(255) NOT NULL,
                related_fuel_type VARCHAR(20),
                FOREIGN KEY (category_code) REFERENCES faq_category_tbl (category_code)
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_cnt_date ON cnt_tbl (date);
            CREATE INDEX IF NOT EXISTS idx_car_info_fuel ON car_info_tbl (fuel_type);
            CREATE INDEX IF NOT EXISTS idx_faq_category ON faq_tbl (category_code);
        "#;

        for sql in [
            create_fuel_sql,
            create_region_sql,
            create_cnt_sql,
            create_car_info_sql,
            create_faq_category_sql,
            create_faq_sql,
        ] {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        sqlx::raw_sql(create_indexes_sql).execute(&self.pool).await?;

        info!("✅ Database schema ready");
        Ok(())
    }

    /// Drop every pipeline table, children first
    pub async fn reset(&self) -> Result<()> {
        for table in TABLES {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to drop {table}"))?;
        }
        info!("🔄 Dropped {} tables", TABLES.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn table_names(db: &DatabaseConnection) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name LIKE '%_tbl' ORDER BY name")
                .fetch_all(db.pool())
                .await?;
        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    #[tokio::test]
    async fn test_database_connection_creates_directories() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_migrate_then_reset() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("schema.db").display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;
        // 두 번 실행해도 안전해야 한다
        db.migrate().await?;
        assert_eq!(table_names(&db).await?.len(), 6);

        db.reset().await?;
        assert!(table_names(&db).await?.is_empty());
        Ok(())
    }
}
