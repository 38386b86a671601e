//! Intermediate JSON artifacts
//!
//! Extraction output is written here so the transform commands can rerun
//! without touching a browser.

use crate::domain::faq::{CanonicalFaq, FaqCategory, FaqDocument};
use crate::domain::registration::{RegistrationCountRecord, TrendPoint};
use crate::domain::vehicle::VehicleCatalog;
use crate::infrastructure::config::{StorageConfig, defaults};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

const FAQ_DIR: &str = "faq";
const FAQ_ALL_FILE: &str = "all_faqs.json";
const VEHICLE_DIR: &str = "car_info";
const VEHICLE_FILE: &str = "vehicles.json";
const REGISTRATION_FILE: &str = "registered_cars.json";
const TREND_FILE: &str = "registration_trend.json";

/// Per-category FAQ file
#[derive(Debug, Serialize)]
struct CategoryFile<'a> {
    category: &'a str,
    count: usize,
    faqs: Vec<&'a CanonicalFaq>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.raw_dir, &storage.processed_dir)
    }

    pub fn faq_path(&self) -> PathBuf {
        self.raw_dir.join(FAQ_DIR).join(FAQ_ALL_FILE)
    }

    pub fn vehicle_path(&self) -> PathBuf {
        self.raw_dir.join(VEHICLE_DIR).join(VEHICLE_FILE)
    }

    pub fn registration_path(&self) -> PathBuf {
        self.processed_dir.join(REGISTRATION_FILE)
    }

    pub fn trend_path(&self) -> PathBuf {
        self.processed_dir.join(TREND_FILE)
    }

    /// Where the statistics portal drops its spreadsheets
    pub fn registration_download_dir(&self) -> PathBuf {
        self.raw_dir.join(defaults::REGISTRATION_DIR)
    }

    /// Write `all_faqs.json` plus one file per non-empty category
    pub async fn save_faq_document(&self, document: &FaqDocument) -> Result<PathBuf> {
        let path = self.faq_path();
        write_json(&path, document).await?;

        for category in FaqCategory::ALL {
            let faqs = document.by_category(category);
            if faqs.is_empty() {
                continue;
            }
            let file = CategoryFile {
                category: category.as_str(),
                count: faqs.len(),
                faqs,
            };
            let category_path = self.raw_dir.join(FAQ_DIR).join(format!("{}_faqs.json", category.as_str()));
            write_json(&category_path, &file).await?;
        }

        info!("📁 Saved {} FAQs to {:?}", document.metadata.total_count, path);
        Ok(path)
    }

    pub async fn load_faq_document(&self) -> Result<FaqDocument> {
        read_json(&self.faq_path()).await
    }

    pub async fn save_vehicle_catalog(&self, catalog: &VehicleCatalog) -> Result<PathBuf> {
        let path = self.vehicle_path();
        write_json(&path, catalog).await?;
        info!("📁 Saved {} vehicle models to {:?}", catalog.len(), path);
        Ok(path)
    }

    pub async fn load_vehicle_catalog(&self) -> Result<VehicleCatalog> {
        read_json(&self.vehicle_path()).await
    }

    pub async fn save_registration_counts(&self, rows: &[RegistrationCountRecord]) -> Result<PathBuf> {
        let path = self.registration_path();
        write_json(&path, &rows).await?;
        info!("📁 Saved {} registration rows to {:?}", rows.len(), path);
        Ok(path)
    }

    pub async fn load_registration_counts(&self) -> Result<Vec<RegistrationCountRecord>> {
        read_json(&self.registration_path()).await
    }

    pub async fn save_trend(&self, points: &[TrendPoint]) -> Result<PathBuf> {
        let path = self.trend_path();
        write_json(&path, &points).await?;
        Ok(path)
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Artifact not found: {} (run the extraction command first)", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed artifact: {}", path.display()))
}
