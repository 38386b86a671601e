//! truck-pipeline command line entry point
//!
//! One subcommand per pipeline stage. Scraping commands own a single browser
//! session that is closed on every exit path.

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};
use truck_data_pipeline::application::aggregation::trend_from_records;
use truck_data_pipeline::application::faq_pipeline::load_faqs;
use truck_data_pipeline::application::registration_pipeline::{download_registration_files, transform_registration};
use truck_data_pipeline::application::vehicle_pipeline::load_vehicles;
use truck_data_pipeline::application::{FaqPipeline, MarketPipeline, VehiclePipeline};
use truck_data_pipeline::domain::vehicle::VehicleFilter;
use truck_data_pipeline::infrastructure::logging::log_system_info;
use truck_data_pipeline::infrastructure::{
    AppConfig, ArtifactStore, BrowserSession, ChromiumSession, ConfigManager, DatabaseConnection, PipelineRepository,
    init_logging_with_config,
};

#[derive(Debug, Parser)]
#[command(name = "truck-pipeline", version, about = "Light-truck market data pipeline")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `database.url`, e.g. sqlite:data/truck.db
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape every configured FAQ site into all_faqs.json
    Faq,
    /// Load all_faqs.json into faq_tbl
    TransformFaq,
    /// Crawl danawa model pages into vehicles.json
    Vehicles,
    /// Normalize vehicles.json into car_info_tbl
    TransformVehicles,
    /// Average fuel prices into fuel_tbl
    Fuel,
    /// Regional charger counts into region_tbl
    Chargers,
    /// Download the monthly registration spreadsheets
    RegistrationDownload,
    /// Spreadsheets into cnt_tbl and the yearly trend
    TransformRegistration,
    /// Create the tables
    InitDb {
        /// Drop every table first
        #[arg(long)]
        reset: bool,
    },
    /// Every stage in order
    All,
    /// Print stored rows as JSON
    Show {
        #[arg(value_enum)]
        target: ShowTarget,
        #[arg(long)]
        fuel_type: Option<String>,
        #[arg(long)]
        maker: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShowTarget {
    Vehicles,
    Fuel,
    Chargers,
    Faqs,
    Trend,
}

impl Command {
    fn needs_browser(&self) -> bool {
        matches!(
            self,
            Self::Faq | Self::Vehicles | Self::Fuel | Self::Chargers | Self::RegistrationDownload | Self::All
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_layered().await?;
    if let Some(url) = &cli.db {
        config.database.url.clone_from(url);
    }

    init_logging_with_config(&config.logging, None)?;
    log_system_info();

    if let Err(e) = run(&cli.command, &config).await {
        error!("❌ {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn repository(config: &AppConfig) -> Result<PipelineRepository> {
    let db = DatabaseConnection::new(&config.database.url).await?;
    db.migrate().await?;
    Ok(PipelineRepository::new(db.pool().clone()))
}

async fn run(command: &Command, config: &AppConfig) -> Result<()> {
    let store = ArtifactStore::from_config(&config.storage);
    if !command.needs_browser() {
        return run_offline(command, config, &store).await;
    }

    let mut session = ChromiumSession::launch(&config.browser)
        .await
        .context("Failed to start the browser session")?;
    let result = run_with_browser(command, config, &store, &mut session).await;
    if let Err(e) = session.close().await {
        warn!("⚠️ Browser shutdown failed: {:#}", e);
    }
    result
}

async fn run_with_browser(
    command: &Command,
    config: &AppConfig,
    store: &ArtifactStore,
    session: &mut dyn BrowserSession,
) -> Result<()> {
    match command {
        Command::Faq => {
            FaqPipeline::new(config).run(session, store).await?;
        }
        Command::Vehicles => {
            VehiclePipeline::new(config)?.run(session, store).await?;
        }
        Command::Fuel => {
            let repo = repository(config).await?;
            MarketPipeline::new(config).run_fuel(session, &repo).await?;
        }
        Command::Chargers => {
            let repo = repository(config).await?;
            MarketPipeline::new(config).run_chargers(session, &repo).await?;
        }
        Command::RegistrationDownload => {
            download_registration_files(session, &config.sources, &store.registration_download_dir()).await?;
        }
        Command::All => {
            let repo = repository(config).await?;
            let market = MarketPipeline::new(config);
            market.run_fuel(session, &repo).await?;
            market.run_chargers(session, &repo).await?;

            FaqPipeline::new(config).run(session, store).await?;
            load_faqs(store, &repo).await?;

            VehiclePipeline::new(config)?.run(session, store).await?;
            load_vehicles(store, &repo, &config.vehicles.models).await?;

            download_registration_files(session, &config.sources, &store.registration_download_dir()).await?;
            transform_registration(store, &repo).await?;
            info!("✅ All stages finished");
        }
        other => return run_offline(other, config, store).await,
    }
    Ok(())
}

async fn run_offline(command: &Command, config: &AppConfig, store: &ArtifactStore) -> Result<()> {
    match command {
        Command::TransformFaq => {
            let stored = load_faqs(store, &repository(config).await?).await?;
            info!("✅ {} FAQs stored", stored);
        }
        Command::TransformVehicles => {
            let stored = load_vehicles(store, &repository(config).await?, &config.vehicles.models).await?;
            info!("✅ {} vehicle specs stored", stored);
        }
        Command::TransformRegistration => {
            transform_registration(store, &repository(config).await?).await?;
        }
        Command::InitDb { reset } => {
            let db = DatabaseConnection::new(&config.database.url).await?;
            if *reset {
                db.reset().await?;
            }
            db.migrate().await?;
            info!("✅ Database ready at {}", config.database.url);
        }
        Command::Show {
            target,
            fuel_type,
            maker,
            category,
        } => {
            let repo = repository(config).await?;
            match target {
                ShowTarget::Vehicles => {
                    let filter = VehicleFilter {
                        fuel_type: fuel_type.clone(),
                        maker: maker.clone(),
                    };
                    print_json(&repo.list_vehicles(&filter).await?)?;
                }
                ShowTarget::Fuel => print_json(&repo.list_fuel_costs(fuel_type.as_deref()).await?)?,
                ShowTarget::Chargers => print_json(&repo.list_charger_counts(None).await?)?,
                ShowTarget::Faqs => print_json(&repo.list_faqs(category.as_deref()).await?)?,
                ShowTarget::Trend => print_json(&trend_from_records(&repo.list_registration_counts().await?))?,
            }
        }
        other => anyhow::bail!("{:?} needs a browser session", other),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
