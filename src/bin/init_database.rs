//! Create (or recreate) the pipeline tables
//!
//! Run with: cargo run --bin init_database -- [database_url] [--reset]

use anyhow::Result;
use truck_data_pipeline::infrastructure::config::defaults;
use truck_data_pipeline::infrastructure::{DatabaseConnection, PipelineRepository};

fn main() -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(init_database())
}

async fn init_database() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let reset = args.iter().any(|a| a == "--reset");
    let database_url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| defaults::DATABASE_URL.to_string());

    println!("🗄️ Initializing {database_url}");
    let db = DatabaseConnection::new(&database_url).await?;
    if reset {
        println!("🔄 Dropping existing tables");
        db.reset().await?;
    }
    db.migrate().await?;

    let repo = PipelineRepository::new(db.pool().clone());
    let categories = repo.list_faq_categories().await?;
    let fuels = repo.list_fuel_costs(None).await?;
    println!("✅ Tables ready ({} FAQ categories, {} fuel rows)", categories.len(), fuels.len());
    Ok(())
}
