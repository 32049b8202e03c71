//! Parking Monitor - Main Entry Point

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    init_logging(&settings.logging);

    info!("=== Parking Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Regions file {}, uploads in {}",
        settings.storage.regions_file.display(),
        settings.storage.uploads_dir.display()
    );

    run_server(settings).await?;

    Ok(())
}
