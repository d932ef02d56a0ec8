use bcs_ingest_worker::config::AppConfig;
use bcs_ingest_worker::logger::init_tracing;
use bcs_ingest_worker::supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production, &config.log_level);

    tracing::info!("starting BCS ingestion worker");

    if let Err(e) = supervisor::run(config).await {
        tracing::error!(error = ?e, "supervisor exited with error");
        return Err(e);
    }

    tracing::info!("supervisor exited cleanly");
    Ok(())
}
