use clap::Parser;
use playback_engine::core::show_result_with_table::show_result_with_table;
use playback_engine::models::args::Args;
use playback_engine::ReplayConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ReplayConfig::try_from(args)?;
    let result = playback_engine::run(config).await?;
    show_result_with_table(&result);
    Ok(())
}
