use harvester::config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "harvester starting");

    let config = Config::parse();
    let pool = harvester::db::create_pool(&config.database_url).await;
    let client = reqwest::Client::new();

    if let Err(err) = harvester::run(&pool, &client, &config).await {
        error!(error = %err, "harvest run failed");
        std::process::exit(1);
    }

    info!("harvest run complete");
}
