pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod pidlock;
pub mod routing_xml;
pub mod stationxml;

use sqlx::PgPool;
use tracing::{info, warn};

use config::Config;
use error::HarvestError;

/// Harvest every configured routing-configuration document, then (unless
/// disabled) run the virtual-network pass and the stale-row truncation
/// sweep. Mirrors `StationLiteHarvestApp.run`'s control flow: acquire the
/// PID lock, fetch + parse each document, emerge routes, emerge vnetworks,
/// truncate, release.
pub async fn run(pool: &PgPool, client: &reqwest::Client, config: &Config) -> Result<(), HarvestError> {
    let _lock = pidlock::PidLock::acquire(&config.pid_file)?;

    for url in &config.routing_configs {
        info!(url, "fetching routing configuration");
        let document = fetch::fetch_document(client, url).await?;
        let parsed = routing_xml::parse_routing_config(&document)?;

        if !config.no_routes {
            for route in &parsed.routes {
                if let Err(err) = harvest::harvest_route(pool, client, route, config.force_restricted).await {
                    warn!(stream = %route.stream, error = %err, "failed to harvest route");
                }
            }
        }

        if !config.no_vnetworks {
            for vnetwork in &parsed.vnetworks {
                if let Err(err) = harvest::harvest_vnetwork(pool, vnetwork).await {
                    warn!(code = %vnetwork.code, error = %err, "failed to harvest virtual network");
                }
            }
        }
    }

    if let Some(hours) = config.truncate_hours {
        let older_than = chrono::Utc::now() - chrono::Duration::hours(hours);
        harvest::truncate(pool, older_than).await?;
    }

    Ok(())
}
