//! Delete routing-store rows not re-confirmed by the current harvest,
//! gated on the `truncate_hours` CLI flag. Grounded on the harvester app's
//! `truncate=<timestamp>` sweep.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::error::HarvestError;

pub async fn truncate(pool: &PgPool, older_than: DateTime<Utc>) -> Result<(), HarvestError> {
    let routings = sqlx::query("DELETE FROM routings WHERE lastseen < $1")
        .bind(older_than)
        .execute(pool)
        .await?;
    let channel_epochs = sqlx::query("DELETE FROM channel_epochs WHERE lastseen < $1")
        .bind(older_than)
        .execute(pool)
        .await?;
    let virtual_channel_epochs = sqlx::query("DELETE FROM virtual_channel_epochs WHERE lastseen < $1")
        .bind(older_than)
        .execute(pool)
        .await?;

    info!(
        routings = routings.rows_affected(),
        channel_epochs = channel_epochs.rows_affected(),
        virtual_channel_epochs = virtual_channel_epochs.rows_affected(),
        "truncated stale routing-store rows"
    );
    Ok(())
}
