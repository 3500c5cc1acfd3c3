use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the routing store. Migrations are owned by `services/router`;
/// the harvester only ever reads and writes rows against an already
/// migrated schema.
pub async fn create_pool(database_url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .expect("failed to connect to routing store")
}
