use sqlx::PgPool;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eida_test_support::lazy_pg_pool;

    #[test]
    fn state_wraps_pool() {
        let state = AppState::new(lazy_pg_pool());
        assert!(state.pool.size() <= 1);
    }
}
