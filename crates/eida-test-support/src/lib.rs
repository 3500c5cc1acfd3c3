//! Shared fixtures for router/harvester/gateway tests: a lazy Postgres pool
//! builder for state-only unit tests, sample routing/stream-epoch data, and a
//! mock upstream HTTP endpoint for gateway worker tests.

pub mod fixtures;
pub mod mock_upstream;
pub mod pool;

pub use fixtures::*;
pub use mock_upstream::MockUpstream;
pub use pool::lazy_pg_pool;
