pub mod routes;
pub mod truncate;
pub mod vnetworks;

pub use routes::harvest_route;
pub use truncate::truncate;
pub use vnetworks::harvest_vnetwork;
