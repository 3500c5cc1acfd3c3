// eida-model: stream/epoch domain types shared by the router, harvester and
// gateway services.
//
// Network/station/location/channel codes, FDSNWS wildcards, epoch interval
// arithmetic and the wire line formats used by the routing and federator
// HTTP surfaces all live here so every service shares one definition.

pub mod epoch;
pub mod error;
pub mod route;
pub mod stream;
pub mod stream_epoch;
pub mod stream_epochs;
pub mod stream_epochs_handler;
pub mod time;
pub mod wildcard;

pub use epoch::Epochs;
pub use error::ModelError;
pub use route::Route;
pub use stream::Stream;
pub use stream_epoch::StreamEpoch;
pub use stream_epochs::StreamEpochs;
pub use stream_epochs_handler::StreamEpochsHandler;
pub use time::Instant;
