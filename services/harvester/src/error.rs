use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to fetch routing configuration document: {0}")]
    Fetch(String),
    #[error("malformed routing configuration: {0}")]
    MalformedConfig(String),
    #[error("malformed StationXML response: {0}")]
    MalformedStationXml(String),
    #[error("PID lock already held at {0}")]
    AlreadyHarvesting(String),
    #[error(transparent)]
    Model(#[from] eida_model::ModelError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
