use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("malformed SNCL line: {0}")]
    MalformedLine(String),

    #[error("invalid FDSN timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid epoch: starttime must be before endtime")]
    InvalidEpoch,
}
