use crate::stream_epoch::StreamEpoch;

/// A dispatchable sub-request: one endpoint URL plus the stream-epochs to
/// fetch from it. Within a single route every stream-epoch shares the
/// target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub url: String,
    pub stream_epochs: Vec<StreamEpoch>,
}

impl Route {
    pub fn new(url: impl Into<String>, stream_epochs: Vec<StreamEpoch>) -> Self {
        Self {
            url: url.into(),
            stream_epochs,
        }
    }

    /// Sort the contained stream-epochs; used before serializing a route
    /// group to the routing wire format.
    pub fn sorted(mut self) -> Self {
        self.stream_epochs.sort();
        self
    }
}
