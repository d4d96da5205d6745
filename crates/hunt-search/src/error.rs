use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider returned HTTP {0}")]
    Status(reqwest::StatusCode),

    // A queued task panicked; the payload is kept as text.
    #[error("{0}")]
    TaskPanicked(String),

    #[error("Request queue is closed")]
    QueueClosed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Address search failed: {0}")]
    AddressSearch(String),
}

impl SearchError {
    /// Wrap any failure of an address search, keeping the underlying message.
    pub(crate) fn address_search(source: SearchError) -> Self {
        let message = source.to_string();
        if message.trim().is_empty() {
            Self::AddressSearch("Unknown error".to_string())
        } else {
            Self::AddressSearch(message)
        }
    }
}
