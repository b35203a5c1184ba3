use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Failed to read station cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write station cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode station cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode station cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Station list download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to parse station list JSON")]
    JsonParse(#[from] serde_json::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Reference table holds more than one station with code '{code}'")]
    AmbiguousLocation { code: String },

    #[error("No station matches '{query}'")]
    NoStationFound { query: String },
}
