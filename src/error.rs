use crate::feeds::error::FeedError;
use crate::stations::error::StationError;
use crate::types::region::UnknownRegionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BomError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    UnknownRegion(#[from] UnknownRegionError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("Failed to concatenate feed tables")]
    FrameConcat(#[source] polars::error::PolarsError),
}
