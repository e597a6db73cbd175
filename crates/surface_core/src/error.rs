use shared::domain::{GroupValidationError, PresentationId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("presentation {0} not found")]
    PresentationNotFound(PresentationId),
    #[error("invalid rotation group: {0}")]
    InvalidGroup(#[from] GroupValidationError),
    #[error("content store failure: {0}")]
    Content(#[source] anyhow::Error),
    #[error("register failure: {0}")]
    Register(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("slide index {index} is out of range for {len} slides")]
    OutOfRange { index: usize, len: usize },
    #[error("presentation has no slides")]
    EmptyPresentation,
    #[error("failed to publish slide change: {0}")]
    Register(#[source] anyhow::Error),
}
