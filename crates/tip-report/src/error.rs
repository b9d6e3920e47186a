use thiserror::Error;
use tip_common::error::CommonError;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    CommonError(#[from] CommonError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ReportError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ReportError::InvalidArgument(message.into())
    }
}
