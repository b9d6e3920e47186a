use std::sync::PoisonError;

use datafusion::arrow::error::ArrowError;
use datafusion::common::DataFusionError;
use thiserror::Error;
use tip_common::error::CommonError;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("error in DataFusion: {0}")]
    DataFusionError(#[from] DataFusionError),
    #[error(transparent)]
    CommonError(#[from] CommonError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("session closed")]
    SessionClosed,
}

impl SessionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SessionError::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SessionError::InternalError(message.into())
    }
}

impl From<ArrowError> for SessionError {
    fn from(error: ArrowError) -> Self {
        SessionError::DataFusionError(DataFusionError::from(error))
    }
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(error: PoisonError<T>) -> Self {
        SessionError::InternalError(error.to_string())
    }
}
