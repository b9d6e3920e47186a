use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A value in the data itself cannot be handled, e.g. an unseen category
    /// or a number outside the bucket boundaries.
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] Box<figment::Error>),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl CommonError {
    pub fn missing(message: impl Into<String>) -> Self {
        CommonError::MissingArgument(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CommonError::InvalidArgument(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        CommonError::InvalidData(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CommonError::InternalError(message.into())
    }
}

impl From<figment::Error> for CommonError {
    fn from(error: figment::Error) -> Self {
        CommonError::ConfigError(Box::new(error))
    }
}
