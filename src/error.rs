use thiserror::Error;

/// Errors returned by the index engines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested key is not present.
    #[error("key not found")]
    NotFound,
    /// A configuration value is out of its accepted range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
