use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

pub type Result<T, E = WindowError> = std::result::Result<T, E>;

/// Errors raised by the window function engine.
///
/// Out-of-partition and out-of-frame fetches are not errors, they are reported
/// through [`crate::window::Fetched::OutOfRange`]. `OutOfRange` here is only used
/// for positional requests that can never be valid (peer checks outside the
/// current partition).
#[derive(Debug, Error)]
pub enum WindowError {
    /// A user supplied argument violates a precondition (ntile bucket count,
    /// nth_value index, unknown function, wrong arity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine was driven in a way its protocol does not allow, e.g. asking
    /// for the row count while no partition is bound.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("position {position} is out of range for partition of {row_count} rows")]
    OutOfRange { position: i64, row_count: usize },

    #[error("resources exhausted: {0}")]
    ResourcesExhausted(String),

    #[error(transparent)]
    DataFusion(#[from] DataFusionError),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl WindowError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        WindowError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        WindowError::InvalidState(msg.into())
    }
}

impl From<WindowError> for DataFusionError {
    fn from(err: WindowError) -> Self {
        match err {
            WindowError::DataFusion(e) => e,
            WindowError::Arrow(e) => e.into(),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}
