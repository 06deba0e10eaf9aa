pub mod error;
pub mod scalar;

pub use error::{Result, WindowError};
