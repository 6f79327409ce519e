//! Error types for ripple-core
//!
//! Ordinary misuse of the reactive API (adding keys to root data, writing an
//! unchanged value, observing a scalar) is not an error; those cases are
//! silent no-ops. `Error` only covers requests that cannot be expressed on
//! the value they target.

use crate::value::ContainerId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not a container: cannot add or remove keys on a {0} value")]
    NotAContainer(&'static str),

    #[error("Invalid array index: {0}")]
    InvalidArrayIndex(String),

    #[error("Cyclic value: {0} contains itself")]
    CyclicValue(ContainerId),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
