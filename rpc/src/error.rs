// Wire-shape conversion errors.
use thiserror::Error;

use sompi_core::CoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Invalid hex in field {0}: {1}")]
    InvalidHex(&'static str, String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
