use thiserror::Error;

use crate::config::ConfigError;
use crate::device::BufferFault;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("unsupported control command {0:#010x}")]
    NotSupported(u32),

    #[error("control argument faulted")]
    FaultyBuffer,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<ConfigError> for ControlError {
    fn from(err: ConfigError) -> Self {
        ControlError::InvalidArgument(err.to_string())
    }
}

impl From<BufferFault> for ControlError {
    fn from(_: BufferFault) -> Self {
        ControlError::FaultyBuffer
    }
}
