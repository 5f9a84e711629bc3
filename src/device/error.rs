use thiserror::Error;

use super::buffer::BufferFault;
use crate::storage::StorageError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("interrupted while waiting for the device lock")]
    Interrupted,

    #[error("device busy: {mappings} active mappings")]
    Busy { mappings: usize },

    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("caller buffer faulted")]
    FaultyBuffer,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<StorageError> for DeviceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OutOfMemory { requested } => DeviceError::OutOfMemory { requested },
        }
    }
}

impl From<BufferFault> for DeviceError {
    fn from(_: BufferFault) -> Self {
        DeviceError::FaultyBuffer
    }
}
