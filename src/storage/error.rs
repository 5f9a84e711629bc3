use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("out of memory allocating {requested} bytes")]
    OutOfMemory { requested: usize },
}
