use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("no storage backs mapped offset {offset}")]
    Unbacked { offset: usize },

    #[error("mapped offset {offset} is outside the mapping")]
    OutOfRange { offset: usize },
}
