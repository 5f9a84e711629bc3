//! Caller-supplied buffers.
//!
//! Positioned I/O copies between quanta and memory the caller hands in.
//! These traits make that copy fallible the way a copy across a protection
//! boundary is: a buffer may refuse part of the range, and the transfer stops
//! there with [`DeviceError::FaultyBuffer`](super::DeviceError::FaultyBuffer).

use bytes::{Bytes, BytesMut};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("buffer fault at byte {at}")]
pub struct BufferFault {
    pub at: usize,
}

/// A buffer bytes are written from.
pub trait UserSource {
    fn byte_len(&self) -> usize;

    /// Fills `dst` from the buffer starting at byte `at`.
    fn copy_to(&self, at: usize, dst: &mut [u8]) -> Result<(), BufferFault>;
}

/// A buffer bytes are read into.
pub trait UserSink {
    fn byte_len(&self) -> usize;

    /// Stores `src` into the buffer starting at byte `at`.
    fn copy_from(&mut self, at: usize, src: &[u8]) -> Result<(), BufferFault>;
}

impl UserSource for [u8] {
    fn byte_len(&self) -> usize {
        self.len()
    }

    fn copy_to(&self, at: usize, dst: &mut [u8]) -> Result<(), BufferFault> {
        let src = at
            .checked_add(dst.len())
            .and_then(|end| self.get(at..end))
            .ok_or(BufferFault { at })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserSink for [u8] {
    fn byte_len(&self) -> usize {
        self.len()
    }

    fn copy_from(&mut self, at: usize, src: &[u8]) -> Result<(), BufferFault> {
        let dst = at
            .checked_add(src.len())
            .and_then(|end| self.get_mut(at..end))
            .ok_or(BufferFault { at })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

macro_rules! forward_source {
    ($($ty:ty),*) => {$(
        impl UserSource for $ty {
            fn byte_len(&self) -> usize {
                self.len()
            }

            fn copy_to(&self, at: usize, dst: &mut [u8]) -> Result<(), BufferFault> {
                self[..].copy_to(at, dst)
            }
        }
    )*};
}

macro_rules! forward_sink {
    ($($ty:ty),*) => {$(
        impl UserSink for $ty {
            fn byte_len(&self) -> usize {
                self.len()
            }

            fn copy_from(&mut self, at: usize, src: &[u8]) -> Result<(), BufferFault> {
                self[..].copy_from(at, src)
            }
        }
    )*};
}

forward_source!(Vec<u8>, Bytes, BytesMut);
forward_sink!(Vec<u8>, BytesMut);
