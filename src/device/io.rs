use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::buffer::{UserSink, UserSource};
use super::error::DeviceError;
use super::Device;

impl Device {
    /// Reads into `dst` starting at `offset`.
    ///
    /// Returns the number of bytes copied, which stops at the end of data and
    /// at the end of the quantum holding `offset`. Reading at or past the end
    /// of data, or inside a hole, returns 0.
    pub async fn read_at<B: UserSink + ?Sized>(
        &self,
        offset: u64,
        dst: &mut B,
        cancel: &CancellationToken,
    ) -> Result<usize, DeviceError> {
        let store = self.lock(cancel).await?;

        let size = store.size();
        if offset > size {
            return Ok(0);
        }
        let count = (dst.byte_len() as u64).min(size - offset) as usize;
        if count == 0 {
            return Ok(0);
        }

        let (location, quantum) = store.quantum_at(offset);
        let Some(quantum) = quantum else {
            // Holes are never filled on read.
            return Ok(0);
        };

        let count = count.min(quantum.len() - location.offset);
        quantum.copy_out(location.offset, count, |at, chunk| dst.copy_from(at, chunk))?;
        Ok(count)
    }

    /// Writes from `src` starting at `offset`, growing the chain as needed.
    ///
    /// Returns the number of bytes copied, which stops at the end of the
    /// quantum holding `offset`. The end of data advances past the written
    /// range. If `src` faults, nothing already copied is undone but the end of
    /// data stays where it was.
    pub async fn write_at<B: UserSource + ?Sized>(
        &self,
        offset: u64,
        src: &B,
        cancel: &CancellationToken,
    ) -> Result<usize, DeviceError> {
        let len = src.byte_len();
        offset.checked_add(len as u64).ok_or_else(|| {
            DeviceError::InvalidArgument(format!("write of {len} bytes at {offset} overflows"))
        })?;

        let mut store = self.lock(cancel).await?;
        if len == 0 {
            return Ok(0);
        }

        let (location, quantum) = store.block_for_write(offset).map_err(|err| {
            tracing::warn!("Write to {} at {} failed: {}", self.name(), offset, err);
            DeviceError::from(err)
        })?;

        let count = len.min(quantum.len() - location.offset);
        quantum.copy_in(location.offset, count, |at, chunk| src.copy_to(at, chunk))?;

        store.extend_to(offset + count as u64);
        Ok(count)
    }

    /// Reads up to `len` bytes at `offset`, looping over quantum boundaries.
    ///
    /// Stops early at the end of data or at the first hole.
    pub async fn read_bytes(
        &self,
        offset: u64,
        len: usize,
        cancel: &CancellationToken,
    ) -> Result<Bytes, DeviceError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..], cancel)
                .await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    /// Writes all of `src` at `offset`, looping over quantum boundaries.
    pub async fn write_all_at(
        &self,
        offset: u64,
        src: &[u8],
        cancel: &CancellationToken,
    ) -> Result<usize, DeviceError> {
        let mut written = 0;
        while written < src.len() {
            written += self
                .write_at(offset + written as u64, &src[written..], cancel)
                .await?;
        }
        Ok(written)
    }
}
