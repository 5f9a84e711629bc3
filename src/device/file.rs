use std::io::SeekFrom;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::buffer::{UserSink, UserSource};
use super::error::DeviceError;
use super::Device;

/// How a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Opening write-only truncates the device to zero first.
    WriteOnly,
    ReadWrite,
}

/// Converts a raw `(whence, offset)` pair into a [`SeekFrom`].
///
/// `whence` is 0 for the start, 1 for the current position and 2 for the
/// end of data.
pub fn parse_seek(whence: i32, offset: i64) -> Result<SeekFrom, DeviceError> {
    match whence {
        0 => u64::try_from(offset)
            .map(SeekFrom::Start)
            .map_err(|_| DeviceError::InvalidArgument(format!("negative seek position {offset}"))),
        1 => Ok(SeekFrom::Current(offset)),
        2 => Ok(SeekFrom::End(offset)),
        other => Err(DeviceError::InvalidArgument(format!(
            "unknown seek origin {other}"
        ))),
    }
}

/// An open handle on a device with its own file position.
///
/// Lock waits made through the handle are interrupted by its cancellation
/// token; see [`OpenFile::interrupt_handle`].
pub struct OpenFile {
    device: Arc<Device>,
    mode: OpenMode,
    pos: u64,
    cancel: CancellationToken,
}

impl Device {
    /// Opens the device.
    pub async fn open(self: &Arc<Self>, mode: OpenMode) -> Result<OpenFile, DeviceError> {
        self.open_with(mode, CancellationToken::new()).await
    }

    /// Opens the device with a caller-provided cancellation token.
    ///
    /// A write-only open trims the device. A trim refused because the device
    /// is mapped is ignored and the open still succeeds.
    pub async fn open_with(
        self: &Arc<Self>,
        mode: OpenMode,
        cancel: CancellationToken,
    ) -> Result<OpenFile, DeviceError> {
        if mode == OpenMode::WriteOnly {
            match self.trim(&cancel).await {
                Ok(()) | Err(DeviceError::Busy { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(OpenFile {
            device: Arc::clone(self),
            mode,
            pos: 0,
            cancel,
        })
    }
}

impl OpenFile {
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// A token that, when cancelled, interrupts this handle's lock waits.
    pub fn interrupt_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Replaces a fired cancellation token with a fresh one.
    pub fn clear_interrupt(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Reads at the file position and advances it by the bytes read.
    pub async fn read<B: UserSink + ?Sized>(&mut self, dst: &mut B) -> Result<usize, DeviceError> {
        let n = self.device.read_at(self.pos, dst, &self.cancel).await?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Writes at the file position and advances it by the bytes written.
    pub async fn write<B: UserSource + ?Sized>(&mut self, src: &B) -> Result<usize, DeviceError> {
        let n = self.device.write_at(self.pos, src, &self.cancel).await?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Moves the file position. Positions past the end of data are allowed;
    /// negative positions and positions above `i64::MAX` are not.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64, DeviceError> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (offset, 0),
            SeekFrom::Current(delta) => (self.pos, delta),
            SeekFrom::End(delta) => (self.device.size(&self.cancel).await?, delta),
        };

        let new_pos = base
            .checked_add_signed(delta)
            .filter(|&pos| i64::try_from(pos).is_ok())
            .ok_or_else(|| {
                DeviceError::InvalidArgument(format!("seek by {delta} from {base} is out of range"))
            })?;
        self.pos = new_pos;
        Ok(new_pos)
    }

    /// [`OpenFile::seek`] with a raw `(whence, offset)` pair.
    pub async fn seek_raw(&mut self, whence: i32, offset: i64) -> Result<u64, DeviceError> {
        let pos = parse_seek(whence, offset)?;
        self.seek(pos).await
    }
}

impl std::fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFile")
            .field("device", &self.device.name())
            .field("mode", &self.mode)
            .field("pos", &self.pos)
            .finish()
    }
}
