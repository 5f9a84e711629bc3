//! Fault-driven mapping of device storage.
//!
//! A [`Mapping`] binds a window of a device into someone else's address
//! space without copying. Nothing is bound up front: on every access to an
//! unbound page the address-space side calls [`FaultHandler::fault`], which
//! resolves the offset through the device's chain and hands back a
//! [`PageRef`], a counted reference to the quantum backing that page.
//!
//! Faults never allocate. An offset past the end of data, or inside a hole,
//! resolves to `None`, and the accessor reports
//! [`AccessError::Unbacked`] upward.
//!
//! While any mapping of a device is alive the device refuses to trim, so the
//! chain a bound page came from is never torn down under it.
//!
//! # Examples
//!
//! ```
//! use quantadev::{Device, Defaults, Geometry, MappedView, QuantumAllocator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let defaults = Defaults::new(Geometry::new(0, 8))?;
//! let device = Device::new(0, "dev0", defaults, QuantumAllocator::unlimited());
//! device.write_all_at(0, b"mapped", &CancellationToken::new()).await?;
//!
//! let mut view = MappedView::map(&device, 4096);
//! let mut buf = [0u8; 6];
//! view.load(0, &mut buf).await?;
//! assert_eq!(&buf, b"mapped");
//! # Ok(())
//! # }
//! ```

mod error;
mod view;

pub use error::AccessError;
pub use view::MappedView;

use std::sync::Arc;

use async_trait::async_trait;

use crate::constants::PAGE_SIZE;
use crate::device::Device;
use crate::storage::Quantum;

/// A counted reference to one page of a quantum.
///
/// Holding a `PageRef` keeps the quantum's memory alive; it never grants
/// ownership of the chain slot the quantum sits in.
#[derive(Clone)]
pub struct PageRef {
    quantum: Arc<Quantum>,
    page: usize,
}

impl PageRef {
    /// Page index within the quantum.
    pub fn page_index(&self) -> usize {
        self.page
    }

    pub fn quantum(&self) -> &Arc<Quantum> {
        &self.quantum
    }

    /// References currently held on the quantum, the chain's own included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.quantum)
    }

    /// Copies out of the page starting at `offset`, clamped to the page end.
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        let len = dst.len().min(PAGE_SIZE.saturating_sub(offset));
        self.quantum
            .read_at(self.page * PAGE_SIZE + offset, &mut dst[..len])
    }

    /// Copies into the page starting at `offset`, clamped to the page end.
    pub fn write(&self, offset: usize, src: &[u8]) -> usize {
        let len = src.len().min(PAGE_SIZE.saturating_sub(offset));
        self.quantum.write_at(self.page * PAGE_SIZE + offset, &src[..len])
    }
}

impl std::fmt::Debug for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRef")
            .field("page", &self.page)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Resolves faults for a mapped window.
#[async_trait]
pub trait FaultHandler: Send + Sync {
    /// Length of the mapped window in bytes.
    fn window_len(&self) -> usize;

    /// Resolves the page containing `offset`, or `None` if nothing backs it.
    async fn fault(&self, offset: usize) -> Option<PageRef>;
}

/// A live mapping of a device.
///
/// Creating a mapping and cloning it each count as one more active mapping
/// on the device; dropping one counts it down again.
pub struct Mapping {
    device: Arc<Device>,
    len: usize,
}

impl Device {
    /// Maps the first `len` bytes of the device.
    pub fn map(self: &Arc<Self>, len: usize) -> Mapping {
        self.mapping_opened();
        tracing::trace!(
            "Mapped {} bytes of {}, {} active mappings",
            len,
            self.name(),
            self.active_mappings()
        );
        Mapping {
            device: Arc::clone(self),
            len,
        }
    }
}

impl Mapping {
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Clone for Mapping {
    fn clone(&self) -> Self {
        self.device.map(self.len)
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        self.device.mapping_closed();
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("device", &self.device.name())
            .field("len", &self.len)
            .finish()
    }
}

#[async_trait]
impl FaultHandler for Mapping {
    fn window_len(&self) -> usize {
        self.len
    }

    async fn fault(&self, offset: usize) -> Option<PageRef> {
        if offset >= self.len {
            return None;
        }

        let store = self.device.lock_uninterruptible().await;
        if offset as u64 >= store.size() {
            return None;
        }

        let block_size = store.geometry().block_size();
        let block = (offset / block_size) as u64;
        let page = (offset % block_size) / PAGE_SIZE;
        let quantum = store.lookup(block)?;

        Some(PageRef { quantum, page })
    }
}
