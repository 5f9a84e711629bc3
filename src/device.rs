//! Devices and positioned I/O.
//!
//! A [`Device`] owns one [`Store`] behind an async mutex and counts the
//! mappings that currently reference it. Positioned reads and writes go
//! through [`Device::read_at`] and [`Device::write_at`], or through an
//! [`OpenFile`] that keeps a file position.
//!
//! Transfers never cross a quantum boundary, so a call may move fewer bytes
//! than asked for. Callers loop; [`Device::read_bytes`] and
//! [`Device::write_all_at`] do it for them.
//!
//! # Examples
//!
//! ```
//! use quantadev::{DeviceSet, DriverConfig, OpenMode};
//! use std::io::SeekFrom;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let devices = DeviceSet::new(&DriverConfig::default().with_device_count(1))?;
//! let device = devices.get(0).unwrap();
//!
//! let mut file = device.open(OpenMode::ReadWrite).await?;
//! file.write(b"hello".as_slice()).await?;
//!
//! file.seek(SeekFrom::Start(0)).await?;
//! let mut buf = vec![0u8; 5];
//! let n = file.read(&mut buf).await?;
//! assert_eq!(&buf[..n], b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Locking
//!
//! Every operation that touches the chain or the size holds the device lock
//! for its whole critical section. Waiting for the lock can be interrupted
//! through a [`CancellationToken`]; the operation then fails with
//! [`DeviceError::Interrupted`] without having touched the device.

mod buffer;
mod error;
mod file;
mod io;
mod registry;

pub use buffer::{BufferFault, UserSink, UserSource};
pub use error::DeviceError;
pub use file::{parse_seek, OpenFile, OpenMode};
pub use registry::DeviceSet;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::Defaults;
use crate::storage::{Geometry, QuantumAllocator, Store};

/// One growable, byte-addressable in-memory device.
pub struct Device {
    index: usize,
    name: String,
    store: Mutex<Store>,
    mappings: AtomicUsize,
    defaults: Arc<Defaults>,
}

impl Device {
    /// Creates an empty device using the current defaults' geometry.
    pub fn new(
        index: usize,
        name: impl Into<String>,
        defaults: Arc<Defaults>,
        allocator: Arc<QuantumAllocator>,
    ) -> Arc<Self> {
        let name = name.into();
        let geometry = defaults.geometry();
        tracing::debug!(
            "Creating device {} with order {} and qset {}",
            name,
            geometry.order,
            geometry.qset
        );

        Arc::new(Self {
            index,
            name,
            store: Mutex::new(Store::new(geometry, allocator)),
            mappings: AtomicUsize::new(0),
            defaults,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Arc<Defaults> {
        &self.defaults
    }

    /// Number of live mappings referencing this device.
    pub fn active_mappings(&self) -> usize {
        self.mappings.load(Ordering::SeqCst)
    }

    pub(crate) fn mapping_opened(&self) {
        self.mappings.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mapping_closed(&self) {
        self.mappings.fetch_sub(1, Ordering::SeqCst);
    }

    /// Acquires the device lock, giving up if `cancel` fires while waiting.
    ///
    /// A free lock is taken even when `cancel` has already fired.
    pub(crate) async fn lock(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, Store>, DeviceError> {
        tokio::select! {
            biased;
            guard = self.store.lock() => Ok(guard),
            _ = cancel.cancelled() => {
                tracing::trace!("Lock wait on {} interrupted", self.name);
                Err(DeviceError::Interrupted)
            }
        }
    }

    /// Acquires the device lock without a way to interrupt the wait.
    pub(crate) async fn lock_uninterruptible(&self) -> MutexGuard<'_, Store> {
        self.store.lock().await
    }

    /// Frees all storage, resets the size to zero and adopts the current
    /// defaults' geometry.
    ///
    /// Fails with [`DeviceError::Busy`] while any mapping is live.
    pub async fn trim(&self, cancel: &CancellationToken) -> Result<(), DeviceError> {
        let mut store = self.lock(cancel).await?;

        let mappings = self.active_mappings();
        if mappings > 0 {
            tracing::debug!(
                "Refusing to trim {} with {} active mappings",
                self.name,
                mappings
            );
            return Err(DeviceError::Busy { mappings });
        }

        let geometry = self.defaults.geometry();
        store.trim(geometry);
        tracing::debug!(
            "Trimmed {}, now order {} qset {}",
            self.name,
            geometry.order,
            geometry.qset
        );
        Ok(())
    }

    /// Logical end of data.
    pub async fn size(&self, cancel: &CancellationToken) -> Result<u64, DeviceError> {
        Ok(self.lock(cancel).await?.size())
    }

    /// Geometry the current chain was built with.
    pub async fn geometry(&self, cancel: &CancellationToken) -> Result<Geometry, DeviceError> {
        Ok(self.lock(cancel).await?.geometry())
    }

    pub async fn stats(&self) -> DeviceStats {
        let store = self.lock_uninterruptible().await;
        DeviceStats {
            name: self.name.clone(),
            size: store.size(),
            geometry: store.geometry(),
            nodes: store.node_count(),
            blocks: store.block_count(),
            active_mappings: self.active_mappings(),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("active_mappings", &self.active_mappings())
            .finish()
    }
}

/// Point-in-time summary of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub name: String,
    pub size: u64,
    pub geometry: Geometry,
    pub nodes: usize,
    pub blocks: usize,
    pub active_mappings: usize,
}

impl DeviceStats {
    /// Bytes held by allocated quanta.
    pub fn allocated_bytes(&self) -> u64 {
        self.blocks as u64 * self.geometry.block_size() as u64
    }
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: qset {}, order {}, sz {}, nodes {}, blocks {} ({} bytes), mappings {}",
            self.name,
            self.geometry.qset,
            self.geometry.order,
            self.size,
            self.nodes,
            self.blocks,
            self.allocated_bytes(),
            self.active_mappings
        )
    }
}
