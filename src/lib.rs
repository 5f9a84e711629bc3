//! quantadev - demand-paged in-memory byte devices
//!
//! This library provides growable, byte-addressable devices whose storage is
//! allocated lazily in page-aligned quanta. A device can be read and written
//! at arbitrary offsets and mapped into an address space, where each page is
//! bound on first touch through a fault handler.
//!
//! # Modules
//!
//! - [`storage`] - Quantum-set chain, offset arithmetic, quantum allocation
//! - [`device`] - Devices, positioned I/O, open handles, device sets
//! - [`mapping`] - Fault-driven mappings and mapped views
//! - [`completion`] - Deferred completion of asynchronous submissions
//! - [`control`] - Runtime control of the geometry defaults
//! - [`config`] - Driver configuration and the shared defaults
//! - [`constants`] - Built-in defaults and limits

pub mod completion;
pub mod config;
pub mod constants;
pub mod control;
pub mod device;
pub mod mapping;
pub mod storage;

pub use completion::{CompletionQueue, ControlBlock, IoKind, Submitted};
pub use config::{ConfigError, Defaults, DriverConfig};
pub use control::{ControlArg, ControlCommand, ControlError, ControlPlane, Parameter};
pub use device::{
    Device, DeviceError, DeviceSet, DeviceStats, OpenFile, OpenMode, UserSink, UserSource,
};
pub use mapping::{AccessError, FaultHandler, MappedView, Mapping, PageRef};
pub use storage::{Geometry, Location, MemoryBudget, QuantumAllocator, StorageError, Store};
