//! Device constants and tuning parameters.
//!
//! This module contains the built-in defaults the control plane resets to,
//! the hard limits it validates against, and the timing used by the deferred
//! completion worker.

use std::time::Duration;

// ============================================================================
// Memory geometry
// ============================================================================

/// Size of one page in bytes. Blocks are `PAGE_SIZE << order` bytes.
pub const PAGE_SIZE: usize = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

/// Built-in block order: 16 pages per quantum.
pub const DEFAULT_ORDER: u32 = 4;

/// Built-in quantum-set capacity (slots per chain node).
pub const DEFAULT_QSET: usize = 500;

/// Largest accepted block order (4 MiB quanta with 4 KiB pages).
pub const MAX_ORDER: u32 = 10;

/// Largest accepted quantum-set capacity.
pub const MAX_QSET: usize = 65536;

// ============================================================================
// Devices
// ============================================================================

/// Number of devices a default driver configuration instantiates.
pub const DEFAULT_DEVICE_COUNT: usize = 4;

/// Name prefix for devices; the device index is appended.
pub const DEVICE_NAME_PREFIX: &str = "quantadev";

/// Freed quanta kept around for reuse, per allocator.
pub const DEFAULT_RECYCLE_CAPACITY: usize = 64;

// ============================================================================
// Deferred completion
// ============================================================================

/// Delay between an asynchronous submission and its completion notice
/// (one hundredth of a second).
pub const COMPLETION_DELAY: Duration = Duration::from_millis(10);

/// Pending completion notices the worker queue holds before submissions
/// fall back to immediate delivery.
pub const COMPLETION_QUEUE_DEPTH: usize = 256;
