//! Driver configuration and the shared geometry defaults.
//!
//! [`DriverConfig`] describes a whole [`DeviceSet`](crate::device::DeviceSet):
//! how many devices, their names, the memory limit and the completion queue
//! tuning. [`Defaults`] is the live, shared "current defaults" object: every
//! device reads its geometry from it when created and again on every trim,
//! and only the control plane changes it.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    COMPLETION_DELAY, COMPLETION_QUEUE_DEPTH, DEFAULT_DEVICE_COUNT, DEFAULT_ORDER, DEFAULT_QSET,
    DEFAULT_RECYCLE_CAPACITY, DEVICE_NAME_PREFIX, MAX_ORDER, MAX_QSET,
};
use crate::storage::Geometry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("block order {0} exceeds the maximum of {max}", max = MAX_ORDER)]
    OrderTooLarge(u32),

    #[error("quantum-set capacity {0} is outside 1..={max}", max = MAX_QSET)]
    QsetOutOfRange(usize),

    #[error("device count must be at least 1")]
    NoDevices,

    #[error("completion queue depth must be at least 1")]
    EmptyCompletionQueue,
}

pub(crate) fn validate_order(order: u32) -> Result<(), ConfigError> {
    if order > MAX_ORDER {
        return Err(ConfigError::OrderTooLarge(order));
    }
    Ok(())
}

pub(crate) fn validate_qset(qset: usize) -> Result<(), ConfigError> {
    if qset == 0 || qset > MAX_QSET {
        return Err(ConfigError::QsetOutOfRange(qset));
    }
    Ok(())
}

/// The block order and quantum-set capacity new and freshly trimmed devices
/// adopt.
///
/// Changing a value never touches a chain that is already allocated; a
/// device picks the new geometry up at its next trim.
#[derive(Debug)]
pub struct Defaults {
    order: AtomicU32,
    qset: AtomicUsize,
}

impl Defaults {
    pub fn new(geometry: Geometry) -> Result<Arc<Self>, ConfigError> {
        validate_order(geometry.order)?;
        validate_qset(geometry.qset)?;
        Ok(Arc::new(Self {
            order: AtomicU32::new(geometry.order),
            qset: AtomicUsize::new(geometry.qset),
        }))
    }

    /// Current defaults as one geometry.
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.order(), self.qset())
    }

    /// Restores the built-in order and capacity.
    pub fn reset(&self) {
        self.order.store(DEFAULT_ORDER, Ordering::SeqCst);
        self.qset.store(DEFAULT_QSET, Ordering::SeqCst);
    }

    pub fn order(&self) -> u32 {
        self.order.load(Ordering::SeqCst)
    }

    pub fn set_order(&self, order: u32) -> Result<(), ConfigError> {
        validate_order(order)?;
        self.order.store(order, Ordering::SeqCst);
        Ok(())
    }

    /// Installs `order` and returns the previous value in one atomic step.
    pub fn swap_order(&self, order: u32) -> Result<u32, ConfigError> {
        validate_order(order)?;
        Ok(self.order.swap(order, Ordering::SeqCst))
    }

    pub fn qset(&self) -> usize {
        self.qset.load(Ordering::SeqCst)
    }

    pub fn set_qset(&self, qset: usize) -> Result<(), ConfigError> {
        validate_qset(qset)?;
        self.qset.store(qset, Ordering::SeqCst);
        Ok(())
    }

    /// Installs `qset` and returns the previous value in one atomic step.
    pub fn swap_qset(&self, qset: usize) -> Result<usize, ConfigError> {
        validate_qset(qset)?;
        Ok(self.qset.swap(qset, Ordering::SeqCst))
    }
}

/// Configuration of a [`DeviceSet`](crate::device::DeviceSet).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Number of independent devices to create.
    pub device_count: usize,
    /// Device names are this prefix followed by the device index.
    pub name_prefix: String,
    /// Initial geometry defaults.
    pub geometry: Geometry,
    /// Byte limit for all quanta of all devices; `None` for no limit.
    pub memory_limit: Option<usize>,
    /// Freed quanta parked for reuse; 0 disables recycling.
    pub recycle_capacity: usize,
    /// Delay before a deferred completion is delivered.
    pub completion_delay: Duration,
    /// Pending completions the worker queue holds.
    pub completion_queue_depth: usize,
}

impl DriverConfig {
    pub fn with_device_count(mut self, device_count: usize) -> Self {
        self.device_count = device_count;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_geometry(mut self, order: u32, qset: usize) -> Self {
        self.geometry = Geometry::new(order, qset);
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_recycle_capacity(mut self, capacity: usize) -> Self {
        self.recycle_capacity = capacity;
        self
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn with_completion_queue_depth(mut self, depth: usize) -> Self {
        self.completion_queue_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.completion_queue_depth == 0 {
            return Err(ConfigError::EmptyCompletionQueue);
        }
        validate_order(self.geometry.order)?;
        validate_qset(self.geometry.qset)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            device_count: DEFAULT_DEVICE_COUNT,
            name_prefix: DEVICE_NAME_PREFIX.to_string(),
            geometry: Geometry::new(DEFAULT_ORDER, DEFAULT_QSET),
            memory_limit: None,
            recycle_capacity: DEFAULT_RECYCLE_CAPACITY,
            completion_delay: COMPLETION_DELAY,
            completion_queue_depth: COMPLETION_QUEUE_DEPTH,
        }
    }
}
