use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::DeviceError;
use super::{Device, DeviceStats};
use crate::config::{ConfigError, Defaults, DriverConfig};
use crate::control::ControlPlane;
use crate::storage::{MemoryBudget, QuantumAllocator};

/// A fixed set of independent, separately named devices.
///
/// All devices share one [`Defaults`] object, which the set's
/// [`ControlPlane`] tunes, and one [`QuantumAllocator`], so the memory limit
/// applies to the set as a whole.
pub struct DeviceSet {
    devices: Vec<Arc<Device>>,
    defaults: Arc<Defaults>,
    allocator: Arc<QuantumAllocator>,
    control: ControlPlane,
}

impl DeviceSet {
    pub fn new(config: &DriverConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let defaults = Defaults::new(config.geometry)?;
        let budget = config
            .memory_limit
            .map_or_else(MemoryBudget::unlimited, MemoryBudget::new);
        let allocator = QuantumAllocator::new(budget, config.recycle_capacity);

        let devices = (0..config.device_count)
            .map(|index| {
                Device::new(
                    index,
                    format!("{}{}", config.name_prefix, index),
                    Arc::clone(&defaults),
                    Arc::clone(&allocator),
                )
            })
            .collect::<Vec<_>>();
        tracing::debug!("Created {} devices", devices.len());

        Ok(Self {
            devices,
            control: ControlPlane::new(Arc::clone(&defaults)),
            defaults,
            allocator,
        })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Device>> {
        self.devices.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<Device>> {
        self.devices.iter().find(|device| device.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    pub fn defaults(&self) -> &Arc<Defaults> {
        &self.defaults
    }

    pub fn allocator(&self) -> &Arc<QuantumAllocator> {
        &self.allocator
    }

    pub fn control(&self) -> &ControlPlane {
        &self.control
    }

    pub async fn stats(&self) -> Vec<DeviceStats> {
        let mut stats = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            stats.push(device.stats().await);
        }
        stats
    }

    /// One line per device, in index order.
    pub async fn report(&self) -> String {
        let mut report = String::new();
        for stats in self.stats().await {
            report.push_str(&stats.to_string());
            report.push('\n');
        }
        report
    }

    /// Trims every device.
    ///
    /// Devices that are still mapped keep their storage until the last
    /// mapping goes away. Returns how many devices were left busy.
    pub async fn shutdown(&self) -> usize {
        let cancel = CancellationToken::new();
        let mut busy = 0;
        for device in &self.devices {
            match device.trim(&cancel).await {
                Ok(()) => {}
                Err(DeviceError::Busy { mappings }) => {
                    tracing::warn!(
                        "Device {} still has {} mappings at shutdown",
                        device.name(),
                        mappings
                    );
                    busy += 1;
                }
                Err(err) => {
                    tracing::warn!("Failed to trim {} at shutdown: {}", device.name(), err);
                    busy += 1;
                }
            }
        }
        busy
    }
}

impl std::fmt::Debug for DeviceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSet")
            .field("devices", &self.devices)
            .field("defaults", &self.defaults)
            .finish()
    }
}
