//! Device enumeration and the process-wide device registry.
//!
//! The registry caches one ordered pass over every platform's devices and
//! answers index-based queries from the cache. Population happens at most
//! once; every query path triggers it lazily. There is no global mutable
//! state — callers hold the registry and hand it an enumerator, so tests
//! can substitute a mock device list.

use crate::error::{Result, StreamError};
use tracing::debug;

/// Immutable description of one compute device, captured at enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Human-readable device name.
    pub name: String,
    /// Driver version string reported by the device.
    pub driver_version: String,
    /// Total global memory in bytes.
    pub global_memory_bytes: u64,
    /// Maximum single-allocation size in bytes.
    pub max_alloc_bytes: u64,
    /// Device supports double-precision (FP64) arithmetic.
    pub supports_fp64: bool,
}

impl DeviceDescriptor {
    /// A mid-range mock device (8 GB VRAM, 2 GB max allocation, FP64) so
    /// tests can exercise selection and validation without hardware.
    pub fn mock() -> Self {
        Self {
            name: "Mock GPU Device".into(),
            driver_version: "1.0.0-mock".into(),
            global_memory_bytes: 8 * 1024 * 1024 * 1024,
            max_alloc_bytes: 2 * 1024 * 1024 * 1024,
            supports_fp64: true,
        }
    }
}

/// Source of device descriptors, in platform order then device order.
pub trait DeviceEnumerator {
    fn enumerate(&self) -> Vec<DeviceDescriptor>;
}

/// Ordered, lazily-populated cache of every enumerated device.
pub struct DeviceRegistry {
    enumerator: Box<dyn DeviceEnumerator>,
    devices: Vec<DeviceDescriptor>,
    populated: bool,
}

impl DeviceRegistry {
    /// Create an unpopulated registry backed by `enumerator`.
    pub fn new(enumerator: Box<dyn DeviceEnumerator>) -> Self {
        Self { enumerator, devices: Vec::new(), populated: false }
    }

    /// Enumerate and cache the device list. No-op once populated.
    pub fn ensure_populated(&mut self) {
        if self.populated {
            return;
        }
        self.devices = self.enumerator.enumerate();
        self.populated = true;
        debug!("enumerated {} compute devices", self.devices.len());
    }

    /// Number of cached devices.
    pub fn count(&mut self) -> usize {
        self.ensure_populated();
        self.devices.len()
    }

    /// Descriptor for the device at `index`.
    pub fn descriptor(&mut self, index: usize) -> Result<&DeviceDescriptor> {
        self.ensure_populated();
        let count = self.devices.len();
        self.devices
            .get(index)
            .ok_or(StreamError::InvalidDeviceIndex { index, count })
    }

    /// Name of the device at `index`.
    pub fn name(&mut self, index: usize) -> Result<&str> {
        self.descriptor(index).map(|d| d.name.as_str())
    }

    /// Driver version of the device at `index`.
    pub fn driver_version(&mut self, index: usize) -> Result<&str> {
        self.descriptor(index).map(|d| d.driver_version.as_str())
    }

    /// Print every device's index and name, or a notice when none exist.
    pub fn list(&mut self) {
        self.ensure_populated();
        if self.devices.is_empty() {
            eprintln!("No devices found.");
        } else {
            println!();
            println!("Devices:");
            for (i, device) in self.devices.iter().enumerate() {
                println!("{i}: {}", device.name);
            }
            println!();
        }
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("populated", &self.populated)
            .field("devices", &self.devices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Enumerator that counts how many times it is invoked.
    struct CountingEnumerator {
        devices: Vec<DeviceDescriptor>,
        calls: Rc<Cell<usize>>,
    }

    impl DeviceEnumerator for CountingEnumerator {
        fn enumerate(&self) -> Vec<DeviceDescriptor> {
            self.calls.set(self.calls.get() + 1);
            self.devices.clone()
        }
    }

    fn registry_with(devices: Vec<DeviceDescriptor>) -> (DeviceRegistry, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let reg = DeviceRegistry::new(Box::new(CountingEnumerator {
            devices,
            calls: Rc::clone(&calls),
        }));
        (reg, calls)
    }

    fn named(name: &str) -> DeviceDescriptor {
        DeviceDescriptor { name: name.into(), ..DeviceDescriptor::mock() }
    }

    #[test]
    fn population_happens_at_most_once() {
        let (mut reg, calls) = registry_with(vec![named("gpu0"), named("gpu1")]);
        assert_eq!(reg.count(), 2);
        assert_eq!(reg.count(), 2);
        let _ = reg.name(0);
        reg.list();
        reg.list();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn count_triggers_lazy_population() {
        let (mut reg, calls) = registry_with(vec![named("gpu0")]);
        assert_eq!(calls.get(), 0);
        assert_eq!(reg.count(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn devices_keep_enumeration_order() {
        let (mut reg, _) = registry_with(vec![named("first"), named("second"), named("third")]);
        assert_eq!(reg.name(0).unwrap(), "first");
        assert_eq!(reg.name(1).unwrap(), "second");
        assert_eq!(reg.name(2).unwrap(), "third");
    }

    #[test]
    fn name_out_of_range_is_invalid_device_index() {
        let (mut reg, _) = registry_with(vec![named("gpu0")]);
        match reg.name(1) {
            Err(StreamError::InvalidDeviceIndex { index: 1, count: 1 }) => {}
            other => panic!("expected InvalidDeviceIndex, got {other:?}"),
        }
    }

    #[test]
    fn driver_version_out_of_range_is_invalid_device_index() {
        let (mut reg, _) = registry_with(vec![]);
        assert!(matches!(
            reg.driver_version(0),
            Err(StreamError::InvalidDeviceIndex { index: 0, count: 0 })
        ));
    }

    #[test]
    fn driver_version_reads_descriptor_field() {
        let mut dev = named("gpu0");
        dev.driver_version = "31.0.101".into();
        let (mut reg, _) = registry_with(vec![dev]);
        assert_eq!(reg.driver_version(0).unwrap(), "31.0.101");
    }

    #[test]
    fn list_on_empty_registry_does_not_panic() {
        let (mut reg, calls) = registry_with(vec![]);
        reg.list();
        reg.list();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mock_descriptor_supports_fp64() {
        assert!(DeviceDescriptor::mock().supports_fp64);
    }
}
