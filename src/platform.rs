//! Platform boundary
//!
//! The HID host layer (IOHIDManager, hidraw, a test harness) lives behind
//! two small traits and one event enum. Everything the platform observes is
//! normalized into a `PlatformEvent` and pushed into the daemon's single
//! input channel; everything the daemon asks of the hardware goes through
//! `DeviceHost`. The core stays synchronous and platform-free.

use crate::device::DeviceHandle;
use crate::error::DeviceError;
use async_trait::async_trait;

/// One observation from the HID host layer, in arrival order
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// A device matching our vendor identity was attached. `identifier` is
    /// set when the platform already knows it (BLE devices expose their
    /// address at attach time); the dongle discovers its identifier later.
    DeviceAttached {
        handle: DeviceHandle,
        product_id: u16,
        identifier: Option<String>,
    },

    /// The device went away or its session was torn down
    DeviceDetached { handle: DeviceHandle },

    /// One HID input report, with the usage page and usage it arrived on
    InputReport {
        handle: DeviceHandle,
        usage_page: u32,
        usage: u32,
        data: Vec<u8>,
    },

    /// Platform-layer status text worth forwarding to clients
    Status { text: String },
}

/// Outbound path to the hardware: sending HID output reports.
///
/// Implementations must be callable from the core's thread without
/// blocking on the device for long; failures are reported, not retried.
pub trait DeviceHost: Send + Sync {
    fn send_report(&self, handle: DeviceHandle, report: &[u8]) -> Result<(), DeviceError>;
}

/// Host that accepts and discards every report. Used when no real HID
/// backend is wired up and in tests.
pub struct NullHost;

impl DeviceHost for NullHost {
    fn send_report(&self, handle: DeviceHandle, report: &[u8]) -> Result<(), DeviceError> {
        tracing::debug!(
            "Discarding {}-byte output report for handle {}",
            report.len(),
            handle
        );
        Ok(())
    }
}

/// OS permission check for monitoring input devices.
///
/// Async because real platform checks may prompt or block; answers are not
/// cached here, every CHECK_PERMISSIONS command asks again.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    async fn granted(&self) -> bool;
}

/// Probe with a fixed answer, for platforms without a permission model and
/// for disabling the check via configuration.
pub struct StaticProbe(pub bool);

#[async_trait]
impl PermissionProbe for StaticProbe {
    async fn granted(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_probe() {
        assert!(StaticProbe(true).granted().await);
        assert!(!StaticProbe(false).granted().await);
    }

    #[test]
    fn test_null_host_discards() {
        assert!(NullHost.send_report(7, &[1, 2, 3]).is_ok());
    }
}
