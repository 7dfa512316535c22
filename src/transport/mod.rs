//! The device link boundary.
//!
//! The transmit scheduler drives whatever implements [`Transport`]. The real
//! implementation speaks BLE GATT ([`BleTransport`]); tests substitute the
//! scripted [`MockTransport`].

mod ble;
mod mock;

pub use ble::{BleTransport, DiscoveredDevice, CONTROL_CHARACTERISTIC, CONTROL_SERVICE};
pub use mock::{MockHandle, MockTransport};

/// Errors reported by a device link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No usable Bluetooth adapter on this host. Fatal at connect time.
    #[error("no usable Bluetooth adapter")]
    NoAdapter,

    /// The peripheral did not show up within the scan window.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// Connected, but the vendor control characteristic is missing.
    #[error("control characteristic {0} not found")]
    CharacteristicNotFound(uuid::Uuid),

    /// The link dropped. A reconnect may recover it.
    #[error("link disconnected")]
    Disconnected,

    /// A write saw no response in time. The protocol never acknowledges, so
    /// callers treat this as delivered.
    #[error("write timed out")]
    Timeout,

    /// Any other backend failure, assumed transient.
    #[error("transport backend: {0}")]
    Backend(String),
}

/// Minimal link interface consumed by the transmit scheduler.
///
/// One exclusive owner at a time: once connected, the consumer thread holds
/// the transport and nothing else touches it.
pub trait Transport: Send {
    /// Open the link to the peripheral at `address`.
    fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    /// Write one packet, without response semantics.
    fn write(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Close the link. Best effort; never fails.
    fn disconnect(&mut self);

    /// Whether the link is currently believed up.
    fn is_connected(&self) -> bool;
}
