//! Control Govee BLE LED strips.
//!
//! Two halves: [`protocol`] encodes the vendor's fixed-length command
//! packets, and [`transmit`] drives them over an unreliable BLE link with a
//! prioritized queue, keep-alive injection and bounded retry. [`Device`]
//! ties both together behind a small synchronous facade.
//!
//! ```no_run
//! use govle::{BleTransport, Device, LinkConfig, ProtocolTable};
//!
//! fn main() -> govle::Result<()> {
//!     let transport = Box::new(BleTransport::new()?);
//!     let strip = Device::connect(
//!         transport,
//!         "A4:C1:38:5C:0A:42",
//!         ProtocolTable::GOVEE,
//!         LinkConfig::default(),
//!     )?;
//!     strip.set_power(true)?;
//!     strip.set_color((255, 64, 0))?;
//!     strip.disconnect();
//!     Ok(())
//! }
//! ```

pub mod color;
pub mod config;
pub mod device;
pub mod protocol;
pub mod queue;
pub mod transmit;
pub mod transport;

pub use config::{Config, LinkConfig};
pub use device::{Animation, Device};
pub use protocol::{Command, Frame, ProtocolError, ProtocolTable};
pub use queue::Priority;
pub use transmit::Transmitter;
pub use transport::{
    BleTransport, DiscoveredDevice, MockHandle, MockTransport, Transport, TransportError,
};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the API surface and the strip.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command and its protocol table disagree. This is a caller bug and
    /// surfaces immediately instead of being queued.
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    /// The link could not be opened or torn down.
    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    /// A frame was submitted while no link is active.
    #[error("not connected - call connect() first")]
    NotConnected,

    /// Device name is not in the registry and is not a literal address.
    #[error("unknown device {0:?} (not in config, not a BLE address)")]
    UnknownDevice(String),

    /// Configuration file unreadable or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed hex color string.
    #[error("invalid hex color {0:?}")]
    ColorParse(String),

    /// A worker thread could not be started.
    #[error("thread error: {0}")]
    Thread(String),
}
