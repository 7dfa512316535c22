//! BLE GATT transport over btleplug.
//!
//! btleplug is async; this adapter owns a small tokio runtime and blocks on
//! it, which keeps the rest of the crate free of async plumbing. The
//! blocking calls must therefore never run inside another runtime; the
//! consumer thread that drives a connected transport is a plain OS thread.

use std::time::{Duration, Instant};

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::runtime::Runtime;
use tracing::debug;
use uuid::Uuid;

use super::{Transport, TransportError};

/// Vendor GATT service carrying the control characteristic.
pub const CONTROL_SERVICE: Uuid = Uuid::from_u128(0x0001_0203_0405_0607_0809_0a0b_0c0d_1910);

/// Write-without-response characteristic every command frame goes to.
pub const CONTROL_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0001_0203_0405_0607_0809_0a0b_0c0d_2b11);

/// How long connect() scans for the target before giving up.
const SCAN_WINDOW: Duration = Duration::from_secs(10);
const SCAN_POLL: Duration = Duration::from_millis(200);

/// One peripheral seen during a discovery scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// Real device link over the host's first Bluetooth adapter.
pub struct BleTransport {
    runtime: Runtime,
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
}

impl BleTransport {
    /// Bring up the runtime and grab the first adapter.
    pub fn new() -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        let adapter = runtime.block_on(async {
            let manager = Manager::new().await.map_err(map_ble_err)?;
            manager
                .adapters()
                .await
                .map_err(map_ble_err)?
                .into_iter()
                .next()
                .ok_or(TransportError::NoAdapter)
        })?;

        Ok(Self {
            runtime,
            adapter,
            peripheral: None,
            characteristic: None,
        })
    }

    /// Scan for `window` and report every peripheral seen, unfiltered.
    pub fn discover(&self, window: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.runtime.block_on(async {
            self.adapter
                .start_scan(ScanFilter::default())
                .await
                .map_err(map_ble_err)?;
            tokio::time::sleep(window).await;

            let mut devices = Vec::new();
            for peripheral in self.adapter.peripherals().await.map_err(map_ble_err)? {
                let properties = peripheral.properties().await.map_err(map_ble_err)?;
                let (name, rssi) = match properties {
                    Some(p) => (p.local_name, p.rssi),
                    None => (None, None),
                };
                devices.push(DiscoveredDevice {
                    address: peripheral.address().to_string(),
                    name,
                    rssi,
                });
            }
            let _ = self.adapter.stop_scan().await;
            Ok(devices)
        })
    }
}

impl Transport for BleTransport {
    fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let peripheral = self
            .runtime
            .block_on(find_peripheral(&self.adapter, address))?;

        self.runtime.block_on(async {
            peripheral.connect().await.map_err(map_ble_err)?;
            peripheral.discover_services().await.map_err(map_ble_err)
        })?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| is_control_characteristic(c.service_uuid, c.uuid))
            .ok_or(TransportError::CharacteristicNotFound(CONTROL_CHARACTERISTIC))?;

        debug!(address, "BLE link established");
        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::Disconnected)?;
        let characteristic = self
            .characteristic
            .as_ref()
            .ok_or(TransportError::Disconnected)?;
        self.runtime
            .block_on(peripheral.write(characteristic, payload, WriteType::WithoutResponse))
            .map_err(map_ble_err)
    }

    fn disconnect(&mut self) {
        if let Some(peripheral) = self.peripheral.take() {
            let _ = self.runtime.block_on(peripheral.disconnect());
        }
        self.characteristic = None;
    }

    fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(peripheral) => self
                .runtime
                .block_on(peripheral.is_connected())
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Scan until the target address shows up or the window closes.
async fn find_peripheral(adapter: &Adapter, address: &str) -> Result<Peripheral, TransportError> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(map_ble_err)?;

    let deadline = Instant::now() + SCAN_WINDOW;
    let mut found = None;
    while found.is_none() && Instant::now() < deadline {
        for peripheral in adapter.peripherals().await.map_err(map_ble_err)? {
            if peripheral
                .address()
                .to_string()
                .eq_ignore_ascii_case(address)
            {
                found = Some(peripheral);
                break;
            }
        }
        if found.is_none() {
            tokio::time::sleep(SCAN_POLL).await;
        }
    }
    let _ = adapter.stop_scan().await;
    found.ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
}

/// The control characteristic only counts under the vendor control service;
/// other services can carry lookalike characteristic ids.
fn is_control_characteristic(service: Uuid, characteristic: Uuid) -> bool {
    service == CONTROL_SERVICE && characteristic == CONTROL_CHARACTERISTIC
}

fn map_ble_err(error: btleplug::Error) -> TransportError {
    match error {
        btleplug::Error::NotConnected => TransportError::Disconnected,
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        other => TransportError::Backend(other.to_string()),
    }
}
