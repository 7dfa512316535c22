//! Scripted in-memory transport for exercising the scheduler without a
//! radio.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Transport, TransportError};

#[derive(Default)]
struct MockState {
    connected: bool,
    address: Option<String>,
    writes: Vec<Vec<u8>>,
    write_attempts: usize,
    connect_attempts: usize,
    script: VecDeque<Result<(), TransportError>>,
    refuse_connect: bool,
    write_delay: Duration,
    connect_delay: Duration,
}

/// Transport double backed by shared state.
///
/// Successful writes are recorded in arrival order. Failures are injected by
/// scripting per-write results through the [`MockHandle`]; an empty script
/// means every write succeeds.
#[derive(Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspection and scripting handle, kept by the test after the transport
    /// itself moves into the consumer thread.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let delay = self.state.lock().unwrap().connect_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.refuse_connect {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }
        state.connected = true;
        state.address = Some(address.to_string());
        Ok(())
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let delay = self.state.lock().unwrap().write_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock().unwrap();
        state.write_attempts += 1;
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        match state.script.pop_front() {
            Some(Ok(())) | None => {
                state.writes.push(payload.to_vec());
                Ok(())
            }
            Some(Err(error)) => Err(error),
        }
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}

/// Shared view into a [`MockTransport`], alive after the transport moves
/// away.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Payloads of every successful write so far, in delivery order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Total write calls, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().unwrap().write_attempts
    }

    /// Total connect calls, failed ones included.
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    /// Address passed to the most recent connect.
    pub fn address(&self) -> Option<String> {
        self.state.lock().unwrap().address.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    /// Queue the outcome of the next write; repeated calls build a script
    /// consumed one entry per write.
    pub fn script_write(&self, result: Result<(), TransportError>) {
        self.state.lock().unwrap().script.push_back(result);
    }

    /// Simulate losing the link: subsequent writes fail with
    /// [`TransportError::Disconnected`] until something reconnects.
    pub fn drop_link(&self) {
        self.state.lock().unwrap().connected = false;
    }

    /// Make connect attempts fail until cleared.
    pub fn refuse_connect(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connect = refuse;
    }

    /// Stall every write by `delay` before it resolves.
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().unwrap().write_delay = delay;
    }

    /// Stall every connect by `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().unwrap().connect_delay = delay;
    }
}
