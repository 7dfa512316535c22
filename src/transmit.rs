//! Prioritized transmit scheduling for one device link.
//!
//! A single consumer thread owns the transport and serializes every write.
//! A keep-alive thread injects liveness frames at the configured interval.
//! Producers only ever touch the shared queue, so the transport itself needs
//! no locking. Shutdown rides the queue as a lowest-priority sentinel:
//! everything already accepted drains before the consumer exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::LinkConfig;
use crate::protocol::{Command, Frame, ProtocolTable};
use crate::queue::{Priority, Work, WorkQueue};
use crate::transport::{Transport, TransportError};
use crate::{Error, Result};

/// Slice used while waiting out the keep-alive interval, so shutdown never
/// stalls for a full period.
const KEEP_ALIVE_POLL: Duration = Duration::from_millis(50);

/// Owns the transmit queue and the two link threads.
///
/// `enqueue` is safe from any thread and returns as soon as the frame is
/// accepted; delivery happens asynchronously in queue order. Dropping a
/// `Transmitter` shuts it down the same way [`Transmitter::disconnect`]
/// does, minus the discard count.
pub struct Transmitter {
    queue: Arc<WorkQueue>,
    active: Arc<AtomicBool>,
    consumer: Option<JoinHandle<Box<dyn Transport>>>,
    keep_alive: Option<JoinHandle<()>>,
}

impl Transmitter {
    /// Connect the transport to `address` and start the link threads.
    pub fn connect(
        mut transport: Box<dyn Transport>,
        address: &str,
        table: &ProtocolTable,
        link: LinkConfig,
    ) -> Result<Self> {
        transport.connect(address)?;
        debug!(address, "link connected");

        let queue = Arc::new(WorkQueue::new());
        let active = Arc::new(AtomicBool::new(true));
        let keep_alive_frame = Command::KeepAlive.encode(table)?;

        let consumer = thread::Builder::new()
            .name("tx-worker".into())
            .spawn({
                let queue = Arc::clone(&queue);
                let address = address.to_string();
                move || consumer_loop(transport, &queue, &link, &address)
            })
            .map_err(|e| Error::Thread(format!("failed to spawn tx-worker: {e}")))?;

        let keep_alive = if link.keep_alive().is_zero() {
            None
        } else {
            let spawned = thread::Builder::new().name("keep-alive".into()).spawn({
                let queue = Arc::clone(&queue);
                let active = Arc::clone(&active);
                let interval = link.keep_alive();
                move || keep_alive_loop(&queue, &active, interval, keep_alive_frame)
            });
            match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    // Unwind the consumer we already started.
                    queue.push(Priority::Min, Work::Shutdown);
                    if let Ok(mut transport) = consumer.join() {
                        transport.disconnect();
                    }
                    return Err(Error::Thread(format!("failed to spawn keep-alive: {e}")));
                }
            }
        };

        Ok(Self {
            queue,
            active,
            consumer: Some(consumer),
            keep_alive,
        })
    }

    /// Queue a frame for delivery. Returns once the frame is accepted, not
    /// once the strip has seen it.
    pub fn enqueue(&self, frame: Frame, priority: Priority) -> Result<()> {
        if !self.active.load(Ordering::Relaxed) {
            return Err(Error::NotConnected);
        }
        self.queue.push(priority, Work::Frame(frame));
        Ok(())
    }

    /// Whether the scheduler is still accepting frames.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Frames waiting for the consumer.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stop both threads, close the link, and report how many queued frames
    /// never made it out.
    pub fn disconnect(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        self.active.store(false, Ordering::Relaxed);
        let consumer = match self.consumer.take() {
            Some(handle) => handle,
            None => return 0,
        };

        // The gate above already closed enqueue, so the sentinel lands
        // behind every frame that was accepted.
        self.queue.push(Priority::Min, Work::Shutdown);

        let transport = match consumer.join() {
            Ok(transport) => Some(transport),
            Err(_) => {
                warn!("tx-worker panicked before shutdown");
                None
            }
        };
        if let Some(keep_alive) = self.keep_alive.take() {
            let _ = keep_alive.join();
        }
        if let Some(mut transport) = transport {
            transport.disconnect();
        }

        let discarded = self.queue.drain_remaining();
        if discarded > 0 {
            warn!(discarded, "frames discarded at disconnect");
        }
        debug!("link shut down");
        discarded
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Consumer body. Drains the queue in priority order, one write in flight at
/// a time, throttling between frames. Returns the transport so shutdown can
/// close the link.
fn consumer_loop(
    mut transport: Box<dyn Transport>,
    queue: &WorkQueue,
    link: &LinkConfig,
    address: &str,
) -> Box<dyn Transport> {
    let mut message_id: u64 = 0;
    loop {
        let item = queue.pop();
        let frame = match item.work {
            Work::Shutdown => {
                debug!("tx worker received shutdown sentinel");
                break;
            }
            Work::Frame(frame) => frame,
        };

        message_id += 1;
        debug!(id = message_id, frame = %frame, "transmitting");
        if !tx_with_retry(transport.as_mut(), &frame, link, address) {
            error!(id = message_id, attempts = link.retry_limit, "frame dropped");
        }

        // The strip ignores writes that arrive faster than this.
        thread::sleep(link.throttle());
    }
    transport
}

/// Deliver one frame within a bounded attempt budget, reconnecting inline
/// when the link reports itself gone. Returns false once the budget is
/// spent.
fn tx_with_retry(
    transport: &mut dyn Transport,
    frame: &Frame,
    link: &LinkConfig,
    address: &str,
) -> bool {
    let payload = frame.to_bytes();
    for attempt in 1..=link.retry_limit {
        if !transport.is_connected() {
            warn!(attempt, "link down before write, reconnecting");
            if let Err(e) = transport.connect(address) {
                warn!(attempt, error = %e, "reconnect failed");
                continue;
            }
        }
        match transport.write(&payload) {
            Ok(()) => return true,
            // Write-without-response: silence is not failure.
            Err(TransportError::Timeout) => return true,
            Err(TransportError::Disconnected) => {
                warn!(attempt, "lost connection during write");
                if let Err(e) = transport.connect(address) {
                    warn!(attempt, error = %e, "reconnect failed");
                }
            }
            Err(e) => {
                warn!(attempt, error = %e, "write failed");
            }
        }
    }
    false
}

/// Keep-alive body. Wakes every interval and queues a liveness frame at top
/// priority; sleeps first so a fresh connection is not immediately followed
/// by one.
fn keep_alive_loop(queue: &WorkQueue, active: &AtomicBool, interval: Duration, frame: Frame) {
    while sleep_while_active(active, interval) {
        queue.push(Priority::Max, Work::Frame(frame.clone()));
    }
    debug!("keep alive thread stopped");
}

/// Sleep `interval` in short slices; false as soon as the link goes down.
fn sleep_while_active(active: &AtomicBool, interval: Duration) -> bool {
    let mut remaining = interval;
    while !remaining.is_zero() {
        if !active.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(KEEP_ALIVE_POLL);
        thread::sleep(step);
        remaining -= step;
    }
    active.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Instant;

    const TABLE: ProtocolTable = ProtocolTable::GOVEE;
    const ADDRESS: &str = "A4:C1:38:5C:0A:42";

    fn link(retry_limit: u32, throttle_ms: u64, keep_alive_ms: u64) -> LinkConfig {
        LinkConfig {
            retry_limit,
            throttle_ms,
            keep_alive_ms,
        }
    }

    fn brightness(tag: i32) -> Frame {
        Command::Brightness(tag).encode(&TABLE).unwrap()
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn connect(link: LinkConfig) -> (Transmitter, crate::transport::MockHandle) {
        let transport = MockTransport::new();
        let handle = transport.handle();
        let tx = Transmitter::connect(Box::new(transport), ADDRESS, &TABLE, link).unwrap();
        (tx, handle)
    }

    #[test]
    fn connects_and_delivers_a_frame() {
        let (tx, handle) = connect(link(3, 1, 0));
        tx.enqueue(brightness(0x42), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        assert_eq!(handle.writes()[0][2], 0x42);
        assert_eq!(handle.address().as_deref(), Some(ADDRESS));
        tx.disconnect();
    }

    #[test]
    fn enqueue_is_gated_once_shutdown_begins() {
        let (tx, _handle) = connect(link(3, 1, 0));
        assert!(tx.is_active());
        // A producer racing disconnect sees the closed gate, not the queue.
        tx.active.store(false, Ordering::Relaxed);
        assert!(!tx.is_active());
        let err = tx.enqueue(brightness(1), Priority::Med).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn keep_alives_jump_ahead_of_queued_commands() {
        let (tx, handle) = connect(link(3, 1, 0));
        // Stall the consumer on a plug frame so the real order is decided
        // by the queue, not by timing.
        handle.set_write_delay(Duration::from_millis(150));
        tx.enqueue(brightness(0x01), Priority::Max).unwrap();
        tx.enqueue(brightness(0x0A), Priority::Med).unwrap();
        tx.enqueue(Command::KeepAlive.encode(&TABLE).unwrap(), Priority::Max)
            .unwrap();
        tx.enqueue(brightness(0x0B), Priority::Med).unwrap();

        assert!(wait_until(Duration::from_secs(5), || handle.writes().len() == 4));
        tx.disconnect();

        let writes = handle.writes();
        assert_eq!(writes[0][2], 0x01); // plug
        assert_eq!(writes[1][0], 0xAA); // keep-alive overtook both commands
        assert_eq!(writes[2][2], 0x0A);
        assert_eq!(writes[3][2], 0x0B);
    }

    #[test]
    fn concurrent_producers_stay_fifo_within_priority() {
        for _ in 0..5 {
            let (tx, handle) = connect(link(3, 0, 0));
            thread::scope(|s| {
                for producer in 0..3u8 {
                    let tx = &tx;
                    s.spawn(move || {
                        for i in 0..30u8 {
                            let tag = i32::from(producer) * 30 + i32::from(i);
                            tx.enqueue(brightness(tag), Priority::Med).unwrap();
                        }
                    });
                }
            });

            assert!(wait_until(Duration::from_secs(5), || {
                handle.writes().len() == 90
            }));
            tx.disconnect();

            let mut last_seen = [None::<u8>; 3];
            for frame in handle.writes() {
                let tag = frame[2];
                let producer = (tag / 30) as usize;
                let i = tag % 30;
                if let Some(previous) = last_seen[producer] {
                    assert!(previous < i, "producer {producer} frames reordered");
                }
                last_seen[producer] = Some(i);
            }
        }
    }

    #[test]
    fn transient_write_failures_are_retried_to_success() {
        let (tx, handle) = connect(link(3, 1, 0));
        handle.script_write(Err(TransportError::Backend("glitch".into())));
        handle.script_write(Err(TransportError::Backend("glitch".into())));

        tx.enqueue(brightness(0x55), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        tx.disconnect();

        assert_eq!(handle.write_attempts(), 3);
        assert_eq!(handle.writes()[0][2], 0x55);
        // No reconnect for transient failures.
        assert_eq!(handle.connect_attempts(), 1);
    }

    #[test]
    fn frame_is_dropped_after_the_attempt_budget() {
        let (tx, handle) = connect(link(3, 1, 0));
        for _ in 0..3 {
            handle.script_write(Err(TransportError::Backend("dead".into())));
        }

        tx.enqueue(brightness(0x11), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            handle.write_attempts() == 3
        }));

        // The scheduler survives the drop and keeps serving.
        tx.enqueue(brightness(0x22), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        tx.disconnect();

        assert_eq!(handle.write_attempts(), 4);
        assert_eq!(handle.writes()[0][2], 0x22);
    }

    #[test]
    fn write_timeout_counts_as_delivered() {
        let (tx, handle) = connect(link(3, 1, 0));
        handle.script_write(Err(TransportError::Timeout));

        tx.enqueue(brightness(0x33), Priority::Med).unwrap();
        tx.enqueue(brightness(0x44), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        tx.disconnect();

        // One attempt for the timed-out frame, one for the next. No retry.
        assert_eq!(handle.write_attempts(), 2);
        assert_eq!(handle.writes()[0][2], 0x44);
    }

    #[test]
    fn link_loss_heals_before_the_next_write() {
        let (tx, handle) = connect(link(3, 1, 0));
        handle.drop_link();

        tx.enqueue(brightness(0x66), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        tx.disconnect();

        assert_eq!(handle.writes()[0][2], 0x66);
        // Initial connect plus the inline reconnect.
        assert_eq!(handle.connect_attempts(), 2);
    }

    #[test]
    fn disconnect_mid_write_reconnects_and_retries() {
        let (tx, handle) = connect(link(3, 1, 0));
        handle.script_write(Err(TransportError::Disconnected));

        tx.enqueue(brightness(0x77), Priority::Med).unwrap();
        assert!(wait_until(Duration::from_secs(2), || handle.writes().len() == 1));
        tx.disconnect();

        assert_eq!(handle.writes()[0][2], 0x77);
        assert_eq!(handle.write_attempts(), 2);
        assert_eq!(handle.connect_attempts(), 2);
    }

    #[test]
    fn disconnect_completes_while_retries_are_failing() {
        let (tx, handle) = connect(link(3, 1, 0));
        handle.drop_link();
        handle.refuse_connect(true);
        handle.set_connect_delay(Duration::from_millis(20));

        for tag in 0..5 {
            tx.enqueue(brightness(tag), Priority::Med).unwrap();
        }

        let started = Instant::now();
        let discarded = tx.disconnect();
        assert!(started.elapsed() < Duration::from_secs(10));
        // Every frame got its full budget; none were silently discarded.
        assert_eq!(discarded, 0);
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn disconnect_reports_frames_stranded_behind_a_sentinel() {
        let (tx, _handle) = connect(link(3, 1, 0));
        // Force the consumer past a sentinel while frames still wait behind
        // it, the one case where drain actually finds anything.
        tx.queue.push(Priority::Min, Work::Shutdown);
        tx.queue.push(Priority::Min, Work::Frame(brightness(9)));
        assert!(wait_until(Duration::from_secs(2), || tx.pending() == 1));
        assert_eq!(tx.disconnect(), 1);
    }

    #[test]
    fn keep_alive_frames_are_injected_on_the_interval() {
        let (tx, handle) = connect(link(3, 1, 30));
        assert!(wait_until(Duration::from_secs(3), || {
            handle
                .writes()
                .iter()
                .filter(|frame| frame[0] == 0xAA)
                .count()
                >= 2
        }));
        tx.disconnect();
    }

    #[test]
    fn drop_shuts_the_link_down() {
        let (tx, handle) = connect(link(3, 1, 0));
        assert!(handle.is_connected());
        drop(tx);
        assert!(!handle.is_connected());
    }

    #[test]
    fn connect_failure_surfaces_immediately() {
        let transport = MockTransport::new();
        let handle = transport.handle();
        handle.refuse_connect(true);
        let result = Transmitter::connect(Box::new(transport), ADDRESS, &TABLE, link(3, 1, 0));
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::DeviceNotFound(_)))
        ));
        // A refused connect is not retried and spawns nothing.
        assert_eq!(handle.connect_attempts(), 1);
    }
}
