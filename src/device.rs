use tracing::debug;

use crate::config::LinkConfig;
use crate::protocol::{segment_from_bitmask, Command, ProtocolTable};
use crate::queue::Priority;
use crate::transmit::Transmitter;
use crate::transport::Transport;
use crate::Result;

/// Queue-backed animations, expanded into ordinary segment frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    /// Sweep the foreground color across the 16 segments one at a time,
    /// painting every other segment with the background color.
    Slide {
        foreground: (i32, i32, i32),
        background: (i32, i32, i32),
    },
}

/// Handle to one connected LED strip.
///
/// Setters encode a frame and hand it to the transmit scheduler, returning
/// once the frame is queued, not once the strip has seen it. The handle is
/// cheap to share by reference across threads.
pub struct Device {
    table: ProtocolTable,
    link: Transmitter,
}

impl Device {
    /// Connect to the strip at `address` over the given transport.
    pub fn connect(
        transport: Box<dyn Transport>,
        address: &str,
        table: ProtocolTable,
        link: LinkConfig,
    ) -> Result<Self> {
        let link = Transmitter::connect(transport, address, &table, link)?;
        debug!(address, "device ready");
        Ok(Self { table, link })
    }

    pub fn set_power(&self, on: bool) -> Result<()> {
        self.send(Command::Power(on))
    }

    pub fn set_brightness(&self, level: i32) -> Result<()> {
        self.send(Command::Brightness(level))
    }

    pub fn set_gradient(&self, on: bool) -> Result<()> {
        self.send(Command::Gradient(on))
    }

    /// Set the whole strip to `(r, g, b)`. Channels saturate to the wire
    /// range rather than erroring.
    pub fn set_color(&self, (r, g, b): (i32, i32, i32)) -> Result<()> {
        self.send(Command::ManualColor { r, g, b })
    }

    /// Color the segments selected by a `(left, right)` bitmask pair; see
    /// [`segment_from_bitmask`].
    pub fn set_segment_color(
        &self,
        (r, g, b): (i32, i32, i32),
        (left, right): (i32, i32),
    ) -> Result<()> {
        self.send(Command::SegmentColor { r, g, b, left, right })
    }

    /// Queue a fully specified packet, e.g. a captured DIY effect.
    pub fn send_raw(&self, bytes: Vec<u8>) -> Result<()> {
        self.send(Command::Raw(bytes))
    }

    /// Queue one full cycle of an animation.
    pub fn play_animation(&self, animation: Animation) -> Result<()> {
        match animation {
            Animation::Slide {
                foreground,
                background,
            } => {
                for bit in 0..16u16 {
                    let selected = 1u16 << bit;
                    let (left, right) = segment_from_bitmask(selected);
                    self.set_segment_color(foreground, (i32::from(left), i32::from(right)))?;
                    let (left, right) = segment_from_bitmask(!selected);
                    self.set_segment_color(background, (i32::from(left), i32::from(right)))?;
                }
            }
        }
        Ok(())
    }

    /// Whether the link is still accepting frames.
    pub fn is_connected(&self) -> bool {
        self.link.is_active()
    }

    /// Frames queued but not yet written, useful for pacing long effects.
    pub fn pending(&self) -> usize {
        self.link.pending()
    }

    /// Drain what was accepted, close the link, and report how many frames
    /// never made it out.
    pub fn disconnect(self) -> usize {
        self.link.disconnect()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.link.enqueue(command.encode(&self.table)?, Priority::Med)
    }
}
