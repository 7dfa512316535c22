use crate::protocol::{Frame, ProtocolError, ProtocolTable};

/// The operations a strip understands.
///
/// Numeric fields are plain `i32` so out-of-range application values reach
/// the per-field clamp instead of being rejected at the type boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Power the strip on or off.
    Power(bool),
    /// Set overall brightness.
    Brightness(i32),
    /// Enable or disable gradient blending between segments.
    Gradient(bool),
    /// Set the whole strip to one color.
    ManualColor { r: i32, g: i32, b: i32 },
    /// Set the segments selected by a split bitmask to one color.
    SegmentColor {
        r: i32,
        g: i32,
        b: i32,
        left: i32,
        right: i32,
    },
    /// Link liveness packet.
    KeepAlive,
    /// Fully specified packet, e.g. a captured DIY effect.
    Raw(Vec<u8>),
}

impl Command {
    /// Encode into a wire frame using the model's protocol table.
    pub fn encode(&self, table: &ProtocolTable) -> Result<Frame, ProtocolError> {
        let ops = table.opcodes;
        let limits = table.limits;
        match self {
            Command::Power(on) => {
                Frame::build(table, ops.power, &[ProtocolTable::bool_byte(*on)])
            }
            Command::Brightness(level) => {
                Frame::build(table, ops.brightness, &[limits.brightness.clamp(*level)])
            }
            Command::Gradient(on) => {
                Frame::build(table, ops.gradient, &[ProtocolTable::bool_byte(*on)])
            }
            Command::ManualColor { r, g, b } => Frame::build(
                table,
                ops.color,
                &[
                    table.color_modes.manual,
                    limits.color.clamp(*r),
                    limits.color.clamp(*g),
                    limits.color.clamp(*b),
                ],
            ),
            Command::SegmentColor { r, g, b, left, right } => Frame::build(
                table,
                ops.color,
                &[
                    table.color_modes.segment,
                    limits.color.clamp(*r),
                    limits.color.clamp(*g),
                    limits.color.clamp(*b),
                    limits.segment.clamp(*left),
                    limits.segment.clamp(*right),
                ],
            ),
            Command::KeepAlive => Frame::pack_raw(table, table.keep_alive),
            Command::Raw(bytes) => Frame::pack_raw(table, bytes),
        }
    }
}

/// Split a 16-bit segment selection bitmask into the wire's
/// `(left, right)` byte pair: left carries segments 0-7, right 8-15.
pub fn segment_from_bitmask(mask: u16) -> (u8, u8) {
    ((mask & 0xFF) as u8, (mask >> 8) as u8)
}
