//! Frame construction for the fixed-length packet protocol.
//!
//! Layout for the stock 20-byte table:
//!
//! ```text
//! +-----------+--------+------------------+---------+----------+
//! | indicator | opcode | args             | padding | checksum |
//! | byte 0    | byte 1 | bytes 2..        | zeroes  | byte 19  |
//! +-----------+--------+------------------+---------+----------+
//! ```
//!
//! The trailer is the XOR of every preceding byte. It is recomputed on every
//! read rather than cached, so a frame can never be observed inconsistent.

use std::fmt;

use crate::protocol::ProtocolTable;

/// Frame construction failures. Both variants mean the command and table
/// disagree, which is a caller bug, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Opcode plus arguments do not fit between the argument offset and the
    /// checksum byte.
    #[error("command does not fit in frame: {payload} bytes, {available} available")]
    FrameOverflow { payload: usize, available: usize },

    /// A raw packet's length does not match the table's packet length.
    #[error("raw packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// One wire-ready command packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Build a command frame: indicator byte, then `[opcode] ++ args` at the
    /// argument offset, zero padding, checksum trailer.
    pub fn build(table: &ProtocolTable, opcode: u8, args: &[u8]) -> Result<Self, ProtocolError> {
        let payload = 1 + args.len();
        let available = table.packet_length.saturating_sub(table.arg_start + 1);
        if payload > available {
            return Err(ProtocolError::FrameOverflow { payload, available });
        }

        let mut bytes = vec![0u8; table.packet_length];
        bytes[0] = table.indicator;
        bytes[table.arg_start] = opcode;
        bytes[table.arg_start + 1..table.arg_start + payload].copy_from_slice(args);
        seal(&mut bytes);
        Ok(Self { bytes })
    }

    /// Wrap a fully specified packet, recomputing the trailer rather than
    /// trusting the one supplied.
    pub fn pack_raw(table: &ProtocolTable, bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != table.packet_length {
            return Err(ProtocolError::LengthMismatch {
                expected: table.packet_length,
                actual: bytes.len(),
            });
        }
        let mut bytes = bytes.to_vec();
        seal(&mut bytes);
        Ok(Self { bytes })
    }

    /// Wire payload, trailer freshly recomputed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        seal(&mut out);
        out
    }
}

impl fmt::Display for Frame {
    /// Comma-separated uppercase hex, the form the transmit log uses.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.to_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Write the XOR of all non-trailer bytes into the trailer slot.
fn seal(bytes: &mut [u8]) {
    if let Some((last, body)) = bytes.split_last_mut() {
        *last = body.iter().fold(0u8, |acc, &b| acc ^ b);
    }
}
