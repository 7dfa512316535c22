//! The vendor packet protocol: fixed-length frames, per-model constant
//! tables, and the command set the strips understand.

mod command;
mod frame;
mod table;

pub use command::{segment_from_bitmask, Command};
pub use frame::{Frame, ProtocolError};
pub use table::{ClampRange, ColorModes, Limits, Opcodes, ProtocolTable};
