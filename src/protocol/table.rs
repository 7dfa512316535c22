/// Inclusive bounds for one numeric command field.
///
/// The strips silently misbehave on out-of-range bytes rather than reject
/// them, so values are saturated here instead of being turned into errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampRange {
    pub min: u8,
    pub max: u8,
}

impl ClampRange {
    /// Saturate `value` into the range. The lower bound is applied first, so
    /// a table with crossed bounds yields `max` instead of panicking.
    pub fn clamp(self, value: i32) -> u8 {
        value.max(i32::from(self.min)).min(i32::from(self.max)) as u8
    }
}

/// Command opcodes for one device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcodes {
    pub power: u8,
    pub brightness: u8,
    pub color: u8,
    pub gradient: u8,
}

/// Sub-opcode tags selecting a color command's addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorModes {
    /// Whole-strip color.
    pub manual: u8,
    /// Per-segment color.
    pub segment: u8,
}

/// Clamp ranges for the numeric fields of one device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub brightness: ClampRange,
    pub color: ClampRange,
    pub segment: ClampRange,
}

/// Packet layout and encoding constants for one device model.
///
/// All frame construction is parameterized on a table; supporting a model
/// with, say, a narrower brightness range is a matter of shipping different
/// data, not different code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTable {
    /// Total packet size, checksum byte included.
    pub packet_length: usize,
    /// Constant first byte of every command frame.
    pub indicator: u8,
    /// Offset where the opcode goes; arguments follow it.
    pub arg_start: usize,
    pub opcodes: Opcodes,
    pub color_modes: ColorModes,
    pub limits: Limits,
    /// Liveness packet sent verbatim on the keep-alive interval.
    pub keep_alive: &'static [u8],
}

impl ProtocolTable {
    /// Boolean argument encoding shared by every known model.
    pub fn bool_byte(on: bool) -> u8 {
        if on {
            0x01
        } else {
            0x00
        }
    }

    /// Stock Govee strip table: 20-byte frames, `0x33` indicator, full-width
    /// brightness range.
    pub const GOVEE: ProtocolTable = ProtocolTable {
        packet_length: 20,
        indicator: 0x33,
        arg_start: 0x01,
        opcodes: Opcodes {
            power: 0x01,
            brightness: 0x04,
            color: 0x05,
            gradient: 0x14,
        },
        color_modes: ColorModes {
            manual: 0x02,
            segment: 0x0B,
        },
        limits: Limits {
            brightness: ClampRange { min: 0x00, max: 0xFF },
            color: ClampRange { min: 0x00, max: 0xFF },
            segment: ClampRange { min: 0x00, max: 0xFF },
        },
        keep_alive: &GOVEE_KEEP_ALIVE,
    };
}

/// Observed on the wire from the vendor app; the strip drops the link a few
/// seconds after these stop arriving.
const GOVEE_KEEP_ALIVE: [u8; 20] = [
    0xAA, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xAB,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_saturates_both_ends() {
        let range = ClampRange { min: 0x14, max: 0xFE };
        assert_eq!(range.clamp(-5), 0x14);
        assert_eq!(range.clamp(0x20), 0x20);
        assert_eq!(range.clamp(300), 0xFE);
    }

    #[test]
    fn clamp_is_identity_inside_full_range() {
        let range = ClampRange { min: 0x00, max: 0xFF };
        for value in 0..=255 {
            assert_eq!(range.clamp(value), value as u8);
        }
    }

    #[test]
    fn crossed_bounds_clamp_to_the_max() {
        // A mis-built table degrades to a constant rather than panicking
        // inside frame construction.
        let range = ClampRange { min: 0xFE, max: 0x14 };
        assert_eq!(range.clamp(-5), 0x14);
        assert_eq!(range.clamp(0x80), 0x14);
        assert_eq!(range.clamp(400), 0x14);
    }

    #[test]
    fn bool_byte_encoding() {
        assert_eq!(ProtocolTable::bool_byte(true), 0x01);
        assert_eq!(ProtocolTable::bool_byte(false), 0x00);
    }

    #[test]
    fn govee_keep_alive_is_checksummed() {
        let packet = ProtocolTable::GOVEE.keep_alive;
        assert_eq!(packet.len(), ProtocolTable::GOVEE.packet_length);
        assert_eq!(packet[0], 0xAA);
        let xor = packet[..packet.len() - 1].iter().fold(0u8, |acc, &b| acc ^ b);
        assert_eq!(xor, packet[packet.len() - 1]);
    }
}
