use rand::Rng;

use crate::{Error, Result};

pub const WHITE: (i32, i32, i32) = (255, 255, 255);
pub const BLACK: (i32, i32, i32) = (0, 0, 0);
pub const RED: (i32, i32, i32) = (255, 0, 0);
pub const GREEN: (i32, i32, i32) = (0, 255, 0);
pub const BLUE: (i32, i32, i32) = (0, 0, 255);

/// Parse a `RRGGBB` hex color, `#` prefix optional.
pub fn parse_hex(hex: &str) -> Result<(i32, i32, i32)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::ColorParse(hex.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map(i32::from)
            .map_err(|_| Error::ColorParse(hex.to_string()))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Format as `0xRRGGBB`, the form the logs use.
pub fn to_hex((r, g, b): (i32, i32, i32)) -> String {
    format!(
        "0x{:02X}{:02X}{:02X}",
        r.clamp(0, 255),
        g.clamp(0, 255),
        b.clamp(0, 255)
    )
}

/// Uniformly random color.
pub fn random_color() -> (i32, i32, i32) {
    let mut rng = rand::thread_rng();
    (
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
    )
}

/// A random color and its 24-bit complement.
pub fn random_complementary_pair() -> ((i32, i32, i32), (i32, i32, i32)) {
    let (r, g, b) = random_color();
    ((r, g, b), (255 - r, 255 - g, 255 - b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        assert_eq!(parse_hex("#FF0080").unwrap(), (255, 0, 128));
        assert_eq!(parse_hex("ff0080").unwrap(), (255, 0, 128));
        assert_eq!(parse_hex("  #00FF00 ").unwrap(), GREEN);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_hex("").is_err());
        assert!(parse_hex("#FFF").is_err());
        assert!(parse_hex("GG0000").is_err());
        assert!(parse_hex("#FF00801").is_err());
    }

    #[test]
    fn formats_like_the_logs() {
        assert_eq!(to_hex((255, 0, 128)), "0xFF0080");
        assert_eq!(to_hex(BLACK), "0x000000");
        // Out-of-range inputs saturate instead of corrupting the text.
        assert_eq!(to_hex((300, -5, 0)), "0xFF0000");
    }

    #[test]
    fn hex_round_trips() {
        for color in [WHITE, BLACK, RED, GREEN, BLUE, (18, 52, 86)] {
            let text = to_hex(color);
            assert_eq!(parse_hex(text.trim_start_matches("0x")).unwrap(), color);
        }
    }

    #[test]
    fn complementary_pair_sums_to_white() {
        for _ in 0..100 {
            let ((r, g, b), (cr, cg, cb)) = random_complementary_pair();
            assert_eq!(r + cr, 255);
            assert_eq!(g + cg, 255);
            assert_eq!(b + cb, 255);
            for channel in [r, g, b, cr, cg, cb] {
                assert!((0..=255).contains(&channel));
            }
        }
    }
}
