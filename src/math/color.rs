/// Parse `#rrggbb` into sRGB components in [0, 1]
pub fn hex_to_srgb(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some([
        ((value >> 16) & 0xff) as f32 / 255.0,
        ((value >> 8) & 0xff) as f32 / 255.0,
        (value & 0xff) as f32 / 255.0,
    ])
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Parse a hex colour straight into linear space, falling back to magenta
pub fn hex_to_linear(hex: &str) -> [f32; 3] {
    match hex_to_srgb(hex) {
        Some([r, g, b]) => [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b)],
        None => {
            log::warn!("invalid colour {:?}, using magenta", hex);
            [1.0, 0.0, 1.0]
        }
    }
}
