//! Color types and utilities

/// RGBA color with f32 components (0.0 to 1.0), straight (non-premultiplied) alpha
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const RED: Color = Color {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const GREEN: Color = Color {
        r: 0.0,
        g: 1.0,
        b: 0.0,
        a: 1.0,
    };
    pub const BLUE: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create from u8 components (0-255)
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Create from hex value (0xRRGGBB or 0xRRGGBBAA)
    pub fn from_hex(hex: u32) -> Self {
        if hex > 0xFFFFFF {
            Self::from_rgba8(
                ((hex >> 24) & 0xFF) as u8,
                ((hex >> 16) & 0xFF) as u8,
                ((hex >> 8) & 0xFF) as u8,
                (hex & 0xFF) as u8,
            )
        } else {
            Self::from_rgba8(
                ((hex >> 16) & 0xFF) as u8,
                ((hex >> 8) & 0xFF) as u8,
                (hex & 0xFF) as u8,
                255,
            )
        }
    }

    /// Create from hue, saturation, lightness (all 0.0-1.0) and alpha
    pub fn hsla(h: f32, s: f32, l: f32, a: f32) -> Self {
        let h = h.rem_euclid(1.0);
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let m1 = 2.0 * l - m2;
        Self {
            r: hue_channel(h + 1.0 / 3.0, m1, m2).clamp(0.0, 1.0),
            g: hue_channel(h, m1, m2).clamp(0.0, 1.0),
            b: hue_channel(h - 1.0 / 3.0, m1, m2).clamp(0.0, 1.0),
            a,
        }
    }

    /// Create a grayscale color
    pub fn gray(value: f32) -> Self {
        Self::rgb(value, value, value)
    }

    /// Set alpha and return new color
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { a: alpha, ..self }
    }

    /// Multiply alpha by `factor`
    pub fn fade(self, factor: f32) -> Self {
        Self {
            a: self.a * factor,
            ..self
        }
    }

    /// Linear interpolation between two colors, `t` clamped to [0, 1]
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let oneminus = 1.0 - t;
        Self {
            r: self.r * oneminus + other.r * t,
            g: self.g * oneminus + other.g * t,
            b: self.b * oneminus + other.b * t,
            a: self.a * oneminus + other.a * t,
        }
    }

    /// RGB channels scaled by alpha
    pub fn premultiplied(self) -> Self {
        Self {
            r: self.r * self.a,
            g: self.g * self.a,
            b: self.b * self.a,
            a: self.a,
        }
    }

    /// Convert to u8 array [r, g, b, a]
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            channel_to_u8(self.r),
            channel_to_u8(self.g),
            channel_to_u8(self.b),
            channel_to_u8(self.a),
        ]
    }

    /// Pack as little-endian RGBA8 (`r` in the low byte)
    pub fn to_packed(&self) -> u32 {
        u32::from_le_bytes(self.to_rgba8())
    }

    /// Inverse of [`Color::to_packed`]
    pub fn from_packed(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

fn channel_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn hue_channel(h: f32, m1: f32, m2: f32) -> f32 {
    let h = h.rem_euclid(1.0);
    if h < 1.0 / 6.0 {
        m1 + (m2 - m1) * h * 6.0
    } else if h < 3.0 / 6.0 {
        m2
    } else if h < 4.0 / 6.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
    } else {
        m1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_both_forms() {
        assert_eq!(Color::from_hex(0xFF0000), Color::RED);
        let c = Color::from_hex(0x00FF0080);
        assert_eq!(c.to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn test_premultiplied_scales_rgb_only() {
        let c = Color::new(1.0, 0.5, 0.25, 0.5).premultiplied();
        assert_eq!(c, Color::new(0.5, 0.25, 0.125, 0.5));
    }

    #[test]
    fn test_packed_roundtrip_keeps_bytes() {
        let c = Color::from_rgba8(10, 20, 30, 40);
        assert_eq!(c.to_packed(), 0x281E140A);
        assert_eq!(Color::from_packed(c.to_packed()).to_rgba8(), [10, 20, 30, 40]);
    }

    #[test]
    fn test_hsla_primaries() {
        let red = Color::hsla(0.0, 1.0, 0.5, 1.0);
        assert_eq!(red.to_rgba8(), [255, 0, 0, 255]);
        let green = Color::hsla(1.0 / 3.0, 1.0, 0.5, 1.0);
        assert_eq!(green.to_rgba8(), [0, 255, 0, 255]);
    }

    #[test]
    fn test_lerp_clamps() {
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 2.0), Color::WHITE);
        assert_eq!(Color::BLACK.lerp(Color::WHITE, -1.0), Color::BLACK);
    }
}
