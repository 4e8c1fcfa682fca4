/// Screen projection and position-based coloring

use serde::{Deserialize, Serialize, Serializer};

/// Fixed rectangle the trajectory is drawn into, in pixels.
/// `scale * x_gain` and `scale * y_gain` convert simulation units to pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub x_gain: f64,
    pub y_gain: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 200.0,
            height: 150.0,
            scale: 0.2,
            x_gain: 25.0,
            y_gain: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl Viewport {
    pub fn center(&self) -> ScreenPos {
        ScreenPos {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }

    /// Map simulation (x, y) to clamped viewport pixels.
    pub fn project(&self, x: f64, y: f64) -> ScreenPos {
        let c = self.center();
        let screen_x = c.x + x * self.scale * self.x_gain;
        let screen_y = c.y + y * self.scale * self.y_gain;
        ScreenPos {
            x: clamp_axis(screen_x, self.width),
            y: clamp_axis(screen_y, self.height),
        }
    }
}

// NaN saturates to the low edge
fn clamp_axis(v: f64, extent: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, extent)
    }
}

/// 8-bit RGB color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    pub fn to_f32(self) -> [f32; 3] {
        [self.0 as f32 / 255.0, self.1 as f32 / 255.0, self.2 as f32 / 255.0]
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Red → violet
pub const SPECTRUM: [Rgb; 7] = [
    Rgb(0xFF, 0x00, 0x00),
    Rgb(0xFF, 0x7F, 0x00),
    Rgb(0xFF, 0xFF, 0x00),
    Rgb(0x00, 0xFF, 0x00),
    Rgb(0x00, 0x00, 0xFF),
    Rgb(0x4B, 0x00, 0x82),
    Rgb(0x94, 0x00, 0xD3),
];

/// Glow drawn around the live point: the point color at 0x80 alpha.
pub const GLOW_ALPHA: f64 = 128.0 / 255.0;
pub const GLOW_RADIUS: f64 = 20.0;

/// Spectrum slot for a horizontal screen position in [0, width].
/// Inputs outside that range (or a degenerate width) still land in 0..=6.
pub fn color_index(screen_x: f64, width: f64) -> usize {
    let last = (SPECTRUM.len() - 1) as f64;
    let raw = ((screen_x / width) * last).floor();
    // `as` saturates and maps NaN to 0
    raw.clamp(0.0, last) as usize
}

pub fn spectrum_color(screen_x: f64, width: f64) -> Rgb {
    SPECTRUM[color_index(screen_x, width)]
}
