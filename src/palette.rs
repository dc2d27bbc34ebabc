use std::sync::OnceLock;

use crate::model::Rgb;

pub const RED_LEVELS: u32 = 8;
pub const GREEN_LEVELS: u32 = 8;
pub const BLUE_LEVELS: u32 = 4;
pub const PALETTE_LEN: usize = 256;

/// The fixed output palette: 8 red x 8 green x 4 blue levels, each evenly
/// spaced across [0, 255]. Built once, shared read-only across frames.
pub struct Palette {
    rgb: [u8; PALETTE_LEN * 3],
}

impl Palette {
    pub fn global() -> &'static Palette {
        static PALETTE: OnceLock<Palette> = OnceLock::new();
        PALETTE.get_or_init(Palette::build)
    }

    fn build() -> Self {
        let mut rgb = [0u8; PALETTE_LEN * 3];
        for r in 0..RED_LEVELS {
            for g in 0..GREEN_LEVELS {
                for b in 0..BLUE_LEVELS {
                    let idx = ((r * GREEN_LEVELS + g) * BLUE_LEVELS + b) as usize;
                    rgb[idx * 3] = level_value(r, RED_LEVELS);
                    rgb[idx * 3 + 1] = level_value(g, GREEN_LEVELS);
                    rgb[idx * 3 + 2] = level_value(b, BLUE_LEVELS);
                }
            }
        }
        Self { rgb }
    }

    /// Flat RGB triples, in the layout the GIF encoder's global palette wants.
    pub fn rgb_bytes(&self) -> &[u8] {
        &self.rgb
    }

    pub fn color(&self, index: u8) -> Rgb {
        let i = index as usize * 3;
        Rgb::new(self.rgb[i], self.rgb[i + 1], self.rgb[i + 2])
    }

    /// Deterministic nearest-level mapping of an opaque RGB triple.
    pub fn index_for(&self, r: u8, g: u8, b: u8) -> u8 {
        let ri = nearest_level(r, RED_LEVELS);
        let gi = nearest_level(g, GREEN_LEVELS);
        let bi = nearest_level(b, BLUE_LEVELS);
        (((ri * GREEN_LEVELS + gi) * BLUE_LEVELS) + bi) as u8
    }

    /// Largest distance between adjacent levels on any channel (the blue
    /// axis, with only 4 levels, dominates).
    pub fn max_channel_step(&self) -> u8 {
        (255f32 / (BLUE_LEVELS - 1) as f32).ceil() as u8
    }
}

/// The value of level `i` out of `n` evenly spaced levels over [0, 255].
pub fn level_value(i: u32, n: u32) -> u8 {
    ((i * 255 + (n - 1) / 2) / (n - 1)) as u8
}

/// The nearest level index for a channel value.
pub fn nearest_level(c: u8, n: u32) -> u32 {
    (u32::from(c) * (n - 1) + 127) / 255
}
