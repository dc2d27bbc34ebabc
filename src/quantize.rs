use crate::palette::{self, BLUE_LEVELS, GREEN_LEVELS, Palette, RED_LEVELS};
use crate::stage::FrameBuffer;

/// Grid sample budget for the binary-image heuristic.
const HEURISTIC_SAMPLES: usize = 2000;
const LUMA_BLACK_MAX: u32 = 30;
const LUMA_WHITE_MIN: u32 = 225;

/// Maps RGBA frames to fixed-palette indices, optionally with
/// Floyd–Steinberg error diffusion. Owns its scratch buffers so the
/// per-frame hot path allocates nothing.
pub struct Quantizer {
    palette: &'static Palette,
    indices: Vec<u8>,
    err_curr: Vec<[i32; 3]>,
    err_next: Vec<[i32; 3]>,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Quantizer {
    pub fn new() -> Self {
        Self {
            palette: Palette::global(),
            indices: Vec::new(),
            err_curr: Vec::new(),
            err_next: Vec::new(),
        }
    }

    pub fn palette(&self) -> &'static Palette {
        self.palette
    }

    /// Quantize one frame. Dithering is applied only when requested *and*
    /// the frame does not look like flat two-tone art.
    pub fn quantize(&mut self, frame: &FrameBuffer, dither: bool) -> &[u8] {
        let n = frame.width as usize * frame.height as usize;
        self.indices.clear();
        self.indices.resize(n, 0);

        if dither && !is_binary_image(frame) {
            self.quantize_dithered(frame);
        } else {
            self.quantize_plain(frame);
        }
        &self.indices
    }

    fn quantize_plain(&mut self, frame: &FrameBuffer) {
        for (i, px) in frame.data.chunks_exact(4).enumerate() {
            let (r, g, b) = flatten_on_white(px[0], px[1], px[2], px[3]);
            self.indices[i] = self.palette.index_for(r, g, b);
        }
    }

    fn quantize_dithered(&mut self, frame: &FrameBuffer) {
        let w = frame.width as usize;
        // width + 2 so the x-1/x+1 taps never need bounds checks
        self.err_curr.clear();
        self.err_curr.resize(w + 2, [0; 3]);
        self.err_next.clear();
        self.err_next.resize(w + 2, [0; 3]);

        for y in 0..frame.height as usize {
            for x in 0..w {
                let p = (y * w + x) * 4;
                let (r, g, b) =
                    flatten_on_white(frame.data[p], frame.data[p + 1], frame.data[p + 2], frame.data[p + 3]);
                let carried = self.err_curr[x + 1];
                let actual = [
                    (i32::from(r) + carried[0]).clamp(0, 255),
                    (i32::from(g) + carried[1]).clamp(0, 255),
                    (i32::from(b) + carried[2]).clamp(0, 255),
                ];

                let levels = [RED_LEVELS, GREEN_LEVELS, BLUE_LEVELS];
                let mut level_idx = [0u32; 3];
                let mut err = [0i32; 3];
                for c in 0..3 {
                    let li = palette::nearest_level(actual[c] as u8, levels[c]);
                    level_idx[c] = li;
                    err[c] = actual[c] - i32::from(palette::level_value(li, levels[c]));
                }
                self.indices[y * w + x] =
                    (((level_idx[0] * GREEN_LEVELS + level_idx[1]) * BLUE_LEVELS) + level_idx[2])
                        as u8;

                for c in 0..3 {
                    let e = err[c];
                    self.err_curr[x + 2][c] += e * 7 / 16;
                    self.err_next[x][c] += e * 3 / 16;
                    self.err_next[x + 1][c] += e * 5 / 16;
                    self.err_next[x + 2][c] += e / 16;
                }
            }

            std::mem::swap(&mut self.err_curr, &mut self.err_next);
            self.err_next.fill([0; 3]);
        }
    }
}

/// Alpha-composite a straight-alpha pixel onto white; the palette has no
/// alpha channel.
pub fn flatten_on_white(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8) {
    if a == 255 {
        return (r, g, b);
    }
    let a = u32::from(a);
    let inv = 255 - a;
    let mix = |c: u8| -> u8 { ((u32::from(c) * a + 255 * inv) / 255) as u8 };
    (mix(r), mix(g), mix(b))
}

/// Cheap bi-level detector: sample a sparse grid and classify each point as
/// black, white, or midtone by luma. Flat two-tone frames skip dithering.
pub fn is_binary_image(frame: &FrameBuffer) -> bool {
    let total = frame.width as usize * frame.height as usize;
    if total == 0 {
        return false;
    }
    let stride = (total / HEURISTIC_SAMPLES).max(1);

    let mut samples = 0usize;
    let mut black = 0usize;
    let mut white = 0usize;
    let mut mid = 0usize;
    let mut i = 0usize;
    while i < total {
        let p = i * 4;
        let (r, g, b) = flatten_on_white(
            frame.data[p],
            frame.data[p + 1],
            frame.data[p + 2],
            frame.data[p + 3],
        );
        let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
        if luma <= LUMA_BLACK_MAX {
            black += 1;
        } else if luma >= LUMA_WHITE_MIN {
            white += 1;
        } else {
            mid += 1;
        }
        samples += 1;
        i += stride;
    }

    (black + white) * 100 >= samples * 92 && mid * 100 <= samples * 8
}
