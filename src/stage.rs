use crate::error::{GifwrightError, GifwrightResult};
use crate::model::{CropConfig, EditConfig, ResizeConfig, RotateConfig};
use crate::pipeline::ProgressStep;

/// A straight-alpha RGBA8 pixel buffer flowing between stages.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> GifwrightResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(GifwrightError::config(format!(
                "frame buffer is {} bytes, {width}x{height} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Per-kept-frame context handed to every stage.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    pub kept_index: usize,
    pub kept_total: usize,
}

/// One pipeline stage. The three feature flows differ only in which stages
/// appear in the ordered list, never in the surrounding loop.
pub trait Stage {
    fn step(&self) -> ProgressStep;
    fn apply(&mut self, frame: FrameBuffer, ctx: &FrameContext) -> GifwrightResult<FrameBuffer>;
}

/// Crop by a percentage rect of the source dimensions.
pub struct CropStage {
    cfg: CropConfig,
}

impl CropStage {
    pub fn new(cfg: CropConfig) -> Self {
        Self { cfg }
    }
}

impl Stage for CropStage {
    fn step(&self) -> ProgressStep {
        ProgressStep::Cropping
    }

    fn apply(&mut self, frame: FrameBuffer, _ctx: &FrameContext) -> GifwrightResult<FrameBuffer> {
        if !self.cfg.enabled {
            return Ok(frame);
        }
        let (x, y, w, h) = resolve_crop_rect(&self.cfg, frame.width, frame.height);
        Ok(crop_rgba(&frame, x, y, w, h))
    }
}

/// Resolve the percentage rect to pixels, clamped so `x+w <= 100 %` and
/// `y+h <= 100 %`, with a 10 % minimum size floor on each axis.
pub fn resolve_crop_rect(cfg: &CropConfig, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let w_pct = cfg.width_pct.clamp(10.0, 100.0);
    let h_pct = cfg.height_pct.clamp(10.0, 100.0);
    let x_pct = cfg.x_pct.clamp(0.0, 100.0 - w_pct);
    let y_pct = cfg.y_pct.clamp(0.0, 100.0 - h_pct);

    let px = |dim: u32, pct: f32| -> u32 { (dim as f32 * pct / 100.0).round() as u32 };
    let x = px(width, x_pct).min(width.saturating_sub(1));
    let y = px(height, y_pct).min(height.saturating_sub(1));
    let w = px(width, w_pct).clamp(1, width - x);
    let h = px(height, h_pct).clamp(1, height - y);
    (x, y, w, h)
}

fn crop_rgba(src: &FrameBuffer, x: u32, y: u32, w: u32, h: u32) -> FrameBuffer {
    let mut out = FrameBuffer::new(w, h);
    let src_stride = src.width as usize * 4;
    let dst_stride = w as usize * 4;
    for row in 0..h as usize {
        let s = (y as usize + row) * src_stride + x as usize * 4;
        let d = row * dst_stride;
        out.data[d..d + dst_stride].copy_from_slice(&src.data[s..s + dst_stride]);
    }
    out
}

/// Quarter-turn rotation; anything else is identity.
pub struct RotateStage {
    degrees: u32,
}

impl RotateStage {
    pub fn new(cfg: RotateConfig) -> Self {
        Self {
            degrees: normalized_degrees(cfg.degrees),
        }
    }
}

fn normalized_degrees(deg: u32) -> u32 {
    match deg {
        90 | 180 | 270 => deg,
        _ => 0,
    }
}

impl Stage for RotateStage {
    fn step(&self) -> ProgressStep {
        ProgressStep::Rotating
    }

    fn apply(&mut self, frame: FrameBuffer, _ctx: &FrameContext) -> GifwrightResult<FrameBuffer> {
        Ok(rotate_rgba(&frame, self.degrees))
    }
}

/// Pure index remap, no resampling. 90/270 swap width and height.
pub fn rotate_rgba(src: &FrameBuffer, degrees: u32) -> FrameBuffer {
    let degrees = normalized_degrees(degrees);
    if degrees == 0 {
        return src.clone();
    }

    let (w, h) = (src.width as usize, src.height as usize);
    let (out_w, out_h) = match degrees {
        90 | 270 => (src.height, src.width),
        _ => (src.width, src.height),
    };
    let mut out = FrameBuffer::new(out_w, out_h);

    for oy in 0..out_h as usize {
        for ox in 0..out_w as usize {
            let (sx, sy) = match degrees {
                90 => (oy, h - 1 - ox),
                180 => (w - 1 - ox, h - 1 - oy),
                _ => (w - 1 - oy, ox), // 270
            };
            let s = (sy * w + sx) * 4;
            let d = (oy * out_w as usize + ox) * 4;
            out.data[d..d + 4].copy_from_slice(&src.data[s..s + 4]);
        }
    }
    out
}

/// Bilinear resize to the max-side-clamped, user-scaled output bounds.
pub struct ResizeStage {
    max_side_px: u32,
    scale_pct: u32,
}

impl ResizeStage {
    pub fn new(max_side_px: u32, cfg: ResizeConfig) -> Self {
        Self {
            max_side_px,
            scale_pct: cfg.scale_pct,
        }
    }
}

impl Stage for ResizeStage {
    fn step(&self) -> ProgressStep {
        ProgressStep::Scaling
    }

    fn apply(&mut self, frame: FrameBuffer, _ctx: &FrameContext) -> GifwrightResult<FrameBuffer> {
        let (out_w, out_h) =
            scaled_dimensions(frame.width, frame.height, self.max_side_px, self.scale_pct);
        if out_w == frame.width && out_h == frame.height {
            return Ok(frame);
        }
        Ok(resize_bilinear(&frame, out_w, out_h))
    }
}

/// Single scale factor for both axes: long edge clamped to `max_side_px`,
/// then multiplied by the user scale. Each output dimension is at least 1 px.
pub fn scaled_dimensions(width: u32, height: u32, max_side_px: u32, scale_pct: u32) -> (u32, u32) {
    let long = width.max(height).max(1);
    let target_long = long.min(max_side_px) as f32 * scale_pct as f32 / 100.0;
    let scale = target_long / long as f32;
    let out_w = ((width as f32 * scale).round() as u32).max(1);
    let out_h = ((height as f32 * scale).round() as u32).max(1);
    (out_w, out_h)
}

/// Bilinear interpolation per RGBA channel. Alpha participates in the same
/// blend as the color channels (straight alpha, not premultiplied).
pub fn resize_bilinear(src: &FrameBuffer, out_w: u32, out_h: u32) -> FrameBuffer {
    let mut out = FrameBuffer::new(out_w, out_h);
    let (w, h) = (src.width as usize, src.height as usize);
    let sx = src.width as f32 / out_w as f32;
    let sy = src.height as f32 / out_h as f32;

    for oy in 0..out_h as usize {
        let fy = oy as f32 * sy;
        let y0 = (fy as usize).min(h - 1);
        let y1 = (y0 + 1).min(h - 1);
        let dy = fy - y0 as f32;

        for ox in 0..out_w as usize {
            let fx = ox as f32 * sx;
            let x0 = (fx as usize).min(w - 1);
            let x1 = (x0 + 1).min(w - 1);
            let dx = fx - x0 as f32;

            let p00 = (y0 * w + x0) * 4;
            let p10 = (y0 * w + x1) * 4;
            let p01 = (y1 * w + x0) * 4;
            let p11 = (y1 * w + x1) * 4;
            let d = (oy * out_w as usize + ox) * 4;

            for c in 0..4 {
                let top = src.data[p00 + c] as f32 * (1.0 - dx) + src.data[p10 + c] as f32 * dx;
                let bot = src.data[p01 + c] as f32 * (1.0 - dx) + src.data[p11 + c] as f32 * dx;
                out.data[d + c] = (top * (1.0 - dy) + bot * dy).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Output dimensions for a config applied to a source of the given size,
/// following the fixed crop → rotate → resize order. Deterministic, so the
/// encoder and the text rasterizer can be sized before the first frame.
pub fn output_dimensions(cfg: &EditConfig, src_w: u32, src_h: u32) -> (u32, u32) {
    let (mut w, mut h) = (src_w, src_h);
    if cfg.crop.enabled {
        let (_, _, cw, ch) = resolve_crop_rect(&cfg.crop, w, h);
        (w, h) = (cw, ch);
    }
    if matches!(normalized_degrees(cfg.rotate.degrees), 90 | 270) {
        (w, h) = (h, w);
    }
    scaled_dimensions(w, h, cfg.max_side_px, cfg.resize.scale_pct)
}
