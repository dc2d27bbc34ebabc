use crate::blend;
use crate::error::GifwrightResult;
use crate::model::{TextAnimation, TextAnimationKind, TextStyle};
use crate::pipeline::ProgressStep;
use crate::stage::{FrameBuffer, FrameContext, Stage};

pub const MAX_LINES: usize = 10;

/// Glyph rasterization surface. The pipeline itself never talks to a
/// drawing API; it hands a style and frame context to this capability and
/// composites the returned premultiplied RGBA layer.
pub trait TextRasterizer {
    fn rasterize(
        &mut self,
        style: &TextStyle,
        out_w: u32,
        out_h: u32,
        ctx: &FrameContext,
    ) -> GifwrightResult<Vec<u8>>;
}

/// Overlay stage: rasterize the styled block for this kept frame and
/// composite it over the frame buffer in place.
pub struct TextStage {
    style: TextStyle,
    rasterizer: Box<dyn TextRasterizer>,
}

impl TextStage {
    pub fn new(style: TextStyle, rasterizer: Box<dyn TextRasterizer>) -> Self {
        Self { style, rasterizer }
    }
}

impl Stage for TextStage {
    fn step(&self) -> ProgressStep {
        ProgressStep::Text
    }

    fn apply(&mut self, mut frame: FrameBuffer, ctx: &FrameContext) -> GifwrightResult<FrameBuffer> {
        let layer = self
            .rasterizer
            .rasterize(&self.style, frame.width, frame.height, ctx)?;
        blend::over_in_place(&mut frame.data, &layer, 1.0)?;
        Ok(frame)
    }
}

/// Content split into displayable lines: emoji filtered, trailing space
/// trimmed, capped at [`MAX_LINES`]. Empty when nothing printable remains.
pub fn resolved_lines(content: &str) -> Vec<String> {
    let lines: Vec<String> = content
        .replace('\r', "")
        .split('\n')
        .map(|line| strip_emoji(line).trim_end().to_string())
        .collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Vec::new();
    }
    lines.into_iter().take(MAX_LINES).collect()
}

pub fn strip_emoji(input: &str) -> String {
    input.chars().filter(|&c| !is_emoji_char(c)).collect()
}

fn is_emoji_char(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF   // pictographs, symbols, flags
            | 0x2600..=0x27BF // misc symbols + dingbats
            | 0x2B00..=0x2BFF
            | 0xFE00..=0xFE0F // variation selectors
            | 0x200D          // zero-width joiner
            | 0x20E3          // combining keycap
    )
}

/// Base font size: proportional to the output's short edge, scaled by the
/// size mode and the user's clamped percentage.
pub fn font_px(style: &TextStyle, out_w: u32, out_h: u32) -> f32 {
    let base = out_w.min(out_h) as f32;
    let mode = match style.size_mode {
        crate::model::SizeMode::Small => 0.07,
        crate::model::SizeMode::Medium => 0.10,
        crate::model::SizeMode::Large => 0.15,
    };
    (base * mode * style.clamped_scale_pct() as f32 / 100.0).max(4.0)
}

/// Per-kept-frame animation parameters. Identity when no animation is set.
#[derive(Clone, Copy, Debug)]
pub struct AnimationState {
    pub alpha_mul: f32,
    pub dx: f32,
    pub dy: f32,
    pub scale: f32,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            alpha_mul: 1.0,
            dx: 0.0,
            dy: 0.0,
            scale: 1.0,
        }
    }
}

/// Phase of the animation cycle for one kept frame: fraction of the output
/// animation elapsed, times speed, wrapped into [0, 1).
pub fn animation_phase(ctx: &FrameContext, speed: f32) -> f32 {
    if ctx.kept_total == 0 {
        return 0.0;
    }
    (ctx.kept_index as f32 / ctx.kept_total as f32 * speed).fract()
}

pub fn animation_state(
    animation: Option<&TextAnimation>,
    ctx: &FrameContext,
    font_px: f32,
) -> AnimationState {
    let Some(anim) = animation else {
        return AnimationState::default();
    };
    let phase = animation_phase(ctx, anim.speed);
    let wave = (phase * std::f32::consts::TAU).sin();

    let mut state = AnimationState::default();
    match anim.kind {
        TextAnimationKind::Fade => state.alpha_mul = 0.55 + 0.45 * wave,
        TextAnimationKind::Slide => state.dx = 0.6 * font_px * wave,
        TextAnimationKind::Bounce => state.dy = -0.5 * font_px * wave.abs(),
        TextAnimationKind::Pulse => state.scale = 1.0 + 0.15 * wave,
    }
    state
}

/// Clamp the block center so the block rect keeps a small margin from the
/// frame edges; a block wider/taller than the frame is centered instead.
pub fn clamp_block_center(
    cx: f32,
    cy: f32,
    block_w: f32,
    block_h: f32,
    out_w: u32,
    out_h: u32,
) -> (f32, f32) {
    let margin = (0.02 * out_w.min(out_h) as f32).max(2.0);
    let clamp_axis = |c: f32, block: f32, dim: f32| -> f32 {
        let lo = margin + block / 2.0;
        let hi = dim - margin - block / 2.0;
        if lo > hi { dim / 2.0 } else { c.clamp(lo, hi) }
    };
    (
        clamp_axis(cx, block_w, out_w as f32),
        clamp_axis(cy, block_h, out_h as f32),
    )
}

/// Shadow offset from polar parameters; the angle is a percentage of a full
/// turn.
pub fn shadow_offset(distance: f32, angle_pct: f32) -> (f32, f32) {
    let angle = angle_pct / 100.0 * std::f32::consts::TAU;
    (distance * angle.cos(), distance * angle.sin())
}
