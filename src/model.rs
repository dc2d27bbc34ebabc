use std::collections::BTreeSet;

use crate::error::{GifwrightError, GifwrightResult};

/// One edit run's worth of user configuration.
///
/// Every field except `max_side_px` has a neutral default, so callers can
/// start from [`EditConfig::new`] and override only what the user touched.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EditConfig {
    /// Upper bound on the output's long edge, in pixels.
    pub max_side_px: u32,
    /// Keep every Nth candidate frame (1 = keep all).
    #[serde(default = "default_frame_step")]
    pub frame_step: usize,
    /// Apply Floyd–Steinberg error diffusion during quantization.
    #[serde(default = "default_true")]
    pub dither: bool,
    #[serde(default)]
    pub crop: CropConfig,
    #[serde(default)]
    pub rotate: RotateConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub trim: TrimConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextStyle>,
}

fn default_frame_step() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CropConfig {
    pub enabled: bool,
    /// Rect given as percentages of the source dimensions.
    pub x_pct: f32,
    pub y_pct: f32,
    pub width_pct: f32,
    pub height_pct: f32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            x_pct: 0.0,
            y_pct: 0.0,
            width_pct: 100.0,
            height_pct: 100.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct RotateConfig {
    /// Quarter-turn rotations only; any other value is treated as 0.
    pub degrees: u32,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResizeConfig {
    /// Output scale in percent, applied after the max-side clamp.
    pub scale_pct: u32,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self { scale_pct: 100 }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrimConfig {
    pub start_frame: usize,
    /// Inclusive; clamped to the last source frame at plan time.
    pub end_frame: usize,
    #[serde(default)]
    pub deleted_frames: BTreeSet<usize>,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            start_frame: 0,
            end_frame: usize::MAX,
            deleted_frames: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Styled, optionally animated text overlay.
///
/// Opacity fields use the inverted convention established by the product:
/// `opacity_pct = 0` is fully opaque and `100` is fully transparent.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    /// Multi-line content; emoji are filtered out before layout.
    pub content: String,
    /// Anchor of the text block *center*, as percentages of the output frame.
    pub anchor_x_pct: f32,
    pub anchor_y_pct: f32,
    #[serde(default)]
    pub size_mode: SizeMode,
    /// User scale on top of the size mode, clamped to [50, 300] percent.
    #[serde(default = "default_scale_pct")]
    pub scale_pct: u32,
    pub fill: FillStyle,
    #[serde(default)]
    pub stroke: StrokeStyle,
    #[serde(default)]
    pub shadow: ShadowStyle,
    #[serde(default)]
    pub background: BackgroundStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<TextAnimation>,
}

fn default_scale_pct() -> u32 {
    100
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct FillStyle {
    pub color: Rgb,
    /// Inverted: 0 = opaque, 100 = transparent.
    #[serde(default)]
    pub opacity_pct: f32,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct StrokeStyle {
    pub enabled: bool,
    pub color: Rgb,
    /// Stroke width as a percentage of the font size.
    pub width_pct: f32,
    #[serde(default)]
    pub opacity_pct: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Rgb::new(0, 0, 0),
            width_pct: 8.0,
            opacity_pct: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShadowStyle {
    pub enabled: bool,
    pub color: Rgb,
    /// Gaussian blur radius in pixels.
    pub blur: u32,
    /// Offset distance in pixels.
    pub distance: f32,
    /// Offset direction as a percentage of a full turn.
    pub angle_pct: f32,
    #[serde(default)]
    pub opacity_pct: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Rgb::new(0, 0, 0),
            blur: 4,
            distance: 3.0,
            angle_pct: 12.5,
            opacity_pct: 40.0,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct BackgroundStyle {
    pub enabled: bool,
    pub color: Rgb,
    #[serde(default)]
    pub opacity_pct: f32,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Rgb::new(0, 0, 0),
            opacity_pct: 50.0,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextAnimation {
    pub kind: TextAnimationKind,
    /// Cycles over the whole output animation.
    pub speed: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnimationKind {
    Fade,
    Slide,
    Bounce,
    Pulse,
}

impl EditConfig {
    pub fn new(max_side_px: u32) -> Self {
        Self {
            max_side_px,
            frame_step: 1,
            dither: true,
            crop: CropConfig::default(),
            rotate: RotateConfig::default(),
            resize: ResizeConfig::default(),
            trim: TrimConfig::default(),
            text: None,
        }
    }

    pub fn validate(&self) -> GifwrightResult<()> {
        if self.max_side_px == 0 {
            return Err(GifwrightError::config("max_side_px must be > 0"));
        }
        if self.frame_step == 0 {
            return Err(GifwrightError::config("frame_step must be >= 1"));
        }
        if self.resize.scale_pct < 25 || self.resize.scale_pct > 100 {
            return Err(GifwrightError::config(format!(
                "resize scale_pct {} outside [25, 100]",
                self.resize.scale_pct
            )));
        }
        if self.trim.start_frame > self.trim.end_frame {
            return Err(GifwrightError::config(
                "trim start_frame must not exceed end_frame",
            ));
        }
        if self.crop.enabled {
            let c = &self.crop;
            for (name, v) in [
                ("x_pct", c.x_pct),
                ("y_pct", c.y_pct),
                ("width_pct", c.width_pct),
                ("height_pct", c.height_pct),
            ] {
                if !v.is_finite() || v < 0.0 || v > 100.0 {
                    return Err(GifwrightError::config(format!(
                        "crop {name} {v} outside [0, 100]"
                    )));
                }
            }
        }
        if let Some(text) = &self.text {
            text.validate()?;
        }
        Ok(())
    }
}

impl TextStyle {
    pub fn validate(&self) -> GifwrightResult<()> {
        for (name, v) in [
            ("anchor_x_pct", self.anchor_x_pct),
            ("anchor_y_pct", self.anchor_y_pct),
        ] {
            if !v.is_finite() || v < 0.0 || v > 100.0 {
                return Err(GifwrightError::config(format!(
                    "text {name} {v} outside [0, 100]"
                )));
            }
        }
        if let Some(anim) = &self.animation
            && (!anim.speed.is_finite() || anim.speed <= 0.0)
        {
            return Err(GifwrightError::config("text animation speed must be > 0"));
        }
        Ok(())
    }

    /// Effective user scale, clamped to the supported [50, 300] range.
    pub fn clamped_scale_pct(&self) -> u32 {
        self.scale_pct.clamp(50, 300)
    }
}

/// Inverted-opacity to alpha: 0 % is fully opaque, 100 % fully transparent.
pub fn alpha_from_opacity_pct(opacity_pct: f32) -> f32 {
    (1.0 - opacity_pct.clamp(0.0, 100.0) / 100.0).clamp(0.0, 1.0)
}
