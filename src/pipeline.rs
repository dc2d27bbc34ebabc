use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compositor::Compositor;
use crate::encode::{EncodeConfig, EncodeSummary, GifSink};
use crate::error::{GifwrightError, GifwrightResult};
use crate::model::EditConfig;
use crate::palette::Palette;
use crate::plan::OutputPlan;
use crate::quantize::Quantizer;
use crate::source::{LoopCount, SourceGif};
use crate::stage::{
    CropStage, FrameBuffer, FrameContext, ResizeStage, RotateStage, Stage, output_dimensions,
    resize_bilinear,
};
use crate::text::{self, TextRasterizer, TextStage};

/// Yield to the host scheduler this often, in source frames.
const YIELD_EVERY: usize = 5;

/// Where in the run a progress event was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStep {
    Reading,
    Decoding,
    Cropping,
    Rotating,
    Scaling,
    Text,
    Quantizing,
    Encoding,
    Writing,
}

impl ProgressStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStep::Reading => "reading",
            ProgressStep::Decoding => "decoding",
            ProgressStep::Cropping => "cropping",
            ProgressStep::Rotating => "rotating",
            ProgressStep::Scaling => "scaling",
            ProgressStep::Text => "text",
            ProgressStep::Quantizing => "quantizing",
            ProgressStep::Encoding => "encoding",
            ProgressStep::Writing => "writing",
        }
    }
}

/// Discrete progress marker. Percentages are the caller's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub step: ProgressStep,
    pub index: usize,
    pub total: usize,
}

/// Consumer of progress events, decoupled from any UI mechanism.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Shared cancellation flag, checked once per source frame. A cancelled run
/// aborts before anything reaches disk.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn check(&self) -> GifwrightResult<()> {
        if self.is_cancelled() {
            Err(GifwrightError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Edit an existing GIF: decode, replay frames through the compositor, run
/// the kept frames through the stage list, quantize, re-encode.
#[tracing::instrument(skip_all, fields(input = %input.display(), out = %out_path.display()))]
pub fn run_edit(
    input: &Path,
    out_path: &Path,
    cfg: &EditConfig,
    rasterizer: Option<Box<dyn TextRasterizer>>,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> GifwrightResult<EncodeSummary> {
    cfg.validate()?;

    progress.emit(ProgressEvent {
        step: ProgressStep::Reading,
        index: 0,
        total: 1,
    });
    let bytes = std::fs::read(input)
        .map_err(|e| GifwrightError::input(format!("cannot read '{}': {e}", input.display())))?;
    let src = SourceGif::decode(&bytes)?;
    tracing::debug!(
        frames = src.frame_count(),
        width = src.width,
        height = src.height,
        "decoded source"
    );

    let delays: Vec<u16> = src.frames.iter().map(|f| f.delay_cs).collect();
    let plan = OutputPlan::plan(&cfg.trim, cfg.frame_step, &delays)?;
    let (out_w, out_h) = output_dimensions(cfg, src.width, src.height);

    let mut stages = build_stages(cfg, rasterizer)?;
    let mut sink = GifSink::new(
        EncodeConfig {
            width: out_w,
            height: out_h,
            kept_frames: plan.kept_count(),
            loop_count: src.loop_count,
            out_path: out_path.to_path_buf(),
        },
        Palette::global(),
    )?;
    let mut compositor = Compositor::new(src.width, src.height);
    let mut quantizer = Quantizer::new();

    let total = src.frame_count();
    let kept_total = plan.kept_count();
    let entries = plan.entries();
    let mut cursor = 0usize;

    for (i, frame) in src.frames.iter().enumerate() {
        cancel.check()?;
        progress.emit(ProgressEvent {
            step: ProgressStep::Decoding,
            index: i,
            total,
        });

        compositor.begin_frame(frame);
        compositor.blit(frame)?;

        if cursor < entries.len() && entries[cursor].source_index == i {
            let ctx = FrameContext {
                kept_index: cursor,
                kept_total,
            };
            let mut buf =
                FrameBuffer::from_rgba(src.width, src.height, compositor.pixels().to_vec())?;
            for stage in &mut stages {
                progress.emit(ProgressEvent {
                    step: stage.step(),
                    index: cursor,
                    total: kept_total,
                });
                buf = stage.apply(buf, &ctx)?;
            }

            progress.emit(ProgressEvent {
                step: ProgressStep::Quantizing,
                index: cursor,
                total: kept_total,
            });
            let indices = quantizer.quantize(&buf, cfg.dither);

            progress.emit(ProgressEvent {
                step: ProgressStep::Encoding,
                index: cursor,
                total: kept_total,
            });
            sink.add_frame(indices, entries[cursor].delay_cs)?;
            cursor += 1;
        }

        compositor.finish_frame(frame);
        if (i + 1).is_multiple_of(YIELD_EVERY) {
            std::thread::yield_now();
        }
    }

    progress.emit(ProgressEvent {
        step: ProgressStep::Writing,
        index: 0,
        total: 1,
    });
    let summary = sink.finish()?;
    tracing::debug!(
        frames = summary.frames,
        bytes = summary.size_bytes,
        fps = summary.fps,
        "wrote output"
    );
    Ok(summary)
}

/// Compose still images into a GIF with a uniform delay. Inputs that differ
/// from the first image's dimensions are normalized to it before entering
/// the shared stage list.
#[tracing::instrument(skip_all, fields(inputs = inputs.len(), out = %out_path.display()))]
pub fn compose_images(
    inputs: &[PathBuf],
    delay_cs: u16,
    out_path: &Path,
    cfg: &EditConfig,
    rasterizer: Option<Box<dyn TextRasterizer>>,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> GifwrightResult<EncodeSummary> {
    cfg.validate()?;
    if inputs.is_empty() {
        return Err(GifwrightError::config("compose needs at least one image"));
    }

    let mut frames: Vec<FrameBuffer> = Vec::with_capacity(inputs.len());
    for (i, path) in inputs.iter().enumerate() {
        cancel.check()?;
        progress.emit(ProgressEvent {
            step: ProgressStep::Reading,
            index: i,
            total: inputs.len(),
        });
        let bytes = std::fs::read(path)
            .map_err(|e| GifwrightError::input(format!("cannot read '{}': {e}", path.display())))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| GifwrightError::format(format!("cannot decode '{}': {e}", path.display())))?
            .to_rgba8();
        let (w, h) = decoded.dimensions();
        let buf = FrameBuffer::from_rgba(w, h, decoded.into_raw())?;
        let normalized = match frames.first() {
            Some(first) if (first.width, first.height) != (buf.width, buf.height) => {
                resize_bilinear(&buf, first.width, first.height)
            }
            _ => buf,
        };
        frames.push(normalized);
    }

    let delays = vec![delay_cs; frames.len()];
    let plan = OutputPlan::plan(&cfg.trim, cfg.frame_step, &delays)?;
    let (src_w, src_h) = (frames[0].width, frames[0].height);
    let (out_w, out_h) = output_dimensions(cfg, src_w, src_h);

    let mut stages = build_stages(cfg, rasterizer)?;
    let mut sink = GifSink::new(
        EncodeConfig {
            width: out_w,
            height: out_h,
            kept_frames: plan.kept_count(),
            loop_count: LoopCount::Infinite,
            out_path: out_path.to_path_buf(),
        },
        Palette::global(),
    )?;
    let mut quantizer = Quantizer::new();

    let kept_total = plan.kept_count();
    for (kept_index, entry) in plan.entries().iter().enumerate() {
        cancel.check()?;
        let ctx = FrameContext {
            kept_index,
            kept_total,
        };
        let mut buf = frames[entry.source_index].clone();
        for stage in &mut stages {
            progress.emit(ProgressEvent {
                step: stage.step(),
                index: kept_index,
                total: kept_total,
            });
            buf = stage.apply(buf, &ctx)?;
        }

        progress.emit(ProgressEvent {
            step: ProgressStep::Quantizing,
            index: kept_index,
            total: kept_total,
        });
        let indices = quantizer.quantize(&buf, cfg.dither);

        progress.emit(ProgressEvent {
            step: ProgressStep::Encoding,
            index: kept_index,
            total: kept_total,
        });
        sink.add_frame(indices, entry.delay_cs)?;

        if (kept_index + 1).is_multiple_of(YIELD_EVERY) {
            std::thread::yield_now();
        }
    }

    progress.emit(ProgressEvent {
        step: ProgressStep::Writing,
        index: 0,
        total: 1,
    });
    sink.finish()
}

/// The ordered stage list shared by every flow: crop, rotate, resize, then
/// the optional text overlay.
fn build_stages(
    cfg: &EditConfig,
    rasterizer: Option<Box<dyn TextRasterizer>>,
) -> GifwrightResult<Vec<Box<dyn Stage>>> {
    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CropStage::new(cfg.crop.clone())),
        Box::new(RotateStage::new(cfg.rotate)),
        Box::new(ResizeStage::new(cfg.max_side_px, cfg.resize)),
    ];

    if let Some(style) = &cfg.text
        && !text::resolved_lines(&style.content).is_empty()
    {
        let Some(rasterizer) = rasterizer else {
            return Err(GifwrightError::surface(
                "text overlay configured but no text rasterizer is available",
            ));
        };
        stages.push(Box::new(TextStage::new(style.clone(), rasterizer)));
    }

    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(GifwrightError::Cancelled)));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn progress_steps_have_stable_names() {
        assert_eq!(ProgressStep::Reading.as_str(), "reading");
        assert_eq!(ProgressStep::Quantizing.as_str(), "quantizing");
        assert_eq!(ProgressStep::Writing.as_str(), "writing");
    }

    #[test]
    fn text_without_rasterizer_is_a_surface_error() {
        let mut cfg = EditConfig::new(100);
        cfg.text = Some(crate::model::TextStyle {
            content: "hi".to_string(),
            anchor_x_pct: 50.0,
            anchor_y_pct: 50.0,
            size_mode: Default::default(),
            scale_pct: 100,
            fill: crate::model::FillStyle {
                color: crate::model::Rgb::new(255, 255, 255),
                opacity_pct: 0.0,
            },
            stroke: Default::default(),
            shadow: Default::default(),
            background: Default::default(),
            animation: None,
        });
        assert!(matches!(
            build_stages(&cfg, None),
            Err(GifwrightError::Surface(_))
        ));
    }

    #[test]
    fn emoji_only_text_does_not_require_a_rasterizer() {
        let mut cfg = EditConfig::new(100);
        cfg.text = Some(crate::model::TextStyle {
            content: "\u{1F600}".to_string(),
            anchor_x_pct: 50.0,
            anchor_y_pct: 50.0,
            size_mode: Default::default(),
            scale_pct: 100,
            fill: crate::model::FillStyle {
                color: crate::model::Rgb::new(255, 255, 255),
                opacity_pct: 0.0,
            },
            stroke: Default::default(),
            shadow: Default::default(),
            background: Default::default(),
            animation: None,
        });
        let stages = build_stages(&cfg, None).unwrap();
        assert_eq!(stages.len(), 3);
    }
}
