use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{GifwrightError, GifwrightResult};
use crate::palette::Palette;
use crate::source::LoopCount;

/// Hard ceiling on the preallocated output buffer.
const MAX_PREALLOC_BYTES: usize = 60 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub kept_frames: usize,
    pub loop_count: LoopCount,
    pub out_path: PathBuf,
}

impl EncodeConfig {
    pub fn validate(&self) -> GifwrightResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GifwrightError::config("encode width/height must be non-zero"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(GifwrightError::config(
                "encode width/height must fit the GIF u16 screen size",
            ));
        }
        if self.kept_frames == 0 {
            return Err(GifwrightError::config("encode needs at least one frame"));
        }
        Ok(())
    }
}

/// What a finished run reports back to the caller.
#[derive(Clone, Debug)]
pub struct EncodeSummary {
    pub out_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frames: usize,
    pub size_bytes: usize,
    pub duration_cs: u32,
    pub fps: f32,
}

/// Accumulates indexed frames into an in-memory GIF stream; the destination
/// file is written only after the trailer is in place, so a failed run never
/// leaves a partial file behind.
pub struct GifSink {
    cfg: EncodeConfig,
    encoder: gif::Encoder<Vec<u8>>,
    frames_written: usize,
    duration_cs: u32,
}

impl GifSink {
    pub fn new(cfg: EncodeConfig, palette: &Palette) -> GifwrightResult<Self> {
        cfg.validate()?;

        let buf = Vec::with_capacity(prealloc_bytes(cfg.width, cfg.height, cfg.kept_frames));
        let mut encoder =
            gif::Encoder::new(buf, cfg.width as u16, cfg.height as u16, palette.rgb_bytes())
                .map_err(|e| GifwrightError::encode(format!("cannot start GIF stream: {e}")))?;

        let repeat = match cfg.loop_count {
            LoopCount::Infinite => gif::Repeat::Infinite,
            LoopCount::Finite(n) => gif::Repeat::Finite(n),
        };
        encoder
            .set_repeat(repeat)
            .map_err(|e| GifwrightError::encode(format!("cannot write loop extension: {e}")))?;

        Ok(Self {
            cfg,
            encoder,
            frames_written: 0,
            duration_cs: 0,
        })
    }

    /// Append one full-rect indexed frame. Output frames are always
    /// self-contained, so disposal is fixed to keep.
    pub fn add_frame(&mut self, indices: &[u8], delay_cs: u32) -> GifwrightResult<()> {
        let expected = self.cfg.width as usize * self.cfg.height as usize;
        if indices.len() != expected {
            return Err(GifwrightError::encode(format!(
                "frame has {} indices, {}x{} needs {expected}",
                indices.len(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let delay = delay_cs.min(u32::from(u16::MAX)) as u16;
        let mut frame = gif::Frame::default();
        frame.width = self.cfg.width as u16;
        frame.height = self.cfg.height as u16;
        frame.delay = delay;
        frame.dispose = gif::DisposalMethod::Keep;
        frame.buffer = Cow::Borrowed(indices);

        self.encoder
            .write_frame(&frame)
            .map_err(|e| GifwrightError::encode(format!("cannot write frame: {e}")))?;

        self.frames_written += 1;
        self.duration_cs += u32::from(delay);
        Ok(())
    }

    /// Finalize the stream and persist exactly the produced bytes.
    pub fn finish(self) -> GifwrightResult<EncodeSummary> {
        if self.frames_written == 0 {
            return Err(GifwrightError::encode("no frames were written"));
        }

        let bytes = self
            .encoder
            .into_inner()
            .map_err(|e| GifwrightError::encode(format!("cannot finalize GIF stream: {e}")))?;

        ensure_parent_dir(&self.cfg.out_path)?;
        std::fs::write(&self.cfg.out_path, &bytes).map_err(|e| {
            GifwrightError::input(format!(
                "cannot write '{}': {e}",
                self.cfg.out_path.display()
            ))
        })?;

        let duration_cs = self.duration_cs.max(1);
        Ok(EncodeSummary {
            out_path: self.cfg.out_path,
            width: self.cfg.width,
            height: self.cfg.height,
            frames: self.frames_written,
            size_bytes: bytes.len(),
            duration_cs,
            fps: self.frames_written as f32 * 100.0 / duration_cs as f32,
        })
    }
}

fn prealloc_bytes(width: u32, height: u32, frames: usize) -> usize {
    let per_run = (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(frames);
    (1024 * 1024 + per_run).min(MAX_PREALLOC_BYTES)
}

pub fn ensure_parent_dir(path: &Path) -> GifwrightResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_out(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gifwright_{}_{name}.gif", std::process::id()))
    }

    fn cfg(width: u32, height: u32, frames: usize, name: &str) -> EncodeConfig {
        EncodeConfig {
            width,
            height,
            kept_frames: frames,
            loop_count: LoopCount::Infinite,
            out_path: temp_out(name),
        }
    }

    #[test]
    fn config_validation_catches_bad_values() {
        assert!(cfg(0, 10, 1, "v0").validate().is_err());
        assert!(cfg(10, 10, 0, "v1").validate().is_err());
        assert!(cfg(70_000, 10, 1, "v2").validate().is_err());
        assert!(cfg(10, 10, 1, "v3").validate().is_ok());
    }

    #[test]
    fn wrong_index_count_is_rejected() {
        let mut sink = GifSink::new(cfg(4, 4, 1, "badlen"), Palette::global()).unwrap();
        assert!(sink.add_frame(&[0u8; 3], 5).is_err());
    }

    #[test]
    fn roundtrip_preserves_dimensions_delay_and_loop() {
        let out_path = temp_out("roundtrip");
        let mut sink = GifSink::new(
            EncodeConfig {
                width: 6,
                height: 4,
                kept_frames: 2,
                loop_count: LoopCount::Infinite,
                out_path: out_path.clone(),
            },
            Palette::global(),
        )
        .unwrap();
        sink.add_frame(&[0u8; 24], 7).unwrap();
        sink.add_frame(&[255u8; 24], 9).unwrap();
        let summary = sink.finish().unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.duration_cs, 16);
        assert!(summary.size_bytes > 0);

        let bytes = std::fs::read(&out_path).unwrap();
        assert_eq!(bytes.len(), summary.size_bytes);

        let mut opts = gif::DecodeOptions::new();
        opts.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = opts.read_info(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.width(), 6);
        assert_eq!(decoder.height(), 4);
        let first = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(first.delay, 7);

        std::fs::remove_file(out_path).ok();
    }

    #[test]
    fn delay_is_clamped_to_u16() {
        let out_path = temp_out("clamp");
        let mut sink = GifSink::new(
            EncodeConfig {
                width: 2,
                height: 2,
                kept_frames: 1,
                loop_count: LoopCount::Finite(3),
                out_path: out_path.clone(),
            },
            Palette::global(),
        )
        .unwrap();
        sink.add_frame(&[0u8; 4], 1_000_000).unwrap();
        let summary = sink.finish().unwrap();
        assert_eq!(summary.duration_cs, u32::from(u16::MAX));
        std::fs::remove_file(out_path).ok();
    }

    #[test]
    fn fps_is_frames_over_duration() {
        let out_path = temp_out("fps");
        let mut sink = GifSink::new(
            EncodeConfig {
                width: 2,
                height: 2,
                kept_frames: 5,
                loop_count: LoopCount::Infinite,
                out_path: out_path.clone(),
            },
            Palette::global(),
        )
        .unwrap();
        for _ in 0..5 {
            sink.add_frame(&[0u8; 4], 10).unwrap();
        }
        let summary = sink.finish().unwrap();
        assert!((summary.fps - 10.0).abs() < 1e-3);
        std::fs::remove_file(out_path).ok();
    }

    #[test]
    fn prealloc_is_capped() {
        assert_eq!(prealloc_bytes(10, 10, 1), 1024 * 1024 + 100);
        assert_eq!(prealloc_bytes(10_000, 10_000, 100), MAX_PREALLOC_BYTES);
    }
}
