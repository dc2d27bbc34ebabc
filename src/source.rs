use std::io::Cursor;
use std::path::Path;

use crate::compositor::Disposal;
use crate::error::{GifwrightError, GifwrightResult};

/// Loop semantics carried from the source's Netscape extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Finite(u16),
}

/// One decoded source frame: its placement rect, timing, disposal, and the
/// frame-rect RGBA pixels (transparent pixels carry alpha 0).
#[derive(Clone, Debug)]
pub struct SourceFrame {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub delay_cs: u16,
    pub disposal: Disposal,
    pub rgba: Vec<u8>,
}

/// A fully decoded source animation, immutable for the run's duration.
#[derive(Clone, Debug)]
pub struct SourceGif {
    pub width: u32,
    pub height: u32,
    pub loop_count: LoopCount,
    pub frames: Vec<SourceFrame>,
}

impl SourceGif {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Read a GIF from disk fully into memory and decode every frame.
    pub fn open(path: &Path) -> GifwrightResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GifwrightError::input(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::decode(&bytes)
    }

    /// Decode GIF bytes. The magic bytes are sniffed first so a misnamed
    /// PNG/WebP/JPEG/video gets an actionable message instead of a generic
    /// parse failure.
    pub fn decode(bytes: &[u8]) -> GifwrightResult<Self> {
        sniff_gif(bytes)?;

        let mut opts = gif::DecodeOptions::new();
        opts.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = opts
            .read_info(Cursor::new(bytes))
            .map_err(|e| GifwrightError::format(format!("cannot parse GIF stream: {e}")))?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        if width == 0 || height == 0 {
            return Err(GifwrightError::format("GIF has zero logical dimensions"));
        }

        let loop_count = match decoder.repeat() {
            gif::Repeat::Infinite => LoopCount::Infinite,
            gif::Repeat::Finite(n) => LoopCount::Finite(n),
        };

        let mut frames = Vec::new();
        loop {
            let frame = match decoder.read_next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    return Err(GifwrightError::format(format!(
                        "corrupt or truncated GIF frame stream: {e}"
                    )));
                }
            };

            frames.push(SourceFrame {
                left: u32::from(frame.left),
                top: u32::from(frame.top),
                width: u32::from(frame.width),
                height: u32::from(frame.height),
                delay_cs: frame.delay,
                disposal: Disposal::from(frame.dispose),
                rgba: frame.buffer.to_vec(),
            });
        }

        if frames.is_empty() {
            return Err(GifwrightError::format("GIF contains no frames"));
        }

        Ok(Self {
            width,
            height,
            loop_count,
            frames,
        })
    }
}

/// Reject non-GIF bytes up front, naming the format we actually saw.
pub fn sniff_gif(bytes: &[u8]) -> GifwrightResult<()> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Ok(());
    }
    let seen = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "a PNG image"
    } else if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        "a WebP image"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "a JPEG image"
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        "an MP4/ISO video"
    } else {
        "not a recognized image format"
    };
    Err(GifwrightError::format(format!(
        "input is {seen}, not a GIF"
    )))
}
