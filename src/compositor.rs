use crate::error::{GifwrightError, GifwrightResult};
use crate::source::SourceFrame;

/// What happens to a frame's pixels once the next frame is due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposal {
    /// Leave the canvas as composited (covers the GIF "none" code too).
    Keep,
    /// Clear exactly the frame's rect back to transparent.
    RestoreBackground,
    /// Revert the canvas to its state before this frame was composited.
    RestorePrevious,
}

impl From<gif::DisposalMethod> for Disposal {
    fn from(d: gif::DisposalMethod) -> Self {
        match d {
            gif::DisposalMethod::Any | gif::DisposalMethod::Keep => Disposal::Keep,
            gif::DisposalMethod::Background => Disposal::RestoreBackground,
            gif::DisposalMethod::Previous => Disposal::RestorePrevious,
        }
    }
}

/// Replays source frames in order onto one persistent RGBA canvas sized to
/// the source's logical screen, applying disposal between frames.
///
/// Frames are partial-area updates layered on what the viewer already sees;
/// the per-frame protocol is [`begin_frame`](Self::begin_frame) →
/// [`blit`](Self::blit) → downstream consumption → [`finish_frame`](Self::finish_frame).
pub struct Compositor {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    snapshot: Vec<u8>,
    restore_after: bool,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: vec![0u8; len],
            snapshot: Vec::new(),
            restore_after: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The canvas as the viewer currently sees it. Always source-sized.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pre-frame hook: snapshot the canvas iff this frame will need to be
    /// rolled back afterwards. Single-level only.
    pub fn begin_frame(&mut self, frame: &SourceFrame) {
        if frame.disposal == Disposal::RestorePrevious {
            self.snapshot.clear();
            self.snapshot.extend_from_slice(&self.pixels);
            self.restore_after = true;
        }
    }

    /// Layer the frame's rect onto the canvas. Transparent source pixels
    /// (alpha 0) leave the canvas untouched, per the GIF blending rule.
    pub fn blit(&mut self, frame: &SourceFrame) -> GifwrightResult<()> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.rgba.len() != expected {
            return Err(GifwrightError::format(format!(
                "frame pixel buffer is {} bytes, rect needs {expected}",
                frame.rgba.len()
            )));
        }

        let (x0, y0, x1, y1) = self.clamped_rect(frame);
        for y in y0..y1 {
            for x in x0..x1 {
                let src = ((y - frame.top) as usize * frame.width as usize
                    + (x - frame.left) as usize)
                    * 4;
                if frame.rgba[src + 3] == 0 {
                    continue;
                }
                let dst = (y as usize * self.width as usize + x as usize) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&frame.rgba[src..src + 4]);
            }
        }
        Ok(())
    }

    /// Post-frame hook: apply the frame's disposal once downstream stages
    /// have consumed the composited canvas.
    pub fn finish_frame(&mut self, frame: &SourceFrame) {
        match frame.disposal {
            Disposal::Keep => {}
            Disposal::RestoreBackground => {
                let (x0, y0, x1, y1) = self.clamped_rect(frame);
                for y in y0..y1 {
                    let start = (y as usize * self.width as usize + x0 as usize) * 4;
                    let end = (y as usize * self.width as usize + x1 as usize) * 4;
                    self.pixels[start..end].fill(0);
                }
            }
            Disposal::RestorePrevious => {
                if self.restore_after {
                    self.pixels.copy_from_slice(&self.snapshot);
                    self.restore_after = false;
                }
            }
        }
    }

    fn clamped_rect(&self, frame: &SourceFrame) -> (u32, u32, u32, u32) {
        let x0 = frame.left.min(self.width);
        let y0 = frame.top.min(self.height);
        let x1 = frame.left.saturating_add(frame.width).min(self.width);
        let y1 = frame.top.saturating_add(frame.height).min(self.height);
        (x0, y0, x1, y1)
    }
}
