use crate::error::{GifwrightError, GifwrightResult};

/// Separable gaussian blur over premultiplied RGBA8, used for text shadows.
/// Fixed-point q16 weights keep the result deterministic across platforms.
pub fn gaussian_blur_rgba8(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
) -> GifwrightResult<Vec<u8>> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| GifwrightError::surface("blur buffer size overflow"))?;
    if src.len() != expected {
        return Err(GifwrightError::surface(
            "gaussian_blur_rgba8 expects src matching width*height*4",
        ));
    }
    if radius == 0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let kernel = kernel_q16(radius);
    let (w, h) = (width as usize, height as usize);
    let mut tmp = vec![0u8; expected];
    let mut out = vec![0u8; expected];

    // horizontal: one line per row, pixels 4 bytes apart
    blur_lines(src, &mut tmp, h, w, w * 4, 4, &kernel);
    // vertical: one line per column, pixels a full row apart
    blur_lines(&tmp, &mut out, w, h, 4, w * 4, &kernel);
    Ok(out)
}

/// q16 gaussian weights for the given radius, sigma tied to the radius so
/// callers only choose one knob.
fn kernel_q16(radius: u32) -> Vec<u32> {
    let sigma = (radius as f64 / 2.0).max(0.5);
    let r = radius as i64;
    let denom = 2.0 * sigma * sigma;

    let mut raw = Vec::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        raw.push(w);
        sum += w;
    }

    let mut weights: Vec<u32> = raw
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    // dump the rounding remainder on the center tap so the kernel sums to 1.0
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + (65536 - acc)).clamp(0, 65536) as u32;
    weights
}

fn blur_lines(
    src: &[u8],
    dst: &mut [u8],
    lines: usize,
    line_len: usize,
    line_stride: usize,
    px_stride: usize,
    kernel: &[u32],
) {
    let radius = (kernel.len() / 2) as i64;
    for line in 0..lines {
        let base = line * line_stride;
        for i in 0..line_len {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let tap = (i as i64 + ki as i64 - radius).clamp(0, line_len as i64 - 1) as usize;
                let p = base + tap * px_stride;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[p + c]);
                }
            }
            let p = base + i * px_stride;
            for c in 0..4 {
                dst[p + c] = (((acc[c] + 32768) >> 16).min(255)) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_0_is_identity() {
        let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(gaussian_blur_rgba8(&src, 1, 2, 0).unwrap(), src);
    }

    #[test]
    fn constant_image_is_unchanged() {
        let px = [10u8, 20, 30, 40];
        let src = px.repeat(12);
        assert_eq!(gaussian_blur_rgba8(&src, 4, 3, 2).unwrap(), src);
    }

    #[test]
    fn energy_spreads_but_is_conserved() {
        let (w, h) = (5u32, 5u32);
        let mut src = vec![0u8; (w * h * 4) as usize];
        let center = ((2 * w + 2) * 4) as usize;
        src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        let out = gaussian_blur_rgba8(&src, w, h, 2).unwrap();
        let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);

        let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(gaussian_blur_rgba8(&[0u8; 7], 2, 1, 1).is_err());
    }
}
