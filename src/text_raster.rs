use std::borrow::Cow;
use std::path::Path;

use vello_cpu::kurbo::{Affine, RoundedRect, Shape};

use crate::blend;
use crate::blur;
use crate::error::{GifwrightError, GifwrightResult};
use crate::model::{Rgb, TextStyle, alpha_from_opacity_pct};
use crate::stage::FrameContext;
use crate::text::{self, TextRasterizer};

/// Parley brush slot. Paint colors are set on the render context per draw,
/// so the brush carries no data of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GlyphBrush;

/// CPU glyph surface: parley shapes the text, vello_cpu rasterizes it.
/// Constructed from raw font bytes; the same instance serves every frame of
/// a run.
pub struct CpuTextRasterizer {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<GlyphBrush>,
    family_name: String,
    font_data: vello_cpu::peniko::FontData,
}

impl CpuTextRasterizer {
    pub fn from_font_file(path: &Path) -> GifwrightResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GifwrightError::surface(format!("cannot read font '{}': {e}", path.display()))
        })?;
        Self::from_font_bytes(bytes)
    }

    pub fn from_font_bytes(bytes: Vec<u8>) -> GifwrightResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            GifwrightError::surface("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| GifwrightError::surface("registered font family has no name"))?
            .to_string();

        let font_data =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font_data,
        })
    }

    fn layout_line(&mut self, line: &str, size_px: f32) -> parley::Layout<GlyphBrush> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, line, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(GlyphBrush));

        let mut layout: parley::Layout<GlyphBrush> = builder.build(line);
        layout.break_all_lines(None);
        layout
    }
}

impl TextRasterizer for CpuTextRasterizer {
    fn rasterize(
        &mut self,
        style: &TextStyle,
        out_w: u32,
        out_h: u32,
        ctx: &FrameContext,
    ) -> GifwrightResult<Vec<u8>> {
        let w16: u16 = out_w
            .try_into()
            .map_err(|_| GifwrightError::surface("output width exceeds u16"))?;
        let h16: u16 = out_h
            .try_into()
            .map_err(|_| GifwrightError::surface("output height exceeds u16"))?;

        let layer_len = out_w as usize * out_h as usize * 4;
        let lines = text::resolved_lines(&style.content);
        if lines.is_empty() {
            return Ok(vec![0u8; layer_len]);
        }

        let base_px = text::font_px(style, out_w, out_h);
        let anim = text::animation_state(style.animation.as_ref(), ctx, base_px);
        let size_px = (base_px * anim.scale).max(1.0);

        // shape every line up front so the block can be measured and clamped
        let mut layouts = Vec::with_capacity(lines.len());
        let mut widths = Vec::with_capacity(lines.len());
        let mut heights = Vec::with_capacity(lines.len());
        for line in &lines {
            if line.trim().is_empty() {
                layouts.push(None);
                widths.push(0.0f32);
                heights.push(size_px * 1.2);
            } else {
                let layout = self.layout_line(line, size_px);
                widths.push(layout.width());
                heights.push(layout.height().max(size_px));
                layouts.push(Some(layout));
            }
        }
        let block_w: f32 = widths.iter().fold(0.0f32, |a, &b| a.max(b));
        let block_h: f32 = heights.iter().sum();

        let cx = style.anchor_x_pct / 100.0 * out_w as f32 + anim.dx;
        let cy = style.anchor_y_pct / 100.0 * out_h as f32 + anim.dy;
        let (cx, cy) = text::clamp_block_center(cx, cy, block_w, block_h, out_w, out_h);
        let origin = (cx - block_w / 2.0, cy - block_h / 2.0);

        let mut layer = if style.background.enabled {
            let mut bg_ctx = vello_cpu::RenderContext::new(w16, h16);
            let alpha = alpha_from_opacity_pct(style.background.opacity_pct) * anim.alpha_mul;
            bg_ctx.set_transform(Affine::IDENTITY);
            bg_ctx.set_paint(paint_color(style.background.color, alpha));
            let pad = f64::from(size_px) * 0.3;
            let rect = RoundedRect::new(
                f64::from(origin.0) - pad,
                f64::from(origin.1) - pad,
                f64::from(origin.0 + block_w) + pad,
                f64::from(origin.1 + block_h) + pad,
                f64::from(size_px) * 0.25,
            );
            bg_ctx.fill_path(&rect.to_path(0.1));
            render_to_bytes(&mut bg_ctx, w16, h16)
        } else {
            vec![0u8; layer_len]
        };

        if style.shadow.enabled {
            let (sdx, sdy) = text::shadow_offset(style.shadow.distance, style.shadow.angle_pct);
            let alpha = alpha_from_opacity_pct(style.shadow.opacity_pct) * anim.alpha_mul;
            let mut shadow_ctx = vello_cpu::RenderContext::new(w16, h16);
            draw_block(
                &mut shadow_ctx,
                &self.font_data,
                &layouts,
                &widths,
                &heights,
                (origin.0 + sdx, origin.1 + sdy),
                block_w,
                paint_color(style.shadow.color, alpha),
            );
            let bytes = render_to_bytes(&mut shadow_ctx, w16, h16);
            let blurred = blur::gaussian_blur_rgba8(&bytes, out_w, out_h, style.shadow.blur)?;
            blend::over_in_place(&mut layer, &blurred, 1.0)?;
        }

        let mut glyph_ctx = vello_cpu::RenderContext::new(w16, h16);
        if style.stroke.enabled {
            let stroke_px = (size_px * style.stroke.width_pct / 100.0).max(1.0);
            let alpha = alpha_from_opacity_pct(style.stroke.opacity_pct) * anim.alpha_mul;
            for (dx, dy) in ring_offsets(stroke_px) {
                draw_block(
                    &mut glyph_ctx,
                    &self.font_data,
                    &layouts,
                    &widths,
                    &heights,
                    (origin.0 + dx, origin.1 + dy),
                    block_w,
                    paint_color(style.stroke.color, alpha),
                );
            }
        }
        let fill_alpha = alpha_from_opacity_pct(style.fill.opacity_pct) * anim.alpha_mul;
        draw_block(
            &mut glyph_ctx,
            &self.font_data,
            &layouts,
            &widths,
            &heights,
            origin,
            block_w,
            paint_color(style.fill.color, fill_alpha),
        );
        let bytes = render_to_bytes(&mut glyph_ctx, w16, h16);
        blend::over_in_place(&mut layer, &bytes, 1.0)?;

        Ok(layer)
    }
}

fn paint_color(rgb: Rgb, alpha: f32) -> vello_cpu::peniko::Color {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    vello_cpu::peniko::Color::from_rgba8(rgb.r, rgb.g, rgb.b, a)
}

/// Draw every shaped line, horizontally centered within the block.
fn draw_block(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layouts: &[Option<parley::Layout<GlyphBrush>>],
    widths: &[f32],
    heights: &[f32],
    origin: (f32, f32),
    block_w: f32,
    color: vello_cpu::peniko::Color,
) {
    let mut y = origin.1;
    for (i, layout) in layouts.iter().enumerate() {
        if let Some(layout) = layout {
            let x = origin.0 + (block_w - widths[i]) / 2.0;
            ctx.set_transform(Affine::translate((f64::from(x), f64::from(y))));
            ctx.set_paint(color);
            for line in layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        y += heights[i];
    }
}

fn render_to_bytes(ctx: &mut vello_cpu::RenderContext, w: u16, h: u16) -> Vec<u8> {
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);
    pixmap.data_as_u8_slice().to_vec()
}

/// Offsets for the eight fill passes that build the outline.
fn ring_offsets(radius: f32) -> [(f32, f32); 8] {
    let d = radius * std::f32::consts::FRAC_1_SQRT_2;
    [
        (radius, 0.0),
        (-radius, 0.0),
        (0.0, radius),
        (0.0, -radius),
        (d, d),
        (d, -d),
        (-d, d),
        (-d, -d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_font_bytes_are_rejected() {
        assert!(CpuTextRasterizer::from_font_bytes(vec![0u8; 16]).is_err());
    }

    #[test]
    fn ring_offsets_sit_on_the_radius() {
        for (dx, dy) in ring_offsets(3.0) {
            let r = (dx * dx + dy * dy).sqrt();
            assert!((r - 3.0).abs() < 1e-3);
        }
    }
}
