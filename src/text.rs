//! 文本水印渲染
//!
//! 先把字形画成灰度覆盖率蒙版，再由蒙版生成阴影、描边和填充三层，
//! 按“阴影 → 描边 → 填充”的顺序叠到透明画布上，最后统一乘以图层不透明度。

use crate::compose::{blend_pixel, ink_bounds};
use crate::error::{MarkError, Result};
use crate::layer::{Opacity, RenderedLayer, TextStyle};
use crate::color::Color;
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::imageops::{crop_imm, replace};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::morphology::{Mask, grayscale_dilate};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// 内置字体
static FONT_BYTES: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");
static DEFAULT_FONT: OnceLock<FontArc> = OnceLock::new();

/// 字形四周留出的空白，避免抗锯齿边缘被裁掉
const GLYPH_PADDING: u32 = 2;

/// 描边宽度上限
pub const MAX_STROKE_WIDTH: u32 = 50;
/// 阴影偏移上限（绝对值）
pub const MAX_SHADOW_OFFSET: i32 = 1000;

/// 内置的 DejaVu Sans
///
/// # Panics
/// 嵌入的字体文件损坏时 panic，这是本库唯一的 panic 路径。
pub fn default_font() -> FontArc {
   DEFAULT_FONT
      .get_or_init(|| FontArc::try_from_slice(FONT_BYTES).expect("内置字体损坏"))
      .clone()
}

/// 从文件加载字体
pub fn try_load_font<P: AsRef<Path>>(path: P) -> Result<FontArc> {
   let path = path.as_ref();
   let failure = |reason: String| MarkError::FontLoadFailure {
      path: path.to_path_buf(),
      reason,
   };
   let bytes = fs::read(path).map_err(|e| failure(e.to_string()))?;
   FontArc::try_from_vec(bytes).map_err(|e| failure(e.to_string()))
}

/// 加载字体，失败时回退到内置字体
pub fn load_font_or_default(path: Option<&Path>) -> FontArc {
   match path {
      None => default_font(),
      Some(path) => try_load_font(path).unwrap_or_else(|e| {
         warn!("{e}，改用内置字体");
         default_font()
      }),
   }
}

/// # 渲染文本图层
///
/// # 参数
/// * `style` - 文本、字号、颜色以及可选的描边和阴影
/// * `opacity` - 图层整体不透明度，作用于阴影、描边和填充
///
/// 返回裁切到墨迹范围（含描边和阴影偏移）的缓冲区，没有墨迹时返回 `None`。
pub fn render_text(style: &TextStyle, opacity: Opacity) -> Option<RenderedLayer> {
   if style.text.trim().is_empty() {
      return None;
   }
   let scale = PxScale::from(style.font_size.max(1) as f32);
   let scaled_font = style.font.as_scaled(scale);
   let (text_width, _) = text_size(scale, &style.font, &style.text);
   let line_height = (scaled_font.ascent() - scaled_font.descent()).ceil().max(1.0) as u32;

   let stroke_width = style.stroke.map_or(0, |s| s.width.min(MAX_STROKE_WIDTH));
   let limit = |v: i32| v.clamp(-MAX_SHADOW_OFFSET, MAX_SHADOW_OFFSET);
   let (shadow_x, shadow_y) = style.shadow.map_or((0, 0), |s| (limit(s.offset_x), limit(s.offset_y)));
   let pad = stroke_width + GLYPH_PADDING;
   let width = text_width + pad * 2 + shadow_x.unsigned_abs() + GLYPH_PADDING;
   let height = line_height + pad * 2 + shadow_y.unsigned_abs();

   // 阴影向左/上偏移时字形整体右/下移，保证阴影不被裁掉
   let origin_x = pad + shadow_x.min(0).unsigned_abs();
   let origin_y = pad + shadow_y.min(0).unsigned_abs();

   let mut fill = GrayImage::new(width, height);
   draw_text_mut(
      &mut fill,
      Luma([255]),
      origin_x as i32,
      origin_y as i32,
      scale,
      &style.font,
      &style.text,
   );
   let outline = style.stroke.map(|_| grayscale_dilate(&fill, &Mask::disk(stroke_width as u8)));

   let mut canvas = RgbaImage::new(width, height);
   if let Some(shadow) = style.shadow {
      let silhouette = outline.as_ref().unwrap_or(&fill);
      let mut shifted = GrayImage::new(width, height);
      replace(&mut shifted, silhouette, shadow_x as i64, shadow_y as i64);
      paint(&mut canvas, &shifted, shadow.color, shadow.opacity.factor());
   }
   if let (Some(stroke), Some(outline)) = (style.stroke, outline.as_ref()) {
      paint(&mut canvas, outline, stroke.color, 1.0);
   }
   paint(&mut canvas, &fill, style.color, 1.0);

   if !opacity.is_opaque() {
      let factor = opacity.factor();
      for pixel in canvas.pixels_mut() {
         pixel[3] = (pixel[3] as f32 * factor).round() as u8;
      }
   }

   let (x, y, w, h) = ink_bounds(&canvas)?;
   Some(RenderedLayer {
      buffer: crop_imm(&canvas, x, y, w, h).to_image(),
   })
}

/// 用蒙版覆盖率作为 alpha，把颜色叠到画布上
fn paint(canvas: &mut RgbaImage, mask: &GrayImage, color: Color, factor: f32) {
   for (x, y, coverage) in mask.enumerate_pixels() {
      if coverage[0] == 0 {
         continue;
      }
      let src = color.with_coverage(coverage[0] as f32 / 255.0 * factor);
      blend_pixel(canvas.get_pixel_mut(x, y), src);
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::layer::{Shadow, Stroke};

   fn style(text: &str) -> TextStyle {
      TextStyle {
         color: Color::rgb(200, 30, 30),
         ..TextStyle::new(text)
      }
   }

   fn max_alpha(img: &RgbaImage) -> u8 {
      img.pixels().map(|p| p[3]).max().unwrap_or(0)
   }

   #[test]
   fn test_render_text_has_ink_and_tight_bbox() {
      let layer = render_text(&style("SAMPLE"), Opacity::OPAQUE).unwrap();
      let (w, h) = layer.bbox();
      assert!(w > 40 && h > 10, "unexpected bbox {w}x{h}");
      assert_eq!(ink_bounds(&layer.buffer), Some((0, 0, w, h)));
      assert_eq!(max_alpha(&layer.buffer), 255);
   }

   #[test]
   fn test_default_font_is_embedded() {
      let font = default_font();
      assert!(font.glyph_id('A').0 != 0);
      assert!(FontArc::try_from_slice(FONT_BYTES).is_ok());
   }

   #[test]
   fn test_empty_text_renders_nothing() {
      assert!(render_text(&style("   "), Opacity::OPAQUE).is_none());
   }

   #[test]
   fn test_opacity_scales_whole_buffer() {
      let full = render_text(&style("Test"), Opacity::OPAQUE).unwrap();
      let half = render_text(&style("Test"), Opacity::new(50)).unwrap();
      assert_eq!(full.bbox(), half.bbox());
      for (a, b) in full.buffer.pixels().zip(half.buffer.pixels()) {
         let expected = (a[3] as f32 * 0.5).round() as u8;
         assert_eq!(b[3], expected);
      }
   }

   #[test]
   fn test_fill_pixels_use_style_color() {
      let layer = render_text(&style("I"), Opacity::OPAQUE).unwrap();
      let solid = layer.buffer.pixels().find(|p| p[3] == 255).unwrap();
      assert_eq!(solid.0, [200, 30, 30, 255]);
   }

   #[test]
   fn test_stroke_grows_bbox_by_width() {
      let plain = render_text(&style("Mark"), Opacity::OPAQUE).unwrap();
      let mut stroked = style("Mark");
      stroked.stroke = Some(Stroke {
         width: 3,
         color: Color::BLACK,
      });
      let stroked = render_text(&stroked, Opacity::OPAQUE).unwrap();
      assert_eq!(stroked.bbox().0, plain.bbox().0 + 6);
      assert_eq!(stroked.bbox().1, plain.bbox().1 + 6);
      assert!(stroked.buffer.pixels().any(|p| p.0 == [0, 0, 0, 255]));
   }

   #[test]
   fn test_shadow_extends_bbox_by_offset() {
      let plain = render_text(&style("Mark"), Opacity::OPAQUE).unwrap();
      let mut shadowed = style("Mark");
      shadowed.shadow = Some(Shadow {
         offset_x: 4,
         offset_y: -3,
         color: Color::BLACK,
         opacity: Opacity::OPAQUE,
      });
      let shadowed = render_text(&shadowed, Opacity::OPAQUE).unwrap();
      assert_eq!(shadowed.bbox(), (plain.bbox().0 + 4, plain.bbox().1 + 3));
   }

   #[test]
   fn test_missing_font_falls_back_to_default() {
      assert!(matches!(
         try_load_font("/nonexistent/font.ttf"),
         Err(MarkError::FontLoadFailure { .. })
      ));
      let font = load_font_or_default(Some(Path::new("/nonexistent/font.ttf")));
      let style = TextStyle {
         font,
         ..TextStyle::new("fallback")
      };
      assert!(render_text(&style, Opacity::OPAQUE).is_some());
   }

   #[test]
   fn test_stroke_outline_is_disc_shaped() {
      let mut stroked = style("I");
      stroked.stroke = Some(Stroke {
         width: 4,
         color: Color::BLACK,
      });
      let plain = render_text(&style("I"), Opacity::OPAQUE).unwrap();
      let layer = render_text(&stroked, Opacity::OPAQUE).unwrap();
      let (w, h) = layer.bbox();
      assert_eq!((w, h), (plain.bbox().0 + 8, plain.bbox().1 + 8));
      // 圆形邻域：角落离字形超过描边半径，保持透明
      assert_eq!(layer.buffer.get_pixel(0, 0)[3], 0);
      assert_eq!(layer.buffer.get_pixel(w - 1, h - 1)[3], 0);
   }

   #[test]
   fn test_stroke_width_is_capped() {
      let plain = render_text(&style("A"), Opacity::OPAQUE).unwrap();
      let mut wide = style("A");
      wide.stroke = Some(Stroke {
         width: 10_000,
         color: Color::BLACK,
      });
      let layer = render_text(&wide, Opacity::OPAQUE).unwrap();
      let grown = 2 * MAX_STROKE_WIDTH;
      assert_eq!(layer.bbox(), (plain.bbox().0 + grown, plain.bbox().1 + grown));
   }

   #[test]
   fn test_extreme_shadow_offset_is_capped() {
      let plain = render_text(&style("A"), Opacity::OPAQUE).unwrap();
      let mut far = style("A");
      far.shadow = Some(Shadow {
         offset_x: i32::MIN,
         offset_y: i32::MAX,
         color: Color::BLACK,
         opacity: Opacity::OPAQUE,
      });
      let layer = render_text(&far, Opacity::OPAQUE).unwrap();
      let reach = MAX_SHADOW_OFFSET as u32;
      assert_eq!(layer.bbox(), (plain.bbox().0 + reach, plain.bbox().1 + reach));
   }
}
