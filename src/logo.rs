use crate::layer::{LogoScale, Opacity, RenderedLayer};
use image::RgbaImage;
use image::imageops::{FilterType, resize};

/// # 计算 Logo 缩放后的尺寸
///
/// 只给出一个边时按原图比例计算另一边，结果至少为 1 像素。
pub fn scaled_size(source: (u32, u32), scale: LogoScale) -> (u32, u32) {
   let (w, h) = (source.0.max(1) as f64, source.1.max(1) as f64);
   let px = |v: f64| v.round().max(1.0) as u32;
   match scale {
      LogoScale::Percent(percent) => {
         let factor = percent.max(0.0) as f64 / 100.0;
         (px(w * factor), px(h * factor))
      }
      LogoScale::Width(width) => (width.max(1), px(h * width as f64 / w)),
      LogoScale::Height(height) => (px(w * height as f64 / h), height.max(1)),
      LogoScale::Exact { width, height } => (width.max(1), height.max(1)),
   }
}

/// # 渲染 Logo 图层
///
/// # 参数
/// * `source` - Logo 原图
/// * `scale` - 缩放方式
/// * `opacity` - 逐像素乘到 alpha 通道上，100 时原样输出
pub fn render_logo(source: &RgbaImage, scale: LogoScale, opacity: Opacity) -> RenderedLayer {
   let (width, height) = scaled_size(source.dimensions(), scale);
   let mut buffer = if (width, height) == source.dimensions() {
      source.clone()
   } else {
      resize(source, width, height, FilterType::CatmullRom)
   };
   if !opacity.is_opaque() {
      let factor = opacity.factor();
      for pixel in buffer.pixels_mut() {
         pixel[3] = (pixel[3] as f32 * factor).round() as u8;
      }
   }
   RenderedLayer { buffer }
}

#[cfg(test)]
mod tests {
   use super::*;
   use image::Rgba;

   #[test]
   fn test_percent_scales_both_dimensions() {
      assert_eq!(scaled_size((200, 100), LogoScale::Percent(30.0)), (60, 30));
      assert_eq!(scaled_size((200, 100), LogoScale::Percent(150.0)), (300, 150));
   }

   #[test]
   fn test_single_dimension_keeps_aspect() {
      assert_eq!(scaled_size((400, 300), LogoScale::Width(200)), (200, 150));
      assert_eq!(scaled_size((400, 300), LogoScale::Height(60)), (80, 60));
   }

   #[test]
   fn test_exact_stretches() {
      let scale = LogoScale::Exact {
         width: 50,
         height: 500,
      };
      assert_eq!(scaled_size((400, 300), scale), (50, 500));
   }

   #[test]
   fn test_dimensions_never_collapse_to_zero() {
      assert_eq!(scaled_size((10, 10), LogoScale::Percent(0.0)), (1, 1));
      assert_eq!(scaled_size((1000, 2), LogoScale::Width(10)), (10, 1));
   }

   #[test]
   fn test_full_opacity_is_pass_through() {
      let mut source = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
      source.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
      let layer = render_logo(&source, LogoScale::Percent(100.0), Opacity::OPAQUE);
      assert_eq!(layer.buffer, source);
   }

   #[test]
   fn test_opacity_multiplies_alpha_and_keeps_shape() {
      let mut source = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 200]));
      source.put_pixel(1, 1, Rgba([10, 20, 30, 0]));
      let layer = render_logo(&source, LogoScale::Percent(100.0), Opacity::new(50));
      assert_eq!(layer.buffer.get_pixel(0, 0), &Rgba([10, 20, 30, 100]));
      assert_eq!(layer.buffer.get_pixel(1, 1)[3], 0);
   }
}
