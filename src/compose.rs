//! 图层合成
//!
//! 底图转成 RGBA 后，按叠放顺序把每组水印旋转并以 "over" 方式混合上去。

use crate::group::WatermarkGroup;
use crate::rotation::rotate;
use image::{DynamicImage, Rgba, RgbaImage};

/// # 合成水印
///
/// # 参数
/// * `base` - 底图，已按 EXIF 方向校正
/// * `group` - 水印组
///
/// 返回与底图同尺寸的 RGBA 图像，底图本身不被修改。
pub fn compose(base: &DynamicImage, group: &WatermarkGroup) -> RgbaImage {
   let mut canvas = base.to_rgba8();
   let degrees = group.rotation();
   for assembly in group.assemble(canvas.dimensions()) {
      let rotated = rotate(&assembly.buffer, degrees);
      let (x, y) = assembly.origin;
      overlay_at(&mut canvas, &rotated.buffer, x - rotated.offset.0, y - rotated.offset.1);
   }
   canvas
}

/// 把 `top` 混合到 `bottom` 的 (x, y) 处，超出画布的部分被裁掉
pub fn overlay_at(bottom: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
   let (bottom_w, bottom_h) = (bottom.width() as i64, bottom.height() as i64);
   let x_start = x.max(0);
   let y_start = y.max(0);
   let x_end = (x + top.width() as i64).min(bottom_w);
   let y_end = (y + top.height() as i64).min(bottom_h);

   for ty in y_start..y_end {
      for tx in x_start..x_end {
         let src = *top.get_pixel((tx - x) as u32, (ty - y) as u32);
         blend_pixel(bottom.get_pixel_mut(tx as u32, ty as u32), src);
      }
   }
}

/// Porter-Duff "over"，非预乘 alpha
///
/// 源像素完全透明时目标不变，完全不透明时直接覆盖。
pub(crate) fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
   match src[3] {
      0 => {}
      255 => *dst = src,
      _ => {
         let src_a = src[3] as f32 / 255.0;
         let dst_a = dst[3] as f32 / 255.0;
         let out_a = src_a + dst_a * (1.0 - src_a);
         for c in 0..3 {
            let value = (src[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
            dst[c] = value.round().clamp(0.0, 255.0) as u8;
         }
         dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
      }
   }
}

/// alpha 大于 0 的像素所占矩形 (x, y, 宽, 高)
pub(crate) fn ink_bounds(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
   let mut bounds: Option<(u32, u32, u32, u32)> = None;
   for (x, y, pixel) in image.enumerate_pixels() {
      if pixel[3] == 0 {
         continue;
      }
      bounds = Some(match bounds {
         None => (x, y, x, y),
         Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
      });
   }
   bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}
