//! 水印组旋转
//!
//! 绕缓冲区自身中心旋转，输出扩展到能完整容纳旋转后矩形的最小尺寸，
//! 新露出的像素完全透明。正角度为屏幕上的逆时针方向。

use image::imageops::{replace, rotate90, rotate180, rotate270};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// 旋转结果
#[derive(Debug, Clone)]
pub struct Rotated {
   pub buffer: RgbaImage,
   /// 缓冲区在左侧/上方扩展的像素数（缩小时为负），
   /// 粘贴位置减去该值即可保持旋转前的中心点不变
   pub offset: (i64, i64),
}

/// 角度截断到 [-180, 180]，非法值视为 0
pub fn normalize_angle(degrees: f32) -> f32 {
   if degrees.is_finite() {
      degrees.clamp(-180.0, 180.0)
   } else {
      0.0
   }
}

/// 旋转后的外接矩形尺寸
///
/// 宽高与原尺寸的差值保持为偶数，使左右两侧扩展量相同。
pub fn rotated_size(width: u32, height: u32, degrees: f32) -> (u32, u32) {
   let radians = (normalize_angle(degrees) as f64).to_radians();
   let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
   let (w, h) = (width as f64, height as f64);
   let fit = |v: f64, original: u32| {
      let size = ((v - 1e-4).ceil().max(1.0)) as u32;
      if (size as i64 - original as i64) % 2 != 0 { size + 1 } else { size }
   };
   (fit(w * cos + h * sin, width), fit(w * sin + h * cos, height))
}

/// # 旋转水印组
///
/// # 参数
/// * `buffer` - 已叠放好的水印组
/// * `degrees` - 旋转角度，正值逆时针
///
/// 0 度直接返回原缓冲区的拷贝；±90、±180 度为精确的像素重排；
/// 其余角度在预乘 alpha 上做双线性插值，避免透明边缘发黑。
pub fn rotate(buffer: &RgbaImage, degrees: f32) -> Rotated {
   let degrees = normalize_angle(degrees);
   let (width, height) = buffer.dimensions();
   let rotated = if degrees == 0.0 {
      buffer.clone()
   } else if degrees == 90.0 {
      rotate270(buffer)
   } else if degrees == -90.0 {
      rotate90(buffer)
   } else if degrees.abs() == 180.0 {
      rotate180(buffer)
   } else {
      rotate_free(buffer, degrees)
   };
   let offset = (
      (rotated.width() as i64 - width as i64).div_euclid(2),
      (rotated.height() as i64 - height as i64).div_euclid(2),
   );
   Rotated {
      buffer: rotated,
      offset,
   }
}

fn rotate_free(buffer: &RgbaImage, degrees: f32) -> RgbaImage {
   let (width, height) = buffer.dimensions();
   let (out_w, out_h) = rotated_size(width, height, degrees);

   // 四周补一圈透明像素，边缘插值时才能得到半透明过渡
   let mut padded = RgbaImage::from_pixel(width + 2, height + 2, TRANSPARENT);
   replace(&mut padded, buffer, 1, 1);
   premultiply(&mut padded);

   let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
      * Projection::rotate(-degrees.to_radians())
      * Projection::translate(-(width as f32 / 2.0 + 1.0), -(height as f32 / 2.0 + 1.0));
   let mut out = RgbaImage::from_pixel(out_w, out_h, TRANSPARENT);
   warp_into(&padded, &projection, Interpolation::Bilinear, TRANSPARENT, &mut out);
   unpremultiply(&mut out);
   out
}

fn premultiply(buffer: &mut RgbaImage) {
   for pixel in buffer.pixels_mut() {
      let alpha = pixel[3] as f32 / 255.0;
      for c in 0..3 {
         pixel[c] = (pixel[c] as f32 * alpha).round() as u8;
      }
   }
}

fn unpremultiply(buffer: &mut RgbaImage) {
   for pixel in buffer.pixels_mut() {
      match pixel[3] {
         0 => *pixel = TRANSPARENT,
         255 => {}
         a => {
            let scale = 255.0 / a as f32;
            for c in 0..3 {
               pixel[c] = (pixel[c] as f32 * scale).round().min(255.0) as u8;
            }
         }
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

   /// alpha 不低于阈值的像素范围 (x, y, w, h)
   fn solid_bounds(img: &RgbaImage, threshold: u8) -> (u32, u32, u32, u32) {
      let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
      for (x, y, p) in img.enumerate_pixels() {
         if p[3] >= threshold {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
         }
      }
      (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
   }

   fn centroid(img: &RgbaImage) -> (f32, f32) {
      let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
      for (x, y, p) in img.enumerate_pixels() {
         if p[3] > 0 {
            sx += x as f32;
            sy += y as f32;
            n += 1.0;
         }
      }
      (sx / n, sy / n)
   }

   #[test]
   fn test_zero_angle_is_identity() {
      let mut src = RgbaImage::from_pixel(13, 7, Rgba([1, 2, 3, 128]));
      src.put_pixel(3, 3, RED);
      let rotated = rotate(&src, 0.0);
      assert_eq!(rotated.buffer, src);
      assert_eq!(rotated.offset, (0, 0));
   }

   #[test]
   fn test_angle_is_clamped() {
      assert_eq!(normalize_angle(270.0), 180.0);
      assert_eq!(normalize_angle(-400.0), -180.0);
      assert_eq!(normalize_angle(f32::NAN), 0.0);
   }

   #[test]
   fn test_rotated_size_contains_rotated_rectangle() {
      let (w, h) = rotated_size(60, 30, 30.0);
      assert!(w as f64 >= 60.0 * 30f64.to_radians().cos() + 30.0 * 0.5);
      assert!(h as f64 >= 60.0 * 0.5 + 30.0 * 30f64.to_radians().cos());
      assert_eq!((w - 60) % 2, 0);
      assert_eq!((h - 30) % 2, 0);
   }

   #[test]
   fn test_expanded_buffer_keeps_every_corner() {
      let src = RgbaImage::from_pixel(60, 30, RED);
      let rotated = rotate(&src, 45.0);
      let (w, h) = rotated.buffer.dimensions();
      assert!(w > 60 && h > 30);
      // 四角是新露出的区域，必须透明
      for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
         assert_eq!(rotated.buffer.get_pixel(x, y)[3], 0);
      }
      // 中心仍是不透明的原色
      let center = rotated.buffer.get_pixel(w / 2, h / 2);
      assert!(center[0] >= 250 && center[1] <= 5 && center[3] >= 250, "{center:?}");
      assert_eq!(rotated.offset, ((w as i64 - 60) / 2, (h as i64 - 30) / 2));
   }

   #[test]
   fn test_no_dark_fringe_on_edges() {
      let src = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
      let rotated = rotate(&src, 20.0);
      for p in rotated.buffer.pixels().filter(|p| p[3] > 0) {
         assert!(p[0] >= 250, "fringe pixel {:?}", p);
      }
   }

   #[test]
   fn test_round_trip_restores_dimensions() {
      let src = RgbaImage::from_pixel(60, 30, RED);
      for angle in [15.0f32, 30.0, 73.0, -120.0] {
         let there = rotate(&src, angle);
         let back = rotate(&there.buffer, -angle);
         let (_, _, w, h) = solid_bounds(&back.buffer, 128);
         assert!((w as i64 - 60).abs() <= 1, "{angle}: width {w}");
         assert!((h as i64 - 30).abs() <= 1, "{angle}: height {h}");
      }
   }

   #[test]
   fn test_quarter_turns_are_exact() {
      let mut src = RgbaImage::from_pixel(6, 4, TRANSPARENT);
      src.put_pixel(5, 0, RED);
      let ccw = rotate(&src, 90.0);
      assert_eq!(ccw.buffer.dimensions(), (4, 6));
      assert_eq!(ccw.buffer.get_pixel(0, 0), &RED);
      assert_eq!(ccw.offset, (-1, 1));

      let back = rotate(&ccw.buffer, -90.0);
      assert_eq!(back.buffer, src);

      let half = rotate(&src, 180.0);
      assert_eq!(half.buffer.get_pixel(0, 3), &RED);
   }

   #[test]
   fn test_free_rotation_turns_same_way_as_quarter_turn() {
      let mut src = RgbaImage::from_pixel(41, 41, TRANSPARENT);
      for y in 18..23 {
         for x in 34..41 {
            src.put_pixel(x, y, RED);
         }
      }
      let exact = rotate(&src, 90.0);
      let approx = rotate(&src, 85.0);
      let (ex, ey) = centroid(&exact.buffer);
      let (ax, ay) = centroid(&approx.buffer);
      let (aw, ah) = approx.buffer.dimensions();
      // 右侧的标记逆时针转到上方
      assert!(ey < 10.0 && (ex - 20.0).abs() < 2.0);
      assert!(ay < ah as f32 / 2.0 - 10.0, "marker at ({ax}, {ay})");
      assert!((ax - aw as f32 / 2.0).abs() < 5.0, "marker at ({ax}, {ay})");
   }
}
