//! 水印位置计算
//!
//! 把图层的放置方式（九宫格锚点或手动相对坐标）、图层尺寸与画布尺寸换算成
//! 图层左上角在画布上的像素坐标。

use crate::error::MarkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 非居中锚点距画布边缘的固定边距（像素）
pub const DEFAULT_MARGIN: u32 = 20;

/// 九宫格锚点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
   TopLeft,
   TopCenter,
   TopRight,
   CenterLeft,
   Center,
   CenterRight,
   BottomLeft,
   BottomCenter,
   BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
   Start,
   Middle,
   End,
}

impl Anchor {
   pub const ALL: [Anchor; 9] = [
      Anchor::TopLeft,
      Anchor::TopCenter,
      Anchor::TopRight,
      Anchor::CenterLeft,
      Anchor::Center,
      Anchor::CenterRight,
      Anchor::BottomLeft,
      Anchor::BottomCenter,
      Anchor::BottomRight,
   ];

   pub fn name(&self) -> &'static str {
      match self {
         Anchor::TopLeft => "top-left",
         Anchor::TopCenter => "top-center",
         Anchor::TopRight => "top-right",
         Anchor::CenterLeft => "center-left",
         Anchor::Center => "center",
         Anchor::CenterRight => "center-right",
         Anchor::BottomLeft => "bottom-left",
         Anchor::BottomCenter => "bottom-center",
         Anchor::BottomRight => "bottom-right",
      }
   }

   /// (水平, 垂直) 对齐方式
   fn align(&self) -> (Align, Align) {
      use Align::*;
      match self {
         Anchor::TopLeft => (Start, Start),
         Anchor::TopCenter => (Middle, Start),
         Anchor::TopRight => (End, Start),
         Anchor::CenterLeft => (Start, Middle),
         Anchor::Center => (Middle, Middle),
         Anchor::CenterRight => (End, Middle),
         Anchor::BottomLeft => (Start, End),
         Anchor::BottomCenter => (Middle, End),
         Anchor::BottomRight => (End, End),
      }
   }
}

impl fmt::Display for Anchor {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.name())
   }
}

impl FromStr for Anchor {
   type Err = MarkError;

   fn from_str(s: &str) -> Result<Self, Self::Err> {
      let value = s.trim().to_lowercase().replace('_', "-");
      Anchor::ALL
         .into_iter()
         .find(|anchor| anchor.name() == value)
         .ok_or_else(|| MarkError::InvalidConfiguration(format!("未知的水印位置：{s}")))
   }
}

/// 图层放置方式，任意时刻只有一种生效
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
   Anchor(Anchor),
   /// 图层中心点相对画布宽高的比例（0.0 - 1.0）
   Manual { rel_x: f32, rel_y: f32 },
}

impl Placement {
   /// 手动坐标，超出范围的值会被截断到 0.0 - 1.0
   pub fn manual(rel_x: f32, rel_y: f32) -> Self {
      let clamp = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
      Placement::Manual {
         rel_x: clamp(rel_x),
         rel_y: clamp(rel_y),
      }
   }

   pub fn is_manual(&self) -> bool {
      matches!(self, Placement::Manual { .. })
   }

   /// 同一放置方式的多个图层叠在一起时，`inner` 在 `outer` 内的偏移
   ///
   /// 按锚点方向对齐，手动坐标居中。
   pub fn inset(&self, outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
      let (h, v) = match self {
         Placement::Anchor(anchor) => anchor.align(),
         Placement::Manual { .. } => (Align::Middle, Align::Middle),
      };
      let axis = |outer: u32, inner: u32, align: Align| {
         let room = outer.saturating_sub(inner);
         match align {
            Align::Start => 0,
            Align::Middle => room / 2,
            Align::End => room,
         }
      };
      (axis(outer.0, inner.0, h), axis(outer.1, inner.1, v))
   }
}

impl Default for Placement {
   fn default() -> Self {
      Placement::Anchor(Anchor::BottomRight)
   }
}

impl From<Anchor> for Placement {
   fn from(anchor: Anchor) -> Self {
      Placement::Anchor(anchor)
   }
}

/// 位置计算器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionResolver {
   /// 非居中锚点的边距
   pub margin: u32,
   /// 手动坐标是否允许图层超出画布
   pub allow_overflow: bool,
}

impl Default for PositionResolver {
   fn default() -> Self {
      Self {
         margin: DEFAULT_MARGIN,
         allow_overflow: false,
      }
   }
}

impl PositionResolver {
   pub fn with_margin(margin: u32) -> Self {
      Self {
         margin,
         ..Self::default()
      }
   }

   /// # 计算图层左上角坐标
   ///
   /// # 参数
   /// * `canvas` - 画布宽高
   /// * `bbox` - 图层渲染后的宽高
   /// * `placement` - 锚点或手动相对坐标
   ///
   /// 图层比画布大时，该方向上的坐标截断为 0，不会出现负偏移。
   pub fn resolve(&self, canvas: (u32, u32), bbox: (u32, u32), placement: Placement) -> (i64, i64) {
      let (canvas_w, canvas_h) = (canvas.0 as i64, canvas.1 as i64);
      let (box_w, box_h) = (bbox.0 as i64, bbox.1 as i64);
      match placement {
         Placement::Anchor(anchor) => {
            let (h, v) = anchor.align();
            (
               self.align_axis(canvas_w, box_w, h),
               self.align_axis(canvas_h, box_h, v),
            )
         }
         Placement::Manual { rel_x, rel_y } => (
            self.manual_axis(canvas_w, box_w, rel_x),
            self.manual_axis(canvas_h, box_h, rel_y),
         ),
      }
   }

   fn align_axis(&self, canvas: i64, size: i64, align: Align) -> i64 {
      if size >= canvas {
         return 0;
      }
      let margin = self.margin as i64;
      let offset = match align {
         Align::Start => margin,
         Align::Middle => (canvas - size) / 2,
         Align::End => canvas - size - margin,
      };
      offset.max(0)
   }

   fn manual_axis(&self, canvas: i64, size: i64, rel: f32) -> i64 {
      let offset = (rel as f64 * canvas as f64 - size as f64 / 2.0).floor() as i64;
      if self.allow_overflow {
         offset
      } else {
         offset.clamp(0, (canvas - size).max(0))
      }
   }
}
