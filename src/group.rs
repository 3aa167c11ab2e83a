//! 水印组：图层集合、整体旋转角度和位置计算器
//!
//! 放置方式完全相同的图层先叠成一块，再作为一个整体定位和旋转，
//! 所以所有图层共用一个锚点时，整组绕同一个中心旋转。

use crate::compose::overlay_at;
use crate::layer::{LayerKind, RenderedLayer, WatermarkLayer};
use crate::position::{Placement, PositionResolver};
use crate::rotation::normalize_angle;
use image::RgbaImage;

/// 已定位、尚未旋转的一块水印
#[derive(Debug, Clone)]
pub struct Assembly {
   pub buffer: RgbaImage,
   /// 未旋转时左上角在画布上的坐标
   pub origin: (i64, i64),
   pub placement: Placement,
}

#[derive(Debug, Clone, Default)]
pub struct WatermarkGroup {
   layers: Vec<WatermarkLayer>,
   rotation: f32,
   resolver: PositionResolver,
}

impl WatermarkGroup {
   /// 图层按 EXIF → 文本 → 图片 排序，同类图层保持传入顺序
   pub fn new(mut layers: Vec<WatermarkLayer>) -> Self {
      layers.sort_by_key(|layer| layer.kind());
      Self {
         layers,
         ..Self::default()
      }
   }

   pub fn push(&mut self, layer: WatermarkLayer) {
      let index = self.layers.partition_point(|l| l.kind() <= layer.kind());
      self.layers.insert(index, layer);
   }

   pub fn with_rotation(mut self, degrees: f32) -> Self {
      self.set_rotation(degrees);
      self
   }

   /// 旋转角度截断到 [-180, 180]
   pub fn set_rotation(&mut self, degrees: f32) {
      self.rotation = normalize_angle(degrees);
   }

   pub fn rotation(&self) -> f32 {
      self.rotation
   }

   pub fn with_resolver(mut self, resolver: PositionResolver) -> Self {
      self.resolver = resolver;
      self
   }

   pub fn resolver(&self) -> &PositionResolver {
      &self.resolver
   }

   pub fn layers(&self) -> &[WatermarkLayer] {
      &self.layers
   }

   pub fn layer(&self, kind: LayerKind) -> Option<&WatermarkLayer> {
      self.layers.iter().find(|l| l.kind() == kind)
   }

   pub fn layer_mut(&mut self, kind: LayerKind) -> Option<&mut WatermarkLayer> {
      self.layers.iter_mut().find(|l| l.kind() == kind)
   }

   pub fn visible_layers(&self) -> impl Iterator<Item = &WatermarkLayer> {
      self.layers.iter().filter(|l| l.is_visible())
   }

   /// 填入当前图片的拍摄时间，返回新的水印组
   pub fn for_timestamp(&self, timestamp: &str) -> Self {
      let mut group = self.clone();
      for layer in group.layers.iter_mut().filter(|l| l.kind() == LayerKind::ExifText) {
         if let Some(style) = layer.text_style_mut() {
            style.text = timestamp.to_string();
         }
      }
      group
   }

   /// # 渲染并定位所有可见图层
   ///
   /// # 参数
   /// * `canvas` - 底图宽高
   ///
   /// 返回值按首个成员的叠放顺序排列，每块内部后渲染的图层在上。
   pub fn assemble(&self, canvas: (u32, u32)) -> Vec<Assembly> {
      let mut clusters: Vec<(Placement, Vec<RenderedLayer>)> = Vec::new();
      for layer in self.visible_layers() {
         let Some(rendered) = layer.render() else {
            continue;
         };
         match clusters.iter_mut().find(|(p, _)| *p == layer.placement) {
            Some((_, members)) => members.push(rendered),
            None => clusters.push((layer.placement, vec![rendered])),
         }
      }

      clusters
         .into_iter()
         .map(|(placement, members)| {
            let width = members.iter().map(|m| m.buffer.width()).max().unwrap_or(1);
            let height = members.iter().map(|m| m.buffer.height()).max().unwrap_or(1);
            let mut buffer = RgbaImage::new(width, height);
            for member in &members {
               let (x, y) = placement.inset((width, height), member.bbox());
               overlay_at(&mut buffer, &member.buffer, x as i64, y as i64);
            }
            let origin = self.resolver.resolve(canvas, (width, height), placement);
            Assembly {
               buffer,
               origin,
               placement,
            }
         })
         .collect()
   }
}
