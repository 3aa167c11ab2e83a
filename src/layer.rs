//! 水印图层模型
//!
//! 三种图层（EXIF时间文本、自定义文本、Logo图片）共享启用状态、不透明度和放置方式，
//! 通过同一个 [`WatermarkLayer::render`] 入口输出 RGBA 缓冲区。
//! 叠放顺序固定：EXIF → 文本 → 图片。

use crate::color::Color;
use crate::logo::render_logo;
use crate::position::{Anchor, Placement};
use crate::text::{default_font, render_text};
use ab_glyph::FontArc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 不透明度（0 - 100），构造时自动截断到范围内
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Opacity(u8);

impl Opacity {
   pub const OPAQUE: Opacity = Opacity(100);
   pub const TRANSPARENT: Opacity = Opacity(0);

   pub fn new(percent: u8) -> Self {
      Self(percent.min(100))
   }

   pub fn percent(&self) -> u8 {
      self.0
   }

   pub fn factor(&self) -> f32 {
      self.0 as f32 / 100.0
   }

   pub fn is_opaque(&self) -> bool {
      self.0 == 100
   }
}

impl Default for Opacity {
   fn default() -> Self {
      Self::OPAQUE
   }
}

impl From<u8> for Opacity {
   fn from(value: u8) -> Self {
      Self::new(value)
   }
}

impl From<Opacity> for u8 {
   fn from(value: Opacity) -> Self {
      value.0
   }
}

/// 文字描边
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
   pub width: u32,
   pub color: Color,
}

/// 文字阴影
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
   pub offset_x: i32,
   pub offset_y: i32,
   pub color: Color,
   pub opacity: Opacity,
}

impl Default for Shadow {
   fn default() -> Self {
      Self {
         offset_x: 2,
         offset_y: 2,
         color: Color::BLACK,
         opacity: Opacity::new(60),
      }
   }
}

/// 文本图层样式
#[derive(Clone)]
pub struct TextStyle {
   pub text: String,
   pub font_size: u32,
   pub color: Color,
   pub stroke: Option<Stroke>,
   pub shadow: Option<Shadow>,
   pub font: FontArc,
}

impl TextStyle {
   pub fn new(text: impl Into<String>) -> Self {
      Self {
         text: text.into(),
         ..Self::default()
      }
   }
}

impl Default for TextStyle {
   fn default() -> Self {
      Self {
         text: String::new(),
         font_size: 24,
         color: Color::WHITE,
         stroke: None,
         shadow: None,
         font: default_font(),
      }
   }
}

impl fmt::Debug for TextStyle {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TextStyle")
         .field("text", &self.text)
         .field("font_size", &self.font_size)
         .field("color", &self.color)
         .field("stroke", &self.stroke)
         .field("shadow", &self.shadow)
         .finish_non_exhaustive()
   }
}

/// Logo 缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoScale {
   /// 宽高同时按百分比缩放
   Percent(f32),
   /// 指定宽度，高度按原图比例计算
   Width(u32),
   /// 指定高度，宽度按原图比例计算
   Height(u32),
   /// 拉伸到精确尺寸
   Exact { width: u32, height: u32 },
}

impl Default for LogoScale {
   fn default() -> Self {
      LogoScale::Percent(100.0)
   }
}

/// Logo 图层
#[derive(Clone, Default)]
pub struct LogoStyle {
   /// 没有加载到图片时图层视为禁用
   pub source: Option<Arc<RgbaImage>>,
   pub scale: LogoScale,
}

impl LogoStyle {
   pub fn new(source: RgbaImage, scale: LogoScale) -> Self {
      Self {
         source: Some(Arc::new(source)),
         scale,
      }
   }
}

impl fmt::Debug for LogoStyle {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("LogoStyle")
         .field("source", &self.source.as_ref().map(|img| img.dimensions()))
         .field("scale", &self.scale)
         .finish()
   }
}

/// 图层种类，声明顺序即叠放顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
   ExifText,
   CustomText,
   Logo,
}

#[derive(Debug, Clone)]
pub enum LayerContent {
   ExifText(TextStyle),
   CustomText(TextStyle),
   Logo(LogoStyle),
}

/// 渲染结果：裁切到墨迹范围的 RGBA 缓冲区
#[derive(Debug, Clone)]
pub struct RenderedLayer {
   pub buffer: RgbaImage,
}

impl RenderedLayer {
   pub fn bbox(&self) -> (u32, u32) {
      self.buffer.dimensions()
   }
}

#[derive(Debug, Clone)]
pub struct WatermarkLayer {
   pub enabled: bool,
   pub opacity: Opacity,
   pub placement: Placement,
   pub content: LayerContent,
}

impl WatermarkLayer {
   /// EXIF时间图层，文本在每张图片处理时填入
   pub fn exif_text(style: TextStyle) -> Self {
      Self::with_content(LayerContent::ExifText(style), Anchor::BottomRight)
   }

   pub fn custom_text(style: TextStyle) -> Self {
      Self::with_content(LayerContent::CustomText(style), Anchor::Center)
   }

   pub fn logo(style: LogoStyle) -> Self {
      Self::with_content(LayerContent::Logo(style), Anchor::TopLeft)
   }

   fn with_content(content: LayerContent, anchor: Anchor) -> Self {
      Self {
         enabled: true,
         opacity: Opacity::OPAQUE,
         placement: Placement::Anchor(anchor),
         content,
      }
   }

   pub fn with_opacity(mut self, opacity: u8) -> Self {
      self.opacity = Opacity::new(opacity);
      self
   }

   pub fn with_placement(mut self, placement: impl Into<Placement>) -> Self {
      self.placement = placement.into();
      self
   }

   pub fn kind(&self) -> LayerKind {
      match self.content {
         LayerContent::ExifText(_) => LayerKind::ExifText,
         LayerContent::CustomText(_) => LayerKind::CustomText,
         LayerContent::Logo(_) => LayerKind::Logo,
      }
   }

   pub fn text_style(&self) -> Option<&TextStyle> {
      match &self.content {
         LayerContent::ExifText(style) | LayerContent::CustomText(style) => Some(style),
         LayerContent::Logo(_) => None,
      }
   }

   pub fn text_style_mut(&mut self) -> Option<&mut TextStyle> {
      match &mut self.content {
         LayerContent::ExifText(style) | LayerContent::CustomText(style) => Some(style),
         LayerContent::Logo(_) => None,
      }
   }

   /// 是否会对合成结果产生影响
   ///
   /// 禁用、不透明度为 0、空文本以及没有源图的 Logo 都视为不可见。
   pub fn is_visible(&self) -> bool {
      if !self.enabled || self.opacity == Opacity::TRANSPARENT {
         return false;
      }
      match &self.content {
         LayerContent::ExifText(style) | LayerContent::CustomText(style) => {
            !style.text.trim().is_empty()
         }
         LayerContent::Logo(logo) => logo.source.is_some(),
      }
   }

   /// 选择锚点，同时清除手动坐标
   pub fn select_anchor(&mut self, anchor: Anchor) {
      self.placement = Placement::Anchor(anchor);
   }

   /// 拖拽到相对坐标，锚点随之取消
   pub fn drag_to(&mut self, rel_x: f32, rel_y: f32) {
      self.placement = Placement::manual(rel_x, rel_y);
   }

   /// 渲染图层，不可见或没有墨迹时返回 `None`
   pub fn render(&self) -> Option<RenderedLayer> {
      if !self.is_visible() {
         return None;
      }
      match &self.content {
         LayerContent::ExifText(style) | LayerContent::CustomText(style) => {
            render_text(style, self.opacity)
         }
         LayerContent::Logo(logo) => {
            let source = logo.source.as_ref()?;
            Some(render_logo(source, logo.scale, self.opacity))
         }
      }
   }
}
