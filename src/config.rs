//! 配置文件（TOML）
//!
//! 每个字段都有默认值，缺省的段落和字段按默认值处理；命令行参数在此基础上覆盖。

use crate::color::Color;
use crate::error::{MarkError, Result};
use crate::export::{ExportSpec, OutputFormat, Resize};
use crate::group::WatermarkGroup;
use crate::layer::{LogoScale, LogoStyle, Opacity, Shadow, Stroke, TextStyle, WatermarkLayer};
use crate::position::{Anchor, Placement, PositionResolver, DEFAULT_MARGIN};
use crate::text::{MAX_SHADOW_OFFSET, MAX_STROKE_WIDTH, load_font_or_default};
use crate::timestamp::{DEFAULT_DISPLAY_FORMAT, TimestampResolver};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   /// EXIF 时间图层
   pub exif: ExifSection,
   /// 自定义文本图层
   pub text: TextSection,
   /// Logo 图层
   pub logo: LogoSection,
   pub group: GroupSection,
   pub export: ExportSection,
   pub batch: BatchSection,
   pub logging: LoggingSection,
}

/// 两种文本图层共用的样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSection {
   pub enabled: bool,
   /// 自定义文本内容，EXIF 图层忽略该字段
   pub content: String,
   /// 字体文件，加载失败时使用内置字体
   pub font: Option<PathBuf>,
   pub font_size: u32,
   pub color: Color,
   pub opacity: u8,
   /// 不填时 EXIF 在右下角，自定义文本居中
   pub position: Option<Anchor>,
   /// 手动相对坐标 [x, y]，优先于 `position`
   pub manual: Option<[f32; 2]>,
   /// 0 表示不描边
   pub stroke_width: u32,
   pub stroke_color: Color,
   pub shadow: bool,
   pub shadow_offset: [i32; 2],
   pub shadow_color: Color,
   pub shadow_opacity: u8,
}

impl Default for TextSection {
   fn default() -> Self {
      Self {
         enabled: true,
         content: String::new(),
         font: None,
         font_size: 24,
         color: Color::WHITE,
         opacity: 100,
         position: None,
         manual: None,
         stroke_width: 0,
         stroke_color: Color::BLACK,
         shadow: false,
         shadow_offset: [2, 2],
         shadow_color: Color::BLACK,
         shadow_opacity: 60,
      }
   }
}

impl TextSection {
   fn style(&self, text: &str) -> TextStyle {
      TextStyle {
         text: text.to_string(),
         font_size: self.font_size,
         color: self.color,
         stroke: (self.stroke_width > 0).then_some(Stroke {
            width: self.stroke_width,
            color: self.stroke_color,
         }),
         shadow: self.shadow.then_some(Shadow {
            offset_x: self.shadow_offset[0],
            offset_y: self.shadow_offset[1],
            color: self.shadow_color,
            opacity: Opacity::new(self.shadow_opacity),
         }),
         font: load_font_or_default(self.font.as_deref()),
      }
   }

   fn finish(&self, mut layer: WatermarkLayer) -> WatermarkLayer {
      layer.enabled = self.enabled;
      layer.opacity = Opacity::new(self.opacity);
      if let Some(placement) = placement(self.position, self.manual) {
         layer.placement = placement;
      }
      layer
   }

   fn validate(&self, section: &str) -> Result<()> {
      if self.font_size == 0 {
         return Err(invalid(format!("{section}.font_size 必须大于 0")));
      }
      if self.opacity > 100 || self.shadow_opacity > 100 {
         return Err(invalid(format!("{section}.opacity 取值范围为 0 - 100")));
      }
      if self.stroke_width > MAX_STROKE_WIDTH {
         return Err(invalid(format!("{section}.stroke_width 不能超过 {MAX_STROKE_WIDTH}")));
      }
      if self.shadow_offset.iter().any(|v| v.unsigned_abs() > MAX_SHADOW_OFFSET as u32) {
         return Err(invalid(format!(
            "{section}.shadow_offset 取值范围为 -{MAX_SHADOW_OFFSET} - {MAX_SHADOW_OFFSET}"
         )));
      }
      validate_manual(section, self.manual)
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExifSection {
   /// chrono 时间格式
   pub timestamp_format: String,
   #[serde(flatten)]
   pub style: TextSection,
}

impl Default for ExifSection {
   fn default() -> Self {
      Self {
         timestamp_format: DEFAULT_DISPLAY_FORMAT.to_string(),
         style: TextSection::default(),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoSection {
   pub enabled: bool,
   pub path: Option<PathBuf>,
   /// 按百分比缩放，默认 100
   pub percent: Option<f32>,
   /// 只给宽或高时保持比例，两者都给时拉伸
   pub width: Option<u32>,
   pub height: Option<u32>,
   pub opacity: u8,
   pub position: Option<Anchor>,
   pub manual: Option<[f32; 2]>,
}

impl Default for LogoSection {
   fn default() -> Self {
      Self {
         enabled: true,
         path: None,
         percent: None,
         width: None,
         height: None,
         opacity: 100,
         position: None,
         manual: None,
      }
   }
}

impl LogoSection {
   pub fn scale(&self) -> LogoScale {
      match (self.width, self.height) {
         (Some(width), Some(height)) => LogoScale::Exact { width, height },
         (Some(width), None) => LogoScale::Width(width),
         (None, Some(height)) => LogoScale::Height(height),
         (None, None) => LogoScale::Percent(self.percent.unwrap_or(100.0)),
      }
   }

   /// 读取 Logo 图片，失败时图层视为禁用
   fn layer(&self) -> Option<WatermarkLayer> {
      let path = self.path.as_ref()?;
      let source = match image::open(path) {
         Ok(img) => Some(img.to_rgba8()),
         Err(e) => {
            warn!(path = %path.display(), "Logo 加载失败，已禁用该图层：{e}");
            None
         }
      };
      let style = LogoStyle {
         source: source.map(Into::into),
         scale: self.scale(),
      };
      let mut layer = WatermarkLayer::logo(style).with_opacity(self.opacity);
      layer.enabled = self.enabled;
      if let Some(placement) = placement(self.position, self.manual) {
         layer.placement = placement;
      }
      Some(layer)
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSection {
   /// 整组旋转角度（-180 - 180），正值逆时针
   pub rotation: f32,
   /// 锚点距画布边缘的距离
   pub margin: u32,
   /// 手动坐标是否允许超出画布
   pub allow_overflow: bool,
}

impl Default for GroupSection {
   fn default() -> Self {
      Self {
         rotation: 0.0,
         margin: DEFAULT_MARGIN,
         allow_overflow: false,
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
   pub format: OutputFormat,
   pub jpeg_quality: u8,
   pub output_dir: Option<PathBuf>,
   pub name_prefix: String,
   pub name_suffix: String,
   pub allow_export_to_input: bool,
   pub background: Color,
   pub resize_width: Option<u32>,
   pub resize_height: Option<u32>,
   pub resize_percent: Option<f32>,
}

impl Default for ExportSection {
   fn default() -> Self {
      let spec = ExportSpec::default();
      Self {
         format: spec.format,
         jpeg_quality: spec.jpeg_quality,
         output_dir: None,
         name_prefix: String::new(),
         name_suffix: String::new(),
         allow_export_to_input: false,
         background: spec.background,
         resize_width: None,
         resize_height: None,
         resize_percent: None,
      }
   }
}

impl ExportSection {
   pub fn resize(&self) -> Resize {
      match (self.resize_width, self.resize_height, self.resize_percent) {
         (Some(width), Some(height), _) => Resize::WidthHeight { width, height },
         (Some(width), None, _) => Resize::Width(width),
         (None, Some(height), _) => Resize::Height(height),
         (None, None, Some(percent)) => Resize::Percent(percent),
         (None, None, None) => Resize::None,
      }
   }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
   /// 并行数量，不填时为 CPU 核数
   pub jobs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
   /// trace / debug / info / warn / error
   pub level: String,
   /// pretty 或 json
   pub format: String,
}

impl Default for LoggingSection {
   fn default() -> Self {
      Self {
         level: "info".to_string(),
         format: "pretty".to_string(),
      }
   }
}

impl Config {
   /// 读取并校验配置文件
   pub fn load_from(path: &Path) -> Result<Self> {
      let content = fs::read_to_string(path)?;
      let config: Config = toml::from_str(&content)?;
      config.validate()?;
      Ok(config)
   }

   /// 检查取值范围
   pub fn validate(&self) -> Result<()> {
      self.exif.style.validate("exif")?;
      self.text.validate("text")?;
      TimestampResolver::new(self.exif.timestamp_format.as_str())?;

      if self.logo.opacity > 100 {
         return Err(invalid("logo.opacity 取值范围为 0 - 100".into()));
      }
      if self.logo.percent.is_some_and(|p| !(p > 0.0)) {
         return Err(invalid("logo.percent 必须大于 0".into()));
      }
      if self.logo.width == Some(0) || self.logo.height == Some(0) {
         return Err(invalid("logo.width / logo.height 必须大于 0".into()));
      }
      validate_manual("logo", self.logo.manual)?;

      if !self.group.rotation.is_finite() {
         return Err(invalid("group.rotation 必须是有效数字".into()));
      }
      if self.export.jpeg_quality > 100 {
         return Err(invalid("export.jpeg_quality 取值范围为 0 - 100".into()));
      }
      self.export.resize().validate()?;
      if self.batch.jobs == Some(0) {
         return Err(invalid("batch.jobs 必须大于 0".into()));
      }
      if !matches!(self.logging.format.as_str(), "pretty" | "json") {
         return Err(invalid(format!("logging.format 只能是 pretty 或 json：{}", self.logging.format)));
      }
      Ok(())
   }

   /// 按配置构建水印组，EXIF 图层的文本在处理每张图片时填入
   pub fn build_group(&self) -> WatermarkGroup {
      let exif = &self.exif.style;
      let text = &self.text;
      let mut layers = vec![
         exif.finish(WatermarkLayer::exif_text(exif.style(""))),
         text.finish(WatermarkLayer::custom_text(text.style(&text.content))),
      ];
      layers.extend(self.logo.layer());
      WatermarkGroup::new(layers)
         .with_rotation(self.group.rotation)
         .with_resolver(PositionResolver {
            margin: self.group.margin,
            allow_overflow: self.group.allow_overflow,
         })
   }

   pub fn export_spec(&self) -> ExportSpec {
      let export = &self.export;
      ExportSpec {
         format: export.format,
         jpeg_quality: export.jpeg_quality.min(100),
         resize: export.resize(),
         name_prefix: export.name_prefix.clone(),
         name_suffix: export.name_suffix.clone(),
         output_dir: export.output_dir.clone(),
         allow_export_to_input: export.allow_export_to_input,
         background: export.background,
      }
   }

   pub fn timestamp_resolver(&self) -> Result<TimestampResolver> {
      TimestampResolver::new(self.exif.timestamp_format.as_str())
   }
}

fn placement(position: Option<Anchor>, manual: Option<[f32; 2]>) -> Option<Placement> {
   match (manual, position) {
      (Some([x, y]), _) => Some(Placement::manual(x, y)),
      (None, Some(anchor)) => Some(Placement::Anchor(anchor)),
      (None, None) => None,
   }
}

fn validate_manual(section: &str, manual: Option<[f32; 2]>) -> Result<()> {
   match manual {
      Some(point) if point.iter().any(|v| !(0.0..=1.0).contains(v)) => {
         Err(invalid(format!("{section}.manual 的取值范围为 0.0 - 1.0")))
      }
      _ => Ok(()),
   }
}

fn invalid(message: String) -> MarkError {
   MarkError::InvalidConfiguration(message)
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::layer::LayerKind;
   use image::{Rgba, RgbaImage};

   #[test]
   fn test_default_config() {
      let config = Config::default();
      assert!(config.validate().is_ok());
      assert_eq!(config.exif.style.font_size, 24);
      assert_eq!(config.export.jpeg_quality, 95);
      assert_eq!(config.group.margin, DEFAULT_MARGIN);
      assert_eq!(config.export.resize(), Resize::None);
   }

   #[test]
   fn test_default_group_layout() {
      let group = Config::default().build_group();
      let kinds: Vec<_> = group.layers().iter().map(|l| l.kind()).collect();
      assert_eq!(kinds, [LayerKind::ExifText, LayerKind::CustomText]);
      let exif = group.layer(LayerKind::ExifText).unwrap();
      assert_eq!(exif.placement, Placement::Anchor(Anchor::BottomRight));
      // 没有内容的自定义文本不可见
      assert!(!group.layer(LayerKind::CustomText).unwrap().is_visible());
   }

   #[test]
   fn test_parse_toml() {
      let config: Config = toml::from_str(
         r##"
         [exif]
         timestamp_format = "%Y/%m/%d"
         color = "#ffcc00"
         position = "top-left"
         shadow = true

         [text]
         content = "SAMPLE"
         opacity = 50
         manual = [0.25, 0.75]
         stroke_width = 2

         [group]
         rotation = -15.0

         [export]
         format = "jpeg"
         resize_width = 800
         name_suffix = "_wm"

         [logging]
         format = "json"
         "##,
      )
      .unwrap();
      assert!(config.validate().is_ok());
      assert_eq!(config.exif.timestamp_format, "%Y/%m/%d");
      assert_eq!(config.exif.style.color, Color::rgb(255, 204, 0));
      assert_eq!(config.export.format, OutputFormat::Jpeg);
      assert_eq!(config.export.resize(), Resize::Width(800));

      let group = config.build_group();
      assert_eq!(group.rotation(), -15.0);
      let exif = group.layer(LayerKind::ExifText).unwrap();
      assert_eq!(exif.placement, Placement::Anchor(Anchor::TopLeft));
      assert!(exif.text_style().unwrap().shadow.is_some());
      let text = group.layer(LayerKind::CustomText).unwrap();
      assert_eq!(text.placement, Placement::Manual { rel_x: 0.25, rel_y: 0.75 });
      assert_eq!(text.opacity, Opacity::new(50));
      assert_eq!(text.text_style().unwrap().stroke.unwrap().width, 2);
   }

   #[test]
   fn test_output_format_accepts_auto() {
      let config: Config = toml::from_str("[export]\nformat = \"auto\"\n").unwrap();
      assert_eq!(config.export.format, OutputFormat::Inherit);
   }

   #[test]
   fn test_validate_rejects_bad_values() {
      let mut config = Config::default();
      config.text.font_size = 0;
      assert!(config.validate().unwrap_err().to_string().contains("font_size"));

      let mut config = Config::default();
      config.export.resize_percent = Some(0.0);
      assert!(config.validate().is_err());

      let mut config = Config::default();
      config.exif.timestamp_format = "%Q".into();
      assert!(config.validate().is_err());

      let mut config = Config::default();
      config.logging.format = "xml".into();
      assert!(config.validate().is_err());

      let mut config = Config::default();
      config.logo.manual = Some([1.5, 0.0]);
      assert!(config.validate().is_err());

      let mut config = Config::default();
      config.exif.style.shadow_offset = [i32::MIN, 0];
      assert!(config.validate().unwrap_err().to_string().contains("shadow_offset"));

      let mut config = Config::default();
      config.text.stroke_width = MAX_STROKE_WIDTH + 1;
      assert!(config.validate().unwrap_err().to_string().contains("stroke_width"));
   }

   #[test]
   fn test_load_from_file() {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("mark.toml");
      fs::write(&path, "[group]\nmargin = 8\n").unwrap();
      let config = Config::load_from(&path).unwrap();
      assert_eq!(config.group.margin, 8);
      assert_eq!(config.build_group().resolver().margin, 8);

      fs::write(&path, "[group\nmargin = ").unwrap();
      assert!(matches!(Config::load_from(&path), Err(MarkError::Config(_))));
   }

   #[test]
   fn test_logo_layer() {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("logo.png");
      RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255])).save(&path).unwrap();
      let mut config = Config::default();
      config.logo.path = Some(path);
      config.logo.percent = Some(30.0);
      let group = config.build_group();
      let logo = group.layer(LayerKind::Logo).unwrap();
      assert!(logo.is_visible());
      assert_eq!(logo.placement, Placement::Anchor(Anchor::TopLeft));
      assert_eq!(logo.render().unwrap().bbox(), (30, 15));
   }

   #[test]
   fn test_missing_logo_disables_layer() {
      let mut config = Config::default();
      config.logo.path = Some(PathBuf::from("/nonexistent/logo.png"));
      let group = config.build_group();
      assert!(!group.layer(LayerKind::Logo).unwrap().is_visible());
   }
}
