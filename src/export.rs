//! 导出：合成 → 缩放 → 格式转换 → 命名 → 写文件
//!
//! 预览和导出调用同一个 [`compose`]，导出只在合成结果之后追加缩放和编码。

use crate::color::Color;
use crate::compose::compose;
use crate::error::{MarkError, Result};
use crate::group::WatermarkGroup;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{FilterType, resize};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
   /// 跟随原图：jpg/jpeg 输出 JPEG，其余输出 PNG
   #[default]
   #[serde(rename = "auto", alias = "inherit")]
   #[value(name = "auto")]
   Inherit,
   Jpeg,
   Png,
}

impl OutputFormat {
   /// 把 `Inherit` 换成具体格式
   pub fn resolve(self, source: &Path) -> OutputFormat {
      match self {
         OutputFormat::Inherit => {
            let ext = source
               .extension()
               .map(|ext| ext.to_string_lossy().to_lowercase())
               .unwrap_or_default();
            match ext.as_str() {
               "jpg" | "jpeg" => OutputFormat::Jpeg,
               _ => OutputFormat::Png,
            }
         }
         format => format,
      }
   }

   pub fn extension(self) -> &'static str {
      match self {
         OutputFormat::Jpeg => "jpeg",
         OutputFormat::Inherit | OutputFormat::Png => "png",
      }
   }
}

/// 导出尺寸
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resize {
   #[default]
   None,
   /// 指定宽度，保持比例
   Width(u32),
   /// 指定高度，保持比例
   Height(u32),
   /// 拉伸到指定宽高
   WidthHeight { width: u32, height: u32 },
   /// 按百分比缩小，超过 100 按 100 处理
   Percent(f32),
}

impl Resize {
   /// # 计算缩放后的尺寸
   ///
   /// # 参数
   /// * `current` - 合成后图像的宽高
   ///
   /// 不需要缩放时返回 `None`；目标为 0 或负数时报错。
   pub fn target_dimensions(&self, current: (u32, u32)) -> Result<Option<(u32, u32)>> {
      let (w, h) = (current.0.max(1) as f64, current.1.max(1) as f64);
      let px = |v: f64| v.round().max(1.0) as u32;
      let invalid = |what: &str| Err(MarkError::InvalidConfiguration(format!("{what} 必须大于 0")));
      let target = match *self {
         Resize::None => return Ok(None),
         Resize::Width(0) => return invalid("resize.width"),
         Resize::Height(0) => return invalid("resize.height"),
         Resize::WidthHeight { width, height } if width == 0 || height == 0 => {
            return invalid("resize.width_height");
         }
         Resize::Percent(p) if !(p > 0.0) => return invalid("resize.percent"),
         Resize::Width(width) => (width, px(h * width as f64 / w)),
         Resize::Height(height) => (px(w * height as f64 / h), height),
         Resize::WidthHeight { width, height } => (width, height),
         Resize::Percent(p) => {
            let factor = p.min(100.0) as f64 / 100.0;
            (px(w * factor), px(h * factor))
         }
      };
      Ok((target != current).then_some(target))
   }

   pub fn validate(&self) -> Result<()> {
      self.target_dimensions((1, 1)).map(|_| ())
   }
}

/// 缩放合成结果，Lanczos3 重采样
pub fn resize_image(image: RgbaImage, spec: Resize) -> Result<RgbaImage> {
   match spec.target_dimensions(image.dimensions())? {
      Some((width, height)) => {
         debug!(from = ?image.dimensions(), to = ?(width, height), "缩放导出图像");
         Ok(resize(&image, width, height, FilterType::Lanczos3))
      }
      None => Ok(image),
   }
}

/// 导出参数
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpec {
   pub format: OutputFormat,
   /// JPEG 质量（0 - 100），编码时截断到 1 - 100
   pub jpeg_quality: u8,
   pub resize: Resize,
   pub name_prefix: String,
   pub name_suffix: String,
   /// 为空时输出到 `<原图目录>/<目录名>_watermark`
   pub output_dir: Option<PathBuf>,
   pub allow_export_to_input: bool,
   /// JPEG 不支持透明，透明像素铺在这个颜色上
   pub background: Color,
}

impl Default for ExportSpec {
   fn default() -> Self {
      Self {
         format: OutputFormat::Inherit,
         jpeg_quality: 95,
         resize: Resize::None,
         name_prefix: String::new(),
         name_suffix: String::new(),
         output_dir: None,
         allow_export_to_input: false,
         background: Color::WHITE,
      }
   }
}

/// 一次导出的落盘位置和格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
   pub dir: PathBuf,
   pub path: PathBuf,
   pub format: OutputFormat,
}

impl ExportSpec {
   /// # 规划输出文件
   ///
   /// # 参数
   /// * `source` - 原图路径
   ///
   /// 只做检查，不创建任何目录或文件。
   pub fn plan(&self, source: &Path) -> Result<OutputPlan> {
      self.resize.validate()?;
      let input_dir = source_dir(source);
      let dir = match &self.output_dir {
         Some(dir) => dir.clone(),
         None => default_output_dir(&input_dir),
      };
      if !self.allow_export_to_input && same_dir(&dir, &input_dir) {
         return Err(MarkError::OutputCollision(dir));
      }
      let format = self.format.resolve(source);
      let path = dir.join(output_file_name(source, &self.name_prefix, &self.name_suffix, format)?);
      Ok(OutputPlan { dir, path, format })
   }

   /// 按规划缩放、编码并写入合成结果
   pub fn write(&self, plan: &OutputPlan, composed: RgbaImage) -> Result<()> {
      let image = resize_image(composed, self.resize)?;
      fs::create_dir_all(&plan.dir)?;
      let writer = BufWriter::new(File::create(&plan.path)?);
      match plan.format {
         OutputFormat::Jpeg => {
            let rgb = flatten(&image, self.background);
            let mut encoder = JpegEncoder::new_with_quality(writer, self.jpeg_quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
         }
         OutputFormat::Inherit | OutputFormat::Png => {
            image.write_with_encoder(PngEncoder::new(writer))?;
         }
      }
      Ok(())
   }
}

/// # 导出一张带水印的图片
///
/// # 参数
/// * `base` - 已校正方向的原图
/// * `group` - 已填入时间文本的水印组
/// * `spec` - 导出参数
/// * `source` - 原图路径，用于命名和目录检查
///
/// 输出目录与原图目录相同且未允许时返回 `OutputCollision`，不写任何文件。
pub fn export(base: &DynamicImage, group: &WatermarkGroup, spec: &ExportSpec, source: &Path) -> Result<PathBuf> {
   let plan = spec.plan(source)?;
   let composed = compose(base, group);
   spec.write(&plan, composed)?;
   info!(source = %source.display(), output = %plan.path.display(), "导出完成");
   Ok(plan.path)
}

/// 原图所在目录，相对路径没有父目录时取当前目录
pub fn source_dir(source: &Path) -> PathBuf {
   match source.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
   }
}

/// `<dir>/<dir 名>_watermark`
pub fn default_output_dir(input_dir: &Path) -> PathBuf {
   let name = fs::canonicalize(input_dir)
      .ok()
      .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
      .or_else(|| input_dir.file_name().map(|n| n.to_string_lossy().into_owned()))
      .unwrap_or_else(|| "photos".to_string());
   input_dir.join(format!("{name}_watermark"))
}

fn same_dir(a: &Path, b: &Path) -> bool {
   match (fs::canonicalize(a), fs::canonicalize(b)) {
      (Ok(a), Ok(b)) => a == b,
      _ => false,
   }
}

/// `前缀 + 原文件名 + 后缀 + 扩展名`
pub fn output_file_name(source: &Path, prefix: &str, suffix: &str, format: OutputFormat) -> Result<String> {
   let stem = source
      .file_stem()
      .ok_or_else(|| MarkError::InvalidConfiguration(format!("无效的文件路径：{}", source.display())))?;
   Ok(format!(
      "{prefix}{}{suffix}.{}",
      stem.to_string_lossy(),
      format.extension()
   ))
}

/// 把透明像素铺到背景色上，得到不带 alpha 的图像
pub fn flatten(image: &RgbaImage, background: Color) -> RgbImage {
   let bg = [background.r, background.g, background.b];
   RgbImage::from_fn(image.width(), image.height(), |x, y| {
      let px = image.get_pixel(x, y);
      let alpha = px[3] as f32 / 255.0;
      let mix = |c: usize| (px[c] as f32 * alpha + bg[c] as f32 * (1.0 - alpha)).round() as u8;
      Rgb([mix(0), mix(1), mix(2)])
   })
}
