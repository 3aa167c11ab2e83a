use clap::Parser;
use photo_mark::color::Color;
use photo_mark::config::{Config, TextSection};
use photo_mark::export::OutputFormat;
use photo_mark::position::Anchor;
use std::path::PathBuf;

/// 根据 EXIF 拍摄时间给照片批量添加水印
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
   /// 多张图片地址或者文件夹，使用空格分隔
   #[arg(default_value = ".")]
   pub inputs: Vec<PathBuf>,

   /// TOML 配置文件，命令行参数优先
   #[arg(short, long)]
   pub config: Option<PathBuf>,

   /// EXIF 时间字号（默认 24）
   #[arg(long)]
   pub font_size: Option<u32>,
   /// EXIF 时间颜色，颜色名或 #RRGGBB（默认 white）
   #[arg(long)]
   pub color: Option<Color>,
   /// EXIF 时间位置（默认 bottom-right）
   #[arg(short, long)]
   pub position: Option<Anchor>,
   /// EXIF 时间手动位置，相对坐标 x,y（0.0 - 1.0）
   #[arg(long, value_parser = parse_point)]
   pub manual: Option<(f32, f32)>,
   /// 时间显示格式，如 %Y年%m月%d日（默认 %Y-%m-%d）
   #[arg(long)]
   pub timestamp_format: Option<String>,

   /// 自定义文本内容
   #[arg(long)]
   pub text: Option<String>,
   /// 自定义文本颜色
   #[arg(long)]
   pub text_color: Option<Color>,
   /// 自定义文本不透明度（0 - 100）
   #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
   pub text_opacity: Option<u8>,
   /// 自定义文本位置（默认 center）
   #[arg(long)]
   pub text_position: Option<Anchor>,

   /// 字体文件，同时用于两种文本
   #[arg(long)]
   pub font: Option<PathBuf>,
   /// 描边宽度，0 为不描边
   #[arg(long)]
   pub stroke_width: Option<u32>,
   #[arg(long)]
   pub stroke_color: Option<Color>,
   /// 为文本添加阴影
   #[arg(long)]
   pub shadow: bool,
   /// 阴影偏移 x,y
   #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
   pub shadow_offset: Option<(i32, i32)>,
   #[arg(long)]
   pub shadow_color: Option<Color>,
   #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
   pub shadow_opacity: Option<u8>,

   /// Logo 图片
   #[arg(long)]
   pub logo: Option<PathBuf>,
   /// Logo 缩放百分比
   #[arg(long)]
   pub logo_scale: Option<f32>,
   /// Logo 宽度（像素）
   #[arg(long)]
   pub logo_width: Option<u32>,
   /// Logo 高度（像素）
   #[arg(long)]
   pub logo_height: Option<u32>,
   #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
   pub logo_opacity: Option<u8>,
   /// Logo 位置（默认 top-left）
   #[arg(long)]
   pub logo_position: Option<Anchor>,

   /// 整组水印旋转角度（-180 - 180），正值逆时针
   #[arg(long, allow_hyphen_values = true)]
   pub rotation: Option<f32>,

   /// 输出到指定文件夹，不存在则会创建
   #[arg(short, long)]
   pub output_dir: Option<PathBuf>,
   /// 输出格式
   #[arg(long, value_enum)]
   pub output_format: Option<OutputFormat>,
   /// JPEG 质量（0 - 100，默认 95）
   #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(0..=100))]
   pub jpeg_quality: Option<u8>,
   #[arg(long)]
   pub name_prefix: Option<String>,
   #[arg(long)]
   pub name_suffix: Option<String>,
   /// 允许输出到原图所在文件夹
   #[arg(long)]
   pub allow_export_to_input: bool,
   #[arg(long)]
   pub resize_width: Option<u32>,
   #[arg(long)]
   pub resize_height: Option<u32>,
   #[arg(long)]
   pub resize_percent: Option<f32>,

   /// 并行处理图片数量（默认 CPU 核数）
   #[arg(short, long)]
   pub jobs: Option<usize>,
   /// 输出调试日志
   #[arg(short, long)]
   pub verbose: bool,
   /// 以 JSON 格式输出日志
   #[arg(long)]
   pub json_logs: bool,
}

impl Cli {
   /// 把命令行参数覆盖到配置上
   pub fn apply(&self, config: &mut Config) {
      let exif = &mut config.exif.style;
      set(&mut exif.font_size, self.font_size);
      set(&mut exif.color, self.color);
      if let Some(anchor) = self.position {
         exif.position = Some(anchor);
         exif.manual = None;
      }
      if let Some((x, y)) = self.manual {
         exif.manual = Some([x, y]);
      }
      set(&mut config.exif.timestamp_format, self.timestamp_format.clone());

      let text = &mut config.text;
      set(&mut text.content, self.text.clone());
      set(&mut text.color, self.text_color);
      set(&mut text.opacity, self.text_opacity);
      if let Some(anchor) = self.text_position {
         text.position = Some(anchor);
         text.manual = None;
      }

      for section in [&mut config.exif.style, &mut config.text] {
         self.apply_text_effects(section);
      }

      let logo = &mut config.logo;
      if self.logo.is_some() {
         logo.path = self.logo.clone();
      }
      if self.logo_scale.is_some() {
         logo.percent = self.logo_scale;
      }
      if self.logo_width.is_some() || self.logo_height.is_some() {
         logo.width = self.logo_width;
         logo.height = self.logo_height;
      }
      set(&mut logo.opacity, self.logo_opacity);
      if let Some(anchor) = self.logo_position {
         logo.position = Some(anchor);
         logo.manual = None;
      }

      set(&mut config.group.rotation, self.rotation);

      let export = &mut config.export;
      if self.output_dir.is_some() {
         export.output_dir = self.output_dir.clone();
      }
      set(&mut export.format, self.output_format);
      set(&mut export.jpeg_quality, self.jpeg_quality);
      set(&mut export.name_prefix, self.name_prefix.clone());
      set(&mut export.name_suffix, self.name_suffix.clone());
      export.allow_export_to_input |= self.allow_export_to_input;
      if self.resize_width.is_some() || self.resize_height.is_some() || self.resize_percent.is_some() {
         export.resize_width = self.resize_width;
         export.resize_height = self.resize_height;
         export.resize_percent = self.resize_percent;
      }

      if self.jobs.is_some() {
         config.batch.jobs = self.jobs;
      }
   }

   fn apply_text_effects(&self, section: &mut TextSection) {
      if self.font.is_some() {
         section.font = self.font.clone();
      }
      set(&mut section.stroke_width, self.stroke_width);
      set(&mut section.stroke_color, self.stroke_color);
      section.shadow |= self.shadow;
      if let Some((x, y)) = self.shadow_offset {
         section.shadow_offset = [x, y];
      }
      set(&mut section.shadow_color, self.shadow_color);
      set(&mut section.shadow_opacity, self.shadow_opacity);
   }
}

fn set<T>(target: &mut T, value: Option<T>) {
   if let Some(value) = value {
      *target = value;
   }
}

fn parse_pair<T: std::str::FromStr>(value: &str) -> Result<(T, T), String> {
   let (x, y) = value
      .split_once(',')
      .ok_or_else(|| format!("格式应为 x,y：{value}"))?;
   let parse = |v: &str| v.trim().parse::<T>().map_err(|_| format!("无法解析数值：{v}"));
   Ok((parse(x)?, parse(y)?))
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
   let (x, y) = parse_pair::<f32>(value)?;
   if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
      return Err(format!("相对坐标的取值范围为 0.0 - 1.0：{value}"));
   }
   Ok((x, y))
}

fn parse_offset(value: &str) -> Result<(i32, i32), String> {
   parse_pair::<i32>(value)
}
