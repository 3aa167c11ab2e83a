//! 拍摄时间解析
//!
//! 依次尝试 EXIF `DateTimeOriginal`、`DateTime`，都没有时使用文件修改时间，
//! 修改时间也读不到时使用当前时间。结果总是一段可显示的文本，不会失败。

use crate::error::{MarkError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDateTime};
use rexif::{ExifEntry, ExifTag, TagValue, parse_buffer};
use std::fs;
use std::path::Path;
use tracing::debug;

/// EXIF 中日期时间的存储格式
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// 默认显示格式
pub const DEFAULT_DISPLAY_FORMAT: &str = "%Y-%m-%d";

/// 本程序关心的 EXIF 字段
#[derive(Debug, Clone, PartialEq)]
pub struct Exif {
   pub shoot_time: Option<NaiveDateTime>,
   pub modify_time: Option<NaiveDateTime>,
   /// 1 - 8，缺失时为 1
   pub orientation: u16,
}

impl Default for Exif {
   fn default() -> Self {
      Self {
         shoot_time: None,
         modify_time: None,
         orientation: 1,
      }
   }
}

impl Exif {
   /// 从图片文件内容解析EXIF信息
   pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
      let data = parse_buffer(bytes).map_err(|e| MarkError::MetadataUnavailable(e.to_string()))?;
      let mut exif = Exif::default();
      for entry in &data.entries {
         exif.process_entry(entry);
      }
      Ok(exif)
   }

   /// 处理单个EXIF条目
   fn process_entry(&mut self, entry: &ExifEntry) {
      match entry.tag {
         ExifTag::DateTimeOriginal => {
            self.shoot_time = ascii(&entry.value).and_then(parse_exif_datetime);
         }
         ExifTag::DateTime => {
            self.modify_time = ascii(&entry.value).and_then(parse_exif_datetime);
         }
         ExifTag::Orientation => {
            if let TagValue::U16(values) = &entry.value {
               if let Some(&value) = values.first() {
                  self.orientation = if (1..=8).contains(&value) { value } else { 1 };
               }
            }
         }
         _ => {}
      }
   }

   /// 拍摄时间，没有时退回到 `DateTime`
   pub fn capture_time(&self) -> Option<NaiveDateTime> {
      self.shoot_time.or(self.modify_time)
   }
}

fn ascii(value: &TagValue) -> Option<&str> {
   match value {
      TagValue::Ascii(text) => {
         let text = text.trim_matches(char::from(0)).trim();
         (!text.is_empty()).then_some(text)
      }
      _ => None,
   }
}

/// 解析 `2024:01:01 12:00:00` 形式的时间
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
   NaiveDateTime::parse_from_str(value.trim(), EXIF_DATETIME_FORMAT).ok()
}

/// 时间文本生成器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampResolver {
   format: String,
}

impl Default for TimestampResolver {
   fn default() -> Self {
      Self {
         format: DEFAULT_DISPLAY_FORMAT.to_string(),
      }
   }
}

impl TimestampResolver {
   /// 显示格式为 chrono 的 strftime 语法，非法格式直接报错
   pub fn new(format: impl Into<String>) -> Result<Self> {
      let format = format.into();
      if format.trim().is_empty() || StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
         return Err(MarkError::InvalidConfiguration(format!("无效的时间格式：{format}")));
      }
      Ok(Self { format })
   }

   pub fn format(&self) -> &str {
      &self.format
   }

   /// # 生成水印时间文本
   ///
   /// # 参数
   /// * `path` - 照片路径，EXIF 中没有时间时读取它的修改时间
   /// * `exif` - 已解析的 EXIF 信息
   pub fn resolve(&self, path: &Path, exif: Option<&Exif>) -> String {
      let time = match exif.and_then(Exif::capture_time) {
         Some(time) => time,
         None => {
            debug!(path = %path.display(), "没有可用的拍摄时间，改用文件修改时间");
            file_time(path)
         }
      };
      time.format(&self.format).to_string()
   }
}

fn file_time(path: &Path) -> NaiveDateTime {
   match fs::metadata(path).and_then(|meta| meta.modified()) {
      Ok(modified) => DateTime::<Local>::from(modified).naive_local(),
      Err(e) => {
         debug!(path = %path.display(), "读取修改时间失败：{e}，改用当前时间");
         Local::now().naive_local()
      }
   }
}

/// # 直接从文件内容生成时间文本
///
/// # 参数
/// * `path` - 照片路径
/// * `bytes` - 照片文件内容
/// * `format` - 显示格式，非法时使用默认格式
pub fn resolve_timestamp(path: &Path, bytes: &[u8], format: &str) -> String {
   let resolver = TimestampResolver::new(format).unwrap_or_else(|e| {
      debug!("{e}");
      TimestampResolver::default()
   });
   let exif = Exif::from_bytes(bytes)
      .inspect_err(|e| debug!(path = %path.display(), "{e}"))
      .ok();
   resolver.resolve(path, exif.as_ref())
}
