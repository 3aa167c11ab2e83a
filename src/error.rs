//! # 错误模型
//!
//! 水印链路只有一个错误枚举，批处理在单张图片的边界上捕获它并记录，
//! 不会因为某一张失败而中断其余图片。

use std::path::PathBuf;

/// 水印处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum MarkError {
   /// 扩展名或文件内容不是支持的图片类型，批处理跳过该文件
   #[error("不支持的图片格式：{path:?}（{reason}）")]
   UnsupportedFormat { path: PathBuf, reason: String },

   /// 没有EXIF信息或解析失败，回退到文件修改时间
   #[error("无法读取EXIF信息：{0}")]
   MetadataUnavailable(String),

   /// 字体文件无法读取或解析，回退到内置字体
   #[error("字体加载失败：{path:?}（{reason}）")]
   FontLoadFailure { path: PathBuf, reason: String },

   /// 配置值超出范围且没有安全的默认值
   #[error("配置无效：{0}")]
   InvalidConfiguration(String),

   /// 输出目录与原图目录相同且未允许覆盖
   #[error("为防止覆盖原图，禁止导出到原文件夹：{0:?}")]
   OutputCollision(PathBuf),

   #[error("文件读写失败：{0}")]
   Io(#[from] std::io::Error),

   #[error("图片编解码失败：{0}")]
   Image(#[from] image::ImageError),

   #[error("配置文件解析失败：{0}")]
   Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, MarkError>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_display_contains_context() {
      let err = MarkError::OutputCollision(PathBuf::from("/photos"));
      assert!(err.to_string().contains("/photos"));

      let err = MarkError::InvalidConfiguration("resize.width 必须大于 0".into());
      assert!(err.to_string().contains("resize.width"));
   }

   #[test]
   fn test_io_error_converts() {
      let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
      let err: MarkError = io.into();
      assert!(matches!(err, MarkError::Io(_)));
   }
}
