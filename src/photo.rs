use crate::error::{MarkError, Result};
use crate::timestamp::{Exif, TimestampResolver};
use image::{DynamicImage, ImageFormat, guess_format, load_from_memory_with_format};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 支持的图片扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tiff", "tif", "bmp"];

pub fn is_image_file(path: &Path) -> bool {
   path
      .extension()
      .map(|ext| ext.to_string_lossy().to_lowercase())
      .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// 解码后的照片，已按 EXIF 方向校正
#[derive(Debug, Clone)]
pub struct Photo {
   pub path: PathBuf,
   pub image: DynamicImage,
   pub format: ImageFormat,
   pub exif: Option<Exif>,
}

impl Photo {
   /// # 读取照片
   ///
   /// # 参数
   /// * `path` - 照片文件路径
   ///
   /// 文件只读取一次，解码和 EXIF 解析共用同一份内容。
   /// 没有 EXIF 不算错误，只记录调试日志。
   pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
      let path = path.as_ref();
      let unsupported = |reason: String| MarkError::UnsupportedFormat {
         path: path.to_path_buf(),
         reason,
      };
      if !is_image_file(path) {
         return Err(unsupported("扩展名不在支持列表中".into()));
      }
      let bytes = fs::read(path)?;
      let format = guess_format(&bytes).map_err(|e| unsupported(e.to_string()))?;
      let decoded = load_from_memory_with_format(&bytes, format)?;
      let exif = Exif::from_bytes(&bytes)
         .inspect_err(|e| debug!(path = %path.display(), "{e}"))
         .ok();
      let orientation = exif.as_ref().map_or(1, |exif| exif.orientation);
      debug!(
         path = %path.display(),
         width = decoded.width(),
         height = decoded.height(),
         orientation,
         "照片已解码"
      );
      Ok(Self {
         path: path.to_path_buf(),
         image: apply_orientation(decoded, orientation),
         format,
         exif,
      })
   }

   /// 当前照片的水印时间文本
   pub fn timestamp(&self, resolver: &TimestampResolver) -> String {
      resolver.resolve(&self.path, self.exif.as_ref())
   }
}

/// 按 EXIF Orientation 把图像转正
pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
   match orientation {
      2 => image.fliph(),
      3 => image.rotate180(),
      4 => image.flipv(),
      5 => image.rotate90().fliph(),
      6 => image.rotate90(),
      7 => image.rotate270().fliph(),
      8 => image.rotate270(),
      _ => image,
   }
}
