//! # photo_mark
//!
//! 给照片添加水印：EXIF 拍摄时间、自定义文本和 Logo 三种图层，
//! 支持九宫格或手动定位、整组旋转，以及批量导出为 JPEG / PNG。
//!
//! ```no_run
//! use photo_mark::{ExportSpec, Photo, TextStyle, TimestampResolver, WatermarkGroup, WatermarkLayer, export};
//!
//! let photo = Photo::open("IMG_0001.jpg")?;
//! let group = WatermarkGroup::new(vec![WatermarkLayer::exif_text(TextStyle::default())])
//!    .for_timestamp(&photo.timestamp(&TimestampResolver::default()));
//! let output = export(&photo.image, &group, &ExportSpec::default(), &photo.path)?;
//! println!("{}", output.display());
//! # Ok::<(), photo_mark::MarkError>(())
//! ```
//!
//! # Panics
//!
//! 唯一的 panic 路径是内置字体 `fonts/DejaVuSans.ttf` 解析失败（见 [`text::default_font`]），
//! 该文件在编译时嵌入，正常构建不会触发。其余错误都通过 [`MarkError`] 返回。

pub mod batch;
pub mod color;
pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod group;
pub mod layer;
pub mod logo;
pub mod photo;
pub mod position;
pub mod rotation;
pub mod session;
pub mod text;
pub mod timestamp;

pub use batch::{Batch, BatchReport};
pub use color::Color;
pub use compose::compose;
pub use config::Config;
pub use error::{MarkError, Result};
pub use export::{ExportSpec, OutputFormat, Resize, export};
pub use group::WatermarkGroup;
pub use layer::{LogoScale, LogoStyle, Opacity, Shadow, Stroke, TextStyle, WatermarkLayer};
pub use photo::Photo;
pub use position::{Anchor, Placement, PositionResolver};
pub use session::PreviewSession;
pub use timestamp::{TimestampResolver, resolve_timestamp};
