//! 交互式预览会话
//!
//! 配置的每次修改都会让代数加一；后台算完的帧只有代数一致时才被接受，
//! 过期的结果直接丢弃。预览和导出使用同一个 [`compose`]。

use crate::compose::compose;
use crate::error::{MarkError, Result};
use crate::export::{ExportSpec, export};
use crate::group::WatermarkGroup;
use crate::layer::LayerKind;
use crate::photo::Photo;
use crate::position::Anchor;
use crate::timestamp::TimestampResolver;
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 一次预览计算所需的全部输入，可以移到其他线程执行
#[derive(Debug, Clone)]
pub struct PreviewJob {
   pub generation: u64,
   pub base: Arc<DynamicImage>,
   pub group: WatermarkGroup,
}

impl PreviewJob {
   pub fn run(&self) -> RgbaImage {
      compose(&self.base, &self.group)
   }
}

#[derive(Debug, Clone)]
struct Loaded {
   path: PathBuf,
   image: Arc<DynamicImage>,
   timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewSession {
   group: WatermarkGroup,
   timestamps: TimestampResolver,
   photo: Option<Loaded>,
   generation: u64,
   last_frame: Option<Arc<RgbaImage>>,
}

impl PreviewSession {
   pub fn new(group: WatermarkGroup, timestamps: TimestampResolver) -> Self {
      Self {
         group,
         timestamps,
         ..Self::default()
      }
   }

   /// # 切换预览照片
   ///
   /// # 参数
   /// * `path` - 照片路径
   ///
   /// 读取失败时保留当前照片和上一帧，并返回错误。
   pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
      let photo = Photo::open(path.as_ref()).inspect_err(|e| warn!("预览加载失败，保留上一帧：{e}"))?;
      let timestamp = photo.timestamp(&self.timestamps);
      debug!(path = %photo.path.display(), %timestamp, "预览照片已加载");
      self.photo = Some(Loaded {
         path: photo.path,
         image: Arc::new(photo.image),
         timestamp,
      });
      self.touch();
      Ok(())
   }

   pub fn group(&self) -> &WatermarkGroup {
      &self.group
   }

   pub fn generation(&self) -> u64 {
      self.generation
   }

   /// 选择锚点，清除该图层的手动坐标
   pub fn select_anchor(&mut self, kind: LayerKind, anchor: Anchor) {
      self.update(|group| {
         if let Some(layer) = group.layer_mut(kind) {
            layer.select_anchor(anchor);
         }
      });
   }

   /// 拖拽图层到相对坐标（0.0 - 1.0），锚点随之取消
   pub fn drag_layer(&mut self, kind: LayerKind, rel_x: f32, rel_y: f32) {
      self.update(|group| {
         if let Some(layer) = group.layer_mut(kind) {
            layer.drag_to(rel_x, rel_y);
         }
      });
   }

   pub fn set_rotation(&mut self, degrees: f32) {
      self.update(|group| group.set_rotation(degrees));
   }

   /// 任意修改水印组
   pub fn update(&mut self, change: impl FnOnce(&mut WatermarkGroup)) {
      change(&mut self.group);
      self.touch();
   }

   fn touch(&mut self) {
      self.generation += 1;
   }

   /// 生成当前代数的预览任务，没有加载照片时返回 `None`
   pub fn begin(&self) -> Option<PreviewJob> {
      let photo = self.photo.as_ref()?;
      Some(PreviewJob {
         generation: self.generation,
         base: Arc::clone(&photo.image),
         group: self.group.for_timestamp(&photo.timestamp),
      })
   }

   /// 提交计算结果，代数过期时丢弃并返回 `false`
   pub fn complete(&mut self, generation: u64, frame: RgbaImage) -> bool {
      if generation != self.generation {
         debug!(generation, current = self.generation, "丢弃过期的预览帧");
         return false;
      }
      self.last_frame = Some(Arc::new(frame));
      true
   }

   /// 同步计算并提交一帧
   pub fn render(&mut self) -> Option<Arc<RgbaImage>> {
      let job = self.begin()?;
      let frame = job.run();
      self.complete(job.generation, frame);
      self.last_frame()
   }

   pub fn last_frame(&self) -> Option<Arc<RgbaImage>> {
      self.last_frame.clone()
   }

   /// 用与预览相同的配置导出当前照片
   pub fn export(&self, spec: &ExportSpec) -> Result<PathBuf> {
      let photo = self
         .photo
         .as_ref()
         .ok_or_else(|| MarkError::InvalidConfiguration("尚未加载照片".into()))?;
      let group = self.group.for_timestamp(&photo.timestamp);
      export(&photo.image, &group, spec, &photo.path)
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::export::OutputFormat;
   use crate::layer::{TextStyle, WatermarkLayer};
   use crate::position::Placement;
   use image::{Rgba, open};

   fn session_with_photo(dir: &Path) -> PreviewSession {
      let path = dir.join("preview.png");
      RgbaImage::from_pixel(200, 120, Rgba([40, 80, 120, 255])).save(&path).unwrap();
      let group = WatermarkGroup::new(vec![
         WatermarkLayer::exif_text(TextStyle::default()),
         WatermarkLayer::custom_text(TextStyle::new("SAMPLE")).with_opacity(50),
      ]);
      let mut session = PreviewSession::new(group, TimestampResolver::default());
      session.load(&path).unwrap();
      session
   }

   #[test]
   fn test_render_without_photo() {
      let mut session = PreviewSession::default();
      assert!(session.begin().is_none());
      assert!(session.render().is_none());
   }

   #[test]
   fn test_stale_frames_are_discarded() {
      let dir = tempfile::tempdir().unwrap();
      let mut session = session_with_photo(dir.path());
      let job = session.begin().unwrap();
      session.set_rotation(10.0);
      assert!(!session.complete(job.generation, job.run()));
      assert!(session.last_frame().is_none());

      let job = session.begin().unwrap();
      assert!(session.complete(job.generation, job.run()));
      assert!(session.last_frame().is_some());
   }

   #[test]
   fn test_placement_transitions_through_session() {
      let dir = tempfile::tempdir().unwrap();
      let mut session = session_with_photo(dir.path());
      session.drag_layer(LayerKind::CustomText, 0.3, 0.6);
      let layer = session.group().layer(LayerKind::CustomText).unwrap();
      assert_eq!(layer.placement, Placement::Manual { rel_x: 0.3, rel_y: 0.6 });
      session.select_anchor(LayerKind::CustomText, Anchor::TopRight);
      let layer = session.group().layer(LayerKind::CustomText).unwrap();
      assert_eq!(layer.placement, Placement::Anchor(Anchor::TopRight));
   }

   #[test]
   fn test_failed_load_keeps_last_frame() {
      let dir = tempfile::tempdir().unwrap();
      let mut session = session_with_photo(dir.path());
      let frame = session.render().unwrap();
      assert!(session.load(dir.path().join("missing.png")).is_err());
      assert_eq!(session.last_frame().as_deref(), Some(&*frame));
      assert!(session.render().is_some());
   }

   #[test]
   fn test_export_matches_preview_pixels() {
      let dir = tempfile::tempdir().unwrap();
      let mut session = session_with_photo(dir.path());
      session.set_rotation(20.0);
      let frame = session.render().unwrap();
      let spec = ExportSpec {
         format: OutputFormat::Png,
         output_dir: Some(dir.path().join("out")),
         ..ExportSpec::default()
      };
      let path = session.export(&spec).unwrap();
      let exported = open(&path).unwrap().to_rgba8();
      assert_eq!(&exported, &*frame);
   }
}
