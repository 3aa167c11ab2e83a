//! 批量处理
//!
//! 输入可以是图片文件或文件夹（递归查找），每张图片在 rayon 线程池里独立处理，
//! 单张失败只记录在报告中，不影响其他图片。

use crate::error::{MarkError, Result};
use crate::export::{ExportSpec, default_output_dir, export};
use crate::group::WatermarkGroup;
use crate::photo::{Photo, is_image_file};
use crate::timestamp::TimestampResolver;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

/// 待处理的一张图片
#[derive(Debug, Clone)]
pub struct BatchJob {
   pub source: PathBuf,
   pub spec: ExportSpec,
}

#[derive(Debug)]
pub struct BatchFailure {
   pub source: PathBuf,
   pub error: MarkError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
   pub exported: Vec<PathBuf>,
   pub failed: Vec<BatchFailure>,
}

impl BatchReport {
   pub fn is_success(&self) -> bool {
      self.failed.is_empty()
   }
}

#[derive(Debug, Clone)]
pub struct Batch {
   pub group: WatermarkGroup,
   pub spec: ExportSpec,
   pub timestamps: TimestampResolver,
   /// 并行处理的图片数量
   pub jobs: usize,
}

impl Batch {
   pub fn new(group: WatermarkGroup, spec: ExportSpec) -> Self {
      Self {
         group,
         spec,
         timestamps: TimestampResolver::default(),
         jobs: default_jobs(),
      }
   }

   pub fn with_jobs(mut self, jobs: usize) -> Self {
      self.jobs = jobs.max(1);
      self
   }

   pub fn with_timestamps(mut self, timestamps: TimestampResolver) -> Self {
      self.timestamps = timestamps;
      self
   }

   /// # 展开输入列表
   ///
   /// # 参数
   /// * `inputs` - 图片文件或文件夹
   ///
   /// 文件夹递归查找支持的图片，未指定输出目录时，
   /// 同一个文件夹下的所有图片统一输出到 `<文件夹>/<文件夹名>_watermark`，并跳过该目录本身。
   /// 不存在的路径和不支持的文件作为失败项返回。
   /// 输出路径与前面的图片重复时（如子文件夹中的同名文件），后出现的记为 `OutputCollision`。
   pub fn plan(&self, inputs: &[PathBuf]) -> (Vec<BatchJob>, Vec<BatchFailure>) {
      let mut jobs = Vec::new();
      let mut failed = Vec::new();
      for input in inputs {
         if input.is_dir() {
            let spec = match &self.spec.output_dir {
               Some(_) => self.spec.clone(),
               None => ExportSpec {
                  output_dir: Some(default_output_dir(input)),
                  ..self.spec.clone()
               },
            };
            let skip = spec.output_dir.as_deref().and_then(|dir| fs::canonicalize(dir).ok());
            let mut images = Vec::new();
            match expand_directory_images(input, skip.as_deref(), &mut images) {
               Ok(()) => jobs.extend(images.into_iter().map(|source| BatchJob {
                  source,
                  spec: spec.clone(),
               })),
               Err(error) => failed.push(BatchFailure {
                  source: input.clone(),
                  error: error.into(),
               }),
            }
         } else if input.is_file() {
            if is_image_file(input) {
               jobs.push(BatchJob {
                  source: input.clone(),
                  spec: self.spec.clone(),
               });
            } else {
               failed.push(BatchFailure {
                  source: input.clone(),
                  error: MarkError::UnsupportedFormat {
                     path: input.clone(),
                     reason: "扩展名不在支持列表中".into(),
                  },
               });
            }
         } else {
            failed.push(BatchFailure {
               source: input.clone(),
               error: io::Error::new(io::ErrorKind::NotFound, format!("{} 不存在", input.display())).into(),
            });
         }
      }

      let mut outputs = HashSet::new();
      let mut unique = Vec::with_capacity(jobs.len());
      for job in jobs {
         // 规划失败的留给 process 报告
         if let Ok(plan) = job.spec.plan(&job.source) {
            if !outputs.insert(plan.path.clone()) {
               warn!(source = %job.source.display(), output = %plan.path.display(), "输出文件重名，跳过");
               failed.push(BatchFailure {
                  source: job.source,
                  error: MarkError::OutputCollision(plan.path),
               });
               continue;
            }
         }
         unique.push(job);
      }
      (unique, failed)
   }

   /// 展开输入并并行处理全部图片
   pub fn run(&self, inputs: &[PathBuf]) -> BatchReport {
      let (jobs, failed) = self.plan(inputs);
      info!(images = jobs.len(), workers = self.jobs, "开始批量添加水印");

      let work = || {
         jobs
            .par_iter()
            .map(|job| (job, self.process(job)))
            .collect::<Vec<_>>()
      };
      let results = match ThreadPoolBuilder::new().num_threads(self.jobs.max(1)).build() {
         Ok(pool) => pool.install(work),
         Err(e) => {
            warn!("创建线程池失败：{e}，使用全局线程池");
            work()
         }
      };

      let mut report = BatchReport {
         failed,
         ..BatchReport::default()
      };
      for (job, result) in results {
         match result {
            Ok(path) => report.exported.push(path),
            Err(error) => {
               warn!(source = %job.source.display(), "处理失败：{error}");
               report.failed.push(BatchFailure {
                  source: job.source.clone(),
                  error,
               });
            }
         }
      }
      info!(exported = report.exported.len(), failed = report.failed.len(), "批量处理结束");
      report
   }

   /// 处理单张图片：读取、填入时间、合成并导出
   pub fn process(&self, job: &BatchJob) -> Result<PathBuf> {
      let photo = Photo::open(&job.source)?;
      let timestamp = photo.timestamp(&self.timestamps);
      let group = self.group.for_timestamp(&timestamp);
      export(&photo.image, &group, &job.spec, &job.source)
   }
}

/// # 批量添加水印
///
/// # 参数
/// * `inputs` - 图片文件或文件夹
/// * `group` - 水印组，EXIF 时间图层的文本按每张图片填入
/// * `spec` - 导出参数
/// * `jobs` - 并行数量
pub fn run(inputs: &[PathBuf], group: &WatermarkGroup, spec: &ExportSpec, jobs: usize) -> BatchReport {
   Batch::new(group.clone(), spec.clone()).with_jobs(jobs).run(inputs)
}

pub fn default_jobs() -> usize {
   thread::available_parallelism().map_or(1, |n| n.get())
}

fn expand_directory_images(dir_path: &Path, skip: Option<&Path>, result: &mut Vec<PathBuf>) -> io::Result<()> {
   let mut entries = fs::read_dir(dir_path)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<io::Result<Vec<_>>>()?;
   entries.sort();

   for path in entries {
      if path.is_file() && is_image_file(&path) {
         result.push(path);
      } else if path.is_dir() {
         // 已有的输出目录不再处理
         if skip.is_some_and(|skip| fs::canonicalize(&path).is_ok_and(|p| p == skip)) {
            continue;
         }
         expand_directory_images(&path, skip, result)?;
      }
   }
   Ok(())
}
