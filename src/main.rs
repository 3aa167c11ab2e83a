use anyhow::Context;
use clap::Parser;
use photo_mark::batch::{Batch, default_jobs};
use photo_mark::config::Config;
use std::process::ExitCode;
use tracing::{debug, error};

mod cli;
mod logging;

fn main() -> anyhow::Result<ExitCode> {
   let cli = cli::Cli::parse();

   let mut config = match &cli.config {
      Some(path) => Config::load_from(path).with_context(|| format!("读取配置文件 {} 失败", path.display()))?,
      None => Config::default(),
   };
   cli.apply(&mut config);
   config.validate().context("参数无效")?;
   logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);
   debug!("photo_mark v{}", env!("CARGO_PKG_VERSION"));

   let batch = Batch::new(config.build_group(), config.export_spec())
      .with_timestamps(config.timestamp_resolver()?)
      .with_jobs(config.batch.jobs.unwrap_or_else(default_jobs));
   let report = batch.run(&cli.inputs);

   for path in &report.exported {
      println!("{}", path.display());
   }
   for failure in &report.failed {
      error!(source = %failure.source.display(), "{}", failure.error);
   }
   println!("完成：成功 {} 张，失败 {} 张", report.exported.len(), report.failed.len());

   Ok(if report.is_success() {
      ExitCode::SUCCESS
   } else {
      ExitCode::FAILURE
   })
}
