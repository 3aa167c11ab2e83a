use photo_mark::config::LoggingSection;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// # 初始化日志
///
/// # 参数
/// * `level` - 默认日志级别，`RUST_LOG` 环境变量优先
/// * `json` - 输出 JSON 格式日志
///
/// 日志写到 stderr，stdout 留给处理结果。
pub fn init(level: &str, json: bool) {
   let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
   if json {
      tracing_subscriber::registry()
         .with(filter)
         .with(fmt::layer().json().with_writer(std::io::stderr))
         .init();
   } else {
      tracing_subscriber::registry()
         .with(filter)
         .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
         .init();
   }
}

/// 按配置文件初始化，命令行开关优先
pub fn init_from_config(logging: &LoggingSection, verbose: bool, json_logs: bool) {
   let level = if verbose { "debug" } else { logging.level.as_str() };
   init(level, json_logs || logging.format == "json");
}
