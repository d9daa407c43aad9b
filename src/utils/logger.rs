//! 日志初始化
//!
//! 控制台与追加写入的日志文件两路输出，格式与级别统一。

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::core::error::ExchangeError;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}{n}";

/// 解析日志级别字符串，未知值返回配置错误
pub fn parse_level(level: &str) -> Result<LevelFilter, ExchangeError> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| ExchangeError::ConfigError(format!("未知的日志级别: {}", level)))
}

/// 构建 log4rs 配置：stdout + 日志文件
pub fn build_config(log_file: &str, level: LevelFilter) -> Result<Config, ExchangeError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(log_file)
        .map_err(|e| ExchangeError::ConfigError(format!("打开日志文件失败 {}: {}", log_file, e)))?;

    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(level),
        )
        .map_err(|e| ExchangeError::ConfigError(format!("日志配置错误: {}", e)))
}

/// 初始化全局日志器，进程内只能调用一次
pub fn init_logger(log_file: &str, level: &str) -> Result<(), ExchangeError> {
    let config = build_config(log_file, parse_level(level)?)?;
    log4rs::init_config(config)
        .map_err(|e| ExchangeError::ConfigError(format!("日志器已初始化: {}", e)))?;
    Ok(())
}
