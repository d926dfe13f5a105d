use std::env;

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

use crate::config::LOG_LEVEL;

struct Logger;

/// 安装日志输出，日志级别由环境变量 `LOG_LEVEL` 决定，默认为 INFO。
///
/// 重复初始化时返回错误。
pub fn init() -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    log::set_logger(&LOGGER)?;

    let log_level = env::var(LOG_LEVEL).unwrap_or_else(|_| String::from("INFO"));
    log::set_max_level(parse_level(&log_level));
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

impl Logger {
    /// 每个级别的终端颜色，可以用 `LOG_COLOR_<LEVEL>` 覆盖
    fn color_for_level(level: Level) -> u8 {
        let (key, default) = match level {
            Level::Error => ("LOG_COLOR_ERROR", 31),
            Level::Warn => ("LOG_COLOR_WARN", 93),
            Level::Info => ("LOG_COLOR_INFO", 34),
            Level::Debug => ("LOG_COLOR_DEBUG", 32),
            Level::Trace => ("LOG_COLOR_TRACE", 90),
        };
        env::var(key)
            .ok()
            .and_then(|color| color.parse().ok())
            .unwrap_or(default)
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = Logger::color_for_level(record.level());

        println!(
            "\u{1B}[{}m[{:>5}]: {} - {}\u{1B}[0m",
            color,
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {}
}
