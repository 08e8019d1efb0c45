use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor, Style};

/// 源码位置使用的灰色
const LOCATION_STYLE: Style = Style::new().fg_color(Some(Color::Rgb(RgbColor(110, 110, 110))));

/// 每个级别的颜色，Error 额外加粗
fn level_style(level: log::Level) -> Style {
    let color = match level {
        log::Level::Error => AnsiColor::Red,
        log::Level::Warn => AnsiColor::Yellow,
        log::Level::Info => AnsiColor::Green,
        log::Level::Debug => AnsiColor::Cyan,
        log::Level::Trace => AnsiColor::Magenta,
    };
    let style = Style::new().fg_color(Some(Color::Ansi(color)));
    if level == log::Level::Error { style.bold() } else { style }
}

/// 只保留文件名，兼容两种路径分隔符
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// 初始化全局 logger，默认级别为 Info
pub fn init_log() {
    init_log_with_level(log::LevelFilter::Info);
}

/// 以 `level` 作为默认级别初始化全局 logger，`RUST_LOG` 可以覆盖它
///
/// 重复初始化不会 panic，例如多个测试都调用了它
pub fn init_log_with_level(level: log::LevelFilter) {
    let result = env_logger::Builder::new()
        .format(|buf, record| {
            let style = level_style(record.level());
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let location = match (record.file(), record.line()) {
                (Some(file), Some(line)) => format!("{}:{}", file_name(file), line),
                _ => record.target().to_string(),
            };

            writeln!(
                buf,
                "{style}[{time}] {:<5}{style:#} {LOCATION_STYLE}[{location}]{LOCATION_STYLE:#} {}",
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();

    if result.is_err() {
        log::debug!("logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name("engine/crates/lumen-renderer/src/renderer.rs"), "renderer.rs");
        assert_eq!(file_name(r"C:\lumen\src\main.rs"), "main.rs");
        assert_eq!(file_name("lib.rs"), "lib.rs");
    }

    #[test]
    fn every_level_has_its_own_color() {
        let levels = [log::Level::Error, log::Level::Warn, log::Level::Info, log::Level::Debug, log::Level::Trace];
        let colors = levels.iter().map(|level| level_style(*level).get_fg_color()).collect::<Vec<_>>();
        for (i, color) in colors.iter().enumerate() {
            assert!(color.is_some());
            assert!(!colors[i + 1..].contains(color));
        }
        assert!(level_style(log::Level::Error).get_effects().contains(anstyle::Effects::BOLD));
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_log_with_level(log::LevelFilter::Debug);
        init_log();
        log::info!("logger still works");
    }
}
