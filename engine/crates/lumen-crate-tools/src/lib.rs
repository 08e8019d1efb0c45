//! Lumen 工具集
//!
//! 提供日志初始化、TOML 配置加载、帧计时等通用工具。

pub mod init_log;
pub mod settings;
pub mod timer;
