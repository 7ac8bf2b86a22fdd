//! 命令定义和实现

pub mod check;
pub mod config;
pub mod slide;

pub use check::CheckCommand;
pub use config::ConfigCommand;
pub use slide::SlideCommand;

use anyhow::{Context, Result};
use slide_control::SlideConfig;
use std::path::Path;

/// 加载配置文件；未指定时使用默认配置
pub fn load_config(path: Option<&Path>) -> Result<SlideConfig> {
    match path {
        Some(path) => SlideConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(SlideConfig::default()),
    }
}
