//! 配置管理命令

use super::load_config;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效配置（TOML）
    Show {
        /// 配置文件（缺省时打印默认配置）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 校验配置文件
    Check {
        /// 配置文件路径
        path: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Show { config } => {
                let config = load_config(config.as_deref())?;
                let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
                print!("{}", text);
            },
            Self::Check { path } => {
                load_config(Some(&path))?;
                println!("✅ {} is valid", path.display());
            },
        }
        Ok(())
    }
}
