//! # Slide CLI
//!
//! 力感知滑动运动的命令行工具（仿真机械臂）。
//!
//! ```bash
//! # 沿 x 轴滑动 10 cm，5 N 接触阈值
//! slide-cli slide --distance 0.1,0,0 --speed 0.02,0,0 --force 5
//!
//! # 在 x = 4 cm 处放置接触面
//! slide-cli slide --distance 0.1,0,0 --speed 0.02,0,0 --force 5 --surface 0:0.04:2000
//!
//! # 只校验请求，不运动
//! slide-cli check --distance 0.5,0,0 --speed 0.02,0,0 --force 5
//!
//! # 打印默认配置
//! slide-cli config show
//! ```
//!
//! 日志级别通过 `RUST_LOG` 控制。

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod parse;

use commands::{CheckCommand, ConfigCommand, SlideCommand};

/// Slide CLI - 力感知滑动运动
#[derive(Parser, Debug)]
#[command(name = "slide-cli")]
#[command(about = "Force-aware sliding motion on a simulated arm", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 执行一次滑动（Ctrl-C 取消）
    Slide {
        #[command(flatten)]
        args: SlideCommand,
    },

    /// 按配置限制校验请求（不运动）
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志（RUST_LOG 优先）
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("slide_cli=info,slide_control=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Slide { args } => args.execute(),
        Commands::Check { args } => args.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
