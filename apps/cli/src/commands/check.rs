//! 请求校验命令
//!
//! 用与协调器相同的规则校验请求，并打印规划的运动时长。

use super::load_config;
use crate::parse::parse_vec3;
use anyhow::Result;
use clap::Args;
use slide_control::MotionGenerator;
use slide_protocol::SlidingRequest;
use std::path::PathBuf;

/// 校验命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 目标位移（m），逗号分隔
    #[arg(short, long)]
    pub distance: String,

    /// 各轴速度（m/s），逗号分隔
    #[arg(short, long)]
    pub speed: String,

    /// 接触力阈值（N）
    #[arg(short, long, default_value_t = 5.0)]
    pub force: f64,

    /// 配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl CheckCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let request = SlidingRequest::new(
            parse_vec3(&self.distance)?,
            parse_vec3(&self.speed)?,
            self.force,
        );

        if let Err(e) = config.limits.validate_request(&request) {
            println!("❌ Rejected: {}", e);
            return Ok(());
        }

        let generator =
            MotionGenerator::new([0.0; 3], request.distance, config.limits.axis_limits(&request))?;
        let peak = generator.peak_velocity();
        println!("✅ Accepted");
        println!("planned duration: {:.3} s", generator.duration().as_secs_f64());
        println!("peak velocity:    [{:.4}, {:.4}, {:.4}] m/s", peak[0], peak[1], peak[2]);
        Ok(())
    }
}
