//! # Slide Control
//!
//! 力感知滑动运动控制：机械臂沿指定位移滑动，感知到接触（末端外力或触觉读数）
//! 时平稳停下，并向请求方报告结果。
//!
//! ## 模块
//!
//! - `tactile`: 触觉帧归约、平滑与过期判断
//! - `contact`: 带滞回的接触检测（力 / 触觉融合）
//! - `motion`: 时间参数化运动生成器与制动曲线
//! - `homing`: 启动归位（产生 [`HomedToken`]）
//! - `controller`: 单周期状态机 [`SlideController`]
//! - `coordinator`: 请求校验、单会话准入与结果关联
//! - `loop_runner`: 绝对时间锚点的实时控制循环
//! - `runtime`: 线程装配与生命周期
//! - `config`: TOML 配置
//!
//! ## 线程模型
//!
//! ```text
//! 触觉接收线程 ──▶ 最新值单元 ──┐
//!                               ├─▶ 控制线程（唯一命令写者）──▶ 状态镜像 ──▶ 发布线程
//! 请求方 ──▶ RequestCoordinator ─┘         │
//!      ◀──────── 每会话回复通道 ◀──────────┘
//! ```
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use slide_control::{SlideConfig, SlideRuntimeBuilder};
//! use slide_protocol::SlidingRequest;
//!
//! let (runtime, coordinator) =
//!     SlideRuntimeBuilder::new(SlideConfig::default(), sensors, sink).start()?;
//!
//! let result = coordinator.submit(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0))?;
//! println!("{:?} after {:.3} m", result.reason, result.distance_travelled);
//!
//! runtime.shutdown()?;
//! ```

pub mod config;
pub mod contact;
pub mod controller;
pub mod coordinator;
mod error;
pub mod homing;
pub mod loop_runner;
pub mod motion;
pub mod runtime;
pub mod tactile;

/// 仿真机械臂（需要 `mock` feature）
#[cfg(feature = "mock")]
pub use slide_driver::mock;

pub use config::{
    ConfigError, ContactSettings, ControlSettings, HOME_JOINTS, HomingSettings, SlideConfig,
    SlideLimits, TactileSettings,
};
pub use contact::{ContactDetector, FusionPolicy, Hysteresis};
pub use controller::{CompletionReason, SharedStatus, SlideController, SlidingResult};
pub use coordinator::{
    LoopEndpoint, PendingSlide, RequestChannel, RequestCoordinator, SessionOutcome,
    request_handoff,
};
pub use error::{
    ControlError, FaultKind, HomingError, RequestError, StaleSource, StartError, ValidationError,
};
pub use homing::{HomedToken, home};
pub use loop_runner::{LoopConfig, run_control_loop};
pub use motion::{AxisLimits, BrakeProfile, MotionGenerator, MotionSample, ProfileError};
pub use runtime::{SlideRuntime, SlideRuntimeBuilder};
pub use tactile::{Reduction, TactileAggregator, TactileReading};
