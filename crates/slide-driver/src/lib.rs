//! 驱动层模块
//!
//! 本模块提供滑动控制的 IO 与跨线程共享设施，包括：
//! - 能力抽象（`SensorSource` / `CommandSink` / `TactileStream` / `StatePublisher`）
//! - 最新值单元（ArcSwap 无锁读取，带版本号的自有快照）
//! - 接触状态 / 会话阶段的原子镜像
//! - 触觉接收与状态发布后台循环
//! - 运行指标（原子计数器）
//! - 仿真机械臂（`mock` feature）
//!
//! 控制律本身不在这里，参见 `slide-control`。

pub mod cell;
pub mod command;
mod error;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pipeline;
pub mod status;
pub mod traits;

pub use cell::{LatestReader, LatestWriter, Snapshot, latest_cell};
pub use command::{ActuatorFault, ActuatorFaultKind, CommandStatus, MotionCommand};
pub use error::{DriverError, FeedError};
pub use metrics::{ControlMetrics, MetricsSnapshot};
pub use pipeline::{
    MirroredState, PipelineConfig, StateMirror, promote_current_thread, publish_loop,
    state_mirror, tactile_loop,
};
pub use status::{AtomicContactState, AtomicSessionPhase, ContactState, SessionPhase};
pub use traits::{CommandSink, SensorSource, StatePublisher, TactileStream};
