//! 能力抽象
//!
//! 控制核心只依赖这些 trait，不依赖任何具体传输层：
//!
//! ```text
//! TactileStream ──(接收线程)──▶ LatestWriter ─▶ LatestReader ─┐
//!                                                              ├─▶ SensorSource ─▶ 控制循环 ─▶ CommandSink
//! 机器人驱动 ───────────────────────────────────────────────────┘                     │
//!                                                                      StateMirror ─▶ StatePublisher
//! ```

use crate::cell::Snapshot;
use crate::command::{CommandStatus, MotionCommand};
use crate::error::{DriverError, FeedError};
use crate::pipeline::MirroredState;
use slide_protocol::{RobotState, TactileFrame};
use std::sync::Arc;
use std::time::Duration;

/// 传感器来源（控制线程独占）
pub trait SensorSource {
    /// 本周期的机械臂状态
    ///
    /// 实时路径：实现方不得阻塞或分配。
    fn robot_state(&mut self) -> Result<RobotState, FeedError>;

    /// 最新触觉快照（可能是旧的，也可能从未收到）
    fn tactile(&self) -> Option<Arc<Snapshot<TactileFrame>>>;
}

/// 命令下发（控制线程独占）
pub trait CommandSink {
    /// 下发一条运动命令，同步返回执行器状态
    fn send(&mut self, command: &MotionCommand) -> CommandStatus;
}

/// 外部触觉数据流（接收线程独占）
pub trait TactileStream {
    /// 接收下一帧
    ///
    /// - `Err(DriverError::Timeout)`: 本次无数据（正常，允许断流）
    /// - `Err(DriverError::StreamClosed)`: 上游关闭，接收线程退出
    fn receive(&mut self, timeout: Duration) -> Result<TactileFrame, DriverError>;
}

/// 对外状态发布（发布线程独占）
pub trait StatePublisher {
    fn publish(&mut self, state: &MirroredState) -> Result<(), DriverError>;
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn send(&mut self, command: &MotionCommand) -> CommandStatus {
        (**self).send(command)
    }
}

impl<T: SensorSource + ?Sized> SensorSource for Box<T> {
    fn robot_state(&mut self) -> Result<RobotState, FeedError> {
        (**self).robot_state()
    }

    fn tactile(&self) -> Option<Arc<Snapshot<TactileFrame>>> {
        (**self).tactile()
    }
}

impl<T: TactileStream + ?Sized> TactileStream for Box<T> {
    fn receive(&mut self, timeout: Duration) -> Result<TactileFrame, DriverError> {
        (**self).receive(timeout)
    }
}

impl<T: StatePublisher + ?Sized> StatePublisher for Box<T> {
    fn publish(&mut self, state: &MirroredState) -> Result<(), DriverError> {
        (**self).publish(state)
    }
}
