//! 错误类型定义
//!
//! 实时路径上的错误（`FaultKind`、`StartError`）都是 `Copy`，
//! 不装箱、不携带字符串，可以在控制线程中直接构造和传递。

use crate::config::ConfigError;
use slide_driver::{ActuatorFault, FeedError};
use std::time::Duration;
use thiserror::Error;

/// 请求校验错误（同步拒绝，不产生任何运动）
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    #[error("Request contains non-finite values")]
    NonFinite,

    #[error("Requested distance is zero")]
    ZeroDistance,

    #[error("Distance on axis {axis} is {value} m, limit is {max} m")]
    DistanceOutOfRange { axis: usize, value: f64, max: f64 },

    #[error("Speed on axis {axis} is {value} m/s, allowed range is [0, {max}] m/s")]
    SpeedOutOfRange { axis: usize, value: f64, max: f64 },

    #[error("Axis {axis} moves but has zero speed")]
    MissingSpeed { axis: usize },

    #[error("Force threshold {value} N outside [{min}, {max}] N")]
    ForceOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Invalid hysteresis band: ON {on}, OFF {off} (need finite OFF < ON)")]
    InvalidHysteresis { on: f64, off: f64 },

    #[error("Cannot plan slide: {0}")]
    InvalidProfile(#[from] crate::motion::ProfileError),
}

/// 过期的传感器来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleSource {
    Tactile,
    RobotState,
}

/// 会话故障原因（`CompletionReason::Faulted` 的细节）
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum FaultKind {
    /// 传感器数据超过过期窗口
    #[error("{sensor:?} data is stale (age {age:?})")]
    SensorStale {
        sensor: StaleSource,
        /// 最后一帧的年龄；从未收到数据时为 `None`
        age: Option<Duration>,
    },

    /// 执行器拒绝命令
    #[error(transparent)]
    Actuator(ActuatorFault),

    /// 机械臂状态流不可用
    #[error("Robot state feed lost: {0}")]
    FeedLost(FeedError),

    /// 轨迹已结束但实测位移在超时内未收敛
    #[error("Goal not reached: {remaining} m remaining")]
    GoalNotReached { remaining: f64 },
}

/// 控制器拒绝开始会话
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum StartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A session is already active")]
    Busy,

    #[error("Robot state unavailable: {0}")]
    Feed(FeedError),
}

/// 请求协调错误（返回给请求方）
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RequestError {
    #[error("Request rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Another sliding session is in flight")]
    ConcurrencyReject,

    #[error("Robot state unavailable at session start: {0}")]
    Feed(FeedError),

    /// 收到了其他会话的结果
    #[error("Result for session {actual} delivered to session {expected}")]
    SessionMismatch { expected: u64, actual: u64 },

    #[error("Control loop stopped")]
    ControllerStopped,
}

impl RequestError {
    /// 请求在控制线程开始运动之前被拒绝
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RequestError::Validation(_) | RequestError::ConcurrencyReject | RequestError::Feed(_)
        )
    }
}

impl From<StartError> for RequestError {
    fn from(e: StartError) -> Self {
        match e {
            StartError::Validation(v) => RequestError::Validation(v),
            StartError::Busy => RequestError::ConcurrencyReject,
            StartError::Feed(f) => RequestError::Feed(f),
        }
    }
}

/// 归位错误（初始化失败，致命）
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum HomingError {
    #[error("Homing command refused: {0}")]
    Actuator(ActuatorFault),

    #[error("Robot state unavailable during homing: {0}")]
    Feed(FeedError),

    #[error("Homing did not converge within {elapsed:?} (max joint error {error} rad)")]
    Timeout { elapsed: Duration, error: f64 },

    #[error("Invalid homing profile: {0}")]
    Profile(#[from] crate::motion::ProfileError),
}

/// 顶层控制错误
#[derive(Error, Debug)]
pub enum ControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Homing failed: {0}")]
    Homing(#[from] HomingError),

    #[error("Failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Control thread panicked")]
    ThreadPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_error_maps_to_request_error() {
        assert_eq!(
            RequestError::from(StartError::Busy),
            RequestError::ConcurrencyReject
        );
        assert_eq!(
            RequestError::from(StartError::Validation(ValidationError::ZeroDistance)),
            RequestError::Validation(ValidationError::ZeroDistance)
        );
        assert_eq!(
            RequestError::from(StartError::Feed(FeedError::Disconnected)),
            RequestError::Feed(FeedError::Disconnected)
        );
    }

    #[test]
    fn test_error_display() {
        let e = FaultKind::SensorStale {
            sensor: StaleSource::Tactile,
            age: Some(Duration::from_millis(60)),
        };
        assert!(e.to_string().contains("Tactile"));

        let e = ValidationError::MissingSpeed { axis: 1 };
        assert_eq!(e.to_string(), "Axis 1 moves but has zero speed");
    }
}
