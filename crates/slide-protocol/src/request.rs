//! 滑动请求与响应
//!
//! 对外接口的形状：
//!
//! ```text
//! request  { distance: [3]f64, speed: [3]f64, force_threshold: f64 }
//! response { accepted, distance_travelled: [3]f64, contact_detected, reason }
//! ```

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 滑动请求
///
/// 受理后不可变；会话结束时按值交还给结果。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlidingRequest {
    /// 目标位移（米，基坐标系）
    pub distance: [f64; 3],
    /// 各轴目标速度（米/秒，取绝对值）
    pub speed: [f64; 3],
    /// 外力阈值（牛顿）
    pub force_threshold: f64,
}

impl SlidingRequest {
    pub const fn new(distance: [f64; 3], speed: [f64; 3], force_threshold: f64) -> Self {
        Self {
            distance,
            speed,
            force_threshold,
        }
    }

    /// 目标位移的模
    pub fn distance_norm(&self) -> f64 {
        self.distance.iter().map(|d| d * d).sum::<f64>().sqrt()
    }

    /// 所有字段都是有限值
    pub fn is_finite(&self) -> bool {
        self.distance.iter().chain(self.speed.iter()).all(|v| v.is_finite())
            && self.force_threshold.is_finite()
    }
}

/// 响应结果码
///
/// `u8` 编码稳定，作为线上格式使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResponseReason {
    /// 到达目标位移
    GoalReached = 0,
    /// 检测到接触后停止
    ContactStopped = 1,
    /// 被取消
    Aborted = 2,
    /// 执行器或传感器故障
    Faulted = 3,
    /// 未受理（校验失败或忙）
    Rejected = 4,
}

impl ResponseReason {
    /// 从线上编码解析
    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        Self::try_from(code).map_err(|e| ProtocolError::InvalidValue {
            field: "reason",
            value: e.number,
        })
    }

    /// 线上编码
    pub fn code(self) -> u8 {
        self.into()
    }
}

/// 滑动响应
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlidingResponse {
    /// 是否受理
    pub accepted: bool,
    /// 实际位移（米）
    pub distance_travelled: [f64; 3],
    /// 是否检测到接触
    pub contact_detected: bool,
    /// 结果码
    pub reason: ResponseReason,
}

impl SlidingResponse {
    /// 未受理的响应（无运动）
    pub const fn rejected() -> Self {
        Self {
            accepted: false,
            distance_travelled: [0.0; 3],
            contact_detected: false,
            reason: ResponseReason::Rejected,
        }
    }

    /// 已受理但未得到结果（控制循环失联）
    pub const fn faulted() -> Self {
        Self {
            accepted: true,
            distance_travelled: [0.0; 3],
            contact_detected: false,
            reason: ResponseReason::Faulted,
        }
    }
}
