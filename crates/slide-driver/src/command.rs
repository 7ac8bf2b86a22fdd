//! 运动命令与执行器状态
//!
//! 每次下发命令都返回显式的 [`CommandStatus`]，控制循环在本周期内同步检查，
//! 故障处理不依赖 panic / unwind。

use slide_protocol::JOINT_COUNT;
use thiserror::Error;

/// 运动命令
///
/// **Copy**：定长数组，热路径上按引用传递，不分配。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    /// 关节空间目标（归位）
    Joint {
        positions: [f64; JOINT_COUNT],
        velocities: [f64; JOINT_COUNT],
    },
    /// 笛卡尔空间目标（末端位置 + 线速度，姿态保持）
    Cartesian {
        position: [f64; 3],
        velocity: [f64; 3],
    },
    /// 原地保持（最安全的停止命令）
    Hold,
}

impl MotionCommand {
    /// 是否为停止类命令
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold)
    }
}

/// 执行器故障类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFaultKind {
    /// 通信故障（丢包、超时）
    Communication,
    /// 硬件报告的安全限位 / 反射触发
    SafetyLimit,
    /// 命令被拒绝（模式不符、参数非法）
    Refused,
}

/// 执行器故障
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Actuator fault: {kind:?} (code {code})")]
pub struct ActuatorFault {
    pub kind: ActuatorFaultKind,
    /// 硬件原始错误码，0 表示不可用
    pub code: u32,
}

impl ActuatorFault {
    pub const fn new(kind: ActuatorFaultKind, code: u32) -> Self {
        Self { kind, code }
    }
}

/// 命令下发结果
pub type CommandStatus = Result<(), ActuatorFault>;
