//! # Slide Protocol
//!
//! 滑动控制的数据模型定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `state`: 机械臂状态快照（关节、末端位姿、外力估计）
//! - `tactile`: 16 通道触觉帧及其载荷解码
//! - `request`: 滑动请求 / 响应与结果码
//!
//! ## 字节序
//!
//! 触觉载荷使用小端字节序（16 × i32，共 64 字节）。

pub mod request;
pub mod state;
pub mod tactile;

// 重新导出常用类型
pub use request::*;
pub use state::*;
pub use tactile::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid payload length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },
}
