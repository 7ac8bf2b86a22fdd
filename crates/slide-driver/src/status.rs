//! 接触状态与会话阶段
//!
//! 两者都只由控制线程写入，其他线程通过原子镜像读取。
//!
//! # 线程安全
//!
//! 使用 `AtomicU8` 存储，读写均无锁；写者唯一，不需要 CAS。

use std::sync::atomic::{AtomicU8, Ordering};

/// 接触状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ContactState {
    /// 无接触（初始状态）
    #[default]
    NoContact = 0,
    /// 接触中
    Touching = 1,
}

impl ContactState {
    /// 从 u8 转换
    ///
    /// 无效值视为无接触。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Touching,
            _ => Self::NoContact,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_touching(self) -> bool {
        self == Self::Touching
    }
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionPhase {
    /// 空闲，等待请求
    #[default]
    Idle = 0,
    /// 启动归位中（不接受请求）
    Homing = 1,
    /// 滑动中
    Sliding = 2,
    /// 停止 / 稳定中（结果尚未交付）
    Stopping = 3,
}

impl SessionPhase {
    /// 从 u8 转换
    ///
    /// 无效值视为 Stopping（保守：不可接受新请求）。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Homing,
            2 => Self::Sliding,
            _ => Self::Stopping,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否存在活动会话
    pub fn is_active(self) -> bool {
        matches!(self, Self::Sliding | Self::Stopping)
    }
}

/// 接触状态原子镜像
#[derive(Debug, Default)]
pub struct AtomicContactState {
    inner: AtomicU8,
}

impl AtomicContactState {
    pub fn new(state: ContactState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> ContactState {
        ContactState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ContactState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }
}

/// 会话阶段原子镜像
#[derive(Debug, Default)]
pub struct AtomicSessionPhase {
    inner: AtomicU8,
}

impl AtomicSessionPhase {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            inner: AtomicU8::new(phase.as_u8()),
        }
    }

    pub fn get(&self) -> SessionPhase {
        SessionPhase::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, phase: SessionPhase) {
        self.inner.store(phase.as_u8(), Ordering::Release);
    }
}
