//! 运行指标
//!
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。
//! 控制线程、触觉接收线程、发布线程共享同一个 `Arc<ControlMetrics>`。

use std::sync::atomic::{AtomicU64, Ordering};

/// 实时指标
#[derive(Debug, Default)]
pub struct ControlMetrics {
    /// 控制周期数
    pub ticks: AtomicU64,

    /// 控制周期超时（Overrun）次数
    ///
    /// 如果这个值快速增长，说明单周期耗时超过了标称周期。
    pub overruns: AtomicU64,

    /// 成功下发的运动命令数
    pub commands_sent: AtomicU64,

    /// 执行器故障次数
    pub actuator_faults: AtomicU64,

    /// 已开始的会话数
    pub sessions_started: AtomicU64,

    /// 已交付结果的会话数
    pub sessions_finished: AtomicU64,

    /// 被拒绝的请求数（校验失败 + 忙）
    pub requests_rejected: AtomicU64,

    /// 收到的触觉帧数
    pub tactile_frames: AtomicU64,

    /// 触觉接收超时次数（断流，正常现象）
    pub tactile_timeouts: AtomicU64,

    /// 触觉解析失败次数
    pub tactile_errors: AtomicU64,

    /// 状态镜像队列满而丢弃的次数
    pub mirror_drops: AtomicU64,

    /// 已对外发布的状态数
    pub states_published: AtomicU64,
}

impl ControlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计数 +1（Relaxed）
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    ///
    /// 各计数器分别原子读取，相互之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            actuator_faults: self.actuator_faults.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_finished: self.sessions_finished.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            tactile_frames: self.tactile_frames.load(Ordering::Relaxed),
            tactile_timeouts: self.tactile_timeouts.load(Ordering::Relaxed),
            tactile_errors: self.tactile_errors.load(Ordering::Relaxed),
            mirror_drops: self.mirror_drops.load(Ordering::Relaxed),
            states_published: self.states_published.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.overruns,
            &self.commands_sent,
            &self.actuator_faults,
            &self.sessions_started,
            &self.sessions_finished,
            &self.requests_rejected,
            &self.tactile_frames,
            &self.tactile_timeouts,
            &self.tactile_errors,
            &self.mirror_drops,
            &self.states_published,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub overruns: u64,
    pub commands_sent: u64,
    pub actuator_faults: u64,
    pub sessions_started: u64,
    pub sessions_finished: u64,
    pub requests_rejected: u64,
    pub tactile_frames: u64,
    pub tactile_timeouts: u64,
    pub tactile_errors: u64,
    pub mirror_drops: u64,
    pub states_published: u64,
}

impl MetricsSnapshot {
    /// 超时周期占比
    pub fn overrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.overruns as f64 / self.ticks as f64
        }
    }
}
