//! 触觉聚合器
//!
//! 把 16 通道原始触觉帧归约为一个标量接触压力估计：
//!
//! ```text
//! raw = reduce(channels) × scale
//! y   = y + α (raw − y)          // α = 1 时不平滑
//! ```
//!
//! 每个版本的快照只应用一次；快照未更新时保持上一次的估计值。
//! 过期判断基于快照的接收时刻；会话开始后尚未收到任何帧时，
//! 窗口从 `reset` 时刻起算。
//!
//! # 性能
//!
//! `update` 不分配、不阻塞，可直接在控制线程中调用。

use crate::config::TactileSettings;
use serde::{Deserialize, Serialize};
use slide_driver::Snapshot;
use slide_protocol::{TACTILE_CHANNELS, TactileFrame};
use std::time::{Duration, Instant};

/// 通道归约策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// 算术平均
    #[default]
    Mean,
    /// 最大值
    Max,
    /// 加权和（权重见配置）
    Weighted,
}

/// 单周期聚合结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TactileReading {
    /// 标量估计（从未收到帧时为 0）
    pub value: f64,
    /// 是否超过过期窗口
    pub stale: bool,
    /// 最新帧的年龄（从未收到帧时为 `None`）
    pub age: Option<Duration>,
}

/// 触觉聚合器（控制线程独占）
#[derive(Debug, Clone)]
pub struct TactileAggregator {
    reduction: Reduction,
    weights: [f64; TACTILE_CHANNELS],
    scale: f64,
    alpha: f64,
    window: Duration,
    last_version: u64,
    smoothed: Option<f64>,
    reset_at: Option<Instant>,
}

impl TactileAggregator {
    pub fn new(settings: &TactileSettings) -> Self {
        Self {
            reduction: settings.reduction,
            weights: settings.weights,
            scale: settings.scale,
            alpha: settings.smoothing,
            window: settings.stale_window(),
            last_version: 0,
            smoothed: None,
            reset_at: None,
        }
    }

    /// 会话开始时重置
    ///
    /// 清除平滑状态，下一次 `update` 会重新应用当前快照。
    pub fn reset(&mut self, now: Instant) {
        self.last_version = 0;
        self.smoothed = None;
        self.reset_at = Some(now);
    }

    /// 当前估计值
    pub fn value(&self) -> f64 {
        self.smoothed.unwrap_or(0.0)
    }

    /// 单帧归约（含 scale，不含平滑）
    pub fn reduce(&self, frame: &TactileFrame) -> f64 {
        let raw = match self.reduction {
            Reduction::Mean => {
                frame.channels.iter().map(|&c| c as f64).sum::<f64>() / TACTILE_CHANNELS as f64
            },
            Reduction::Max => frame
                .channels
                .iter()
                .map(|&c| c as f64)
                .fold(f64::NEG_INFINITY, f64::max),
            Reduction::Weighted => frame
                .channels
                .iter()
                .zip(self.weights.iter())
                .map(|(&c, &w)| c as f64 * w)
                .sum(),
        };
        raw * self.scale
    }

    /// 应用最新快照并返回本周期读数
    pub fn update(
        &mut self,
        snapshot: Option<&Snapshot<TactileFrame>>,
        now: Instant,
    ) -> TactileReading {
        match snapshot {
            Some(snap) => {
                if snap.version != self.last_version {
                    let raw = self.reduce(&snap.value);
                    self.smoothed = Some(match self.smoothed {
                        None => raw,
                        Some(prev) => prev + self.alpha * (raw - prev),
                    });
                    self.last_version = snap.version;
                }
                let age = snap.age(now);
                TactileReading {
                    value: self.value(),
                    stale: age > self.window,
                    age: Some(age),
                }
            },
            None => {
                // 从未收到帧：窗口从 reset 起算；从未 reset 视为过期
                let stale = self
                    .reset_at
                    .map(|t| now.saturating_duration_since(t) > self.window)
                    .unwrap_or(true);
                TactileReading {
                    value: self.value(),
                    stale,
                    age: None,
                }
            },
        }
    }
}
