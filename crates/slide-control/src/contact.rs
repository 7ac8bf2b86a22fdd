//! 接触检测
//!
//! 外力模与触觉标量各自经过独立的滞回带：
//!
//! ```text
//!            ON ─────────┐ 超过 ON → 置位
//!                        │
//!   保持原值（滞回区）      │
//!                        │
//!           OFF ─────────┘ 低于 OFF → 复位
//! ```
//!
//! 两路结果再按融合策略合成 `ContactState`。
//! 本模块是接触状态的唯一写者。

use crate::config::ContactSettings;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use slide_driver::ContactState;

/// 融合策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// 任一信号置位即接触
    #[default]
    Either,
    /// 两路信号都置位才算接触
    Both,
    ForceOnly,
    TactileOnly,
}

impl FusionPolicy {
    fn fuse(self, force: bool, tactile: bool) -> bool {
        match self {
            FusionPolicy::Either => force || tactile,
            FusionPolicy::Both => force && tactile,
            FusionPolicy::ForceOnly => force,
            FusionPolicy::TactileOnly => tactile,
        }
    }
}

/// 单信号滞回
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    on: f64,
    off: f64,
    asserted: bool,
}

impl Hysteresis {
    /// 创建滞回带
    ///
    /// # 错误
    ///
    /// `off` 不是有限值或不严格小于 `on` 时返回 `ValidationError::InvalidHysteresis`。
    pub fn new(on: f64, off: f64) -> Result<Self, ValidationError> {
        if !off.is_finite() || off.partial_cmp(&on) != Some(std::cmp::Ordering::Less) {
            return Err(ValidationError::InvalidHysteresis { on, off });
        }
        Ok(Self {
            on,
            off,
            asserted: false,
        })
    }

    /// 输入新值，返回置位状态
    #[inline]
    pub fn update(&mut self, value: f64) -> bool {
        if self.asserted {
            if value < self.off {
                self.asserted = false;
            }
        } else if value > self.on {
            self.asserted = true;
        }
        self.asserted
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    pub fn reset(&mut self) {
        self.asserted = false;
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.on, self.off)
    }
}

/// 接触检测器
#[derive(Debug, Clone)]
pub struct ContactDetector {
    force: Hysteresis,
    tactile: Hysteresis,
    policy: FusionPolicy,
    release_ratio: f64,
    state: ContactState,
}

impl ContactDetector {
    /// 创建检测器
    ///
    /// 力阈值在 [`arm`](Self::arm) 时由请求给定；此前力通道阈值为无穷大，不会置位。
    ///
    /// # 错误
    ///
    /// 触觉滞回带无效（`tactile_off >= tactile_on`）
    pub fn new(settings: &ContactSettings) -> Result<Self, ValidationError> {
        Ok(Self {
            force: Hysteresis {
                on: f64::INFINITY,
                off: f64::INFINITY,
                asserted: false,
            },
            tactile: Hysteresis::new(settings.tactile_on, settings.tactile_off)?,
            policy: settings.fusion,
            release_ratio: settings.force_release_ratio,
            state: ContactState::NoContact,
        })
    }

    /// 以请求的力阈值武装检测器，并复位所有状态
    ///
    /// 力 OFF = `force_threshold × release_ratio`
    ///
    /// # 错误
    ///
    /// 阈值非正或非有限时返回错误，检测器保持不变。
    pub fn arm(&mut self, force_threshold: f64) -> Result<(), ValidationError> {
        if !force_threshold.is_finite() || force_threshold <= 0.0 {
            return Err(ValidationError::InvalidHysteresis {
                on: force_threshold,
                off: force_threshold * self.release_ratio,
            });
        }
        self.force = Hysteresis::new(force_threshold, force_threshold * self.release_ratio)?;
        self.reset();
        Ok(())
    }

    /// 复位到无接触
    pub fn reset(&mut self) {
        self.force.reset();
        self.tactile.reset();
        self.state = ContactState::NoContact;
    }

    /// 输入本周期的外力模与触觉标量
    #[inline]
    pub fn update(&mut self, force: f64, tactile: f64) -> ContactState {
        let f = self.force.update(force);
        let t = self.tactile.update(tactile);
        self.state = if self.policy.fuse(f, t) {
            ContactState::Touching
        } else {
            ContactState::NoContact
        };
        self.state
    }

    pub fn state(&self) -> ContactState {
        self.state
    }

    /// 两路滞回各自的置位状态 `(力, 触觉)`
    pub fn asserted(&self) -> (bool, bool) {
        (self.force.is_asserted(), self.tactile.is_asserted())
    }

    pub fn policy(&self) -> FusionPolicy {
        self.policy
    }

    pub fn force_thresholds(&self) -> (f64, f64) {
        self.force.thresholds()
    }
}
