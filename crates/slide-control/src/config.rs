//! 运行配置
//!
//! 所有参数都有默认值，TOML 中缺省的段或字段取默认：
//!
//! ```toml
//! [control]
//! rate_hz = 1000.0
//! settle_ms = 200
//!
//! [limits]
//! max_speed = 0.1
//!
//! [contact]
//! fusion = "either"
//! tactile_on = 50.0
//! tactile_off = 30.0
//!
//! [tactile]
//! reduction = "mean"
//! smoothing = 0.5
//! ```

use crate::contact::FusionPolicy;
use crate::error::ValidationError;
use crate::motion::AxisLimits;
use crate::tactile::Reduction;
use serde::{Deserialize, Serialize};
use slide_protocol::{JOINT_COUNT, SlidingRequest, TACTILE_CHANNELS};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 启动归位的参考关节角（rad）
pub const HOME_JOINTS: [f64; JOINT_COUNT] = [
    0.0136753,
    -0.168999,
    0.036906,
    -2.43915,
    -0.00318729,
    2.25804,
    -0.6807243,
];

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideConfig {
    pub control: ControlSettings,
    pub limits: SlideLimits,
    pub contact: ContactSettings,
    pub tactile: TactileSettings,
    pub homing: HomingSettings,
}

impl SlideConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 内部一致性检查
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        ensure(c.rate_hz.is_finite() && c.rate_hz > 0.0, "control.rate_hz must be positive")?;
        ensure(
            c.brake_deceleration.is_finite() && c.brake_deceleration > 0.0,
            "control.brake_deceleration must be positive",
        )?;
        ensure(
            c.rel_tolerance >= 0.0 && c.abs_tolerance > 0.0,
            "control tolerances must be non-negative (abs_tolerance > 0)",
        )?;
        ensure(c.robot_state_window_ms > 0, "control.robot_state_window_ms must be positive")?;

        let l = &self.limits;
        ensure(
            l.max_distance > 0.0 && l.max_speed > 0.0 && l.max_acceleration > 0.0,
            "limits must be positive",
        )?;
        ensure(
            l.min_force > 0.0 && l.min_force <= l.max_force,
            "limits.min_force must be within (0, max_force]",
        )?;

        let k = &self.contact;
        ensure(
            k.force_release_ratio > 0.0 && k.force_release_ratio < 1.0,
            "contact.force_release_ratio must be in (0, 1)",
        )?;
        ensure(
            k.tactile_off < k.tactile_on,
            "contact.tactile_off must be strictly below contact.tactile_on",
        )?;

        let t = &self.tactile;
        ensure(
            t.smoothing > 0.0 && t.smoothing <= 1.0,
            "tactile.smoothing must be in (0, 1]",
        )?;
        ensure(t.scale.is_finite(), "tactile.scale must be finite")?;
        ensure(
            t.publish_period_ms > 0 && t.stale_multiplier > 0,
            "tactile staleness window must be positive",
        )?;
        if t.reduction == Reduction::Weighted {
            ensure(
                t.weights.iter().all(|w| w.is_finite()),
                "tactile.weights must be finite",
            )?;
        }

        let h = &self.homing;
        ensure(
            h.speed_factor > 0.0 && h.speed_factor <= 1.0,
            "homing.speed_factor must be in (0, 1]",
        )?;
        ensure(
            h.max_joint_velocity > 0.0 && h.max_joint_acceleration > 0.0,
            "homing joint limits must be positive",
        )?;
        ensure(h.tolerance > 0.0, "homing.tolerance must be positive")?;
        ensure(
            h.reference_joints.iter().all(|q| q.is_finite()),
            "homing.reference_joints must be finite",
        )?;

        Ok(())
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}

/// 控制循环参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// 控制频率（Hz）
    pub rate_hz: f64,
    /// 终止后的制动 / 保持时长（毫秒）
    pub settle_ms: u64,
    /// 轨迹结束后等待实测收敛的时长（毫秒）
    pub convergence_timeout_ms: u64,
    /// 相对到位容差（占总位移比例）
    pub rel_tolerance: f64,
    /// 绝对到位容差（m）
    pub abs_tolerance: f64,
    /// 制动减速度（m/s²）
    pub brake_deceleration: f64,
    /// 机械臂状态过期窗口（毫秒）
    pub robot_state_window_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            rate_hz: 1000.0,
            settle_ms: 200,
            convergence_timeout_ms: 1000,
            rel_tolerance: 0.01,
            abs_tolerance: 0.0005,
            brake_deceleration: 0.5,
            robot_state_window_ms: 20,
        }
    }
}

impl ControlSettings {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_millis(self.convergence_timeout_ms)
    }

    pub fn robot_state_window(&self) -> Duration {
        Duration::from_millis(self.robot_state_window_ms)
    }

    /// 到位容差：`max(rel × ‖d‖, abs)`
    pub fn tolerance_for(&self, distance_norm: f64) -> f64 {
        (self.rel_tolerance * distance_norm).max(self.abs_tolerance)
    }
}

/// 硬件限制（请求校验）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideLimits {
    /// 单轴最大位移（m）
    pub max_distance: f64,
    /// 单轴最大速度（m/s）
    pub max_speed: f64,
    /// 单轴加速度上限（m/s²）
    pub max_acceleration: f64,
    /// 力阈值下限（N）
    pub min_force: f64,
    /// 力阈值上限（N）
    pub max_force: f64,
}

impl Default for SlideLimits {
    fn default() -> Self {
        Self {
            max_distance: 0.3,
            max_speed: 0.1,
            max_acceleration: 0.5,
            min_force: 0.5,
            max_force: 30.0,
        }
    }
}

/// 总位移小于该值视为零
const MIN_DISTANCE: f64 = 1e-6;

/// 单轴位移大于该值视为运动轴
const MIN_AXIS_TRAVEL: f64 = 1e-12;

impl SlideLimits {
    /// 按硬件限制校验请求
    ///
    /// 协调器在交接前、控制器在开始会话时使用同一个校验。
    pub fn validate_request(&self, request: &SlidingRequest) -> Result<(), ValidationError> {
        if !request.is_finite() {
            return Err(ValidationError::NonFinite);
        }

        for axis in 0..3 {
            let distance = request.distance[axis];
            if distance.abs() > self.max_distance {
                return Err(ValidationError::DistanceOutOfRange {
                    axis,
                    value: distance,
                    max: self.max_distance,
                });
            }
            let speed = request.speed[axis];
            if !(0.0..=self.max_speed).contains(&speed) {
                return Err(ValidationError::SpeedOutOfRange {
                    axis,
                    value: speed,
                    max: self.max_speed,
                });
            }
        }

        if request.distance_norm() < MIN_DISTANCE {
            return Err(ValidationError::ZeroDistance);
        }

        for axis in 0..3 {
            if request.distance[axis].abs() > MIN_AXIS_TRAVEL && request.speed[axis] <= 0.0 {
                return Err(ValidationError::MissingSpeed { axis });
            }
        }

        let force = request.force_threshold;
        if force <= 0.0 || !(self.min_force..=self.max_force).contains(&force) {
            return Err(ValidationError::ForceOutOfRange {
                value: force,
                min: self.min_force,
                max: self.max_force,
            });
        }

        Ok(())
    }

    /// 滑动的每轴限制：速度取请求值，加速度取上限
    pub fn axis_limits(&self, request: &SlidingRequest) -> AxisLimits<3> {
        AxisLimits {
            velocity: request.speed,
            acceleration: [self.max_acceleration; 3],
        }
    }
}

/// 接触检测参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSettings {
    pub fusion: FusionPolicy,
    /// 力 OFF 阈值 = 请求力阈值 × 该比例
    pub force_release_ratio: f64,
    /// 触觉 ON 阈值
    pub tactile_on: f64,
    /// 触觉 OFF 阈值（必须严格小于 ON）
    pub tactile_off: f64,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            fusion: FusionPolicy::Either,
            force_release_ratio: 0.8,
            tactile_on: 50.0,
            tactile_off: 30.0,
        }
    }
}

/// 触觉聚合参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TactileSettings {
    pub reduction: Reduction,
    /// `Weighted` 归约的通道权重
    pub weights: [f64; TACTILE_CHANNELS],
    pub scale: f64,
    /// 指数平滑系数 α ∈ (0, 1]，1 表示不平滑
    pub smoothing: f64,
    /// 触觉源标称发布周期（毫秒）
    pub publish_period_ms: u64,
    /// 过期窗口 = 倍数 × 发布周期
    pub stale_multiplier: u32,
}

impl Default for TactileSettings {
    fn default() -> Self {
        Self {
            reduction: Reduction::Mean,
            weights: [1.0 / TACTILE_CHANNELS as f64; TACTILE_CHANNELS],
            scale: 1.0,
            smoothing: 1.0,
            publish_period_ms: 10,
            stale_multiplier: 5,
        }
    }
}

impl TactileSettings {
    pub fn stale_window(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms) * self.stale_multiplier
    }
}

/// 启动归位参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingSettings {
    pub reference_joints: [f64; JOINT_COUNT],
    /// 速度缩放 (0, 1]
    pub speed_factor: f64,
    /// 关节速度上限（rad/s，缩放前）
    pub max_joint_velocity: f64,
    /// 关节加速度上限（rad/s²，缩放前）
    pub max_joint_acceleration: f64,
    /// 到位容差（rad）
    pub tolerance: f64,
    /// 轨迹结束后等待到位的时长（毫秒）
    pub timeout_ms: u64,
}

impl Default for HomingSettings {
    fn default() -> Self {
        Self {
            reference_joints: HOME_JOINTS,
            speed_factor: 0.5,
            max_joint_velocity: 2.0,
            max_joint_acceleration: 5.0,
            tolerance: 0.01,
            timeout_ms: 2000,
        }
    }
}

impl HomingSettings {
    /// 未缩放的关节限制
    pub fn joint_limits(&self) -> AxisLimits<JOINT_COUNT> {
        AxisLimits::uniform(self.max_joint_velocity, self.max_joint_acceleration)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
