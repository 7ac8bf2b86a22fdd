//! Motion Generator - 同步多轴运动生成
//!
//! 所有轴共享一个路径参数 σ ∈ [0, 1]，σ 按梯形（或三角形）速度曲线推进：
//!
//! ```text
//! q_i(t)  = start_i + σ(t) · Δ_i
//! q̇_i(t)  = σ̇(t) · Δ_i
//!
//! σ̇_max = min_i  v_i / |Δ_i|        （仅运动轴）
//! σ̈_max = min_i  a_i / |Δ_i|
//! ```
//!
//! 若 `σ̇_max² / σ̈_max ≥ 1`，达不到巡航速度，退化为三角形曲线。
//!
//! # 特性
//!
//! - **直线路径**: 各轴同步起止，路径为起点到终点的直线
//! - **速度连续**: 加速度有界，速度无跳变
//! - **单轴单调**: 每个轴的位置单调趋近目标
//! - **纯函数**: `sample` 只依赖构造参数与时间，可确定性重放
//!
//! # 示例
//!
//! ```rust
//! use slide_control::motion::{AxisLimits, MotionGenerator};
//! use std::time::Duration;
//!
//! let limits = AxisLimits::uniform(0.02, 0.5);
//! let generator = MotionGenerator::new([0.0; 3], [0.1, 0.0, 0.0], limits).unwrap();
//!
//! let end = generator.sample(generator.duration());
//! assert_eq!(end.position, [0.1, 0.0, 0.0]);
//! assert!(end.finished);
//! ```

use std::time::Duration;
use thiserror::Error;

/// 位移小于该值的轴视为静止
const MIN_AXIS_TRAVEL: f64 = 1e-12;

/// 轨迹参数错误
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ProfileError {
    #[error("Start or goal contains non-finite values")]
    NonFinite,

    #[error("Axis {axis} has invalid limits (velocity {velocity}, acceleration {acceleration})")]
    InvalidLimit {
        axis: usize,
        velocity: f64,
        acceleration: f64,
    },

    #[error("Speed factor {0} outside (0, 1]")]
    InvalidSpeedFactor(f64),
}

/// 每轴速度 / 加速度上限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits<const N: usize> {
    pub velocity: [f64; N],
    pub acceleration: [f64; N],
}

impl<const N: usize> AxisLimits<N> {
    /// 所有轴使用相同限制
    pub fn uniform(velocity: f64, acceleration: f64) -> Self {
        Self {
            velocity: [velocity; N],
            acceleration: [acceleration; N],
        }
    }

    /// 按比例缩放
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            velocity: self.velocity.map(|v| v * factor),
            acceleration: self.acceleration.map(|a| a * factor),
        }
    }
}

/// 单点采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample<const N: usize> {
    pub position: [f64; N],
    pub velocity: [f64; N],
    /// 是否已到达名义终点（t ≥ duration）
    pub finished: bool,
}

/// 路径参数 σ 的速度曲线
#[derive(Debug, Clone, Copy, PartialEq)]
struct PathProfile {
    /// 峰值 σ̇
    peak_rate: f64,
    /// σ̈
    accel: f64,
    /// 加速段时长（秒）
    t_accel: f64,
    /// 匀速段时长（秒）
    t_cruise: f64,
    /// 总时长（秒）
    total: f64,
}

impl PathProfile {
    const STILL: PathProfile = PathProfile {
        peak_rate: 0.0,
        accel: 0.0,
        t_accel: 0.0,
        t_cruise: 0.0,
        total: 0.0,
    };

    fn plan(max_rate: f64, max_accel: f64) -> Self {
        if max_rate * max_rate / max_accel >= 1.0 {
            // 三角形：加速到 σ = 0.5 即开始减速
            let t_accel = (1.0 / max_accel).sqrt();
            Self {
                peak_rate: max_accel * t_accel,
                accel: max_accel,
                t_accel,
                t_cruise: 0.0,
                total: 2.0 * t_accel,
            }
        } else {
            let t_accel = max_rate / max_accel;
            let t_cruise = (1.0 - max_rate * max_rate / max_accel) / max_rate;
            Self {
                peak_rate: max_rate,
                accel: max_accel,
                t_accel,
                t_cruise,
                total: 2.0 * t_accel + t_cruise,
            }
        }
    }

    /// 返回 (σ, σ̇)
    fn evaluate(&self, t: f64) -> (f64, f64) {
        if t >= self.total {
            return (1.0, 0.0);
        }
        if t <= 0.0 {
            return (0.0, 0.0);
        }

        let cruise_end = self.t_accel + self.t_cruise;
        if t < self.t_accel {
            (0.5 * self.accel * t * t, self.accel * t)
        } else if t < cruise_end {
            let sigma = 0.5 * self.accel * self.t_accel * self.t_accel
                + self.peak_rate * (t - self.t_accel);
            (sigma, self.peak_rate)
        } else {
            let remaining = self.total - t;
            (
                (1.0 - 0.5 * self.accel * remaining * remaining).clamp(0.0, 1.0),
                self.accel * remaining,
            )
        }
    }
}

/// 同步多轴运动生成器
///
/// 关节空间归位使用 `N = 7`，笛卡尔滑动使用 `N = 3`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionGenerator<const N: usize> {
    start: [f64; N],
    goal: [f64; N],
    delta: [f64; N],
    profile: PathProfile,
}

impl<const N: usize> MotionGenerator<N> {
    /// 创建生成器
    ///
    /// # 参数
    ///
    /// - `start`: 起点
    /// - `goal`: 终点
    /// - `limits`: 每轴速度 / 加速度上限（运动轴必须为正）
    ///
    /// # 错误
    ///
    /// - `ProfileError::NonFinite`: 起点或终点含 NaN / Inf
    /// - `ProfileError::InvalidLimit`: 运动轴的限制不是正数
    pub fn new(
        start: [f64; N],
        goal: [f64; N],
        limits: AxisLimits<N>,
    ) -> Result<Self, ProfileError> {
        if start.iter().chain(goal.iter()).any(|x| !x.is_finite()) {
            return Err(ProfileError::NonFinite);
        }

        let mut delta = [0.0; N];
        let mut max_rate = f64::INFINITY;
        let mut max_accel = f64::INFINITY;
        let mut moving = false;

        for i in 0..N {
            delta[i] = goal[i] - start[i];
            let travel = delta[i].abs();
            if travel < MIN_AXIS_TRAVEL {
                continue;
            }

            let (v, a) = (limits.velocity[i], limits.acceleration[i]);
            if !(v.is_finite() && v > 0.0 && a.is_finite() && a > 0.0) {
                return Err(ProfileError::InvalidLimit {
                    axis: i,
                    velocity: v,
                    acceleration: a,
                });
            }
            moving = true;
            max_rate = max_rate.min(v / travel);
            max_accel = max_accel.min(a / travel);
        }

        let profile = if moving {
            PathProfile::plan(max_rate, max_accel)
        } else {
            PathProfile::STILL
        };

        Ok(Self {
            start,
            goal,
            delta,
            profile,
        })
    }

    /// 以速度系数缩放限制后创建（归位使用）
    ///
    /// `speed_factor` 同时缩放速度与加速度上限，取值 (0, 1]。
    pub fn with_speed_factor(
        start: [f64; N],
        goal: [f64; N],
        limits: AxisLimits<N>,
        speed_factor: f64,
    ) -> Result<Self, ProfileError> {
        if !(speed_factor > 0.0 && speed_factor <= 1.0) {
            return Err(ProfileError::InvalidSpeedFactor(speed_factor));
        }
        Self::new(start, goal, limits.scaled(speed_factor))
    }

    /// 名义时长
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.profile.total)
    }

    pub fn start(&self) -> [f64; N] {
        self.start
    }

    pub fn goal(&self) -> [f64; N] {
        self.goal
    }

    /// 峰值速度（每轴）
    pub fn peak_velocity(&self) -> [f64; N] {
        self.delta.map(|d| d.abs() * self.profile.peak_rate)
    }

    /// 在经过时间 `elapsed` 处采样
    ///
    /// `elapsed ≥ duration` 时精确返回终点、零速度。
    #[inline]
    pub fn sample(&self, elapsed: Duration) -> MotionSample<N> {
        let t = elapsed.as_secs_f64();
        if t >= self.profile.total {
            return MotionSample {
                position: self.goal,
                velocity: [0.0; N],
                finished: true,
            };
        }

        let (sigma, rate) = self.profile.evaluate(t);
        let mut position = [0.0; N];
        let mut velocity = [0.0; N];
        for i in 0..N {
            position[i] = self.start[i] + sigma * self.delta[i];
            velocity[i] = rate * self.delta[i];
        }
        MotionSample {
            position,
            velocity,
            finished: false,
        }
    }
}

/// 制动曲线
///
/// 从给定位置 / 速度出发，以恒定减速度线性降速至零：
///
/// ```text
/// T    = ‖v0‖ / decel
/// p(t) = p0 + v0 · (τ − τ² / 2T),   τ = min(t, T)
/// v(t) = v0 · (1 − τ / T)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrakeProfile<const N: usize> {
    origin: [f64; N],
    velocity: [f64; N],
    stop_time: f64,
}

impl<const N: usize> BrakeProfile<N> {
    /// 创建制动曲线（`deceleration` 必须为正）
    pub fn new(origin: [f64; N], velocity: [f64; N], deceleration: f64) -> Self {
        let speed = velocity.iter().map(|v| v * v).sum::<f64>().sqrt();
        let stop_time = if deceleration > 0.0 && speed.is_finite() {
            speed / deceleration
        } else {
            0.0
        };
        Self {
            origin,
            velocity,
            stop_time,
        }
    }

    /// 制动时长
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.stop_time)
    }

    /// 停止点
    pub fn stop_position(&self) -> [f64; N] {
        self.sample(self.duration()).position
    }

    pub fn sample(&self, elapsed: Duration) -> MotionSample<N> {
        let t = elapsed.as_secs_f64();
        if self.stop_time <= 0.0 {
            return MotionSample {
                position: self.origin,
                velocity: [0.0; N],
                finished: true,
            };
        }

        let tau = t.min(self.stop_time);
        let travel = tau - tau * tau / (2.0 * self.stop_time);
        let ramp = 1.0 - tau / self.stop_time;
        let mut position = [0.0; N];
        let mut velocity = [0.0; N];
        for i in 0..N {
            position[i] = self.origin[i] + self.velocity[i] * travel;
            velocity[i] = self.velocity[i] * ramp;
        }
        MotionSample {
            position,
            velocity,
            finished: t >= self.stop_time,
        }
    }
}
