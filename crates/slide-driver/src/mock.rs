//! 仿真机械臂（需要 `mock` feature）
//!
//! 无硬件依赖的 [`SensorSource`] / [`CommandSink`] / [`TactileStream`] 实现，
//! 用于集成测试和命令行演示：
//!
//! - 理想跟踪：下发的关节 / 笛卡尔目标立即成为实际状态
//! - 位姿以列主序 4×4 齐次变换保存，传感器端按真实驱动的方式换算为 [`EndEffectorPose`]
//! - 接触面：末端越过平面后产生弹簧反力（`stiffness × 穿透深度`）
//! - 故障注入：第 N 条运动命令返回执行器故障、冻结状态时间戳、断开连接
//!
//! 与真实驱动一样，[`SimulatedArm::split`] 把传感器端与执行端分离给控制线程。

use crate::cell::{LatestReader, Snapshot};
use crate::command::{ActuatorFault, CommandStatus, MotionCommand};
use crate::error::{DriverError, FeedError};
use crate::traits::{CommandSink, SensorSource, TactileStream};
use parking_lot::Mutex;
use slide_protocol::{EndEffectorPose, JOINT_COUNT, RobotState, TACTILE_CHANNELS, TactileFrame};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 接触平面
///
/// 法向 `normal`（+1 / -1）沿 `axis` 轴；末端坐标越过 `position` 后产生反力。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSurface {
    pub axis: usize,
    pub position: f64,
    pub normal: f64,
    /// 刚度（N/m）
    pub stiffness: f64,
}

impl ContactSurface {
    /// 沿 +axis 方向接近的平面
    pub fn ahead(axis: usize, position: f64, stiffness: f64) -> Self {
        Self {
            axis,
            position,
            normal: 1.0,
            stiffness,
        }
    }

    fn wrench_at(&self, position: &[f64; 3]) -> [f64; 6] {
        let mut wrench = [0.0; 6];
        let penetration = (position[self.axis] - self.position) * self.normal;
        if penetration > 0.0 {
            wrench[self.axis] = -self.normal * self.stiffness * penetration;
        }
        wrench
    }
}

#[derive(Debug)]
struct SimPhysics {
    joints: [f64; JOINT_COUNT],
    joint_velocities: [f64; JOINT_COUNT],
    /// 末端位姿（列主序齐次变换）
    o_t_ee: [f64; 16],
    surface: Option<ContactSurface>,
    wrench_override: Option<[f64; 6]>,
    frozen_at: Option<Instant>,
    connected: bool,
    fail_after: Option<(u64, ActuatorFault)>,
    reject_joint: Option<ActuatorFault>,
    motion_commands: u64,
    log: Vec<MotionCommand>,
    tactile_paused: bool,
    tactile_override: Option<[i32; TACTILE_CHANNELS]>,
}

impl SimPhysics {
    fn wrench(&self) -> [f64; 6] {
        if let Some(w) = self.wrench_override {
            return w;
        }
        self.surface.map(|s| s.wrench_at(&self.position())).unwrap_or([0.0; 6])
    }

    fn position(&self) -> [f64; 3] {
        [self.o_t_ee[12], self.o_t_ee[13], self.o_t_ee[14]]
    }

    fn pose(&self) -> EndEffectorPose {
        EndEffectorPose::from_transform(&self.o_t_ee)
    }
}

/// 仿真机械臂句柄（Clone 共享同一仿真状态）
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    inner: Arc<Mutex<SimPhysics>>,
}

impl SimulatedArm {
    /// 以给定关节与末端位姿创建
    pub fn new(joints: [f64; JOINT_COUNT], pose: EndEffectorPose) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimPhysics {
                joints,
                joint_velocities: [0.0; JOINT_COUNT],
                o_t_ee: pose.to_transform(),
                surface: None,
                wrench_override: None,
                frozen_at: None,
                connected: true,
                fail_after: None,
                reject_joint: None,
                motion_commands: 0,
                log: Vec::new(),
                tactile_paused: false,
                tactile_override: None,
            })),
        }
    }

    /// 分离为传感器端与执行端
    pub fn split(&self, tactile: LatestReader<TactileFrame>) -> (SimSensors, SimActuator) {
        (
            SimSensors {
                inner: self.inner.clone(),
                tactile,
            },
            SimActuator {
                inner: self.inner.clone(),
            },
        )
    }

    /// 设置接触平面
    pub fn set_surface(&self, surface: Option<ContactSurface>) {
        self.inner.lock().surface = surface;
    }

    /// 直接指定外力（覆盖接触平面）
    pub fn set_wrench(&self, wrench: Option<[f64; 6]>) {
        self.inner.lock().wrench_override = wrench;
    }

    /// 第 `n` 条非 Hold 命令（从 1 计）起返回执行器故障
    pub fn fail_after(&self, n: u64, fault: ActuatorFault) {
        self.inner.lock().fail_after = Some((n, fault));
    }

    /// 拒绝所有关节空间命令（归位失败）
    pub fn reject_joint_commands(&self, fault: ActuatorFault) {
        self.inner.lock().reject_joint = Some(fault);
    }

    /// 冻结状态时间戳（模拟状态流过期）
    pub fn freeze_state(&self) {
        self.inner.lock().frozen_at = Some(Instant::now());
    }

    /// 断开 / 恢复连接
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    /// 暂停仿真触觉流（模拟触觉断流）
    pub fn pause_tactile(&self, paused: bool) {
        self.inner.lock().tactile_paused = paused;
    }

    /// 指定触觉读数（覆盖由外力推算的读数）
    pub fn set_tactile(&self, channels: Option<[i32; TACTILE_CHANNELS]>) {
        self.inner.lock().tactile_override = channels;
    }

    pub fn pose(&self) -> EndEffectorPose {
        self.inner.lock().pose()
    }

    pub fn joints(&self) -> [f64; JOINT_COUNT] {
        self.inner.lock().joints
    }

    pub fn wrench(&self) -> [f64; 6] {
        self.inner.lock().wrench()
    }

    /// 已接收命令的副本
    pub fn command_log(&self) -> Vec<MotionCommand> {
        self.inner.lock().log.clone()
    }
}

/// 仿真传感器端
pub struct SimSensors {
    inner: Arc<Mutex<SimPhysics>>,
    tactile: LatestReader<TactileFrame>,
}

impl SensorSource for SimSensors {
    fn robot_state(&mut self) -> Result<RobotState, FeedError> {
        let sim = self.inner.lock();
        if !sim.connected {
            return Err(FeedError::Disconnected);
        }
        Ok(RobotState {
            joint_positions: sim.joints,
            joint_velocities: sim.joint_velocities,
            pose: sim.pose(),
            wrench: sim.wrench(),
            captured_at: sim.frozen_at.unwrap_or_else(Instant::now),
        })
    }

    fn tactile(&self) -> Option<Arc<Snapshot<TactileFrame>>> {
        self.tactile.latest()
    }
}

/// 仿真执行端
pub struct SimActuator {
    inner: Arc<Mutex<SimPhysics>>,
}

impl CommandSink for SimActuator {
    fn send(&mut self, command: &MotionCommand) -> CommandStatus {
        let mut sim = self.inner.lock();
        sim.log.push(*command);

        match *command {
            MotionCommand::Hold => {
                sim.joint_velocities = [0.0; JOINT_COUNT];
                Ok(())
            },
            MotionCommand::Joint {
                positions,
                velocities,
            } => {
                sim.motion_commands += 1;
                if let Some(fault) = sim.reject_joint {
                    return Err(fault);
                }
                check_fail_plan(&sim)?;
                sim.joints = positions;
                sim.joint_velocities = velocities;
                Ok(())
            },
            MotionCommand::Cartesian { position, .. } => {
                sim.motion_commands += 1;
                check_fail_plan(&sim)?;
                sim.o_t_ee[12..15].copy_from_slice(&position);
                Ok(())
            },
        }
    }
}

fn check_fail_plan(sim: &SimPhysics) -> CommandStatus {
    match sim.fail_after {
        Some((n, fault)) if sim.motion_commands >= n => Err(fault),
        _ => Ok(()),
    }
}

/// 仿真触觉流
///
/// 每个周期产生一帧：所有通道 = `baseline + gain × |F|`，
/// 其中 `|F|` 为仿真外力的模（N）。
pub struct SimTactileStream {
    arm: SimulatedArm,
    period: Duration,
    baseline: i32,
    counts_per_newton: f64,
    sequence: u64,
}

impl SimTactileStream {
    pub fn new(arm: SimulatedArm, period: Duration) -> Self {
        Self {
            arm,
            period,
            baseline: 0,
            counts_per_newton: 10.0,
            sequence: 0,
        }
    }

    pub fn with_gain(mut self, baseline: i32, counts_per_newton: f64) -> Self {
        self.baseline = baseline;
        self.counts_per_newton = counts_per_newton;
        self
    }
}

impl TactileStream for SimTactileStream {
    fn receive(&mut self, timeout: Duration) -> Result<TactileFrame, DriverError> {
        std::thread::sleep(self.period.min(timeout));

        let (paused, channels, wrench) = {
            let sim = self.arm.inner.lock();
            (sim.tactile_paused, sim.tactile_override, sim.wrench())
        };
        if paused || timeout < self.period {
            return Err(DriverError::Timeout);
        }

        let channels = channels.unwrap_or_else(|| {
            let force = (wrench[0].powi(2) + wrench[1].powi(2) + wrench[2].powi(2)).sqrt();
            let value = self.baseline + (force * self.counts_per_newton).round() as i32;
            [value; TACTILE_CHANNELS]
        });

        self.sequence += 1;
        Ok(TactileFrame::new(self.sequence, channels))
    }
}
