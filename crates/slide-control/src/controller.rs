//! 滑动运动控制器
//!
//! 每个控制周期调用一次 [`SlideController::tick`]，状态机：
//!
//! ```text
//!        start()                 接触 / 取消 / 到位 / 故障
//! Idle ─────────▶ Sliding ───────────────────────────────▶ Stopping ──(settle)──▶ Idle
//!                                                             │
//!                                                             └─ 交付 SlidingResult（恰好一次）
//! ```
//!
//! Sliding 周期内的判定顺序：
//! 1. 机械臂状态（不可用 / 过期 → Faulted）
//! 2. 触觉聚合（过期 → Faulted）
//! 3. 接触检测（Touching → ContactStopped，制动）
//! 4. 取消标志（→ Aborted，制动）
//! 5. 采样运动生成器并下发笛卡尔命令（执行器拒绝 → 立即 Hold，Faulted，不重试）
//! 6. 轨迹结束且实测位移进入容差 → GoalReached；超时未收敛 → Faulted
//!
//! # 实时性
//!
//! `tick` 不分配、不加锁、不阻塞；对外可见的状态只通过原子镜像发布。

use crate::config::{ConfigError, ControlSettings, SlideConfig, SlideLimits};
use crate::contact::ContactDetector;
use crate::error::{FaultKind, StaleSource, StartError};
use crate::homing::HomedToken;
use crate::motion::{BrakeProfile, MotionGenerator};
use crate::tactile::TactileAggregator;
use nalgebra::Vector3;
use slide_driver::{
    AtomicContactState, AtomicSessionPhase, CommandSink, ContactState, ControlMetrics, FeedError,
    MotionCommand, SessionPhase, Snapshot,
};
use slide_protocol::{
    EndEffectorPose, ResponseReason, RobotState, SlidingRequest, SlidingResponse, TactileFrame,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    GoalReached,
    ContactStopped,
    Aborted,
    Faulted,
}

impl CompletionReason {
    /// 对外结果码
    pub fn response_reason(self) -> ResponseReason {
        match self {
            CompletionReason::GoalReached => ResponseReason::GoalReached,
            CompletionReason::ContactStopped => ResponseReason::ContactStopped,
            CompletionReason::Aborted => ResponseReason::Aborted,
            CompletionReason::Faulted => ResponseReason::Faulted,
        }
    }
}

/// 会话结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingResult {
    pub session_id: u64,
    /// 实测位移（相对会话开始时的末端位置）
    pub distance_travelled: [f64; 3],
    pub contact_detected: bool,
    pub reason: CompletionReason,
    /// 仅在 `Faulted` 时存在
    pub fault: Option<FaultKind>,
    pub elapsed: Duration,
}

impl SlidingResult {
    pub fn to_response(&self) -> SlidingResponse {
        SlidingResponse {
            accepted: true,
            distance_travelled: self.distance_travelled,
            contact_detected: self.contact_detected,
            reason: self.reason.response_reason(),
        }
    }
}

/// 控制线程与其他线程共享的状态
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    pub contact: Arc<AtomicContactState>,
    pub phase: Arc<AtomicSessionPhase>,
    pub metrics: Arc<ControlMetrics>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Sliding,
    Stopping {
        since: Instant,
        brake: Option<BrakeProfile<3>>,
    },
}

#[derive(Debug)]
struct MotionSession {
    id: u64,
    request: SlidingRequest,
    started_at: Instant,
    start_pose: EndEffectorPose,
    generator: MotionGenerator<3>,
    tolerance: f64,
    stage: Stage,
    reason: CompletionReason,
    fault: Option<FaultKind>,
    contact_detected: bool,
    /// 最近一次成功下发的目标位置 / 速度（绝对坐标）
    commanded_position: [f64; 3],
    commanded_velocity: [f64; 3],
    /// 最近一次实测位移
    travelled: [f64; 3],
    hold_refused: bool,
}

impl MotionSession {
    fn remaining(&self) -> f64 {
        (Vector3::from(self.request.distance) - Vector3::from(self.travelled)).norm()
    }

    /// 故障优先：已有的故障不被覆盖
    fn escalate(&mut self, fault: FaultKind) {
        if self.reason != CompletionReason::Faulted {
            self.reason = CompletionReason::Faulted;
            self.fault = Some(fault);
        }
    }
}

/// 滑动运动控制器（控制线程独占）
pub struct SlideController {
    control: ControlSettings,
    limits: SlideLimits,
    aggregator: TactileAggregator,
    detector: ContactDetector,
    session: Option<MotionSession>,
    status: SharedStatus,
    _homed: HomedToken,
}

impl SlideController {
    /// 创建控制器
    ///
    /// 需要归位令牌：未归位的机械臂不能开始滑动。
    ///
    /// # 错误
    ///
    /// 配置未通过 [`SlideConfig::validate`]
    pub fn new(
        config: &SlideConfig,
        homed: HomedToken,
        status: SharedStatus,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = ContactDetector::new(&config.contact)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        status.phase.set(SessionPhase::Idle);
        status.contact.set(ContactState::NoContact);
        Ok(Self {
            control: config.control.clone(),
            limits: config.limits,
            aggregator: TactileAggregator::new(&config.tactile),
            detector,
            session: None,
            status,
            _homed: homed,
        })
    }

    pub fn status(&self) -> &SharedStatus {
        &self.status
    }

    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// 当前会话 ID
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn phase(&self) -> SessionPhase {
        match self.session.as_ref().map(|s| s.stage) {
            None => SessionPhase::Idle,
            Some(Stage::Sliding) => SessionPhase::Sliding,
            Some(Stage::Stopping { .. }) => SessionPhase::Stopping,
        }
    }

    pub fn contact(&self) -> ContactState {
        self.detector.state()
    }

    /// 开始会话
    ///
    /// # 错误
    ///
    /// - `StartError::Busy`: 已有会话（状态不变）
    /// - `StartError::Validation`: 请求超出硬件限制（状态不变）
    pub fn start(
        &mut self,
        id: u64,
        request: SlidingRequest,
        state: &RobotState,
        now: Instant,
    ) -> Result<(), StartError> {
        if self.session.is_some() {
            return Err(StartError::Busy);
        }
        self.limits.validate_request(&request)?;
        let generator = MotionGenerator::new(
            [0.0; 3],
            request.distance,
            self.limits.axis_limits(&request),
        )
        .map_err(|e| StartError::Validation(e.into()))?;
        self.detector.arm(request.force_threshold)?;

        self.aggregator.reset(now);
        self.status.contact.set(ContactState::NoContact);

        let start_pose = state.pose;
        self.session = Some(MotionSession {
            id,
            request,
            started_at: now,
            start_pose,
            generator,
            tolerance: self.control.tolerance_for(request.distance_norm()),
            stage: Stage::Sliding,
            reason: CompletionReason::GoalReached,
            fault: None,
            contact_detected: false,
            commanded_position: start_pose.position,
            commanded_velocity: [0.0; 3],
            travelled: [0.0; 3],
            hold_refused: false,
        });
        self.status.phase.set(SessionPhase::Sliding);
        ControlMetrics::bump(&self.status.metrics.sessions_started);

        info!(
            "Session {} started: distance {:?} m, speed {:?} m/s, force threshold {} N (nominal {:?})",
            id,
            request.distance,
            request.speed,
            request.force_threshold,
            generator.duration()
        );
        Ok(())
    }

    /// 单周期推进
    ///
    /// # 参数
    ///
    /// - `now`: 本周期时刻
    /// - `state`: 本周期读取的机械臂状态
    /// - `tactile`: 最新触觉快照
    /// - `cancel`: 当前会话是否被请求取消
    /// - `sink`: 命令下发
    ///
    /// # 返回
    ///
    /// 会话在本周期结束时返回结果（每个会话恰好一次），否则 `None`。
    pub fn tick<K: CommandSink + ?Sized>(
        &mut self,
        now: Instant,
        state: Result<RobotState, FeedError>,
        tactile: Option<&Snapshot<TactileFrame>>,
        cancel: bool,
        sink: &mut K,
    ) -> Option<SlidingResult> {
        let mut session = self.session.take()?;

        if let Stage::Sliding = session.stage {
            self.tick_sliding(&mut session, now, state, tactile, cancel, sink);
            if let Stage::Sliding = session.stage {
                self.session = Some(session);
                return None;
            }
            // 同一周期内立即开始制动
        } else {
            self.observe(&mut session, now, state, tactile);
        }

        if self.tick_stopping(&mut session, now, sink) {
            Some(self.finish(session, now))
        } else {
            self.session = Some(session);
            None
        }
    }

    /// 停止控制循环时调用：立即 Hold 并结束会话
    ///
    /// 未终止的会话以 `Aborted` 结束；已终止的保留原因。
    pub fn shutdown<K: CommandSink + ?Sized>(
        &mut self,
        now: Instant,
        sink: &mut K,
    ) -> Option<SlidingResult> {
        let mut session = self.session.take()?;
        if let Stage::Sliding = session.stage {
            session.reason = CompletionReason::Aborted;
        }
        if let Err(fault) = sink.send(&MotionCommand::Hold) {
            error!("Hold refused during shutdown: {}", fault);
            session.escalate(FaultKind::Actuator(fault));
        }
        warn!("Session {} terminated by shutdown", session.id);
        Some(self.finish(session, now))
    }

    fn tick_sliding<K: CommandSink + ?Sized>(
        &mut self,
        session: &mut MotionSession,
        now: Instant,
        state: Result<RobotState, FeedError>,
        tactile: Option<&Snapshot<TactileFrame>>,
        cancel: bool,
        sink: &mut K,
    ) {
        // 1. 机械臂状态
        let state = match state {
            Ok(state) => state,
            Err(e) => return self.fault(session, now, FaultKind::FeedLost(e), sink),
        };
        let age = state.age(now);
        if age > self.control.robot_state_window() {
            let fault = FaultKind::SensorStale {
                sensor: StaleSource::RobotState,
                age: Some(age),
            };
            return self.fault(session, now, fault, sink);
        }
        session.travelled = state.pose.displacement_from(&session.start_pose);

        // 2. 触觉
        let reading = self.aggregator.update(tactile, now);
        if reading.stale {
            let fault = FaultKind::SensorStale {
                sensor: StaleSource::Tactile,
                age: reading.age,
            };
            return self.fault(session, now, fault, sink);
        }

        // 3. 接触
        let contact = self.detector.update(state.force_magnitude(), reading.value);
        self.status.contact.set(contact);
        if contact.is_touching() {
            session.contact_detected = true;
            let (by_force, by_tactile) = self.detector.asserted();
            info!(
                "Session {}: contact detected (force {:.3} N [{}], tactile {:.3} [{}], {:?}), braking",
                session.id,
                state.force_magnitude(),
                by_force,
                reading.value,
                by_tactile,
                self.detector.policy()
            );
            return self.brake(session, now, CompletionReason::ContactStopped);
        }

        // 4. 取消
        if cancel {
            info!("Session {}: cancel requested, braking", session.id);
            return self.brake(session, now, CompletionReason::Aborted);
        }

        // 5. 下发
        let elapsed = now.saturating_duration_since(session.started_at);
        let sample = session.generator.sample(elapsed);
        let target = [
            session.start_pose.position[0] + sample.position[0],
            session.start_pose.position[1] + sample.position[1],
            session.start_pose.position[2] + sample.position[2],
        ];
        let command = MotionCommand::Cartesian {
            position: target,
            velocity: sample.velocity,
        };
        match sink.send(&command) {
            Ok(()) => {
                ControlMetrics::bump(&self.status.metrics.commands_sent);
                session.commanded_position = target;
                session.commanded_velocity = sample.velocity;
            },
            Err(fault) => {
                ControlMetrics::bump(&self.status.metrics.actuator_faults);
                return self.fault(session, now, FaultKind::Actuator(fault), sink);
            },
        }

        // 6. 到位判定
        if sample.finished {
            let remaining = session.remaining();
            if remaining <= session.tolerance {
                info!(
                    "Session {}: goal reached ({:.5} m remaining)",
                    session.id, remaining
                );
                return self.brake(session, now, CompletionReason::GoalReached);
            }
            if elapsed > session.generator.duration() + self.control.convergence_timeout() {
                return self.fault(session, now, FaultKind::GoalNotReached { remaining }, sink);
            }
        }
    }

    /// Stopping 阶段的观测：刷新实测位移与接触镜像，不再做决策
    fn observe(
        &mut self,
        session: &mut MotionSession,
        now: Instant,
        state: Result<RobotState, FeedError>,
        tactile: Option<&Snapshot<TactileFrame>>,
    ) {
        if let Ok(state) = state {
            session.travelled = state.pose.displacement_from(&session.start_pose);
            let reading = self.aggregator.update(tactile, now);
            let contact = self.detector.update(state.force_magnitude(), reading.value);
            self.status.contact.set(contact);
        }
    }

    /// 下发制动 / 保持命令，返回是否可以交付结果
    fn tick_stopping<K: CommandSink + ?Sized>(
        &mut self,
        session: &mut MotionSession,
        now: Instant,
        sink: &mut K,
    ) -> bool {
        let Stage::Stopping { since, brake } = session.stage else {
            return false;
        };
        let stopped_for = now.saturating_duration_since(since);

        let (command, brake_done) = match brake {
            Some(profile) => {
                let sample = profile.sample(stopped_for);
                let command = MotionCommand::Cartesian {
                    position: sample.position,
                    velocity: sample.velocity,
                };
                (command, sample.finished)
            },
            None => (MotionCommand::Hold, true),
        };

        // Hold 已被拒绝过则不再重复下发
        let status = if command.is_hold() && session.hold_refused {
            Ok(())
        } else {
            sink.send(&command)
        };

        if let Err(fault) = status {
            ControlMetrics::bump(&self.status.metrics.actuator_faults);
            if command.is_hold() {
                error!("Session {}: hold refused: {}", session.id, fault);
                session.hold_refused = true;
            } else {
                error!("Session {}: brake command refused: {}, holding", session.id, fault);
                if let Err(hold_fault) = sink.send(&MotionCommand::Hold) {
                    error!("Session {}: hold refused: {}", session.id, hold_fault);
                    session.hold_refused = true;
                }
            }
            session.escalate(FaultKind::Actuator(fault));
            session.stage = Stage::Stopping { since, brake: None };
            return stopped_for >= self.control.settle();
        } else if !command.is_hold() {
            ControlMetrics::bump(&self.status.metrics.commands_sent);
        }

        if brake_done && brake.is_some() {
            session.stage = Stage::Stopping { since, brake: None };
        }
        brake_done && stopped_for >= self.control.settle()
    }

    /// 进入制动
    fn brake(&mut self, session: &mut MotionSession, now: Instant, reason: CompletionReason) {
        session.reason = reason;
        let profile = BrakeProfile::new(
            session.commanded_position,
            session.commanded_velocity,
            self.control.brake_deceleration,
        );
        debug!(
            "Session {}: braking over {:?} to {:?}",
            session.id,
            profile.duration(),
            profile.stop_position()
        );
        session.stage = Stage::Stopping {
            since: now,
            brake: Some(profile),
        };
        self.status.phase.set(SessionPhase::Stopping);
    }

    /// 进入故障：立即 Hold，不重试出错的命令
    fn fault<K: CommandSink + ?Sized>(
        &mut self,
        session: &mut MotionSession,
        now: Instant,
        fault: FaultKind,
        sink: &mut K,
    ) {
        error!("Session {} faulted: {}", session.id, fault);
        session.escalate(fault);
        if let Err(hold_fault) = sink.send(&MotionCommand::Hold) {
            ControlMetrics::bump(&self.status.metrics.actuator_faults);
            error!("Session {}: hold refused: {}", session.id, hold_fault);
            session.hold_refused = true;
        }
        session.stage = Stage::Stopping {
            since: now,
            brake: None,
        };
        self.status.phase.set(SessionPhase::Stopping);
    }

    fn finish(&mut self, session: MotionSession, now: Instant) -> SlidingResult {
        let result = SlidingResult {
            session_id: session.id,
            distance_travelled: session.travelled,
            contact_detected: session.contact_detected,
            reason: session.reason,
            fault: session.fault,
            elapsed: now.saturating_duration_since(session.started_at),
        };

        self.detector.reset();
        self.status.contact.set(ContactState::NoContact);
        self.status.phase.set(SessionPhase::Idle);
        ControlMetrics::bump(&self.status.metrics.sessions_finished);

        info!(
            "Session {} finished: {:?}, travelled {:?} m in {:?}",
            result.session_id, result.reason, result.distance_travelled, result.elapsed
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use approx::assert_relative_eq;
    use slide_driver::{ActuatorFault, ActuatorFaultKind, CommandStatus};

    /// 记录命令的理想执行器：笛卡尔目标立即成为实际位置
    #[derive(Default)]
    struct Tracker {
        position: [f64; 3],
        log: Vec<MotionCommand>,
        refuse_after: Option<usize>,
    }

    impl CommandSink for Tracker {
        fn send(&mut self, command: &MotionCommand) -> CommandStatus {
            self.log.push(*command);
            if let MotionCommand::Cartesian { position, .. } = *command {
                let motions = self.log.iter().filter(|c| !c.is_hold()).count();
                if self.refuse_after.is_some_and(|n| motions > n) {
                    return Err(ActuatorFault::new(ActuatorFaultKind::Refused, 7));
                }
                self.position = position;
            }
            Ok(())
        }
    }

    struct Bench {
        controller: SlideController,
        sink: Tracker,
        now: Instant,
        force: f64,
        tactile: [i32; 16],
        version: u64,
        period: Duration,
    }

    impl Bench {
        fn new() -> Self {
            let mut config = SlideConfig::default();
            config.control.settle_ms = 20;
            Self::with_config(config)
        }

        fn with_config(config: SlideConfig) -> Self {
            Self {
                period: config.control.period(),
                controller: SlideController::new(&config, HomedToken::for_test(), SharedStatus::new())
                    .unwrap(),
                sink: Tracker::default(),
                now: Instant::now(),
                force: 0.0,
                tactile: [0; 16],
                version: 0,
            }
        }

        fn state(&self) -> RobotState {
            let mut pose = EndEffectorPose::identity();
            pose.position = self.sink.position;
            let mut state = RobotState::at_rest([0.0; 7], pose, self.now);
            state.wrench[2] = self.force;
            state
        }

        fn start(&mut self, request: SlidingRequest) -> Result<(), StartError> {
            let state = self.state();
            self.controller.start(1, request, &state, self.now)
        }

        /// 推进一个周期（触觉每周期都有新帧）
        fn step(&mut self, cancel: bool) -> Option<SlidingResult> {
            self.now += self.period;
            self.version += 1;
            let snap = Snapshot {
                version: self.version,
                received_at: self.now,
                value: TactileFrame::new(self.version, self.tactile),
            };
            let state = self.state();
            self.controller
                .tick(self.now, Ok(state), Some(&snap), cancel, &mut self.sink)
        }

        fn run(&mut self, max_ticks: usize) -> SlidingResult {
            for _ in 0..max_ticks {
                if let Some(result) = self.step(false) {
                    return result;
                }
            }
            panic!("session did not finish within {max_ticks} ticks");
        }
    }

    fn request() -> SlidingRequest {
        SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0)
    }

    #[test]
    fn test_goal_reached() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        assert_eq!(bench.controller.phase(), SessionPhase::Sliding);

        let result = bench.run(10_000);
        assert_eq!(result.reason, CompletionReason::GoalReached);
        assert!(!result.contact_detected);
        assert_eq!(result.fault, None);
        assert_relative_eq!(result.distance_travelled[0], 0.1, epsilon = 1e-9);
        assert_eq!(result.distance_travelled[1], 0.0);
        assert!(bench.controller.is_idle());
        assert_eq!(bench.controller.status().phase.get(), SessionPhase::Idle);

        let response = result.to_response();
        assert!(response.accepted);
        assert_eq!(response.reason, ResponseReason::GoalReached);

        // 结束后只下发 Hold
        assert_eq!(bench.sink.log.last(), Some(&MotionCommand::Hold));
        // 结果只交付一次
        assert!(bench.step(false).is_none());
    }

    #[test]
    fn test_contact_stops_within_bounded_ticks() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        for _ in 0..500 {
            assert!(bench.step(false).is_none());
        }
        let at_contact = bench.sink.position[0];
        bench.force = 6.0;
        assert!(bench.step(false).is_none());
        assert_eq!(bench.controller.phase(), SessionPhase::Stopping);
        assert_eq!(bench.controller.status().contact.get(), ContactState::Touching);

        let result = bench.run(1000);
        assert_eq!(result.reason, CompletionReason::ContactStopped);
        assert!(result.contact_detected);
        // 制动距离 v²/2a = 0.4mm
        assert!(result.distance_travelled[0] - at_contact < 0.0005);
        assert!(result.distance_travelled[0] < 0.1);
        assert_eq!(bench.controller.status().contact.get(), ContactState::NoContact);
    }

    #[test]
    fn test_tactile_alone_stops_slide() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        for _ in 0..300 {
            assert!(bench.step(false).is_none());
        }
        // 外力保持为零，只有触觉越过 ON
        bench.tactile = [60; 16];
        assert!(bench.step(false).is_none());
        assert_eq!(bench.controller.phase(), SessionPhase::Stopping);
        assert_eq!(bench.controller.contact(), ContactState::Touching);
        assert_eq!(bench.controller.detector.asserted(), (false, true));

        let result = bench.run(1000);
        assert_eq!(result.reason, CompletionReason::ContactStopped);
        assert!(result.contact_detected);
        assert!(result.fault.is_none());
        assert!(result.distance_travelled[0] < 0.1);
    }

    #[test]
    fn test_cancel_aborts() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        for _ in 0..100 {
            bench.step(false);
        }
        assert!(bench.step(true).is_none());
        let result = bench.run(1000);
        assert_eq!(result.reason, CompletionReason::Aborted);
        assert!(!result.contact_detected);
    }

    #[test]
    fn test_actuator_fault_holds_immediately_without_retry() {
        let mut bench = Bench::new();
        bench.sink.refuse_after = Some(10);
        bench.start(request()).unwrap();

        let result = bench.run(1000);
        assert_eq!(result.reason, CompletionReason::Faulted);
        assert!(matches!(result.fault, Some(FaultKind::Actuator(_))));

        // 第 11 条运动命令被拒绝后紧跟 Hold，此后只有 Hold
        let first_refused = bench
            .sink
            .log
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_hold())
            .nth(10)
            .map(|(i, _)| i)
            .unwrap();
        assert!(bench.sink.log[first_refused + 1..].iter().all(|c| c.is_hold()));
        assert_eq!(bench.controller.status().metrics.snapshot().actuator_faults, 1);
    }

    #[test]
    fn test_stale_tactile_faults() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        bench.step(false);

        // 停止发布触觉帧，保持旧快照
        let stale = Snapshot {
            version: bench.version,
            received_at: bench.now,
            value: TactileFrame::new(0, [0; 16]),
        };
        let mut result = None;
        for _ in 0..200 {
            bench.now += bench.period;
            let state = bench.state();
            if let Some(r) = bench.controller.tick(
                bench.now,
                Ok(state),
                Some(&stale),
                false,
                &mut bench.sink,
            ) {
                result = Some(r);
                break;
            }
        }
        let result = result.unwrap();
        assert_eq!(result.reason, CompletionReason::Faulted);
        assert!(matches!(
            result.fault,
            Some(FaultKind::SensorStale {
                sensor: StaleSource::Tactile,
                ..
            })
        ));
    }

    #[test]
    fn test_no_tactile_ever_faults_after_window() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        let mut ticks = 0;
        let result = loop {
            ticks += 1;
            bench.now += bench.period;
            let state = bench.state();
            if let Some(r) = bench
                .controller
                .tick(bench.now, Ok(state), None, false, &mut bench.sink)
            {
                break r;
            }
        };
        assert_eq!(result.reason, CompletionReason::Faulted);
        // 50ms 窗口 + 20ms settle
        assert!((60..=80).contains(&ticks), "ticks = {ticks}");
    }

    #[test]
    fn test_stale_robot_state_faults() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        bench.step(false);

        let mut old = bench.state();
        old.captured_at = bench.now;
        bench.now += Duration::from_millis(30);
        let snap = Snapshot {
            version: 99,
            received_at: bench.now,
            value: TactileFrame::new(99, [0; 16]),
        };
        bench
            .controller
            .tick(bench.now, Ok(old), Some(&snap), false, &mut bench.sink);
        assert_eq!(bench.sink.log.last(), Some(&MotionCommand::Hold));

        let result = bench.run(100);
        assert!(matches!(
            result.fault,
            Some(FaultKind::SensorStale {
                sensor: StaleSource::RobotState,
                ..
            })
        ));
    }

    #[test]
    fn test_feed_loss_faults() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        bench.now += bench.period;
        bench.controller.tick(
            bench.now,
            Err(FeedError::Disconnected),
            None,
            false,
            &mut bench.sink,
        );
        let result = bench.run(100);
        assert_eq!(result.fault, Some(FaultKind::FeedLost(FeedError::Disconnected)));
    }

    #[test]
    fn test_goal_not_reached_when_arm_does_not_track() {
        let mut config = SlideConfig::default();
        config.control.settle_ms = 10;
        config.control.convergence_timeout_ms = 20;
        let mut bench = Bench::with_config(config);
        bench.start(SlidingRequest::new([0.01, 0.0, 0.0], [0.1, 0.0, 0.0], 5.0)).unwrap();

        let mut result = None;
        for _ in 0..2000 {
            // 实际位置始终停在起点
            bench.sink.position = [0.0; 3];
            if let Some(r) = bench.step(false) {
                result = Some(r);
                break;
            }
        }
        let result = result.unwrap();
        assert_eq!(result.reason, CompletionReason::Faulted);
        assert!(matches!(result.fault, Some(FaultKind::GoalNotReached { remaining }) if remaining > 0.009));
    }

    #[test]
    fn test_start_rejections_leave_state_unchanged() {
        let mut bench = Bench::new();
        let bad = SlidingRequest::new([0.1, 0.0, 0.0], [0.0, 0.0, 0.0], 5.0);
        assert_eq!(
            bench.start(bad),
            Err(StartError::Validation(ValidationError::MissingSpeed { axis: 0 }))
        );
        assert!(bench.controller.is_idle());

        bench.start(request()).unwrap();
        assert_eq!(bench.start(request()), Err(StartError::Busy));
        assert_eq!(bench.controller.session_id(), Some(1));
    }

    #[test]
    fn test_zero_force_threshold_rejected() {
        let mut config = SlideConfig::default();
        config.control.settle_ms = 20;
        let mut bench = Bench::with_config(config);
        let zero = SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 0.0);
        assert!(matches!(
            bench.start(zero),
            Err(StartError::Validation(ValidationError::ForceOutOfRange { .. }))
        ));
        assert!(bench.controller.is_idle());
        assert!(bench.step(false).is_none());
        assert!(bench.sink.log.is_empty());
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = SlideConfig::default();
        config.limits.min_force = 0.0;
        let status = SharedStatus::new();
        assert!(SlideController::new(&config, HomedToken::for_test(), status).is_err());

        let mut config = SlideConfig::default();
        config.contact.tactile_off = config.contact.tactile_on;
        let status = SharedStatus::new();
        assert!(SlideController::new(&config, HomedToken::for_test(), status).is_err());
    }

    #[test]
    fn test_shutdown_aborts_active_session() {
        let mut bench = Bench::new();
        bench.start(request()).unwrap();
        bench.step(false);
        let result = bench.controller.shutdown(bench.now, &mut bench.sink).unwrap();
        assert_eq!(result.reason, CompletionReason::Aborted);
        assert_eq!(bench.sink.log.last(), Some(&MotionCommand::Hold));
        assert!(bench.controller.shutdown(bench.now, &mut bench.sink).is_none());
    }

    #[test]
    fn test_idle_tick_sends_nothing() {
        let mut bench = Bench::new();
        assert!(bench.step(false).is_none());
        assert!(bench.sink.log.is_empty());
    }
}
