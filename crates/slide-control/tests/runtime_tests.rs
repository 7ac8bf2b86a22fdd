//! 运行时集成测试（仿真机械臂）
//!
//! 完整线程装配：触觉接收线程 + 归位 + 控制线程 + 状态发布线程。

use approx::assert_relative_eq;
use crossbeam_channel::{Receiver, Sender};
use slide_control::{
    CompletionReason, ControlError, FaultKind, HOME_JOINTS, HomingError, RequestError,
    RequestCoordinator, SlideConfig, SlideRuntime, SlideRuntimeBuilder, StaleSource,
};
use slide_driver::mock::{ContactSurface, SimTactileStream, SimulatedArm};
use slide_driver::{
    ActuatorFault, ActuatorFaultKind, DriverError, MirroredState, MotionCommand, SessionPhase,
    StatePublisher, latest_cell,
};
use slide_protocol::{EndEffectorPose, ResponseReason, SlidingRequest};
use std::thread;
use std::time::{Duration, Instant};

struct ChannelPublisher(Sender<MirroredState>);

impl StatePublisher for ChannelPublisher {
    fn publish(&mut self, state: &MirroredState) -> Result<(), DriverError> {
        self.0.send(*state).map_err(|_| DriverError::ChannelClosed)
    }
}

fn fast_config() -> SlideConfig {
    let mut config = SlideConfig::default();
    config.control.settle_ms = 20;
    config
}

fn start_sim(config: SlideConfig) -> (SimulatedArm, SlideRuntime, RequestCoordinator) {
    let arm = SimulatedArm::new(HOME_JOINTS, EndEffectorPose::identity());
    let (writer, reader) = latest_cell();
    let (sensors, actuator) = arm.split(reader);
    let stream = SimTactileStream::new(arm.clone(), Duration::from_millis(1));

    let (runtime, coordinator) = SlideRuntimeBuilder::new(config, sensors, actuator)
        .tactile_stream(stream, writer)
        .start()
        .expect("runtime should start with an arm already at home");
    (arm, runtime, coordinator)
}

fn wait_for_phase(runtime: &SlideRuntime, phase: SessionPhase, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if runtime.phase() == phase {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn motion_commands(arm: &SimulatedArm) -> usize {
    arm.command_log().iter().filter(|c| !c.is_hold()).count()
}

#[test]
fn test_free_slide_reaches_goal() {
    let (arm, runtime, coordinator) = start_sim(fast_config());

    let response = coordinator.handle(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0));

    assert!(response.accepted);
    assert_eq!(response.reason, ResponseReason::GoalReached);
    assert!(!response.contact_detected);
    assert_relative_eq!(response.distance_travelled[0], 0.1, epsilon = 1e-6);
    assert_relative_eq!(response.distance_travelled[1], 0.0, epsilon = 1e-9);
    assert_relative_eq!(response.distance_travelled[2], 0.0, epsilon = 1e-9);
    assert_relative_eq!(arm.pose().position[0], 0.1, epsilon = 1e-6);

    assert!(wait_for_phase(&runtime, SessionPhase::Idle, Duration::from_secs(1)));
    let metrics = runtime.metrics();
    assert_eq!(metrics.sessions_started, 1);
    assert_eq!(metrics.sessions_finished, 1);
    runtime.shutdown().unwrap();
}

#[test]
fn test_contact_stops_slide() {
    let (arm, runtime, coordinator) = start_sim(fast_config());
    // 2000 N/m：穿透 2.5 mm 时外力达到 5 N
    arm.set_surface(Some(ContactSurface::ahead(0, 0.01, 2000.0)));

    let result = coordinator
        .submit(SlidingRequest::new([0.05, 0.0, 0.0], [0.05, 0.0, 0.0], 5.0))
        .unwrap();

    assert_eq!(result.reason, CompletionReason::ContactStopped);
    assert!(result.contact_detected);
    assert!(result.fault.is_none());
    // 接触点之后最多再走一段制动距离（v² / 2a = 2.5 mm）
    assert!(result.distance_travelled[0] > 0.01);
    assert!(result.distance_travelled[0] < 0.02);
    assert_eq!(result.to_response().reason, ResponseReason::ContactStopped);

    runtime.shutdown().unwrap();
}

#[test]
fn test_tactile_contact_stops_slide() {
    let (arm, runtime, coordinator) = start_sim(fast_config());

    let pending = coordinator
        .begin(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0))
        .unwrap();
    assert!(wait_for_phase(&runtime, SessionPhase::Sliding, Duration::from_secs(1)));
    thread::sleep(Duration::from_millis(50));

    // 无接触面、外力为零：只有触觉读数越过 ON
    arm.set_tactile(Some([60; 16]));
    let result = pending.wait().unwrap();

    assert_eq!(result.reason, CompletionReason::ContactStopped);
    assert!(result.contact_detected);
    assert!(result.fault.is_none());
    assert_relative_eq!(arm.wrench()[2], 0.0);
    assert!(result.distance_travelled[0] > 0.0);
    assert!(result.distance_travelled[0] < 0.1);

    runtime.shutdown().unwrap();
}

#[test]
fn test_second_request_rejected_while_sliding() {
    let (_arm, runtime, coordinator) = start_sim(fast_config());

    let first = coordinator
        .begin(SlidingRequest::new([0.1, 0.0, 0.0], [0.01, 0.0, 0.0], 5.0))
        .unwrap();
    assert!(wait_for_phase(&runtime, SessionPhase::Sliding, Duration::from_secs(1)));

    let second = coordinator.begin(SlidingRequest::new([0.0, 0.05, 0.0], [0.0, 0.01, 0.0], 5.0));
    assert!(matches!(second, Err(RequestError::ConcurrencyReject)));

    let response =
        coordinator.handle(SlidingRequest::new([0.0, 0.05, 0.0], [0.0, 0.01, 0.0], 5.0));
    assert!(!response.accepted);
    assert_eq!(response.reason, ResponseReason::Rejected);

    // 第一个会话不受影响
    assert_eq!(runtime.phase(), SessionPhase::Sliding);
    first.cancel();
    let result = first.wait().unwrap();
    assert_eq!(result.reason, CompletionReason::Aborted);
    assert!(runtime.metrics().requests_rejected >= 2);

    runtime.shutdown().unwrap();
}

#[test]
fn test_invalid_request_never_moves_arm() {
    let (arm, runtime, coordinator) = start_sim(fast_config());
    let before = arm.command_log().len();

    let response = coordinator.handle(SlidingRequest::new([1.0, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0));
    assert!(!response.accepted);
    assert_eq!(response.reason, ResponseReason::Rejected);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(arm.command_log().len(), before);
    assert_eq!(runtime.phase(), SessionPhase::Idle);
    runtime.shutdown().unwrap();
}

#[test]
fn test_cancel_aborts_and_returns_to_idle() {
    let (arm, runtime, coordinator) = start_sim(fast_config());

    let pending = coordinator
        .begin(SlidingRequest::new([0.0, 0.1, 0.0], [0.0, 0.02, 0.0], 5.0))
        .unwrap();
    assert!(wait_for_phase(&runtime, SessionPhase::Sliding, Duration::from_secs(1)));
    thread::sleep(Duration::from_millis(100));

    assert!(coordinator.cancel());
    let result = pending.wait().unwrap();
    assert_eq!(result.reason, CompletionReason::Aborted);
    assert!(result.distance_travelled[1] > 0.0);
    assert!(result.distance_travelled[1] < 0.1);

    assert!(wait_for_phase(&runtime, SessionPhase::Idle, Duration::from_secs(1)));
    assert!(!coordinator.is_busy());
    assert_eq!(arm.command_log().last(), Some(&MotionCommand::Hold));

    // 取消后可以立即开始新会话
    let result = coordinator
        .submit(SlidingRequest::new([0.0, 0.0, 0.005], [0.0, 0.0, 0.05], 5.0))
        .unwrap();
    assert_eq!(result.reason, CompletionReason::GoalReached);
    runtime.shutdown().unwrap();
}

#[test]
fn test_tactile_dropout_faults_session() {
    let (arm, runtime, coordinator) = start_sim(fast_config());

    let pending = coordinator
        .begin(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0))
        .unwrap();
    assert!(wait_for_phase(&runtime, SessionPhase::Sliding, Duration::from_secs(1)));
    arm.pause_tactile(true);

    let result = pending.wait().unwrap();
    assert_eq!(result.reason, CompletionReason::Faulted);
    assert!(matches!(
        result.fault,
        Some(FaultKind::SensorStale {
            sensor: StaleSource::Tactile,
            ..
        })
    ));
    assert_eq!(result.to_response().reason, ResponseReason::Faulted);
    runtime.shutdown().unwrap();
}

#[test]
fn test_actuator_fault_is_not_retried() {
    let (arm, runtime, coordinator) = start_sim(fast_config());
    let fault = ActuatorFault::new(ActuatorFaultKind::SafetyLimit, 17);
    let fail_at = motion_commands(&arm) + 50;
    arm.fail_after(fail_at as u64, fault);

    let result = coordinator
        .submit(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0))
        .unwrap();

    assert_eq!(result.reason, CompletionReason::Faulted);
    assert_eq!(result.fault, Some(FaultKind::Actuator(fault)));

    // 被拒绝的那条命令之后只有 Hold
    let log = arm.command_log();
    let mut seen = 0;
    let refused_at = log
        .iter()
        .position(|c| {
            if !c.is_hold() {
                seen += 1;
            }
            seen == fail_at
        })
        .unwrap();
    assert!(log[refused_at + 1..].iter().all(MotionCommand::is_hold));
    assert!(runtime.metrics().actuator_faults >= 1);
    runtime.shutdown().unwrap();
}

#[test]
fn test_shutdown_aborts_in_flight_session() {
    let (arm, runtime, coordinator) = start_sim(fast_config());

    let pending = coordinator
        .begin(SlidingRequest::new([0.1, 0.0, 0.0], [0.01, 0.0, 0.0], 5.0))
        .unwrap();
    assert!(wait_for_phase(&runtime, SessionPhase::Sliding, Duration::from_secs(1)));

    runtime.shutdown().unwrap();
    let result = pending.wait().unwrap();
    assert_eq!(result.reason, CompletionReason::Aborted);
    assert_eq!(arm.command_log().last(), Some(&MotionCommand::Hold));

    // 控制线程退出后新请求无法受理
    let err = coordinator
        .submit(SlidingRequest::new([0.01, 0.0, 0.0], [0.01, 0.0, 0.0], 5.0))
        .unwrap_err();
    assert_eq!(err, RequestError::ControllerStopped);
}

#[test]
fn test_state_is_mirrored_to_publisher() {
    let arm = SimulatedArm::new(HOME_JOINTS, EndEffectorPose::identity());
    let (writer, reader) = latest_cell();
    let (sensors, actuator) = arm.split(reader);
    let stream = SimTactileStream::new(arm.clone(), Duration::from_millis(1));
    let (tx, rx): (Sender<MirroredState>, Receiver<MirroredState>) = crossbeam_channel::unbounded();

    let (runtime, coordinator) = SlideRuntimeBuilder::new(fast_config(), sensors, actuator)
        .tactile_stream(stream, writer)
        .state_publisher(ChannelPublisher(tx))
        .start()
        .unwrap();

    let result = coordinator
        .submit(SlidingRequest::new([0.0, 0.0, 0.01], [0.0, 0.0, 0.05], 5.0))
        .unwrap();
    assert_eq!(result.reason, CompletionReason::GoalReached);
    assert!(wait_for_phase(&runtime, SessionPhase::Idle, Duration::from_secs(1)));
    thread::sleep(Duration::from_millis(50));
    runtime.shutdown().unwrap();

    let mirrored: Vec<_> = rx.try_iter().collect();
    assert!(!mirrored.is_empty());
    assert!(mirrored.iter().any(|m| m.phase == SessionPhase::Sliding));
    assert!(mirrored.iter().any(|m| m.phase == SessionPhase::Stopping));
    assert_eq!(mirrored.last().map(|m| m.phase), Some(SessionPhase::Idle));
}

#[test]
fn test_homing_failure_prevents_start() {
    let arm = SimulatedArm::new([0.0; 7], EndEffectorPose::identity());
    arm.reject_joint_commands(ActuatorFault::new(ActuatorFaultKind::Refused, 3));
    let (writer, reader) = latest_cell();
    let (sensors, actuator) = arm.split(reader);
    let stream = SimTactileStream::new(arm.clone(), Duration::from_millis(1));

    let result = SlideRuntimeBuilder::new(fast_config(), sensors, actuator)
        .tactile_stream(stream, writer)
        .start();

    assert!(matches!(
        result,
        Err(ControlError::Homing(HomingError::Actuator(_)))
    ));
    assert_eq!(arm.command_log().last(), Some(&MotionCommand::Hold));
    assert!(
        arm.command_log()
            .iter()
            .all(|c| !matches!(c, MotionCommand::Cartesian { .. }))
    );
}

#[test]
fn test_invalid_config_is_rejected_before_homing() {
    let arm = SimulatedArm::new(HOME_JOINTS, EndEffectorPose::identity());
    let (_writer, reader) = latest_cell();
    let (sensors, actuator) = arm.split(reader);

    let mut config = SlideConfig::default();
    config.control.rate_hz = 0.0;
    let result = SlideRuntimeBuilder::new(config, sensors, actuator).start();

    assert!(matches!(result, Err(ControlError::Config(_))));
    assert!(arm.command_log().is_empty());
}

#[test]
fn test_runtime_from_toml_config() {
    let config = SlideConfig::from_toml_str(
        r#"
        [control]
        rate_hz = 500.0
        settle_ms = 10

        [limits]
        max_speed = 0.05

        [contact]
        fusion = "force_only"
        "#,
    )
    .unwrap();
    let (_arm, runtime, coordinator) = start_sim(config);

    let too_fast = coordinator.begin(SlidingRequest::new([0.02, 0.0, 0.0], [0.08, 0.0, 0.0], 5.0));
    assert!(matches!(too_fast, Err(RequestError::Validation(_))));

    let result = coordinator
        .submit(SlidingRequest::new([0.02, 0.0, 0.0], [0.04, 0.0, 0.0], 5.0))
        .unwrap();
    assert_eq!(result.reason, CompletionReason::GoalReached);
    runtime.shutdown().unwrap();
}
