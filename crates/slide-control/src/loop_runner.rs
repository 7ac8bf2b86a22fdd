//! Loop Runner - 实时控制循环
//!
//! # 核心功能
//!
//! - **绝对时间锚点**: `next_tick += period`，消除累积漂移
//! - **精确定时**: 使用 `spin_sleep` 实现低抖动延时
//! - **超时检测**: 单周期耗时超过周期时计数并重置锚点（不追赶）
//! - **单写者**: 本线程是唯一下发运动命令、写接触状态与会话阶段的线程
//!
//! 每个周期：
//!
//! ```text
//! 读状态 / 触觉快照 → (Idle 时) 取请求 → 取消标志 → controller.tick → 交付结果 → 镜像状态 → 睡眠到锚点
//! ```

use crate::controller::SlideController;
use crate::coordinator::RequestChannel;
use crate::error::StartError;
use slide_driver::{
    CommandSink, ControlMetrics, MirroredState, SensorSource, StateMirror,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 控制循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 控制周期
    pub period: Duration,

    /// 最大迭代次数（None 表示直到运行标志清除）
    ///
    /// 用于测试或定时运行。
    pub max_iterations: Option<u64>,
}

impl LoopConfig {
    pub fn from_rate(rate_hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / rate_hz),
            max_iterations: None,
        }
    }
}

/// 运行控制循环（阻塞）
///
/// 退出条件：`is_running` 被清除，或达到 `max_iterations`。
/// 退出时若仍有会话，立即 Hold 并以 `Aborted` 交付结果。
///
/// # 返回
///
/// 已执行的周期数
pub fn run_control_loop<S, K, R>(
    controller: &mut SlideController,
    sensors: &mut S,
    sink: &mut K,
    requests: &mut R,
    mirror: Option<&StateMirror>,
    config: &LoopConfig,
    is_running: &AtomicBool,
) -> u64
where
    S: SensorSource + ?Sized,
    K: CommandSink + ?Sized,
    R: RequestChannel + ?Sized,
{
    let metrics = controller.status().metrics.clone();
    let period = config.period;
    let mut iteration = 0u64;
    let mut next_tick = Instant::now();

    info!("Control loop started at {:?} period", period);

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire)
            || config.max_iterations.is_some_and(|max| iteration >= max)
        {
            break;
        }

        // 1. 设定下一个锚点（绝对时间）
        next_tick += period;

        // 2. 读取输入
        let now = Instant::now();
        let state = sensors.robot_state();
        let tactile = sensors.tactile();

        // 3. 空闲时接受新请求
        if controller.is_idle()
            && let Some((id, request)) = requests.poll_request()
        {
            let started = match &state {
                Ok(s) => controller.start(id, request, s, now),
                Err(e) => Err(StartError::Feed(*e)),
            };
            if let Err(e) = started {
                warn!("Session {} could not start: {}", id, e);
                requests.deliver(id, Err(e));
            }
        }

        // 4. 推进状态机
        let cancel = controller
            .session_id()
            .is_some_and(|id| requests.cancel_requested(id));
        if let Some(result) = controller.tick(now, state, tactile.as_deref(), cancel, sink) {
            requests.deliver(result.session_id, Ok(result));
        }

        // 5. 对外镜像（非阻塞，满则丢弃）
        if let (Some(mirror), Ok(state)) = (mirror, state) {
            mirror.offer(MirroredState {
                state,
                contact: controller.contact(),
                phase: controller.phase(),
            });
        }

        ControlMetrics::bump(&metrics.ticks);
        iteration += 1;

        // 6. 睡眠到下一个锚点（自动扣除本周期耗时）
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            // 任务超时（Overrun）：重置锚点到当前时间，避免后续累积延迟
            ControlMetrics::bump(&metrics.overruns);
            debug!(
                "Control loop overrun: tick took {:?} (period {:?})",
                now.duration_since(next_tick - period),
                period
            );
            next_tick = now;
        }
    }

    if let Some(result) = controller.shutdown(Instant::now(), sink) {
        requests.deliver(result.session_id, Ok(result));
    }
    info!("Control loop stopped after {} ticks", iteration);
    iteration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlideConfig;
    use crate::controller::{CompletionReason, SharedStatus};
    use crate::coordinator::request_handoff;
    use crate::homing::HomedToken;
    use slide_driver::mock::SimulatedArm;
    use slide_driver::{SessionPhase, latest_cell, state_mirror};
    use slide_protocol::{EndEffectorPose, SlidingRequest, TactileFrame};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_loop_runs_session_and_mirrors_state() {
        let mut config = SlideConfig::default();
        config.control.settle_ms = 5;
        let status = SharedStatus::new();
        let mut controller =
            SlideController::new(&config, HomedToken::for_test(), status.clone()).unwrap();

        let arm = SimulatedArm::new([0.0; 7], EndEffectorPose::identity());
        let (mut writer, reader) = latest_cell::<TactileFrame>();
        let (mut sensors, mut actuator) = arm.split(reader);
        let (coordinator, mut endpoint) = request_handoff(config.limits, status.metrics.clone());
        let (mirror, mirrored) = state_mirror(4096, status.metrics.clone());

        let running = Arc::new(AtomicBool::new(true));
        let feeder_running = running.clone();
        // 触觉源：每毫秒发布一帧
        let feeder = thread::spawn(move || {
            let mut seq = 0;
            while feeder_running.load(Ordering::Acquire) {
                seq += 1;
                writer.publish(TactileFrame::new(seq, [0; 16]));
                thread::sleep(Duration::from_millis(1));
            }
        });

        let pending = coordinator
            .begin(SlidingRequest::new([0.0, 0.0, 0.01], [0.0, 0.0, 0.05], 5.0))
            .unwrap();

        let loop_config = LoopConfig {
            period: Duration::from_millis(1),
            max_iterations: Some(3000),
        };
        let ticks = run_control_loop(
            &mut controller,
            &mut sensors,
            &mut actuator,
            &mut endpoint,
            Some(&mirror),
            &loop_config,
            &running,
        );
        running.store(false, Ordering::Release);
        feeder.join().unwrap();

        assert_eq!(ticks, 3000);
        let result = pending.wait().unwrap();
        assert_eq!(result.reason, CompletionReason::GoalReached);
        assert!((arm.pose().position[2] - 0.01).abs() < 1e-9);

        let phases: Vec<_> = mirrored.try_iter().map(|m| m.phase).collect();
        assert!(phases.contains(&SessionPhase::Sliding));
        assert_eq!(phases.last(), Some(&SessionPhase::Idle));
        assert_eq!(status.metrics.snapshot().ticks, 3000);
    }

    #[test]
    fn test_stop_aborts_active_session() {
        let config = SlideConfig::default();
        let status = SharedStatus::new();
        let mut controller =
            SlideController::new(&config, HomedToken::for_test(), status.clone()).unwrap();

        let arm = SimulatedArm::new([0.0; 7], EndEffectorPose::identity());
        let (mut writer, reader) = latest_cell::<TactileFrame>();
        writer.publish(TactileFrame::new(1, [0; 16]));
        let (mut sensors, mut actuator) = arm.split(reader);
        let (coordinator, mut endpoint) = request_handoff(config.limits, status.metrics.clone());

        let pending = coordinator
            .begin(SlidingRequest::new([0.1, 0.0, 0.0], [0.02, 0.0, 0.0], 5.0))
            .unwrap();

        // 只运行几个周期（远不到触觉过期），然后停止
        let running = AtomicBool::new(true);
        run_control_loop(
            &mut controller,
            &mut sensors,
            &mut actuator,
            &mut endpoint,
            None,
            &LoopConfig {
                period: Duration::from_millis(1),
                max_iterations: Some(5),
            },
            &running,
        );

        let result = pending.wait().unwrap();
        assert_eq!(result.reason, CompletionReason::Aborted);
        assert_eq!(
            arm.command_log().last(),
            Some(&slide_driver::MotionCommand::Hold)
        );
        assert!(controller.is_idle());
    }
}
