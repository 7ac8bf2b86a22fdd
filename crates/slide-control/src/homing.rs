//! 启动归位
//!
//! 接受请求之前，机械臂必须以降低的速度系数运动到固定参考关节位形。
//! 归位失败是致命错误：初始化中止，控制器不会被创建。
//!
//! 成功归位产生 [`HomedToken`]，它是构造 [`SlideController`](crate::SlideController)
//! 的唯一凭证（Zero-token 类型模式），从类型上保证"先归位、后滑动"。

use crate::config::HomingSettings;
use crate::error::HomingError;
use crate::motion::MotionGenerator;
use slide_driver::{CommandSink, MotionCommand, SensorSource};
use slide_protocol::JOINT_COUNT;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 归位完成令牌
///
/// 只能由 [`home`] 成功返回（测试中另有构造方式），不可 Clone。
#[derive(Debug)]
pub struct HomedToken {
    _private: (),
}

impl HomedToken {
    /// 仅测试可用
    #[cfg(test)]
    pub(crate) fn for_test() -> Self {
        Self { _private: () }
    }
}

/// 执行归位
///
/// 在调用线程上以 `period` 为周期下发关节空间轨迹，轨迹结束后等待实测收敛。
///
/// # 参数
///
/// - `sensors`: 机械臂状态来源
/// - `sink`: 命令下发
/// - `settings`: 参考位形、速度系数、关节限制、容差与超时
/// - `period`: 下发周期
///
/// # 错误
///
/// - `HomingError::Actuator`: 命令被拒绝（已下发 Hold）
/// - `HomingError::Feed`: 状态不可用
/// - `HomingError::Timeout`: 轨迹结束后 `timeout` 内未收敛
pub fn home<S, K>(
    sensors: &mut S,
    sink: &mut K,
    settings: &HomingSettings,
    period: Duration,
) -> Result<HomedToken, HomingError>
where
    S: SensorSource + ?Sized,
    K: CommandSink + ?Sized,
{
    let initial = sensors.robot_state().map_err(HomingError::Feed)?;
    let generator = MotionGenerator::with_speed_factor(
        initial.joint_positions,
        settings.reference_joints,
        settings.joint_limits(),
        settings.speed_factor,
    )?;
    let deadline = generator.duration() + settings.timeout();

    info!(
        "Homing to reference configuration (speed factor {}, nominal {:?})",
        settings.speed_factor,
        generator.duration()
    );

    let start = Instant::now();
    let mut next_tick = start;

    loop {
        let elapsed = start.elapsed();
        let sample = generator.sample(elapsed);

        let command = MotionCommand::Joint {
            positions: sample.position,
            velocities: sample.velocity,
        };
        if let Err(fault) = sink.send(&command) {
            error!("Homing command refused: {}", fault);
            hold(sink);
            return Err(HomingError::Actuator(fault));
        }

        if sample.finished {
            let state = match sensors.robot_state() {
                Ok(state) => state,
                Err(e) => {
                    hold(sink);
                    return Err(HomingError::Feed(e));
                },
            };
            let error = max_joint_error(&state.joint_positions, &settings.reference_joints);

            if error <= settings.tolerance {
                hold(sink);
                info!("Homing complete in {:?} (max joint error {:.5} rad)", elapsed, error);
                return Ok(HomedToken { _private: () });
            }
            if elapsed >= deadline {
                hold(sink);
                error!("Homing timed out, max joint error {:.5} rad", error);
                return Err(HomingError::Timeout { elapsed, error });
            }
            debug!("Waiting for joints to settle (error {:.5} rad)", error);
        }

        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            // 落后：重置锚点，不追赶
            next_tick = now;
        }
    }
}

fn hold<K: CommandSink + ?Sized>(sink: &mut K) {
    if let Err(fault) = sink.send(&MotionCommand::Hold) {
        warn!("Hold command refused after homing stop: {}", fault);
    }
}

fn max_joint_error(actual: &[f64; JOINT_COUNT], target: &[f64; JOINT_COUNT]) -> f64 {
    actual
        .iter()
        .zip(target.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}
