//! Pipeline 循环模块
//!
//! 两个非实时后台循环：
//! - `tactile_loop`: 接收外部触觉流，发布到最新值单元
//! - `publish_loop`: 把控制线程镜像出来的机械臂状态交给外部发布者
//!
//! 控制线程与发布线程之间使用预分配的有界队列（`try_send`，满则丢弃并计数），
//! 控制线程永远不会因发布端变慢而阻塞。

use crate::cell::LatestWriter;
use crate::error::DriverError;
use crate::metrics::ControlMetrics;
use crate::status::{ContactState, SessionPhase};
use crate::traits::{StatePublisher, TactileStream};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use slide_protocol::{RobotState, TactileFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use slide_driver::PipelineConfig;
///
/// // 默认：5ms 接收超时，镜像队列深度 64
/// let config = PipelineConfig::default();
/// assert_eq!(config.receive_timeout_ms, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 触觉接收超时（毫秒）
    ///
    /// 超时后检查运行标志，不代表故障。
    pub receive_timeout_ms: u64,
    /// 状态镜像队列深度
    pub mirror_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 5,
            mirror_depth: 64,
        }
    }
}

/// 对外镜像的状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirroredState {
    pub state: RobotState,
    pub contact: ContactState,
    pub phase: SessionPhase,
}

/// 触觉接收循环
///
/// # 参数
/// - `stream`: 外部触觉流
/// - `writer`: 最新值单元写者（唯一）
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 运行指标
pub fn tactile_loop(
    mut stream: impl TactileStream,
    mut writer: LatestWriter<TactileFrame>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<ControlMetrics>,
) {
    let timeout = Duration::from_millis(config.receive_timeout_ms);

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("Tactile thread: is_running flag is false, exiting");
            break;
        }

        match stream.receive(timeout) {
            Ok(frame) => {
                ControlMetrics::bump(&metrics.tactile_frames);
                let version = writer.publish(frame);
                trace!("Tactile frame seq={} published as v{}", frame.sequence, version);
            },
            Err(DriverError::Timeout) => {
                // 断流是允许的，过期判断由控制线程负责
                ControlMetrics::bump(&metrics.tactile_timeouts);
            },
            Err(DriverError::StreamClosed) | Err(DriverError::ChannelClosed) => {
                warn!("Tactile stream closed, ingestion thread exiting");
                break;
            },
            Err(e) => {
                ControlMetrics::bump(&metrics.tactile_errors);
                warn!("Dropping malformed tactile frame: {}", e);
            },
        }
    }
}

/// 创建状态镜像通道
pub fn state_mirror(
    depth: usize,
    metrics: Arc<ControlMetrics>,
) -> (StateMirror, Receiver<MirroredState>) {
    let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
    (StateMirror { tx, metrics }, rx)
}

/// 状态镜像发送端（控制线程持有）
pub struct StateMirror {
    tx: Sender<MirroredState>,
    metrics: Arc<ControlMetrics>,
}

impl StateMirror {
    /// 非阻塞投递
    ///
    /// 队列满或发布线程已退出时丢弃本条，返回 `false`。
    #[inline]
    pub fn offer(&self, state: MirroredState) -> bool {
        match self.tx.try_send(state) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                ControlMetrics::bump(&self.metrics.mirror_drops);
                false
            },
        }
    }
}

/// 状态发布循环
///
/// 通道断开（控制线程退出）或运行标志清除时退出。
/// 发布失败只记录告警，不重试同一条状态。
pub fn publish_loop(
    rx: Receiver<MirroredState>,
    mut publisher: impl StatePublisher,
    is_running: Arc<AtomicBool>,
    metrics: Arc<ControlMetrics>,
) {
    let poll = Duration::from_millis(10);

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Publish thread: is_running flag is false, exiting");
            break;
        }

        match rx.recv_timeout(poll) {
            Ok(state) => match publisher.publish(&state) {
                Ok(()) => ControlMetrics::bump(&metrics.states_published),
                Err(e) => warn!("State publish failed: {}", e),
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("State mirror disconnected, publish thread exiting");
                break;
            },
        }
    }
}

/// 提升当前线程优先级（需要 `realtime` feature）
///
/// 失败只告警：没有权限时仍以普通优先级运行。
pub fn promote_current_thread(label: &str) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("{} thread priority set to MAX (realtime)", label);
            },
            Err(e) => {
                warn!(
                    "Failed to set {} thread priority: {:?}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    label, e
                );
            },
        }
    }

    #[cfg(not(feature = "realtime"))]
    {
        trace!("{} thread runs at default priority (realtime feature disabled)", label);
    }
}
