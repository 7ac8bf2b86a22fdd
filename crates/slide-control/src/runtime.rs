//! 运行时装配
//!
//! 提供链式构造的 [`SlideRuntimeBuilder`]，启动顺序：
//!
//! 1. 校验配置
//! 2. 启动触觉接收线程（如果配置了触觉流）
//! 3. 在调用线程上归位（失败则停止已启动的线程并返回错误）
//! 4. 启动状态发布线程（如果配置了发布者）
//! 5. 启动实时控制线程
//!
//! 返回 [`SlideRuntime`]（生命周期句柄）与 [`RequestCoordinator`]（请求入口）。
//! `SlideRuntime` 被 Drop 时停止所有线程；在途会话以 `Aborted` 结束。

use crate::config::SlideConfig;
use crate::controller::{SharedStatus, SlideController};
use crate::coordinator::{RequestCoordinator, request_handoff};
use crate::error::ControlError;
use crate::homing::home;
use crate::loop_runner::{LoopConfig, run_control_loop};
use slide_driver::{
    CommandSink, ContactState, LatestWriter, MetricsSnapshot, PipelineConfig, SensorSource,
    SessionPhase, StatePublisher, TactileStream, promote_current_thread, publish_loop,
    state_mirror, tactile_loop,
};
use slide_protocol::TactileFrame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

struct TactileIngest {
    stream: Box<dyn TactileStream + Send>,
    writer: LatestWriter<TactileFrame>,
}

/// 运行时 Builder（链式构造）
///
/// # Example
///
/// ```rust,ignore
/// use slide_control::{SlideConfig, SlideRuntimeBuilder};
///
/// let (runtime, coordinator) = SlideRuntimeBuilder::new(SlideConfig::default(), sensors, sink)
///     .tactile_stream(stream, writer)
///     .state_publisher(publisher)
///     .start()?;
///
/// let result = coordinator.submit(request)?;
/// runtime.shutdown()?;
/// ```
pub struct SlideRuntimeBuilder<S, K> {
    config: SlideConfig,
    sensors: S,
    sink: K,
    tactile: Option<TactileIngest>,
    publisher: Option<Box<dyn StatePublisher + Send>>,
    pipeline_config: PipelineConfig,
    status: SharedStatus,
}

impl<S, K> SlideRuntimeBuilder<S, K>
where
    S: SensorSource + Send + 'static,
    K: CommandSink + Send + 'static,
{
    pub fn new(config: SlideConfig, sensors: S, sink: K) -> Self {
        Self {
            config,
            sensors,
            sink,
            tactile: None,
            publisher: None,
            pipeline_config: PipelineConfig::default(),
            status: SharedStatus::new(),
        }
    }

    /// 外部触觉流及其写入的最新值单元
    ///
    /// 对应的读者应已交给 `sensors`。
    pub fn tactile_stream(
        mut self,
        stream: impl TactileStream + Send + 'static,
        writer: LatestWriter<TactileFrame>,
    ) -> Self {
        self.tactile = Some(TactileIngest {
            stream: Box::new(stream),
            writer,
        });
        self
    }

    /// 对外状态发布者
    pub fn state_publisher(mut self, publisher: impl StatePublisher + Send + 'static) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// 使用外部提供的共享状态（例如共享指标）
    pub fn shared_status(mut self, status: SharedStatus) -> Self {
        self.status = status;
        self
    }

    /// 归位并启动所有线程
    ///
    /// # 错误
    ///
    /// - `ControlError::Config`: 配置不一致
    /// - `ControlError::Homing`: 归位失败（致命）
    /// - `ControlError::Spawn`: 线程创建失败
    pub fn start(self) -> Result<(SlideRuntime, RequestCoordinator), ControlError> {
        let Self {
            config,
            mut sensors,
            mut sink,
            tactile,
            publisher,
            pipeline_config,
            status,
        } = self;
        config.validate()?;

        let mut runtime = SlideRuntime {
            is_running: Arc::new(AtomicBool::new(true)),
            status: status.clone(),
            control_thread: None,
            tactile_thread: None,
            publish_thread: None,
        };

        if let Some(TactileIngest { stream, writer }) = tactile {
            let is_running = runtime.is_running.clone();
            let metrics = status.metrics.clone();
            let pipeline = pipeline_config.clone();
            runtime.tactile_thread = Some(spawn_named("slide-tactile", move || {
                tactile_loop(stream, writer, pipeline, is_running, metrics)
            })?);
        }

        // 归位失败时 runtime 被 Drop，已启动的线程随之退出
        let period = config.control.period();
        status.phase.set(SessionPhase::Homing);
        let token = home(&mut sensors, &mut sink, &config.homing, period).inspect_err(|e| {
            error!("Homing failed, runtime not started: {}", e);
            status.phase.set(SessionPhase::Idle);
        })?;

        let mut controller = SlideController::new(&config, token, status.clone())?;
        let (coordinator, mut endpoint) = request_handoff(config.limits, status.metrics.clone());

        let mirror = match publisher {
            Some(publisher) => {
                let (mirror, rx) = state_mirror(pipeline_config.mirror_depth, status.metrics.clone());
                let is_running = runtime.is_running.clone();
                let metrics = status.metrics.clone();
                runtime.publish_thread = Some(spawn_named("slide-publish", move || {
                    publish_loop(rx, publisher, is_running, metrics)
                })?);
                Some(mirror)
            },
            None => None,
        };

        let is_running = runtime.is_running.clone();
        let loop_config = LoopConfig::from_rate(config.control.rate_hz);
        runtime.control_thread = Some(spawn_named("slide-control", move || {
            promote_current_thread("Control");
            run_control_loop(
                &mut controller,
                &mut sensors,
                &mut sink,
                &mut endpoint,
                mirror.as_ref(),
                &loop_config,
                &is_running,
            );
        })?);

        info!("Slide runtime started ({} Hz)", config.control.rate_hz);
        Ok((runtime, coordinator))
    }
}

fn spawn_named<F>(name: &'static str, body: F) -> Result<JoinHandle<()>, ControlError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|source| ControlError::Spawn {
            thread: name,
            source,
        })
}

/// 运行时句柄
pub struct SlideRuntime {
    is_running: Arc<AtomicBool>,
    status: SharedStatus,
    control_thread: Option<JoinHandle<()>>,
    tactile_thread: Option<JoinHandle<()>>,
    publish_thread: Option<JoinHandle<()>>,
}

impl SlideRuntime {
    pub fn status(&self) -> &SharedStatus {
        &self.status
    }

    /// 当前会话阶段（原子镜像）
    pub fn phase(&self) -> SessionPhase {
        self.status.phase.get()
    }

    /// 当前接触状态（原子镜像）
    pub fn contact(&self) -> ContactState {
        self.status.contact.get()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.status.metrics.snapshot()
    }

    /// 控制线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.control_thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止所有线程并等待退出
    ///
    /// # 错误
    ///
    /// 任一线程 panic 时返回 `ControlError::ThreadPanicked`。
    pub fn shutdown(mut self) -> Result<(), ControlError> {
        if self.stop() {
            Ok(())
        } else {
            Err(ControlError::ThreadPanicked)
        }
    }

    /// 返回是否所有线程都正常退出
    fn stop(&mut self) -> bool {
        // Release: 之前的写入对退出中的线程可见
        self.is_running.store(false, Ordering::Release);

        let mut clean = true;
        // 控制线程先退出：它负责 Hold 并交付在途会话的结果
        for (name, handle) in [
            ("control", self.control_thread.take()),
            ("tactile", self.tactile_thread.take()),
            ("publish", self.publish_thread.take()),
        ] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                error!("{} thread panicked", name);
                clean = false;
            }
        }
        clean
    }
}

impl Drop for SlideRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}
