//! 滑动命令
//!
//! 在仿真机械臂上执行一次滑动：归位 → 滑动 → 报告结果。

use super::load_config;
use crate::parse::{parse_surface, parse_vec3};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use slide_control::mock::{SimTactileStream, SimulatedArm};
use slide_control::{RequestCoordinator, RequestError, SlideRuntimeBuilder, SlidingResult};
use slide_driver::{PipelineConfig, latest_cell};
use slide_protocol::{EndEffectorPose, SlidingRequest, SlidingResponse};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 滑动命令参数
#[derive(Args, Debug)]
pub struct SlideCommand {
    /// 目标位移（m），逗号分隔，例如：0.1,0,0
    #[arg(short, long)]
    pub distance: String,

    /// 各轴速度（m/s），逗号分隔
    #[arg(short, long)]
    pub speed: String,

    /// 接触力阈值（N）
    #[arg(short, long, default_value_t = 5.0)]
    pub force: f64,

    /// 配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 仿真接触面 axis:position:stiffness，例如：0:0.04:2000
    #[arg(long)]
    pub surface: Option<String>,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,
}

/// 输出报告
#[derive(Debug, Serialize)]
struct SlideReport {
    session_id: Option<u64>,
    response: SlidingResponse,
    elapsed_ms: Option<f64>,
    fault: Option<String>,
    error: Option<String>,
    ticks: u64,
    overruns: u64,
}

impl SlideReport {
    fn completed(result: &SlidingResult) -> Self {
        Self {
            session_id: Some(result.session_id),
            response: result.to_response(),
            elapsed_ms: Some(result.elapsed.as_secs_f64() * 1000.0),
            fault: result.fault.map(|f| f.to_string()),
            error: None,
            ticks: 0,
            overruns: 0,
        }
    }

    /// 未完成的请求：受理前被拒绝（`session_id` 为 `None`），或受理后控制循环失联
    fn failed(session_id: Option<u64>, error: &RequestError) -> Self {
        let session_id = session_id.filter(|_| !error.is_rejection());
        let response = match session_id {
            Some(_) => SlidingResponse::faulted(),
            None => SlidingResponse::rejected(),
        };
        Self {
            session_id,
            response,
            elapsed_ms: None,
            fault: None,
            error: Some(error.to_string()),
            ticks: 0,
            overruns: 0,
        }
    }
}

/// 提交请求并等待结果，映射规则与 [`RequestCoordinator::handle`] 一致
fn run_slide(coordinator: &RequestCoordinator, request: SlidingRequest) -> SlideReport {
    let pending = match coordinator.begin(request) {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Slide rejected: {}", e);
            return SlideReport::failed(None, &e);
        },
    };
    let id = pending.id();
    match pending.wait() {
        Ok(result) => SlideReport::completed(&result),
        Err(e) => {
            warn!("Slide {} not completed: {}", id, e);
            SlideReport::failed(Some(id), &e)
        },
    }
}

impl SlideCommand {
    pub fn request(&self) -> Result<SlidingRequest> {
        Ok(SlidingRequest::new(
            parse_vec3(&self.distance)?,
            parse_vec3(&self.speed)?,
            self.force,
        ))
    }

    pub fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let request = self.request()?;

        let arm = SimulatedArm::new(config.homing.reference_joints, EndEffectorPose::identity());
        if let Some(surface) = &self.surface {
            let surface = parse_surface(surface)?;
            info!("Contact surface at axis {} = {} m", surface.axis, surface.position);
            arm.set_surface(Some(surface));
        }

        let (writer, reader) = latest_cell();
        let (sensors, actuator) = arm.split(reader);
        let period = Duration::from_millis(config.tactile.publish_period_ms);
        let stream = SimTactileStream::new(arm.clone(), period);
        let pipeline = PipelineConfig {
            receive_timeout_ms: config.tactile.publish_period_ms * 2,
            ..PipelineConfig::default()
        };

        let (runtime, coordinator) = SlideRuntimeBuilder::new(config, sensors, actuator)
            .tactile_stream(stream, writer)
            .pipeline_config(pipeline)
            .start()
            .context("Failed to start slide runtime")?;
        let coordinator = Arc::new(coordinator);

        let cancel_handle = coordinator.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Cancelling slide...");
            if !cancel_handle.cancel() {
                eprintln!("No slide in progress");
            }
        })
        .context("Failed to install Ctrl-C handler")?;

        let mut report = run_slide(&coordinator, request);

        let metrics = runtime.metrics();
        report.ticks = metrics.ticks;
        report.overruns = metrics.overruns;
        runtime.shutdown().context("Slide runtime did not stop cleanly")?;

        print_report(&report, self.json)
    }
}

fn print_report(report: &SlideReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let r = &report.response;
    println!("accepted:           {}", r.accepted);
    println!("reason:             {:?}", r.reason);
    println!(
        "distance_travelled: [{:.5}, {:.5}, {:.5}] m",
        r.distance_travelled[0], r.distance_travelled[1], r.distance_travelled[2]
    );
    println!("contact_detected:   {}", r.contact_detected);
    if let Some(elapsed) = report.elapsed_ms {
        println!("elapsed:            {:.1} ms", elapsed);
    }
    if let Some(fault) = &report.fault {
        println!("fault:              {}", fault);
    }
    if let Some(error) = &report.error {
        println!("error:              {}", error);
    }
    println!("ticks / overruns:   {} / {}", report.ticks, report.overruns);
    Ok(())
}
