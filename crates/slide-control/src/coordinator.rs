//! 请求协调
//!
//! 请求方线程与控制线程之间的显式交接：
//!
//! ```text
//! 请求方                                   控制线程
//!   │ validate（同步拒绝）                      │
//!   │ busy CAS（忙则 ConcurrencyReject）        │
//!   │ ── SessionTicket ─▶ bounded(1) ─────────▶ poll_request()
//!   │                                          │ ... tick ...
//!   │ ◀── (id, outcome) ◀─ bounded(1) ◀─────── deliver()  → busy = false
//!   ▼ PendingSlide::wait
//! ```
//!
//! 取消只写一个原子槽（存放要取消的会话 ID），控制线程在下一个周期边界读取。
//! 每个会话有独立的结果通道，结果带会话 ID，请求方据此校验关联关系。

use crate::config::SlideLimits;
use crate::controller::SlidingResult;
use crate::error::{RequestError, StartError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use slide_driver::ControlMetrics;
use slide_protocol::{SlidingRequest, SlidingResponse};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 会话结果（开始失败时为 `StartError`）
pub type SessionOutcome = Result<SlidingResult, StartError>;

/// 控制线程一侧的请求通道
///
/// 实时路径：所有方法都不得阻塞。
pub trait RequestChannel {
    /// 取出待开始的请求
    fn poll_request(&mut self) -> Option<(u64, SlidingRequest)>;

    /// 会话 `session_id` 是否被请求取消（读取后清除）
    fn cancel_requested(&mut self, session_id: u64) -> bool;

    /// 交付会话结果（每个会话恰好一次）
    fn deliver(&mut self, session_id: u64, outcome: SessionOutcome);
}

type Reply = (u64, SessionOutcome);

struct SessionTicket {
    id: u64,
    request: SlidingRequest,
    reply: Sender<Reply>,
}

/// 两侧共享的门控状态
#[derive(Debug, Default)]
struct Gate {
    /// 是否有会话在途（请求方 CAS 置位，控制线程交付后清除）
    busy: AtomicBool,
    /// 当前在途会话 ID
    active: AtomicU64,
    /// 待取消的会话 ID（0 表示无）
    cancel: AtomicU64,
    /// 控制线程一端已释放
    stopped: AtomicBool,
}

impl Gate {
    /// 控制线程失联后释放会话 `id` 占用的 busy
    fn release(&self, id: u64) {
        if self.active.load(Ordering::Acquire) == id {
            self.busy.store(false, Ordering::Release);
        }
    }
}

/// 创建请求方 / 控制线程两端
pub fn request_handoff(
    limits: SlideLimits,
    metrics: Arc<ControlMetrics>,
) -> (RequestCoordinator, LoopEndpoint) {
    let (starts_tx, starts_rx) = crossbeam_channel::bounded(1);
    let gate = Arc::new(Gate::default());
    (
        RequestCoordinator {
            starts: starts_tx,
            gate: gate.clone(),
            limits,
            metrics,
            next_id: AtomicU64::new(1),
        },
        LoopEndpoint {
            starts: starts_rx,
            gate,
            in_flight: None,
        },
    )
}

/// 控制线程一端
pub struct LoopEndpoint {
    starts: Receiver<SessionTicket>,
    gate: Arc<Gate>,
    in_flight: Option<(u64, Sender<Reply>)>,
}

impl RequestChannel for LoopEndpoint {
    fn poll_request(&mut self) -> Option<(u64, SlidingRequest)> {
        let ticket = self.starts.try_recv().ok()?;
        self.in_flight = Some((ticket.id, ticket.reply));
        Some((ticket.id, ticket.request))
    }

    fn cancel_requested(&mut self, session_id: u64) -> bool {
        self.gate
            .cancel
            .compare_exchange(session_id, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn deliver(&mut self, session_id: u64, outcome: SessionOutcome) {
        match self.in_flight.take() {
            Some((expected, reply)) => {
                if expected != session_id {
                    warn!(
                        "Delivering result of session {} to requester of session {}",
                        session_id, expected
                    );
                }
                if reply.try_send((session_id, outcome)).is_err() {
                    debug!("Requester of session {} is no longer waiting", session_id);
                }
            },
            None => warn!("No requester for session {}, result dropped", session_id),
        }
        // Release: 结果先于 busy 清除可见
        self.gate.busy.store(false, Ordering::Release);
    }
}

impl Drop for LoopEndpoint {
    fn drop(&mut self) {
        self.gate.stopped.store(true, Ordering::Release);
        // 丢弃排队中的请求，使其请求方的回复通道断开
        while let Ok(ticket) = self.starts.try_recv() {
            debug!("Session {} never started, control loop is gone", ticket.id);
        }
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// 请求方一端（可在多个线程间共享）
pub struct RequestCoordinator {
    starts: Sender<SessionTicket>,
    gate: Arc<Gate>,
    limits: SlideLimits,
    metrics: Arc<ControlMetrics>,
    next_id: AtomicU64,
}

impl RequestCoordinator {
    /// 受理请求，返回在途句柄
    ///
    /// # 错误
    ///
    /// - `RequestError::Validation`: 请求超出硬件限制（同步返回，不交接）
    /// - `RequestError::ConcurrencyReject`: 已有会话在途（不影响在途会话）
    /// - `RequestError::ControllerStopped`: 控制循环已退出
    pub fn begin(&self, request: SlidingRequest) -> Result<PendingSlide, RequestError> {
        if let Err(e) = self.limits.validate_request(&request) {
            ControlMetrics::bump(&self.metrics.requests_rejected);
            warn!("Sliding request rejected: {}", e);
            return Err(e.into());
        }

        if self.gate.stopped.load(Ordering::Acquire) {
            error!("Control loop is not running");
            return Err(RequestError::ControllerStopped);
        }

        if self
            .gate
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            ControlMetrics::bump(&self.metrics.requests_rejected);
            warn!("Sliding request rejected: session in flight");
            return Err(RequestError::ConcurrencyReject);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.gate.active.store(id, Ordering::Release);
        self.gate.cancel.store(0, Ordering::Release);

        let ticket = SessionTicket {
            id,
            request,
            reply: reply_tx,
        };
        match self.starts.try_send(ticket) {
            Ok(()) => {
                info!("Sliding request accepted as session {}", id);
                Ok(PendingSlide {
                    id,
                    reply: reply_rx,
                    gate: self.gate.clone(),
                    done: false,
                })
            },
            Err(TrySendError::Full(_)) => {
                // busy 门控下不应出现
                self.gate.busy.store(false, Ordering::Release);
                ControlMetrics::bump(&self.metrics.requests_rejected);
                Err(RequestError::ConcurrencyReject)
            },
            Err(TrySendError::Disconnected(_)) => {
                self.gate.busy.store(false, Ordering::Release);
                error!("Control loop is not running");
                Err(RequestError::ControllerStopped)
            },
        }
    }

    /// 受理请求并阻塞等待结果
    pub fn submit(&self, request: SlidingRequest) -> Result<SlidingResult, RequestError> {
        self.begin(request)?.wait()
    }

    /// 对外接口：请求 → 响应（不返回错误）
    ///
    /// 未受理的请求映射为 `Rejected`；受理后控制循环失联映射为 `Faulted`。
    pub fn handle(&self, request: SlidingRequest) -> SlidingResponse {
        let pending = match self.begin(request) {
            Ok(pending) => pending,
            Err(_) => return SlidingResponse::rejected(),
        };
        match pending.wait() {
            Ok(result) => result.to_response(),
            Err(e) if e.is_rejection() => SlidingResponse::rejected(),
            Err(e) => {
                error!("Accepted request ended without a result: {}", e);
                SlidingResponse::faulted()
            },
        }
    }

    /// 取消在途会话（在下一个控制周期生效）
    ///
    /// 没有在途会话时返回 `false`。
    pub fn cancel(&self) -> bool {
        if !self.gate.busy.load(Ordering::Acquire) {
            return false;
        }
        let id = self.gate.active.load(Ordering::Acquire);
        self.gate.cancel.store(id, Ordering::Release);
        true
    }

    pub fn is_busy(&self) -> bool {
        self.gate.busy.load(Ordering::Acquire)
    }

    pub fn limits(&self) -> &SlideLimits {
        &self.limits
    }
}

/// 在途会话句柄
///
/// 未取结果就丢弃时会请求取消该会话。
pub struct PendingSlide {
    id: u64,
    reply: Receiver<Reply>,
    gate: Arc<Gate>,
    done: bool,
}

impl PendingSlide {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 请求取消
    pub fn cancel(&self) {
        if !self.done {
            self.gate.cancel.store(self.id, Ordering::Release);
        }
    }

    /// 阻塞等待结果
    pub fn wait(mut self) -> Result<SlidingResult, RequestError> {
        let received = self.reply.recv();
        self.done = true;
        match received {
            Ok(reply) => self.accept(reply),
            Err(_) => {
                self.gate.release(self.id);
                Err(RequestError::ControllerStopped)
            },
        }
    }

    /// 限时等待结果
    ///
    /// 超时返回 `Ok(None)`，句柄仍然有效。结果取走后再次调用返回 `ControllerStopped`。
    pub fn wait_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<SlidingResult>, RequestError> {
        match self.reply.recv_timeout(timeout) {
            Ok(reply) => {
                self.done = true;
                self.accept(reply).map(Some)
            },
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.done = true;
                self.gate.release(self.id);
                Err(RequestError::ControllerStopped)
            },
        }
    }

    fn accept(&self, (id, outcome): Reply) -> Result<SlidingResult, RequestError> {
        if id != self.id {
            error!("Received result of session {} while waiting for {}", id, self.id);
            return Err(RequestError::SessionMismatch {
                expected: self.id,
                actual: id,
            });
        }
        outcome.map_err(RequestError::from)
    }
}

impl Drop for PendingSlide {
    fn drop(&mut self) {
        if !self.done {
            debug!("Pending slide {} dropped, requesting cancel", self.id);
            // 不覆盖其他会话已写入的取消
            let _ = self.gate.cancel.compare_exchange(
                0,
                self.id,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}
