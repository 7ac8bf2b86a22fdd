//! 最新值单元（单写者 / 多读者，Latest-Value-Wins）
//!
//! 用于在独立调度的执行上下文之间传递传感器数据：
//! - 写者（触觉接收线程）每收到一帧，原子替换整个快照
//! - 读者（控制循环）无锁读取最新快照，不会因写者阻塞
//!
//! 快照是自有数据（`Snapshot<T>`），携带单调递增的版本号与接收时刻，
//! 读者据此判断"是否为新数据"与"数据是否过期"。
//!
//! # 性能
//!
//! - 读取：`ArcSwapOption::load_full`，一次原子引用计数，无分配、无锁
//! - 写入：每次分配一个 `Arc<Snapshot<T>>`，只发生在非实时的写者线程
//! - 回收：写者保留被替换的上一个快照，到下一次发布时才释放。读者在两次发布
//!   之间放下快照时，释放总是发生在写者线程；持有超过一个发布周期的读者
//!   可能成为最后的持有者，由读者线程释放

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 带版本号的快照
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// 版本号（从 1 开始，每次发布递增）
    pub version: u64,
    /// 发布时刻
    pub received_at: Instant,
    /// 数据
    pub value: T,
}

impl<T> Snapshot<T> {
    /// 快照年龄
    #[inline]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }
}

struct CellInner<T> {
    slot: ArcSwapOption<Snapshot<T>>,
    version: AtomicU64,
}

/// 创建一对写者 / 读者
///
/// 写者不可 Clone，从类型上保证单写者。
pub fn latest_cell<T>() -> (LatestWriter<T>, LatestReader<T>) {
    let inner = Arc::new(CellInner {
        slot: ArcSwapOption::empty(),
        version: AtomicU64::new(0),
    });
    (
        LatestWriter {
            inner: inner.clone(),
            retired: None,
        },
        LatestReader { inner },
    )
}

/// 写者（唯一）
pub struct LatestWriter<T> {
    inner: Arc<CellInner<T>>,
    /// 上一个被替换的快照，延迟到下一次发布时在写者线程释放
    retired: Option<Arc<Snapshot<T>>>,
}

impl<T> LatestWriter<T> {
    /// 发布新值，返回版本号
    pub fn publish(&mut self, value: T) -> u64 {
        self.publish_at(value, Instant::now())
    }

    /// 以指定时刻发布（回放 / 测试）
    pub fn publish_at(&mut self, value: T, received_at: Instant) -> u64 {
        // 单写者：版本号只在这里递增
        let version = self.inner.version.load(Ordering::Relaxed) + 1;
        let previous = self.inner.slot.swap(Some(Arc::new(Snapshot {
            version,
            received_at,
            value,
        })));
        self.inner.version.store(version, Ordering::Release);
        drop(std::mem::replace(&mut self.retired, previous));
        version
    }

}

/// 读者（可 Clone，可跨线程）
pub struct LatestReader<T> {
    inner: Arc<CellInner<T>>,
}

impl<T> Clone for LatestReader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> LatestReader<T> {
    /// 读取最新快照（无锁）
    ///
    /// 返回的 `Arc` 应在本周期内放下：写者只替读者保留一代旧快照。
    #[inline]
    pub fn latest(&self) -> Option<Arc<Snapshot<T>>> {
        self.inner.slot.load_full()
    }

    /// 当前已发布的版本号（0 表示从未发布）
    #[inline]
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }
}
