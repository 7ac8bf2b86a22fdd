//! 驱动层错误类型定义

use slide_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型（非实时路径：触觉接收、状态发布）
#[derive(Error, Debug)]
pub enum DriverError {
    /// 载荷解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 接收超时（无新数据，正常现象）
    #[error("Receive timeout")]
    Timeout,

    /// 数据流已关闭（上游断开）
    #[error("Stream closed")]
    StreamClosed,

    /// 通道已关闭（对端线程退出）
    #[error("Channel closed")]
    ChannelClosed,

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(String),
}

/// 状态反馈错误（实时路径，不分配）
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedError {
    /// 与机器人的连接已断开
    #[error("Robot state feed disconnected")]
    Disconnected,

    /// 尚未收到任何状态
    #[error("No robot state available yet")]
    NoData,
}
