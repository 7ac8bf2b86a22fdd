//! 触觉帧定义
//!
//! 触觉传感器以自己的频率发布 16 通道整数读数，与控制循环频率无关。
//! 上游传输层只负责把原始数据交给 [`TactileFrame`]，归约为标量由控制层完成。

use crate::ProtocolError;

/// 触觉通道数量
pub const TACTILE_CHANNELS: usize = 16;

/// 触觉载荷长度（16 × i32，小端）
pub const TACTILE_PAYLOAD_LEN: usize = TACTILE_CHANNELS * 4;

/// 一帧触觉读数
///
/// - **Copy trait**：64 字节定长数组，无堆分配，可以直接放进无锁快照
/// - `sequence` 由生产者递增，用于诊断丢帧；新旧判断由最新值单元的版本号负责
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TactileFrame {
    /// 生产者序号
    pub sequence: u64,
    /// 有序通道读数
    pub channels: [i32; TACTILE_CHANNELS],
}

impl TactileFrame {
    pub const fn new(sequence: u64, channels: [i32; TACTILE_CHANNELS]) -> Self {
        Self { sequence, channels }
    }

    /// 从变长通道数组构建
    ///
    /// 上游消息的数组长度不受类型约束，这里做长度检查，而不是静默截断。
    pub fn from_slice(sequence: u64, data: &[i32]) -> Result<Self, ProtocolError> {
        let channels: [i32; TACTILE_CHANNELS] =
            data.try_into().map_err(|_| ProtocolError::InvalidLength {
                expected: TACTILE_CHANNELS,
                actual: data.len(),
            })?;
        Ok(Self { sequence, channels })
    }

    /// 从 64 字节小端载荷解码
    pub fn from_le_bytes(sequence: u64, payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != TACTILE_PAYLOAD_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: TACTILE_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let mut channels = [0i32; TACTILE_CHANNELS];
        for (channel, chunk) in channels.iter_mut().zip(payload.chunks_exact(4)) {
            *channel = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self { sequence, channels })
    }

    /// 编码为 64 字节小端载荷
    pub fn to_le_bytes(&self) -> [u8; TACTILE_PAYLOAD_LEN] {
        let mut out = [0u8; TACTILE_PAYLOAD_LEN];
        for (chunk, channel) in out.chunks_exact_mut(4).zip(self.channels.iter()) {
            chunk.copy_from_slice(&channel.to_le_bytes());
        }
        out
    }
}
