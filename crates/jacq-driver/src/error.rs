//! 驱动层错误类型定义

use jacq_protocol::ProtocolError;
use jacq_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编码/解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 入站通道已关闭（RX 线程退出）
    #[error("Inbound channel closed")]
    ChannelClosed,

    /// RX 线程错误
    #[error("RX thread error: {0}")]
    IoThread(String),

    /// 无效输入（如掩码长度与织机宽度不符）
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
