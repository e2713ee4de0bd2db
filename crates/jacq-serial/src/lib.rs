//! # Jacq Serial Transport Layer
//!
//! 串口硬件抽象层，为织机驱动提供统一的收发接口。
//!
//! 端口发现与选择不在本层范围内：调用方给出设备路径。

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serialport")]
pub mod port;

#[cfg(feature = "serialport")]
pub use port::{SerialPortRx, SerialPortTransport, SerialPortTx};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockRx, MockTransport, MockTx};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Port closed")]
    Closed,
}

impl SerialError {
    /// 是否应终止当前会话（不自动重连）
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Timeout => false,
            SerialError::Closed => true,
            SerialError::Device(e) => e.is_fatal(),
            SerialError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    InvalidConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

/// 串口读取端
///
/// `receive` 在超时内没有数据时返回 `SerialError::Timeout`。
pub trait RxTransport {
    fn receive(&mut self) -> Result<Bytes, SerialError>;
}

/// 串口写入端
pub trait TxTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 关闭写入端；默认只刷新
    fn close(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

/// 完整串口（读写合一），可拆分为独立的读/写端
pub trait SerialTransport: RxTransport + TxTransport {
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
}

/// 可拆分的串口
///
/// 读端交给 RX 线程，写端由 `Loom` 独占。
pub trait SplittableTransport: SerialTransport {
    type Rx: RxTransport;
    type Tx: TxTransport;
    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError>;
}
