//! 桥接层错误类型

use jacq_driver::DriverError;
use jacq_protocol::ProtocolError;
use jacq_remote::RemoteError;
use thiserror::Error;

/// 桥接层错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 串口失效，会话终止（不自动重连）
    #[error("Serial transport closed: {0}")]
    TransportClosed(String),

    #[error("Remote event stream closed")]
    StoreClosed,
}
