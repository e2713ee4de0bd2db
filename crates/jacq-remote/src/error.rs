//! 远端存储错误类型

use thiserror::Error;

/// 远端存储错误
///
/// 读写失败通过 `StoreEvent` 异步送达；只有同步可判定的错误
/// （如对只读节点写入）直接返回。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Permission denied at {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription cancelled: {0}")]
    Cancelled(String),

    #[error("Node {0} is read-only")]
    ReadOnly(String),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}
