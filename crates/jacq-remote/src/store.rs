//! 远端存储接口
//!
//! 所有操作立即返回一个 id，结果以 [`StoreEvent`] 的形式异步送达
//! 事件线程。存储客户端库的内部实现不在本 crate 范围内。

use crate::error::RemoteError;
use crate::value::RemoteValue;

/// 一次性请求（读/写/删除）的 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// 订阅 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// 子节点变更
#[derive(Debug, Clone, PartialEq)]
pub enum ChildChange {
    Added { key: String, value: RemoteValue },
    Changed { key: String, value: RemoteValue },
    Removed { key: String },
}

impl ChildChange {
    pub fn key(&self) -> &str {
        match self {
            ChildChange::Added { key, .. }
            | ChildChange::Changed { key, .. }
            | ChildChange::Removed { key } => key,
        }
    }
}

/// 存储送往事件线程的消息
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// `read_once` 完成
    ReadComplete {
        request: RequestId,
        result: Result<RemoteValue, RemoteError>,
    },
    /// `write_value` / `push_child` / `remove` 完成
    WriteComplete {
        request: RequestId,
        result: Result<(), RemoteError>,
    },
    /// 值订阅送达的新值
    Value {
        subscription: SubscriptionId,
        value: RemoteValue,
    },
    /// 子节点订阅送达的变更
    Child {
        subscription: SubscriptionId,
        change: ChildChange,
    },
    /// 订阅被存储端取消（如权限变更）
    Cancelled {
        subscription: SubscriptionId,
        error: RemoteError,
    },
}

/// 远端键值存储
///
/// 实现必须是非阻塞的：调用立即返回，结果通过事件通道送达。
/// 同一个实例由所有节点通过 `Arc<dyn RemoteStore>` 共享。
pub trait RemoteStore: Send + Sync {
    fn read_once(&self, path: &str) -> RequestId;

    /// 订阅路径的值；当前值会作为第一条 `Value` 送达
    fn subscribe_value(&self, path: &str) -> SubscriptionId;

    /// 订阅子节点的增删改；已有子节点会先以 `Added` 送达
    fn subscribe_children(&self, path: &str) -> SubscriptionId;

    /// 取消订阅；之后仍可能收到已在途的事件
    fn unsubscribe(&self, subscription: SubscriptionId);

    fn write_value(&self, path: &str, value: RemoteValue) -> RequestId;

    /// 在 `path` 下新建子节点，键由存储生成且按创建顺序递增
    fn push_child(&self, path: &str, value: RemoteValue) -> (String, RequestId);

    fn remove(&self, path: &str) -> RequestId;
}

/// 拼接父路径与子键
pub fn join_path(parent: &str, key: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", parent, key)
    }
}

/// 路径分段（忽略多余的 `/`）
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("looms/7/", "pick-data"), "looms/7/pick-data");
        assert_eq!(join_path("looms/7", "/pick-data"), "looms/7/pick-data");
        assert_eq!(join_path("", "pick-data"), "pick-data");
    }

    #[test]
    fn test_path_segments() {
        let segments: Vec<_> = path_segments("/looms//7/pedal-states/").collect();
        assert_eq!(segments, vec!["looms", "7", "pedal-states"]);
    }
}
