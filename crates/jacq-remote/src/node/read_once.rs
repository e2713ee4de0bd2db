use super::{Incoming, NodeCore, NodeEvent, NodeEvents, NodeVariant, RemoteNode, delegate_core};
use crate::store::{RemoteStore, StoreEvent};
use crate::value::RemoteValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 单槽邮箱
///
/// 远端写入真值时缓存并发出 `Change`，随后回写 `false` 表示已取走，
/// 回写完成发出 `Clearing`；收到假值时发出 `Cleared`。缓存只保留最近的真值。
pub struct ReadOnceBuffer {
    core: NodeCore,
}

impl ReadOnceBuffer {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>) -> Self {
        Self {
            core: NodeCore::new(store, path.into(), RemoteValue::Bool(false)),
        }
    }

    /// 显式取出并清空
    ///
    /// 读取完成后：有数据则缓存并发出 `Fetched`；无论有无数据都回写 `false`。
    /// 未连接时忽略。
    pub fn read(&mut self) {
        if self.core.is_attached() {
            self.core.read();
        } else {
            debug!("{} detached, read ignored", self.core.path());
        }
    }

    fn clear(&mut self) {
        self.core.write(RemoteValue::Bool(false));
    }
}

impl RemoteNode for ReadOnceBuffer {
    delegate_core!();

    fn variant(&self) -> NodeVariant {
        NodeVariant::ReadOnceBuffer
    }

    fn attach(&mut self) {
        self.core.attach();
    }

    fn handle(&mut self, event: &StoreEvent) -> NodeEvents {
        let mut events = NodeEvents::new();
        for incoming in self.core.route(event) {
            match incoming {
                Incoming::Seed(value) => {
                    if value.is_truthy() {
                        self.core.cache(value);
                    }
                },
                Incoming::Change(value) => {
                    if value.is_truthy() {
                        debug!("{}: buffer data changed", self.core.path());
                        self.core.cache(value.clone());
                        events.push(NodeEvent::Change(value));
                        self.clear();
                    } else {
                        events.push(NodeEvent::Cleared);
                    }
                },
                Incoming::Read(Ok(value)) => {
                    if value.is_truthy() {
                        info!("{}: read value {}", self.core.path(), value);
                        self.core.cache(value.clone());
                        events.push(NodeEvent::Fetched(value));
                    } else {
                        debug!("{}: no data in buffer", self.core.path());
                    }
                    self.clear();
                },
                Incoming::Read(Err(e)) => {
                    warn!("Read of {} failed: {}", self.core.path(), e);
                },
                Incoming::Written(result) => {
                    if let Err(e) = &result {
                        warn!("Clearing {} failed: {}", self.core.path(), e);
                    }
                    events.push(NodeEvent::Clearing(result.is_ok()));
                },
            }
        }
        events
    }
}
