use super::{
    Incoming, NodeCore, NodeEvent, NodeEvents, NodeVariant, RemoteNode, Writable, delegate_core,
};
use crate::error::RemoteError;
use crate::store::{RemoteStore, StoreEvent};
use crate::value::RemoteValue;
use std::sync::Arc;
use tracing::{trace, warn};

/// 双向节点：像 `Listener` 一样订阅，像 `Writer` 一样写入
///
/// 未连接时写入只更新本地缓存。
pub struct TwoWay {
    core: NodeCore,
}

impl TwoWay {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>) -> Self {
        Self {
            core: NodeCore::new(store, path.into(), RemoteValue::Null),
        }
    }

    /// 立即重新读取一次当前值，结果以 `Change` 送达
    pub fn refresh(&mut self) {
        self.core.read();
    }

    pub(crate) fn is_seeded(&self) -> bool {
        self.core.is_seeded()
    }
}

impl RemoteNode for TwoWay {
    delegate_core!();

    fn variant(&self) -> NodeVariant {
        NodeVariant::TwoWay
    }

    fn attach(&mut self) {
        self.core.attach();
    }

    fn handle(&mut self, event: &StoreEvent) -> NodeEvents {
        let mut events = NodeEvents::new();
        for incoming in self.core.route(event) {
            match incoming {
                Incoming::Seed(value) => self.core.cache(value),
                Incoming::Change(value) | Incoming::Read(Ok(value)) => {
                    self.core.cache(value.clone());
                    events.push(NodeEvent::Change(value));
                },
                Incoming::Read(Err(e)) => {
                    warn!("Refresh of {} failed: {}", self.core.path(), e);
                },
                Incoming::Written(result) => {
                    if let Err(e) = &result {
                        warn!("Write to {} failed: {}", self.core.path(), e);
                    }
                    events.push(NodeEvent::Set(result.is_ok()));
                },
            }
        }
        events
    }
}

impl Writable for TwoWay {
    fn set_val(&mut self, value: RemoteValue) -> Result<(), RemoteError> {
        self.core.cache(value.clone());
        if self.core.is_attached() {
            self.core.write(value);
        } else {
            trace!("{} detached, write kept local", self.core.path());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_detached_write_is_cache_only() {
        let (store, _rx) = MemoryStore::new();
        let mut node = TwoWay::new(store.clone(), "num-v-pedals");
        node.set_val(3u64.into()).unwrap();
        assert_eq!(node.value(), &RemoteValue::Number(3.0));
        assert!(store.ops().is_empty());

        node.attach();
        node.set_val(4u64.into()).unwrap();
        assert_eq!(store.get("num-v-pedals"), RemoteValue::Number(4.0));
    }

    #[test]
    fn test_refresh_delivers_change() {
        let (store, rx) = MemoryStore::new();
        let mut node = TwoWay::new(store.clone(), "v");
        node.attach();
        let _: Vec<_> = rx.try_iter().map(|e| node.handle(&e)).collect();

        node.refresh();
        let events: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        assert_eq!(events, vec![NodeEvent::Change(RemoteValue::Null)]);
    }

    #[test]
    fn test_remote_changes_observed() {
        let (store, rx) = MemoryStore::new();
        let mut node = TwoWay::new(store.clone(), "v");
        node.attach();
        store.set("v", "x");
        let events: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        assert_eq!(events.last(), Some(&NodeEvent::Change("x".into())));
    }
}
