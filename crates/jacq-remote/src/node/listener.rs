use super::{Incoming, NodeCore, NodeEvent, NodeEvents, NodeVariant, RemoteNode, delegate_core};
use crate::store::{RemoteStore, StoreEvent};
use crate::value::RemoteValue;
use std::sync::Arc;
use tracing::trace;

/// 只读节点
pub struct Listener {
    core: NodeCore,
}

impl Listener {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>) -> Self {
        Self::with_initial(store, path, RemoteValue::Null)
    }

    /// 指定种子到达前的缓存值
    pub fn with_initial(
        store: Arc<dyn RemoteStore>,
        path: impl Into<String>,
        value: RemoteValue,
    ) -> Self {
        Self {
            core: NodeCore::new(store, path.into(), value),
        }
    }
}

impl RemoteNode for Listener {
    delegate_core!();

    fn variant(&self) -> NodeVariant {
        NodeVariant::Listener
    }

    fn attach(&mut self) {
        self.core.attach();
    }

    fn handle(&mut self, event: &StoreEvent) -> NodeEvents {
        let mut events = NodeEvents::new();
        for incoming in self.core.route(event) {
            match incoming {
                Incoming::Seed(value) => {
                    trace!("{} seeded: {}", self.core.path(), value);
                    self.core.cache(value);
                },
                Incoming::Change(value) => {
                    self.core.cache(value.clone());
                    events.push(NodeEvent::Change(value));
                },
                Incoming::Read(_) | Incoming::Written(_) => {},
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_listener_seed_then_changes() {
        let (store, rx) = MemoryStore::new();
        store.set("looms/1/num-picks", 12u64);

        let mut node = Listener::new(store.clone(), "looms/1/num-picks");
        node.attach();
        store.set("looms/1/num-picks", 13u64);

        let events: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        assert_eq!(
            events,
            vec![
                NodeEvent::Change(RemoteValue::Number(12.0)),
                NodeEvent::Change(RemoteValue::Number(13.0)),
            ]
        );
        assert_eq!(node.value().as_u64(), Some(13));
    }

    #[test]
    fn test_detach_twice_unsubscribes_once() {
        let (store, _rx) = MemoryStore::new();
        let mut node = Listener::new(store.clone(), "x");
        node.attach();
        node.attach();
        assert_eq!(store.subscription_count(), 1);

        node.detach();
        node.detach();
        assert!(!node.is_attached());
        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn test_ignores_other_paths() {
        let (store, rx) = MemoryStore::new();
        let mut node = Listener::new(store.clone(), "a");
        node.attach();
        let _: Vec<_> = rx.try_iter().map(|e| node.handle(&e)).collect();

        store.set("b", true);
        let events: Vec<NodeEvent> = rx.try_iter().flat_map(|e| node.handle(&e)).collect();
        assert!(events.is_empty());
        assert_eq!(node.value(), &RemoteValue::Null);
    }
}
