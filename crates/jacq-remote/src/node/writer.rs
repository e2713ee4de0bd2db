use super::{
    Incoming, NodeCore, NodeEvent, NodeEvents, NodeVariant, RemoteNode, Writable, delegate_core,
};
use crate::error::RemoteError;
use crate::store::{RemoteStore, StoreEvent};
use crate::value::RemoteValue;
use std::sync::Arc;
use tracing::warn;

/// 写入节点
///
/// 与另一端的 `Listener` 成对使用。写入不重试。
pub struct Writer {
    core: NodeCore,
}

impl Writer {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>) -> Self {
        Self::with_initial(store, path, RemoteValue::Null)
    }

    pub fn with_initial(
        store: Arc<dyn RemoteStore>,
        path: impl Into<String>,
        value: RemoteValue,
    ) -> Self {
        Self {
            core: NodeCore::new(store, path.into(), value),
        }
    }

    pub(crate) fn is_seeded(&self) -> bool {
        self.core.is_seeded()
    }
}

impl RemoteNode for Writer {
    delegate_core!();

    fn variant(&self) -> NodeVariant {
        NodeVariant::Writer
    }

    fn attach(&mut self) {
        self.core.attach();
    }

    fn handle(&mut self, event: &StoreEvent) -> NodeEvents {
        let mut events = NodeEvents::new();
        for incoming in self.core.route(event) {
            match incoming {
                Incoming::Seed(value) => self.core.cache(value),
                Incoming::Change(value) => {
                    self.core.cache(value.clone());
                    events.push(NodeEvent::Change(value));
                },
                Incoming::Written(result) => {
                    if let Err(e) = &result {
                        warn!("Write to {} failed: {}", self.core.path(), e);
                    }
                    events.push(NodeEvent::Set(result.is_ok()));
                },
                Incoming::Read(_) => {},
            }
        }
        events
    }
}

impl Writable for Writer {
    fn set_val(&mut self, value: RemoteValue) -> Result<(), RemoteError> {
        self.core.cache(value.clone());
        self.core.write(value);
        Ok(())
    }
}
