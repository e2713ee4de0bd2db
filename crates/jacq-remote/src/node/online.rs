use super::{
    Incoming, NodeCore, NodeEvent, NodeEvents, NodeVariant, RemoteNode, Writable, delegate_core,
};
use crate::error::RemoteError;
use crate::store::{RemoteStore, StoreEvent};
use crate::value::RemoteValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// 在线状态节点的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// 本进程就是被监视的设备，负责保持 `true`
    Host,
    /// 观察其他设备是否在线，只读
    Peer,
}

/// 设备在线状态
///
/// Host 在进程存活期间让值保持 `true`：连接时写入一次，之后只要观察到
/// 其他值（包括别的参与者写入的 `false`）就重新写回 `true`。
pub struct OnlineStatus {
    core: NodeCore,
    role: Role,
}

impl OnlineStatus {
    pub fn new(store: Arc<dyn RemoteStore>, path: impl Into<String>, role: Role) -> Self {
        let initial = match role {
            Role::Host => RemoteValue::Bool(true),
            Role::Peer => RemoteValue::Bool(false),
        };
        Self {
            core: NodeCore::new(store, path.into(), initial),
            role,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// 当前值是否为真
    pub fn is_online(&self) -> bool {
        self.core.value().is_truthy()
    }

    fn keep_alive(&mut self) {
        debug!("Keep-alive: re-asserting {}", self.core.path());
        self.core.cache(RemoteValue::Bool(true));
        self.core.write(RemoteValue::Bool(true));
    }
}

impl RemoteNode for OnlineStatus {
    delegate_core!();

    fn variant(&self) -> NodeVariant {
        match self.role {
            Role::Host => NodeVariant::OnlineHost,
            Role::Peer => NodeVariant::OnlinePeer,
        }
    }

    fn attach(&mut self) {
        let was_attached = self.core.is_attached();
        self.core.attach();
        if self.role == Role::Host && !was_attached {
            self.keep_alive();
        }
    }

    fn handle(&mut self, event: &StoreEvent) -> NodeEvents {
        let mut events = NodeEvents::new();
        for incoming in self.core.route(event) {
            match incoming {
                Incoming::Seed(value) => {
                    if self.role == Role::Peer {
                        self.core.cache(value);
                    }
                },
                Incoming::Change(value) => {
                    let asserted = value == RemoteValue::Bool(true);
                    self.core.cache(value.clone());
                    events.push(NodeEvent::Change(value));
                    if self.role == Role::Host && !asserted {
                        self.keep_alive();
                    }
                },
                Incoming::Written(result) => {
                    if let Err(e) = &result {
                        warn!("Online status write to {} failed: {}", self.core.path(), e);
                    }
                    events.push(NodeEvent::Set(result.is_ok()));
                },
                Incoming::Read(_) => {},
            }
        }
        events
    }
}

impl Writable for OnlineStatus {
    fn set_val(&mut self, value: RemoteValue) -> Result<(), RemoteError> {
        match self.role {
            Role::Host => {
                self.core.cache(value.clone());
                self.core.write(value);
                Ok(())
            },
            Role::Peer => Err(RemoteError::ReadOnly(self.core.path().to_string())),
        }
    }
}
