//! 存储中的织机状态布局
//!
//! 所有路径都相对于配置的根路径（默认 `looms/<id>/`）。

use jacq_remote::{
    CollectionEvent, Listener, NodeEvent, OnlineStatus, ReadOnceBuffer, RemoteNode, RemoteStore,
    Role, StoreEvent, TwoWayCollection, Writable, Writer, WriterCollection, join_path,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const PI_ONLINE: &str = "pi-online";
pub const PEDALS_ONLINE: &str = "pedals-online";
pub const ACTIVE_DRAFT: &str = "active-draft";
pub const NUM_PICKS: &str = "num-picks";
pub const PICK_DATA: &str = "pick-data";
pub const LOOM_ONLINE: &str = "loom-online";
pub const VACUUM_ON: &str = "vacuum-on";
pub const LOOM_READY: &str = "loom-ready";
pub const NUM_PEDALS: &str = "num-pedals";
pub const PEDAL_STATES: &str = "pedal-states";
pub const NUM_V_PEDALS: &str = "num-v-pedals";
pub const V_PEDAL_STATES: &str = "v-pedal-states";

/// 单个节点的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    PiOnline,
    PedalsOnline,
    ActiveDraft,
    NumPicks,
    PickData,
    LoomOnline,
    VacuumOn,
    LoomReady,
}

/// 带来源标签的状态事件
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Node(NodeId, NodeEvent),
    Pedals(CollectionEvent),
    VirtualPedals(CollectionEvent),
}

/// 织机在存储中的全部状态节点
pub struct LoomStatus {
    root: String,
    /// 本进程在线（Host）
    pub pi_online: OnlineStatus,
    /// 踏板设备在线（Peer）
    pub pedals_online: OnlineStatus,
    /// 开始/停止织造
    pub active_draft: Listener,
    pub num_picks: Listener,
    pub pick_data: ReadOnceBuffer,
    pub loom_online: Writer,
    pub vacuum_on: Writer,
    /// 设备已就绪、等待下一纬
    pub loom_ready: Writer,
    pub pedals: WriterCollection,
    pub v_pedals: TwoWayCollection,
}

impl LoomStatus {
    pub fn new(store: Arc<dyn RemoteStore>, root: &str) -> Self {
        let path = |name: &str| join_path(root, name);
        Self {
            root: root.to_string(),
            pi_online: OnlineStatus::new(store.clone(), path(PI_ONLINE), Role::Host),
            pedals_online: OnlineStatus::new(store.clone(), path(PEDALS_ONLINE), Role::Peer),
            active_draft: Listener::new(store.clone(), path(ACTIVE_DRAFT)),
            num_picks: Listener::new(store.clone(), path(NUM_PICKS)),
            pick_data: ReadOnceBuffer::new(store.clone(), path(PICK_DATA)),
            loom_online: Writer::new(store.clone(), path(LOOM_ONLINE)),
            vacuum_on: Writer::new(store.clone(), path(VACUUM_ON)),
            loom_ready: Writer::new(store.clone(), path(LOOM_READY)),
            pedals: WriterCollection::new(store.clone(), path(NUM_PEDALS), path(PEDAL_STATES)),
            v_pedals: TwoWayCollection::new(store, path(NUM_V_PEDALS), path(V_PEDAL_STATES)),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// 连接所有节点并写入初始值
    pub fn attach(&mut self) {
        self.pi_online.attach();
        self.pedals_online.attach();
        self.active_draft.attach();
        self.num_picks.attach();
        self.pick_data.attach();

        for writer in [&mut self.loom_online, &mut self.vacuum_on, &mut self.loom_ready] {
            writer.attach();
            if let Err(e) = writer.set_val(false.into()) {
                warn!("Failed to initialize {}: {}", writer.path(), e);
            }
        }

        self.pedals.attach();
        self.v_pedals.attach();
        debug!("Loom status attached at {}", self.root);
    }

    pub fn detach(&mut self) {
        self.pi_online.detach();
        self.pedals_online.detach();
        self.active_draft.detach();
        self.num_picks.detach();
        self.pick_data.detach();
        self.loom_online.detach();
        self.vacuum_on.detach();
        self.loom_ready.detach();
        self.pedals.detach();
        self.v_pedals.detach();
    }

    /// 把一条存储事件分发给所有节点
    pub fn handle(&mut self, event: &StoreEvent) -> Vec<StatusEvent> {
        let mut out = Vec::new();
        let mut tag = |id: NodeId, events: jacq_remote::NodeEvents| {
            out.extend(events.into_iter().map(|e| StatusEvent::Node(id, e)));
        };
        tag(NodeId::PiOnline, self.pi_online.handle(event));
        tag(NodeId::PedalsOnline, self.pedals_online.handle(event));
        tag(NodeId::ActiveDraft, self.active_draft.handle(event));
        tag(NodeId::NumPicks, self.num_picks.handle(event));
        tag(NodeId::PickData, self.pick_data.handle(event));
        tag(NodeId::LoomOnline, self.loom_online.handle(event));
        tag(NodeId::VacuumOn, self.vacuum_on.handle(event));
        tag(NodeId::LoomReady, self.loom_ready.handle(event));

        out.extend(self.pedals.handle(event).into_iter().map(StatusEvent::Pedals));
        out.extend(
            self.v_pedals
                .handle(event)
                .into_iter()
                .map(StatusEvent::VirtualPedals),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacq_remote::{MemoryStore, RemoteValue};

    #[test]
    fn test_attach_writes_defaults() {
        let (store, rx) = MemoryStore::new();
        let mut status = LoomStatus::new(store.clone(), "looms/3/");
        status.attach();
        for event in rx.try_iter() {
            status.handle(&event);
        }

        assert_eq!(store.get("looms/3/pi-online"), RemoteValue::Bool(true));
        assert_eq!(store.get("looms/3/loom-online"), RemoteValue::Bool(false));
        assert_eq!(store.get("looms/3/vacuum-on"), RemoteValue::Bool(false));
        assert_eq!(store.get("looms/3/loom-ready"), RemoteValue::Bool(false));
        assert_eq!(store.get("looms/3/num-pedals"), RemoteValue::Number(0.0));
        assert!(status.pedals.is_ready());
        assert!(status.v_pedals.is_ready());
    }

    #[test]
    fn test_events_are_tagged() {
        let (store, rx) = MemoryStore::new();
        let mut status = LoomStatus::new(store.clone(), "looms/3/");
        status.attach();
        for event in rx.try_iter() {
            status.handle(&event);
        }

        store.set("looms/3/active-draft", true);
        let events: Vec<StatusEvent> = rx.try_iter().flat_map(|e| status.handle(&e)).collect();
        assert_eq!(
            events,
            vec![StatusEvent::Node(
                NodeId::ActiveDraft,
                NodeEvent::Change(true.into())
            )]
        );
    }

    #[test]
    fn test_detach_releases_subscriptions() {
        let (store, _rx) = MemoryStore::new();
        let mut status = LoomStatus::new(store.clone(), "looms/3/");
        status.attach();
        assert!(store.subscription_count() > 0);
        status.detach();
        assert_eq!(store.subscription_count(), 0);
    }
}
