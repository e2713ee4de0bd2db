//! 远端节点
//!
//! 每个节点镜像存储中的一个路径：缓存最近的值，`attach()` 后先一次性读取
//! 作为种子，再订阅后续变化。节点本身不持有线程，事件线程把收到的
//! [`StoreEvent`] 逐个交给 `handle()`，由节点判断是否与自己相关。
//!
//! 种子读取完成前到达的订阅值会排在种子之后应用。

mod listener;
mod online;
mod read_once;
mod two_way;
mod writer;

pub use listener::Listener;
pub use online::{OnlineStatus, Role};
pub use read_once::ReadOnceBuffer;
pub use two_way::TwoWay;
pub use writer::Writer;

use crate::error::RemoteError;
use crate::store::{RemoteStore, RequestId, StoreEvent, SubscriptionId};
use crate::value::RemoteValue;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 节点对外发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// 订阅送达新值
    Change(RemoteValue),
    /// 写入完成（成功与否）
    Set(bool),
    /// 缓冲区回写 `false` 完成
    Clearing(bool),
    /// 缓冲区为空（收到假值）
    Cleared,
    /// 显式读取取到了数据
    Fetched(RemoteValue),
}

pub type NodeEvents = SmallVec<[NodeEvent; 2]>;

/// 节点种类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeVariant {
    Listener,
    Writer,
    TwoWay,
    OnlineHost,
    OnlinePeer,
    ReadOnceBuffer,
}

impl NodeVariant {
    pub fn is_writable(self) -> bool {
        !matches!(self, NodeVariant::Listener | NodeVariant::OnlinePeer | NodeVariant::ReadOnceBuffer)
    }
}

/// 只读能力：所有节点都实现
pub trait RemoteNode {
    fn path(&self) -> &str;

    /// 最近一次缓存的值
    fn value(&self) -> &RemoteValue;

    fn variant(&self) -> NodeVariant;

    fn is_attached(&self) -> bool;

    /// 读取种子并订阅；已连接时无操作
    fn attach(&mut self);

    /// 取消订阅；重复调用无操作
    fn detach(&mut self);

    /// 处理一条存储事件，返回由此产生的节点事件
    fn handle(&mut self, event: &StoreEvent) -> NodeEvents;
}

/// 写能力
pub trait Writable: RemoteNode {
    /// 更新缓存并发起远端写入，结果以 `NodeEvent::Set` 送达
    fn set_val(&mut self, value: RemoteValue) -> Result<(), RemoteError>;
}

/// 种子读取状态
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    Pending {
        request: RequestId,
        queued: SmallVec<[RemoteValue; 1]>,
    },
    Done,
}

/// 节点与存储的连接状态
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Detached,
    Attached {
        subscription: SubscriptionId,
        seed: Seed,
    },
}

/// `NodeCore::route` 的结果，按到达顺序排列
#[derive(Debug)]
pub(crate) enum Incoming {
    Seed(RemoteValue),
    Change(RemoteValue),
    Read(Result<RemoteValue, RemoteError>),
    Written(Result<(), RemoteError>),
}

/// 各类节点共享的状态与事件路由
pub(crate) struct NodeCore {
    path: String,
    value: RemoteValue,
    store: Arc<dyn RemoteStore>,
    link: Link,
    reads: SmallVec<[RequestId; 1]>,
    writes: SmallVec<[RequestId; 2]>,
}

impl NodeCore {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, path: String, value: RemoteValue) -> Self {
        Self {
            path,
            value,
            store,
            link: Link::Detached,
            reads: SmallVec::new(),
            writes: SmallVec::new(),
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn value(&self) -> &RemoteValue {
        &self.value
    }

    pub(crate) fn cache(&mut self, value: RemoteValue) {
        self.value = value;
    }

    pub(crate) fn is_attached(&self) -> bool {
        matches!(self.link, Link::Attached { .. })
    }

    pub(crate) fn is_seeded(&self) -> bool {
        matches!(
            self.link,
            Link::Attached {
                seed: Seed::Done,
                ..
            }
        )
    }

    pub(crate) fn attach(&mut self) {
        if self.is_attached() {
            trace!("{} already attached", self.path);
            return;
        }
        let request = self.store.read_once(&self.path);
        let subscription = self.store.subscribe_value(&self.path);
        debug!("Attached {}", self.path);
        self.link = Link::Attached {
            subscription,
            seed: Seed::Pending {
                request,
                queued: SmallVec::new(),
            },
        };
    }

    pub(crate) fn detach(&mut self) {
        if let Link::Attached { subscription, .. } = self.link {
            self.store.unsubscribe(subscription);
            self.link = Link::Detached;
            debug!("Detached {}", self.path);
        }
    }

    pub(crate) fn write(&mut self, value: RemoteValue) {
        let request = self.store.write_value(&self.path, value);
        self.writes.push(request);
    }

    pub(crate) fn read(&mut self) {
        let request = self.store.read_once(&self.path);
        self.reads.push(request);
    }

    /// 判断事件是否属于本节点，并转换为按顺序应用的输入
    pub(crate) fn route(&mut self, event: &StoreEvent) -> SmallVec<[Incoming; 2]> {
        let mut out = SmallVec::new();
        match event {
            StoreEvent::ReadComplete { request, result } => {
                if let Link::Attached { seed, .. } = &mut self.link
                    && matches!(seed, Seed::Pending { request: r, .. } if r == request)
                {
                    let Seed::Pending { queued, .. } = std::mem::replace(seed, Seed::Done) else {
                        return out;
                    };
                    match result {
                        Ok(value) => out.push(Incoming::Seed(value.clone())),
                        Err(e) => warn!("Seed read of {} failed: {}", self.path, e),
                    }
                    out.extend(queued.into_iter().map(Incoming::Change));
                } else if let Some(pos) = self.reads.iter().position(|r| r == request) {
                    self.reads.remove(pos);
                    out.push(Incoming::Read(result.clone()));
                }
            },
            StoreEvent::Value {
                subscription,
                value,
            } => {
                if let Link::Attached {
                    subscription: ours,
                    seed,
                } = &mut self.link
                    && ours == subscription
                {
                    match seed {
                        Seed::Pending { queued, .. } => {
                            trace!("{}: value arrived before seed, queued", self.path);
                            queued.push(value.clone());
                        },
                        Seed::Done => out.push(Incoming::Change(value.clone())),
                    }
                }
            },
            StoreEvent::WriteComplete { request, result } => {
                if let Some(pos) = self.writes.iter().position(|r| r == request) {
                    self.writes.remove(pos);
                    out.push(Incoming::Written(result.clone()));
                }
            },
            StoreEvent::Cancelled {
                subscription,
                error,
            } => {
                if let Link::Attached {
                    subscription: ours,
                    ..
                } = &self.link
                    && ours == subscription
                {
                    warn!("Subscription on {} cancelled: {}", self.path, error);
                    self.link = Link::Detached;
                }
            },
            StoreEvent::Child { .. } => {},
        }
        out
    }
}

/// 生成 `RemoteNode` 中与 `NodeCore` 一一对应的方法
macro_rules! delegate_core {
    () => {
        fn path(&self) -> &str {
            self.core.path()
        }

        fn value(&self) -> &$crate::value::RemoteValue {
            self.core.value()
        }

        fn is_attached(&self) -> bool {
            self.core.is_attached()
        }

        fn detach(&mut self) {
            self.core.detach()
        }
    };
}

pub(crate) use delegate_core;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_variant_writability() {
        assert!(NodeVariant::Writer.is_writable());
        assert!(NodeVariant::TwoWay.is_writable());
        assert!(NodeVariant::OnlineHost.is_writable());
        assert!(!NodeVariant::OnlinePeer.is_writable());
        assert!(!NodeVariant::Listener.is_writable());
    }

    #[test]
    fn test_seed_applied_before_queued_values() {
        let (store, rx) = MemoryStore::new();
        store.set("n", 1u64);
        store.defer_reads();

        let mut core = NodeCore::new(store.clone(), "n".to_string(), RemoteValue::Null);
        core.attach();
        store.set("n", 2u64);
        store.release_reads();

        let mut order = Vec::new();
        for event in rx.try_iter() {
            for incoming in core.route(&event) {
                match incoming {
                    Incoming::Seed(v) => order.push(("seed", v)),
                    Incoming::Change(v) => order.push(("change", v)),
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
        assert_eq!(
            order,
            vec![
                ("seed", RemoteValue::Number(2.0)),
                ("change", RemoteValue::Number(1.0)),
                ("change", RemoteValue::Number(2.0)),
            ]
        );
        assert!(core.is_seeded());
    }

    #[test]
    fn test_cancelled_subscription_detaches() {
        let (store, rx) = MemoryStore::new();
        let mut core = NodeCore::new(store.clone(), "x".to_string(), RemoteValue::Null);
        core.attach();
        store.cancel("x");
        for event in rx.try_iter() {
            core.route(&event);
        }
        assert!(!core.is_attached());
        assert_eq!(core.link, Link::Detached);
    }
}
