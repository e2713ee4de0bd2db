//! 远端数组
//!
//! 数组在存储中由两部分组成：长度节点（整数）与父节点（以子键为索引的集合）。
//!
//! ```text
//! num-pedals: 3
//! pedal-states: { "-jq0000000001": true, "-jq0000000002": false, ... }
//! ```
//!
//! - [`WriterCollection`]：本地为准，顺序与长度推送到存储
//! - [`TwoWayCollection`]：远端为准，成员由子节点增删通知决定，长度仅供参考

use crate::error::RemoteError;
use crate::node::{Listener, NodeEvent, RemoteNode, TwoWay, Writable, Writer};
use crate::store::{ChildChange, RemoteStore, RequestId, StoreEvent, SubscriptionId, join_path};
use crate::value::RemoteValue;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 数组对外发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    /// 长度节点或父节点首次报告了值
    Ready,
    ChildAdded { index: usize, key: String },
    /// 子节点的值变化
    ChildChange {
        index: usize,
        key: String,
        value: RemoteValue,
    },
    ChildRemoved { index: usize, key: String },
    /// 子节点写入完成
    ChildSet { index: usize, ok: bool },
    /// 远端新建子节点完成
    ChildPushed { key: String, ok: bool },
    /// 远端删除子节点完成
    ChildDeleted { key: String, ok: bool },
}

pub type CollectionEvents = SmallVec<[CollectionEvent; 2]>;

/// 写入长度/父节点；失败只记录，完成结果由节点自己的 `Set` 事件送达
fn set_or_warn(node: &mut Writer, value: RemoteValue) {
    if let Err(e) = node.set_val(value) {
        warn!("Failed to write {}: {}", node.path(), e);
    }
}

/// 父节点下子键的订阅
struct ChildWatch {
    store: Arc<dyn RemoteStore>,
    subscription: Option<SubscriptionId>,
}

impl ChildWatch {
    fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            subscription: None,
        }
    }

    fn attach(&mut self, parent: &str) {
        if self.subscription.is_none() {
            self.subscription = Some(self.store.subscribe_children(parent));
        }
    }

    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.store.unsubscribe(subscription);
        }
    }

    fn matches<'a>(&self, event: &'a StoreEvent) -> Option<&'a ChildChange> {
        match event {
            StoreEvent::Child {
                subscription,
                change,
            } if Some(*subscription) == self.subscription => Some(change),
            _ => None,
        }
    }
}

/// 数组直接向存储发出的子节点请求
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChildOp {
    Push(String),
    Remove(String),
    Write(String),
}

/// 未完成的子节点请求
#[derive(Default)]
struct ChildRequests {
    pending: SmallVec<[(RequestId, ChildOp); 4]>,
}

impl ChildRequests {
    fn track(&mut self, request: RequestId, op: ChildOp) {
        self.pending.push((request, op));
    }

    /// 事件是否完成了某个请求；失败时记录告警
    fn complete(&mut self, event: &StoreEvent, parent: &str) -> Option<(ChildOp, bool)> {
        let StoreEvent::WriteComplete { request, result } = event else {
            return None;
        };
        let pos = self.pending.iter().position(|(r, _)| r == request)?;
        let (_, op) = self.pending.remove(pos);
        if let Err(e) = result {
            warn!("{}: {:?} failed: {}", parent, op, e);
        }
        Some((op, result.is_ok()))
    }
}

/// 本地为准的写入数组
///
/// 连接时把远端重置为空数组（长度 0，父节点 `false`）。远端拒绝新建的
/// 子节点会从本地撤回并重写长度。
pub struct WriterCollection {
    store: Arc<dyn RemoteStore>,
    length: Writer,
    parent: Writer,
    watch: ChildWatch,
    requests: ChildRequests,
    children: Vec<(String, Writer)>,
    ready: bool,
}

impl WriterCollection {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        length_path: impl Into<String>,
        parent_path: impl Into<String>,
    ) -> Self {
        Self {
            length: Writer::new(store.clone(), length_path),
            parent: Writer::new(store.clone(), parent_path),
            watch: ChildWatch::new(store.clone()),
            requests: ChildRequests::default(),
            store,
            children: Vec::new(),
            ready: false,
        }
    }

    pub fn attach(&mut self) {
        self.length.attach();
        self.parent.attach();
        if self.children.is_empty() {
            set_or_warn(&mut self.length, 0u64.into());
            set_or_warn(&mut self.parent, false.into());
        }
        self.watch.attach(self.parent.path());
    }

    pub fn detach(&mut self) {
        self.watch.detach();
        self.length.detach();
        self.parent.detach();
        for (_, child) in &mut self.children {
            child.detach();
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn node_at(&self, index: usize) -> Option<&Writer> {
        self.children.get(index).map(|(_, child)| child)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(key, _)| key.as_str())
    }

    /// 子节点当前缓存的值
    pub fn values(&self) -> Vec<RemoteValue> {
        self.children
            .iter()
            .map(|(_, child)| child.value().clone())
            .collect()
    }

    fn write_length(&mut self) {
        let len = self.children.len();
        set_or_warn(&mut self.length, len.into());
    }

    /// 在远端新建子节点并追加到末尾，返回生成的键
    pub fn add_node(&mut self, value: RemoteValue) -> String {
        let (key, request) = self.store.push_child(self.parent.path(), value.clone());
        self.requests.track(request, ChildOp::Push(key.clone()));
        let mut child =
            Writer::with_initial(self.store.clone(), join_path(self.parent.path(), &key), value);
        child.attach();
        self.children.push((key.clone(), child));
        self.write_length();
        trace!("Added {} to {}", key, self.parent.path());
        key
    }

    /// 删除末尾子节点，返回其键；数组为空时返回 `None`
    pub fn rem_node(&mut self) -> Option<String> {
        let (key, mut child) = self.children.pop()?;
        child.detach();
        let request = self.store.remove(child.path());
        self.requests.track(request, ChildOp::Remove(key.clone()));
        self.write_length();
        Some(key)
    }

    /// 调整到 `target` 个元素，恰好执行 `|target - len|` 次增删
    ///
    /// 新增的第 `i` 个元素取 `values[i]`，缺省为 `false`。返回执行的操作数。
    pub fn update_array(&mut self, target: usize, values: &[RemoteValue]) -> usize {
        let previous = self.children.len();
        while self.children.len() < target {
            let value = values
                .get(self.children.len())
                .cloned()
                .unwrap_or(RemoteValue::Bool(false));
            self.add_node(value);
        }
        while self.children.len() > target {
            self.rem_node();
        }
        previous.abs_diff(target)
    }

    pub fn set_node(&mut self, index: usize, value: RemoteValue) -> Result<(), RemoteError> {
        let len = self.children.len();
        let (_, child) = self
            .children
            .get_mut(index)
            .ok_or(RemoteError::IndexOutOfRange { index, len })?;
        child.set_val(value)
    }

    /// 撤回远端拒绝新建的子节点
    fn withdraw(&mut self, key: &str) {
        if let Some(pos) = self.children.iter().position(|(k, _)| k == key) {
            let (_, mut child) = self.children.remove(pos);
            child.detach();
            self.write_length();
            debug!("{}: withdrew rejected child {}", self.parent.path(), key);
        }
    }

    pub fn handle(&mut self, event: &StoreEvent) -> CollectionEvents {
        let mut events = CollectionEvents::new();

        for node_event in self.length.handle(event) {
            if node_event == NodeEvent::Set(false) {
                warn!("Failed to write length {}", self.length.path());
            }
        }
        self.parent.handle(event);

        if !self.ready && (self.length.is_seeded() || self.parent.is_seeded()) {
            self.ready = true;
            events.push(CollectionEvent::Ready);
        }

        if let Some(change) = self.watch.matches(event) {
            trace!("{}: child {:?}", self.parent.path(), change);
        }

        match self.requests.complete(event, self.parent.path()) {
            Some((ChildOp::Push(key), ok)) => {
                if !ok {
                    self.withdraw(&key);
                }
                events.push(CollectionEvent::ChildPushed { key, ok });
            },
            Some((ChildOp::Remove(key), ok)) => {
                events.push(CollectionEvent::ChildDeleted { key, ok });
            },
            Some((ChildOp::Write(_), _)) | None => {},
        }

        for (index, (_, child)) in self.children.iter_mut().enumerate() {
            for node_event in child.handle(event) {
                if let NodeEvent::Set(ok) = node_event {
                    events.push(CollectionEvent::ChildSet { index, ok });
                }
            }
        }
        events
    }
}

/// 远端为准的数组
///
/// 子节点只响应远端通知：新增通知创建一个已连接的 `Listener` 追加到末尾，
/// 删除通知弹出末尾元素。`add_node` / `rem_node` 只向远端发出请求，
/// 请求结果以 `ChildPushed` / `ChildDeleted` 送达。
pub struct TwoWayCollection {
    store: Arc<dyn RemoteStore>,
    length: TwoWay,
    parent: TwoWay,
    watch: ChildWatch,
    requests: ChildRequests,
    children: Vec<(String, Listener)>,
    ready: bool,
}

impl TwoWayCollection {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        length_path: impl Into<String>,
        parent_path: impl Into<String>,
    ) -> Self {
        Self {
            length: TwoWay::new(store.clone(), length_path),
            parent: TwoWay::new(store.clone(), parent_path),
            watch: ChildWatch::new(store.clone()),
            requests: ChildRequests::default(),
            store,
            children: Vec::new(),
            ready: false,
        }
    }

    pub fn attach(&mut self) {
        self.length.attach();
        self.parent.attach();
        self.watch.attach(self.parent.path());
    }

    pub fn detach(&mut self) {
        self.watch.detach();
        self.length.detach();
        self.parent.detach();
        for (_, child) in &mut self.children {
            child.detach();
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// 远端长度节点的值（仅供参考）
    pub fn length_hint(&self) -> Option<u64> {
        self.length.value().as_u64()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> Vec<RemoteValue> {
        self.children
            .iter()
            .map(|(_, child)| child.value().clone())
            .collect()
    }

    /// 在远端新建子节点；本地在收到新增通知后才追加
    pub fn add_node(&mut self, value: RemoteValue) -> String {
        let (key, request) = self.store.push_child(self.parent.path(), value);
        self.requests.track(request, ChildOp::Push(key.clone()));
        key
    }

    fn remove_child(&mut self, index: usize) -> Option<String> {
        let (key, child) = self.children.get(index)?;
        let request = self.store.remove(child.path());
        let key = key.clone();
        self.requests.track(request, ChildOp::Remove(key.clone()));
        Some(key)
    }

    /// 删除末尾子节点的远端条目；本地在收到删除通知后才弹出
    pub fn rem_node(&mut self) -> Option<String> {
        let last = self.children.len().checked_sub(1)?;
        self.remove_child(last)
    }

    /// 发出 `|target - len|` 次增删请求
    pub fn update_array(&mut self, target: usize, values: &[RemoteValue]) -> usize {
        let previous = self.children.len();
        if target > previous {
            for index in previous..target {
                let value = values
                    .get(index)
                    .cloned()
                    .unwrap_or(RemoteValue::Bool(false));
                self.add_node(value);
            }
        } else {
            for index in (target..previous).rev() {
                self.remove_child(index);
            }
        }
        previous.abs_diff(target)
    }

    /// 直接写入远端子节点；本地值随通知更新，结果以 `ChildSet` 送达
    pub fn set_node(&mut self, index: usize, value: RemoteValue) -> Result<(), RemoteError> {
        let len = self.children.len();
        let (key, child) = self
            .children
            .get(index)
            .ok_or(RemoteError::IndexOutOfRange { index, len })?;
        let request = self.store.write_value(child.path(), value);
        let key = key.clone();
        self.requests.track(request, ChildOp::Write(key));
        Ok(())
    }

    pub fn handle(&mut self, event: &StoreEvent) -> CollectionEvents {
        let mut events = CollectionEvents::new();

        self.length.handle(event);
        self.parent.handle(event);
        if !self.ready && (self.length.is_seeded() || self.parent.is_seeded()) {
            self.ready = true;
            events.push(CollectionEvent::Ready);
        }

        match self.requests.complete(event, self.parent.path()) {
            Some((ChildOp::Push(key), ok)) => events.push(CollectionEvent::ChildPushed { key, ok }),
            Some((ChildOp::Remove(key), ok)) => {
                events.push(CollectionEvent::ChildDeleted { key, ok });
            },
            Some((ChildOp::Write(key), ok)) => {
                if let Some(index) = self.children.iter().position(|(k, _)| *k == key) {
                    events.push(CollectionEvent::ChildSet { index, ok });
                }
            },
            None => {},
        }

        match self.watch.matches(event) {
            Some(ChildChange::Added { key, value }) => {
                let index = self.children.len();
                let mut child = Listener::with_initial(
                    self.store.clone(),
                    join_path(self.parent.path(), key),
                    value.clone(),
                );
                child.attach();
                self.children.push((key.clone(), child));
                debug!("{}: child {} added at {}", self.parent.path(), key, index);
                events.push(CollectionEvent::ChildAdded {
                    index,
                    key: key.clone(),
                });
            },
            Some(ChildChange::Removed { key }) => {
                if let Some((tail_key, mut child)) = self.children.pop() {
                    if &tail_key != key {
                        warn!(
                            "{}: removed {} but popped tail {}",
                            self.parent.path(),
                            key,
                            tail_key
                        );
                    }
                    child.detach();
                    events.push(CollectionEvent::ChildRemoved {
                        index: self.children.len(),
                        key: tail_key,
                    });
                }
            },
            // 子节点自己的订阅会送达新值
            Some(ChildChange::Changed { .. }) | None => {},
        }

        for (index, (key, child)) in self.children.iter_mut().enumerate() {
            for node_event in child.handle(event) {
                if let NodeEvent::Change(value) = node_event {
                    events.push(CollectionEvent::ChildChange {
                        index,
                        key: key.clone(),
                        value,
                    });
                }
            }
        }
        events
    }
}
