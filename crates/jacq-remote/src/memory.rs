//! 进程内存储（测试与离线演示用）
//!
//! 语义与云端实时数据库一致：写入 `Null` 删除节点，空的父节点随之消失，
//! 订阅只在值实际变化时送达。另外提供测试钩子：延迟读、拒绝读写、
//! 模拟其他参与者写入、记录本端发出的变更。

use crate::error::RemoteError;
use crate::store::{
    ChildChange, RemoteStore, RequestId, StoreEvent, SubscriptionId, join_path, path_segments,
};
use crate::value::RemoteValue;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// 本端发出的变更记录
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Write { path: String, value: RemoteValue },
    Push { path: String, key: String, value: RemoteValue },
    Remove { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Value,
    Children,
}

#[derive(Debug, Clone)]
struct Subscription {
    path: String,
    kind: SubscriptionKind,
}

#[derive(Debug, Clone, PartialEq)]
enum View {
    Value(RemoteValue),
    Children(BTreeMap<String, RemoteValue>),
}

#[derive(Default)]
struct Inner {
    root: RemoteValue,
    next_id: u64,
    next_key: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    deferred_reads: Option<Vec<(RequestId, String)>>,
    rejected_reads: Vec<String>,
    rejected_writes: Vec<String>,
    ops: Vec<StoreOp>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn view(&self, subscription: &Subscription) -> View {
        let value = get_at(&self.root, &subscription.path);
        match subscription.kind {
            SubscriptionKind::Value => View::Value(value),
            SubscriptionKind::Children => match value {
                RemoteValue::Map(map) => View::Children(map),
                _ => View::Children(BTreeMap::new()),
            },
        }
    }

    fn is_rejected(prefixes: &[String], path: &str) -> bool {
        prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn normalize_path(path: &str) -> String {
    path_segments(path).collect::<Vec<_>>().join("/")
}

fn get_at(root: &RemoteValue, path: &str) -> RemoteValue {
    let mut node = root;
    for segment in path_segments(path) {
        match node {
            RemoteValue::Map(map) => match map.get(segment) {
                Some(child) => node = child,
                None => return RemoteValue::Null,
            },
            _ => return RemoteValue::Null,
        }
    }
    node.clone()
}

/// 去掉 `Null` 子节点，空 `Map` 视为不存在
fn normalize(value: RemoteValue) -> RemoteValue {
    match value {
        RemoteValue::Map(map) => {
            let map: BTreeMap<_, _> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                RemoteValue::Null
            } else {
                RemoteValue::Map(map)
            }
        },
        other => other,
    }
}

fn set_at(node: &mut RemoteValue, segments: &[&str], value: RemoteValue) {
    let Some((first, rest)) = segments.split_first() else {
        *node = normalize(value);
        return;
    };
    if !matches!(node, RemoteValue::Map(_)) {
        *node = RemoteValue::Map(BTreeMap::new());
    }
    let now_empty = match &mut *node {
        RemoteValue::Map(map) => {
            let child = map.entry((*first).to_string()).or_default();
            set_at(child, rest, value);
            if child.is_null() {
                map.remove(*first);
            }
            map.is_empty()
        },
        _ => false,
    };
    if now_empty {
        *node = RemoteValue::Null;
    }
}

/// 进程内 `RemoteStore`
pub struct MemoryStore {
    inner: Mutex<Inner>,
    events: Sender<StoreEvent>,
}

impl MemoryStore {
    /// 创建存储；返回的接收端交给事件线程
    pub fn new() -> (Arc<Self>, Receiver<StoreEvent>) {
        let (events, receiver) = unbounded();
        (
            Arc::new(Self {
                inner: Mutex::new(Inner::default()),
                events,
            }),
            receiver,
        )
    }

    fn emit(&self, event: StoreEvent) {
        trace!("store event: {:?}", event);
        let _ = self.events.send(event);
    }

    /// 修改树并向受影响的订阅送达差异
    fn apply(&self, inner: &mut Inner, path: &str, value: RemoteValue) {
        let before: Vec<(SubscriptionId, View)> = inner
            .subscriptions
            .iter()
            .map(|(id, sub)| (*id, inner.view(sub)))
            .collect();

        let segments: Vec<&str> = path_segments(path).collect();
        set_at(&mut inner.root, &segments, value);

        for (id, old) in before {
            let Some(sub) = inner.subscriptions.get(&id) else {
                continue;
            };
            match (old, inner.view(sub)) {
                (View::Value(old), View::Value(new)) => {
                    if old != new {
                        self.emit(StoreEvent::Value {
                            subscription: id,
                            value: new,
                        });
                    }
                },
                (View::Children(old), View::Children(new)) => {
                    for (key, value) in &new {
                        let change = match old.get(key) {
                            None => ChildChange::Added {
                                key: key.clone(),
                                value: value.clone(),
                            },
                            Some(previous) if previous != value => ChildChange::Changed {
                                key: key.clone(),
                                value: value.clone(),
                            },
                            Some(_) => continue,
                        };
                        self.emit(StoreEvent::Child {
                            subscription: id,
                            change,
                        });
                    }
                    for key in old.keys().filter(|k| !new.contains_key(*k)) {
                        self.emit(StoreEvent::Child {
                            subscription: id,
                            change: ChildChange::Removed { key: key.clone() },
                        });
                    }
                },
                _ => {},
            }
        }
    }

    fn write(&self, inner: &mut Inner, path: &str, value: RemoteValue) -> RequestId {
        let request = RequestId(inner.next_id());
        if Inner::is_rejected(&inner.rejected_writes, path) {
            self.emit(StoreEvent::WriteComplete {
                request,
                result: Err(RemoteError::PermissionDenied(path.to_string())),
            });
            return request;
        }
        self.apply(inner, path, value);
        self.emit(StoreEvent::WriteComplete {
            request,
            result: Ok(()),
        });
        request
    }

    /// 模拟其他参与者写入（不记录、不产生 `WriteComplete`）
    pub fn set(&self, path: &str, value: impl Into<RemoteValue>) {
        let mut inner = self.inner.lock();
        self.apply(&mut inner, path, value.into());
    }

    pub fn get(&self, path: &str) -> RemoteValue {
        get_at(&self.inner.lock().root, path)
    }

    /// 本端发出的变更
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().ops.clone()
    }

    pub fn take_ops(&self) -> Vec<StoreOp> {
        std::mem::take(&mut self.inner.lock().ops)
    }

    /// 之后的 `read_once` 暂不完成，直到 `release_reads`
    pub fn defer_reads(&self) {
        let mut inner = self.inner.lock();
        if inner.deferred_reads.is_none() {
            inner.deferred_reads = Some(Vec::new());
        }
    }

    /// 以当前值完成所有被延迟的读
    pub fn release_reads(&self) {
        let mut inner = self.inner.lock();
        for (request, path) in inner.deferred_reads.take().unwrap_or_default() {
            self.emit(StoreEvent::ReadComplete {
                request,
                result: Ok(get_at(&inner.root, &path)),
            });
        }
    }

    /// 拒绝以 `prefix` 开头的路径上的写入
    pub fn reject_writes(&self, prefix: &str) {
        self.inner.lock().rejected_writes.push(normalize_path(prefix));
    }

    /// 拒绝以 `prefix` 开头的路径上的读取
    pub fn reject_reads(&self, prefix: &str) {
        self.inner.lock().rejected_reads.push(normalize_path(prefix));
    }

    pub fn allow_all(&self) {
        let mut inner = self.inner.lock();
        inner.rejected_reads.clear();
        inner.rejected_writes.clear();
    }

    /// 存储端取消某路径上的所有订阅
    pub fn cancel(&self, path: &str) {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        let cancelled: Vec<SubscriptionId> = inner
            .subscriptions
            .iter()
            .filter(|(_, sub)| sub.path == path)
            .map(|(id, _)| *id)
            .collect();
        for id in cancelled {
            inner.subscriptions.remove(&id);
            self.emit(StoreEvent::Cancelled {
                subscription: id,
                error: RemoteError::Cancelled(path.clone()),
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// 某路径上的活动订阅数
    pub fn subscriptions_at(&self, path: &str) -> usize {
        let path = normalize_path(path);
        self.inner
            .lock()
            .subscriptions
            .values()
            .filter(|sub| sub.path == path)
            .count()
    }
}

impl RemoteStore for MemoryStore {
    fn read_once(&self, path: &str) -> RequestId {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        let request = RequestId(inner.next_id());
        if Inner::is_rejected(&inner.rejected_reads, &path) {
            self.emit(StoreEvent::ReadComplete {
                request,
                result: Err(RemoteError::PermissionDenied(path)),
            });
        } else if let Some(deferred) = inner.deferred_reads.as_mut() {
            deferred.push((request, path));
        } else {
            self.emit(StoreEvent::ReadComplete {
                request,
                result: Ok(get_at(&inner.root, &path)),
            });
        }
        request
    }

    fn subscribe_value(&self, path: &str) -> SubscriptionId {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id());
        let value = get_at(&inner.root, &path);
        inner.subscriptions.insert(
            id,
            Subscription {
                path,
                kind: SubscriptionKind::Value,
            },
        );
        self.emit(StoreEvent::Value {
            subscription: id,
            value,
        });
        id
    }

    fn subscribe_children(&self, path: &str) -> SubscriptionId {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id());
        if let RemoteValue::Map(children) = get_at(&inner.root, &path) {
            for (key, value) in children {
                self.emit(StoreEvent::Child {
                    subscription: id,
                    change: ChildChange::Added { key, value },
                });
            }
        }
        inner.subscriptions.insert(
            id,
            Subscription {
                path,
                kind: SubscriptionKind::Children,
            },
        );
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.lock().subscriptions.remove(&subscription);
    }

    fn write_value(&self, path: &str, value: RemoteValue) -> RequestId {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        inner.ops.push(StoreOp::Write {
            path: path.clone(),
            value: value.clone(),
        });
        self.write(&mut inner, &path, value)
    }

    fn push_child(&self, path: &str, value: RemoteValue) -> (String, RequestId) {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        inner.next_key += 1;
        let key = format!("-jq{:010}", inner.next_key);
        inner.ops.push(StoreOp::Push {
            path: path.clone(),
            key: key.clone(),
            value: value.clone(),
        });
        let child = join_path(&path, &key);
        let request = self.write(&mut inner, &child, value);
        (key, request)
    }

    fn remove(&self, path: &str) -> RequestId {
        let path = normalize_path(path);
        let mut inner = self.inner.lock();
        inner.ops.push(StoreOp::Remove { path: path.clone() });
        self.write(&mut inner, &path, RemoteValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &Receiver<StoreEvent>) -> Vec<StoreEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_write_then_read() {
        let (store, rx) = MemoryStore::new();
        let write = store.write_value("looms/1/loom-ready", true.into());
        let read = store.read_once("looms/1/loom-ready");
        assert_eq!(
            drain(&rx),
            vec![
                StoreEvent::WriteComplete {
                    request: write,
                    result: Ok(())
                },
                StoreEvent::ReadComplete {
                    request: read,
                    result: Ok(RemoteValue::Bool(true))
                },
            ]
        );
    }

    #[test]
    fn test_value_subscription_only_on_change() {
        let (store, rx) = MemoryStore::new();
        let sub = store.subscribe_value("a/b");
        assert_eq!(
            drain(&rx),
            vec![StoreEvent::Value {
                subscription: sub,
                value: RemoteValue::Null
            }]
        );

        store.set("a/b", 1u64);
        store.set("a/b", 1u64);
        store.set("a/c", 2u64);
        assert_eq!(
            drain(&rx),
            vec![StoreEvent::Value {
                subscription: sub,
                value: RemoteValue::Number(1.0)
            }]
        );

        store.unsubscribe(sub);
        store.set("a/b", 5u64);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_parent_sees_child_writes() {
        let (store, rx) = MemoryStore::new();
        let sub = store.subscribe_value("p");
        drain(&rx);
        store.set("p/x", true);
        match drain(&rx).as_slice() {
            [StoreEvent::Value { subscription, value }] => {
                assert_eq!(*subscription, sub);
                assert_eq!(value.as_map().map(|m| m.len()), Some(1));
            },
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_child_events_and_ordered_keys() {
        let (store, rx) = MemoryStore::new();
        let sub = store.subscribe_children("arr");
        let (k1, _) = store.push_child("arr", true.into());
        let (k2, _) = store.push_child("arr", false.into());
        assert!(k1 < k2);
        store.set(&join_path("arr", &k1), false);
        store.remove(&join_path("arr", &k2));

        let changes: Vec<ChildChange> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                StoreEvent::Child { subscription, change } if subscription == sub => Some(change),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                ChildChange::Added {
                    key: k1.clone(),
                    value: true.into()
                },
                ChildChange::Added {
                    key: k2.clone(),
                    value: false.into()
                },
                ChildChange::Changed {
                    key: k1,
                    value: false.into()
                },
                ChildChange::Removed { key: k2 },
            ]
        );
    }

    #[test]
    fn test_existing_children_delivered_on_subscribe() {
        let (store, rx) = MemoryStore::new();
        store.set("arr/a", 1u64);
        store.set("arr/b", 2u64);
        let sub = store.subscribe_children("arr");
        let keys: Vec<String> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                StoreEvent::Child {
                    subscription,
                    change: ChildChange::Added { key, .. },
                } if subscription == sub => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_null_write_prunes_empty_parents() {
        let (store, _rx) = MemoryStore::new();
        store.set("a/b/c", true);
        store.remove("a/b/c");
        assert_eq!(store.get("a"), RemoteValue::Null);

        store.set("arr", false);
        assert_eq!(store.get("arr"), RemoteValue::Bool(false));
    }

    #[test]
    fn test_deferred_reads() {
        let (store, rx) = MemoryStore::new();
        store.defer_reads();
        let read = store.read_once("x");
        store.set("x", "late");
        assert!(drain(&rx).is_empty());
        store.release_reads();
        assert_eq!(
            drain(&rx),
            vec![StoreEvent::ReadComplete {
                request: read,
                result: Ok("late".into())
            }]
        );
    }

    #[test]
    fn test_rejected_write_leaves_tree() {
        let (store, rx) = MemoryStore::new();
        store.reject_writes("looms/1/");
        let request = store.write_value("looms/1/vacuum-on", true.into());
        assert_eq!(store.get("looms/1/vacuum-on"), RemoteValue::Null);
        assert_eq!(
            drain(&rx),
            vec![StoreEvent::WriteComplete {
                request,
                result: Err(RemoteError::PermissionDenied(
                    "looms/1/vacuum-on".to_string()
                ))
            }]
        );
        assert_eq!(store.ops().len(), 1);
    }

    #[test]
    fn test_cancel_subscription() {
        let (store, rx) = MemoryStore::new();
        let sub = store.subscribe_value("x");
        drain(&rx);
        store.cancel("x");
        assert_eq!(store.subscription_count(), 0);
        assert!(matches!(
            drain(&rx).as_slice(),
            [StoreEvent::Cancelled { subscription, .. }] if *subscription == sub
        ));
    }
}
