//! # Jacq Remote
//!
//! 远端实时键值存储的镜像原语。存储是织机、踏板设备与控制界面之间的
//! 协调总线；本 crate 把其中的路径和子节点集合映射为本地、事件驱动的句柄。
//!
//! ## 模块
//!
//! - `store`: `RemoteStore` 接口与 `StoreEvent`
//! - `memory`: 进程内实现（feature `mock`，测试与离线演示）
//! - `node`: `Listener` / `Writer` / `TwoWay` / `OnlineStatus` / `ReadOnceBuffer`
//! - `collection`: `WriterCollection` / `TwoWayCollection`
//!
//! ## 事件模型
//!
//! 存储操作立即返回，完成与通知以 [`StoreEvent`] 送到事件线程。
//! 事件线程把每条消息交给各节点的 `handle()`，逐条处理完毕，不阻塞。

pub mod collection;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod node;
pub mod store;
pub mod value;

pub use collection::{CollectionEvent, CollectionEvents, TwoWayCollection, WriterCollection};
pub use error::RemoteError;
#[cfg(any(test, feature = "mock"))]
pub use memory::{MemoryStore, StoreOp};
pub use node::{
    Link, Listener, NodeEvent, NodeEvents, NodeVariant, OnlineStatus, ReadOnceBuffer, RemoteNode,
    Role, Seed, TwoWay, Writable, Writer,
};
pub use store::{ChildChange, RemoteStore, RequestId, StoreEvent, SubscriptionId, join_path};
pub use value::RemoteValue;
