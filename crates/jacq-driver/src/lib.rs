//! # Jacq Driver
//!
//! 织机驱动层：IO 线程管理、纬编码与设备状态解析。
//!
//! ## 模块
//!
//! - `loom`: 编解码器（独占串口写入端）
//! - `pipeline`: RX 线程主循环
//! - `driver`: `LoomDriver`（`Loom` + RX 线程生命周期）
//! - `builder`: 链式构造
//! - `metrics`: 原子计数指标
//!
//! ## 线程模型
//!
//! RX 线程只转发原始数据块；解析、发送与状态变更都发生在持有
//! `LoomDriver` 的事件线程中，每条消息处理完毕后才处理下一条。

mod builder;
mod driver;
pub mod error;
mod loom;
mod metrics;
pub mod pipeline;

pub use builder::{DEFAULT_READ_TIMEOUT, LoomBuilder};
pub use driver::LoomDriver;
pub use error::DriverError;
pub use loom::{Loom, LoomEvent};
pub use metrics::{LoomMetrics, MetricsSnapshot};
pub use pipeline::Inbound;
