//! # Jacq Bridge
//!
//! 织机与远端协调存储之间的桥接层。
//!
//! ## 模块
//!
//! - `config`: TOML 配置（织机 id、根路径、几何、掩码、串口）
//! - `schema`: 存储中的状态布局（[`LoomStatus`]）
//! - `pick_buffer`: 单槽纬线缓冲
//! - `coordinator`: 握手状态机与事件循环（[`WeavingCoordinator`]）
//! - `logging`: `tracing-subscriber` 初始化
//!
//! ## 使用示例
//!
//! ```no_run
//! use jacq_bridge::{BridgeConfig, WeavingCoordinator, init_logger};
//! use jacq_remote::MemoryStore;
//!
//! # fn main() -> Result<(), jacq_bridge::BridgeError> {
//! init_logger();
//! let config = BridgeConfig::load("bridge.toml")?;
//! let (store, events) = MemoryStore::new();
//! let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
//!
//! let mut coordinator = WeavingCoordinator::connect(&config, store)?;
//! coordinator.attach();
//! coordinator.run(&events, &stop_rx)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod pick_buffer;
pub mod schema;

pub use config::{BridgeConfig, LoomSection, SerialSection};
pub use coordinator::{SessionState, WeavingCoordinator};
pub use error::BridgeError;
pub use logging::init_logger;
pub use pick_buffer::PickBuffer;
pub use schema::{LoomStatus, NodeId, StatusEvent};
