//! # Jacq Protocol
//!
//! Jacq3G 提花织机串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议字节常量
//! - `frame`: 织机几何、掩码与综框向量（pick）
//! - `codec`: 7-bit 打包与整帧编码/解码
//! - `status`: 设备状态字节解析、主机指令
//!
//! ## 帧格式
//!
//! ```text
//! 0x80 <sub0> 0xC0 0x81 <sub1> 0xC0 0x82 <sub2> 0xC0
//! ```
//!
//! 每个子帧按 7 位一字节打包，高位在前，最高位恒为 0。

pub mod codec;
pub mod constants;
pub mod frame;
pub mod status;

// 重新导出常用类型
pub use codec::*;
pub use constants::*;
pub use frame::*;
pub use status::*;

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid pick length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid loom geometry: width {width} is not 3 x frame size {frame_size}")]
    InvalidGeometry { width: usize, frame_size: usize },

    #[error("Invalid heddle character {found:?} at position {position}")]
    InvalidBit { position: usize, found: char },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
