//! 协议常量定义

/// 子帧起始标记（依次对应子帧 0/1/2）
pub const SUBFRAME_START: [u8; SUBFRAME_COUNT] = [0x80, 0x81, 0x82];

/// 子帧结束标记
pub const SUBFRAME_END: u8 = 0xC0;

/// 每帧子帧数量
pub const SUBFRAME_COUNT: usize = 3;

/// 每个输出字节携带的数据位数（最高位恒为 0）
pub const DATA_BITS_PER_BYTE: usize = 7;

// ============================================================================
// 主机 -> 设备 指令
// ============================================================================

/// 初始化 / 连接确认请求
pub const CMD_INITIALIZE: u8 = 0xC3;

/// 结束织造；同时用作开口中段的推进应答
pub const CMD_END: u8 = 0xC1;

// ============================================================================
// 设备 -> 主机 状态
// ============================================================================

/// 设备应答（连接/就绪确认）
pub const STATUS_ACK: u8 = 0xC3;

/// 请求下一纬（两种变体）
pub const STATUS_PICK_REQUEST: u8 = 0x61;
pub const STATUS_PICK_REQUEST_ALT: u8 = 0x63;

/// 开口中段，需要主机回复 `CMD_END`
pub const STATUS_MID_CYCLE: u8 = 0x62;

// ============================================================================
// 默认配置
// ============================================================================

/// 默认织机宽度（综框数）
pub const DEFAULT_WIDTH: usize = 360;

/// 默认子帧大小
pub const DEFAULT_FRAME_SIZE: usize = 120;

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
