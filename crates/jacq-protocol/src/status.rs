//! 设备状态字节与主机指令
//!
//! 设备上报的数据只看第一个字节进行分发。

use crate::{
    CMD_END, CMD_INITIALIZE, STATUS_ACK, STATUS_MID_CYCLE, STATUS_PICK_REQUEST,
    STATUS_PICK_REQUEST_ALT,
};

/// 设备状态（按首字节分类）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// 0xC3：连接/就绪确认
    Ack,
    /// 0x61 / 0x63：请求下一纬
    PickRequest,
    /// 0x62：开口中段，主机需回复 0xC1
    MidCycle,
    /// 未识别的首字节
    Unknown(u8),
}

impl DeviceStatus {
    /// 按入站数据的首字节分类；空数据返回 `None`
    pub fn classify(data: &[u8]) -> Option<Self> {
        data.first().map(|&byte| Self::from(byte))
    }
}

impl From<u8> for DeviceStatus {
    fn from(byte: u8) -> Self {
        match byte {
            STATUS_ACK => DeviceStatus::Ack,
            STATUS_PICK_REQUEST | STATUS_PICK_REQUEST_ALT => DeviceStatus::PickRequest,
            STATUS_MID_CYCLE => DeviceStatus::MidCycle,
            other => DeviceStatus::Unknown(other),
        }
    }
}

/// 主机 -> 设备 单字节指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// 0xC3：初始化
    Initialize,
    /// 0xC1：结束织造
    End,
    /// 0xC1：开口中段推进（与 `End` 同一字节）
    Advance,
}

impl HostCommand {
    pub fn as_byte(self) -> u8 {
        match self {
            HostCommand::Initialize => CMD_INITIALIZE,
            HostCommand::End | HostCommand::Advance => CMD_END,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_first_byte() {
        assert_eq!(DeviceStatus::classify(&[0xC3]), Some(DeviceStatus::Ack));
        assert_eq!(
            DeviceStatus::classify(&[0x61, 0xFF]),
            Some(DeviceStatus::PickRequest)
        );
        assert_eq!(
            DeviceStatus::classify(&[0x63]),
            Some(DeviceStatus::PickRequest)
        );
        assert_eq!(
            DeviceStatus::classify(&[0x62, 0x61]),
            Some(DeviceStatus::MidCycle)
        );
        assert_eq!(
            DeviceStatus::classify(&[0x10]),
            Some(DeviceStatus::Unknown(0x10))
        );
        assert_eq!(DeviceStatus::classify(&[]), None);
    }

    #[test]
    fn test_host_command_bytes() {
        assert_eq!(HostCommand::Initialize.as_byte(), 0xC3);
        assert_eq!(HostCommand::End.as_byte(), 0xC1);
        assert_eq!(HostCommand::Advance.as_byte(), 0xC1);
    }
}
