//! 单槽纬线缓冲
//!
//! 远端送来的纬线在设备请求之前暂存于此。新数据覆盖未消费的旧数据。

use jacq_protocol::Pick;
use tracing::warn;

#[derive(Debug, Default)]
pub struct PickBuffer {
    slot: Option<Pick>,
    overwrites: u64,
}

impl PickBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存入纬线；覆盖未消费的数据时记一次告警
    pub fn put(&mut self, pick: Pick) {
        if self.slot.is_some() {
            self.overwrites += 1;
            warn!("Pick data overwritten before it was sent to the loom");
        }
        self.slot = Some(pick);
    }

    pub fn take(&mut self) -> Option<Pick> {
        self.slot.take()
    }

    pub fn peek(&self) -> Option<&Pick> {
        self.slot.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.slot.is_some()
    }

    /// 被覆盖而未发送的纬线数
    pub fn overwrites(&self) -> u64 {
        self.overwrites
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_empties_slot() {
        let mut buffer = PickBuffer::new();
        assert!(buffer.take().is_none());

        buffer.put("0110".parse().unwrap());
        assert!(buffer.has_data());
        assert_eq!(buffer.take().unwrap().to_bit_string(), "0110");
        assert!(!buffer.has_data());
    }

    #[test]
    fn test_last_write_wins() {
        let mut buffer = PickBuffer::new();
        buffer.put("0001".parse().unwrap());
        buffer.put("1000".parse().unwrap());
        assert_eq!(buffer.overwrites(), 1);
        assert_eq!(buffer.peek().unwrap().to_bit_string(), "1000");

        buffer.take();
        buffer.put("1111".parse().unwrap());
        assert_eq!(buffer.overwrites(), 1);
    }
}
