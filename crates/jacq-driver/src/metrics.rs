//! 驱动性能指标模块
//!
//! 原子计数器，可以在 RX 线程与事件线程之间无锁共享。

use std::sync::atomic::{AtomicU64, Ordering};

/// 织机驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use jacq_driver::LoomMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LoomMetrics::new();
/// metrics.picks_sent.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().picks_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct LoomMetrics {
    /// 成功发送的纬数
    pub picks_sent: AtomicU64,

    /// 发送的总字节数（含单字节指令）
    pub tx_bytes: AtomicU64,

    /// 接收的数据块数
    pub rx_chunks: AtomicU64,

    /// 接收的总字节数
    pub rx_bytes: AtomicU64,

    /// 未识别的状态字节次数
    pub unknown_commands: AtomicU64,

    /// 开口中段（0x62）自动应答次数
    pub mid_cycle_advances: AtomicU64,

    /// 串口错误次数
    pub transport_errors: AtomicU64,

    /// RX 超时次数（正常现象，无数据时会超时）
    pub rx_timeouts: AtomicU64,
}

impl LoomMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            picks_sent: self.picks_sent.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_chunks: self.rx_chunks.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            mid_cycle_advances: self.mid_cycle_advances.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub picks_sent: u64,
    pub tx_bytes: u64,
    pub rx_chunks: u64,
    pub rx_bytes: u64,
    pub unknown_commands: u64,
    pub mid_cycle_advances: u64,
    pub transport_errors: u64,
    pub rx_timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = LoomMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_concurrent_increment() {
        let metrics = Arc::new(LoomMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.rx_chunks.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().rx_chunks, 400);
    }
}
