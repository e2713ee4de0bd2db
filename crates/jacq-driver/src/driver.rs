//! 织机驱动：`Loom` + RX 线程
//!
//! 串口拆分为读写两端：写入端交给 `Loom`（事件线程独占），
//! 读取端交给后台 RX 线程，数据块经 [`Inbound`] 通道送回事件线程。

use crate::error::DriverError;
use crate::loom::{Loom, LoomEvent};
use crate::metrics::LoomMetrics;
use crate::pipeline::{Inbound, rx_loop};
use crossbeam_channel::{Receiver, unbounded};
use jacq_protocol::{LoomGeometry, Mask};
use jacq_serial::{SplittableTransport, TxTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info, warn};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError> {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        // Watchdog joins the target; if we time out it is left to finish on its own
        spawn(move || {
            let _ = done_tx.send(self.join().is_ok());
        });

        match done_rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriverError::IoThread("RX thread panicked".to_string())),
            Err(_) => Err(DriverError::IoThread(format!(
                "RX thread did not exit within {:?}",
                timeout
            ))),
        }
    }
}

/// 织机驱动
///
/// 丢弃时停止 RX 线程并等待其退出。
pub struct LoomDriver<T: TxTransport> {
    loom: Loom<T>,
    inbound: Receiver<Inbound>,
    rx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<LoomMetrics>,
}

impl<T: TxTransport> LoomDriver<T> {
    /// 拆分串口并启动 RX 线程
    pub fn start<S>(transport: S, geometry: LoomGeometry, mask: Mask) -> Result<Self, DriverError>
    where
        S: SplittableTransport<Tx = T>,
        S::Rx: Send + 'static,
    {
        let (rx, tx) = transport.split()?;
        let metrics = Arc::new(LoomMetrics::new());
        let loom = Loom::new(tx, geometry, mask)?.with_metrics(metrics.clone());

        let (inbound_tx, inbound_rx) = unbounded();
        let is_running = Arc::new(AtomicBool::new(true));

        let rx_running = is_running.clone();
        let rx_metrics = metrics.clone();
        let rx_thread = std::thread::Builder::new()
            .name("jacq-rx".to_string())
            .spawn(move || rx_loop(rx, inbound_tx, rx_running, rx_metrics))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        info!(
            "Loom driver started (width {}, frame size {})",
            geometry.width(),
            geometry.frame_size()
        );

        Ok(Self {
            loom,
            inbound: inbound_rx,
            rx_thread: Some(rx_thread),
            is_running,
            metrics,
        })
    }

    pub fn loom(&self) -> &Loom<T> {
        &self.loom
    }

    pub fn loom_mut(&mut self) -> &mut Loom<T> {
        &mut self.loom
    }

    /// 入站数据通道（供 `select!` 使用）
    pub fn inbound(&self) -> &Receiver<Inbound> {
        &self.inbound
    }

    /// RX 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &Arc<LoomMetrics> {
        &self.metrics
    }

    /// 阻塞等待下一个设备事件（不经过事件循环时使用，如诊断工具）
    ///
    /// 未识别的数据与 0x62 在内部处理后继续等待。
    pub fn wait_event(&mut self, timeout: Duration) -> Result<Option<LoomEvent>, DriverError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.inbound.recv_timeout(remaining) {
                Ok(Inbound::Data(data)) => {
                    if let Some(event) = self.loom.parse_command(&data)? {
                        return Ok(Some(event));
                    }
                },
                Ok(Inbound::Closed(reason)) => {
                    warn!("Serial link closed: {}", reason);
                    return Err(DriverError::ChannelClosed);
                },
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(None),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(DriverError::ChannelClosed);
                },
            }
        }
    }
}

impl<T: TxTransport> Drop for LoomDriver<T> {
    fn drop(&mut self) {
        // Release: cleanup writes must be visible to the RX thread
        self.is_running.store(false, Ordering::Release);

        if let Err(e) = self.loom.close() {
            warn!("Failed to close serial writer: {}", e);
        }

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.rx_thread.take()
            && let Err(e) = handle.join_timeout(join_timeout)
        {
            error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jacq_serial::MockTransport;

    #[test]
    fn test_driver_round_trip() {
        let (transport, handle) = MockTransport::new();
        let geometry = LoomGeometry::default();
        let mut driver =
            LoomDriver::start(transport, geometry, Mask::middle_only(&geometry)).unwrap();

        driver.loom_mut().initialize().unwrap();
        assert_eq!(handle.take_sent(), vec![vec![0xC3]]);

        handle.inject(&[0x62]);
        handle.inject(&[0xC3]);
        let event = driver.wait_event(Duration::from_secs(1)).unwrap();
        assert_eq!(event, Some(LoomEvent::Ack(true)));
        assert_eq!(handle.take_sent(), vec![vec![0xC1]]);
    }

    #[test]
    fn test_wait_event_times_out() {
        let (transport, _handle) = MockTransport::new();
        let geometry = LoomGeometry::default();
        let mut driver =
            LoomDriver::start(transport, geometry, Mask::pass_all(geometry.width())).unwrap();
        assert_eq!(driver.wait_event(Duration::from_millis(20)).unwrap(), None);
    }

    #[test]
    fn test_disconnect_surfaces_as_closed() {
        let (transport, handle) = MockTransport::new();
        let geometry = LoomGeometry::default();
        let mut driver =
            LoomDriver::start(transport, geometry, Mask::pass_all(geometry.width())).unwrap();
        handle.disconnect();
        let result = driver.wait_event(Duration::from_secs(1));
        assert!(matches!(result, Err(DriverError::ChannelClosed)));
        assert!(!driver.is_running());
    }

    #[test]
    fn test_drop_stops_rx_thread() {
        let (transport, _handle) = MockTransport::new();
        let geometry = LoomGeometry::default();
        let driver =
            LoomDriver::start(transport, geometry, Mask::pass_all(geometry.width())).unwrap();
        let running = driver.is_running.clone();
        drop(driver);
        assert!(!running.load(Ordering::Acquire));
    }
}
