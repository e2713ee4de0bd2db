//! RX 线程主循环
//!
//! RX 线程只负责读取串口并把原始数据块转发到入站通道，
//! 解析与状态变更都在事件线程中完成。

use crate::metrics::LoomMetrics;
use bytes::Bytes;
use crossbeam_channel::Sender;
use jacq_serial::{RxTransport, SerialError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, trace, warn};

/// RX 线程发往事件线程的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// 一段设备上报的数据
    Data(Bytes),
    /// 串口已失效，附带原因；之后不会再有消息
    Closed(String),
}

/// RX 线程主循环
///
/// 退出条件：
/// - `is_running` 被置为 false
/// - 入站通道的接收端被丢弃
/// - 串口返回致命错误（先发送 `Inbound::Closed`）
pub fn rx_loop(
    mut rx: impl RxTransport,
    inbound: Sender<Inbound>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<LoomMetrics>,
) {
    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        match rx.receive() {
            Ok(data) => {
                if data.is_empty() {
                    continue;
                }
                metrics.rx_chunks.fetch_add(1, Ordering::Relaxed);
                metrics
                    .rx_bytes
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                trace!("RX: {}", hex::encode(&data));
                if inbound.send(Inbound::Data(data)).is_err() {
                    trace!("RX thread: inbound receiver dropped, exiting");
                    break;
                }
            },
            Err(SerialError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) if e.is_fatal() => {
                metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                error!("RX thread: fatal serial error: {}", e);
                let _ = inbound.send(Inbound::Closed(e.to_string()));
                is_running.store(false, Ordering::Release);
                break;
            },
            Err(e) => {
                metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                warn!("RX thread: serial error: {}", e);
            },
        }
    }
}
