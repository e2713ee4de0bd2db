//! 织机编解码器
//!
//! `Loom` 独占串口写入端：负责发送初始化/结束指令与纬数据，
//! 并把设备上报的状态字节解析为 [`LoomEvent`]。

use crate::error::DriverError;
use crate::metrics::LoomMetrics;
use bytes::Bytes;
use jacq_protocol::{DeviceStatus, HostCommand, LoomGeometry, Mask, Pick, encode_pick};
use jacq_serial::TxTransport;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

/// 设备事件（由 `parse_command` 产生）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoomEvent {
    /// 设备确认连接（0xC3）
    Ack(bool),
    /// 设备请求下一纬（0x61 / 0x63）
    PickRequest,
}

/// 织机编解码器
pub struct Loom<T: TxTransport> {
    tx: T,
    geometry: LoomGeometry,
    mask: Mask,
    /// 平纹状态，每次 `tabby()` 取反
    heddles: Pick,
    /// 下一次发送的纬号，从 1 开始
    pick_number: u64,
    metrics: Arc<LoomMetrics>,
}

impl<T: TxTransport> Loom<T> {
    /// 创建编解码器
    ///
    /// 掩码长度必须等于织机宽度。
    pub fn new(tx: T, geometry: LoomGeometry, mask: Mask) -> Result<Self, DriverError> {
        if mask.len() != geometry.width() {
            return Err(DriverError::InvalidInput(format!(
                "mask length {} does not match loom width {}",
                mask.len(),
                geometry.width()
            )));
        }
        Ok(Self {
            tx,
            heddles: Pick::tabby(geometry.width()),
            geometry,
            mask,
            pick_number: 1,
            metrics: Arc::new(LoomMetrics::new()),
        })
    }

    /// 与 RX 线程共享同一组指标
    pub(crate) fn with_metrics(mut self, metrics: Arc<LoomMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn geometry(&self) -> &LoomGeometry {
        &self.geometry
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// 下一次发送将使用的纬号
    pub fn pick_number(&self) -> u64 {
        self.pick_number
    }

    pub fn metrics(&self) -> &Arc<LoomMetrics> {
        &self.metrics
    }

    /// 发送初始化指令（0xC3）
    pub fn initialize(&mut self) -> Result<(), DriverError> {
        debug!("Sending initialize to loom");
        self.send_command(HostCommand::Initialize)
    }

    /// 发送结束指令（0xC1）
    pub fn end(&mut self) -> Result<(), DriverError> {
        debug!("Sending end to loom");
        self.send_command(HostCommand::End)
    }

    /// 编码一纬（不发送）
    pub fn pick_to_bytes(&self, pick: &Pick) -> Result<Bytes, DriverError> {
        Ok(encode_pick(pick, &self.mask, &self.geometry)?)
    }

    /// 编码并发送一纬
    ///
    /// 成功时返回本次发送的纬号；写入失败时纬号不变。
    pub fn send_pick(&mut self, pick: &Pick) -> Result<u64, DriverError> {
        let frame = self.pick_to_bytes(pick)?;
        trace!("Pick {} frame: {}", self.pick_number, hex::encode(&frame));
        self.write(&frame)?;

        let sent = self.pick_number;
        self.pick_number += 1;
        self.metrics.picks_sent.fetch_add(1, Ordering::Relaxed);
        debug!("Sent pick {} ({} heddles raised)", sent, pick.raised());
        Ok(sent)
    }

    /// 下一个平纹纬（每次调用取反）
    pub fn tabby(&mut self) -> Pick {
        self.heddles = self.heddles.inverted();
        self.heddles.clone()
    }

    /// 解析设备上报的数据
    ///
    /// 只看首字节：
    /// - 0xC3 → `Ack(true)`
    /// - 0x61 / 0x63 → `PickRequest`
    /// - 0x62 → 回写 0xC1，无事件
    /// - 其他 → 记录日志，无事件
    pub fn parse_command(&mut self, data: &[u8]) -> Result<Option<LoomEvent>, DriverError> {
        let Some(status) = DeviceStatus::classify(data) else {
            return Ok(None);
        };
        match status {
            DeviceStatus::Ack => Ok(Some(LoomEvent::Ack(true))),
            DeviceStatus::PickRequest => Ok(Some(LoomEvent::PickRequest)),
            DeviceStatus::MidCycle => {
                trace!("Mid-cycle status, advancing");
                self.metrics
                    .mid_cycle_advances
                    .fetch_add(1, Ordering::Relaxed);
                self.send_command(HostCommand::Advance)?;
                Ok(None)
            },
            DeviceStatus::Unknown(byte) => {
                self.metrics.unknown_commands.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Unrecognized loom command 0x{:02X} (data: {})",
                    byte,
                    hex::encode(data)
                );
                Ok(None)
            },
        }
    }

    /// 关闭写入端
    pub fn close(&mut self) -> Result<(), DriverError> {
        Ok(self.tx.close()?)
    }

    fn send_command(&mut self, command: HostCommand) -> Result<(), DriverError> {
        self.write(&[command.as_byte()])
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), DriverError> {
        match self.tx.send(bytes) {
            Ok(()) => {
                self.metrics
                    .tx_bytes
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(())
            },
            Err(e) => {
                self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            },
        }
    }
}
