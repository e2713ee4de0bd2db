//! 织造握手状态机
//!
//! 远端的开始/停止与纬数据驱动织机编解码器，设备的确认与取纬请求
//! 反过来决定何时发送下一纬，并通过写入节点把状态报告回存储。
//!
//! ```text
//! Idle/Stopped ──start──▶ Initializing ──ack──▶ ActiveWaitingFirstPick
//!                                                   │ pick-request
//!                                                   ▼
//!            Stopped ◀──stop── (任意活动状态)   ActiveSteadyState
//! ```
//!
//! 所有处理都在同一个事件线程中逐条完成。串口失效会结束会话，不重连。

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::pick_buffer::PickBuffer;
use crate::schema::{LoomStatus, NodeId, StatusEvent};
use crossbeam_channel::{Receiver, select};
use jacq_driver::{DriverError, Inbound, LoomDriver, LoomEvent};
use jacq_protocol::Pick;
use jacq_remote::{
    CollectionEvent, NodeEvent, RemoteNode, RemoteStore, RemoteValue, StoreEvent, Writable, Writer,
};
use jacq_serial::{SplittableTransport, TxTransport};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// 织造会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// 已发送初始化，等待设备确认
    Initializing,
    ActiveWaitingFirstPick,
    ActiveSteadyState,
    Stopped,
}

impl SessionState {
    /// 已发送初始化且尚未结束
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Initializing
                | SessionState::ActiveWaitingFirstPick
                | SessionState::ActiveSteadyState
        )
    }
}

/// 写入布尔状态；失败会以 `Set(false)` 事件送回
fn report(node: &mut Writer, value: bool) {
    if let Err(e) = node.set_val(value.into()) {
        warn!("Failed to write {}: {}", node.path(), e);
    }
}

/// 织造协调器
pub struct WeavingCoordinator<T: TxTransport> {
    driver: LoomDriver<T>,
    status: LoomStatus,
    buffer: PickBuffer,
    state: SessionState,
    /// 设备已请求下一纬但缓冲区为空
    device_ready: bool,
    /// 远端报告的总纬数（仅用于进度日志）
    num_picks: Option<u64>,
    /// 缓冲为空时发送平纹纬
    tabby_fallback: bool,
}

impl<T: TxTransport> WeavingCoordinator<T> {
    pub fn new(driver: LoomDriver<T>, status: LoomStatus) -> Self {
        Self {
            driver,
            status,
            buffer: PickBuffer::new(),
            state: SessionState::Idle,
            device_ready: false,
            num_picks: None,
            tabby_fallback: false,
        }
    }

    /// 按配置在已打开的串口上启动驱动
    pub fn with_transport<S>(
        config: &BridgeConfig,
        store: Arc<dyn RemoteStore>,
        transport: S,
    ) -> Result<Self, BridgeError>
    where
        S: SplittableTransport<Tx = T>,
        S::Rx: Send + 'static,
    {
        let driver = config.loom_builder()?.build_with(transport)?;
        let status = LoomStatus::new(store, &config.root_path());
        let mut coordinator = Self::new(driver, status);
        coordinator.set_tabby_fallback(config.loom.tabby_when_empty);
        Ok(coordinator)
    }

    /// 缓冲为空时是否以平纹纬应答取纬请求
    pub fn set_tabby_fallback(&mut self, enabled: bool) {
        self.tabby_fallback = enabled;
    }

    pub fn tabby_fallback(&self) -> bool {
        self.tabby_fallback
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device_ready(&self) -> bool {
        self.device_ready
    }

    pub fn buffer(&self) -> &PickBuffer {
        &self.buffer
    }

    pub fn status(&self) -> &LoomStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut LoomStatus {
        &mut self.status
    }

    pub fn driver(&self) -> &LoomDriver<T> {
        &self.driver
    }

    /// 下一次发送的纬号
    pub fn pick_number(&self) -> u64 {
        self.driver.loom().pick_number()
    }

    pub fn num_picks(&self) -> Option<u64> {
        self.num_picks
    }

    /// 连接远端状态并报告串口在线
    pub fn attach(&mut self) {
        self.status.attach();
        report(&mut self.status.loom_online, true);
        info!("Loom bridge attached at {}", self.status.root());
    }

    /// 结束会话并断开远端状态
    pub fn shutdown(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to end weaving session: {}", e);
        }
        report(&mut self.status.loom_online, false);
        self.status.detach();
        info!("Loom bridge shut down");
    }

    /// 事件循环
    ///
    /// 返回 `Ok(())` 表示收到关闭信号（或关闭通道被丢弃）；串口失效返回
    /// `BridgeError::TransportClosed`，存储事件通道关闭返回 `BridgeError::StoreClosed`。
    pub fn run(
        &mut self,
        store_events: &Receiver<StoreEvent>,
        shutdown: &Receiver<()>,
    ) -> Result<(), BridgeError> {
        let inbound = self.driver.inbound().clone();
        info!("Weaving coordinator running");

        loop {
            select! {
                recv(inbound) -> msg => match msg {
                    Ok(Inbound::Data(data)) => self.handle_device_bytes(&data)?,
                    Ok(Inbound::Closed(reason)) => return Err(self.transport_failed(reason)),
                    Err(_) => {
                        return Err(self.transport_failed("RX thread exited".to_string()));
                    },
                },
                recv(store_events) -> msg => match msg {
                    Ok(event) => self.handle_store_event(&event)?,
                    Err(_) => {
                        error!("Remote event stream closed");
                        return Err(BridgeError::StoreClosed);
                    },
                },
                recv(shutdown) -> _ => {
                    self.shutdown();
                    return Ok(());
                },
            }
        }
    }

    /// 处理一条存储事件
    pub fn handle_store_event(&mut self, event: &StoreEvent) -> Result<(), BridgeError> {
        for status_event in self.status.handle(event) {
            self.on_status_event(status_event)?;
        }
        Ok(())
    }

    fn on_status_event(&mut self, event: StatusEvent) -> Result<(), BridgeError> {
        match event {
            StatusEvent::Node(NodeId::ActiveDraft, NodeEvent::Change(value)) => {
                if value.is_truthy() {
                    self.start()?;
                } else {
                    self.stop()?;
                }
            },
            StatusEvent::Node(NodeId::PickData, NodeEvent::Change(value))
            | StatusEvent::Node(NodeId::PickData, NodeEvent::Fetched(value)) => {
                self.on_pick_data(&value)?;
            },
            StatusEvent::Node(NodeId::NumPicks, NodeEvent::Change(value)) => {
                self.num_picks = value.as_u64();
                debug!("Draft has {:?} picks", self.num_picks);
            },
            StatusEvent::Node(NodeId::PedalsOnline, NodeEvent::Change(value)) => {
                if value.is_truthy() {
                    info!("Pedals online");
                } else {
                    info!("Pedals offline");
                }
            },
            StatusEvent::Node(id, NodeEvent::Set(false)) => {
                warn!("Status write {:?} failed", id);
            },
            StatusEvent::VirtualPedals(CollectionEvent::ChildChange { index, value, .. }) => {
                debug!("Virtual pedal {} -> {}", index, value);
            },
            StatusEvent::VirtualPedals(CollectionEvent::ChildAdded { index, .. }) => {
                debug!("Virtual pedal {} added", index);
            },
            StatusEvent::VirtualPedals(CollectionEvent::ChildRemoved { index, .. }) => {
                debug!("Virtual pedal {} removed", index);
            },
            StatusEvent::Pedals(CollectionEvent::ChildSet { index, ok: false }) => {
                warn!("Pedal state {} write failed", index);
            },
            other => trace!("status event: {:?}", other),
        }
        Ok(())
    }

    /// 开始织造：发送初始化并取出远端缓冲中的纬数据
    pub fn start(&mut self) -> Result<(), BridgeError> {
        if self.state.is_active() {
            debug!("Weaving already active ({:?})", self.state);
            return Ok(());
        }
        info!("Starting weaving session");
        let result = self.driver.loom_mut().initialize();
        self.check(result)?;

        self.state = SessionState::Initializing;
        self.device_ready = false;
        report(&mut self.status.vacuum_on, true);
        self.status.pick_data.read();
        Ok(())
    }

    /// 停止织造；未开始时无操作
    pub fn stop(&mut self) -> Result<(), BridgeError> {
        if !self.state.is_active() {
            return Ok(());
        }
        info!(
            "Stopping weaving session after {} picks",
            self.pick_number() - 1
        );
        let result = self.driver.loom_mut().end();
        self.check(result)?;

        self.state = SessionState::Stopped;
        self.device_ready = false;
        report(&mut self.status.vacuum_on, false);
        report(&mut self.status.loom_ready, false);
        Ok(())
    }

    /// 处理设备上报的一段数据
    pub fn handle_device_bytes(&mut self, data: &[u8]) -> Result<(), BridgeError> {
        let result = self.driver.loom_mut().parse_command(data);
        let Some(event) = self.check(result)? else {
            return Ok(());
        };

        match (event, self.state) {
            (LoomEvent::Ack(_), SessionState::Initializing) => {
                info!("Loom acknowledged, waiting for first pick request");
                self.state = SessionState::ActiveWaitingFirstPick;
            },
            (LoomEvent::PickRequest, SessionState::ActiveWaitingFirstPick) => {
                self.state = SessionState::ActiveSteadyState;
                self.on_pick_request()?;
            },
            (LoomEvent::PickRequest, SessionState::ActiveSteadyState) => {
                self.on_pick_request()?;
            },
            (event, state) => debug!("Ignoring {:?} in state {:?}", event, state),
        }
        Ok(())
    }

    /// 同步踏板状态数组，返回增删次数
    pub fn update_pedals(&mut self, states: &[bool]) -> Result<usize, BridgeError> {
        let values: Vec<RemoteValue> = states.iter().map(|&s| s.into()).collect();
        let kept = self.status.pedals.len().min(values.len());
        let ops = self.status.pedals.update_array(values.len(), &values);

        for (index, value) in values.iter().enumerate().take(kept) {
            let current = self.status.pedals.node_at(index).map(|node| node.value());
            if current != Some(value) {
                self.status.pedals.set_node(index, value.clone())?;
            }
        }
        Ok(ops)
    }

    fn on_pick_data(&mut self, value: &RemoteValue) -> Result<(), BridgeError> {
        let Some(bits) = value.as_str() else {
            warn!("Pick data is not a bit string: {}", value);
            return Ok(());
        };
        let pick = match Pick::from_bit_string(bits)
            .and_then(|pick| pick.check_width(self.driver.loom().geometry()).map(|_| pick))
        {
            Ok(pick) => pick,
            Err(e) => {
                warn!("Dropping pick data: {}", e);
                return Ok(());
            },
        };

        self.buffer.put(pick);
        if self.state.is_active() && self.device_ready {
            self.send_buffered()?;
        }
        Ok(())
    }

    fn on_pick_request(&mut self) -> Result<(), BridgeError> {
        if self.buffer.has_data() {
            self.send_buffered()
        } else if self.tabby_fallback {
            let pick = self.driver.loom_mut().tabby();
            debug!("No pick data, sending tabby");
            self.send(&pick)
        } else {
            debug!("Loom ready, waiting for pick data");
            self.device_ready = true;
            report(&mut self.status.loom_ready, true);
            Ok(())
        }
    }

    fn send_buffered(&mut self) -> Result<(), BridgeError> {
        match self.buffer.take() {
            Some(pick) => self.send(&pick),
            None => Ok(()),
        }
    }

    fn send(&mut self, pick: &Pick) -> Result<(), BridgeError> {
        let result = self.driver.loom_mut().send_pick(pick);
        let sent = self.check(result)?;

        match self.num_picks {
            Some(total) => info!("Sent pick {}/{}", sent, total),
            None => info!("Sent pick {}", sent),
        }
        self.device_ready = false;
        report(&mut self.status.loom_ready, false);
        Ok(())
    }

    /// 串口错误终止会话，其余驱动错误原样返回
    fn check<R>(&mut self, result: Result<R, DriverError>) -> Result<R, BridgeError> {
        match result {
            Ok(value) => Ok(value),
            Err(DriverError::Serial(e)) => Err(self.transport_failed(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn transport_failed(&mut self, reason: String) -> BridgeError {
        error!("Serial transport failed: {}", reason);
        self.state = SessionState::Stopped;
        self.device_ready = false;
        report(&mut self.status.loom_online, false);
        BridgeError::TransportClosed(reason)
    }
}

#[cfg(feature = "serialport")]
impl WeavingCoordinator<jacq_serial::SerialPortTx> {
    /// 打开配置中的串口
    pub fn connect(config: &BridgeConfig, store: Arc<dyn RemoteStore>) -> Result<Self, BridgeError> {
        let driver = config.loom_builder()?.build()?;
        let status = LoomStatus::new(store, &config.root_path());
        let mut coordinator = Self::new(driver, status);
        coordinator.set_tabby_fallback(config.loom.tabby_when_empty);
        Ok(coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Initializing.is_active());
        assert!(SessionState::ActiveWaitingFirstPick.is_active());
        assert!(SessionState::ActiveSteadyState.is_active());
        assert!(!SessionState::Stopped.is_active());
        assert_eq!(SessionState::default(), SessionState::Idle);
    }
}
