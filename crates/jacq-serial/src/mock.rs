//! Mock 串口（无硬件依赖）
//!
//! 测试通过 [`MockHandle`] 注入设备上报的数据、检查已发送的字节、模拟断线。

use crate::{
    RxTransport, SerialDeviceError, SerialDeviceErrorKind, SerialError, SerialTransport,
    SplittableTransport, TxTransport,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    inbound: VecDeque<Bytes>,
    sent: Vec<Vec<u8>>,
    disconnected: bool,
    fail_writes: bool,
}

/// 测试侧句柄
#[derive(Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// 模拟设备上报一段数据
    pub fn inject(&self, bytes: &[u8]) {
        self.state
            .lock()
            .inbound
            .push_back(Bytes::copy_from_slice(bytes));
    }

    /// 已发送的每次写入
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// 取出并清空已发送记录
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// 模拟拔线：读端返回致命错误，写端失败
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}

fn unplugged() -> SerialError {
    SerialError::Device(SerialDeviceError::new(
        SerialDeviceErrorKind::NoDevice,
        "mock device disconnected",
    ))
}

fn receive(state: &Mutex<MockState>, poll: Duration) -> Result<Bytes, SerialError> {
    {
        let mut state = state.lock();
        if state.disconnected {
            return Err(unplugged());
        }
        if let Some(bytes) = state.inbound.pop_front() {
            return Ok(bytes);
        }
    }
    std::thread::sleep(poll);
    Err(SerialError::Timeout)
}

fn send(state: &Mutex<MockState>, bytes: &[u8]) -> Result<(), SerialError> {
    let mut state = state.lock();
    if state.disconnected {
        return Err(unplugged());
    }
    if state.fail_writes {
        return Err(SerialError::Io(std::io::Error::from(
            std::io::ErrorKind::BrokenPipe,
        )));
    }
    state.sent.push(bytes.to_vec());
    Ok(())
}

/// Mock 串口（读写合一）
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    poll: Duration,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                state: handle.state.clone(),
                poll: Duration::from_millis(1),
            },
            handle,
        )
    }
}

impl RxTransport for MockTransport {
    fn receive(&mut self) -> Result<Bytes, SerialError> {
        receive(&self.state, self.poll)
    }
}

impl TxTransport for MockTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        send(&self.state, bytes)
    }
}

impl SerialTransport for MockTransport {
    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.poll = timeout;
    }
}

impl SplittableTransport for MockTransport {
    type Rx = MockRx;
    type Tx = MockTx;

    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError> {
        Ok((
            MockRx {
                state: self.state.clone(),
                poll: self.poll,
            },
            MockTx { state: self.state },
        ))
    }
}

pub struct MockRx {
    state: Arc<Mutex<MockState>>,
    poll: Duration,
}

impl RxTransport for MockRx {
    fn receive(&mut self) -> Result<Bytes, SerialError> {
        receive(&self.state, self.poll)
    }
}

pub struct MockTx {
    state: Arc<Mutex<MockState>>,
}

impl TxTransport for MockTx {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        send(&self.state, bytes)
    }
}
