//! 基于 `serialport` 的真实串口后端

use crate::{
    RxTransport, SerialDeviceError, SerialDeviceErrorKind, SerialError, SerialTransport,
    SplittableTransport, TxTransport,
};
use bytes::Bytes;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// 单次读取的缓冲区大小（设备状态帧通常只有 1 字节）
const READ_CHUNK: usize = 64;

fn map_serialport_error(e: serialport::Error) -> SerialError {
    match e.kind {
        serialport::ErrorKind::NoDevice => SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::NoDevice,
            e.description,
        )),
        serialport::ErrorKind::InvalidInput => SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::InvalidConfig,
            e.description,
        )),
        serialport::ErrorKind::Unknown => SerialError::Device(SerialDeviceError::new(
            SerialDeviceErrorKind::Backend,
            e.description,
        )),
        serialport::ErrorKind::Io(kind) => {
            SerialError::Io(std::io::Error::new(kind, e.description))
        },
    }
}

fn read_chunk(port: &mut Box<dyn SerialPort>, buf: &mut [u8]) -> Result<Bytes, SerialError> {
    match port.read(buf) {
        Ok(0) => Err(SerialError::Timeout),
        Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
        Err(e) if e.kind() == ErrorKind::TimedOut => Err(SerialError::Timeout),
        Err(e) => Err(SerialError::Io(e)),
    }
}

fn write_all(port: &mut Box<dyn SerialPort>, bytes: &[u8]) -> Result<(), SerialError> {
    port.write_all(bytes)?;
    port.flush()?;
    Ok(())
}

/// 串口（读写合一）
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    path: String,
    buf: [u8; READ_CHUNK],
}

impl SerialPortTransport {
    /// 打开串口
    ///
    /// # 参数
    /// - `path`: 设备路径（如 `/dev/ttyUSB0`、`COM3`）
    /// - `baud_rate`: 波特率（Jacq3G 为 115200）
    /// - `timeout`: 读取超时
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(map_serialport_error)?;
        info!("Serial port {} opened at {} baud", path, baud_rate);
        Ok(Self {
            port,
            path: path.to_string(),
            buf: [0; READ_CHUNK],
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RxTransport for SerialPortTransport {
    fn receive(&mut self) -> Result<Bytes, SerialError> {
        read_chunk(&mut self.port, &mut self.buf)
    }
}

impl TxTransport for SerialPortTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_all(&mut self.port, bytes)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.port.flush()?;
        Ok(())
    }
}

impl SerialTransport for SerialPortTransport {
    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.port.set_timeout(timeout) {
            debug!("Failed to set serial timeout on {}: {}", self.path, e);
        }
    }
}

impl SplittableTransport for SerialPortTransport {
    type Rx = SerialPortRx;
    type Tx = SerialPortTx;

    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError> {
        let reader = self.port.try_clone().map_err(map_serialport_error)?;
        Ok((
            SerialPortRx {
                port: reader,
                buf: [0; READ_CHUNK],
            },
            SerialPortTx {
                port: self.port,
                path: self.path,
            },
        ))
    }
}

/// 串口读取端（RX 线程持有）
pub struct SerialPortRx {
    port: Box<dyn SerialPort>,
    buf: [u8; READ_CHUNK],
}

impl RxTransport for SerialPortRx {
    fn receive(&mut self) -> Result<Bytes, SerialError> {
        read_chunk(&mut self.port, &mut self.buf)
    }
}

/// 串口写入端（`Loom` 独占）
pub struct SerialPortTx {
    port: Box<dyn SerialPort>,
    path: String,
}

impl TxTransport for SerialPortTx {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_all(&mut self.port, bytes)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        debug!("Closing serial writer on {}", self.path);
        self.port.flush()?;
        Ok(())
    }
}
