//! Builder 模式实现
//!
//! 提供链式构造 `LoomDriver` 实例的便捷方式。

use crate::driver::LoomDriver;
use crate::error::DriverError;
use jacq_protocol::{DEFAULT_BAUD_RATE, LoomGeometry, Mask};
use jacq_serial::{SerialTransport, SplittableTransport};
use std::time::Duration;

/// 默认读取超时（RX 线程借此检查退出标志）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Loom Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use jacq_driver::LoomBuilder;
///
/// let driver = LoomBuilder::new()
///     .port("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoomBuilder {
    /// 串口设备路径（如 `/dev/ttyUSB0`、`COM3`）
    port: Option<String>,
    /// 波特率（默认 115200）
    baud_rate: Option<u32>,
    read_timeout: Option<Duration>,
    /// 织机几何（默认 360 / 120）
    geometry: Option<LoomGeometry>,
    /// 发送掩码（默认只放行中间子帧）
    mask: Option<Mask>,
}

impl LoomBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn geometry(mut self, geometry: LoomGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    fn resolved_geometry(&self) -> LoomGeometry {
        self.geometry.unwrap_or_default()
    }

    fn resolved_mask(&self, geometry: &LoomGeometry) -> Mask {
        self.mask
            .clone()
            .unwrap_or_else(|| Mask::middle_only(geometry))
    }

    /// 打开配置的串口并启动驱动
    ///
    /// # Errors
    /// - `DriverError::InvalidInput`: 未设置串口路径，或掩码长度不符
    /// - `DriverError::Serial`: 串口打开失败
    #[cfg(feature = "serialport")]
    pub fn build(self) -> Result<LoomDriver<jacq_serial::SerialPortTx>, DriverError> {
        let port = self
            .port
            .as_deref()
            .ok_or_else(|| DriverError::InvalidInput("serial port not set".to_string()))?;
        let transport = jacq_serial::SerialPortTransport::open(
            port,
            self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
        )?;
        self.build_with(transport)
    }

    /// 使用已打开的串口启动驱动（测试中传入 `MockTransport`）
    pub fn build_with<S>(self, mut transport: S) -> Result<LoomDriver<S::Tx>, DriverError>
    where
        S: SplittableTransport,
        S::Rx: Send + 'static,
    {
        transport.set_receive_timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT));
        let geometry = self.resolved_geometry();
        let mask = self.resolved_mask(&geometry);
        LoomDriver::start(transport, geometry, mask)
    }
}
