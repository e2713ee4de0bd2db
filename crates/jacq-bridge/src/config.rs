//! 桥接配置（TOML）
//!
//! ```toml
//! loom_id = "7"
//! root = "looms/{id}/"
//!
//! [loom]
//! width = 360
//! frame_size = 120
//! # mask = "000…111…000"
//! # tabby_when_empty = false
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout_ms = 50
//! ```

use crate::error::BridgeError;
use jacq_driver::LoomBuilder;
use jacq_protocol::{DEFAULT_BAUD_RATE, DEFAULT_FRAME_SIZE, DEFAULT_WIDTH, LoomGeometry, Mask};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 根路径模板中的织机 id 占位符
pub const LOOM_ID_PLACEHOLDER: &str = "{id}";

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 织机 id，替换 `root` 中的 `{id}`
    pub loom_id: String,
    /// 存储中的根路径模板
    pub root: String,
    pub loom: LoomSection,
    pub serial: SerialSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            loom_id: "0".to_string(),
            root: format!("looms/{}/", LOOM_ID_PLACEHOLDER),
            loom: LoomSection::default(),
            serial: SerialSection::default(),
        }
    }
}

/// `[loom]` 段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomSection {
    pub width: usize,
    pub frame_size: usize,
    /// 发送掩码位串；缺省只放行中间子帧
    pub mask: Option<String>,
    /// 缓冲为空时以平纹纬应答取纬请求（无 UI 的试织模式）
    pub tabby_when_empty: bool,
}

impl Default for LoomSection {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            frame_size: DEFAULT_FRAME_SIZE,
            mask: None,
            tabby_when_empty: false,
        }
    }
}

/// `[serial]` 段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    /// 串口设备路径；端口发现不在本程序范围内
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: jacq_driver::DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, BridgeError> {
        let config: Self =
            toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 保存配置到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BridgeError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn to_toml_string(&self) -> Result<String, BridgeError> {
        toml::to_string(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// 检查几何与掩码
    pub fn validate(&self) -> Result<(), BridgeError> {
        let geometry = self.geometry()?;
        self.mask(&geometry)?;
        Ok(())
    }

    /// 展开后的根路径（以 `/` 结尾）
    pub fn root_path(&self) -> String {
        let root = self.root.replace(LOOM_ID_PLACEHOLDER, &self.loom_id);
        if root.is_empty() || root.ends_with('/') {
            root
        } else {
            format!("{}/", root)
        }
    }

    pub fn geometry(&self) -> Result<LoomGeometry, BridgeError> {
        Ok(LoomGeometry::new(self.loom.width, self.loom.frame_size)?)
    }

    pub fn mask(&self, geometry: &LoomGeometry) -> Result<Mask, BridgeError> {
        let Some(bits) = &self.loom.mask else {
            return Ok(Mask::middle_only(geometry));
        };
        let mask = Mask::from_bit_string(bits)?;
        if mask.len() != geometry.width() {
            return Err(BridgeError::Config(format!(
                "mask has {} bits, loom width is {}",
                mask.len(),
                geometry.width()
            )));
        }
        Ok(mask)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.read_timeout_ms)
    }

    /// 按配置准备驱动构造器
    pub fn loom_builder(&self) -> Result<LoomBuilder, BridgeError> {
        let geometry = self.geometry()?;
        let mut builder = LoomBuilder::new()
            .mask(self.mask(&geometry)?)
            .geometry(geometry)
            .baud_rate(self.serial.baud_rate)
            .read_timeout(self.read_timeout());
        if let Some(port) = &self.serial.port {
            builder = builder.port(port.clone());
        }
        Ok(builder)
    }
}
