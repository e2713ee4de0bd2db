//! 织机几何、掩码与综框向量
//!
//! 一纬（pick）是长度等于织机宽度的布尔向量，每个元素对应一根经线的综框状态。
//! 发送前与掩码逐位相与，再拆成三个等长子帧。

use crate::{DEFAULT_FRAME_SIZE, DEFAULT_WIDTH, DATA_BITS_PER_BYTE, ProtocolError, SUBFRAME_COUNT};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// 织机几何：总宽度与子帧大小
///
/// 不变量：`width == frame_size * 3`，且 `frame_size > 0`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoomGeometry {
    width: usize,
    frame_size: usize,
}

impl LoomGeometry {
    /// 创建织机几何（校验宽度与子帧大小的关系）
    pub fn new(width: usize, frame_size: usize) -> Result<Self, ProtocolError> {
        if frame_size == 0 || frame_size.checked_mul(SUBFRAME_COUNT) != Some(width) {
            return Err(ProtocolError::InvalidGeometry { width, frame_size });
        }
        Ok(Self { width, frame_size })
    }

    /// 织机宽度（综框总数）
    pub fn width(&self) -> usize {
        self.width
    }

    /// 子帧大小
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// 第 `index` 个子帧在综框向量中的范围
    pub fn subframe_range(&self, index: usize) -> Range<usize> {
        let start = index * self.frame_size;
        start..start + self.frame_size
    }

    /// 单个子帧打包后的字节数（向上取整到 7 位）
    pub fn packed_subframe_len(&self) -> usize {
        self.frame_size.div_ceil(DATA_BITS_PER_BYTE)
    }

    /// 整帧编码后的字节数（含起止标记）
    pub fn encoded_len(&self) -> usize {
        SUBFRAME_COUNT * (self.packed_subframe_len() + 2)
    }
}

impl Default for LoomGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

/// 解析 `"0101…"` 形式的位串
fn parse_bits(s: &str) -> Result<Vec<bool>, ProtocolError> {
    s.chars()
        .enumerate()
        .map(|(position, c)| match c {
            '1' => Ok(true),
            '0' => Ok(false),
            found => Err(ProtocolError::InvalidBit { position, found }),
        })
        .collect()
}

fn format_bits(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// 一纬的综框状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pick {
    heddles: Vec<bool>,
}

impl Pick {
    pub fn new(heddles: Vec<bool>) -> Self {
        Self { heddles }
    }

    /// 全部放下的空纬
    pub fn blank(width: usize) -> Self {
        Self {
            heddles: vec![false; width],
        }
    }

    /// 平纹（tabby）：奇偶交替提起
    pub fn tabby(width: usize) -> Self {
        Self {
            heddles: (0..width).map(|i| i % 2 == 0).collect(),
        }
    }

    /// 从 `"0101…"` 位串解析（远端存储中 pick 数据的格式）
    pub fn from_bit_string(s: &str) -> Result<Self, ProtocolError> {
        parse_bits(s.trim()).map(Self::new)
    }

    pub fn to_bit_string(&self) -> String {
        format_bits(&self.heddles)
    }

    /// 取反（平纹的下一纬）
    pub fn inverted(&self) -> Self {
        Self {
            heddles: self.heddles.iter().map(|h| !h).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.heddles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heddles.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.heddles
    }

    /// 被提起的综框数量
    pub fn raised(&self) -> usize {
        self.heddles.iter().filter(|&&h| h).count()
    }

    /// 校验长度是否等于织机宽度
    pub fn check_width(&self, geometry: &LoomGeometry) -> Result<(), ProtocolError> {
        if self.heddles.len() != geometry.width() {
            return Err(ProtocolError::InvalidLength {
                expected: geometry.width(),
                actual: self.heddles.len(),
            });
        }
        Ok(())
    }
}

impl From<Vec<bool>> for Pick {
    fn from(heddles: Vec<bool>) -> Self {
        Self::new(heddles)
    }
}

impl FromStr for Pick {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bit_string(s)
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

/// 发送掩码
///
/// 与 pick 逐位相与，用于只激活织机的某一段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// 全通掩码
    pub fn pass_all(width: usize) -> Self {
        Self {
            bits: vec![true; width],
        }
    }

    /// 只保留第 `index` 个子帧
    pub fn single_section(geometry: &LoomGeometry, index: usize) -> Self {
        let range = geometry.subframe_range(index);
        Self {
            bits: (0..geometry.width()).map(|i| range.contains(&i)).collect(),
        }
    }

    /// 默认掩码：子帧 0 和 2 清零，只保留中间子帧
    pub fn middle_only(geometry: &LoomGeometry) -> Self {
        Self::single_section(geometry, 1)
    }

    pub fn from_bit_string(s: &str) -> Result<Self, ProtocolError> {
        parse_bits(s.trim()).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// 逐位相与；掩码比 pick 短的部分视为 false
    pub fn apply(&self, pick: &Pick) -> Pick {
        pick.as_slice()
            .iter()
            .enumerate()
            .map(|(i, &h)| h && self.bits.get(i).copied().unwrap_or(false))
            .collect::<Vec<_>>()
            .into()
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_bits(&self.bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_default() {
        let geometry = LoomGeometry::default();
        assert_eq!(geometry.width(), 360);
        assert_eq!(geometry.frame_size(), 120);
        assert_eq!(geometry.packed_subframe_len(), 18);
        assert_eq!(geometry.encoded_len(), 60);
        assert_eq!(geometry.subframe_range(1), 120..240);
    }

    #[test]
    fn test_geometry_rejects_mismatch() {
        let err = LoomGeometry::new(100, 30).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidGeometry {
                width: 100,
                frame_size: 30
            }
        );
        assert!(LoomGeometry::new(0, 0).is_err());
        assert!(LoomGeometry::new(30, 10).is_ok());
    }

    #[test]
    fn test_geometry_rejects_overflowing_frame_size() {
        assert!(matches!(
            LoomGeometry::new(360, usize::MAX / 2),
            Err(ProtocolError::InvalidGeometry { width: 360, .. })
        ));
        assert!(LoomGeometry::new(usize::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_pick_bit_string() {
        let pick = Pick::from_bit_string("1010\n").unwrap();
        assert_eq!(pick.as_slice(), &[true, false, true, false]);
        assert_eq!(pick.to_bit_string(), "1010");
        assert_eq!(pick.raised(), 2);

        let err = Pick::from_bit_string("10x1").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidBit {
                position: 2,
                found: 'x'
            }
        );
    }

    #[test]
    fn test_tabby_inverts() {
        let pick = Pick::tabby(6);
        assert_eq!(pick.to_bit_string(), "101010");
        assert_eq!(pick.inverted().to_bit_string(), "010101");
    }

    #[test]
    fn test_check_width() {
        let geometry = LoomGeometry::default();
        assert!(Pick::blank(360).check_width(&geometry).is_ok());
        assert_eq!(
            Pick::blank(359).check_width(&geometry).unwrap_err(),
            ProtocolError::InvalidLength {
                expected: 360,
                actual: 359
            }
        );
    }

    #[test]
    fn test_middle_only_mask() {
        let geometry = LoomGeometry::new(9, 3).unwrap();
        let mask = Mask::middle_only(&geometry);
        assert_eq!(mask.to_string(), "000111000");

        let masked = mask.apply(&Pick::new(vec![true; 9]));
        assert_eq!(masked.to_string(), "000111000");
    }

    #[test]
    fn test_short_mask_clears_tail() {
        let mask = Mask::from_bit_string("11").unwrap();
        let masked = mask.apply(&Pick::from_bit_string("1111").unwrap());
        assert_eq!(masked.to_string(), "1100");
    }
}
