//! 帧编码/解码
//!
//! Jacq3G 每个字节只使用低 7 位承载数据，最高位保留为 0（与起止标记区分）。

use crate::{
    DATA_BITS_PER_BYTE, LoomGeometry, Mask, Pick, ProtocolError, SUBFRAME_COUNT, SUBFRAME_END,
    SUBFRAME_START,
};
use bytes::{BufMut, Bytes, BytesMut};

/// 按 7 位一字节打包，高位在前
///
/// 不足 7 的倍数时末尾补 false。
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(DATA_BITS_PER_BYTE)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0u8, |byte, (j, &bit)| {
                if bit {
                    byte | (1 << (DATA_BITS_PER_BYTE - 1 - j))
                } else {
                    byte
                }
            })
        })
        .collect()
}

/// `pack_bits` 的逆操作，取前 `len` 位
pub fn unpack_bits(bytes: &[u8], len: usize) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| {
            (0..DATA_BITS_PER_BYTE).map(move |j| byte & (1 << (DATA_BITS_PER_BYTE - 1 - j)) != 0)
        })
        .take(len)
        .collect()
}

/// 将一纬编码为完整的设备帧
///
/// 步骤：与掩码相与 → 拆成三个子帧 → 各自打包 → 加上起止标记。
pub fn encode_pick(
    pick: &Pick,
    mask: &Mask,
    geometry: &LoomGeometry,
) -> Result<Bytes, ProtocolError> {
    pick.check_width(geometry)?;
    let masked = mask.apply(pick);
    let heddles = masked.as_slice();

    let mut out = BytesMut::with_capacity(geometry.encoded_len());
    for (index, start) in SUBFRAME_START.iter().enumerate() {
        out.put_u8(*start);
        out.put_slice(&pack_bits(&heddles[geometry.subframe_range(index)]));
        out.put_u8(SUBFRAME_END);
    }
    Ok(out.freeze())
}

/// 空纬（全部放下）
pub fn encode_null_pick(geometry: &LoomGeometry) -> Bytes {
    let mut out = BytesMut::with_capacity(geometry.encoded_len());
    for start in SUBFRAME_START {
        out.put_u8(start);
        out.put_bytes(0, geometry.packed_subframe_len());
        out.put_u8(SUBFRAME_END);
    }
    out.freeze()
}

/// 将设备帧解码回综框向量（用于校验与回放）
pub fn decode_pick(frame: &[u8], geometry: &LoomGeometry) -> Result<Pick, ProtocolError> {
    if frame.len() != geometry.encoded_len() {
        return Err(ProtocolError::InvalidLength {
            expected: geometry.encoded_len(),
            actual: frame.len(),
        });
    }

    let packed = geometry.packed_subframe_len();
    let mut heddles = Vec::with_capacity(geometry.width());
    for (index, section) in frame.chunks(packed + 2).enumerate() {
        if section[0] != SUBFRAME_START[index] || section[packed + 1] != SUBFRAME_END {
            return Err(ProtocolError::MalformedFrame(format!(
                "bad markers around sub-frame {index}: 0x{:02X} .. 0x{:02X}",
                section[0],
                section[packed + 1]
            )));
        }
        let payload = &section[1..=packed];
        if let Some(byte) = payload.iter().find(|&&b| b & 0x80 != 0) {
            return Err(ProtocolError::MalformedFrame(format!(
                "data byte 0x{byte:02X} in sub-frame {index} has the top bit set"
            )));
        }
        heddles.extend(unpack_bits(payload, geometry.frame_size()));
    }
    debug_assert_eq!(heddles.len(), geometry.frame_size() * SUBFRAME_COUNT);
    Ok(Pick::new(heddles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_seven_bits_msb_first() {
        assert_eq!(pack_bits(&[true; 7]), vec![0x7F]);
        assert_eq!(
            pack_bits(&[true, false, false, false, false, false, true]),
            vec![0x41]
        );
        // 末尾补零
        assert_eq!(pack_bits(&[true, true]), vec![0x60]);
        assert!(pack_bits(&[]).is_empty());
    }

    #[test]
    fn test_pack_subframe_length() {
        let packed = pack_bits(&[true; 120]);
        assert_eq!(packed.len(), 18);
        assert!(packed.iter().all(|b| b & 0x80 == 0));
        // 120 = 17 * 7 + 1，最后一个字节只有最高数据位
        assert_eq!(packed[17], 0x40);
    }

    #[test]
    fn test_unpack_roundtrip_prefix() {
        let bits: Vec<bool> = (0..20).map(|i| i % 3 == 0).collect();
        assert_eq!(unpack_bits(&pack_bits(&bits), bits.len()), bits);
    }

    #[test]
    fn test_encode_layout() {
        let geometry = LoomGeometry::default();
        let frame = encode_pick(
            &Pick::new(vec![true; 360]),
            &Mask::middle_only(&geometry),
            &geometry,
        )
        .unwrap();

        assert_eq!(frame.len(), 60);
        assert_eq!(frame[0], 0x80);
        assert!(frame[1..19].iter().all(|&b| b == 0));
        assert_eq!(frame[19], 0xC0);
        assert_eq!(frame[20], 0x81);
        assert_eq!(frame[21], 0x7F);
        assert_eq!(frame[39], 0xC0);
        assert_eq!(frame[40], 0x82);
        assert!(frame[41..59].iter().all(|&b| b == 0));
        assert_eq!(frame[59], 0xC0);
    }

    #[test]
    fn test_encode_rejects_wrong_width() {
        let geometry = LoomGeometry::default();
        let err = encode_pick(&Pick::blank(12), &Mask::pass_all(360), &geometry).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                expected: 360,
                actual: 12
            }
        );
    }

    #[test]
    fn test_null_pick() {
        let geometry = LoomGeometry::default();
        let null = encode_null_pick(&geometry);
        let decoded = decode_pick(&null, &geometry).unwrap();
        assert_eq!(decoded.raised(), 0);
        assert_eq!(
            null,
            encode_pick(&Pick::blank(360), &Mask::pass_all(360), &geometry).unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_bad_marker() {
        let geometry = LoomGeometry::default();
        let mut frame = encode_null_pick(&geometry).to_vec();
        frame[20] = 0x85;
        assert!(matches!(
            decode_pick(&frame, &geometry),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }
}
