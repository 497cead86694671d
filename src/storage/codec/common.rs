use crate::error::{IndexError, IndexResult};
use crate::storage::codec::DecodedData;

pub struct CommonCodec;

impl CommonCodec {
    pub fn encode_bool(data: bool) -> Vec<u8> {
        if data {
            vec![1]
        } else {
            vec![0]
        }
    }

    pub fn decode_bool(bytes: &[u8]) -> IndexResult<DecodedData<bool>> {
        let (byte, offset) = CommonCodec::decode_u8(bytes)?;
        match byte {
            0 => Ok((false, offset)),
            1 => Ok((true, offset)),
            other => Err(IndexError::Corrupt(format!(
                "invalid boolean byte {}",
                other
            ))),
        }
    }

    pub fn encode_u8(data: u8) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u8(bytes: &[u8]) -> IndexResult<DecodedData<u8>> {
        let data = Self::take::<1>(bytes)?;
        Ok((u8::from_be_bytes(data), 1))
    }

    pub fn encode_u32(data: u32) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u32(bytes: &[u8]) -> IndexResult<DecodedData<u32>> {
        let data = Self::take::<4>(bytes)?;
        Ok((u32::from_be_bytes(data), 4))
    }

    pub fn encode_u64(data: u64) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_u64(bytes: &[u8]) -> IndexResult<DecodedData<u64>> {
        let data = Self::take::<8>(bytes)?;
        Ok((u64::from_be_bytes(data), 8))
    }

    pub fn encode_i64(data: i64) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_i64(bytes: &[u8]) -> IndexResult<DecodedData<i64>> {
        let data = Self::take::<8>(bytes)?;
        Ok((i64::from_be_bytes(data), 8))
    }

    pub fn encode_f64(data: f64) -> Vec<u8> {
        data.to_be_bytes().to_vec()
    }

    pub fn decode_f64(bytes: &[u8]) -> IndexResult<DecodedData<f64>> {
        let data = Self::take::<8>(bytes)?;
        Ok((f64::from_be_bytes(data), 8))
    }

    /// Length-prefixed text padded with zeros to exactly `4 + width` bytes.
    pub fn encode_fixed_string(data: &str, width: usize) -> IndexResult<Vec<u8>> {
        let raw = data.as_bytes();
        if raw.len() > width {
            return Err(IndexError::KeyTooLong {
                len: raw.len(),
                width,
            });
        }
        let mut bytes = Vec::with_capacity(4 + width);
        bytes.extend(CommonCodec::encode_u32(raw.len() as u32));
        bytes.extend_from_slice(raw);
        bytes.resize(4 + width, 0);
        Ok(bytes)
    }

    pub fn decode_fixed_string(bytes: &[u8], width: usize) -> IndexResult<DecodedData<String>> {
        let (len, offset) = CommonCodec::decode_u32(bytes)?;
        let len = len as usize;
        if len > width {
            return Err(IndexError::Corrupt(format!(
                "string length {} exceeds slot width {}",
                len, width
            )));
        }
        if bytes.len() < offset + width {
            return Err(IndexError::Corrupt(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                offset + width
            )));
        }
        let data = String::from_utf8(bytes[offset..offset + len].to_vec())
            .map_err(|e| IndexError::Corrupt(format!("Failed to decode string {}", e)))?;
        Ok((data, offset + width))
    }

    /// Null-padded name without a length prefix; longer names are rejected.
    pub fn encode_padded_name(data: &str, width: usize) -> IndexResult<Vec<u8>> {
        let raw = data.as_bytes();
        if raw.len() > width {
            return Err(IndexError::Usage(format!(
                "name '{}' is longer than {} bytes",
                data, width
            )));
        }
        let mut bytes = raw.to_vec();
        bytes.resize(width, 0);
        Ok(bytes)
    }

    pub fn decode_padded_name(bytes: &[u8], width: usize) -> IndexResult<DecodedData<String>> {
        if bytes.len() < width {
            return Err(IndexError::Corrupt(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                width
            )));
        }
        let raw = &bytes[..width];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(width);
        let data = String::from_utf8(raw[..end].to_vec())
            .map_err(|e| IndexError::Corrupt(format!("Failed to decode name {}", e)))?;
        Ok((data, width))
    }

    fn take<const N: usize>(bytes: &[u8]) -> IndexResult<[u8; N]> {
        if bytes.len() < N {
            return Err(IndexError::Corrupt(format!(
                "bytes length {} is less than {}",
                bytes.len(),
                N
            )));
        }
        let mut data = [0u8; N];
        data.copy_from_slice(&bytes[..N]);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::CommonCodec;
    use crate::error::IndexError;

    #[test]
    fn common_codec() {
        assert!(
            CommonCodec::decode_bool(&CommonCodec::encode_bool(true))
                .unwrap()
                .0
        );
        assert_eq!(
            5u32,
            CommonCodec::decode_u32(&CommonCodec::encode_u32(5u32))
                .unwrap()
                .0
        );
        assert_eq!(
            u64::MAX - 3,
            CommonCodec::decode_u64(&CommonCodec::encode_u64(u64::MAX - 3))
                .unwrap()
                .0
        );
        assert_eq!(
            -7i64,
            CommonCodec::decode_i64(&CommonCodec::encode_i64(-7i64))
                .unwrap()
                .0
        );
        assert_eq!(
            5.25f64,
            CommonCodec::decode_f64(&CommonCodec::encode_f64(5.25f64))
                .unwrap()
                .0
        );
    }

    #[test]
    fn integers_are_big_endian() {
        assert_eq!(CommonCodec::encode_u32(1), vec![0, 0, 0, 1]);
        assert_eq!(CommonCodec::encode_u64(108)[7], 108);
    }

    #[test]
    fn fixed_string_is_padded_to_width() {
        let bytes = CommonCodec::encode_fixed_string("apple", 16).unwrap();
        assert_eq!(bytes.len(), 20);
        assert!(bytes[9..].iter().all(|b| *b == 0));
        let (text, consumed) = CommonCodec::decode_fixed_string(&bytes, 16).unwrap();
        assert_eq!(text, "apple");
        assert_eq!(consumed, 20);
    }

    #[test]
    fn fixed_string_rejects_overflow() {
        let err = CommonCodec::encode_fixed_string("watermelon", 4).unwrap_err();
        assert!(matches!(err, IndexError::KeyTooLong { len: 10, width: 4 }));
    }

    #[test]
    fn short_input_is_corrupt() {
        assert!(matches!(
            CommonCodec::decode_u64(&[0, 1, 2]),
            Err(IndexError::Corrupt(_))
        ));
        assert!(matches!(
            CommonCodec::decode_bool(&[7]),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn padded_name() {
        let bytes = CommonCodec::encode_padded_name("age", 50).unwrap();
        assert_eq!(bytes.len(), 50);
        assert_eq!(
            CommonCodec::decode_padded_name(&bytes, 50).unwrap(),
            ("age".to_string(), 50)
        );
        assert!(CommonCodec::encode_padded_name(&"x".repeat(51), 50).is_err());
    }
}
