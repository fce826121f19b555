use byteorder::{BigEndian, ByteOrder};

use crate::{Codec, CodecError};

/// Order-preserving codec for `u64`. Big-endian byte order already makes
/// unsigned integer comparison and byte-string comparison agree.
pub struct U64Codec;

impl Codec<u64> for U64Codec {
    fn encode(value: &u64) -> Vec<u8> {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, *value);
        buf.to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<u64, CodecError> {
        if bytes.len() != 8 {
            return Err(CodecError::UnexpectedLength {
                expected: 8,
                found: bytes.len(),
            });
        }
        Ok(BigEndian::read_u64(bytes))
    }
}

/// Order-preserving codec for `i64`.
///
/// Two's complement puts negative numbers' big-endian bytes *after*
/// positive numbers' (the sign bit is set), which is backwards from the
/// numeric order we need. Flipping the sign bit before encoding — and
/// again on decode — maps the signed range onto the same byte order as an
/// unsigned integer, so big-endian comparison of the encoded bytes matches
/// `i64`'s own `Ord`.
pub struct I64Codec;

impl Codec<i64> for I64Codec {
    fn encode(value: &i64) -> Vec<u8> {
        let flipped = (*value as u64) ^ (1u64 << 63);
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, flipped);
        buf.to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<i64, CodecError> {
        if bytes.len() != 8 {
            return Err(CodecError::UnexpectedLength {
                expected: 8,
                found: bytes.len(),
            });
        }
        let flipped = BigEndian::read_u64(bytes);
        Ok((flipped ^ (1u64 << 63)) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_encoding_preserves_order() {
        let a = <U64Codec as Codec<u64>>::encode(&1);
        let b = <U64Codec as Codec<u64>>::encode(&2);
        let c = <U64Codec as Codec<u64>>::encode(&u64::MAX);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn u64_round_trips() {
        for value in [0u64, 1, 255, 256, u64::MAX] {
            let encoded = <U64Codec as Codec<u64>>::encode(&value);
            assert_eq!(<U64Codec as Codec<u64>>::decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn i64_encoding_preserves_order_across_the_sign_boundary() {
        let neg = <I64Codec as Codec<i64>>::encode(&-1);
        let zero = <I64Codec as Codec<i64>>::encode(&0);
        let pos = <I64Codec as Codec<i64>>::encode(&1);
        assert!(neg < zero);
        assert!(zero < pos);
    }

    #[test]
    fn i64_round_trips() {
        for value in [i64::MIN, -1, 0, 1, i64::MAX] {
            let encoded = <I64Codec as Codec<i64>>::encode(&value);
            assert_eq!(<I64Codec as Codec<i64>>::decode(&encoded).unwrap(), value);
        }
    }
}
