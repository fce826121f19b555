use crate::{Codec, CodecError};

/// Identity codec for raw byte strings and UTF-8 text.
///
/// Byte strings are already their own order-preserving encoding —
/// lexicographic comparison of the bytes is exactly `Vec<u8>`'s `Ord`. UTF-8
/// text shares this property for same-length strings and, because UTF-8
/// never produces a byte sequence that is a prefix of another valid
/// encoding's continuation bytes, for differing lengths too: shorter
/// strings sort before longer ones that extend them.
pub struct ByteArrayCodec;

impl Codec<Vec<u8>> for ByteArrayCodec {
    fn encode(value: &Vec<u8>) -> Vec<u8> {
        value.clone()
    }

    fn decode(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

impl Codec<String> for ByteArrayCodec {
    fn encode(value: &String) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_vec_round_trips() {
        let original = vec![9u8, 8, 7];
        let encoded = <ByteArrayCodec as Codec<Vec<u8>>>::encode(&original);
        assert_eq!(encoded, original);
        let decoded = <ByteArrayCodec as Codec<Vec<u8>>>::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn string_encoding_preserves_prefix_order() {
        let short = "ab".to_string();
        let long = "abc".to_string();
        let short_enc = <ByteArrayCodec as Codec<String>>::encode(&short);
        let long_enc = <ByteArrayCodec as Codec<String>>::encode(&long);
        assert!(short_enc < long_enc);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = <ByteArrayCodec as Codec<String>>::decode(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err, CodecError::InvalidUtf8);
    }
}
