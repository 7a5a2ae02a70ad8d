//! Tagged binary encoding of row values.
//!
//! The first byte of every value row is a tag:
//!
//! | Tag    | Value     | Body                                         |
//! |--------|-----------|----------------------------------------------|
//! | `0x00` | null      | empty                                        |
//! | `0x01` | true      | empty                                        |
//! | `0x02` | false     | empty                                        |
//! | `0x03` | number    | 8 bytes IEEE-754 double, big-endian          |
//! | `0x04` | string    | UTF-16 code units, big-endian, to end        |
//! | `0x05` | bigint    | decimal digits as UTF-16, big-endian, to end |
//! | `0x06` | timestamp | 8 bytes IEEE-754 double, big-endian (ms)     |
//! | `0x07` | regexp    | `/pattern/flags` as UTF-16, big-endian       |
//! | `0xFE` | array     | empty (composite marker)                     |
//! | `0xFF` | record    | empty (composite marker)                     |
//!
//! Sort order among value bytes is irrelevant: values are fetched by point
//! lookup on path, never scanned by value.

use canopy_error::{CanopyError, Result};

use crate::scalar::{BigIntLiteral, RegexpLiteral, Scalar, Timestamp};

/// Value-row tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    /// The null value.
    Null = 0x00,
    /// Boolean true.
    True = 0x01,
    /// Boolean false.
    False = 0x02,
    /// IEEE-754 double.
    Number = 0x03,
    /// UTF-16 string.
    Text = 0x04,
    /// Decimal big-integer literal.
    BigInt = 0x05,
    /// Milliseconds since the epoch.
    Timestamp = 0x06,
    /// Regular-expression literal.
    Regexp = 0x07,
    /// Array composite marker.
    Array = 0xFE,
    /// Record composite marker.
    Record = 0xFF,
}

impl ValueTag {
    /// Classify a tag byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Null),
            0x01 => Some(Self::True),
            0x02 => Some(Self::False),
            0x03 => Some(Self::Number),
            0x04 => Some(Self::Text),
            0x05 => Some(Self::BigInt),
            0x06 => Some(Self::Timestamp),
            0x07 => Some(Self::Regexp),
            0xFE => Some(Self::Array),
            0xFF => Some(Self::Record),
            _ => None,
        }
    }
}

/// The one-byte row value declaring an array at its path.
pub const ARRAY_MARKER: [u8; 1] = [ValueTag::Array as u8];
/// The one-byte row value declaring a record at its path.
pub const RECORD_MARKER: [u8; 1] = [ValueTag::Record as u8];

/// A decoded row value: a scalar leaf or a composite marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowValue {
    /// A scalar leaf value.
    Scalar(Scalar),
    /// The path holds an array; children live at extending paths.
    ArrayMarker,
    /// The path holds a record; children live at extending paths.
    RecordMarker,
}

impl RowValue {
    /// Decode a stored row value.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some((&tag_byte, body)) = bytes.split_first() else {
            return Err(CanopyError::corrupt("value row is empty"));
        };
        let tag = ValueTag::from_byte(tag_byte)
            .ok_or(CanopyError::UnknownValueTag { tag: tag_byte })?;
        let value = match tag {
            ValueTag::Null => {
                expect_empty(tag, body)?;
                Self::Scalar(Scalar::Null)
            }
            ValueTag::True => {
                expect_empty(tag, body)?;
                Self::Scalar(Scalar::Bool(true))
            }
            ValueTag::False => {
                expect_empty(tag, body)?;
                Self::Scalar(Scalar::Bool(false))
            }
            ValueTag::Number => Self::Scalar(Scalar::Number(decode_f64(body)?)),
            ValueTag::Text => Self::Scalar(Scalar::Text(decode_utf16_be(body)?)),
            ValueTag::BigInt => {
                let literal = decode_utf16_be(body)?;
                let literal = BigIntLiteral::new(literal).map_err(|err| {
                    CanopyError::corrupt(format!("big-integer row: {err}"))
                })?;
                Self::Scalar(Scalar::BigInt(literal))
            }
            ValueTag::Timestamp => {
                Self::Scalar(Scalar::Timestamp(Timestamp::from_millis(decode_f64(body)?)))
            }
            ValueTag::Regexp => {
                let text = decode_utf16_be(body)?;
                Self::Scalar(Scalar::Regexp(RegexpLiteral::from_text(&text)?))
            }
            ValueTag::Array => {
                expect_empty(tag, body)?;
                Self::ArrayMarker
            }
            ValueTag::Record => {
                expect_empty(tag, body)?;
                Self::RecordMarker
            }
        };
        Ok(value)
    }
}

/// Encode a scalar as a row value.
pub fn encode_scalar(scalar: &Scalar) -> Vec<u8> {
    match scalar {
        Scalar::Null => vec![ValueTag::Null as u8],
        Scalar::Bool(true) => vec![ValueTag::True as u8],
        Scalar::Bool(false) => vec![ValueTag::False as u8],
        Scalar::Number(n) => {
            let mut buf = Vec::with_capacity(9);
            buf.push(ValueTag::Number as u8);
            buf.extend_from_slice(&n.to_be_bytes());
            buf
        }
        Scalar::Text(s) => encode_tagged_utf16(ValueTag::Text, s),
        Scalar::BigInt(b) => encode_tagged_utf16(ValueTag::BigInt, b.as_str()),
        Scalar::Timestamp(t) => {
            let mut buf = Vec::with_capacity(9);
            buf.push(ValueTag::Timestamp as u8);
            buf.extend_from_slice(&t.millis().to_be_bytes());
            buf
        }
        Scalar::Regexp(r) => encode_tagged_utf16(ValueTag::Regexp, &r.to_string()),
    }
}

fn encode_tagged_utf16(tag: ValueTag, text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + text.len() * 2);
    buf.push(tag as u8);
    for unit in text.encode_utf16() {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
    buf
}

fn expect_empty(tag: ValueTag, body: &[u8]) -> Result<()> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(CanopyError::corrupt(format!(
            "{tag:?} row carries {} unexpected body bytes",
            body.len()
        )))
    }
}

fn decode_f64(body: &[u8]) -> Result<f64> {
    let be: [u8; 8] = body.try_into().map_err(|_| {
        CanopyError::corrupt(format!("double row body is {} bytes, expected 8", body.len()))
    })?;
    Ok(f64::from_be_bytes(be))
}

fn decode_utf16_be(body: &[u8]) -> Result<String> {
    if body.len() % 2 != 0 {
        return Err(CanopyError::corrupt(
            "UTF-16 row body has an odd byte count",
        ));
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|_| CanopyError::corrupt("UTF-16 row body is not well-formed"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn round_trip(scalar: &Scalar) -> RowValue {
        RowValue::decode(&encode_scalar(scalar)).unwrap()
    }

    #[test]
    fn nullary_encodings() {
        assert_eq!(encode_scalar(&Scalar::Null), vec![0x00]);
        assert_eq!(encode_scalar(&Scalar::Bool(true)), vec![0x01]);
        assert_eq!(encode_scalar(&Scalar::Bool(false)), vec![0x02]);
    }

    #[test]
    fn number_encoding_is_big_endian() {
        let bytes = encode_scalar(&Scalar::Number(1.0));
        assert_eq!(bytes, vec![0x03, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn text_encoding_is_utf16_be() {
        let bytes = encode_scalar(&Scalar::from("hi"));
        assert_eq!(bytes, vec![0x04, 0x00, 0x68, 0x00, 0x69]);
    }

    #[test]
    fn scalar_round_trips() {
        let samples = [
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Bool(false),
            Scalar::Number(2.718_281_828),
            Scalar::Number(f64::INFINITY),
            Scalar::Number(f64::NEG_INFINITY),
            Scalar::from("world"),
            Scalar::from(""),
            Scalar::from("\u{1F600} and \u{FFFF}"),
            Scalar::BigInt(BigIntLiteral::from(1_000_000_000_000_000_000_i64)),
            Scalar::Timestamp(Timestamp::from_millis(1_700_000_000_000.0)),
            Scalar::Regexp(RegexpLiteral::new("0x[a-z0-9]+", "i")),
        ];
        for scalar in samples {
            assert_eq!(round_trip(&scalar), RowValue::Scalar(scalar.clone()), "{scalar}");
        }
    }

    #[test]
    fn nan_round_trips_bit_exactly() {
        let payload = f64::from_bits(0x7FF8_0000_0000_1234);
        let RowValue::Scalar(Scalar::Number(back)) = round_trip(&Scalar::Number(payload)) else {
            panic!("expected a number row");
        };
        assert_eq!(back.to_bits(), payload.to_bits());
    }

    #[test]
    fn markers_decode() {
        assert_eq!(RowValue::decode(&ARRAY_MARKER).unwrap(), RowValue::ArrayMarker);
        assert_eq!(RowValue::decode(&RECORD_MARKER).unwrap(), RowValue::RecordMarker);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = RowValue::decode(&[0x42]).unwrap_err();
        assert!(matches!(err, CanopyError::UnknownValueTag { tag: 0x42 }));
    }

    #[test]
    fn empty_row_is_corrupt() {
        assert!(RowValue::decode(&[]).unwrap_err().is_corruption());
    }

    #[test]
    fn malformed_bodies_are_corrupt() {
        // Marker with a body.
        assert!(RowValue::decode(&[0xFE, 0x00]).unwrap_err().is_corruption());
        // Number with a short body.
        assert!(RowValue::decode(&[0x03, 0x01]).unwrap_err().is_corruption());
        // Odd-length text body.
        assert!(RowValue::decode(&[0x04, 0x00, 0x61, 0x00]).unwrap_err().is_corruption());
        // Bigint body that is not a decimal literal.
        assert!(RowValue::decode(&[0x05, 0x00, 0x61]).unwrap_err().is_corruption());
        // Regexp body without delimiters.
        assert!(RowValue::decode(&[0x07, 0x00, 0x61]).unwrap_err().is_corruption());
    }

    proptest! {
        #[test]
        fn prop_number_round_trip(bits in any::<u64>()) {
            let n = f64::from_bits(bits);
            let RowValue::Scalar(Scalar::Number(back)) =
                RowValue::decode(&encode_scalar(&Scalar::Number(n))).unwrap()
            else {
                panic!("expected a number row");
            };
            prop_assert_eq!(back.to_bits(), bits);
        }

        #[test]
        fn prop_text_round_trip(s in any::<String>()) {
            let back = RowValue::decode(&encode_scalar(&Scalar::Text(s.clone()))).unwrap();
            prop_assert_eq!(back, RowValue::Scalar(Scalar::Text(s)));
        }
    }
}
