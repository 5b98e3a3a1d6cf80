//! Schema-driven regulator-data telemetry.
//!
//! The RegulatorData broadcast carries manufacturer-specific numeric keys
//! whose layout is not self-describing: a separate schema request returns
//! the ordered `(type tag, key)` list that the decoder walks. Keys are
//! opaque; this crate never assigns them meaning. Because the schema may
//! not have arrived yet when a broadcast lands, the message keeps its raw
//! bytes and extraction happens on demand.

use bytes::Bytes;

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
    payloads::versions::FrameVersions,
    value::Value,
};

/// Wire type tags for regulator-data values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Placeholder tag carrying no bytes.
    Undefined,
    /// Signed byte.
    I8,
    /// Little-endian i16.
    I16,
    /// Little-endian i32.
    I32,
    /// Unsigned byte.
    U8,
    /// Little-endian u16.
    U16,
    /// Little-endian u32.
    U32,
    /// Little-endian f32.
    F32,
    /// Little-endian f64.
    F64,
    /// Single bit of the shared packed-boolean cursor.
    Boolean,
    /// Little-endian i64.
    I64,
    /// Little-endian u64.
    U64,
}

impl DataType {
    /// Decode a wire tag.
    #[must_use]
    pub fn from_wire(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Undefined,
            1 => Self::I8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::U8,
            5 => Self::U16,
            6 => Self::U32,
            7 => Self::F32,
            9 => Self::F64,
            10 => Self::Boolean,
            11 => Self::I64,
            12 => Self::U64,
            _ => return None,
        })
    }

    /// Wire tag for this type.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::U8 => 4,
            Self::U16 => 5,
            Self::U32 => 6,
            Self::F32 => 7,
            Self::F64 => 9,
            Self::Boolean => 10,
            Self::I64 => 11,
            Self::U64 => 12,
        }
    }
}

/// Ordered schema for the regulator-data broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegulatorSchema {
    /// `(key, type)` pairs in decode order.
    pub entries: Vec<(u16, DataType)>,
}

impl RegulatorSchema {
    /// Decode the schema response body.
    ///
    /// Unknown type tags abort the decode: without their width every later
    /// entry would be misaligned.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let count = usize::from(r.read_u16()?);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = r.read_u8()?;
            let key = r.read_u16()?;
            let Some(data_type) = DataType::from_wire(tag) else {
                return Err(ProtocolError::MalformedFrame(format!(
                    "regulator schema: unknown type tag {tag:#04x} for key {key}"
                )));
            };
            entries.push((key, data_type));
        }
        Ok(Self { entries })
    }

    /// Encode the schema response body.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u16(self.entries.len().min(usize::from(u16::MAX)) as u16);
        for (key, data_type) in self.entries.iter().take(usize::from(u16::MAX)) {
            w.put_u8(data_type.to_wire());
            w.put_u16(*key);
        }
    }
}

/// RegulatorData broadcast body: version table plus raw telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegulatorData {
    /// Frame-version table embedded at the head of the message.
    pub versions: FrameVersions,
    /// Raw telemetry bytes, decoded lazily against a schema.
    pub raw: Bytes,
}

impl RegulatorData {
    /// Decode the broadcast body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let versions = FrameVersions::decode(r)?;
        Ok(Self { versions, raw: Bytes::copy_from_slice(r.read_rest()) })
    }

    /// Encode the broadcast body.
    pub fn encode(&self, w: &mut ByteWriter) {
        self.versions.encode(w);
        w.put_bytes(&self.raw);
    }

    /// Walk `schema` over the raw bytes and extract every value.
    ///
    /// Consecutive boolean entries share a packed-bit cursor; any
    /// non-boolean entry realigns it to the next byte.
    pub fn decode_values(
        &self,
        schema: &RegulatorSchema,
    ) -> Result<Vec<(u16, Value)>, ProtocolError> {
        let mut r = ByteReader::new(&self.raw);
        let mut values = Vec::with_capacity(schema.entries.len());
        for (key, data_type) in &schema.entries {
            let value = match data_type {
                DataType::Undefined => continue,
                DataType::Boolean => Value::Bool(r.read_bool()?),
                DataType::I8 => Value::Int(i64::from(r.read_i8()?)),
                DataType::I16 => Value::Int(i64::from(r.read_i16()?)),
                DataType::I32 => Value::Int(i64::from(r.read_i32()?)),
                DataType::U8 => Value::Int(i64::from(r.read_u8()?)),
                DataType::U16 => Value::Int(i64::from(r.read_u16()?)),
                DataType::U32 => Value::Int(i64::from(r.read_u32()?)),
                DataType::I64 => Value::Int(r.read_i64()?),
                DataType::U64 => Value::Int(r.read_u64()? as i64),
                DataType::F32 => Value::Float(f64::from(r.read_f32()?)),
                DataType::F64 => Value::Float(r.read_f64()?),
            };
            values.push((*key, value));
        }
        Ok(values)
    }

    /// Build a broadcast from typed values, the inverse of
    /// [`RegulatorData::decode_values`].
    pub fn from_values(
        versions: FrameVersions,
        schema: &RegulatorSchema,
        values: &[(u16, Value)],
    ) -> Self {
        let mut w = ByteWriter::new();
        for (key, data_type) in &schema.entries {
            let value = values.iter().find(|(k, _)| k == key).map(|(_, v)| v);
            match data_type {
                DataType::Undefined => {}
                DataType::Boolean => {
                    w.put_bool(value.and_then(Value::as_bool).unwrap_or_default());
                }
                DataType::I8 => w.put_i8(value.and_then(Value::as_i64).unwrap_or_default() as i8),
                DataType::I16 => w.put_i16(value.and_then(Value::as_i64).unwrap_or_default() as i16),
                DataType::I32 => w.put_i32(value.and_then(Value::as_i64).unwrap_or_default() as i32),
                DataType::U8 => w.put_u8(value.and_then(Value::as_i64).unwrap_or_default() as u8),
                DataType::U16 => w.put_u16(value.and_then(Value::as_i64).unwrap_or_default() as u16),
                DataType::U32 => w.put_u32(value.and_then(Value::as_i64).unwrap_or_default() as u32),
                DataType::I64 => w.put_i64(value.and_then(Value::as_i64).unwrap_or_default()),
                DataType::U64 => {
                    w.put_u64(value.and_then(Value::as_i64).unwrap_or_default() as u64);
                }
                DataType::F32 => {
                    w.put_f32(value.and_then(Value::as_f64).unwrap_or_default() as f32);
                }
                DataType::F64 => w.put_f64(value.and_then(Value::as_f64).unwrap_or_default()),
            }
        }
        w.align();
        Self { versions, raw: w.freeze() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> RegulatorSchema {
        RegulatorSchema {
            entries: vec![
                (1792, DataType::U8),
                (1024, DataType::F32),
                (1280, DataType::Boolean),
                (1281, DataType::Boolean),
                (1536, DataType::U16),
                (1537, DataType::Boolean),
            ],
        }
    }

    #[test]
    fn schema_round_trips() {
        let schema = schema();
        let mut w = ByteWriter::new();
        schema.encode(&mut w);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(RegulatorSchema::decode(&mut r).unwrap(), schema);
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let mut w = ByteWriter::new();
        w.put_u16(1);
        w.put_u8(0xEE);
        w.put_u16(42);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        assert!(RegulatorSchema::decode(&mut r).is_err());
    }

    #[test]
    fn values_round_trip_through_the_schema() {
        let schema = schema();
        let values = vec![
            (1792, Value::Int(3)),
            (1024, Value::Float(64.5)),
            (1280, Value::Bool(true)),
            (1281, Value::Bool(false)),
            (1536, Value::Int(1200)),
            (1537, Value::Bool(true)),
        ];

        let data = RegulatorData::from_values(FrameVersions::default(), &schema, &values);
        assert_eq!(data.decode_values(&schema).unwrap(), values);
    }

    #[test]
    fn booleans_realign_around_wider_fields() {
        let schema = RegulatorSchema {
            entries: vec![
                (1, DataType::Boolean),
                (2, DataType::U8),
                (3, DataType::Boolean),
            ],
        };
        let values =
            vec![(1, Value::Bool(true)), (2, Value::Int(0x7F)), (3, Value::Bool(true))];

        let data = RegulatorData::from_values(FrameVersions::default(), &schema, &values);
        // Bit, aligned byte, bit: three bytes on the wire.
        assert_eq!(data.raw.len(), 3);
        assert_eq!(data.decode_values(&schema).unwrap(), values);
    }

    #[test]
    fn truncated_telemetry_is_malformed() {
        let schema = schema();
        let data = RegulatorData { versions: FrameVersions::default(), raw: Bytes::from_static(&[1]) };
        assert!(data.decode_values(&schema).is_err());
    }
}
