//! Exemplar / Cohort property-table decoder.
//!
//! Both resources share one shape: a parent key plus an ordered list of
//! typed properties. The signature's first byte distinguishes exemplar from
//! cohort and its fourth byte selects the binary or text dialect; both
//! dialects decode into the same [`Record`].

mod text;

use tracing::debug;

use crate::reader::SliceReader;
use crate::tgi::Tgi;
use crate::{Error, Result};

/// Value-type tags as stored in the binary dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Uint8,
    Uint16,
    Uint32,
    Sint32,
    Sint64,
    Float32,
    Bool,
    String,
}

impl ValueType {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x0100 => Some(Self::Uint8),
            0x0200 => Some(Self::Uint16),
            0x0300 => Some(Self::Uint32),
            0x0700 => Some(Self::Sint32),
            0x0800 => Some(Self::Sint64),
            0x0900 => Some(Self::Float32),
            0x0B00 => Some(Self::Bool),
            0x0C00 => Some(Self::String),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Uint8 => 0x0100,
            Self::Uint16 => 0x0200,
            Self::Uint32 => 0x0300,
            Self::Sint32 => 0x0700,
            Self::Sint64 => 0x0800,
            Self::Float32 => 0x0900,
            Self::Bool => 0x0B00,
            Self::String => 0x0C00,
        }
    }

    /// Case-insensitive type name as written in the text dialect.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "uint8" => Some(Self::Uint8),
            "uint16" => Some(Self::Uint16),
            "uint32" => Some(Self::Uint32),
            "sint32" => Some(Self::Sint32),
            "sint64" => Some(Self::Sint64),
            "float32" => Some(Self::Float32),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Sint32(i32),
    Sint64(i64),
    Float32(f32),
    Bool(bool),
    String(String),
}

/// Extraction of a concrete Rust type from a [`Value`] of the matching tag.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(u8, Uint8);
impl_from_value!(u16, Uint16);
impl_from_value!(u32, Uint32);
impl_from_value!(i32, Sint32);
impl_from_value!(i64, Sint64);
impl_from_value!(f32, Float32);
impl_from_value!(bool, Bool);
impl_from_value!(String, String);

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: u32,
    pub value_type: ValueType,
    pub is_list: bool,
    pub values: Vec<Value>,
}

impl Property {
    pub fn is_string(&self) -> bool {
        self.value_type == ValueType::String
    }

    /// The value at `index`, widened across the integer types with a range
    /// check. Strings, bools and floats never widen.
    pub fn scalar_as<T: TryFrom<i128>>(&self, index: usize) -> Option<T> {
        let raw: i128 = match self.values.get(index)? {
            Value::Uint8(v) => i128::from(*v),
            Value::Uint16(v) => i128::from(*v),
            Value::Uint32(v) => i128::from(*v),
            Value::Sint32(v) => i128::from(*v),
            Value::Sint64(v) => i128::from(*v),
            _ => return None,
        };
        T::try_from(raw).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub parent: Tgi,
    pub is_cohort: bool,
    pub is_text: bool,
    pub properties: Vec<Property>,
}

impl Record {
    /// First property with the given id, in parse order.
    pub fn find_property(&self, id: u32) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// Every property with the given id, in parse order.
    pub fn find_properties(&self, id: u32) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.id == id).collect()
    }

    /// The singleton value of a scalar property whose stored tag matches `T`.
    pub fn get_scalar<T: FromValue>(&self, id: u32) -> Option<T> {
        let prop = self.find_property(id)?;
        if prop.is_list || prop.values.is_empty() {
            return None;
        }
        T::from_value(&prop.values[0])
    }

    /// Integer-widening lookup at a given value index, see
    /// [`Property::scalar_as`].
    pub fn get_scalar_as<T: TryFrom<i128>>(&self, id: u32, index: usize) -> Option<T> {
        self.find_property(id)?.scalar_as(index)
    }
}

const MIN_RECORD_SIZE: usize = 24;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

struct Signature {
    is_cohort: bool,
    is_text: bool,
}

fn parse_signature(data: &[u8]) -> Result<Signature> {
    let sig = &data[..8];
    let is_cohort = sig[0] == b'C';
    let is_exemplar = sig[0] == b'E';
    let is_text = sig[3] == b'T';
    let is_binary = sig[3] == b'B';
    // A few shipped files replace the version digit with another '#'.
    let version_ok = sig[4] == b'1' || sig[4] == b'#';
    let suffix_ok = &sig[5..8] == b"###";

    if (is_binary || is_text) && version_ok && suffix_ok && (is_cohort || is_exemplar) {
        Ok(Signature { is_cohort, is_text })
    } else {
        Err(Error::BadExemplarSignature(
            String::from_utf8_lossy(sig).into_owned(),
        ))
    }
}

pub fn parse(data: &[u8]) -> Result<Record> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    if data.len() < MIN_RECORD_SIZE {
        return Err(Error::Underrun {
            needed: MIN_RECORD_SIZE,
            offset: 0,
            remaining: data.len(),
        });
    }

    let signature = parse_signature(data)?;
    debug!(
        "exemplar: {} bytes, cohort={}, text={}",
        data.len(),
        signature.is_cohort,
        signature.is_text
    );

    if signature.is_text {
        return text::parse(data, signature.is_cohort);
    }
    parse_binary(data, signature.is_cohort)
}

fn parse_binary(data: &[u8], is_cohort: bool) -> Result<Record> {
    let mut reader = SliceReader::new(&data[8..]);

    let parent = Tgi {
        type_id: reader.read_u32()?,
        group: reader.read_u32()?,
        instance: reader.read_u32()?,
    };
    let property_count = reader.read_u32()?;

    let mut properties = Vec::with_capacity(property_count.min(4096) as usize);
    for _ in 0..property_count {
        properties.push(parse_binary_property(&mut reader)?);
    }

    Ok(Record {
        parent,
        is_cohort,
        is_text: false,
        properties,
    })
}

fn parse_binary_property(reader: &mut SliceReader<'_>) -> Result<Property> {
    let id = reader.read_u32()?;
    let raw_type = reader.read_u16()?;
    let value_type = ValueType::from_raw(raw_type).ok_or(Error::UnknownValueType(raw_type))?;
    let key_type = reader.read_u16()?;

    match key_type {
        // Scalar: one reps byte, then the value. For strings the reps byte
        // is the length; for everything else it is unused.
        0x0000 => {
            let length_or_flag = reader.read_u8()?;
            let value = if value_type == ValueType::String {
                Value::String(reader.read_string(usize::from(length_or_flag))?)
            } else {
                read_binary_value(reader, value_type)?
            };
            Ok(Property {
                id,
                value_type,
                is_list: false,
                values: vec![value],
            })
        }
        // List: unused byte, 4-byte repetition count. A "list" of string is
        // a single string whose length is the repetition count.
        0x0080 => {
            reader.skip(1)?;
            let repetitions = reader.read_u32()?;
            if value_type == ValueType::String {
                let value = Value::String(reader.read_string(repetitions as usize)?);
                return Ok(Property {
                    id,
                    value_type,
                    is_list: false,
                    values: vec![value],
                });
            }
            let mut values = Vec::with_capacity(repetitions.min(65536) as usize);
            for _ in 0..repetitions {
                values.push(read_binary_value(reader, value_type)?);
            }
            Ok(Property {
                id,
                value_type,
                is_list: true,
                values,
            })
        }
        // String array: a length table followed by the concatenated strings.
        0x0081 => {
            reader.skip(1)?;
            let total_length = reader.read_u32()? as usize;
            let entry_count = reader.read_u32()? as usize;
            let array = reader.peek(total_length)?;

            let table_len = entry_count
                .checked_mul(4)
                .ok_or(Error::StringArrayOutOfBounds)?;
            if table_len > array.len() {
                return Err(Error::StringArrayOutOfBounds);
            }

            let mut values = Vec::with_capacity(entry_count);
            let mut string_offset = table_len;
            for i in 0..entry_count {
                let length =
                    u32::from_le_bytes(array[i * 4..i * 4 + 4].try_into().expect("4-byte chunk"))
                        as usize;
                let end = string_offset
                    .checked_add(length)
                    .ok_or(Error::StringArrayOutOfBounds)?;
                if end > array.len() {
                    return Err(Error::StringArrayOutOfBounds);
                }
                values.push(Value::String(
                    String::from_utf8_lossy(&array[string_offset..end]).into_owned(),
                ));
                string_offset = end;
            }

            reader.skip(total_length)?;
            Ok(Property {
                id,
                value_type,
                is_list: true,
                values,
            })
        }
        other => Err(Error::UnknownKeyType(other)),
    }
}

fn read_binary_value(reader: &mut SliceReader<'_>, value_type: ValueType) -> Result<Value> {
    Ok(match value_type {
        ValueType::Uint8 => Value::Uint8(reader.read_u8()?),
        ValueType::Uint16 => Value::Uint16(reader.read_u16()?),
        ValueType::Uint32 => Value::Uint32(reader.read_u32()?),
        ValueType::Sint32 => Value::Sint32(reader.read_i32()?),
        ValueType::Sint64 => Value::Sint64(reader.read_i64()?),
        ValueType::Float32 => Value::Float32(reader.read_f32()?),
        ValueType::Bool => Value::Bool(reader.read_u8()? != 0),
        ValueType::String => return Err(Error::UnknownKeyType(ValueType::String.raw())),
    })
}
