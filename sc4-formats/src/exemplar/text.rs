//! Text dialect of the Exemplar/Cohort format.
//!
//! Property lines look like
//! `0x27812850:{"Park Effect"}=Sint32:2:{0xFFFFFFF6,0x0000000A}` — an id, a
//! quoted description, a type token, a repetition count and a brace-delimited
//! value list. Signed integer types read hex literals as two's complement in
//! their declared width.

use super::{Property, Record, Value, ValueType};
use crate::tgi::Tgi;
use crate::{Error, Result};

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn syntax(message: impl Into<String>) -> Error {
    Error::TextSyntax(message.into())
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn peek(&self) -> u8 {
        if self.at_end() { 0 } else { self.bytes[self.pos] }
    }

    fn skip_whitespace(&mut self) {
        while !self.at_end() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn consume_char(&mut self, c: u8) -> bool {
        if !self.at_end() && self.peek() == c {
            self.pos += 1;
            return true;
        }
        false
    }

    fn consume_literal_ci(&mut self, literal: &str) -> bool {
        let literal = literal.as_bytes();
        if self.remaining() < literal.len() {
            return false;
        }
        let probe = &self.bytes[self.pos..self.pos + literal.len()];
        if probe.eq_ignore_ascii_case(literal) {
            self.pos += literal.len();
            return true;
        }
        false
    }

    fn expect_char(&mut self, c: u8, context: &str) -> Result<()> {
        self.skip_whitespace();
        if !self.consume_char(c) {
            return Err(syntax(format!(
                "expected '{}' while parsing {context}",
                c as char
            )));
        }
        Ok(())
    }

    fn expect_literal(&mut self, literal: &str, context: &str) -> Result<()> {
        self.skip_whitespace();
        if !self.consume_literal_ci(literal) {
            return Err(syntax(format!("expected {literal} while parsing {context}")));
        }
        Ok(())
    }

    /// `{"..."}` literal. Everything up to the `"}` terminator is the value.
    fn parse_string_literal(&mut self) -> Result<String> {
        self.skip_whitespace();
        if !self.consume_char(b'{') || !self.consume_char(b'"') {
            return Err(syntax("string literal must start with {\""));
        }
        let start = self.pos;
        while !self.at_end() {
            if self.peek() == b'"' && self.remaining() >= 2 && self.bytes[self.pos + 1] == b'}' {
                let value = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                self.pos += 2;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(syntax("unterminated string literal"))
    }

    fn parse_identifier(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while !self.at_end() && self.peek().is_ascii_alphanumeric() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(syntax("expected identifier"));
        }
        Ok(std::str::from_utf8(&self.bytes[start..self.pos]).expect("ASCII alphanumeric run"))
    }

    fn parse_integer(&mut self, hex_as_signed: bool, signed_bits: u32) -> Result<i64> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(syntax("unexpected end of buffer while reading integer literal"));
        }

        let negative = self.consume_char(b'-');
        if negative && self.at_end() {
            return Err(syntax("dangling '-' in integer literal"));
        }

        if self.remaining() >= 2
            && self.peek() == b'0'
            && (self.bytes[self.pos + 1] == b'x' || self.bytes[self.pos + 1] == b'X')
        {
            self.pos += 2;
            let start = self.pos;
            while !self.at_end() && self.peek().is_ascii_hexdigit() {
                self.pos += 1;
            }
            if start == self.pos {
                return Err(syntax("invalid hexadecimal literal"));
            }
            let digits = std::str::from_utf8(&self.bytes[start..self.pos]).expect("hex digits");
            let value = u64::from_str_radix(digits, 16)
                .map_err(|_| syntax("failed to parse hexadecimal literal"))?;

            let mut signed = if hex_as_signed {
                if signed_bits < 64 {
                    let limit = 1u64 << signed_bits;
                    if value >= limit {
                        return Err(syntax(format!(
                            "hex literal exceeds {signed_bits}-bit range"
                        )));
                    }
                    let sign_bit = 1u64 << (signed_bits - 1);
                    if value & sign_bit != 0 {
                        value as i64 - limit as i64
                    } else {
                        value as i64
                    }
                } else {
                    // 64-bit signed types take the full word as two's
                    // complement.
                    value as i64
                }
            } else {
                i64::try_from(value).map_err(|_| syntax("hex literal out of 64-bit range"))?
            };
            if negative {
                signed = -signed;
            }
            return Ok(signed);
        }

        let start = self.pos;
        while !self.at_end() && self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(syntax("invalid decimal literal"));
        }
        let digits = std::str::from_utf8(&self.bytes[start..self.pos]).expect("decimal digits");
        let mut value: i64 = digits
            .parse()
            .map_err(|_| syntax("failed to parse decimal literal"))?;
        if negative {
            value = -value;
        }
        Ok(value)
    }

    fn parse_float(&mut self) -> Result<f32> {
        self.skip_whitespace();
        let start = self.pos;
        while !self.at_end() {
            match self.peek() {
                b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E' => {
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if start == self.pos {
            return Err(syntax("invalid float literal"));
        }
        let token = std::str::from_utf8(&self.bytes[start..self.pos]).expect("float charset");
        token
            .parse()
            .map_err(|_| syntax(format!("failed to parse float literal {token:?}")))
    }

    fn parse_bool(&mut self) -> Result<bool> {
        self.skip_whitespace();
        if self.at_end() {
            return Err(syntax("unexpected end of buffer while reading bool literal"));
        }
        if self.peek().is_ascii_alphabetic() {
            let start = self.pos;
            while !self.at_end() && self.peek().is_ascii_alphabetic() {
                self.pos += 1;
            }
            let word = &self.bytes[start..self.pos];
            if word.eq_ignore_ascii_case(b"true") {
                return Ok(true);
            }
            if word.eq_ignore_ascii_case(b"false") {
                return Ok(false);
            }
            return Err(syntax("unrecognized bool literal"));
        }
        Ok(self.parse_integer(false, 64)? != 0)
    }

    /// Values may carry an ignored `Identifier:` prefix inside the list.
    fn consume_optional_name_key(&mut self) {
        self.skip_whitespace();
        let start = self.pos;
        let mut scan = self.pos;
        while scan < self.bytes.len() {
            match self.bytes[scan] {
                b':' => {
                    if scan == start {
                        break;
                    }
                    self.pos = scan + 1;
                    self.skip_whitespace();
                    return;
                }
                b',' | b'}' | b'"' => break,
                _ => scan += 1,
            }
        }
        self.pos = start;
    }
}

fn parse_value(cursor: &mut Cursor<'_>, value_type: ValueType) -> Result<Value> {
    match value_type {
        ValueType::Uint8 => {
            let number = cursor.parse_integer(false, 64)?;
            u8::try_from(number)
                .map(Value::Uint8)
                .map_err(|_| syntax("UInt8 value out of range"))
        }
        ValueType::Uint16 => {
            let number = cursor.parse_integer(false, 64)?;
            u16::try_from(number)
                .map(Value::Uint16)
                .map_err(|_| syntax("UInt16 value out of range"))
        }
        ValueType::Uint32 => {
            let number = cursor.parse_integer(false, 64)?;
            u32::try_from(number)
                .map(Value::Uint32)
                .map_err(|_| syntax("UInt32 value out of range"))
        }
        ValueType::Sint32 => {
            let number = cursor.parse_integer(true, 32)?;
            i32::try_from(number)
                .map(Value::Sint32)
                .map_err(|_| syntax("SInt32 value out of range"))
        }
        ValueType::Sint64 => Ok(Value::Sint64(cursor.parse_integer(true, 64)?)),
        ValueType::Float32 => Ok(Value::Float32(cursor.parse_float()?)),
        ValueType::Bool => Ok(Value::Bool(cursor.parse_bool()?)),
        ValueType::String => Err(syntax("string values are handled separately")),
    }
}

fn parse_value_array(cursor: &mut Cursor<'_>, value_type: ValueType) -> Result<Vec<Value>> {
    cursor.expect_char(b'{', "property value list")?;

    let mut values = Vec::with_capacity(4);
    loop {
        cursor.skip_whitespace();
        if cursor.at_end() {
            return Err(syntax("unexpected end of buffer while reading property list"));
        }
        if cursor.consume_char(b'}') {
            break;
        }
        cursor.consume_optional_name_key();
        values.push(parse_value(cursor, value_type)?);
        cursor.skip_whitespace();
        if cursor.at_end() {
            return Err(syntax("unexpected end of buffer while reading property list"));
        }
        if cursor.consume_char(b',') {
            continue;
        }
        if cursor.consume_char(b'}') {
            break;
        }
        return Err(syntax("expected ',' or '}' in property list"));
    }
    Ok(values)
}

/// `ParentCohort=Key:{group,instance,type}` — note the component order.
fn parse_parent(cursor: &mut Cursor<'_>) -> Result<Tgi> {
    cursor.expect_literal("ParentCohort=Key:", "text exemplar parent block")?;
    cursor.expect_char(b'{', "parent TGI list")?;

    let mut parts = [0u32; 3];
    for (i, part) in parts.iter_mut().enumerate() {
        let value = cursor.parse_integer(false, 64)?;
        *part = u32::try_from(value)
            .map_err(|_| syntax("ParentCohort values must be unsigned 32-bit integers"))?;
        if i + 1 < 3 {
            cursor.expect_char(b',', "parent TGI separator")?;
        }
    }
    cursor.expect_char(b'}', "parent TGI terminator")?;

    Ok(Tgi {
        group: parts[0],
        instance: parts[1],
        type_id: parts[2],
    })
}

fn parse_property_count(cursor: &mut Cursor<'_>) -> Result<u32> {
    cursor.expect_literal("PropCount=", "property count")?;
    let count = cursor.parse_integer(false, 64)?;
    u32::try_from(count).map_err(|_| syntax("PropCount out of range"))
}

fn parse_property(cursor: &mut Cursor<'_>) -> Result<Property> {
    let id_value = cursor.parse_integer(false, 64)?;
    let id = u32::try_from(id_value).map_err(|_| syntax("property id out of range"))?;
    cursor.expect_char(b':', "property descriptor separator")?;
    // The quoted description is display-only and discarded.
    cursor.parse_string_literal()?;

    cursor.expect_char(b'=', "property assignment")?;
    let type_token = cursor.parse_identifier()?;
    let value_type = ValueType::from_token(type_token)
        .ok_or_else(|| syntax("unsupported property value type in text exemplar"))?;
    cursor.expect_char(b':', "property value prefix")?;

    if value_type == ValueType::String {
        let length = cursor.parse_integer(false, 64)?;
        if length < 0 {
            return Err(syntax("string length cannot be negative"));
        }
        cursor.expect_char(b':', "string literal separator")?;
        let value = cursor.parse_string_literal()?;
        return Ok(Property {
            id,
            value_type,
            is_list: false,
            values: vec![Value::String(value)],
        });
    }

    let repetitions = cursor.parse_integer(false, 64)?;
    if repetitions < 0 {
        return Err(syntax("repetition count cannot be negative"));
    }
    cursor.expect_char(b':', "property list separator")?;

    let values = parse_value_array(cursor, value_type)?;
    let is_scalar = repetitions == 0 && values.len() == 1;
    Ok(Property {
        id,
        value_type,
        is_list: !is_scalar,
        values,
    })
}

pub(super) fn parse(data: &[u8], is_cohort: bool) -> Result<Record> {
    let mut cursor = Cursor::new(data);
    cursor.skip_whitespace();

    let expected = if is_cohort { "CQZT1###" } else { "EQZT1###" };
    if !cursor.consume_literal_ci(expected) {
        // A couple of shipped files replace the version digit with '#'.
        let alternative = if is_cohort { "CQZT####" } else { "EQZT####" };
        if !cursor.consume_literal_ci(alternative) {
            return Err(syntax("text exemplar header mismatch"));
        }
    }

    cursor.skip_whitespace();
    let parent = parse_parent(&mut cursor)?;

    cursor.skip_whitespace();
    let declared_count = parse_property_count(&mut cursor)?;

    let mut properties = Vec::with_capacity(declared_count.min(4096) as usize);
    cursor.skip_whitespace();
    while !cursor.at_end() {
        properties.push(parse_property(&mut cursor)?);
        cursor.skip_whitespace();
    }

    Ok(Record {
        parent,
        is_cohort,
        is_text: true,
        properties,
    })
}
