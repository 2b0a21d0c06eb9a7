//! Fixed binary layout for a single column value.
//!
//! Every field starts with a status byte (`0` present, `1` null) followed by
//! the value field, which is present even for nulls:
//!
//! ```text
//! bool   | status:u8 | value:u8                          |
//! int    | status:u8 | value:u64 (sign bit flipped)      |
//! float  | status:u8 | value:u64 (ordered IEEE bits)     |
//! str    | status:u8 | len:u64   | bytes[len]            |   row field
//! str    | status:u8 | len:u64   | bytes[size] (padded)  |   key field
//! ```
//!
//! Integers and floats are transformed so that the big-endian bytes sort in
//! the same order as the values. Key fields pad strings to the column's
//! declared size so that key index records have a fixed stride.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{Error, Result};
use crate::schema::{Column, ColumnType};
use crate::value::Value;

const PRESENT: u8 = 0x00;
const NULL: u8 = 0x01;

const SIGN: u64 = 1 << 63;

/// Status byte plus the 8 byte length of a string field.
const STR_HEADER: usize = 1 + 8;

fn encode_integer(i: i64) -> u64 {
    (i as u64) ^ SIGN
}

fn decode_integer(bits: u64) -> i64 {
    (bits ^ SIGN) as i64
}

fn encode_float(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits & SIGN != 0 {
        !bits
    } else {
        bits | SIGN
    }
}

fn decode_float(ordered: u64) -> f64 {
    let bits = if ordered & SIGN != 0 {
        ordered & !SIGN
    } else {
        !ordered
    };
    f64::from_bits(bits)
}

fn mismatch(column: &Column, value: &Value) -> Error {
    Error::Schema(format!(
        "column {:?} of type {} cannot hold a {} value",
        column.name,
        column.ty,
        value.type_name()
    ))
}

fn take<'a>(buf: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| Error::Corruption(format!("truncated {what} at offset {offset}")))
}

fn status(buf: &[u8], offset: usize, column: &Column) -> Result<bool> {
    match take(buf, offset, 1, "status byte")?[0] {
        PRESENT => Ok(false),
        NULL => Ok(true),
        other => Err(Error::Corruption(format!(
            "invalid status byte {other:#04x} for column {:?}",
            column.name
        ))),
    }
}

/// Encodes a value into the row layout and returns the bytes.
pub fn encode(column: &Column, value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_size(column, value));
    encode_into(&mut buf, column, value)?;
    Ok(buf)
}

/// Appends the row layout of a value to `buf`.
pub fn encode_into(buf: &mut Vec<u8>, column: &Column, value: &Value) -> Result<()> {
    match (column.ty, value) {
        (ColumnType::Bool, Value::Null) => buf.extend_from_slice(&[NULL, 0]),
        (ColumnType::Bool, Value::Bool(b)) => buf.extend_from_slice(&[PRESENT, u8::from(*b)]),
        (ColumnType::Int | ColumnType::Float, Value::Null) => {
            buf.write_u8(NULL)?;
            buf.write_u64::<BigEndian>(0)?;
        }
        (ColumnType::Int, Value::Int(i)) => {
            buf.write_u8(PRESENT)?;
            buf.write_u64::<BigEndian>(encode_integer(*i))?;
        }
        (ColumnType::Float, Value::Float(f)) => {
            buf.write_u8(PRESENT)?;
            buf.write_u64::<BigEndian>(encode_float(*f))?;
        }
        (ColumnType::Str, Value::Null) => {
            buf.write_u8(NULL)?;
            buf.write_u64::<BigEndian>(0)?;
        }
        (ColumnType::Str, Value::Str(s)) => {
            buf.write_u8(PRESENT)?;
            buf.write_u64::<BigEndian>(s.len() as u64)?;
            buf.extend_from_slice(s.as_bytes());
        }
        _ => return Err(mismatch(column, value)),
    }
    Ok(())
}

/// Decodes a row-layout value at `offset`, returning it with the offset of
/// the next field.
pub fn decode(column: &Column, buf: &[u8], offset: usize) -> Result<(Value, usize)> {
    let null = status(buf, offset, column)?;
    let offset = offset + 1;
    match column.ty {
        ColumnType::Str => {
            let len = BigEndian::read_u64(take(buf, offset, 8, "string length")?) as usize;
            let bytes = take(buf, offset + 8, len, "string bytes")?;
            let value = if null {
                Value::Null
            } else {
                Value::Str(utf8(bytes, column)?)
            };
            Ok((value, offset + 8 + len))
        }
        ColumnType::Bool => {
            let byte = take(buf, offset, 1, "bool value")?[0];
            let value = match (null, byte) {
                (true, _) => Value::Null,
                (false, 0) => Value::Bool(false),
                (false, 1) => Value::Bool(true),
                (false, other) => {
                    return Err(Error::Corruption(format!(
                        "invalid bool byte {other:#04x} for column {:?}",
                        column.name
                    )))
                }
            };
            Ok((value, offset + 1))
        }
        ColumnType::Int | ColumnType::Float => {
            let bits = BigEndian::read_u64(take(buf, offset, 8, "numeric value")?);
            let value = match (null, column.ty) {
                (true, _) => Value::Null,
                (false, ColumnType::Int) => Value::Int(decode_integer(bits)),
                (false, _) => Value::Float(decode_float(bits)),
            };
            Ok((value, offset + 8))
        }
    }
}

/// Number of bytes `encode` produces for this value.
pub fn encoded_size(column: &Column, value: &Value) -> usize {
    match (column.ty, value) {
        (ColumnType::Bool, _) => 2,
        (ColumnType::Int | ColumnType::Float, _) => 9,
        (ColumnType::Str, Value::Str(s)) => STR_HEADER + s.len(),
        (ColumnType::Str, _) => STR_HEADER,
    }
}

/// Fixed size of this column's key field. Strings need a declared size.
pub fn key_field_size(column: &Column) -> Result<usize> {
    match column.ty {
        ColumnType::Bool => Ok(2),
        ColumnType::Int | ColumnType::Float => Ok(9),
        ColumnType::Str => column.size.map(|size| STR_HEADER + size).ok_or_else(|| {
            Error::Schema(format!(
                "column {:?} is a variable-length string and cannot be indexed",
                column.name
            ))
        }),
    }
}

/// Appends the fixed-size key layout of a value to `buf`.
pub fn encode_key_field(buf: &mut Vec<u8>, column: &Column, value: &Value) -> Result<()> {
    if column.ty != ColumnType::Str {
        return encode_into(buf, column, value);
    }

    let size = key_field_size(column)? - STR_HEADER;
    let bytes: &[u8] = match value {
        Value::Str(s) => s.as_bytes(),
        Value::Null => &[],
        other => return Err(mismatch(column, other)),
    };
    if bytes.len() > size {
        return Err(Error::Validation(format!(
            "value for column {:?} is {} bytes, declared size is {size}",
            column.name,
            bytes.len()
        )));
    }

    buf.write_u8(if value.is_null() { NULL } else { PRESENT })?;
    buf.write_u64::<BigEndian>(bytes.len() as u64)?;
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + size - bytes.len(), 0);
    Ok(())
}

/// Decodes a key-layout value at `offset`, returning it with the offset of
/// the next field.
pub fn decode_key_field(column: &Column, buf: &[u8], offset: usize) -> Result<(Value, usize)> {
    if column.ty != ColumnType::Str {
        return decode(column, buf, offset);
    }

    let size = key_field_size(column)? - STR_HEADER;
    let null = status(buf, offset, column)?;
    let len = BigEndian::read_u64(take(buf, offset + 1, 8, "string length")?) as usize;
    if len > size {
        return Err(Error::Corruption(format!(
            "key string of {len} bytes exceeds declared size {size} of column {:?}",
            column.name
        )));
    }
    let field = take(buf, offset + STR_HEADER, size, "padded string")?;
    let value = if null {
        Value::Null
    } else {
        Value::Str(utf8(&field[..len], column)?)
    };
    Ok((value, offset + STR_HEADER + size))
}

fn utf8(bytes: &[u8], column: &Column) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::Corruption(format!("invalid UTF-8 in column {:?}", column.name)))
}
