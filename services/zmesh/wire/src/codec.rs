//! The schema-driven encode/decode engine.
//!
//! Encoding walks a [`FrameSchema`]'s fields in order, writing the class key
//! and command id first and expanding a trailing variant group once per
//! caller-supplied repetition. Decoding walks the same order over the
//! received bytes through a single running [`Cursor`]; a variant group
//! repeats until the payload is exhausted, and a final repetition that would
//! overrun the remaining bytes is dropped rather than failing the whole
//! frame.

use bytes::Bytes;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{DecodeError, EncodeError};
use crate::field::{put_uint, uint_max, Cursor};
use crate::frame::{FieldMap, Frame, Value};
use crate::schema::{
    BitKind, BitmaskWidth, BlobLength, FieldDescriptor, FieldKind, FrameSchema,
};

/// Frames are short; this keeps the common encode entirely on the stack.
type FrameBuf = SmallVec<[u8; 64]>;

/// Encode a parameter set into a frame according to `schema`.
pub fn encode(schema: &FrameSchema, params: &FieldMap) -> Result<Frame, EncodeError> {
    let mut buf = FrameBuf::new();
    buf.push(schema.class_key);
    buf.push(schema.command_id);

    for field in &schema.fields {
        encode_field(field, params, &mut buf)?;
    }

    if let Some(group) = &schema.variant {
        // A missing group parameter means zero repetitions.
        let repetitions: &[FieldMap] = match params.get(group.name) {
            Some(Value::Groups(reps)) => reps,
            Some(_) => {
                return Err(EncodeError::WrongType {
                    field: group.name,
                    expected: "group list",
                })
            }
            None => &[],
        };
        for repetition in repetitions {
            for field in &group.fields {
                encode_field(field, repetition, &mut buf)?;
            }
        }
    }

    let frame = Frame::new(Bytes::copy_from_slice(&buf))
        .expect("encoded frames always carry the two-byte header");
    Ok(frame)
}

/// Decode a frame's payload according to `schema`.
pub fn decode(schema: &FrameSchema, frame: &Frame) -> Result<FieldMap, DecodeError> {
    let payload = frame.payload();
    let min_len = schema.min_len();
    if payload.len() < min_len {
        return Err(DecodeError::Truncated {
            offset: payload.len(),
            needed: min_len - payload.len(),
        });
    }

    let mut cursor = Cursor::new(payload);
    let mut fields = FieldMap::new();
    for field in &schema.fields {
        decode_field(field, &mut cursor, &mut fields)?;
    }

    if let Some(group) = &schema.variant {
        let mut repetitions = Vec::new();
        while !cursor.is_empty() {
            let checkpoint = cursor.clone();
            let mut repetition = FieldMap::new();
            match decode_group_fields(&group.fields, &mut cursor, &mut repetition) {
                Ok(()) => repetitions.push(repetition),
                Err(DecodeError::Truncated { offset, .. }) => {
                    debug!(
                        class_key = schema.class_key,
                        command_id = schema.command_id,
                        offset,
                        decoded = repetitions.len(),
                        "variant group repetition overruns payload, reporting partial group"
                    );
                    cursor = checkpoint;
                    break;
                }
                Err(other) => return Err(other),
            }
        }
        fields.insert(group.name, Value::Groups(repetitions));
    }

    Ok(fields)
}

fn decode_group_fields(
    fields: &[FieldDescriptor],
    cursor: &mut Cursor<'_>,
    out: &mut FieldMap,
) -> Result<(), DecodeError> {
    for field in fields {
        decode_field(field, cursor, out)?;
    }
    Ok(())
}

fn encode_field(
    field: &FieldDescriptor,
    params: &FieldMap,
    buf: &mut FrameBuf,
) -> Result<(), EncodeError> {
    match &field.kind {
        FieldKind::Uint { width, range } => {
            let value = require_uint(field.name, params)?;
            let max = match range {
                Some((min, max)) => {
                    if value < *min {
                        return Err(EncodeError::OutOfRange {
                            field: field.name,
                            value,
                        });
                    }
                    (*max).min(uint_max(*width))
                }
                None => uint_max(*width),
            };
            if value > max {
                return Err(EncodeError::OutOfRange {
                    field: field.name,
                    value,
                });
            }
            put_uint(buf, value, *width);
        }
        FieldKind::Bits { parts } => {
            let mut byte = 0u8;
            for part in parts {
                match part.kind {
                    BitKind::Uint => {
                        let value = require_uint(part.name, params)?;
                        if value > u64::from(part.max_value()) {
                            return Err(EncodeError::OutOfRange {
                                field: part.name,
                                value,
                            });
                        }
                        byte |= part.pack(value as u8);
                    }
                    BitKind::Flag => {
                        let set = match params.get(part.name) {
                            Some(Value::Flag(b)) => *b,
                            Some(_) => {
                                return Err(EncodeError::WrongType {
                                    field: part.name,
                                    expected: "flag",
                                })
                            }
                            None => return Err(EncodeError::MissingField(part.name)),
                        };
                        if set {
                            byte |= part.mask;
                        }
                    }
                }
            }
            buf.push(byte);
        }
        FieldKind::Enum { table } => {
            let symbol = match params.get(field.name) {
                Some(Value::Symbol(s)) => s,
                Some(_) => {
                    return Err(EncodeError::WrongType {
                        field: field.name,
                        expected: "symbol",
                    })
                }
                None => return Err(EncodeError::MissingField(field.name)),
            };
            let value = table
                .value(symbol)
                .ok_or_else(|| EncodeError::UnknownSymbol {
                    field: field.name,
                    symbol: symbol.clone(),
                })?;
            buf.push(value);
        }
        FieldKind::Blob { length } => {
            let bytes = match params.get(field.name) {
                Some(Value::Bytes(b)) => b,
                Some(_) => {
                    return Err(EncodeError::WrongType {
                        field: field.name,
                        expected: "bytes",
                    })
                }
                None => return Err(EncodeError::MissingField(field.name)),
            };
            if let BlobLength::Prefixed { width } = length {
                if bytes.len() as u64 > uint_max(*width) {
                    return Err(EncodeError::BlobTooLong {
                        field: field.name,
                        len: bytes.len(),
                        width: *width,
                    });
                }
                put_uint(buf, bytes.len() as u64, *width);
            }
            buf.extend_from_slice(bytes);
        }
        FieldKind::Bitmask { table, width } => {
            let members = match params.get(field.name) {
                Some(Value::Set(members)) => members,
                Some(_) => {
                    return Err(EncodeError::WrongType {
                        field: field.name,
                        expected: "symbol set",
                    })
                }
                None => return Err(EncodeError::MissingField(field.name)),
            };
            let mut positions = Vec::with_capacity(members.len());
            for member in members {
                let position =
                    table
                        .position(member)
                        .ok_or_else(|| EncodeError::UnknownSymbol {
                            field: field.name,
                            symbol: member.clone(),
                        })?;
                positions.push(position);
            }
            // Derived widths cover the highest member position; an empty
            // set produces an empty mask.
            let derived = positions
                .iter()
                .map(|p| usize::from(*p) / 8 + 1)
                .max()
                .unwrap_or(0);
            let byte_count = match width {
                BitmaskWidth::Fixed(n) => {
                    let limit = u16::from(*n) * 8;
                    for position in &positions {
                        if *position >= limit {
                            return Err(EncodeError::OutOfRange {
                                field: field.name,
                                value: u64::from(*position),
                            });
                        }
                    }
                    usize::from(*n)
                }
                BitmaskWidth::Prefixed { width } => {
                    if derived as u64 > uint_max(*width) {
                        return Err(EncodeError::BlobTooLong {
                            field: field.name,
                            len: derived,
                            width: *width,
                        });
                    }
                    put_uint(buf, derived as u64, *width);
                    derived
                }
                BitmaskWidth::Remainder => derived,
            };
            let mut mask = vec![0u8; byte_count];
            for position in positions {
                mask[usize::from(position) / 8] |= 1 << (position % 8);
            }
            buf.extend_from_slice(&mask);
        }
    }
    Ok(())
}

fn decode_field(
    field: &FieldDescriptor,
    cursor: &mut Cursor<'_>,
    out: &mut FieldMap,
) -> Result<(), DecodeError> {
    match &field.kind {
        FieldKind::Uint { width, .. } => {
            out.insert(field.name, Value::Uint(cursor.get_uint(*width)?));
        }
        FieldKind::Bits { parts } => {
            let byte = cursor.get_u8()?;
            for part in parts {
                let value = match part.kind {
                    BitKind::Uint => Value::Uint(u64::from(part.unpack(byte))),
                    BitKind::Flag => Value::Flag(part.unpack(byte) != 0),
                };
                out.insert(part.name, value);
            }
        }
        FieldKind::Enum { table } => {
            let byte = cursor.get_u8()?;
            if table.symbol(byte).is_none() {
                debug!(field = field.name, value = byte, "unknown enumerated value");
            }
            out.insert(field.name, Value::Symbol(table.decode(byte)));
        }
        FieldKind::Blob { length } => {
            let bytes = match length {
                BlobLength::Prefixed { width } => {
                    let len = cursor.get_uint(*width)? as usize;
                    cursor.take(len)?
                }
                BlobLength::Remainder => cursor.take_remaining(),
            };
            out.insert(field.name, Value::Bytes(Bytes::copy_from_slice(bytes)));
        }
        FieldKind::Bitmask { table, width } => {
            let bytes = match width {
                BitmaskWidth::Fixed(n) => cursor.take(usize::from(*n))?,
                BitmaskWidth::Prefixed { width } => {
                    let len = cursor.get_uint(*width)? as usize;
                    cursor.take(len)?
                }
                BitmaskWidth::Remainder => cursor.take_remaining(),
            };
            let mut members = Vec::new();
            for position in 0..(bytes.len() * 8) {
                if bytes[position / 8] & (1 << (position % 8)) != 0 {
                    members.push(table.symbol(position as u16));
                }
            }
            out.insert(field.name, Value::Set(members));
        }
    }
    Ok(())
}

fn require_uint(name: &'static str, params: &FieldMap) -> Result<u64, EncodeError> {
    match params.get(name) {
        Some(Value::Uint(v)) => Ok(*v),
        Some(_) => Err(EncodeError::WrongType {
            field: name,
            expected: "unsigned integer",
        }),
        None => Err(EncodeError::MissingField(name)),
    }
}
