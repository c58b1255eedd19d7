//! Schema-driven encode/decode.
//!
//! A frame is the message tag followed by each field in declaration order,
//! little-endian. Optional fields carry a presence byte; strings carry a
//! one-byte length prefix; arrays are packed with no prefix.

use std::collections::HashMap;

use hnp_schema::{Direction, FieldType, Primitive, ValidatedMessage, ValidatedSchema};

use crate::reader::Reader;
use crate::{DecodeError, EncodeError, MessageInstance, Value};

// ---------------------------------------------------------------------------
// CompiledBinding
// ---------------------------------------------------------------------------

/// Encoder/decoder pair for one message definition.
///
/// Immutable after construction; share it through the owning
/// [`CompiledProtocol`] behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    message: ValidatedMessage,
}

impl CompiledBinding {
    pub fn new(message: ValidatedMessage) -> Self {
        Self { message }
    }

    pub fn tag(&self) -> u8 {
        self.message.tag
    }

    pub fn name(&self) -> &str {
        &self.message.name
    }

    pub fn direction(&self) -> Direction {
        self.message.direction
    }

    /// The definition this binding was compiled from.
    pub fn definition(&self) -> &ValidatedMessage {
        &self.message
    }

    /// Builds an instance from `(field name, value)` pairs.
    ///
    /// Fields not mentioned stay absent; encoding will reject the instance
    /// if any of them is required.
    pub fn instance<I, K>(&self, values: I) -> Result<MessageInstance, EncodeError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut fields = vec![None; self.message.fields.len()];
        for (name, value) in values {
            let name = name.as_ref();
            let index = self
                .message
                .field_index(name)
                .ok_or_else(|| EncodeError::UnknownField(name.to_string()))?;
            fields[index] = Some(value);
        }
        Ok(MessageInstance::new(self.tag(), fields))
    }

    /// Looks up a field of a decoded instance by name.
    pub fn get<'m>(&self, msg: &'m MessageInstance, field: &str) -> Option<&'m Value> {
        self.message.field_index(field).and_then(|i| msg.get(i))
    }

    /// Encodes an instance into a frame.
    pub fn encode(&self, msg: &MessageInstance) -> Result<Vec<u8>, EncodeError> {
        if msg.tag != self.tag() {
            return Err(EncodeError::TagMismatch {
                expected: self.tag(),
                got: msg.tag,
            });
        }
        if msg.fields.len() != self.message.fields.len() {
            return Err(EncodeError::FieldCount {
                expected: self.message.fields.len(),
                got: msg.fields.len(),
            });
        }

        let mut out = Vec::with_capacity(self.message.max_frame_size());
        out.push(self.tag());

        for (field, value) in self.message.fields.iter().zip(&msg.fields) {
            match (value, field.optional) {
                (Some(value), true) => {
                    out.push(1);
                    encode_value(&field.name, field.ty, value, &mut out)?;
                }
                (Some(value), false) => encode_value(&field.name, field.ty, value, &mut out)?,
                (None, true) => out.push(0),
                (None, false) => return Err(EncodeError::MissingField(field.name.clone())),
            }
        }
        Ok(out)
    }

    /// Decodes a frame into an instance.
    ///
    /// Never panics: every malformed input maps to a [`DecodeError`].
    pub fn decode(&self, frame: &[u8]) -> Result<MessageInstance, DecodeError> {
        let mut r = Reader::new(frame);
        let tag = r.u8()?;
        if tag != self.tag() {
            return Err(DecodeError::TagMismatch {
                offset: 0,
                expected: self.tag(),
                got: tag,
            });
        }

        let mut fields = Vec::with_capacity(self.message.fields.len());
        for field in &self.message.fields {
            if field.optional {
                let offset = r.position();
                match r.u8()? {
                    0 => {
                        fields.push(None);
                        continue;
                    }
                    1 => {}
                    got => return Err(DecodeError::InvalidPresence { offset, got }),
                }
            }
            fields.push(Some(decode_value(&mut r, field.ty)?));
        }

        r.finish()?;
        Ok(MessageInstance::new(tag, fields))
    }
}

fn encode_value(
    field: &str,
    ty: FieldType,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    match ty {
        FieldType::Scalar(p) => encode_scalar(field, ty, p, value, out),
        FieldType::Str { max_len } => {
            let Value::Str(s) = value else {
                return Err(type_mismatch(field, ty));
            };
            if s.len() > usize::from(max_len) {
                return Err(EncodeError::StringTooLong {
                    field: field.to_string(),
                    max: max_len.into(),
                    got: s.len(),
                });
            }
            // max_len is a u8, so the length fits.
            out.push(s.len() as u8);
            out.extend_from_slice(s.as_bytes());
            Ok(())
        }
        FieldType::Array { elem, len } => {
            let Value::Array(items) = value else {
                return Err(type_mismatch(field, ty));
            };
            if items.len() != usize::from(len) {
                return Err(EncodeError::ArrayLength {
                    field: field.to_string(),
                    expected: len.into(),
                    got: items.len(),
                });
            }
            items
                .iter()
                .try_for_each(|item| encode_scalar(field, ty, elem, item, out))
        }
    }
}

fn encode_scalar(
    field: &str,
    ty: FieldType,
    p: Primitive,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    match (p, value) {
        (Primitive::Float, Value::Float(f)) => out.extend_from_slice(&f.to_le_bytes()),
        (Primitive::Bool, Value::Bool(b)) => out.push(u8::from(*b)),
        (p, Value::Int(v)) => {
            let Some((min, max)) = p.int_range() else {
                return Err(type_mismatch(field, ty));
            };
            if !(min..=max).contains(v) {
                return Err(EncodeError::OutOfRange {
                    field: field.to_string(),
                    value: *v,
                });
            }
            // Range-checked above; the casts only drop the sign extension.
            match p {
                Primitive::Int8 | Primitive::UInt8 => out.push(*v as u8),
                Primitive::Int16 | Primitive::UInt16 => {
                    out.extend_from_slice(&(*v as u16).to_le_bytes())
                }
                _ => out.extend_from_slice(&(*v as u32).to_le_bytes()),
            }
        }
        _ => return Err(type_mismatch(field, ty)),
    }
    Ok(())
}

fn type_mismatch(field: &str, ty: FieldType) -> EncodeError {
    EncodeError::TypeMismatch {
        field: field.to_string(),
        expected: ty,
    }
}

fn decode_value(r: &mut Reader<'_>, ty: FieldType) -> Result<Value, DecodeError> {
    match ty {
        FieldType::Scalar(p) => decode_scalar(r, p),
        FieldType::Str { max_len } => r.string(max_len.into()).map(Value::Str),
        FieldType::Array { elem, len } => (0..len)
            .map(|_| decode_scalar(r, elem))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn decode_scalar(r: &mut Reader<'_>, p: Primitive) -> Result<Value, DecodeError> {
    let value = match p {
        Primitive::Int8 => Value::Int(i8::from_le_bytes(r.array()?).into()),
        Primitive::UInt8 => Value::Int(r.u8()?.into()),
        Primitive::Int16 => Value::Int(i16::from_le_bytes(r.array()?).into()),
        Primitive::UInt16 => Value::Int(u16::from_le_bytes(r.array()?).into()),
        Primitive::Int32 => Value::Int(i32::from_le_bytes(r.array()?).into()),
        Primitive::UInt32 => Value::Int(r.u32()?.into()),
        Primitive::Float => Value::Float(f32::from_le_bytes(r.array()?)),
        Primitive::Bool => {
            let offset = r.position();
            match r.u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                got => return Err(DecodeError::InvalidBool { offset, got }),
            }
        }
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// CompiledProtocol
// ---------------------------------------------------------------------------

/// Bindings for every message of a validated schema, indexed by tag.
#[derive(Debug, Clone)]
pub struct CompiledProtocol {
    bindings: Vec<CompiledBinding>,
    by_name: HashMap<String, u8>,
    fingerprint: u32,
}

impl CompiledProtocol {
    pub fn compile(schema: &ValidatedSchema) -> Self {
        let bindings: Vec<_> = schema
            .messages()
            .iter()
            .cloned()
            .map(CompiledBinding::new)
            .collect();
        let by_name = bindings
            .iter()
            .map(|b| (b.name().to_string(), b.tag()))
            .collect();

        tracing::debug!(
            messages = bindings.len(),
            fingerprint = schema.fingerprint(),
            "compiled protocol bindings"
        );

        Self {
            bindings,
            by_name,
            fingerprint: schema.fingerprint(),
        }
    }

    /// Schema fingerprint clients must present when joining.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    pub fn bindings(&self) -> &[CompiledBinding] {
        &self.bindings
    }

    pub fn binding(&self, tag: u8) -> Option<&CompiledBinding> {
        self.bindings.get(usize::from(tag))
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&CompiledBinding> {
        self.by_name.get(name).and_then(|tag| self.binding(*tag))
    }

    /// Encodes an instance with the binding for its tag.
    pub fn encode(&self, msg: &MessageInstance) -> Result<Vec<u8>, EncodeError> {
        self.binding(msg.tag)
            .ok_or(EncodeError::UnknownTag(msg.tag))?
            .encode(msg)
    }

    /// Decodes a frame, dispatching on its leading tag.
    pub fn decode(&self, frame: &[u8]) -> Result<MessageInstance, DecodeError> {
        let Some(&tag) = frame.first() else {
            return Err(DecodeError::Truncated {
                offset: 0,
                expected: 1,
                got: 0,
            });
        };
        self.binding(tag)
            .ok_or(DecodeError::UnknownTag { offset: 0, tag })?
            .decode(frame)
    }
}
