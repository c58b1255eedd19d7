//! Resolved field types and their wire sizes.

use std::fmt;

use crate::{ValidationReason, DEFAULT_STRING_MAX_LEN, MAX_ARRAY_LEN};

/// A fixed-width scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    /// IEEE-754 binary32.
    Float,
    Bool,
}

impl Primitive {
    /// Every primitive, in type-code order.
    pub const ALL: [Self; 8] = [
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Float,
        Self::Bool,
    ];

    /// Looks up a primitive by its protocol file name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// The name used in protocol files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    /// Encoded size in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float => 4,
        }
    }

    /// Inclusive value range for integer primitives.
    pub fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Int8 => Some((i8::MIN.into(), i8::MAX.into())),
            Self::UInt8 => Some((0, u8::MAX.into())),
            Self::Int16 => Some((i16::MIN.into(), i16::MAX.into())),
            Self::UInt16 => Some((0, u16::MAX.into())),
            Self::Int32 => Some((i32::MIN.into(), i32::MAX.into())),
            Self::UInt32 => Some((0, u32::MAX.into())),
            Self::Float | Self::Bool => None,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Int8 => 0,
            Self::UInt8 => 1,
            Self::Int16 => 2,
            Self::UInt16 => 3,
            Self::Int32 => 4,
            Self::UInt32 => 5,
            Self::Float => 6,
            Self::Bool => 7,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The resolved type of a validated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(Primitive),
    /// UTF-8 text with a one-byte length prefix.
    Str { max_len: u8 },
    /// `len` consecutive values of `elem`.
    Array { elem: Primitive, len: u8 },
}

impl FieldType {
    /// Resolves a type name and optional string capacity.
    pub(crate) fn resolve(
        type_name: &str,
        max_len: Option<u16>,
    ) -> Result<Self, ValidationReason> {
        let type_name = type_name.trim();

        if type_name == "string" {
            let max_len = match max_len {
                None => DEFAULT_STRING_MAX_LEN,
                Some(n) => u8::try_from(n)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(ValidationReason::InvalidMaxLen(n))?,
            };
            return Ok(Self::Str { max_len });
        }

        if max_len.is_some() {
            return Err(ValidationReason::MaxLenNotAllowed(type_name.to_string()));
        }

        if let Some((elem, rest)) = type_name.split_once('[') {
            let len_text = rest
                .strip_suffix(']')
                .ok_or_else(|| ValidationReason::UnknownType(type_name.to_string()))?;
            let elem = elem.trim();
            let elem = match Primitive::from_name(elem) {
                Some(p) => p,
                None if elem == "string" => {
                    return Err(ValidationReason::UnsupportedArrayElement(
                        elem.to_string(),
                    ));
                }
                None => return Err(ValidationReason::UnknownType(type_name.to_string())),
            };
            let len = len_text
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=MAX_ARRAY_LEN).contains(n))
                .ok_or_else(|| ValidationReason::InvalidArrayLength(len_text.to_string()))?;
            // MAX_ARRAY_LEN fits in a u8.
            return Ok(Self::Array {
                elem,
                len: len as u8,
            });
        }

        Primitive::from_name(type_name)
            .map(Self::Scalar)
            .ok_or_else(|| ValidationReason::UnknownType(type_name.to_string()))
    }

    /// Largest number of bytes a value of this type occupies.
    pub fn max_size(self) -> usize {
        match self {
            Self::Scalar(p) => p.size(),
            Self::Str { max_len } => 1 + usize::from(max_len),
            Self::Array { elem, len } => elem.size() * usize::from(len),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(p) => write!(f, "{p}"),
            Self::Str { max_len } => write!(f, "string({max_len})"),
            Self::Array { elem, len } => write!(f, "{elem}[{len}]"),
        }
    }
}
