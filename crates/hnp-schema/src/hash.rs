//! Deterministic schema fingerprint.

use blake3::Hasher;

use crate::{FieldType, ValidatedMessage};

/// Computes the fingerprint of a list of validated messages.
///
/// The hash covers names, directions, field order and resolved types, so
/// any change that alters the wire format changes the fingerprint.
pub fn schema_hash(messages: &[ValidatedMessage]) -> u32 {
    let mut hasher = Hasher::new();
    write_u32(&mut hasher, messages.len() as u32);

    for message in messages {
        write_str(&mut hasher, &message.name);
        write_u8(&mut hasher, message.direction.code());
        write_u8(&mut hasher, u8::from(message.heartbeat));
        write_u32(&mut hasher, message.fields.len() as u32);

        for field in &message.fields {
            write_str(&mut hasher, &field.name);
            write_u8(&mut hasher, u8::from(field.optional));
            write_type(&mut hasher, field.ty);
        }
    }

    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn write_type(hasher: &mut Hasher, ty: FieldType) {
    match ty {
        FieldType::Scalar(p) => {
            write_u8(hasher, 0);
            write_u8(hasher, p.code());
        }
        FieldType::Str { max_len } => {
            write_u8(hasher, 1);
            write_u8(hasher, max_len);
        }
        FieldType::Array { elem, len } => {
            write_u8(hasher, 2);
            write_u8(hasher, elem.code());
            write_u8(hasher, len);
        }
    }
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_u32(hasher, value.len() as u32);
    hasher.update(value.as_bytes());
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{validate, Direction, FieldDef, MessageDef, ProtocolSchema};

    fn fingerprint(schema: ProtocolSchema) -> u32 {
        validate(&schema).unwrap().fingerprint()
    }

    fn one_field(type_name: &str) -> ProtocolSchema {
        ProtocolSchema::default().message(
            MessageDef::new("m", Direction::ClientToServer).field(FieldDef::new("v", type_name)),
        )
    }

    #[test]
    fn test_empty_list_hash_is_fixed() {
        assert_eq!(schema_hash(&[]), schema_hash(&[]));
    }

    #[test]
    fn test_type_change_changes_hash() {
        assert_ne!(fingerprint(one_field("uint8")), fingerprint(one_field("int8")));
        assert_ne!(fingerprint(one_field("uint8[2]")), fingerprint(one_field("uint8[3]")));
    }

    #[test]
    fn test_optional_flag_changes_hash() {
        let optional = ProtocolSchema::default().message(
            MessageDef::new("m", Direction::ClientToServer)
                .field(FieldDef::new("v", "uint8").optional()),
        );
        assert_ne!(fingerprint(one_field("uint8")), fingerprint(optional));
    }
}
