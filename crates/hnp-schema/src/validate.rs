//! Schema validation.
//!
//! Validation is pure: it never touches the filesystem and never mutates
//! its input. A [`ValidatedSchema`] can only be obtained through
//! [`validate`] or [`validate_all`] and exposes read-only views, so every
//! consumer downstream can rely on the invariants checked here.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::{
    is_identifier, pascal_case, schema_hash, Direction, FieldType, MessageDef,
    ProtocolSchema, ValidationError, ValidationReason, GPIO_SIZE, MAX_MESSAGES,
};

/// A field whose type has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedField {
    pub name: String,
    pub ty: FieldType,
    pub optional: bool,
}

impl ValidatedField {
    /// Largest encoded size, including the presence byte.
    pub fn max_size(&self) -> usize {
        self.ty.max_size() + usize::from(self.optional)
    }
}

/// A message that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    /// Wire tag, equal to the message's position in the schema.
    pub tag: u8,
    pub name: String,
    /// PascalCase name used by generated entry points.
    pub ident: String,
    pub direction: Direction,
    pub heartbeat: bool,
    pub fields: Vec<ValidatedField>,
}

impl ValidatedMessage {
    /// Worst-case frame size (tag byte included).
    pub fn max_frame_size(&self) -> usize {
        1 + self.fields.iter().map(ValidatedField::max_size).sum::<usize>()
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// An immutable, validated protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSchema {
    messages: Vec<ValidatedMessage>,
    fingerprint: u32,
}

impl ValidatedSchema {
    /// Messages in tag order.
    pub fn messages(&self) -> &[ValidatedMessage] {
        &self.messages
    }

    /// Looks up a message by name.
    pub fn message(&self, name: &str) -> Option<&ValidatedMessage> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Looks up a message by wire tag.
    pub fn by_tag(&self, tag: u8) -> Option<&ValidatedMessage> {
        self.messages.get(usize::from(tag))
    }

    /// Stable fingerprint of the protocol, shared by the server and the
    /// generated client so mismatched builds can be refused.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }
}

/// Validates a schema, stopping at the first problem.
pub fn validate(schema: &ProtocolSchema) -> Result<ValidatedSchema, ValidationError> {
    validate_all(schema).map_err(|mut errors| errors.swap_remove(0))
}

/// Validates a schema and reports every problem found.
///
/// The returned error list is never empty.
pub fn validate_all(schema: &ProtocolSchema) -> Result<ValidatedSchema, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if schema.messages.is_empty() {
        errors.push(ValidationError::schema(ValidationReason::NoMessages));
    }
    if schema.messages.len() > MAX_MESSAGES {
        errors.push(ValidationError::schema(ValidationReason::TooManyMessages {
            count: schema.messages.len(),
            max: MAX_MESSAGES,
        }));
    }

    let mut names = HashSet::new();
    let mut idents: HashMap<String, &str> = HashMap::new();
    let mut messages = Vec::with_capacity(schema.messages.len());

    for (index, def) in schema.messages.iter().enumerate() {
        if !names.insert(def.name.as_str()) {
            errors.push(ValidationError::message(
                index,
                ValidationReason::DuplicateMessage(def.name.clone()),
            ));
            continue;
        }

        let ident = pascal_case(&def.name);
        if !is_identifier(&def.name) || ident.is_empty() {
            errors.push(ValidationError::message(
                index,
                ValidationReason::InvalidIdentifier(def.name.clone()),
            ));
            continue;
        }
        if let Some(other) = idents.insert(ident.clone(), def.name.as_str()) {
            errors.push(ValidationError::message(
                index,
                ValidationReason::GeneratedNameCollision {
                    ident,
                    other: other.to_string(),
                },
            ));
            continue;
        }

        if let Some(message) = validate_message(index, ident, def, &mut errors) {
            messages.push(message);
        }
    }

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "schema rejected");
        return Err(errors);
    }

    let fingerprint = schema_hash(&messages);
    Ok(ValidatedSchema {
        messages,
        fingerprint,
    })
}

fn validate_message(
    index: usize,
    ident: String,
    def: &MessageDef,
    errors: &mut Vec<ValidationError>,
) -> Option<ValidatedMessage> {
    let before = errors.len();

    if def.heartbeat {
        if !def.fields.is_empty() {
            errors.push(ValidationError::message(index, ValidationReason::HeartbeatWithFields));
        }
        if def.direction != Direction::Bidirectional {
            errors.push(ValidationError::message(
                index,
                ValidationReason::HeartbeatDirection(def.direction),
            ));
        }
    } else if def.fields.is_empty() {
        errors.push(ValidationError::message(index, ValidationReason::EmptyMessage));
    }

    let mut field_names = HashSet::new();
    let mut fields = Vec::with_capacity(def.fields.len());
    for (field_index, field) in def.fields.iter().enumerate() {
        if !field_names.insert(field.name.as_str()) {
            errors.push(ValidationError::field(
                index,
                field_index,
                ValidationReason::DuplicateField(field.name.clone()),
            ));
            continue;
        }
        if !is_identifier(&field.name) {
            errors.push(ValidationError::field(
                index,
                field_index,
                ValidationReason::InvalidIdentifier(field.name.clone()),
            ));
            continue;
        }
        match FieldType::resolve(&field.type_name, field.max_len) {
            Ok(ty) => fields.push(ValidatedField {
                name: field.name.clone(),
                ty,
                optional: field.optional,
            }),
            Err(reason) => errors.push(ValidationError::field(index, field_index, reason)),
        }
    }

    if errors.len() > before {
        return None;
    }

    let message = ValidatedMessage {
        // Out-of-range tags are already reported as TooManyMessages.
        tag: u8::try_from(index).unwrap_or(u8::MAX),
        name: def.name.clone(),
        ident,
        direction: def.direction,
        heartbeat: def.heartbeat,
        fields,
    };

    let size = message.max_frame_size();
    if size > GPIO_SIZE {
        errors.push(ValidationError::message(
            index,
            ValidationReason::FrameTooLarge {
                size,
                limit: GPIO_SIZE,
            },
        ));
        return None;
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, Primitive};

    fn game_schema() -> ProtocolSchema {
        ProtocolSchema::default()
            .message(MessageDef::heartbeat("ping"))
            .message(
                MessageDef::new("player_move", Direction::ClientToServer)
                    .field(FieldDef::new("dx", "int8"))
                    .field(FieldDef::new("dy", "int8")),
            )
            .message(
                MessageDef::new("world", Direction::ServerToClient)
                    .field(FieldDef::new("tiles", "uint8[16]"))
                    .field(FieldDef::new("title", "string").optional()),
            )
    }

    #[test]
    fn test_valid_schema_assigns_tags_in_order() {
        let schema = validate(&game_schema()).unwrap();
        let tags: Vec<u8> = schema.messages().iter().map(|m| m.tag).collect();
        assert_eq!(tags, vec![0, 1, 2]);
        assert_eq!(schema.message("player_move").unwrap().ident, "PlayerMove");
        assert_eq!(schema.by_tag(2).unwrap().name, "world");
        assert!(schema.by_tag(3).is_none());
    }

    #[test]
    fn test_fields_are_resolved() {
        let schema = validate(&game_schema()).unwrap();
        let world = schema.message("world").unwrap();
        assert_eq!(
            world.fields[0].ty,
            FieldType::Array {
                elem: Primitive::UInt8,
                len: 16
            }
        );
        assert!(world.fields[1].optional);
        assert_eq!(world.field_index("title"), Some(1));
        // tag + 16 + presence + length + 32
        assert_eq!(world.max_frame_size(), 1 + 16 + 1 + 1 + 32);
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = validate(&ProtocolSchema::default()).unwrap_err();
        assert_eq!(err.reason, ValidationReason::NoMessages);
        assert_eq!(err.message_index, None);
    }

    #[test]
    fn test_too_many_messages_rejected() {
        let messages = (0..=MAX_MESSAGES)
            .map(|i| MessageDef::new(format!("m{i}"), Direction::Bidirectional).field(FieldDef::new("v", "bool")))
            .collect();
        let errors = validate_all(&ProtocolSchema::new(messages)).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e.reason, ValidationReason::TooManyMessages { count: 241, .. })));
    }

    #[test]
    fn test_duplicate_message_rejected() {
        let schema = game_schema().message(MessageDef::heartbeat("ping"));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err.message_index, Some(3));
        assert_eq!(err.reason, ValidationReason::DuplicateMessage("ping".into()));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let schema = ProtocolSchema::default().message(
            MessageDef::new("m", Direction::ClientToServer)
                .field(FieldDef::new("a", "bool"))
                .field(FieldDef::new("a", "uint8")),
        );
        let err = validate(&schema).unwrap_err();
        assert_eq!(err.message_index, Some(0));
        assert_eq!(err.field_index, Some(1));
        assert_eq!(err.reason, ValidationReason::DuplicateField("a".into()));
    }

    #[test]
    fn test_unknown_type_rejected_with_location() {
        let schema = game_schema().message(
            MessageDef::new("score", Direction::ServerToClient)
                .field(FieldDef::new("points", "uint16"))
                .field(FieldDef::new("big", "int64")),
        );
        let err = validate(&schema).unwrap_err();
        assert_eq!(err.message_index, Some(3));
        assert_eq!(err.field_index, Some(1));
        assert_eq!(err.reason, ValidationReason::UnknownType("int64".into()));
    }

    #[test]
    fn test_empty_message_requires_heartbeat_flag() {
        let schema =
            ProtocolSchema::default().message(MessageDef::new("nothing", Direction::ClientToServer));
        let err = validate(&schema).unwrap_err();
        assert_eq!(err.reason, ValidationReason::EmptyMessage);
    }

    #[test]
    fn test_heartbeat_rules() {
        let mut hb = MessageDef::heartbeat("hb").field(FieldDef::new("x", "bool"));
        hb.direction = Direction::ClientToServer;
        let errors = validate_all(&ProtocolSchema::default().message(hb)).unwrap_err();
        assert!(errors.contains(&ValidationError::message(0, ValidationReason::HeartbeatWithFields)));
        assert!(errors.contains(&ValidationError::message(
            0,
            ValidationReason::HeartbeatDirection(Direction::ClientToServer)
        )));
    }

    #[test]
    fn test_generated_name_collision_rejected() {
        let schema = ProtocolSchema::default()
            .message(MessageDef::new("player_move", Direction::ClientToServer).field(FieldDef::new("x", "bool")))
            .message(MessageDef::new("playerMove", Direction::ServerToClient).field(FieldDef::new("x", "bool")));
        let err = validate(&schema).unwrap_err();
        assert_eq!(
            err.reason,
            ValidationReason::GeneratedNameCollision {
                ident: "PlayerMove".into(),
                other: "player_move".into(),
            }
        );
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let schema = ProtocolSchema::default()
            .message(MessageDef::new("bad-name", Direction::ClientToServer).field(FieldDef::new("x", "bool")))
            .message(MessageDef::new("good", Direction::ClientToServer).field(FieldDef::new("1x", "bool")));
        let errors = validate_all(&schema).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].reason, ValidationReason::InvalidIdentifier("bad-name".into()));
        assert_eq!(errors[1].field_index, Some(0));
    }

    #[test]
    fn test_frame_larger_than_gpio_rejected() {
        let schema = ProtocolSchema::default().message(
            MessageDef::new("chat", Direction::Bidirectional)
                .field(FieldDef::new("text", "string").max_len(200)),
        );
        let err = validate(&schema).unwrap_err();
        assert_eq!(
            err.reason,
            ValidationReason::FrameTooLarge {
                size: 202,
                limit: GPIO_SIZE
            }
        );
    }

    #[test]
    fn test_validate_all_collects_every_error() {
        let schema = ProtocolSchema::default()
            .message(MessageDef::new("a", Direction::ClientToServer))
            .message(MessageDef::new("b", Direction::ClientToServer).field(FieldDef::new("f", "what")))
            .message(MessageDef::new("a", Direction::ClientToServer));
        let errors = validate_all(&schema).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = validate(&game_schema()).unwrap();
        let b = validate(&game_schema()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let changed = game_schema().message(MessageDef::heartbeat("pong"));
        let c = validate(&changed).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
