//! Value Objects
//!
//! 生成時にバリデーションを行い、不正な値を持つインスタンスが存在しないことを保証します。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// Maximum length of a chat message body, in characters
pub const MAX_MESSAGE_BODY_CHARS: usize = 1000;
/// Maximum length of a display name, in characters
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;
/// Maximum length of a reaction kind, in characters
pub const MAX_REACTION_KIND_CHARS: usize = 32;
/// Maximum length of user / room / connection ids
pub const MAX_ID_CHARS: usize = 128;

/// Prefix that marks a message id synthesized while the store was unavailable.
pub const TEMPORARY_MESSAGE_ID_PREFIX: &str = "temp_";

fn validated(
    field: &'static str,
    value: String,
    max: usize,
) -> Result<String, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValueObjectError::TooLong { field, max });
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Declares a trimmed, non-empty, length-bounded string newtype.
macro_rules! string_value_object {
    ($(#[$meta:meta])* $name:ident, $field:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(in crate::domain) String);

        impl $name {
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validated($field, value, $max).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_value_object!(
    /// Transport session id, unique for the lifetime of one WebSocket.
    ConnectionId,
    "connection id",
    MAX_ID_CHARS
);

string_value_object!(
    /// Authenticated user id supplied by the identity claim.
    UserId,
    "user id",
    MAX_ID_CHARS
);

string_value_object!(
    /// Broadcast scope: one prediction's discussion thread.
    RoomId,
    "room id",
    MAX_ID_CHARS
);

string_value_object!(DisplayName, "display name", MAX_DISPLAY_NAME_CHARS);

string_value_object!(
    /// Reaction kind (emoji or short name such as "fire").
    ReactionKind,
    "reaction kind",
    MAX_REACTION_KIND_CHARS
);

string_value_object!(
    /// Chat message body, trimmed and non-empty.
    MessageBody,
    "message body",
    MAX_MESSAGE_BODY_CHARS
);

impl ConnectionId {
    /// Generate a fresh random connection id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Message id: either durable (assigned by the store) or temporary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub(in crate::domain) String);

impl MessageId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validated("message id", value, MAX_ID_CHARS).map(Self)
    }

    /// Synthesize an id for a message that could not be persisted.
    pub fn temporary() -> Self {
        Self(format!("{}{}", TEMPORARY_MESSAGE_ID_PREFIX, Uuid::new_v4()))
    }

    /// Whether this id was synthesized in degraded mode.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_MESSAGE_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `self` until `now` (zero if `now` is earlier).
    pub fn elapsed_until(&self, now: Timestamp) -> i64 {
        (now.0 - self.0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_is_trimmed() {
        // テスト項目: メッセージ本文は前後の空白が除去される
        // given (前提条件):
        let raw = "  hello  ".to_string();

        // when (操作):
        let body = MessageBody::new(raw).unwrap();

        // then (期待する結果):
        assert_eq!(body.as_str(), "hello");
    }

    #[test]
    fn test_message_body_rejects_whitespace_only() {
        // テスト項目: 空白のみの本文は Empty エラーになる
        // given (前提条件):
        let raw = " \n\t ".to_string();

        // when (操作):
        let result = MessageBody::new(raw);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Empty("message body")));
    }

    #[test]
    fn test_message_body_rejects_too_long() {
        // テスト項目: 上限を超える本文は TooLong エラーになる
        // given (前提条件):
        let raw = "a".repeat(MAX_MESSAGE_BODY_CHARS + 1);

        // when (操作):
        let result = MessageBody::new(raw);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ValueObjectError::TooLong {
                field: "message body",
                max: MAX_MESSAGE_BODY_CHARS
            })
        );
    }

    #[test]
    fn test_message_body_limit_counts_characters_not_bytes() {
        // テスト項目: 上限は文字数で判定される（マルチバイト文字）
        // given (前提条件):
        let raw = "あ".repeat(MAX_MESSAGE_BODY_CHARS);

        // when (操作):
        let result = MessageBody::new(raw);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_temporary_message_id_is_recognizable() {
        // テスト項目: 一時 ID はプレフィックスで識別でき、毎回異なる
        // given (前提条件):
        let durable = MessageId::new("7f9c3a3e-0000-4000-8000-000000000001".to_string()).unwrap();

        // when (操作):
        let temp1 = MessageId::temporary();
        let temp2 = MessageId::temporary();

        // then (期待する結果):
        assert!(temp1.is_temporary());
        assert!(temp1.as_str().starts_with("temp_"));
        assert_ne!(temp1, temp2);
        assert!(!durable.is_temporary());
    }

    #[test]
    fn test_room_id_rejects_empty() {
        // テスト項目: 空の RoomId は作成できない
        // given (前提条件):

        // when (操作):
        let result = RoomId::try_from("");

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::Empty("room id")));
    }

    #[test]
    fn test_timestamp_elapsed_until_never_negative() {
        // テスト項目: 経過時間は負にならない
        // given (前提条件):
        let earlier = Timestamp::new(1_000);
        let later = Timestamp::new(4_000);

        // when (操作):
        let forward = earlier.elapsed_until(later);
        let backward = later.elapsed_until(earlier);

        // then (期待する結果):
        assert_eq!(forward, 3_000);
        assert_eq!(backward, 0);
    }
}
