//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The value carried leading or trailing whitespace.
    #[error("{field} cannot start or end with whitespace: {value:?}")]
    Untrimmed { field: &'static str, value: String },

    /// The value contained a character that is not allowed.
    #[error("{field} contains invalid character {character:?}: {value}")]
    InvalidCharacter {
        field: &'static str,
        value: String,
        character: char,
    },

    /// The value is a word with a fixed meaning elsewhere.
    #[error("{field} {value:?} is reserved")]
    Reserved { field: &'static str, value: String },

    /// A time window whose end precedes its start.
    #[error("window end {end} precedes start {start}")]
    InvertedWindow { start: String, end: String },
}

/// Generates a validated name newtype with common trait implementations.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal, $allowed:expr $(, reserved = $reserved:expr)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new name after validation.
            pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
                let name = name.into();
                if name.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if name.trim() != name {
                    return Err(ValidationError::Untrimmed {
                        field: $field_name,
                        value: name,
                    });
                }
                let allowed: fn(char) -> bool = $allowed;
                if let Some(character) = name.chars().find(|c| !allowed(*c)) {
                    return Err(ValidationError::InvalidCharacter {
                        field: $field_name,
                        value: name,
                        character,
                    });
                }
                $(
                    let reserved: &[&str] = $reserved;
                    if reserved.iter().any(|word| word.eq_ignore_ascii_case(&name)) {
                        return Err(ValidationError::Reserved {
                            field: $field_name,
                            value: name,
                        });
                    }
                )?
                Ok(Self(name))
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// A validated task name.
    ///
    /// Task names are non-empty, trimmed, and free of control characters.
    /// Uniqueness is enforced by the store.
    TaskName, "task name", |c| !c.is_control()
);

define_name!(
    /// A validated tag name.
    TagName, "tag name", |c| !c.is_control()
);

define_name!(
    /// A validated bookmark name.
    ///
    /// Bookmarks are referenced by their bare name inside time expressions, so
    /// they are restricted to a single word of ASCII letters, digits, `-` and `_`,
    /// and may not shadow a time keyword.
    BookmarkName, "bookmark name", |c| c.is_ascii_alphanumeric() || c == '-' || c == '_',
    reserved = RESERVED_BOOKMARK_NAMES
);

/// Words that time expressions resolve before bookmarks.
pub const RESERVED_BOOKMARK_NAMES: &[&str] = &["now"];

/// Identifier of a log entry.
///
/// Assigned by the store from a monotonically increasing sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
