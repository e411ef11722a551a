/*!
 * Error types for the codedtext library.
 *
 * Fragment and store operations report `FragmentError`, the inline markup
 * reader adds `MarkupError`, and document-level code works with `AppError`.
 * All of them use the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

use crate::model::markers::{MarkerClass, TagKey};

/// Errors raised by fragment mutations and tag store lookups
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FragmentError {
    /// A closing code or annotation was requested but nothing with that id is open
    #[error("No unclosed opening tag with id '{id}' (position {position})")]
    UnmatchedCloseTag {
        /// Id of the closing tag
        id: String,
        /// Coded-text position where the closing was attempted
        position: usize,
    },

    /// The range would split a marker pair or cut through a marker
    #[error("Invalid range [{start}, {end}): {reason}")]
    InvalidRange {
        /// Start of the range (inclusive)
        start: usize,
        /// End of the range (exclusive)
        end: usize,
        /// What is wrong with the range, including the offending tag id if any
        reason: String,
    },

    /// A marker references a key absent from the store
    #[error("Unknown tag reference {key}{}", .position.map(|p| format!(" at position {}", p)).unwrap_or_default())]
    UnknownTagReference {
        /// The dangling key
        key: TagKey,
        /// Coded-text position of the marker, when known
        position: Option<usize>,
    },

    /// An annotation payload failed its own validation
    #[error("Invalid {kind} metadata: {reason}")]
    InvalidMetadata {
        /// Metadata variant name
        kind: String,
        /// Validation failure
        reason: String,
    },

    /// A position is out of bounds or falls inside a marker
    #[error("Invalid position {position}: {reason}")]
    InvalidPosition {
        /// The offending coded-text position
        position: usize,
        /// Why the position was rejected
        reason: String,
    },

    /// A tag attribute value is not allowed
    #[error("Invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute {
        /// Attribute name
        attribute: String,
        /// Rejected value
        value: String,
    },

    /// A marker class ran out of key indices in one tag table
    #[error("No more keys available for {class} markers")]
    KeySpaceExhausted {
        /// The exhausted class
        class: MarkerClass,
    },

    /// A locale code could not be validated
    #[error("Invalid locale '{0}'")]
    InvalidLocale(String),
}

impl FragmentError {
    /// Attach a coded-text position to an `UnknownTagReference` that lacks one.
    pub fn at_position(self, pos: usize) -> Self {
        match self {
            Self::UnknownTagReference { key, position: None } => Self::UnknownTagReference {
                key,
                position: Some(pos),
            },
            other => other,
        }
    }

    /// Shorthand for attribute validation failures
    pub fn invalid_attribute(attribute: &str, value: &str) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    /// Shorthand for metadata validation failures
    pub fn invalid_metadata(kind: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading inline markup back into a fragment
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    /// The markup is not well-formed
    #[error("Malformed markup at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset in the markup
        offset: usize,
        /// What went wrong
        reason: String,
    },

    /// An element the inline reader does not handle
    #[error("Unsupported element <{element}> at offset {offset}")]
    UnsupportedElement {
        /// Element name
        element: String,
        /// Byte offset in the markup
        offset: usize,
    },

    /// The fragment rejected one of the reconstructed operations
    #[error("Fragment error: {0}")]
    Fragment(#[from] FragmentError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a fragment operation
    #[error("Fragment error: {0}")]
    Fragment(#[from] FragmentError),

    /// Error from the inline markup reader
    #[error("Markup error: {0}")]
    Markup(#[from] MarkupError),

    /// A document could not be decoded
    #[error("Document error: {0}")]
    Document(String),

    /// A rendered segment did not read back to the same coded text
    #[error("Round trip mismatch in segment '{segment}' of unit '{unit}'")]
    RoundTrip {
        /// Unit id
        unit: String,
        /// Segment id or index
        segment: String,
    },

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Document(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknownTagReference_atPosition_shouldFillMissingPosition() {
        let key = TagKey::new(MarkerClass::CodeOpening, 3);
        let err = FragmentError::UnknownTagReference { key, position: None }.at_position(7);
        assert_eq!(err, FragmentError::UnknownTagReference { key, position: Some(7) });
        assert!(err.to_string().contains("at position 7"));
    }

    #[test]
    fn test_unmatchedCloseTag_display_shouldNameIdAndPosition() {
        let err = FragmentError::UnmatchedCloseTag { id: "b1".to_string(), position: 12 };
        let msg = err.to_string();
        assert!(msg.contains("'b1'"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_appError_fromFragmentError_shouldWrap() {
        let err: AppError = FragmentError::InvalidLocale("xx-".to_string()).into();
        assert!(matches!(err, AppError::Fragment(FragmentError::InvalidLocale(_))));
    }
}
