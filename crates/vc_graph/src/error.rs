use core::fmt;
use std::io;

use thiserror::Error;

use crate::stream::Pass;

// -----------------------------------------------------------------------------
// GraphError

/// A fault raised while writing or reading an object graph.
///
/// Most variants are data faults: the stream or the local type model did not
/// match what the reader expected. [`GraphError::is_fatal`] singles out the
/// faults that indicate a broken session rather than bad input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    #[error("Invalid stream header: {0}")]
    InvalidHeader(String),

    #[error("Invalid data{}: {message}{}", objects_suffix(.objects), trail_suffix(.trail))]
    InvalidData {
        message: String,
        objects: Option<usize>,
        trail: Option<String>,
    },

    #[error("Cannot load type `{0}`")]
    TypeLoad(String),

    #[error("No driver found for `{0}`")]
    DriverNotFound(String),

    #[error("Value {value} of `{source_type}` does not fit into `{target_type}`")]
    Overflow {
        value: String,
        source_type: String,
        target_type: String,
    },

    #[error("Structural mutation conflict on `{0}`: its driver cannot read reference data as a value")]
    MutationConflict(String),

    #[error("Driver context is already leased by another session")]
    ContextInUse,

    #[error("Stream restart failed: {0}")]
    Restart(String),

    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Custom(String),
}

fn objects_suffix(objects: &Option<usize>) -> String {
    match objects {
        Some(count) => format!(" after {count} values"),
        None => String::new(),
    }
}

fn trail_suffix(trail: &Option<String>) -> String {
    match trail {
        Some(trail) => format!(" (while reading {trail})"),
        None => String::new(),
    }
}

impl GraphError {
    /// Creates an [`InvalidData`](Self::InvalidData) fault without position
    /// information. The reader attaches its object count and type trail on
    /// the way out.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
            objects: None,
            trail: None,
        }
    }

    pub fn custom(message: impl fmt::Display) -> Self {
        Self::Custom(message.to_string())
    }

    pub fn overflow(
        value: impl fmt::Display,
        source_type: impl fmt::Display,
        target_type: impl fmt::Display,
    ) -> Self {
        Self::Overflow {
            value: value.to_string(),
            source_type: source_type.to_string(),
            target_type: target_type.to_string(),
        }
    }

    /// Returns `true` for faults that cannot be recovered by fixing the input:
    /// a failed restart, a context used by two sessions at once, or a driver
    /// that cannot take part in a reference/value conversion.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Restart(_) | Self::ContextInUse | Self::MutationConflict(_)
        )
    }

    /// Fills in the position of an [`InvalidData`](Self::InvalidData) fault
    /// unless an inner frame already did.
    pub(crate) fn locate(self, count: usize, at: impl FnOnce() -> Option<String>) -> Self {
        match self {
            Self::InvalidData {
                message,
                objects: None,
                trail: None,
            } => Self::InvalidData {
                message,
                objects: Some(count),
                trail: at(),
            },
            other => other,
        }
    }
}

// -----------------------------------------------------------------------------
// SessionError

/// The direction of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Encode,
    Decode,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => f.write_str("encode"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

/// A [`GraphError`] tagged with the session action and pass it happened in.
#[derive(Debug, Error)]
#[error("Failed to {action} object graph{}: {source}", .pass.describe())]
pub struct SessionError {
    action: Action,
    pass: Pass,
    #[source]
    source: GraphError,
}

impl SessionError {
    pub(crate) fn new(action: Action, pass: Pass, source: GraphError) -> Self {
        Self {
            action,
            pass,
            source,
        }
    }

    #[inline]
    pub fn action(&self) -> Action {
        self.action
    }

    #[inline]
    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// The underlying fault.
    #[inline]
    pub fn fault(&self) -> &GraphError {
        &self.source
    }

    #[inline]
    pub fn into_fault(self) -> GraphError {
        self.source
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

// -----------------------------------------------------------------------------
// RegisterError

/// Returned by [`KnownObjects::register`](crate::object::KnownObjects::register).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegisterError {
    #[error("Key `{0}` is already registered to a different object")]
    KeyTaken(String),

    #[error("Object is already registered as `{existing}`, cannot register it as `{key}`")]
    ObjectTaken { key: String, existing: String },
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_data_is_located_once() {
        let err = GraphError::invalid_data("bad marker")
            .locate(3, || Some("Node".into()))
            .locate(1, || Some("List".into()));

        assert_eq!(
            err.to_string(),
            "Invalid data after 3 values: bad marker (while reading Node)"
        );
    }

    #[test]
    fn fatal_faults() {
        assert!(GraphError::ContextInUse.is_fatal());
        assert!(GraphError::Restart("twice".into()).is_fatal());
        assert!(!GraphError::TypeLoad("a::B".into()).is_fatal());
        assert!(!GraphError::overflow(256, "core::i32", "core::u8").is_fatal());
    }

    #[test]
    fn session_error_mentions_pass() {
        let err = SessionError::new(Action::Decode, Pass::Second, GraphError::ContextInUse);
        assert_eq!(
            err.to_string(),
            "Failed to decode object graph (second pass): Driver context is already leased by another session"
        );
        assert!(err.is_fatal());
    }
}
