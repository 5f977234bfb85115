use std::fmt;
use std::io;
use std::path::PathBuf;

use delve_pointer::PointerError;
use thiserror::Error;

/// Failures of path-based navigation and mutation.
///
/// Every path in a variant is the full pointer seen from the outermost
/// delver, including the prefix a view was descended through.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DelveError {
    /// The path string itself is invalid. Detected before any traversal.
    #[error("malformed path {path:?}: {source}")]
    MalformedPath {
        path: String,
        #[source]
        source: PointerError,
    },
    /// A token could not be resolved. `path` is the part consumed before the
    /// failing `segment`.
    #[error("cannot resolve {segment:?} under {path:?}: {reason}")]
    PathNotFound {
        path: String,
        segment: String,
        reason: NotFound,
    },
    /// The operation is not allowed at this location whatever the data.
    #[error("invalid operation at {path:?}: {reason}")]
    InvalidOperation { path: String, reason: Disallowed },
    #[error("{path:?} is read-only")]
    ReadOnly { path: String },
    #[error("delver is already a layer of this chain")]
    DuplicateLayer,
    #[error("cannot merge values at {path:?}: {reason}")]
    MergeConflict { path: String, reason: String },
}

impl DelveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DelveError::PathNotFound { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DelveError::MalformedPath { .. })
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, DelveError::InvalidOperation { .. })
    }
}

/// Why a token did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    MissingKey,
    /// The token is not a base-10 non-negative integer.
    InvalidIndex,
    IndexOutOfRange { index: usize, len: usize },
    /// A scalar leaf was reached with tokens left over.
    NotAContainer,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::MissingKey => write!(f, "no such key"),
            NotFound::InvalidIndex => write!(f, "not a sequence index"),
            NotFound::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            NotFound::NotAContainer => write!(f, "value is not a container"),
        }
    }
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disallowed {
    /// set or delete with the root path.
    RootMutation,
    DescendIntoLeaf,
    NotIterable,
    EmptyChain,
}

impl fmt::Display for Disallowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disallowed::RootMutation => write!(f, "the root cannot be replaced or deleted"),
            Disallowed::DescendIntoLeaf => write!(f, "views can only be rooted at containers"),
            Disallowed::NotIterable => write!(f, "only containers can be iterated"),
            Disallowed::EmptyChain => write!(f, "the chain has no layers"),
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the file-backed registry.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} could not be read", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} could not be decoded", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("{} could not be written", .path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} could not be encoded", .path.display())]
    Unencodable {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("{} has not been loaded", .path.display())]
    NotLoaded { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = DelveError::PathNotFound {
            path: "/list".to_string(),
            segment: "5".to_string(),
            reason: NotFound::IndexOutOfRange { index: 5, len: 3 },
        };
        assert_eq!(
            err.to_string(),
            r#"cannot resolve "5" under "/list": index 5 out of range for length 3"#
        );
        assert!(err.is_not_found());
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_malformed_keeps_source() {
        use std::error::Error as _;

        let err = DelveError::MalformedPath {
            path: "/a~".to_string(),
            source: PointerError::InvalidEscape { offset: 2 },
        };
        assert!(err.is_malformed());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_operation_display() {
        let err = DelveError::InvalidOperation {
            path: String::new(),
            reason: Disallowed::RootMutation,
        };
        assert_eq!(
            err.to_string(),
            r#"invalid operation at "": the root cannot be replaced or deleted"#
        );
        assert!(err.is_invalid_operation());
    }
}
