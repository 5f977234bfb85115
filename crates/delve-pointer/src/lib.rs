//! JSON Pointer (RFC 6901) path parsing.
//!
//! This crate turns pointer strings such as `/players/0/name` into the ordered
//! list of decoded tokens that a traversal engine consumes, and formats tokens
//! back into pointers.
//!
//! Two departures from a bare RFC 6901 reading:
//! - `""` and `"/"` both denote the root (zero tokens).
//! - A `~` that is not followed by `0` or `1` is rejected instead of being
//!   passed through.
//!
//! # Example
//!
//! ```
//! use delve_pointer::{parse_pointer, format_pointer};
//!
//! let path = parse_pointer("/a~1b~0c/0").unwrap();
//! assert_eq!(path, vec!["a/b~c".to_string(), "0".to_string()]);
//!
//! assert_eq!(format_pointer(&path), "/a~1b~0c/0");
//! ```

use thiserror::Error;

pub mod types;
pub use types::{Path, Token};

pub mod util;
pub use util::{escape_component, format_pointer, parse_pointer, unescape_component};

pub mod validate;
pub use validate::{is_valid_index, parse_index, validate_pointer};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// A non-root pointer must start with `/`.
    #[error("pointer must be empty or start with '/'")]
    MissingLeadingSlash,
    /// `~` must be followed by `0` or `1`. `offset` is the byte offset of the
    /// `~` within the pointer string.
    #[error("invalid escape sequence at byte {offset}: '~' must be followed by '0' or '1'")]
    InvalidEscape { offset: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_compose() {
        let pointers = vec!["", "/foo", "/foo/bar", "/a~0b", "/c~1d", "/a~0b/c~1d/1", "/foo///"];

        for pointer in pointers {
            let path = parse_pointer(pointer).unwrap();
            let formatted = format_pointer(&path);
            assert_eq!(formatted, pointer, "Failed roundtrip for: {:?}", pointer);
        }
    }

    #[test]
    fn test_slash_is_root_not_empty_key() {
        // "/" is the root here; the single empty key is not reachable at the top level.
        assert_eq!(parse_pointer("/").unwrap(), Vec::<String>::new());
        assert_eq!(format_pointer(&["".to_string()]), "/");
    }

    #[test]
    fn test_error_display() {
        let err = parse_pointer("/a~2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid escape sequence at byte 2: '~' must be followed by '0' or '1'"
        );
    }
}
