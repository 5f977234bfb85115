//! Validation of pointer strings and sequence index tokens.

use crate::PointerError;

/// Validate the overall shape of a pointer string.
///
/// Escape sequences are checked while parsing, not here.
///
/// # Errors
///
/// [`PointerError::MissingLeadingSlash`] if the pointer is non-empty but
/// doesn't start with `/`.
///
/// # Example
///
/// ```
/// use delve_pointer::validate_pointer;
///
/// validate_pointer("").unwrap();
/// validate_pointer("/foo/bar").unwrap();
/// validate_pointer("foo").unwrap_err();
/// ```
pub fn validate_pointer(pointer: &str) -> Result<(), PointerError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        return Ok(());
    }
    Err(PointerError::MissingLeadingSlash)
}

/// Check if a token is a well-formed sequence index.
///
/// Only ASCII digits are accepted, and a leading zero only for `"0"` itself.
///
/// # Example
///
/// ```
/// use delve_pointer::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("1.5"));
/// assert!(!is_valid_index("01"));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

/// Parse a token as a sequence index.
///
/// Returns `None` for malformed tokens and for values that do not fit in
/// `usize`.
///
/// # Example
///
/// ```
/// use delve_pointer::parse_index;
///
/// assert_eq!(parse_index("3"), Some(3));
/// assert_eq!(parse_index("+3"), None);
/// assert_eq!(parse_index("99999999999999999999999"), None);
/// ```
pub fn parse_index(token: &str) -> Option<usize> {
    if !is_valid_index(token) {
        return None;
    }
    token.parse().ok()
}
