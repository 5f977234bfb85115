use crate::types::Path;
use crate::validate::validate_pointer;
use crate::PointerError;

/// Unescapes a pointer segment.
///
/// `~1` becomes `/` and `~0` becomes `~`. The segment is scanned once from the
/// left, so `~01` decodes to `~1` rather than `/`.
///
/// # Errors
///
/// [`PointerError::InvalidEscape`] if a `~` is not followed by `0` or `1`.
///
/// # Example
///
/// ```
/// use delve_pointer::unescape_component;
///
/// assert_eq!(unescape_component("a~0b").unwrap(), "a~b");
/// assert_eq!(unescape_component("c~1d").unwrap(), "c/d");
/// assert_eq!(unescape_component("~01").unwrap(), "~1");
/// assert!(unescape_component("bad~").is_err());
/// ```
pub fn unescape_component(component: &str) -> Result<String, PointerError> {
    unescape_at(component, 0)
}

fn unescape_at(component: &str, base: usize) -> Result<String, PointerError> {
    if !component.contains('~') {
        return Ok(component.to_string());
    }
    let mut out = String::with_capacity(component.len());
    let mut chars = component.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '0')) => out.push('~'),
            Some((_, '1')) => out.push('/'),
            _ => return Err(PointerError::InvalidEscape { offset: base + i }),
        }
    }
    Ok(out)
}

/// Escapes a token for use as a pointer segment.
///
/// # Example
///
/// ```
/// use delve_pointer::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// assert_eq!(escape_component("no-escapes"), "no-escapes");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    // ~ first, otherwise the ~ introduced by ~1 would be escaped again
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a pointer string into decoded tokens.
///
/// - `""` and `"/"` return no tokens (the root).
/// - Any other pointer must start with `/`; the remainder is split on `/`
///   and every segment is unescaped.
///
/// # Errors
///
/// [`PointerError::MissingLeadingSlash`] for relative pointers and
/// [`PointerError::InvalidEscape`] for bad escapes. Offsets in the latter are
/// relative to the whole pointer.
///
/// # Example
///
/// ```
/// use delve_pointer::parse_pointer;
///
/// assert_eq!(parse_pointer("").unwrap(), Vec::<String>::new());
/// assert_eq!(parse_pointer("/").unwrap(), Vec::<String>::new());
/// assert_eq!(parse_pointer("/foo/bar").unwrap(), vec!["foo", "bar"]);
/// assert_eq!(parse_pointer("/a~1b~0c").unwrap(), vec!["a/b~c"]);
/// ```
pub fn parse_pointer(pointer: &str) -> Result<Path, PointerError> {
    validate_pointer(pointer)?;
    if pointer.is_empty() || pointer == "/" {
        return Ok(Vec::new());
    }
    let mut path = Vec::new();
    let mut offset = 1;
    for segment in pointer[1..].split('/') {
        path.push(unescape_at(segment, offset)?);
        offset += segment.len() + 1;
    }
    Ok(path)
}

/// Format tokens into a pointer string.
///
/// Returns an empty string for the root. A single empty key formats as
/// `"/"`, which [`parse_pointer`] reads back as the root; deeper empty keys
/// such as `["", ""]` (`"//"`) are unambiguous.
///
/// # Example
///
/// ```
/// use delve_pointer::format_pointer;
///
/// assert_eq!(format_pointer(&[]), "");
/// assert_eq!(format_pointer(&["foo".to_string(), "bar".to_string()]), "/foo/bar");
/// assert_eq!(format_pointer(&["a/b~c".to_string()]), "/a~1b~0c");
/// ```
pub fn format_pointer(path: &[String]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for component in path {
        out.push('/');
        out.push_str(&escape_component(component));
    }
    out
}
