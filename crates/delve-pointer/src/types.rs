//! Type definitions for pointer paths.

/// One decoded pointer segment.
///
/// Tokens stay uninterpreted strings until they are applied to a container:
/// a mapping uses them verbatim as keys, a sequence parses them as indices.
pub type Token = String;

/// A decoded pointer: the ordered tokens from the root to the target.
pub type Path = Vec<Token>;
