//! Path-based access to a shared nested structure.

use std::cmp::Ordering;
use std::fmt;

use delve_pointer::{format_pointer, parse_index, parse_pointer, Path};
use tracing::trace;

use crate::error::{DelveError, Disallowed, NotFound};
use crate::node::{Node, Shape};

/// A handle for reading and writing inside a nested structure with pointer
/// paths.
///
/// A delver never copies the structure it wraps. Cloning a delver, or
/// descending into a sub-container with [`Delver::descend`], yields another
/// handle onto the same backing data, and every handle observes writes made
/// through any other.
///
/// Writes never create intermediate containers: `set("/a/b", v)` fails unless
/// `/a` already exists.
///
/// # Example
///
/// ```
/// use datadelve::Delver;
/// use serde_json::json;
///
/// let delver = Delver::new(json!({"party": {"members": ["ann", "bo"]}}));
/// let members = delver.descend("/party/members").unwrap();
/// members.set("/2", "cy").unwrap();
///
/// assert_eq!(delver.get("/party/members/2").unwrap(), json!("cy"));
/// ```
#[derive(Clone)]
pub struct Delver {
    root: Node,
    prefix: Path,
    readonly: bool,
}

impl Delver {
    pub fn new(root: impl Into<Node>) -> Self {
        Delver {
            root: root.into(),
            prefix: Vec::new(),
            readonly: false,
        }
    }

    /// A delver that rejects `set` and `delete`.
    pub fn new_readonly(root: impl Into<Node>) -> Self {
        Delver::new(root).into_readonly()
    }

    /// Turns this handle read-only. Views descended from it are read-only
    /// too; there is no way back.
    pub fn into_readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// The backing node this delver is rooted at.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The pointer this view was descended through, `""` for a top-level
    /// delver.
    pub fn prefix(&self) -> String {
        format_pointer(&self.prefix)
    }

    /// Returns true if both delvers are rooted at the same container.
    pub fn same_backing(&self, other: &Delver) -> bool {
        self.root.ptr_eq(&other.root)
    }

    /// Resolves `path` and returns the value found there.
    ///
    /// Containers come back as handles aliasing the backing structure.
    ///
    /// # Errors
    ///
    /// - [`DelveError::MalformedPath`] for bad escapes
    /// - [`DelveError::PathNotFound`] if any token does not resolve
    pub fn get(&self, path: &str) -> Result<Node, DelveError> {
        let tokens = self.parse(path)?;
        self.walk(&tokens)
    }

    /// Like [`Delver::get`], but reports a missing location as `false`.
    pub fn contains(&self, path: &str) -> Result<bool, DelveError> {
        match self.get(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Writes `value` at `path`.
    ///
    /// In a mapping the key is inserted or overwritten. In a sequence the
    /// final token must be an index no greater than the length: equal to
    /// the length appends, smaller overwrites.
    ///
    /// Values go through [`Node`]'s `From` impls, so a NaN or infinite `f64`
    /// is stored as null.
    ///
    /// # Errors
    ///
    /// - [`DelveError::MalformedPath`] for bad escapes
    /// - [`DelveError::ReadOnly`] on read-only handles
    /// - [`DelveError::InvalidOperation`] for the root path
    /// - [`DelveError::PathNotFound`] if the parent does not exist or the
    ///   index is invalid or past the end
    pub fn set(&self, path: &str, value: impl Into<Node>) -> Result<(), DelveError> {
        let tokens = self.parse(path)?;
        let (parent, at) = self.writable_parent(&tokens)?;
        let key = &tokens[at];
        match parent.shape() {
            Shape::Mapping(map) => {
                map.borrow_mut().insert(key.clone(), value.into());
            }
            Shape::Sequence(seq) => {
                let mut items = seq.borrow_mut();
                let len = items.len();
                let index = parse_index(key)
                    .ok_or_else(|| self.not_found(&tokens, at, NotFound::InvalidIndex))?;
                match index.cmp(&len) {
                    Ordering::Less => items[index] = value.into(),
                    Ordering::Equal => items.push(value.into()),
                    Ordering::Greater => {
                        return Err(self.not_found(
                            &tokens,
                            at,
                            NotFound::IndexOutOfRange { index, len },
                        ))
                    }
                }
            }
            Shape::Leaf => return Err(self.not_found(&tokens, at, NotFound::NotAContainer)),
        }
        trace!(path = %self.pointer_to(&tokens), "set");
        Ok(())
    }

    /// Removes the entry at `path` and returns it.
    ///
    /// Removing from a sequence shifts later elements down by one.
    ///
    /// # Errors
    ///
    /// Same as [`Delver::set`]; a missing key or out-of-range index is
    /// [`DelveError::PathNotFound`].
    pub fn delete(&self, path: &str) -> Result<Node, DelveError> {
        let tokens = self.parse(path)?;
        let (parent, at) = self.writable_parent(&tokens)?;
        let key = &tokens[at];
        let removed = match parent.shape() {
            Shape::Mapping(map) => {
                let removed = map.borrow_mut().shift_remove(key);
                removed.ok_or_else(|| self.not_found(&tokens, at, NotFound::MissingKey))?
            }
            Shape::Sequence(seq) => {
                let mut items = seq.borrow_mut();
                let len = items.len();
                let index = parse_index(key)
                    .ok_or_else(|| self.not_found(&tokens, at, NotFound::InvalidIndex))?;
                if index >= len {
                    return Err(self.not_found(
                        &tokens,
                        at,
                        NotFound::IndexOutOfRange { index, len },
                    ));
                }
                items.remove(index)
            }
            Shape::Leaf => return Err(self.not_found(&tokens, at, NotFound::NotAContainer)),
        };
        trace!(path = %self.pointer_to(&tokens), "delete");
        Ok(removed)
    }

    /// Returns a view rooted at the container found at `path`.
    ///
    /// The view aliases the sub-container: writes through it are visible
    /// here and the other way round. It inherits the read-only flag.
    ///
    /// # Errors
    ///
    /// - [`DelveError::MalformedPath`] / [`DelveError::PathNotFound`] as
    ///   for [`Delver::get`]
    /// - [`DelveError::InvalidOperation`] if the value is a scalar leaf
    pub fn descend(&self, path: &str) -> Result<Delver, DelveError> {
        let tokens = self.parse(path)?;
        let target = self.walk(&tokens)?;
        if !target.is_container() {
            return Err(DelveError::InvalidOperation {
                path: self.pointer_to(&tokens),
                reason: Disallowed::DescendIntoLeaf,
            });
        }
        let mut prefix = self.prefix.clone();
        prefix.extend(tokens);
        Ok(Delver {
            root: target,
            prefix,
            readonly: self.readonly,
        })
    }

    /// Children of the root: `(key, value)` for a mapping, `(index, value)`
    /// for a sequence.
    ///
    /// # Errors
    ///
    /// [`DelveError::InvalidOperation`] if the root is a scalar leaf.
    pub fn entries(&self) -> Result<Vec<(String, Node)>, DelveError> {
        let entries = match self.root.shape() {
            Shape::Mapping(map) => {
                let map = map.borrow();
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Shape::Sequence(seq) => {
                let items = seq.borrow();
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect()
            }
            Shape::Leaf => {
                return Err(DelveError::InvalidOperation {
                    path: self.prefix(),
                    reason: Disallowed::NotIterable,
                })
            }
        };
        Ok(entries)
    }

    pub(crate) fn parse(&self, path: &str) -> Result<Path, DelveError> {
        parse_pointer(path).map_err(|source| DelveError::MalformedPath {
            path: path.to_string(),
            source,
        })
    }

    /// Checks write permission and walks to the parent of the final token.
    /// Nothing is mutated before this succeeds.
    pub(crate) fn writable_parent(&self, tokens: &[String]) -> Result<(Node, usize), DelveError> {
        if self.readonly {
            return Err(DelveError::ReadOnly {
                path: self.pointer_to(tokens),
            });
        }
        let Some(at) = tokens.len().checked_sub(1) else {
            return Err(DelveError::InvalidOperation {
                path: self.prefix(),
                reason: Disallowed::RootMutation,
            });
        };
        let parent = self.walk(&tokens[..at])?;
        Ok((parent, at))
    }

    /// Resolves every token in order, starting at the root.
    fn walk(&self, tokens: &[String]) -> Result<Node, DelveError> {
        let mut current = self.root.clone();
        for at in 0..tokens.len() {
            current = self.step(&current, tokens, at)?;
        }
        Ok(current)
    }

    fn step(&self, current: &Node, tokens: &[String], at: usize) -> Result<Node, DelveError> {
        let token = &tokens[at];
        let found = match current.shape() {
            Shape::Mapping(map) => {
                let child = map.borrow().get(token).cloned();
                child.ok_or(NotFound::MissingKey)
            }
            Shape::Sequence(seq) => match parse_index(token) {
                Some(index) => {
                    let items = seq.borrow();
                    let child = items.get(index).cloned();
                    child.ok_or(NotFound::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
                }
                None => Err(NotFound::InvalidIndex),
            },
            Shape::Leaf => Err(NotFound::NotAContainer),
        };
        found.map_err(|reason| self.not_found(tokens, at, reason))
    }

    fn not_found(&self, tokens: &[String], at: usize, reason: NotFound) -> DelveError {
        DelveError::PathNotFound {
            path: self.pointer_to(&tokens[..at]),
            segment: tokens[at].clone(),
            reason,
        }
    }

    pub(crate) fn pointer_to(&self, tokens: &[String]) -> String {
        let mut full = self.prefix.clone();
        full.extend_from_slice(tokens);
        format_pointer(&full)
    }
}

impl fmt::Debug for Delver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delver")
            .field("prefix", &self.prefix())
            .field("readonly", &self.readonly)
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_pointer::PointerError;
    use serde_json::json;

    fn sample() -> Delver {
        Delver::new(json!({
            "string": "value",
            "dict": {"a": "A", "b": "B"},
            "list": ["string", 1, null, true],
            "nesting": {"multiple": {"levels": "here"}}
        }))
    }

    #[test]
    fn test_get() {
        let d = sample();
        assert_eq!(d.get("/string").unwrap(), json!("value"));
        assert_eq!(d.get("/dict/a").unwrap(), json!("A"));
        assert_eq!(d.get("/list/3").unwrap(), json!(true));
        assert_eq!(d.get("/list/2").unwrap(), json!(null));
        assert_eq!(d.get("/nesting/multiple/levels").unwrap(), json!("here"));
    }

    #[test]
    fn test_get_root_returns_root_handle() {
        let d = sample();
        assert!(d.get("").unwrap().ptr_eq(d.root()));
        assert!(d.get("/").unwrap().ptr_eq(d.root()));
    }

    #[test]
    fn test_get_missing_key() {
        let err = sample().get("/dict/z").unwrap_err();
        assert_eq!(
            err,
            DelveError::PathNotFound {
                path: "/dict".to_string(),
                segment: "z".to_string(),
                reason: NotFound::MissingKey,
            }
        );
    }

    #[test]
    fn test_get_sequence_index_rules() {
        let d = sample();
        for (path, reason) in [
            ("/list/4", NotFound::IndexOutOfRange { index: 4, len: 4 }),
            ("/list/x", NotFound::InvalidIndex),
            ("/list/-1", NotFound::InvalidIndex),
            ("/list/01", NotFound::InvalidIndex),
            ("/list/-", NotFound::InvalidIndex),
        ] {
            match d.get(path) {
                Err(DelveError::PathNotFound { reason: got, .. }) => {
                    assert_eq!(got, reason, "{path}")
                }
                other => panic!("unexpected result for {path}: {other:?}"),
            }
        }
    }

    #[test]
    fn test_get_through_leaf() {
        let err = sample().get("/string/more/tokens").unwrap_err();
        assert_eq!(
            err,
            DelveError::PathNotFound {
                path: "/string".to_string(),
                segment: "more".to_string(),
                reason: NotFound::NotAContainer,
            }
        );
    }

    #[test]
    fn test_numeric_token_is_a_key_in_mappings() {
        let d = Delver::new(json!({"1": "one", "list": ["zero", "one"]}));
        assert_eq!(d.get("/1").unwrap(), json!("one"));
        assert_eq!(d.get("/list/1").unwrap(), json!("one"));
    }

    #[test]
    fn test_escaped_keys() {
        let d = Delver::new(json!({"a/b": {"c~d": 1}}));
        assert_eq!(d.get("/a~1b/c~0d").unwrap(), json!(1));
    }

    #[test]
    fn test_malformed_path() {
        let d = sample();
        let err = d.get("/dict/~x").unwrap_err();
        assert_eq!(
            err,
            DelveError::MalformedPath {
                path: "/dict/~x".to_string(),
                source: PointerError::InvalidEscape { offset: 6 },
            }
        );
        assert!(d.set("dict", 1).unwrap_err().is_malformed());
    }

    #[test]
    fn test_set() {
        let d = sample();
        d.set("/dict/a", "New A").unwrap();
        assert_eq!(d.get("/dict/a").unwrap(), json!("New A"));
        d.set("/dict", "a dict no longer").unwrap();
        assert_eq!(d.get("/dict").unwrap(), json!("a dict no longer"));
        d.set("/new", "new value").unwrap();
        assert_eq!(d.get("/new").unwrap(), json!("new value"));
    }

    #[test]
    fn test_set_sequence() {
        let d = sample();
        d.set("/list/4", 5).unwrap();
        assert_eq!(d.get("/list").unwrap(), json!(["string", 1, null, true, 5]));
        d.set("/list/0", "first").unwrap();
        assert_eq!(d.get("/list/0").unwrap(), json!("first"));
        assert_eq!(d.get("/list").unwrap().as_seq().unwrap().len(), 5);

        let err = d.set("/list/7", 0).unwrap_err();
        assert!(matches!(
            err,
            DelveError::PathNotFound {
                reason: NotFound::IndexOutOfRange { index: 7, len: 5 },
                ..
            }
        ));
        let err = d.set("/list/x", 0).unwrap_err();
        assert!(matches!(
            err,
            DelveError::PathNotFound {
                reason: NotFound::InvalidIndex,
                ..
            }
        ));
    }

    #[test]
    fn test_set_does_not_create_parents() {
        let d = sample();
        let before = d.root().deep_clone();
        let err = d.set("/missing/deep/path", 1).unwrap_err();
        assert_eq!(
            err,
            DelveError::PathNotFound {
                path: String::new(),
                segment: "missing".to_string(),
                reason: NotFound::MissingKey,
            }
        );
        assert_eq!(*d.root(), before);
    }

    #[test]
    fn test_set_under_leaf() {
        let err = sample().set("/string/x", 1).unwrap_err();
        assert!(matches!(
            err,
            DelveError::PathNotFound {
                reason: NotFound::NotAContainer,
                ..
            }
        ));
    }

    #[test]
    fn test_delete() {
        let d = sample();
        assert_eq!(d.delete("/dict/a").unwrap(), json!("A"));
        assert_eq!(d.get("/dict").unwrap(), json!({"b": "B"}));
        assert_eq!(d.delete("/list/1").unwrap(), json!(1));
        assert_eq!(d.get("/list").unwrap(), json!(["string", null, true]));
        assert_eq!(d.get("/list/1").unwrap(), json!(null));
    }

    #[test]
    fn test_delete_missing() {
        let d = sample();
        assert!(d.delete("/dict/z").unwrap_err().is_not_found());
        assert!(d.delete("/list/4").unwrap_err().is_not_found());
        assert!(d.delete("/nope/a").unwrap_err().is_not_found());
        assert!(d.delete("/string/a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_root_protection() {
        let d = sample();
        for path in ["", "/"] {
            let err = d.set(path, 1).unwrap_err();
            assert_eq!(
                err,
                DelveError::InvalidOperation {
                    path: String::new(),
                    reason: Disallowed::RootMutation,
                }
            );
            assert!(d.delete(path).unwrap_err().is_invalid_operation());
        }
        assert_eq!(d.get("").unwrap(), sample().get("").unwrap());
    }

    #[test]
    fn test_descend() {
        let d = sample();
        let sub = d.descend("/dict").unwrap();
        assert_eq!(sub.get("/a").unwrap(), json!("A"));
        assert_eq!(sub.get("").unwrap(), json!({"a": "A", "b": "B"}));
        sub.set("/c", "C").unwrap();
        assert_eq!(sub.get("/c").unwrap(), json!("C"));
        sub.delete("/a").unwrap();
        assert_eq!(d.get("/dict").unwrap(), json!({"b": "B", "c": "C"}));

        let second = d.descend("/nesting").unwrap().descend("/multiple").unwrap();
        assert_eq!(second.get("").unwrap(), json!({"levels": "here"}));
        assert_eq!(second.prefix(), "/nesting/multiple");
    }

    #[test]
    fn test_descend_into_leaf() {
        let err = sample().descend("/dict/a").unwrap_err();
        assert_eq!(
            err,
            DelveError::InvalidOperation {
                path: "/dict/a".to_string(),
                reason: Disallowed::DescendIntoLeaf,
            }
        );
    }

    #[test]
    fn test_view_errors_carry_full_path() {
        let view = sample().descend("/nesting/multiple").unwrap();
        let err = view.get("/levels/deeper").unwrap_err();
        assert_eq!(
            err,
            DelveError::PathNotFound {
                path: "/nesting/multiple/levels".to_string(),
                segment: "deeper".to_string(),
                reason: NotFound::NotAContainer,
            }
        );
        let err = view.set("", 1).unwrap_err();
        assert_eq!(
            err,
            DelveError::InvalidOperation {
                path: "/nesting/multiple".to_string(),
                reason: Disallowed::RootMutation,
            }
        );
    }

    #[test]
    fn test_view_outlives_replacement_in_parent() {
        let d = sample();
        let view = d.descend("/dict").unwrap();
        d.set("/dict", json!({"fresh": true})).unwrap();
        // The view still aliases the container it was created over.
        assert_eq!(view.get("/a").unwrap(), json!("A"));
        assert_eq!(d.get("/dict").unwrap(), json!({"fresh": true}));
    }

    #[test]
    fn test_readonly() {
        let d = sample().into_readonly();
        assert_eq!(
            d.set("/dict/a", 1).unwrap_err(),
            DelveError::ReadOnly {
                path: "/dict/a".to_string()
            }
        );
        assert!(matches!(
            d.delete("/dict/a").unwrap_err(),
            DelveError::ReadOnly { .. }
        ));
        assert_eq!(d.get("/dict/a").unwrap(), json!("A"));

        let view = d.descend("/dict").unwrap();
        assert!(view.is_readonly());
        assert!(view.set("/a", 1).is_err());
    }

    #[test]
    fn test_contains() {
        let d = sample();
        assert!(d.contains("/dict/a").unwrap());
        assert!(!d.contains("/dict/z").unwrap());
        assert!(!d.contains("/string/z").unwrap());
        assert!(d.contains("/dict/~").is_err());
    }

    #[test]
    fn test_entries() {
        let d = sample();
        let dict = d.descend("/dict").unwrap().entries().unwrap();
        assert_eq!(
            dict,
            vec![
                ("a".to_string(), Node::from("A")),
                ("b".to_string(), Node::from("B")),
            ]
        );
        let list = d.descend("/list").unwrap().entries().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[3], ("3".to_string(), Node::from(true)));

        let leaf = Delver::new(5);
        assert_eq!(
            leaf.entries().unwrap_err(),
            DelveError::InvalidOperation {
                path: String::new(),
                reason: Disallowed::NotIterable,
            }
        );
    }

    #[test]
    fn test_scalar_root() {
        let d = Delver::new("just a string");
        assert_eq!(d.get("").unwrap(), json!("just a string"));
        assert!(d.get("/a").unwrap_err().is_not_found());
        assert!(d.set("/a", 1).unwrap_err().is_not_found());
        assert!(d.descend("").unwrap_err().is_invalid_operation());
    }
}
