//! File-backed roots shared by identity.
//!
//! A [`Registry`] decodes each file once and hands every caller the same
//! root, so delvers opened on one file observe each other's writes.
//! Writing the data back is explicit, through [`Registry::persist`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::delver::Delver;
use crate::error::LoadError;
use crate::node::Node;

/// Turns raw bytes into a nested structure.
pub trait Decoder {
    type Error: StdError + Send + Sync + 'static;

    fn decode(&self, bytes: &[u8]) -> Result<Node, Self::Error>;
}

/// Turns a nested structure back into bytes.
pub trait Encoder {
    type Error: StdError + Send + Sync + 'static;

    fn encode(&self, root: &Node) -> Result<Vec<u8>, Self::Error>;
}

/// JSON via `serde_json`. Key order is preserved in both directions.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    /// Two-space indented output.
    pub pretty: bool,
}

impl Default for JsonCodec {
    fn default() -> Self {
        JsonCodec { pretty: true }
    }
}

impl Decoder for JsonCodec {
    type Error = serde_json::Error;

    fn decode(&self, bytes: &[u8]) -> Result<Node, Self::Error> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Node::from(value))
    }
}

impl Encoder for JsonCodec {
    type Error = serde_json::Error;

    fn encode(&self, root: &Node) -> Result<Vec<u8>, Self::Error> {
        if self.pretty {
            serde_json::to_vec_pretty(root)
        } else {
            serde_json::to_vec(root)
        }
    }
}

/// Options for [`Registry::open_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub readonly: bool,
}

/// Cache of decoded roots keyed by canonical file path.
#[derive(Debug, Default)]
pub struct Registry<C = JsonCodec> {
    codec: C,
    roots: RefCell<HashMap<PathBuf, Node>>,
}

impl Registry<JsonCodec> {
    pub fn new() -> Self {
        Registry::default()
    }
}

impl<C> Registry<C> {
    pub fn with_codec(codec: C) -> Self {
        Registry {
            codec,
            roots: RefCell::new(HashMap::new()),
        }
    }

    /// Number of cached roots.
    pub fn len(&self) -> usize {
        self.roots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.borrow().is_empty()
    }

    /// Drops the cached root for `id`. Existing delvers keep their data; the
    /// next load decodes the file again.
    pub fn forget(&self, id: impl AsRef<Path>) -> Result<Option<Node>, LoadError> {
        let key = cache_key(id.as_ref())?;
        Ok(self.roots.borrow_mut().remove(&key))
    }
}

impl<C: Decoder> Registry<C> {
    /// Returns the shared root for `id`, reading and decoding the file the
    /// first time.
    ///
    /// # Errors
    ///
    /// - [`LoadError::Unreadable`] if the path cannot be resolved or read
    /// - [`LoadError::Invalid`] if the decoder rejects the contents
    pub fn load(&self, id: impl AsRef<Path>) -> Result<Node, LoadError> {
        let key = cache_key(id.as_ref())?;
        if let Some(root) = self.roots.borrow().get(&key) {
            debug!(path = %key.display(), "registry hit");
            return Ok(root.clone());
        }

        let bytes = fs::read(&key).map_err(|source| LoadError::Unreadable {
            path: key.clone(),
            source,
        })?;
        let root = self
            .codec
            .decode(&bytes)
            .map_err(|source| LoadError::Invalid {
                path: key.clone(),
                source: Box::new(source),
            })?;
        debug!(path = %key.display(), bytes = bytes.len(), "registry decoded");
        self.roots.borrow_mut().insert(key, root.clone());
        Ok(root)
    }

    /// A delver over the shared root for `id`.
    pub fn open(&self, id: impl AsRef<Path>) -> Result<Delver, LoadError> {
        self.open_with(id, OpenOptions::default())
    }

    /// A read-only delver over the shared root for `id`.
    pub fn open_readonly(&self, id: impl AsRef<Path>) -> Result<Delver, LoadError> {
        self.open_with(id, OpenOptions { readonly: true })
    }

    pub fn open_with(
        &self,
        id: impl AsRef<Path>,
        options: OpenOptions,
    ) -> Result<Delver, LoadError> {
        let delver = Delver::new(self.load(id)?);
        Ok(if options.readonly {
            delver.into_readonly()
        } else {
            delver
        })
    }
}

impl<C: Encoder> Registry<C> {
    /// Encodes the shared root for `id` and writes it back to the file.
    ///
    /// # Errors
    ///
    /// - [`LoadError::NotLoaded`] if `id` was never loaded (or was forgotten)
    /// - [`LoadError::Unencodable`] if the encoder rejects the data
    /// - [`LoadError::Unwritable`] if the file cannot be written
    pub fn persist(&self, id: impl AsRef<Path>) -> Result<(), LoadError> {
        let key = cache_key(id.as_ref())?;
        let root = self.roots.borrow().get(&key).cloned();
        let Some(root) = root else {
            return Err(LoadError::NotLoaded { path: key });
        };
        let bytes = self
            .codec
            .encode(&root)
            .map_err(|source| LoadError::Unencodable {
                path: key.clone(),
                source: Box::new(source),
            })?;
        fs::write(&key, &bytes).map_err(|source| LoadError::Unwritable {
            path: key.clone(),
            source,
        })?;
        debug!(path = %key.display(), bytes = bytes.len(), "registry persisted");
        Ok(())
    }
}

/// Two spellings of the same file share one cache entry.
///
/// A file that no longer exists is keyed through its canonical directory, so
/// a deleted or moved file can still be forgotten or persisted.
fn cache_key(id: &Path) -> Result<PathBuf, LoadError> {
    let source = match fs::canonicalize(id) {
        Ok(key) => return Ok(key),
        Err(source) => source,
    };
    let unreadable = |source: io::Error| LoadError::Unreadable {
        path: id.to_path_buf(),
        source,
    };
    let (Some(parent), Some(name)) = (id.parent(), id.file_name()) else {
        return Err(unreadable(source));
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match fs::canonicalize(parent) {
        Ok(dir) => Ok(dir.join(name)),
        Err(_) => Err(unreadable(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_decode() {
        let node = JsonCodec::default()
            .decode(br#"{"b": 1, "a": [true, null]}"#)
            .unwrap();
        assert_eq!(node, json!({"b": 1, "a": [true, null]}));
        let keys: Vec<String> = node.as_map().unwrap().borrow().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        assert!(JsonCodec::default().decode(b"{not json").is_err());
    }

    #[test]
    fn test_json_codec_encode() {
        let node = Node::from(json!({"a": [1, 2]}));
        let compact = JsonCodec { pretty: false }.encode(&node).unwrap();
        assert_eq!(compact, br#"{"a":[1,2]}"#);
        let pretty = JsonCodec::default().encode(&node).unwrap();
        assert_eq!(
            String::from_utf8(pretty).unwrap(),
            "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_cache_key_of_missing_file_uses_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.json");
        let key = cache_key(&path).unwrap();
        assert_eq!(key, fs::canonicalize(dir.path()).unwrap().join("gone.json"));
    }

    #[test]
    fn test_missing_file() {
        let registry = Registry::new();
        let err = registry.load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
        assert!(registry.is_empty());
    }
}
