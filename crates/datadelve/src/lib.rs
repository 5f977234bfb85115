//! Path-based navigation and mutation of nested data.
//!
//! A [`Delver`] wraps a shared nested structure of mappings and sequences and
//! reads, writes and deletes inside it with JSON Pointer (RFC 6901) paths.
//! Delvers never copy the data they wrap: views created with
//! [`Delver::descend`] alias sub-containers, and writes through any handle
//! are seen by all of them.
//!
//! Writes do not create missing intermediate containers. Setting
//! `/missing/deep/path` on a structure without `missing` fails and leaves the
//! structure untouched.
//!
//! # Example
//!
//! ```
//! use datadelve::{Delver, DelveError};
//! use serde_json::json;
//!
//! let delver = Delver::new(json!({"a": {"b": {}}, "list": [1, 2, 3]}));
//!
//! let view = delver.descend("/a/b").unwrap();
//! view.set("/c", 5).unwrap();
//! assert_eq!(delver.get("/a/b/c").unwrap(), json!(5));
//!
//! delver.set("/list/3", 4).unwrap();
//! delver.delete("/list/0").unwrap();
//! assert_eq!(delver.get("/list").unwrap(), json!([2, 3, 4]));
//!
//! assert!(matches!(
//!     delver.set("/missing/deep/path", 1),
//!     Err(DelveError::PathNotFound { .. })
//! ));
//! ```
//!
//! Handles are single-threaded (`Rc`-based). Sharing one structure across
//! threads is not possible without converting it.

pub mod chain;
pub mod delver;
pub mod error;
pub mod loader;
pub mod node;

pub use chain::{ChainedDelver, MergeStrategy};
pub use delve_pointer as pointer;
pub use delver::Delver;
pub use error::{DelveError, Disallowed, LoadError, NotFound};
pub use loader::{Decoder, Encoder, JsonCodec, OpenOptions, Registry};
pub use node::{Map, MapHandle, Node, Opaque, SeqHandle, Shape};
