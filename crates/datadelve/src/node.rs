//! The shared nested data model.
//!
//! A [`Node`] is either a scalar leaf or a handle to a container. Container
//! handles are reference counted: cloning a node that holds a map or a
//! sequence clones the handle, never the contents, so every clone observes
//! writes made through any other.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Contents of a mapping container.
pub type Map = IndexMap<String, Node>;

/// Shared handle to a mapping container.
#[derive(Clone, Default)]
pub struct MapHandle(Rc<RefCell<Map>>);

impl MapHandle {
    pub fn new(map: Map) -> Self {
        MapHandle(Rc::new(RefCell::new(map)))
    }

    /// Immutably borrows the entries.
    ///
    /// # Panics
    ///
    /// Panics if the map is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Map> {
        self.0.borrow()
    }

    /// Mutably borrows the entries.
    ///
    /// # Panics
    ///
    /// Panics if the map is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Map> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both handles point at the same container.
    pub fn ptr_eq(&self, other: &MapHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to a sequence container.
#[derive(Clone, Default)]
pub struct SeqHandle(Rc<RefCell<Vec<Node>>>);

impl SeqHandle {
    pub fn new(items: Vec<Node>) -> Self {
        SeqHandle(Rc::new(RefCell::new(items)))
    }

    /// Immutably borrows the elements.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Vec<Node>> {
        self.0.borrow()
    }

    /// Mutably borrows the elements.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Node>> {
        self.0.borrow_mut()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &SeqHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A host object stored inside the tree.
///
/// By default an opaque value is a terminal leaf. A host type can make itself
/// traversable by handing out a container it shares: returning a handle from
/// [`Opaque::as_mapping`] makes it mapping-like, from
/// [`Opaque::as_sequence`] sequence-like. When both return a handle the
/// mapping wins.
pub trait Opaque: fmt::Debug + 'static {
    fn as_mapping(&self) -> Option<MapHandle> {
        None
    }

    fn as_sequence(&self) -> Option<SeqHandle> {
        None
    }

    /// JSON form used for serialization and comparison against JSON values.
    fn to_json(&self) -> Option<Value> {
        None
    }
}

/// A value in a nested structure.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Map(MapHandle),
    Seq(SeqHandle),
    Opaque(Rc<dyn Opaque>),
}

/// How a node behaves when a path token is applied to it.
#[derive(Debug, Clone)]
pub enum Shape {
    Mapping(MapHandle),
    Sequence(SeqHandle),
    Leaf,
}

impl Node {
    /// A new, empty mapping container.
    pub fn map() -> Self {
        Node::Map(MapHandle::default())
    }

    /// A new, empty sequence container.
    pub fn seq() -> Self {
        Node::Seq(SeqHandle::default())
    }

    pub fn opaque<T: Opaque>(value: T) -> Self {
        Node::Opaque(Rc::new(value))
    }

    /// Classifies the node: keyed lookup first, then indexed lookup, then
    /// leaf.
    pub fn shape(&self) -> Shape {
        match self {
            Node::Map(map) => Shape::Mapping(map.clone()),
            Node::Seq(seq) => Shape::Sequence(seq.clone()),
            Node::Opaque(host) => {
                if let Some(map) = host.as_mapping() {
                    Shape::Mapping(map)
                } else if let Some(seq) = host.as_sequence() {
                    Shape::Sequence(seq)
                } else {
                    Shape::Leaf
                }
            }
            _ => Shape::Leaf,
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self.shape(), Shape::Leaf)
    }

    /// Identity comparison: true if both nodes hold the same container or the
    /// same opaque object. Scalars never share identity.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Map(a), Node::Map(b)) => a.ptr_eq(b),
            (Node::Seq(a), Node::Seq(b)) => a.ptr_eq(b),
            (Node::Opaque(a), Node::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Recursively copies containers so the result shares nothing with
    /// `self`. Opaque values are still shared.
    pub fn deep_clone(&self) -> Node {
        match self {
            Node::Map(map) => {
                let copy: Map = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect();
                Node::Map(MapHandle::new(copy))
            }
            Node::Seq(seq) => {
                let copy: Vec<Node> = seq.borrow().iter().map(Node::deep_clone).collect();
                Node::Seq(SeqHandle::new(copy))
            }
            other => other.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapHandle> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqHandle> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Converts to a detached `serde_json::Value`.
    ///
    /// # Errors
    ///
    /// Fails if the tree contains an opaque value with no JSON form.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => write!(f, "null"),
            Node::Bool(b) => write!(f, "{b}"),
            Node::Number(n) => write!(f, "{n}"),
            Node::String(s) => write!(f, "{s:?}"),
            Node::Map(map) => match map.0.try_borrow() {
                Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
                Err(_) => write!(f, "{{<borrowed>}}"),
            },
            Node::Seq(seq) => match seq.0.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => write!(f, "[<borrowed>]"),
            },
            Node::Opaque(host) => write!(f, "Opaque({host:?})"),
        }
    }
}

impl fmt::Debug for MapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Node::Map(self.clone()), f)
    }
}

impl fmt::Debug for SeqHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Node::Seq(self.clone()), f)
    }
}

/// Structural equality. Maps compare without regard to key order; opaque
/// values compare by identity.
impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            (Node::Map(a), Node::Map(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Node::Seq(a), Node::Seq(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Node::Opaque(a), Node::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq<Value> for Node {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Node::Null, Value::Null) => true,
            (Node::Bool(a), Value::Bool(b)) => a == b,
            (Node::Number(a), Value::Number(b)) => a == b,
            (Node::String(a), Value::String(b)) => a == b,
            (Node::Map(a), Value::Object(b)) => {
                let entries = a.borrow();
                entries.len() == b.len()
                    && entries
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            (Node::Seq(a), Value::Array(b)) => {
                let items = a.borrow();
                items.len() == b.len() && items.iter().zip(b).all(|(x, y)| x == y)
            }
            (Node::Opaque(host), value) => host.to_json().as_ref() == Some(value),
            _ => false,
        }
    }
}

impl PartialEq<Node> for Value {
    fn eq(&self, other: &Node) -> bool {
        other == self
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => {
                Node::Seq(SeqHandle::new(items.into_iter().map(Node::from).collect()))
            }
            Value::Object(map) => Node::Map(MapHandle::new(
                map.into_iter().map(|(k, v)| (k, Node::from(v))).collect(),
            )),
        }
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<i32> for Node {
    fn from(n: i32) -> Self {
        Node::Number(n.into())
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Number(n.into())
    }
}

impl From<u64> for Node {
    fn from(n: u64) -> Self {
        Node::Number(n.into())
    }
}

/// Non-finite floats become `Null`, as in `serde_json`.
/// NaN and infinities have no JSON form and become [`Node::Null`].
impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Node::Null, Node::Number)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::String(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::String(s)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Seq(SeqHandle::new(items))
    }
}

impl From<Map> for Node {
    fn from(map: Map) -> Self {
        Node::Map(MapHandle::new(map))
    }
}

impl From<MapHandle> for Node {
    fn from(map: MapHandle) -> Self {
        Node::Map(map)
    }
}

impl From<SeqHandle> for Node {
    fn from(seq: SeqHandle) -> Self {
        Node::Seq(seq)
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(n) => n.serialize(serializer),
            Node::String(s) => serializer.serialize_str(s),
            Node::Map(map) => {
                let entries = map.borrow();
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Node::Seq(seq) => {
                let items = seq.borrow();
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            Node::Opaque(host) => {
                if let Some(value) = host.to_json() {
                    value.serialize(serializer)
                } else if let Some(map) = host.as_mapping() {
                    Node::Map(map).serialize(serializer)
                } else if let Some(seq) = host.as_sequence() {
                    Node::Seq(seq).serialize(serializer)
                } else {
                    Err(S::Error::custom(format!(
                        "opaque value {host:?} has no serialized form"
                    )))
                }
            }
        }
    }
}
