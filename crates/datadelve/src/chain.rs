//! Layered lookup over several delvers.
//!
//! Layers are ordered from least to most specific. Reads consult the layers
//! according to a [`MergeStrategy`]; writes go to the most specific layer.

use tracing::debug;

use crate::delver::Delver;
use crate::error::{DelveError, Disallowed};
use crate::node::{Map, Node, Shape};

/// How [`ChainedDelver::get_with`] combines the values found in each layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// The value from the most specific layer that has the path.
    #[default]
    First,
    /// Mappings merged key by key, later layers overriding earlier ones, or
    /// sequences concatenated in layer order. The result is a fresh container
    /// whose children alias the layers' children.
    Merge,
    /// Every value found, most specific first, as a fresh sequence.
    Collect,
}

/// Values found for one path across all layers.
struct Lookup {
    /// Least specific first.
    found: Vec<Node>,
    /// Not-found error of the most specific layer that missed.
    miss: Option<DelveError>,
}

#[derive(Debug, Clone, Default)]
pub struct ChainedDelver {
    layers: Vec<Delver>,
}

impl ChainedDelver {
    /// Builds a chain from layers ordered least to most specific.
    ///
    /// # Errors
    ///
    /// [`DelveError::DuplicateLayer`] if two layers share a backing
    /// container.
    pub fn new(layers: impl IntoIterator<Item = Delver>) -> Result<Self, DelveError> {
        let mut chain = ChainedDelver::default();
        for layer in layers {
            chain.push(layer)?;
        }
        Ok(chain)
    }

    /// Adds a layer that is more specific than every existing one.
    pub fn push(&mut self, layer: Delver) -> Result<(), DelveError> {
        if self.layers.iter().any(|l| l.same_backing(&layer)) {
            return Err(DelveError::DuplicateLayer);
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Appends all layers of `other`, which become the most specific ones.
    pub fn append(&mut self, other: ChainedDelver) -> Result<(), DelveError> {
        for layer in other.layers {
            self.push(layer)?;
        }
        Ok(())
    }

    pub fn layers(&self) -> &[Delver] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Same as [`ChainedDelver::get_with`] with [`MergeStrategy::First`].
    pub fn get(&self, path: &str) -> Result<Node, DelveError> {
        self.get_with(path, MergeStrategy::First)
    }

    /// Looks `path` up in every layer and combines the results.
    ///
    /// Layers where the path does not resolve are skipped. Any other error
    /// aborts the lookup.
    ///
    /// # Errors
    ///
    /// - [`DelveError::PathNotFound`] if no layer has the path (`First` and
    ///   `Merge`; `Collect` returns an empty sequence)
    /// - [`DelveError::MergeConflict`] if `Merge` finds a scalar or mixed
    ///   container shapes
    pub fn get_with(&self, path: &str, strategy: MergeStrategy) -> Result<Node, DelveError> {
        let lookup = self.lookup(path)?;
        debug!(path, ?strategy, hits = lookup.found.len(), "chained lookup");
        match strategy {
            MergeStrategy::First => match lookup.found.last().cloned() {
                Some(node) => Ok(node),
                None => Err(lookup.into_miss()),
            },
            MergeStrategy::Merge => {
                if lookup.found.is_empty() {
                    return Err(lookup.into_miss());
                }
                merge(path, &lookup.found)
            }
            MergeStrategy::Collect => {
                let mut found = lookup.found;
                found.reverse();
                Ok(Node::from(found))
            }
        }
    }

    /// Writes to the most specific layer.
    pub fn set(&self, path: &str, value: impl Into<Node>) -> Result<(), DelveError> {
        self.most_specific()?.set(path, value)
    }

    /// Removes `path` from every layer that has it.
    ///
    /// Layers reaching the same parent container through shared data remove
    /// the entry once.
    ///
    /// # Errors
    ///
    /// - [`DelveError::ReadOnly`] if any layer is read-only; nothing is
    ///   removed in that case
    /// - [`DelveError::PathNotFound`] if no layer had the path
    pub fn delete(&self, path: &str) -> Result<(), DelveError> {
        let tokens = self.most_specific()?.parse(path)?;
        if let Some(layer) = self.layers.iter().find(|l| l.is_readonly()) {
            return Err(DelveError::ReadOnly {
                path: layer.pointer_to(&tokens),
            });
        }
        // Resolve every parent before removing anything, so the root path
        // fails untouched and a shared parent is only hit once.
        let mut targets: Vec<(&Delver, Node)> = Vec::new();
        let mut miss = None;
        for layer in &self.layers {
            match layer.writable_parent(&tokens) {
                Ok((parent, _)) => {
                    if !targets.iter().any(|(_, seen)| seen.ptr_eq(&parent)) {
                        targets.push((layer, parent));
                    }
                }
                Err(e) if e.is_not_found() => miss = Some(e),
                Err(e) => return Err(e),
            }
        }
        let mut removed = 0;
        for (layer, _) in targets {
            match layer.delete(path) {
                Ok(_) => removed += 1,
                Err(e) if e.is_not_found() => miss = Some(e),
                Err(e) => return Err(e),
            }
        }
        debug!(path, removed, "chained delete");
        match miss {
            Some(e) if removed == 0 => Err(e),
            _ => Ok(()),
        }
    }

    /// A chain of views, one per layer where `path` resolves to a container.
    /// Views onto a container already in the chain are skipped.
    pub fn descend(&self, path: &str) -> Result<ChainedDelver, DelveError> {
        self.most_specific()?;
        let mut chain = ChainedDelver::default();
        let mut miss = None;
        for layer in &self.layers {
            match layer.descend(path) {
                Ok(view) => match chain.push(view) {
                    Ok(()) | Err(DelveError::DuplicateLayer) => {}
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_not_found() => miss = Some(e),
                Err(e) => return Err(e),
            }
        }
        match miss {
            Some(e) if chain.is_empty() => Err(e),
            _ => Ok(chain),
        }
    }

    fn most_specific(&self) -> Result<&Delver, DelveError> {
        self.layers.last().ok_or(DelveError::InvalidOperation {
            path: String::new(),
            reason: Disallowed::EmptyChain,
        })
    }

    fn lookup(&self, path: &str) -> Result<Lookup, DelveError> {
        self.most_specific()?;
        let mut lookup = Lookup {
            found: Vec::new(),
            miss: None,
        };
        for layer in &self.layers {
            match layer.get(path) {
                Ok(node) => lookup.found.push(node),
                Err(e) if e.is_not_found() => lookup.miss = Some(e),
                Err(e) => return Err(e),
            }
        }
        Ok(lookup)
    }
}

impl Lookup {
    fn into_miss(self) -> DelveError {
        // A non-empty chain with no hits has at least one miss.
        self.miss.unwrap_or(DelveError::InvalidOperation {
            path: String::new(),
            reason: Disallowed::EmptyChain,
        })
    }
}

fn merge(path: &str, found: &[Node]) -> Result<Node, DelveError> {
    let conflict = |reason: &str| DelveError::MergeConflict {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    match found[0].shape() {
        Shape::Mapping(_) => {
            let mut merged = Map::new();
            for node in found {
                let Shape::Mapping(map) = node.shape() else {
                    return Err(conflict("cannot merge a mapping with a non-mapping"));
                };
                let entries = map.borrow();
                merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Ok(Node::from(merged))
        }
        Shape::Sequence(_) => {
            let mut merged = Vec::new();
            for node in found {
                let Shape::Sequence(seq) = node.shape() else {
                    return Err(conflict("cannot merge a sequence with a non-sequence"));
                };
                merged.extend(seq.borrow().iter().cloned());
            }
            Ok(Node::from(merged))
        }
        Shape::Leaf => Err(conflict("only containers can be merged")),
    }
}
