//! Definition records and the reverse reference index.

use crate::ast::{NodeRef, Span};
use crate::typ::Type;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod binding_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);

impl BindingId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Module,
    Class,
    Method,
    ClassMethod,
    Function,
    Variable,
    Parameter,
    Attribute,
    /// Synthetic names such as `self`.
    Scope,
}

impl BindingKind {
    /// Kinds that are never reported as unused: definitions are often exported
    /// and never referenced locally, and synthetic names have no source.
    pub fn exempt_from_unused(self) -> bool {
        !matches!(
            self,
            BindingKind::Variable | BindingKind::Parameter | BindingKind::Attribute
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(
            self,
            BindingKind::Method | BindingKind::ClassMethod | BindingKind::Function
        )
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    name: String,
    qname: String,
    kind: BindingKind,
    node: NodeRef,
    body: Span,
    ty: Type,
    file: PathBuf,
    refs: IndexSet<NodeRef>,
}

impl Binding {
    pub fn new(name: impl Into<String>, qname: impl Into<String>, kind: BindingKind, node: NodeRef, body: Span, ty: Type) -> Self {
        let file = node.file().to_path_buf();
        Self {
            name: name.into(),
            qname: qname.into(),
            kind,
            node,
            body,
            ty,
            file,
            refs: IndexSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the global root, e.g. `Foo.bar`.
    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// The identifier node that defines this binding.
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Full extent of the definition (e.g. a whole method).
    pub fn body(&self) -> Span {
        self.body
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn refs(&self) -> &IndexSet<NodeRef> {
        &self.refs
    }

    pub fn merge_type(&mut self, ty: Type) {
        self.ty.merge(ty);
    }

    /// Like [`Binding::merge_type`], but an `Unknown` placeholder is
    /// replaced instead of becoming a union member.
    pub fn refine_type(&mut self, ty: Type) {
        if self.ty.is_unknown() {
            self.ty = ty;
        } else if !ty.is_unknown() {
            self.ty.merge(ty);
        }
    }

    pub fn is_unused(&self) -> bool {
        !self.kind.exempt_from_unused() && self.refs.is_empty()
    }
}

/// Flat binding list plus `file -> node -> bindings` reference index.
#[derive(Debug, Default)]
pub struct Registry {
    /// `None` marks a binding removed with its file.
    bindings: Vec<Option<Binding>>,
    by_node: FxHashMap<(NodeRef, BindingKind, String), BindingId>,
    references: FxHashMap<PathBuf, IndexMap<NodeRef, Vec<BindingId>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `b` to the flat list. A binding for the same defining node, kind
    /// and name is reused instead, with `b`'s type merged into it, so
    /// revisiting a definition never duplicates it.
    pub fn register_binding(&mut self, b: Binding) -> BindingId {
        let key = (b.node.clone(), b.kind, b.name.clone());
        if let Some(&id) = self.by_node.get(&key)
            && let Some(existing) = self.bindings[id.index()].as_mut()
        {
            existing.merge_type(b.ty);
            return id;
        }
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Some(b));
        self.by_node.insert(key, id);
        id
    }

    pub fn get(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: BindingId) -> Option<&mut Binding> {
        self.bindings.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Record that `node` refers to each of `ids`.
    pub fn put_ref(&mut self, node: &NodeRef, ids: &[BindingId]) {
        let entry = self
            .references
            .entry(node.file().to_path_buf())
            .or_default()
            .entry(node.clone())
            .or_default();
        for &id in ids {
            if !entry.contains(&id) {
                entry.push(id);
            }
            if let Some(b) = self.bindings.get_mut(id.index()).and_then(Option::as_mut) {
                b.refs.insert(node.clone());
            }
        }
    }

    pub fn get_references(&self, file: &Path) -> Option<&IndexMap<NodeRef, Vec<BindingId>>> {
        self.references.get(file)
    }

    pub fn remove_references(&mut self, file: &Path) {
        self.references.remove(file);
    }

    /// Drop every binding defined in `file` along with its references, and
    /// forget reference-set entries that point into `file`. Returns the ids
    /// that were removed so scope tables can be purged.
    pub fn remove_file(&mut self, file: &Path) -> FxHashSet<BindingId> {
        let mut removed = FxHashSet::default();
        for (i, slot) in self.bindings.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|b| b.file.as_path() == file) {
                *slot = None;
                removed.insert(BindingId(i as u32));
            }
        }
        self.by_node.retain(|_, id| !removed.contains(id));
        self.remove_references(file);
        for b in self.bindings.iter_mut().flatten() {
            b.refs.retain(|r| r.file() != file);
        }
        for map in self.references.values_mut() {
            for ids in map.values_mut() {
                ids.retain(|id| !removed.contains(id));
            }
        }
        removed
    }

    /// Live bindings in creation order.
    pub fn all(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (BindingId(i as u32), b)))
    }

    pub fn len(&self) -> usize {
        self.bindings.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of identifier nodes with at least one resolved binding.
    pub fn referencing_nodes(&self) -> usize {
        self.references.values().map(IndexMap::len).sum()
    }

    /// Sum of all reference-set sizes.
    pub fn cross_references(&self) -> usize {
        self.bindings.iter().flatten().map(|b| b.refs.len()).sum()
    }
}
