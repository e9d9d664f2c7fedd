//! Lexical environments.
//!
//! Scopes live in one arena owned by the analyzer and link to their parent by
//! id, so a closure or class keeps its environment alive simply by holding a
//! [`ScopeId`]. Each table maps a name (optionally tagged) to every binding
//! that name has had; reassignment appends.

use crate::binding::{Binding, BindingId, Registry};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

#[cfg(test)]
mod scope_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Module,
    Class,
    Instance,
    Function,
    Scope,
}

/// Namespace tier of an entry. Untagged entries are the instance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    name: String,
    tag: Option<Tag>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    /// Qualified-name prefix for bindings created here.
    path: String,
    table: IndexMap<Key, Vec<BindingId>>,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lookup_local(&self, name: &str) -> Option<&[BindingId]> {
        self.lookup_local_tagged(name, None)
    }

    pub fn lookup_local_tagged(&self, name: &str, tag: Option<Tag>) -> Option<&[BindingId]> {
        let key = Key {
            name: name.to_string(),
            tag,
        };
        self.table
            .get(&key)
            .map(Vec::as_slice)
            .filter(|ids| !ids.is_empty())
    }

    /// Names defined here, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = (&str, Option<Tag>)> {
        self.table.keys().map(|k| (k.name.as_str(), k.tag))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Scopes {
    arena: Vec<Scope>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    /// A fresh arena holding only the global scope.
    pub fn new() -> Self {
        Self {
            arena: vec![Scope {
                kind: ScopeKind::Global,
                parent: None,
                path: String::new(),
                table: IndexMap::new(),
            }],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>, path: impl Into<String>) -> ScopeId {
        let id = ScopeId(self.arena.len() as u32);
        self.arena.push(Scope {
            kind,
            parent,
            path: path.into(),
            table: IndexMap::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id.index()]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// `id` followed by its ancestors up to the global scope.
    pub fn chain(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |s| self.get(*s).parent)
    }

    /// Nearest non-empty untagged entry for `name`, walking outward.
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<&[BindingId]> {
        self.lookup_tagged(from, name, None)
    }

    /// Like [`Scopes::lookup`] but only entries carrying `tag` match.
    pub fn lookup_tagged(&self, from: ScopeId, name: &str, tag: Option<Tag>) -> Option<&[BindingId]> {
        self.chain(from)
            .find_map(|s| self.get(s).lookup_local_tagged(name, tag))
    }

    /// The scope in the chain from `from` that defines `name`.
    pub fn defining_scope(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        self.chain(from)
            .find(|s| self.get(*s).lookup_local(name).is_some())
    }

    /// Nearest scope in the chain (inclusive) of one of `kinds`.
    pub fn enclosing(&self, from: ScopeId, kinds: &[ScopeKind]) -> Option<ScopeId> {
        self.chain(from).find(|s| kinds.contains(&self.get(*s).kind))
    }

    /// Qualified name for `name` defined in `scope`.
    pub fn qualify(&self, scope: ScopeId, name: &str) -> String {
        let path = &self.get(scope).path;
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{path}.{name}")
        }
    }

    /// Register `binding` and append it to `scope`'s entry for its name.
    /// Revisiting the same definition yields the existing binding and leaves
    /// the entry unchanged.
    pub fn insert(&mut self, registry: &mut Registry, scope: ScopeId, tag: Option<Tag>, binding: Binding) -> BindingId {
        let key = Key {
            name: binding.name().to_string(),
            tag,
        };
        let id = registry.register_binding(binding);
        let entry = self.arena[scope.index()].table.entry(key).or_default();
        if !entry.contains(&id) {
            entry.push(id);
        }
        id
    }

    /// Bind an existing binding under another scope entry (aliases such as
    /// `self` or mixed-in names).
    pub fn alias(&mut self, scope: ScopeId, name: &str, tag: Option<Tag>, id: BindingId) {
        let key = Key {
            name: name.to_string(),
            tag,
        };
        let entry = self.arena[scope.index()].table.entry(key).or_default();
        if !entry.contains(&id) {
            entry.push(id);
        }
    }

    /// Forget removed bindings everywhere.
    pub fn purge(&mut self, removed: &FxHashSet<BindingId>) {
        if removed.is_empty() {
            return;
        }
        for scope in &mut self.arena {
            for ids in scope.table.values_mut() {
                ids.retain(|id| !removed.contains(id));
            }
        }
    }
}
