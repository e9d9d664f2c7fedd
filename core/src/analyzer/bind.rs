//! Assignment targets.

use super::{Analyzer, BLOCK_NAME};
use crate::ast::{NameKind, NodeKind, NodeRef};
use crate::binding::BindingKind;
use crate::scope::{ScopeId, ScopeKind};
use crate::typ::Type;

impl Analyzer {
    /// Bind `target` (a name, attribute, destructuring list or splat) to `ty`.
    pub(super) fn bind_target(&mut self, target: &NodeRef, ty: Type, kind: BindingKind, scope: ScopeId) {
        match target.kind() {
            NodeKind::Name { id, kind: name_kind } => {
                let id = id.clone();
                self.bind_name(target, &id, *name_kind, ty, kind, scope);
            }
            NodeKind::Attribute { target: recv, attr } => {
                let (recv, attr) = (target.with_id(*recv), target.with_id(*attr));
                let this = self.transform(&recv, scope);
                let Some(name) = attr.name_id().map(str::to_string) else {
                    return;
                };
                // `obj.x = v` goes through the `x` attribute when one exists
                if let Some(ids) = self.lookup_member(&this, &name) {
                    for id in &ids {
                        if let Some(b) = self.registry.get_mut(*id)
                            && b.kind() == BindingKind::Attribute
                        {
                            b.refine_type(ty.clone());
                        }
                    }
                    self.put_ref(&attr, &ids);
                }
            }
            NodeKind::Array { elts } => {
                let elem = element_of(&ty);
                for id in elts.clone() {
                    let child = target.with_id(id);
                    let t = match child.kind() {
                        NodeKind::Starred { .. } => Type::list(elem.clone()),
                        _ => elem.clone(),
                    };
                    self.bind_target(&child, t, kind, scope);
                }
            }
            NodeKind::Starred { value } => {
                let value = target.with_id(*value);
                let t = if matches!(ty, Type::List { .. }) { ty } else { Type::list(ty) };
                self.bind_target(&value, t, kind, scope);
            }
            _ => {
                self.transform(target, scope);
            }
        }
    }

    fn bind_name(&mut self, node: &NodeRef, name: &str, name_kind: NameKind, ty: Type, kind: BindingKind, scope: ScopeId) {
        match name_kind {
            NameKind::Local => {
                let target = self.local_scope(scope, name);
                self.bind(target, None, name, node, node.span(), kind, ty);
            }
            NameKind::Instance => {
                let Some(c) = self.self_class(scope) else {
                    self.bind(scope, None, name, node, node.span(), kind, ty);
                    return;
                };
                let instance = self.class(c).instance;
                self.bind(instance, None, name, node, node.span(), BindingKind::Attribute, ty.clone());
                // accessors declared for `@x` see the assigned type too
                let plain = name.trim_start_matches('@');
                if let Some(ids) = self.scopes.get(instance).lookup_local(plain).map(<[_]>::to_vec) {
                    for id in ids {
                        if let Some(b) = self.registry.get_mut(id)
                            && b.kind() == BindingKind::Attribute
                        {
                            b.refine_type(ty.clone());
                        }
                    }
                }
            }
            NameKind::Class => {
                let target = self.self_class(scope).map_or(scope, |c| self.class(c).scope);
                self.bind(target, None, name, node, node.span(), kind, ty);
            }
            NameKind::Global => {
                let global = self.scopes.global();
                self.bind(global, None, name, node, node.span(), kind, ty);
            }
        }
    }

    /// Where an assignment to local `name` lands: the block frame (or an
    /// enclosing one up to the method boundary) that already defines it,
    /// otherwise the current scope.
    fn local_scope(&self, scope: ScopeId, name: &str) -> ScopeId {
        for s in self.scopes.chain(scope) {
            let table = self.scopes.get(s);
            if table.lookup_local(name).is_some() && name != BLOCK_NAME {
                return s;
            }
            if table.kind() != ScopeKind::Scope {
                break;
            }
        }
        scope
    }
}

fn element_of(ty: &Type) -> Type {
    Type::make_union(ty.members().into_iter().map(|t| match t {
        Type::List { elem, .. } => (**elem).clone(),
        _ => Type::Unknown,
    }))
}
