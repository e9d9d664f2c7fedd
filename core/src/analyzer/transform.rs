//! Per-node type inference. One arm per node kind; each returns the type of
//! the expression and records bindings, references and diagnostics as it goes.

use super::call::CallArgs;
use super::{Analyzer, SELF_NAME, join};
use crate::ast::{NameKind, NodeId, NodeKind, NodeRef, Op};
use crate::binding::{BindingId, BindingKind};
use crate::diagnostics::Category;
use crate::scope::{ScopeId, Tag};
use crate::typ::{ClassId, ModuleId, Type};
use rustc_hash::FxHashSet;

/// Kernel-level names that resolve without a binding and without a report.
const BUILTINS: &[&str] = &[
    "puts", "print", "p", "pp", "printf", "sprintf", "format", "gets", "raise", "fail", "require",
    "require_relative", "load", "autoload", "attr_accessor", "attr_reader", "attr_writer", "include",
    "extend", "prepend", "private", "public", "protected", "module_function", "private_constant",
    "lambda", "proc", "loop", "catch", "throw", "exit", "abort", "at_exit", "sleep", "rand", "srand",
    "block_given?", "binding", "caller", "nil", "self", "super", "defined?", "__FILE__", "__LINE__",
    "__dir__", "__method__", "new", "initialize", "send", "public_send", "respond_to?", "freeze",
    "instance_variable_get", "instance_variable_set", "define_method", "alias_method", "Object",
    "BasicObject", "Kernel", "Module", "Class", "Comparable", "Enumerable", "String", "Symbol",
    "Integer", "Float", "Numeric", "Array", "Hash", "Range", "Regexp", "Proc", "IO", "File", "Dir",
    "Time", "Struct", "Exception", "StandardError", "RuntimeError", "ArgumentError", "TypeError",
    "NameError", "NoMethodError", "NotImplementedError", "KeyError", "IndexError", "IOError",
    "ENV", "ARGV", "STDIN", "STDOUT", "STDERR",
];

/// Headroom left before growing the stack, and the size of each new segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

pub(super) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn is_constant(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

impl Analyzer {
    pub(crate) fn transform(&mut self, node: &NodeRef, scope: ScopeId) -> Type {
        if self.exhausted {
            return Type::Unknown;
        }
        self.depth += 1;
        if self.depth > self.options.max_depth {
            self.exhausted = true;
            self.depth -= 1;
            return Type::Unknown;
        }
        // `max_depth` bounds the recursion, not the thread's stack
        let ty = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.transform_node(node, scope));
        self.depth -= 1;
        ty
    }

    /// Transform an optional child; an absent one is `nil`.
    pub(super) fn transform_opt(&mut self, node: &NodeRef, child: Option<NodeId>, scope: ScopeId) -> Type {
        match child {
            Some(id) => self.transform(&node.with_id(id), scope),
            None => Type::Nil,
        }
    }

    pub(super) fn transform_all(&mut self, node: &NodeRef, ids: &[NodeId], scope: ScopeId) -> Vec<Type> {
        ids.iter()
            .map(|id| self.transform(&node.with_id(*id), scope))
            .collect()
    }

    fn transform_node(&mut self, node: &NodeRef, scope: ScopeId) -> Type {
        let ast = std::sync::Arc::clone(node.ast());
        match ast.kind(node.id()) {
            NodeKind::Block { stmts } => {
                let mut last = Type::Nil;
                for id in stmts {
                    last = self.transform(&node.with_id(*id), scope);
                }
                last
            }
            NodeKind::Module { locator, body, .. } => self.transform_module(node, *locator, *body, scope),
            NodeKind::Class {
                locator,
                base,
                body,
                is_static,
                ..
            } => self.transform_class(node, *locator, *base, *body, *is_static, scope),
            NodeKind::Function { .. } => self.transform_function(node, scope),
            NodeKind::Call { .. } => self.transform_call(node, scope),
            NodeKind::Attribute { target, attr } => self.transform_attribute(node, *target, *attr, scope),
            NodeKind::BinOp { op, left, right } => {
                let l = self.transform(&node.with_id(*left), scope);
                let r = self.transform(&node.with_id(*right), scope);
                binary_type(*op, l, r)
            }
            NodeKind::UnaryOp { op, operand } => {
                let t = self.transform(&node.with_id(*operand), scope);
                match op {
                    Op::Not | Op::Defined => Type::Bool,
                    _ => t,
                }
            }
            NodeKind::Assign { target, value } => {
                let ty = self.transform(&node.with_id(*value), scope);
                self.bind_target(&node.with_id(*target), ty.clone(), BindingKind::Variable, scope);
                ty
            }
            NodeKind::Name { id, kind } => self.transform_name(node, id, *kind, scope),
            NodeKind::Symbol { id } => Type::Symbol(Some(id.clone())),
            NodeKind::Str { value } => Type::str_literal(value.clone()),
            NodeKind::StrEmbed { value } => {
                self.transform_opt(node, *value, scope);
                Type::str()
            }
            NodeKind::Regexp { pattern, end } => {
                self.transform_opt(node, *pattern, scope);
                self.transform_opt(node, *end, scope);
                Type::Unknown
            }
            NodeKind::Int { .. } | NodeKind::Float { .. } => Type::Num,
            NodeKind::Array { elts } => {
                let mut elems = Vec::with_capacity(elts.len());
                for id in elts {
                    let child = node.with_id(*id);
                    let t = self.transform(&child, scope);
                    // a splatted list contributes its elements
                    match (child.kind(), t) {
                        (NodeKind::Starred { .. }, Type::List { elem, .. }) => elems.push(*elem),
                        (_, t) => elems.push(t),
                    }
                }
                Type::list_of(elems)
            }
            NodeKind::Dict { keys, values } => {
                let k = self.transform_all(node, keys, scope);
                let v = self.transform_all(node, values, scope);
                Type::dict(Type::make_union(k), Type::make_union(v))
            }
            NodeKind::Starred { value } => self.transform(&node.with_id(*value), scope),
            NodeKind::Keyword { value, .. } => self.transform_opt(node, *value, scope),
            NodeKind::If { test, body, orelse } => {
                self.transform(&node.with_id(*test), scope);
                let then = self.transform_opt(node, *body, scope);
                let other = self.transform_opt(node, *orelse, scope);
                Type::union(then, other)
            }
            NodeKind::While { test, body } => {
                self.transform(&node.with_id(*test), scope);
                self.transform_opt(node, *body, scope);
                Type::Nil
            }
            NodeKind::For { target, iter, body } => {
                let it = self.transform(&node.with_id(*iter), scope);
                let elem = element_type(&it);
                self.bind_target(&node.with_id(*target), elem, BindingKind::Variable, scope);
                self.transform_opt(node, *body, scope);
                it
            }
            NodeKind::Try {
                body,
                rescue,
                orelse,
                finally,
            } => {
                let b = self.transform_opt(node, *body, scope);
                let r = match rescue {
                    Some(id) => self.transform(&node.with_id(*id), scope),
                    None => Type::Unknown,
                };
                let e = match orelse {
                    Some(id) => self.transform(&node.with_id(*id), scope),
                    None => Type::Unknown,
                };
                self.transform_opt(node, *finally, scope);
                Type::make_union([b, r, e].into_iter().filter(|t| !t.is_unknown()))
            }
            NodeKind::Handler {
                exceptions,
                binder,
                body,
                orelse,
            } => {
                let classes = self.transform_all(node, exceptions, scope);
                if let Some(b) = binder {
                    let caught = Type::make_union(classes.iter().flat_map(|t| {
                        t.members()
                            .into_iter()
                            .map(|m| match m {
                                Type::Class(c) => Type::Instance(*c),
                                _ => Type::Unknown,
                            })
                            .collect::<Vec<_>>()
                    }));
                    self.bind_target(&node.with_id(*b), caught, BindingKind::Variable, scope);
                }
                let t = self.transform_opt(node, *body, scope);
                let e = match orelse {
                    Some(id) => self.transform(&node.with_id(*id), scope),
                    None => Type::Unknown,
                };
                Type::make_union([t, e].into_iter().filter(|t| !t.is_unknown()))
            }
            NodeKind::Return { value } => {
                let t = self.transform_opt(node, *value, scope);
                if let Some(acc) = self.returns.last_mut() {
                    *acc = join(std::mem::take(acc), t.clone());
                }
                t
            }
            NodeKind::Yield { value } => {
                let args = match value.map(|v| (v, ast.kind(v))) {
                    Some((_, NodeKind::Array { elts })) => self.transform_all(node, elts, scope),
                    Some((v, _)) => vec![self.transform(&node.with_id(v), scope)],
                    None => Vec::new(),
                };
                self.apply_block(scope, args)
            }
            NodeKind::Subscript { value, slice } => {
                let v = self.transform(&node.with_id(*value), scope);
                let sliced = slice.is_some_and(|s| matches!(ast.kind(s), NodeKind::Slice { .. }));
                self.transform_opt(node, *slice, scope);
                subscript_type(&v, sliced)
            }
            NodeKind::Index { value } => self.transform(&node.with_id(*value), scope),
            NodeKind::Slice { lower, upper } => {
                self.transform_opt(node, *lower, scope);
                self.transform_opt(node, *upper, scope);
                Type::Unknown
            }
            NodeKind::Control { .. } | NodeKind::Undef { .. } | NodeKind::Void => Type::Nil,
        }
    }

    /// A bare identifier. A method name used without arguments is a call.
    fn transform_name(&mut self, node: &NodeRef, id: &str, kind: NameKind, scope: ScopeId) -> Type {
        let (ty, callable) = self.reference(node, id, kind, scope);
        if callable {
            let this = self.self_type(scope);
            self.apply_all(&ty, this, CallArgs::default())
        } else {
            ty
        }
    }

    /// Resolve an identifier occurrence, recording the reference or the
    /// failure. Also reports whether any binding found is a method.
    pub(super) fn reference(&mut self, node: &NodeRef, id: &str, kind: NameKind, scope: ScopeId) -> (Type, bool) {
        let mut found = self.resolve_name(scope, id, kind);

        if found.is_none()
            && self.options.autoload_constants
            && kind == NameKind::Local
            && is_constant(id)
            && self.in_project(node)
            && self.autoload_constant(id)
        {
            found = self.resolve_name(scope, id, kind);
        }

        match found {
            Some(ids) => {
                self.put_ref(node, &ids);
                let callable = ids
                    .iter()
                    .any(|b| self.registry.get(*b).is_some_and(|b| b.kind().is_callable()));
                (self.type_of(&ids), callable)
            }
            None if id == "true" || id == "false" => (Type::Bool, false),
            None if id == "nil" => (Type::Nil, false),
            None if is_builtin(id) => (Type::Unknown, false),
            None => {
                self.put_problem(node, Category::Error, format!("unbound variable {id}"));
                self.mark_unresolved(node);
                (Type::Unknown, false)
            }
        }
    }

    /// Resolution order for a name occurrence: the namespace its sigil picks,
    /// then the lexical chain (tier order set by the static context), then
    /// the members of `self`.
    pub(super) fn resolve_name(&self, scope: ScopeId, id: &str, kind: NameKind) -> Option<Vec<BindingId>> {
        match kind {
            NameKind::Instance => {
                if let Some(c) = self.self_class(scope)
                    && let Some(ids) = self.scopes.get(self.class(c).instance).lookup_local(id)
                {
                    return Some(ids.to_vec());
                }
            }
            NameKind::Class => {
                if let Some(c) = self.self_class(scope)
                    && let Some(ids) = self.scopes.get(self.class(c).scope).lookup_local(id)
                {
                    return Some(ids.to_vec());
                }
            }
            NameKind::Global => {
                return self
                    .scopes
                    .get(self.scopes.global())
                    .lookup_local(id)
                    .map(<[BindingId]>::to_vec);
            }
            NameKind::Local => {}
        }

        if let Some(ids) = self.lookup_name(scope, id) {
            return Some(ids);
        }
        if id == SELF_NAME {
            return None;
        }
        let this = self.self_type(scope);
        self.lookup_member(&this, id)
    }

    fn in_project(&self, node: &NodeRef) -> bool {
        self.project_dir
            .as_ref()
            .is_some_and(|dir| node.file().starts_with(dir))
    }

    /// Bindings for member `name` of every type in `ty`.
    pub(super) fn lookup_member(&self, ty: &Type, name: &str) -> Option<Vec<BindingId>> {
        let mut out: Vec<BindingId> = Vec::new();
        let mut seen = FxHashSet::default();
        for t in ty.members() {
            let found = match t {
                Type::Instance(c) => self.instance_member(*c, name, &mut seen),
                Type::Class(c) => self.class_member(*c, name, &mut seen),
                Type::Module(m) => self.module_member(*m, name, true, &mut FxHashSet::default()),
                _ => None,
            };
            for id in found.into_iter().flatten() {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        if out.is_empty() { None } else { Some(out) }
    }

    fn instance_member(&self, c: ClassId, name: &str, seen: &mut FxHashSet<ClassId>) -> Option<Vec<BindingId>> {
        let mut cur = Some(c);
        while let Some(id) = cur {
            if !seen.insert(id) {
                return None;
            }
            let info = self.class(id);
            let found = self
                .scopes
                .get(info.instance)
                .lookup_local(name)
                .or_else(|| self.scopes.get(info.scope).lookup_local(name));
            if let Some(ids) = found {
                return Some(ids.to_vec());
            }
            for m in &info.mixins {
                if let Some(ids) = self.module_member(*m, name, false, &mut FxHashSet::default()) {
                    return Some(ids);
                }
            }
            cur = info.base;
        }
        None
    }

    fn class_member(&self, c: ClassId, name: &str, seen: &mut FxHashSet<ClassId>) -> Option<Vec<BindingId>> {
        let mut cur = Some(c);
        while let Some(id) = cur {
            if !seen.insert(id) {
                return None;
            }
            let info = self.class(id);
            let table = self.scopes.get(info.scope);
            let found = table
                .lookup_local_tagged(name, Some(Tag::Class))
                .or_else(|| table.lookup_local(name));
            if let Some(ids) = found {
                return Some(ids.to_vec());
            }
            for m in &info.mixins {
                if let Some(ids) = self.module_member(*m, name, true, &mut FxHashSet::default()) {
                    return Some(ids);
                }
            }
            cur = info.base;
        }
        None
    }

    fn module_member(
        &self,
        m: ModuleId,
        name: &str,
        class_tier_first: bool,
        seen: &mut FxHashSet<ModuleId>,
    ) -> Option<Vec<BindingId>> {
        if !seen.insert(m) {
            return None;
        }
        let info = self.module(m);
        let table = self.scopes.get(info.scope);
        let found = if class_tier_first {
            table
                .lookup_local_tagged(name, Some(Tag::Class))
                .or_else(|| table.lookup_local(name))
        } else {
            table
                .lookup_local(name)
                .or_else(|| table.lookup_local_tagged(name, Some(Tag::Class)))
        };
        if let Some(ids) = found {
            return Some(ids.to_vec());
        }
        let mixins = info.mixins.clone();
        mixins
            .into_iter()
            .find_map(|inner| self.module_member(inner, name, class_tier_first, seen))
    }

    /// Scope that definitions reached through `ty` live in (`Outer::Inner`,
    /// `def Foo.bar`).
    pub(super) fn member_scope(&self, ty: &Type) -> Option<ScopeId> {
        ty.members().into_iter().find_map(|t| match t {
            Type::Class(c) | Type::Instance(c) => Some(self.class(*c).scope),
            Type::Module(m) => Some(self.module(*m).scope),
            _ => None,
        })
    }

    fn transform_attribute(&mut self, node: &NodeRef, target: NodeId, attr: NodeId, scope: ScopeId) -> Type {
        let this = self.transform(&node.with_id(target), scope);
        let attr_ref = node.with_id(attr);
        let Some(name) = attr_ref.name_id().map(str::to_string) else {
            return Type::Unknown;
        };
        // `obj.foo` without parentheses is still a call
        self.call_member(&this, &name, &attr_ref, CallArgs::default(), scope)
    }
}

/// Result type of a primitive binary operator.
fn binary_type(op: Op, l: Type, r: Type) -> Type {
    if op.is_comparison() {
        return Type::Bool;
    }
    if op.is_logical() {
        return Type::union(l, r);
    }
    fn has(t: &Type, f: fn(&Type) -> bool) -> bool {
        t.members().into_iter().any(f)
    }
    fn is_num(t: &Type) -> bool {
        matches!(t, Type::Num)
    }
    fn is_str(t: &Type) -> bool {
        matches!(t, Type::Str(_))
    }
    fn is_list(t: &Type) -> bool {
        matches!(t, Type::List { .. })
    }

    match op {
        Op::LShift if has(&l, is_list) => {
            // `list << x` appends
            let elem = Type::union(element_type(&l), r);
            Type::list(elem)
        }
        Op::Add if has(&l, is_list) && has(&r, is_list) => {
            Type::list(Type::union(element_type(&l), element_type(&r)))
        }
        Op::Add | Op::Mul | Op::Mod if has(&l, is_str) => Type::str(),
        _ if has(&l, is_num) && has(&r, is_num) => Type::Num,
        _ if !l.is_unknown() => l,
        _ => r,
    }
}

/// Element type produced by iterating `ty`.
fn element_type(ty: &Type) -> Type {
    Type::make_union(ty.members().into_iter().map(|t| match t {
        Type::List { elem, .. } => (**elem).clone(),
        Type::Dict { key, .. } => (**key).clone(),
        _ => Type::Unknown,
    }))
}

fn subscript_type(ty: &Type, sliced: bool) -> Type {
    Type::make_union(ty.members().into_iter().map(|t| match t {
        Type::List { elem, .. } if sliced => Type::list((**elem).clone()),
        Type::List { elem, .. } => (**elem).clone(),
        Type::Dict { value, .. } => (**value).clone(),
        Type::Str(_) => Type::str(),
        _ => Type::Unknown,
    }))
}
