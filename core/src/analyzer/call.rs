//! Calls and function application.

use super::{Analyzer, BLOCK_NAME, CallKey, Owner, SELF_NAME, frame_kind, join};
use crate::ast::{NameKind, NodeId, NodeKind, NodeRef, Params};
use crate::binding::BindingKind;
use crate::scope::ScopeId;
use crate::typ::{FunId, Type};
use tracing::trace;

/// Argument types at one call site.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArgs {
    pub positional: Vec<Type>,
    pub keywords: Vec<(String, Type)>,
    pub star: Option<Type>,
    pub block: Option<Type>,
}

impl Analyzer {
    pub(super) fn transform_call(&mut self, node: &NodeRef, scope: ScopeId) -> Type {
        let NodeKind::Call {
            func,
            args,
            keywords,
            star,
            block_arg,
        } = node.kind()
        else {
            return Type::Unknown;
        };
        let func = node.with_id(*func);

        if let NodeKind::Name {
            id,
            kind: NameKind::Local,
        } = func.kind()
            && let Some(ty) = self.special_form(node, id, args, *block_arg, scope)
        {
            return ty;
        }

        let call = CallArgs {
            positional: self.transform_all(node, args, scope),
            keywords: keywords
                .iter()
                .map(|k| {
                    let kw = node.with_id(*k);
                    let name = match kw.kind() {
                        NodeKind::Keyword { arg, .. } => arg.clone(),
                        _ => String::new(),
                    };
                    (name, self.transform(&kw, scope))
                })
                .collect(),
            star: star.map(|s| self.transform(&node.with_id(s), scope)),
            block: block_arg.map(|b| self.transform(&node.with_id(b), scope)),
        };

        match func.kind() {
            NodeKind::Attribute { target, attr } => {
                let (target, attr) = (func.with_id(*target), func.with_id(*attr));
                let this = self.transform(&target, scope);
                let Some(name) = attr.name_id().map(str::to_string) else {
                    return Type::Unknown;
                };
                self.call_member(&this, &name, &attr, call, scope)
            }
            NodeKind::Name { id, kind } => {
                let (callee, _) = self.reference(&func, id, *kind, scope);
                let this = self.self_type(scope);
                self.apply_all(&callee, this, call)
            }
            _ => {
                let callee = self.transform(&func, scope);
                let this = self.self_type(scope);
                self.apply_all(&callee, this, call)
            }
        }
    }

    /// Kernel calls with analysis-level meaning. `None` means an ordinary call.
    fn special_form(
        &mut self,
        node: &NodeRef,
        name: &str,
        args: &[NodeId],
        block: Option<NodeId>,
        scope: ScopeId,
    ) -> Option<Type> {
        // a user definition shadows the builtin
        if self.lookup_name(scope, name).is_some() {
            return None;
        }
        match name {
            "require" | "require_relative" | "load" => {
                let targets = self.transform_all(node, args, scope);
                let force = name == "load";
                let names: Vec<String> = targets
                    .iter()
                    .flat_map(|t| t.string_literals())
                    .map(str::to_string)
                    .collect();
                for n in names {
                    self.require_file(&n, force);
                }
                Some(Type::Bool)
            }
            "attr_accessor" | "attr_reader" | "attr_writer" => {
                self.define_attributes(node, args, scope);
                Some(Type::Nil)
            }
            "include" | "extend" | "prepend" => {
                self.add_mixins(node, args, scope);
                Some(Type::Nil)
            }
            "lambda" | "proc" => block.map(|b| self.transform(&node.with_id(b), scope)),
            _ => None,
        }
    }

    fn define_attributes(&mut self, node: &NodeRef, args: &[NodeId], scope: ScopeId) {
        let Some(c) = self.self_class(scope) else {
            return;
        };
        let instance = self.class(c).instance;
        for id in args {
            let arg = node.with_id(*id);
            let name = match arg.kind() {
                NodeKind::Symbol { id } => id.clone(),
                NodeKind::Str { value } => value.clone(),
                _ => continue,
            };
            let b = self.bind(instance, None, &name, &arg, arg.span(), BindingKind::Attribute, Type::Unknown);
            self.scopes.alias(instance, &format!("@{name}"), None, b);
        }
    }

    fn add_mixins(&mut self, node: &NodeRef, args: &[NodeId], scope: ScopeId) {
        let included = self.transform_all(node, args, scope);
        let owner = self
            .scopes
            .chain(scope)
            .find_map(|s| self.owner_of(s));
        let Some(owner) = owner else {
            return;
        };
        for m in included.iter().flat_map(|t| t.members()) {
            let Type::Module(m) = *m else {
                continue;
            };
            let mixins = match owner {
                Owner::Class(c) => &mut self.classes[c.index()].mixins,
                Owner::Module(own) if own == m => continue,
                Owner::Module(own) => &mut self.modules[own.index()].mixins,
            };
            if !mixins.contains(&m) {
                mixins.push(m);
            }
        }
    }

    /// Call `name` on a receiver of type `this`. Unknown members are not
    /// reported: the receiver may simply be a value we know nothing about.
    pub(super) fn call_member(&mut self, this: &Type, name: &str, attr: &NodeRef, call: CallArgs, scope: ScopeId) -> Type {
        if name == "new"
            && let Some(ty) = self.construct(this, &call)
        {
            return ty;
        }
        if name == "call" && this.functions().next().is_some() {
            return self.apply_all(this, Type::Unknown, call);
        }
        let Some(ids) = self.lookup_member(this, name) else {
            trace!(name, scope = scope.index(), "no member");
            return Type::Unknown;
        };
        self.put_ref(attr, &ids);
        let ty = self.type_of(&ids);
        let callable = ids
            .iter()
            .any(|id| self.registry.get(*id).is_some_and(|b| b.kind().is_callable()));
        if callable {
            self.apply_all(&ty, this.clone(), call)
        } else {
            ty
        }
    }

    /// `Class.new(...)`: runs `initialize` on a fresh instance.
    fn construct(&mut self, this: &Type, call: &CallArgs) -> Option<Type> {
        let classes: Vec<_> = this
            .members()
            .into_iter()
            .filter_map(|t| match t {
                Type::Class(c) => Some(*c),
                _ => None,
            })
            .collect();
        if classes.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(classes.len());
        for c in classes {
            let instance = Type::Instance(c);
            if let Some(ids) = self.lookup_member(&instance, "initialize") {
                let init = self.type_of(&ids);
                self.apply_all(&init, instance.clone(), call.clone());
            }
            out.push(instance);
        }
        Some(Type::make_union(out))
    }

    /// `yield args`: apply the block the enclosing method was given.
    pub(super) fn apply_block(&mut self, scope: ScopeId, args: Vec<Type>) -> Type {
        let Some(ids) = self.scopes.lookup(scope, BLOCK_NAME).map(<[_]>::to_vec) else {
            return Type::Unknown;
        };
        let block = self.type_of(&ids);
        let call = CallArgs {
            positional: args,
            ..CallArgs::default()
        };
        self.apply_all(&block, Type::Unknown, call)
    }

    /// Apply every function in `callee`; the result is the union of their
    /// return types. Non-function callees yield `Unknown`.
    pub(super) fn apply_all(&mut self, callee: &Type, this: Type, call: CallArgs) -> Type {
        let funs: Vec<FunId> = callee.functions().collect();
        let results: Vec<Type> = funs
            .into_iter()
            .map(|f| self.apply(f, this.clone(), call.clone()))
            .collect();
        Type::make_union(results)
    }

    /// Evaluate `fun`'s body for one call. Re-entrant applications with the
    /// same receiver and argument shapes, or beyond the recursion bound,
    /// return `Unknown` without descending.
    pub(crate) fn apply(&mut self, fun: FunId, this: Type, call: CallArgs) -> Type {
        self.functions[fun.index()].called = true;
        self.uncalled.shift_remove(&fun);
        self.calls += 1;

        let key = CallKey {
            fun,
            this: this.shape(),
            args: call.positional.iter().map(Type::shape).collect(),
        };
        if self.exhausted
            || self.call_stack.contains(&key)
            || self.functions[fun.index()].active >= self.options.max_recursion
        {
            return Type::Unknown;
        }

        let info = &self.functions[fun.index()];
        let (node, env, is_lambda, frame) = (info.node.clone(), info.env, info.is_lambda, info.frame);
        let NodeKind::Function { locator, params, body, .. } = node.kind() else {
            return Type::Unknown;
        };
        let frame = match frame {
            Some(f) => f,
            None => {
                let path = self.functions[fun.index()].qname.clone();
                let f = self.scopes.push(frame_kind(is_lambda), Some(env), path);
                self.functions[fun.index()].frame = Some(f);
                f
            }
        };

        if !is_lambda {
            let self_node = locator
                .and_then(|l| node.ast().locator_name(l))
                .map_or_else(|| node.clone(), |id| node.with_id(id));
            self.bind(frame, None, SELF_NAME, &self_node, node.span(), BindingKind::Scope, this);
        }
        self.bind_params(&node, params, call, frame);

        self.call_stack.insert(key.clone());
        self.functions[fun.index()].active += 1;
        self.returns.push(Type::Unknown);

        let body_ty = self.transform_opt(&node, *body, frame);

        let returned = self.returns.pop().unwrap_or_default();
        self.functions[fun.index()].active -= 1;
        self.call_stack.remove(&key);

        let result = join(body_ty, returned);
        let info = &mut self.functions[fun.index()];
        info.ret = join(std::mem::take(&mut info.ret), result.clone());
        result
    }

    fn bind_params(&mut self, node: &NodeRef, params: &Params, call: CallArgs, frame: ScopeId) {
        let CallArgs {
            positional,
            mut keywords,
            star,
            block,
        } = call;
        let n = params.positional.len();
        let first_default = n.saturating_sub(params.defaults.len());
        let mut args = positional.into_iter();

        for (i, p) in params.positional.iter().enumerate() {
            let param = node.with_id(*p);
            let mut ty = args.next();
            if ty.is_none()
                && let Some(name) = param.name_id()
                && let Some(pos) = keywords.iter().position(|(k, _)| k == name)
            {
                ty = Some(keywords.remove(pos).1);
            }
            if i >= first_default {
                let default = self.transform(&node.with_id(params.defaults[i - first_default]), frame);
                ty = Some(ty.unwrap_or(default));
            }
            self.bind_param(&param, ty.unwrap_or_default(), frame);
        }

        let mut extra: Vec<Type> = args.collect();
        let tail = extra.len().saturating_sub(params.after_rest.len());
        let after: Vec<Type> = extra.split_off(tail);
        let mut after = after.into_iter();
        for p in &params.after_rest {
            self.bind_param(&node.with_id(*p), after.next().unwrap_or_default(), frame);
        }

        if let Some(rest) = params.rest {
            let mut elems = extra;
            if let Some(Type::List { elem, .. }) = star {
                elems.push(*elem);
            }
            let ty = if elems.is_empty() { Type::list(Type::Unknown) } else { Type::list(Type::make_union(elems)) };
            self.bind_param(&node.with_id(rest), ty, frame);
        }
        if let Some(rest_kw) = params.rest_kw {
            let values = Type::make_union(keywords.into_iter().map(|(_, t)| t));
            self.bind_param(&node.with_id(rest_kw), Type::dict(Type::Symbol(None), values), frame);
        }
        if let Some(b) = params.block_arg {
            self.bind_param(&node.with_id(b), block.clone().unwrap_or_default(), frame);
        }
        if let Some(block) = block {
            self.bind(frame, None, BLOCK_NAME, node, node.span(), BindingKind::Scope, block);
        }
    }

    /// Parameters always bind in the callee frame, shadowing outer names.
    fn bind_param(&mut self, param: &NodeRef, ty: Type, frame: ScopeId) {
        match param.kind() {
            NodeKind::Name { id, .. } => {
                let id = id.clone();
                self.bind(frame, None, &id, param, param.span(), BindingKind::Parameter, ty);
            }
            _ => self.bind_target(param, ty, BindingKind::Parameter, frame),
        }
    }
}
