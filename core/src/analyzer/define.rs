//! Class, module and method definitions.

use super::{Analyzer, ClassInfo, FunctionInfo, ModuleInfo, Owner, SELF_NAME};
use crate::ast::{NodeId, NodeKind, NodeRef};
use crate::binding::BindingKind;
use crate::scope::{ScopeId, ScopeKind, Tag};
use crate::typ::{ClassId, FunId, ModuleId, Type};

/// Module names whose body holds class-level methods.
const CLASS_METHODS: &str = "ClassMethods";

impl Analyzer {
    /// Evaluate `body` in `scope` with the static-context flag set to `on`.
    fn with_static_context(&mut self, on: bool, node: &NodeRef, body: Option<NodeId>, scope: ScopeId) -> Type {
        let prev = std::mem::replace(&mut self.static_context, on);
        let ty = self.transform_opt(node, body, scope);
        self.static_context = prev;
        ty
    }

    /// Scope a definition named by `locator` lands in: the scope of `Outer`
    /// for `Outer::Name`, the current scope otherwise.
    fn definition_scope(&mut self, node: &NodeRef, locator: NodeId, scope: ScopeId) -> ScopeId {
        match node.ast().kind(locator) {
            NodeKind::Attribute { target, .. } => {
                let outer = self.transform(&node.with_id(*target), scope);
                self.member_scope(&outer).unwrap_or(scope)
            }
            _ => scope,
        }
    }

    pub(super) fn transform_module(
        &mut self,
        node: &NodeRef,
        locator: NodeId,
        body: Option<NodeId>,
        scope: ScopeId,
    ) -> Type {
        let ast = node.ast();
        let Some(name_id) = ast.locator_name(locator) else {
            self.transform_opt(node, body, scope);
            return Type::Nil;
        };
        let name_node = node.with_id(name_id);
        let Some(name) = name_node.name_id().map(str::to_string) else {
            return Type::Nil;
        };
        if name == CLASS_METHODS {
            self.with_static_context(true, node, body, scope);
            return Type::Nil;
        }

        let def_scope = self.definition_scope(node, locator, scope);
        let qname = self.scopes.qualify(def_scope, &name);
        let id = self.module_for(&name, qname, def_scope);
        let ty = Type::Module(id);
        let inner = self.modules[id.index()].scope;

        self.bind(def_scope, None, &name, &name_node, node.span(), BindingKind::Module, ty.clone());
        self.bind(inner, None, SELF_NAME, &name_node, node.span(), BindingKind::Scope, ty.clone());
        self.with_static_context(false, node, body, inner);
        ty
    }

    fn module_for(&mut self, name: &str, qname: String, parent: ScopeId) -> ModuleId {
        if let Some(&id) = self.module_by_qname.get(&qname) {
            return id;
        }
        let id = ModuleId(self.modules.len() as u32);
        let scope = self.scopes.push(ScopeKind::Module, Some(parent), qname.clone());
        self.scope_owner.insert(scope, Owner::Module(id));
        self.modules.push(ModuleInfo {
            name: name.to_string(),
            qname: qname.clone(),
            scope,
            mixins: Vec::new(),
        });
        self.module_by_qname.insert(qname, id);
        id
    }

    pub(super) fn transform_class(
        &mut self,
        node: &NodeRef,
        locator: NodeId,
        base: Option<NodeId>,
        body: Option<NodeId>,
        is_static: bool,
        scope: ScopeId,
    ) -> Type {
        // `class << self` only flips the namespace tier
        if is_static {
            self.with_static_context(true, node, body, scope);
            return Type::Nil;
        }

        let base_class = base.and_then(|b| {
            let ty = self.transform(&node.with_id(b), scope);
            ty.members().into_iter().find_map(|t| match t {
                Type::Class(c) => Some(*c),
                _ => None,
            })
        });

        let ast = node.ast();
        let Some(name_id) = ast.locator_name(locator) else {
            self.transform_opt(node, body, scope);
            return Type::Nil;
        };
        let name_node = node.with_id(name_id);
        let Some(name) = name_node.name_id().map(str::to_string) else {
            return Type::Nil;
        };

        let def_scope = self.definition_scope(node, locator, scope);
        let qname = self.scopes.qualify(def_scope, &name);
        let id = self.class_for(&name, qname, def_scope);
        if let Some(b) = base_class
            && b != id
            && self.classes[id.index()].base.is_none()
        {
            self.classes[id.index()].base = Some(b);
        }
        let ty = Type::Class(id);
        let inner = self.classes[id.index()].scope;

        self.bind(def_scope, None, &name, &name_node, node.span(), BindingKind::Class, ty.clone());
        self.bind(inner, None, SELF_NAME, &name_node, node.span(), BindingKind::Scope, ty.clone());
        self.with_static_context(false, node, body, inner);
        ty
    }

    fn class_for(&mut self, name: &str, qname: String, parent: ScopeId) -> ClassId {
        if let Some(&id) = self.class_by_qname.get(&qname) {
            return id;
        }
        let id = ClassId(self.classes.len() as u32);
        let scope = self.scopes.push(ScopeKind::Class, Some(parent), qname.clone());
        let instance = self.scopes.push(ScopeKind::Instance, Some(scope), qname.clone());
        self.scope_owner.insert(scope, Owner::Class(id));
        self.classes.push(ClassInfo {
            name: name.to_string(),
            qname: qname.clone(),
            scope,
            instance,
            base: None,
            mixins: Vec::new(),
        });
        self.class_by_qname.insert(qname, id);
        id
    }

    /// `def`, lambda or block. The body is not evaluated here; it runs when
    /// the function is applied (or during the uncalled drain).
    pub(super) fn transform_function(&mut self, node: &NodeRef, scope: ScopeId) -> Type {
        let NodeKind::Function {
            locator, is_lambda, ..
        } = node.kind()
        else {
            return Type::Unknown;
        };
        let (locator, is_lambda) = (*locator, *is_lambda);
        let ast = node.ast();

        let Some(locator) = locator else {
            let fun = self.function_for(node, "lambda".to_string(), scope, None, false, true);
            self.add_uncalled(fun);
            return Type::Function(fun);
        };

        let Some(name_id) = ast.locator_name(locator) else {
            return Type::Unknown;
        };
        let name_node = node.with_id(name_id);
        let Some(name) = name_node.name_id().map(str::to_string) else {
            return Type::Unknown;
        };

        // `def self.x` and `def Const.x` define on the receiver's class tier
        let (def_scope, on_receiver) = match ast.kind(locator) {
            NodeKind::Attribute { target, .. } => {
                let target = node.with_id(*target);
                if target.name_id() == Some(SELF_NAME) {
                    (scope, true)
                } else {
                    let recv = self.transform(&target, scope);
                    (self.member_scope(&recv).unwrap_or(scope), true)
                }
            }
            _ => (scope, false),
        };
        let class_level = on_receiver || self.static_context;
        let owner = self.owner_of(def_scope);

        let fun = self.function_for(node, name.clone(), def_scope, owner, class_level, is_lambda);
        let kind = match (owner, class_level) {
            (Some(_), true) => BindingKind::ClassMethod,
            (Some(_), false) => BindingKind::Method,
            (None, _) => BindingKind::Function,
        };
        let tag = class_level.then_some(Tag::Class);
        let ty = Type::Function(fun);
        self.bind(def_scope, tag, &name, &name_node, node.span(), kind, ty.clone());
        self.add_uncalled(fun);
        ty
    }

    fn function_for(
        &mut self,
        node: &NodeRef,
        name: String,
        env: ScopeId,
        owner: Option<Owner>,
        class_level: bool,
        is_lambda: bool,
    ) -> FunId {
        if let Some(&id) = self.fun_by_node.get(node) {
            return id;
        }
        let id = FunId(self.functions.len() as u32);
        let qname = self.scopes.qualify(env, &name);
        self.functions.push(FunctionInfo {
            node: node.clone(),
            name,
            qname,
            env,
            owner,
            class_level,
            is_lambda,
            called: false,
            frame: None,
            ret: Type::Unknown,
            active: 0,
        });
        self.fun_by_node.insert(node.clone(), id);
        id
    }
}
