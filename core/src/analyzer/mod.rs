//! The analysis session.
//!
//! One [`Analyzer`] owns every piece of process-wide state: the scope arena,
//! the binding registry, function/class/module records, the cycle guards and
//! the diagnostics. Transforms receive it as `&mut self`; nothing is global.

use crate::ast::{NodeRef, Span};
use crate::binding::{Binding, BindingId, BindingKind, Registry};
use crate::cache::AstCache;
use crate::config::AnalyzerOptions;
use crate::diagnostics::{Category, Diagnostic, Diagnostics};
use crate::parse::SourceParser;
use crate::scope::{ScopeId, ScopeKind, Scopes, Tag};
use crate::typ::{ClassId, FunId, ModuleId, Type, TypeNames};
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

mod bind;
mod call;
mod define;
mod finish;
mod load;
mod summary;
mod transform;

#[cfg(test)]
mod analyzer_test;

pub use summary::AnalysisSummary;

/// Name of the synthetic binding for the receiver.
pub const SELF_NAME: &str = "self";
/// Name of the synthetic binding for a method's block argument.
pub const BLOCK_NAME: &str = "&block";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Fixpoint,
    Done,
}

/// Class or module a method is defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Class(ClassId),
    Module(ModuleId),
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    node: NodeRef,
    name: String,
    qname: String,
    /// Defining scope; the closure environment.
    env: ScopeId,
    owner: Option<Owner>,
    class_level: bool,
    is_lambda: bool,
    called: bool,
    /// Frame reused by every application.
    frame: Option<ScopeId>,
    ret: Type,
    active: usize,
}

impl FunctionInfo {
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }

    pub fn is_called(&self) -> bool {
        self.called
    }

    /// Union of return types over every application so far.
    pub fn return_type(&self) -> &Type {
        &self.ret
    }
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    name: String,
    qname: String,
    /// Class body scope: methods, constants, class variables.
    scope: ScopeId,
    /// Instance variables and attribute accessors.
    instance: ScopeId,
    base: Option<ClassId>,
    mixins: Vec<ModuleId>,
}

impl ClassInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn instance_scope(&self) -> ScopeId {
        self.instance
    }

    pub fn base(&self) -> Option<ClassId> {
        self.base
    }

    pub fn mixins(&self) -> &[ModuleId] {
        &self.mixins
    }
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    name: String,
    qname: String,
    scope: ScopeId,
    mixins: Vec<ModuleId>,
}

impl ModuleInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

/// Re-entrancy key for function application: the function plus the shapes
/// of its receiver and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey {
    fun: FunId,
    this: Type,
    args: Vec<Type>,
}

pub struct Analyzer {
    options: AnalyzerOptions,
    cache: AstCache,
    scopes: Scopes,
    registry: Registry,

    functions: Vec<FunctionInfo>,
    fun_by_node: FxHashMap<NodeRef, FunId>,
    classes: Vec<ClassInfo>,
    class_by_qname: FxHashMap<String, ClassId>,
    modules: Vec<ModuleInfo>,
    module_by_qname: FxHashMap<String, ModuleId>,
    scope_owner: FxHashMap<ScopeId, Owner>,

    call_stack: FxHashSet<CallKey>,
    import_stack: FxHashSet<PathBuf>,
    uncalled: IndexSet<FunId>,
    /// Stack of `return` accumulators, one per active application.
    returns: Vec<Type>,

    loaded: IndexSet<PathBuf>,
    failed_to_parse: IndexSet<PathBuf>,
    diagnostics: Diagnostics,
    resolved: FxHashSet<NodeRef>,
    unresolved: FxHashSet<NodeRef>,
    autoloaded: FxHashSet<String>,

    static_context: bool,
    cwd: Option<PathBuf>,
    project_dir: Option<PathBuf>,
    depth: usize,
    exhausted: bool,
    calls: usize,
    phase: Phase,
    started: Instant,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("phase", &self.phase)
            .field("bindings", &self.registry.len())
            .field("files", &self.loaded.len())
            .finish()
    }
}

impl Analyzer {
    /// Session using the parser and cache described by `options`.
    pub fn new(options: AnalyzerOptions) -> Result<Self> {
        let parser = options.build_parser()?;
        Ok(Self::with_parser(options, parser))
    }

    pub fn with_parser(options: AnalyzerOptions, parser: Arc<dyn SourceParser>) -> Self {
        let mut cache = AstCache::new(parser);
        if options.disk_cache {
            cache = cache.with_disk_cache(&options.cache_dir);
        }
        Self {
            options,
            cache,
            scopes: Scopes::new(),
            registry: Registry::new(),
            functions: Vec::new(),
            fun_by_node: FxHashMap::default(),
            classes: Vec::new(),
            class_by_qname: FxHashMap::default(),
            modules: Vec::new(),
            module_by_qname: FxHashMap::default(),
            scope_owner: FxHashMap::default(),
            call_stack: FxHashSet::default(),
            import_stack: FxHashSet::default(),
            uncalled: IndexSet::new(),
            returns: Vec::new(),
            loaded: IndexSet::new(),
            failed_to_parse: IndexSet::new(),
            diagnostics: Diagnostics::default(),
            resolved: FxHashSet::default(),
            unresolved: FxHashSet::default(),
            autoloaded: FxHashSet::default(),
            static_context: false,
            cwd: None,
            project_dir: None,
            depth: 0,
            exhausted: false,
            calls: 0,
            phase: Phase::Idle,
            started: Instant::now(),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn cache(&self) -> &AstCache {
        &self.cache
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn global_scope(&self) -> ScopeId {
        self.scopes.global()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn all_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.registry.all().map(|(_, b)| b)
    }

    pub fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.registry.get(id)
    }

    pub fn references_for(&self, file: &Path) -> Option<&IndexMap<NodeRef, Vec<BindingId>>> {
        self.registry.get_references(file)
    }

    pub fn diagnostics_for(&self, file: &Path) -> &[Diagnostic] {
        self.diagnostics.for_file(file)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn loaded_files(&self) -> impl Iterator<Item = &Path> {
        self.loaded.iter().map(PathBuf::as_path)
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &Path> {
        self.failed_to_parse.iter().map(PathBuf::as_path)
    }

    pub fn is_resolved(&self, node: &NodeRef) -> bool {
        self.resolved.contains(node)
    }

    pub fn function(&self, id: FunId) -> &FunctionInfo {
        &self.functions[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunId, &FunctionInfo)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunId(i as u32), f))
    }

    pub fn class(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.index()]
    }

    pub fn class_named(&self, qname: &str) -> Option<(ClassId, &ClassInfo)> {
        let id = *self.class_by_qname.get(qname)?;
        Some((id, self.class(id)))
    }

    pub fn module(&self, id: ModuleId) -> &ModuleInfo {
        &self.modules[id.index()]
    }

    pub fn module_named(&self, qname: &str) -> Option<(ModuleId, &ModuleInfo)> {
        let id = *self.module_by_qname.get(qname)?;
        Some((id, self.module(id)))
    }

    pub fn static_context(&self) -> bool {
        self.static_context
    }

    pub fn set_static_context(&mut self, on: bool) {
        self.static_context = on;
    }

    /// Bindings `name` resolves to from `scope`, honoring the static-context
    /// flag: class-tier entries first inside a static context, instance-tier
    /// entries first otherwise.
    pub fn lookup_name(&self, scope: ScopeId, name: &str) -> Option<Vec<BindingId>> {
        let (first, second) = if self.static_context {
            (Some(Tag::Class), None)
        } else {
            (None, Some(Tag::Class))
        };
        self.scopes
            .lookup_tagged(scope, name, first)
            .or_else(|| self.scopes.lookup_tagged(scope, name, second))
            .map(<[BindingId]>::to_vec)
    }

    /// Union of the types of `ids`.
    pub fn type_of(&self, ids: &[BindingId]) -> Type {
        Type::make_union(ids.iter().filter_map(|id| self.registry.get(*id)).map(|b| b.ty().clone()))
    }

    pub fn display_type(&self, ty: &Type) -> String {
        ty.display(self)
    }

    // ---- helpers shared by the transform modules ----

    fn put_problem(&mut self, node: &NodeRef, category: Category, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::at(node, category, message));
    }

    /// Record `node` as resolved to `ids`.
    fn put_ref(&mut self, node: &NodeRef, ids: &[BindingId]) {
        self.registry.put_ref(node, ids);
        self.unresolved.remove(node);
        self.resolved.insert(node.clone());
    }

    fn mark_unresolved(&mut self, node: &NodeRef) {
        if !self.resolved.contains(node) {
            self.unresolved.insert(node.clone());
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bind(
        &mut self,
        scope: ScopeId,
        tag: Option<Tag>,
        name: &str,
        node: &NodeRef,
        body: Span,
        kind: BindingKind,
        ty: Type,
    ) -> BindingId {
        let qname = self.scopes.qualify(scope, name);
        let binding = Binding::new(name, qname, kind, node.clone(), body, ty);
        self.scopes.insert(&mut self.registry, scope, tag, binding)
    }

    /// Type of `self` as seen from `scope`.
    fn self_type(&self, scope: ScopeId) -> Type {
        self.scopes
            .lookup(scope, SELF_NAME)
            .map(|ids| self.type_of(ids))
            .unwrap_or_default()
    }

    fn owner_of(&self, scope: ScopeId) -> Option<Owner> {
        self.scope_owner.get(&scope).copied()
    }

    /// Class whose instances `self` denotes from `scope`, if any.
    fn self_class(&self, scope: ScopeId) -> Option<ClassId> {
        self.self_type(scope).members().into_iter().find_map(|t| match t {
            Type::Instance(c) | Type::Class(c) => Some(*c),
            _ => None,
        })
    }

    fn add_uncalled(&mut self, fun: FunId) {
        if !self.functions[fun.index()].called {
            self.uncalled.insert(fun);
        }
    }

    /// Receiver type a method gets when applied without a call site.
    fn default_self(&self, fun: FunId) -> Type {
        let info = &self.functions[fun.index()];
        match info.owner {
            Some(Owner::Class(c)) if info.class_level => Type::Class(c),
            Some(Owner::Class(c)) => Type::Instance(c),
            Some(Owner::Module(m)) => Type::Module(m),
            None => Type::Unknown,
        }
    }
}

impl TypeNames for Analyzer {
    fn function_name(&self, id: FunId) -> String {
        self.functions
            .get(id.index())
            .map_or_else(|| format!("#{}", id.index()), |f| f.name.clone())
    }

    fn class_name(&self, id: ClassId) -> String {
        self.classes
            .get(id.index())
            .map_or_else(|| format!("Class#{}", id.index()), |c| c.qname.clone())
    }

    fn module_name(&self, id: ModuleId) -> String {
        self.modules
            .get(id.index())
            .map_or_else(|| format!("Module#{}", id.index()), |m| m.qname.clone())
    }
}

/// Kind of scope a new frame gets: blocks share their enclosing method's
/// locals, `def` bodies do not.
fn frame_kind(is_lambda: bool) -> ScopeKind {
    if is_lambda { ScopeKind::Scope } else { ScopeKind::Function }
}

/// Union that treats `Unknown` as "no information yet".
fn join(a: Type, b: Type) -> Type {
    match (a.is_unknown(), b.is_unknown()) {
        (true, _) => b,
        (_, true) => a,
        _ => Type::union(a, b),
    }
}
