//! Syntax tree model consumed by the analyzer.
//!
//! Trees are produced by an external parser (see [`crate::parse`]) and are
//! immutable once built. Each file's tree lives in a flat arena ([`Ast`]);
//! nodes refer to their parent and children by [`NodeId`], and a [`NodeRef`]
//! pairs an id with the shared tree so it can outlive the walk that found it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod builder;


pub use builder::AstBuilder;

/// Index of a node inside its file's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source location of a node: byte range (end exclusive) plus 1-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, col: u32) -> Self {
        Self {
            start,
            end: end.max(start),
            line,
            col,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        let (first, _) = if self.start <= other.start { (self, other) } else { (other, self) };
        Span {
            start: first.start,
            end: self.end.max(other.end),
            line: first.line,
            col: first.col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Primitive operators. Compound surface operators (`!=`, `<=`, `not in`, ...)
/// are desugared by the converter before a tree reaches the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Equal,
    Lt,
    Gt,
    BitAnd,
    BitOr,
    BitXor,
    In,
    LShift,
    RShift,
    Invert,
    And,
    Or,
    Not,
    Defined,
    Match,
}

impl Op {
    pub fn is_comparison(self) -> bool {
        matches!(self, Op::Equal | Op::Lt | Op::Gt | Op::In | Op::Match | Op::Not)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Op::And | Op::Or)
    }
}

/// Which namespace an identifier lives in (`x`, `@x`, `@@x`, `$x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameKind {
    Local,
    Instance,
    Class,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Break,
    Next,
    Redo,
    Retry,
}

/// Formal parameters of a `def` or block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub positional: Vec<NodeId>,
    /// Default values, aligned with the tail of `positional`.
    pub defaults: Vec<NodeId>,
    pub rest: Option<NodeId>,
    pub rest_kw: Option<NodeId>,
    pub after_rest: Vec<NodeId>,
    pub block_arg: Option<NodeId>,
}

impl Params {
    fn map_ids(&self, f: &mut impl FnMut(NodeId) -> NodeId) -> Params {
        Params {
            positional: self.positional.iter().map(|&id| f(id)).collect(),
            defaults: self.defaults.iter().map(|&id| f(id)).collect(),
            rest: self.rest.map(&mut *f),
            rest_kw: self.rest_kw.map(&mut *f),
            after_rest: self.after_rest.iter().map(|&id| f(id)).collect(),
            block_arg: self.block_arg.map(&mut *f),
        }
    }
}

/// Closed set of node kinds; the analyzer has one handler per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Block {
        stmts: Vec<NodeId>,
    },
    Module {
        locator: NodeId,
        body: Option<NodeId>,
        doc: Option<String>,
    },
    Class {
        locator: NodeId,
        base: Option<NodeId>,
        body: Option<NodeId>,
        /// `class << self`
        is_static: bool,
        doc: Option<String>,
    },
    Function {
        /// `None` for lambdas and blocks.
        locator: Option<NodeId>,
        params: Params,
        body: Option<NodeId>,
        is_lambda: bool,
        doc: Option<String>,
    },
    Call {
        func: NodeId,
        args: Vec<NodeId>,
        keywords: Vec<NodeId>,
        star: Option<NodeId>,
        block_arg: Option<NodeId>,
    },
    Attribute {
        target: NodeId,
        attr: NodeId,
    },
    BinOp {
        op: Op,
        left: NodeId,
        right: NodeId,
    },
    UnaryOp {
        op: Op,
        operand: NodeId,
    },
    Assign {
        target: NodeId,
        value: NodeId,
    },
    Name {
        id: String,
        kind: NameKind,
    },
    Symbol {
        id: String,
    },
    Str {
        value: String,
    },
    StrEmbed {
        value: Option<NodeId>,
    },
    Regexp {
        pattern: Option<NodeId>,
        end: Option<NodeId>,
    },
    Int {
        text: String,
    },
    Float {
        text: String,
    },
    Array {
        elts: Vec<NodeId>,
    },
    Dict {
        keys: Vec<NodeId>,
        values: Vec<NodeId>,
    },
    Starred {
        value: NodeId,
    },
    Keyword {
        arg: String,
        value: Option<NodeId>,
    },
    If {
        test: NodeId,
        body: Option<NodeId>,
        orelse: Option<NodeId>,
    },
    While {
        test: NodeId,
        body: Option<NodeId>,
    },
    For {
        target: NodeId,
        iter: NodeId,
        body: Option<NodeId>,
    },
    Try {
        body: Option<NodeId>,
        rescue: Option<NodeId>,
        orelse: Option<NodeId>,
        finally: Option<NodeId>,
    },
    Handler {
        exceptions: Vec<NodeId>,
        binder: Option<NodeId>,
        body: Option<NodeId>,
        orelse: Option<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Yield {
        value: Option<NodeId>,
    },
    Subscript {
        value: NodeId,
        slice: Option<NodeId>,
    },
    Index {
        value: NodeId,
    },
    Slice {
        lower: Option<NodeId>,
        upper: Option<NodeId>,
    },
    Control {
        kind: ControlKind,
    },
    Undef {
        targets: Vec<NodeId>,
    },
    Void,
}

impl NodeKind {
    /// Rebuild this kind with every child id passed through `f`, in source order.
    pub fn map_children(&self, f: &mut impl FnMut(NodeId) -> NodeId) -> NodeKind {
        fn all(ids: &[NodeId], f: &mut impl FnMut(NodeId) -> NodeId) -> Vec<NodeId> {
            ids.iter().map(|&id| f(id)).collect()
        }

        match self {
            NodeKind::Block { stmts } => NodeKind::Block { stmts: all(stmts, f) },
            NodeKind::Module { locator, body, doc } => NodeKind::Module {
                locator: f(*locator),
                body: body.map(&mut *f),
                doc: doc.clone(),
            },
            NodeKind::Class {
                locator,
                base,
                body,
                is_static,
                doc,
            } => NodeKind::Class {
                locator: f(*locator),
                base: base.map(&mut *f),
                body: body.map(&mut *f),
                is_static: *is_static,
                doc: doc.clone(),
            },
            NodeKind::Function {
                locator,
                params,
                body,
                is_lambda,
                doc,
            } => {
                let locator = locator.map(&mut *f);
                let params = params.map_ids(f);
                NodeKind::Function {
                    locator,
                    params,
                    body: body.map(&mut *f),
                    is_lambda: *is_lambda,
                    doc: doc.clone(),
                }
            }
            NodeKind::Call {
                func,
                args,
                keywords,
                star,
                block_arg,
            } => {
                let func = f(*func);
                let args = all(args, f);
                let keywords = all(keywords, f);
                NodeKind::Call {
                    func,
                    args,
                    keywords,
                    star: star.map(&mut *f),
                    block_arg: block_arg.map(&mut *f),
                }
            }
            NodeKind::Attribute { target, attr } => {
                let target = f(*target);
                NodeKind::Attribute { target, attr: f(*attr) }
            }
            NodeKind::BinOp { op, left, right } => {
                let left = f(*left);
                NodeKind::BinOp {
                    op: *op,
                    left,
                    right: f(*right),
                }
            }
            NodeKind::UnaryOp { op, operand } => NodeKind::UnaryOp {
                op: *op,
                operand: f(*operand),
            },
            NodeKind::Assign { target, value } => {
                let target = f(*target);
                NodeKind::Assign { target, value: f(*value) }
            }
            NodeKind::StrEmbed { value } => NodeKind::StrEmbed { value: value.map(&mut *f) },
            NodeKind::Regexp { pattern, end } => {
                let pattern = pattern.map(&mut *f);
                NodeKind::Regexp {
                    pattern,
                    end: end.map(&mut *f),
                }
            }
            NodeKind::Array { elts } => NodeKind::Array { elts: all(elts, f) },
            NodeKind::Dict { keys, values } => {
                // keys and values interleave in source order
                let mut new_keys = Vec::with_capacity(keys.len());
                let mut new_values = Vec::with_capacity(values.len());
                for (k, v) in keys.iter().zip(values.iter()) {
                    new_keys.push(f(*k));
                    new_values.push(f(*v));
                }
                NodeKind::Dict {
                    keys: new_keys,
                    values: new_values,
                }
            }
            NodeKind::Starred { value } => NodeKind::Starred { value: f(*value) },
            NodeKind::Keyword { arg, value } => NodeKind::Keyword {
                arg: arg.clone(),
                value: value.map(&mut *f),
            },
            NodeKind::If { test, body, orelse } => {
                let test = f(*test);
                let body = body.map(&mut *f);
                NodeKind::If {
                    test,
                    body,
                    orelse: orelse.map(&mut *f),
                }
            }
            NodeKind::While { test, body } => {
                let test = f(*test);
                NodeKind::While {
                    test,
                    body: body.map(&mut *f),
                }
            }
            NodeKind::For { target, iter, body } => {
                let target = f(*target);
                let iter = f(*iter);
                NodeKind::For {
                    target,
                    iter,
                    body: body.map(&mut *f),
                }
            }
            NodeKind::Try {
                body,
                rescue,
                orelse,
                finally,
            } => {
                let body = body.map(&mut *f);
                let rescue = rescue.map(&mut *f);
                let orelse = orelse.map(&mut *f);
                NodeKind::Try {
                    body,
                    rescue,
                    orelse,
                    finally: finally.map(&mut *f),
                }
            }
            NodeKind::Handler {
                exceptions,
                binder,
                body,
                orelse,
            } => {
                let exceptions = all(exceptions, f);
                let binder = binder.map(&mut *f);
                let body = body.map(&mut *f);
                NodeKind::Handler {
                    exceptions,
                    binder,
                    body,
                    orelse: orelse.map(&mut *f),
                }
            }
            NodeKind::Return { value } => NodeKind::Return { value: value.map(&mut *f) },
            NodeKind::Yield { value } => NodeKind::Yield { value: value.map(&mut *f) },
            NodeKind::Subscript { value, slice } => {
                let value = f(*value);
                NodeKind::Subscript {
                    value,
                    slice: slice.map(&mut *f),
                }
            }
            NodeKind::Index { value } => NodeKind::Index { value: f(*value) },
            NodeKind::Slice { lower, upper } => {
                let lower = lower.map(&mut *f);
                NodeKind::Slice {
                    lower,
                    upper: upper.map(&mut *f),
                }
            }
            NodeKind::Undef { targets } => NodeKind::Undef { targets: all(targets, f) },
            NodeKind::Name { .. }
            | NodeKind::Symbol { .. }
            | NodeKind::Str { .. }
            | NodeKind::Int { .. }
            | NodeKind::Float { .. }
            | NodeKind::Control { .. }
            | NodeKind::Void => self.clone(),
        }
    }

    /// Short tag used in logs and debug output.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Block { .. } => "block",
            NodeKind::Module { .. } => "module",
            NodeKind::Class { .. } => "class",
            NodeKind::Function { .. } => "def",
            NodeKind::Call { .. } => "call",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::BinOp { .. } => "binary",
            NodeKind::UnaryOp { .. } => "unary",
            NodeKind::Assign { .. } => "assign",
            NodeKind::Name { .. } => "name",
            NodeKind::Symbol { .. } => "symbol",
            NodeKind::Str { .. } => "string",
            NodeKind::StrEmbed { .. } => "string_embexpr",
            NodeKind::Regexp { .. } => "regexp",
            NodeKind::Int { .. } => "int",
            NodeKind::Float { .. } => "float",
            NodeKind::Array { .. } => "array",
            NodeKind::Dict { .. } => "hash",
            NodeKind::Starred { .. } => "star",
            NodeKind::Keyword { .. } => "keyword",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::For { .. } => "for",
            NodeKind::Try { .. } => "begin",
            NodeKind::Handler { .. } => "rescue",
            NodeKind::Return { .. } => "return",
            NodeKind::Yield { .. } => "yield",
            NodeKind::Subscript { .. } => "subscript",
            NodeKind::Index { .. } => "index",
            NodeKind::Slice { .. } => "slice",
            NodeKind::Control { .. } => "control",
            NodeKind::Undef { .. } => "undef",
            NodeKind::Void => "void",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// One file's syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    file: PathBuf,
    content_hash: u64,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Hash of the source text this tree was parsed from.
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Identifier text if `id` is a name node.
    pub fn name_id(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Name { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// The name node a definition locator designates: `Foo` for `Foo` and
    /// for `Outer::Foo`, `bar` for `self.bar`.
    pub fn locator_name(&self, locator: NodeId) -> Option<NodeId> {
        match self.kind(locator) {
            NodeKind::Name { .. } => Some(locator),
            NodeKind::Attribute { attr, .. } => Some(*attr),
            _ => None,
        }
    }

    /// Walk parents from `id` (exclusive) up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    pub(crate) fn set_file(&mut self, file: PathBuf) {
        self.file = file;
    }
}

/// A node together with the tree that owns it.
///
/// Equality and hashing are by tree identity plus node id, so two parses of
/// the same file never alias each other's nodes.
#[derive(Clone)]
pub struct NodeRef {
    ast: Arc<Ast>,
    id: NodeId,
}

impl NodeRef {
    pub fn new(ast: Arc<Ast>, id: NodeId) -> Self {
        Self { ast, id }
    }

    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &Node {
        self.ast.node(self.id)
    }

    pub fn kind(&self) -> &NodeKind {
        self.ast.kind(self.id)
    }

    pub fn file(&self) -> &Path {
        self.ast.file()
    }

    pub fn span(&self) -> Span {
        self.ast.span(self.id)
    }

    /// Sibling reference into the same tree.
    pub fn with_id(&self, id: NodeId) -> NodeRef {
        NodeRef {
            ast: Arc::clone(&self.ast),
            id,
        }
    }

    pub fn name_id(&self) -> Option<&str> {
        self.ast.name_id(self.id)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.ast, &other.ast)
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.ast), state);
        self.id.hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {}:{})",
            self.kind().tag(),
            self.file().display(),
            self.span()
        )
    }
}
