//! Conversion of the interpreter-side JSON dump into the node model.
//!
//! The dump is a tree of objects, each with a `type` tag plus optional
//! `start`/`end`/`start_line`/`start_col` positions. Compound operators are
//! desugared here so the analyzer only sees primitive ones.

use crate::ast::{Ast, AstBuilder, ControlKind, NameKind, NodeId, NodeKind, Op, Params, Span};
use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value};
use std::path::Path;

type Object = Map<String, Value>;

/// Convert a whole-file dump. A dump with no usable root yields an empty block.
pub fn ast_from_json(path: &Path, source_hash: u64, value: &Value) -> Result<Ast> {
    let mut cv = Converter {
        b: AstBuilder::new(path, source_hash),
    };
    let root = match cv.convert(value)? {
        Some(root) => root,
        None => cv.b.push(NodeKind::Block { stmts: Vec::new() }, Span::new(0, 0, 1, 1)),
    };
    Ok(cv.b.finish(root))
}

/// Operators as they appear in the dump, before desugaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceOp {
    Prim(Op),
    NotEqual,
    NotMatch,
    LtE,
    GtE,
    NotIn,
}

fn surface_op(name: &str) -> Result<SurfaceOp> {
    use SurfaceOp::*;
    let op = match name {
        "+" | "+@" => Prim(Op::Add),
        "-" | "-@" | "<=>" => Prim(Op::Sub),
        "*" => Prim(Op::Mul),
        "/" => Prim(Op::Div),
        "%" => Prim(Op::Mod),
        "**" => Prim(Op::Pow),
        "=~" => Prim(Op::Match),
        "==" | "===" => Prim(Op::Equal),
        "<" => Prim(Op::Lt),
        ">" => Prim(Op::Gt),
        "&" => Prim(Op::BitAnd),
        "|" => Prim(Op::BitOr),
        "^" => Prim(Op::BitXor),
        "in" => Prim(Op::In),
        "<<" => Prim(Op::LShift),
        ">>" => Prim(Op::RShift),
        "~" => Prim(Op::Invert),
        "and" | "&&" => Prim(Op::And),
        "or" | "||" => Prim(Op::Or),
        "not" | "!" => Prim(Op::Not),
        "defined" => Prim(Op::Defined),
        "!=" | "not_eq" => NotEqual,
        "!~" => NotMatch,
        "<=" => LtE,
        ">=" => GtE,
        "not in" => NotIn,
        other => bail!("illegal operator: {other}"),
    };
    Ok(op)
}

/// True for a JSON value the converter turns into a node.
fn is_node(v: Option<&Value>) -> bool {
    matches!(v, Some(Value::Object(m)) if !m.is_empty())
}

fn number(map: &Object, key: &str) -> Option<u64> {
    let v = map.get(key)?;
    v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
}

fn text(map: &Object, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn doc(map: &Object) -> Option<String> {
    match map.get("doc")? {
        Value::Object(d) => text(d, "id"),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

struct Converter {
    b: AstBuilder,
}

impl Converter {
    fn span(map: &Object) -> Span {
        let start = number(map, "start").unwrap_or(0) as usize;
        let end = number(map, "end").unwrap_or(1) as usize;
        let line = number(map, "start_line").unwrap_or(1) as u32;
        let col = number(map, "start_col").map_or(1, |c| c as u32 + 1);
        Span::new(start, end, line, col)
    }

    fn optional(&mut self, map: &Object, key: &str) -> Result<Option<NodeId>> {
        match map.get(key) {
            Some(v) => self.convert(v),
            None => Ok(None),
        }
    }

    fn required(&mut self, map: &Object, key: &str, ty: &str) -> Result<NodeId> {
        self.optional(map, key)?
            .ok_or_else(|| anyhow!("{ty} node without `{key}`"))
    }

    fn list(&mut self, map: &Object, key: &str) -> Result<Vec<NodeId>> {
        match map.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => self.list_of(items),
            Some(other) => bail!("`{key}` is not a list: {other}"),
        }
    }

    fn list_of(&mut self, items: &[Value]) -> Result<Vec<NodeId>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_object() {
                bail!("not a map: {item}");
            }
            if let Some(id) = self.convert(item)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn convert(&mut self, value: &Value) -> Result<Option<NodeId>> {
        let map = match value {
            Value::Object(m) if !m.is_empty() => m,
            _ => return Ok(None),
        };
        let ty = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("node without type: {value}"))?;
        let span = Self::span(map);

        let kind = match ty {
            "program" => return self.optional(map, "body"),
            "module" => {
                let instance_methods = match map.get("name") {
                    Some(Value::Object(n)) => {
                        n.get("type").and_then(Value::as_str) == Some("name")
                            && n.get("id")
                                .and_then(Value::as_str)
                                .is_some_and(|id| id.starts_with("InstanceMethods"))
                    }
                    _ => false,
                };
                if instance_methods {
                    return self.optional(map, "body");
                }
                let locator = self.required(map, "name", ty)?;
                let body = self.optional(map, "body")?;
                NodeKind::Module {
                    locator,
                    body,
                    doc: doc(map),
                }
            }
            "block" => NodeKind::Block {
                stmts: self.list(map, "stmts")?,
            },
            "def" | "lambda" => {
                let locator = self.optional(map, "name")?;
                let params = match map.get("params") {
                    Some(Value::Object(p)) => self.params(p)?,
                    _ => Params::default(),
                };
                let body = self.optional(map, "body")?;
                NodeKind::Function {
                    locator,
                    params,
                    body,
                    is_lambda: ty == "lambda",
                    doc: doc(map),
                }
            }
            "call" => self.call(map)?,
            "attribute" => {
                let target = self.required(map, "value", ty)?;
                let attr = self.required(map, "attr", ty)?;
                NodeKind::Attribute { target, attr }
            }
            "binary" => return self.binary(map, span).map(Some),
            "unary" => {
                let op = match map.get("op") {
                    Some(Value::Object(o)) => text(o, "name").unwrap_or_default(),
                    _ => String::new(),
                };
                let op = match surface_op(&op)? {
                    SurfaceOp::Prim(op) => op,
                    other => bail!("unsupported unary operator: {other:?}"),
                };
                NodeKind::UnaryOp {
                    op,
                    operand: self.required(map, "operand", ty)?,
                }
            }
            "void" => NodeKind::Void,
            "break" => NodeKind::Control {
                kind: ControlKind::Break,
            },
            "continue" => NodeKind::Control {
                kind: ControlKind::Next,
            },
            "redo" => NodeKind::Control {
                kind: ControlKind::Redo,
            },
            "retry" => NodeKind::Control {
                kind: ControlKind::Retry,
            },
            "class" => {
                let locator = self.required(map, "name", ty)?;
                let base = self.optional(map, "super")?;
                let body = self.optional(map, "body")?;
                NodeKind::Class {
                    locator,
                    base,
                    body,
                    is_static: map.get("static").and_then(Value::as_bool).unwrap_or(false),
                    doc: doc(map),
                }
            }
            "undef" => NodeKind::Undef {
                targets: self.list(map, "names")?,
            },
            "hash" => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                if let Some(Value::Array(entries)) = map.get("entries") {
                    for entry in entries.iter().filter_map(Value::as_object) {
                        if is_node(entry.get("key")) && is_node(entry.get("value")) {
                            keys.push(self.required(entry, "key", ty)?);
                            values.push(self.required(entry, "value", ty)?);
                        }
                    }
                }
                NodeKind::Dict { keys, values }
            }
            "rescue" => {
                let exceptions = self.list(map, "exceptions")?;
                let binder = self.optional(map, "binder")?;
                let body = self.optional(map, "handler")?;
                let orelse = self.optional(map, "else")?;
                NodeKind::Handler {
                    exceptions,
                    binder,
                    body,
                    orelse,
                }
            }
            "for" => {
                let target = self.required(map, "target", ty)?;
                let iter = self.required(map, "iter", ty)?;
                let body = self.optional(map, "body")?;
                NodeKind::For { target, iter, body }
            }
            "if" => {
                let test = self.required(map, "test", ty)?;
                let body = self.optional(map, "body")?;
                let orelse = self.optional(map, "else")?;
                NodeKind::If { test, body, orelse }
            }
            "while" => {
                let test = self.required(map, "test", ty)?;
                let body = self.optional(map, "body")?;
                NodeKind::While { test, body }
            }
            "keyword" => NodeKind::Keyword {
                arg: text(map, "arg").unwrap_or_default(),
                value: self.optional(map, "value")?,
            },
            "array" => NodeKind::Array {
                elts: self.list(map, "elts")?,
            },
            "args" => {
                let elts = if matches!(map.get("positional"), Some(Value::Array(_))) {
                    self.list(map, "positional")?
                } else {
                    self.list(map, "star")?
                };
                NodeKind::Array { elts }
            }
            "dot2" | "dot3" => {
                let mut elts = Vec::with_capacity(2);
                elts.extend(self.optional(map, "from")?);
                elts.extend(self.optional(map, "to")?);
                NodeKind::Array { elts }
            }
            "star" => NodeKind::Starred {
                value: self.required(map, "value", ty)?,
            },
            "arg" => NodeKind::Name {
                id: text(map, "arg").unwrap_or_default(),
                kind: NameKind::Local,
            },
            "return" => NodeKind::Return {
                value: self.optional(map, "value")?,
            },
            "yield" => NodeKind::Yield {
                value: self.optional(map, "value")?,
            },
            "string" => NodeKind::Str {
                value: text(map, "id").unwrap_or_default(),
            },
            "string_embexpr" => NodeKind::StrEmbed {
                value: self.optional(map, "value")?,
            },
            "regexp" => {
                let pattern = self.optional(map, "pattern")?;
                let end = self.optional(map, "regexp_end")?;
                NodeKind::Regexp { pattern, end }
            }
            "subscript" => return self.subscript(map, span),
            "begin" => {
                let body = self.optional(map, "body")?;
                let rescue = self.optional(map, "rescue")?;
                let orelse = self.optional(map, "else")?;
                let finally = self.optional(map, "ensure")?;
                NodeKind::Try {
                    body,
                    rescue,
                    orelse,
                    finally,
                }
            }
            "assign" => {
                let target = self.required(map, "target", ty)?;
                let value = self.required(map, "value", ty)?;
                NodeKind::Assign { target, value }
            }
            "name" | "cvar" | "ivar" | "gvar" => {
                let kind = match ty {
                    "cvar" => NameKind::Class,
                    "ivar" => NameKind::Instance,
                    "gvar" => NameKind::Global,
                    _ => NameKind::Local,
                };
                NodeKind::Name {
                    id: text(map, "id").unwrap_or_default(),
                    kind,
                }
            }
            "symbol" => NodeKind::Symbol {
                id: text(map, "id").unwrap_or_default(),
            },
            "int" => NodeKind::Int {
                text: text(map, "value").unwrap_or_default(),
            },
            "float" => NodeKind::Float {
                text: text(map, "value").unwrap_or_default(),
            },
            other => bail!("unexpected ast node: {other}"),
        };
        Ok(Some(self.b.push(kind, span)))
    }

    fn params(&mut self, p: &Object) -> Result<Params> {
        Ok(Params {
            positional: self.list(p, "positional")?,
            defaults: self.list(p, "defaults")?,
            rest: self.optional(p, "rest")?,
            rest_kw: self.optional(p, "rest_kw")?,
            after_rest: self.list(p, "after_rest")?,
            block_arg: self.optional(p, "blockarg")?,
        })
    }

    fn call(&mut self, map: &Object) -> Result<NodeKind> {
        let func = self.required(map, "func", "call")?;
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        let mut star = None;
        let mut block_arg = None;

        if let Some(Value::Object(a)) = map.get("args") {
            if let Some(Value::Array(items)) = a.get("positional") {
                for item in items {
                    let Some(obj) = item.as_object() else {
                        bail!("not a map: {item}");
                    };
                    // `f(name = value)` is a keyword argument
                    if let Some((arg, value)) = keyword_form(obj) {
                        let value = self.convert(value)?;
                        let kw = self.b.push(NodeKind::Keyword { arg, value }, Self::span(obj));
                        keywords.push(kw);
                    } else if let Some(id) = self.convert(item)? {
                        args.push(id);
                    }
                }
            }
            star = self.optional(a, "star")?;
            block_arg = self.optional(a, "blockarg")?;
        }

        Ok(NodeKind::Call {
            func,
            args,
            keywords,
            star,
            block_arg,
        })
    }

    fn binary(&mut self, map: &Object, span: Span) -> Result<NodeId> {
        let left = self.required(map, "left", "binary")?;
        let right = self.required(map, "right", "binary")?;
        let op = match map.get("op") {
            Some(Value::Object(o)) => text(o, "name").unwrap_or_default(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        let bin = |b: &mut AstBuilder, op, left, right| b.push(NodeKind::BinOp { op, left, right }, span);
        let not = |b: &mut AstBuilder, operand| b.push(NodeKind::UnaryOp { op: Op::Not, operand }, span);

        let id = match surface_op(&op)? {
            SurfaceOp::Prim(op) => bin(&mut self.b, op, left, right),
            SurfaceOp::NotEqual => {
                let eq = bin(&mut self.b, Op::Equal, left, right);
                not(&mut self.b, eq)
            }
            SurfaceOp::NotMatch => {
                let m = bin(&mut self.b, Op::Match, left, right);
                not(&mut self.b, m)
            }
            SurfaceOp::NotIn => {
                let m = bin(&mut self.b, Op::In, left, right);
                not(&mut self.b, m)
            }
            SurfaceOp::LtE | SurfaceOp::GtE => {
                let cmp = if op == "<=" { Op::Lt } else { Op::Gt };
                let left2 = self.b.deep_copy(left);
                let right2 = self.b.deep_copy(right);
                let strict = bin(&mut self.b, cmp, left, right);
                let eq = bin(&mut self.b, Op::Equal, left2, right2);
                bin(&mut self.b, Op::Or, strict, eq)
            }
        };
        Ok(id)
    }

    fn subscript(&mut self, map: &Object, span: Span) -> Result<Option<NodeId>> {
        let slice = match map.get("slice") {
            Some(Value::Array(items)) => {
                let nodes: Vec<&Value> = items.iter().filter(|v| is_node(Some(*v))).collect();
                match nodes.as_slice() {
                    [one] => {
                        let inner = self.convert(one)?;
                        match inner {
                            Some(inner) => {
                                let at = self.b.span(inner);
                                Some(self.b.push(NodeKind::Index { value: inner }, at))
                            }
                            None => None,
                        }
                    }
                    [lo, hi] => {
                        let lower = self.convert(lo)?;
                        let upper = self.convert(hi)?;
                        let at = match (lower, upper) {
                            (Some(l), Some(u)) => self.b.span(l).cover(self.b.span(u)),
                            _ => span,
                        };
                        Some(self.b.push(NodeKind::Slice { lower, upper }, at))
                    }
                    // unparseable slice: keep just the subscripted value
                    _ => return self.optional(map, "value"),
                }
            }
            Some(v) => self.convert(v)?,
            None => None,
        };
        let value = self.required(map, "value", "subscript")?;
        Ok(Some(self.b.push(NodeKind::Subscript { value, slice }, span)))
    }
}

/// `{"type": "assign", "target": {"type": "name", "id": ..}, "value": ..}`
fn keyword_form(obj: &Object) -> Option<(String, &Value)> {
    if obj.get("type").and_then(Value::as_str) != Some("assign") {
        return None;
    }
    let target = obj.get("target")?.as_object()?;
    if target.get("type").and_then(Value::as_str) != Some("name") {
        return None;
    }
    let arg = text(target, "id")?;
    Some((arg, obj.get("value")?))
}
