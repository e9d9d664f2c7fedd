//! Fixture helpers: AST dumps written as JSON files into a temp tree.
#![allow(dead_code)]

use serde_json::{Value, json};
use sonar_core::ast::Ast;
use sonar_core::parse::{JsonAstParser, SourceParser};
use sonar_core::{Analyzer, AnalyzerOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn options() -> AnalyzerOptions {
    AnalyzerOptions {
        disk_cache: false,
        prewarm: false,
        ..AnalyzerOptions::default()
    }
}

pub fn analyzer() -> Analyzer {
    Analyzer::with_parser(options(), Arc::new(JsonAstParser::new()))
}

/// Write `stmts` as a program to `dir/name`, numbering every node so each
/// one gets its own offset and line. Returns the canonical path.
pub fn write_program(dir: &Path, name: &str, stmts: Vec<Value>) -> PathBuf {
    let mut program = json!({"type": "program", "body": block(stmts)});
    let mut next = 0u64;
    number(&mut program, &mut next);
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(&path, serde_json::to_vec_pretty(&program).expect("json")).expect("write dump");
    path.canonicalize().expect("canonicalize")
}

fn number(v: &mut Value, next: &mut u64) {
    match v {
        Value::Object(map) => {
            if map.contains_key("type") && !map.contains_key("start") {
                *next += 1;
                map.insert("start".into(), json!(*next * 10));
                map.insert("end".into(), json!(*next * 10 + 5));
                map.insert("start_line".into(), json!(*next));
                map.insert("start_col".into(), json!(0));
            }
            for child in map.values_mut() {
                number(child, next);
            }
        }
        Value::Array(items) => {
            for item in items {
                number(item, next);
            }
        }
        _ => {}
    }
}

pub fn block(stmts: Vec<Value>) -> Value {
    json!({"type": "block", "stmts": stmts})
}

pub fn name(id: &str) -> Value {
    json!({"type": "name", "id": id})
}

pub fn ivar(id: &str) -> Value {
    json!({"type": "ivar", "id": id})
}

pub fn int(v: i64) -> Value {
    json!({"type": "int", "value": v})
}

pub fn string(s: &str) -> Value {
    json!({"type": "string", "id": s})
}

pub fn symbol(s: &str) -> Value {
    json!({"type": "symbol", "id": s})
}

pub fn assign(target: Value, value: Value) -> Value {
    json!({"type": "assign", "target": target, "value": value})
}

pub fn array(elts: Vec<Value>) -> Value {
    json!({"type": "array", "elts": elts})
}

pub fn attr(value: Value, attr: &str) -> Value {
    json!({"type": "attribute", "value": value, "attr": name(attr)})
}

pub fn binary(op: &str, left: Value, right: Value) -> Value {
    json!({"type": "binary", "op": {"name": op}, "left": left, "right": right})
}

pub fn call(func: Value, args: Vec<Value>) -> Value {
    json!({"type": "call", "func": func, "args": {"positional": args}})
}

pub fn call_with_block(func: Value, args: Vec<Value>, blk: Value) -> Value {
    json!({"type": "call", "func": func, "args": {"positional": args, "blockarg": blk}})
}

pub fn ret(value: Value) -> Value {
    json!({"type": "return", "value": value})
}

pub fn yield_(args: Vec<Value>) -> Value {
    json!({"type": "yield", "value": {"type": "args", "positional": args}})
}

pub fn def(fname: &str, params: &[&str], body: Vec<Value>) -> Value {
    let params: Vec<Value> = params.iter().map(|p| name(p)).collect();
    json!({
        "type": "def",
        "name": name(fname),
        "params": {"positional": params},
        "body": block(body),
    })
}

/// `def self.fname`
pub fn defs(fname: &str, params: &[&str], body: Vec<Value>) -> Value {
    let params: Vec<Value> = params.iter().map(|p| name(p)).collect();
    json!({
        "type": "def",
        "name": attr(name("self"), fname),
        "params": {"positional": params},
        "body": block(body),
    })
}

pub fn lambda(params: &[&str], body: Vec<Value>) -> Value {
    let params: Vec<Value> = params.iter().map(|p| name(p)).collect();
    json!({"type": "lambda", "params": {"positional": params}, "body": block(body)})
}

pub fn class(cname: &str, base: Option<&str>, body: Vec<Value>) -> Value {
    let mut v = json!({"type": "class", "name": name(cname), "body": block(body)});
    if let Some(b) = base {
        v["super"] = name(b);
    }
    v
}

pub fn module(mname: &str, body: Vec<Value>) -> Value {
    json!({"type": "module", "name": name(mname), "body": block(body)})
}

pub fn require(target: &str) -> Value {
    call(name("require"), vec![string(target)])
}

/// JSON dump parser that counts how often it is asked to parse.
#[derive(Default)]
pub struct CountingParser {
    inner: JsonAstParser,
    pub calls: AtomicUsize,
}

impl CountingParser {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceParser for CountingParser {
    fn parse(&self, path: &Path) -> Option<Ast> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(path)
    }
}

/// Messages reported for `file`.
pub fn messages(a: &Analyzer, file: &Path) -> Vec<String> {
    a.diagnostics_for(file).iter().map(|d| d.message.clone()).collect()
}

/// Bindings with qualified name `qname`.
pub fn bindings_named<'a>(a: &'a Analyzer, qname: &str) -> Vec<&'a sonar_core::binding::Binding> {
    a.all_bindings().filter(|b| b.qname() == qname).collect()
}
