#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parse::convert::ast_from_json;
    use crate::parse::{JsonAstParser, content_hash};
    use serde_json::{Value, json};
    use std::path::Path;

    fn convert(v: Value) -> Ast {
        ast_from_json(Path::new("x.rb"), 1, &v).expect("convert")
    }

    fn name(id: &str) -> Value {
        json!({"type": "name", "id": id})
    }

    fn program(stmts: Vec<Value>) -> Value {
        json!({"type": "program", "body": {"type": "block", "stmts": stmts}})
    }

    fn first_stmt(ast: &Ast) -> NodeId {
        ast.children(ast.root())[0]
    }

    #[test]
    fn program_unwraps_to_block() {
        let ast = convert(program(vec![json!({"type": "int", "value": "1"})]));
        assert!(matches!(ast.kind(ast.root()), NodeKind::Block { stmts } if stmts.len() == 1));
        assert_eq!(ast.file(), Path::new("x.rb"));
        assert_eq!(ast.content_hash(), 1);
    }

    #[test]
    fn positions_default_and_shift_columns() {
        let ast = convert(json!({"type": "name", "id": "a", "start": 3, "end": 4, "start_line": 2, "start_col": 5}));
        let s = ast.span(ast.root());
        assert_eq!((s.start, s.end, s.line, s.col), (3, 4, 2, 6));

        let ast = convert(json!({"type": "void"}));
        let s = ast.span(ast.root());
        assert_eq!((s.start, s.end, s.line, s.col), (0, 1, 1, 1));
    }

    #[test]
    fn not_equal_becomes_not_of_equal() {
        let ast = convert(json!({"type": "binary", "op": {"name": "!="}, "left": name("a"), "right": name("b")}));
        let NodeKind::UnaryOp { op: Op::Not, operand } = ast.kind(ast.root()) else {
            panic!("expected not, got {:?}", ast.kind(ast.root()));
        };
        assert!(matches!(ast.kind(*operand), NodeKind::BinOp { op: Op::Equal, .. }));
    }

    #[test]
    fn less_equal_becomes_or_with_copied_operands() {
        let ast = convert(json!({"type": "binary", "op": {"name": "<="}, "left": name("a"), "right": name("b")}));
        let NodeKind::BinOp { op: Op::Or, left, right } = ast.kind(ast.root()).clone() else {
            panic!("expected or");
        };
        let NodeKind::BinOp { op: Op::Lt, left: a1, .. } = ast.kind(left).clone() else {
            panic!("expected <");
        };
        let NodeKind::BinOp { op: Op::Equal, left: a2, .. } = ast.kind(right).clone() else {
            panic!("expected ==");
        };
        assert_ne!(a1, a2);
        assert_eq!(ast.name_id(a1), Some("a"));
        assert_eq!(ast.name_id(a2), Some("a"));
        assert_eq!(ast.parent(a1), Some(left));
        assert_eq!(ast.parent(a2), Some(right));
    }

    #[test]
    fn operator_synonyms_map_to_primitives() {
        for (surface, prim) in [("===", Op::Equal), ("<=>", Op::Sub), ("&&", Op::And), ("||", Op::Or)] {
            let ast = convert(json!({"type": "binary", "op": {"name": surface}, "left": name("a"), "right": name("b")}));
            assert!(
                matches!(ast.kind(ast.root()), NodeKind::BinOp { op, .. } if *op == prim),
                "{surface}"
            );
        }
        let ast = convert(json!({"type": "unary", "op": {"name": "-@"}, "operand": name("a")}));
        assert!(matches!(ast.kind(ast.root()), NodeKind::UnaryOp { op: Op::Sub, .. }));
    }

    #[test]
    fn illegal_operator_is_an_error() {
        let v = json!({"type": "binary", "op": {"name": "<~>"}, "left": name("a"), "right": name("b")});
        assert!(ast_from_json(Path::new("x.rb"), 0, &v).is_err());
    }

    #[test]
    fn unknown_node_kind_is_an_error() {
        let v = program(vec![json!({"type": "heredoc"})]);
        assert!(ast_from_json(Path::new("x.rb"), 0, &v).is_err());
    }

    #[test]
    fn assignment_arguments_become_keywords() {
        let ast = convert(json!({
            "type": "call",
            "func": name("f"),
            "args": {"type": "args", "positional": [
                {"type": "int", "value": "1"},
                {"type": "assign", "target": name("k"), "value": {"type": "int", "value": "2"}}
            ]}
        }));
        let NodeKind::Call { args, keywords, .. } = ast.kind(ast.root()) else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert_eq!(keywords.len(), 1);
        assert!(matches!(ast.kind(keywords[0]), NodeKind::Keyword { arg, value: Some(_) } if arg == "k"));
        assert_eq!(ast.len(), 5, "no orphan nodes");
    }

    #[test]
    fn instance_methods_module_is_replaced_by_body() {
        let ast = convert(program(vec![json!({
            "type": "module",
            "name": name("InstanceMethods"),
            "body": {"type": "block", "stmts": [{"type": "int", "value": "1"}]}
        })]));
        let stmt = first_stmt(&ast);
        assert!(matches!(ast.kind(stmt), NodeKind::Block { .. }));
    }

    #[test]
    fn subscript_shapes() {
        let one = convert(json!({"type": "subscript", "value": name("a"), "slice": [{"type": "int", "value": "0"}]}));
        let NodeKind::Subscript { slice: Some(s), .. } = one.kind(one.root()) else {
            panic!("expected subscript");
        };
        assert!(matches!(one.kind(*s), NodeKind::Index { .. }));

        let two = convert(json!({"type": "subscript", "value": name("a"),
            "slice": [{"type": "int", "value": "0"}, {"type": "int", "value": "2"}]}));
        let NodeKind::Subscript { slice: Some(s), .. } = two.kind(two.root()) else {
            panic!("expected subscript");
        };
        assert!(matches!(two.kind(*s), NodeKind::Slice { lower: Some(_), upper: Some(_) }));

        let bad = convert(json!({"type": "subscript", "value": name("a"), "slice": []}));
        assert_eq!(bad.name_id(bad.root()), Some("a"));
        assert_eq!(bad.len(), 1);
    }

    #[test]
    fn ranges_become_arrays_and_hash_drops_partial_entries() {
        let ast = convert(json!({"type": "dot2", "from": {"type": "int", "value": "1"}, "to": {"type": "int", "value": "3"}}));
        assert!(matches!(ast.kind(ast.root()), NodeKind::Array { elts } if elts.len() == 2));

        let ast = convert(json!({"type": "hash", "entries": [
            {"key": {"type": "symbol", "id": "a"}, "value": {"type": "int", "value": "1"}},
            {"key": {"type": "symbol", "id": "b"}, "value": null}
        ]}));
        assert!(matches!(ast.kind(ast.root()), NodeKind::Dict { keys, values } if keys.len() == 1 && values.len() == 1));
        assert_eq!(ast.len(), 3);
    }

    #[test]
    fn def_params_and_class_fields() {
        let ast = convert(program(vec![json!({
            "type": "class",
            "name": name("Foo"),
            "super": name("Base"),
            "static": false,
            "body": {"type": "block", "stmts": [{
                "type": "def",
                "name": name("bar"),
                "params": {
                    "positional": [name("a"), name("b")],
                    "defaults": [{"type": "int", "value": "1"}],
                    "rest": name("rest"),
                    "blockarg": name("blk")
                },
                "body": {"type": "block", "stmts": []}
            }]}
        })]));
        let class = first_stmt(&ast);
        let NodeKind::Class { base: Some(_), body: Some(body), is_static: false, .. } = ast.kind(class) else {
            panic!("expected class");
        };
        let def = ast.children(*body)[0];
        let NodeKind::Function { locator: Some(_), params, is_lambda: false, .. } = ast.kind(def) else {
            panic!("expected def");
        };
        assert_eq!(params.positional.len(), 2);
        assert_eq!(params.defaults.len(), 1);
        assert!(params.rest.is_some() && params.block_arg.is_some() && params.rest_kw.is_none());
    }

    #[test]
    fn json_parser_rejects_garbage_without_panicking() {
        let parser = JsonAstParser::new();
        assert!(parser.parse_bytes(Path::new("bad.rb"), b"def (").is_none());
        let ok = parser
            .parse_bytes(Path::new("ok.rb"), br#"{"type": "int", "value": "1"}"#)
            .expect("parses");
        assert_eq!(ok.content_hash(), content_hash(br#"{"type": "int", "value": "1"}"#));
    }
}
