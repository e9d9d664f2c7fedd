#[cfg(test)]
mod tests {
    use super::super::load::snake_case;
    use super::super::*;
    use crate::ast::{AstBuilder, NameKind, NodeKind, Span};
    use crate::parse::JsonAstParser;

    fn session() -> Analyzer {
        let options = AnalyzerOptions {
            disk_cache: false,
            prewarm: false,
            ..AnalyzerOptions::default()
        };
        Analyzer::with_parser(options, Arc::new(JsonAstParser::new()))
    }

    /// Two name nodes `x` in a throwaway tree.
    fn two_names() -> (NodeRef, NodeRef) {
        let mut b = AstBuilder::new("mem.rb", 0);
        let name = |id: &str| NodeKind::Name {
            id: id.to_string(),
            kind: NameKind::Local,
        };
        let a = b.push(name("x"), Span::new(0, 1, 1, 1));
        let c = b.push(name("x"), Span::new(2, 3, 2, 1));
        let root = b.push(NodeKind::Block { stmts: vec![a, c] }, Span::new(0, 3, 1, 1));
        let ast = Arc::new(b.finish(root));
        (NodeRef::new(Arc::clone(&ast), a), NodeRef::new(ast, c))
    }

    #[test]
    fn snake_case_follows_file_naming() {
        assert_eq!(snake_case("Foo"), "foo");
        assert_eq!(snake_case("FooBar"), "foo_bar");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("Base64Coder"), "base64_coder");
    }

    #[test]
    fn join_ignores_unknown() {
        assert_eq!(join(Type::Unknown, Type::Num), Type::Num);
        assert_eq!(join(Type::Nil, Type::Unknown), Type::Nil);
        assert_eq!(join(Type::Num, Type::Num), Type::Num);
        assert_eq!(join(Type::Num, Type::Nil), Type::make_union([Type::Nil, Type::Num]));
    }

    #[test]
    fn static_context_picks_the_class_tier_first() {
        let mut a = session();
        let (inst_node, class_node) = two_names();
        let global = a.global_scope();
        let span = inst_node.span();
        let inst = a.bind(global, None, "x", &inst_node, span, BindingKind::Method, Type::Num);
        let class = a.bind(global, Some(Tag::Class), "x", &class_node, span, BindingKind::ClassMethod, Type::str());

        assert_eq!(a.lookup_name(global, "x"), Some(vec![inst]));
        a.set_static_context(true);
        assert_eq!(a.lookup_name(global, "x"), Some(vec![class]));
        a.set_static_context(false);
        assert_eq!(a.lookup_name(global, "x"), Some(vec![inst]));
    }

    #[test]
    fn tiers_fall_back_to_each_other() {
        let mut a = session();
        let (node, _) = two_names();
        let global = a.global_scope();
        let only_class = a.bind(global, Some(Tag::Class), "y", &node, node.span(), BindingKind::ClassMethod, Type::Num);
        assert_eq!(a.lookup_name(global, "y"), Some(vec![only_class]));
        a.set_static_context(true);
        let (other, _) = two_names();
        let only_inst = a.bind(global, None, "z", &other, other.span(), BindingKind::Method, Type::Num);
        assert_eq!(a.lookup_name(global, "z"), Some(vec![only_inst]));
        assert_eq!(a.lookup_name(global, "missing"), None);
    }

    #[test]
    fn rebinding_the_same_node_merges() {
        let mut a = session();
        let (node, _) = two_names();
        let global = a.global_scope();
        let first = a.bind(global, None, "x", &node, node.span(), BindingKind::Variable, Type::Num);
        let again = a.bind(global, None, "x", &node, node.span(), BindingKind::Variable, Type::str());
        assert_eq!(first, again);
        assert_eq!(a.registry().len(), 1);
        let ty = a.binding(first).map(|b| b.ty().clone());
        assert_eq!(ty, Some(Type::make_union([Type::Num, Type::str()])));
    }

    #[test]
    fn a_new_session_is_idle_and_empty() {
        let a = session();
        assert_eq!(a.phase(), Phase::Idle);
        assert!(a.registry().is_empty());
        assert_eq!(a.loaded_files().count(), 0);
        let summary = a.summary();
        assert_eq!(summary.files_loaded, 0);
        assert_eq!(summary.resolve_rate, 100.0);
    }
}
