#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::binding::*;
    use crate::typ::Type;
    use std::path::Path;
    use std::sync::Arc;

    /// One file with names `a`, `b`, `c` under a block.
    fn tree(file: &str) -> Arc<Ast> {
        let mut b = AstBuilder::new(file, 0);
        let ids: Vec<NodeId> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, n)| {
                b.push(
                    NodeKind::Name {
                        id: n.to_string(),
                        kind: NameKind::Local,
                    },
                    Span::new(i * 2, i * 2 + 1, 1, i as u32 * 2 + 1),
                )
            })
            .collect();
        let root = b.push(NodeKind::Block { stmts: ids }, Span::new(0, 5, 1, 1));
        Arc::new(b.finish(root))
    }

    fn node(ast: &Arc<Ast>, i: usize) -> NodeRef {
        NodeRef::new(Arc::clone(ast), ast.children(ast.root())[i])
    }

    fn var(ast: &Arc<Ast>, i: usize, ty: Type) -> Binding {
        let n = node(ast, i);
        let name = n.name_id().unwrap_or_default().to_string();
        Binding::new(name.clone(), name, BindingKind::Variable, n.clone(), n.span(), ty)
    }

    #[test]
    fn revisiting_a_definition_merges_instead_of_duplicating() {
        let ast = tree("a.rb");
        let mut reg = Registry::new();
        let first = reg.register_binding(var(&ast, 0, Type::Num));
        let again = reg.register_binding(var(&ast, 0, Type::str()));
        assert_eq!(first, again);
        assert_eq!(reg.len(), 1);
        let ty = reg.get(first).map(|b| b.ty().clone());
        assert_eq!(ty, Some(Type::make_union([Type::Num, Type::str()])));
    }

    #[test]
    fn same_node_different_kind_is_distinct() {
        let ast = tree("a.rb");
        let mut reg = Registry::new();
        let v = reg.register_binding(var(&ast, 0, Type::Num));
        let n = node(&ast, 0);
        let attr = reg.register_binding(Binding::new("a", "a", BindingKind::Attribute, n.clone(), n.span(), Type::Num));
        assert_ne!(v, attr);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn put_ref_deduplicates_and_fills_reference_sets() {
        let ast = tree("a.rb");
        let mut reg = Registry::new();
        let id = reg.register_binding(var(&ast, 0, Type::Num));
        let use_site = node(&ast, 1);
        reg.put_ref(&use_site, &[id, id]);
        reg.put_ref(&use_site, &[id]);

        let refs = reg.get_references(Path::new("a.rb")).expect("file indexed");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.get(&use_site), Some(&vec![id]));
        let b = reg.get(id).expect("binding");
        assert_eq!(b.refs().len(), 1);
        assert!(!b.is_unused());
        assert_eq!(reg.cross_references(), 1);
        assert_eq!(reg.referencing_nodes(), 1);
    }

    #[test]
    fn unused_only_for_value_kinds() {
        let ast = tree("a.rb");
        let n = node(&ast, 2);
        for (kind, unused) in [
            (BindingKind::Variable, true),
            (BindingKind::Parameter, true),
            (BindingKind::Attribute, true),
            (BindingKind::Function, false),
            (BindingKind::Method, false),
            (BindingKind::Class, false),
            (BindingKind::Module, false),
            (BindingKind::Scope, false),
        ] {
            let b = Binding::new("c", "c", kind, n.clone(), n.span(), Type::Unknown);
            assert_eq!(b.is_unused(), unused, "{kind:?}");
        }
    }

    #[test]
    fn remove_file_drops_bindings_and_dangling_refs() {
        let a = tree("a.rb");
        let b = tree("b.rb");
        let mut reg = Registry::new();
        let in_a = reg.register_binding(var(&a, 0, Type::Num));
        let in_b = reg.register_binding(var(&b, 0, Type::Num));
        // b.rb uses a.rb's binding, a.rb uses b.rb's
        reg.put_ref(&node(&b, 1), &[in_a]);
        reg.put_ref(&node(&a, 1), &[in_b]);

        let removed = reg.remove_file(Path::new("a.rb"));
        assert!(removed.contains(&in_a));
        assert!(reg.get(in_a).is_none());
        assert_eq!(reg.len(), 1);
        assert!(reg.get_references(Path::new("a.rb")).is_none());
        let b_refs = reg.get_references(Path::new("b.rb")).expect("b indexed");
        assert!(b_refs.values().all(|ids| ids.is_empty()));
        assert!(reg.get(in_b).is_some_and(|b| b.refs().is_empty()));

        // re-registering the removed definition creates a fresh binding
        let fresh = reg.register_binding(var(&a, 0, Type::Num));
        assert_ne!(fresh, in_a);
    }

    #[test]
    fn remove_references_only_drops_index() {
        let ast = tree("a.rb");
        let mut reg = Registry::new();
        let id = reg.register_binding(var(&ast, 0, Type::Num));
        reg.put_ref(&node(&ast, 1), &[id]);
        reg.remove_references(Path::new("a.rb"));
        assert!(reg.get_references(Path::new("a.rb")).is_none());
        assert_eq!(reg.len(), 1);
    }
}
