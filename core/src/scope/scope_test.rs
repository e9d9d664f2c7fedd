#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::binding::*;
    use crate::scope::*;
    use crate::typ::Type;
    use std::sync::Arc;

    fn names(n: usize) -> Vec<NodeRef> {
        let mut b = AstBuilder::new("s.rb", 0);
        let ids: Vec<NodeId> = (0..n)
            .map(|i| {
                b.push(
                    NodeKind::Name {
                        id: format!("n{i}"),
                        kind: NameKind::Local,
                    },
                    Span::new(i, i + 1, 1, i as u32 + 1),
                )
            })
            .collect();
        let root = b.push(NodeKind::Block { stmts: ids.clone() }, Span::new(0, n, 1, 1));
        let ast = Arc::new(b.finish(root));
        ids.into_iter().map(|id| NodeRef::new(Arc::clone(&ast), id)).collect()
    }

    fn binding(name: &str, kind: BindingKind, node: &NodeRef, ty: Type) -> Binding {
        Binding::new(name, name, kind, node.clone(), node.span(), ty)
    }

    #[test]
    fn lookup_walks_outward_to_nearest() {
        let nodes = names(3);
        let mut reg = Registry::new();
        let mut scopes = Scopes::new();
        let global = scopes.global();
        let class = scopes.push(ScopeKind::Class, Some(global), "Foo");
        let func = scopes.push(ScopeKind::Function, Some(class), "Foo.bar");

        let outer = scopes.insert(&mut reg, global, None, binding("x", BindingKind::Variable, &nodes[0], Type::Num));
        assert_eq!(scopes.lookup(func, "x"), Some(&[outer][..]));

        let inner = scopes.insert(&mut reg, func, None, binding("x", BindingKind::Variable, &nodes[1], Type::str()));
        assert_eq!(scopes.lookup(func, "x"), Some(&[inner][..]));
        assert_eq!(scopes.lookup(class, "x"), Some(&[outer][..]));
        assert_eq!(scopes.lookup(func, "missing"), None);
        assert_eq!(scopes.defining_scope(func, "x"), Some(func));
        assert_eq!(scopes.enclosing(func, &[ScopeKind::Class]), Some(class));
    }

    #[test]
    fn reassignment_appends() {
        let nodes = names(2);
        let mut reg = Registry::new();
        let mut scopes = Scopes::new();
        let g = scopes.global();
        let a = scopes.insert(&mut reg, g, None, binding("x", BindingKind::Variable, &nodes[0], Type::Num));
        let b = scopes.insert(&mut reg, g, None, binding("x", BindingKind::Variable, &nodes[1], Type::str()));
        assert_eq!(scopes.lookup(g, "x"), Some(&[a, b][..]));
        // revisiting the first definition does not add a third entry
        let again = scopes.insert(&mut reg, g, None, binding("x", BindingKind::Variable, &nodes[0], Type::Nil));
        assert_eq!(again, a);
        assert_eq!(scopes.lookup(g, "x").map(<[_]>::len), Some(2));
    }

    #[test]
    fn tagged_entries_are_a_separate_tier() {
        let nodes = names(2);
        let mut reg = Registry::new();
        let mut scopes = Scopes::new();
        let g = scopes.global();
        let class = scopes.push(ScopeKind::Class, Some(g), "Foo");
        let inst = scopes.insert(&mut reg, class, None, binding("m", BindingKind::Method, &nodes[0], Type::Unknown));
        let stat = scopes.insert(&mut reg, class, Some(Tag::Class), binding("m", BindingKind::ClassMethod, &nodes[1], Type::Unknown));

        assert_eq!(scopes.lookup(class, "m"), Some(&[inst][..]));
        assert_eq!(scopes.lookup_tagged(class, "m", Some(Tag::Class)), Some(&[stat][..]));
        assert_eq!(scopes.get(class).len(), 2);
    }

    #[test]
    fn purge_removes_ids_and_empty_entries_stop_matching() {
        let nodes = names(1);
        let mut reg = Registry::new();
        let mut scopes = Scopes::new();
        let g = scopes.global();
        let inner = scopes.push(ScopeKind::Scope, Some(g), "");
        scopes.insert(&mut reg, inner, None, binding("x", BindingKind::Variable, &nodes[0], Type::Num));
        let removed = reg.remove_file(nodes[0].file());
        scopes.purge(&removed);
        assert_eq!(scopes.lookup(inner, "x"), None);
    }

    #[test]
    fn qualify_uses_scope_path() {
        let mut scopes = Scopes::new();
        let g = scopes.global();
        let m = scopes.push(ScopeKind::Module, Some(g), "Outer.Inner");
        assert_eq!(scopes.qualify(g, "foo"), "foo");
        assert_eq!(scopes.qualify(m, "foo"), "Outer.Inner.foo");
    }

    #[test]
    fn alias_shares_binding() {
        let nodes = names(1);
        let mut reg = Registry::new();
        let mut scopes = Scopes::new();
        let g = scopes.global();
        let c = scopes.push(ScopeKind::Class, Some(g), "C");
        let id = scopes.insert(&mut reg, g, None, binding("x", BindingKind::Variable, &nodes[0], Type::Num));
        scopes.alias(c, "y", None, id);
        scopes.alias(c, "y", None, id);
        assert_eq!(scopes.lookup(c, "y"), Some(&[id][..]));
    }
}
