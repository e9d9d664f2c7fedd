//! Inferred value shapes.
//!
//! A [`Type`] is plain data: functions, classes and modules are referred to by
//! id, and the analyzer owns the records behind those ids. This keeps types
//! cheap to clone, hash and compare, and gives function types identity
//! equality for free.

use std::collections::BTreeSet;
use std::fmt;


/// Identity of a function definition (one per `def`/lambda node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunId(pub(crate) u32);

/// Identity of a class, keyed by qualified name so reopening shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

macro_rules! arena_id {
    ($($id:ident),*) => {$(
        impl $id {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

arena_id!(FunId, ClassId, ModuleId);

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// Nothing is known. Sorts first so unions keep it out of the way.
    #[default]
    Unknown,
    Nil,
    Bool,
    Num,
    /// String, with its value when it is a literal.
    Str(Option<String>),
    Symbol(Option<String>),
    List {
        elem: Box<Type>,
        /// Element values, filled only when every element is a string literal.
        literals: Vec<String>,
    },
    Dict {
        key: Box<Type>,
        value: Box<Type>,
    },
    Function(FunId),
    Class(ClassId),
    Module(ModuleId),
    /// Instance of a class (`Foo.new`).
    Instance(ClassId),
    /// Invariant: two or more members, none of them unions.
    Union(BTreeSet<Type>),
}

impl Type {
    pub fn str() -> Type {
        Type::Str(None)
    }

    pub fn str_literal(s: impl Into<String>) -> Type {
        Type::Str(Some(s.into()))
    }

    pub fn list(elem: Type) -> Type {
        Type::List {
            elem: Box::new(elem),
            literals: Vec::new(),
        }
    }

    /// List type from element types; literal strings are remembered when
    /// every element is one.
    pub fn list_of(elems: Vec<Type>) -> Type {
        let literals: Option<Vec<String>> = elems
            .iter()
            .map(|t| match t {
                Type::Str(Some(s)) => Some(s.clone()),
                _ => None,
            })
            .collect();
        let literals = match literals {
            Some(l) if !l.is_empty() => l,
            _ => Vec::new(),
        };
        Type::List {
            elem: Box::new(Type::make_union(elems)),
            literals,
        }
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Union of `types`: nested unions are flattened, duplicates removed, a
    /// single member collapses to itself and no members at all is `Unknown`.
    pub fn make_union<I: IntoIterator<Item = Type>>(types: I) -> Type {
        let mut members = BTreeSet::new();
        for t in types {
            match t {
                Type::Union(inner) => members.extend(inner),
                other => {
                    members.insert(other);
                }
            }
        }
        match members.len() {
            0 => Type::Unknown,
            1 => members.into_iter().next().unwrap_or_default(),
            _ => Type::Union(members),
        }
    }

    pub fn union(a: Type, b: Type) -> Type {
        if a == b {
            return a;
        }
        Type::make_union([a, b])
    }

    /// Grow `self` to include `other`.
    pub fn merge(&mut self, other: Type) {
        if *self == other {
            return;
        }
        let current = std::mem::take(self);
        *self = Type::union(current, other);
    }

    /// Members of a union, or the type itself.
    pub fn members(&self) -> Vec<&Type> {
        match self {
            Type::Union(set) => set.iter().collect(),
            other => vec![other],
        }
    }

    /// First member that is not `Unknown`, for when a single representative
    /// is enough.
    pub fn first_useful(&self) -> &Type {
        const UNKNOWN: &Type = &Type::Unknown;
        match self {
            Type::Union(set) => set.iter().find(|t| !t.is_unknown()).unwrap_or(UNKNOWN),
            other => other,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Type::Union(_))
    }

    /// Whether `self` already covers every member of `other`.
    pub fn contains(&self, other: &Type) -> bool {
        let mine = self.members();
        other.members().iter().all(|t| mine.contains(t))
    }

    pub fn functions(&self) -> impl Iterator<Item = FunId> + '_ {
        self.members().into_iter().filter_map(|t| match t {
            Type::Function(f) => Some(*f),
            _ => None,
        })
    }

    /// Literal strings this type may hold: a literal string, a union of them,
    /// or a list built from literals.
    pub fn string_literals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for t in self.members() {
            match t {
                Type::Str(Some(s)) => out.push(s.as_str()),
                Type::List { literals, .. } => out.extend(literals.iter().map(String::as_str)),
                _ => {}
            }
        }
        out
    }

    /// Drop literal payloads so shape comparisons ignore concrete values.
    pub fn shape(&self) -> Type {
        match self {
            Type::Str(_) => Type::Str(None),
            Type::Symbol(_) => Type::Symbol(None),
            Type::List { elem, .. } => Type::list(elem.shape()),
            Type::Dict { key, value } => Type::dict(key.shape(), value.shape()),
            Type::Union(set) => Type::make_union(set.iter().map(Type::shape)),
            other => other.clone(),
        }
    }

    pub fn display(&self, names: &impl TypeNames) -> String {
        match self {
            Type::Unknown => "?".to_string(),
            Type::Nil => "nil".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::Num => "Num".to_string(),
            Type::Str(_) => "Str".to_string(),
            Type::Symbol(_) => "Symbol".to_string(),
            Type::List { elem, .. } => format!("[{}]", elem.display(names)),
            Type::Dict { key, value } => format!("{{{} => {}}}", key.display(names), value.display(names)),
            Type::Function(f) => format!("fn {}", names.function_name(*f)),
            Type::Class(c) => format!("class {}", names.class_name(*c)),
            Type::Module(m) => format!("module {}", names.module_name(*m)),
            Type::Instance(c) => names.class_name(*c),
            Type::Union(set) => {
                let mut parts: Vec<String> = Vec::with_capacity(set.len());
                for t in set {
                    let s = t.display(names);
                    if !parts.contains(&s) {
                        parts.push(s);
                    }
                }
                if parts.len() == 1 {
                    parts.remove(0)
                } else {
                    format!("{{{}}}", parts.join(" | "))
                }
            }
        }
    }
}

/// Resolves ids back to names for [`Type::display`].
pub trait TypeNames {
    fn function_name(&self, id: FunId) -> String;
    fn class_name(&self, id: ClassId) -> String;
    fn module_name(&self, id: ModuleId) -> String;
}

/// Names ids by number; used by `Display` when no analyzer is at hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl TypeNames for Anonymous {
    fn function_name(&self, id: FunId) -> String {
        format!("#{}", id.0)
    }

    fn class_name(&self, id: ClassId) -> String {
        format!("Class#{}", id.0)
    }

    fn module_name(&self, id: ModuleId) -> String {
        format!("Module#{}", id.0)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(&Anonymous))
    }
}
