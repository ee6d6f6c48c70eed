//! Declaration input surface.
//!
//! The schema builder consumes a finite, ordered batch of [`SourceUnit`]s.
//! Each unit corresponds to one source file: a module path, the file's
//! import table, and the annotated type declarations found in it. Units may
//! come from the `syn` walker in [`crate::source`] or be constructed
//! directly by a driver.

/// One source file's worth of declarations.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Module path the declarations live in, e.g. `demo::model`.
    pub module_path: String,
    /// Fully-qualified import paths visible in this unit.
    pub imports: Vec<String>,
    /// Declarations in declaration order.
    pub decls: Vec<TypeDecl>,
}

impl SourceUnit {
    /// Creates an empty unit for the given module path.
    #[must_use]
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            imports: Vec::new(),
            decls: Vec::new(),
        }
    }

    /// Adds an import path.
    pub fn add_import(&mut self, path: impl Into<String>) {
        self.imports.push(path.into());
    }

    /// Adds a declaration.
    pub fn add_decl(&mut self, decl: TypeDecl) {
        self.decls.push(decl);
    }
}

/// One annotated type declaration.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Simple name of the type.
    pub name: String,
    /// Declaration kind with kind-specific payload.
    pub kind: DeclKind,
    /// Declared supertype names, as written (resolved later).
    pub supertypes: Vec<String>,
}

impl TypeDecl {
    /// Creates a record declaration with a single constructor
    /// parameter list.
    #[must_use]
    pub fn record(name: impl Into<String>, params: Vec<ParamDecl>) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Record {
                ctors: vec![params],
            },
            supertypes: Vec::new(),
        }
    }

    /// Creates an enum declaration.
    #[must_use]
    pub fn enumeration(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Enum { members },
            supertypes: Vec::new(),
        }
    }

    /// Creates an interface declaration.
    #[must_use]
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeclKind::Interface,
            supertypes: Vec::new(),
        }
    }

    /// Adds a declared supertype name.
    pub fn add_supertype(&mut self, name: impl Into<String>) {
        self.supertypes.push(name.into());
    }
}

/// Declaration kind.
#[derive(Debug, Clone)]
pub enum DeclKind {
    /// A concrete constructor-like type. A record may declare several
    /// constructor parameter lists; the builder models the richest one.
    Record {
        /// Candidate constructor parameter lists.
        ctors: Vec<Vec<ParamDecl>>,
    },
    /// A fieldless enumeration with named members.
    Enum {
        /// Member names in declaration order.
        members: Vec<String>,
    },
    /// A polymorphic supertype.
    Interface,
}

/// One constructor parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// Parameter name; doubles as the serialized property name.
    pub name: String,
    /// Declared type expression.
    pub ty: TypeExpr,
    /// Whether the parameter carries the enclosing-reference marker.
    pub enclosing_ref: bool,
}

impl ParamDecl {
    /// Creates a plain parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            enclosing_ref: false,
        }
    }

    /// Creates a parameter carrying the enclosing-reference marker.
    #[must_use]
    pub fn enclosing(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            enclosing_ref: true,
        }
    }
}

/// A declared type expression, before name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A named type, possibly path-qualified, e.g. `Pet` or
    /// `demo::model::Pet`. Primitive names (`i64`, `f64`, `bool`,
    /// `String`) are recognized during resolution.
    Named(String),
    /// `Option<T>`.
    Optional(Box<TypeExpr>),
    /// `Vec<T>`.
    List(Box<TypeExpr>),
    /// `BTreeSet<T>`.
    SetOf(Box<TypeExpr>),
    /// `Rc<T>` / `Arc<T>`. Must wrap a named type directly; the builder
    /// checks the wrapper against how the target is reconstructed.
    Shared(Box<TypeExpr>),
}

impl TypeExpr {
    /// Convenience constructor for a named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Convenience constructor for an optional type.
    #[must_use]
    pub fn optional(inner: TypeExpr) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Convenience constructor for a sequence collection.
    #[must_use]
    pub fn list(inner: TypeExpr) -> Self {
        Self::List(Box::new(inner))
    }

    /// Convenience constructor for a unique-set collection.
    #[must_use]
    pub fn set_of(inner: TypeExpr) -> Self {
        Self::SetOf(Box::new(inner))
    }

    /// Convenience constructor for a shared (reference-counted) type.
    #[must_use]
    pub fn shared(inner: TypeExpr) -> Self {
        Self::Shared(Box::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unit_builders() {
        let mut unit = SourceUnit::new("demo::model");
        unit.add_import("demo::other::Pet");
        unit.add_decl(TypeDecl::record(
            "Person",
            vec![ParamDecl::new("name", TypeExpr::named("String"))],
        ));

        assert_eq!(unit.module_path, "demo::model");
        assert_eq!(unit.imports, vec!["demo::other::Pet".to_string()]);
        assert_eq!(unit.decls.len(), 1);
        assert_eq!(unit.decls[0].name, "Person");
    }

    #[test]
    fn test_type_expr_constructors() {
        let ty = TypeExpr::list(TypeExpr::named("Pet"));
        assert_eq!(ty, TypeExpr::List(Box::new(TypeExpr::Named("Pet".into()))));

        let ty = TypeExpr::optional(TypeExpr::named("i64"));
        assert_eq!(
            ty,
            TypeExpr::Optional(Box::new(TypeExpr::Named("i64".into())))
        );
    }

    #[test]
    fn test_enclosing_param() {
        let param = ParamDecl::enclosing("owner", TypeExpr::named("Person"));
        assert!(param.enclosing_ref);
        assert_eq!(param.name, "owner");
    }
}
