//! Normalized schema model.
//!
//! The builder produces one [`Schema`] per invocation: an ordered list of
//! concrete type entries and an ordered list of interface entries, with all
//! type references resolved to fully-qualified identities. Entries reference
//! each other by identity string only, never by embedded copy, so cyclic and
//! mutually-recursive type graphs need no structural recursion here. The
//! schema is immutable once built and consumed exactly once by the emitter.

/// A resolved type reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// 64-bit signed integer (`i64`).
    Int,
    /// 64-bit float (`f64`).
    Float,
    /// Boolean (`bool`).
    Bool,
    /// Owned string (`String`).
    Str,
    /// A declared record, enum, or interface, by fully-qualified identity.
    Named(String),
}

impl TypeRef {
    /// Resolves a primitive name, if the given name denotes one.
    #[must_use]
    pub fn primitive(name: &str) -> Option<Self> {
        match name {
            "i64" => Some(Self::Int),
            "f64" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "String" => Some(Self::Str),
            _ => None,
        }
    }

    /// Returns true for the primitive markers.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Named(_))
    }

    /// Returns the identity of a named reference.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Named(identity) => Some(identity),
            _ => None,
        }
    }

    /// Returns the Rust type the reference maps to in generated code.
    #[must_use]
    pub fn rust_type(&self) -> &str {
        match self {
            Self::Int => "i64",
            Self::Float => "f64",
            Self::Bool => "bool",
            Self::Str => "String",
            Self::Named(identity) => simple_name(identity),
        }
    }
}

/// Collection flavor of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Ordered sequence (`Vec`).
    Sequence,
    /// Unique set (`BTreeSet`).
    UniqueSet,
}

/// The resolved shape of one constructor parameter or collection element.
///
/// Collections structurally cannot be nullable or enclosing references,
/// which is exactly the invariant the schema requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A single value.
    Scalar {
        /// Resolved type reference.
        type_ref: TypeRef,
        /// Whether the field may deserialize to absence.
        nullable: bool,
        /// Whether this field is the back-reference to the enclosing
        /// instance (set by the declaration marker).
        is_enclosing_ref: bool,
        /// Whether the referenced type itself needs an enclosing instance
        /// at construction time (derived in the propagation pass).
        needs_enclosing_ref: bool,
    },
    /// A collection of exactly one element shape.
    Collection {
        /// Sequence or unique set.
        kind: CollectionKind,
        /// Element shape.
        element: Box<FieldType>,
    },
}

impl FieldType {
    /// Creates a plain scalar.
    #[must_use]
    pub fn scalar(type_ref: TypeRef) -> Self {
        Self::Scalar {
            type_ref,
            nullable: false,
            is_enclosing_ref: false,
            needs_enclosing_ref: false,
        }
    }

    /// Returns true for collections.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    /// Returns true if this field is the enclosing back-reference.
    #[must_use]
    pub fn is_enclosing_ref(&self) -> bool {
        matches!(
            self,
            Self::Scalar {
                is_enclosing_ref: true,
                ..
            }
        )
    }

    /// Returns true if this field's value (or any collection element)
    /// cannot be constructed before the enclosing instance exists.
    #[must_use]
    pub fn involves_deferred(&self) -> bool {
        match self {
            Self::Scalar {
                needs_enclosing_ref,
                ..
            } => *needs_enclosing_ref,
            Self::Collection { element, .. } => element.involves_deferred(),
        }
    }

    /// Returns the scalar type reference, looking through collections.
    #[must_use]
    pub fn leaf_type_ref(&self) -> &TypeRef {
        match self {
            Self::Scalar { type_ref, .. } => type_ref,
            Self::Collection { element, .. } => element.leaf_type_ref(),
        }
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name; also the serialized property name.
    pub name: String,
    /// Resolved shape.
    pub ty: FieldType,
}

/// Kind of a concrete type entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEntryKind {
    /// Constructor-like record.
    Record,
    /// Fieldless enumeration.
    Enum {
        /// Member names in declaration order.
        members: Vec<String>,
    },
}

/// One concrete serializable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Fully-qualified identity, e.g. `demo::model::Person`.
    pub identity: String,
    /// Record or enum.
    pub kind: TypeEntryKind,
    /// Fields in declaration order; empty for enums.
    pub fields: Vec<Field>,
}

impl TypeEntry {
    /// Returns true for enum entries.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeEntryKind::Enum { .. })
    }

    /// Returns the single enclosing-reference field, if any.
    #[must_use]
    pub fn enclosing_ref_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.ty.is_enclosing_ref())
    }

    /// Returns the owner identity of the enclosing-reference field, if any.
    #[must_use]
    pub fn enclosing_owner(&self) -> Option<&str> {
        self.enclosing_ref_field()
            .and_then(|f| f.ty.leaf_type_ref().identity())
    }

    /// Returns true if any non-enclosing field involves a deferred value.
    #[must_use]
    pub fn has_deferred_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|f| !f.ty.is_enclosing_ref() && f.ty.involves_deferred())
    }
}

/// One polymorphic supertype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceEntry {
    /// Fully-qualified identity.
    pub identity: String,
    /// Implementation identities in discovery order. Emitted dispatch
    /// tables must reproduce this exact order.
    pub implementations: Vec<String>,
    /// Enclosing owner identity shared by implementations that need one.
    pub common_enclosing_ref: Option<String>,
}

/// The complete normalized model extracted from one declaration batch.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Concrete type entries in registration order.
    pub types: Vec<TypeEntry>,
    /// Interface entries in registration order.
    pub interfaces: Vec<InterfaceEntry>,
}

impl Schema {
    /// Looks up a concrete type entry by identity.
    #[must_use]
    pub fn get_type(&self, identity: &str) -> Option<&TypeEntry> {
        self.types.iter().find(|t| t.identity == identity)
    }

    /// Looks up an interface entry by identity.
    #[must_use]
    pub fn get_interface(&self, identity: &str) -> Option<&InterfaceEntry> {
        self.interfaces.iter().find(|i| i.identity == identity)
    }

    /// Iterates over every identity in the schema, types first.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .map(|t| t.identity.as_str())
            .chain(self.interfaces.iter().map(|i| i.identity.as_str()))
    }
}

/// Returns the simple (last-segment) name of an identity.
#[must_use]
pub fn simple_name(identity: &str) -> &str {
    identity.rsplit("::").next().unwrap_or(identity)
}

/// Returns the module path of an identity, empty for a bare name.
#[must_use]
pub fn module_of(identity: &str) -> &str {
    match identity.rfind("::") {
        Some(idx) => &identity[..idx],
        None => "",
    }
}

/// Converts a string to snake_case.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }
    result
}
