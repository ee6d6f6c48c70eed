//! Error types for declaration walking and schema building.

use thiserror::Error;

/// Error type for walking annotated source text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Rust syntax error in an input unit.
    #[error("syntax error in unit '{unit}': {source}")]
    Syntax {
        /// Module path of the offending unit.
        unit: String,
        /// Underlying syn error.
        source: syn::Error,
    },

    /// Unsupported construct encountered while walking a unit.
    #[error("unsupported construct in unit '{unit}': {message}")]
    Unsupported {
        /// Module path of the offending unit.
        unit: String,
        /// Description of the construct.
        message: String,
    },
}

impl ParseError {
    /// Creates a syntax error for the given unit.
    pub fn syntax(unit: impl Into<String>, source: syn::Error) -> Self {
        Self::Syntax {
            unit: unit.into(),
            source,
        }
    }

    /// Creates an unsupported-construct error for the given unit.
    pub fn unsupported(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Error type for schema building and validation.
///
/// Any of these fails the whole batch: a malformed schema must never reach
/// the emitter, since it would produce invalid generated code.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A declared type name could not be resolved against the unit's
    /// imports, same-file declarations, or same-module declarations.
    #[error("unresolved type '{type_name}' in parameter '{param}' of '{owner}'")]
    UnresolvedType {
        /// Declaring record identity.
        owner: String,
        /// Parameter name.
        param: String,
        /// Unresolvable declared name.
        type_name: String,
    },

    /// More than one enclosing-reference field on a single record.
    #[error("record '{record}' declares more than one enclosing-reference field")]
    MultipleEnclosingRefs {
        /// Record identity.
        record: String,
    },

    /// A collection field was declared nullable.
    #[error("collection field '{field}' of '{record}' cannot be optional")]
    NullableCollection {
        /// Record identity.
        record: String,
        /// Field name.
        field: String,
    },

    /// A collection field was marked as an enclosing reference.
    #[error("collection field '{field}' of '{record}' cannot be an enclosing reference")]
    EnclosingRefCollection {
        /// Record identity.
        record: String,
        /// Field name.
        field: String,
    },

    /// A collection element was declared optional.
    #[error("element of collection field '{field}' of '{record}' cannot be optional")]
    NullableElement {
        /// Record identity.
        record: String,
        /// Field name.
        field: String,
    },

    /// An enclosing-reference field resolved to a primitive type.
    #[error("enclosing-reference field '{field}' of '{record}' must reference a declared type")]
    PrimitiveEnclosingRef {
        /// Record identity.
        record: String,
        /// Field name.
        field: String,
    },

    /// Implementations of one interface declare different enclosing owner
    /// types, which the dispatch reader cannot encode with a single
    /// parameter type.
    #[error(
        "implementations of '{interface}' disagree on the enclosing owner type: '{first}' vs '{second}'"
    )]
    ConflictingEnclosingRef {
        /// Interface identity.
        interface: String,
        /// Owner type of the first implementation that has one.
        first: String,
        /// Conflicting owner type.
        second: String,
    },

    /// Validation error.
    #[error("validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },
}

impl SchemaError {
    /// Creates an unresolved-type error.
    pub fn unresolved(
        owner: impl Into<String>,
        param: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::UnresolvedType {
            owner: owner.into(),
            param: param.into(),
            type_name: type_name.into(),
        }
    }

    /// Creates a generic validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
