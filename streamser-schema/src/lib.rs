//! # streamser-schema
//!
//! Declaration walking and schema extraction for the streamser generator.
//!
//! This crate provides:
//! - The declaration input surface (`decl`): a finite, ordered batch of
//!   type declarations grouped by source unit
//! - A `syn`-based walker (`source`) turning annotated Rust source text
//!   into declarations
//! - The normalized schema model (`model`) consumed by the emitter
//! - The two-pass schema builder (`builder`) with name resolution and
//!   enclosing-reference propagation

pub mod builder;
pub mod decl;
pub mod error;
pub mod model;
pub mod source;

pub use builder::build_schema;
pub use decl::{DeclKind, ParamDecl, SourceUnit, TypeDecl, TypeExpr};
pub use error::{ParseError, SchemaError};
pub use model::{
    CollectionKind, Field, FieldType, InterfaceEntry, Schema, TypeEntry, TypeEntryKind, TypeRef,
};
pub use source::parse_source;
