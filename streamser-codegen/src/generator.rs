//! Generation orchestration.
//!
//! Walks the schema in its registration order and produces one
//! [`GeneratedUnit`] per type and interface. Output is a pure function of
//! the schema: the same schema always yields the same units in the same
//! order, byte for byte.

use std::path::PathBuf;

use streamser_schema::model::{Schema, TypeEntryKind, module_of, simple_name, to_snake_case};
use tracing::debug;

use crate::error::CodegenError;
use crate::rust::{EnumGenerator, InterfaceGenerator, RecordGenerator};

const HEADER: &str = "// Generated by streamser. Do not edit.\n\n";

/// One generated serializer source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Identity of the type the unit serializes.
    pub identity: String,
    /// Path relative to the generation root: the identity's module
    /// segments as directories, then `<snake_name>_ser.rs`.
    pub rel_path: PathBuf,
    /// Complete file content.
    pub content: String,
}

impl GeneratedUnit {
    fn new(identity: &str, body: String) -> Self {
        Self {
            identity: identity.to_string(),
            rel_path: rel_path(identity),
            content: format!("{}{}", HEADER, body),
        }
    }
}

/// Relative output path for an identity.
#[must_use]
pub fn rel_path(identity: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in module_of(identity).split("::").filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.push(format!("{}_ser.rs", to_snake_case(simple_name(identity))));
    path
}

/// Serializer generator over a built schema.
pub struct Generator<'a> {
    schema: &'a Schema,
}

impl<'a> Generator<'a> {
    /// Creates a new generator.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Generates all serializer units, types first, then interfaces, each
    /// in schema registration order.
    pub fn generate(&self) -> Result<Vec<GeneratedUnit>, CodegenError> {
        let mut units = Vec::new();

        let records = RecordGenerator::new(self.schema);
        let enums = EnumGenerator::new();
        for entry in &self.schema.types {
            let body = match &entry.kind {
                TypeEntryKind::Enum { .. } => enums.generate(entry),
                TypeEntryKind::Record => records.generate(entry)?,
            };
            debug!(identity = %entry.identity, "generated serializer unit");
            units.push(GeneratedUnit::new(&entry.identity, body));
        }

        let interfaces = InterfaceGenerator::new(self.schema);
        for entry in &self.schema.interfaces {
            let body = interfaces.generate(entry)?;
            debug!(identity = %entry.identity, "generated dispatch unit");
            units.push(GeneratedUnit::new(&entry.identity, body));
        }

        Ok(units)
    }
}
