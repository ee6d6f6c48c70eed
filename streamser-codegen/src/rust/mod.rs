//! Rust code generation modules.

pub mod enums;
pub mod interfaces;
pub mod records;

pub use enums::EnumGenerator;
pub use interfaces::InterfaceGenerator;
pub use records::RecordGenerator;

use std::collections::BTreeSet;

use streamser_schema::model::{Schema, module_of, simple_name, to_snake_case};

/// How a generated reader yields a value of a given declared type.
///
/// The shape is a property of the target type alone, so every call site
/// agrees on it without coordination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderShape {
    /// The reader returns the value directly.
    Plain,
    /// The reader returns `Rc<T>`: the type owns deferred fields and is
    /// constructed with `Rc::new_cyclic`.
    Rc,
    /// The reader returns a constructor closure taking `Weak<Owner>`: the
    /// type cannot exist before its enclosing instance does.
    Deferred {
        /// Identity of the enclosing owner type.
        owner: String,
    },
}

/// Determines the reader shape of a declared type.
#[must_use]
pub fn reader_shape(schema: &Schema, identity: &str) -> ReaderShape {
    if let Some(interface) = schema.get_interface(identity) {
        return match &interface.common_enclosing_ref {
            Some(owner) => ReaderShape::Deferred {
                owner: owner.clone(),
            },
            None => ReaderShape::Plain,
        };
    }
    if let Some(entry) = schema.get_type(identity) {
        if entry.is_enum() {
            return ReaderShape::Plain;
        }
        if let Some(owner) = entry.enclosing_owner() {
            return ReaderShape::Deferred {
                owner: owner.to_string(),
            };
        }
        if entry.has_deferred_fields() {
            return ReaderShape::Rc;
        }
    }
    ReaderShape::Plain
}

/// Name of the generated writer function for an identity.
#[must_use]
pub fn write_fn_name(identity: &str) -> String {
    format!("write_{}", to_snake_case(simple_name(identity)))
}

/// Name of the generated reader function for an identity.
#[must_use]
pub fn read_fn_name(identity: &str) -> String {
    format!("read_{}", to_snake_case(simple_name(identity)))
}

/// Collects `use` paths for one generated unit and renders them as a
/// sorted, deduplicated block.
#[derive(Debug, Default)]
pub struct UseSet {
    paths: BTreeSet<String>,
}

impl UseSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fully-qualified path.
    pub fn add(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    /// Adds a data-type identity. Bare identities (no module segments)
    /// are already in scope in the flat generated module, and `use Person;`
    /// would not compile, so they are skipped.
    pub fn add_type(&mut self, identity: &str) {
        if !module_of(identity).is_empty() {
            self.add(identity);
        }
    }

    /// Renders one `use` line per path, sorted, followed by a blank line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for path in &self.paths {
            out.push_str(&format!("use {};\n", path));
        }
        if !self.paths.is_empty() {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_set_renders_sorted_and_deduplicated() {
        let mut uses = UseSet::new();
        uses.add("std::rc::Rc");
        uses.add("json_stream::JsonWriter");
        uses.add("json_stream::JsonWriter");
        assert_eq!(
            uses.render(),
            "use json_stream::JsonWriter;\nuse std::rc::Rc;\n\n"
        );
    }

    #[test]
    fn test_fn_names() {
        assert_eq!(write_fn_name("demo::model::MyLeaf"), "write_my_leaf");
        assert_eq!(read_fn_name("demo::Person"), "read_person");
    }

    #[test]
    fn test_add_type_skips_bare_identities() {
        let mut uses = UseSet::new();
        uses.add_type("Person");
        uses.add_type("demo::Pet");
        assert_eq!(uses.render(), "use demo::Pet;\n\n");
    }
}
