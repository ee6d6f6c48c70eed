//! # streamser-codegen
//!
//! Serializer code generation for annotated type declarations.
//!
//! This crate provides:
//! - Writer/reader source generation for records, enums, and interfaces
//! - Deterministic per-type output units with stable relative paths
//! - A file writer that prunes stale generated files
//! - Build script integration via [`generate_from_sources`]

pub mod error;
pub mod generator;
pub mod rust;
pub mod writer;

pub use error::CodegenError;
pub use generator::{GeneratedUnit, Generator};
pub use writer::GeneratedFileWriter;

/// Generates serializer units from annotated source texts.
///
/// Each input pair is a module path and the Rust source text of that
/// module. The sources are walked, the schema is built and validated, and
/// one unit per declared type is returned.
///
/// # Errors
/// Returns `CodegenError` if walking, schema building, or generation fails.
pub fn generate_from_sources(
    sources: &[(String, String)],
) -> Result<Vec<GeneratedUnit>, CodegenError> {
    let mut units = Vec::with_capacity(sources.len());
    for (module_path, code) in sources {
        units.push(streamser_schema::parse_source(module_path, code)?);
    }
    let schema = streamser_schema::build_schema(&units)?;
    let generator = Generator::new(&schema);
    generator.generate()
}

/// Generates serializer units and writes them under the given root,
/// pruning stale files from earlier runs.
///
/// # Errors
/// Returns `CodegenError` if generation or any filesystem operation fails.
pub fn generate_to_dir(
    sources: &[(String, String)],
    root: &std::path::Path,
) -> Result<Vec<GeneratedUnit>, CodegenError> {
    let units = generate_from_sources(sources)?;
    let writer = GeneratedFileWriter::new(root);
    writer.write(&units)?;
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_from_sources_end_to_end() {
        let sources = vec![(
            "demo".to_string(),
            r"
            #[ser]
            pub struct Person {
                pub name: String,
                pub pets: Vec<Pet>,
            }

            #[ser]
            pub struct Pet {
                pub owner: Weak<Person>,
                pub name: String,
            }
            "
            .to_string(),
        )];

        let units = generate_from_sources(&sources).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units[0].content.contains("pub fn read_person"));
        assert!(units[0].content.contains("Rc::new_cyclic(|weak| Person {"));
        assert!(units[1]
            .content
            .contains("Box::new(move |owner| Pet {"));
    }

    #[test]
    fn test_generate_to_dir_writes_files() {
        let sources = vec![(
            "demo".to_string(),
            r"
            #[ser]
            pub enum Color {
                Red,
                Green,
            }
            "
            .to_string(),
        )];

        let dir = tempfile::tempdir().unwrap();
        let units = generate_to_dir(&sources, dir.path()).unwrap();
        assert_eq!(units.len(), 1);

        let path = dir.path().join("demo/color_ser.rs");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("pub fn write_color"));
        assert!(content.contains("\"green\" => Ok(Color::Green),"));
    }

    #[test]
    fn test_hash_set_declaration_is_rejected() {
        // Readers collect unique sets into a BTreeSet, so a HashSet field
        // must be refused up front instead of generating code that cannot
        // compile against the declared struct.
        let sources = vec![(
            "demo".to_string(),
            r"
            #[ser]
            pub struct Bag {
                pub tags: HashSet<String>,
            }
            "
            .to_string(),
        )];

        let err = generate_from_sources(&sources).unwrap_err();
        assert!(matches!(err, CodegenError::Parse(_)));
    }

    #[test]
    fn test_schema_errors_propagate() {
        let sources = vec![(
            "demo".to_string(),
            r"
            #[ser]
            pub struct Person {
                pub pet: Unknown,
            }
            "
            .to_string(),
        )];

        let err = generate_from_sources(&sources).unwrap_err();
        assert!(matches!(err, CodegenError::Schema(_)));
    }
}
