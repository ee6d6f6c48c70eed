//! Enum serializer generation.
//!
//! Enums serialize as a single JSON string holding the member name.
//! Reading matches member names case-insensitively and rejects anything
//! else with an unknown-enum-value error.

use streamser_schema::model::{TypeEntry, TypeEntryKind, simple_name};

use super::{UseSet, read_fn_name, write_fn_name};

/// Generator for enum writer/reader functions.
pub struct EnumGenerator;

impl EnumGenerator {
    /// Creates a new enum generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates the serializer unit body for one enum entry.
    ///
    /// Entries of other kinds produce an empty string.
    #[must_use]
    pub fn generate(&self, entry: &TypeEntry) -> String {
        let TypeEntryKind::Enum { members } = &entry.kind else {
            return String::new();
        };

        let simple = simple_name(&entry.identity);
        let mut uses = UseSet::new();
        uses.add("json_stream::DecodeError");
        uses.add("json_stream::EncodeError");
        uses.add("json_stream::JsonReader");
        uses.add("json_stream::JsonWriter");
        uses.add_type(&entry.identity);

        let mut out = String::new();
        out.push_str(&format!(
            "pub fn {}(w: &mut JsonWriter, obj: Option<&{}>) -> Result<(), EncodeError> {{\n",
            write_fn_name(&entry.identity),
            simple
        ));
        out.push_str("    let Some(obj) = obj else {\n");
        out.push_str("        w.null_value();\n");
        out.push_str("        return Ok(());\n");
        out.push_str("    };\n");
        out.push_str("    let name = match obj {\n");
        for member in members {
            out.push_str(&format!(
                "        {}::{} => \"{}\",\n",
                simple, member, member
            ));
        }
        out.push_str("    };\n");
        out.push_str("    w.value_str(name);\n");
        out.push_str("    Ok(())\n");
        out.push_str("}\n\n");

        out.push_str(&format!(
            "pub fn {}(r: &mut JsonReader) -> Result<{}, DecodeError> {{\n",
            read_fn_name(&entry.identity),
            simple
        ));
        out.push_str("    let value = r.next_string()?;\n");
        out.push_str("    match value.to_ascii_lowercase().as_str() {\n");
        for member in members {
            out.push_str(&format!(
                "        \"{}\" => Ok({}::{}),\n",
                member.to_ascii_lowercase(),
                simple,
                member
            ));
        }
        out.push_str("        _ => Err(DecodeError::unknown_enum_value(&value)),\n");
        out.push_str("    }\n");
        out.push_str("}\n");

        format!("{}{}", uses.render(), out)
    }
}

impl Default for EnumGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_entry() -> TypeEntry {
        TypeEntry {
            identity: "demo::Color".into(),
            kind: TypeEntryKind::Enum {
                members: vec!["Red".into(), "GreenBlue".into()],
            },
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_writer_maps_members_to_names() {
        let out = EnumGenerator::new().generate(&color_entry());
        assert!(out.contains(
            "pub fn write_color(w: &mut JsonWriter, obj: Option<&Color>) -> Result<(), EncodeError> {"
        ));
        assert!(out.contains("Color::Red => \"Red\","));
        assert!(out.contains("Color::GreenBlue => \"GreenBlue\","));
        assert!(out.contains("w.value_str(name);"));
    }

    #[test]
    fn test_reader_matches_case_insensitively() {
        let out = EnumGenerator::new().generate(&color_entry());
        assert!(out.contains("match value.to_ascii_lowercase().as_str() {"));
        assert!(out.contains("\"greenblue\" => Ok(Color::GreenBlue),"));
        assert!(out.contains("_ => Err(DecodeError::unknown_enum_value(&value)),"));
    }

    #[test]
    fn test_null_guard_present() {
        let out = EnumGenerator::new().generate(&color_entry());
        assert!(out.contains("let Some(obj) = obj else {"));
        assert!(out.contains("w.null_value();"));
    }
}
