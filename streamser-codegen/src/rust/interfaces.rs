//! Interface serializer generation.
//!
//! A polymorphic value serializes as a two-element JSON array: the
//! implementation's fully-qualified identity string, then its payload.
//! Dispatch goes through the caller-declared enum named after the
//! interface, with one variant per implementation. When implementations
//! share an enclosing owner, the reader returns a constructor closure like
//! an enclosed record's reader does, so both kinds of target read the same
//! way at call sites.

use streamser_schema::model::{InterfaceEntry, Schema, simple_name};

use super::{ReaderShape, UseSet, read_fn_name, reader_shape, write_fn_name};
use crate::error::CodegenError;

/// Generator for interface dispatch writer/reader functions.
pub struct InterfaceGenerator<'a> {
    schema: &'a Schema,
}

impl<'a> InterfaceGenerator<'a> {
    /// Creates a new interface generator.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Generates the serializer unit body for one interface entry.
    pub fn generate(&self, entry: &InterfaceEntry) -> Result<String, CodegenError> {
        let mut uses = UseSet::new();
        uses.add("json_stream::DecodeError");
        uses.add("json_stream::EncodeError");
        uses.add("json_stream::JsonReader");
        uses.add("json_stream::JsonWriter");
        uses.add_type(&entry.identity);

        let writer = self.generate_writer(entry);
        let reader = self.generate_reader(entry, &mut uses)?;

        Ok(format!("{}{}\n{}", uses.render(), writer, reader))
    }

    fn generate_writer(&self, entry: &InterfaceEntry) -> String {
        let simple = simple_name(&entry.identity);
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
        out.push_str("    w.begin_array();\n");
        out.push_str("    match obj {\n");
        for impl_id in &entry.implementations {
            let variant = simple_name(impl_id);
            let arg = if matches!(reader_shape(self.schema, impl_id), ReaderShape::Rc) {
                "Some(inner.as_ref())"
            } else {
                "Some(inner)"
            };
            out.push_str(&format!("        {}::{}(inner) => {{\n", simple, variant));
            out.push_str(&format!("            w.value_str(\"{}\");\n", impl_id));
            out.push_str(&format!(
                "            {}(w, {})?;\n",
                write_fn_name(impl_id),
                arg
            ));
            out.push_str("        }\n");
        }
        out.push_str("        #[allow(unreachable_patterns)]\n");
        out.push_str(&format!(
            "        _ => return Err(EncodeError::unknown_variant(\"{}\")),\n",
            entry.identity
        ));
        out.push_str("    }\n");
        out.push_str("    w.end_array();\n");
        out.push_str("    Ok(())\n");
        out.push_str("}\n");

        out
    }

    fn generate_reader(
        &self,
        entry: &InterfaceEntry,
        uses: &mut UseSet,
    ) -> Result<String, CodegenError> {
        let simple = simple_name(&entry.identity);
        let mut out = String::new();

        match &entry.common_enclosing_ref {
            None => {
                out.push_str(&format!(
                    "pub fn {}(r: &mut JsonReader) -> Result<{}, DecodeError> {{\n",
                    read_fn_name(&entry.identity),
                    simple
                ));
                out.push_str("    r.begin_array()?;\n");
                out.push_str("    let tag = r.next_string()?;\n");
                out.push_str("    let obj = match tag.as_str() {\n");
                for impl_id in &entry.implementations {
                    if matches!(
                        reader_shape(self.schema, impl_id),
                        ReaderShape::Deferred { .. }
                    ) {
                        return Err(CodegenError::generation(format!(
                            "implementation '{}' of '{}' needs an enclosing instance, but the interface has none",
                            impl_id, entry.identity
                        )));
                    }
                    out.push_str(&format!(
                        "        \"{}\" => {}::{}({}(r)?),\n",
                        impl_id,
                        simple,
                        simple_name(impl_id),
                        read_fn_name(impl_id)
                    ));
                }
                out.push_str("        _ => return Err(DecodeError::unknown_variant(&tag)),\n");
                out.push_str("    };\n");
            }
            Some(owner) => {
                uses.add("std::rc::Weak");
                uses.add_type(owner);
                let owner_simple = simple_name(owner);
                out.push_str(&format!(
                    "pub fn {}(r: &mut JsonReader) -> Result<Box<dyn FnOnce(Weak<{}>) -> {}>, DecodeError> {{\n",
                    read_fn_name(&entry.identity),
                    owner_simple,
                    simple
                ));
                out.push_str("    r.begin_array()?;\n");
                out.push_str("    let tag = r.next_string()?;\n");
                out.push_str(&format!(
                    "    let obj: Box<dyn FnOnce(Weak<{}>) -> {}> = match tag.as_str() {{\n",
                    owner_simple, simple
                ));
                for impl_id in &entry.implementations {
                    let variant = simple_name(impl_id);
                    out.push_str(&format!("        \"{}\" => {{\n", impl_id));
                    match reader_shape(self.schema, impl_id) {
                        ReaderShape::Deferred { owner: impl_owner } => {
                            // The builder guarantees a single shared owner.
                            if &impl_owner != owner {
                                return Err(CodegenError::generation(format!(
                                    "implementation '{}' of '{}' is enclosed by '{}', not '{}'",
                                    impl_id, entry.identity, impl_owner, owner
                                )));
                            }
                            out.push_str(&format!(
                                "            let make = {}(r)?;\n",
                                read_fn_name(impl_id)
                            ));
                            out.push_str(&format!(
                                "            Box::new(move |owner| {}::{}(make(owner)))\n",
                                simple, variant
                            ));
                        }
                        _ => {
                            out.push_str(&format!(
                                "            let value = {}(r)?;\n",
                                read_fn_name(impl_id)
                            ));
                            out.push_str(&format!(
                                "            Box::new(move |_owner| {}::{}(value))\n",
                                simple, variant
                            ));
                        }
                    }
                    out.push_str("        }\n");
                }
                out.push_str("        _ => return Err(DecodeError::unknown_variant(&tag)),\n");
                out.push_str("    };\n");
            }
        }

        out.push_str("    r.end_array()?;\n");
        out.push_str("    Ok(obj)\n");
        out.push_str("}\n");

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamser_schema::{ParamDecl, SourceUnit, TypeDecl, TypeExpr, build_schema};

    fn schema_from(decls: Vec<TypeDecl>) -> Schema {
        let mut unit = SourceUnit::new("demo");
        for decl in decls {
            unit.add_decl(decl);
        }
        build_schema(&[unit]).unwrap()
    }

    fn shape_schema() -> Schema {
        let mut circle = TypeDecl::record(
            "Circle",
            vec![ParamDecl::new("radius", TypeExpr::named("f64"))],
        );
        circle.add_supertype("Shape");
        let mut square = TypeDecl::record(
            "Square",
            vec![ParamDecl::new("side", TypeExpr::named("f64"))],
        );
        square.add_supertype("Shape");
        schema_from(vec![TypeDecl::interface("Shape"), circle, square])
    }

    #[test]
    fn test_writer_tags_with_full_identity() {
        let schema = shape_schema();
        let entry = schema.get_interface("demo::Shape").unwrap();
        let out = InterfaceGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains(
            "pub fn write_shape(w: &mut JsonWriter, obj: Option<&Shape>) -> Result<(), EncodeError> {"
        ));
        assert!(out.contains("w.begin_array();"));
        assert!(out.contains("Shape::Circle(inner) => {"));
        assert!(out.contains("w.value_str(\"demo::Circle\");"));
        assert!(out.contains("write_circle(w, Some(inner))?;"));
        assert!(out.contains("_ => return Err(EncodeError::unknown_variant(\"demo::Shape\")),"));
    }

    #[test]
    fn test_plain_reader_dispatches_on_tag() {
        let schema = shape_schema();
        let entry = schema.get_interface("demo::Shape").unwrap();
        let out = InterfaceGenerator::new(&schema).generate(entry).unwrap();

        assert!(
            out.contains("pub fn read_shape(r: &mut JsonReader) -> Result<Shape, DecodeError> {")
        );
        assert!(out.contains("let tag = r.next_string()?;"));
        assert!(out.contains("\"demo::Circle\" => Shape::Circle(read_circle(r)?),"));
        assert!(out.contains("\"demo::Square\" => Shape::Square(read_square(r)?),"));
        assert!(out.contains("_ => return Err(DecodeError::unknown_variant(&tag)),"));
    }

    #[test]
    fn test_enclosed_reader_wraps_constructors() {
        let mut cat = TypeDecl::record(
            "Cat",
            vec![ParamDecl::enclosing("owner", TypeExpr::named("Person"))],
        );
        cat.add_supertype("Pet");
        let mut fish = TypeDecl::record("Fish", vec![]);
        fish.add_supertype("Pet");
        let schema = schema_from(vec![
            TypeDecl::interface("Pet"),
            TypeDecl::record("Person", vec![]),
            cat,
            fish,
        ]);
        let entry = schema.get_interface("demo::Pet").unwrap();
        let out = InterfaceGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains(
            "pub fn read_pet(r: &mut JsonReader) -> Result<Box<dyn FnOnce(Weak<Person>) -> Pet>, DecodeError> {"
        ));
        assert!(out.contains("let make = read_cat(r)?;"));
        assert!(out.contains("Box::new(move |owner| Pet::Cat(make(owner)))"));
        // Implementations without an enclosing reference ignore the owner.
        assert!(out.contains("let value = read_fish(r)?;"));
        assert!(out.contains("Box::new(move |_owner| Pet::Fish(value))"));
        assert!(out.contains("use std::rc::Weak;"));
        assert!(out.contains("use demo::Person;"));
    }
}
