//! Record serializer generation.
//!
//! Each record gets a writer and a reader function. Writers emit one JSON
//! object with a property per field, skipping the enclosing back-reference.
//! Readers accumulate every property into local slots, dispatching on
//! lowercased property names and skipping unknown ones, then construct the
//! value once the object is fully consumed. Construction has three shapes:
//! a plain struct literal, a constructor closure when the record needs its
//! enclosing instance, and `Rc::new_cyclic` when the record owns fields
//! that need it.

use streamser_schema::model::{
    CollectionKind, Field, FieldType, Schema, TypeEntry, TypeEntryKind, TypeRef, simple_name,
};

use super::{ReaderShape, UseSet, read_fn_name, reader_shape, write_fn_name};
use crate::error::CodegenError;

fn ind(units: usize) -> String {
    "    ".repeat(units)
}

/// Generator for record writer/reader functions.
pub struct RecordGenerator<'a> {
    schema: &'a Schema,
}

impl<'a> RecordGenerator<'a> {
    /// Creates a new record generator.
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Generates the serializer unit body for one record entry.
    pub fn generate(&self, entry: &TypeEntry) -> Result<String, CodegenError> {
        if !matches!(entry.kind, TypeEntryKind::Record) {
            return Ok(String::new());
        }
        if entry.enclosing_ref_field().is_some() && entry.has_deferred_fields() {
            return Err(CodegenError::generation(format!(
                "record '{}' both requires an enclosing instance and contains fields that need one; chained enclosing references are not supported",
                entry.identity
            )));
        }

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

    fn generate_writer(&self, entry: &TypeEntry) -> String {
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
        out.push_str("    w.begin_object();\n");
        for field in &entry.fields {
            if field.ty.is_enclosing_ref() {
                continue;
            }
            self.emit_write_field(&mut out, field);
        }
        out.push_str("    w.end_object();\n");
        out.push_str("    Ok(())\n");
        out.push_str("}\n");

        out
    }

    fn emit_write_field(&self, out: &mut String, field: &Field) {
        let name = &field.name;
        match &field.ty {
            FieldType::Scalar {
                type_ref: TypeRef::Named(target),
                nullable,
                ..
            } => {
                let func = write_fn_name(target);
                let rc = matches!(reader_shape(self.schema, target), ReaderShape::Rc);
                let arg = match (rc, nullable) {
                    (true, false) => format!("Some(obj.{}.as_ref())", name),
                    (true, true) => format!("obj.{}.as_deref()", name),
                    (false, false) => format!("Some(&obj.{})", name),
                    (false, true) => format!("obj.{}.as_ref()", name),
                };
                out.push_str(&format!("    {}(w.name(\"{}\"), {})?;\n", func, name, arg));
            }
            FieldType::Scalar {
                type_ref: TypeRef::Str,
                nullable,
                ..
            } => {
                if *nullable {
                    out.push_str(&format!("    match &obj.{} {{\n", name));
                    out.push_str("        Some(value) => {\n");
                    out.push_str(&format!(
                        "            w.name(\"{}\").value_str(value);\n",
                        name
                    ));
                    out.push_str("        }\n");
                    out.push_str("        None => {\n");
                    out.push_str(&format!("            w.name(\"{}\").null_value();\n", name));
                    out.push_str("        }\n");
                    out.push_str("    }\n");
                } else {
                    out.push_str(&format!(
                        "    w.name(\"{}\").value_str(&obj.{});\n",
                        name, name
                    ));
                }
            }
            FieldType::Scalar {
                type_ref, nullable, ..
            } => {
                let method = scalar_write_method(type_ref);
                if *nullable {
                    out.push_str(&format!("    match &obj.{} {{\n", name));
                    out.push_str("        Some(value) => {\n");
                    out.push_str(&format!(
                        "            w.name(\"{}\").{}(*value);\n",
                        name, method
                    ));
                    out.push_str("        }\n");
                    out.push_str("        None => {\n");
                    out.push_str(&format!("            w.name(\"{}\").null_value();\n", name));
                    out.push_str("        }\n");
                    out.push_str("    }\n");
                } else {
                    out.push_str(&format!(
                        "    w.name(\"{}\").{}(obj.{});\n",
                        name, method, name
                    ));
                }
            }
            FieldType::Collection { element, .. } => {
                out.push_str(&format!("    w.name(\"{}\").begin_array();\n", name));
                out.push_str(&format!("    for item in &obj.{} {{\n", name));
                self.emit_write_element(out, element, "item", 1, 2);
                out.push_str("    }\n");
                out.push_str("    w.end_array();\n");
            }
        }
    }

    fn emit_write_element(
        &self,
        out: &mut String,
        ty: &FieldType,
        var: &str,
        level: usize,
        pad_units: usize,
    ) {
        let pad = ind(pad_units);
        match ty {
            FieldType::Scalar {
                type_ref: TypeRef::Named(target),
                ..
            } => {
                let arg = if matches!(reader_shape(self.schema, target), ReaderShape::Rc) {
                    format!("Some({}.as_ref())", var)
                } else {
                    format!("Some({})", var)
                };
                out.push_str(&format!(
                    "{}{}(w, {})?;\n",
                    pad,
                    write_fn_name(target),
                    arg
                ));
            }
            FieldType::Scalar {
                type_ref: TypeRef::Str,
                ..
            } => {
                out.push_str(&format!("{}w.value_str({});\n", pad, var));
            }
            FieldType::Scalar { type_ref, .. } => {
                out.push_str(&format!(
                    "{}w.{}(*{});\n",
                    pad,
                    scalar_write_method(type_ref),
                    var
                ));
            }
            FieldType::Collection { element, .. } => {
                let inner = format!("item{}", level + 1);
                out.push_str(&format!("{}w.begin_array();\n", pad));
                out.push_str(&format!("{}for {} in {} {{\n", pad, inner, var));
                self.emit_write_element(out, element, &inner, level + 1, pad_units + 1);
                out.push_str(&format!("{}}}\n", pad));
                out.push_str(&format!("{}w.end_array();\n", pad));
            }
        }
    }

    fn generate_reader(
        &self,
        entry: &TypeEntry,
        uses: &mut UseSet,
    ) -> Result<String, CodegenError> {
        let simple = simple_name(&entry.identity);
        let enclosing = entry.enclosing_ref_field();
        let owns_deferred = entry.has_deferred_fields();

        let return_type = if let Some(owner) = entry.enclosing_owner() {
            uses.add("std::rc::Weak");
            uses.add_type(owner);
            format!("Box<dyn FnOnce(Weak<{}>) -> {}>", simple_name(owner), simple)
        } else if owns_deferred {
            uses.add("std::rc::Rc");
            uses.add("std::rc::Weak");
            format!("Rc<{}>", simple)
        } else {
            simple.to_string()
        };

        let mut out = String::new();
        out.push_str(&format!(
            "pub fn {}(r: &mut JsonReader) -> Result<{}, DecodeError> {{\n",
            read_fn_name(&entry.identity),
            return_type
        ));

        // Accumulator slots.
        for field in &entry.fields {
            if field.ty.is_enclosing_ref() {
                continue;
            }
            if let FieldType::Scalar {
                nullable: false,
                needs_enclosing_ref: true,
                ..
            } = field.ty
            {
                return Err(CodegenError::generation(format!(
                    "field '{}' of '{}' must be optional: its type cannot exist before '{}' does",
                    field.name, entry.identity, entry.identity
                )));
            }
            let storage = self.storage_type(entry, &field.ty, uses)?;
            out.push_str(&format!(
                "    let mut {}: Option<{}> = None;\n",
                field.name, storage
            ));
            if reader_tracks_found(&field.ty) {
                out.push_str(&format!("    let mut {}_found = false;\n", field.name));
            }
        }

        // Property dispatch loop.
        out.push_str("    r.begin_object()?;\n");
        out.push_str("    while r.has_next()? {\n");
        out.push_str("        match r.next_name()?.to_ascii_lowercase().as_str() {\n");
        for field in &entry.fields {
            if field.ty.is_enclosing_ref() {
                continue;
            }
            self.emit_read_arm(&mut out, field, uses)?;
        }
        out.push_str("            _ => {\n");
        out.push_str("                r.skip_value()?;\n");
        out.push_str("            }\n");
        out.push_str("        }\n");
        out.push_str("    }\n");
        out.push_str("    r.end_object()?;\n");

        // Required-property checks, in field order.
        for field in &entry.fields {
            if field.ty.is_enclosing_ref() || !reader_tracks_found(&field.ty) {
                continue;
            }
            out.push_str(&format!("    if !{}_found {{\n", field.name));
            out.push_str(&format!(
                "        return Err(DecodeError::missing_field(\"{}\"));\n",
                field.name
            ));
            out.push_str("    }\n");
        }

        self.emit_construction(&mut out, entry, enclosing, owns_deferred);
        out.push_str("}\n");

        Ok(out)
    }

    /// Resolved accumulator type for a field, without the `Option` wrapper.
    fn storage_type(
        &self,
        entry: &TypeEntry,
        ty: &FieldType,
        uses: &mut UseSet,
    ) -> Result<String, CodegenError> {
        match ty {
            FieldType::Scalar {
                type_ref: TypeRef::Named(target),
                ..
            } => {
                uses.add_type(target);
                match reader_shape(self.schema, target) {
                    ReaderShape::Plain => Ok(simple_name(target).to_string()),
                    ReaderShape::Rc => {
                        uses.add("std::rc::Rc");
                        Ok(format!("Rc<{}>", simple_name(target)))
                    }
                    ReaderShape::Deferred { owner } => {
                        if owner != entry.identity {
                            return Err(CodegenError::generation(format!(
                                "'{}' references '{}', which can only be constructed inside its enclosing type '{}'",
                                entry.identity, target, owner
                            )));
                        }
                        uses.add("std::rc::Weak");
                        Ok(format!(
                            "Box<dyn FnOnce(Weak<{}>) -> {}>",
                            simple_name(&owner),
                            simple_name(target)
                        ))
                    }
                }
            }
            FieldType::Scalar { type_ref, .. } => Ok(type_ref.rust_type().to_string()),
            FieldType::Collection { kind, element } => {
                let elem = self.storage_type(entry, element, uses)?;
                // Deferred elements accumulate in a Vec whatever the final
                // container is; closures have no ordering.
                if element.involves_deferred() {
                    return Ok(format!("Vec<{}>", elem));
                }
                match kind {
                    CollectionKind::Sequence => Ok(format!("Vec<{}>", elem)),
                    CollectionKind::UniqueSet => {
                        uses.add("std::collections::BTreeSet");
                        Ok(format!("BTreeSet<{}>", elem))
                    }
                }
            }
        }
    }

    fn emit_read_arm(
        &self,
        out: &mut String,
        field: &Field,
        uses: &mut UseSet,
    ) -> Result<(), CodegenError> {
        let name = &field.name;
        let lower = name.to_ascii_lowercase();
        out.push_str(&format!("            \"{}\" => {{\n", lower));
        match &field.ty {
            FieldType::Scalar {
                type_ref,
                nullable: true,
                ..
            } => {
                uses.add("json_stream::next_or_null");
                let func = match type_ref {
                    TypeRef::Named(target) => read_fn_name(target),
                    _ => format!("JsonReader::{}", scalar_read_method(type_ref)),
                };
                out.push_str(&format!(
                    "                {} = next_or_null(r, {})?;\n",
                    name, func
                ));
            }
            FieldType::Scalar { type_ref, .. } => {
                out.push_str(&format!("                {}_found = true;\n", name));
                let expr = match type_ref {
                    TypeRef::Named(target) => format!("{}(r)?", read_fn_name(target)),
                    _ => format!("r.{}()?", scalar_read_method(type_ref)),
                };
                out.push_str(&format!("                {} = Some({});\n", name, expr));
            }
            FieldType::Collection { kind, element } => {
                out.push_str(&format!("                {}_found = true;\n", name));
                self.emit_collection_read(out, *kind, element, "items", 1, 4);
                out.push_str(&format!("                {} = Some(items);\n", name));
            }
        }
        out.push_str("            }\n");
        Ok(())
    }

    fn emit_collection_read(
        &self,
        out: &mut String,
        kind: CollectionKind,
        element: &FieldType,
        var: &str,
        level: usize,
        pad_units: usize,
    ) {
        let pad = ind(pad_units);
        let use_set =
            matches!(kind, CollectionKind::UniqueSet) && !element.involves_deferred();
        let init = if use_set { "BTreeSet::new()" } else { "Vec::new()" };
        let add = if use_set { "insert" } else { "push" };

        out.push_str(&format!("{}let mut {} = {};\n", pad, var, init));
        out.push_str(&format!("{}r.begin_array()?;\n", pad));
        out.push_str(&format!("{}while r.has_next()? {{\n", pad));
        match element {
            FieldType::Collection {
                kind: inner_kind,
                element: inner_element,
            } => {
                let inner_var = format!("items{}", level + 1);
                self.emit_collection_read(
                    out,
                    *inner_kind,
                    inner_element,
                    &inner_var,
                    level + 1,
                    pad_units + 1,
                );
                out.push_str(&format!("{}    {}.{}({});\n", pad, var, add, inner_var));
            }
            FieldType::Scalar {
                type_ref: TypeRef::Named(target),
                ..
            } => {
                out.push_str(&format!(
                    "{}    {}.{}({}(r)?);\n",
                    pad,
                    var,
                    add,
                    read_fn_name(target)
                ));
            }
            FieldType::Scalar { type_ref, .. } => {
                out.push_str(&format!(
                    "{}    {}.{}(r.{}()?);\n",
                    pad,
                    var,
                    add,
                    scalar_read_method(type_ref)
                ));
            }
        }
        out.push_str(&format!("{}}}\n", pad));
        out.push_str(&format!("{}r.end_array()?;\n", pad));
    }

    fn emit_construction(
        &self,
        out: &mut String,
        entry: &TypeEntry,
        enclosing: Option<&Field>,
        owns_deferred: bool,
    ) {
        let simple = simple_name(&entry.identity);

        if let Some(enclosing) = enclosing {
            let owner = entry.enclosing_owner().unwrap_or_default();
            out.push_str(&format!(
                "    let obj: Box<dyn FnOnce(Weak<{}>) -> {}> = Box::new(move |owner| {} {{\n",
                simple_name(owner),
                simple,
                simple
            ));
            if enclosing.name == "owner" {
                out.push_str("        owner,\n");
            } else {
                out.push_str(&format!("        {}: owner,\n", enclosing.name));
            }
            for field in &entry.fields {
                if field.ty.is_enclosing_ref() {
                    continue;
                }
                out.push_str(&format!("        {},\n", field_init(field, false)));
            }
            out.push_str("    });\n");
        } else if owns_deferred {
            out.push_str(&format!(
                "    let obj = Rc::new_cyclic(|weak| {} {{\n",
                simple
            ));
            for field in &entry.fields {
                out.push_str(&format!("        {},\n", field_init(field, true)));
            }
            out.push_str("    });\n");
        } else {
            out.push_str(&format!("    let obj = {} {{\n", simple));
            for field in &entry.fields {
                out.push_str(&format!("        {},\n", field_init(field, false)));
            }
            out.push_str("    };\n");
        }
        out.push_str("    Ok(obj)\n");
    }
}

/// Struct-literal initializer for one field, from its accumulator slot.
fn field_init(field: &Field, in_cyclic: bool) -> String {
    let name = &field.name;
    match &field.ty {
        FieldType::Scalar { nullable: true, .. } if field.ty.involves_deferred() && in_cyclic => {
            format!("{}: {}.map(|make| make(weak.clone()))", name, name)
        }
        FieldType::Collection { .. } if field.ty.involves_deferred() && in_cyclic => {
            format!(
                "{}: {}.unwrap().into_iter().map(|make| make(weak.clone())).collect()",
                name, name
            )
        }
        FieldType::Scalar { nullable: true, .. } => name.clone(),
        _ => format!("{}: {}.unwrap()", name, name),
    }
}

fn reader_tracks_found(ty: &FieldType) -> bool {
    match ty {
        FieldType::Scalar { nullable, .. } => !nullable,
        FieldType::Collection { .. } => true,
    }
}

fn scalar_write_method(type_ref: &TypeRef) -> &'static str {
    match type_ref {
        TypeRef::Float => "value_f64",
        TypeRef::Bool => "value_bool",
        TypeRef::Str => "value_str",
        _ => "value_i64",
    }
}

fn scalar_read_method(type_ref: &TypeRef) -> &'static str {
    match type_ref {
        TypeRef::Float => "next_f64",
        TypeRef::Bool => "next_bool",
        TypeRef::Str => "next_string",
        _ => "next_i64",
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

    fn person_pet_schema() -> Schema {
        schema_from(vec![
            TypeDecl::record(
                "Person",
                vec![
                    ParamDecl::new("name", TypeExpr::named("String")),
                    ParamDecl::new("pets", TypeExpr::list(TypeExpr::named("Pet"))),
                ],
            ),
            TypeDecl::record(
                "Pet",
                vec![
                    ParamDecl::enclosing("owner", TypeExpr::named("Person")),
                    ParamDecl::new("name", TypeExpr::named("String")),
                ],
            ),
        ])
    }

    #[test]
    fn test_plain_record_writer() {
        let schema = schema_from(vec![TypeDecl::record(
            "Point",
            vec![
                ParamDecl::new("x", TypeExpr::named("i64")),
                ParamDecl::new("label", TypeExpr::optional(TypeExpr::named("String"))),
            ],
        )]);
        let entry = schema.get_type("demo::Point").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains(
            "pub fn write_point(w: &mut JsonWriter, obj: Option<&Point>) -> Result<(), EncodeError> {"
        ));
        assert!(out.contains("w.name(\"x\").value_i64(obj.x);"));
        assert!(out.contains("match &obj.label {"));
        assert!(out.contains("w.name(\"label\").value_str(value);"));
        assert!(out.contains("w.name(\"label\").null_value();"));
        assert!(out.contains("use demo::Point;"));
    }

    #[test]
    fn test_plain_record_reader_with_found_flags() {
        let schema = schema_from(vec![TypeDecl::record(
            "Point",
            vec![
                ParamDecl::new("x", TypeExpr::named("i64")),
                ParamDecl::new("label", TypeExpr::optional(TypeExpr::named("String"))),
            ],
        )]);
        let entry = schema.get_type("demo::Point").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out
            .contains("pub fn read_point(r: &mut JsonReader) -> Result<Point, DecodeError> {"));
        assert!(out.contains("let mut x: Option<i64> = None;"));
        assert!(out.contains("let mut x_found = false;"));
        // Optional fields have no found flag and no missing-field check.
        assert!(!out.contains("label_found"));
        assert!(out.contains("match r.next_name()?.to_ascii_lowercase().as_str() {"));
        assert!(out.contains("label = next_or_null(r, JsonReader::next_string)?;"));
        assert!(out.contains("r.skip_value()?;"));
        assert!(out.contains("return Err(DecodeError::missing_field(\"x\"));"));
        assert!(out.contains("x: x.unwrap(),"));
        assert!(out.contains("        label,\n"));
    }

    #[test]
    fn test_enclosed_record_reader_returns_constructor() {
        let schema = person_pet_schema();
        let pet = schema.get_type("demo::Pet").unwrap();
        let out = RecordGenerator::new(&schema).generate(pet).unwrap();

        assert!(out.contains(
            "pub fn read_pet(r: &mut JsonReader) -> Result<Box<dyn FnOnce(Weak<Person>) -> Pet>, DecodeError> {"
        ));
        assert!(out.contains("let obj: Box<dyn FnOnce(Weak<Person>) -> Pet> = Box::new(move |owner| Pet {"));
        assert!(out.contains("        owner,\n"));
        assert!(out.contains("name: name.unwrap(),"));
        // The enclosing reference is never written.
        assert!(!out.contains("write_person"));
        assert!(out.contains("use std::rc::Weak;"));
        assert!(out.contains("use demo::Person;"));
    }

    #[test]
    fn test_owner_record_uses_new_cyclic() {
        let schema = person_pet_schema();
        let person = schema.get_type("demo::Person").unwrap();
        let out = RecordGenerator::new(&schema).generate(person).unwrap();

        assert!(out.contains(
            "pub fn read_person(r: &mut JsonReader) -> Result<Rc<Person>, DecodeError> {"
        ));
        assert!(out.contains(
            "let mut pets: Option<Vec<Box<dyn FnOnce(Weak<Person>) -> Pet>>> = None;"
        ));
        assert!(out.contains("items.push(read_pet(r)?);"));
        assert!(out.contains("let obj = Rc::new_cyclic(|weak| Person {"));
        assert!(out.contains(
            "pets: pets.unwrap().into_iter().map(|make| make(weak.clone())).collect(),"
        ));
        assert!(out.contains("use std::rc::Rc;"));
    }

    #[test]
    fn test_collection_write_loop() {
        let schema = person_pet_schema();
        let person = schema.get_type("demo::Person").unwrap();
        let out = RecordGenerator::new(&schema).generate(person).unwrap();

        assert!(out.contains("w.name(\"pets\").begin_array();"));
        assert!(out.contains("for item in &obj.pets {"));
        assert!(out.contains("write_pet(w, Some(item))?;"));
        assert!(out.contains("w.end_array();"));
    }

    #[test]
    fn test_float_and_bool_stream_methods() {
        let schema = schema_from(vec![TypeDecl::record(
            "Gauge",
            vec![
                ParamDecl::new("ratio", TypeExpr::named("f64")),
                ParamDecl::new("active", TypeExpr::named("bool")),
            ],
        )]);
        let entry = schema.get_type("demo::Gauge").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains("w.name(\"ratio\").value_f64(obj.ratio);"));
        assert!(out.contains("w.name(\"active\").value_bool(obj.active);"));
        assert!(out.contains("ratio = Some(r.next_f64()?);"));
        assert!(out.contains("active = Some(r.next_bool()?);"));
    }

    #[test]
    fn test_bare_module_emits_no_self_import() {
        let mut unit = SourceUnit::new("");
        unit.add_decl(TypeDecl::record(
            "Person",
            vec![ParamDecl::new("name", TypeExpr::named("String"))],
        ));
        let schema = build_schema(&[unit]).unwrap();
        let entry = schema.get_type("Person").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(!out.contains("use Person;"));
        assert!(out.contains("pub fn write_person"));
    }

    #[test]
    fn test_unique_set_reads_into_btree_set() {
        let schema = schema_from(vec![TypeDecl::record(
            "Bag",
            vec![ParamDecl::new(
                "tags",
                TypeExpr::set_of(TypeExpr::named("String")),
            )],
        )]);
        let entry = schema.get_type("demo::Bag").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains("let mut tags: Option<BTreeSet<String>> = None;"));
        assert!(out.contains("let mut items = BTreeSet::new();"));
        assert!(out.contains("items.insert(r.next_string()?);"));
        assert!(out.contains("use std::collections::BTreeSet;"));
    }

    #[test]
    fn test_nested_collections() {
        let schema = schema_from(vec![TypeDecl::record(
            "Grid",
            vec![ParamDecl::new(
                "rows",
                TypeExpr::list(TypeExpr::list(TypeExpr::named("i64"))),
            )],
        )]);
        let entry = schema.get_type("demo::Grid").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains("for item2 in item {"));
        assert!(out.contains("w.value_i64(*item2);"));
        assert!(out.contains("let mut items2 = Vec::new();"));
        assert!(out.contains("items.push(items2);"));
    }

    #[test]
    fn test_deferred_set_accumulates_in_vec() {
        let schema = schema_from(vec![
            TypeDecl::record(
                "Person",
                vec![ParamDecl::new(
                    "pets",
                    TypeExpr::set_of(TypeExpr::named("Pet")),
                )],
            ),
            TypeDecl::record(
                "Pet",
                vec![ParamDecl::enclosing("owner", TypeExpr::named("Person"))],
            ),
        ]);
        let entry = schema.get_type("demo::Person").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        // Constructor closures cannot live in an ordered set, so deferred
        // elements collect into the set only after resolution.
        assert!(out.contains(
            "let mut pets: Option<Vec<Box<dyn FnOnce(Weak<Person>) -> Pet>>> = None;"
        ));
        assert!(out.contains("let mut items = Vec::new();"));
        assert!(out.contains(
            "pets: pets.unwrap().into_iter().map(|make| make(weak.clone())).collect(),"
        ));
    }

    #[test]
    fn test_chained_enclosing_refs_rejected() {
        let schema = schema_from(vec![
            TypeDecl::record(
                "Root",
                vec![ParamDecl::new(
                    "mid",
                    TypeExpr::optional(TypeExpr::named("Mid")),
                )],
            ),
            TypeDecl::record(
                "Mid",
                vec![
                    ParamDecl::enclosing("root", TypeExpr::named("Root")),
                    ParamDecl::new("leaf", TypeExpr::optional(TypeExpr::named("Leaf"))),
                ],
            ),
            TypeDecl::record(
                "Leaf",
                vec![ParamDecl::enclosing("mid", TypeExpr::named("Mid"))],
            ),
        ]);
        let entry = schema.get_type("demo::Mid").unwrap();
        let err = RecordGenerator::new(&schema).generate(entry).unwrap_err();
        assert!(matches!(err, CodegenError::Generation { .. }));
    }

    #[test]
    fn test_required_deferred_scalar_rejected() {
        let schema = schema_from(vec![
            TypeDecl::record(
                "Person",
                vec![ParamDecl::new("pet", TypeExpr::named("Pet"))],
            ),
            TypeDecl::record(
                "Pet",
                vec![ParamDecl::enclosing("owner", TypeExpr::named("Person"))],
            ),
        ]);
        let entry = schema.get_type("demo::Person").unwrap();
        let err = RecordGenerator::new(&schema).generate(entry).unwrap_err();
        assert!(matches!(err, CodegenError::Generation { .. }));
    }

    #[test]
    fn test_reference_to_foreign_enclosed_record_rejected() {
        let schema = schema_from(vec![
            TypeDecl::record(
                "Stranger",
                vec![ParamDecl::new(
                    "pet",
                    TypeExpr::optional(TypeExpr::named("Pet")),
                )],
            ),
            TypeDecl::record("Person", vec![]),
            TypeDecl::record(
                "Pet",
                vec![ParamDecl::enclosing("owner", TypeExpr::named("Person"))],
            ),
        ]);
        let entry = schema.get_type("demo::Stranger").unwrap();
        let err = RecordGenerator::new(&schema).generate(entry).unwrap_err();
        assert!(matches!(err, CodegenError::Generation { .. }));
    }

    #[test]
    fn test_rc_target_written_by_reference() {
        // Owner owns deferred fields, so its reader yields Rc and fields
        // referencing it store Rc.
        let schema = schema_from(vec![
            TypeDecl::record(
                "Registry",
                vec![ParamDecl::new(
                    "owner",
                    TypeExpr::optional(TypeExpr::shared(TypeExpr::named("Person"))),
                )],
            ),
            TypeDecl::record(
                "Person",
                vec![ParamDecl::new(
                    "pets",
                    TypeExpr::list(TypeExpr::named("Pet")),
                )],
            ),
            TypeDecl::record(
                "Pet",
                vec![ParamDecl::enclosing("keeper", TypeExpr::named("Person"))],
            ),
        ]);
        let entry = schema.get_type("demo::Registry").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();

        assert!(out.contains("let mut owner: Option<Rc<Person>> = None;"));
        assert!(out.contains("write_person(w.name(\"owner\"), obj.owner.as_deref())?;"));
        assert!(out.contains("owner = next_or_null(r, read_person)?;"));
    }

    #[test]
    fn test_non_owner_enclosing_field_name() {
        let schema = schema_from(vec![
            TypeDecl::record("Person", vec![]),
            TypeDecl::record(
                "Pet",
                vec![ParamDecl::enclosing("keeper", TypeExpr::named("Person"))],
            ),
        ]);
        let entry = schema.get_type("demo::Pet").unwrap();
        let out = RecordGenerator::new(&schema).generate(entry).unwrap();
        assert!(out.contains("keeper: owner,"));
    }
}
