//! Two-pass schema builder.
//!
//! The builder consumes a batch of declaration units and produces one
//! normalized [`Schema`]. The first pass registers every interface so
//! records can attach to supertypes regardless of declaration order; the
//! second pass walks enums and then records, resolving every declared type
//! name against the unit's own declarations, its import table, and finally
//! other units of the same module. Two derived passes follow: interface
//! enclosing-owner resolution and the needs-enclosing propagation that
//! drives deferred construction in the emitter.

use std::collections::BTreeSet;

use tracing::debug;

use crate::decl::{DeclKind, ParamDecl, SourceUnit, TypeExpr};
use crate::error::SchemaError;
use crate::model::{
    CollectionKind, Field, FieldType, InterfaceEntry, Schema, TypeEntry, TypeEntryKind, TypeRef,
};

/// Builds a normalized schema from a batch of declaration units.
///
/// Fails on the first malformed declaration; a partial schema is never
/// returned.
pub fn build_schema(units: &[SourceUnit]) -> Result<Schema, SchemaError> {
    let mut schema = Schema::default();
    let mut named_refs: Vec<NamedRef> = Vec::new();

    // Interfaces first, so supertype links can attach while records are
    // walked, whatever the declaration order across units.
    for unit in units {
        for decl in &unit.decls {
            if matches!(decl.kind, DeclKind::Interface) {
                let identity = qualify(&unit.module_path, &decl.name);
                debug!(%identity, "registered interface");
                schema.interfaces.push(InterfaceEntry {
                    identity,
                    implementations: Vec::new(),
                    common_enclosing_ref: None,
                });
            }
        }
    }

    for unit in units {
        for decl in &unit.decls {
            if let DeclKind::Enum { members } = &decl.kind {
                let identity = qualify(&unit.module_path, &decl.name);
                debug!(%identity, members = members.len(), "registered enum");
                schema.types.push(TypeEntry {
                    identity,
                    kind: TypeEntryKind::Enum {
                        members: members.clone(),
                    },
                    fields: Vec::new(),
                });
            }
        }
    }

    for unit in units {
        for decl in &unit.decls {
            let DeclKind::Record { ctors } = &decl.kind else {
                continue;
            };
            let identity = qualify(&unit.module_path, &decl.name);
            let params = richest_ctor(ctors);
            debug!(%identity, params = params.len(), "registered record");

            let mut fields = Vec::with_capacity(params.len());
            let mut saw_enclosing = false;
            for param in params {
                let ty = resolve_param(units, unit, &identity, param, &mut named_refs)?;
                if ty.is_enclosing_ref() {
                    if saw_enclosing {
                        return Err(SchemaError::MultipleEnclosingRefs {
                            record: identity.clone(),
                        });
                    }
                    saw_enclosing = true;
                }
                fields.push(Field {
                    name: param.name.clone(),
                    ty,
                });
            }

            for supertype in &decl.supertypes {
                let Some(super_id) = resolve_name(units, unit, supertype) else {
                    continue;
                };
                if let Some(entry) = schema
                    .interfaces
                    .iter_mut()
                    .find(|i| i.identity == super_id)
                {
                    entry.implementations.push(identity.clone());
                }
            }

            schema.types.push(TypeEntry {
                identity,
                kind: TypeEntryKind::Record,
                fields,
            });
        }
    }

    resolve_interface_owners(&mut schema)?;
    propagate_needs_enclosing(&mut schema);
    validate_shared_refs(&schema, &named_refs)?;

    Ok(schema)
}

/// One declared reference to a named type, with its `Rc` wrapper state.
struct NamedRef {
    record: String,
    field: String,
    target: String,
    shared: bool,
}

/// Picks the constructor parameter list to model: the one with the most
/// parameters, the earliest declared on a tie.
fn richest_ctor(ctors: &[Vec<ParamDecl>]) -> &[ParamDecl] {
    let mut best: Option<&Vec<ParamDecl>> = None;
    for ctor in ctors {
        if best.is_none_or(|b| ctor.len() > b.len()) {
            best = Some(ctor);
        }
    }
    best.map_or(&[], Vec::as_slice)
}

fn qualify(module_path: &str, name: &str) -> String {
    if module_path.is_empty() {
        name.to_string()
    } else {
        format!("{module_path}::{name}")
    }
}

/// Resolves a declared name to a fully-qualified identity. Path-qualified
/// names pass through unchanged; simple names resolve against the unit's
/// own declarations, then its imports, then other units of the same module.
fn resolve_name(units: &[SourceUnit], unit: &SourceUnit, name: &str) -> Option<String> {
    if name.contains("::") {
        return Some(name.to_string());
    }
    if unit.decls.iter().any(|d| d.name == name) {
        return Some(qualify(&unit.module_path, name));
    }
    if let Some(import) = unit
        .imports
        .iter()
        .find(|i| i.rsplit("::").next() == Some(name))
    {
        return Some(import.clone());
    }
    for other in units {
        if other.module_path == unit.module_path && other.decls.iter().any(|d| d.name == name) {
            return Some(qualify(&unit.module_path, name));
        }
    }
    None
}

fn resolve_param(
    units: &[SourceUnit],
    unit: &SourceUnit,
    owner: &str,
    param: &ParamDecl,
    refs: &mut Vec<NamedRef>,
) -> Result<FieldType, SchemaError> {
    resolve_type_expr(
        units,
        unit,
        owner,
        &param.name,
        &param.ty,
        param.enclosing_ref,
        false,
        false,
        refs,
    )
}

#[allow(clippy::too_many_arguments)]
fn resolve_type_expr(
    units: &[SourceUnit],
    unit: &SourceUnit,
    owner: &str,
    param: &str,
    expr: &TypeExpr,
    enclosing: bool,
    nullable: bool,
    shared: bool,
    refs: &mut Vec<NamedRef>,
) -> Result<FieldType, SchemaError> {
    match expr {
        TypeExpr::Named(name) => {
            let type_ref = match TypeRef::primitive(name) {
                Some(primitive) => {
                    if enclosing {
                        return Err(SchemaError::PrimitiveEnclosingRef {
                            record: owner.to_string(),
                            field: param.to_string(),
                        });
                    }
                    if shared {
                        return Err(SchemaError::validation(format!(
                            "field '{}' of '{}': primitive '{}' cannot be Rc-wrapped",
                            param, owner, name
                        )));
                    }
                    primitive
                }
                None => {
                    let identity = resolve_name(units, unit, name)
                        .ok_or_else(|| SchemaError::unresolved(owner, param, name))?;
                    if !enclosing {
                        refs.push(NamedRef {
                            record: owner.to_string(),
                            field: param.to_string(),
                            target: identity.clone(),
                            shared,
                        });
                    }
                    TypeRef::Named(identity)
                }
            };
            Ok(FieldType::Scalar {
                type_ref,
                nullable,
                is_enclosing_ref: enclosing,
                needs_enclosing_ref: false,
            })
        }
        TypeExpr::Shared(inner) => {
            if enclosing {
                return Err(SchemaError::validation(format!(
                    "enclosing-reference field '{}' of '{}' must be declared Weak",
                    param, owner
                )));
            }
            if !matches!(inner.as_ref(), TypeExpr::Named(_)) {
                return Err(SchemaError::validation(format!(
                    "field '{}' of '{}': Rc must wrap a declared type directly",
                    param, owner
                )));
            }
            resolve_type_expr(units, unit, owner, param, inner, false, nullable, true, refs)
        }
        TypeExpr::Optional(inner) => {
            if matches!(inner.as_ref(), TypeExpr::List(_) | TypeExpr::SetOf(_)) {
                return Err(SchemaError::NullableCollection {
                    record: owner.to_string(),
                    field: param.to_string(),
                });
            }
            resolve_type_expr(
                units, unit, owner, param, inner, enclosing, true, shared, refs,
            )
        }
        TypeExpr::List(inner) | TypeExpr::SetOf(inner) => {
            if enclosing {
                return Err(SchemaError::EnclosingRefCollection {
                    record: owner.to_string(),
                    field: param.to_string(),
                });
            }
            if matches!(inner.as_ref(), TypeExpr::Optional(_)) {
                return Err(SchemaError::NullableElement {
                    record: owner.to_string(),
                    field: param.to_string(),
                });
            }
            let kind = match expr {
                TypeExpr::List(_) => CollectionKind::Sequence,
                _ => CollectionKind::UniqueSet,
            };
            let element =
                resolve_type_expr(units, unit, owner, param, inner, false, false, false, refs)?;
            Ok(FieldType::Collection {
                kind,
                element: Box::new(element),
            })
        }
    }
}

/// Checks every declared `Rc` wrapper against how its target is
/// reconstructed. A type that owns deferred fields is rebuilt with
/// `Rc::new_cyclic`, so fields referencing it must be declared `Rc<T>`;
/// every other target is read by value and must not be. A mismatch either
/// way yields generated code that does not compile, so it fails the batch.
fn validate_shared_refs(schema: &Schema, refs: &[NamedRef]) -> Result<(), SchemaError> {
    for named_ref in refs {
        let target_is_rc = schema.get_type(&named_ref.target).is_some_and(|t| {
            !t.is_enum() && t.enclosing_owner().is_none() && t.has_deferred_fields()
        });
        if named_ref.shared && !target_is_rc {
            return Err(SchemaError::validation(format!(
                "field '{}' of '{}': '{}' is read by value; drop the Rc wrapper",
                named_ref.field, named_ref.record, named_ref.target
            )));
        }
        if !named_ref.shared && target_is_rc {
            return Err(SchemaError::validation(format!(
                "field '{}' of '{}': '{}' is reconstructed as Rc and must be declared Rc-wrapped",
                named_ref.field, named_ref.record, named_ref.target
            )));
        }
    }
    Ok(())
}

/// Resolves each interface's shared enclosing owner: the owner type of the
/// first implementation that declares an enclosing reference. A second
/// implementation with a different owner type is a hard error, since the
/// dispatch reader has a single owner parameter.
fn resolve_interface_owners(schema: &mut Schema) -> Result<(), SchemaError> {
    let owners: Vec<(String, String)> = schema
        .types
        .iter()
        .filter_map(|t| {
            t.enclosing_owner()
                .map(|owner| (t.identity.clone(), owner.to_string()))
        })
        .collect();

    for interface in &mut schema.interfaces {
        let mut common: Option<String> = None;
        for impl_id in &interface.implementations {
            let Some((_, owner)) = owners.iter().find(|(id, _)| id == impl_id) else {
                continue;
            };
            match &common {
                None => common = Some(owner.clone()),
                Some(first) if first != owner => {
                    return Err(SchemaError::ConflictingEnclosingRef {
                        interface: interface.identity.clone(),
                        first: first.clone(),
                        second: owner.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        if let Some(owner) = &common {
            debug!(interface = %interface.identity, %owner, "common enclosing owner");
        }
        interface.common_enclosing_ref = common;
    }

    Ok(())
}

/// Marks every field (and collection element) whose type cannot be
/// constructed before its enclosing instance exists. Needy types are the
/// records with an enclosing-reference field and the interfaces with a
/// common enclosing owner; the property does not travel further than one
/// reference hop.
fn propagate_needs_enclosing(schema: &mut Schema) {
    let needy: BTreeSet<String> = schema
        .types
        .iter()
        .filter(|t| t.enclosing_owner().is_some())
        .map(|t| t.identity.clone())
        .chain(
            schema
                .interfaces
                .iter()
                .filter(|i| i.common_enclosing_ref.is_some())
                .map(|i| i.identity.clone()),
        )
        .collect();

    for entry in &mut schema.types {
        for field in &mut entry.fields {
            if field.ty.is_enclosing_ref() {
                continue;
            }
            mark_needy(&mut field.ty, &needy);
        }
    }
}

fn mark_needy(ty: &mut FieldType, needy: &BTreeSet<String>) {
    match ty {
        FieldType::Scalar {
            type_ref: TypeRef::Named(identity),
            needs_enclosing_ref,
            ..
        } => {
            if needy.contains(identity.as_str()) {
                *needs_enclosing_ref = true;
            }
        }
        FieldType::Collection { element, .. } => mark_needy(element, needy),
        FieldType::Scalar { .. } => {}
    }
}
