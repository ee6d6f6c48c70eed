//! `syn`-based declaration walker.
//!
//! Turns one annotated Rust source file into a [`SourceUnit`]. Types opt in
//! with a `#[ser]` attribute on the item; an enclosing back-reference field
//! is marked with `#[ser(enclosing_ref)]` or declared as `Weak<Owner>`.
//! Inherent `impl` blocks contribute extra constructor parameter lists via
//! functions returning `Self`, and trait impls register supertype links.
//! Only same-file impl blocks are considered.

use proc_macro2::TokenStream;
use tracing::debug;

use crate::decl::{ParamDecl, SourceUnit, TypeDecl, TypeExpr};
use crate::error::ParseError;

/// Walks one source file and collects its annotated declarations.
pub fn parse_source(module_path: &str, code: &str) -> Result<SourceUnit, ParseError> {
    let file = syn::parse_file(code).map_err(|e| ParseError::syntax(module_path, e))?;
    let mut unit = SourceUnit::new(module_path);
    let mut supertype_links: Vec<(String, String)> = Vec::new();
    let mut extra_ctors: Vec<(String, Vec<ParamDecl>)> = Vec::new();

    for item in &file.items {
        match item {
            syn::Item::Use(item_use) => {
                collect_imports(&item_use.tree, String::new(), &mut unit);
            }
            syn::Item::Struct(item) if has_ser_attr(&item.attrs) => {
                let decl = walk_struct(module_path, item)?;
                debug!(module = module_path, name = %decl.name, "collected record");
                unit.add_decl(decl);
            }
            syn::Item::Enum(item) if has_ser_attr(&item.attrs) => {
                let decl = walk_enum(module_path, item)?;
                debug!(module = module_path, name = %decl.name, "collected enum");
                unit.add_decl(decl);
            }
            syn::Item::Trait(item) if has_ser_attr(&item.attrs) => {
                debug!(module = module_path, name = %item.ident, "collected interface");
                unit.add_decl(TypeDecl::interface(item.ident.to_string()));
            }
            syn::Item::Impl(item) => {
                walk_impl(module_path, item, &mut supertype_links, &mut extra_ctors)?;
            }
            _ => {}
        }
    }

    // Impl blocks may precede the type they refer to, so links are
    // attached after the whole file has been walked.
    for (name, supertype) in supertype_links {
        if let Some(decl) = unit.decls.iter_mut().find(|d| d.name == name) {
            decl.add_supertype(supertype);
        }
    }
    for (name, params) in extra_ctors {
        if let Some(decl) = unit.decls.iter_mut().find(|d| d.name == name) {
            if let crate::decl::DeclKind::Record { ctors } = &mut decl.kind {
                ctors.push(params);
            }
        }
    }

    Ok(unit)
}

fn has_ser_attr(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| a.path().is_ident("ser"))
}

fn has_enclosing_marker(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| {
        if !a.path().is_ident("ser") {
            return false;
        }
        match &a.meta {
            syn::Meta::List(list) => is_marker(&list.tokens, "enclosing_ref"),
            _ => false,
        }
    })
}

fn is_marker(tokens: &TokenStream, marker: &str) -> bool {
    tokens.to_string() == marker
}

fn collect_imports(tree: &syn::UseTree, prefix: String, unit: &mut SourceUnit) {
    match tree {
        syn::UseTree::Path(path) => {
            let next = if prefix.is_empty() {
                path.ident.to_string()
            } else {
                format!("{prefix}::{}", path.ident)
            };
            collect_imports(&path.tree, next, unit);
        }
        syn::UseTree::Name(name) => {
            let full = if prefix.is_empty() {
                name.ident.to_string()
            } else {
                format!("{prefix}::{}", name.ident)
            };
            unit.add_import(full);
        }
        syn::UseTree::Rename(rename) => {
            let full = if prefix.is_empty() {
                rename.ident.to_string()
            } else {
                format!("{prefix}::{}", rename.ident)
            };
            unit.add_import(full);
        }
        syn::UseTree::Group(group) => {
            for item in &group.items {
                collect_imports(item, prefix.clone(), unit);
            }
        }
        // Globs cannot participate in name resolution.
        syn::UseTree::Glob(_) => {}
    }
}

fn walk_struct(module_path: &str, item: &syn::ItemStruct) -> Result<TypeDecl, ParseError> {
    let syn::Fields::Named(named) = &item.fields else {
        return Err(ParseError::unsupported(
            module_path,
            format!("struct '{}' must have named fields", item.ident),
        ));
    };

    let mut params = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else {
            return Err(ParseError::unsupported(
                module_path,
                format!("unnamed field in struct '{}'", item.ident),
            ));
        };
        let (ty, weak) = map_type(module_path, &item.ident, &field.ty)?;
        let param = if weak || has_enclosing_marker(&field.attrs) {
            ParamDecl::enclosing(ident.to_string(), ty)
        } else {
            ParamDecl::new(ident.to_string(), ty)
        };
        params.push(param);
    }

    Ok(TypeDecl::record(item.ident.to_string(), params))
}

fn walk_enum(module_path: &str, item: &syn::ItemEnum) -> Result<TypeDecl, ParseError> {
    let mut members = Vec::new();
    for variant in &item.variants {
        if !matches!(variant.fields, syn::Fields::Unit) {
            return Err(ParseError::unsupported(
                module_path,
                format!(
                    "variant '{}::{}' must be fieldless",
                    item.ident, variant.ident
                ),
            ));
        }
        members.push(variant.ident.to_string());
    }
    Ok(TypeDecl::enumeration(item.ident.to_string(), members))
}

fn walk_impl(
    module_path: &str,
    item: &syn::ItemImpl,
    supertype_links: &mut Vec<(String, String)>,
    extra_ctors: &mut Vec<(String, Vec<ParamDecl>)>,
) -> Result<(), ParseError> {
    let Some(self_name) = type_simple_name(&item.self_ty) else {
        return Ok(());
    };

    if let Some((_, trait_path, _)) = &item.trait_ {
        supertype_links.push((self_name, path_to_string(trait_path)));
        return Ok(());
    }

    for impl_item in &item.items {
        let syn::ImplItem::Fn(f) = impl_item else {
            continue;
        };
        if !returns_self(&f.sig.output, &self_name) {
            continue;
        }
        let mut params = Vec::new();
        let mut supported = true;
        for input in &f.sig.inputs {
            let syn::FnArg::Typed(arg) = input else {
                // A receiver disqualifies the function as a constructor.
                supported = false;
                break;
            };
            let syn::Pat::Ident(pat) = arg.pat.as_ref() else {
                supported = false;
                break;
            };
            let self_ident = syn::Ident::new(&self_name, proc_macro2::Span::call_site());
            let (ty, weak) = map_type(module_path, &self_ident, &arg.ty)?;
            let param = if weak || has_enclosing_marker(&arg.attrs) {
                ParamDecl::enclosing(pat.ident.to_string(), ty)
            } else {
                ParamDecl::new(pat.ident.to_string(), ty)
            };
            params.push(param);
        }
        if supported {
            extra_ctors.push((self_name.clone(), params));
        }
    }

    Ok(())
}

/// Maps a declared field type to a type expression. The boolean is true
/// when the type was wrapped in `Weak`, which implies the enclosing marker.
fn map_type(
    module_path: &str,
    owner: &syn::Ident,
    ty: &syn::Type,
) -> Result<(TypeExpr, bool), ParseError> {
    let syn::Type::Path(type_path) = ty else {
        return Err(ParseError::unsupported(
            module_path,
            format!("unsupported field type in '{owner}'"),
        ));
    };

    let segments = &type_path.path.segments;
    if segments.len() == 1 {
        let segment = &segments[0];
        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
            let Some(syn::GenericArgument::Type(inner)) = args.args.first() else {
                return Err(ParseError::unsupported(
                    module_path,
                    format!("unsupported generic arguments in '{owner}'"),
                ));
            };
            let (inner_expr, inner_weak) = map_type(module_path, owner, inner)?;
            return match segment.ident.to_string().as_str() {
                "Option" => Ok((TypeExpr::optional(inner_expr), inner_weak)),
                "Vec" => Ok((TypeExpr::list(inner_expr), inner_weak)),
                "BTreeSet" => Ok((TypeExpr::set_of(inner_expr), inner_weak)),
                // Generated readers collect unique sets into a BTreeSet,
                // so a HashSet-declared field would not compile.
                "HashSet" => Err(ParseError::unsupported(
                    module_path,
                    format!("unsupported set type 'HashSet' in '{owner}'; declare a BTreeSet"),
                )),
                "Weak" => Ok((inner_expr, true)),
                "Rc" | "Arc" => Ok((TypeExpr::shared(inner_expr), inner_weak)),
                other => Err(ParseError::unsupported(
                    module_path,
                    format!("unsupported wrapper '{other}' in '{owner}'"),
                )),
            };
        }
    }

    Ok((TypeExpr::named(path_to_string(&type_path.path)), false))
}

fn type_simple_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn returns_self(output: &syn::ReturnType, self_name: &str) -> bool {
    let syn::ReturnType::Type(_, ty) = output else {
        return false;
    };
    returns_self_type(ty, self_name)
}

fn returns_self_type(ty: &syn::Type, self_name: &str) -> bool {
    let syn::Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    let ident = segment.ident.to_string();
    if ident == "Self" || ident == self_name {
        return true;
    }
    if matches!(ident.as_str(), "Rc" | "Arc") {
        if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
            if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                return returns_self_type(inner, self_name);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclKind;

    #[test]
    fn test_parses_record_with_imports() {
        let unit = parse_source(
            "demo::model",
            r"
            use demo::other::Pet;
            use std::collections::BTreeSet;

            #[ser]
            pub struct Person {
                pub name: String,
                pub age: Option<i64>,
                pub pets: Vec<Pet>,
            }
            ",
        )
        .unwrap();

        assert_eq!(unit.module_path, "demo::model");
        assert!(unit.imports.contains(&"demo::other::Pet".to_string()));
        assert_eq!(unit.decls.len(), 1);

        let decl = &unit.decls[0];
        assert_eq!(decl.name, "Person");
        let DeclKind::Record { ctors } = &decl.kind else {
            panic!("expected record");
        };
        assert_eq!(ctors.len(), 1);
        assert_eq!(ctors[0].len(), 3);
        assert_eq!(ctors[0][0].ty, TypeExpr::named("String"));
        assert_eq!(
            ctors[0][1].ty,
            TypeExpr::optional(TypeExpr::named("i64"))
        );
        assert_eq!(ctors[0][2].ty, TypeExpr::list(TypeExpr::named("Pet")));
    }

    #[test]
    fn test_weak_field_implies_enclosing_marker() {
        let unit = parse_source(
            "demo",
            r"
            #[ser]
            pub struct Pet {
                pub owner: Weak<Person>,
                pub name: String,
            }
            ",
        )
        .unwrap();

        let DeclKind::Record { ctors } = &unit.decls[0].kind else {
            panic!("expected record");
        };
        assert!(ctors[0][0].enclosing_ref);
        assert_eq!(ctors[0][0].ty, TypeExpr::named("Person"));
        assert!(!ctors[0][1].enclosing_ref);
    }

    #[test]
    fn test_enum_and_trait_declarations() {
        let unit = parse_source(
            "demo",
            r"
            #[ser]
            pub enum Color {
                Red,
                GreenBlue,
            }

            #[ser]
            pub trait Shape {}
            ",
        )
        .unwrap();

        assert_eq!(unit.decls.len(), 2);
        let DeclKind::Enum { members } = &unit.decls[0].kind else {
            panic!("expected enum");
        };
        assert_eq!(members, &["Red".to_string(), "GreenBlue".to_string()]);
        assert!(matches!(unit.decls[1].kind, DeclKind::Interface));
    }

    #[test]
    fn test_trait_impl_registers_supertype() {
        let unit = parse_source(
            "demo",
            r"
            #[ser]
            pub trait Shape {}

            #[ser]
            pub struct Circle {
                pub radius: f64,
            }

            impl Shape for Circle {}
            ",
        )
        .unwrap();

        let circle = unit.decls.iter().find(|d| d.name == "Circle").unwrap();
        assert_eq!(circle.supertypes, vec!["Shape".to_string()]);
    }

    #[test]
    fn test_inherent_ctor_contributes_parameter_list() {
        let unit = parse_source(
            "demo",
            r"
            #[ser]
            pub struct Point {
                pub x: i64,
                pub y: i64,
            }

            impl Point {
                pub fn new(x: i64, y: i64, label: String) -> Self {
                    unimplemented!()
                }

                pub fn origin() -> Self {
                    unimplemented!()
                }

                pub fn shifted(&self, dx: i64) -> Self {
                    unimplemented!()
                }
            }
            ",
        )
        .unwrap();

        let DeclKind::Record { ctors } = &unit.decls[0].kind else {
            panic!("expected record");
        };
        // Field list plus two constructor functions; methods with a
        // receiver are not constructors.
        assert_eq!(ctors.len(), 3);
        assert_eq!(ctors[1].len(), 3);
        assert_eq!(ctors[1][2].name, "label");
        assert!(ctors[2].is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = parse_source("demo", "struct {").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_rc_field_maps_to_shared() {
        let unit = parse_source(
            "demo",
            r"
            #[ser]
            pub struct Registry {
                pub owner: Option<Rc<Person>>,
            }
            ",
        )
        .unwrap();

        let DeclKind::Record { ctors } = &unit.decls[0].kind else {
            panic!("expected record");
        };
        assert_eq!(
            ctors[0][0].ty,
            TypeExpr::optional(TypeExpr::shared(TypeExpr::named("Person")))
        );
    }

    #[test]
    fn test_hash_set_field_is_rejected() {
        let err = parse_source(
            "demo",
            r"
            #[ser]
            pub struct Bag {
                pub tags: HashSet<String>,
            }
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { .. }));
    }

    #[test]
    fn test_tuple_struct_is_rejected() {
        let err = parse_source(
            "demo",
            r"
            #[ser]
            pub struct Wrapper(pub i64);
            ",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { .. }));
    }
}
