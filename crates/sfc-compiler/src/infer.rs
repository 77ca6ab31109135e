//! Runtime prop types inferred from TypeScript types.
//!
//! Only a best-effort mapping is attempted: each type is reduced to the
//! constructor names Vue 2 checks props against (`String`, `Number`, ...),
//! or `null` when no runtime check applies.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use swc_ecma_ast::*;

/// Local type alias name to its runtime type tags.
pub type DeclaredTypes = FxHashMap<String, Vec<String>>;

const NO_CHECK: &str = "null";

/// One entry of a synthesized props object.
#[derive(Debug, Clone)]
pub struct PropSchemaEntry<'a> {
    pub key: String,
    /// The key was a string literal and must be emitted quoted.
    pub quoted: bool,
    pub required: bool,
    /// Runtime type tags. `["null"]` means no runtime check.
    pub types: Vec<String>,
    /// Default value from `withDefaults`.
    pub default: Option<&'a Expr>,
}

impl PropSchemaEntry<'_> {
    pub fn is_unchecked(&self) -> bool {
        matches!(self.types.as_slice(), [only] if only == NO_CHECK)
    }

    /// The value of the `type` field: `String` or `[String, Number]`.
    pub fn type_code(&self) -> String {
        match self.types.as_slice() {
            [only] => only.clone(),
            types => format!("[{}]", types.join(", ")),
        }
    }
}

/// Collect runtime types of local type aliases, earlier scopes first.
///
/// Aliases whose body is a literal type are left out; interfaces map to
/// `Object`. Aliases are visited in declaration order so one may refer to
/// an earlier one.
pub fn declared_types(scopes: &[&[ModuleItem]]) -> DeclaredTypes {
    let mut declared = DeclaredTypes::default();
    for items in scopes {
        for item in items.iter() {
            match type_declaration(item) {
                Some(Decl::TsTypeAlias(alias)) => {
                    let name = alias.id.sym.to_string();
                    if matches!(&*alias.type_ann, TsType::TsTypeLit(_)) || declared.contains_key(&name) {
                        continue;
                    }
                    let types = infer_runtime_type(&alias.type_ann, &declared);
                    tracing::trace!(alias = %name, ?types, "declared type");
                    declared.insert(name, types);
                }
                Some(Decl::TsInterface(interface)) => {
                    declared
                        .entry(interface.id.sym.to_string())
                        .or_insert_with(|| vec!["Object".into()]);
                }
                _ => {}
            }
        }
    }
    declared
}

fn type_declaration(item: &ModuleItem) -> Option<&Decl> {
    match item {
        ModuleItem::Stmt(Stmt::Decl(decl)) => Some(decl),
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
        _ => None,
    }
}

/// Schema entries for the members of a literal type or interface body,
/// in declaration order.
pub fn infer_props<'a>(members: &[TsTypeElement], declared: &DeclaredTypes) -> Vec<PropSchemaEntry<'a>> {
    members
        .iter()
        .filter_map(|member| {
            let (key, computed, optional, types) = match member {
                TsTypeElement::TsPropertySignature(prop) => (
                    &prop.key,
                    prop.computed,
                    prop.optional,
                    prop.type_ann
                        .as_ref()
                        .map(|ann| infer_runtime_type(&ann.type_ann, declared)),
                ),
                TsTypeElement::TsMethodSignature(method) => (
                    &method.key,
                    method.computed,
                    method.optional,
                    Some(vec!["Function".to_string()]),
                ),
                _ => return None,
            };
            if computed {
                return None;
            }
            let (key, quoted) = member_key(key)?;
            Some(PropSchemaEntry {
                key,
                quoted,
                required: !optional,
                types: types.unwrap_or_else(|| vec![NO_CHECK.to_string()]),
                default: None,
            })
        })
        .collect()
}

fn member_key(key: &Expr) -> Option<(String, bool)> {
    match key {
        Expr::Ident(ident) => Some((ident.sym.to_string(), false)),
        Expr::Lit(Lit::Str(s)) => {
            let raw = s.raw.as_deref()?;
            raw.get(1..raw.len().saturating_sub(1))
                .map(|inner| (inner.to_string(), true))
        }
        _ => None,
    }
}

/// Runtime type tags for a TypeScript type. Union members are
/// de-duplicated in first-seen order.
pub fn infer_runtime_type(ty: &TsType, declared: &DeclaredTypes) -> Vec<String> {
    let tag = |name: &str| vec![name.to_string()];

    match ty {
        TsType::TsKeywordType(keyword) => match keyword.kind {
            TsKeywordTypeKind::TsStringKeyword => tag("String"),
            TsKeywordTypeKind::TsNumberKeyword => tag("Number"),
            TsKeywordTypeKind::TsBooleanKeyword => tag("Boolean"),
            TsKeywordTypeKind::TsObjectKeyword => tag("Object"),
            _ => tag(NO_CHECK),
        },
        TsType::TsTypeLit(_) => tag("Object"),
        TsType::TsFnOrConstructorType(TsFnOrConstructorType::TsFnType(_)) => tag("Function"),
        TsType::TsArrayType(_) | TsType::TsTupleType(_) => tag("Array"),
        TsType::TsLitType(lit) => match &lit.lit {
            TsLit::Str(_) => tag("String"),
            TsLit::Bool(_) => tag("Boolean"),
            TsLit::Number(_) | TsLit::BigInt(_) => tag("Number"),
            _ => tag(NO_CHECK),
        },
        TsType::TsTypeRef(reference) => match &reference.type_name {
            TsEntityName::Ident(ident) => {
                if let Some(types) = declared.get(&*ident.sym) {
                    return types.clone();
                }
                match &*ident.sym {
                    "Array" | "Function" | "Object" | "Set" | "Map" | "WeakSet" | "WeakMap" => tag(&ident.sym),
                    "Record" | "Partial" | "Readonly" | "Pick" | "Omit" | "Exclude" | "Extract"
                    | "Required" | "InstanceType" => tag("Object"),
                    _ => tag(NO_CHECK),
                }
            }
            _ => tag(NO_CHECK),
        },
        TsType::TsParenthesizedType(paren) => infer_runtime_type(&paren.type_ann, declared),
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(union)) => union
            .types
            .iter()
            .flat_map(|member| infer_runtime_type(member, declared))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect(),
        // Member-level requiredness is not tracked through intersections.
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsIntersectionType(_)) => tag("Object"),
        _ => tag(NO_CHECK),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_parser::script::parse_script;
    use sfc_parser::ScriptLang;
    use swc_common::sync::Lrc;

    fn parse(source: &str) -> Vec<ModuleItem> {
        let cm: Lrc<swc_common::SourceMap> = Default::default();
        parse_script(&cm, "test.ts", source, 0, ScriptLang::Ts)
            .unwrap()
            .module
            .body
    }

    fn alias_type(items: &[ModuleItem], name: &str) -> TsType {
        items
            .iter()
            .find_map(|item| match type_declaration(item) {
                Some(Decl::TsTypeAlias(alias)) if &*alias.id.sym == name => Some((*alias.type_ann).clone()),
                _ => None,
            })
            .unwrap()
    }

    fn infer(ty: &str) -> Vec<String> {
        let items = parse(&format!("type T = {}", ty));
        infer_runtime_type(&alias_type(&items, "T"), &DeclaredTypes::default())
    }

    fn schema(ty: &str) -> Vec<(String, bool, String)> {
        let items = parse(&format!("type T = {}", ty));
        let TsType::TsTypeLit(lit) = alias_type(&items, "T") else {
            panic!("not a literal type");
        };
        infer_props(&lit.members, &declared_types(&[items.as_slice()]))
            .into_iter()
            .map(|entry| (entry.key.clone(), entry.required, entry.type_code()))
            .collect()
    }

    #[test]
    fn test_literal_type_schema() {
        assert_eq!(
            schema("{ a: string; b?: number }"),
            vec![
                ("a".to_string(), true, "String".to_string()),
                ("b".to_string(), false, "Number".to_string()),
            ]
        );
    }

    #[test]
    fn test_union_is_deduplicated() {
        assert_eq!(infer("string | string"), vec!["String"]);
        assert_eq!(infer("'a' | 'b' | 1"), vec!["String", "Number"]);
        assert_eq!(infer("(string | null)"), vec!["String", "null"]);
    }

    #[test]
    fn test_dispatch_table() {
        assert_eq!(infer("boolean"), vec!["Boolean"]);
        assert_eq!(infer("object"), vec!["Object"]);
        assert_eq!(infer("{ x: number }"), vec!["Object"]);
        assert_eq!(infer("() => void"), vec!["Function"]);
        assert_eq!(infer("string[]"), vec!["Array"]);
        assert_eq!(infer("[number, number]"), vec!["Array"]);
        assert_eq!(infer("true"), vec!["Boolean"]);
        assert_eq!(infer("Map<string, number>"), vec!["Map"]);
        assert_eq!(infer("Record<string, number>"), vec!["Object"]);
        assert_eq!(infer("Partial<Foo>"), vec!["Object"]);
        assert_eq!(infer("A & B"), vec!["Object"]);
        assert_eq!(infer("Foo"), vec!["null"]);
        assert_eq!(infer("any"), vec!["null"]);
    }

    #[test]
    fn test_members_without_type_are_unchecked() {
        let items = parse("type T = { a; 'data-id': string; [k]: number; go(): void }");
        let TsType::TsTypeLit(lit) = alias_type(&items, "T") else {
            panic!("not a literal type");
        };
        let entries = infer_props(&lit.members, &DeclaredTypes::default());
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_unchecked());
        assert_eq!(entries[1].key, "data-id");
        assert!(entries[1].quoted);
        assert_eq!(entries[2].type_code(), "Function");
    }

    #[test]
    fn test_declared_types_follow_aliases() {
        let items = parse(
            "type Id = string | number\ntype Ids = Id[]\ntype Key = Id\ninterface User { name: string }\ntype Lit = { a: 1 }",
        );
        let declared = declared_types(&[items.as_slice()]);
        assert_eq!(declared["Id"], vec!["String", "Number"]);
        assert_eq!(declared["Ids"], vec!["Array"]);
        assert_eq!(declared["Key"], vec!["String", "Number"]);
        assert_eq!(declared["User"], vec!["Object"]);
        assert!(!declared.contains_key("Lit"));
    }

    #[test]
    fn test_earlier_scope_wins() {
        let setup = parse("type Id = string");
        let module = parse("type Id = number");
        let declared = declared_types(&[setup.as_slice(), module.as_slice()]);
        assert_eq!(declared["Id"], vec!["String"]);
    }
}
