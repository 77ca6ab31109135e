//! Compiler macro expansion for `<script setup>`.
//!
//! `defineProps`, `defineEmits`, `defineExpose` and `withDefaults` need no
//! import. Calls used as declarator initializers are replaced in place
//! (`__props`, `__ctx.emit`); calls used as bare statements are dropped.
//! The syntax tree itself is never mutated: replacements are recorded
//! against the original spans and applied when the module is emitted.

use crate::error::{MacroError, MacroErrorCode};
use crate::infer::{declared_types, infer_props, PropSchemaEntry};
use sfc_parser::ParsedScript;
use swc_common::Spanned;
use swc_ecma_ast::*;

pub const DEFINE_PROPS: &str = "defineProps";
pub const DEFINE_EMITS: &str = "defineEmits";
pub const DEFINE_EXPOSE: &str = "defineExpose";
pub const WITH_DEFAULTS: &str = "withDefaults";

/// Name of the props parameter of the synthesized setup function.
pub const PROPS_PARAM: &str = "__props";
/// Name of the context parameter of the synthesized setup function.
pub const CONTEXT_PARAM: &str = "__ctx";

/// Source text to substitute for a span of the setup script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub span: swc_common::Span,
    pub text: String,
}

/// A top-level setup item that survives expansion.
#[derive(Debug, Clone)]
pub struct ExpandedItem<'a> {
    pub item: &'a ModuleItem,
    /// Ordered by position, non-overlapping.
    pub replacements: Vec<Replacement>,
}

/// The runtime props declaration.
#[derive(Debug, Clone)]
pub enum PropsDefinition<'a> {
    /// `defineProps({ ... })`: the argument is passed through.
    Runtime(&'a Expr),
    /// `defineProps<T>()`: synthesized from the type.
    Schema(Vec<PropSchemaEntry<'a>>),
}

#[derive(Debug, Clone)]
pub struct MacroResult<'a> {
    pub items: Vec<ExpandedItem<'a>>,
    pub props: Option<PropsDefinition<'a>>,
    /// The `defineExpose` argument.
    pub expose: Option<&'a Expr>,
}

/// A type argument resolved to something the macro accepts.
enum ResolvedType<'a> {
    Type(&'a TsType),
    Interface(&'a TsInterfaceBody),
}

impl<'a> ResolvedType<'a> {
    fn members(&self) -> &'a [TsTypeElement] {
        match self {
            Self::Type(TsType::TsTypeLit(lit)) => &lit.members,
            Self::Type(_) => &[],
            Self::Interface(body) => &body.body,
        }
    }
}

struct Expander<'a> {
    setup: &'a ParsedScript,
    /// Setup scope first, then the module scope.
    scopes: [&'a [ModuleItem]; 2],
    has_props: bool,
    has_emits: bool,
    has_expose: bool,
    props_runtime: Option<&'a Expr>,
    props_type: Option<ResolvedType<'a>>,
    props_defaults: Option<&'a Expr>,
    expose: Option<&'a Expr>,
}

/// Expand the macros of `setup`. Type references resolve against the
/// setup scope first and then against `script`.
pub fn expand<'a>(setup: &'a ParsedScript, script: &'a ParsedScript) -> Result<MacroResult<'a>, MacroError> {
    let mut expander = Expander {
        setup,
        scopes: [setup.items(), script.items()],
        has_props: false,
        has_emits: false,
        has_expose: false,
        props_runtime: None,
        props_type: None,
        props_defaults: None,
        expose: None,
    };

    let mut items = Vec::with_capacity(setup.items().len());
    for item in setup.items() {
        if let Some(expanded) = expander.item(item)? {
            items.push(expanded);
        }
    }

    let props = expander.props();
    tracing::debug!(
        items = items.len(),
        props = props.is_some(),
        expose = expander.expose.is_some(),
        "expanded setup macros"
    );

    Ok(MacroResult {
        items,
        props,
        expose: expander.expose,
    })
}

impl<'a> Expander<'a> {
    fn error(&self, message: impl Into<String>, span: swc_common::Span, code: MacroErrorCode) -> MacroError {
        MacroError::new(message, self.setup.document_span(span), code)
    }

    fn item(&mut self, item: &'a ModuleItem) -> Result<Option<ExpandedItem<'a>>, MacroError> {
        let mut replacements = Vec::new();

        match item {
            ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) if !var.declare => {
                for decl in &var.decls {
                    let Some(init) = decl.init.as_deref() else {
                        continue;
                    };
                    if self.define_emits(init)? {
                        replacements.push(Replacement {
                            span: init.span(),
                            text: format!("{}.emit", CONTEXT_PARAM),
                        });
                    } else if self.define_props(init)? || self.with_defaults(init)? {
                        replacements.push(Replacement {
                            span: init.span(),
                            text: PROPS_PARAM.to_string(),
                        });
                    } else {
                        self.reject_await(init)?;
                    }
                }
            }
            ModuleItem::Stmt(Stmt::Expr(stmt)) => {
                let expr = &*stmt.expr;
                if self.define_emits(expr)?
                    || self.define_props(expr)?
                    || self.define_expose(expr)?
                    || self.with_defaults(expr)?
                {
                    return Ok(None);
                }
                self.reject_await(expr)?;
            }
            _ => {}
        }

        Ok(Some(ExpandedItem { item, replacements }))
    }

    fn reject_await(&self, expr: &Expr) -> Result<(), MacroError> {
        if let Expr::Await(await_expr) = expr {
            return Err(self.error(
                "top-level await is not supported in Vue 2",
                await_expr.span,
                MacroErrorCode::TopLevelAwait,
            ));
        }
        Ok(())
    }

    fn define_props(&mut self, expr: &'a Expr) -> Result<bool, MacroError> {
        let Some(call) = call_of(expr, DEFINE_PROPS) else {
            return Ok(false);
        };
        if self.has_props {
            return Err(MacroError::duplicate(DEFINE_PROPS, self.setup.document_span(call.span)));
        }
        self.has_props = true;
        self.props_runtime = first_arg(call);

        if let Some(type_arg) = type_arg(call) {
            if self.props_runtime.is_some() {
                return Err(MacroError::mixed_arguments(
                    DEFINE_PROPS,
                    self.setup.document_span(call.span),
                ));
            }
            let resolved = self.resolve(type_arg, |ty| matches!(ty, TsType::TsTypeLit(_)));
            if resolved.is_none() {
                return Err(self.error(
                    format!(
                        "type argument passed to {}() must be a literal type, or a reference to an interface or literal type.",
                        DEFINE_PROPS
                    ),
                    type_arg.span(),
                    MacroErrorCode::UnresolvableType,
                ));
            }
            self.props_type = resolved;
        }
        Ok(true)
    }

    fn with_defaults(&mut self, expr: &'a Expr) -> Result<bool, MacroError> {
        let Some(call) = call_of(expr, WITH_DEFAULTS) else {
            return Ok(false);
        };
        let inner = call.args.first().map(|arg| &*arg.expr);
        match inner {
            Some(inner) if self.define_props(inner)? => {
                if self.props_runtime.is_some() {
                    return Err(self.error(
                        format!(
                            "{} can only be used with type-based {} declaration.",
                            WITH_DEFAULTS, DEFINE_PROPS
                        ),
                        call.span,
                        MacroErrorCode::InvalidWithDefaults,
                    ));
                }
                self.props_defaults = call.args.get(1).map(|arg| &*arg.expr);
            }
            _ => {
                let span = inner.map(Spanned::span).unwrap_or(call.span);
                return Err(self.error(
                    format!("{}' first argument must be a {} call.", WITH_DEFAULTS, DEFINE_PROPS),
                    span,
                    MacroErrorCode::InvalidWithDefaults,
                ));
            }
        }
        Ok(true)
    }

    fn define_emits(&mut self, expr: &'a Expr) -> Result<bool, MacroError> {
        let Some(call) = call_of(expr, DEFINE_EMITS) else {
            return Ok(false);
        };
        if self.has_emits {
            return Err(MacroError::duplicate(DEFINE_EMITS, self.setup.document_span(call.span)));
        }
        self.has_emits = true;

        if let Some(type_arg) = type_arg(call) {
            if first_arg(call).is_some() {
                return Err(MacroError::mixed_arguments(
                    DEFINE_EMITS,
                    self.setup.document_span(call.span),
                ));
            }
            let qualifies = |ty: &TsType| {
                matches!(
                    ty,
                    TsType::TsTypeLit(_) | TsType::TsFnOrConstructorType(TsFnOrConstructorType::TsFnType(_))
                )
            };
            if self.resolve(type_arg, qualifies).is_none() {
                return Err(self.error(
                    format!(
                        "type argument passed to {}() must be a function type, a literal type with call signatures, or a reference to the above types.",
                        DEFINE_EMITS
                    ),
                    type_arg.span(),
                    MacroErrorCode::UnresolvableType,
                ));
            }
        }
        Ok(true)
    }

    fn define_expose(&mut self, expr: &'a Expr) -> Result<bool, MacroError> {
        let Some(call) = call_of(expr, DEFINE_EXPOSE) else {
            return Ok(false);
        };
        if self.has_expose {
            return Err(MacroError::duplicate(DEFINE_EXPOSE, self.setup.document_span(call.span)));
        }
        self.has_expose = true;
        self.expose = first_arg(call);
        Ok(true)
    }

    /// Resolve a type argument to a qualifying type, following a plain
    /// reference to a local interface or type alias.
    fn resolve(&self, ty: &'a TsType, qualifies: impl Fn(&TsType) -> bool) -> Option<ResolvedType<'a>> {
        if qualifies(ty) {
            return Some(ResolvedType::Type(ty));
        }
        let TsType::TsTypeRef(TsTypeRef {
            type_name: TsEntityName::Ident(name),
            ..
        }) = ty
        else {
            return None;
        };

        self.scopes
            .iter()
            .flat_map(|items| items.iter())
            .find_map(|item| {
                let decl = match item {
                    ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
                    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &export.decl,
                    _ => return None,
                };
                match decl {
                    Decl::TsInterface(interface) if interface.id.sym == name.sym => {
                        Some(ResolvedType::Interface(&interface.body))
                    }
                    Decl::TsTypeAlias(alias) if alias.id.sym == name.sym && qualifies(&alias.type_ann) => {
                        Some(ResolvedType::Type(&alias.type_ann))
                    }
                    _ => None,
                }
            })
    }

    fn props(&self) -> Option<PropsDefinition<'a>> {
        if let Some(runtime) = self.props_runtime {
            return Some(PropsDefinition::Runtime(runtime));
        }
        let members = self.props_type.as_ref()?.members();
        let declared = declared_types(&self.scopes);
        let mut entries = infer_props(members, &declared);
        if entries.is_empty() {
            return None;
        }

        if let Some(defaults) = self.props_defaults.and_then(static_defaults) {
            for entry in &mut entries {
                if let Some((_, value)) = defaults.iter().find(|(key, _)| *key == entry.key) {
                    entry.required = false;
                    entry.default = Some(value);
                }
            }
        }
        Some(PropsDefinition::Schema(entries))
    }
}

/// Key/value pairs of a `withDefaults` object whose properties are all
/// plain non-computed `key: value` entries.
fn static_defaults(expr: &Expr) -> Option<Vec<(String, &Expr)>> {
    let Expr::Object(object) = expr else {
        return None;
    };
    object
        .props
        .iter()
        .map(|prop| {
            let PropOrSpread::Prop(prop) = prop else {
                return None;
            };
            let Prop::KeyValue(kv) = &**prop else {
                return None;
            };
            let key = match &kv.key {
                PropName::Ident(ident) => ident.sym.to_string(),
                PropName::Str(s) => {
                    let raw = s.raw.as_deref()?;
                    raw.get(1..raw.len().saturating_sub(1))?.to_string()
                }
                _ => return None,
            };
            Some((key, &*kv.value))
        })
        .collect()
}

fn call_of<'e>(expr: &'e Expr, name: &str) -> Option<&'e CallExpr> {
    let Expr::Call(call) = expr else {
        return None;
    };
    match &call.callee {
        Callee::Expr(callee) => match &**callee {
            Expr::Ident(ident) if &*ident.sym == name => Some(call),
            _ => None,
        },
        _ => None,
    }
}

fn first_arg(call: &CallExpr) -> Option<&Expr> {
    call.args.first().map(|arg| &*arg.expr)
}

fn type_arg(call: &CallExpr) -> Option<&TsType> {
    call.type_args
        .as_ref()
        .and_then(|args| args.params.first())
        .map(|ty| &**ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_parser::script::parse_script;
    use sfc_parser::ScriptLang;
    use swc_common::sync::Lrc;

    fn scripts(setup: &str, script: &str) -> (ParsedScript, ParsedScript) {
        let cm: Lrc<swc_common::SourceMap> = Default::default();
        (
            parse_script(&cm, "setup.ts", setup, 0, ScriptLang::Ts).unwrap(),
            parse_script(&cm, "script.ts", script, 0, ScriptLang::Ts).unwrap(),
        )
    }

    fn schema<'a>(result: &MacroResult<'a>) -> Vec<(String, bool, String)> {
        match &result.props {
            Some(PropsDefinition::Schema(entries)) => entries
                .iter()
                .map(|e| (e.key.clone(), e.required, e.type_code()))
                .collect(),
            other => panic!("expected a schema, got {:?}", other.is_some()),
        }
    }

    fn replaced(setup: &ParsedScript, result: &MacroResult) -> Vec<(String, String)> {
        result
            .items
            .iter()
            .flat_map(|item| item.replacements.iter())
            .map(|r| (setup.text(r.span).to_string(), r.text.clone()))
            .collect()
    }

    #[test]
    fn test_type_based_props() {
        let (setup, script) = scripts("const props = defineProps<{ msg: string; n?: number }>()", "");
        let result = expand(&setup, &script).unwrap();
        assert_eq!(
            schema(&result),
            vec![
                ("msg".to_string(), true, "String".to_string()),
                ("n".to_string(), false, "Number".to_string()),
            ]
        );
        assert_eq!(
            replaced(&setup, &result),
            vec![(
                "defineProps<{ msg: string; n?: number }>()".to_string(),
                "__props".to_string()
            )]
        );
    }

    #[test]
    fn test_runtime_props_pass_through() {
        let (setup, script) = scripts("defineProps({ a: String })\nconst x = 1", "");
        let result = expand(&setup, &script).unwrap();
        assert_eq!(result.items.len(), 1);
        let Some(PropsDefinition::Runtime(expr)) = result.props else {
            panic!("expected runtime props");
        };
        assert_eq!(setup.text(expr.span()), "{ a: String }");
    }

    #[test]
    fn test_emits_and_expose() {
        let (setup, script) = scripts(
            "const emit = defineEmits<{ (e: 'change'): void }>()\ndefineExpose({ focus })",
            "",
        );
        let result = expand(&setup, &script).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(replaced(&setup, &result)[0].1, "__ctx.emit");
        assert_eq!(setup.text(result.expose.unwrap().span()), "{ focus }");
        assert!(result.props.is_none());
    }

    #[test]
    fn test_interface_reference_in_module_scope() {
        let (setup, script) = scripts(
            "const props = defineProps<Props>()",
            "export interface Props { title: string; size?: 'sm' | 'lg'; onClick(): void }",
        );
        let result = expand(&setup, &script).unwrap();
        assert_eq!(
            schema(&result),
            vec![
                ("title".to_string(), true, "String".to_string()),
                ("size".to_string(), false, "String".to_string()),
                ("onClick".to_string(), true, "Function".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_defaults() {
        let (setup, script) = scripts(
            "type Props = { msg?: string; labels?: string[] }\nconst props = withDefaults(defineProps<Props>(), { msg: 'hello', labels: () => ['one'] })",
            "",
        );
        let result = expand(&setup, &script).unwrap();
        let Some(PropsDefinition::Schema(entries)) = &result.props else {
            panic!("expected a schema");
        };
        assert!(!entries[0].required);
        assert_eq!(setup.text(entries[0].default.unwrap().span()), "'hello'");
        assert_eq!(setup.text(entries[1].default.unwrap().span()), "() => ['one']");
        assert_eq!(replaced(&setup, &result)[0].1, "__props");
    }

    #[test]
    fn test_duplicate_props_rejected() {
        let (setup, script) = scripts("defineProps(['a'])\ndefineProps<{ b: string }>()", "");
        let err = expand(&setup, &script).unwrap_err();
        assert_eq!(err.code, MacroErrorCode::DuplicateMacro);
        assert_eq!(err.message, "duplicate defineProps() call");
    }

    #[test]
    fn test_mixed_arguments_rejected() {
        let (setup, script) = scripts("defineEmits<{ (e: 'x'): void }>(['x'])", "");
        let err = expand(&setup, &script).unwrap_err();
        assert_eq!(err.code, MacroErrorCode::MixedArguments);
    }

    #[test]
    fn test_with_defaults_requires_type_based_props() {
        let (setup, script) = scripts("const p = withDefaults(defineProps({ a: String }), {})", "");
        assert_eq!(
            expand(&setup, &script).unwrap_err().code,
            MacroErrorCode::InvalidWithDefaults
        );

        let (setup, script) = scripts("const p = withDefaults(foo(), {})", "");
        let err = expand(&setup, &script).unwrap_err();
        assert_eq!(err.code, MacroErrorCode::InvalidWithDefaults);
        assert_eq!(err.span, source_map::Span::new(23, 28));
    }

    #[test]
    fn test_unresolvable_type() {
        let (setup, script) = scripts("defineProps<Missing>()", "");
        assert_eq!(
            expand(&setup, &script).unwrap_err().code,
            MacroErrorCode::UnresolvableType
        );

        let (setup, script) = scripts("type P = string\ndefineProps<P>()", "");
        assert_eq!(
            expand(&setup, &script).unwrap_err().code,
            MacroErrorCode::UnresolvableType
        );
    }

    #[test]
    fn test_top_level_await_rejected() {
        let (setup, script) = scripts("const data = await load()", "");
        assert_eq!(
            expand(&setup, &script).unwrap_err().code,
            MacroErrorCode::TopLevelAwait
        );

        let (setup, script) = scripts("await load()", "");
        assert_eq!(
            expand(&setup, &script).unwrap_err().code,
            MacroErrorCode::TopLevelAwait
        );
    }

    #[test]
    fn test_declare_is_left_alone() {
        let (setup, script) = scripts("declare const props: any\nconst a = 1", "");
        let result = expand(&setup, &script).unwrap();
        assert_eq!(result.items.len(), 2);
        assert!(replaced(&setup, &result).is_empty());
    }
}
