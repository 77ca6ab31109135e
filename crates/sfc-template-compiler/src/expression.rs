//! Template expression rewriting.
//!
//! Render functions run with the component instance bound to `_vm`, so
//! every free identifier in a template expression is read through it.
//! Names bound by `v-for`, slot props, handler parameters and the known
//! globals are left alone.

use indexmap::IndexSet;
use sfc_parser::identifiers::pat_names;
use source_map::{SourceMap, SourceMapping};
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap as SwcSourceMap};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

/// Globals templates may reference directly.
const ALLOWED_GLOBALS: &[&str] = &[
    "Infinity",
    "undefined",
    "NaN",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "Math",
    "Number",
    "Date",
    "Array",
    "Object",
    "Boolean",
    "String",
    "RegExp",
    "Map",
    "Set",
    "JSON",
    "Intl",
    "BigInt",
    "require",
    "arguments",
];

pub fn is_allowed_global(name: &str) -> bool {
    ALLOWED_GLOBALS.contains(&name)
}

/// Rewritten code. Mapping source offsets are relative to the input text.
#[derive(Debug, Clone, Default)]
pub struct Rewritten {
    pub code: String,
    pub map: SourceMap,
}

/// Rewrite a single expression.
pub fn rewrite_expression(source: &str, is_local: &dyn Fn(&str) -> bool) -> Result<Rewritten, String> {
    let (expr, base) = parse_expr(source)?;
    let mut prefixer = Prefixer::new(base, is_local);
    prefixer.expr(&expr);
    Ok(apply(source, prefixer.edits))
}

/// Rewrite a statement list, as used by inline event handlers.
pub fn rewrite_statements(source: &str, is_local: &dyn Fn(&str) -> bool) -> Result<Rewritten, String> {
    let (items, base) = parse_module_items(source)?;
    let mut prefixer = Prefixer::new(base, is_local);
    prefixer.scopes.push(IndexSet::new());
    for item in &items {
        if let ModuleItem::Stmt(stmt) = item {
            prefixer.stmt(stmt);
        }
    }
    Ok(apply(source, prefixer.edits))
}

/// Names bound by each entry of a parameter list such as `item, index`
/// or `{ row }`. `None` if the text is not a valid parameter list.
pub fn parameter_bindings(params: &str) -> Option<Vec<IndexSet<String>>> {
    let (expr, _) = parse_expr(&format!("({}) => 0", params)).ok()?;
    match *expr {
        Expr::Arrow(arrow) => Some(
            arrow
                .params
                .iter()
                .map(|pat| pat_names(pat, IndexSet::new()))
                .collect(),
        ),
        _ => None,
    }
}

fn parser_for(source: String) -> (Lrc<SwcSourceMap>, Lrc<swc_common::SourceFile>) {
    let cm: Lrc<SwcSourceMap> = Default::default();
    let file = cm.new_source_file(FileName::Anon.into(), source);
    (cm, file)
}

fn parse_expr(source: &str) -> Result<(Box<Expr>, u32), String> {
    let (_cm, file) = parser_for(format!("({})", source));
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        StringInput::from(&*file),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let expr = parser
        .parse_expr()
        .map_err(|err| err.kind().msg().to_string())?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(err.kind().msg().to_string());
    }
    Ok((expr, file.start_pos.0 + 1))
}

fn parse_module_items(source: &str) -> Result<(Vec<ModuleItem>, u32), String> {
    let (_cm, file) = parser_for(source.to_owned());
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        StringInput::from(&*file),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let module = parser
        .parse_module()
        .map_err(|err| err.kind().msg().to_string())?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(err.kind().msg().to_string());
    }
    Ok((module.body, file.start_pos.0))
}

/// Insert `text` at `at`, replacing `remove` bytes.
#[derive(Debug)]
struct Edit {
    at: u32,
    remove: u32,
    text: String,
}

struct Prefixer<'a> {
    base: u32,
    is_local: &'a dyn Fn(&str) -> bool,
    scopes: Vec<IndexSet<String>>,
    edits: Vec<Edit>,
}

impl<'a> Prefixer<'a> {
    fn new(base: u32, is_local: &'a dyn Fn(&str) -> bool) -> Self {
        Self {
            base,
            is_local,
            scopes: Vec::new(),
            edits: Vec::new(),
        }
    }

    fn offset(&self, pos: swc_common::BytePos) -> u32 {
        pos.0.saturating_sub(self.base)
    }

    fn is_free(&self, name: &str) -> bool {
        !self.scopes.iter().any(|scope| scope.contains(name))
            && !(self.is_local)(name)
            && !is_allowed_global(name)
    }

    fn ident(&mut self, ident: &Ident) {
        if self.is_free(&ident.sym) {
            self.edits.push(Edit {
                at: self.offset(ident.span.lo),
                remove: 0,
                text: "_vm.".into(),
            });
        }
    }

    fn with_params<F: FnOnce(&mut Self)>(&mut self, params: &[&Pat], body: F) {
        let names = params
            .iter()
            .fold(IndexSet::new(), |names, pat| pat_names(pat, names));
        self.scopes.push(names);
        body(self);
        self.scopes.pop();
    }

    fn function(&mut self, function: &Function, name: Option<&Ident>) {
        let params: Vec<&Pat> = function.params.iter().map(|p| &p.pat).collect();
        let own_name = name.map(|ident| ident.sym.to_string());
        self.with_params(&params, |this| {
            if let (Some(name), Some(scope)) = (own_name, this.scopes.last_mut()) {
                scope.insert(name);
            }
            if let Some(body) = &function.body {
                this.block(body);
            }
        });
    }

    fn block(&mut self, block: &BlockStmt) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.block(block),
            Stmt::Expr(s) => self.expr(&s.expr),
            Stmt::Return(s) => {
                if let Some(arg) = &s.arg {
                    self.expr(arg);
                }
            }
            Stmt::If(s) => {
                self.expr(&s.test);
                self.stmt(&s.cons);
                if let Some(alt) = &s.alt {
                    self.stmt(alt);
                }
            }
            Stmt::Throw(s) => self.expr(&s.arg),
            Stmt::Decl(Decl::Var(var)) => {
                for decl in &var.decls {
                    if let Some(init) = &decl.init {
                        self.expr(init);
                    }
                    let declared = pat_names(&decl.name, IndexSet::new());
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.extend(declared);
                    }
                }
            }
            Stmt::Decl(Decl::Fn(f)) => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(f.ident.sym.to_string());
                }
                self.function(&f.function, None);
            }
            _ => {}
        }
    }

    fn args(&mut self, args: &[ExprOrSpread]) {
        for arg in args {
            self.expr(&arg.expr);
        }
    }

    fn member(&mut self, member: &MemberExpr) {
        self.expr(&member.obj);
        if let MemberProp::Computed(computed) = &member.prop {
            self.expr(&computed.expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.ident(ident),
            Expr::This(this) => self.edits.push(Edit {
                at: self.offset(this.span.lo),
                remove: 4,
                text: "_vm".into(),
            }),
            Expr::Member(member) => self.member(member),
            Expr::Call(call) => {
                if let Callee::Expr(callee) = &call.callee {
                    self.expr(callee);
                }
                self.args(&call.args);
            }
            Expr::New(new) => {
                self.expr(&new.callee);
                if let Some(args) = &new.args {
                    self.args(args);
                }
            }
            Expr::Bin(bin) => {
                self.expr(&bin.left);
                self.expr(&bin.right);
            }
            Expr::Unary(unary) => self.expr(&unary.arg),
            Expr::Update(update) => self.expr(&update.arg),
            Expr::Await(await_expr) => self.expr(&await_expr.arg),
            Expr::Cond(cond) => {
                self.expr(&cond.test);
                self.expr(&cond.cons);
                self.expr(&cond.alt);
            }
            Expr::Assign(assign) => {
                match &assign.left {
                    AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                        self.ident(&binding.id)
                    }
                    AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                        self.member(member)
                    }
                    _ => {}
                }
                self.expr(&assign.right);
            }
            Expr::Seq(seq) => {
                for e in &seq.exprs {
                    self.expr(e);
                }
            }
            Expr::Paren(paren) => self.expr(&paren.expr),
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Spread(spread) => self.expr(&spread.expr),
                        PropOrSpread::Prop(prop) => self.prop(prop),
                    }
                }
            }
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.expr(&elem.expr);
                }
            }
            Expr::Tpl(tpl) => {
                for e in &tpl.exprs {
                    self.expr(e);
                }
            }
            Expr::TaggedTpl(tagged) => {
                self.expr(&tagged.tag);
                for e in &tagged.tpl.exprs {
                    self.expr(e);
                }
            }
            Expr::Arrow(arrow) => {
                let params: Vec<&Pat> = arrow.params.iter().collect();
                self.with_params(&params, |this| match &*arrow.body {
                    BlockStmtOrExpr::BlockStmt(block) => this.block(block),
                    BlockStmtOrExpr::Expr(body) => this.expr(body),
                });
            }
            Expr::Fn(f) => self.function(&f.function, f.ident.as_ref()),
            Expr::OptChain(chain) => match &*chain.base {
                OptChainBase::Member(member) => self.member(member),
                OptChainBase::Call(call) => {
                    self.expr(&call.callee);
                    self.args(&call.args);
                }
            },
            _ => {}
        }
    }

    fn prop(&mut self, prop: &Prop) {
        match prop {
            Prop::Shorthand(ident) => {
                if self.is_free(&ident.sym) {
                    self.edits.push(Edit {
                        at: self.offset(ident.span.lo),
                        remove: 0,
                        text: format!("{}: _vm.", ident.sym),
                    });
                }
            }
            Prop::KeyValue(kv) => {
                if let PropName::Computed(computed) = &kv.key {
                    self.expr(&computed.expr);
                }
                self.expr(&kv.value);
            }
            Prop::Method(method) => self.function(&method.function, None),
            _ => {}
        }
    }
}

/// Apply edits to `source`, mapping every untouched run back to itself.
fn apply(source: &str, mut edits: Vec<Edit>) -> Rewritten {
    edits.sort_by_key(|edit| edit.at);

    let mut out = Rewritten::default();
    let mut cursor = 0u32;
    for edit in edits {
        if edit.at < cursor {
            continue;
        }
        copy(&mut out, source, cursor, edit.at);
        let generated = out.code.len() as u32;
        out.code.push_str(&edit.text);
        if edit.remove > 0 {
            out.map.add_mapping(SourceMapping::new_with_lengths(
                generated,
                edit.text.len() as u32,
                edit.at,
                edit.remove,
            ));
        }
        cursor = edit.at + edit.remove;
    }
    copy(&mut out, source, cursor, source.len() as u32);
    out
}

fn copy(out: &mut Rewritten, source: &str, start: u32, end: u32) {
    let Some(chunk) = source.get(start as usize..end as usize) else {
        return;
    };
    if chunk.is_empty() {
        return;
    }
    out.map.add(out.code.len() as u32, start, chunk.len() as u32);
    out.code.push_str(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_locals(_: &str) -> bool {
        false
    }

    fn rewrite(source: &str) -> String {
        rewrite_expression(source, &no_locals).unwrap().code
    }

    #[test]
    fn test_prefixes_free_identifiers() {
        assert_eq!(rewrite("count + 1"), "_vm.count + 1");
        assert_eq!(rewrite("a.b[c]"), "_vm.a.b[_vm.c]");
        assert_eq!(rewrite("fn(x, 'y')"), "_vm.fn(_vm.x, 'y')");
        assert_eq!(rewrite("this.msg"), "_vm.msg");
    }

    #[test]
    fn test_keeps_globals_and_locals() {
        assert_eq!(rewrite("Math.max(a, 1)"), "Math.max(_vm.a, 1)");
        let is_local = |name: &str| name == "item";
        let out = rewrite_expression("item.id + offset", &is_local).unwrap();
        assert_eq!(out.code, "item.id + _vm.offset");
    }

    #[test]
    fn test_arrow_params_are_scoped() {
        assert_eq!(rewrite("list.map(x => x * k)"), "_vm.list.map(x => x * _vm.k)");
    }

    #[test]
    fn test_object_shorthand_expands() {
        assert_eq!(rewrite("{ active, 'x': y }"), "{ active: _vm.active, 'x': _vm.y }");
    }

    #[test]
    fn test_statements() {
        let out = rewrite_statements("count++; emit('done', $event)", &|n: &str| n == "$event").unwrap();
        assert_eq!(out.code, "_vm.count++; _vm.emit('done', $event)");
    }

    #[test]
    fn test_invalid_expression() {
        assert!(rewrite_expression("a +", &no_locals).is_err());
    }

    #[test]
    fn test_mappings_point_into_source() {
        let out = rewrite_expression("a + b", &no_locals).unwrap();
        assert_eq!(out.code, "_vm.a + _vm.b");
        assert_eq!(out.map.to_source_offset(4), Some(0));
        assert_eq!(out.map.to_source_offset(12), Some(4));
        assert_eq!(out.map.to_source_offset(0), None);
    }

    #[test]
    fn test_parameter_bindings() {
        let params = parameter_bindings("{ id, name }, index").unwrap();
        assert_eq!(params.len(), 2);
        assert!(params[0].contains("id") && params[0].contains("name"));
        assert!(params[1].contains("index"));
        assert!(parameter_bindings("a +").is_none());
    }
}
