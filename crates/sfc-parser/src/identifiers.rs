//! Identifier analysis over script syntax trees.
//!
//! `declarations` answers "what does the setup scope bind at its top level",
//! `*_usages` answers "which bare identifiers does this code dereference".
//! Both return fresh sets; the usage walkers thread their accumulator by
//! value through the recursion.

use indexmap::IndexSet;
use swc_ecma_ast::*;

/// Every name bound at the top level of `items`. Nested blocks are not
/// entered; `export` wrappers are unwrapped.
pub fn declarations(items: &[ModuleItem]) -> IndexSet<String> {
    items.iter().fold(IndexSet::new(), |mut names, item| {
        match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                names.extend(import.specifiers.iter().map(|s| match s {
                    ImportSpecifier::Named(named) => named.local.sym.to_string(),
                    ImportSpecifier::Default(default) => default.local.sym.to_string(),
                    ImportSpecifier::Namespace(ns) => ns.local.sym.to_string(),
                }));
            }
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => {
                names = decl_names(&export.decl, names);
            }
            ModuleItem::Stmt(Stmt::Decl(decl)) => {
                names = decl_names(decl, names);
            }
            _ => {}
        }
        names
    })
}

fn decl_names(decl: &Decl, mut names: IndexSet<String>) -> IndexSet<String> {
    match decl {
        Decl::Var(var) => var
            .decls
            .iter()
            .fold(names, |names, declarator| pat_names(&declarator.name, names)),
        Decl::Fn(f) => {
            names.insert(f.ident.sym.to_string());
            names
        }
        Decl::Class(c) => {
            names.insert(c.ident.sym.to_string());
            names
        }
        Decl::TsEnum(e) => {
            names.insert(e.id.sym.to_string());
            names
        }
        _ => names,
    }
}

/// Names bound by a binding pattern, including nested destructuring,
/// defaults and rest elements.
pub fn pat_names(pat: &Pat, mut names: IndexSet<String>) -> IndexSet<String> {
    match pat {
        Pat::Ident(binding) => {
            names.insert(binding.id.sym.to_string());
            names
        }
        Pat::Array(array) => array
            .elems
            .iter()
            .flatten()
            .fold(names, |names, elem| pat_names(elem, names)),
        Pat::Object(object) => object.props.iter().fold(names, |mut names, prop| match prop {
            ObjectPatProp::KeyValue(kv) => pat_names(&kv.value, names),
            ObjectPatProp::Assign(assign) => {
                names.insert(assign.key.id.sym.to_string());
                names
            }
            ObjectPatProp::Rest(rest) => pat_names(&rest.arg, names),
        }),
        Pat::Rest(rest) => pat_names(&rest.arg, names),
        Pat::Assign(assign) => pat_names(&assign.left, names),
        _ => names,
    }
}

/// Identifiers used by a module item.
pub fn item_usages(item: &ModuleItem, acc: IndexSet<String>) -> IndexSet<String> {
    match item {
        ModuleItem::Stmt(stmt) => stmt_usages(stmt, acc),
        ModuleItem::ModuleDecl(_) => acc,
    }
}

/// Identifiers used by a statement.
pub fn stmt_usages(stmt: &Stmt, acc: IndexSet<String>) -> IndexSet<String> {
    match stmt {
        Stmt::Block(block) => block_usages(block, acc),
        Stmt::Expr(expr) => expr_usages(&expr.expr, acc),
        Stmt::Return(ret) => match &ret.arg {
            Some(arg) => expr_usages(arg, acc),
            None => acc,
        },
        Stmt::If(stmt) => {
            let acc = expr_usages(&stmt.test, acc);
            let acc = stmt_usages(&stmt.cons, acc);
            match &stmt.alt {
                Some(alt) => stmt_usages(alt, acc),
                None => acc,
            }
        }
        Stmt::ForOf(stmt) => expr_usages(&stmt.right, acc),
        Stmt::ForIn(stmt) => expr_usages(&stmt.right, acc),
        Stmt::Throw(stmt) => expr_usages(&stmt.arg, acc),
        Stmt::Decl(Decl::Var(var)) => var
            .decls
            .iter()
            .filter_map(|d| d.init.as_deref())
            .fold(acc, |acc, init| expr_usages(init, acc)),
        Stmt::Decl(Decl::Fn(f)) => function_usages(&f.function, acc),
        _ => acc,
    }
}

fn block_usages(block: &BlockStmt, acc: IndexSet<String>) -> IndexSet<String> {
    block
        .stmts
        .iter()
        .fold(acc, |acc, stmt| stmt_usages(stmt, acc))
}

fn function_usages(function: &Function, acc: IndexSet<String>) -> IndexSet<String> {
    match &function.body {
        Some(body) => block_usages(body, acc),
        None => acc,
    }
}

fn args_usages(args: &[ExprOrSpread], acc: IndexSet<String>) -> IndexSet<String> {
    args.iter().fold(acc, |acc, arg| expr_usages(&arg.expr, acc))
}

/// Identifiers used by an expression.
///
/// Node kinds without identifier content (literals, `this`, JSX, classes)
/// contribute nothing.
pub fn expr_usages(expr: &Expr, mut acc: IndexSet<String>) -> IndexSet<String> {
    match expr {
        Expr::Ident(ident) => {
            acc.insert(ident.sym.to_string());
            acc
        }
        Expr::Member(member) => member_usages(member, acc),
        Expr::Call(call) => {
            let acc = match &call.callee {
                Callee::Expr(callee) => expr_usages(callee, acc),
                Callee::Super(_) | Callee::Import(_) => acc,
            };
            args_usages(&call.args, acc)
        }
        Expr::New(new) => {
            let acc = expr_usages(&new.callee, acc);
            match &new.args {
                Some(args) => args_usages(args, acc),
                None => acc,
            }
        }
        Expr::Bin(bin) => {
            let acc = expr_usages(&bin.left, acc);
            expr_usages(&bin.right, acc)
        }
        Expr::Unary(unary) => expr_usages(&unary.arg, acc),
        Expr::Update(update) => expr_usages(&update.arg, acc),
        Expr::Await(await_expr) => expr_usages(&await_expr.arg, acc),
        Expr::Cond(cond) => {
            let acc = expr_usages(&cond.test, acc);
            let acc = expr_usages(&cond.cons, acc);
            expr_usages(&cond.alt, acc)
        }
        Expr::Assign(assign) => {
            let acc = match &assign.left {
                AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                    acc.insert(binding.id.sym.to_string());
                    acc
                }
                AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                    member_usages(member, acc)
                }
                _ => acc,
            };
            expr_usages(&assign.right, acc)
        }
        Expr::Seq(seq) => seq
            .exprs
            .iter()
            .fold(acc, |acc, expr| expr_usages(expr, acc)),
        Expr::Paren(paren) => expr_usages(&paren.expr, acc),
        Expr::Object(object) => object.props.iter().fold(acc, |mut acc, prop| match prop {
            PropOrSpread::Spread(spread) => expr_usages(&spread.expr, acc),
            PropOrSpread::Prop(prop) => match &**prop {
                Prop::Shorthand(ident) => {
                    acc.insert(ident.sym.to_string());
                    acc
                }
                Prop::KeyValue(kv) => {
                    let acc = match &kv.key {
                        PropName::Computed(computed) => expr_usages(&computed.expr, acc),
                        _ => acc,
                    };
                    expr_usages(&kv.value, acc)
                }
                _ => acc,
            },
        }),
        Expr::Array(array) => array
            .elems
            .iter()
            .flatten()
            .fold(acc, |acc, elem| expr_usages(&elem.expr, acc)),
        Expr::Tpl(tpl) => tpl.exprs.iter().fold(acc, |acc, e| expr_usages(e, acc)),
        Expr::TaggedTpl(tagged) => {
            let acc = expr_usages(&tagged.tag, acc);
            tagged.tpl.exprs.iter().fold(acc, |acc, e| expr_usages(e, acc))
        }
        Expr::Arrow(arrow) => match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => block_usages(block, acc),
            BlockStmtOrExpr::Expr(body) => expr_usages(body, acc),
        },
        Expr::Fn(f) => function_usages(&f.function, acc),
        Expr::OptChain(chain) => match &*chain.base {
            OptChainBase::Member(member) => member_usages(member, acc),
            OptChainBase::Call(call) => {
                let acc = expr_usages(&call.callee, acc);
                args_usages(&call.args, acc)
            }
        },
        Expr::TsAs(e) => expr_usages(&e.expr, acc),
        Expr::TsNonNull(e) => expr_usages(&e.expr, acc),
        Expr::TsSatisfies(e) => expr_usages(&e.expr, acc),
        Expr::TsTypeAssertion(e) => expr_usages(&e.expr, acc),
        Expr::TsConstAssertion(e) => expr_usages(&e.expr, acc),
        Expr::TsInstantiation(e) => expr_usages(&e.expr, acc),
        _ => acc,
    }
}

fn member_usages(member: &MemberExpr, acc: IndexSet<String>) -> IndexSet<String> {
    let acc = expr_usages(&member.obj, acc);
    match &member.prop {
        MemberProp::Computed(computed) => expr_usages(&computed.expr, acc),
        MemberProp::Ident(_) | MemberProp::PrivateName(_) => acc,
    }
}

/// Identifiers dereferenced by a set of raw template expressions.
///
/// Each expression is parsed on its own; statement lists such as
/// `a = 1; b()` in event handlers are accepted as well. Expressions that
/// fail to parse contribute nothing.
pub fn template_usages<'a>(expressions: impl IntoIterator<Item = &'a str>) -> IndexSet<String> {
    expressions
        .into_iter()
        .fold(IndexSet::new(), |acc, source| {
            if let Some(expr) = crate::script::parse_expression(source) {
                return expr_usages(&expr, acc);
            }
            match crate::script::parse_statements(source) {
                Some(items) => items.iter().fold(acc, |acc, item| item_usages(item, acc)),
                None => {
                    tracing::warn!(expression = source, "template expression failed to parse");
                    acc
                }
            }
        })
}
