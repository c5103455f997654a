//! Sigil triggers and the auto-wrap rule.

use swc_common::{Span, Spanned};
use swc_ecma_ast::*;

use crate::classify::ExplicitRefs;
use crate::edit::Emitter;

/// `$$(x)`: the argument already denotes the wrapped reference.
pub fn is_explicit_wrap(callee: &str) -> bool {
    callee == "$$"
}

/// Prefix trigger: `$ref(0)`, `$computed(fn)`, a bare `$(x)`.
///
/// `$$` and names on the ignore list (`$defineProps`) are left alone.
pub fn is_unwrap_call(callee: &str, ignore: &[String]) -> bool {
    let Some(rest) = callee.strip_prefix(rfx_ast::SIGIL) else {
        return false;
    };
    rest != "$" && !ignore.iter().any(|name| name == rest)
}

/// Suffix trigger: `watch$(count)` passes its arguments as references.
pub fn is_auto_wrap_call(callee: &str) -> bool {
    callee.ends_with(rfx_ast::SIGIL) && !is_explicit_wrap(callee)
}

/// Declared functions and variables whose name ends in the sigil.
pub fn is_sigil_name(name: &str) -> bool {
    name.len() > 1 && name.ends_with(rfx_ast::SIGIL)
}

/// `title$={title}`. A name with exactly two sigils is left as written.
pub fn is_sigil_attribute(name: &str) -> bool {
    is_sigil_name(name) && name.matches(rfx_ast::SIGIL).count() != 2
}

pub(crate) fn is_explicit_wrap_call(call: &CallExpr) -> bool {
    match &call.callee {
        Callee::Expr(callee) => {
            matches!(&**callee, Expr::Ident(ident) if is_explicit_wrap(&ident.sym))
        }
        _ => false,
    }
}

/// Inserts `wrap_fn(` ... `)` around reference-denoting expressions and
/// marks each wrapped span as an explicit reference.
pub(crate) struct AutoWrap<'a> {
    pub emitter: &'a mut Emitter,
    pub explicit: &'a mut ExplicitRefs,
    pub wrap_fn: &'a str,
}

impl AutoWrap<'_> {
    pub fn wrap_argument(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(_) | Expr::Member(_) | Expr::OptChain(_) | Expr::TsInstantiation(_) => {
                self.wrap(expr.span())
            }
            Expr::Call(call) => {
                if !is_explicit_wrap_call(call) {
                    self.wrap(call.span)
                }
            }
            Expr::Paren(paren) => self.wrap_argument(&paren.expr),
            Expr::TsAs(e) => self.wrap_argument(&e.expr),
            Expr::TsSatisfies(e) => self.wrap_argument(&e.expr),
            Expr::TsNonNull(e) => self.wrap_argument(&e.expr),
            Expr::TsConstAssertion(e) => self.wrap_argument(&e.expr),
            Expr::TsTypeAssertion(e) => self.wrap_argument(&e.expr),
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    if elem.spread.is_none() {
                        self.wrap_argument(&elem.expr);
                    }
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    let PropOrSpread::Prop(prop) = prop else {
                        continue;
                    };
                    match &**prop {
                        Prop::KeyValue(kv) => self.wrap_argument(&kv.value),
                        Prop::Shorthand(ident) => self.wrap_shorthand(ident),
                        _ => {}
                    }
                }
            }
            Expr::Fn(f) => {
                if let Some(body) = &f.function.body {
                    self.wrap_returns(body);
                }
            }
            Expr::Arrow(arrow) => self.wrap_arrow_body(arrow),
            _ => {}
        }
    }

    /// Wraps the argument of each `return` directly in the function body.
    pub fn wrap_returns(&mut self, body: &BlockStmt) {
        for stmt in &body.stmts {
            if let Stmt::Return(ReturnStmt { arg: Some(arg), .. }) = stmt {
                self.wrap_argument(arg);
            }
        }
    }

    pub fn wrap_arrow_body(&mut self, arrow: &ArrowExpr) {
        match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(body) => self.wrap_returns(body),
            BlockStmtOrExpr::Expr(expr) => self.wrap_argument(expr),
        }
    }

    fn wrap(&mut self, span: Span) {
        self.emitter
            .insert_before(span.lo, format!("{}(", self.wrap_fn));
        self.emitter.insert_after(span.hi, ")");
        self.explicit.insert(span);
    }

    fn wrap_shorthand(&mut self, ident: &Ident) {
        self.emitter
            .insert_before(ident.span.lo, format!("{}: {}(", ident.sym, self.wrap_fn));
        self.emitter.insert_after(ident.span.hi, ")");
        self.explicit.insert(ident.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignore() -> Vec<String> {
        vec!["defineProps".to_string(), "defineEmits".to_string()]
    }

    #[test]
    fn prefix_trigger() {
        assert!(is_unwrap_call("$ref", &ignore()));
        assert!(is_unwrap_call("$", &ignore()));
        assert!(is_unwrap_call("$$foo", &ignore()));
        assert!(!is_unwrap_call("$$", &ignore()));
        assert!(!is_unwrap_call("$defineProps", &ignore()));
        assert!(!is_unwrap_call("ref", &ignore()));
        assert!(!is_unwrap_call("x$", &ignore()));
    }

    #[test]
    fn suffix_trigger() {
        assert!(is_auto_wrap_call("watch$"));
        assert!(is_auto_wrap_call("$"));
        assert!(is_auto_wrap_call("store.use$"));
        assert!(!is_auto_wrap_call("$$"));
        assert!(!is_auto_wrap_call("watch"));
    }

    #[test]
    fn sigil_attributes() {
        assert!(is_sigil_attribute("title$"));
        assert!(is_sigil_attribute("$a$$"));
        assert!(!is_sigil_attribute("$title$"));
        assert!(!is_sigil_attribute("title"));
        assert!(!is_sigil_attribute("$"));
    }
}
