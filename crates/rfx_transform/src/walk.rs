//! The rewriting walk over one parsed unit.
//!
//! A single pre-order traversal does three things at once:
//! - opens and closes scope frames, declaring ordinary and unwrap bindings
//! - applies the sigil rewrites that are decidable on the spot (prefix and
//!   suffix calls, `$$(...)`, declarators, sigil functions and attributes)
//! - records every identifier reference for the deferred `.value` pass
//!
//! Identifier references also carry the spans of the member/call chain
//! they head, so an explicit `$$(a.b)` can exempt the `a` inside it.

use std::collections::BTreeSet;

use rfx_ast::Options;
use rustc_hash::FxHashSet;
use swc_common::{BytePos, Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};

use crate::classify::{resolve_references, Access, ExplicitRefs, Reference};
use crate::edit::{EditSet, Emitter};
use crate::helpers::{Helper, Session};
use crate::pattern::PatternPlan;
use crate::rewrite::{self, AutoWrap};
use crate::scope::{FrameId, FrameKind, ScopeTracker};

/// A name declared from an unwrap-trigger call.
#[derive(Debug, Clone)]
pub struct UnwrapBinding {
    pub name: String,
    pub frame: FrameId,
    pub span: Span,
}

pub(crate) struct WalkOutput {
    pub edits: EditSet,
    /// Unwrap bindings declared in the root frame, in declaration order.
    pub root_unwraps: Vec<String>,
}

pub(crate) struct Walker<'a> {
    source: &'a str,
    start_pos: BytePos,
    options: &'a Options,
    ignore: &'a [String],
    session: &'a mut Session,
    emitter: Emitter,
    scopes: ScopeTracker,
    explicit: ExplicitRefs,
    references: Vec<Reference>,
    bindings: Vec<UnwrapBinding>,
    helpers: BTreeSet<Helper>,
    /// Calls already settled by their declarator.
    handled_calls: FxHashSet<(BytePos, BytePos)>,
    /// Chain links above the expression about to be visited, outermost first.
    chain: Vec<Span>,
    exempt_depth: usize,
}

impl<'a> Walker<'a> {
    /// `source` is the text of the unit, `start_pos` the span position of
    /// its first byte and `base` its byte offset in the document.
    pub fn new(
        source: &'a str,
        start_pos: BytePos,
        base: usize,
        root: FrameKind,
        options: &'a Options,
        ignore: &'a [String],
        session: &'a mut Session,
    ) -> Self {
        Self {
            source,
            start_pos,
            options,
            ignore,
            session,
            emitter: Emitter::new(base, start_pos),
            scopes: ScopeTracker::new(root),
            explicit: ExplicitRefs::default(),
            references: Vec::new(),
            bindings: Vec::new(),
            helpers: BTreeSet::new(),
            handled_calls: FxHashSet::default(),
            chain: Vec::new(),
            exempt_depth: 0,
        }
    }

    /// Seed the root frame with unwrap bindings declared elsewhere.
    pub fn declare_root_unwraps(&mut self, names: &[String]) {
        for name in names {
            self.scopes.declare_unwrap(0, name);
        }
    }

    pub fn finish(mut self) -> WalkOutput {
        // Close the root. A synthetic expression root stays open.
        self.scopes.leave_frame();

        let rewritten = resolve_references(
            &self.references,
            &self.scopes,
            &self.explicit,
            self.options.resolution,
            &mut self.emitter,
        );
        tracing::debug!(
            references = self.references.len(),
            rewritten,
            bindings = self.bindings.len(),
            "resolved references"
        );

        if !self.options.declarations {
            if let Some(import) = self
                .session
                .import_statement(&self.helpers, &self.options.runtime_module)
            {
                self.emitter.prepend(import);
            }
        }

        let root_unwraps = self
            .bindings
            .iter()
            .filter(|b| b.frame == 0)
            .map(|b| b.name.clone())
            .collect();
        WalkOutput {
            edits: self.emitter.finish(),
            root_unwraps,
        }
    }

    fn text(&self, span: Span) -> &'a str {
        slice(self.source, self.start_pos, span)
    }

    fn auto_wrap(&mut self) -> AutoWrap<'_> {
        AutoWrap {
            emitter: &mut self.emitter,
            explicit: &mut self.explicit,
            wrap_fn: &self.options.wrap_fn,
        }
    }

    fn strip_leading_sigil(&mut self, span: Span) {
        self.emitter.remove(span.lo, span.lo + BytePos(1));
    }

    fn strip_trailing_sigil(&mut self, span: Span) {
        self.emitter.remove(span.hi - BytePos(1), span.hi);
    }

    fn declare_unwrap(&mut self, frame: FrameId, name: &str, span: Span) {
        tracing::trace!(name, frame, "unwrap binding");
        self.scopes.declare_unwrap(frame, name);
        self.bindings.push(UnwrapBinding {
            name: name.to_string(),
            frame,
            span,
        });
    }

    fn declare_pattern(&mut self, pat: &Pat, frame: FrameId) {
        let mut names = Vec::new();
        collect_bindings(pat, &mut names);
        for ident in names {
            self.scopes.declare_known(frame, &ident.sym);
        }
    }

    fn record(&mut self, ident: &Ident, access: Access, shorthand: bool) {
        let chain = std::mem::take(&mut self.chain);
        let name = ident.sym.to_string();
        let active_when_visited = self.scopes.is_active_unwrap(&name);
        self.references.push(Reference {
            name,
            lo: ident.span.lo,
            hi: ident.span.hi,
            frame: self.scopes.current(),
            access,
            shorthand,
            chain,
            exempt_context: self.exempt_depth > 0,
            active_when_visited,
        });
    }

    /// Make `span` a link of the chain headed by the next visited expression.
    fn link(&mut self, span: Span) {
        self.chain.push(span);
    }

    fn is_unwrap_trigger(&self, call: &CallExpr) -> bool {
        match &call.callee {
            Callee::Expr(callee) => rewrite::is_unwrap_call(self.text(callee.span()), self.ignore),
            _ => false,
        }
    }

    /// Shared by plain and optional calls.
    fn rewrite_call(&mut self, span: Span, callee: &Expr, args: &[ExprOrSpread]) {
        let callee_span = callee.span();
        let text = self.text(callee_span);

        if rewrite::is_explicit_wrap(text) {
            if let Some(arg) = args.first() {
                self.explicit.insert(arg.expr.span());
            }
            self.emitter.remove(callee_span.lo, callee_span.hi);
            return;
        }

        // Outside a declarator only a plain name triggers: `$store.get()` stays.
        if !self.handled_calls.contains(&(span.lo, span.hi))
            && matches!(callee, Expr::Ident(_))
            && rewrite::is_unwrap_call(text, self.ignore)
        {
            self.strip_leading_sigil(callee_span);
        }

        if rewrite::is_auto_wrap_call(text) {
            // A bare `$` has already lost its only character above.
            if text.len() > 1 {
                self.strip_trailing_sigil(callee_span);
            }
            let mut wrap = self.auto_wrap();
            for arg in args.iter().filter(|arg| arg.spread.is_none()) {
                wrap.wrap_argument(&arg.expr);
            }
        }
    }

    fn visit_declarator(&mut self, decl: &VarDeclarator, frame: FrameId) {
        match decl.init.as_deref().and_then(declarator_call) {
            Some(call) if self.is_unwrap_trigger(call) => self.unwrap_declarator(decl, call, frame),
            _ => {
                self.declare_pattern(&decl.name, frame);
                if let (Pat::Ident(binding), Some(init)) = (&decl.name, decl.init.as_deref()) {
                    if rewrite::is_sigil_name(&binding.id.sym) {
                        self.sigil_function_init(binding.id.span, init);
                    }
                }
                decl.name.visit_with(self);
            }
        }
        decl.init.visit_with(self);
    }

    /// `let x = $ref(0)` and `let { a, b } = $useThing()`.
    fn unwrap_declarator(&mut self, decl: &VarDeclarator, call: &CallExpr, frame: FrameId) {
        let Callee::Expr(callee) = &call.callee else {
            return;
        };
        let callee_span = callee.span();
        self.handled_calls.insert((call.span.lo, call.span.hi));

        if let Pat::Ident(binding) = &decl.name {
            self.declare_unwrap(frame, &binding.id.sym, binding.id.span);
            self.strip_leading_sigil(callee_span);
            decl.name.visit_with(self);
            return;
        }

        let (source, start_pos) = (self.source, self.start_pos);
        let text = move |span: Span| slice(source, start_pos, span);
        let Some(plan) = PatternPlan::for_pattern(&decl.name, text) else {
            tracing::debug!(
                callee = self.text(callee_span),
                "destructuring shape not supported, leaving declarator as written"
            );
            self.declare_pattern(&decl.name, frame);
            decl.name.visit_with(self);
            return;
        };

        let temp = self.session.fresh_temp();
        self.emitter
            .overwrite(plan.span.lo, plan.span.hi, temp.as_str());
        self.emitter
            .insert_after(decl.span.hi, plan.render(&temp, text));
        self.helpers.extend(plan.helpers());
        for name in plan.field_names() {
            self.declare_unwrap(frame, name, decl.span);
        }
        if let Some(rest) = plan.rest_name() {
            self.scopes.declare_known(frame, rest);
        }
        self.strip_leading_sigil(callee_span);
    }

    /// `function use$() { return x }`: drop the sigil, wrap what it returns.
    fn sigil_function(&mut self, name: &Ident, function: &Function) {
        if !rewrite::is_sigil_name(&name.sym) {
            return;
        }
        self.strip_trailing_sigil(name.span);
        if let Some(body) = &function.body {
            self.auto_wrap().wrap_returns(body);
        }
    }

    /// `const use$ = () => [a, b]`: the name loses its sigil and whatever
    /// the function returns is auto-wrapped.
    fn sigil_function_init(&mut self, name: Span, init: &Expr) {
        match init {
            Expr::Arrow(arrow) => {
                self.strip_trailing_sigil(name);
                self.auto_wrap().wrap_arrow_body(arrow);
            }
            Expr::Fn(f) => {
                self.strip_trailing_sigil(name);
                if let Some(body) = &f.function.body {
                    self.auto_wrap().wrap_returns(body);
                }
            }
            _ => {}
        }
    }

    fn record_pattern_writes(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(binding) => self.record(&binding.id, Access::Write, false),
            Pat::Object(object) => self.record_object_writes(object),
            Pat::Array(array) => self.record_array_writes(array),
            Pat::Assign(assign) => {
                self.record_pattern_writes(&assign.left);
                assign.right.visit_with(self);
            }
            Pat::Rest(rest) => self.record_pattern_writes(&rest.arg),
            Pat::Expr(expr) => expr.visit_with(self),
            Pat::Invalid(_) => {}
        }
    }

    fn record_object_writes(&mut self, object: &ObjectPat) {
        for prop in &object.props {
            match prop {
                // `({ a } = o)` writes `a`; the key has to be spelled out.
                ObjectPatProp::Assign(assign) => {
                    self.record(&assign.key.id, Access::Write, true);
                    assign.value.visit_with(self);
                }
                ObjectPatProp::KeyValue(kv) => {
                    kv.key.visit_with(self);
                    self.record_pattern_writes(&kv.value);
                }
                ObjectPatProp::Rest(rest) => self.record_pattern_writes(&rest.arg),
            }
        }
    }

    fn record_array_writes(&mut self, array: &ArrayPat) {
        for elem in array.elems.iter().flatten() {
            self.record_pattern_writes(elem);
        }
    }

    fn visit_params<'p>(&mut self, params: impl Iterator<Item = &'p Pat> + Clone) {
        let frame = self.scopes.current();
        for pat in params.clone() {
            self.declare_pattern(pat, frame);
        }
        for pat in params {
            pat.visit_with(self);
        }
    }
}

impl Visit for Walker<'_> {
    fn visit_expr(&mut self, n: &Expr) {
        match n {
            Expr::Ident(ident) => self.record(ident, Access::Read, false),
            Expr::Member(_)
            | Expr::Call(_)
            | Expr::OptChain(_)
            | Expr::Paren(_)
            | Expr::TsNonNull(_)
            | Expr::TsAs(_)
            | Expr::TsSatisfies(_)
            | Expr::TsConstAssertion(_)
            | Expr::TsTypeAssertion(_)
            | Expr::TsInstantiation(_) => n.visit_children_with(self),
            _ => {
                self.chain.clear();
                n.visit_children_with(self);
            }
        }
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        self.link(n.span);
        n.obj.visit_with(self);
        self.chain.clear();
        n.prop.visit_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if let Callee::Expr(callee) = &n.callee {
            self.rewrite_call(n.span, callee, &n.args);
        }
        self.link(n.span);
        n.callee.visit_with(self);
        self.chain.clear();
        n.args.visit_with(self);
    }

    fn visit_opt_chain_expr(&mut self, n: &OptChainExpr) {
        self.link(n.span);
        n.base.visit_with(self);
        self.chain.clear();
    }

    fn visit_opt_call(&mut self, n: &OptCall) {
        self.rewrite_call(n.span, &n.callee, &n.args);
        self.link(n.span);
        n.callee.visit_with(self);
        self.chain.clear();
        n.args.visit_with(self);
    }

    fn visit_paren_expr(&mut self, n: &ParenExpr) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_non_null_expr(&mut self, n: &TsNonNullExpr) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_as_expr(&mut self, n: &TsAsExpr) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_satisfies_expr(&mut self, n: &TsSatisfiesExpr) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_const_assertion(&mut self, n: &TsConstAssertion) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_type_assertion(&mut self, n: &TsTypeAssertion) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_instantiation(&mut self, n: &TsInstantiation) {
        self.link(n.span);
        n.expr.visit_with(self);
    }

    fn visit_prop(&mut self, n: &Prop) {
        match n {
            Prop::Shorthand(ident) => {
                self.chain.clear();
                self.record(ident, Access::Read, true);
            }
            _ => n.visit_children_with(self),
        }
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        self.chain.clear();
        match &n.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                self.record(&binding.id, Access::Write, false)
            }
            AssignTarget::Pat(AssignTargetPat::Object(object)) => self.record_object_writes(object),
            AssignTarget::Pat(AssignTargetPat::Array(array)) => self.record_array_writes(array),
            other => other.visit_with(self),
        }
        n.right.visit_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        self.chain.clear();
        match &*n.arg {
            Expr::Ident(ident) => self.record(ident, Access::Write, false),
            arg => arg.visit_with(self),
        }
    }

    fn visit_import_decl(&mut self, n: &ImportDecl) {
        let frame = self.scopes.current();
        for specifier in &n.specifiers {
            let local = match specifier {
                ImportSpecifier::Named(s) => &s.local,
                ImportSpecifier::Default(s) => &s.local,
                ImportSpecifier::Namespace(s) => &s.local,
            };
            self.scopes.declare_known(frame, &local.sym);
        }
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        let frame = match n.kind {
            VarDeclKind::Var => self.scopes.hoist_target(),
            VarDeclKind::Let | VarDeclKind::Const => self.scopes.current(),
        };
        for decl in &n.decls {
            self.visit_declarator(decl, frame);
        }
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        let frame = self.scopes.current();
        self.scopes.declare_known(frame, &n.ident.sym);
        self.sigil_function(&n.ident, &n.function);
        n.function.visit_with(self);
    }

    /// `export default function use$() {}` binds its name like a declaration.
    fn visit_export_default_decl(&mut self, n: &ExportDefaultDecl) {
        match &n.decl {
            DefaultDecl::Fn(FnExpr {
                ident: Some(ident),
                function,
            }) => {
                let frame = self.scopes.current();
                self.scopes.declare_known(frame, &ident.sym);
                self.sigil_function(ident, function);
                function.visit_with(self);
            }
            _ => n.visit_children_with(self),
        }
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        match &n.ident {
            Some(ident) => {
                let frame = self.scopes.enter_frame(FrameKind::Block);
                self.scopes.declare_known(frame, &ident.sym);
                n.function.visit_with(self);
                self.scopes.leave_frame();
            }
            None => n.function.visit_with(self),
        }
    }

    fn visit_function(&mut self, n: &Function) {
        self.scopes.enter_frame(FrameKind::Function);
        n.decorators.visit_with(self);
        self.visit_params(n.params.iter().map(|p| &p.pat));
        for param in &n.params {
            param.decorators.visit_with(self);
        }
        if let Some(body) = &n.body {
            body.stmts.visit_with(self);
        }
        self.scopes.leave_frame();
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.scopes.enter_frame(FrameKind::Function);
        self.visit_params(n.params.iter());
        match &*n.body {
            BlockStmtOrExpr::BlockStmt(body) => body.stmts.visit_with(self),
            BlockStmtOrExpr::Expr(expr) => expr.visit_with(self),
        }
        self.scopes.leave_frame();
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        self.scopes.enter_frame(FrameKind::Function);
        let frame = self.scopes.current();
        for param in &n.params {
            match param {
                ParamOrTsParamProp::Param(param) => self.declare_pattern(&param.pat, frame),
                ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                    TsParamPropParam::Ident(binding) => {
                        self.scopes.declare_known(frame, &binding.id.sym)
                    }
                    TsParamPropParam::Assign(assign) => self.declare_pattern(&assign.left, frame),
                },
            }
        }
        n.params.visit_with(self);
        if let Some(body) = &n.body {
            body.stmts.visit_with(self);
        }
        self.scopes.leave_frame();
    }

    fn visit_setter_prop(&mut self, n: &SetterProp) {
        n.key.visit_with(self);
        self.scopes.enter_frame(FrameKind::Function);
        self.visit_params(std::iter::once(&*n.param));
        if let Some(body) = &n.body {
            body.stmts.visit_with(self);
        }
        self.scopes.leave_frame();
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        let frame = self.scopes.current();
        self.scopes.declare_known(frame, &n.ident.sym);
        n.class.visit_with(self);
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        match &n.ident {
            Some(ident) => {
                let frame = self.scopes.enter_frame(FrameKind::Block);
                self.scopes.declare_known(frame, &ident.sym);
                n.class.visit_with(self);
                self.scopes.leave_frame();
            }
            None => n.class.visit_with(self),
        }
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.scopes.enter_frame(FrameKind::Block);
        n.stmts.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        self.scopes.enter_frame(FrameKind::Catch);
        self.visit_params(n.param.iter());
        n.body.stmts.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.scopes.enter_frame(FrameKind::Loop);
        n.init.visit_with(self);
        n.test.visit_with(self);
        n.update.visit_with(self);
        n.body.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        n.right.visit_with(self);
        self.scopes.enter_frame(FrameKind::Loop);
        self.visit_for_head(&n.left);
        n.body.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        n.right.visit_with(self);
        self.scopes.enter_frame(FrameKind::Loop);
        self.visit_for_head(&n.left);
        n.body.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_switch_stmt(&mut self, n: &SwitchStmt) {
        n.discriminant.visit_with(self);
        self.scopes.enter_frame(FrameKind::Block);
        n.cases.visit_with(self);
        self.scopes.leave_frame();
    }

    fn visit_jsx_attr(&mut self, n: &JSXAttr) {
        let exempt = match &n.name {
            JSXAttrName::Ident(name) => self.options.is_exempt_attribute(&name.sym),
            JSXAttrName::JSXNamespacedName(name) => {
                self.options.is_exempt_attribute(&name.ns.sym)
                    || self.options.is_exempt_attribute(self.text(name.span()))
            }
        };

        if let (JSXAttrName::Ident(name), Some(JSXAttrValue::JSXExprContainer(container))) =
            (&n.name, &n.value)
        {
            if rewrite::is_sigil_attribute(&name.sym) {
                self.strip_trailing_sigil(name.span);
                if let JSXExpr::Expr(expr) = &container.expr {
                    self.auto_wrap().wrap_argument(expr);
                }
            }
        }

        if exempt {
            self.exempt_depth += 1;
        }
        n.value.visit_with(self);
        if exempt {
            self.exempt_depth -= 1;
        }
    }

    // Types never hold runtime references.
    fn visit_ts_type(&mut self, _: &TsType) {}

    fn visit_ts_interface_decl(&mut self, _: &TsInterfaceDecl) {}

    fn visit_ts_type_alias_decl(&mut self, _: &TsTypeAliasDecl) {}

    fn visit_ts_enum_decl(&mut self, n: &TsEnumDecl) {
        let frame = self.scopes.current();
        self.scopes.declare_known(frame, &n.id.sym);
        n.members.visit_with(self);
    }
}

impl Walker<'_> {
    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::VarDecl(decl) => decl.visit_with(self),
            ForHead::UsingDecl(decl) => decl.visit_with(self),
            ForHead::Pat(pat) => self.record_pattern_writes(pat),
        }
    }
}

/// Source text of `span` in a unit starting at `start_pos`.
fn slice(source: &str, start_pos: BytePos, span: Span) -> &str {
    let start = span.lo.0.saturating_sub(start_pos.0) as usize;
    let end = span.hi.0.saturating_sub(start_pos.0) as usize;
    source.get(start..end).unwrap_or("")
}

/// The call an unwrap declarator initializer boils down to.
fn declarator_call(mut expr: &Expr) -> Option<&CallExpr> {
    loop {
        match expr {
            Expr::Call(call) => return Some(call),
            Expr::Paren(paren) => expr = &paren.expr,
            Expr::TsNonNull(non_null) => expr = &non_null.expr,
            _ => return None,
        }
    }
}

fn collect_bindings<'p>(pat: &'p Pat, out: &mut Vec<&'p Ident>) {
    match pat {
        Pat::Ident(binding) => out.push(&binding.id),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                collect_bindings(elem, out);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_bindings(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(&assign.key.id),
                    ObjectPatProp::Rest(rest) => collect_bindings(&rest.arg, out),
                }
            }
        }
        Pat::Rest(rest) => collect_bindings(&rest.arg, out),
        Pat::Assign(assign) => collect_bindings(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}
