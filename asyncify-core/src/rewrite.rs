//! Traversal engine: rewrites blocking-await calls in one module
//!
//! Global invariants enforced:
//! - Every call expression is visited exactly once
//! - A call is classified before anything around it is mutated
//! - A rewritten call is wrapped in `await` and its arguments are visited
//!   afterwards, so the wrapped call itself is never reclassified
//! - Enclosing functions are marked `async` at most once
//!
//! The visitor keeps a small amount of context for the expression it is
//! about to enter: the syntactic `Position` (for classification and
//! parenthesization) and the `Binding` a function or object literal picks up
//! from its parent. Both are consumed on entry to every expression so they
//! never leak past the immediate child.

use log::debug;
use swc_common::{util::take::Take, BytePos, SourceFile, SourceMap, Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};

use crate::classify::{is_blocking_await, CallPattern, Position};
use crate::naming::{self, Binding, FunctionKind, FunctionSite};
use crate::parser::{offset_in, ParsedSource};
use crate::propagate::FunctionScope;
use crate::report::Recorder;
use crate::splice::Splice;

/// Result of rewriting one module
pub struct RewriteOutcome<'a> {
    pub splice: Splice,
    pub recorder: Recorder<'a>,
    /// Number of call sites wrapped in `await`
    pub rewritten: usize,
}

/// Rewrite every eligible call in `parsed`, mutating its module in place
pub fn rewrite_module<'a>(
    parsed: &mut ParsedSource,
    source: &str,
    source_map: &'a SourceMap,
    pattern: &CallPattern,
) -> RewriteOutcome<'a> {
    let mut rewriter = Rewriter {
        pattern,
        source,
        file: &parsed.source_file,
        program: FunctionScope::program(parsed.module.span),
        scopes: Vec::new(),
        position: Position::Plain,
        binding: None,
        owners: Vec::new(),
        recorder: Recorder::new(source_map),
        splice: Splice::new(),
        rewritten: 0,
    };

    parsed.module.visit_mut_with(&mut rewriter);

    RewriteOutcome {
        splice: rewriter.splice,
        recorder: rewriter.recorder,
        rewritten: rewriter.rewritten,
    }
}

struct Rewriter<'p, 's, 'a> {
    pattern: &'p CallPattern,
    source: &'s str,
    file: &'s SourceFile,
    /// Module top level, the enclosing scope of calls outside any function
    program: FunctionScope,
    /// Open function scopes, innermost last
    scopes: Vec<FunctionScope>,
    position: Position,
    binding: Option<Binding>,
    /// Assignment targets of the object literals currently open, innermost last
    owners: Vec<Option<String>>,
    recorder: Recorder<'a>,
    splice: Splice,
    rewritten: usize,
}

impl Rewriter<'_, '_, '_> {
    fn offset(&self, pos: BytePos) -> usize {
        offset_in(self.file, pos)
    }

    /// Where `async` goes for a method: before its key, or before the `*` of a generator
    fn method_head(&self, key_span: Span, is_generator: bool) -> usize {
        let key_offset = self.offset(key_span.lo);
        if is_generator {
            if let Some(star) = generator_star(&self.source[..key_offset]) {
                return star;
            }
        }
        key_offset
    }

    fn enter_scope(&mut self, scope: FunctionScope) {
        self.scopes.push(scope);
    }

    /// Close the innermost scope; returns whether it was marked `async` in this run
    fn exit_scope(&mut self) -> bool {
        self.scopes.pop().is_some_and(|scope| scope.was_marked())
    }

    /// Visit `node` as an operand whose value a bare `await` prefix would rebind
    fn visit_operand<N: VisitMutWith<Self> + ?Sized>(&mut self, node: &mut N) {
        self.position = Position::Operand;
        node.visit_mut_with(self);
        self.position = Position::Plain;
    }

    /// Visit `node` with `binding` available to a function or object literal directly inside it
    fn visit_bound<N: VisitMutWith<Self> + ?Sized>(&mut self, binding: Option<Binding>, node: &mut N) {
        self.binding = binding;
        node.visit_mut_with(self);
        self.binding = None;
    }

    /// Handle a call already classified as a blocking await
    fn rewrite_blocking_call(&mut self, expr: &mut Expr, position: Position) {
        let call_span = expr.span();
        let call_start = self.offset(call_span.lo);
        let call_end = self.offset(call_span.hi);

        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut self.program,
        };

        let Some(name) = scope.name.clone() else {
            debug!(
                "leaving {} at byte {} untouched: enclosing {} has no name",
                self.pattern.display(),
                call_start,
                scope.kind.as_str()
            );
            self.recorder.skip(scope.span);
            expr.visit_mut_children_with(self);
            return;
        };

        if position.needs_parens() {
            self.splice.insert(call_start, "(await ");
            self.splice.insert(call_end, ")");
        } else {
            self.splice.insert(call_start, "await ");
        }

        if scope.mark_suspend_capable() {
            self.splice.insert(scope.async_at, "async ");
        }

        if scope.claim_record() {
            debug!("converting {} `{}`", scope.kind.as_str(), name);
            self.recorder.convert(&name, scope.kind, scope.span);
        }

        self.rewritten += 1;

        let awaited = Expr::Await(AwaitExpr {
            span: call_span,
            arg: Box::new(expr.take()),
        });
        *expr = if position.needs_parens() {
            Expr::Paren(ParenExpr {
                span: call_span,
                expr: Box::new(awaited),
            })
        } else {
            awaited
        };

        // Arguments may hold further blocking calls; the wrapped call now sits
        // in an awaited position and is skipped by the classifier.
        expr.visit_mut_children_with(self);
    }
}

/// Offset of the generator `*` that ends `head`, looking past whitespace and comments
fn generator_star(head: &str) -> Option<usize> {
    let mut rest = head;
    loop {
        rest = rest.trim_end();
        if rest.ends_with('*') && !rest.ends_with("*/") {
            return Some(rest.len() - 1);
        }
        if rest.ends_with("*/") {
            rest = &rest[..rest.rfind("/*")?];
            continue;
        }
        // A line comment sits between the star and the key
        let line_start = rest.rfind('\n').map_or(0, |i| i + 1);
        let comment = rest[line_start..].find("//")?;
        rest = &rest[..line_start + comment];
    }
}

impl VisitMut for Rewriter<'_, '_, '_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let position = std::mem::take(&mut self.position);
        let binding = self.binding.take();

        if matches!(&*expr, Expr::Call(call) if is_blocking_await(call, self.pattern, position)) {
            self.rewrite_blocking_call(expr, position);
            return;
        }

        match expr {
            // Transparent wrappers: the inner expression takes the wrapper's place
            Expr::Paren(_) | Expr::TsNonNull(_) => {
                self.position = position;
                self.binding = binding;
            }
            Expr::Fn(_) | Expr::Arrow(_) => {
                self.binding = binding;
            }
            Expr::Object(_) => {
                let owner = match binding {
                    Some(Binding::Assigned(target)) => Some(target),
                    _ => None,
                };
                self.owners.push(owner);
                expr.visit_mut_children_with(self);
                self.owners.pop();
                return;
            }
            _ => {}
        }

        expr.visit_mut_children_with(self);
    }

    fn visit_mut_await_expr(&mut self, n: &mut AwaitExpr) {
        self.position = Position::Awaited;
        n.arg.visit_mut_with(self);
        self.position = Position::Plain;
    }

    fn visit_mut_member_expr(&mut self, n: &mut MemberExpr) {
        self.visit_operand(&mut n.obj);
        n.prop.visit_mut_with(self);
    }

    fn visit_mut_call_expr(&mut self, n: &mut CallExpr) {
        self.visit_operand(&mut n.callee);
        n.args.visit_mut_with(self);
    }

    fn visit_mut_opt_call(&mut self, n: &mut OptCall) {
        self.visit_operand(&mut n.callee);
        n.args.visit_mut_with(self);
    }

    fn visit_mut_new_expr(&mut self, n: &mut NewExpr) {
        self.visit_operand(&mut n.callee);
        n.args.visit_mut_with(self);
    }

    fn visit_mut_tagged_tpl(&mut self, n: &mut TaggedTpl) {
        self.visit_operand(&mut n.tag);
        n.tpl.visit_mut_with(self);
    }

    fn visit_mut_bin_expr(&mut self, n: &mut BinExpr) {
        if n.op == BinaryOp::Exp {
            self.visit_operand(&mut n.left);
        } else {
            n.left.visit_mut_with(self);
        }
        n.right.visit_mut_with(self);
    }

    fn visit_mut_var_declarator(&mut self, n: &mut VarDeclarator) {
        n.name.visit_mut_with(self);
        let binding = match &n.name {
            Pat::Ident(ident) => Some(Binding::Declared(ident.id.sym.to_string())),
            _ => None,
        };
        self.visit_bound(binding, &mut n.init);
    }

    fn visit_mut_assign_expr(&mut self, n: &mut AssignExpr) {
        n.left.visit_mut_with(self);
        let binding = naming::assign_target_name(&n.left).map(Binding::Assigned);
        self.visit_bound(binding, &mut n.right);
    }

    fn visit_mut_key_value_prop(&mut self, n: &mut KeyValueProp) {
        n.key.visit_mut_with(self);
        let binding = naming::prop_name(&n.key).map(Binding::Declared);
        self.visit_bound(binding, &mut n.value);
    }

    fn visit_mut_class_prop(&mut self, n: &mut ClassProp) {
        n.decorators.visit_mut_with(self);
        n.key.visit_mut_with(self);

        // Field initializers run outside any enclosing function and cannot await
        let kind = FunctionKind::ClassProperty;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        let binding = naming::prop_name(&n.key).map(Binding::Declared);
        self.visit_bound(binding, &mut n.value);
        self.exit_scope();
    }

    fn visit_mut_private_prop(&mut self, n: &mut PrivateProp) {
        n.decorators.visit_mut_with(self);

        let kind = FunctionKind::ClassProperty;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        let binding = Some(Binding::Declared(naming::private_name(&n.key)));
        self.visit_bound(binding, &mut n.value);
        self.exit_scope();
    }

    fn visit_mut_fn_decl(&mut self, n: &mut FnDecl) {
        // A declaration initializes no binding and has no key
        let kind = FunctionKind::FunctionDeclaration;
        let name = naming::resolve_function_name(kind, &FunctionSite::default());
        let span = n.function.span;
        let async_at = self.offset(span.lo);
        self.enter_scope(FunctionScope::new(kind, name, span, async_at, n.function.is_async));

        n.function.visit_mut_with(self);

        if self.exit_scope() {
            n.function.is_async = true;
        }
    }

    fn visit_mut_fn_expr(&mut self, n: &mut FnExpr) {
        let kind = FunctionKind::FunctionExpression;
        let binding = self.binding.take();
        let site = FunctionSite {
            binding: binding.as_ref(),
            ..Default::default()
        };
        let name = naming::resolve_function_name(kind, &site);
        let span = n.function.span;
        let async_at = self.offset(span.lo);
        self.enter_scope(FunctionScope::new(kind, name, span, async_at, n.function.is_async));

        n.function.visit_mut_with(self);

        if self.exit_scope() {
            n.function.is_async = true;
        }
    }

    fn visit_mut_arrow_expr(&mut self, n: &mut ArrowExpr) {
        let kind = FunctionKind::ArrowFunctionExpression;
        let binding = self.binding.take();
        let site = FunctionSite {
            binding: binding.as_ref(),
            ..Default::default()
        };
        let name = naming::resolve_function_name(kind, &site);
        let async_at = self.offset(n.span.lo);
        self.enter_scope(FunctionScope::new(kind, name, n.span, async_at, n.is_async));

        n.params.visit_mut_with(self);
        n.body.visit_mut_with(self);

        if self.exit_scope() {
            n.is_async = true;
        }
    }

    fn visit_mut_method_prop(&mut self, n: &mut MethodProp) {
        n.key.visit_mut_with(self);

        let kind = FunctionKind::ObjectMethod;
        let owner = self.owners.last().and_then(|owner| owner.as_deref());
        let site = FunctionSite {
            key: naming::prop_name(&n.key),
            owner,
            ..Default::default()
        };
        let name = naming::resolve_function_name(kind, &site);
        let key_span = n.key.span();
        let span = Span::new(key_span.lo, n.function.span.hi);
        let async_at = self.method_head(key_span, n.function.is_generator);
        self.enter_scope(FunctionScope::new(kind, name, span, async_at, n.function.is_async));

        n.function.visit_mut_with(self);

        if self.exit_scope() {
            n.function.is_async = true;
        }
    }

    fn visit_mut_class_method(&mut self, n: &mut ClassMethod) {
        n.key.visit_mut_with(self);

        let kind = match n.kind {
            MethodKind::Method => FunctionKind::ClassMethod,
            MethodKind::Getter => FunctionKind::ClassGetter,
            MethodKind::Setter => FunctionKind::ClassSetter,
        };
        let site = FunctionSite {
            key: naming::prop_name(&n.key),
            ..Default::default()
        };
        let name = naming::resolve_function_name(kind, &site);
        let async_at = self.method_head(n.key.span(), n.function.is_generator);
        self.enter_scope(FunctionScope::new(kind, name, n.span, async_at, n.function.is_async));

        n.function.visit_mut_with(self);

        if self.exit_scope() {
            n.function.is_async = true;
        }
    }

    fn visit_mut_private_method(&mut self, n: &mut PrivateMethod) {
        let kind = match n.kind {
            MethodKind::Method => FunctionKind::ClassPrivateMethod,
            MethodKind::Getter => FunctionKind::ClassGetter,
            MethodKind::Setter => FunctionKind::ClassSetter,
        };
        let site = FunctionSite {
            key: Some(naming::private_name(&n.key)),
            ..Default::default()
        };
        let name = naming::resolve_function_name(kind, &site);
        let async_at = self.method_head(n.key.span, n.function.is_generator);
        self.enter_scope(FunctionScope::new(kind, name, n.span, async_at, n.function.is_async));

        n.function.visit_mut_with(self);

        if self.exit_scope() {
            n.function.is_async = true;
        }
    }

    fn visit_mut_constructor(&mut self, n: &mut Constructor) {
        n.key.visit_mut_with(self);
        let kind = FunctionKind::ClassConstructor;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        n.params.visit_mut_with(self);
        n.body.visit_mut_with(self);
        self.exit_scope();
    }

    fn visit_mut_getter_prop(&mut self, n: &mut GetterProp) {
        n.key.visit_mut_with(self);
        let kind = FunctionKind::ObjectGetter;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        n.body.visit_mut_with(self);
        self.exit_scope();
    }

    fn visit_mut_setter_prop(&mut self, n: &mut SetterProp) {
        n.key.visit_mut_with(self);
        let kind = FunctionKind::ObjectSetter;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        n.param.visit_mut_with(self);
        n.body.visit_mut_with(self);
        self.exit_scope();
    }

    fn visit_mut_static_block(&mut self, n: &mut StaticBlock) {
        let kind = FunctionKind::StaticBlock;
        self.enter_scope(FunctionScope::new(kind, None, n.span, 0, false));
        n.body.visit_mut_with(self);
        self.exit_scope();
    }
}

#[cfg(test)]
#[path = "rewrite/tests.rs"]
mod tests;
