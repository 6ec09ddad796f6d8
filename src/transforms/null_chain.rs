//! Null-Chain Rewriter
//!
//! Bidirectional translation between the two spellings of a
//! null-short-circuiting member chain:
//!
//! ```text
//! s.Child3?.Child?.Id
//! ```
//! lowers to:
//! ```text
//! s.Child3 != null && s.Child3.Child != null ? s.Child3.Child.Id : null
//! ```
//!
//! and back. Lowering guards every prefix at an optional boundary, up to
//! but excluding the final segment, inserts a cast only when the plain
//! path's static type differs from the field's declared type, and fills
//! the else-branch from the per-type default policy
//! (`TypeDescriptor::default_literal`).
//!
//! Raising recognizes a guard conditional — a conjunction of `!= null`
//! checks over a strictly increasing prefix chain of one root, or the
//! inverted `== null` form — and rebuilds the optional chain. When the
//! guarded value is an object construction, every member access inside
//! it that extends a checked prefix is rewritten against that prefix,
//! not merely the outer ternary.
//!
//! Both directions operate on the structured expression tree; no
//! rendered text is re-parsed.

use tracing::trace;

use crate::resolver::{ScopeEnv, TypeDescriptor, TypeResolver};
use crate::syntax::{BinaryOp, ExprNode, FieldInit, MemberChain};

/// Rewriter over one field's value expression.
pub struct NullChainRewriter<'a, R: TypeResolver + ?Sized> {
    resolver: &'a R,
}

impl<'a, R: TypeResolver + ?Sized> NullChainRewriter<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        NullChainRewriter { resolver }
    }

    // =========================================================================
    // Optional chain → explicit guard
    // =========================================================================

    /// Lower every optional chain in a field's value expression into
    /// guard form. `declared` is the field's declared (possibly
    /// nullable-lifted) type, used for the cast and the default; inner
    /// chains discovered during recursion derive their own.
    pub fn lower_field(
        &self,
        expr: &ExprNode,
        declared: &TypeDescriptor,
        env: &ScopeEnv,
    ) -> ExprNode {
        if let Some(chain) = MemberChain::from_expr(expr) {
            if chain.has_optional() {
                return self.lower_chain(&chain, Some(declared), env);
            }
        }
        self.lower_expr(expr, env)
    }

    /// Structural recursion: rewrite optional chains wherever they occur
    /// in subexpressions (call arguments, conditional branches, object
    /// constructions, lambda bodies).
    fn lower_expr(&self, expr: &ExprNode, env: &ScopeEnv) -> ExprNode {
        if let Some(chain) = MemberChain::from_expr(expr) {
            if chain.has_optional() {
                return self.lower_chain(&chain, None, env);
            }
        }
        match expr {
            // a plain access whose root may still hold rewritable
            // subexpressions (e.g. a call argument)
            ExprNode::MemberAccess {
                object,
                member,
                optional,
            } => ExprNode::MemberAccess {
                object: Box::new(self.lower_expr(object, env)),
                member: member.clone(),
                optional: *optional,
            },
            ExprNode::Call { callee, arguments } => ExprNode::Call {
                callee: Box::new(self.lower_expr(callee, env)),
                arguments: arguments.iter().map(|a| self.lower_expr(a, env)).collect(),
            },
            ExprNode::Lambda { param, body } => ExprNode::Lambda {
                param: param.clone(),
                body: Box::new(self.lower_expr(body, env)),
            },
            ExprNode::Binary { left, op, right } => ExprNode::Binary {
                left: Box::new(self.lower_expr(left, env)),
                op: *op,
                right: Box::new(self.lower_expr(right, env)),
            },
            ExprNode::Conditional {
                condition,
                when_true,
                when_false,
            } => ExprNode::cond(
                self.lower_expr(condition, env),
                self.lower_expr(when_true, env),
                self.lower_expr(when_false, env),
            ),
            ExprNode::Cast { target_type, expr } => ExprNode::Cast {
                target_type: target_type.clone(),
                expr: Box::new(self.lower_expr(expr, env)),
            },
            ExprNode::ObjectConstruction { type_name, inits } => ExprNode::ObjectConstruction {
                type_name: type_name.clone(),
                inits: inits
                    .iter()
                    .map(|i| FieldInit {
                        name: i.name.clone(),
                        value: self.lower_expr(&i.value, env),
                    })
                    .collect(),
            },
            ExprNode::Annotated { note, expr } => ExprNode::Annotated {
                note: note.clone(),
                expr: Box::new(self.lower_expr(expr, env)),
            },
            _ => expr.clone(),
        }
    }

    /// Lower one optional chain:
    /// `<conjunction of prefix != null> ? <cast?>(<plain path>) : <default>`.
    fn lower_chain(
        &self,
        chain: &MemberChain,
        declared: Option<&TypeDescriptor>,
        env: &ScopeEnv,
    ) -> ExprNode {
        let boundaries = chain.optional_boundaries();
        if boundaries.is_empty() {
            return chain.plain_expr();
        }

        let mut checks = boundaries
            .iter()
            .map(|&boundary| ExprNode::ne_null(chain.prefix_expr(boundary)));
        let Some(first) = checks.next() else {
            return chain.plain_expr();
        };
        let condition = checks.fold(first, ExprNode::and);

        let plain = chain.plain_expr();
        let path_type = self.resolver.resolve_type(&plain, env);
        let declared = match declared {
            Some(d) => Some(d.clone()),
            // an inner chain declares itself: the plain path's type,
            // lifted to nullable because the chain can short-circuit
            None => path_type.as_ref().map(|t| t.nullable_lifted()),
        };

        let value = match (&declared, &path_type) {
            (Some(decl), Some(path))
                if decl.fully_qualified_name != path.fully_qualified_name =>
            {
                ExprNode::cast(decl.fully_qualified_name.clone(), plain)
            }
            _ => plain,
        };
        let default = declared
            .as_ref()
            .map(|d| d.default_literal())
            .unwrap_or(ExprNode::NullLiteral);

        trace!(boundaries = boundaries.len(), "lowered optional chain to guard form");
        ExprNode::cond(condition, value, default)
    }

    // =========================================================================
    // Explicit guard → optional chain
    // =========================================================================

    /// Normalize guard conditionals in a field's value expression into
    /// optional-chain form. Children rewrite first so nested guards
    /// collapse bottom-up.
    pub fn raise_field(&self, expr: &ExprNode) -> ExprNode {
        let expr = self.raise_children(expr);
        if let ExprNode::Conditional {
            condition,
            when_true,
            when_false,
        } = &expr
        {
            if let Some(raised) = self.try_raise_guard(condition, when_true, when_false) {
                return raised;
            }
        }
        expr
    }

    fn raise_children(&self, expr: &ExprNode) -> ExprNode {
        match expr {
            ExprNode::Call { callee, arguments } => ExprNode::Call {
                callee: Box::new(self.raise_field(callee)),
                arguments: arguments.iter().map(|a| self.raise_field(a)).collect(),
            },
            ExprNode::Lambda { param, body } => ExprNode::Lambda {
                param: param.clone(),
                body: Box::new(self.raise_field(body)),
            },
            ExprNode::Binary { left, op, right } => ExprNode::Binary {
                left: Box::new(self.raise_field(left)),
                op: *op,
                right: Box::new(self.raise_field(right)),
            },
            ExprNode::Conditional {
                condition,
                when_true,
                when_false,
            } => ExprNode::cond(
                self.raise_field(condition),
                self.raise_field(when_true),
                self.raise_field(when_false),
            ),
            ExprNode::Cast { target_type, expr } => ExprNode::Cast {
                target_type: target_type.clone(),
                expr: Box::new(self.raise_field(expr)),
            },
            ExprNode::ObjectConstruction { type_name, inits } => ExprNode::ObjectConstruction {
                type_name: type_name.clone(),
                inits: inits
                    .iter()
                    .map(|i| FieldInit {
                        name: i.name.clone(),
                        value: self.raise_field(&i.value),
                    })
                    .collect(),
            },
            ExprNode::Annotated { note, expr } => ExprNode::Annotated {
                note: note.clone(),
                expr: Box::new(self.raise_field(expr)),
            },
            _ => expr.clone(),
        }
    }

    /// Attempt to recognize one guard conditional and rebuild it as an
    /// optional chain. Returns `None` when the shape does not match.
    fn try_raise_guard(
        &self,
        condition: &ExprNode,
        when_true: &ExprNode,
        when_false: &ExprNode,
    ) -> Option<ExprNode> {
        // direct form: checks != null, value in the true branch
        if let Some(checks) = collect_checks(condition, BinaryOp::And, BinaryOp::NotEq) {
            if is_null_like(when_false) {
                return self.rebuild_from_guard(&checks, when_true);
            }
        }
        // inverted form: checks == null, value in the false branch
        if let Some(checks) = collect_checks(condition, BinaryOp::Or, BinaryOp::Eq) {
            if is_null_like(when_true) {
                return self.rebuild_from_guard(&checks, when_false);
            }
        }
        None
    }

    fn rebuild_from_guard(&self, checks: &[&ExprNode], value: &ExprNode) -> Option<ExprNode> {
        // casts were only inserted to disambiguate the guard's target
        // typing; the optional chain needs none
        let value = strip_casts(value);

        if let ExprNode::ObjectConstruction { type_name, inits } = value {
            return self.rebuild_construction(checks, type_name, inits);
        }

        let chain = MemberChain::from_expr(value)?;
        let boundaries = match_checked_prefixes(checks, &chain)?;
        // the checked chain must stop short of the final segment
        if *boundaries.last()? >= chain.len() {
            return None;
        }
        let mut optional_at = boundaries;
        // preserve optional links the value already carried
        for existing in chain.optional_boundaries() {
            if !optional_at.contains(&existing) {
                optional_at.push(existing);
            }
        }
        trace!(segments = chain.len(), "raised guard form to optional chain");
        Some(chain.with_optional_at(&optional_at))
    }

    /// Guarded object construction: rewrite every inner member access
    /// that extends a checked prefix into an optional access, then drop
    /// the ternary. At least one field must actually reference the
    /// guarded path, otherwise the guard is left alone.
    fn rebuild_construction(
        &self,
        checks: &[&ExprNode],
        type_name: &Option<String>,
        inits: &[FieldInit],
    ) -> Option<ExprNode> {
        let mut any_rewritten = false;
        let rewritten: Vec<FieldInit> = inits
            .iter()
            .map(|init| FieldInit {
                name: init.name.clone(),
                value: rewrite_against_checks(&init.value, checks, &mut any_rewritten),
            })
            .collect();
        if !any_rewritten {
            return None;
        }
        Some(ExprNode::ObjectConstruction {
            type_name: type_name.clone(),
            inits: rewritten,
        })
    }
}

// =========================================================================
// Guard recognition helpers
// =========================================================================

/// Flatten a conjunction/disjunction of null comparisons into the list
/// of checked expressions, or `None` if any operand has another shape.
fn collect_checks<'e>(
    condition: &'e ExprNode,
    join: BinaryOp,
    cmp: BinaryOp,
) -> Option<Vec<&'e ExprNode>> {
    match condition {
        ExprNode::Binary { left, op, right } if *op == join => {
            let mut checks = collect_checks(left, join, cmp)?;
            checks.extend(collect_checks(right, join, cmp)?);
            Some(checks)
        }
        ExprNode::Binary { left, op, right }
            if *op == cmp && matches!(right.as_ref(), ExprNode::NullLiteral) =>
        {
            Some(vec![left.as_ref()])
        }
        _ => None,
    }
}

/// Match each checked expression against a prefix of the value chain.
/// Returns the boundary indices, or `None` unless every check matches
/// and the sequence is strictly increasing (each check one link deeper).
fn match_checked_prefixes(checks: &[&ExprNode], chain: &MemberChain) -> Option<Vec<usize>> {
    let mut boundaries = Vec::with_capacity(checks.len());
    let mut last: Option<usize> = None;
    for check in checks {
        let len = (0..=chain.len()).find(|&l| chain.prefix_expr(l) == **check)?;
        if let Some(prev) = last {
            if len <= prev {
                return None;
            }
        }
        boundaries.push(len);
        last = Some(len);
    }
    if boundaries.is_empty() { None } else { Some(boundaries) }
}

/// Rewrite member chains inside a guarded construction field: any chain
/// extending a checked prefix gains an optional link at each checked
/// boundary.
fn rewrite_against_checks(
    expr: &ExprNode,
    checks: &[&ExprNode],
    any_rewritten: &mut bool,
) -> ExprNode {
    if let Some(chain) = MemberChain::from_expr(expr) {
        let mut optional_at = chain.optional_boundaries();
        let mut matched = false;
        for check in checks {
            if let Some(len) = (0..chain.len()).find(|&l| chain.prefix_expr(l) == **check) {
                matched = true;
                if !optional_at.contains(&len) {
                    optional_at.push(len);
                }
            }
        }
        if matched {
            *any_rewritten = true;
            return chain.with_optional_at(&optional_at);
        }
        return expr.clone();
    }
    match expr {
        ExprNode::Call { callee, arguments } => ExprNode::Call {
            callee: Box::new(rewrite_against_checks(callee, checks, any_rewritten)),
            arguments: arguments
                .iter()
                .map(|a| rewrite_against_checks(a, checks, any_rewritten))
                .collect(),
        },
        ExprNode::ObjectConstruction { type_name, inits } => ExprNode::ObjectConstruction {
            type_name: type_name.clone(),
            inits: inits
                .iter()
                .map(|i| FieldInit {
                    name: i.name.clone(),
                    value: rewrite_against_checks(&i.value, checks, any_rewritten),
                })
                .collect(),
        },
        ExprNode::Cast { target_type, expr } => ExprNode::Cast {
            target_type: target_type.clone(),
            expr: Box::new(rewrite_against_checks(expr, checks, any_rewritten)),
        },
        _ => expr.clone(),
    }
}

/// Shapes the guard's short-circuit arm may take: `null`, `default(T)`,
/// or either wrapped in a cast (`(int?)null`).
fn is_null_like(expr: &ExprNode) -> bool {
    match expr {
        ExprNode::NullLiteral | ExprNode::DefaultOf(_) => true,
        ExprNode::Cast { expr, .. } => is_null_like(expr),
        _ => false,
    }
}

fn strip_casts(expr: &ExprNode) -> &ExprNode {
    match expr {
        ExprNode::Cast { expr, .. } => strip_casts(expr),
        _ => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ScopeEnv, TypeModel, TypeResolver};
    use crate::syntax::render;

    fn model() -> TypeModel {
        let mut model = TypeModel::new();
        model
            .reference_type("Sample")
            .member("Id", "int")
            .member("Nest", "Nest?")
            .member("Child3", "Node?")
            .member("Flag", "bool");
        model
            .reference_type("Nest")
            .member("Id", "int")
            .member("Name", "string");
        model
            .reference_type("Node")
            .member("Id", "int")
            .member("Child", "Node?");
        model
    }

    fn env() -> ScopeEnv {
        ScopeEnv::for_lambda("s", "Sample")
    }

    fn rewriter(model: &TypeModel) -> NullChainRewriter<'_, TypeModel> {
        NullChainRewriter::new(model)
    }

    #[test]
    fn test_lower_single_boundary_with_cast() {
        let model = model();
        let env = env();
        let rw = rewriter(&model);
        // s.Nest?.Id, declared int?
        let expr = ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Nest"), "Id");
        let declared = model
            .resolve_type(&expr, &env)
            .unwrap()
            .nullable_lifted();
        let lowered = rw.lower_field(&expr, &declared, &env);
        assert_eq!(
            render(&lowered),
            "s.Nest != null ? (int?)s.Nest.Id : null"
        );
    }

    #[test]
    fn test_lower_reference_type_needs_no_cast() {
        let model = model();
        let env = env();
        let rw = rewriter(&model);
        let expr = ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Nest"), "Name");
        let declared = model.resolve_type(&expr, &env).unwrap().nullable_lifted();
        let lowered = rw.lower_field(&expr, &declared, &env);
        assert_eq!(render(&lowered), "s.Nest != null ? s.Nest.Name : \"\"");
    }

    #[test]
    fn test_lower_two_boundaries() {
        let model = model();
        let env = env();
        let rw = rewriter(&model);
        // s.Child3?.Child?.Id
        let expr = ExprNode::opt_prop(
            ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Child3"), "Child"),
            "Id",
        );
        let declared = model.resolve_type(&expr, &env).unwrap().nullable_lifted();
        let lowered = rw.lower_field(&expr, &declared, &env);
        assert_eq!(
            render(&lowered),
            "s.Child3 != null && s.Child3.Child != null ? (int?)s.Child3.Child.Id : null"
        );
    }

    #[test]
    fn test_lower_mixed_chain_guards_only_optional_boundary() {
        let model = model();
        let env = env();
        let rw = rewriter(&model);
        // s.Child3?.Child.Id — only the first link is optional
        let expr = ExprNode::prop(
            ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Child3"), "Child"),
            "Id",
        );
        let declared = model.resolve_type(&expr, &env).unwrap().nullable_lifted();
        let lowered = rw.lower_field(&expr, &declared, &env);
        assert_eq!(
            render(&lowered),
            "s.Child3 != null ? (int?)s.Child3.Child.Id : null"
        );
    }

    #[test]
    fn test_raise_single_check() {
        let model = model();
        let rw = rewriter(&model);
        // s.Nest != null ? s.Nest.Id : (int?)null
        let nest = ExprNode::prop(ExprNode::id("s"), "Nest");
        let guarded = ExprNode::cond(
            ExprNode::ne_null(nest.clone()),
            ExprNode::prop(nest, "Id"),
            ExprNode::cast("int?", ExprNode::NullLiteral),
        );
        let raised = rw.raise_field(&guarded);
        assert_eq!(render(&raised), "s.Nest?.Id");
    }

    #[test]
    fn test_raise_two_checks() {
        let model = model();
        let rw = rewriter(&model);
        let c3 = ExprNode::prop(ExprNode::id("s"), "Child3");
        let c3c = ExprNode::prop(c3.clone(), "Child");
        let guarded = ExprNode::cond(
            ExprNode::and(ExprNode::ne_null(c3), ExprNode::ne_null(c3c.clone())),
            ExprNode::prop(c3c, "Id"),
            ExprNode::NullLiteral,
        );
        assert_eq!(render(&rw.raise_field(&guarded)), "s.Child3?.Child?.Id");
    }

    #[test]
    fn test_raise_inverted_form() {
        let model = model();
        let rw = rewriter(&model);
        // s.Nest == null ? null : s.Nest.Name
        let nest = ExprNode::prop(ExprNode::id("s"), "Nest");
        let guarded = ExprNode::cond(
            ExprNode::eq_null(nest.clone()),
            ExprNode::NullLiteral,
            ExprNode::prop(nest, "Name"),
        );
        assert_eq!(render(&rw.raise_field(&guarded)), "s.Nest?.Name");
    }

    #[test]
    fn test_raise_recurses_into_guarded_construction() {
        let model = model();
        let rw = rewriter(&model);
        // s.Nest != null ? new { A = s.Nest.Id, B = s.Nest.Name } : null
        let nest = ExprNode::prop(ExprNode::id("s"), "Nest");
        let guarded = ExprNode::cond(
            ExprNode::ne_null(nest.clone()),
            ExprNode::object(vec![
                FieldInit::named("A", ExprNode::prop(nest.clone(), "Id")),
                FieldInit::named("B", ExprNode::prop(nest, "Name")),
            ]),
            ExprNode::NullLiteral,
        );
        assert_eq!(
            render(&rw.raise_field(&guarded)),
            "new { A = s.Nest?.Id, B = s.Nest?.Name }"
        );
    }

    #[test]
    fn test_raise_rejects_non_prefix_checks() {
        let model = model();
        let rw = rewriter(&model);
        // the checked path is unrelated to the value path
        let guarded = ExprNode::cond(
            ExprNode::ne_null(ExprNode::prop(ExprNode::id("s"), "Nest")),
            ExprNode::prop(ExprNode::prop(ExprNode::id("s"), "Child3"), "Id"),
            ExprNode::NullLiteral,
        );
        assert_eq!(rw.raise_field(&guarded), guarded);
    }

    #[test]
    fn test_raise_rejects_non_null_default() {
        let model = model();
        let rw = rewriter(&model);
        // `: 0` is not a null-like arm; raising would change semantics
        let nest = ExprNode::prop(ExprNode::id("s"), "Nest");
        let guarded = ExprNode::cond(
            ExprNode::ne_null(nest.clone()),
            ExprNode::prop(nest, "Id"),
            ExprNode::number("0"),
        );
        assert_eq!(rw.raise_field(&guarded), guarded);
    }

    #[test]
    fn test_roundtrip_is_idempotent() {
        let model = model();
        let env = env();
        let rw = rewriter(&model);
        let expr = ExprNode::opt_prop(
            ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Child3"), "Child"),
            "Id",
        );
        let declared = model.resolve_type(&expr, &env).unwrap().nullable_lifted();

        let guard1 = rw.lower_field(&expr, &declared, &env);
        let chain = rw.raise_field(&guard1);
        let guard2 = rw.lower_field(&chain, &declared, &env);
        assert_eq!(guard1, guard2);
    }
}
