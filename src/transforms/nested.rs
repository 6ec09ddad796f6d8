//! Nested-Projection Expander
//!
//! Detects field values of the shape
//!
//! ```text
//! <base>.<map-call>(p => new { ... })[<trailing ops>]
//! ```
//!
//! e.g. `s.Items.Map(i => new { i.Id }).Take(5).ToList()`. The map
//! invocation is located by walking backward through the call chain from
//! the outermost invocation; everything applied after the map call is
//! captured verbatim and reattached, unmodified, around the rewritten
//! call.
//!
//! The expander only decomposes and reassembles. The Schema Builder owns
//! the recursion: it compiles the inner construction into a nested
//! schema (with the map lambda's parameter as the new self reference and
//! the collection's element type as the new source type) and hands the
//! rewritten construction back for reassembly.
//!
//! Failure to locate a map call in a field that syntactically carries a
//! projection lambda is field-scoped: the builder emits the field
//! unchanged behind a diagnostic marker instead of failing the whole
//! projection.

use crate::syntax::ExprNode;

/// A located map invocation, borrowed from the field's value expression.
#[derive(Debug)]
pub struct MapCall<'e> {
    /// The collection expression the map operator is applied to.
    pub base: &'e ExprNode,
    /// Name of the map operator member (`Map`, `Select`, ...). Located
    /// by shape, not by name: any single-argument invocation whose
    /// argument is a one-parameter lambda producing an object
    /// construction qualifies.
    pub operator: &'e str,
    /// Whether the map call itself was optional (`base?.Map(...)`).
    pub optional: bool,
    /// The map lambda's parameter name.
    pub param: &'e str,
    /// The lambda's object-construction body.
    pub construction: &'e ExprNode,
    /// Operations between the map call and the outermost expression,
    /// innermost first.
    trail: Vec<TrailingOp<'e>>,
}

#[derive(Debug)]
enum TrailingOp<'e> {
    /// `.member` / `?.member`
    Access { member: &'e str, optional: bool },
    /// `.member(args)` / `?.member(args)`
    Invoke {
        member: &'e str,
        optional: bool,
        arguments: &'e [ExprNode],
    },
}

pub struct NestedProjectionExpander;

impl NestedProjectionExpander {
    /// Quick syntactic trigger: does this expression carry a
    /// one-parameter lambda producing an object construction anywhere?
    /// A `true` here with a failed [`locate`](Self::locate) is the
    /// malformed case the diagnostic marker exists for.
    pub fn contains_projection_lambda(expr: &ExprNode) -> bool {
        match expr {
            ExprNode::Lambda { body, .. } => {
                matches!(body.as_ref(), ExprNode::ObjectConstruction { .. })
                    || Self::contains_projection_lambda(body)
            }
            ExprNode::MemberAccess { object, .. } => Self::contains_projection_lambda(object),
            ExprNode::Call { callee, arguments } => {
                Self::contains_projection_lambda(callee)
                    || arguments.iter().any(Self::contains_projection_lambda)
            }
            ExprNode::Binary { left, right, .. } => {
                Self::contains_projection_lambda(left) || Self::contains_projection_lambda(right)
            }
            ExprNode::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                Self::contains_projection_lambda(condition)
                    || Self::contains_projection_lambda(when_true)
                    || Self::contains_projection_lambda(when_false)
            }
            ExprNode::Cast { expr, .. } => Self::contains_projection_lambda(expr),
            ExprNode::ObjectConstruction { inits, .. } => inits
                .iter()
                .any(|i| Self::contains_projection_lambda(&i.value)),
            ExprNode::Annotated { expr, .. } => Self::contains_projection_lambda(expr),
            _ => false,
        }
    }

    /// Walk backward through the call chain from the outermost
    /// invocation until the map call is found. Only the chain spine is
    /// searched — a projection lambda buried in an argument position is
    /// not a map call and reports as unlocatable.
    pub fn locate(expr: &ExprNode) -> Option<MapCall<'_>> {
        match expr {
            ExprNode::Call { callee, arguments } => {
                let ExprNode::MemberAccess {
                    object,
                    member,
                    optional,
                } = callee.as_ref()
                else {
                    return None;
                };
                if let [ExprNode::Lambda { param, body }] = arguments.as_slice() {
                    if matches!(body.as_ref(), ExprNode::ObjectConstruction { .. }) {
                        return Some(MapCall {
                            base: object.as_ref(),
                            operator: member.as_str(),
                            optional: *optional,
                            param: param.as_str(),
                            construction: body.as_ref(),
                            trail: Vec::new(),
                        });
                    }
                }
                let mut found = Self::locate(object)?;
                found.trail.push(TrailingOp::Invoke {
                    member: member.as_str(),
                    optional: *optional,
                    arguments,
                });
                Some(found)
            }
            ExprNode::MemberAccess {
                object,
                member,
                optional,
            } => {
                let mut found = Self::locate(object)?;
                found.trail.push(TrailingOp::Access {
                    member: member.as_str(),
                    optional: *optional,
                });
                Some(found)
            }
            _ => None,
        }
    }
}

impl MapCall<'_> {
    /// Rebuild the field value around a rewritten construction:
    /// `<base>.<map>(<param> => <rewritten>)<trailing ops>`.
    pub fn reassemble(&self, rewritten_construction: ExprNode) -> ExprNode {
        let mut expr = ExprNode::Call {
            callee: Box::new(ExprNode::MemberAccess {
                object: Box::new(self.base.clone()),
                member: self.operator.to_string(),
                optional: self.optional,
            }),
            arguments: vec![ExprNode::lambda(self.param, rewritten_construction)],
        };
        for op in &self.trail {
            expr = match op {
                TrailingOp::Access { member, optional } => ExprNode::MemberAccess {
                    object: Box::new(expr),
                    member: (*member).to_string(),
                    optional: *optional,
                },
                TrailingOp::Invoke {
                    member,
                    optional,
                    arguments,
                } => ExprNode::Call {
                    callee: Box::new(ExprNode::MemberAccess {
                        object: Box::new(expr),
                        member: (*member).to_string(),
                        optional: *optional,
                    }),
                    arguments: arguments.to_vec(),
                },
            };
        }
        expr
    }
}
