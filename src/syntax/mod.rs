//! Expression Tree for Projection Compilation
//!
//! This module defines the tree-structured expression representation the
//! compiler operates on. Hosts hand the compiler an already-parsed
//! projection lambda as an `ExprNode` tree; every rewrite (null-chain
//! lowering, nested expansion, capture substitution) produces a new tree.
//!
//! # Architecture
//!
//! The tree is a sum type with boxed children — strictly a tree, never a
//! graph. Rewrites never mutate in place; they rebuild the affected
//! subtree and splice it into a clone of the rest. All rewriting operates
//! on these nodes directly rather than on rendered text, so bracket and
//! precedence handling lives in exactly one place (the printer).
//!
//! ```text
//! s => new { Id = s.Id, Name = s.Nest?.Name }
//! ```
//!
//! parses to:
//!
//! ```text
//! Lambda { param: "s", body: ObjectConstruction { inits: [
//!     FieldInit { name: Some("Id"),   value: s.Id },
//!     FieldInit { name: Some("Name"), value: s.Nest?.Name },
//! ] } }
//! ```

mod chain;
mod printer;

pub use chain::{ChainSegment, MemberChain};
pub use printer::render;

use serde::{Deserialize, Serialize};

/// Binary operators the compiler needs to recognize and produce.
///
/// Only the operators that participate in guard conditions are modeled;
/// anything else a host feeds in arrives as an opaque `Call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// One `name = value` (or positional `value`) entry in an object
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    /// Explicit field name; `None` means the name must be inferred from
    /// the value expression (or the field dropped).
    pub name: Option<String>,
    pub value: ExprNode,
}

impl FieldInit {
    pub fn named(name: impl Into<String>, value: ExprNode) -> Self {
        FieldInit {
            name: Some(name.into()),
            value,
        }
    }

    pub fn inferred(value: ExprNode) -> Self {
        FieldInit { name: None, value }
    }
}

/// A node in the projection expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    // =========================================================================
    // Literals
    // =========================================================================
    /// Numeric literal: `42`, `3.14`
    NumberLiteral(String),

    /// String literal: `"hello"`
    StringLiteral(String),

    /// Boolean literal: `true`, `false`
    BoolLiteral(bool),

    /// Character literal: `'x'`
    CharLiteral(char),

    /// Null literal: `null`
    NullLiteral,

    /// Zero-initialized value of a named type: `default(T)`
    DefaultOf(String),

    // =========================================================================
    // References
    // =========================================================================
    /// Identifier: `s`, `threshold`
    Identifier(String),

    /// Explicit self reference: `this`
    This,

    // =========================================================================
    // Compound expressions
    // =========================================================================
    /// Member access: `object.member`, or `object?.member` when
    /// `optional` is set (short-circuits to null when `object` is null).
    MemberAccess {
        object: Box<ExprNode>,
        member: String,
        optional: bool,
    },

    /// Call expression: `callee(args)`
    Call {
        callee: Box<ExprNode>,
        arguments: Vec<ExprNode>,
    },

    /// Single-parameter lambda: `param => body`
    Lambda { param: String, body: Box<ExprNode> },

    /// Binary expression: `left op right`
    Binary {
        left: Box<ExprNode>,
        op: BinaryOp,
        right: Box<ExprNode>,
    },

    /// Conditional expression: `condition ? when_true : when_false`
    Conditional {
        condition: Box<ExprNode>,
        when_true: Box<ExprNode>,
        when_false: Box<ExprNode>,
    },

    /// Cast: `(TargetType)expr`
    Cast {
        target_type: String,
        expr: Box<ExprNode>,
    },

    /// Object construction: `new { A = x, B = y }` or `new Named { ... }`
    ObjectConstruction {
        type_name: Option<String>,
        inits: Vec<FieldInit>,
    },

    /// An expression carrying an inline diagnostic marker comment.
    /// Used for field-scoped rewrite failures: the original expression
    /// passes through untouched, prefixed with `/* note */` on emission.
    Annotated { note: String, expr: Box<ExprNode> },
}

// =========================================================================
// Builder helpers
// =========================================================================

impl ExprNode {
    /// Create an identifier node
    pub fn id(name: impl Into<String>) -> Self {
        ExprNode::Identifier(name.into())
    }

    /// Create a string literal
    pub fn string(s: impl Into<String>) -> Self {
        ExprNode::StringLiteral(s.into())
    }

    /// Create a numeric literal
    pub fn number(n: impl Into<String>) -> Self {
        ExprNode::NumberLiteral(n.into())
    }

    /// Create a plain member access: `object.member`
    pub fn prop(object: ExprNode, member: impl Into<String>) -> Self {
        ExprNode::MemberAccess {
            object: Box::new(object),
            member: member.into(),
            optional: false,
        }
    }

    /// Create an optional member access: `object?.member`
    pub fn opt_prop(object: ExprNode, member: impl Into<String>) -> Self {
        ExprNode::MemberAccess {
            object: Box::new(object),
            member: member.into(),
            optional: true,
        }
    }

    /// Create a call expression
    pub fn call(callee: ExprNode, args: Vec<ExprNode>) -> Self {
        ExprNode::Call {
            callee: Box::new(callee),
            arguments: args,
        }
    }

    /// Create a method-style call: `object.method(args)`
    pub fn method(object: ExprNode, method: impl Into<String>, args: Vec<ExprNode>) -> Self {
        ExprNode::call(ExprNode::prop(object, method), args)
    }

    /// Create a single-parameter lambda
    pub fn lambda(param: impl Into<String>, body: ExprNode) -> Self {
        ExprNode::Lambda {
            param: param.into(),
            body: Box::new(body),
        }
    }

    /// Create a binary expression
    pub fn binary(left: ExprNode, op: BinaryOp, right: ExprNode) -> Self {
        ExprNode::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create `expr != null`
    pub fn ne_null(expr: ExprNode) -> Self {
        ExprNode::binary(expr, BinaryOp::NotEq, ExprNode::NullLiteral)
    }

    /// Create `expr == null`
    pub fn eq_null(expr: ExprNode) -> Self {
        ExprNode::binary(expr, BinaryOp::Eq, ExprNode::NullLiteral)
    }

    /// Create `left && right`
    pub fn and(left: ExprNode, right: ExprNode) -> Self {
        ExprNode::binary(left, BinaryOp::And, right)
    }

    /// Create a conditional expression
    pub fn cond(condition: ExprNode, when_true: ExprNode, when_false: ExprNode) -> Self {
        ExprNode::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }
    }

    /// Create a cast expression
    pub fn cast(target_type: impl Into<String>, expr: ExprNode) -> Self {
        ExprNode::Cast {
            target_type: target_type.into(),
            expr: Box::new(expr),
        }
    }

    /// Create an anonymous object construction
    pub fn object(inits: Vec<FieldInit>) -> Self {
        ExprNode::ObjectConstruction {
            type_name: None,
            inits,
        }
    }

    /// Create a named object construction
    pub fn object_of(type_name: impl Into<String>, inits: Vec<FieldInit>) -> Self {
        ExprNode::ObjectConstruction {
            type_name: Some(type_name.into()),
            inits,
        }
    }

    /// Wrap with an inline diagnostic marker
    pub fn annotated(note: impl Into<String>, expr: ExprNode) -> Self {
        ExprNode::Annotated {
            note: note.into(),
            expr: Box::new(expr),
        }
    }
}

// =========================================================================
// Structural queries
// =========================================================================

impl ExprNode {
    /// True if any member access anywhere in this subtree uses the
    /// optional-chain operator.
    pub fn contains_optional_chain(&self) -> bool {
        match self {
            ExprNode::MemberAccess {
                object, optional, ..
            } => *optional || object.contains_optional_chain(),
            ExprNode::Call { callee, arguments } => {
                callee.contains_optional_chain()
                    || arguments.iter().any(|a| a.contains_optional_chain())
            }
            ExprNode::Lambda { body, .. } => body.contains_optional_chain(),
            ExprNode::Binary { left, right, .. } => {
                left.contains_optional_chain() || right.contains_optional_chain()
            }
            ExprNode::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                condition.contains_optional_chain()
                    || when_true.contains_optional_chain()
                    || when_false.contains_optional_chain()
            }
            ExprNode::Cast { expr, .. } => expr.contains_optional_chain(),
            ExprNode::ObjectConstruction { inits, .. } => {
                inits.iter().any(|i| i.value.contains_optional_chain())
            }
            ExprNode::Annotated { expr, .. } => expr.contains_optional_chain(),
            _ => false,
        }
    }

    /// The trailing member name when this expression is a plain member
    /// access or identifier — the name-inference source for fields
    /// declared without an explicit name.
    pub fn inferable_name(&self) -> Option<&str> {
        match self {
            ExprNode::Identifier(name) => Some(name),
            ExprNode::MemberAccess { member, .. } => Some(member),
            _ => None,
        }
    }

    /// True for expressions that denote a value without computation —
    /// literals and `default(T)`.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ExprNode::NumberLiteral(_)
                | ExprNode::StringLiteral(_)
                | ExprNode::BoolLiteral(_)
                | ExprNode::CharLiteral(_)
                | ExprNode::NullLiteral
                | ExprNode::DefaultOf(_)
        )
    }
}
