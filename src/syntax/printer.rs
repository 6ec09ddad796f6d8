//! Expression Printer
//!
//! Renders an `ExprNode` tree back to source-like text. This is the only
//! place that knows about operator precedence and bracket placement; the
//! rewrite passes work purely on structure.

use super::{BinaryOp, ExprNode};

/// Render an expression to text.
pub fn render(expr: &ExprNode) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, Prec::Lowest);
    out
}

/// Precedence levels, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Conditional,
    Or,
    And,
    Equality,
    Unary,
    Postfix,
}

fn prec_of(expr: &ExprNode) -> Prec {
    match expr {
        ExprNode::Lambda { .. } => Prec::Lowest,
        ExprNode::Conditional { .. } => Prec::Conditional,
        ExprNode::Binary { op, .. } => match op {
            BinaryOp::Or => Prec::Or,
            BinaryOp::And => Prec::And,
            BinaryOp::Eq | BinaryOp::NotEq => Prec::Equality,
        },
        ExprNode::Cast { .. } => Prec::Unary,
        ExprNode::MemberAccess { .. } | ExprNode::Call { .. } => Prec::Postfix,
        // literals, identifiers, object constructions, annotations
        _ => Prec::Postfix,
    }
}

fn write_expr(out: &mut String, expr: &ExprNode, min: Prec) {
    let own = prec_of(expr);
    let needs_parens = own < min;
    if needs_parens {
        out.push('(');
    }
    match expr {
        ExprNode::NumberLiteral(n) => out.push_str(n),
        ExprNode::StringLiteral(s) => {
            out.push('"');
            out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        ExprNode::BoolLiteral(b) => out.push_str(if *b { "true" } else { "false" }),
        ExprNode::CharLiteral(c) => {
            out.push('\'');
            if *c == '\0' {
                out.push_str("\\0");
            } else {
                out.push(*c);
            }
            out.push('\'');
        }
        ExprNode::NullLiteral => out.push_str("null"),
        ExprNode::DefaultOf(ty) => {
            out.push_str("default(");
            out.push_str(ty);
            out.push(')');
        }
        ExprNode::Identifier(name) => out.push_str(name),
        ExprNode::This => out.push_str("this"),
        ExprNode::MemberAccess {
            object,
            member,
            optional,
        } => {
            write_expr(out, object, Prec::Postfix);
            out.push_str(if *optional { "?." } else { "." });
            out.push_str(member);
        }
        ExprNode::Call { callee, arguments } => {
            write_expr(out, callee, Prec::Postfix);
            out.push('(');
            for (i, arg) in arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, Prec::Lowest);
            }
            out.push(')');
        }
        ExprNode::Lambda { param, body } => {
            out.push_str(param);
            out.push_str(" => ");
            write_expr(out, body, Prec::Lowest);
        }
        ExprNode::Binary { left, op, right } => {
            // left-associative: the right child must bind tighter
            let (lmin, rmin) = match op {
                BinaryOp::Or => (Prec::Or, Prec::And),
                BinaryOp::And => (Prec::And, Prec::Equality),
                BinaryOp::Eq | BinaryOp::NotEq => (Prec::Equality, Prec::Unary),
            };
            write_expr(out, left, lmin);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_expr(out, right, rmin);
        }
        ExprNode::Conditional {
            condition,
            when_true,
            when_false,
        } => {
            write_expr(out, condition, Prec::Or);
            out.push_str(" ? ");
            write_expr(out, when_true, Prec::Lowest);
            out.push_str(" : ");
            write_expr(out, when_false, Prec::Conditional);
        }
        ExprNode::Cast { target_type, expr } => {
            out.push('(');
            out.push_str(target_type);
            out.push(')');
            write_expr(out, expr, Prec::Unary);
        }
        ExprNode::ObjectConstruction { type_name, inits } => {
            out.push_str("new ");
            if let Some(name) = type_name {
                out.push_str(name);
                out.push(' ');
            }
            out.push_str("{ ");
            for (i, init) in inits.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if let Some(name) = &init.name {
                    out.push_str(name);
                    out.push_str(" = ");
                }
                write_expr(out, &init.value, Prec::Lowest);
            }
            out.push_str(" }");
        }
        ExprNode::Annotated { note, expr } => {
            out.push_str("/* ");
            out.push_str(note);
            out.push_str(" */ ");
            write_expr(out, expr, min.max(Prec::Conditional));
        }
    }
    if needs_parens {
        out.push(')');
    }
}
