//! Member-Access Chain Decomposition
//!
//! Both rewrite passes reason about expressions like `s.Child3?.Child.Id`
//! as a *chain*: a root expression plus an ordered list of member
//! segments, each either plain (`.x`) or optional (`?.x`). Decomposing
//! once into this form keeps the rewriters free of nested-`match`
//! traversal and makes prefix comparison a slice operation.

use smallvec::SmallVec;

use super::ExprNode;

/// One `.member` / `?.member` link in a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSegment {
    pub member: String,
    pub optional: bool,
}

/// A decomposed member-access chain: `root(.seg)+`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberChain {
    pub root: ExprNode,
    pub segments: SmallVec<[ChainSegment; 4]>,
}

impl MemberChain {
    /// Decompose a member-access expression. Returns `None` unless the
    /// expression is at least one member access deep; the root is the
    /// innermost non-member-access expression (usually an identifier).
    pub fn from_expr(expr: &ExprNode) -> Option<MemberChain> {
        let mut segments: SmallVec<[ChainSegment; 4]> = SmallVec::new();
        let mut current = expr;
        loop {
            match current {
                ExprNode::MemberAccess {
                    object,
                    member,
                    optional,
                } => {
                    segments.push(ChainSegment {
                        member: member.clone(),
                        optional: *optional,
                    });
                    current = object.as_ref();
                }
                _ => break,
            }
        }
        if segments.is_empty() {
            return None;
        }
        segments.reverse();
        Some(MemberChain {
            root: current.clone(),
            segments,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if any link in the chain is optional.
    pub fn has_optional(&self) -> bool {
        self.segments.iter().any(|s| s.optional)
    }

    /// Segment indices at which an optional link occurs. A boundary at
    /// index `i` means the prefix of length `i` must be null-checked
    /// before the chain may continue.
    pub fn optional_boundaries(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.optional)
            .map(|(i, _)| i)
            .collect()
    }

    /// The plain (non-optional) dotted expression for the first `len`
    /// segments: `root.seg1...segLen`. `len == 0` yields the root alone.
    pub fn prefix_expr(&self, len: usize) -> ExprNode {
        let mut expr = self.root.clone();
        for seg in &self.segments[..len] {
            expr = ExprNode::prop(expr, seg.member.clone());
        }
        expr
    }

    /// The full dotted path with every link plain.
    pub fn plain_expr(&self) -> ExprNode {
        self.prefix_expr(self.segments.len())
    }

    /// Rebuild the chain with optionality taken from `optional_at`:
    /// segment `i` becomes optional iff `optional_at` contains `i`.
    pub fn with_optional_at(&self, optional_at: &[usize]) -> ExprNode {
        let mut expr = self.root.clone();
        for (i, seg) in self.segments.iter().enumerate() {
            expr = ExprNode::MemberAccess {
                object: Box::new(expr),
                member: seg.member.clone(),
                optional: optional_at.contains(&i),
            };
        }
        expr
    }

    /// True when `self` is a proper or equal prefix of `other`: same
    /// root expression and matching member names. Optionality is ignored
    /// — guard conditions always spell their checks with plain links.
    pub fn is_prefix_of(&self, other: &MemberChain) -> bool {
        if self.root != other.root || self.len() > other.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a.member == b.member)
    }
}
