//! Expression Rewrite Passes
//!
//! Two passes run over every field's value expression during schema
//! building:
//!
//! - [`null_chain`] — bidirectional translation between optional-chain
//!   form (`a?.b?.c`) and explicit-guard form
//!   (`a != null && a.b != null ? a.b.c : default`), direction chosen by
//!   the configured [`ChainTarget`];
//! - [`nested`] — detection and expansion of per-element collection
//!   sub-projections (`x.Items.Map(i => new { ... }).Take(5)`).
//!
//! Both passes rebuild expression subtrees; the input tree is never
//! mutated.

pub mod nested;
pub mod null_chain;

pub use nested::NestedProjectionExpander;
pub use null_chain::NullChainRewriter;

use serde::{Deserialize, Serialize};

/// What the downstream execution engine can represent, and therefore
/// which direction the null-chain rewriter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChainTarget {
    /// The engine cannot execute optional chaining; lower `?.` into
    /// explicit guard conditionals.
    #[default]
    GuardClauses,
    /// The engine supports optional chaining natively; normalize guard
    /// conditionals into `?.`.
    OptionalChaining,
}
