//! # dtoc — projection structural compiler
//!
//! Turns a single projection expression over a data-source element into
//! everything a codegen host needs:
//!
//! 1. a canonical structural schema inferred from the fields the
//!    projection references ([`schema::Schema`]);
//! 2. a content-addressed identity for that schema
//!    ([`identity::Identity`]), so structurally identical projections
//!    written at different call sites collapse onto one generated type;
//! 3. a semantically equivalent rewritten expression tree — optional
//!    chains lowered to explicit guards (or guards raised to optional
//!    chains), nested per-element sub-projections expanded, captured
//!    values replaced by snapshot locals;
//! 4. a codegen-ready artifact: deduplicated declarations plus a typed
//!    mapping function ([`emitter::CodeEmitter`]).
//!
//! # Pipeline
//!
//! ```text
//!            ┌────────────────┐   type/nullability   ┌──────────────┐
//! ExprNode ─▶│ Schema Builder │─────────────────────▶│ TypeResolver │
//!            │  (builder)     │◀─────────────────────│  (resolver)  │
//!            └──┬─────┬─────┬─┘                      └──────────────┘
//!               │     │     └─ nested expansion (transforms::nested)
//!               │     └─ null-chain rewriting (transforms::null_chain)
//!               └─ capture analysis (captures)
//!                      │
//!                      ▼
//!            Identity + DedupRegistry ─▶ CodeEmitter
//! ```
//!
//! # Example
//!
//! ```
//! use dtoc::builder::Compiler;
//! use dtoc::registry::DedupRegistry;
//! use dtoc::resolver::TypeModel;
//! use dtoc::syntax::{ExprNode, FieldInit};
//!
//! let mut model = TypeModel::new();
//! model
//!     .reference_type("Sample")
//!     .member("Id", "int")
//!     .member("Nest", "Nest?");
//! model.reference_type("Nest").member("Name", "string");
//!
//! // s => new { Id = s.Id, Name = s.Nest?.Name }
//! let projection = ExprNode::lambda(
//!     "s",
//!     ExprNode::object(vec![
//!         FieldInit::named("Id", ExprNode::prop(ExprNode::id("s"), "Id")),
//!         FieldInit::named(
//!             "Name",
//!             ExprNode::opt_prop(ExprNode::prop(ExprNode::id("s"), "Nest"), "Name"),
//!         ),
//!     ]),
//! );
//!
//! let registry = DedupRegistry::new();
//! let compiler = Compiler::new(&model, &registry);
//! let compiled = compiler.compile(&projection, "Sample").unwrap();
//! assert_eq!(compiled.schema.len(), 2);
//! assert!(compiled.schema.field("Name").unwrap().is_optional);
//! ```

pub mod builder;
pub mod captures;
pub mod diagnostics;
pub mod emitter;
pub mod identity;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod syntax;
pub mod transforms;

pub use builder::{CompileError, CompileOptions, CompiledProjection, Compiler};
pub use captures::{CaptureEntry, CaptureKind, CaptureSet};
pub use identity::Identity;
pub use registry::DedupRegistry;
pub use resolver::{ReferenceClass, ScopeEnv, TypeDescriptor, TypeModel, TypeResolver};
pub use schema::{ProjectionField, Schema};
pub use syntax::ExprNode;
pub use transforms::ChainTarget;
