//! Schema Builder
//!
//! Drives the whole compilation of one projection: walks the field list,
//! asks the resolver for types and optionality, hands nested collection
//! projections to the expander (recursing back into itself), runs every
//! value expression through the null-chain rewriter, collects captures,
//! computes the identity, and registers the generated name.
//!
//! Compilation of one projection is pure, synchronous and
//! single-threaded. Independent projections share nothing but the
//! [`DedupRegistry`]; `compile_batch` fans them out across a thread
//! pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, debug_span, trace};

use crate::captures::{CaptureAnalyzer, CaptureSet};
use crate::diagnostics::{DiagnosticBag, DiagnosticCode};
use crate::identity::{Identity, candidate_type_name, signature_of};
use crate::registry::{CollisionError, DedupRegistry};
use crate::resolver::{ScopeEnv, TypeDescriptor, TypeResolver};
use crate::schema::{ProjectionField, Schema};
use crate::syntax::{ExprNode, FieldInit};
use crate::transforms::{ChainTarget, NestedProjectionExpander, NullChainRewriter};

/// Marker prepended to a field that looked like a nested projection but
/// could not be rewritten.
const UNREWRITTEN_MARKER: &str = "dtoc: nested projection left unrewritten";

/// Compilation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Which form the downstream engine executes; see [`ChainTarget`].
    pub chain_target: ChainTarget,
}

/// Why a compilation produced nothing.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The input is not a single-parameter lambda producing an object
    /// construction.
    #[error("expression is not a single-parameter projection lambda producing an object construction")]
    NotAProjection,
    /// No field survived name inference and type resolution. Non-fatal:
    /// the caller skips emission for this call site.
    #[error("projection over {source_type} has no nameable fields; nothing to generate")]
    EmptySchema { source_type: String },
    /// Two structurally different schemas collided on one identity.
    /// Fatal to dedup correctness.
    #[error(transparent)]
    HashCollision(#[from] CollisionError),
}

impl CompileError {
    /// True for the non-fatal "nothing to generate" outcomes.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CompileError::HashCollision(_))
    }
}

/// Everything one successful compilation produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledProjection {
    pub schema: Schema,
    pub identity: Identity,
    /// Deduplicated generated type name for the root schema.
    pub generated_name: String,
    /// The rewritten projection lambda, fields in schema order.
    pub rewritten: ExprNode,
    pub captures: CaptureSet,
    pub diagnostics: DiagnosticBag,
}

/// One field's worth of pipeline output, before it joins the schema.
struct BuiltField {
    declared: TypeDescriptor,
    is_optional: bool,
    value: ExprNode,
    nested: Option<Box<Schema>>,
}

/// The projection compiler. Cheap to construct; borrows the resolver
/// and the shared registry, so one instance can serve many independent
/// compilations, concurrently.
pub struct Compiler<'a, R: TypeResolver + ?Sized> {
    resolver: &'a R,
    registry: &'a DedupRegistry,
    options: CompileOptions,
}

impl<'a, R: TypeResolver + ?Sized> Compiler<'a, R> {
    pub fn new(resolver: &'a R, registry: &'a DedupRegistry) -> Self {
        Compiler {
            resolver,
            registry,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(
        resolver: &'a R,
        registry: &'a DedupRegistry,
        options: CompileOptions,
    ) -> Self {
        Compiler {
            resolver,
            registry,
            options,
        }
    }

    /// Compile a projection lambda over `source_type` with no enclosing
    /// lexical scope.
    pub fn compile(
        &self,
        lambda: &ExprNode,
        source_type: &str,
    ) -> Result<CompiledProjection, CompileError> {
        self.compile_in_env(lambda, source_type, &ScopeEnv::default())
    }

    /// Compile with an enclosing scope (locals, outer parameters, the
    /// enclosing type for implicit-`this` member references).
    pub fn compile_in_env(
        &self,
        lambda: &ExprNode,
        source_type: &str,
        enclosing: &ScopeEnv,
    ) -> Result<CompiledProjection, CompileError> {
        let span = debug_span!("compile_projection", source = source_type);
        let _guard = span.enter();

        let ExprNode::Lambda { param, body } = lambda else {
            return Err(CompileError::NotAProjection);
        };
        let ExprNode::ObjectConstruction { type_name, inits } = body.as_ref() else {
            return Err(CompileError::NotAProjection);
        };

        let env = enclosing.with_bound(param.clone(), source_type.to_string());
        let mut diagnostics = DiagnosticBag::new();
        let mut schema = self.build_schema(inits, source_type, &env, &mut diagnostics)?;
        if schema.is_empty() {
            return Err(CompileError::EmptySchema {
                source_type: source_type.to_string(),
            });
        }

        // capture analysis runs once, over the root's final field
        // expressions; nested expressions are part of them
        let analyzer = CaptureAnalyzer::new(self.resolver);
        let mut captures = CaptureSet::new();
        for field in &mut schema.fields {
            field.source_expression =
                analyzer.analyze(&field.source_expression, &env, &mut captures);
        }

        let identity = Identity::of(&schema);
        let signature = signature_of(&schema);
        let candidate = candidate_type_name(source_type, &identity);
        let generated_name = self
            .registry
            .resolve_or_register(&identity, &signature, &candidate)?;
        debug!(%identity, name = %generated_name, fields = schema.len(), "projection compiled");

        // an anonymous construction becomes the generated type; an
        // explicitly-typed one keeps its declared name
        let rewritten = ExprNode::Lambda {
            param: param.clone(),
            body: Box::new(ExprNode::ObjectConstruction {
                type_name: Some(type_name.clone().unwrap_or_else(|| generated_name.clone())),
                inits: schema
                    .fields
                    .iter()
                    .map(|f| FieldInit::named(f.name.clone(), f.source_expression.clone()))
                    .collect(),
            }),
        };

        Ok(CompiledProjection {
            schema,
            identity,
            generated_name,
            rewritten,
            captures,
            diagnostics,
        })
    }

    /// Compile independent projections in parallel. Outcomes come back
    /// in input order; the registry arbitrates shared identities.
    pub fn compile_batch(
        &self,
        jobs: &[(ExprNode, String)],
    ) -> Vec<Result<CompiledProjection, CompileError>> {
        jobs.par_iter()
            .map(|(lambda, source_type)| self.compile(lambda, source_type))
            .collect()
    }

    // =========================================================================
    // Field pipeline
    // =========================================================================

    fn build_schema(
        &self,
        inits: &[FieldInit],
        source_type: &str,
        env: &ScopeEnv,
        diagnostics: &mut DiagnosticBag,
    ) -> Result<Schema, CompileError> {
        let mut schema = Schema::new(source_type);
        for (index, init) in inits.iter().enumerate() {
            let name = init
                .name
                .clone()
                .or_else(|| init.value.inferable_name().map(str::to_string));
            let Some(name) = name else {
                diagnostics.info(
                    DiagnosticCode::FieldSkipped,
                    format!("#{index}"),
                    "no explicit name and none inferable from the value expression",
                );
                continue;
            };
            if schema.field(&name).is_some() {
                // later duplicate is silently dropped
                trace!(field = %name, "duplicate field name, dropping");
                continue;
            }
            let Some(built) = self.build_field(&name, &init.value, env, diagnostics)? else {
                continue;
            };
            schema.push_field(ProjectionField {
                name,
                declared_type: built.declared,
                is_optional: built.is_optional,
                source_expression: built.value,
                nested: built.nested,
            });
        }
        Ok(schema)
    }

    fn build_field(
        &self,
        name: &str,
        value: &ExprNode,
        env: &ScopeEnv,
        diagnostics: &mut DiagnosticBag,
    ) -> Result<Option<BuiltField>, CompileError> {
        if NestedProjectionExpander::contains_projection_lambda(value) {
            return self.expand_nested_field(name, value, env, diagnostics);
        }

        let Some(resolved) = self.resolver.resolve_type(value, env) else {
            diagnostics.info(
                DiagnosticCode::FieldSkipped,
                name,
                "value expression could not be typed",
            );
            return Ok(None);
        };

        let chained = self.resolver.contains_optional_chain(value);
        let rewriter = NullChainRewriter::new(self.resolver);
        let rewritten = match self.options.chain_target {
            ChainTarget::GuardClauses => {
                let declared_for_rewrite = if resolved.is_nullable || chained {
                    resolved.nullable_lifted()
                } else {
                    resolved.clone()
                };
                rewriter.lower_field(value, &declared_for_rewrite, env)
            }
            ChainTarget::OptionalChaining => rewriter.raise_field(value),
        };
        // optionality is judged before lowering and after raising, so
        // both spellings of the same chain agree
        let is_optional = resolved.is_nullable || chained || rewritten.contains_optional_chain();

        Ok(Some(BuiltField {
            declared: resolved,
            is_optional,
            value: rewritten,
            nested: None,
        }))
    }

    /// Expand a nested per-element collection projection; on any
    /// unsupported shape the field passes through unchanged behind a
    /// diagnostic marker (field-scoped failure, never projection-scoped).
    fn expand_nested_field(
        &self,
        name: &str,
        value: &ExprNode,
        env: &ScopeEnv,
        diagnostics: &mut DiagnosticBag,
    ) -> Result<Option<BuiltField>, CompileError> {
        let Some(map_call) = NestedProjectionExpander::locate(value) else {
            diagnostics.warning(
                DiagnosticCode::MapOperatorNotFound,
                name,
                "projection lambda present but no map operator call in the chain",
            );
            return Ok(Some(self.marker_field(value, env)));
        };
        let Some(base_desc) = self.resolver.resolve_type(map_call.base, env) else {
            diagnostics.warning(
                DiagnosticCode::MapOperatorNotFound,
                name,
                "map operator base could not be typed",
            );
            return Ok(Some(self.marker_field(value, env)));
        };
        let Some(element) = base_desc.element_type.clone() else {
            diagnostics.warning(
                DiagnosticCode::MapOperatorNotFound,
                name,
                "map operator base is not a collection",
            );
            return Ok(Some(self.marker_field(value, env)));
        };
        let ExprNode::ObjectConstruction { type_name, inits } = map_call.construction else {
            diagnostics.warning(
                DiagnosticCode::MapOperatorNotFound,
                name,
                "map operator argument is not an object construction",
            );
            return Ok(Some(self.marker_field(value, env)));
        };

        let nested_env = env.with_bound(map_call.param.to_string(), element.clone());
        let nested_schema = self.build_schema(inits, &element, &nested_env, diagnostics)?;
        if nested_schema.is_empty() {
            diagnostics.info(
                DiagnosticCode::FieldSkipped,
                name,
                "nested projection has no nameable fields",
            );
            return Ok(None);
        }

        let nested_identity = Identity::of(&nested_schema);
        let nested_signature = signature_of(&nested_schema);
        let candidate = candidate_type_name(&element, &nested_identity);
        let nested_name =
            self.registry
                .resolve_or_register(&nested_identity, &nested_signature, &candidate)?;
        trace!(field = name, nested = %nested_name, "nested projection expanded");

        let rewritten_construction = ExprNode::ObjectConstruction {
            type_name: Some(type_name.clone().unwrap_or_else(|| nested_name.clone())),
            inits: nested_schema
                .fields
                .iter()
                .map(|f| FieldInit::named(f.name.clone(), f.source_expression.clone()))
                .collect(),
        };
        let rewritten = map_call.reassemble(rewritten_construction);

        let declared = base_desc.with_element_type(&nested_name);
        let is_optional = declared.is_nullable || rewritten.contains_optional_chain();
        Ok(Some(BuiltField {
            declared,
            is_optional,
            value: rewritten,
            nested: Some(Box::new(nested_schema)),
        }))
    }

    /// A field that looked like a nested projection but could not be
    /// rewritten: original expression behind a marker, best-effort type.
    fn marker_field(&self, value: &ExprNode, env: &ScopeEnv) -> BuiltField {
        let declared = self
            .resolver
            .resolve_type(value, env)
            .unwrap_or_else(|| TypeDescriptor::reference("object"));
        let is_optional = declared.is_nullable || value.contains_optional_chain();
        BuiltField {
            declared,
            is_optional,
            value: ExprNode::annotated(UNREWRITTEN_MARKER, value.clone()),
            nested: None,
        }
    }
}
