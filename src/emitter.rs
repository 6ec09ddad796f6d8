//! Code Emitter
//!
//! Renders a compiled projection into its final artifact: one type
//! declaration per distinct schema (nested first) plus a typed mapping
//! function applying the rewritten lambda. Hosts with their own codegen
//! pipeline consume `CompiledProjection` directly and skip this module;
//! what lives here is the reference rendering.
//!
//! The emitter is deduplication-aware: a declaration whose generated
//! name was already emitted by this emitter instance is skipped, so two
//! call sites sharing one identity contribute one declaration.

use rustc_hash::FxHashSet;

use crate::builder::CompiledProjection;
use crate::schema::Schema;
use crate::syntax::{ExprNode, render};

/// The rendered output for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifact {
    /// Type declarations, nested types before the types that use them.
    /// Empty when every declaration was already emitted.
    pub declarations: String,
    /// The mapping function from source element to generated type.
    pub mapping_function: String,
}

/// Renders declarations and mapping functions, remembering which
/// generated names it has already declared.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    emitted: FxHashSet<String>,
}

impl CodeEmitter {
    pub fn new() -> Self {
        CodeEmitter::default()
    }

    pub fn emit(&mut self, compiled: &CompiledProjection) -> EmittedArtifact {
        let mut declarations = String::new();
        self.emit_schema(&mut declarations, &compiled.schema, &compiled.generated_name);
        EmittedArtifact {
            declarations,
            mapping_function: mapping_function(compiled),
        }
    }

    fn emit_schema(&mut self, out: &mut String, schema: &Schema, name: &str) {
        // nested declarations first so every referenced name is declared
        // before use
        for field in &schema.fields {
            if let Some(nested) = &field.nested {
                if let Some(nested_name) = field.declared_type.element_type.as_deref() {
                    self.emit_schema(out, nested, nested_name);
                }
            }
        }
        if !self.emitted.insert(name.to_string()) {
            return;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("class ");
        out.push_str(name);
        out.push_str("\n{\n");
        for field in &schema.fields {
            let type_name = if field.is_optional {
                field.declared_type.nullable_lifted().fully_qualified_name
            } else {
                field.declared_type.fully_qualified_name.clone()
            };
            out.push_str("    public ");
            out.push_str(&type_name);
            out.push(' ');
            out.push_str(&field.name);
            out.push_str(" { get; init; }\n");
        }
        out.push_str("}\n");
    }
}

fn mapping_function(compiled: &CompiledProjection) -> String {
    let ExprNode::Lambda { param, body } = &compiled.rewritten else {
        return String::new();
    };
    let mut out = String::new();
    if !compiled.captures.is_empty() {
        out.push_str("// captures: ");
        for (i, name) in compiled.captures.names().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(name);
        }
        out.push('\n');
    }
    out.push_str("static ");
    out.push_str(&compiled.generated_name);
    out.push_str(" MapTo");
    out.push_str(&compiled.generated_name);
    out.push('(');
    out.push_str(&compiled.schema.source_type_name);
    out.push(' ');
    out.push_str(param);
    out.push_str(") => ");
    out.push_str(&render(body));
    out.push_str(";\n");
    out
}
