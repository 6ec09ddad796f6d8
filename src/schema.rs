//! Structural Schema Model
//!
//! The inferred shape of a projection's output: an ordered list of named,
//! typed, optionality-aware fields. Field order is significant — it feeds
//! both the identity hash and emitted declaration order. Nesting is
//! strictly a tree: a field owns its nested schema outright, there are no
//! back-references and no sharing.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::resolver::TypeDescriptor;
use crate::syntax::ExprNode;

/// One named output field of a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionField {
    /// Unique within the owning schema.
    pub name: String,
    /// Resolver-supplied type; for nested collection projections the
    /// generic argument has already been replaced by the nested schema's
    /// generated type name.
    pub declared_type: TypeDescriptor,
    /// True when the source expression is nullable or uses optional
    /// chaining anywhere.
    pub is_optional: bool,
    /// The (possibly rewritten) expression producing this field's value.
    pub source_expression: ExprNode,
    /// Present only when the field is a per-element collection
    /// projection. Owned exclusively by this field.
    pub nested: Option<Box<Schema>>,
}

/// The structural DTO description for one projection, root or nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Name of the element type being projected from; used for default
    /// naming of the generated type.
    pub source_type_name: String,
    /// Declaration-ordered fields.
    pub fields: Vec<ProjectionField>,
}

impl Schema {
    pub fn new(source_type_name: impl Into<String>) -> Self {
        Schema {
            source_type_name: source_type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, enforcing name uniqueness: a later field with an
    /// already-used name is silently dropped. Returns whether the field
    /// was kept.
    pub fn push_field(&mut self, field: ProjectionField) -> bool {
        if self.fields.iter().any(|f| f.name == field.name) {
            trace!(field = %field.name, "duplicate field name, dropping");
            return false;
        }
        self.fields.push(field);
        true
    }

    pub fn field(&self, name: &str) -> Option<&ProjectionField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// A schema with zero fields is invalid and rejects the whole
    /// compilation.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{TypeClass, TypeDescriptor};

    fn field(name: &str) -> ProjectionField {
        ProjectionField {
            name: name.to_string(),
            declared_type: TypeDescriptor::value("int", TypeClass::Numeric),
            is_optional: false,
            source_expression: ExprNode::prop(ExprNode::id("s"), name),
            nested: None,
        }
    }

    #[test]
    fn test_duplicate_field_dropped_keeps_first() {
        let mut schema = Schema::new("Sample");
        assert!(schema.push_field(field("Id")));
        let mut second = field("Id");
        second.is_optional = true;
        assert!(!schema.push_field(second));
        assert_eq!(schema.len(), 1);
        assert!(!schema.field("Id").unwrap().is_optional);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut schema = Schema::new("Sample");
        schema.push_field(field("B"));
        schema.push_field(field("A"));
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
    }
}
