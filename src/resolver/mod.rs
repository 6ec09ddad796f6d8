//! Type Resolver Adapter
//!
//! The compiler never inspects the host language's semantic model
//! directly; everything it needs — static types, nullability, reference
//! classification — arrives through the [`TypeResolver`] trait. A host
//! with a live semantic model implements the trait as a thin shim. For
//! hosts that feed the compiler from a serialized type table (and for
//! tests) the crate ships [`TypeModel`], a table-driven implementation.

mod model;

pub use model::{Accessibility, MemberBinding, MemberDef, TypeModel};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::syntax::ExprNode;

/// Coarse classification of a resolved type, driving the default-value
/// policy and collection detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeClass {
    Bool,
    Char,
    Text,
    Numeric,
    Enum,
    Struct,
    Reference,
    /// An element sequence; `TypeDescriptor::element_type` names the
    /// element.
    Sequence,
}

/// Resolver-supplied description of a static type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Full type identity string, e.g. `int`, `string`, `List<Order>`.
    /// Nullable-annotated types carry their annotation: `int?`.
    pub fully_qualified_name: String,
    /// True when the type is annotated nullable at this use site.
    pub is_nullable: bool,
    pub is_value_type: bool,
    pub class: TypeClass,
    /// Element type name when `class == Sequence`.
    pub element_type: Option<String>,
}

impl TypeDescriptor {
    pub fn reference(name: impl Into<String>) -> Self {
        TypeDescriptor {
            fully_qualified_name: name.into(),
            is_nullable: false,
            is_value_type: false,
            class: TypeClass::Reference,
            element_type: None,
        }
    }

    pub fn value(name: impl Into<String>, class: TypeClass) -> Self {
        TypeDescriptor {
            fully_qualified_name: name.into(),
            is_nullable: false,
            is_value_type: true,
            class,
            element_type: None,
        }
    }

    pub fn text() -> Self {
        TypeDescriptor {
            fully_qualified_name: "string".to_string(),
            is_nullable: false,
            is_value_type: false,
            class: TypeClass::Text,
            element_type: None,
        }
    }

    pub fn sequence(name: impl Into<String>, element: impl Into<String>) -> Self {
        TypeDescriptor {
            fully_qualified_name: name.into(),
            is_nullable: false,
            is_value_type: false,
            class: TypeClass::Sequence,
            element_type: Some(element.into()),
        }
    }

    /// The type name without a nullable annotation.
    pub fn base_name(&self) -> &str {
        self.fully_qualified_name
            .strip_suffix('?')
            .unwrap_or(&self.fully_qualified_name)
    }

    /// This type lifted to its nullable form. Value types gain a `?`
    /// annotation; reference types keep their name and only flip the
    /// nullability bit.
    pub fn nullable_lifted(&self) -> TypeDescriptor {
        if self.is_nullable {
            return self.clone();
        }
        let mut lifted = self.clone();
        lifted.is_nullable = true;
        if self.is_value_type {
            lifted.fully_qualified_name = format!("{}?", self.fully_qualified_name);
        }
        lifted
    }

    /// The expression this type evaluates to when a guard short-circuits.
    ///
    /// Policy, in precedence order: nullable anything is `null`; text is
    /// the empty string; bool is `false`; char is NUL; numerics are `0`;
    /// remaining value types (enum, struct) are their zero-initialized
    /// `default(T)`; every other reference type is `null`.
    pub fn default_literal(&self) -> ExprNode {
        if self.is_nullable {
            return ExprNode::NullLiteral;
        }
        match self.class {
            TypeClass::Text => ExprNode::string(""),
            TypeClass::Bool => ExprNode::BoolLiteral(false),
            TypeClass::Char => ExprNode::CharLiteral('\0'),
            TypeClass::Numeric => ExprNode::number("0"),
            TypeClass::Enum | TypeClass::Struct => {
                ExprNode::DefaultOf(self.fully_qualified_name.clone())
            }
            TypeClass::Reference | TypeClass::Sequence => ExprNode::NullLiteral,
        }
    }

    /// Rewrite the generic argument of a sequence type:
    /// `List<Order>` + `OrderDto_1a2b3c4d` → `List<OrderDto_1a2b3c4d>`.
    pub fn with_element_type(&self, element: &str) -> TypeDescriptor {
        let name = match self.fully_qualified_name.find('<') {
            Some(open) => format!("{}<{}>", &self.fully_qualified_name[..open], element),
            None => format!("{}<{}>", self.fully_qualified_name, element),
        };
        TypeDescriptor {
            fully_qualified_name: name,
            element_type: Some(element.to_string()),
            ..self.clone()
        }
    }
}

/// How a leaf reference binds, as reported by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceClass {
    /// The projection lambda's own parameter (or a nested map lambda's).
    BoundParameter,
    /// A local variable from an enclosing lexical scope.
    Local,
    /// A parameter of an enclosing function.
    OuterParameter,
    /// An instance member of the enclosing type (implicit or explicit
    /// `this`).
    InstanceMember { public: bool },
    /// A static member.
    StaticMember { public: bool },
    /// A compile-time constant.
    Constant,
    /// An enum literal such as `Color.Red`.
    EnumLiteral,
    /// The resolver could not classify the reference.
    Unknown,
}

/// Lexical scope the compiler threads through resolution calls: which
/// names are lambda-bound, which are enclosing locals/parameters, and
/// which type an implicit `this` refers to.
#[derive(Debug, Clone, Default)]
pub struct ScopeEnv {
    /// Lambda-bound parameters in scope, innermost included: name → type.
    pub bound: FxHashMap<String, String>,
    /// Enclosing local variables: name → type.
    pub locals: FxHashMap<String, String>,
    /// Enclosing function parameters: name → type.
    pub outer_params: FxHashMap<String, String>,
    /// The type whose members an unqualified or `this.` reference hits.
    pub enclosing_type: Option<String>,
}

impl ScopeEnv {
    /// Scope for a root projection lambda: one bound parameter.
    pub fn for_lambda(param: impl Into<String>, param_type: impl Into<String>) -> Self {
        let mut env = ScopeEnv::default();
        env.bound.insert(param.into(), param_type.into());
        env
    }

    /// A child scope with one more bound parameter (nested map lambda).
    /// Outer bound parameters stay visible — they are still evaluated
    /// per element, never captured.
    pub fn with_bound(&self, param: impl Into<String>, param_type: impl Into<String>) -> Self {
        let mut env = self.clone();
        env.bound.insert(param.into(), param_type.into());
        env
    }

    pub fn with_local(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.locals.insert(name.into(), ty.into());
        self
    }

    pub fn with_outer_param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.outer_params.insert(name.into(), ty.into());
        self
    }

    pub fn with_enclosing_type(mut self, name: impl Into<String>) -> Self {
        self.enclosing_type = Some(name.into());
        self
    }
}

/// The adapter the compiler calls into for everything semantic.
pub trait TypeResolver: Send + Sync {
    /// Static type of an expression, best effort. `None` means the
    /// resolver cannot type the expression; the affected field is
    /// skipped rather than failing the projection.
    fn resolve_type(&self, expr: &ExprNode, env: &ScopeEnv) -> Option<TypeDescriptor>;

    /// Classification of a leaf reference (identifier, `this.x`,
    /// `Type.member`).
    fn classify_reference(&self, expr: &ExprNode, env: &ScopeEnv) -> ReferenceClass;

    /// Whether the expression uses the optional-chain operator anywhere.
    /// Syntactic; the default delegates to the expression tree.
    fn contains_optional_chain(&self, expr: &ExprNode) -> bool {
        expr.contains_optional_chain()
    }
}
