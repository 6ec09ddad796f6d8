//! Table-Driven Type Model
//!
//! A `TypeResolver` implementation backed by an explicit table of type
//! definitions. Hosts that cannot hand the compiler a live semantic
//! model serialize their type information into a `TypeModel`; the test
//! suite builds small models the same way.
//!
//! Name conventions understood by the model:
//! - a trailing `?` marks a nullable annotation (`int?`, `Nest?`);
//! - a generic suffix marks a sequence (`List<Order>` — element `Order`);
//! - `int`, `long`, `short`, `byte`, `float`, `double`, `decimal`,
//!   `bool`, `char`, `string` are built in.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{ReferenceClass, ScopeEnv, TypeClass, TypeDescriptor, TypeResolver};
use crate::syntax::ExprNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accessibility {
    Public,
    NonPublic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberBinding {
    Instance,
    Static,
    Constant,
}

/// One member of a modeled type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDef {
    pub name: String,
    pub type_name: String,
    pub binding: MemberBinding,
    pub accessibility: Accessibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TypeDef {
    is_value_type: bool,
    class: TypeClass,
    members: FxHashMap<String, MemberDef>,
}

/// Table-driven resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeModel {
    types: FxHashMap<String, TypeDef>,
}

impl TypeModel {
    pub fn new() -> Self {
        TypeModel::default()
    }

    /// Define a reference type and return a handle for adding members.
    pub fn reference_type(&mut self, name: impl Into<String>) -> TypeEntry<'_> {
        self.insert_type(name.into(), false, TypeClass::Reference)
    }

    /// Define a value (struct) type.
    pub fn struct_type(&mut self, name: impl Into<String>) -> TypeEntry<'_> {
        self.insert_type(name.into(), true, TypeClass::Struct)
    }

    /// Define an enum type with its literals.
    pub fn enum_type(&mut self, name: impl Into<String>, literals: &[&str]) {
        let name = name.into();
        let mut entry = self.insert_type(name.clone(), true, TypeClass::Enum);
        for lit in literals {
            entry = entry.add(MemberDef {
                name: (*lit).to_string(),
                type_name: name.clone(),
                binding: MemberBinding::Constant,
                accessibility: Accessibility::Public,
            });
        }
    }

    fn insert_type(&mut self, name: String, is_value_type: bool, class: TypeClass) -> TypeEntry<'_> {
        let def = self.types.entry(name).or_insert_with(|| TypeDef {
            is_value_type,
            class,
            members: FxHashMap::default(),
        });
        TypeEntry { def }
    }

    /// Descriptor for a type name, honoring `?` and `<...>` conventions.
    /// Unknown names resolve permissively as plain reference types.
    pub fn descriptor_of(&self, type_name: &str) -> TypeDescriptor {
        let (base, nullable) = match type_name.strip_suffix('?') {
            Some(base) => (base, true),
            None => (type_name, false),
        };

        let mut desc = if let Some(open) = base.find('<') {
            let element = base[open + 1..base.len() - 1].to_string();
            TypeDescriptor::sequence(base, element)
        } else if let Some(builtin) = builtin_descriptor(base) {
            builtin
        } else if let Some(def) = self.types.get(base) {
            TypeDescriptor {
                fully_qualified_name: base.to_string(),
                is_nullable: false,
                is_value_type: def.is_value_type,
                class: def.class,
                element_type: None,
            }
        } else {
            trace!(type_name = base, "unknown type name, treating as reference");
            TypeDescriptor::reference(base)
        };

        if nullable {
            desc = desc.nullable_lifted();
        }
        desc
    }

    /// Look up a member on a (possibly nullable-annotated) type name.
    pub fn member_of(&self, owner: &str, member: &str) -> Option<&MemberDef> {
        let base = owner.strip_suffix('?').unwrap_or(owner);
        self.types.get(base)?.members.get(member)
    }

    fn is_enum(&self, name: &str) -> bool {
        self.types
            .get(name)
            .is_some_and(|def| def.class == TypeClass::Enum)
    }

    /// Resolve the type of a member-access chain link by link. Optional
    /// links do not change the member lookup — `a?.b` still reads `b`
    /// off `a`'s base type.
    fn resolve_member_access(
        &self,
        object: &ExprNode,
        member: &str,
        env: &ScopeEnv,
    ) -> Option<TypeDescriptor> {
        // `Type.member`: static member or enum literal
        if let ExprNode::Identifier(name) = object {
            if !env.bound.contains_key(name)
                && !env.locals.contains_key(name)
                && !env.outer_params.contains_key(name)
            {
                if let Some(def) = self.member_of(name, member) {
                    return Some(self.descriptor_of(&def.type_name));
                }
            }
        }
        let object_type = self.resolve_type(object, env)?;
        let def = self.member_of(object_type.base_name(), member)?;
        Some(self.descriptor_of(&def.type_name))
    }
}

impl TypeResolver for TypeModel {
    fn resolve_type(&self, expr: &ExprNode, env: &ScopeEnv) -> Option<TypeDescriptor> {
        match expr {
            ExprNode::Identifier(name) => {
                if let Some(ty) = env.bound.get(name) {
                    return Some(self.descriptor_of(ty));
                }
                if let Some(ty) = env.locals.get(name) {
                    return Some(self.descriptor_of(ty));
                }
                if let Some(ty) = env.outer_params.get(name) {
                    return Some(self.descriptor_of(ty));
                }
                let enclosing = env.enclosing_type.as_deref()?;
                let def = self.member_of(enclosing, name)?;
                Some(self.descriptor_of(&def.type_name))
            }
            ExprNode::This => {
                let enclosing = env.enclosing_type.as_deref()?;
                Some(self.descriptor_of(enclosing))
            }
            ExprNode::MemberAccess { object, member, .. } => {
                self.resolve_member_access(object, member, env)
            }
            ExprNode::Cast { target_type, .. } => Some(self.descriptor_of(target_type)),
            ExprNode::NumberLiteral(text) => Some(self.descriptor_of(if text.contains('.') {
                "double"
            } else {
                "int"
            })),
            ExprNode::StringLiteral(_) => Some(TypeDescriptor::text()),
            ExprNode::BoolLiteral(_) => Some(self.descriptor_of("bool")),
            ExprNode::CharLiteral(_) => Some(self.descriptor_of("char")),
            ExprNode::DefaultOf(ty) => Some(self.descriptor_of(ty)),
            ExprNode::Conditional {
                when_true,
                when_false,
                ..
            } => {
                let arm = self
                    .resolve_type(when_true, env)
                    .or_else(|| self.resolve_type(when_false, env))?;
                // a null in either arm makes the whole conditional nullable
                let has_null_arm = matches!(when_true.as_ref(), ExprNode::NullLiteral)
                    || matches!(when_false.as_ref(), ExprNode::NullLiteral);
                Some(if has_null_arm { arm.nullable_lifted() } else { arm })
            }
            ExprNode::Annotated { expr, .. } => self.resolve_type(expr, env),
            // calls, lambdas, constructions, null — not typeable from a table
            _ => None,
        }
    }

    fn classify_reference(&self, expr: &ExprNode, env: &ScopeEnv) -> ReferenceClass {
        match expr {
            ExprNode::Identifier(name) => {
                if env.bound.contains_key(name) {
                    return ReferenceClass::BoundParameter;
                }
                if env.locals.contains_key(name) {
                    return ReferenceClass::Local;
                }
                if env.outer_params.contains_key(name) {
                    return ReferenceClass::OuterParameter;
                }
                if let Some(enclosing) = env.enclosing_type.as_deref() {
                    if let Some(def) = self.member_of(enclosing, name) {
                        return classify_member(def);
                    }
                }
                ReferenceClass::Unknown
            }
            ExprNode::This => ReferenceClass::InstanceMember { public: false },
            ExprNode::MemberAccess { object, member, .. } => match object.as_ref() {
                ExprNode::This => {
                    let Some(enclosing) = env.enclosing_type.as_deref() else {
                        return ReferenceClass::Unknown;
                    };
                    match self.member_of(enclosing, member) {
                        Some(def) => classify_member(def),
                        None => ReferenceClass::Unknown,
                    }
                }
                ExprNode::Identifier(name)
                    if !env.bound.contains_key(name)
                        && !env.locals.contains_key(name)
                        && !env.outer_params.contains_key(name) =>
                {
                    if self.is_enum(name) {
                        return ReferenceClass::EnumLiteral;
                    }
                    match self.member_of(name, member) {
                        Some(def) => classify_member(def),
                        None => ReferenceClass::Unknown,
                    }
                }
                _ => ReferenceClass::Unknown,
            },
            _ => ReferenceClass::Unknown,
        }
    }
}

fn classify_member(def: &MemberDef) -> ReferenceClass {
    let public = def.accessibility == Accessibility::Public;
    match def.binding {
        MemberBinding::Instance => ReferenceClass::InstanceMember { public },
        MemberBinding::Static => ReferenceClass::StaticMember { public },
        MemberBinding::Constant => ReferenceClass::Constant,
    }
}

fn builtin_descriptor(name: &str) -> Option<TypeDescriptor> {
    match name {
        "int" | "long" | "short" | "byte" | "float" | "double" | "decimal" => {
            Some(TypeDescriptor::value(name, TypeClass::Numeric))
        }
        "bool" => Some(TypeDescriptor::value(name, TypeClass::Bool)),
        "char" => Some(TypeDescriptor::value(name, TypeClass::Char)),
        "string" => Some(TypeDescriptor::text()),
        _ => None,
    }
}

/// Handle for fluently adding members to a type definition.
pub struct TypeEntry<'a> {
    def: &'a mut TypeDef,
}

impl<'a> TypeEntry<'a> {
    fn add(self, member: MemberDef) -> Self {
        self.def.members.insert(member.name.clone(), member);
        self
    }

    /// Public instance member.
    pub fn member(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.add(MemberDef {
            name: name.into(),
            type_name: ty.into(),
            binding: MemberBinding::Instance,
            accessibility: Accessibility::Public,
        })
    }

    /// Non-public instance member.
    pub fn private_member(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.add(MemberDef {
            name: name.into(),
            type_name: ty.into(),
            binding: MemberBinding::Instance,
            accessibility: Accessibility::NonPublic,
        })
    }

    /// Public static member.
    pub fn static_member(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.add(MemberDef {
            name: name.into(),
            type_name: ty.into(),
            binding: MemberBinding::Static,
            accessibility: Accessibility::Public,
        })
    }

    /// Non-public static member.
    pub fn private_static_member(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.add(MemberDef {
            name: name.into(),
            type_name: ty.into(),
            binding: MemberBinding::Static,
            accessibility: Accessibility::NonPublic,
        })
    }

    /// Compile-time constant.
    pub fn constant(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.add(MemberDef {
            name: name.into(),
            type_name: ty.into(),
            binding: MemberBinding::Constant,
            accessibility: Accessibility::Public,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> TypeModel {
        let mut model = TypeModel::new();
        model
            .reference_type("Sample")
            .member("Id", "int")
            .member("Name", "string")
            .member("Nest", "Nest?")
            .member("Items", "List<Item>");
        model.reference_type("Nest").member("Name", "string").member("Id", "int");
        model.reference_type("Item").member("Id", "int").member("Label", "string");
        model.enum_type("Color", &["Red", "Blue"]);
        model
    }

    #[test]
    fn test_member_chain_resolution_through_nullable_link() {
        let model = sample_model();
        let env = ScopeEnv::for_lambda("s", "Sample");
        // s.Nest?.Name: lookup passes through the nullable annotation
        let expr = ExprNode::prop(
            ExprNode::opt_prop(ExprNode::id("s"), "Nest"),
            "Name",
        );
        let desc = model.resolve_type(&expr, &env).unwrap();
        assert_eq!(desc.fully_qualified_name, "string");

        let nest = model
            .resolve_type(&ExprNode::prop(ExprNode::id("s"), "Nest"), &env)
            .unwrap();
        assert!(nest.is_nullable);
    }

    #[test]
    fn test_sequence_descriptor() {
        let model = sample_model();
        let env = ScopeEnv::for_lambda("s", "Sample");
        let desc = model
            .resolve_type(&ExprNode::prop(ExprNode::id("s"), "Items"), &env)
            .unwrap();
        assert_eq!(desc.class, TypeClass::Sequence);
        assert_eq!(desc.element_type.as_deref(), Some("Item"));
    }

    #[test]
    fn test_classification() {
        let mut model = sample_model();
        model
            .reference_type("Ctx")
            .member("Tag", "string")
            .private_member("secret", "int")
            .static_member("Limit", "int")
            .private_static_member("cache", "string")
            .constant("VERSION", "string");

        let env = ScopeEnv::for_lambda("s", "Sample")
            .with_local("n", "int")
            .with_outer_param("p", "string")
            .with_enclosing_type("Ctx");

        let classify = |e: &ExprNode| model.classify_reference(e, &env);

        assert_eq!(classify(&ExprNode::id("s")), ReferenceClass::BoundParameter);
        assert_eq!(classify(&ExprNode::id("n")), ReferenceClass::Local);
        assert_eq!(classify(&ExprNode::id("p")), ReferenceClass::OuterParameter);
        assert_eq!(
            classify(&ExprNode::id("Tag")),
            ReferenceClass::InstanceMember { public: true }
        );
        assert_eq!(
            classify(&ExprNode::prop(ExprNode::This, "secret")),
            ReferenceClass::InstanceMember { public: false }
        );
        assert_eq!(
            classify(&ExprNode::prop(ExprNode::id("Ctx"), "Limit")),
            ReferenceClass::StaticMember { public: true }
        );
        assert_eq!(
            classify(&ExprNode::prop(ExprNode::id("Ctx"), "cache")),
            ReferenceClass::StaticMember { public: false }
        );
        assert_eq!(
            classify(&ExprNode::prop(ExprNode::id("Ctx"), "VERSION")),
            ReferenceClass::Constant
        );
        assert_eq!(
            classify(&ExprNode::prop(ExprNode::id("Color"), "Red")),
            ReferenceClass::EnumLiteral
        );
    }

    #[test]
    fn test_static_lookup_shadowed_by_binding() {
        let mut model = TypeModel::new();
        model.reference_type("Cfg").static_member("Limit", "int");
        model.reference_type("Row").member("Limit", "long");
        // a bound parameter named like a type wins over the static lookup
        let env = ScopeEnv::for_lambda("Cfg", "Row");
        let desc = model
            .resolve_type(&ExprNode::prop(ExprNode::id("Cfg"), "Limit"), &env)
            .unwrap();
        assert_eq!(desc.fully_qualified_name, "long");
    }
}
