//! Capture Analyzer
//!
//! A projection executes per element, but some of its leaves come from
//! outside per-element scope: enclosing locals, outer parameters,
//! members of the enclosing type. Those must be evaluated once at the
//! call site and threaded in as an explicit snapshot. This pass
//! classifies every leaf reference in the (already rewritten) field
//! expressions and collects the set of required captures:
//!
//! - the lambda's own bound parameters and accesses on them: untouched;
//! - enclosing locals and outer parameters: captured, reference left
//!   syntactically unchanged;
//! - instance members (implicit or `this.`-qualified) and non-public
//!   static members: a synthetic local `captured_<Member>` replaces the
//!   reference and joins the set;
//! - public static members, constants and enum literals: resolvable
//!   without call-site evaluation, never captured.
//!
//! The analyzer also audits a caller-declared capture set against the
//! computed one, producing two independent diagnostics: declared-but-
//! unused and used-but-undeclared. It never auto-corrects either.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::diagnostics::{DiagnosticBag, DiagnosticCode};
use crate::resolver::{ReferenceClass, ScopeEnv, TypeResolver};
use crate::syntax::{ExprNode, FieldInit};

/// Where a captured value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureKind {
    Local,
    OuterParameter,
    InstanceMember,
    StaticMember,
}

/// One required capture: the display name as it appears in the
/// rewritten expression, and its source kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub display_name: String,
    pub kind: CaptureKind,
}

impl CaptureEntry {
    pub fn new(display_name: impl Into<String>, kind: CaptureKind) -> Self {
        CaptureEntry {
            display_name: display_name.into(),
            kind,
        }
    }
}

/// Insertion-ordered set of captures for one root projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSet {
    entries: IndexSet<CaptureEntry>,
}

impl CaptureSet {
    pub fn new() -> Self {
        CaptureSet::default()
    }

    pub fn insert(&mut self, entry: CaptureEntry) -> bool {
        self.entries.insert(entry)
    }

    pub fn contains(&self, entry: &CaptureEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptureEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CaptureEntry> for CaptureSet {
    fn from_iter<I: IntoIterator<Item = CaptureEntry>>(iter: I) -> Self {
        CaptureSet {
            entries: iter.into_iter().collect(),
        }
    }
}

/// The outcome of auditing a caller-declared capture set. The two lists
/// are independent findings, not a single pass/fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureAudit {
    /// Declared by the caller but unused by the projection (removable).
    pub unnecessary: Vec<CaptureEntry>,
    /// Used by the projection but missing from the declaration (must be
    /// added).
    pub missing: Vec<CaptureEntry>,
}

impl CaptureAudit {
    pub fn is_clean(&self) -> bool {
        self.unnecessary.is_empty() && self.missing.is_empty()
    }

    /// Report the findings into a diagnostic bag: unnecessary captures
    /// warn, missing captures error.
    pub fn report(&self, bag: &mut DiagnosticBag) {
        for entry in &self.unnecessary {
            bag.warning(
                DiagnosticCode::UnnecessaryCapture,
                entry.display_name.clone(),
                "declared capture is not used by the projection",
            );
        }
        for entry in &self.missing {
            bag.push(crate::diagnostics::Diagnostic {
                code: DiagnosticCode::MissingCapture,
                severity: crate::diagnostics::Severity::Error,
                field: Some(entry.display_name.clone()),
                message: "projection depends on a capture that is not declared".to_string(),
            });
        }
    }
}

/// Compare a caller-declared set against the computed one.
pub fn audit_declared(declared: &CaptureSet, computed: &CaptureSet) -> CaptureAudit {
    CaptureAudit {
        unnecessary: declared
            .iter()
            .filter(|e| !computed.contains(e))
            .cloned()
            .collect(),
        missing: computed
            .iter()
            .filter(|e| !declared.contains(e))
            .cloned()
            .collect(),
    }
}

/// Classifies leaf references and rewrites member captures to synthetic
/// locals.
pub struct CaptureAnalyzer<'a, R: TypeResolver + ?Sized> {
    resolver: &'a R,
}

impl<'a, R: TypeResolver + ?Sized> CaptureAnalyzer<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        CaptureAnalyzer { resolver }
    }

    /// Analyze one field expression, accumulating captures into `set`
    /// and returning the capture-rewritten expression.
    pub fn analyze(&self, expr: &ExprNode, env: &ScopeEnv, set: &mut CaptureSet) -> ExprNode {
        match expr {
            ExprNode::Identifier(name) => {
                match self.resolver.classify_reference(expr, env) {
                    ReferenceClass::BoundParameter => expr.clone(),
                    ReferenceClass::Local => {
                        set.insert(CaptureEntry::new(name.clone(), CaptureKind::Local));
                        expr.clone()
                    }
                    ReferenceClass::OuterParameter => {
                        set.insert(CaptureEntry::new(name.clone(), CaptureKind::OuterParameter));
                        expr.clone()
                    }
                    ReferenceClass::InstanceMember { .. } => {
                        self.synthesize(name, CaptureKind::InstanceMember, set)
                    }
                    ReferenceClass::StaticMember { public: false } => {
                        self.synthesize(name, CaptureKind::StaticMember, set)
                    }
                    // public statics, constants, enum literals, and
                    // anything the resolver cannot place stay as-is
                    _ => expr.clone(),
                }
            }
            ExprNode::MemberAccess {
                object,
                member,
                optional,
            } => {
                // whole-node classification first: this.X and Type.X
                // are leaves, not chains to descend
                match self.resolver.classify_reference(expr, env) {
                    ReferenceClass::InstanceMember { .. } => {
                        return self.synthesize(member, CaptureKind::InstanceMember, set);
                    }
                    ReferenceClass::StaticMember { public: false } => {
                        return self.synthesize(member, CaptureKind::StaticMember, set);
                    }
                    ReferenceClass::StaticMember { public: true }
                    | ReferenceClass::Constant
                    | ReferenceClass::EnumLiteral => {
                        return expr.clone();
                    }
                    _ => {}
                }
                ExprNode::MemberAccess {
                    object: Box::new(self.analyze(object, env, set)),
                    member: member.clone(),
                    optional: *optional,
                }
            }
            ExprNode::Call { callee, arguments } => ExprNode::Call {
                callee: Box::new(self.analyze(callee, env, set)),
                arguments: arguments
                    .iter()
                    .map(|a| self.analyze(a, env, set))
                    .collect(),
            },
            ExprNode::Lambda { param, body } => {
                // a nested map lambda binds its parameter; the type is
                // irrelevant for classification
                let inner = env.with_bound(param.clone(), String::new());
                ExprNode::Lambda {
                    param: param.clone(),
                    body: Box::new(self.analyze(body, &inner, set)),
                }
            }
            ExprNode::Binary { left, op, right } => ExprNode::Binary {
                left: Box::new(self.analyze(left, env, set)),
                op: *op,
                right: Box::new(self.analyze(right, env, set)),
            },
            ExprNode::Conditional {
                condition,
                when_true,
                when_false,
            } => ExprNode::cond(
                self.analyze(condition, env, set),
                self.analyze(when_true, env, set),
                self.analyze(when_false, env, set),
            ),
            ExprNode::Cast { target_type, expr } => ExprNode::Cast {
                target_type: target_type.clone(),
                expr: Box::new(self.analyze(expr, env, set)),
            },
            ExprNode::ObjectConstruction { type_name, inits } => ExprNode::ObjectConstruction {
                type_name: type_name.clone(),
                inits: inits
                    .iter()
                    .map(|i| FieldInit {
                        name: i.name.clone(),
                        value: self.analyze(&i.value, env, set),
                    })
                    .collect(),
            },
            ExprNode::Annotated { note, expr } => ExprNode::Annotated {
                note: note.clone(),
                expr: Box::new(self.analyze(expr, env, set)),
            },
            _ => expr.clone(),
        }
    }

    fn synthesize(&self, member: &str, kind: CaptureKind, set: &mut CaptureSet) -> ExprNode {
        let local = format!("captured_{member}");
        trace!(member, local = %local, "member reference replaced by capture local");
        set.insert(CaptureEntry::new(local.clone(), kind));
        ExprNode::Identifier(local)
    }
}
