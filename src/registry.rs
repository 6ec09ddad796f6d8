//! Deduplication Registry
//!
//! The only state shared across independent compilations: a process-wide
//! map from schema identity to generated type name. Concurrent
//! compilations producing the same identity race to insert; the entry
//! API guarantees at most one winning insertion, and losers adopt the
//! winner's name. The registry lives for one compilation run and is
//! never persisted.
//!
//! The full structural signature is stored next to the name so a
//! truncation collision (two different shapes, same 8-hex identity) is
//! detected and surfaced as a hard error instead of silently merging
//! two schemas under one generated type.

use dashmap::DashMap;
use thiserror::Error;

use crate::identity::Identity;

#[derive(Debug, Clone)]
struct RegistryEntry {
    signature: String,
    name: String,
}

/// Identity-collision error: fatal to dedup correctness, never merged
/// silently.
#[derive(Debug, Clone, Error)]
#[error(
    "schema identity {identity} is already registered for a structurally different schema \
     (hash truncation collision); widen the hash or rename one projection"
)]
pub struct CollisionError {
    pub identity: Identity,
}

/// Process-wide identity → generated-name map. Cheap to share by
/// reference; all methods take `&self`.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    entries: DashMap<Identity, RegistryEntry>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        DedupRegistry::default()
    }

    /// Resolve the generated name for an identity, registering
    /// `candidate` if the identity is new. Idempotent: every caller with
    /// the same identity gets the same name back, whichever compilation
    /// won the insertion race. Errors only on a structural-signature
    /// mismatch under one identity.
    pub fn resolve_or_register(
        &self,
        identity: &Identity,
        signature: &str,
        candidate: &str,
    ) -> Result<String, CollisionError> {
        let entry = self
            .entries
            .entry(identity.clone())
            .or_insert_with(|| RegistryEntry {
                signature: signature.to_string(),
                name: candidate.to_string(),
            });
        if entry.signature != signature {
            return Err(CollisionError {
                identity: identity.clone(),
            });
        }
        Ok(entry.name.clone())
    }

    /// The registered name for an identity, if any.
    pub fn lookup(&self, identity: &Identity) -> Option<String> {
        self.entries.get(identity).map(|e| e.name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
