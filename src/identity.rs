//! Schema Identity Hashing
//!
//! Computes the content-addressed identity of a schema: a SHA-256 digest
//! of the structural signature, truncated to 8 hex characters. The
//! truncation keeps generated type names readable; it is not a security
//! boundary. Two schemas with identical `(name, type, optionality)`
//! sequences in the same order always hash identically — that property
//! is what makes cross-call-site deduplication correct.
//!
//! A nested schema hashes independently over its own fields. The parent
//! never re-expands the nested field list; its signature sees only the
//! nested schema's generated type name (which embeds the nested hash),
//! so identical parents agree exactly when their nested shapes do.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::Schema;

/// Separator between field signature entries. A unit separator cannot
/// appear in identifiers or type names, so signatures never collide by
/// concatenation.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Number of hex characters kept from the digest.
const HASH_LEN: usize = 8;

/// The 8-hex-char content hash of a schema's structural signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Compute the identity of a fully built schema.
    pub fn of(schema: &Schema) -> Identity {
        let signature = signature_of(schema);
        let digest = Sha256::digest(signature.as_bytes());
        let hash: String = digest
            .iter()
            .take(HASH_LEN / 2)
            .map(|b| format!("{b:02x}"))
            .collect();
        Identity(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full structural signature string: `name:type:optional` per field,
/// in declaration order. Kept alongside the truncated hash so the
/// registry can detect a truncation collision instead of silently
/// merging two different shapes.
pub fn signature_of(schema: &Schema) -> String {
    let mut signature = String::new();
    for (i, field) in schema.fields.iter().enumerate() {
        if i > 0 {
            signature.push(FIELD_SEPARATOR);
        }
        signature.push_str(&field.name);
        signature.push(':');
        signature.push_str(&field.declared_type.fully_qualified_name);
        signature.push(':');
        signature.push_str(if field.is_optional { "true" } else { "false" });
    }
    signature
}

/// Default name for the generated type of a schema: the source element
/// type's name suffixed with the identity hash.
pub fn candidate_type_name(source_type_name: &str, identity: &Identity) -> String {
    format!("{source_type_name}Dto_{identity}")
}
