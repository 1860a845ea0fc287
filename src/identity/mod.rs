//! Content-addressed chunk identity
//!
//! Identifiers are derived from a blake3 digest of the namespace and the
//! chunk text, so identical content always maps to the same point id. The
//! full 256-bit digest travels with the id so the pipeline can distinguish
//! a true duplicate from an id collision before anything is overwritten.

use uuid::Uuid;

/// Byte separating namespace from text in the digest input, so
/// ("ab", "c") and ("a", "bc") never hash alike.
const NAMESPACE_SEPARATOR: u8 = 0x1f;

/// Deterministic identity for one chunk's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentity {
    /// Point id derived from the content digest
    pub id: Uuid,
    /// Hex-encoded blake3 digest of namespace + text
    pub content_hash: String,
}

/// Derive the identity for a chunk of text within a namespace.
///
/// Two chunks with identical text and namespace always yield the same id
/// and digest; different namespaces keep identical text distinct so the
/// same document can live in multiple collections.
pub fn identify(text: &str, namespace: &str) -> ContentIdentity {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(&[NAMESPACE_SEPARATOR]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(&digest.as_bytes()[..16]);

    ContentIdentity {
        id: Uuid::new_v8(id_bytes),
        content_hash: digest.to_hex().to_string(),
    }
}

/// Random fallback id for a chunk whose deterministic id collided with
/// different stored content. Random ids cannot repeat the collision.
pub fn fallback_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_deterministic() {
        let a = identify("accepted: use event sourcing", "adrs");
        let b = identify("accepted: use event sourcing", "adrs");
        assert_eq!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_different_text_different_identity() {
        let a = identify("option one", "adrs");
        let b = identify("option two", "adrs");
        assert_ne!(a.id, b.id);
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_namespace_separates_identities() {
        let a = identify("same text", "team-a");
        let b = identify("same text", "team-b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_namespace_boundary_is_unambiguous() {
        let a = identify("bc", "a");
        let b = identify("c", "ab");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_digest_is_256_bit() {
        let identity = identify("x", "n");
        assert_eq!(identity.content_hash.len(), 64);
    }

    #[test]
    fn test_fallback_ids_are_unique() {
        assert_ne!(fallback_id(), fallback_id());
    }
}
