//! Content-addressable hashing for semantic units.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash over the UTF-16 code units of `s`, as 8 lowercase hex chars.
///
/// Not cryptographic. Collisions only cause two units to be treated as
/// identical during matching.
pub fn create_hash(s: &str) -> String {
    let hash = s.encode_utf16().fold(FNV_OFFSET_BASIS, |acc, unit| {
        (acc ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    });
    format!("{:08x}", hash)
}

/// Normalize text for identity comparison: lowercase, strip punctuation,
/// collapse whitespace.
pub fn normalize(s: &str) -> String {
    let stripped: String = s
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hash used as a unit's identity: `create_hash(normalize(content))`.
pub fn content_hash(content: &str) -> String {
    create_hash(&normalize(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_is_offset_basis() {
        assert_eq!(create_hash(""), "811c9dc5");
    }

    #[test]
    fn test_known_vector() {
        // FNV-1a 32 of "a"
        assert_eq!(create_hash("a"), "e40c292c");
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(create_hash("hello world"), create_hash("hello world"));
        assert_ne!(create_hash("hello world"), create_hash("hello worle"));
        assert_eq!(create_hash("anything").len(), 8);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello,   World! "), "hello world");
        assert_eq!(normalize("e.g. THIS"), "eg this");
    }

    #[test]
    fn test_content_hash_ignores_case_and_punctuation() {
        assert_eq!(content_hash("Hello World."), content_hash("hello world."));
        assert_eq!(content_hash("Hello World."), content_hash("hello world"));
    }

    #[test]
    fn test_utf16_code_units() {
        // Astral characters hash as surrogate pairs
        assert_ne!(create_hash("🎮"), create_hash("\u{FFFD}"));
        assert_eq!(create_hash("🎮").len(), 8);
    }
}
