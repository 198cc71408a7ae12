use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive a record type name from a schema file path.
///
/// Extracts the file stem (name without extension).
/// Example: `"schemas/article.json"` → `"article"`
pub fn derive_schema_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("default")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_compute_hash_different_inputs() {
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_derive_schema_name() {
        assert_eq!(derive_schema_name(Path::new("article.json")), "article");
        assert_eq!(
            derive_schema_name(Path::new("/absolute/path/to/listing.json")),
            "listing"
        );
        assert_eq!(derive_schema_name(Path::new("article")), "article");
    }
}
