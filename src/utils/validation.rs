//! Centralized validation and helper functions.

/// Maximum number of query records accepted in a single batch (DOS protection)
pub const MAX_BATCH_QUERIES: usize = 10_000;

/// Maximum number of loci a query profile may carry
pub const MAX_PROFILE_LOCI: usize = 50_000;

/// Default number of hex characters kept from an allele checksum
pub const DEFAULT_HASH_LENGTH: usize = 20;

/// Longest checksum prefix: a full SHA-1 hex digest
pub const MAX_HASH_LENGTH: usize = 40;

/// Validate that a string is a hex allele checksum of at least `min_len` characters.
///
/// # Examples
///
/// ```
/// use hiercc_assign::utils::validation::is_valid_checksum;
///
/// assert!(is_valid_checksum("3f9a0c11d2e4b5a6c7d8", 20));
/// assert!(!is_valid_checksum("not-a-checksum", 4));
/// assert!(!is_valid_checksum("3f9a", 20));
/// ```
#[must_use]
pub fn is_valid_checksum(s: &str, min_len: usize) -> bool {
    s.len() >= min_len && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize a checksum for table lookup: lowercase, truncated to `hash_length`.
/// Returns None if the input is not hex or is shorter than `hash_length`.
#[must_use]
pub fn normalize_checksum(s: &str, hash_length: usize) -> Option<String> {
    let s = s.trim();
    if is_valid_checksum(s, hash_length) {
        Some(s[..hash_length].to_ascii_lowercase())
    } else {
        None
    }
}

/// Compute a signature hash of an encoded allele vector.
///
/// The signature is the MD5 of the little-endian bytes of every allele in
/// locus order, so two vectors share a signature only if they are identical.
#[must_use]
pub fn compute_signature(alleles: &[u32]) -> String {
    let mut context = md5::Context::new();
    for allele in alleles {
        context.consume(allele.to_le_bytes());
    }
    format!("{:x}", context.compute())
}

/// Check if a batch of queries exceeds the maximum allowed.
///
/// Returns an error message if the batch is too large, None if it is safe to process.
#[must_use]
pub fn check_batch_limit(count: usize) -> Option<String> {
    if count > MAX_BATCH_QUERIES {
        Some(format!(
            "Too many queries: {count} exceeds maximum of {MAX_BATCH_QUERIES} per batch"
        ))
    } else {
        None
    }
}

/// Check a profile locus count against the maximum allowed.
#[must_use]
pub fn check_locus_limit(count: usize) -> Option<String> {
    if count > MAX_PROFILE_LOCI {
        Some(format!(
            "Profile has {count} loci, exceeding maximum of {MAX_PROFILE_LOCI}"
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_checksum() {
        assert_eq!(
            normalize_checksum("3F9A0C11D2E4B5A6C7D8FFFF", 20),
            Some("3f9a0c11d2e4b5a6c7d8".to_string())
        );
        assert_eq!(
            normalize_checksum(" 3f9a0c11d2e4b5a6c7d8 ", 20),
            Some("3f9a0c11d2e4b5a6c7d8".to_string())
        );
        assert_eq!(normalize_checksum("3f9a", 20), None);
        assert_eq!(normalize_checksum("zz9a0c11d2e4b5a6c7d8", 20), None);
    }

    #[test]
    fn test_compute_signature_is_order_sensitive() {
        let a = compute_signature(&[1, 2, 3]);
        let b = compute_signature(&[3, 2, 1]);
        assert_ne!(a, b);
        assert_eq!(a, compute_signature(&[1, 2, 3]));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_compute_signature_distinguishes_widths() {
        // [256] and [0, 1] would collide if alleles were written as single bytes
        assert_ne!(compute_signature(&[256]), compute_signature(&[0, 1]));
    }

    #[test]
    fn test_batch_limit() {
        assert!(check_batch_limit(1).is_none());
        assert!(check_batch_limit(MAX_BATCH_QUERIES).is_none());
        assert!(check_batch_limit(MAX_BATCH_QUERIES + 1).is_some());
    }

    #[test]
    fn test_locus_limit() {
        assert!(check_locus_limit(3002).is_none());
        assert!(check_locus_limit(MAX_PROFILE_LOCI + 1).is_some());
    }
}
