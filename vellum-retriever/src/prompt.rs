//! Prompt normalization and cache keys.
//!
//! Two prompts that differ only in case or whitespace are the same question,
//! so every identity decision in the pipeline (prompt embedding reuse, query
//! de-duplication) goes through [`normalize_prompt`] first. [`prompt_key`]
//! turns the normalized form into a stable filename-safe identifier.

/// Normalize a prompt for identity comparison.
///
/// Leading and trailing whitespace is removed, internal whitespace runs
/// collapse to a single space, and the result is lowercased.
///
/// # Example
///
/// ```
/// use vellum_retriever::prompt::normalize_prompt;
///
/// assert_eq!(normalize_prompt("  What is\tRust? "), "what is rust?");
/// ```
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the cache key for a prompt: the BLAKE3 hash of its normalized
/// form, hex encoded.
///
/// Equivalent prompts (same text up to case and whitespace) always map to
/// the same key, so they share one cached embedding.
pub fn prompt_key(prompt: &str) -> String {
    let normalized = normalize_prompt(prompt);
    hex::encode(blake3::hash(normalized.as_bytes()).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_collapses() {
        assert_eq!(normalize_prompt("  hello   world  "), "hello world");
        assert_eq!(normalize_prompt("line\none\n\ttwo"), "line one two");
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_prompt("What IS Rust?"), "what is rust?");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        assert_eq!(normalize_prompt(""), "");
        assert_eq!(normalize_prompt("   \t\n"), "");
    }

    #[test]
    fn test_equivalent_prompts_share_a_key() {
        let a = prompt_key("What is Rust?");
        let b = prompt_key("  what   is rust?\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_prompts_get_different_keys() {
        assert_ne!(prompt_key("What is Rust?"), prompt_key("What is Go?"));
    }

    #[test]
    fn test_key_is_hex_of_fixed_width() {
        let key = prompt_key("anything");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
