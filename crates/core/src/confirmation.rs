//! Typed confirmations for destructive actions.
//!
//! Staff confirm a household removal by typing the household's last name.
//! Both sides are normalized the same way before comparison: lowercased,
//! trimmed, and with internal whitespace runs collapsed to a single space.

/// Normalize a name for confirmation comparison.
#[must_use]
pub fn normalize_name(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `typed` confirms `expected` under [`normalize_name`].
#[must_use]
pub fn confirmation_matches(typed: &str, expected: &str) -> bool {
    normalize_name(typed) == normalize_name(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_surrounding_whitespace_ignored() {
        assert!(confirmation_matches("Doe", "Doe"));
        assert!(confirmation_matches(" doe ", "Doe"));
        assert!(confirmation_matches("DOE", "Doe"));
    }

    #[test]
    fn test_inner_space_is_significant() {
        assert!(!confirmation_matches("Do e", "Doe"));
    }

    #[test]
    fn test_internal_runs_collapse() {
        assert!(confirmation_matches("van  der\tBerg", "Van der Berg"));
        assert_eq!(normalize_name("  Van \n der   Berg "), "van der berg");
    }

    #[test]
    fn test_non_ascii_names() {
        assert!(confirmation_matches("ÅSTRÖM", "Åström"));
        assert!(!confirmation_matches("Astrom", "Åström"));
    }

    #[test]
    fn test_empty_never_matches_a_name() {
        assert!(!confirmation_matches("", "Andersson"));
        assert!(!confirmation_matches("   ", "Andersson"));
    }
}
