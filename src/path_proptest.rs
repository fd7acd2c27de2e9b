//! Property-based tests for repository naming functions.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{derive_source_name, destination_key, sanitize_name, staging_dir_name};
    use proptest::prelude::*;

    // ============================================================================
    // derive_source_name property tests
    // ============================================================================

    proptest! {
        /// Property: a clone URL ending in `/<group>/<name>.git` yields `<name>`
        #[test]
        fn derive_source_name_takes_last_segment(
            group in "[a-z0-9-]{1,12}",
            name in "[a-z0-9_-]{1,24}",
        ) {
            let url = format!("https://git.example.org/{}/{}.git", group, name);
            prop_assert_eq!(derive_source_name(&url).unwrap(), name);
        }

        /// Property: derived names never contain a slash or a dot
        #[test]
        fn derive_source_name_has_no_separators(input in ".*") {
            if let Ok(name) = derive_source_name(&input) {
                prop_assert!(!name.contains('/'));
                prop_assert!(!name.contains('.'));
                prop_assert!(!name.trim().is_empty());
            }
        }
    }

    // ============================================================================
    // destination_key property tests
    // ============================================================================

    proptest! {
        /// Property: case variants of one name share a join key
        #[test]
        fn destination_key_is_case_insensitive(name in "[a-zA-Z0-9_-]{1,32}") {
            prop_assert_eq!(
                destination_key(&name.to_uppercase()),
                destination_key(&name.to_lowercase())
            );
        }

        /// Property: destination_key is idempotent
        #[test]
        fn destination_key_is_idempotent(name in "[a-zA-Z0-9 ._-]*") {
            let once = destination_key(&name);
            prop_assert_eq!(destination_key(&once), once.clone());
        }
    }

    // ============================================================================
    // sanitize_name property tests
    // ============================================================================

    proptest! {
        /// Property: sanitize_name never produces filesystem-unsafe characters
        #[test]
        fn sanitize_name_never_produces_unsafe_chars(input in ".*") {
            if let Ok(result) = sanitize_name(&input) {
                let unsafe_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
                for ch in unsafe_chars {
                    prop_assert!(
                        !result.contains(ch),
                        "sanitize_name produced unsafe character '{}' from input '{}'",
                        ch,
                        input
                    );
                }
                prop_assert!(result != "." && result != "..");
            }
        }

        /// Property: sanitize_name preserves safe names
        #[test]
        fn sanitize_name_preserves_safe_names(input in "[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,31}") {
            prop_assert_eq!(sanitize_name(&input).unwrap(), input);
        }

        /// Property: staging directories always carry the bare repository suffix
        #[test]
        fn staging_dir_name_ends_with_git(input in "[a-z0-9-]{1,32}") {
            let dir = staging_dir_name(&input).unwrap();
            prop_assert!(dir.ends_with(".git"));
        }
    }
}
