//! Repository name derivation and staging path utilities

use crate::error::{Error, Result};

/// Derive the cross-forge join key from a source clone URL.
///
/// Takes the final `/`-separated segment and strips everything from the
/// first `.` onward, so `https://git.example.org/group/bar.git` becomes
/// `bar`. The key is lower-cased to match [`destination_key`].
pub fn derive_source_name(clone_url: &str) -> Result<String> {
    let last_segment = clone_url.rsplit('/').next().unwrap_or_default();
    let stem = last_segment.split('.').next().unwrap_or_default();

    if stem.trim().is_empty() {
        return Err(Error::InvalidName {
            name: stem.to_string(),
            message: format!("no repository name can be derived from '{}'", clone_url),
        });
    }

    Ok(stem.to_lowercase())
}

/// Canonical join key for a destination repository name.
///
/// Destination forges treat names case-insensitively, so `Foo` and `foo`
/// collapse to the same key.
pub fn destination_key(name: &str) -> String {
    name.to_lowercase()
}

/// Make a repository name safe to use as a single directory component.
///
/// Alphanumerics, `.`, `-` and `_` are kept; every other character becomes
/// `-`. Names that sanitize to nothing, or to only dots, are rejected since
/// they would resolve outside the staging root.
pub fn sanitize_name(name: &str) -> Result<String> {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return Err(Error::InvalidName {
            name: name.to_string(),
            message: "name is empty or not filesystem-safe".to_string(),
        });
    }

    Ok(sanitized)
}

/// Directory name of the bare staging repository for `name`.
pub fn staging_dir_name(name: &str) -> Result<String> {
    Ok(format!("{}.git", sanitize_name(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_source_name_strips_git_suffix() {
        assert_eq!(
            derive_source_name("https://git.neuf.no/foo/bar.git").unwrap(),
            "bar"
        );
    }

    #[test]
    fn test_derive_source_name_without_suffix() {
        assert_eq!(
            derive_source_name("https://git.neuf.no/group/website").unwrap(),
            "website"
        );
    }

    #[test]
    fn test_derive_source_name_truncates_at_first_dot() {
        // Everything from the first dot goes, not only the extension
        assert_eq!(
            derive_source_name("https://git.neuf.no/group/neuf.no.git").unwrap(),
            "neuf"
        );
    }

    #[test]
    fn test_derive_source_name_lowercases() {
        assert_eq!(
            derive_source_name("https://git.neuf.no/group/Inside.git").unwrap(),
            "inside"
        );
    }

    #[test]
    fn test_derive_source_name_empty_is_invalid() {
        let err = derive_source_name("https://git.neuf.no/group/").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));

        let err = derive_source_name("https://git.neuf.no/group/.hidden.git").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));

        assert!(derive_source_name("").is_err());
    }

    #[test]
    fn test_destination_key_collides_case_variants() {
        assert_eq!(destination_key("Foo"), "foo");
        assert_eq!(destination_key("foo"), "foo");
        assert_eq!(destination_key("FOO"), destination_key("foo"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("my-repo_1.x").unwrap(), "my-repo_1.x");
        assert_eq!(sanitize_name("a/b").unwrap(), "a-b");
        assert_eq!(sanitize_name("wiki page").unwrap(), "wiki-page");
    }

    #[test]
    fn test_sanitize_name_rejects_dot_only() {
        assert!(sanitize_name("").is_err());
        assert!(sanitize_name(".").is_err());
        assert!(sanitize_name("..").is_err());
    }

    #[test]
    fn test_staging_dir_name() {
        assert_eq!(staging_dir_name("alpha").unwrap(), "alpha.git");
        assert_eq!(staging_dir_name("../etc").unwrap(), "..-etc.git");
    }
}
