//! Glob pattern utilities
//!
//! Unified pattern handling for ignore files and namespace-path matching.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Check if a string contains glob pattern characters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Create a GlobSet from a list of patterns for efficient batch matching
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Ignore entries like "format/" mean every path under the directory.
        let processed = if pattern.ends_with('/') {
            format!("{pattern}**")
        } else {
            pattern.clone()
        };

        builder.add(Glob::new(&processed)?);
    }

    Ok(builder.build()?)
}

/// Extract patterns from ignore-file content (handles comments and empty lines)
pub fn parse_pattern_lines(content: &str) -> Vec<String> {
    let mut patterns = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        patterns.push(line.to_string());
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("*.sh"));
        assert!(is_glob_pattern("ns/**/pre-commit"));
        assert!(is_glob_pattern("hook?.py"));
        assert!(is_glob_pattern("file[123]"));
        assert!(!is_glob_pattern("simple"));
        assert!(!is_glob_pattern("ns/pre-commit/format"));
    }

    #[test]
    fn test_parse_pattern_lines() {
        let content = "# header\n\nns/**\n  format/lint  \n# trailing";
        let patterns = parse_pattern_lines(content);
        assert_eq!(patterns, vec!["ns/**".to_string(), "format/lint".to_string()]);
    }

    #[test]
    fn test_directory_pattern_matches_contents() -> Result<()> {
        let set = build_globset(&["format/".to_string()])?;
        assert!(set.is_match("format/rustfmt"));
        assert!(set.is_match("format/deep/nested"));
        assert!(!set.is_match("lint/rustfmt"));
        Ok(())
    }
}
