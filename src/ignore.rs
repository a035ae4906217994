// src/ignore.rs

//! Ignore policy shared by the file watcher and the directory listing.
//!
//! Both sides must agree on what is excluded, otherwise the watcher and the
//! listing diverge: a directory hidden from the listing would still trigger
//! reloads, or a listed directory would never be watched.

/// Directory names excluded from watching and listing unless overridden.
///
/// Covers the usual build, VCS, and dependency directories.
const DEFAULT_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    ".idea",
    ".vscode",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "vendor",
    "dist",
    "build",
    "target",
    ".next",
    ".nuxt",
    "coverage",
    ".DS_Store",
    "Thumbs.db",
];

/// An ordered set of case-insensitive substring patterns, plus the implicit
/// rule that any name starting with a dot is ignored.
///
/// Immutable after construction; built once at startup from configuration.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    /// Patterns, pre-lowercased for case-insensitive matching.
    patterns: Vec<String>,
}

impl Default for IgnoreSet {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl IgnoreSet {
    /// Parses a comma-separated pattern list, trimming whitespace around each
    /// entry and dropping empty entries.
    pub fn parse(list: &str) -> Self {
        Self {
            patterns: list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_lowercase)
                .collect(),
        }
    }

    /// An ignore set with no substring patterns. Dot-prefixed names are
    /// still ignored.
    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Returns true if `name` should be excluded from watching and listing:
    /// it starts with a dot, or its lowercase form contains any pattern.
    pub fn should_ignore(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }
        let lower = name.to_lowercase();
        self.patterns.iter().any(|pattern| lower.contains(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_names_are_always_ignored() {
        let empty = IgnoreSet::empty();
        for name in [".git", ".hidden", ".a", "."] {
            assert!(empty.should_ignore(name), "{name} should be ignored");
            assert!(IgnoreSet::default().should_ignore(name));
        }
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let set = IgnoreSet::parse("Node_Modules,COVERAGE");
        assert!(set.should_ignore("node_modules"));
        assert!(set.should_ignore("my-node_modules-backup"));
        assert!(set.should_ignore("Coverage"));
        assert!(!set.should_ignore("notes"));
    }

    #[test]
    fn empty_pattern_list_only_ignores_dot_names() {
        let set = IgnoreSet::empty();
        assert!(!set.should_ignore("node_modules"));
        assert!(!set.should_ignore(""));
        assert!(set.should_ignore(".git"));
    }

    #[test]
    fn parse_trims_whitespace_and_drops_empty_entries() {
        let set = IgnoreSet::parse(" build , dist ,, ");
        assert!(set.should_ignore("build"));
        assert!(set.should_ignore("dist"));
        // An accidental empty entry must not match everything.
        assert!(!set.should_ignore("docs"));
    }

    #[test]
    fn default_set_covers_common_directories() {
        let set = IgnoreSet::default();
        assert!(set.should_ignore("node_modules"));
        assert!(set.should_ignore("target"));
        assert!(set.should_ignore("__pycache__"));
        assert!(!set.should_ignore("docs"));
        assert!(!set.should_ignore("readme"));
    }
}
