//! Depth-aware dependency selection policy.
//!
//! Applied while the transitive graph is collected. Depth 0 is the root
//! project, 1 its direct dependencies, >= 2 transitives. Child filters are
//! derived with [`SelectionPolicy::descend`], never mutated in place, so
//! sibling branches do not see each other's depth.

use crate::types::{PomDependency, Scope};
use pomscan_core::config::PolicyConfig;
use tracing::debug;

/// A parsed Maven version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<String>,
    pub upper: Option<String>,
}

impl VersionRange {
    /// Both ends present.
    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Whether `version` uses Maven range syntax at all.
    pub fn is_range_syntax(version: &str) -> bool {
        version.contains('[') || version.contains('(') || version.contains(',')
    }

    /// Parses a single range like `[1.0,2.0]`, `[1.0,)`, `(,1.0]`, `[1.0]`.
    ///
    /// Multi-range expressions and malformed strings return `None`; the
    /// caller treats those as non-range versions (fail-open).
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim();
        let first = trimmed.chars().next()?;
        let last = trimmed.chars().last()?;

        if matches!(first, '[' | '(') && matches!(last, ']' | ')') {
            let inner = &trimmed[1..trimmed.len() - 1];
            if inner.contains('[') || inner.contains('(') {
                return None; // multi-range, e.g. "[1,2),(3,4]"
            }
            let mut parts = inner.split(',');
            let lower = parts.next()?.trim();
            match parts.next() {
                None => {
                    // exact pin "[1.0]"
                    if lower.is_empty() {
                        return None;
                    }
                    Some(Self {
                        lower: Some(lower.to_string()),
                        upper: Some(lower.to_string()),
                    })
                }
                Some(upper) => {
                    if parts.next().is_some() {
                        return None;
                    }
                    let upper = upper.trim();
                    Some(Self {
                        lower: (!lower.is_empty()).then(|| lower.to_string()),
                        upper: (!upper.is_empty()).then(|| upper.to_string()),
                    })
                }
            }
        } else {
            None
        }
    }
}

/// Composed scope/optional and version-range filters at one traversal depth.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    depth: u32,
    config: PolicyConfig,
}

impl SelectionPolicy {
    pub fn root(config: PolicyConfig) -> Self {
        Self { depth: 0, config }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Derives the filter for one edge descended. The receiver is untouched.
    pub fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
            config: self.config.clone(),
        }
    }

    /// Whether a dependency encountered at this policy's depth is retained.
    pub fn admits(&self, dep: &PomDependency) -> bool {
        self.admits_scope(dep) && self.admits_version(dep.version.as_deref())
    }

    // Depth <= 1 admits everything; deeper levels drop test/provided scopes
    // and optional dependencies.
    fn admits_scope(&self, dep: &PomDependency) -> bool {
        if self.depth <= 1 {
            return true;
        }
        if dep.optional {
            debug!(dependency = %dep.key(), depth = self.depth, "dropping optional transitive");
            return false;
        }
        match dep.effective_scope() {
            Scope::Test | Scope::Provided => {
                debug!(
                    dependency = %dep.key(),
                    scope = %dep.effective_scope(),
                    depth = self.depth,
                    "dropping transitive by scope"
                );
                false
            }
            _ => true,
        }
    }

    // Ranges are distrusted the further they sit from the root: the system
    // never fetches the repository metadata needed to resolve them properly.
    fn admits_version(&self, version: Option<&str>) -> bool {
        let Some(version) = version else {
            return true;
        };
        if self.depth <= 1 || !VersionRange::is_range_syntax(version) {
            return true;
        }
        match VersionRange::parse(version) {
            Some(range) if range.is_bounded() => {
                if self.depth > self.config.bounded_range_max_depth {
                    debug!(version, depth = self.depth, "dropping bounded range");
                    false
                } else {
                    true
                }
            }
            Some(_) => {
                if self.depth > self.config.open_range_max_depth {
                    debug!(version, depth = self.depth, "dropping open-ended range");
                    false
                } else {
                    true
                }
            }
            // unparseable: treat as a plain version string
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(scope: Option<Scope>, optional: bool, version: &str) -> PomDependency {
        PomDependency {
            group_id: "g".into(),
            artifact_id: "a".into(),
            version: Some(version.to_string()),
            scope,
            optional,
            ..PomDependency::default()
        }
    }

    fn policy_at(depth: u32) -> SelectionPolicy {
        let mut policy = SelectionPolicy::root(PolicyConfig::default());
        for _ in 0..depth {
            policy = policy.descend();
        }
        policy
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(
            VersionRange::parse("[1.0,2.0]"),
            Some(VersionRange {
                lower: Some("1.0".into()),
                upper: Some("2.0".into()),
            })
        );
        assert_eq!(
            VersionRange::parse("[1.0,)"),
            Some(VersionRange {
                lower: Some("1.0".into()),
                upper: None,
            })
        );
        assert_eq!(
            VersionRange::parse("(,1.0]"),
            Some(VersionRange {
                lower: None,
                upper: Some("1.0".into()),
            })
        );
        // exact pin is bounded
        let pin = VersionRange::parse("[1.0]").unwrap();
        assert!(pin.is_bounded());
        // multi-range and plain versions are unparseable
        assert_eq!(VersionRange::parse("[1,2),(3,4]"), None);
        assert_eq!(VersionRange::parse("1.0"), None);
    }

    #[test]
    fn test_depth_one_admits_everything() {
        let policy = policy_at(1);
        assert!(policy.admits(&dep(Some(Scope::Test), false, "1.0")));
        assert!(policy.admits(&dep(Some(Scope::Provided), false, "1.0")));
        assert!(policy.admits(&dep(None, true, "1.0")));
    }

    #[test]
    fn test_depth_two_drops_test_provided_optional() {
        let policy = policy_at(2);
        assert!(!policy.admits(&dep(Some(Scope::Test), false, "1.0")));
        assert!(!policy.admits(&dep(Some(Scope::Provided), false, "1.0")));
        assert!(!policy.admits(&dep(None, true, "1.0")));
        assert!(policy.admits(&dep(Some(Scope::Runtime), false, "1.0")));
        assert!(policy.admits(&dep(None, false, "1.0")));
    }

    #[test]
    fn test_open_range_dropped_at_depth_two() {
        let policy = policy_at(2);
        assert!(!policy.admits(&dep(None, false, "[1.0,)")));
        assert!(!policy.admits(&dep(None, false, "(,2.0]")));
    }

    #[test]
    fn test_bounded_range_kept_until_depth_four() {
        assert!(policy_at(2).admits(&dep(None, false, "[1.0,2.0]")));
        assert!(policy_at(3).admits(&dep(None, false, "[1.0,2.0]")));
        assert!(!policy_at(4).admits(&dep(None, false, "[1.0,2.0]")));
    }

    #[test]
    fn test_unparseable_range_fails_open() {
        // comma triggers range detection but the expression is malformed
        let policy = policy_at(5);
        assert!(policy.admits(&dep(None, false, "1.0,weird")));
    }

    #[test]
    fn test_missing_version_admitted() {
        let policy = policy_at(3);
        let mut d = dep(None, false, "1.0");
        d.version = None;
        assert!(policy.admits(&d));
    }

    #[test]
    fn test_descend_does_not_mutate_parent() {
        let parent = policy_at(1);
        let child = parent.descend();
        assert_eq!(parent.depth(), 1);
        assert_eq!(child.depth(), 2);
    }
}
