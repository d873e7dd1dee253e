//! Layered property resolution and `${...}` substitution.

use std::collections::HashMap;

/// Key/value lookup layered lowest to highest priority:
/// system environment, parent properties, the POM's own properties, and
/// explicitly-resolved project-star properties (`project.version` etc.).
/// Later layers shadow earlier ones on key collision.
pub struct PropertyResolver {
    merged: HashMap<String, String>,
}

impl PropertyResolver {
    pub fn new(
        pom_properties: &HashMap<String, String>,
        parent_properties: &HashMap<String, String>,
        project_star: &HashMap<String, String>,
    ) -> Self {
        let mut merged: HashMap<String, String> = std::env::vars().collect();
        for (k, v) in parent_properties {
            merged.insert(k.clone(), v.clone());
        }
        for (k, v) in pom_properties {
            merged.insert(k.clone(), v.clone());
        }
        for (k, v) in project_star {
            merged.insert(k.clone(), v.clone());
        }
        Self { merged }
    }

    /// A resolver over a single already-merged property map plus star
    /// properties, used for the post-BOM pass.
    pub fn from_merged(
        properties: &HashMap<String, String>,
        project_star: &HashMap<String, String>,
    ) -> Self {
        Self::new(properties, &HashMap::new(), project_star)
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.merged.get(name).map(String::as_str)
    }

    pub fn all_properties(&self) -> &HashMap<String, String> {
        &self.merged
    }

    /// Replaces every resolvable `${key}` token in `text`.
    ///
    /// Unresolved tokens are left verbatim so partial resolution never blocks
    /// continued processing.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.resolve(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // unterminated token, keep the remainder as-is
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_pom_properties_shadow_parent() {
        let resolver = PropertyResolver::new(
            &props(&[("shared.version", "child")]),
            &props(&[("shared.version", "parent"), ("parent.only", "p")]),
            &HashMap::new(),
        );
        assert_eq!(resolver.resolve("shared.version"), Some("child"));
        assert_eq!(resolver.resolve("parent.only"), Some("p"));
    }

    #[test]
    fn test_project_star_highest_priority() {
        let resolver = PropertyResolver::new(
            &props(&[("project.version", "wrong")]),
            &HashMap::new(),
            &props(&[("project.version", "1.2.3")]),
        );
        assert_eq!(resolver.resolve("project.version"), Some("1.2.3"));
    }

    #[test]
    fn test_environment_is_lowest_layer() {
        // PATH exists in any test environment; a pom property must shadow it
        let resolver = PropertyResolver::new(
            &props(&[("PATH", "pom-wins")]),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(resolver.resolve("PATH"), Some("pom-wins"));

        let plain = PropertyResolver::new(&HashMap::new(), &HashMap::new(), &HashMap::new());
        assert!(plain.resolve("PATH").is_some());
    }

    #[test]
    fn test_substitute_replaces_known_keys() {
        let resolver = PropertyResolver::new(
            &props(&[("app.version", "1.2.3")]),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(
            resolver.substitute("<version>${app.version}</version>"),
            "<version>1.2.3</version>"
        );
    }

    #[test]
    fn test_substitute_leaves_unknown_keys() {
        let resolver = PropertyResolver::new(&HashMap::new(), &HashMap::new(), &HashMap::new());
        assert_eq!(
            resolver.substitute("<version>${nope.version}</version>"),
            "<version>${nope.version}</version>"
        );
    }

    #[test]
    fn test_substitute_mixed_and_unterminated() {
        let resolver = PropertyResolver::new(
            &props(&[("a", "1"), ("b", "2")]),
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(resolver.substitute("${a}-${x}-${b}"), "1-${x}-2");
        assert_eq!(resolver.substitute("tail ${unterminated"), "tail ${unterminated");
    }

    #[test]
    fn test_all_properties_includes_layers() {
        let resolver = PropertyResolver::new(
            &props(&[("a", "1")]),
            &props(&[("b", "2")]),
            &props(&[("c", "3")]),
        );
        let all = resolver.all_properties();
        assert_eq!(all.get("a"), Some(&"1".to_string()));
        assert_eq!(all.get("b"), Some(&"2".to_string()));
        assert_eq!(all.get("c"), Some(&"3".to_string()));
    }
}
