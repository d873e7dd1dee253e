//! Standard Maven repository layout rules.
//!
//! `<base>/<groupId with '.' -> '/'>/<artifactId>/<version>/<file>` for both
//! local directories and remote URLs.

use crate::coordinate::Coordinate;
use std::path::PathBuf;

/// Relative path of the artifact file under a repository root.
pub fn repo_relative_path(coordinate: &Coordinate) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in coordinate.group_id.split('.') {
        path.push(segment);
    }
    path.push(&coordinate.artifact_id);
    path.push(&coordinate.version);
    path.push(coordinate.file_name());
    path
}

/// Download URL for the artifact on a remote repository.
pub fn repo_url(base_url: &str, coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        coordinate.group_id.replace('.', "/"),
        coordinate.artifact_id,
        coordinate.version,
        coordinate.file_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let c = Coordinate::new("org.apache.commons", "commons-lang3", "3.14.0");
        assert_eq!(
            repo_relative_path(&c),
            PathBuf::from("org/apache/commons/commons-lang3/3.14.0/commons-lang3-3.14.0.jar")
        );
    }

    #[test]
    fn test_relative_path_with_classifier() {
        let c = Coordinate::new("com.example", "lib", "1.0").with_classifier("sources");
        assert_eq!(
            repo_relative_path(&c),
            PathBuf::from("com/example/lib/1.0/lib-1.0-sources.jar")
        );
    }

    #[test]
    fn test_pom_path_via_extension() {
        let c = Coordinate::new("com.example", "lib", "1.0").with_extension("pom");
        assert_eq!(
            repo_relative_path(&c),
            PathBuf::from("com/example/lib/1.0/lib-1.0.pom")
        );
    }

    #[test]
    fn test_repo_url() {
        let c = Coordinate::new("junit", "junit", "4.13.2");
        assert_eq!(
            repo_url("https://repo1.maven.org/maven2/", &c),
            "https://repo1.maven.org/maven2/junit/junit/4.13.2/junit-4.13.2.jar"
        );
    }
}
