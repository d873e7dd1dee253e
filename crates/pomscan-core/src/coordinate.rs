//! Maven coordinate value types.

use crate::error::ConfigError;
use std::fmt;

/// A fully-specified Maven coordinate.
///
/// Classifier and extension are optional; the extension defaults to `jar`.
/// Equality covers all five fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl Coordinate {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier: None,
            extension: "jar".to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: &str) -> Self {
        if !classifier.is_empty() {
            self.classifier = Some(classifier.to_string());
        }
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        if !extension.is_empty() {
            self.extension = extension.to_string();
        }
        self
    }

    /// "groupId:artifactId" key used for dependency-management and
    /// nearest-wins deduplication.
    pub fn base_key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// Expected file name: `artifact-version[-classifier].extension`.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group_id, self.artifact_id, self.version
        )?;
        if let Some(c) = &self.classifier {
            write!(f, ":{c}")?;
        }
        Ok(())
    }
}

/// Acquisition-side coordinate, validated at construction.
///
/// The classifier ends up in a file-system path, so anything that could
/// escape the repository root is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCoordinate {
    inner: Coordinate,
}

impl ArtifactCoordinate {
    pub fn new(coordinate: Coordinate) -> Result<Self, ConfigError> {
        if let Some(classifier) = &coordinate.classifier
            && contains_traversal(classifier)
        {
            return Err(ConfigError::InvalidClassifier {
                classifier: classifier.clone(),
            });
        }
        for field in [
            &coordinate.group_id,
            &coordinate.artifact_id,
            &coordinate.version,
        ] {
            if contains_traversal(field) {
                return Err(ConfigError::InvalidCoordinate {
                    coordinate: coordinate.to_string(),
                });
            }
        }
        Ok(Self { inner: coordinate })
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.inner
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

fn contains_traversal(s: &str) -> bool {
    s.contains('/') || s.contains('\\') || s.contains("..")
}
