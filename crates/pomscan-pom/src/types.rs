//! Domain types for parsed and resolved POMs.

use pomscan_core::coordinate::Coordinate;
use std::collections::HashMap;
use std::path::PathBuf;

/// Maven dependency scope. Unknown scopes fall back to `Compile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Compile,
    Test,
    Runtime,
    Provided,
    System,
    Import,
}

impl std::str::FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "test" => Self::Test,
            "runtime" => Self::Runtime,
            "provided" => Self::Provided,
            "system" => Self::System,
            "import" => Self::Import,
            _ => Self::Compile,
        })
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Test => "test",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::System => "system",
            Self::Import => "import",
        })
    }
}

/// A `<exclusion>` entry; `*` wildcards allowed per Maven semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    /// Whether a dependency is shut out by this exclusion.
    pub fn excludes(&self, group_id: &str, artifact_id: &str) -> bool {
        if self.group_id == "*" {
            return true;
        }
        if self.group_id != group_id {
            return false;
        }
        self.artifact_id == "*" || self.artifact_id == artifact_id
    }
}

/// A declared dependency or dependency-management entry, as written.
/// Version and scope may be absent and filled in later from management.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<Scope>,
    pub dep_type: Option<String>,
    pub classifier: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
}

impl PomDependency {
    /// "groupId:artifactId" merge/management key.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn effective_scope(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    /// Full coordinate, available once a version is known.
    pub fn coordinate(&self) -> Option<Coordinate> {
        let version = self.version.as_deref()?;
        let mut coordinate = Coordinate::new(&self.group_id, &self.artifact_id, version);
        if let Some(c) = &self.classifier {
            coordinate = coordinate.with_classifier(c);
        }
        if let Some(t) = &self.dep_type {
            coordinate = coordinate.with_extension(t);
        }
        Some(coordinate)
    }

    /// BOM import entry: scope `import`, type `pom`.
    pub fn is_bom_import(&self) -> bool {
        self.scope == Some(Scope::Import) && self.dep_type.as_deref() == Some("pom")
    }
}

/// `<parent>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub relative_path: Option<String>,
}

impl ParentRef {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group_id, &self.artifact_id, &self.version)
    }
}

/// A `<repository>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

/// A POM exactly as parsed, before inheritance or property resolution.
/// Coordinates may be partially empty until the parent chain fills them.
#[derive(Debug, Clone, Default)]
pub struct UnresolvedPom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<ParentRef>,
    pub properties: HashMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub repositories: Vec<Repository>,
    pub modules: Vec<String>,
    pub plugin_artifact_ids: Vec<String>,
}

/// Fully resolved project model. Immutable once built; cached by canonical
/// POM path for the lifetime of one resolution run.
#[derive(Debug, Clone)]
pub struct EffectiveProject {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub properties: HashMap<String, String>,
    pub repositories: Vec<Repository>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub modules: Vec<String>,
    pub pom_path: PathBuf,
}

impl EffectiveProject {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(&self.group_id, &self.artifact_id, &self.version)
    }

    pub fn gav(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}
