//! Transitive dependency graph collection.
//!
//! Breadth-first over resolved dependency lists so that the shallowest
//! occurrence of a group:artifact wins (Maven "nearest wins"). The selection
//! policy and accumulated exclusions shape which edges are descended.

use crate::effective::{EffectiveModelBuilder, remote_repos};
use crate::policy::{SelectionPolicy, VersionRange};
use crate::types::{EffectiveProject, Exclusion, PomDependency, Scope};
use pomscan_core::config::PolicyConfig;
use pomscan_core::coordinate::{ArtifactCoordinate, Coordinate};
use pomscan_fetch::ArtifactFetcher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Which dependency scopes a collected graph covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphScope {
    /// Everything except `test`.
    Compile,
    /// All scopes.
    Test,
}

impl GraphScope {
    pub fn admits(self, scope: Scope) -> bool {
        match self {
            Self::Compile => scope != Scope::Test,
            Self::Test => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Test => "test",
        }
    }
}

/// One resolved node in the graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub coordinate: Coordinate,
    pub scope: Scope,
    /// GAV of the dependency that introduced this node, absent for direct
    /// dependencies of the root project.
    pub included_by: Option<String>,
}

/// A collected dependency graph for one module and scope.
///
/// Nodes are keyed by GAV; edges run parent → child. A group:artifact
/// appears at most once, at the version of its shallowest occurrence.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: String,
    nodes: HashMap<String, DependencyNode>,
    edges: HashMap<String, Vec<String>>,
    root_children: Vec<String>,
}

impl DependencyGraph {
    fn new(root: String) -> Self {
        Self {
            root,
            nodes: HashMap::new(),
            edges: HashMap::new(),
            root_children: Vec::new(),
        }
    }

    fn add_node(&mut self, gav: String, node: DependencyNode) {
        self.nodes.insert(gav, node);
    }

    fn add_edge(&mut self, parent: Option<&str>, child: &str) {
        let children = match parent {
            None => &mut self.root_children,
            Some(p) => self.edges.entry(p.to_string()).or_default(),
        };
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
    }

    pub fn root_gav(&self) -> &str {
        &self.root
    }

    pub fn node(&self, gav: &str) -> Option<&DependencyNode> {
        self.nodes.get(gav)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn direct_children(&self) -> &[String] {
        &self.root_children
    }

    pub fn children_of(&self, gav: &str) -> &[String] {
        self.edges.get(gav).map_or(&[], Vec::as_slice)
    }

    /// Coordinates worth acquiring: range versions are left to live
    /// repository metadata we do not fetch, and unresolved `${...}` versions
    /// cannot name a file.
    pub fn artifacts(&self) -> Vec<ArtifactCoordinate> {
        let mut out = Vec::new();
        for node in self.nodes.values() {
            let version = &node.coordinate.version;
            if version.contains("${") || VersionRange::is_range_syntax(version) {
                debug!(coordinate = %node.coordinate, "skipping non-concrete version for acquisition");
                continue;
            }
            match ArtifactCoordinate::new(node.coordinate.clone()) {
                Ok(artifact) => out.push(artifact),
                Err(err) => {
                    warn!(coordinate = %node.coordinate, error = %err, "invalid coordinate, not acquiring");
                }
            }
        }
        out.sort_by(|a, b| a.coordinate().base_key().cmp(&b.coordinate().base_key()));
        out
    }

    /// Maven-style tree rendering for debug dumps. A node reached through
    /// several parents prints its subtree only once.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.root);
        out.push('\n');
        let mut rendered = HashSet::new();
        self.render_children(&self.root_children, "", &mut rendered, &mut out);
        out
    }

    fn render_children(
        &self,
        children: &[String],
        prefix: &str,
        rendered: &mut HashSet<String>,
        out: &mut String,
    ) {
        for (i, gav) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let branch = if last { "\\- " } else { "+- " };
            let scope = self
                .nodes
                .get(gav)
                .map_or(Scope::Compile, |node| node.scope);
            let repeat = !rendered.insert(gav.clone());
            out.push_str(prefix);
            out.push_str(branch);
            out.push_str(gav);
            out.push_str(&format!(" ({scope})"));
            if repeat {
                out.push_str(" (*)");
            }
            out.push('\n');
            if !repeat {
                let child_prefix = format!("{prefix}{}", if last { "   " } else { "|  " });
                self.render_children(self.children_of(gav), &child_prefix, rendered, out);
            }
        }
    }
}

/// Project identifier handed to the code-location sink. Construction fails
/// on blank coordinate parts; the caller then emits the graph without an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalId {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ExternalId {
    pub fn maven(group_id: &str, artifact_id: &str, version: &str) -> Option<Self> {
        if group_id.trim().is_empty() || artifact_id.trim().is_empty() || version.trim().is_empty()
        {
            return None;
        }
        Some(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
        })
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// One module/scope graph packaged for an external serializer.
#[derive(Debug, Clone)]
pub struct CodeLocation {
    pub external_id: Option<ExternalId>,
    pub graph: DependencyGraph,
    pub source_path: PathBuf,
}

struct WorkItem {
    dep: PomDependency,
    policy: SelectionPolicy,
    exclusions: Vec<Exclusion>,
    parent: Option<String>,
}

/// Collects the transitive graph for one effective project.
///
/// Transitive edges come from the effective model of each dependency's own
/// POM, retrieved through the fetcher. A POM that cannot be retrieved or
/// built leaves its dependency in the graph as a leaf.
pub struct GraphCollector<'f> {
    fetcher: &'f ArtifactFetcher,
    policy_config: PolicyConfig,
}

impl<'f> GraphCollector<'f> {
    pub fn new(fetcher: &'f ArtifactFetcher, policy_config: PolicyConfig) -> Self {
        Self {
            fetcher,
            policy_config,
        }
    }

    pub async fn collect(
        &self,
        builder: &mut EffectiveModelBuilder<'_>,
        project: &EffectiveProject,
        scope: GraphScope,
    ) -> DependencyGraph {
        let mut graph = DependencyGraph::new(project.gav());
        let repos = remote_repos(&project.repositories);
        // base_key -> gav of the occurrence that won
        let mut chosen: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<WorkItem> = VecDeque::new();

        let root_policy = SelectionPolicy::root(self.policy_config.clone());
        for dep in &project.dependencies {
            queue.push_back(WorkItem {
                dep: dep.clone(),
                policy: root_policy.descend(),
                exclusions: Vec::new(),
                parent: None,
            });
        }

        while let Some(item) = queue.pop_front() {
            let dep = &item.dep;
            if !scope.admits(dep.effective_scope()) {
                continue;
            }
            if item
                .exclusions
                .iter()
                .any(|e| e.excludes(&dep.group_id, &dep.artifact_id))
            {
                debug!(dependency = %dep.key(), "excluded by an ancestor edge");
                continue;
            }
            if !item.policy.admits(dep) {
                debug!(dependency = %dep.key(), depth = item.policy.depth(), "dropped by selection policy");
                continue;
            }
            let Some(coordinate) = dep.coordinate() else {
                warn!(dependency = %dep.key(), "no version after management, leaving out of the graph");
                continue;
            };

            // nearest wins: a later occurrence of the same group:artifact
            // only contributes an edge to the already-chosen node
            if let Some(existing) = chosen.get(&coordinate.base_key()) {
                graph.add_edge(item.parent.as_deref(), existing);
                continue;
            }

            let gav = coordinate.to_string();
            chosen.insert(coordinate.base_key(), gav.clone());
            graph.add_node(
                gav.clone(),
                DependencyNode {
                    coordinate: coordinate.clone(),
                    scope: dep.effective_scope(),
                    included_by: item.parent.clone(),
                },
            );
            graph.add_edge(item.parent.as_deref(), &gav);

            if coordinate.version.contains("${")
                || VersionRange::is_range_syntax(&coordinate.version)
            {
                continue;
            }

            let children = match self.fetcher.fetch_pom(&coordinate, &repos).await {
                Ok(pom_path) => match builder.build(&pom_path).await {
                    Ok(model) => model.dependencies.clone(),
                    Err(err) => {
                        warn!(dependency = %gav, error = %err, "POM did not build, keeping as a leaf");
                        Vec::new()
                    }
                },
                Err(err) => {
                    debug!(dependency = %gav, error = %err, "POM not retrievable, keeping as a leaf");
                    Vec::new()
                }
            };

            let child_policy = item.policy.descend();
            for child in children {
                let mut exclusions = item.exclusions.clone();
                exclusions.extend(dep.exclusions.iter().cloned());
                queue.push_back(WorkItem {
                    dep: child,
                    policy: child_policy.clone(),
                    exclusions,
                    parent: Some(gav.clone()),
                });
            }
        }

        graph
    }
}
