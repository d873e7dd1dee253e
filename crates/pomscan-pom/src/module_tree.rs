//! Multi-module project tree walking.
//!
//! Walks `<modules>` declarations depth-first, building the effective model
//! and collecting per-scope dependency graphs for each module. Module
//! failures are recorded and siblings keep processing; only an unreadable
//! root POM aborts the scan.

use crate::effective::EffectiveModelBuilder;
use crate::error::{PomError, Result};
use crate::graph::{CodeLocation, DependencyGraph, ExternalId, GraphCollector, GraphScope};
use crate::types::{EffectiveProject, Repository};
use pomscan_core::config::PolicyConfig;
use pomscan_core::coordinate::ArtifactCoordinate;
use pomscan_fetch::ArtifactFetcher;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Receives one graph per module/scope for downstream serialization.
pub trait CodeLocationSink {
    fn accept(&mut self, location: CodeLocation);
}

/// Discards every code location; useful when only the artifact list matters.
pub struct NullSink;

impl CodeLocationSink for NullSink {
    fn accept(&mut self, _location: CodeLocation) {}
}

/// Scan-wide knobs, treated as already validated by the caller.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub policy: PolicyConfig,
    /// Where dependency-tree dumps and error markers go; `None` disables
    /// both.
    pub dump_dir: Option<PathBuf>,
    /// Module artifact-ids to skip, along with their nested modules.
    pub excluded_modules: Vec<String>,
    pub include_test_scope: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            dump_dir: None,
            excluded_modules: Vec::new(),
            include_test_scope: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleState {
    Pending,
    Visited,
    Failed,
}

/// One module that could not be processed.
#[derive(Debug, Clone)]
pub struct FailedModule {
    pub path: PathBuf,
    pub reason: String,
}

/// What a completed scan produced.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// GAV of every successfully visited module.
    pub visited: Vec<String>,
    pub failed: Vec<FailedModule>,
    /// Deduplicated artifacts across all modules and scopes, ready for
    /// acquisition.
    pub artifacts: Vec<ArtifactCoordinate>,
    /// Repositories declared across the visited modules, deduplicated by id.
    pub repositories: Vec<Repository>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// The declared repositories in fetcher form.
    pub fn remote_repos(&self) -> Vec<pomscan_fetch::RemoteRepo> {
        crate::effective::remote_repos(&self.repositories)
    }
}

/// Drives a whole-project scan from the root POM down.
pub struct ModuleTreeProcessor<'f> {
    fetcher: &'f ArtifactFetcher,
    config: ScanConfig,
}

impl<'f> ModuleTreeProcessor<'f> {
    pub fn new(fetcher: &'f ArtifactFetcher, config: ScanConfig) -> Self {
        Self { fetcher, config }
    }

    /// Processes the module tree rooted at `root_pom`. Fails only when the
    /// root POM itself is missing or unreadable; everything below degrades
    /// to recorded per-module failures.
    pub async fn process(
        &self,
        root_pom: &Path,
        sink: &mut dyn CodeLocationSink,
    ) -> Result<ScanReport> {
        if !root_pom.is_file() {
            return Err(PomError::ModuleNotFound {
                path: root_pom.display().to_string(),
            });
        }

        let mut builder = EffectiveModelBuilder::new(self.fetcher);
        let collector = GraphCollector::new(self.fetcher, self.config.policy.clone());
        let mut report = ScanReport::default();
        let mut seen_artifacts: HashSet<String> = HashSet::new();
        let mut states: HashMap<PathBuf, ModuleState> = HashMap::new();

        // depth-first, explicit stack; the state map guards against
        // mutually-referencing module declarations and symlinked directories
        let mut stack = vec![root_pom.to_path_buf()];
        while let Some(path) = stack.pop() {
            let canonical = match path.canonicalize() {
                Ok(canonical) => canonical,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "module path not found, skipping");
                    report.failed.push(FailedModule {
                        path: path.clone(),
                        reason: format!("module path not found: {err}"),
                    });
                    self.write_error_marker(GraphScope::Compile, &path, &err.to_string());
                    continue;
                }
            };
            match states.get(&canonical) {
                Some(ModuleState::Visited | ModuleState::Failed) => {
                    debug!(path = %canonical.display(), "module already processed, skipping");
                    continue;
                }
                _ => {}
            }
            states.insert(canonical.clone(), ModuleState::Pending);

            let project = match builder.build(&canonical).await {
                Ok(project) => project,
                Err(err) => {
                    warn!(path = %canonical.display(), error = %err, "module build failed");
                    states.insert(canonical.clone(), ModuleState::Failed);
                    report.failed.push(FailedModule {
                        path: canonical.clone(),
                        reason: err.to_string(),
                    });
                    self.write_error_marker(GraphScope::Compile, &canonical, &err.to_string());
                    continue;
                }
            };

            if self.config.excluded_modules.contains(&project.artifact_id) {
                info!(module = %project.gav(), "module excluded by configuration");
                states.insert(canonical.clone(), ModuleState::Visited);
                continue;
            }

            info!(module = %project.gav(), "processing module");
            for repo in &project.repositories {
                if !report.repositories.iter().any(|r| r.id == repo.id) {
                    report.repositories.push(repo.clone());
                }
            }
            let compile = collector
                .collect(&mut builder, &project, GraphScope::Compile)
                .await;
            self.emit(&project, GraphScope::Compile, &compile, sink);
            self.accumulate(&compile, &mut seen_artifacts, &mut report);

            if self.config.include_test_scope {
                let test = collector
                    .collect(&mut builder, &project, GraphScope::Test)
                    .await;
                self.emit(&project, GraphScope::Test, &test, sink);
                self.accumulate(&test, &mut seen_artifacts, &mut report);
            }

            states.insert(canonical.clone(), ModuleState::Visited);
            report.visited.push(project.gav());

            let module_dir = canonical.parent().unwrap_or(Path::new("."));
            for module in project.modules.iter().rev() {
                let mut child = module_dir.join(module);
                if child.is_dir() {
                    child = child.join("pom.xml");
                }
                stack.push(child);
            }
        }

        Ok(report)
    }

    fn emit(
        &self,
        project: &EffectiveProject,
        scope: GraphScope,
        graph: &DependencyGraph,
        sink: &mut dyn CodeLocationSink,
    ) {
        self.write_tree_dump(project, scope, graph);
        // an unconstructible id still emits the graph, just without one
        let external_id =
            ExternalId::maven(&project.group_id, &project.artifact_id, &project.version);
        sink.accept(CodeLocation {
            external_id,
            graph: graph.clone(),
            source_path: project
                .pom_path
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf(),
        });
    }

    fn accumulate(
        &self,
        graph: &DependencyGraph,
        seen: &mut HashSet<String>,
        report: &mut ScanReport,
    ) {
        for artifact in graph.artifacts() {
            if seen.insert(artifact.to_string()) {
                report.artifacts.push(artifact);
            }
        }
    }

    // Dumps and markers are diagnostics; a failure to write one is logged
    // and swallowed.
    fn write_tree_dump(&self, project: &EffectiveProject, scope: GraphScope, graph: &DependencyGraph) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let name = dump_file_name(scope, &project.gav(), false);
        if let Err(err) = std::fs::create_dir_all(dir)
            .and_then(|()| std::fs::write(dir.join(&name), graph.render_tree()))
        {
            warn!(file = %name, error = %err, "could not write dependency-tree dump");
        }
    }

    fn write_error_marker(&self, scope: GraphScope, module_path: &Path, reason: &str) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        let id = module_path.display().to_string();
        let name = dump_file_name(scope, &id, true);
        let body = format!(
            "scope: {}\nmodule: {id}\npath: {}\nreason: {reason}\n",
            scope.name(),
            module_path.display(),
        );
        if let Err(err) =
            std::fs::create_dir_all(dir).and_then(|()| std::fs::write(dir.join(&name), body))
        {
            warn!(file = %name, error = %err, "could not write error marker");
        }
    }
}

/// `dependency-tree-<scope>-<identifier>-<hash>.txt`, with an `-ERROR`
/// variant for failed modules. The hash keeps names unique across modules
/// whose sanitized identifiers collide.
fn dump_file_name(scope: GraphScope, identifier: &str, error: bool) -> String {
    let mut hasher = DefaultHasher::new();
    identifier.hash(&mut hasher);
    scope.name().hash(&mut hasher);
    let hash = hasher.finish() as u32;
    let sanitized: String = identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if error {
        format!("dependency-tree-{}-{sanitized}-{hash:08x}-ERROR.txt", scope.name())
    } else {
        format!("dependency-tree-{}-{sanitized}-{hash:08x}.txt", scope.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomscan_core::config::FetchConfig;
    use tempfile::TempDir;

    struct CollectingSink {
        locations: Vec<CodeLocation>,
    }

    impl CodeLocationSink for CollectingSink {
        fn accept(&mut self, location: CodeLocation) {
            self.locations.push(location);
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn fetcher(dir: &TempDir) -> ArtifactFetcher {
        ArtifactFetcher::new(FetchConfig {
            local_repo: dir.path().join("m2"),
            fallback_url: "http://127.0.0.1:1/repo".to_string(),
            retry: pomscan_core::config::RetryConfig {
                max_attempts: 1,
                ..Default::default()
            },
            ..FetchConfig::default()
        })
        .unwrap()
    }

    fn two_module_tree(dir: &Path) -> PathBuf {
        let root = write(
            dir,
            "pom.xml",
            r"<project>
  <groupId>com.example</groupId>
  <artifactId>parent</artifactId>
  <version>1.0</version>
  <packaging>pom</packaging>
  <modules>
    <module>core</module>
    <module>cli</module>
  </modules>
</project>",
        );
        write(
            &dir.join("core"),
            "pom.xml",
            r"<project>
  <parent>
    <groupId>com.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.0</version>
  </parent>
  <artifactId>core</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>2.0.9</version>
    </dependency>
  </dependencies>
</project>",
        );
        write(
            &dir.join("cli"),
            "pom.xml",
            r"<project>
  <parent>
    <groupId>com.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.0</version>
  </parent>
  <artifactId>cli</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>2.0.9</version>
    </dependency>
  </dependencies>
</project>",
        );
        root
    }

    #[tokio::test]
    async fn test_walks_all_modules_in_order() {
        let dir = TempDir::new().unwrap();
        let root = two_module_tree(dir.path());
        let fetcher = fetcher(&dir);

        let processor = ModuleTreeProcessor::new(&fetcher, ScanConfig::default());
        let mut sink = CollectingSink { locations: Vec::new() };
        let report = processor.process(&root, &mut sink).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(
            report.visited,
            [
                "com.example:parent:1.0",
                "com.example:core:1.0",
                "com.example:cli:1.0"
            ]
        );
        // compile and test per module
        assert_eq!(sink.locations.len(), 6);
        // the shared dependency is deduplicated across modules and scopes
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(
            report.artifacts[0].coordinate().base_key(),
            "org.slf4j:slf4j-api"
        );
    }

    #[tokio::test]
    async fn test_missing_module_fails_in_isolation() {
        let dir = TempDir::new().unwrap();
        let root = write(
            dir.path(),
            "pom.xml",
            r"<project>
  <groupId>com.example</groupId>
  <artifactId>parent</artifactId>
  <version>1.0</version>
  <packaging>pom</packaging>
  <modules>
    <module>missing</module>
    <module>real</module>
  </modules>
</project>",
        );
        write(
            &dir.path().join("real"),
            "pom.xml",
            r"<project>
  <parent>
    <groupId>com.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.0</version>
  </parent>
  <artifactId>real</artifactId>
</project>",
        );
        let fetcher = fetcher(&dir);

        let processor = ModuleTreeProcessor::new(&fetcher, ScanConfig::default());
        let report = processor.process(&root, &mut NullSink).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.visited.contains(&"com.example:real:1.0".to_string()));
    }

    #[tokio::test]
    async fn test_module_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        // a declares b as a module and b declares a back
        let a = write(
            &dir.path().join("a"),
            "pom.xml",
            r"<project>
  <groupId>g</groupId>
  <artifactId>a</artifactId>
  <version>1</version>
  <packaging>pom</packaging>
  <modules>
    <module>../b</module>
  </modules>
</project>",
        );
        write(
            &dir.path().join("b"),
            "pom.xml",
            r"<project>
  <groupId>g</groupId>
  <artifactId>b</artifactId>
  <version>1</version>
  <packaging>pom</packaging>
  <modules>
    <module>../a</module>
  </modules>
</project>",
        );
        let fetcher = fetcher(&dir);

        let processor = ModuleTreeProcessor::new(&fetcher, ScanConfig::default());
        let report = processor.process(&a, &mut NullSink).await.unwrap();
        assert_eq!(report.visited, ["g:a:1", "g:b:1"]);
    }

    #[tokio::test]
    async fn test_excluded_module_skipped_entirely() {
        let dir = TempDir::new().unwrap();
        let root = two_module_tree(dir.path());
        let fetcher = fetcher(&dir);

        let processor = ModuleTreeProcessor::new(
            &fetcher,
            ScanConfig {
                excluded_modules: vec!["cli".to_string()],
                include_test_scope: false,
                ..ScanConfig::default()
            },
        );
        let mut sink = CollectingSink { locations: Vec::new() };
        let report = processor.process(&root, &mut sink).await.unwrap();

        assert!(!report.visited.contains(&"com.example:cli:1.0".to_string()));
        // parent and core, one scope each
        assert_eq!(sink.locations.len(), 2);
    }

    #[tokio::test]
    async fn test_tree_dumps_and_error_markers() {
        let dir = TempDir::new().unwrap();
        let dumps = dir.path().join("dumps");
        let root = write(
            dir.path(),
            "pom.xml",
            r"<project>
  <groupId>com.example</groupId>
  <artifactId>parent</artifactId>
  <version>1.0</version>
  <packaging>pom</packaging>
  <modules>
    <module>broken</module>
  </modules>
</project>",
        );
        // parseable but missing its own coordinates entirely
        write(
            &dir.path().join("broken"),
            "pom.xml",
            "<project><packaging>jar</packaging></project>",
        );
        let fetcher = fetcher(&dir);

        let processor = ModuleTreeProcessor::new(
            &fetcher,
            ScanConfig {
                dump_dir: Some(dumps.clone()),
                include_test_scope: false,
                ..ScanConfig::default()
            },
        );
        let report = processor.process(&root, &mut NullSink).await.unwrap();
        assert_eq!(report.failed.len(), 1);

        let names: Vec<String> = std::fs::read_dir(&dumps)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("-ERROR.txt")));
        assert!(
            names
                .iter()
                .any(|n| n.starts_with("dependency-tree-compile-") && !n.ends_with("-ERROR.txt"))
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let processor = ModuleTreeProcessor::new(&fetcher, ScanConfig::default());
        let result = processor.process(&dir.path().join("pom.xml"), &mut NullSink).await;
        assert!(matches!(result, Err(PomError::ModuleNotFound { .. })));
    }

    #[test]
    fn test_dump_file_name_shape() {
        let name = dump_file_name(GraphScope::Compile, "com.example:app:1.0", false);
        assert!(name.starts_with("dependency-tree-compile-com.example_app_1.0-"));
        assert!(name.ends_with(".txt"));
        let marker = dump_file_name(GraphScope::Test, "g:a:1", true);
        assert!(marker.ends_with("-ERROR.txt"));
    }
}
