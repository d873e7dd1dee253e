//! Effective-model resolution: parent chains, BOM imports, property passes,
//! and dependency-management application.

use crate::error::{PomError, Result};
use crate::parser::parse_pom;
use crate::properties::PropertyResolver;
use crate::types::{EffectiveProject, ParentRef, PomDependency, Repository, UnresolvedPom};
use futures::future::BoxFuture;
use pomscan_fetch::{ArtifactFetcher, RemoteRepo};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Path-keyed cache of resolved projects, scoped to one resolution run.
///
/// Guarantees at most one parse+build per canonical POM path. Not safe for
/// concurrent mutation; the resolution pass is single-threaded by design.
#[derive(Default)]
pub struct PomCache {
    projects: HashMap<PathBuf, Arc<EffectiveProject>>,
}

impl PomCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<EffectiveProject>> {
        self.projects.get(path).cloned()
    }

    fn insert(&mut self, path: PathBuf, project: Arc<EffectiveProject>) {
        self.projects.insert(path, project);
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Turns one POM file into an [`EffectiveProject`], recursively resolving
/// ancestors and BOM imports through the artifact fetcher.
pub struct EffectiveModelBuilder<'f> {
    fetcher: &'f ArtifactFetcher,
    cache: PomCache,
}

impl<'f> EffectiveModelBuilder<'f> {
    pub fn new(fetcher: &'f ArtifactFetcher) -> Self {
        Self {
            fetcher,
            cache: PomCache::new(),
        }
    }

    pub fn cache(&self) -> &PomCache {
        &self.cache
    }

    pub async fn build(&mut self, pom_path: &Path) -> Result<Arc<EffectiveProject>> {
        let mut visited = HashSet::new();
        self.build_inner(pom_path.to_path_buf(), &mut visited).await
    }

    // Recursive over the parent chain and BOM imports; `visited` carries the
    // coordinates already being resolved in this call chain so cycles
    // terminate as super-POM descendants.
    fn build_inner<'a>(
        &'a mut self,
        path: PathBuf,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<Arc<EffectiveProject>>> {
        Box::pin(async move {
            let canonical = path.canonicalize().map_err(PomError::Io)?;
            if let Some(hit) = self.cache.get(&canonical) {
                debug!(path = %canonical.display(), "POM cache hit");
                return Ok(hit);
            }

            let text = std::fs::read_to_string(&canonical)?;
            let raw = parse_pom(&text)?;

            // Parent chain.
            let parent = match raw.parent.clone() {
                None => None,
                Some(parent_ref) => {
                    let key = parent_ref.coordinate().to_string();
                    if !visited.insert(key.clone()) {
                        warn!(
                            parent = %key,
                            path = %canonical.display(),
                            "parent chain cycle, treating POM as super-POM descendant"
                        );
                        None
                    } else {
                        self.resolve_parent(&canonical, &parent_ref, &raw, visited)
                            .await
                    }
                }
            };

            // First property pass: re-parse the substituted text so BOM
            // coordinates written with properties resolve correctly.
            let star = star_properties(&raw, parent.as_deref());
            let empty = HashMap::new();
            let parent_props = parent.as_ref().map_or(&empty, |p| &p.properties);
            let resolver = PropertyResolver::new(&raw.properties, parent_props, &star);
            let text1 = resolver.substitute(&text);
            let raw1 = if text1 == text {
                raw
            } else {
                match parse_pom(&text1) {
                    Ok(reparsed) => reparsed,
                    Err(err) => {
                        warn!(path = %canonical.display(), error = %err,
                            "substituted POM no longer parses, keeping unsubstituted model");
                        raw
                    }
                }
            };

            let mut project = assemble(&raw1, parent.as_deref(), &canonical)?;

            // BOM imports contribute managed versions and properties, never
            // direct dependencies.
            let boms = self.resolve_boms(&project, visited).await;
            for bom in &boms {
                merge_bom(&mut project, bom);
            }

            // Second property pass: properties introduced by BOMs are now
            // resolvable.
            let star2 = star_properties_effective(&project);
            let resolver2 = PropertyResolver::from_merged(&project.properties, &star2);
            let text2 = resolver2.substitute(&text1);
            if text2 != text1 {
                match parse_pom(&text2) {
                    Ok(raw2) => {
                        project = assemble(&raw2, parent.as_deref(), &canonical)?;
                        for bom in &boms {
                            merge_bom(&mut project, bom);
                        }
                    }
                    Err(err) => {
                        warn!(path = %canonical.display(), error = %err,
                            "post-BOM substitution broke the POM, keeping first-pass model");
                    }
                }
            }

            project
                .dependency_management
                .retain(|entry| !entry.is_bom_import());
            apply_dependency_management(&mut project);

            let project = Arc::new(project);
            self.cache.insert(canonical, Arc::clone(&project));
            Ok(project)
        })
    }

    /// Locates and builds the parent model. Failures degrade leniently: the
    /// child is resolved as if it had no parent.
    async fn resolve_parent(
        &mut self,
        child_path: &Path,
        parent_ref: &ParentRef,
        raw: &UnresolvedPom,
        visited: &mut HashSet<String>,
    ) -> Option<Arc<EffectiveProject>> {
        let parent_path = self.locate_parent(child_path, parent_ref, raw).await;
        let Some(parent_path) = parent_path else {
            warn!(
                parent = %parent_ref.coordinate(),
                "parent POM could not be located, continuing without it"
            );
            return None;
        };
        match self.build_inner(parent_path, visited).await {
            Ok(parent) => Some(parent),
            Err(err) => {
                warn!(
                    parent = %parent_ref.coordinate(),
                    error = %err,
                    "parent model build failed, continuing without it"
                );
                None
            }
        }
    }

    // relativePath (default ../pom.xml) first, then the local repository and
    // remote repositories via the fetcher. An explicitly empty relativePath
    // disables the file-system lookup.
    async fn locate_parent(
        &self,
        child_path: &Path,
        parent_ref: &ParentRef,
        raw: &UnresolvedPom,
    ) -> Option<PathBuf> {
        let dir = child_path.parent()?;
        let relative = parent_ref.relative_path.as_deref().unwrap_or("../pom.xml");
        if !relative.is_empty() {
            let mut candidate = dir.join(relative);
            if candidate.is_dir() {
                candidate = candidate.join("pom.xml");
            }
            if candidate.is_file() && file_declares(&candidate, parent_ref) {
                return Some(candidate);
            }
        }

        let repos = remote_repos(&raw.repositories);
        match self
            .fetcher
            .fetch_pom(&parent_ref.coordinate(), &repos)
            .await
        {
            Ok(path) => Some(path),
            Err(err) => {
                debug!(parent = %parent_ref.coordinate(), error = %err, "parent POM fetch failed");
                None
            }
        }
    }

    async fn resolve_boms(
        &mut self,
        project: &EffectiveProject,
        visited: &mut HashSet<String>,
    ) -> Vec<Arc<EffectiveProject>> {
        let imports: Vec<PomDependency> = project
            .dependency_management
            .iter()
            .filter(|entry| entry.is_bom_import())
            .cloned()
            .collect();
        if imports.is_empty() {
            return Vec::new();
        }

        let repos = remote_repos(&project.repositories);
        let mut boms = Vec::new();
        for entry in imports {
            let Some(coordinate) = entry.coordinate() else {
                warn!(bom = %entry.key(), "BOM import without a version, skipping");
                continue;
            };
            if coordinate.version.contains("${") {
                warn!(bom = %coordinate, "BOM version still unresolved, skipping");
                continue;
            }
            if !visited.insert(coordinate.to_string()) {
                warn!(bom = %coordinate, "BOM import cycle, skipping");
                continue;
            }
            let path = match self.fetcher.fetch_pom(&coordinate, &repos).await {
                Ok(path) => path,
                Err(err) => {
                    warn!(bom = %coordinate, error = %err, "failed to retrieve BOM, skipping");
                    continue;
                }
            };
            match self.build_inner(path, visited).await {
                Ok(bom) => boms.push(bom),
                Err(err) => {
                    warn!(bom = %coordinate, error = %err, "failed to build BOM model, skipping");
                }
            }
        }
        boms
    }
}

/// Merges the child model over its resolved parent. Merge direction is
/// always parent-then-child-overrides: an empty child field never erases a
/// parent value.
fn assemble(
    raw: &UnresolvedPom,
    parent: Option<&EffectiveProject>,
    pom_path: &Path,
) -> Result<EffectiveProject> {
    let group_id = raw
        .group_id
        .clone()
        .or_else(|| parent.map(|p| p.group_id.clone()))
        .or_else(|| raw.parent.as_ref().map(|p| p.group_id.clone()));
    let version = raw
        .version
        .clone()
        .or_else(|| parent.map(|p| p.version.clone()))
        .or_else(|| raw.parent.as_ref().map(|p| p.version.clone()));
    let (Some(group_id), Some(artifact_id), Some(version)) =
        (group_id, raw.artifact_id.clone(), version)
    else {
        return Err(PomError::MissingCoordinates {
            path: pom_path.display().to_string(),
        });
    };

    let mut properties = parent.map_or_else(HashMap::new, |p| p.properties.clone());
    for (k, v) in &raw.properties {
        properties.insert(k.clone(), v.clone());
    }

    let repositories = merge_keyed(
        parent.map_or(&[][..], |p| p.repositories.as_slice()),
        &raw.repositories,
        |repo: &Repository| repo.id.clone(),
    );
    let dependency_management = merge_keyed(
        parent.map_or(&[][..], |p| p.dependency_management.as_slice()),
        &raw.dependency_management,
        PomDependency::key,
    );
    let dependencies = merge_keyed(
        parent.map_or(&[][..], |p| p.dependencies.as_slice()),
        &raw.dependencies,
        PomDependency::key,
    );

    Ok(EffectiveProject {
        group_id,
        artifact_id,
        version,
        packaging: raw.packaging.clone().unwrap_or_else(|| "jar".to_string()),
        properties,
        repositories,
        dependencies,
        dependency_management,
        modules: raw.modules.clone(),
        pom_path: pom_path.to_path_buf(),
    })
}

/// Parent entries first, child entries override on key collision, child-only
/// entries appended in declaration order.
fn merge_keyed<T: Clone, K: Fn(&T) -> String>(parent: &[T], child: &[T], key: K) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(parent.len() + child.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for item in parent.iter().chain(child) {
        let k = key(item);
        match index.get(&k) {
            Some(&i) => merged[i] = item.clone(),
            None => {
                index.insert(k, merged.len());
                merged.push(item.clone());
            }
        }
    }
    merged
}

/// BOM contributions never override the importing POM: caller's properties
/// and management entries win on collision.
fn merge_bom(project: &mut EffectiveProject, bom: &EffectiveProject) {
    for (k, v) in &bom.properties {
        project
            .properties
            .entry(k.clone())
            .or_insert_with(|| v.clone());
    }
    let present: HashSet<String> = project
        .dependency_management
        .iter()
        .map(PomDependency::key)
        .collect();
    for entry in &bom.dependency_management {
        if entry.is_bom_import() || present.contains(&entry.key()) {
            continue;
        }
        project.dependency_management.push(entry.clone());
    }
}

/// Fills missing versions and scopes from the matching group:artifact
/// management entry. Declared values always win.
fn apply_dependency_management(project: &mut EffectiveProject) {
    let managed: HashMap<String, (Option<String>, Option<crate::types::Scope>)> = project
        .dependency_management
        .iter()
        .map(|entry| (entry.key(), (entry.version.clone(), entry.scope)))
        .collect();
    for dep in &mut project.dependencies {
        if let Some((version, scope)) = managed.get(&dep.key()) {
            if dep.version.is_none() {
                dep.version.clone_from(version);
            }
            if dep.scope.is_none() {
                dep.scope = *scope;
            }
        }
    }
}

// Explicitly-resolved project properties, highest priority layer.
fn star_properties(
    raw: &UnresolvedPom,
    parent: Option<&EffectiveProject>,
) -> HashMap<String, String> {
    let mut star = HashMap::new();
    let group = raw
        .group_id
        .clone()
        .or_else(|| parent.map(|p| p.group_id.clone()));
    let version = raw
        .version
        .clone()
        .or_else(|| parent.map(|p| p.version.clone()));
    if let Some(g) = group {
        star.insert("project.groupId".to_string(), g.clone());
        star.insert("pom.groupId".to_string(), g);
    }
    if let Some(a) = &raw.artifact_id {
        star.insert("project.artifactId".to_string(), a.clone());
        star.insert("pom.artifactId".to_string(), a.clone());
    }
    if let Some(v) = version {
        star.insert("project.version".to_string(), v.clone());
        star.insert("pom.version".to_string(), v);
    }
    if let Some(p) = parent {
        star.insert("project.parent.groupId".to_string(), p.group_id.clone());
        star.insert("project.parent.artifactId".to_string(), p.artifact_id.clone());
        star.insert("project.parent.version".to_string(), p.version.clone());
    }
    star
}

fn star_properties_effective(project: &EffectiveProject) -> HashMap<String, String> {
    let mut star = HashMap::new();
    star.insert("project.groupId".to_string(), project.group_id.clone());
    star.insert("project.artifactId".to_string(), project.artifact_id.clone());
    star.insert("project.version".to_string(), project.version.clone());
    star
}

// A relativePath candidate only counts when it actually declares the
// expected parent artifact.
fn file_declares(path: &Path, parent_ref: &ParentRef) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(pom) = parse_pom(&text) else {
        return false;
    };
    pom.artifact_id.as_deref() == Some(parent_ref.artifact_id.as_str())
}

pub(crate) fn remote_repos(repositories: &[Repository]) -> Vec<RemoteRepo> {
    repositories
        .iter()
        .map(|r| RemoteRepo::new(&r.id, &r.url))
        .collect()
}
