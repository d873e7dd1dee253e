//! pom.xml parser.
//!
//! Uses a quick-xml SAX reader with an element-path stack. Produces an
//! [`UnresolvedPom`]; inheritance and property expansion happen later in the
//! effective-model builder.

use crate::error::{PomError, Result};
use crate::types::{Exclusion, ParentRef, PomDependency, Repository, UnresolvedPom};
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Default)]
struct ParentAccum {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    relative_path: Option<String>,
}

#[derive(Default)]
struct RepoAccum {
    id: Option<String>,
    url: Option<String>,
}

/// Parses POM text into an unresolved model.
///
/// Dependencies under `<profiles>` and `<plugin>` bodies are ignored; plugin
/// artifact ids are collected separately.
pub fn parse_pom(content: &str) -> Result<UnresolvedPom> {
    let mut pom = UnresolvedPom::default();
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // Stack of open element local names, e.g. ["project", "dependencies",
    // "dependency", "groupId"] while reading a dependency's groupId text.
    let mut path: Vec<String> = Vec::new();
    let mut current_dep: Option<PomDependency> = None;
    let mut current_parent: Option<ParentAccum> = None;
    let mut current_excl: Option<Exclusion> = None;
    let mut current_repo: Option<RepoAccum> = None;

    loop {
        let event = reader.read_event().map_err(|e| PomError::Parse {
            message: e.to_string(),
        })?;

        match event {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                path.push(tag.clone());
                if in_profiles(&path) {
                    continue;
                }
                match tag.as_str() {
                    "dependency" if in_dependency_list(&path) => {
                        current_dep = Some(PomDependency::default());
                    }
                    "exclusion" if current_dep.is_some() => {
                        current_excl = Some(Exclusion {
                            group_id: String::new(),
                            artifact_id: String::new(),
                        });
                    }
                    "parent" if path_is(&path, &["project", "parent"]) => {
                        current_parent = Some(ParentAccum::default());
                    }
                    "repository" if ends_with(&path, &["repositories", "repository"]) => {
                        current_repo = Some(RepoAccum::default());
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                // An explicitly empty <relativePath/> disables the
                // file-system parent lookup.
                if tag == "relativePath"
                    && let Some(parent) = current_parent.as_mut()
                {
                    parent.relative_path = Some(String::new());
                }
            }
            Event::Text(ref e) => {
                if in_profiles(&path) {
                    continue;
                }
                let text = match e.decode() {
                    Ok(cow) => {
                        let s = cow.trim().to_string();
                        quick_xml::escape::unescape(&s)
                            .map(|c| c.into_owned())
                            .unwrap_or(s)
                    }
                    Err(_) => String::from_utf8_lossy(e.as_ref()).trim().to_string(),
                };
                if text.is_empty() {
                    continue;
                }
                apply_text(
                    &mut pom,
                    &path,
                    text,
                    &mut current_dep,
                    &mut current_parent,
                    &mut current_excl,
                    &mut current_repo,
                );
            }
            Event::End(_) => {
                let closed = path.pop().unwrap_or_default();
                if in_profiles(&path) {
                    continue;
                }
                match closed.as_str() {
                    "dependency" => {
                        if let Some(dep) = current_dep.take()
                            && !dep.group_id.is_empty()
                            && !dep.artifact_id.is_empty()
                        {
                            if ends_with(&path, &["dependencyManagement", "dependencies"]) {
                                pom.dependency_management.push(dep);
                            } else if path_is(&path, &["project", "dependencies"]) {
                                pom.dependencies.push(dep);
                            }
                        }
                    }
                    "exclusion" => {
                        if let (Some(excl), Some(dep)) = (current_excl.take(), current_dep.as_mut())
                            && !excl.group_id.is_empty()
                        {
                            dep.exclusions.push(excl);
                        }
                    }
                    "parent" => {
                        if let Some(parent) = current_parent.take()
                            && let (Some(group_id), Some(artifact_id), Some(version)) =
                                (parent.group_id, parent.artifact_id, parent.version)
                        {
                            pom.parent = Some(ParentRef {
                                group_id,
                                artifact_id,
                                version,
                                relative_path: parent.relative_path,
                            });
                        }
                    }
                    "repository" => {
                        if let Some(repo) = current_repo.take()
                            && let (Some(id), Some(url)) = (repo.id, repo.url)
                        {
                            pom.repositories.push(Repository { id, url });
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pom)
}

fn apply_text(
    pom: &mut UnresolvedPom,
    path: &[String],
    text: String,
    current_dep: &mut Option<PomDependency>,
    current_parent: &mut Option<ParentAccum>,
    current_excl: &mut Option<Exclusion>,
    current_repo: &mut Option<RepoAccum>,
) {
    // exclusion fields nest inside a dependency, so they are matched first
    if let Some(excl) = current_excl.as_mut() {
        match last(path) {
            "groupId" => excl.group_id = text,
            "artifactId" => excl.artifact_id = text,
            _ => {}
        }
        return;
    }

    if let Some(dep) = current_dep.as_mut()
        && ends_with_tail(path, "dependency")
    {
        match last(path) {
            "groupId" => dep.group_id = text,
            "artifactId" => dep.artifact_id = text,
            "version" => dep.version = Some(text),
            "scope" => dep.scope = text.parse().ok(),
            "type" => dep.dep_type = Some(text),
            "classifier" => dep.classifier = Some(text),
            "optional" => dep.optional = text.eq_ignore_ascii_case("true"),
            _ => {}
        }
        return;
    }

    if let Some(parent) = current_parent.as_mut() {
        match last(path) {
            "groupId" => parent.group_id = Some(text),
            "artifactId" => parent.artifact_id = Some(text),
            "version" => parent.version = Some(text),
            "relativePath" => parent.relative_path = Some(text),
            _ => {}
        }
        return;
    }

    if let Some(repo) = current_repo.as_mut() {
        match last(path) {
            "id" => repo.id = Some(text),
            "url" => repo.url = Some(text),
            _ => {}
        }
        return;
    }

    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    match segments.as_slice() {
        ["project", "groupId"] => pom.group_id = Some(text),
        ["project", "artifactId"] => pom.artifact_id = Some(text),
        ["project", "version"] => pom.version = Some(text),
        ["project", "packaging"] => pom.packaging = Some(text),
        ["project", "modules", "module"] => pom.modules.push(text),
        ["project", "properties", _key] => {
            pom.properties.insert(last(path).to_string(), text);
        }
        [.., "plugins", "plugin", "artifactId"] => pom.plugin_artifact_ids.push(text),
        _ => {}
    }
}

fn last(path: &[String]) -> &str {
    path.last().map_or("", String::as_str)
}

fn path_is(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && ends_with(path, expected)
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

// inside <dependency> but not inside nested <exclusions>
fn ends_with_tail(path: &[String], parent_tag: &str) -> bool {
    path.len() >= 2 && path[path.len() - 2] == parent_tag
}

fn in_profiles(path: &[String]) -> bool {
    path.iter().any(|s| s == "profiles")
}

// <dependencies><dependency> at project level or inside dependencyManagement,
// but not inside a plugin body
fn in_dependency_list(path: &[String]) -> bool {
    ends_with(path, &["dependencies", "dependency"]) && !path.iter().any(|s| s == "plugin")
}
